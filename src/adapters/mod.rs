// Adapters layer: concrete implementations for external systems (containers, timer connection, http).

pub mod container;
pub mod livesplit;
pub mod livesplitone;
pub mod server;
