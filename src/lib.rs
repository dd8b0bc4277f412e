pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::Settings;

pub use adapters::container::{FileContainer, MemoryContainer, TerminalContainer};
pub use adapters::livesplit::LiveSplitClient;
pub use adapters::livesplitone::LiveSplitOneClient;
pub use adapters::server::{create_router, start_server, AppState, PageStyle};
pub use crate::core::{feed::SplitFeed, listener::StreamListener, notes::Notes};
pub use utils::error::{Result, StreamError};
