pub mod feed;
pub mod listener;
pub mod notes;
pub mod sse;

pub use crate::domain::model::{FeedUpdate, SseEvent};
pub use crate::domain::ports::{Container, SplitSource};
pub use crate::utils::error::Result;
