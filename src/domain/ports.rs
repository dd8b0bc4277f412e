use crate::utils::error::Result;
use async_trait::async_trait;

/// Display element the stream listener writes into.
pub trait Container: Send + Sync {
    fn content(&self) -> String;
    fn set_content(&mut self, content: &str) -> Result<()>;
}

/// Anything that can report which split the runner is currently on.
#[async_trait]
pub trait SplitSource: Send {
    /// Human-readable timer name used in status messages.
    fn timer_name(&self) -> &str;

    async fn connect(&mut self) -> Result<()>;

    /// Zero based index of the active split, `-1` while the timer is not running.
    async fn split_index(&mut self) -> Result<i64>;
}
