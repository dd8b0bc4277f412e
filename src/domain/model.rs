use serde::{Deserialize, Serialize};

/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseEvent {
    /// Event type; `None` means the default `message` type.
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("") | Some("message"))
    }
}

/// What the split feed pushes to a subscriber on each tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedUpdate {
    /// Pre-rendered HTML for the display container.
    Notes(String),
    /// Keep-alive comment; no payload reaches the container.
    KeepAlive(String),
}
