use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio::time::{Instant, MissedTickBehavior};

use crate::core::notes::Notes;
use crate::domain::model::FeedUpdate;
use crate::domain::ports::SplitSource;

pub const KEEP_ALIVE_TEXT: &str = "No update, keep connection";
pub const END_OF_NOTES: &str = "End of Notes.";

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub previous_splits: usize,
    pub next_splits: usize,
    pub keep_alive: Duration,
    pub poll_interval: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            previous_splits: 0,
            next_splits: 0,
            keep_alive: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Per-subscriber producer of note updates.
///
/// Polls the split source and emits the rendered notes whenever the split
/// index moves, a keep-alive when nothing changed for a while, and a
/// reconnecting notice (followed by the last notes sent) while the timer
/// cannot be reached.
pub struct SplitFeed {
    source: Box<dyn SplitSource>,
    notes: Arc<Notes>,
    config: FeedConfig,
    connected: bool,
    // Forces a resend after the timer comes back, even on the same split.
    disconnected: bool,
    current_index: Option<i64>,
    last_update: Instant,
    last_notes: String,
}

impl SplitFeed {
    pub fn new(source: Box<dyn SplitSource>, notes: Arc<Notes>, config: FeedConfig) -> Self {
        Self {
            source,
            notes,
            config,
            connected: false,
            disconnected: true,
            current_index: None,
            last_update: Instant::now(),
            last_notes: String::new(),
        }
    }

    pub async fn connect(&mut self) -> bool {
        self.connected = match self.source.connect().await {
            Ok(()) => {
                tracing::info!("Connected to {}", self.source.timer_name());
                true
            }
            Err(e) => {
                tracing::debug!("{} not reachable: {}", self.source.timer_name(), e);
                false
            }
        };
        self.connected
    }

    /// Run one poll. `None` means there is nothing to send this time.
    pub async fn tick(&mut self) -> Option<FeedUpdate> {
        if !self.connected {
            self.disconnected = true;
            self.connect().await;
            return Some(self.connecting_notice());
        }

        let now = Instant::now();
        match self.source.split_index().await {
            Err(e) => {
                tracing::warn!("Lost {}: {}", self.source.timer_name(), e);
                self.disconnected = true;
                self.connect().await;
                Some(self.connecting_notice())
            }
            Ok(index) => {
                let index = index.max(0);
                if self.current_index != Some(index) || self.disconnected {
                    self.disconnected = false;
                    self.last_update = now;
                    self.current_index = Some(index);
                    Some(FeedUpdate::Notes(self.render(index)))
                } else if now.duration_since(self.last_update) > self.config.keep_alive {
                    self.last_update = now;
                    Some(FeedUpdate::KeepAlive(KEEP_ALIVE_TEXT.to_string()))
                } else {
                    None
                }
            }
        }
    }

    pub fn current_index(&self) -> Option<i64> {
        self.current_index
    }

    fn render(&mut self, index: i64) -> String {
        let previous = i64::try_from(self.config.previous_splits).unwrap_or(i64::MAX);
        let next = i64::try_from(self.config.next_splits).unwrap_or(i64::MAX);
        let start = index.saturating_sub(previous);
        let end = index.saturating_add(next).saturating_add(1);
        let rendered = self.notes.render_splits(start, end);
        if rendered.is_empty() {
            return END_OF_NOTES.to_string();
        }

        // Line breaks cannot travel inside a single SSE data line.
        self.last_notes = rendered.concat().replace(['\n', '\r'], "");
        tracing::debug!("Sending notes for split {}", index);
        self.last_notes.clone()
    }

    fn connecting_notice(&self) -> FeedUpdate {
        let timer = self.source.timer_name();
        FeedUpdate::Notes(format!(
            "<h2>Trying to connect to {timer}.</h2><h3>Make sure {timer} server is running.</h3>{}",
            self.last_notes
        ))
    }

    /// Turn the feed into an endless stream polled every `poll_interval`.
    pub fn into_stream(self) -> impl Stream<Item = FeedUpdate> + Send {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        stream::unfold((self, interval, false), |(mut feed, mut interval, started)| async move {
            if !started {
                feed.connect().await;
            }
            loop {
                interval.tick().await;
                if let Some(update) = feed.tick().await {
                    return Some((update, (feed, interval, true)));
                }
            }
        })
    }
}
