use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;

use crate::core::sse::{SseDecoder, DEFAULT_MAX_LINE_LEN};
use crate::domain::model::SseEvent;
use crate::domain::ports::Container;
use crate::utils::error::StreamError;

pub const DEFAULT_PLACEHOLDER: &str = "Loading...";

/// Counters for one `listen` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenSummary {
    pub events_received: u64,
    pub updates_applied: u64,
    /// Transport failure that ended the stream, if any.
    pub error: Option<String>,
}

/// Writes every non-empty message payload from an event stream into a container.
pub struct StreamListener<C: Container> {
    container: C,
    client: Client,
    max_line_len: usize,
}

impl<C: Container> StreamListener<C> {
    pub fn new(container: C) -> Self {
        Self::with_placeholder(container, DEFAULT_PLACEHOLDER)
    }

    pub fn with_placeholder(mut container: C, placeholder: &str) -> Self {
        if let Err(e) = container.set_content(placeholder) {
            tracing::error!("Failed to show loading placeholder: {}", e);
        }
        Self {
            container,
            client: Client::new(),
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Cap on a single unterminated line; a longer one ends the stream.
    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    pub fn into_container(self) -> C {
        self.container
    }

    /// Replace the container content with the payload. Empty payloads keep
    /// the previous content. Returns whether the container was updated.
    pub fn on_message(&mut self, event: &SseEvent) -> bool {
        if event.data.is_empty() {
            tracing::debug!("Ignoring empty payload");
            return false;
        }

        match self.container.set_content(&event.data) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to update container: {}", e);
                false
            }
        }
    }

    pub fn on_error(&self, error: &StreamError) {
        tracing::error!("Event stream error: {}", error);
    }

    /// Route a decoded event; only default `message` events reach `on_message`.
    pub fn dispatch(&mut self, event: &SseEvent) -> bool {
        if !event.is_message() {
            tracing::debug!(
                "Ignoring '{}' event",
                event.event.as_deref().unwrap_or_default()
            );
            return false;
        }
        self.on_message(event)
    }

    /// Consume the event stream at `url` until the server closes it or the
    /// transport fails. Failures are logged through `on_error`, never returned.
    pub async fn listen(&mut self, url: &str) -> ListenSummary {
        let mut summary = ListenSummary::default();
        tracing::info!("Opening event stream at {}", url);

        let response = match self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.fail(&mut summary, e.into());
                return summary;
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            self.fail(&mut summary, StreamError::StreamStatusError { status });
            return summary;
        }

        let mut decoder = SseDecoder::new().with_max_line_len(self.max_line_len);
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for event in decoder.feed(&bytes) {
                        summary.events_received += 1;
                        if self.dispatch(&event) {
                            summary.updates_applied += 1;
                        }
                    }
                    if let Err(e) = decoder.check_pending() {
                        self.fail(&mut summary, e);
                        return summary;
                    }
                }
                Err(e) => {
                    self.fail(&mut summary, e.into());
                    return summary;
                }
            }
        }

        tracing::info!(
            "Event stream closed after {} events ({} updates)",
            summary.events_received,
            summary.updates_applied
        );
        summary
    }

    fn fail(&self, summary: &mut ListenSummary, error: StreamError) {
        self.on_error(&error);
        summary.error = Some(error.to_string());
    }
}
