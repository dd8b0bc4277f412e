//! Client for the LiveSplit One server.
//!
//! LiveSplit One takes JSON commands over a websocket and answers every
//! command with a single `{"success": ...}` or `{"error": ...}` message.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::adapters::livesplit::{parse_time, DEFAULT_TIMEOUT};
use crate::domain::ports::SplitSource;
use crate::utils::error::{Result, StreamError};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Command {
    Start,
    SplitOrStart,
    Split,
    UndoSplit,
    SkipSplit,
    Pause,
    Resume,
    Reset,
    InitializeGameTime,
    SetGameTime {
        time: String,
    },
    SetLoadingTimes {
        time: String,
    },
    PauseGameTime,
    ResumeGameTime,
    SetCurrentComparison {
        comparison: String,
    },
    GetCurrentRunSplitTime,
    GetComparisonTime,
    GetCurrentTime,
    GetCurrentState,
    GetSegmentName {
        #[serde(skip_serializing_if = "Option::is_none")]
        index: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        relative: Option<bool>,
    },
}

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    success: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Answer to `getCurrentState`. `index` is only present while a run is active.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimerState {
    pub state: String,
    #[serde(default)]
    pub index: Option<i64>,
}

#[derive(Debug)]
pub struct LiveSplitOneClient {
    host: String,
    port: u16,
    timeout: Duration,
    socket: Option<Socket>,
}

impl LiveSplitOneClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_TIMEOUT,
            socket: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    pub async fn open(&mut self) -> Result<()> {
        let url = self.url();
        self.socket = None;
        let socket = match tokio::time::timeout(self.timeout, connect_async(url.as_str())).await {
            Ok(Ok((socket, _response))) => socket,
            Ok(Err(e)) => {
                return Err(StreamError::ConnectionError {
                    message: format!("could not connect to {}: {}", url, e),
                })
            }
            Err(_) => {
                return Err(StreamError::TimeoutError {
                    message: format!("connecting to {} took longer than {:?}", url, self.timeout),
                })
            }
        };

        self.socket = Some(socket);
        tracing::debug!("Opened LiveSplit One connection to {}", url);
        Ok(())
    }

    pub async fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.close(None).await {
                tracing::debug!("LiveSplit One close handshake failed: {}", e);
            }
        }
    }

    /// Send a command, connecting first if needed.
    pub async fn send(&mut self, command: &Command) -> Result<()> {
        if self.socket.is_none() {
            self.open().await?;
        }
        let Some(socket) = self.socket.as_mut() else {
            return Err(StreamError::ConnectionError {
                message: "not connected".to_string(),
            });
        };

        let json = serde_json::to_string(command)?;
        let sent = socket.send(Message::Text(json.clone().into())).await;
        if let Err(e) = sent {
            self.socket = None;
            return Err(StreamError::ConnectionError {
                message: format!("the connection has been closed by the host: {}", e),
            });
        }
        tracing::trace!("Sent {}", json);
        Ok(())
    }

    /// Wait for the next reply and unwrap its `success` value.
    ///
    /// The socket is dropped on timeout so a late reply is never read as the
    /// answer to the next command.
    pub async fn receive(&mut self) -> Result<Value> {
        let Some(socket) = self.socket.as_mut() else {
            return Err(StreamError::ConnectionError {
                message: "not connected".to_string(),
            });
        };

        let frame = async {
            loop {
                match socket.next().await {
                    Some(Ok(Message::Text(text))) => return Ok(text.as_bytes().to_vec()),
                    Some(Ok(Message::Binary(bytes))) => return Ok(bytes.to_vec()),
                    Some(Ok(Message::Close(_))) | None => {
                        return Err("the connection has been closed by the host".to_string())
                    }
                    // Pings are answered by the socket itself.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        return Err(format!("the connection has been closed by the host: {}", e))
                    }
                }
            }
        };

        let outcome = tokio::time::timeout(self.timeout, frame).await;
        let payload = match outcome {
            Ok(Ok(payload)) => payload,
            Ok(Err(message)) => {
                self.socket = None;
                return Err(StreamError::ConnectionError { message });
            }
            Err(_) => {
                self.socket = None;
                return Err(StreamError::TimeoutError {
                    message: format!(
                        "no response received from the server within the timeout period ({:?})",
                        self.timeout
                    ),
                });
            }
        };

        let reply: Reply = serde_json::from_slice(&payload)?;
        match (reply.success, reply.error) {
            (_, Some(error)) => Err(StreamError::ProtocolError {
                message: format!("LiveSplit One rejected the command: {}", error),
            }),
            (Some(value), None) => Ok(value),
            (None, None) => Ok(Value::Null),
        }
    }

    /// Send a command and wait for its reply.
    pub async fn execute(&mut self, command: &Command) -> Result<Value> {
        self.send(command).await?;
        self.receive().await
    }

    async fn query_time(&mut self, command: &Command) -> Result<chrono::Duration> {
        let value = self.execute(command).await?;
        match value.get("string").and_then(Value::as_str) {
            Some(text) => parse_time(text),
            None => Err(StreamError::ProtocolError {
                message: format!("expected a time, got {}", value),
            }),
        }
    }

    async fn query_text(&mut self, command: &Command) -> Result<String> {
        match self.execute(command).await? {
            Value::String(text) => Ok(text),
            other => Err(StreamError::ProtocolError {
                message: format!("expected text, got {}", other),
            }),
        }
    }

    pub async fn get_state(&mut self) -> Result<TimerState> {
        let value = self.execute(&Command::GetCurrentState).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Index of the active split, `-1` unless a run is running or paused.
    pub async fn get_split_index(&mut self) -> Result<i64> {
        let state = self.get_state().await?;
        match state.state.as_str() {
            "Running" | "Paused" => state.index.ok_or_else(|| StreamError::ProtocolError {
                message: format!("{} state without a split index", state.state),
            }),
            _ => Ok(-1),
        }
    }

    pub async fn get_current_timer_phase(&mut self) -> Result<String> {
        Ok(self.get_state().await?.state)
    }

    pub async fn get_current_time(&mut self) -> Result<chrono::Duration> {
        self.query_time(&Command::GetCurrentTime).await
    }

    pub async fn get_last_split_time(&mut self) -> Result<chrono::Duration> {
        self.query_time(&Command::GetCurrentRunSplitTime).await
    }

    pub async fn get_comparison_split_time(&mut self) -> Result<chrono::Duration> {
        self.query_time(&Command::GetComparisonTime).await
    }

    pub async fn get_current_split_name(&mut self) -> Result<String> {
        self.query_text(&Command::GetSegmentName {
            index: None,
            relative: None,
        })
        .await
    }

    pub async fn get_previous_split_name(&mut self) -> Result<String> {
        self.query_text(&Command::GetSegmentName {
            index: Some(-1),
            relative: Some(true),
        })
        .await
    }
}

#[async_trait]
impl SplitSource for LiveSplitOneClient {
    fn timer_name(&self) -> &str {
        "LiveSplitOne"
    }

    async fn connect(&mut self) -> Result<()> {
        self.open().await
    }

    async fn split_index(&mut self) -> Result<i64> {
        self.get_split_index().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json() {
        assert_eq!(
            serde_json::to_string(&Command::SplitOrStart).unwrap(),
            r#"{"command":"splitOrStart"}"#
        );
        assert_eq!(
            serde_json::to_string(&Command::SetGameTime {
                time: "1:00.00".to_string()
            })
            .unwrap(),
            r#"{"command":"setGameTime","time":"1:00.00"}"#
        );
        assert_eq!(
            serde_json::to_string(&Command::GetSegmentName {
                index: Some(-1),
                relative: Some(true)
            })
            .unwrap(),
            r#"{"command":"getSegmentName","index":-1,"relative":true}"#
        );
        assert_eq!(
            serde_json::to_string(&Command::GetSegmentName {
                index: None,
                relative: None
            })
            .unwrap(),
            r#"{"command":"getSegmentName"}"#
        );
    }

    #[test]
    fn test_timer_state_reply() {
        let state: TimerState =
            serde_json::from_str(r#"{"state":"Running","index":2,"comparison":"PB"}"#).unwrap();
        assert_eq!(state.index, Some(2));

        let state: TimerState = serde_json::from_str(r#"{"state":"NotRunning"}"#).unwrap();
        assert_eq!(state.index, None);
    }
}
