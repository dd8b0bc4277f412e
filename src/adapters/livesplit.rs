//! Client for the LiveSplit server component.
//!
//! LiveSplit speaks a line based text protocol over TCP: each command is a
//! single line terminated by `\r\n`, and queries are answered with one line.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;

use crate::domain::ports::SplitSource;
use crate::utils::error::{Result, StreamError};

pub const DEFAULT_PORT: u16 = 16834;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartTimer,
    StartOrSplit,
    Split,
    Unsplit,
    SkipSplit,
    Pause,
    Resume,
    Reset,
    InitGameTime,
    SetGameTime(String),
    SetLoadingTimes(String),
    PauseGameTime,
    UnpauseGameTime,
    SetComparison(String),
    GetDelta(Option<String>),
    GetLastSplitTime,
    GetComparisonSplitTime,
    GetCurrentTime,
    GetFinalTime(Option<String>),
    GetPredictedTime(String),
    GetBestPossibleTime,
    GetSplitIndex,
    GetCurrentSplitName,
    GetPreviousSplitName,
    GetCurrentTimerPhase,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::StartTimer => f.write_str("starttimer"),
            Command::StartOrSplit => f.write_str("startorsplit"),
            Command::Split => f.write_str("split"),
            Command::Unsplit => f.write_str("unsplit"),
            Command::SkipSplit => f.write_str("skipsplit"),
            Command::Pause => f.write_str("pause"),
            Command::Resume => f.write_str("resume"),
            Command::Reset => f.write_str("reset"),
            Command::InitGameTime => f.write_str("initgametime"),
            Command::SetGameTime(t) => write!(f, "setgametime {}", t),
            Command::SetLoadingTimes(t) => write!(f, "setloadingtimes {}", t),
            Command::PauseGameTime => f.write_str("pausegametime"),
            Command::UnpauseGameTime => f.write_str("unpausegametime"),
            Command::SetComparison(c) => write!(f, "setcomparison {}", c),
            Command::GetDelta(None) => f.write_str("getdelta"),
            Command::GetDelta(Some(c)) => write!(f, "getdelta {}", c),
            Command::GetLastSplitTime => f.write_str("getlastsplittime"),
            Command::GetComparisonSplitTime => f.write_str("getcomparisonsplittime"),
            Command::GetCurrentTime => f.write_str("getcurrenttime"),
            Command::GetFinalTime(None) => f.write_str("getfinaltime"),
            Command::GetFinalTime(Some(c)) => write!(f, "getfinaltime {}", c),
            Command::GetPredictedTime(c) => write!(f, "getpredictedtime {}", c),
            Command::GetBestPossibleTime => f.write_str("getbestpossibletime"),
            Command::GetSplitIndex => f.write_str("getsplitindex"),
            Command::GetCurrentSplitName => f.write_str("getcurrentsplitname"),
            Command::GetPreviousSplitName => f.write_str("getprevioussplitname"),
            Command::GetCurrentTimerPhase => f.write_str("getcurrenttimerphase"),
        }
    }
}

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:(?P<hours>\d*):)?(?P<minutes>\d{1,2}):(?P<seconds>\d{2}).(?P<centiseconds>\d*)")
            .expect("time pattern is a valid regex")
    })
}

/// Parse a LiveSplit time such as `1:02:03.45` or `02:03.45`.
pub fn parse_time(text: &str) -> Result<chrono::Duration> {
    let caps = time_pattern()
        .captures(text.trim())
        .ok_or_else(|| StreamError::ProtocolError {
            message: format!("unrecognised time '{}'", text),
        })?;

    let number = |name: &str| -> i64 {
        caps.name(name)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };

    Ok(chrono::Duration::hours(number("hours"))
        + chrono::Duration::minutes(number("minutes"))
        + chrono::Duration::seconds(number("seconds"))
        + chrono::Duration::milliseconds(number("centiseconds") * 10))
}

#[derive(Debug)]
pub struct LiveSplitClient {
    host: String,
    port: u16,
    timeout: Duration,
    conn: Option<BufStream<TcpStream>>,
}

impl LiveSplitClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_TIMEOUT,
            conn: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub async fn open(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let stream = match tokio::time::timeout(self.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.conn = None;
                return Err(StreamError::ConnectionError {
                    message: format!("could not connect to {}: {}", addr, e),
                });
            }
            Err(_) => {
                self.conn = None;
                return Err(StreamError::TimeoutError {
                    message: format!("connecting to {} took longer than {:?}", addr, self.timeout),
                });
            }
        };

        stream.set_nodelay(true)?;
        self.conn = Some(BufStream::new(stream));
        tracing::debug!("Opened LiveSplit connection to {}", addr);
        Ok(())
    }

    pub fn close(&mut self) {
        self.conn = None;
    }

    /// Send a command, connecting first if needed.
    pub async fn send(&mut self, command: &Command) -> Result<()> {
        if self.conn.is_none() {
            self.open().await?;
        }
        let Some(conn) = self.conn.as_mut() else {
            return Err(StreamError::ConnectionError {
                message: "not connected".to_string(),
            });
        };

        let line = format!("{}\r\n", command);
        let written = async {
            conn.write_all(line.as_bytes()).await?;
            conn.flush().await
        }
        .await;

        if let Err(e) = written {
            self.conn = None;
            return Err(StreamError::ConnectionError {
                message: format!("the connection has been closed by the host: {}", e),
            });
        }
        tracing::trace!("Sent '{}'", command);
        Ok(())
    }

    /// Read one response line.
    ///
    /// A late answer would be read as the reply to the next query, so the
    /// socket is dropped on timeout as well as on disconnect.
    pub async fn receive(&mut self) -> Result<String> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(StreamError::ConnectionError {
                message: "not connected".to_string(),
            });
        };

        let mut line = String::new();
        match tokio::time::timeout(self.timeout, conn.read_line(&mut line)).await {
            Err(_) => {
                self.conn = None;
                Err(StreamError::TimeoutError {
                    message: format!(
                        "no response received from the server within the timeout period ({:?})",
                        self.timeout
                    ),
                })
            }
            Ok(Err(e)) => {
                self.conn = None;
                Err(StreamError::ConnectionError {
                    message: format!("the connection has been closed by the host: {}", e),
                })
            }
            Ok(Ok(0)) => {
                self.conn = None;
                Err(StreamError::ConnectionError {
                    message: "the connection has been closed by the host".to_string(),
                })
            }
            Ok(Ok(_)) => Ok(line.trim().to_string()),
        }
    }

    pub async fn query(&mut self, command: &Command) -> Result<String> {
        self.send(command).await?;
        self.receive().await
    }

    async fn query_time(&mut self, command: &Command) -> Result<chrono::Duration> {
        let text = self.query(command).await?;
        parse_time(&text)
    }

    pub async fn get_split_index(&mut self) -> Result<i64> {
        let text = self.query(&Command::GetSplitIndex).await?;
        text.parse().map_err(|_| StreamError::ProtocolError {
            message: format!("expected a split index, got '{}'", text),
        })
    }

    pub async fn get_current_time(&mut self) -> Result<chrono::Duration> {
        self.query_time(&Command::GetCurrentTime).await
    }

    pub async fn get_last_split_time(&mut self) -> Result<chrono::Duration> {
        self.query_time(&Command::GetLastSplitTime).await
    }

    pub async fn get_comparison_split_time(&mut self) -> Result<chrono::Duration> {
        self.query_time(&Command::GetComparisonSplitTime).await
    }

    pub async fn get_final_time(&mut self, comparison: Option<&str>) -> Result<chrono::Duration> {
        self.query_time(&Command::GetFinalTime(comparison.map(str::to_string)))
            .await
    }

    pub async fn get_predicted_time(&mut self, comparison: &str) -> Result<chrono::Duration> {
        self.query_time(&Command::GetPredictedTime(comparison.to_string()))
            .await
    }

    pub async fn get_best_possible_time(&mut self) -> Result<chrono::Duration> {
        self.query_time(&Command::GetBestPossibleTime).await
    }

    pub async fn get_delta(&mut self, comparison: Option<&str>) -> Result<String> {
        self.query(&Command::GetDelta(comparison.map(str::to_string)))
            .await
    }

    pub async fn get_current_split_name(&mut self) -> Result<String> {
        self.query(&Command::GetCurrentSplitName).await
    }

    pub async fn get_previous_split_name(&mut self) -> Result<String> {
        self.query(&Command::GetPreviousSplitName).await
    }

    pub async fn get_current_timer_phase(&mut self) -> Result<String> {
        self.query(&Command::GetCurrentTimerPhase).await
    }
}

#[async_trait]
impl SplitSource for LiveSplitClient {
    fn timer_name(&self) -> &str {
        "LiveSplit"
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
    fn test_parse_time_with_and_without_hours() {
        let t = parse_time("1:02:03.45").unwrap();
        assert_eq!(t.num_milliseconds(), 3_723_450);

        let t = parse_time("02:03.45").unwrap();
        assert_eq!(t.num_milliseconds(), 123_450);
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        assert!(parse_time("-").is_err());
    }

    #[test]
    fn test_command_wire_text() {
        assert_eq!(Command::GetSplitIndex.to_string(), "getsplitindex");
        assert_eq!(Command::GetDelta(None).to_string(), "getdelta");
        assert_eq!(
            Command::SetComparison("Best Segments".to_string()).to_string(),
            "setcomparison Best Segments"
        );
    }
}
