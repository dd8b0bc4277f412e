use crate::adapters::livesplit::LiveSplitClient;
use crate::adapters::livesplitone::LiveSplitOneClient;
use crate::adapters::server::{PageStyle, SourceFactory};
use crate::domain::ports::SplitSource;
use crate::core::feed::FeedConfig;
use crate::core::listener::DEFAULT_PLACEHOLDER;
use crate::utils::error::{Result, StreamError};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Largest number of splits shown on either side of the current one.
pub const MAX_WINDOW_SPLITS: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub livesplit: LiveSplitSettings,
    pub notes: NotesSettings,
    pub server: ServerSettings,
    pub display: DisplaySettings,
    pub listener: ListenerSettings,
}

/// Which timer program reports the split index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum TimerKind {
    /// LiveSplit server component, line commands over TCP.
    #[default]
    #[cfg_attr(feature = "cli", value(name = "livesplit"))]
    LiveSplit,
    /// LiveSplit One, JSON commands over a websocket.
    #[cfg_attr(feature = "cli", value(name = "livesplitone"))]
    LiveSplitOne,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSplitSettings {
    pub timer: TimerKind,
    pub hostname: String,
    pub port: u16,
    pub timeout_ms: u64,
}

impl Default for LiveSplitSettings {
    fn default() -> Self {
        Self {
            timer: TimerKind::default(),
            hostname: "localhost".to_string(),
            port: crate::adapters::livesplit::DEFAULT_PORT,
            timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesSettings {
    /// Line that separates splits; empty means a blank line.
    pub split_separator: String,
    /// Folder the last notes file was opened from.
    pub notes_folder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub hostname: String,
    pub port: u16,
    pub previous_splits: usize,
    pub next_splits: usize,
    pub keep_alive_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            hostname: "0.0.0.0".to_string(),
            port: 14250,
            previous_splits: 0,
            next_splits: 0,
            keep_alive_secs: 10,
            poll_interval_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub font_size: f32,
    /// `#rrggbbaa`, alpha last.
    pub font_color: String,
    pub background_color: String,
    /// Page served instead of the built-in one.
    pub html_template_file: Option<PathBuf>,
    /// Stylesheet linked after the built-in style.
    pub css_file: Option<PathBuf>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        let style = PageStyle::default();
        Self {
            font_size: style.font_size,
            font_color: style.font_color,
            background_color: style.background_color,
            html_template_file: None,
            css_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerSettings {
    pub url: String,
    pub placeholder: String,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:14250/splits".to_string(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

/// Flat `settings.json` written by the desktop notes viewer. Older files
/// prefix the window sizes with `server_`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct LegacySettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    timer: Option<TimerKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    split_separator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes_folder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_port: Option<u16>,
    #[serde(alias = "server_previous_splits", skip_serializing_if = "Option::is_none")]
    previous_splits: Option<usize>,
    #[serde(alias = "server_next_splits", skip_serializing_if = "Option::is_none")]
    next_splits: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    font_size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    font_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    html_template_folder: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    html_template_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    css_folder: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    css_file: Option<String>,
}

/// Join a legacy folder/file pair. A bare file name refers to the viewer's
/// bundled assets, which are not shipped here.
fn legacy_path(folder: Option<PathBuf>, file: Option<String>) -> Option<PathBuf> {
    Some(folder?.join(file?))
}

fn split_legacy_path(path: Option<&PathBuf>) -> (Option<PathBuf>, Option<String>) {
    let Some(path) = path else {
        return (None, None);
    };
    let folder = path.parent().map(Path::to_path_buf);
    let file = path.file_name().map(|f| f.to_string_lossy().into_owned());
    (folder, file)
}

impl From<LegacySettings> for Settings {
    fn from(legacy: LegacySettings) -> Self {
        let mut settings = Settings::default();
        if let Some(timer) = legacy.timer {
            settings.livesplit.timer = timer;
        }
        if let Some(hostname) = legacy.hostname {
            settings.livesplit.hostname = hostname;
        }
        if let Some(port) = legacy.port {
            settings.livesplit.port = port;
        }
        if let Some(separator) = legacy.split_separator {
            settings.notes.split_separator = separator;
        }
        settings.notes.notes_folder = legacy.notes_folder;
        if let Some(hostname) = legacy.server_hostname {
            settings.server.hostname = hostname;
        }
        if let Some(port) = legacy.server_port {
            settings.server.port = port;
        }
        if let Some(previous) = legacy.previous_splits {
            settings.server.previous_splits = previous;
        }
        if let Some(next) = legacy.next_splits {
            settings.server.next_splits = next;
        }
        if let Some(size) = legacy.font_size {
            settings.display.font_size = size;
        }
        if let Some(color) = legacy.font_color {
            settings.display.font_color = color;
        }
        if let Some(color) = legacy.background_color {
            settings.display.background_color = color;
        }
        settings.display.html_template_file =
            legacy_path(legacy.html_template_folder, legacy.html_template_file);
        settings.display.css_file = legacy_path(legacy.css_folder, legacy.css_file);
        settings
    }
}

impl From<&Settings> for LegacySettings {
    fn from(settings: &Settings) -> Self {
        let (html_template_folder, html_template_file) =
            split_legacy_path(settings.display.html_template_file.as_ref());
        let (css_folder, css_file) = split_legacy_path(settings.display.css_file.as_ref());
        Self {
            timer: Some(settings.livesplit.timer),
            hostname: Some(settings.livesplit.hostname.clone()),
            port: Some(settings.livesplit.port),
            split_separator: Some(settings.notes.split_separator.clone()),
            notes_folder: settings.notes.notes_folder.clone(),
            server_hostname: Some(settings.server.hostname.clone()),
            server_port: Some(settings.server.port),
            previous_splits: Some(settings.server.previous_splits),
            next_splits: Some(settings.server.next_splits),
            font_size: Some(settings.display.font_size),
            font_color: Some(settings.display.font_color.clone()),
            background_color: Some(settings.display.background_color.clone()),
            html_template_folder,
            html_template_file,
            css_folder,
            css_file,
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

impl Settings {
    /// Load settings from a file, if the file does not exist just use defaults.
    /// `.json` files are read in the legacy flat format.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        if is_json(path) {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);
        Ok(toml::from_str(&processed)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let legacy: LegacySettings = serde_json::from_str(content)?;
        Ok(legacy.into())
    }

    /// Write the settings in the format `load` reads from the same path.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = if is_json(path) {
            self.to_json_string(path)?
        } else {
            toml::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Legacy JSON keeps any keys it does not know, such as the desktop
    /// viewer's window settings, from the file already at `path`.
    fn to_json_string(&self, path: &Path) -> Result<String> {
        let mut document = match std::fs::read_to_string(path) {
            Ok(existing) => match serde_json::from_str::<Value>(&existing) {
                Ok(Value::Object(map)) => map,
                _ => {
                    tracing::warn!("Replacing unreadable settings at {}", path.display());
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };

        if let Value::Object(fields) = serde_json::to_value(LegacySettings::from(self))? {
            document.remove("server_previous_splits");
            document.remove("server_next_splits");
            document.extend(fields);
        }
        Ok(serde_json::to_string_pretty(&Value::Object(document))?)
    }

    /// Replace `${VAR}` with the environment value, leaving unknown names as-is.
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is a valid regex");
        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            previous_splits: self.server.previous_splits,
            next_splits: self.server.next_splits,
            keep_alive: Duration::from_secs(self.server.keep_alive_secs),
            poll_interval: Duration::from_millis(self.server.poll_interval_ms),
        }
    }

    pub fn livesplit_timeout(&self) -> Duration {
        Duration::from_millis(self.livesplit.timeout_ms)
    }

    /// Connection builder for the configured timer, one client per subscriber.
    pub fn source_factory(&self) -> Arc<SourceFactory> {
        let host = self.livesplit.hostname.clone();
        let port = self.livesplit.port;
        let timeout = self.livesplit_timeout();
        match self.livesplit.timer {
            TimerKind::LiveSplit => Arc::new(move || -> Box<dyn SplitSource> {
                Box::new(LiveSplitClient::new(host.clone(), port).with_timeout(timeout))
            }),
            TimerKind::LiveSplitOne => Arc::new(move || -> Box<dyn SplitSource> {
                Box::new(LiveSplitOneClient::new(host.clone(), port).with_timeout(timeout))
            }),
        }
    }

    pub fn page_style(&self) -> PageStyle {
        PageStyle {
            font_size: self.display.font_size,
            font_color: self.display.font_color.clone(),
            background_color: self.display.background_color.clone(),
        }
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validation::validate_hostname("livesplit.hostname", &self.livesplit.hostname)?;
        validation::validate_port("livesplit.port", self.livesplit.port)?;
        validation::validate_range("livesplit.timeout_ms", self.livesplit.timeout_ms, 10, 60_000)?;

        validation::validate_hostname("server.hostname", &self.server.hostname)?;
        validation::validate_port("server.port", self.server.port)?;
        validation::validate_range("server.previous_splits", self.server.previous_splits, 0, MAX_WINDOW_SPLITS)?;
        validation::validate_range("server.next_splits", self.server.next_splits, 0, MAX_WINDOW_SPLITS)?;
        validation::validate_range("server.poll_interval_ms", self.server.poll_interval_ms, 10, 60_000)?;
        validation::validate_range("server.keep_alive_secs", self.server.keep_alive_secs, 1, 3600)?;

        validation::validate_range("display.font_size", self.display.font_size, 1.0, 500.0)?;
        validation::validate_color("display.font_color", &self.display.font_color)?;
        validation::validate_color("display.background_color", &self.display.background_color)?;

        validation::validate_url("listener.url", &self.listener.url)?;

        if self.livesplit.port == self.server.port
            && matches!(self.livesplit.hostname.as_str(), "localhost" | "127.0.0.1")
        {
            return Err(StreamError::ConfigError {
                message: format!(
                    "server.port {} is already used by {:?} on this machine",
                    self.server.port, self.livesplit.timer
                ),
            });
        }

        Ok(())
    }
}
