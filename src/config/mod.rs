pub mod settings;

pub use settings::{Settings, TimerKind};

#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "splitnotes-stream")]
#[command(about = "Serve speedrun notes as a live event stream, or follow one")]
pub struct CliConfig {
    /// Settings file (.toml, or a legacy settings.json)
    #[arg(short, long, global = true, default_value = "splitnotes.toml")]
    pub config: PathBuf,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log as JSON lines")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Serve a notes file, following the split index reported by LiveSplit
    Serve(ServeArgs),
    /// Follow a notes stream and show every update
    Listen(ListenArgs),
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Notes file (.txt or .md)
    pub notes: PathBuf,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// Timer program to follow
    #[arg(long, value_enum)]
    pub timer: Option<TimerKind>,

    #[arg(long)]
    pub livesplit_host: Option<String>,

    #[arg(long)]
    pub livesplit_port: Option<u16>,

    /// Splits shown before the current one
    #[arg(long)]
    pub previous: Option<usize>,

    /// Splits shown after the current one
    #[arg(long)]
    pub next: Option<usize>,

    /// Line separating splits (default: blank line)
    #[arg(long)]
    pub separator: Option<String>,

    /// Remember the notes folder in the settings file
    #[arg(long)]
    pub save: bool,
}

#[cfg(feature = "cli")]
impl ServeArgs {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(host) = &self.host {
            settings.server.hostname = host.clone();
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(timer) = self.timer {
            settings.livesplit.timer = timer;
        }
        if let Some(host) = &self.livesplit_host {
            settings.livesplit.hostname = host.clone();
        }
        if let Some(port) = self.livesplit_port {
            settings.livesplit.port = port;
        }
        if let Some(previous) = self.previous {
            settings.server.previous_splits = previous;
        }
        if let Some(next) = self.next {
            settings.server.next_splits = next;
        }
        if let Some(separator) = &self.separator {
            settings.notes.split_separator = separator.clone();
        }
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct ListenArgs {
    /// Event stream URL, e.g. http://192.168.1.20:14250/splits
    #[arg(long)]
    pub url: Option<String>,

    /// Write each update to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Content shown before the first update
    #[arg(long)]
    pub placeholder: Option<String>,
}

#[cfg(feature = "cli")]
impl ListenArgs {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(url) = &self.url {
            settings.listener.url = url.clone();
        }
        if let Some(placeholder) = &self.placeholder {
            settings.listener.placeholder = placeholder.clone();
        }
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_serve_flags_override_settings() {
        let cli = CliConfig::parse_from([
            "splitnotes-stream",
            "serve",
            "notes.txt",
            "--port",
            "8080",
            "--next",
            "2",
            "--timer",
            "livesplitone",
        ]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };

        let mut settings = Settings::default();
        args.apply(&mut settings);
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.next_splits, 2);
        assert_eq!(settings.livesplit.timer, TimerKind::LiveSplitOne);
        assert_eq!(settings.livesplit.port, 16834);
    }

    #[test]
    fn test_listen_flags_override_settings() {
        let cli = CliConfig::parse_from([
            "splitnotes-stream",
            "--verbose",
            "listen",
            "--url",
            "http://timer-pc:14250/splits",
        ]);
        assert!(cli.verbose);
        let Command::Listen(args) = cli.command else {
            panic!("expected listen");
        };

        let mut settings = Settings::default();
        args.apply(&mut settings);
        assert_eq!(settings.listener.url, "http://timer-pc:14250/splits");
    }
}
