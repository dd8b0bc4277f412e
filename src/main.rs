use std::path::Path;

use clap::Parser;
use splitnotes_stream::config::{Command, ListenArgs, ServeArgs};
use splitnotes_stream::utils::logger::{self, LogFormat};
use splitnotes_stream::utils::validation::Validate;
use splitnotes_stream::{
    AppState, CliConfig, FileContainer, Notes, Result, Settings, StreamError, StreamListener,
    TerminalContainer,
};

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    let format = if config.log_json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    logger::init_logger(format, config.verbose);
    tracing::debug!("CLI config: {:?}", config);

    if let Err(e) = run(config).await {
        tracing::error!(
            "❌ {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        std::process::exit(e.severity().exit_code());
    }
}

async fn run(config: CliConfig) -> Result<()> {
    tracing::info!("Loading settings from {}", config.config.display());
    let mut settings = Settings::load(&config.config)?;

    match &config.command {
        Command::Serve(args) => {
            args.apply(&mut settings);
            settings.validate()?;
            serve(args, settings, &config).await
        }
        Command::Listen(args) => {
            args.apply(&mut settings);
            settings.validate()?;
            listen(args, &settings).await
        }
    }
}

async fn serve(args: &ServeArgs, mut settings: Settings, config: &CliConfig) -> Result<()> {
    let notes = Notes::from_file(&args.notes, &settings.notes.split_separator)?;
    let title = args
        .notes
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Notes".to_string());
    tracing::info!("📄 Loaded {} splits from {}", notes.len(), args.notes.display());

    let asset_dir = args
        .notes
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| ".".into());

    if args.save {
        settings.notes.notes_folder = Some(asset_dir.to_string_lossy().into_owned());
        settings.save(&config.config)?;
        tracing::info!("Saved settings to {}", config.config.display());
    }

    tracing::info!(
        "Following {:?} at {}:{}",
        settings.livesplit.timer,
        settings.livesplit.hostname,
        settings.livesplit.port
    );
    let sources = settings.source_factory();

    let mut state = AppState::new(notes, title, settings.feed_config(), sources)
        .with_placeholder(settings.listener.placeholder.clone())
        .with_style(settings.page_style())
        .with_asset_dir(asset_dir);
    if let Some(template) = read_display_file(settings.display.html_template_file.as_deref()) {
        state = state.with_template(template);
    }
    if let Some(css) = read_display_file(settings.display.css_file.as_deref()) {
        state = state.with_stylesheet(css);
    }

    let bind = format!("{}:{}", settings.server.hostname, settings.server.port);
    let addr = tokio::net::lookup_host(&bind)
        .await?
        .next()
        .ok_or_else(|| StreamError::ConfigError {
            message: format!("could not resolve server address {}", bind),
        })?;

    splitnotes_stream::start_server(addr, state).await
}

/// A missing or unreadable page file falls back to the built-in page.
fn read_display_file(path: Option<&Path>) -> Option<String> {
    let path = path?;
    match std::fs::read_to_string(path) {
        Ok(content) => {
            tracing::info!("Using {}", path.display());
            Some(content)
        }
        Err(e) => {
            tracing::warn!("Ignoring {}: {}", path.display(), e);
            None
        }
    }
}

async fn listen(args: &ListenArgs, settings: &Settings) -> Result<()> {
    let url = &settings.listener.url;
    let placeholder = &settings.listener.placeholder;

    let summary = match &args.output {
        Some(path) => {
            let mut listener =
                StreamListener::with_placeholder(FileContainer::new(path), placeholder);
            listener.listen(url).await
        }
        None => {
            let mut listener = StreamListener::with_placeholder(TerminalContainer::new(), placeholder);
            listener.listen(url).await
        }
    };

    tracing::info!(
        "Stream ended: {} events, {} updates",
        summary.events_received,
        summary.updates_applied
    );

    match summary.error {
        Some(message) => Err(StreamError::ConnectionError { message }),
        None => Ok(()),
    }
}
