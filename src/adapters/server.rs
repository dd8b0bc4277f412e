//! HTTP front end: the notes page, the listener script and the `/splits`
//! event stream that drives it.

use std::convert::Infallible;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::sse::{Event, Sse};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{Stream, StreamExt};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::core::feed::{FeedConfig, SplitFeed};
use crate::core::listener::DEFAULT_PLACEHOLDER;
use crate::core::notes::Notes;
use crate::domain::model::FeedUpdate;
use crate::domain::ports::SplitSource;
use crate::utils::error::Result;

const INDEX_HTML: &str = include_str!("../../static/index.html");
const LISTENER_JS: &str = include_str!("../../static/streamlistener.js");

/// Builds a fresh timer connection for each subscriber.
pub type SourceFactory = dyn Fn() -> Box<dyn SplitSource> + Send + Sync;

/// Body style rendered into the page's `{{style}}` slot.
#[derive(Debug, Clone, PartialEq)]
pub struct PageStyle {
    pub font_size: f32,
    pub font_color: String,
    pub background_color: String,
}

impl Default for PageStyle {
    fn default() -> Self {
        Self {
            font_size: 20.0,
            font_color: "#000000ff".to_string(),
            background_color: "#f1f8ffff".to_string(),
        }
    }
}

impl PageStyle {
    fn css(&self) -> String {
        format!(
            "body {{ font-family: sans-serif; font-size: {}px; color: {}; background: {}; }}",
            self.font_size, self.font_color, self.background_color
        )
    }
}

#[derive(Clone)]
pub struct AppState {
    notes: Arc<Notes>,
    title: String,
    placeholder: String,
    feed_config: FeedConfig,
    sources: Arc<SourceFactory>,
    asset_dir: Option<PathBuf>,
    style: PageStyle,
    template: Option<Arc<str>>,
    stylesheet: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        notes: Notes,
        title: impl Into<String>,
        feed_config: FeedConfig,
        sources: Arc<SourceFactory>,
    ) -> Self {
        Self {
            notes: Arc::new(notes),
            title: title.into(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            feed_config,
            sources,
            asset_dir: None,
            style: PageStyle::default(),
            template: None,
            stylesheet: None,
        }
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    /// Folder served for any other path, usually the one holding the notes file.
    pub fn with_asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.asset_dir = Some(dir.into());
        self
    }

    pub fn with_style(mut self, style: PageStyle) -> Self {
        self.style = style;
        self
    }

    /// Replace the built-in page. `{{title}}`, `{{placeholder}}` and `{{style}}`
    /// are filled in on every request.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        let template: String = template.into();
        self.template = Some(Arc::from(template));
        self
    }

    /// Extra CSS served as `/static/notes.css`, linked after the built-in style.
    pub fn with_stylesheet(mut self, css: impl Into<String>) -> Self {
        let css: String = css.into();
        self.stylesheet = Some(Arc::from(css));
        self
    }
}

pub fn create_router(state: AppState) -> Router {
    let asset_dir = state.asset_dir.clone();

    let router = Router::new()
        .route("/", get(index))
        .route("/splits", get(splits))
        .route("/static/streamlistener.js", get(listener_script))
        .route("/static/notes.css", get(stylesheet));

    let router = match asset_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let template = state.template.as_deref().unwrap_or(INDEX_HTML);
    Html(
        template
            .replace("{{title}}", &escape_html(&state.title))
            .replace("{{style}}", &state.style.css())
            .replace("{{placeholder}}", &state.placeholder),
    )
}

async fn stylesheet(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        state.stylesheet.as_deref().unwrap_or_default().to_string(),
    )
}

async fn listener_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        LISTENER_JS,
    )
}

async fn splits(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    tracing::info!("New notes subscriber");
    let feed = SplitFeed::new(
        (state.sources)(),
        state.notes.clone(),
        state.feed_config.clone(),
    );

    Sse::new(feed.into_stream().map(|update| Ok(to_event(update))))
}

fn to_event(update: FeedUpdate) -> Event {
    match update {
        FeedUpdate::Notes(html) => Event::default().data(html),
        FeedUpdate::KeepAlive(text) => Event::default().comment(text),
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Serve until Ctrl-C. Open event streams never finish on their own, so
/// shutdown drops them instead of draining.
pub async fn start_server(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Connect a browser to http://{}/", listener.local_addr()?);

    let server = axum::serve(listener, create_router(state)).into_future();
    tokio::select! {
        result = server => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_style_css() {
        let style = PageStyle {
            font_size: 32.5,
            ..PageStyle::default()
        };
        assert_eq!(
            style.css(),
            "body { font-family: sans-serif; font-size: 32.5px; color: #000000ff; background: #f1f8ffff; }"
        );
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }
}
