use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use splitnotes_stream::adapters::server::{PageStyle, SourceFactory};
use splitnotes_stream::core::feed::FeedConfig;
use splitnotes_stream::domain::ports::{Container, SplitSource};
use splitnotes_stream::{create_router, AppState, MemoryContainer, Notes, Result, StreamListener};
use tempfile::TempDir;
use tower::ServiceExt;

/// Reports whatever split index the test stores in the shared counter.
struct SharedIndex(Arc<AtomicI64>);

#[async_trait]
impl SplitSource for SharedIndex {
    fn timer_name(&self) -> &str {
        "LiveSplit"
    }

    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn split_index(&mut self) -> Result<i64> {
        Ok(self.0.load(Ordering::SeqCst))
    }
}

fn test_state(index: Arc<AtomicI64>) -> AppState {
    let notes = Notes::parse("Grab the key\n\nBoss: hit twice\n\nFinal split", "");
    let sources: Arc<SourceFactory> =
        Arc::new(move || -> Box<dyn SplitSource> { Box::new(SharedIndex(index.clone())) });
    let config = FeedConfig {
        poll_interval: Duration::from_millis(20),
        ..FeedConfig::default()
    };
    AppState::new(notes, "any% <glitchless>", config, sources)
}

async fn get_body(state: AppState, uri: &str) -> (StatusCode, String) {
    let response = create_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_index_page_has_placeholder_container() {
    let state = test_state(Arc::new(AtomicI64::new(0))).with_placeholder("Loading notes...");
    let (status, body) = get_body(state, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"<div id="splits">Loading notes...</div>"#));
    assert!(body.contains("<title>any% &lt;glitchless&gt;</title>"));
    assert!(body.contains("/static/streamlistener.js"));
}

#[tokio::test]
async fn test_index_page_uses_display_settings() {
    let style = PageStyle {
        font_size: 28.0,
        font_color: "#ffffffff".to_string(),
        background_color: "#00000080".to_string(),
    };
    let state = test_state(Arc::new(AtomicI64::new(0))).with_style(style);
    let (_, body) = get_body(state, "/").await;

    assert!(body.contains("font-size: 28px"));
    assert!(body.contains("color: #ffffffff"));
    assert!(body.contains("background: #00000080"));
    assert!(body.contains(r#"href="/static/notes.css""#));
}

#[tokio::test]
async fn test_custom_template_and_stylesheet() {
    let state = test_state(Arc::new(AtomicI64::new(0)))
        .with_template("<h1>{{title}}</h1><style>{{style}}</style><main>{{placeholder}}</main>")
        .with_stylesheet("h2 { color: red; }");

    let (status, body) = get_body(state.clone(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("<h1>any% &lt;glitchless&gt;</h1><style>body {"));
    assert!(body.ends_with("<main>Loading...</main>"));

    let (status, css) = get_body(state, "/static/notes.css").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(css, "h2 { color: red; }");
}

#[tokio::test]
async fn test_listener_script_is_served() {
    let (status, body) = get_body(test_state(Arc::new(AtomicI64::new(0))), "/static/streamlistener.js").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("new EventSource(\"splits\")"));
    assert!(body.contains("if (e.data)"));
}

#[tokio::test]
async fn test_note_assets_served_from_asset_dir() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("route.svg"), "<svg/>").unwrap();

    let state = test_state(Arc::new(AtomicI64::new(0))).with_asset_dir(temp_dir.path());
    let (status, body) = get_body(state.clone(), "/route.svg").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<svg/>");

    let (status, _) = get_body(state, "/missing.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_listener_follows_live_split_changes() {
    let index = Arc::new(AtomicI64::new(-1));
    let app = create_router(test_state(index.clone()));

    let socket = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(socket, app).await.unwrap();
    });

    let container = MemoryContainer::new();
    let url = format!("http://{}/splits", addr);
    let listen_container = container.clone();
    let listen = tokio::spawn(async move {
        let mut listener = StreamListener::new(listen_container);
        listener.listen(&url).await
    });

    wait_for(&container, "Grab the key").await;
    index.store(1, Ordering::SeqCst);
    wait_for(&container, "Boss: hit twice").await;
    index.store(9, Ordering::SeqCst);
    wait_for(&container, "End of Notes.").await;

    listen.abort();
}

async fn wait_for(container: &MemoryContainer, expected: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while container.content() != expected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "container never showed {:?}, last saw {:?}",
            expected,
            container.content()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
