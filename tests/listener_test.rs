use anyhow::Result;
use httpmock::prelude::*;
use splitnotes_stream::core::listener::DEFAULT_PLACEHOLDER;
use splitnotes_stream::domain::ports::Container;
use splitnotes_stream::{FileContainer, MemoryContainer, StreamListener};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[tokio::test]
async fn test_listener_applies_non_empty_payloads_in_order() {
    let server = MockServer::start();
    let stream_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/splits")
            .header("accept", "text/event-stream");
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(
                "data: <h2>Split 1</h2>\n\n\
                 :No update, keep connection\n\n\
                 data: <h2>Split 2</h2>\n\n\
                 data:\n\n",
            );
    });

    let container = MemoryContainer::new();
    let mut listener = StreamListener::new(container.clone());
    assert_eq!(container.content(), DEFAULT_PLACEHOLDER);

    let summary = listener.listen(&server.url("/splits")).await;

    stream_mock.assert();
    assert!(summary.error.is_none());
    assert_eq!(summary.events_received, 3);
    assert_eq!(summary.updates_applied, 2);
    assert_eq!(container.content(), "<h2>Split 2</h2>");
}

#[tokio::test]
async fn test_listener_error_status_keeps_placeholder() {
    let server = MockServer::start();
    let stream_mock = server.mock(|when, then| {
        when.method(GET).path("/splits");
        then.status(503);
    });

    let container = MemoryContainer::new();
    let mut listener = StreamListener::with_placeholder(container.clone(), "Waiting for notes");

    let summary = listener.listen(&server.url("/splits")).await;

    stream_mock.assert();
    assert!(summary.error.unwrap().contains("503"));
    assert_eq!(container.content(), "Waiting for notes");
}

#[tokio::test]
async fn test_listener_writes_updates_to_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = temp_dir.path().join("notes.html");

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/splits");
        then.status(200)
            .header("content-type", "text/event-stream")
            .body("data: Grab the key<br/>Skip the chest\n\n");
    });

    let mut listener = StreamListener::new(FileContainer::new(&output));
    assert_eq!(std::fs::read_to_string(&output)?, DEFAULT_PLACEHOLDER);

    listener.listen(&server.url("/splits")).await;

    assert_eq!(
        std::fs::read_to_string(&output)?,
        "Grab the key<br/>Skip the chest"
    );
    assert_eq!(
        listener.container().content(),
        "Grab the key<br/>Skip the chest"
    );
    Ok(())
}

#[tokio::test]
async fn test_listener_treats_empty_event_type_as_message() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/splits");
        then.status(200)
            .header("content-type", "text/event-stream")
            .body("event:\ndata: hello\n\n");
    });

    let container = MemoryContainer::new();
    let mut listener = StreamListener::new(container.clone());
    let summary = listener.listen(&server.url("/splits")).await;

    assert_eq!(summary.updates_applied, 1);
    assert_eq!(container.content(), "hello");
}

#[tokio::test]
async fn test_listener_stops_on_unterminated_oversized_line() {
    let server = MockServer::start();
    let body = format!("data: <p>kept</p>\n\ndata: {}", "x".repeat(4096));
    server.mock(|when, then| {
        when.method(GET).path("/splits");
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(body);
    });

    let container = MemoryContainer::new();
    let mut listener = StreamListener::new(container.clone()).with_max_line_len(1024);
    let summary = listener.listen(&server.url("/splits")).await;

    assert!(summary.error.unwrap().contains("without a terminator"));
    assert_eq!(summary.updates_applied, 1);
    assert_eq!(container.content(), "<p>kept</p>");
}

#[tokio::test]
async fn test_listener_reports_body_cut_mid_chunk() -> Result<()> {
    let socket = TcpListener::bind("127.0.0.1:0").await?;
    let addr = socket.local_addr()?;

    let server = tokio::spawn(async move {
        let (mut stream, _) = socket.accept().await?;
        // Request headers are small enough for one read.
        let mut request = [0u8; 1024];
        let n = stream.read(&mut request).await?;
        assert!(n > 0);

        stream
            .write_all(
                b"HTTP/1.1 200 OK\r\n\
                  content-type: text/event-stream\r\n\
                  transfer-encoding: chunked\r\n\r\n",
            )
            .await?;
        let event = b"data: <p>one</p>\n\n";
        stream
            .write_all(format!("{:x}\r\n", event.len()).as_bytes())
            .await?;
        stream.write_all(event).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        // Announce a chunk and hang up before it is complete.
        stream.write_all(b"40\r\ndata: <p>tw").await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok::<_, std::io::Error>(())
    });

    let container = MemoryContainer::new();
    let mut listener = StreamListener::new(container.clone());
    let summary = listener.listen(&format!("http://{}/splits", addr)).await;
    server.await??;

    assert!(summary.error.is_some());
    assert_eq!(summary.events_received, 1);
    assert_eq!(container.content(), "<p>one</p>");
    Ok(())
}
