//! Voice client against an in-process relay
//!
//! Binds the relay on an ephemeral port and talks to it over real HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};
use voicebot::client::{ConsoleCapture, HttpReplyFetcher, MutedOutput, read_commands};
use voicebot::session::{Phase, ReplyFetcher, SessionDriver, TurnTiming};
use voicebot::Error;

mod common;
use common::{MockChatModel, MockSynthesizer, test_server, wait_for};

async fn spawn_relay(llm: MockChatModel, tts: MockSynthesizer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = test_server(llm, tts);
    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });
    addr
}

fn fetcher(addr: SocketAddr) -> HttpReplyFetcher {
    HttpReplyFetcher::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_fetcher_decodes_reply() {
    let addr = spawn_relay(
        MockChatModel::with_reply("hello", "Hi there!"),
        MockSynthesizer::returning(&[0xFF, 0xF3, 0x44, 0xC4]),
    )
    .await;

    let reply = assert_ok!(fetcher(addr).send("hello").await);
    assert_eq!(reply.text, "Hi there!");
    assert_eq!(reply.audio.as_bytes(), &[0xFF, 0xF3, 0x44, 0xC4]);
}

#[tokio::test]
async fn test_fetcher_surfaces_validation_error() {
    let addr = spawn_relay(MockChatModel::default(), MockSynthesizer::returning(b"x")).await;

    let err = assert_err!(fetcher(addr).send("   ").await);
    match err {
        Error::Reply(message) => {
            assert!(message.contains("400"), "{message}");
            assert!(message.contains("Text must be between 1 and 1000 characters"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_fetcher_surfaces_upstream_failure() {
    let addr = spawn_relay(MockChatModel::failing(), MockSynthesizer::returning(b"x")).await;

    let err = assert_err!(fetcher(addr).send("test").await);
    assert!(err.to_string().contains("LLM or TTS failed"), "{err}");
}

#[tokio::test]
async fn test_fetcher_reports_unreachable_backend() {
    // Bind then drop to get a port nothing listens on
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let err = assert_err!(fetcher(addr).send("hello").await);
    assert!(matches!(err, Error::Http(_)), "{err}");
}

#[tokio::test]
async fn test_typed_conversation_end_to_end() {
    let addr = spawn_relay(
        MockChatModel::with_reply("hello", "Hi there!"),
        MockSynthesizer::returning(&[1, 2, 3]),
    )
    .await;

    let console = ConsoleCapture::new();
    let timing = TurnTiming {
        recognition_retry: Duration::from_millis(50),
        reply_failure_resume: Duration::from_millis(50),
        playback_resume: Duration::from_millis(50),
    };
    let (driver, handle) = SessionDriver::new(
        timing,
        Box::new(console.clone()),
        Arc::new(fetcher(addr)),
        Box::new(MutedOutput),
    );

    let (lines_tx, lines_rx) = tokio::sync::mpsc::unbounded_channel();
    let reader = read_commands(lines_rx, handle.clone(), Some(console.clone()));

    let script = async {
        let mut rx = handle.subscribe();
        lines_tx.send("/start".to_string()).unwrap();
        wait_for(&mut rx, |s| s.phase == Phase::Listening).await;

        lines_tx.send("hello".to_string()).unwrap();
        let done = wait_for(&mut rx, |s| s.history.len() == 1 && s.phase == Phase::Listening).await;
        assert_eq!(done.history[0].user, "hello");
        assert_eq!(done.history[0].bot, "Hi there!");
        assert!(console.is_listening());

        lines_tx.send("/quit".to_string()).unwrap();
    };

    let (driver_result, reader_result, ()) = tokio::join!(driver.run(), reader, script);
    driver_result.unwrap();
    reader_result.unwrap();
}
