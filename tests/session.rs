//! Session driver integration tests
//!
//! The driver runs on a paused clock, so resume delays elapse instantly
//! while still being measurable.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use voicebot::session::{FALLBACK_REPLY, Phase, SessionDriver, SessionHandle, TurnTiming};

mod common;
use common::{MockCapture, MockOutput, ScriptedFetcher, wait_for};

fn driver(
    fetcher: ScriptedFetcher,
) -> (SessionDriver, SessionHandle, MockCapture, MockOutput) {
    let capture = MockCapture::new();
    let output = MockOutput::new();
    let (driver, handle) = SessionDriver::new(
        TurnTiming::default(),
        Box::new(capture.clone()),
        Arc::new(fetcher),
        Box::new(output.clone()),
    );
    (driver, handle, capture, output)
}

#[tokio::test(start_paused = true)]
async fn test_successful_turn_cycles_back_to_listening() {
    let fetcher = ScriptedFetcher::new()
        .reply("hello", "Hi there!", &[1, 2, 3])
        .delay(Duration::from_millis(500));
    let sent = fetcher.sent();
    let (driver, handle, capture, output) = driver(fetcher);

    let script = async {
        let mut rx = handle.subscribe();
        handle.start().unwrap();
        let listening = wait_for(&mut rx, |s| s.phase == Phase::Listening).await;

        capture.sink().interim("hel");
        let interim = wait_for(&mut rx, |s| s.transcript == "hel").await;
        assert_eq!(interim.phase, Phase::Listening);

        capture.sink().final_result("hello");
        wait_for(&mut rx, |s| s.phase == Phase::AwaitingReply).await;
        assert_eq!(capture.stops(), 1);

        let speaking = wait_for(&mut rx, |s| s.phase == Phase::Speaking).await;
        assert_eq!(speaking.last_reply.as_deref(), Some("Hi there!"));
        assert_eq!(speaking.history.len(), 1);
        assert_eq!(speaking.history[0].user, "hello");
        assert_eq!(speaking.history[0].bot, "Hi there!");
        assert_eq!(output.played().len(), 1);
        assert_eq!(output.played()[0].as_bytes(), &[1, 2, 3]);

        let ended_at = Instant::now();
        output.sink().ended();
        wait_for(&mut rx, |s| s.phase == Phase::Idle && s.resume_pending).await;

        let relistening = wait_for(&mut rx, |s| {
            s.phase == Phase::Listening && s.generation > listening.generation
        })
        .await;
        assert!(ended_at.elapsed() >= Duration::from_secs(1));
        assert_eq!(relistening.history.len(), 1);
        assert!(relistening.transcript.is_empty());
        assert_eq!(capture.starts(), 2);

        handle.shutdown().unwrap();
    };

    let (result, ()) = tokio::join!(driver.run(), script);
    result.unwrap();
    assert_eq!(*sent.lock().unwrap(), vec!["hello".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_reply_shows_fallback_and_retries() {
    let fetcher = ScriptedFetcher::new().reject("test", "500 Internal Server Error");
    let (driver, handle, capture, output) = driver(fetcher);

    let script = async {
        let mut rx = handle.subscribe();
        handle.start().unwrap();
        let listening = wait_for(&mut rx, |s| s.phase == Phase::Listening).await;

        capture.sink().final_result("test");
        let erroring = wait_for(&mut rx, |s| s.phase == Phase::Erroring).await;
        let failed_at = Instant::now();
        assert_eq!(erroring.last_reply.as_deref(), Some(FALLBACK_REPLY));
        assert!(erroring.history.is_empty());
        assert!(erroring.notice.is_some());

        let relistening = wait_for(&mut rx, |s| {
            s.phase == Phase::Listening && s.generation > listening.generation
        })
        .await;
        assert!(failed_at.elapsed() >= Duration::from_secs(2));
        assert!(relistening.history.is_empty());
        assert!(output.played().is_empty());

        handle.shutdown().unwrap();
    };

    let (result, ()) = tokio::join!(driver.run(), script);
    result.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_listening_goes_idle() {
    let (driver, handle, capture, _output) = driver(ScriptedFetcher::new());

    let script = async {
        let mut rx = handle.subscribe();
        handle.start().unwrap();
        wait_for(&mut rx, |s| s.phase == Phase::Listening).await;

        handle.stop().unwrap();
        let idle = wait_for(&mut rx, |s| s.phase == Phase::Idle).await;
        assert!(!idle.resume_pending);
        assert_eq!(capture.stops(), 1);

        // Nothing restarts on its own
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.snapshot().phase, Phase::Idle);
        assert_eq!(capture.starts(), 1);

        handle.shutdown().unwrap();
    };

    let (result, ()) = tokio::join!(driver.run(), script);
    result.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_speaking_releases_audio() {
    let fetcher = ScriptedFetcher::new().reply("hello", "Hi there!", &[9; 16]);
    let (driver, handle, capture, output) = driver(fetcher);

    let script = async {
        let mut rx = handle.subscribe();
        handle.start().unwrap();
        wait_for(&mut rx, |s| s.phase == Phase::Listening).await;
        capture.sink().final_result("hello");
        wait_for(&mut rx, |s| s.phase == Phase::Speaking).await;

        let stale_sink = output.sink();
        handle.stop().unwrap();
        wait_for(&mut rx, |s| s.phase == Phase::Idle).await;
        assert_eq!(output.stops(), 1);

        // A late `ended` from the stopped playback must not schedule a resume
        stale_sink.ended();
        tokio::time::sleep(Duration::from_secs(5)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert!(!snapshot.resume_pending);
        assert_eq!(snapshot.history.len(), 1);

        handle.shutdown().unwrap();
    };

    let (result, ()) = tokio::join!(driver.run(), script);
    result.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reset_discards_in_flight_reply() {
    let fetcher = ScriptedFetcher::new()
        .reply("hello", "Hi there!", &[1])
        .reply("slow", "too late", &[2])
        .delay(Duration::from_secs(3));
    let sent = fetcher.sent();
    let (driver, handle, capture, output) = driver(fetcher);

    let script = async {
        let mut rx = handle.subscribe();
        handle.start().unwrap();
        wait_for(&mut rx, |s| s.phase == Phase::Listening).await;

        // Complete one turn so there is history to clear
        capture.sink().final_result("hello");
        wait_for(&mut rx, |s| s.phase == Phase::Speaking).await;
        output.sink().ended();
        let second = wait_for(&mut rx, |s| s.phase == Phase::Listening && s.history.len() == 1).await;

        let old_sink = capture.sink();
        old_sink.final_result("slow");
        wait_for(&mut rx, |s| s.phase == Phase::AwaitingReply).await;

        handle.reset().unwrap();
        let reset = wait_for(&mut rx, |s| {
            s.phase == Phase::Listening && s.generation > second.generation && s.history.is_empty()
        })
        .await;
        assert!(reset.last_reply.is_none());

        // Events from the pre-reset capture are ignored
        old_sink.final_result("ghost");
        tokio::time::sleep(Duration::from_secs(10)).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.phase, Phase::Listening);
        assert_eq!(snapshot.generation, reset.generation);
        assert!(snapshot.history.is_empty());
        assert_eq!(output.played().len(), 1);

        handle.shutdown().unwrap();
    };

    let (result, ()) = tokio::join!(driver.run(), script);
    result.unwrap();
    assert_eq!(
        *sent.lock().unwrap(),
        vec!["hello".to_string(), "slow".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_blank_final_transcript_sends_nothing() {
    let fetcher = ScriptedFetcher::new();
    let sent = fetcher.sent();
    let (driver, handle, capture, _output) = driver(fetcher);

    let script = async {
        let mut rx = handle.subscribe();
        handle.start().unwrap();
        wait_for(&mut rx, |s| s.phase == Phase::Listening).await;

        capture.sink().final_result("   ");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.snapshot().phase, Phase::Listening);

        // Recognition then ends without a usable result and retries
        capture.sink().ended();
        wait_for(&mut rx, |s| s.phase == Phase::Idle && s.resume_pending).await;
        wait_for(&mut rx, |s| s.phase == Phase::Listening).await;
        assert_eq!(capture.starts(), 2);

        handle.shutdown().unwrap();
    };

    let (result, ()) = tokio::join!(driver.run(), script);
    result.unwrap();
    assert!(sent.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_capture_start_failure_retries() {
    let (driver, handle, capture, _output) = driver(ScriptedFetcher::new());
    capture.fail_next_starts(1);

    let script = async {
        let mut rx = handle.subscribe();
        let started_at = Instant::now();
        handle.start().unwrap();

        let retrying = wait_for(&mut rx, |s| s.resume_pending).await;
        assert_eq!(retrying.phase, Phase::Idle);
        assert!(retrying.notice.as_deref().unwrap_or_default().contains("device busy"));

        wait_for(&mut rx, |s| s.phase == Phase::Listening && !s.resume_pending).await;
        assert!(started_at.elapsed() >= Duration::from_secs(2));
        assert_eq!(capture.starts(), 2);

        handle.shutdown().unwrap();
    };

    let (result, ()) = tokio::join!(driver.run(), script);
    result.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_handle_fails_after_shutdown() {
    let (driver, handle, capture, _output) = driver(ScriptedFetcher::new());

    let script = async {
        let mut rx = handle.subscribe();
        handle.start().unwrap();
        wait_for(&mut rx, |s| s.phase == Phase::Listening).await;
        handle.shutdown().unwrap();
    };

    let (result, ()) = tokio::join!(driver.run(), script);
    result.unwrap();

    // Teardown stopped the live capture
    assert_eq!(capture.stops(), 1);
    assert!(handle.start().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_pause_holds_playback_until_resumed() {
    let fetcher = ScriptedFetcher::new().reply("hello", "Hi there!", &[7; 8]);
    let (driver, handle, capture, output) = driver(fetcher);

    let script = async {
        let mut rx = handle.subscribe();

        // Nothing is playing yet
        handle.pause().unwrap();
        handle.start().unwrap();
        wait_for(&mut rx, |s| s.phase == Phase::Listening).await;
        assert_eq!(output.pauses(), 0);

        capture.sink().final_result("hello");
        wait_for(&mut rx, |s| s.phase == Phase::Speaking).await;

        handle.pause().unwrap();
        wait_for(&mut rx, |s| s.notice.as_deref() == Some("Paused")).await;
        assert_eq!(output.pauses(), 1);

        // A held playback never resumes capture on its own
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.snapshot().phase, Phase::Speaking);
        assert_eq!(capture.starts(), 1);

        handle.resume().unwrap();
        wait_for(&mut rx, |s| s.notice.is_none()).await;
        assert_eq!(output.resumes(), 1);

        output.sink().ended();
        wait_for(&mut rx, |s| s.phase == Phase::Listening && s.history.len() == 1).await;

        handle.shutdown().unwrap();
    };

    let (result, ()) = tokio::join!(driver.run(), script);
    result.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_start_cuts_short_failed_reply_wait() {
    let fetcher = ScriptedFetcher::new().reject("test", "500 Internal Server Error");
    let (driver, handle, capture, _output) = driver(fetcher);

    let script = async {
        let mut rx = handle.subscribe();
        handle.start().unwrap();
        wait_for(&mut rx, |s| s.phase == Phase::Listening).await;

        capture.sink().final_result("test");
        wait_for(&mut rx, |s| s.phase == Phase::Erroring).await;
        let pressed_at = Instant::now();

        handle.start().unwrap();
        let listening = wait_for(&mut rx, |s| s.phase == Phase::Listening).await;
        assert!(pressed_at.elapsed() < Duration::from_secs(2));
        assert!(!listening.resume_pending);

        // The cancelled resume must not start a second capture
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(capture.starts(), 2);

        handle.shutdown().unwrap();
    };

    let (result, ()) = tokio::join!(driver.run(), script);
    result.unwrap();
}
