//! Terminal front end: typed input and a status display
//!
//! Lines starting with `/` control the session; any other line is handed to
//! the active capture as a final transcript.

use std::io::BufRead;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};

use crate::Result;
use crate::session::{CaptureSink, Command, Phase, SessionHandle, SessionSnapshot, SpeechCapture};

/// One parsed line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    Command(Command),
    Text(String),
    Unknown(String),
    Empty,
}

/// Parse a console line
#[must_use]
pub fn parse_line(line: &str) -> ConsoleLine {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleLine::Empty;
    }

    let Some(command) = line.strip_prefix('/') else {
        return ConsoleLine::Text(line.to_string());
    };

    match command.trim().to_lowercase().as_str() {
        "start" | "listen" => ConsoleLine::Command(Command::Start),
        "stop" => ConsoleLine::Command(Command::Stop),
        "reset" | "clear" => ConsoleLine::Command(Command::Reset),
        "pause" => ConsoleLine::Command(Command::Pause),
        "resume" | "play" => ConsoleLine::Command(Command::Resume),
        "quit" | "exit" | "q" => ConsoleLine::Command(Command::Shutdown),
        other => ConsoleLine::Unknown(other.to_string()),
    }
}

/// Capture adapter fed by typed lines
///
/// Cloning yields another handle to the same capture slot; the console
/// reader keeps one to deliver text while the driver owns the other.
#[derive(Debug, Clone, Default)]
pub struct ConsoleCapture {
    active: Arc<Mutex<Option<CaptureSink>>>,
}

impl ConsoleCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a capture session is waiting for text
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.active.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Deliver typed text as the final transcript of the active session
    ///
    /// Returns `false` when nothing is listening.
    pub fn submit(&self, text: &str) -> bool {
        let sink = self.active.lock().ok().and_then(|mut slot| slot.take());
        match sink {
            Some(sink) => {
                sink.final_result(text);
                true
            }
            None => false,
        }
    }
}

impl SpeechCapture for ConsoleCapture {
    fn start(&mut self, sink: CaptureSink) -> Result<()> {
        sink.started();
        if let Ok(mut slot) = self.active.lock() {
            *slot = Some(sink);
        }
        Ok(())
    }

    fn stop(&mut self) {
        if let Ok(mut slot) = self.active.lock() {
            slot.take();
        }
    }
}

/// Read stdin on a dedicated thread, one message per line
///
/// The channel closes at EOF. The thread is detached and never joined.
#[must_use]
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read stdin");
                    break;
                }
            }
        }
    });
    rx
}

/// Forward input lines to the session until they run out or `/quit`
///
/// # Errors
///
/// Returns error if the session has stopped
pub async fn read_commands(
    mut lines: mpsc::UnboundedReceiver<String>,
    handle: SessionHandle,
    capture: Option<ConsoleCapture>,
) -> Result<()> {
    while let Some(line) = lines.recv().await {
        match parse_line(&line) {
            ConsoleLine::Command(Command::Start) => handle.start()?,
            ConsoleLine::Command(Command::Stop) => handle.stop()?,
            ConsoleLine::Command(Command::Reset) => handle.reset()?,
            ConsoleLine::Command(Command::Pause) => handle.pause()?,
            ConsoleLine::Command(Command::Resume) => handle.resume()?,
            ConsoleLine::Command(Command::Shutdown) => break,
            ConsoleLine::Text(text) => {
                let delivered = capture.as_ref().is_some_and(|c| c.submit(&text));
                if !delivered {
                    println!("(not listening; type /start)");
                }
            }
            ConsoleLine::Unknown(command) => {
                println!("unknown command /{command}; try /start, /stop, /pause, /resume, /reset or /quit");
            }
            ConsoleLine::Empty => {}
        }
    }

    tracing::debug!("console input closed");
    let _ = handle.shutdown();
    Ok(())
}

/// Describe what changed between two snapshots, one display line each
#[must_use]
pub fn render_changes(previous: &SessionSnapshot, current: &SessionSnapshot) -> Vec<String> {
    let mut lines = Vec::new();

    if current.history.len() < previous.history.len() {
        lines.push("-- conversation cleared --".to_string());
    }

    if current.phase != previous.phase {
        lines.push(format!("[{}]", current.phase.label()));
    }

    if current.transcript != previous.transcript
        && !current.transcript.trim().is_empty()
        && current.phase == Phase::Listening
    {
        lines.push(format!("  ... {}", current.transcript.trim()));
    }

    if current.history.len() > previous.history.len() {
        for turn in &current.history[previous.history.len()..] {
            lines.push(format!("you: {}", turn.user));
            lines.push(format!("bot: {}", turn.bot));
        }
    } else if current.last_reply != previous.last_reply {
        if let Some(reply) = &current.last_reply {
            lines.push(format!("bot: {reply}"));
        }
    }

    if current.notice != previous.notice {
        if let Some(notice) = &current.notice {
            lines.push(format!("  ({notice})"));
        }
    }

    lines
}

/// Print snapshot changes until the session ends
pub async fn print_snapshots(mut snapshots: watch::Receiver<SessionSnapshot>) {
    let mut previous = snapshots.borrow_and_update().clone();
    println!("[{}]", previous.phase.label());

    while snapshots.changed().await.is_ok() {
        let current = snapshots.borrow_and_update().clone();
        for line in render_changes(&previous, &current) {
            println!("{line}");
        }
        previous = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{CaptureEvent, Generation, Input, Turn, TurnController, TurnTiming};

    #[test]
    fn parses_commands_and_text() {
        assert_eq!(parse_line("/start"), ConsoleLine::Command(Command::Start));
        assert_eq!(parse_line(" /STOP "), ConsoleLine::Command(Command::Stop));
        assert_eq!(parse_line("/reset"), ConsoleLine::Command(Command::Reset));
        assert_eq!(parse_line("/pause"), ConsoleLine::Command(Command::Pause));
        assert_eq!(parse_line("/resume"), ConsoleLine::Command(Command::Resume));
        assert_eq!(parse_line("/quit"), ConsoleLine::Command(Command::Shutdown));
        assert_eq!(parse_line("  hello  "), ConsoleLine::Text("hello".to_string()));
        assert_eq!(parse_line("/dance"), ConsoleLine::Unknown("dance".to_string()));
        assert_eq!(parse_line("   "), ConsoleLine::Empty);
    }

    #[test]
    fn submit_delivers_once_per_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut capture = ConsoleCapture::new();
        let typist = capture.clone();
        assert!(!typist.submit("too early"));

        capture
            .start(CaptureSink::new(Generation::default(), tx))
            .unwrap();
        assert!(typist.is_listening());
        assert!(typist.submit("hello"));
        assert!(!typist.submit("again"));

        let mut events = Vec::new();
        while let Ok(Input::Capture { event, .. }) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![CaptureEvent::Started, CaptureEvent::Final("hello".to_string())]
        );
    }

    #[test]
    fn stop_clears_the_slot() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut capture = ConsoleCapture::new();
        capture
            .start(CaptureSink::new(Generation::default(), tx))
            .unwrap();
        capture.stop();
        assert!(!capture.is_listening());
    }

    #[test]
    fn renders_phase_and_new_turns() {
        let before = TurnController::new(TurnTiming::default()).snapshot();
        let mut after = before.clone();
        after.phase = Phase::Speaking;
        after.history.push(Turn::new("hello", "Hi there!"));
        after.last_reply = Some("Hi there!".to_string());

        let lines = render_changes(&before, &after);
        assert_eq!(lines, vec!["[Speaking]", "you: hello", "bot: Hi there!"]);
    }

    #[test]
    fn renders_fallback_reply_without_turn() {
        let before = TurnController::new(TurnTiming::default()).snapshot();
        let mut after = before.clone();
        after.phase = Phase::Erroring;
        after.last_reply = Some("Sorry".to_string());

        let lines = render_changes(&before, &after);
        assert_eq!(lines, vec!["[Error]", "bot: Sorry"]);
    }
}
