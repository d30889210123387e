//! Session driver: runs the turn controller against real adapters
//!
//! The driver owns a single input queue. Adapter sinks, reply tasks and
//! resume timers all feed that queue, and the driver hands inputs to the
//! controller strictly in arrival order.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::adapters::{
    AudioOutput, CaptureEvent, CaptureSink, PlaybackEvent, PlaybackSink, ReplyFetcher,
    SpeechCapture,
};
use super::controller::{Effect, Input, SessionSnapshot, TurnController, TurnTiming};
use crate::{Error, Result};

/// External control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Reset,
    Pause,
    Resume,
    Shutdown,
}

/// Cloneable handle for controlling a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Begin listening (manual trigger)
    ///
    /// # Errors
    ///
    /// Returns error if the driver has shut down
    pub fn start(&self) -> Result<()> {
        self.send(Command::Start)
    }

    /// Stop capture or playback immediately
    ///
    /// # Errors
    ///
    /// Returns error if the driver has shut down
    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    /// Clear history and restart capture
    ///
    /// # Errors
    ///
    /// Returns error if the driver has shut down
    pub fn reset(&self) -> Result<()> {
        self.send(Command::Reset)
    }

    /// Hold reply playback
    ///
    /// # Errors
    ///
    /// Returns error if the driver has shut down
    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    /// Continue held reply playback
    ///
    /// # Errors
    ///
    /// Returns error if the driver has shut down
    pub fn resume(&self) -> Result<()> {
        self.send(Command::Resume)
    }

    /// Ask the driver to exit its loop
    ///
    /// # Errors
    ///
    /// Returns error if the driver has already shut down
    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    /// Latest published snapshot
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every published snapshot
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::Session("session driver has stopped".to_string()))
    }
}

/// Executes controller effects and feeds adapter events back in
pub struct SessionDriver {
    controller: TurnController,
    capture: Box<dyn SpeechCapture>,
    fetcher: Arc<dyn ReplyFetcher>,
    output: Box<dyn AudioOutput>,
    inputs_tx: mpsc::UnboundedSender<Input>,
    inputs_rx: mpsc::UnboundedReceiver<Input>,
    commands_rx: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<SessionSnapshot>,
    reply_task: Option<JoinHandle<()>>,
    resume_task: Option<JoinHandle<()>>,
}

impl SessionDriver {
    /// Create a driver and the handle used to control it
    #[must_use]
    pub fn new(
        timing: TurnTiming,
        capture: Box<dyn SpeechCapture>,
        fetcher: Arc<dyn ReplyFetcher>,
        output: Box<dyn AudioOutput>,
    ) -> (Self, SessionHandle) {
        let controller = TurnController::new(timing);
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (snapshots, snapshots_rx) = watch::channel(controller.snapshot());

        let driver = Self {
            controller,
            capture,
            fetcher,
            output,
            inputs_tx,
            inputs_rx,
            commands_rx,
            snapshots,
            reply_task: None,
            resume_task: None,
        };
        let handle = SessionHandle {
            commands: commands_tx,
            snapshots: snapshots_rx,
        };
        (driver, handle)
    }

    /// Run until shutdown is requested or every handle is dropped
    ///
    /// # Errors
    ///
    /// Currently infallible; reserved for adapter teardown failures
    #[allow(clippy::future_not_send)]
    pub async fn run(mut self) -> Result<()> {
        tracing::debug!("session driver running");

        loop {
            tokio::select! {
                command = self.commands_rx.recv() => match command {
                    Some(Command::Start) => self.dispatch(Input::Start),
                    Some(Command::Stop) => self.dispatch(Input::Stop),
                    Some(Command::Reset) => self.dispatch(Input::Reset),
                    Some(Command::Pause) => self.dispatch(Input::PausePlayback),
                    Some(Command::Resume) => self.dispatch(Input::ResumePlayback),
                    Some(Command::Shutdown) | None => break,
                },
                Some(input) = self.inputs_rx.recv() => self.dispatch(input),
            }
        }

        self.teardown();
        tracing::debug!("session driver stopped");
        Ok(())
    }

    fn dispatch(&mut self, input: Input) {
        let before = self.controller.phase();
        let effects = self.controller.handle(input);
        let after = self.controller.phase();

        if before != after {
            tracing::debug!(
                from = ?before,
                to = ?after,
                generation = self.controller.generation().get(),
                "phase transition"
            );
        }

        for effect in effects {
            self.apply(effect);
        }

        self.snapshots.send_replace(self.controller.snapshot());
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::StartCapture { generation } => {
                let sink = CaptureSink::new(generation, self.inputs_tx.clone());
                if let Err(e) = self.capture.start(sink) {
                    tracing::warn!(error = %e, "capture failed to start");
                    let _ = self.inputs_tx.send(Input::Capture {
                        generation,
                        event: CaptureEvent::Error(e.to_string()),
                    });
                }
            }
            Effect::StopCapture => self.capture.stop(),
            Effect::SendReply { generation, text } => {
                if let Some(task) = self.reply_task.take() {
                    if !task.is_finished() {
                        tracing::warn!("previous reply request still running, aborting");
                        task.abort();
                    }
                }

                let fetcher = Arc::clone(&self.fetcher);
                let tx = self.inputs_tx.clone();
                self.reply_task = Some(tokio::spawn(async move {
                    let result = fetcher.send(&text).await.map_err(|e| e.to_string());
                    let _ = tx.send(Input::Reply { generation, result });
                }));
            }
            Effect::CancelReply => {
                if let Some(task) = self.reply_task.take() {
                    task.abort();
                }
            }
            Effect::Play { generation, audio } => {
                let sink = PlaybackSink::new(generation, self.inputs_tx.clone());
                if let Err(e) = self.output.play(audio, sink) {
                    tracing::warn!(error = %e, "playback failed to start");
                    let _ = self.inputs_tx.send(Input::Playback {
                        generation,
                        event: PlaybackEvent::Ended,
                    });
                }
            }
            Effect::PausePlayback => self.output.pause(),
            Effect::ResumePlayback => self.output.resume(),
            Effect::StopPlayback => self.output.stop(),
            Effect::ScheduleResume { generation, after } => {
                self.cancel_resume();
                let tx = self.inputs_tx.clone();
                self.resume_task = Some(tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = tx.send(Input::Resume { generation });
                }));
            }
            Effect::CancelResume => self.cancel_resume(),
        }
    }

    fn cancel_resume(&mut self) {
        if let Some(task) = self.resume_task.take() {
            task.abort();
        }
    }

    fn teardown(&mut self) {
        self.capture.stop();
        self.output.stop();
        if let Some(task) = self.reply_task.take() {
            task.abort();
        }
        self.cancel_resume();
    }
}
