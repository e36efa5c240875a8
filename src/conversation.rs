//! Conversation orchestration: session lifecycle, turn bookkeeping, and
//! teardown.
//!
//! The state machine is `Initializing -> Connecting -> Active -> Closed`,
//! with failure edges to `PermissionDenied` and `Error`. Both failure states
//! are terminal for the attempt: nothing auto-retries, the user exits and
//! re-enters.

use tokio::signal;
use tokio::sync::mpsc;

use crate::audio::playback::{OutputSink, PlaybackScheduler, SourceId};
use crate::audio::{AlsaSink, CapturePipeline};
use crate::config::Config;
use crate::error::CaptureError;
use crate::protocol::{AudioChunk, OUTPUT_SAMPLE_RATE};
use crate::session::{LiveSession, SessionCommand, SessionEvent};
use crate::turns::{Assembled, HistoryTurn, LiveTranscript, TurnAssembler};

/// Shown when microphone acquisition fails.
pub const PERMISSION_HELP: &str = "Microphone access was denied or the device is unavailable. \
Check your audio input settings, then start the conversation again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationStatus {
    Initializing,
    Connecting,
    Active,
    PermissionDenied,
    Error,
    Closed,
}

impl ConversationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConversationStatus::PermissionDenied | ConversationStatus::Error | ConversationStatus::Closed
        )
    }
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ConversationStatus::Initializing => "initializing",
            ConversationStatus::Connecting => "connecting",
            ConversationStatus::Active => "live",
            ConversationStatus::PermissionDenied => "microphone unavailable",
            ConversationStatus::Error => "connection error",
            ConversationStatus::Closed => "closed",
        };
        f.write_str(text)
    }
}

/// What changed after applying one event; the caller refreshes its display
/// accordingly.
#[derive(Debug, PartialEq, Eq)]
pub enum Update {
    None,
    Live,
    Archived,
    Status,
}

/// One conversation attempt. Owns the status, live transcript, turn history
/// and the playback scheduler; other components only feed it events.
pub struct Conversation<S: OutputSink> {
    status: ConversationStatus,
    status_detail: Option<String>,
    assembler: TurnAssembler,
    history: Vec<HistoryTurn>,
    scheduler: Option<PlaybackScheduler<S>>,
    make_sink: Box<dyn FnMut() -> anyhow::Result<S> + Send>,
}

impl<S: OutputSink> Conversation<S> {
    pub fn new(make_sink: impl FnMut() -> anyhow::Result<S> + Send + 'static) -> Self {
        Self {
            status: ConversationStatus::Initializing,
            status_detail: None,
            assembler: TurnAssembler::new(),
            history: Vec::new(),
            scheduler: None,
            make_sink: Box::new(make_sink),
        }
    }

    pub fn status(&self) -> ConversationStatus {
        self.status
    }

    /// Detail line for the Error status, when the transport reported one.
    pub fn status_detail(&self) -> Option<&str> {
        self.status_detail.as_deref()
    }

    pub fn live(&self) -> &LiveTranscript {
        self.assembler.live()
    }

    pub fn history(&self) -> &[HistoryTurn] {
        &self.history
    }

    pub fn mark_connecting(&mut self) {
        if self.status == ConversationStatus::Initializing {
            self.status = ConversationStatus::Connecting;
        }
    }

    /// Microphone denial. Terminal; no session is opened after this.
    pub fn permission_denied(&mut self, reason: impl Into<String>) {
        if !self.status.is_terminal() {
            self.status = ConversationStatus::PermissionDenied;
            self.status_detail = Some(reason.into());
        }
    }

    /// A local failure outside the transport (capture stream, sink setup).
    pub fn fail(&mut self, reason: impl Into<String>) {
        if !self.status.is_terminal() {
            self.status = ConversationStatus::Error;
            self.status_detail = Some(reason.into());
        }
    }

    pub fn on_session_event(&mut self, event: SessionEvent) -> Update {
        match event {
            SessionEvent::Opened => {
                if self.status == ConversationStatus::Connecting {
                    self.status = ConversationStatus::Active;
                    log::info!("session open, conversation live");
                    return Update::Status;
                }
                Update::None
            }
            SessionEvent::Inbound(inbound) => match self.assembler.apply(inbound) {
                Ok(Assembled::Live) => Update::Live,
                Ok(Assembled::Audio(buffer)) => {
                    if let Some(scheduler) = self.ensure_playback() {
                        scheduler.schedule_fragment(buffer);
                    }
                    Update::None
                }
                Ok(Assembled::Completed(turn)) => {
                    if let Some(turn) = turn {
                        self.history.push(turn);
                        Update::Archived
                    } else {
                        Update::None
                    }
                }
                Ok(Assembled::Interrupted) => {
                    log::info!("barge-in, discarding queued audio");
                    if let Some(scheduler) = self.scheduler.as_mut() {
                        scheduler.hard_stop();
                    }
                    Update::None
                }
                Err(e) => {
                    // One malformed fragment; drop it and keep going.
                    log::warn!("dropping fragment: {}", e);
                    Update::None
                }
            },
            SessionEvent::Closed => {
                if !self.status.is_terminal() {
                    self.status = ConversationStatus::Closed;
                    self.halt_playback();
                    return Update::Status;
                }
                Update::None
            }
            SessionEvent::Errored(reason) => {
                if !self.status.is_terminal() {
                    log::error!("session error: {}", reason);
                    self.status = ConversationStatus::Error;
                    self.status_detail = Some(reason);
                    self.halt_playback();
                    return Update::Status;
                }
                Update::None
            }
        }
    }

    /// A scheduled source finished playing on its own.
    pub fn source_ended(&mut self, id: SourceId) {
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.source_ended(id);
        }
    }

    /// Release everything. Safe to call repeatedly and at any lifecycle
    /// point, including before the session ever opened.
    pub fn teardown(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.hard_stop();
        }
        self.assembler.reset();
        if !self.status.is_terminal() {
            self.status = ConversationStatus::Closed;
        }
    }

    /// The output sink is created on the first fragment and reused for the
    /// rest of the conversation.
    fn ensure_playback(&mut self) -> Option<&mut PlaybackScheduler<S>> {
        if self.scheduler.is_none() {
            match (self.make_sink)() {
                Ok(sink) => self.scheduler = Some(PlaybackScheduler::new(sink)),
                Err(e) => {
                    log::error!("output sink unavailable: {}", e);
                    return None;
                }
            }
        }
        self.scheduler.as_mut()
    }

    fn halt_playback(&mut self) {
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.hard_stop();
        }
    }
}

/// Run one live voice conversation until the user exits or the session
/// ends.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let (chunk_tx, mut chunk_rx) = mpsc::channel::<AudioChunk>(config.audio.outbound_queue);
    let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(256);
    let (cmd_tx, cmd_rx) = mpsc::channel::<SessionCommand>(256);
    let (ended_tx, mut ended_rx) = mpsc::unbounded_channel::<SourceId>();

    let playback_device = config.audio.playback_device.clone();
    let mut conversation = Conversation::new(move || {
        AlsaSink::start(&playback_device, OUTPUT_SAMPLE_RATE, ended_tx.clone())
    });
    print_status(&conversation);

    // Microphone first: a denial must surface before any session exists.
    let mut capture = match CapturePipeline::start(&config.audio, chunk_tx) {
        Ok(capture) => capture,
        Err(CaptureError::PermissionDenied(reason)) => {
            conversation.permission_denied(reason);
            print_status(&conversation);
            println!("{}", PERMISSION_HELP);
            return Ok(());
        }
        Err(e) => {
            conversation.fail(e.to_string());
            print_status(&conversation);
            return Ok(());
        }
    };

    conversation.mark_connecting();
    print_status(&conversation);

    let session = LiveSession::new(config.session.clone(), event_tx, cmd_rx);
    let session_task = tokio::spawn(session.run());

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                log::info!("exit requested");
                break;
            }

            Some(chunk) = chunk_rx.recv() => {
                // Fire-and-forget toward the session; capture never waits.
                if cmd_tx.try_send(SessionCommand::SendAudio(chunk)).is_err() {
                    log::warn!("session send queue full, dropping audio chunk");
                }
            }

            Some(event) = event_rx.recv() => {
                match conversation.on_session_event(event) {
                    Update::Live => {
                        let live = conversation.live();
                        println!("you:   {}", live.user);
                        println!("model: {}", live.model);
                    }
                    Update::Archived => {
                        if let Some(turn) = conversation.history().last() {
                            println!("--- turn {} archived: {:?} / {:?}",
                                conversation.history().len(), turn.user, turn.model);
                        }
                    }
                    Update::Status => print_status(&conversation),
                    Update::None => {}
                }
                if conversation.status().is_terminal() {
                    break;
                }
            }

            Some(id) = ended_rx.recv() => {
                conversation.source_ended(id);
            }
        }
    }

    // Teardown, idempotent and safe on partially-initialized state: close
    // the session even if it already errored, stop capture, drop the sink.
    let _ = cmd_tx.try_send(SessionCommand::Close);
    drop(cmd_tx);
    capture.stop();
    conversation.teardown();
    let _ = session_task.await;

    print_status(&conversation);
    Ok(())
}

fn print_status<S: OutputSink>(conversation: &Conversation<S>) {
    match conversation.status_detail() {
        Some(detail) if conversation.status() != ConversationStatus::Closed => {
            println!("status: {} ({})", conversation.status(), detail);
        }
        _ => println!("status: {}", conversation.status()),
    }
}
