//! The playback session state machine.
//!
//! ```text
//! Idle -> Loading -> Loaded -> Playing <-> Paused
//!   ^                  |          |          |
//!   +------ stop ------+----------+----------+
//! ```
//!
//! Any state may move to `Error` on a load or playback fault. The only way out
//! of `Error` is another `load` (or `stop`/`unload`, which return to `Idle`).
//! At most one engine resource is held at any time.

use crate::{AudioEngine, AudioHandle, EngineEvent};
use std::sync::Arc;
use threadist_core::{AudioError, CoreError, ErrorExt, SpeechSynthesizer, Story};
use tokio::sync::broadcast;
use tracing::{debug, warn};

const SNAPSHOT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Playing,
    Paused,
    Error,
}

impl PlaybackStatus {
    /// A resource is open and ready to play, seek or change speed.
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            PlaybackStatus::Loaded | PlaybackStatus::Playing | PlaybackStatus::Paused
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub status: PlaybackStatus,
    pub story: Option<Story>,
    /// Zero until the engine reports a duration.
    pub duration_ms: u64,
    pub position_ms: u64,
    pub speed: f32,
    /// User-facing description of the last fault while in `Error`.
    pub error: Option<String>,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Idle,
            story: None,
            duration_ms: 0,
            position_ms: 0,
            speed: 1.0,
            error: None,
        }
    }
}

impl PlaybackSnapshot {
    pub fn is_current_story(&self, story_id: &str) -> bool {
        self.story.as_ref().is_some_and(|story| story.id == story_id)
    }
}

pub struct PlaybackSession {
    engine: Arc<dyn AudioEngine>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    handle: Option<AudioHandle>,
    state: PlaybackSnapshot,
    last_error: Option<CoreError>,
    tx: broadcast::Sender<PlaybackSnapshot>,
}

impl PlaybackSession {
    pub fn new(engine: Arc<dyn AudioEngine>, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        let (tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        Self {
            engine,
            synthesizer,
            handle: None,
            state: PlaybackSnapshot::default(),
            last_error: None,
            tx,
        }
    }

    /// Receives a snapshot after every state change. Dropping the receiver
    /// has no effect on playback.
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> &PlaybackSnapshot {
        &self.state
    }

    pub fn status(&self) -> PlaybackStatus {
        self.state.status
    }

    pub fn handle(&self) -> Option<AudioHandle> {
        self.handle
    }

    /// The fault behind the current `Error` state, handed out once.
    pub fn take_error(&mut self) -> Option<CoreError> {
        self.last_error.take()
    }

    /// Synthesizes `text` and opens it as the session's only resource.
    ///
    /// Any resource already held is released first. Returns whether the
    /// session ended up `Loaded`; on failure it is in `Error` with no story.
    pub async fn load(&mut self, text: &str, voice_id: Option<&str>, story: Story) -> bool {
        self.release_current().await;
        self.last_error = None;

        self.state = PlaybackSnapshot {
            status: PlaybackStatus::Loading,
            story: Some(story),
            ..PlaybackSnapshot::default()
        };
        self.emit();

        let opened = match self.synthesizer.synthesize(text, voice_id).await {
            Ok(source) => self.engine.open(&source).await,
            Err(error) => Err(error),
        };

        match opened {
            Ok(handle) => {
                self.handle = Some(handle);
                self.state.status = PlaybackStatus::Loaded;
                debug!("Loaded audio {:?}", handle);
                self.emit();
                true
            }
            Err(error) => {
                let error = match error {
                    error @ (CoreError::ContentApi(_) | CoreError::InvalidInput { .. }) => error,
                    other => AudioError::LoadFailed {
                        reason: other.to_string(),
                    }
                    .into(),
                };
                self.enter_error(&error);
                self.last_error = Some(error);
                false
            }
        }
    }

    /// Starts or resumes playback. Does nothing unless `Loaded` or `Paused`.
    pub async fn play(&mut self) -> Result<(), CoreError> {
        if !matches!(
            self.state.status,
            PlaybackStatus::Loaded | PlaybackStatus::Paused
        ) {
            debug!("Ignoring play while {:?}", self.state.status);
            return Ok(());
        }
        let handle = self.require_handle()?;
        if let Err(error) = self.engine.play(handle).await {
            return Err(self.playback_fault(error).await);
        }
        self.transition(PlaybackStatus::Playing);
        Ok(())
    }

    /// Pauses playback. Does nothing unless `Playing`.
    pub async fn pause(&mut self) -> Result<(), CoreError> {
        if self.state.status != PlaybackStatus::Playing {
            debug!("Ignoring pause while {:?}", self.state.status);
            return Ok(());
        }
        let handle = self.require_handle()?;
        if let Err(error) = self.engine.pause(handle).await {
            return Err(self.playback_fault(error).await);
        }
        self.transition(PlaybackStatus::Paused);
        Ok(())
    }

    /// Rewinds to the start and returns to `Idle`. The resource stays open
    /// unless the session was in `Error`.
    pub async fn stop(&mut self) -> Result<(), CoreError> {
        match self.state.status {
            PlaybackStatus::Idle => return Ok(()),
            PlaybackStatus::Error => {
                self.release_current().await;
                self.state = PlaybackSnapshot::default();
                self.last_error = None;
                self.emit();
                return Ok(());
            }
            _ => {}
        }

        if let Some(handle) = self.handle {
            if let Err(error) = self.engine.stop(handle).await {
                return Err(self.playback_fault(error).await);
            }
        }
        self.state.position_ms = 0;
        self.transition(PlaybackStatus::Idle);
        Ok(())
    }

    /// Moves the playhead, clamped to the duration once the engine has
    /// reported one. Before that the position is passed through as is.
    pub async fn seek(&mut self, position_ms: u64) -> Result<(), CoreError> {
        if !self.state.status.is_ready() {
            debug!("Ignoring seek while {:?}", self.state.status);
            return Ok(());
        }
        let handle = self.require_handle()?;
        let position_ms = if self.state.duration_ms > 0 {
            position_ms.min(self.state.duration_ms)
        } else {
            position_ms
        };

        if let Err(error) = self.engine.seek(handle, position_ms).await {
            return Err(self.playback_fault(error).await);
        }
        self.state.position_ms = position_ms;
        self.emit();
        Ok(())
    }

    /// Changes the playback rate. It holds across pause and resume and is
    /// reset to 1.0 by the next `load`.
    pub async fn set_speed(&mut self, multiplier: f32) -> Result<(), CoreError> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(CoreError::InvalidInput {
                message: format!("playback speed must be positive, got {}", multiplier),
            });
        }

        if self.state.status.is_ready() {
            let handle = self.require_handle()?;
            if let Err(error) = self.engine.set_rate(handle, multiplier).await {
                return Err(self.playback_fault(error).await);
            }
        }
        self.state.speed = multiplier;
        self.emit();
        Ok(())
    }

    /// Applies an engine event. Events for a resource that is no longer the
    /// session's are ignored.
    pub async fn handle_event(&mut self, handle: AudioHandle, event: EngineEvent) {
        if self.handle != Some(handle) {
            debug!("Dropping {:?} for stale audio {:?}", event, handle);
            return;
        }

        match event {
            EngineEvent::Progress {
                position_ms,
                duration_ms,
            } => {
                let mut changed = false;
                if let Some(duration_ms) = duration_ms {
                    changed = self.state.duration_ms != duration_ms;
                    self.state.duration_ms = duration_ms;
                }
                // Position only advances while playing.
                if self.state.status == PlaybackStatus::Playing {
                    self.state.position_ms = position_ms;
                    changed = true;
                }
                if changed {
                    self.emit();
                }
            }
            EngineEvent::Finished => {
                self.state.position_ms = 0;
                self.transition(PlaybackStatus::Loaded);
            }
            EngineEvent::Failed { message } => {
                self.release_current().await;
                let error: CoreError = AudioError::PlaybackFailed { reason: message }.into();
                self.enter_error(&error);
                self.last_error = Some(error);
            }
        }
    }

    /// Releases the resource and forgets the story.
    pub async fn unload(&mut self) {
        let was_idle = self.handle.is_none() && self.state == PlaybackSnapshot::default();
        self.release_current().await;
        self.state = PlaybackSnapshot::default();
        self.last_error = None;
        if !was_idle {
            self.emit();
        }
    }

    fn require_handle(&self) -> Result<AudioHandle, CoreError> {
        self.handle
            .ok_or_else(|| AudioError::NoActiveSession.into())
    }

    async fn release_current(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(error) = self.engine.release(handle).await {
                warn!("Releasing audio {:?} failed: {}", handle, error);
            }
        }
    }

    async fn playback_fault(&mut self, error: CoreError) -> CoreError {
        self.release_current().await;
        let error: CoreError = AudioError::PlaybackFailed {
            reason: error.to_string(),
        }
        .into();
        // Returned to the caller rather than kept for `take_error`.
        self.enter_error(&error);
        error
    }

    fn enter_error(&mut self, error: &CoreError) {
        error.log_error();
        self.state = PlaybackSnapshot {
            status: PlaybackStatus::Error,
            error: Some(error.user_friendly_message()),
            ..PlaybackSnapshot::default()
        };
        self.emit();
    }

    fn transition(&mut self, status: PlaybackStatus) {
        debug!("Playback {:?} -> {:?}", self.state.status, status);
        self.state.status = status;
        self.emit();
    }

    fn emit(&self) {
        // No subscribers is fine.
        let _ = self.tx.send(self.state.clone());
    }
}
