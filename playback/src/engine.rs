use async_trait::async_trait;
use threadist_core::{AudioSource, CoreError};

/// Opaque handle to one opened audio resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioHandle(pub u64);

/// Asynchronous notifications from the engine about an opened resource.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Progress {
        position_ms: u64,
        duration_ms: Option<u64>,
    },
    /// Natural end of the audio.
    Finished,
    /// Codec or network fault while playing.
    Failed { message: String },
}

/// The platform audio player. Events are delivered separately, tagged with the
/// handle they concern, through [`crate::PlaybackSession::handle_event`].
#[async_trait]
pub trait AudioEngine: Send + Sync {
    async fn open(&self, source: &AudioSource) -> Result<AudioHandle, CoreError>;

    async fn play(&self, handle: AudioHandle) -> Result<(), CoreError>;

    async fn pause(&self, handle: AudioHandle) -> Result<(), CoreError>;

    /// Halts playback and rewinds to the start without releasing the resource.
    async fn stop(&self, handle: AudioHandle) -> Result<(), CoreError>;

    async fn seek(&self, handle: AudioHandle, position_ms: u64) -> Result<(), CoreError>;

    async fn set_rate(&self, handle: AudioHandle, rate: f32) -> Result<(), CoreError>;

    async fn release(&self, handle: AudioHandle) -> Result<(), CoreError>;
}
