use async_trait::async_trait;

#[derive(Debug, Clone, thiserror::Error)]
#[error("voice transport failed: {message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Handle to one in-flight track on the voice connection.
///
/// Completion is observed by polling `is_finished` from the player's driver
/// task; the transport owns decoding and frame pacing.
pub trait TrackHandle: Send + Sync {
    fn is_finished(&self) -> bool;
    fn stop(&self);
    fn pause(&self);
    fn resume(&self);
    fn set_volume(&self, volume: f32);
}

/// The per-guild voice connection the scheduler streams through.
/// Implemented by the host application (one handle per joined guild).
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn begin(&self, media_url: &str, volume: f32)
    -> Result<Box<dyn TrackHandle>, TransportError>;
}
