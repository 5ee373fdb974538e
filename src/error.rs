use crate::resolver::ExtractionError;
use crate::transport::TransportError;

/// Errors surfaced to callers of the player API. "Queue empty" and other
/// ordinary states are not errors; these are denials and faults only.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// The player has been killed; it never comes back.
    #[error("player is no longer active")]
    NotActive,

    #[error("nothing is playing")]
    NothingPlaying,

    /// Per-user quota reached.
    #[error("you already have {limit} songs queued")]
    QueueLimit { limit: u32 },

    #[error("playlist has {len} entries, limit is {limit}")]
    PlaylistTooLong { len: usize, limit: u32 },

    #[error("song is {duration}s long, limit is {limit}s")]
    SongTooLong { duration: u32, limit: u32 },

    /// A bulk import where every candidate was over the duration cap.
    #[error("all {dropped} songs exceeded the duration limit")]
    AllSongsExceededLimit { dropped: usize },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
