use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Metadata for one playable track as produced by the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub source_url: String,
    pub title: String,
    /// 0 means unknown or live.
    pub duration_seconds: u32,
    /// Local path or direct stream URL when the resolver downloaded or
    /// pre-resolved the media; absent when only metadata was extracted.
    pub media_url: Option<String>,
}

/// Result of resolving a query: a single track, or an expanded playlist.
#[derive(Debug, Clone)]
pub enum Resolved {
    Single(TrackMetadata),
    Playlist(Vec<TrackMetadata>),
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("extraction failed for {query}: {message}")]
pub struct ExtractionError {
    pub query: String,
    pub message: String,
}

impl ExtractionError {
    pub fn new(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            message: message.into(),
        }
    }
}

/// Turns a URL or search string into playable metadata, optionally
/// downloading the media. Implemented by the host application; resolution
/// may take seconds, so callers never hold player locks across it.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, query: &str, want_download: bool)
    -> Result<Resolved, ExtractionError>;
}
