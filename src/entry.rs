use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resolver::TrackMetadata;

/// Guild (tenant) identifier. One playback scheduler exists per guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuildId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Resolution status of an entry's playable media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadState {
    /// Not yet handed to the resolver.
    Pending,
    /// A resolver task is in flight.
    Resolving,
    /// Resolved; `media_url` is what the voice transport streams.
    Ready { media_url: String },
    Failed,
}

/// One playable item. Owned by exactly one queue until played or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub source_url: String,
    pub title: String,
    /// 0 means unknown or live.
    pub duration_seconds: u32,
    /// Absent for autoplaylist-origin entries.
    pub requester_id: Option<UserId>,
    pub request_channel_id: Option<ChannelId>,
    pub download_state: DownloadState,
}

impl Entry {
    pub fn from_metadata(
        meta: TrackMetadata,
        requester_id: Option<UserId>,
        request_channel_id: Option<ChannelId>,
    ) -> Self {
        let download_state = match meta.media_url {
            Some(media_url) => DownloadState::Ready { media_url },
            None => DownloadState::Pending,
        };
        Self {
            source_url: meta.source_url,
            title: meta.title,
            duration_seconds: meta.duration_seconds,
            requester_id,
            request_channel_id,
            download_state,
        }
    }

    /// URL the transport should stream, once resolution has produced one.
    pub fn media_url(&self) -> Option<&str> {
        match &self.download_state {
            DownloadState::Ready { media_url } => Some(media_url),
            _ => None,
        }
    }

    pub fn is_autoplaylist(&self) -> bool {
        self.requester_id.is_none()
    }
}
