//! Per-guild media playback scheduling: ordered queues, crowd-sourced skip
//! votes, autoplaylist fallback, and durable queue snapshots. The chat
//! gateway, media resolution, and the voice connection itself live in the
//! host application behind the [`MediaResolver`] and [`VoiceTransport`]
//! traits.

pub mod autoplaylist;
pub mod config;
pub mod database;
pub mod entry;
pub mod error;
pub mod events;
pub mod locks;
pub mod persistence;
pub mod player;
pub mod queue;
pub mod registry;
pub mod resolver;
pub mod transport;
pub mod votes;

pub use autoplaylist::{Autoplaylist, AutoplaylistFallback};
pub use config::{Permissions, PlayerConfig, read_database_url};
pub use entry::{ChannelId, DownloadState, Entry, GuildId, UserId};
pub use error::PlayerError;
pub use events::{EventReceiver, EventSender, PlayerEvent, event_channel};
pub use persistence::{PersistenceError, QueuePersistence, QueueSnapshot, SavedEntry};
pub use player::{Enqueued, MusicPlayer, PlayerState, SkipOutcome};
pub use queue::PlaybackQueue;
pub use registry::{PlayerRegistry, ResumePolicy};
pub use resolver::{ExtractionError, MediaResolver, Resolved, TrackMetadata};
pub use transport::{TrackHandle, TransportError, VoiceTransport};
pub use votes::SkipVoteTracker;
