use serde::{Deserialize, Serialize};
use tokio::task;

use crate::database::{self, models::{NewQueueSnapshotRow, QueueSnapshotRow}};
use crate::entry::{ChannelId, DownloadState, Entry, GuildId, UserId};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("database connection failed: {0}")]
    Connection(#[from] diesel::ConnectionError),
    #[error("database query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("persistence task failed: {0}")]
    Join(#[from] task::JoinError),
}

/// The wire form of one persisted entry. Download state is deliberately not
/// part of it: a restored entry always starts out unresolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedEntry {
    pub source_url: String,
    pub title: String,
    pub duration_seconds: u32,
    pub requester_id: Option<UserId>,
    pub request_channel_id: Option<ChannelId>,
}

impl From<&Entry> for SavedEntry {
    fn from(entry: &Entry) -> Self {
        Self {
            source_url: entry.source_url.clone(),
            title: entry.title.clone(),
            duration_seconds: entry.duration_seconds,
            requester_id: entry.requester_id,
            request_channel_id: entry.request_channel_id,
        }
    }
}

impl SavedEntry {
    pub fn into_entry(self) -> Entry {
        Entry {
            source_url: self.source_url,
            title: self.title,
            duration_seconds: self.duration_seconds,
            requester_id: self.requester_id,
            request_channel_id: self.request_channel_id,
            download_state: DownloadState::Pending,
        }
    }
}

/// A guild's resumable playback state: the remaining queue plus the entry
/// that was playing when the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub entries: Vec<SavedEntry>,
    pub current_entry: Option<SavedEntry>,
}

impl QueueSnapshot {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.current_entry.is_none()
    }
}

/// Durable per-guild snapshot store over sqlite. Writers for different
/// guilds never block each other beyond sqlite's own write serialization;
/// callers for the same guild are already serialized by the player lock.
#[derive(Debug, Clone)]
pub struct QueuePersistence {
    database_url: String,
}

impl QueuePersistence {
    /// Open the store, creating the schema if needed.
    pub fn open(database_url: impl Into<String>) -> Result<Self, PersistenceError> {
        let database_url = database_url.into();
        database::establish_connection(&database_url)?;
        Ok(Self { database_url })
    }

    pub async fn save(
        &self,
        guild_id: GuildId,
        snapshot: &QueueSnapshot,
    ) -> Result<(), PersistenceError> {
        let url = self.database_url.clone();
        let guild = guild_id.to_string();
        let rows = snapshot_rows(&guild, snapshot);
        task::spawn_blocking(move || {
            let mut conn = database::establish_connection(&url)?;
            QueueSnapshotRow::replace_guild_snapshot(&mut conn, &guild, &rows)?;
            Ok(())
        })
        .await?
    }

    pub async fn load(&self, guild_id: GuildId) -> Result<Option<QueueSnapshot>, PersistenceError> {
        let url = self.database_url.clone();
        let guild = guild_id.to_string();
        let rows = task::spawn_blocking(move || {
            let mut conn = database::establish_connection(&url)?;
            Ok::<_, PersistenceError>(QueueSnapshotRow::load_guild_snapshot(&mut conn, &guild)?)
        })
        .await??;
        if rows.is_empty() {
            return Ok(None);
        }
        let mut snapshot = QueueSnapshot::default();
        for row in rows {
            let entry = row_entry(&row);
            if row.is_current {
                snapshot.current_entry = Some(entry);
            } else {
                snapshot.entries.push(entry);
            }
        }
        Ok(Some(snapshot))
    }

    pub async fn clear(&self, guild_id: GuildId) -> Result<(), PersistenceError> {
        let url = self.database_url.clone();
        let guild = guild_id.to_string();
        task::spawn_blocking(move || {
            let mut conn = database::establish_connection(&url)?;
            QueueSnapshotRow::clear_guild_snapshot(&mut conn, &guild)?;
            Ok(())
        })
        .await?
    }
}

fn snapshot_rows(guild: &str, snapshot: &QueueSnapshot) -> Vec<NewQueueSnapshotRow> {
    let mut rows = Vec::with_capacity(snapshot.entries.len() + 1);
    if let Some(current) = &snapshot.current_entry {
        rows.push(saved_row(guild, current, 0, true));
    }
    for (idx, entry) in snapshot.entries.iter().enumerate() {
        rows.push(saved_row(guild, entry, idx as i32 + 1, false));
    }
    rows
}

fn saved_row(guild: &str, entry: &SavedEntry, position: i32, is_current: bool) -> NewQueueSnapshotRow {
    NewQueueSnapshotRow {
        guild_id: guild.to_string(),
        url: entry.source_url.clone(),
        title: entry.title.clone(),
        duration: entry.duration_seconds as i32,
        requester_id: entry.requester_id.map(|id| id.to_string()),
        channel_id: entry.request_channel_id.map(|id| id.to_string()),
        position,
        is_current,
    }
}

fn row_entry(row: &QueueSnapshotRow) -> SavedEntry {
    SavedEntry {
        source_url: row.url.clone(),
        title: row.title.clone(),
        duration_seconds: row.duration.max(0) as u32,
        requester_id: parse_id(&row.requester_id).map(UserId),
        request_channel_id: parse_id(&row.channel_id).map(ChannelId),
    }
}

fn parse_id(raw: &Option<String>) -> Option<u64> {
    raw.as_deref().and_then(|s| s.parse().ok())
}
