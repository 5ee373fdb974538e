use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::autoplaylist::Autoplaylist;
use crate::config::PlayerConfig;
use crate::entry::GuildId;
use crate::events::EventSender;
use crate::locks::LockMap;
use crate::persistence::QueuePersistence;
use crate::player::MusicPlayer;
use crate::resolver::MediaResolver;
use crate::transport::VoiceTransport;

/// Whether a newly created player should re-read its persisted snapshot.
/// Deliberately explicit: resuming is a one-shot decision made at join
/// time, never a side effect of a later call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePolicy {
    Fresh,
    RestoreSnapshot,
}

/// Owns every guild's player. At most one player exists per guild; racing
/// creators serialize on the registry map lock, which is held only for the
/// check-and-create itself.
pub struct PlayerRegistry {
    config: Arc<PlayerConfig>,
    resolver: Arc<dyn MediaResolver>,
    autoplaylist: Arc<Autoplaylist>,
    persistence: Option<Arc<QueuePersistence>>,
    locks: Arc<LockMap>,
    events: EventSender,
    players: Mutex<HashMap<GuildId, Arc<MusicPlayer>>>,
}

impl PlayerRegistry {
    pub fn new(
        config: PlayerConfig,
        resolver: Arc<dyn MediaResolver>,
        autoplaylist: Arc<Autoplaylist>,
        persistence: Option<Arc<QueuePersistence>>,
        events: EventSender,
    ) -> Self {
        Self {
            config: Arc::new(config),
            resolver,
            autoplaylist,
            persistence,
            locks: Arc::new(LockMap::new()),
            events,
            players: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the guild's player, creating it on first use. `transport` is
    /// the guild's live voice connection; it is only consulted when this
    /// call actually creates the player.
    pub async fn get_or_create(
        &self,
        guild_id: GuildId,
        transport: Arc<dyn VoiceTransport>,
        resume: ResumePolicy,
    ) -> Arc<MusicPlayer> {
        let (player, created) = {
            let mut players = self.players.lock().await;
            if let Some(existing) = players.get(&guild_id) {
                (existing.clone(), false)
            } else {
                let player = MusicPlayer::new(
                    guild_id,
                    self.config.clone(),
                    self.resolver.clone(),
                    transport,
                    self.autoplaylist.clone(),
                    self.persistence.clone(),
                    self.locks.clone(),
                    self.events.clone(),
                );
                players.insert(guild_id, player.clone());
                info!(guild = %guild_id, "created player");
                (player, true)
            }
        };

        // Restore happens outside the map lock; other guilds' calls are
        // never blocked on this guild's snapshot I/O.
        if created
            && resume == ResumePolicy::RestoreSnapshot
            && let Some(persistence) = &self.persistence
        {
            match persistence.load(guild_id).await {
                Ok(Some(snapshot)) => player.restore(snapshot).await,
                Ok(None) => {}
                Err(e) => {
                    warn!(guild = %guild_id, error = %e, "failed to load queue snapshot");
                }
            }
        }
        player
    }

    /// Non-creating lookup.
    pub async fn get(&self, guild_id: GuildId) -> Option<Arc<MusicPlayer>> {
        self.players.lock().await.get(&guild_id).cloned()
    }

    /// Kill the guild's player and forget it. Returns false when there was
    /// nothing to evict.
    pub async fn evict(&self, guild_id: GuildId) -> bool {
        let removed = self.players.lock().await.remove(&guild_id);
        match removed {
            Some(player) => {
                player.kill().await;
                true
            }
            None => false,
        }
    }

    pub async fn guild_ids(&self) -> Vec<GuildId> {
        self.players.lock().await.keys().copied().collect()
    }

    pub async fn player_count(&self) -> usize {
        self.players.lock().await.len()
    }

    /// Kill every player, e.g. on process shutdown.
    pub async fn shutdown(&self) {
        let players: Vec<_> = {
            let mut map = self.players.lock().await;
            map.drain().map(|(_, p)| p).collect()
        };
        future::join_all(players.iter().map(|p| p.kill())).await;
    }
}
