use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::entry::{GuildId, UserId};

/// What a throttle lock protects. Scopes are explicit so lock usage stays
/// auditable; keys are never derived from string concatenation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockScope {
    /// One user's enqueue pipeline: resolve, quota check, append. Held for
    /// the whole span so two overlapping bulk requests cannot both observe
    /// "under quota" before either commits.
    Enqueue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LockKey {
    scope: LockScope,
    guild_id: GuildId,
    user_id: UserId,
}

/// Map from (scope, guild, user) to a dedicated mutex. Different users and
/// different guilds proceed fully in parallel; only a repeat of the same
/// operation by the same user in the same guild serializes.
#[derive(Debug, Default)]
pub struct LockMap {
    locks: StdMutex<HashMap<LockKey, Arc<Mutex<()>>>>,
}

impl LockMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(
        &self,
        scope: LockScope,
        guild_id: GuildId,
        user_id: UserId,
    ) -> OwnedMutexGuard<()> {
        let key = LockKey {
            scope,
            guild_id,
            user_id,
        };
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(key).or_default().clone()
        };
        lock.lock_owned().await
    }
}
