use std::sync::{Arc, Mutex};

use rand::Rng;
use tokio::task;
use tracing::{info, warn};
use url::Url;

use crate::database::{self, models::AutoplaylistUrl};
use crate::persistence::PersistenceError;

/// The process-wide autoplaylist source: an ordered pool of filler URLs
/// shared by every guild. The in-memory working list lives under its own
/// lock, separate from any per-guild lock; durable state is the
/// `autoplaylist` table.
#[derive(Debug)]
pub struct Autoplaylist {
    database_url: String,
    inner: Mutex<SourceState>,
}

#[derive(Debug)]
struct SourceState {
    urls: Vec<String>,
    /// Cleared when the source is observed empty; set again by seed/reload.
    enabled: bool,
}

impl Autoplaylist {
    pub async fn load(database_url: impl Into<String>) -> Result<Self, PersistenceError> {
        let database_url = database_url.into();
        let url = database_url.clone();
        let urls = task::spawn_blocking(move || {
            let mut conn = database::establish_connection(&url)?;
            Ok::<_, PersistenceError>(AutoplaylistUrl::load_all(&mut conn)?)
        })
        .await??;
        info!(count = urls.len(), "loaded autoplaylist source");
        Ok(Self {
            database_url,
            inner: Mutex::new(SourceState {
                urls,
                enabled: true,
            }),
        })
    }

    /// Hand out a fresh tenant-local working copy, or `None` when the
    /// source is exhausted or disabled. Observing an empty source disables
    /// fallback until `seed`/`reload`.
    pub fn refill(&self) -> Option<Vec<String>> {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if !state.enabled {
            return None;
        }
        if state.urls.is_empty() {
            state.enabled = false;
            warn!("autoplaylist source is empty, disabling fallback");
            return None;
        }
        Some(state.urls.clone())
    }

    /// Drop a URL that failed to resolve so no guild retries it. The
    /// removal is applied to the working list under the source lock, then
    /// made durable; restarts never re-offer it.
    pub async fn discard(&self, bad_url: &str) -> Result<(), PersistenceError> {
        {
            let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            state.urls.retain(|u| u != bad_url);
        }
        warn!(url = %bad_url, "removing unplayable url from autoplaylist");
        let db = self.database_url.clone();
        let bad = bad_url.to_string();
        task::spawn_blocking(move || {
            let mut conn = database::establish_connection(&db)?;
            AutoplaylistUrl::remove(&mut conn, &bad)?;
            Ok(())
        })
        .await?
    }

    /// Add URLs to the shared source (idempotent per URL) and re-enable
    /// fallback. Malformed URLs are skipped. Returns how many were
    /// actually new.
    pub async fn seed(&self, urls: Vec<String>) -> Result<usize, PersistenceError> {
        let urls: Vec<String> = urls
            .into_iter()
            .filter(|u| match Url::parse(u) {
                Ok(_) => true,
                Err(e) => {
                    warn!(url = %u, error = %e, "ignoring malformed autoplaylist url");
                    false
                }
            })
            .collect();
        let db = self.database_url.clone();
        let to_insert = urls.clone();
        let added = task::spawn_blocking(move || {
            let mut conn = database::establish_connection(&db)?;
            Ok::<_, PersistenceError>(AutoplaylistUrl::insert_missing(&mut conn, &to_insert)?)
        })
        .await??;
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        for url in urls {
            if !state.urls.contains(&url) {
                state.urls.push(url);
            }
        }
        if !state.urls.is_empty() {
            state.enabled = true;
        }
        Ok(added)
    }

    /// Re-read the durable source and re-enable fallback.
    pub async fn reload(&self) -> Result<usize, PersistenceError> {
        let db = self.database_url.clone();
        let urls = task::spawn_blocking(move || {
            let mut conn = database::establish_connection(&db)?;
            Ok::<_, PersistenceError>(AutoplaylistUrl::load_all(&mut conn)?)
        })
        .await??;
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let count = urls.len();
        state.urls = urls;
        state.enabled = true;
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).enabled
    }

    /// Enabled and non-empty: a refill right now would succeed.
    pub fn is_available(&self) -> bool {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.enabled && !state.urls.is_empty()
    }
}

/// A guild's working copy of the shared source, consumed without
/// replacement until exhausted, then refilled.
#[derive(Debug)]
pub struct AutoplaylistFallback {
    shared: Arc<Autoplaylist>,
    local: Vec<String>,
}

impl AutoplaylistFallback {
    pub fn new(shared: Arc<Autoplaylist>) -> Self {
        Self {
            shared,
            local: Vec::new(),
        }
    }

    /// Remove and return one URL from the local copy; FIFO unless `random`.
    pub fn take(&mut self, random: bool) -> Option<String> {
        if self.local.is_empty() {
            self.local = self.shared.refill()?;
        }
        if self.local.is_empty() {
            return None;
        }
        let idx = if random {
            rand::thread_rng().gen_range(0..self.local.len())
        } else {
            0
        };
        Some(self.local.remove(idx))
    }

    /// A discarded URL may still sit in this local copy; drop it here too
    /// so the same guild does not retry it before the next refill.
    pub fn forget(&mut self, url: &str) {
        self.local.retain(|u| u != url);
    }

    /// Whether a take() right now could yield anything.
    pub fn has_any(&self) -> bool {
        !self.local.is_empty() || self.shared.is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_source(urls: &[&str]) -> (tempfile::TempDir, Arc<Autoplaylist>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ap.sqlite3").to_string_lossy().into_owned();
        let source = Autoplaylist::load(path).await.unwrap();
        source
            .seed(urls.iter().map(|s| s.to_string()).collect())
            .await
            .unwrap();
        (dir, Arc::new(source))
    }

    #[tokio::test]
    async fn fifo_take_follows_source_order() {
        let (_dir, source) = temp_source(&["https://ap/a", "https://ap/b", "https://ap/c"]).await;
        let mut fallback = AutoplaylistFallback::new(source);
        assert_eq!(fallback.take(false).as_deref(), Some("https://ap/a"));
        assert_eq!(fallback.take(false).as_deref(), Some("https://ap/b"));
        assert_eq!(fallback.take(false).as_deref(), Some("https://ap/c"));
        // Local copy exhausted; the shared source refills it.
        assert_eq!(fallback.take(false).as_deref(), Some("https://ap/a"));
    }

    #[tokio::test]
    async fn exhausted_source_disables_fallback_until_reload() {
        let (_dir, source) = temp_source(&["https://ap/a", "https://ap/b"]).await;
        let mut fallback = AutoplaylistFallback::new(source.clone());
        // Both URLs turn out to be unplayable.
        for url in ["https://ap/a", "https://ap/b"] {
            assert!(fallback.take(false).is_some());
            source.discard(url).await.unwrap();
            fallback.forget(url);
        }
        assert_eq!(fallback.take(false), None);
        assert!(!source.is_enabled());
        // Disabled stays disabled, no matter how often we ask.
        assert_eq!(fallback.take(false), None);

        source.seed(vec!["https://ap/c".to_string()]).await.unwrap();
        assert!(source.is_enabled());
        assert_eq!(fallback.take(false).as_deref(), Some("https://ap/c"));
    }

    #[tokio::test]
    async fn discard_is_durable_across_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ap.sqlite3").to_string_lossy().into_owned();
        {
            let source = Autoplaylist::load(path.clone()).await.unwrap();
            source
                .seed(vec!["https://ap/good".to_string(), "https://ap/bad".to_string()])
                .await
                .unwrap();
            source.discard("https://ap/bad").await.unwrap();
        }
        let reborn = Autoplaylist::load(path).await.unwrap();
        assert_eq!(reborn.len(), 1);
        let mut fallback = AutoplaylistFallback::new(Arc::new(reborn));
        assert_eq!(fallback.take(false).as_deref(), Some("https://ap/good"));
    }

    #[tokio::test]
    async fn local_copies_are_independent_per_guild() {
        let (_dir, source) = temp_source(&["https://ap/a", "https://ap/b"]).await;
        let mut one = AutoplaylistFallback::new(source.clone());
        let mut two = AutoplaylistFallback::new(source);
        assert_eq!(one.take(false).as_deref(), Some("https://ap/a"));
        // The other guild's copy is untouched by the first guild's take.
        assert_eq!(two.take(false).as_deref(), Some("https://ap/a"));
    }
}
