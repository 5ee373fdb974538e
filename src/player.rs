use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, mpsc};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use crate::autoplaylist::{Autoplaylist, AutoplaylistFallback};
use crate::config::{Permissions, PlayerConfig};
use crate::entry::{ChannelId, DownloadState, Entry, GuildId, UserId};
use crate::error::PlayerError;
use crate::events::{self, EventSender, PlayerEvent};
use crate::locks::{LockMap, LockScope};
use crate::persistence::{QueuePersistence, QueueSnapshot, SavedEntry};
use crate::queue::PlaybackQueue;
use crate::resolver::{MediaResolver, Resolved, TrackMetadata};
use crate::transport::{TrackHandle, VoiceTransport};
use crate::votes::SkipVoteTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Stopped,
    Playing,
    Paused,
    /// Terminal. A dead player is evicted from the registry, never reused.
    Dead,
}

/// Outcome of a non-forced skip request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipOutcome {
    Skipped,
    VotesNeeded { have: usize, required: usize },
}

/// What an enqueue call did.
#[derive(Debug, Clone)]
pub enum Enqueued {
    Single {
        entry: Entry,
        /// 1-based position behind the current track.
        position: usize,
        estimated_wait: Duration,
    },
    Playlist {
        added: usize,
        /// Candidates dropped for exceeding the duration cap.
        dropped: usize,
    },
}

struct NowPlaying {
    entry: Entry,
    handle: Box<dyn TrackHandle>,
    started_at: Instant,
    /// Play time accumulated before the most recent pause.
    played: Duration,
}

struct PlayerInner {
    state: PlayerState,
    queue: PlaybackQueue,
    current: Option<NowPlaying>,
    votes: SkipVoteTracker,
    volume: f32,
    karaoke_mode: bool,
    fallback: AutoplaylistFallback,
    /// True while an advance (resolve next entry) is in flight, so two
    /// callers cannot both start pulling the next track.
    advancing: bool,
}

/// The per-guild playback scheduler: owns the queue, drives the voice
/// transport, arbitrates skip votes, and emits lifecycle events. One
/// instance per guild, created through the registry.
pub struct MusicPlayer {
    guild_id: GuildId,
    config: Arc<PlayerConfig>,
    resolver: Arc<dyn MediaResolver>,
    transport: Arc<dyn VoiceTransport>,
    /// Snapshots queue up here for a dedicated saver task, so saves for
    /// this guild land in emission order; guilds never share a saver.
    save_tx: Option<mpsc::UnboundedSender<QueueSnapshot>>,
    autoplaylist: Arc<Autoplaylist>,
    locks: Arc<LockMap>,
    events: EventSender,
    inner: Mutex<PlayerInner>,
    /// Abort handles for in-flight resolver tasks, so kill() can cancel
    /// resolution work without waiting for it.
    resolves: StdMutex<Vec<AbortHandle>>,
    driver: StdMutex<Option<JoinHandle<()>>>,
}

impl MusicPlayer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        guild_id: GuildId,
        config: Arc<PlayerConfig>,
        resolver: Arc<dyn MediaResolver>,
        transport: Arc<dyn VoiceTransport>,
        autoplaylist: Arc<Autoplaylist>,
        persistence: Option<Arc<QueuePersistence>>,
        locks: Arc<LockMap>,
        events: EventSender,
    ) -> Arc<Self> {
        let volume = config.default_volume.clamp(0.01, 1.0);
        let save_tx = persistence.map(|store| spawn_saver(guild_id, store));
        let player = Arc::new(Self {
            guild_id,
            config,
            resolver,
            transport,
            save_tx,
            autoplaylist: autoplaylist.clone(),
            locks,
            events,
            inner: Mutex::new(PlayerInner {
                state: PlayerState::Stopped,
                queue: PlaybackQueue::new(),
                current: None,
                votes: SkipVoteTracker::new(),
                volume,
                karaoke_mode: false,
                fallback: AutoplaylistFallback::new(autoplaylist),
                advancing: false,
            }),
            resolves: StdMutex::new(Vec::new()),
            driver: StdMutex::new(None),
        });
        let handle = spawn_driver(&player);
        *player.driver.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        player
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Resolve a query and add the result to the queue, enforcing the
    /// caller-supplied quotas. Holds the per-(enqueue, requester) throttle
    /// for the whole resolve-check-append span so overlapping requests from
    /// one user cannot slip past the quota check.
    pub async fn enqueue(
        &self,
        query: &str,
        requester: UserId,
        channel: ChannelId,
        perms: &Permissions,
    ) -> Result<Enqueued, PlayerError> {
        if self.state().await == PlayerState::Dead {
            return Err(PlayerError::NotActive);
        }
        let _throttle = self
            .locks
            .acquire(LockScope::Enqueue, self.guild_id, requester)
            .await;

        let resolver = self.resolver.clone();
        let q = query.to_string();
        let want_download = self.config.download_media;
        let task = tokio::spawn(async move { resolver.resolve(&q, want_download).await });
        self.track_resolve(task.abort_handle());
        let resolved = match task.await {
            Ok(result) => result?,
            // Aborted: kill() won while we were resolving.
            Err(_) => return Err(PlayerError::NotActive),
        };

        match resolved {
            Resolved::Single(meta) => self.enqueue_single(meta, requester, channel, perms).await,
            Resolved::Playlist(list) => {
                self.enqueue_playlist(list, requester, channel, perms).await
            }
        }
    }

    async fn enqueue_single(
        &self,
        meta: TrackMetadata,
        requester: UserId,
        channel: ChannelId,
        perms: &Permissions,
    ) -> Result<Enqueued, PlayerError> {
        let mut inner = self.inner.lock().await;
        if inner.state == PlayerState::Dead {
            return Err(PlayerError::NotActive);
        }
        if let Some(limit) = perms.max_songs
            && inner.queue.count_for(requester) >= limit as usize
        {
            return Err(PlayerError::QueueLimit { limit });
        }
        if let Some(cap) = perms.max_song_length
            && meta.duration_seconds > cap
        {
            return Err(PlayerError::SongTooLong {
                duration: meta.duration_seconds,
                limit: cap,
            });
        }

        let entry = Entry::from_metadata(meta, Some(requester), Some(channel));
        inner.queue.append(entry.clone());
        let position = inner.queue.len();
        let estimated_wait = inner
            .queue
            .estimate_time_until(position - 1, current_remaining(&inner));
        events::emit(
            &self.events,
            PlayerEvent::EntryAdded {
                guild_id: self.guild_id,
                entry: entry.clone(),
            },
        );
        let snapshot = snapshot_of(&inner);
        let should_start = inner.state == PlayerState::Stopped && begin_advance(&mut inner);
        drop(inner);

        self.persist(snapshot);
        if should_start {
            self.advance().await;
        }
        Ok(Enqueued::Single {
            entry,
            position,
            estimated_wait,
        })
    }

    async fn enqueue_playlist(
        &self,
        list: Vec<TrackMetadata>,
        requester: UserId,
        channel: ChannelId,
        perms: &Permissions,
    ) -> Result<Enqueued, PlayerError> {
        let mut inner = self.inner.lock().await;
        if inner.state == PlayerState::Dead {
            return Err(PlayerError::NotActive);
        }
        if let Some(limit) = perms.max_playlist_length
            && list.len() > limit as usize
        {
            return Err(PlayerError::PlaylistTooLong {
                len: list.len(),
                limit,
            });
        }
        if let Some(limit) = perms.max_songs
            && inner.queue.count_for(requester) + list.len() > limit as usize
        {
            return Err(PlayerError::QueueLimit { limit });
        }

        // All candidates validated; over-long ones are dropped post-hoc.
        let mut dropped = 0usize;
        let mut kept = Vec::with_capacity(list.len());
        for meta in list {
            if let Some(cap) = perms.max_song_length
                && meta.duration_seconds > cap
            {
                dropped += 1;
                continue;
            }
            kept.push(Entry::from_metadata(meta, Some(requester), Some(channel)));
        }
        if kept.is_empty() && dropped > 0 {
            return Err(PlayerError::AllSongsExceededLimit { dropped });
        }

        let added = kept.len();
        inner.queue.import_many(kept.iter().cloned());
        for entry in &kept {
            events::emit(
                &self.events,
                PlayerEvent::EntryAdded {
                    guild_id: self.guild_id,
                    entry: entry.clone(),
                },
            );
        }

        // A track started speculatively may only now be known to exceed the
        // cap; it gets force-skipped rather than allowed to finish.
        let over_cap = perms.max_song_length.is_some_and(|cap| {
            inner
                .current
                .as_ref()
                .is_some_and(|now| now.entry.duration_seconds > cap)
        });
        let mut force_advance = false;
        if over_cap {
            if let Some(entry) = end_current(&mut inner) {
                info!(
                    guild = %self.guild_id,
                    title = %entry.title,
                    "current track exceeds duration cap, force-skipping"
                );
                events::emit(
                    &self.events,
                    PlayerEvent::FinishedPlaying {
                        guild_id: self.guild_id,
                        entry,
                    },
                );
            }
            force_advance = begin_advance(&mut inner);
        }

        let snapshot = snapshot_of(&inner);
        let should_start = inner.state == PlayerState::Stopped && begin_advance(&mut inner);
        drop(inner);

        self.persist(snapshot);
        if should_start || force_advance {
            self.advance().await;
        }
        Ok(Enqueued::Playlist { added, dropped })
    }

    /// Start playback from Stopped, or resume from Paused. Requires
    /// something to play: a queued entry or an available fallback.
    pub async fn play(&self) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            PlayerState::Dead => Err(PlayerError::NotActive),
            PlayerState::Playing => Ok(()),
            PlayerState::Paused => {
                resume_current(&mut inner);
                events::emit(
                    &self.events,
                    PlayerEvent::Resume {
                        guild_id: self.guild_id,
                    },
                );
                Ok(())
            }
            PlayerState::Stopped => {
                let has_fallback = !inner.karaoke_mode && inner.fallback.has_any();
                if inner.queue.is_empty() && !has_fallback {
                    return Err(PlayerError::NothingPlaying);
                }
                let started = begin_advance(&mut inner);
                drop(inner);
                if started {
                    self.advance().await;
                }
                Ok(())
            }
        }
    }

    /// Idempotent: pausing a paused player changes nothing and re-emits
    /// nothing.
    pub async fn pause(&self) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            PlayerState::Dead => Err(PlayerError::NotActive),
            PlayerState::Paused => Ok(()),
            PlayerState::Stopped => Err(PlayerError::NothingPlaying),
            PlayerState::Playing => {
                if let Some(now) = &mut inner.current {
                    now.handle.pause();
                    now.played += now.started_at.elapsed();
                }
                inner.state = PlayerState::Paused;
                events::emit(
                    &self.events,
                    PlayerEvent::Pause {
                        guild_id: self.guild_id,
                    },
                );
                Ok(())
            }
        }
    }

    pub async fn resume(&self) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            PlayerState::Dead => Err(PlayerError::NotActive),
            PlayerState::Playing => Ok(()),
            PlayerState::Stopped => Err(PlayerError::NothingPlaying),
            PlayerState::Paused => {
                resume_current(&mut inner);
                events::emit(
                    &self.events,
                    PlayerEvent::Resume {
                        guild_id: self.guild_id,
                    },
                );
                Ok(())
            }
        }
    }

    /// Stop playback, keeping the queue. Cancels any in-flight advance.
    pub async fn stop(&self) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock().await;
        if inner.state == PlayerState::Dead {
            return Err(PlayerError::NotActive);
        }
        if let Some(now) = inner.current.take() {
            now.handle.stop();
        }
        inner.advancing = false;
        inner.votes.reset();
        if inner.state != PlayerState::Stopped {
            inner.state = PlayerState::Stopped;
            events::emit(
                &self.events,
                PlayerEvent::Stop {
                    guild_id: self.guild_id,
                },
            );
        }
        Ok(())
    }

    /// Register a skip request. A force-authorized skip advances
    /// immediately; otherwise the vote is deduplicated and compared against
    /// the threshold for the supplied listener count.
    pub async fn skip(
        &self,
        voter: UserId,
        listeners: usize,
        force: bool,
    ) -> Result<SkipOutcome, PlayerError> {
        let mut inner = self.inner.lock().await;
        if inner.state == PlayerState::Dead {
            return Err(PlayerError::NotActive);
        }
        if inner.current.is_none() {
            return Err(PlayerError::NothingPlaying);
        }

        let skip_now = if force {
            true
        } else {
            let have = inner.votes.add_voter(voter);
            let required = required_skips(listeners, &self.config);
            if have < required {
                return Ok(SkipOutcome::VotesNeeded { have, required });
            }
            true
        };
        debug_assert!(skip_now);

        let finished = end_current(&mut inner);
        if let Some(entry) = finished {
            events::emit(
                &self.events,
                PlayerEvent::FinishedPlaying {
                    guild_id: self.guild_id,
                    entry,
                },
            );
        }
        let advance = begin_advance(&mut inner);
        drop(inner);
        if advance {
            self.advance().await;
        }
        Ok(SkipOutcome::Skipped)
    }

    /// Terminal teardown: cancels in-flight resolution, releases the
    /// transport, stops the driver. Idempotent; safe to race with any
    /// other call.
    pub async fn kill(&self) {
        {
            let mut inner = self.inner.lock().await;
            if inner.state == PlayerState::Dead {
                return;
            }
            inner.state = PlayerState::Dead;
            inner.advancing = false;
            if let Some(now) = inner.current.take() {
                now.handle.stop();
            }
            inner.queue.clear();
            inner.votes.reset();
        }
        for handle in self
            .resolves
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
        {
            handle.abort();
        }
        if let Some(driver) = self.driver.lock().unwrap_or_else(|e| e.into_inner()).take() {
            driver.abort();
        }
        info!(guild = %self.guild_id, "player killed");
    }

    /// Re-queue a persisted snapshot: the saved current entry plays first,
    /// then the saved queue. Emits nothing and triggers no saves.
    pub(crate) async fn restore(&self, snapshot: QueueSnapshot) {
        let mut inner = self.inner.lock().await;
        if inner.state == PlayerState::Dead {
            return;
        }
        for saved in snapshot.entries {
            inner.queue.append(saved.into_entry());
        }
        if let Some(current) = snapshot.current_entry {
            inner.queue.push_front(current.into_entry());
        }
        debug!(
            guild = %self.guild_id,
            queued = inner.queue.len(),
            "restored queue snapshot"
        );
    }

    pub async fn set_volume(&self, volume: f32) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock().await;
        if inner.state == PlayerState::Dead {
            return Err(PlayerError::NotActive);
        }
        inner.volume = volume.clamp(0.01, 1.0);
        let volume = inner.volume;
        if let Some(now) = &inner.current {
            now.handle.set_volume(volume);
        }
        Ok(())
    }

    pub async fn volume(&self) -> f32 {
        self.inner.lock().await.volume
    }

    /// While enabled, the autoplaylist never interjects; queue exhaustion
    /// stops playback instead of pulling filler.
    pub async fn set_karaoke_mode(&self, enabled: bool) {
        self.inner.lock().await.karaoke_mode = enabled;
    }

    pub async fn karaoke_mode(&self) -> bool {
        self.inner.lock().await.karaoke_mode
    }

    pub async fn state(&self) -> PlayerState {
        self.inner.lock().await.state
    }

    pub async fn current_entry(&self) -> Option<Entry> {
        self.inner
            .lock()
            .await
            .current
            .as_ref()
            .map(|now| now.entry.clone())
    }

    pub async fn queue_len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    pub async fn queue_entries(&self) -> Vec<Entry> {
        self.inner.lock().await.queue.entries().cloned().collect()
    }

    pub async fn count_for(&self, requester: UserId) -> usize {
        self.inner.lock().await.queue.count_for(requester)
    }

    pub async fn shuffle_queue(&self) {
        self.inner.lock().await.queue.shuffle();
    }

    pub async fn remove_at(&self, index: usize) -> Option<Entry> {
        self.inner.lock().await.queue.remove_at(index)
    }

    pub async fn remove_all_by(&self, requester: UserId) -> usize {
        self.inner.lock().await.queue.remove_all_by(requester)
    }

    pub async fn clear_queue(&self) {
        self.inner.lock().await.queue.clear();
    }

    /// Estimated wait before the queued entry at `index` starts playing.
    pub async fn estimated_wait(&self, index: usize) -> Duration {
        let inner = self.inner.lock().await;
        inner
            .queue
            .estimate_time_until(index, current_remaining(&inner))
    }

    fn track_resolve(&self, handle: AbortHandle) {
        let mut resolves = self.resolves.lock().unwrap_or_else(|e| e.into_inner());
        resolves.retain(|h| !h.is_finished());
        resolves.push(handle);
    }

    fn persist(&self, snapshot: QueueSnapshot) {
        if let Some(tx) = &self.save_tx {
            let _ = tx.send(snapshot);
        }
    }

    /// Pull entries until one starts playing or nothing is left. The inner
    /// lock is never held across resolution; `advancing` is the claim that
    /// lets exactly one caller run this at a time.
    async fn advance(&self) {
        loop {
            let candidate = {
                let mut inner = self.inner.lock().await;
                if inner.state == PlayerState::Dead || !inner.advancing {
                    inner.advancing = false;
                    return;
                }
                if inner.current.is_some() {
                    inner.advancing = false;
                    return;
                }
                if let Some(entry) = inner.queue.pop_head() {
                    Candidate::Queued(entry)
                } else {
                    let fallback_url = if inner.karaoke_mode {
                        None
                    } else {
                        inner.fallback.take(self.config.auto_playlist_random)
                    };
                    match fallback_url {
                        Some(url) => Candidate::Fallback(url),
                        None => {
                            inner.advancing = false;
                            if inner.state != PlayerState::Stopped {
                                inner.state = PlayerState::Stopped;
                                events::emit(
                                    &self.events,
                                    PlayerEvent::Stop {
                                        guild_id: self.guild_id,
                                    },
                                );
                            }
                            return;
                        }
                    }
                }
            };

            match self.resolve_candidate(&candidate).await {
                ResolveOutcome::Cancelled => {
                    let mut inner = self.inner.lock().await;
                    inner.advancing = false;
                    return;
                }
                ResolveOutcome::Failed => continue,
                ResolveOutcome::Ready { entry, media_url } => {
                    if self.start_playback(entry, &media_url).await {
                        return;
                    }
                    // Transport refused or the world changed; try the next
                    // candidate if we still hold the advance claim.
                    let inner = self.inner.lock().await;
                    if !inner.advancing || inner.state == PlayerState::Dead {
                        return;
                    }
                }
            }
        }
    }

    async fn resolve_candidate(&self, candidate: &Candidate) -> ResolveOutcome {
        let (query, requester, channel, known) = match candidate {
            Candidate::Queued(entry) => {
                if let Some(media_url) = entry.media_url() {
                    return ResolveOutcome::Ready {
                        media_url: media_url.to_string(),
                        entry: entry.clone(),
                    };
                }
                (
                    entry.source_url.clone(),
                    entry.requester_id,
                    entry.request_channel_id,
                    Some(entry.clone()),
                )
            }
            Candidate::Fallback(url) => (url.clone(), None, None, None),
        };

        let resolver = self.resolver.clone();
        let want_download = self.config.download_media;
        let q = query.clone();
        let task = tokio::spawn(async move { resolver.resolve(&q, want_download).await });
        self.track_resolve(task.abort_handle());

        let result = match task.await {
            Ok(result) => result,
            Err(_) => return ResolveOutcome::Cancelled,
        };

        match result {
            Ok(resolved) => {
                let meta = match resolved {
                    Resolved::Single(meta) => meta,
                    Resolved::Playlist(mut list) if !list.is_empty() => list.remove(0),
                    Resolved::Playlist(_) => {
                        warn!(guild = %self.guild_id, query = %query, "resolver returned empty playlist");
                        return ResolveOutcome::Failed;
                    }
                };
                let media_url = meta
                    .media_url
                    .clone()
                    .unwrap_or_else(|| meta.source_url.clone());
                let entry = match known {
                    Some(mut entry) => {
                        if entry.duration_seconds == 0 {
                            entry.duration_seconds = meta.duration_seconds;
                        }
                        entry.download_state = DownloadState::Ready {
                            media_url: media_url.clone(),
                        };
                        entry
                    }
                    None => {
                        let mut entry = Entry::from_metadata(meta, requester, channel);
                        entry.download_state = DownloadState::Ready {
                            media_url: media_url.clone(),
                        };
                        entry
                    }
                };
                ResolveOutcome::Ready { entry, media_url }
            }
            Err(err) => {
                warn!(guild = %self.guild_id, query = %query, error = %err, "resolution failed");
                match candidate {
                    Candidate::Fallback(url) => {
                        // Bad filler is purged for every guild, durably.
                        {
                            let mut inner = self.inner.lock().await;
                            inner.fallback.forget(url);
                        }
                        if let Err(e) = self.autoplaylist.discard(url).await {
                            warn!(url = %url, error = %e, "failed to persist autoplaylist removal");
                        }
                    }
                    Candidate::Queued(entry) => {
                        let mut failed = entry.clone();
                        failed.download_state = DownloadState::Failed;
                        events::emit(
                            &self.events,
                            PlayerEvent::Error {
                                guild_id: self.guild_id,
                                entry: Some(failed),
                                message: err.to_string(),
                            },
                        );
                    }
                }
                ResolveOutcome::Failed
            }
        }
    }

    /// Commit a resolved entry: hand it to the transport and flip to
    /// Playing. Returns false when the caller should keep advancing.
    async fn start_playback(&self, entry: Entry, media_url: &str) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state == PlayerState::Dead || !inner.advancing {
            // Killed or stopped mid-resolve. Put a user-requested entry
            // back so an explicit stop does not eat it.
            if inner.state != PlayerState::Dead && !entry.is_autoplaylist() {
                inner.queue.push_front(entry);
            }
            return true;
        }
        let volume = inner.volume;
        match self.transport.begin(media_url, volume).await {
            Ok(handle) => {
                inner.current = Some(NowPlaying {
                    entry: entry.clone(),
                    handle,
                    started_at: Instant::now(),
                    played: Duration::ZERO,
                });
                inner.state = PlayerState::Playing;
                inner.votes.reset();
                inner.advancing = false;
                events::emit(
                    &self.events,
                    PlayerEvent::Play {
                        guild_id: self.guild_id,
                        entry,
                    },
                );
                let snapshot = snapshot_of(&inner);
                drop(inner);
                self.persist(snapshot);
                true
            }
            Err(err) => {
                warn!(guild = %self.guild_id, error = %err, "voice transport rejected track");
                events::emit(
                    &self.events,
                    PlayerEvent::Error {
                        guild_id: self.guild_id,
                        entry: Some(entry),
                        message: err.to_string(),
                    },
                );
                false
            }
        }
    }

    /// One driver tick: notice a finished track and move on.
    async fn poll_once(&self) -> bool {
        let advance = {
            let mut inner = self.inner.lock().await;
            if inner.state == PlayerState::Dead {
                return false;
            }
            let finished = inner.state == PlayerState::Playing
                && inner
                    .current
                    .as_ref()
                    .is_some_and(|now| now.handle.is_finished());
            if finished {
                if let Some(now) = inner.current.take() {
                    events::emit(
                        &self.events,
                        PlayerEvent::FinishedPlaying {
                            guild_id: self.guild_id,
                            entry: now.entry,
                        },
                    );
                }
                begin_advance(&mut inner)
            } else {
                false
            }
        };
        if advance {
            self.advance().await;
        }
        true
    }
}

enum Candidate {
    Queued(Entry),
    Fallback(String),
}

enum ResolveOutcome {
    Ready { entry: Entry, media_url: String },
    Failed,
    Cancelled,
}

/// Claim the right to advance. False means someone else already holds it
/// or there is a live track.
fn begin_advance(inner: &mut PlayerInner) -> bool {
    if inner.advancing || inner.state == PlayerState::Dead || inner.current.is_some() {
        return false;
    }
    inner.advancing = true;
    true
}

fn end_current(inner: &mut PlayerInner) -> Option<Entry> {
    inner.current.take().map(|now| {
        now.handle.stop();
        now.entry
    })
}

fn resume_current(inner: &mut PlayerInner) {
    if let Some(now) = &mut inner.current {
        now.handle.resume();
        now.started_at = Instant::now();
    }
    inner.state = PlayerState::Playing;
}

fn current_remaining(inner: &PlayerInner) -> Duration {
    match &inner.current {
        Some(now) if now.entry.duration_seconds > 0 => {
            let mut elapsed = now.played;
            if inner.state == PlayerState::Playing {
                elapsed += now.started_at.elapsed();
            }
            Duration::from_secs(u64::from(now.entry.duration_seconds)).saturating_sub(elapsed)
        }
        _ => Duration::ZERO,
    }
}

/// Votes needed to skip: the configured ratio of active listeners, rounded
/// up, never more than the configured cap, never less than one.
fn required_skips(listeners: usize, config: &PlayerConfig) -> usize {
    let by_ratio = (config.skip_ratio * listeners as f32).ceil() as u32;
    by_ratio.min(config.max_skips).max(1) as usize
}

fn snapshot_of(inner: &PlayerInner) -> QueueSnapshot {
    // Autoplaylist filler is never persisted; a restart should not replay
    // it.
    QueueSnapshot {
        entries: inner
            .queue
            .entries()
            .filter(|e| !e.is_autoplaylist())
            .map(SavedEntry::from)
            .collect(),
        current_entry: inner
            .current
            .as_ref()
            .map(|now| &now.entry)
            .filter(|e| !e.is_autoplaylist())
            .map(SavedEntry::from),
    }
}

/// One saver per player: snapshots apply in order, and a failed save is
/// logged and skipped; the next trigger effectively retries.
fn spawn_saver(
    guild_id: GuildId,
    store: Arc<QueuePersistence>,
) -> mpsc::UnboundedSender<QueueSnapshot> {
    let (tx, mut rx) = mpsc::unbounded_channel::<QueueSnapshot>();
    tokio::spawn(async move {
        while let Some(snapshot) = rx.recv().await {
            if let Err(e) = store.save(guild_id, &snapshot).await {
                warn!(guild = %guild_id, error = %e, "queue snapshot save failed");
            }
        }
    });
    tx
}

fn spawn_driver(player: &Arc<MusicPlayer>) -> JoinHandle<()> {
    let weak = Arc::downgrade(player);
    let poll_interval = player.config.poll_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let Some(player) = weak.upgrade() else {
                break;
            };
            if !player.poll_once().await {
                break;
            }
        }
    })
}
