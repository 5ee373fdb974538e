//! In-process fakes for the two external collaborators, plus a harness
//! wiring a registry to a throwaway sqlite database.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use minstrel::{
    Autoplaylist, EventReceiver, ExtractionError, MediaResolver, PlayerConfig, PlayerEvent,
    PlayerRegistry, QueuePersistence, Resolved, TrackHandle, TrackMetadata, TransportError,
    VoiceTransport, event_channel,
};

pub struct FakeResolver {
    tracks: Mutex<HashMap<String, Resolved>>,
    pub calls: AtomicUsize,
    delay: Mutex<Duration>,
}

impl FakeResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tracks: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn add_track(&self, query: &str, duration_seconds: u32) {
        self.tracks.lock().unwrap().insert(
            query.to_string(),
            Resolved::Single(track(query, duration_seconds)),
        );
    }

    pub fn add_playlist(&self, query: &str, items: &[(&str, u32)]) {
        let list = items.iter().map(|(url, d)| track(url, *d)).collect();
        self.tracks
            .lock()
            .unwrap()
            .insert(query.to_string(), Resolved::Playlist(list));
    }

    /// Make every resolve sleep, to give tests a window to race kill().
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn track(url: &str, duration_seconds: u32) -> TrackMetadata {
    TrackMetadata {
        source_url: url.to_string(),
        title: format!("title:{url}"),
        duration_seconds,
        media_url: Some(format!("media:{url}")),
    }
}

#[async_trait]
impl MediaResolver for FakeResolver {
    async fn resolve(&self, query: &str, _want_download: bool) -> Result<Resolved, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.tracks
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .ok_or_else(|| ExtractionError::new(query, "unresolvable"))
    }
}

#[derive(Default)]
pub struct FakeHandleState {
    pub media_url: Mutex<String>,
    pub finished: AtomicBool,
    pub stopped: AtomicBool,
    pub paused: AtomicBool,
    pub volume: Mutex<f32>,
}

struct FakeHandle {
    state: Arc<FakeHandleState>,
}

impl TrackHandle for FakeHandle {
    fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::SeqCst)
    }
    fn stop(&self) {
        self.state.stopped.store(true, Ordering::SeqCst);
    }
    fn pause(&self) {
        self.state.paused.store(true, Ordering::SeqCst);
    }
    fn resume(&self) {
        self.state.paused.store(false, Ordering::SeqCst);
    }
    fn set_volume(&self, volume: f32) {
        *self.state.volume.lock().unwrap() = volume;
    }
}

#[derive(Default)]
pub struct FakeTransport {
    pub current: Mutex<Option<Arc<FakeHandleState>>>,
    pub begun: AtomicUsize,
    pub fail_next: AtomicBool,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Let the currently streaming track run out.
    pub fn finish_current(&self) {
        if let Some(state) = self.current.lock().unwrap().as_ref() {
            state.finished.store(true, Ordering::SeqCst);
        }
    }

    pub fn current_media(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.media_url.lock().unwrap().clone())
    }

    pub fn current_state(&self) -> Option<Arc<FakeHandleState>> {
        self.current.lock().unwrap().clone()
    }

    pub fn begun_count(&self) -> usize {
        self.begun.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn begin(
        &self,
        media_url: &str,
        volume: f32,
    ) -> Result<Box<dyn TrackHandle>, TransportError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(TransportError::new("stream refused"));
        }
        let state = Arc::new(FakeHandleState::default());
        *state.media_url.lock().unwrap() = media_url.to_string();
        *state.volume.lock().unwrap() = volume;
        *self.current.lock().unwrap() = Some(state.clone());
        self.begun.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeHandle { state }))
    }
}

pub struct Harness {
    pub registry: PlayerRegistry,
    pub resolver: Arc<FakeResolver>,
    pub transport: Arc<FakeTransport>,
    pub autoplaylist: Arc<Autoplaylist>,
    pub persistence: Arc<QueuePersistence>,
    pub database_url: String,
    _dir: tempfile::TempDir,
}

pub fn test_config() -> PlayerConfig {
    PlayerConfig {
        poll_interval: Duration::from_millis(20),
        auto_playlist_random: false,
        ..PlayerConfig::default()
    }
}

pub async fn harness() -> (Harness, EventReceiver) {
    harness_with(test_config()).await
}

pub async fn harness_with(config: PlayerConfig) -> (Harness, EventReceiver) {
    let dir = tempfile::tempdir().unwrap();
    let database_url = dir
        .path()
        .join("minstrel.sqlite3")
        .to_string_lossy()
        .into_owned();
    build_harness(config, database_url, dir).await
}

/// Rebuild a registry over an existing database, as a process restart
/// would.
pub async fn reopen(old: Harness) -> (Harness, EventReceiver) {
    let Harness {
        database_url, _dir, ..
    } = old;
    build_harness(test_config(), database_url, _dir).await
}

async fn build_harness(
    config: PlayerConfig,
    database_url: String,
    dir: tempfile::TempDir,
) -> (Harness, EventReceiver) {
    let resolver = FakeResolver::new();
    let transport = FakeTransport::new();
    let autoplaylist = Arc::new(Autoplaylist::load(database_url.clone()).await.unwrap());
    let persistence = Arc::new(QueuePersistence::open(database_url.clone()).unwrap());
    let (events, receiver) = event_channel();
    let registry = PlayerRegistry::new(
        config,
        resolver.clone(),
        autoplaylist.clone(),
        Some(persistence.clone()),
        events,
    );
    (
        Harness {
            registry,
            resolver,
            transport,
            autoplaylist,
            persistence,
            database_url,
            _dir: dir,
        },
        receiver,
    )
}

/// Wait (bounded) for the next event matching `pred`; panics on timeout.
pub async fn wait_for<F>(rx: &mut EventReceiver, mut pred: F) -> PlayerEvent
where
    F: FnMut(&PlayerEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Drain everything currently buffered.
pub fn drain(rx: &mut EventReceiver) -> Vec<PlayerEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

pub fn is_play_of(event: &PlayerEvent, url: &str) -> bool {
    matches!(event, PlayerEvent::Play { entry, .. } if entry.source_url == url)
}

pub fn is_finished_of(event: &PlayerEvent, url: &str) -> bool {
    matches!(event, PlayerEvent::FinishedPlaying { entry, .. } if entry.source_url == url)
}
