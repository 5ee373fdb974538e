//! Smoke binary: feeds URLs from the command line through a full
//! registry/player stack with a pass-through resolver and a timed fake
//! transport, printing every lifecycle event as a JSON line. The real chat
//! gateway and voice stack live in the host application.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info};

use minstrel::{
    Autoplaylist, ChannelId, ExtractionError, GuildId, MediaResolver, Permissions, PlayerConfig,
    PlayerRegistry, PlayerState, QueuePersistence, Resolved, ResumePolicy, TrackHandle,
    TrackMetadata, TransportError, UserId, VoiceTransport, event_channel, read_database_url,
};

/// Treats every query as a directly playable URL; no extraction, no
/// download.
struct PassthroughResolver;

#[async_trait]
impl MediaResolver for PassthroughResolver {
    async fn resolve(&self, query: &str, _want_download: bool) -> Result<Resolved, ExtractionError> {
        Ok(Resolved::Single(TrackMetadata {
            source_url: query.to_string(),
            title: query.to_string(),
            duration_seconds: 0,
            media_url: Some(query.to_string()),
        }))
    }
}

/// Pretends every track takes a fixed wall-clock time to play out.
struct TimedTransport {
    track_seconds: u64,
}

struct TimedHandle {
    deadline: Instant,
    stopped: AtomicBool,
}

impl TrackHandle for TimedHandle {
    fn is_finished(&self) -> bool {
        self.stopped.load(Ordering::Relaxed) || Instant::now() >= self.deadline
    }
    fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }
    fn pause(&self) {}
    fn resume(&self) {}
    fn set_volume(&self, _volume: f32) {}
}

#[async_trait]
impl VoiceTransport for TimedTransport {
    async fn begin(
        &self,
        media_url: &str,
        _volume: f32,
    ) -> Result<Box<dyn TrackHandle>, TransportError> {
        info!("streaming {media_url}");
        Ok(Box::new(TimedHandle {
            deadline: Instant::now() + Duration::from_secs(self.track_seconds),
            stopped: AtomicBool::new(false),
        }))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let database_url = read_database_url()?;
    info!("using database at {database_url}");
    let autoplaylist = Arc::new(Autoplaylist::load(database_url.clone()).await?);
    let persistence = Arc::new(QueuePersistence::open(database_url)?);

    let (events, mut rx) = event_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => error!("failed to encode event: {e}"),
            }
        }
    });

    let registry = PlayerRegistry::new(
        PlayerConfig::from_env(),
        Arc::new(PassthroughResolver),
        autoplaylist,
        Some(persistence),
        events,
    );
    let transport = Arc::new(TimedTransport { track_seconds: 3 });
    let player = registry
        .get_or_create(GuildId(1), transport, ResumePolicy::RestoreSnapshot)
        .await;

    for query in std::env::args().skip(1) {
        match player
            .enqueue(&query, UserId(1), ChannelId(1), &Permissions::default())
            .await
        {
            Ok(_) => info!("queued {query}"),
            Err(e) => error!("could not queue {query}: {e}"),
        }
    }
    // Covers a restored snapshot and the autoplaylist-only case; queued
    // arguments have already started playback on their own.
    if player.state().await == PlayerState::Stopped {
        if let Err(e) = player.play().await {
            info!("nothing to play: {e}");
        }
    }

    // Run until the player drains.
    loop {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let state = player.state().await;
        if state == PlayerState::Stopped || state == PlayerState::Dead {
            break;
        }
    }
    registry.shutdown().await;
    printer.abort();
    Ok(())
}
