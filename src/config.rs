use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};

/// Tunables shared by every player the registry creates.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Fraction of active listeners whose votes force a skip.
    pub skip_ratio: f32,
    /// Hard cap on votes ever required, regardless of listener count.
    pub max_skips: u32,
    pub default_volume: f32,
    /// Pick autoplaylist fallback entries at random instead of in order.
    pub auto_playlist_random: bool,
    /// How often the driver task polls the transport for track completion.
    pub poll_interval: Duration,
    /// Ask the resolver to download media up front instead of streaming.
    pub download_media: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            skip_ratio: 0.5,
            max_skips: 4,
            default_volume: 0.5,
            auto_playlist_random: true,
            poll_interval: Duration::from_millis(500),
            download_media: false,
        }
    }
}

impl PlayerConfig {
    /// Build a config from `MINSTREL_*` environment variables, falling back
    /// to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_parse::<f32>("MINSTREL_SKIP_RATIO") {
            cfg.skip_ratio = v.clamp(0.0, 1.0);
        }
        if let Some(v) = env_parse::<u32>("MINSTREL_MAX_SKIPS") {
            cfg.max_skips = v.max(1);
        }
        if let Some(v) = env_parse::<f32>("MINSTREL_DEFAULT_VOLUME") {
            cfg.default_volume = v.clamp(0.01, 1.0);
        }
        if let Some(v) = env_parse::<bool>("MINSTREL_AUTOPLAYLIST_RANDOM") {
            cfg.auto_playlist_random = v;
        }
        if let Some(v) = env_parse::<u64>("MINSTREL_POLL_INTERVAL_MS") {
            cfg.poll_interval = Duration::from_millis(v.max(50));
        }
        if let Some(v) = env_parse::<bool>("MINSTREL_DOWNLOAD_MEDIA") {
            cfg.download_media = v;
        }
        cfg
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Per-request quota decisions, supplied opaquely by the caller's
/// permission layer. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default)]
pub struct Permissions {
    pub max_songs: Option<u32>,
    pub max_playlist_length: Option<u32>,
    /// Seconds.
    pub max_song_length: Option<u32>,
}

/// Resolve the sqlite database location for snapshots and the autoplaylist.
pub fn read_database_url() -> Result<String> {
    const CANDIDATES: &[&str] = &["DATABASE_URL", "MINSTREL_DATABASE_URL"];
    for key in CANDIDATES {
        if let Ok(val) = std::env::var(key)
            && !val.is_empty()
        {
            return Ok(val);
        }
    }
    let base = default_data_dir()?;
    std::fs::create_dir_all(&base)?;
    Ok(base.join("minstrel.sqlite3").to_string_lossy().into_owned())
}

fn default_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().ok_or_else(|| anyhow!("no data dir available on this system"))?;
    Ok(base.join("minstrel"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = PlayerConfig::default();
        assert!(cfg.skip_ratio > 0.0 && cfg.skip_ratio <= 1.0);
        assert!(cfg.max_skips >= 1);
        assert!(cfg.default_volume > 0.0 && cfg.default_volume <= 1.0);
    }

    #[test]
    fn permissions_default_to_unlimited() {
        let perms = Permissions::default();
        assert!(perms.max_songs.is_none());
        assert!(perms.max_playlist_length.is_none());
        assert!(perms.max_song_length.is_none());
    }
}
