//! Overlay configuration
//!
//! Defaults work out of the box; a TOML file can override any of them:
//!
//! ```toml
//! relay_addr = "127.0.0.1:7878"
//! db_path = "dicecast.db"   # relative to this file
//!
//! [display]
//! hide_after_ms = 5000
//! advance_after_ms = 8000
//! max_pending = 50
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::channel::DEFAULT_ROOM_CAPACITY;
use crate::sequencer::{SequencerConfig, DEFAULT_ADVANCE_AFTER, DEFAULT_HIDE_AFTER};

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP relay listen address
    pub relay_addr: SocketAddr,
    /// Serve the relay at all (off when rolls come from elsewhere in-process)
    pub relay_enabled: bool,
    /// Sqlite database; relative paths resolve against the config's directory
    pub db_path: Option<PathBuf>,
    /// Messages buffered per channel room
    pub room_capacity: usize,
    pub display: DisplayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relay_addr: SocketAddr::from(([127, 0, 0, 1], 7878)),
            relay_enabled: true,
            db_path: None,
            room_capacity: DEFAULT_ROOM_CAPACITY,
            display: DisplayConfig::default(),
        }
    }
}

/// Roll display timing, in milliseconds as written in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// How long a roll stays visible
    pub hide_after_ms: u64,
    /// Time between one roll appearing and the next
    pub advance_after_ms: u64,
    /// Drop the oldest pending roll beyond this many (unset = unbounded)
    pub max_pending: Option<usize>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            hide_after_ms: DEFAULT_HIDE_AFTER.as_millis() as u64,
            advance_after_ms: DEFAULT_ADVANCE_AFTER.as_millis() as u64,
            max_pending: None,
        }
    }
}

impl DisplayConfig {
    pub fn sequencer(&self) -> SequencerConfig {
        SequencerConfig {
            hide_after: Duration::from_millis(self.hide_after_ms),
            advance_after: Duration::from_millis(self.advance_after_ms),
            max_pending: self.max_pending,
        }
    }
}

impl Config {
    /// Load config from a TOML file, falling back to defaults if it is missing
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!("config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("failed to load {}", path.display()))?;

        tracing::info!(
            hide_after_ms = config.display.hide_after_ms,
            advance_after_ms = config.display.advance_after_ms,
            "loaded config from {}",
            path.display()
        );

        Ok(config)
    }

    /// Parse and validate TOML content
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("failed to parse config")?;
        config.display.sequencer().validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.relay_addr.port(), 7878);
        assert!(config.relay_enabled);
        assert_eq!(config.display.sequencer(), SequencerConfig::default());
    }

    #[test]
    fn test_parse_partial_file() -> Result<()> {
        let config = Config::parse(
            r#"
            relay_addr = "0.0.0.0:9000"

            [display]
            hide_after_ms = 2000
            max_pending = 10
            "#,
        )?;

        assert_eq!(config.relay_addr.port(), 9000);
        assert_eq!(config.db_path, None);
        let seq = config.display.sequencer();
        assert_eq!(seq.hide_after, Duration::from_secs(2));
        assert_eq!(seq.advance_after, DEFAULT_ADVANCE_AFTER);
        assert_eq!(seq.max_pending, Some(10));
        Ok(())
    }

    #[test]
    fn test_parse_rejects_backwards_timing() {
        let result = Config::parse(
            r#"
            [display]
            hide_after_ms = 9000
            advance_after_ms = 8000
            "#,
        );
        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("invalid display timing"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() -> Result<()> {
        let config = Config::load("/definitely/not/here/dicecast.toml")?;
        assert_eq!(config.display, DisplayConfig::default());
        Ok(())
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let path = std::env::temp_dir().join(format!("dicecast-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "relay_enabled = false\nroom_capacity = 8\ndb_path = \"table.db\"\n",
        )?;

        let config = Config::load(&path)?;
        assert!(!config.relay_enabled);
        assert_eq!(config.room_capacity, 8);
        assert_eq!(config.db_path, Some(PathBuf::from("table.db")));

        std::fs::remove_file(&path)?;
        Ok(())
    }
}
