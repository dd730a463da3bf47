//! Where dicecast keeps its two files
//!
//! dicecast reads one TOML config and one sqlite database. The config file is
//! found first; it may then point the database somewhere else.
//!
//! | File | First match wins |
//! |------|------------------|
//! | config | `--config` flag, `DICECAST_CONFIG`, `$XDG_CONFIG_HOME/dicecast/dicecast.toml`, `~/.config/dicecast/dicecast.toml` |
//! | database | `DICECAST_DB`, `db_path` in the config (relative to the config's directory), `$XDG_DATA_HOME/dicecast/dicecast.db`, `~/.local/share/dicecast/dicecast.db` |
//!
//! Empty env vars count as unset.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

const APP_DIR: &str = "dicecast";
const CONFIG_FILE: &str = "dicecast.toml";
const DB_FILE: &str = "dicecast.db";

/// Resolved locations for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub config: PathBuf,
    pub db: PathBuf,
}

impl Paths {
    /// Database location for a loaded config file
    pub fn for_config(config: PathBuf, configured_db: Option<&Path>) -> Self {
        let db = db_file_with(&env_lookup, &config, configured_db);
        Self { config, db }
    }

    /// Create the database's parent directory if it is missing
    pub fn ensure_db_dir(&self) -> Result<()> {
        let Some(parent) = self.db.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };
        if !parent.exists() {
            debug!(dir = %parent.display(), "creating database directory");
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        Ok(())
    }

    pub fn log(&self) {
        info!(
            config = %self.config.display(),
            db = %self.db.display(),
            "resolved paths"
        );
    }
}

/// Config file to read, honoring an explicit `--config` first
pub fn config_file(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| config_file_with(&env_lookup))
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn xdg_dir(
    env: &dyn Fn(&str) -> Option<String>,
    xdg_var: &str,
    home_fallback: &str,
) -> PathBuf {
    if let Some(base) = env(xdg_var) {
        return PathBuf::from(base).join(APP_DIR);
    }
    match env("HOME") {
        Some(home) => PathBuf::from(home).join(home_fallback).join(APP_DIR),
        None => PathBuf::from("."),
    }
}

fn config_file_with(env: &dyn Fn(&str) -> Option<String>) -> PathBuf {
    env("DICECAST_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| xdg_dir(env, "XDG_CONFIG_HOME", ".config").join(CONFIG_FILE))
}

fn db_file_with(
    env: &dyn Fn(&str) -> Option<String>,
    config: &Path,
    configured: Option<&Path>,
) -> PathBuf {
    if let Some(path) = env("DICECAST_DB") {
        return PathBuf::from(path);
    }
    match configured {
        Some(path) if path.is_relative() => config
            .parent()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|| path.to_path_buf()),
        Some(path) => path.to_path_buf(),
        None => xdg_dir(env, "XDG_DATA_HOME", ".local/share").join(DB_FILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned()
    }

    #[test]
    fn test_config_file_priority() {
        let env = env_of(&[
            ("HOME", "/home/gm"),
            ("XDG_CONFIG_HOME", "/xdg"),
            ("DICECAST_CONFIG", "/etc/dicecast.toml"),
        ]);
        assert_eq!(config_file_with(&env), PathBuf::from("/etc/dicecast.toml"));

        let env = env_of(&[("HOME", "/home/gm"), ("XDG_CONFIG_HOME", "/xdg")]);
        assert_eq!(config_file_with(&env), PathBuf::from("/xdg/dicecast/dicecast.toml"));

        let env = env_of(&[("HOME", "/home/gm"), ("XDG_CONFIG_HOME", "")]);
        assert_eq!(
            config_file_with(&env),
            PathBuf::from("/home/gm/.config/dicecast/dicecast.toml")
        );

        assert_eq!(
            config_file_with(&env_of(&[])),
            PathBuf::from("./dicecast.toml")
        );
    }

    #[test]
    fn test_explicit_config_wins() {
        let path = PathBuf::from("/tmp/session.toml");
        assert_eq!(config_file(Some(path.clone())), path);
    }

    #[test]
    fn test_db_follows_config() {
        let env = env_of(&[("HOME", "/home/gm")]);
        let config = Path::new("/srv/table/dicecast.toml");

        assert_eq!(
            db_file_with(&env, config, Some(Path::new("rolls.db"))),
            PathBuf::from("/srv/table/rolls.db")
        );
        assert_eq!(
            db_file_with(&env, config, Some(Path::new("/var/lib/dice.db"))),
            PathBuf::from("/var/lib/dice.db")
        );
        assert_eq!(
            db_file_with(&env, config, None),
            PathBuf::from("/home/gm/.local/share/dicecast/dicecast.db")
        );
    }

    #[test]
    fn test_db_env_overrides_config() {
        let env = env_of(&[("DICECAST_DB", "/fast/disk.db"), ("XDG_DATA_HOME", "/xdg")]);
        let config = Path::new("/srv/table/dicecast.toml");
        assert_eq!(
            db_file_with(&env, config, Some(Path::new("rolls.db"))),
            PathBuf::from("/fast/disk.db")
        );

        let env = env_of(&[("XDG_DATA_HOME", "/xdg")]);
        assert_eq!(
            db_file_with(&env, config, None),
            PathBuf::from("/xdg/dicecast/dicecast.db")
        );
    }

    #[test]
    fn test_ensure_db_dir_creates_parent() -> Result<()> {
        let root = std::env::temp_dir().join(format!("dicecast-paths-{}", std::process::id()));
        let paths = Paths {
            config: root.join(CONFIG_FILE),
            db: root.join("nested").join(DB_FILE),
        };

        paths.ensure_db_dir()?;
        assert!(root.join("nested").is_dir());

        std::fs::remove_dir_all(&root)?;
        Ok(())
    }
}
