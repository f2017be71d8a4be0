use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the marker directory created inside every indexed project.
/// Must match the wrapper script (pit.sh) if changed.
pub const MARKER_DIR: &str = ".pit";

const STORE_FILE: &str = "index.json";
const LOCK_FILE: &str = "index.lock";
const RELAY_FILE: &str = "pit.tmp";
const CONFIG_FILE: &str = "config.toml";

const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Unable to resolve home directory; set PIT_HOME to an absolute path")]
    NoHome,
}

/// Optional overrides read from `<home>/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Marker names whose presence flags the parent directory as a project.
    pub snitches: Option<Vec<String>>,
    /// Allowed pit groups.
    pub groups: Option<Vec<String>>,
    /// How long a mutating command waits for the store lock before giving up.
    pub lock_timeout_ms: Option<u64>,
}

/// Resolved runtime configuration. Built once at startup and passed by
/// reference to every component; there is no process-wide config state.
#[derive(Debug, Clone)]
pub struct PitConfig {
    /// The tool's own directory (store, lock, relay and config files).
    pub home: PathBuf,
    /// The reserved directory that can never be indexed as a project.
    pub forbidden: PathBuf,
    pub snitches: Vec<String>,
    pub groups: Vec<String>,
    pub lock_timeout_ms: u64,
}

impl PitConfig {
    /// Resolves the pit home and applies the `config.toml` overlay if one
    /// exists.
    pub fn load() -> Result<Self, ConfigError> {
        let home = resolve_pit_home()?;
        Self::at_home(home)
    }

    pub fn at_home(home: PathBuf) -> Result<Self, ConfigError> {
        let overlay = load_config_file(&home.join(CONFIG_FILE))?;
        let forbidden = home.parent().map(Path::to_path_buf).unwrap_or_else(|| home.clone());
        Ok(Self {
            forbidden,
            snitches: overlay
                .snitches
                .unwrap_or_else(|| default_snitches().map(str::to_string).to_vec()),
            groups: overlay
                .groups
                .unwrap_or_else(|| default_groups().map(str::to_string).to_vec()),
            lock_timeout_ms: overlay.lock_timeout_ms.unwrap_or(DEFAULT_LOCK_TIMEOUT_MS),
            home,
        })
    }

    pub fn store_path(&self) -> PathBuf {
        self.home.join(STORE_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.home.join(LOCK_FILE)
    }

    pub fn relay_path(&self) -> PathBuf {
        self.home.join(RELAY_FILE)
    }
}

pub fn default_snitches() -> [&'static str; 3] {
    [MARKER_DIR, ".git", ".idea"]
}

pub fn default_groups() -> [&'static str; 2] {
    ["env", "url"]
}

pub fn resolve_pit_home() -> Result<PathBuf, ConfigError> {
    if let Ok(value) = std::env::var("PIT_HOME") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }
    home_dir()
        .map(|home| home.join(".pit"))
        .ok_or(ConfigError::NoHome)
}

fn home_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    if let Ok(profile) = std::env::var("USERPROFILE") {
        let trimmed = profile.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    None
}

fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    if !path.is_file() {
        return Ok(ConfigFile::default());
    }
    let text = fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn at_home_uses_defaults_without_config_file() {
        let temp = TempDir::new().expect("tempdir");
        let home = temp.path().join(".pit");
        let config = PitConfig::at_home(home.clone()).expect("config");
        assert_eq!(config.home, home);
        assert_eq!(config.forbidden, temp.path());
        assert_eq!(config.snitches, vec![".pit", ".git", ".idea"]);
        assert_eq!(config.groups, vec!["env", "url"]);
        assert_eq!(config.lock_timeout_ms, DEFAULT_LOCK_TIMEOUT_MS);
    }

    #[test]
    fn at_home_applies_config_overlay() {
        let temp = TempDir::new().expect("tempdir");
        let home = temp.path().join(".pit");
        fs::create_dir_all(&home).expect("home dir");
        fs::write(
            home.join("config.toml"),
            "snitches = [\".pit\"]\ngroups = [\"env\", \"url\", \"mail\"]\nlock_timeout_ms = 250\n",
        )
        .expect("config file");

        let config = PitConfig::at_home(home).expect("config");
        assert_eq!(config.snitches, vec![".pit"]);
        assert_eq!(config.groups, vec!["env", "url", "mail"]);
        assert_eq!(config.lock_timeout_ms, 250);
    }

    #[test]
    fn derived_paths_live_under_home() {
        let temp = TempDir::new().expect("tempdir");
        let home = temp.path().join(".pit");
        let config = PitConfig::at_home(home.clone()).expect("config");
        assert_eq!(config.store_path(), home.join("index.json"));
        assert_eq!(config.lock_path(), home.join("index.lock"));
        assert_eq!(config.relay_path(), home.join("pit.tmp"));
    }

    #[test]
    fn resolve_pit_home_prefers_env_override() {
        let _guard = ENV_LOCK.lock().expect("env lock");
        let previous = std::env::var_os("PIT_HOME");
        std::env::set_var("PIT_HOME", "/tmp/pit-home-override");
        let home = resolve_pit_home().expect("home");
        assert_eq!(home, PathBuf::from("/tmp/pit-home-override"));
        match previous {
            Some(value) => std::env::set_var("PIT_HOME", value),
            None => std::env::remove_var("PIT_HOME"),
        }
    }
}
