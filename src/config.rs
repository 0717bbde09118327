use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

fn default_starting_health() -> f64 {
    75.0
}

fn default_max_allowed_minutes() -> u32 {
    1440
}

fn default_base_healing_minutes() -> u32 {
    60
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_ttl_minutes() -> i64 {
    60
}

fn default_world_path() -> PathBuf {
    PathBuf::from("worlds/default.yaml")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Tunables shared by every game session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRules {
    #[serde(default = "default_starting_health")]
    pub starting_health: f64,
    #[serde(default = "default_max_allowed_minutes")]
    pub max_allowed_minutes: u32,
    #[serde(default = "default_base_healing_minutes")]
    pub base_healing_minutes: u32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            starting_health: default_starting_health(),
            max_allowed_minutes: default_max_allowed_minutes(),
            base_healing_minutes: default_base_healing_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
    /// Persist snapshots as JSON files here instead of keeping them in memory.
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
}

impl SessionConfig {
    /// Session lifetime; rejects non-positive or out-of-range values.
    pub fn ttl(&self) -> Result<chrono::Duration> {
        ensure!(
            self.ttl_minutes > 0,
            "session.ttl_minutes must be positive, got {}",
            self.ttl_minutes
        );
        chrono::Duration::try_minutes(self.ttl_minutes).with_context(|| {
            format!(
                "session.ttl_minutes {} is out of range",
                self.ttl_minutes
            )
        })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            snapshot_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    #[serde(default = "default_world_path")]
    pub path: PathBuf,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            path: default_world_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Master seed for session randomness; OS entropy when omitted.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub rules: GameRules,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse configuration")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Loads `path` when given, otherwise falls back to built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config.rules, GameRules::default());
        assert_eq!(config.rules.starting_health, 75.0);
        assert_eq!(config.rules.max_allowed_minutes, 1440);
        assert_eq!(config.rules.base_healing_minutes, 60);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.session.ttl_minutes, 60);
        assert!(config.session.snapshot_dir.is_none());
        assert!(config.seed.is_none());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let yaml = r#"
seed: 9
rules:
  starting_health: 100.0
server:
  port: 8080
logging:
  level: debug
"#;
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.rules.starting_health, 100.0);
        assert_eq!(config.rules.max_allowed_minutes, 1440);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn config_file_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = AppConfig::default();
        config.rules.max_allowed_minutes = 600;
        std::fs::write(&path, serde_yaml::to_string(&config).unwrap()).unwrap();

        let loaded = AppConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(loaded.rules.max_allowed_minutes, 600);
    }

    #[test]
    fn session_ttl_must_be_positive_and_in_range() {
        let mut session = SessionConfig::default();
        assert_eq!(session.ttl().unwrap(), chrono::Duration::minutes(60));

        session.ttl_minutes = 0;
        assert!(session.ttl().is_err());
        session.ttl_minutes = -5;
        assert!(session.ttl().is_err());
        session.ttl_minutes = i64::MAX;
        let err = session.ttl().unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn missing_config_file_reports_path() {
        let err = AppConfig::load("does/not/exist.yaml").unwrap_err();
        assert!(format!("{err:#}").contains("does/not/exist.yaml"));
    }
}
