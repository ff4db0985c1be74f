//! Site configuration at ~/.config/congregation/config.toml
//!
//! Values are layered: built-in defaults, then the config file, then
//! `CONGREGATION__SECTION__KEY` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::constants::DEFAULT_FAN_OUT;
use crate::error::{CongregationError, CongregationResult};
use crate::service::EventSettings;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 4180;
static DEFAULT_STALE_TIME: &str = "5m";
static DEFAULT_LOCAL_DIR: &str = "~/.local/share/congregation/uploads";
static DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Everything in process; data is lost on restart
    #[default]
    Memory,
    Firebase,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendSettings {
    #[serde(default)]
    pub kind: BackendKind,
    /// JSON tree loaded into the memory store at startup
    pub seed_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FirebaseSettings {
    pub database_url: Option<String>,
    pub api_key: Option<String>,
    pub storage_bucket: Option<String>,
    /// Database secret or ID token sent with every database request
    pub database_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_local_dir")]
    pub local_dir: PathBuf,
    /// Where `local_dir` is served from
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

fn default_local_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LOCAL_DIR)
}

fn default_public_base_url() -> String {
    format!("http://{DEFAULT_HOST}:{DEFAULT_PORT}/files/")
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            local_dir: default_local_dir(),
            public_base_url: default_public_base_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsSettings {
    #[serde(default = "default_fan_out")]
    pub fan_out: usize,
    /// e.g. "5m", "30s"
    #[serde(default = "default_stale_time")]
    pub stale_time: String,
}

fn default_fan_out() -> usize {
    DEFAULT_FAN_OUT
}

fn default_stale_time() -> String {
    DEFAULT_STALE_TIME.to_string()
}

impl Default for EventsSettings {
    fn default() -> Self {
        EventsSettings {
            fan_out: default_fan_out(),
            stale_time: default_stale_time(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub firebase: FirebaseSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub events: EventsSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn config_path() -> CongregationResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CongregationError::Config("Could not determine config directory".into()))?
            .join("congregation");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default location, writing a commented default file
    /// first if there is none.
    pub fn load() -> CongregationResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> CongregationResult<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("CONGREGATION")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CongregationError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CongregationError::Config(e.to_string()))?;

        settings.event_settings()?;
        Ok(settings)
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> CongregationResult<()> {
        let contents = format!(
            "\
# congregation site configuration

[server]
# host = \"{DEFAULT_HOST}\"
# port = {DEFAULT_PORT}

[backend]
# \"memory\" keeps everything in process, \"firebase\" uses the hosted services
# kind = \"memory\"
# seed_file = \"~/congregation-seed.json\"

[firebase]
# database_url = \"https://your-project-default-rtdb.firebaseio.com\"
# api_key = \"...\"
# storage_bucket = \"your-project.appspot.com\"

[storage]
# Uploads for the memory backend
# local_dir = \"{DEFAULT_LOCAL_DIR}\"
# public_base_url = \"{}\"

[events]
# Upcoming dates listed per weekly event:
# fan_out = {DEFAULT_FAN_OUT}
# How long listings are reused before the store is read again:
# stale_time = \"{DEFAULT_STALE_TIME}\"

[logging]
# level = \"{DEFAULT_LOG_LEVEL}\"
",
            default_public_base_url()
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CongregationError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| CongregationError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    pub fn event_settings(&self) -> CongregationResult<EventSettings> {
        if self.events.fan_out == 0 {
            return Err(CongregationError::Config(
                "events.fan_out must be at least 1".into(),
            ));
        }
        let stale_time: Duration = humantime::parse_duration(&self.events.stale_time).map_err(|e| {
            CongregationError::Config(format!(
                "Invalid events.stale_time '{}': {e}",
                self.events.stale_time
            ))
        })?;
        Ok(EventSettings {
            fan_out: self.events.fan_out,
            stale_time,
        })
    }

    /// Upload directory with `~` expanded.
    pub fn local_dir(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.storage.local_dir.to_string_lossy()).into_owned();
        PathBuf::from(expanded)
    }

    pub fn seed_file(&self) -> Option<PathBuf> {
        self.backend
            .seed_file
            .as_ref()
            .map(|p| PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).into_owned()))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(settings.server.port, DEFAULT_PORT);
        assert_eq!(settings.backend.kind, BackendKind::Memory);
        assert_eq!(
            settings.event_settings().unwrap(),
            EventSettings {
                fan_out: 4,
                stale_time: Duration::from_secs(300),
            }
        );
    }

    #[test]
    fn default_file_is_all_comments_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("congregation/config.toml");
        Settings::create_default_config(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("# fan_out = 4"));

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9000\n\n[backend]\nkind = \"firebase\"\n\n[events]\nfan_out = 6\nstale_time = \"30s\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.bind_address(), "127.0.0.1:9000");
        assert_eq!(settings.backend.kind, BackendKind::Firebase);
        let events = settings.event_settings().unwrap();
        assert_eq!(events.fan_out, 6);
        assert_eq!(events.stale_time, Duration::from_secs(30));
    }

    #[test]
    fn rejects_zero_fan_out_and_bad_durations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "[events]\nfan_out = 0\n").unwrap();
        assert!(matches!(
            Settings::load_from(&path),
            Err(CongregationError::Config(_))
        ));

        std::fs::write(&path, "[events]\nstale_time = \"soon\"\n").unwrap();
        assert!(matches!(
            Settings::load_from(&path),
            Err(CongregationError::Config(_))
        ));
    }
}
