use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;
use machine_motion::ControllerEndpoint;
use serde::{Deserialize, Serialize};
use utilities::tcp_channel::ChannelTimeouts;

use crate::{
    command_executor::{CONNECT_TIMEOUT, READ_TIMEOUT, WRITE_TIMEOUT, stage::TransportPolicy},
    controller::{
        readiness::POLL_INTERVAL,
        sequencer::{ONE_SHOT_SETTLE_DELAY, READY_TIMEOUT, SETTLE_DELAY, SequencerConfig},
    },
};

pub const DEFAULT_CONFIG_PATH: &str = "vention_controller.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found at {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to read configuration file: {source}")]
    ReadError { source: std::io::Error },

    #[error("Failed to parse configuration: {source}")]
    ParseError { source: toml::de::Error },

    #[error("Failed to serialize configuration: {source}")]
    SerializeError { source: toml::ser::Error },

    #[error("Failed to write configuration file: {source}")]
    WriteError { source: std::io::Error },

    #[error("Configuration validation failed: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: "192.168.7.2".to_string(),
            port: 9999,
            connect_timeout_ms: CONNECT_TIMEOUT.as_millis() as u64,
            read_timeout_ms: READ_TIMEOUT.as_millis() as u64,
            write_timeout_ms: WRITE_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MotionConfig {
    pub axis: u32,
    pub ready_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub settle_delay_ms: u64,
    pub one_shot_settle_delay_ms: u64,
    pub transport_policy: TransportPolicy,
    pub queue_depth: usize,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            axis: 1,
            ready_timeout_ms: READY_TIMEOUT.as_millis() as u64,
            poll_interval_ms: POLL_INTERVAL.as_millis() as u64,
            settle_delay_ms: SETTLE_DELAY.as_millis() as u64,
            one_shot_settle_delay_ms: ONE_SHOT_SETTLE_DELAY.as_millis() as u64,
            transport_policy: TransportPolicy::default(),
            queue_depth: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub socket_path: PathBuf,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/tmp/vention_controller.sock"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mode {
    /// Serve requests from the intake socket until interrupted.
    #[default]
    Service,
    /// Visit `positions` in order, then exit.
    OneShot { positions: Vec<f64> },
}

impl Mode {
    pub fn one_shot() -> Self {
        Mode::OneShot {
            positions: vec![100.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub controller: ControllerConfig,
    pub motion: MotionConfig,
    pub intake: IntakeConfig,
    pub mode: Mode,
}

impl Config {
    pub fn endpoint(&self) -> ControllerEndpoint {
        ControllerEndpoint::new(self.controller.host.clone(), self.controller.port)
    }

    pub fn channel_timeouts(&self) -> ChannelTimeouts {
        ChannelTimeouts {
            connect: Duration::from_millis(self.controller.connect_timeout_ms),
            read: Duration::from_millis(self.controller.read_timeout_ms),
            write: Duration::from_millis(self.controller.write_timeout_ms),
        }
    }

    /// One-shot runs settle for the shorter one-shot delay.
    pub fn sequencer_config(&self) -> SequencerConfig {
        let settle_delay_ms = match self.mode {
            Mode::Service => self.motion.settle_delay_ms,
            Mode::OneShot { .. } => self.motion.one_shot_settle_delay_ms,
        };

        SequencerConfig {
            ready_timeout: Duration::from_millis(self.motion.ready_timeout_ms),
            poll_interval: Duration::from_millis(self.motion.poll_interval_ms),
            settle_delay: Duration::from_millis(settle_delay_ms),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::ValidationError {
                message: message.to_string(),
            })
        };

        if self.controller.host.trim().is_empty() {
            return invalid("controller host must not be empty");
        }
        if self.controller.port == 0 {
            return invalid("controller port must not be zero");
        }
        if self.motion.poll_interval_ms == 0 {
            return invalid("poll interval must not be zero");
        }
        if self.motion.queue_depth == 0 {
            return invalid("queue depth must not be zero");
        }
        if let Mode::OneShot { positions } = &self.mode {
            if positions.iter().any(|p| !p.is_finite()) {
                return invalid("one-shot positions must be finite numbers");
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct ConfigOptions {
    pub config_path: PathBuf,
    pub create_if_missing: bool,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            create_if_missing: false,
        }
    }
}

impl ConfigOptions {
    pub fn default_config_path() -> PathBuf {
        std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
pub struct ConfigManager {
    options: ConfigOptions,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::with_options(ConfigOptions::default())
    }

    pub fn with_options(options: ConfigOptions) -> Self {
        Self { options }
    }

    pub fn path(&self) -> &Path {
        &self.options.config_path
    }

    pub fn load(&self) -> anyhow::Result<Config> {
        let config_path = &self.options.config_path;

        if !config_path.exists() {
            if self.options.create_if_missing {
                let default_config = Config::default();
                self.save(&default_config)
                    .context("Failed to save default config")?;
                return Ok(default_config);
            }

            return Err(ConfigError::FileNotFound {
                path: config_path.clone(),
            }
            .into());
        }

        let content =
            fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError { source: e })?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError { source: e })?;

        config.validate()?;

        Ok(config)
    }

    pub fn save(&self, config: &Config) -> anyhow::Result<()> {
        let config_path = &self.options.config_path;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError { source: e })?;
        }

        let content = toml::to_string_pretty(config)
            .map_err(|e| ConfigError::SerializeError { source: e })?;

        fs::write(config_path, content).map_err(|e| ConfigError::WriteError { source: e })?;

        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

pub fn init_config() -> anyhow::Result<(ConfigManager, Config)> {
    init_config_with_options(ConfigOptions::default())
}

pub fn init_config_with_options(options: ConfigOptions) -> anyhow::Result<(ConfigManager, Config)> {
    let manager = ConfigManager::with_options(options);
    let config = manager.load()?;
    Ok((manager, config))
}

pub fn create_default_config<P: AsRef<Path>>(path: Option<P>) -> anyhow::Result<()> {
    let config_path = path
        .map(|p| p.as_ref().to_path_buf())
        .unwrap_or_else(ConfigOptions::default_config_path);

    ConfigManager::with_options(ConfigOptions {
        config_path,
        create_if_missing: true,
    })
    .save(&Config::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_controller_timing() {
        let config = Config::default();

        assert_eq!(config.endpoint().to_string(), "192.168.7.2:9999");
        assert_eq!(config.channel_timeouts(), ChannelTimeouts::default());
        assert_eq!(config.sequencer_config(), SequencerConfig::default());
        assert_eq!(config.motion.transport_policy, TransportPolicy::Coalesce);
        config.validate().unwrap();
    }

    #[test]
    fn one_shot_uses_short_settle_delay() {
        let config = Config {
            mode: Mode::one_shot(),
            ..Default::default()
        };

        assert_eq!(config.sequencer_config().settle_delay, Duration::from_secs(1));
        assert_eq!(config.sequencer_config().ready_timeout, Duration::from_secs(10));
    }

    #[test]
    fn saves_and_loads_config() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_options(ConfigOptions::with_path(
            dir.path().join("nested/controller.toml"),
        ));

        let mut config = Config::default();
        config.controller.host = "10.0.0.5".to_string();
        config.motion.transport_policy = TransportPolicy::Strict;
        config.mode = Mode::OneShot {
            positions: vec![12.5, 0.0, -3.0],
        };

        manager.save(&config).unwrap();

        assert_eq!(manager.load().unwrap(), config);
    }

    #[test]
    fn missing_sections_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(
            &path,
            "[controller]\nhost = \"stage.local\"\n\n[mode]\nkind = \"one_shot\"\npositions = [5.0]\n",
        )
        .unwrap();

        let (_manager, config) = init_config_with_options(ConfigOptions::with_path(&path)).unwrap();

        assert_eq!(config.controller.host, "stage.local");
        assert_eq!(config.controller.port, 9999);
        assert_eq!(config.motion, MotionConfig::default());
        assert_eq!(
            config.mode,
            Mode::OneShot {
                positions: vec![5.0]
            }
        );
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = ConfigManager::with_options(ConfigOptions::with_path(&path))
            .load()
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::FileNotFound { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn creates_missing_file_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("created.toml");

        let config = ConfigManager::with_options(ConfigOptions {
            config_path: path.clone(),
            create_if_missing: true,
        })
        .load()
        .unwrap();

        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn create_default_config_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.toml");

        create_default_config(Some(&path)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("[controller]"));
        assert!(content.contains("kind = \"service\""));
    }

    #[test]
    fn rejects_invalid_values() {
        let cases: Vec<Box<dyn Fn(&mut Config)>> = vec![
            Box::new(|c| c.controller.host = " ".to_string()),
            Box::new(|c| c.controller.port = 0),
            Box::new(|c| c.motion.poll_interval_ms = 0),
            Box::new(|c| c.motion.queue_depth = 0),
            Box::new(|c| {
                c.mode = Mode::OneShot {
                    positions: vec![1.0, f64::NAN],
                }
            }),
        ];

        for mutate in cases {
            let mut config = Config::default();
            mutate(&mut config);
            assert!(matches!(
                config.validate(),
                Err(ConfigError::ValidationError { .. })
            ));
        }
    }

    #[test]
    fn unparseable_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[controller\nport = \"nine\"").unwrap();

        let err = ConfigManager::with_options(ConfigOptions::with_path(&path))
            .load()
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::ParseError { .. })
        ));
    }
}
