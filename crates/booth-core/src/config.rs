use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cards::Language;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub burst: BurstConfig,
    #[serde(default)]
    pub input: InputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "GeneralConfig::default_language")]
    pub language: String,
    #[serde(default = "GeneralConfig::default_deck_path")]
    pub deck_path: PathBuf,
}

impl GeneralConfig {
    fn default_language() -> String { "en".into() }
    fn default_deck_path() -> PathBuf { Config::config_dir().join("cards.json") }

    /// Active card language; unsupported codes fall back to English.
    pub fn language(&self) -> Language {
        Language::from_code(&self.language)
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            language: Self::default_language(),
            deck_path: Self::default_deck_path(),
        }
    }
}

/// Inter-activity delays. The first activity fires right after the start
/// click; each completed activity grows the wait by `step_delay_ms`, capped
/// at `max_delay_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "ScheduleConfig::default_start")]
    pub start_delay_ms: u64,
    #[serde(default = "ScheduleConfig::default_step")]
    pub step_delay_ms: u64,
    #[serde(default = "ScheduleConfig::default_max")]
    pub max_delay_ms: u64,
    /// Deferral for an activity timer that fires during setup or pause, and
    /// the quick re-attempt after a failed burst.
    #[serde(default = "ScheduleConfig::default_retry")]
    pub retry_delay_ms: u64,
}

impl ScheduleConfig {
    fn default_start() -> u64 { 10 * 60 * 1000 }
    fn default_step() -> u64 { 2 * 60 * 1000 }
    fn default_max() -> u64 { 25 * 60 * 1000 }
    fn default_retry() -> u64 { 1000 }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            start_delay_ms: Self::default_start(),
            step_delay_ms: Self::default_step(),
            max_delay_ms: Self::default_max(),
            retry_delay_ms: Self::default_retry(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "CaptureConfig::default_first_shot")]
    pub first_shot_delay_ms: u64,
    #[serde(default = "CaptureConfig::default_between")]
    pub between_pictures_ms: u64,
    #[serde(default = "CaptureConfig::default_device")]
    pub device: PathBuf,
    /// Capture program argv. `{device}` and `{output}` are substituted.
    #[serde(default = "CaptureConfig::default_command")]
    pub command: Vec<String>,
    #[serde(default = "CaptureConfig::default_output_dir")]
    pub output_dir: PathBuf,
    /// A capture still running after this long is killed and counts as no picture.
    #[serde(default = "CaptureConfig::default_timeout")]
    pub timeout_ms: u64,
}

impl CaptureConfig {
    fn default_first_shot() -> u64 { 5000 }
    fn default_between() -> u64 { 2000 }
    fn default_device() -> PathBuf { PathBuf::from("/dev/video0") }
    fn default_command() -> Vec<String> {
        ["fswebcam", "-d", "{device}", "--no-banner", "-r", "1920x1080", "{output}"]
            .into_iter()
            .map(Into::into)
            .collect()
    }
    fn default_timeout() -> u64 { 10_000 }
    fn default_output_dir() -> PathBuf {
        dirs::picture_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("booth")
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            first_shot_delay_ms: Self::default_first_shot(),
            between_pictures_ms: Self::default_between(),
            device: Self::default_device(),
            command: Self::default_command(),
            output_dir: Self::default_output_dir(),
            timeout_ms: Self::default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurstConfig {
    /// Wait between automatic burst shots.
    #[serde(default = "BurstConfig::default_interval")]
    pub interval_ms: u64,
    /// How long a burst shot stays on screen.
    #[serde(default = "BurstConfig::default_show")]
    pub show_ms: u64,
}

impl BurstConfig {
    fn default_interval() -> u64 { 10_000 }
    fn default_show() -> u64 { 3000 }
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            interval_ms: Self::default_interval(),
            show_ms: Self::default_show(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Read local keyboards through evdev. IPC input is always available.
    #[serde(default = "InputConfig::default_enabled")]
    pub enabled: bool,
}

impl InputConfig {
    fn default_enabled() -> bool { true }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("booth")
    }

    pub fn config_path() -> PathBuf {
        // BOOTH_CONFIG env var overrides the default location.
        if let Ok(path) = std::env::var("BOOTH_CONFIG") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let config: Config = toml::from_str(&contents).with_context(|| "parsing config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schedule.start_delay_ms > self.schedule.max_delay_ms {
            anyhow::bail!(
                "schedule.start_delay_ms ({}) exceeds schedule.max_delay_ms ({})",
                self.schedule.start_delay_ms,
                self.schedule.max_delay_ms
            );
        }
        if self.capture.command.is_empty() {
            anyhow::bail!("capture.command must name a program");
        }
        if self.capture.timeout_ms == 0 {
            anyhow::bail!("capture.timeout_ms must be greater than zero");
        }
        Ok(())
    }
}

pub fn socket_path() -> PathBuf {
    // BOOTH_SOCK env var overrides for testing.
    // Default: /run/booth/booth.sock (created by RuntimeDirectory=booth in systemd).
    if let Ok(path) = std::env::var("BOOTH_SOCK") {
        return PathBuf::from(path);
    }
    PathBuf::from("/run/booth/booth.sock")
}
