use anyhow::{Context, Result};
use async_trait::async_trait;
use booth_core::cards::{Card, Language};
use booth_core::config::CaptureConfig;
use chrono::Local;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A started camera, ready to preview or capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    pub device: PathBuf,
}

/// What a capture is for.
#[derive(Debug, Clone, Copy)]
pub struct CaptureContext<'a> {
    pub card: &'a Card,
    pub surface: &'a Surface,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub path: PathBuf,
}

#[async_trait]
pub trait Camera: Send {
    /// Acquire the device. Fails when it is missing or not permitted.
    async fn start(&mut self) -> Result<Surface>;
    /// Take one picture. Best effort: failures are logged, not returned.
    async fn capture(&mut self, ctx: &CaptureContext<'_>) -> Option<CapturedImage>;
    /// Release the device. Safe to call when already stopped.
    fn stop(&mut self);
}

/// Camera backed by an external capture program (fswebcam by default).
pub struct CommandCamera {
    device: PathBuf,
    command: Vec<String>,
    output_dir: PathBuf,
    timeout: Duration,
    language: Language,
    active: Option<Surface>,
}

impl CommandCamera {
    pub fn new(config: &CaptureConfig, language: Language) -> Self {
        Self {
            device: config.device.clone(),
            command: config.command.clone(),
            output_dir: config.output_dir.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            language,
            active: None,
        }
    }

    fn output_path(&self, card: &Card) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d-%H%M%S%.3f");
        let name = format!("{}-{}.jpg", stamp, slug(card.text_for(self.language)));
        self.output_dir.join(name)
    }
}

#[async_trait]
impl Camera for CommandCamera {
    async fn start(&mut self) -> Result<Surface> {
        if !self.device.exists() {
            anyhow::bail!("capture device {} not available", self.device.display());
        }
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("creating {}", self.output_dir.display()))?;

        let surface = Surface { device: self.device.clone() };
        self.active = Some(surface.clone());
        info!(device = %self.device.display(), "camera started");
        Ok(surface)
    }

    async fn capture(&mut self, ctx: &CaptureContext<'_>) -> Option<CapturedImage> {
        if self.active.is_none() {
            warn!("capture requested while camera is stopped");
            return None;
        }

        let output = self.output_path(ctx.card);
        let device = ctx.surface.device.to_string_lossy();
        let output_str = output.to_string_lossy();
        let argv: Vec<String> = self
            .command
            .iter()
            .map(|arg| arg.replace("{device}", &device).replace("{output}", &output_str))
            .collect();
        let Some((program, args)) = argv.split_first() else {
            warn!("capture command is empty");
            return None;
        };

        debug!(program = %program, output = %output.display(), "capturing");
        let mut command = tokio::process::Command::new(program);
        // Dropping the status future on timeout kills the child.
        command.args(args).kill_on_drop(true);
        match tokio::time::timeout(self.timeout, command.status()).await {
            Ok(Ok(status)) if status.success() => {
                info!(path = %output.display(), "picture taken");
                Some(CapturedImage { path: output })
            }
            Ok(Ok(status)) => {
                warn!(%status, program = %program, "capture command failed");
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, program = %program, "could not run capture command");
                None
            }
            Err(_) => {
                warn!(
                    program = %program,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "capture command timed out and was killed"
                );
                None
            }
        }
    }

    fn stop(&mut self) {
        if let Some(surface) = self.active.take() {
            info!(device = %surface.device.display(), "camera stopped");
        }
    }
}

/// File-name-safe rendering of a card's text.
fn slug(text: &str) -> String {
    let mut out = String::new();
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
        if out.chars().count() >= 40 {
            break;
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "card".into()
    } else {
        trimmed.to_string()
    }
}
