use crate::camera::{CapturedImage, Surface};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use booth_core::cards::{Card, Language};
use booth_core::ipc::{self, DaemonMsg, Screen};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[async_trait]
pub trait Presenter: Send {
    fn render(&mut self, card: &Card) -> Result<()>;
    fn render_idle(&mut self) -> Result<()>;
    fn render_pause(&mut self) -> Result<()>;
    fn render_setup(&mut self, surface: &Surface) -> Result<()>;
    fn render_captured_image(&mut self, image: &CapturedImage) -> Result<()>;
    fn clear_captured_image(&mut self) -> Result<()>;
    /// Shutter cue before a picture. Best effort, like the capture itself.
    fn flash(&mut self);
    /// Never fails; displays that cannot go fullscreen ignore it.
    async fn toggle_fullscreen(&mut self);
}

#[derive(Default)]
struct Registry {
    clients: Vec<mpsc::UnboundedSender<String>>,
    /// Last screen line, replayed to displays that connect late.
    last_screen: Option<String>,
}

/// Connected display clients. Shared between the presenter and the IPC server.
#[derive(Clone, Default)]
pub struct DisplayRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl DisplayRegistry {
    pub fn register(&self, tx: mpsc::UnboundedSender<String>) -> Result<()> {
        let mut registry = self.inner.lock().map_err(|_| anyhow!("display registry poisoned"))?;
        if let Some(line) = &registry.last_screen {
            let _ = tx.send(line.clone());
        }
        registry.clients.push(tx);
        debug!(displays = registry.clients.len(), "display registered");
        Ok(())
    }

    /// Send to every display, dropping the ones that went away.
    /// Returns how many displays received the message.
    pub fn broadcast(&self, msg: &DaemonMsg) -> Result<usize> {
        let line = ipc::encode(msg);
        let mut registry = self.inner.lock().map_err(|_| anyhow!("display registry poisoned"))?;
        if matches!(msg, DaemonMsg::Screen { .. }) {
            registry.last_screen = Some(line.clone());
        }
        registry.clients.retain(|tx| tx.send(line.clone()).is_ok());
        Ok(registry.clients.len())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|r| r.clients.len()).unwrap_or(0)
    }
}

/// Presenter that streams screens to display clients as JSON lines.
pub struct BroadcastPresenter {
    displays: DisplayRegistry,
    language: Language,
}

impl BroadcastPresenter {
    pub fn new(displays: DisplayRegistry, language: Language) -> Self {
        Self { displays, language }
    }

    fn show(&self, screen: Screen) -> Result<()> {
        let reached = self.displays.broadcast(&DaemonMsg::Screen { screen: screen.clone() })?;
        debug!(?screen, displays = reached, "screen sent");
        Ok(())
    }
}

#[async_trait]
impl Presenter for BroadcastPresenter {
    fn render(&mut self, card: &Card) -> Result<()> {
        self.show(Screen::Card {
            kind: card.kind.clone(),
            text: card.text_for(self.language).to_string(),
        })
    }

    fn render_idle(&mut self) -> Result<()> {
        self.show(Screen::Idle)
    }

    fn render_pause(&mut self) -> Result<()> {
        self.show(Screen::Pause)
    }

    fn render_setup(&mut self, surface: &Surface) -> Result<()> {
        self.show(Screen::Setup {
            device: surface.device.to_string_lossy().into_owned(),
        })
    }

    fn render_captured_image(&mut self, image: &CapturedImage) -> Result<()> {
        self.show(Screen::CapturedImage {
            path: image.path.to_string_lossy().into_owned(),
        })
    }

    fn clear_captured_image(&mut self) -> Result<()> {
        self.show(Screen::ClearCapturedImage)
    }

    fn flash(&mut self) {
        if let Err(e) = self.displays.broadcast(&DaemonMsg::Flash) {
            warn!(error = %e, "flash cue not sent");
        }
    }

    async fn toggle_fullscreen(&mut self) {
        if let Err(e) = self.displays.broadcast(&DaemonMsg::ToggleFullscreen) {
            warn!(error = %e, "fullscreen request failed and was handled");
        }
    }
}
