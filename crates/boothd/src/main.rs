mod camera;
mod controller;
mod deck;
mod input;
mod ipc_server;
mod presenter;
mod state_machine;
mod timer;

use anyhow::{Context, Result};
use booth_core::config::{self, Config};
use camera::CommandCamera;
use clap::Parser;
use controller::GameController;
use deck::JsonDeckLoader;
use ipc_server::IpcContext;
use presenter::{BroadcastPresenter, DisplayRegistry};
use std::path::PathBuf;
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "boothd", about = "Photo booth game daemon")]
struct Cli {
    /// Config file (defaults to $BOOTH_CONFIG or ~/.config/booth/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("boothd=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    info!("boothd starting");

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("loading config")?;
    let language = config.general.language();
    info!(language = language.code(), deck = %config.general.deck_path.display(), "config loaded");

    let displays = DisplayRegistry::default();
    let mut controller = GameController::new(
        &config,
        Box::new(CommandCamera::new(&config.capture, language)),
        Box::new(BroadcastPresenter::new(displays.clone(), language)),
        Box::new(JsonDeckLoader::new(config.general.deck_path.clone())),
    );
    controller.mount().await.context("mounting game")?;

    // Every input source (keyboards, pointers, IPC) feeds this one channel
    let (input_tx, input_rx) = mpsc::unbounded_channel();

    if config.input.enabled {
        match input::find_input_devices() {
            Ok(devices) if devices.is_empty() => {
                warn!("no input devices found; check permissions (group 'input'), IPC still works");
            }
            Ok(devices) => {
                for path in devices {
                    let tx = input_tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = input::read_device(path.clone(), tx).await {
                            error!(path = %path.display(), error = %e, "input reader failed");
                        }
                    });
                }
            }
            Err(e) => warn!(error = %e, "could not scan input devices"),
        }
    } else {
        info!("local input disabled in config");
    }

    // Start IPC listener
    let socket_path = config::socket_path();
    // Remove stale socket
    let _ = std::fs::remove_file(&socket_path);
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let listener = UnixListener::bind(&socket_path)
        .with_context(|| format!("binding socket {}", socket_path.display()))?;
    // Displays and boothctl may run as another user
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o666)).ok();
    }
    info!(path = %socket_path.display(), "IPC socket listening");

    tokio::spawn(ipc_server::serve(
        listener,
        IpcContext {
            inputs: input_tx,
            status: controller.status(),
            displays,
        },
    ));

    tokio::select! {
        _ = controller.run(input_rx) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "could not listen for ctrl-c");
            }
            info!("interrupt received");
        }
    }

    info!(state = %controller.state(), "boothd shutting down");
    controller.shutdown();
    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}
