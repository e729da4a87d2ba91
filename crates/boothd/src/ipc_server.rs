use crate::controller::StatusSnapshot;
use crate::presenter::DisplayRegistry;
use booth_core::ipc::{self, ClientMsg, DaemonMsg, InputAction};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// What IPC handlers can reach. Inputs go through the same channel as local
/// key presses, so the controller sees one ordered stream.
#[derive(Clone)]
pub struct IpcContext {
    pub inputs: mpsc::UnboundedSender<InputAction>,
    pub status: watch::Receiver<StatusSnapshot>,
    pub displays: DisplayRegistry,
}

/// Accept clients forever, one task per connection.
pub async fn serve(listener: UnixListener, ctx: IpcContext) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                tokio::spawn(handle_client(stream, ctx.clone()));
            }
            Err(e) => {
                warn!(error = %e, "IPC accept error");
            }
        }
    }
}

async fn handle_client(stream: UnixStream, ctx: IpcContext) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    // Channel for sending messages back to this client
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let write_handle = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut is_display = false;

    while let Ok(Some(line)) = lines.next_line().await {
        let Some(msg) = ipc::decode_client(&line) else {
            debug!(line = %line.trim(), "ignoring unparseable IPC line");
            continue;
        };

        let reply = match msg {
            ClientMsg::Input { action } => {
                info!(?action, "input via IPC");
                match ctx.inputs.send(action) {
                    Ok(()) => DaemonMsg::Ack { ok: true, message: format!("{:?} queued", action) },
                    Err(_) => DaemonMsg::Ack { ok: false, message: "game loop is not running".into() },
                }
            }
            ClientMsg::GetStatus => {
                let snapshot = *ctx.status.borrow();
                DaemonMsg::Status {
                    state: snapshot.state.as_str().to_string(),
                    activity_delay_ms: snapshot.activity_delay_ms,
                    cards_remaining: snapshot.cards_remaining,
                    version: env!("CARGO_PKG_VERSION").to_string(),
                }
            }
            ClientMsg::RegisterDisplay => match ctx.displays.register(tx.clone()) {
                Ok(()) => {
                    is_display = true;
                    info!(displays = ctx.displays.len(), "display registered via IPC");
                    DaemonMsg::Ack { ok: true, message: "display registered".into() }
                }
                Err(e) => DaemonMsg::Ack { ok: false, message: e.to_string() },
            },
        };
        let _ = tx.send(ipc::encode(&reply));
    }

    // Replies already queued still go out; the writer ends once every
    // sender is gone.
    drop(tx);
    if is_display {
        // The registry keeps a sender for this client. The writer stops at the
        // first failed write, and the registry drops the sender on the
        // broadcast after that.
        debug!("display client stopped sending; keeping its screen stream");
    } else {
        let _ = write_handle.await;
    }
}
