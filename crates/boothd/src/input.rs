use crate::state_machine::{State, Trigger};
use anyhow::{Context, Result};
use booth_core::ipc::InputAction;
use evdev::{Device, EventType, Key};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Find keyboards and pointers under /dev/input/.
pub fn find_input_devices() -> Result<Vec<PathBuf>> {
    let mut devices = Vec::new();
    let input_dir = Path::new("/dev/input");

    for entry in std::fs::read_dir(input_dir).context("reading /dev/input")? {
        let entry = entry?;
        let path = entry.path();

        // Only look at eventN devices
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if !name.starts_with("event") {
            continue;
        }

        match Device::open(&path) {
            Ok(dev) => {
                if is_keyboard(&dev) || is_pointer(&dev) {
                    info!(path = %path.display(), name = ?dev.name(), "found input device");
                    devices.push(path);
                }
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping device");
            }
        }
    }

    Ok(devices)
}

/// Heuristic: a keyboard has the letter keys the booth listens to.
fn is_keyboard(dev: &Device) -> bool {
    let Some(keys) = dev.supported_keys() else {
        return false;
    };
    keys.contains(Key::KEY_F)
        && keys.contains(Key::KEY_S)
        && keys.contains(Key::KEY_P)
        && keys.contains(Key::KEY_B)
}

fn is_pointer(dev: &Device) -> bool {
    dev.supported_keys()
        .map_or(false, |keys| keys.contains(Key::BTN_LEFT))
}

/// Map a key event to an operator action. Only fresh presses count:
/// releases (0) and auto-repeats (2) are dropped here.
pub fn map_key(code: u16, value: i32) -> Option<InputAction> {
    if value != 1 {
        return None;
    }
    match Key::new(code) {
        Key::KEY_F => Some(InputAction::Fullscreen),
        Key::KEY_S => Some(InputAction::Setup),
        Key::KEY_P => Some(InputAction::Pause),
        Key::KEY_B => Some(InputAction::BurstPhoto),
        Key::KEY_ENTER | Key::KEY_SPACE | Key::BTN_LEFT => Some(InputAction::Click),
        _ => None,
    }
}

/// Turn an operator action into a trigger. Clicks only count on the start
/// card; anywhere else they are dropped here, before reaching the machine.
pub fn trigger_for(action: InputAction, state: State) -> Option<Trigger> {
    match action {
        InputAction::Click if state != State::NotStarted => {
            debug!(%state, "click ignored: game already started");
            None
        }
        InputAction::Click => Some(Trigger::Click),
        InputAction::Fullscreen => Some(Trigger::KeyFullscreen),
        InputAction::Setup => Some(Trigger::KeySetup),
        InputAction::Pause => Some(Trigger::KeyPause),
        InputAction::BurstPhoto => Some(Trigger::KeyBurstPhoto),
    }
}

/// Read an input device and forward operator actions to the channel.
/// The device is not grabbed; other programs keep seeing the events.
/// Runs until the receiver is dropped or the device errors.
pub async fn read_device(path: PathBuf, tx: mpsc::UnboundedSender<InputAction>) -> Result<()> {
    let dev = Device::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let dev_name = dev.name().unwrap_or("unknown").to_string();
    info!(device = %dev_name, path = %path.display(), "reading input device");

    let mut stream = dev.into_event_stream().context("creating event stream")?;

    loop {
        match stream.next_event().await {
            Ok(event) => {
                if event.event_type() != EventType::KEY {
                    continue;
                }
                if let Some(action) = map_key(event.code(), event.value()) {
                    debug!(device = %dev_name, ?action, "input");
                    if tx.send(action).is_err() {
                        // Receiver dropped, shut down
                        break;
                    }
                }
            }
            Err(e) => {
                warn!(device = %dev_name, error = %e, "device error, stopping reader");
                break;
            }
        }
    }

    Ok(())
}
