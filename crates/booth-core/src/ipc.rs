use serde::{Deserialize, Serialize};

/// Operator inputs accepted over IPC. These are the external triggers only;
/// timer and completion triggers are internal to the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputAction {
    Click,
    Fullscreen,
    Setup,
    Pause,
    BurstPhoto,
}

/// What the display should show. Sent to every registered display client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "screen")]
pub enum Screen {
    #[serde(rename = "card")]
    Card { kind: String, text: String },
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "pause")]
    Pause,
    /// Camera preview for framing; `device` is the capture device in use.
    #[serde(rename = "setup")]
    Setup { device: String },
    #[serde(rename = "captured_image")]
    CapturedImage { path: String },
    #[serde(rename = "clear_captured_image")]
    ClearCapturedImage,
}

/// Messages from daemon to displays/clients (JSON-lines over Unix socket).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DaemonMsg {
    #[serde(rename = "screen")]
    Screen { screen: Screen },
    #[serde(rename = "toggle_fullscreen")]
    ToggleFullscreen,
    /// Shutter cue sent right before each picture. Not part of the screen
    /// state, so late displays never get it replayed.
    #[serde(rename = "flash")]
    Flash,
    /// Status response.
    #[serde(rename = "status")]
    Status {
        state: String,
        activity_delay_ms: u64,
        cards_remaining: usize,
        version: String,
    },
    /// Acknowledgement for commands.
    #[serde(rename = "ack")]
    Ack { ok: bool, message: String },
}

/// Messages from displays/clients to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMsg {
    /// Operator input, handled like a local key press.
    #[serde(rename = "input")]
    Input { action: InputAction },
    /// Request current status.
    #[serde(rename = "get_status")]
    GetStatus,
    /// Display client announcing itself (receives Screen/ToggleFullscreen).
    #[serde(rename = "register_display")]
    RegisterDisplay,
}

/// Serialize a message as a JSON line (with trailing newline).
pub fn encode(msg: &impl Serialize) -> String {
    let mut s = serde_json::to_string(msg).unwrap_or_else(|_| String::from("{}"));
    s.push('\n');
    s
}

/// Deserialize a JSON line. Returns None on empty/whitespace input.
pub fn decode_daemon(line: &str) -> Option<DaemonMsg> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

pub fn decode_client(line: &str) -> Option<ClientMsg> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}
