use anyhow::{Context, Result};
use booth_core::config;
use booth_core::ipc::{self, ClientMsg, DaemonMsg, InputAction, Screen};
use clap::{Parser, Subcommand};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;

#[derive(Parser)]
#[command(name = "boothctl", about = "Control the boothd daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the game (same as clicking the start card)
    Click,
    /// Toggle fullscreen on every display
    Fullscreen,
    /// Enter or leave camera setup
    Setup,
    /// Pause or resume the game
    Pause,
    /// Start or stop burst photo mode
    Burst,
    /// Show daemon status
    Status,
    /// Register as a display and print every screen the daemon sends
    Watch,
}

impl Command {
    fn message(&self) -> ClientMsg {
        let action = match self {
            Command::Click => InputAction::Click,
            Command::Fullscreen => InputAction::Fullscreen,
            Command::Setup => InputAction::Setup,
            Command::Pause => InputAction::Pause,
            Command::Burst => InputAction::BurstPhoto,
            Command::Status => return ClientMsg::GetStatus,
            Command::Watch => return ClientMsg::RegisterDisplay,
        };
        ClientMsg::Input { action }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let socket_path = config::socket_path();
    let stream = UnixStream::connect(&socket_path)
        .with_context(|| format!("connecting to boothd at {}\nIs the daemon running?", socket_path.display()))?;

    let mut writer = stream.try_clone().context("cloning stream")?;
    let reader = BufReader::new(stream);

    let line = ipc::encode(&cli.command.message());
    writer
        .write_all(line.as_bytes())
        .context("sending command")?;

    let watching = matches!(cli.command, Command::Watch);

    for line in reader.lines() {
        let line = line.context("reading response")?;
        let Some(resp) = ipc::decode_daemon(&line) else {
            continue;
        };
        match resp {
            DaemonMsg::Status {
                state,
                activity_delay_ms,
                cards_remaining,
                version,
            } => {
                println!("boothd v{}", version);
                println!("  state:      {}", state);
                println!("  next delay: {}", format_delay(activity_delay_ms));
                println!("  cards left: {}", cards_remaining);
            }
            DaemonMsg::Ack { ok, message } => {
                if !ok {
                    eprintln!("error: {}", message);
                    std::process::exit(1);
                }
                if !watching {
                    println!("{}", message);
                }
            }
            DaemonMsg::Screen { screen } => println!("{}", describe(&screen)),
            DaemonMsg::ToggleFullscreen => println!("[fullscreen toggled]"),
            DaemonMsg::Flash => println!("[flash]"),
        }
        if !watching {
            break;
        }
    }

    Ok(())
}

fn describe(screen: &Screen) -> String {
    match screen {
        Screen::Card { kind, text } => format!("[card:{}] {}", kind, single_line(text)),
        Screen::Idle => "[idle]".into(),
        Screen::Pause => "[paused]".into(),
        Screen::Setup { device } => format!("[setup] previewing {}", device),
        Screen::CapturedImage { path } => format!("[picture] {}", path),
        Screen::ClearCapturedImage => "[picture cleared]".into(),
    }
}

/// Card texts may span several lines; `watch` prints one line per screen.
fn single_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" / ")
}

fn format_delay(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}m{:02}s", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_become_inputs() {
        match Command::Burst.message() {
            ClientMsg::Input { action } => assert_eq!(action, InputAction::BurstPhoto),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(Command::Status.message(), ClientMsg::GetStatus));
        assert!(matches!(Command::Watch.message(), ClientMsg::RegisterDisplay));
    }

    #[test]
    fn delay_is_minutes_and_seconds() {
        assert_eq!(format_delay(720_000), "12m00s");
        assert_eq!(format_delay(1_000), "0m01s");
    }

    #[test]
    fn screens_are_one_line_each() {
        let card = Screen::Card { kind: "photo".into(), text: "Group hug".into() };
        assert_eq!(describe(&card), "[card:photo] Group hug");
        assert_eq!(describe(&Screen::Idle), "[idle]");
    }

    #[test]
    fn multi_line_card_text_is_joined() {
        let card = Screen::Card { kind: "none".into(), text: "Welcome!\nClick to start\r\n".into() };
        let line = describe(&card);
        assert_eq!(line, "[card:none] Welcome! / Click to start");
        assert!(!line.contains('\n'));
    }

    #[test]
    fn start_card_prints_on_one_line() {
        let text = booth_core::cards::start_card()
            .text_for(booth_core::cards::Language::En)
            .to_string();
        let line = describe(&Screen::Card { kind: "none".into(), text });
        assert_eq!(line.lines().count(), 1);
    }
}
