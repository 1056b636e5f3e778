use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::host::HostCommand;
use crate::model::Emoji;
use crate::stats::PlotType;

#[derive(Parser)]
#[command(name = "pollcast")]
#[command(version)]
#[command(about = "Host, join or review a live quiz/poll session from the terminal")]
pub struct Args {
    /// Deployment base URL for REST and channel traffic (overrides config and env)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run a session as host: navigate questions and watch the room
    Host {
        /// Project to load; also used as the room id
        project_id: String,
    },
    /// Join a room as guest: see questions, chat, answer and react
    Guest {
        /// Room (project) id to join
        room_id: String,
    },
    /// Print the stats snapshot of a finished session
    Stats {
        project_id: String,

        /// Which view to print
        #[arg(long, value_enum, default_value_t = PlotType::Answers)]
        view: PlotType,
    },
}

/// One parsed line of host console input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostInput {
    Command(HostCommand),
    Quit,
}

/// Parse a host console line. Unknown input yields `None`.
pub fn parse_host_line(line: &str) -> Option<HostInput> {
    let cmd = match line.trim() {
        "next" | "n" | ">" => HostCommand::Advance { forward: true },
        "prev" | "p" | "<" => HostCommand::Advance { forward: false },
        "start" => HostCommand::StartBroadcasting,
        "stop" => HostCommand::StopBroadcasting,
        "quit" | "q" => return Some(HostInput::Quit),
        other => HostCommand::React(other.parse::<Emoji>().ok()?),
    };
    Some(HostInput::Command(cmd))
}

/// One parsed line of guest console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestInput {
    Chat(String),
    /// Zero-based option index.
    Answer(usize),
    Emoji(Emoji),
    Quit,
}

/// Parse a guest console line.
///
/// Slash commands: `/answer <n>` (1-based), `/emoji <token>`, `/quit`.
/// Anything else, including an empty line, is chat.
pub fn parse_guest_line(line: &str) -> Result<GuestInput, String> {
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(GuestInput::Chat(line.to_string()));
    };
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("quit"), None) => Ok(GuestInput::Quit),
        (Some("answer"), Some(n)) => match n.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(GuestInput::Answer(n - 1)),
            _ => Err(format!("not an option number: {n}")),
        },
        (Some("emoji"), Some(token)) => token
            .parse::<Emoji>()
            .map(GuestInput::Emoji)
            .map_err(|e| e.to_string()),
        _ => Err(format!("unknown command: /{rest}")),
    }
}
