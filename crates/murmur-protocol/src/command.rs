//! In-band chat-line vocabulary.
//!
//! Control traffic rides the same channel as chat text. Lines starting
//! with `!` are control lines; everything else is plain chat. This module
//! owns all of the string matching so the session and registry layers
//! only ever see tagged variants.
//!
//! Client → server lines parse into [`Command`]; server → client lines
//! encode from (and parse back into) [`Notice`]. Notices that carry two
//! fields separate them with a tab, which display names cannot contain.

use std::fmt;

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// A chat line received from a client, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain chat text to broadcast.
    Chat(String),
    /// `!hello <name>` — register a display name after the handshake.
    Hello(String),
    /// `!disconnect` — orderly leave; the server answers with FIN teardown.
    Disconnect,
    /// `!change <name>` — switch display name.
    Change(String),
    /// `!kill <password>` — request server shutdown.
    Kill(String),
    /// A `!`-prefixed line that matches no known command.
    Unknown(String),
}

impl Command {
    /// Classifies one chat line. Never fails: unrecognized control lines
    /// become [`Command::Unknown`] so the server can answer with a notice
    /// instead of dropping the line.
    pub fn parse(line: &str) -> Self {
        let Some(rest) = line.strip_prefix('!') else {
            return Command::Chat(line.to_string());
        };

        let (verb, arg) = match rest.split_once(' ') {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (rest.trim(), ""),
        };

        match verb {
            "hello" if !arg.is_empty() => Command::Hello(arg.to_string()),
            "disconnect" => Command::Disconnect,
            "change" if !arg.is_empty() => Command::Change(arg.to_string()),
            "kill" => Command::Kill(arg.to_string()),
            _ => Command::Unknown(line.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// A line the server sends to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// `!chat <name>\t<text>` — a chat line from a named peer.
    Chat { from: String, text: String },
    /// `!joined <name>` — a peer registered a display name.
    Joined(String),
    /// `!left <name>` — a peer disconnected or was evicted.
    Left(String),
    /// `!notice <text>` — free-form server message.
    Server(String),
    /// `!kicked` — the receiving client itself is being removed.
    Kicked,
}

impl Notice {
    /// Parses a server line back into a notice. Returns `None` for lines
    /// that are not notices (clients treat those as raw text).
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('!')?;
        if rest == "kicked" {
            return Some(Notice::Kicked);
        }
        let (verb, arg) = rest.split_once(' ')?;
        match verb {
            "chat" => {
                let (from, text) = arg.split_once('\t')?;
                Some(Notice::Chat {
                    from: from.to_string(),
                    text: text.to_string(),
                })
            }
            "joined" => Some(Notice::Joined(arg.to_string())),
            "left" => Some(Notice::Left(arg.to_string())),
            "notice" => Some(Notice::Server(arg.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Chat { from, text } => write!(f, "!chat {from}\t{text}"),
            Notice::Joined(name) => write!(f, "!joined {name}"),
            Notice::Left(name) => write!(f, "!left {name}"),
            Notice::Server(text) => write!(f, "!notice {text}"),
            Notice::Kicked => write!(f, "!kicked"),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
