//! Types shared between the game server and its clients: the text-line
//! protocol messages, the cell alphabet of the map, and the game constants.
//!
//! The wire format is plain text over UDP. Every datagram carries exactly
//! one message; the first word identifies the message type.

use std::fmt;

/// Maximum number of concurrent player slots (one per letter glyph).
pub const MAX_PLAYERS: usize = 26;
/// Total amount of gold distributed across the map at startup.
pub const GOLD_TOTAL: u32 = 250;
/// Minimum number of gold piles placed at startup.
pub const GOLD_MIN_PILES: u32 = 10;
/// Maximum number of gold piles placed at startup.
pub const GOLD_MAX_PILES: u32 = 30;
/// Sight radius in cells (straight-line distance from the viewpoint).
pub const VISIBILITY_RADIUS: f64 = 5.0;

/// Walkable room cell.
pub const FLOOR: char = '.';
/// Cell holding an uncollected gold pile.
pub const GOLD_PILE: char = '*';
/// Unseen / outside-the-map cell.
pub const BLANK: char = ' ';
/// Narrow-passage cell.
pub const CORRIDOR: char = '#';
/// Row terminator in the flat map buffer.
pub const SEPARATOR: char = '\n';

/// Returns true for room boundary characters (walls, roofs, corners).
pub fn is_boundary(c: char) -> bool {
    matches!(c, '-' | '|' | '+')
}

/// Returns true for cells recorded in the wall index: boundaries and
/// corridor markers. These are the targets of the visibility raycast.
pub fn is_obstruction(c: char) -> bool {
    is_boundary(c) || c == CORRIDOR
}

/// Returns true for cells that stop a line of sight.
pub fn is_blocking(c: char) -> bool {
    is_obstruction(c) || c == BLANK
}

/// Returns true for cells a player may step onto.
pub fn is_walkable(c: char) -> bool {
    !is_boundary(c) && c != BLANK && c != SEPARATOR
}

/// Messages sent from clients to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// `PLAY <name>` - join as a player with the given display name.
    Play { name: String },
    /// `SPECTATE` - become (or replace) the spectator.
    Spectate,
    /// `KEY <char>` - a single-character command.
    Key { key: char },
}

impl ClientMessage {
    /// Parses one datagram's text. Returns `None` for malformed or
    /// unrecognized messages; the caller logs and ignores those.
    pub fn parse(text: &str) -> Option<ClientMessage> {
        let text = text.trim_end_matches(['\r', '\n']);

        if let Some(name) = text.strip_prefix("PLAY ") {
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            return Some(ClientMessage::Play {
                name: name.to_string(),
            });
        }

        if text == "SPECTATE" {
            return Some(ClientMessage::Spectate);
        }

        if let Some(rest) = text.strip_prefix("KEY ") {
            let mut chars = rest.chars();
            let key = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            return Some(ClientMessage::Key { key });
        }

        None
    }
}

/// Messages sent from the server to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// `OK <glyph>` - join accepted, assigned glyph.
    Joined { glyph: char },
    /// `GRID <height> <width>` - map dimensions, sent once per joiner.
    Grid { height: usize, width: usize },
    /// `DISPLAY\n<map-text>` - full per-recipient map snapshot.
    Display { map: String },
    /// `GOLD <picked_up> <purse> <remaining>` - gold-state update.
    Gold {
        picked_up: u32,
        purse: u32,
        remaining: u32,
    },
    /// `QUIT <message>` - session end notice.
    Quit { message: String },
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Joined { glyph } => write!(f, "OK {}", glyph),
            ServerMessage::Grid { height, width } => write!(f, "GRID {} {}", height, width),
            ServerMessage::Display { map } => write!(f, "DISPLAY\n{}", map),
            ServerMessage::Gold {
                picked_up,
                purse,
                remaining,
            } => write!(f, "GOLD {} {} {}", picked_up, purse, remaining),
            ServerMessage::Quit { message } => write!(f, "QUIT {}", message),
        }
    }
}
