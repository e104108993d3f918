//! Disconnect reasons and their player-facing messages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason code attached to a disconnect or a rejected join.
///
/// Codes the game uses without a named constant round-trip through
/// [`DisconnectReason::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// No reason given.
    None,
    /// Game is full.
    GameFull,
    /// Game already started.
    GameStarted,
    /// No game with that code.
    GameNotFound,
    /// Client is outdated.
    IncorrectVersion,
    /// Banned from the room.
    Banned,
    /// Kicked from the room.
    Kicked,
    /// Free-form message follows on the wire.
    Custom,
    /// Username refused.
    InvalidName,
    /// Anti-cheat ban.
    Hacking,
    /// Room destroyed.
    Destroy,
    /// Generic server error.
    Error,
    /// Wrong game for this server.
    IncorrectGame,
    /// Server asked the client to leave.
    ServerRequest,
    /// Server at capacity.
    ServerFull,
    /// App lost focus while backgrounded.
    FocusLostBackground,
    /// Player chose to leave.
    IntentionalLeaving,
    /// App lost focus.
    FocusLost,
    /// Replaced by a newer connection.
    NewConnection,
    /// Any other code.
    Other(u8),
}

impl DisconnectReason {
    /// Wire value.
    pub fn code(self) -> u8 {
        match self {
            DisconnectReason::None => 0x00,
            DisconnectReason::GameFull => 0x01,
            DisconnectReason::GameStarted => 0x02,
            DisconnectReason::GameNotFound => 0x03,
            DisconnectReason::IncorrectVersion => 0x05,
            DisconnectReason::Banned => 0x06,
            DisconnectReason::Kicked => 0x07,
            DisconnectReason::Custom => 0x08,
            DisconnectReason::InvalidName => 0x09,
            DisconnectReason::Hacking => 0x0a,
            DisconnectReason::Destroy => 0x10,
            DisconnectReason::Error => 0x11,
            DisconnectReason::IncorrectGame => 0x12,
            DisconnectReason::ServerRequest => 0x13,
            DisconnectReason::ServerFull => 0x14,
            DisconnectReason::FocusLostBackground => 0xcf,
            DisconnectReason::IntentionalLeaving => 0xd0,
            DisconnectReason::FocusLost => 0xd1,
            DisconnectReason::NewConnection => 0xd2,
            DisconnectReason::Other(code) => code,
        }
    }

    /// Text the official client shows for this code, if it has one.
    pub fn message(self) -> Option<&'static str> {
        let text = match self.code() {
            0x00 => "Forcibly disconnected from server. The remote sent a disconnect request.",
            0x01 => "The game you tried to join is full. Check with the host to see if you can join next round.",
            0x02 => "The game you tried to join already started. Check with the host to see if you can join next round.",
            0x03 | 0x0d => "Could not find the game you're looking for.",
            0x05 => "You are running an older version of the game. Please update to play with others.",
            0x06 => "You were banned from the room. You cannot rejoin that room.",
            0x07 => "You were kicked from the room. You can rejoin if the room hasn't started.",
            0x09 => "Server refused username",
            0x0a => "You were banned for hacking. Please stop.",
            0x0c => "You disconnected from the host. If this happens often, check your WiFi strength.",
            0x0e => "The server stopped this game. Possibly due to inactivity.",
            0x0f => "The Among Us servers are overloaded. Sorry! Please try again later!",
            _ => return None,
        };
        Some(text)
    }
}

impl From<u8> for DisconnectReason {
    fn from(code: u8) -> Self {
        match code {
            0x00 => DisconnectReason::None,
            0x01 => DisconnectReason::GameFull,
            0x02 => DisconnectReason::GameStarted,
            0x03 => DisconnectReason::GameNotFound,
            0x05 => DisconnectReason::IncorrectVersion,
            0x06 => DisconnectReason::Banned,
            0x07 => DisconnectReason::Kicked,
            0x08 => DisconnectReason::Custom,
            0x09 => DisconnectReason::InvalidName,
            0x0a => DisconnectReason::Hacking,
            0x10 => DisconnectReason::Destroy,
            0x11 => DisconnectReason::Error,
            0x12 => DisconnectReason::IncorrectGame,
            0x13 => DisconnectReason::ServerRequest,
            0x14 => DisconnectReason::ServerFull,
            0xcf => DisconnectReason::FocusLostBackground,
            0xd0 => DisconnectReason::IntentionalLeaving,
            0xd1 => DisconnectReason::FocusLost,
            0xd2 => DisconnectReason::NewConnection,
            other => DisconnectReason::Other(other),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(text) => write!(f, "{text}"),
            None => write!(f, "{self:?} ({:#04x})", self.code()),
        }
    }
}
