#![warn(missing_docs)]
//! Protocol constants and pure helpers shared across the workspace.
//!
//! Nothing in this crate touches a socket. It holds the enumerations that the
//! wire format refers to by number, plus the small numeric codecs (room codes,
//! client versions, lerped positions, half floats) used by the frame codec.

pub mod codes;
pub mod disconnect;
pub mod enums;
pub mod float16;
pub mod lerp;
pub mod version;

pub use codes::{decode_code, encode_code, CodeError};
pub use disconnect::DisconnectReason;
pub use enums::{
    AlterGameTag, Colour, DeconState, GameEndReason, GameListTag, KillDistance, Language, MapId,
    SpawnKind, SystemType, TaskBarUpdate, Wire,
};
pub use version::VersionInfo;

use thiserror::Error;

/// A numeric value on the wire that does not map to any known variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown {kind} value {value:#x}")]
pub struct UnknownValue {
    /// Name of the enumeration that rejected the value.
    pub kind: &'static str,
    /// The raw value that was read.
    pub value: u32,
}

impl UnknownValue {
    /// Build the error for enumeration `kind`.
    pub fn new(kind: &'static str, value: impl Into<u32>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
