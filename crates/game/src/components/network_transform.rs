//! Position replication for players.

use auproxy_core::lerp::{position_to_u16, u16_to_position};
use auproxy_net::{CodecResult, Reader, Writer};
use serde::{Deserialize, Serialize};

/// 2D vector in world units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    /// Horizontal component.
    pub x: f32,
    /// Vertical component.
    pub y: f32,
}

impl Vector2 {
    /// Build a vector.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn read(r: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(Self {
            x: u16_to_position(r.u16_le()?),
            y: u16_to_position(r.u16_le()?),
        })
    }

    fn write(&self, w: &mut Writer) {
        w.u16_le(position_to_u16(self.x))
            .u16_le(position_to_u16(self.y));
    }
}

/// Movement component with a 16-bit update sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CustomNetworkTransform {
    /// Last applied sequence; `None` until the first update.
    pub sequence: Option<u16>,
    /// Last known position.
    pub position: Vector2,
    /// Last known velocity.
    pub velocity: Vector2,
}

/// Whether `new` comes after `old` when sequences wrap at 16 bits.
///
/// Anything up to half the sequence space ahead counts as newer.
pub fn sequence_newer(new: u16, old: u16) -> bool {
    let ahead = new.wrapping_sub(old);
    ahead != 0 && ahead <= 0x7FFF
}

impl CustomNetworkTransform {
    /// Whether an update with `sequence` should be applied.
    pub fn accepts(&self, sequence: u16) -> bool {
        self.sequence.map_or(true, |old| sequence_newer(sequence, old))
    }

    /// Read `[seq: u16][pos x,y: u16][vel x,y: u16]`.
    ///
    /// Returns `false` and leaves the state alone when the sequence is stale.
    pub fn deserialize(&mut self, r: &mut Reader<'_>) -> CodecResult<bool> {
        let sequence = r.u16_le()?;
        if !self.accepts(sequence) {
            return Ok(false);
        }
        let position = Vector2::read(r)?;
        let velocity = Vector2::read(r)?;
        self.sequence = Some(sequence);
        self.position = position;
        self.velocity = velocity;
        Ok(true)
    }

    /// Advance the sequence for a locally originated move and record the new pose.
    pub fn advance(&mut self, position: Vector2, velocity: Vector2) -> u16 {
        let next = self.sequence.map_or(1, |seq| seq.wrapping_add(1));
        self.sequence = Some(next);
        self.position = position;
        self.velocity = velocity;
        next
    }

    /// Current state in the update layout.
    pub fn serialize(&self, w: &mut Writer) {
        w.u16_le(self.sequence.unwrap_or(0));
        self.position.write(w);
        self.velocity.write(w);
    }

    /// Current state as bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.serialize(&mut w);
        w.into_inner()
    }
}
