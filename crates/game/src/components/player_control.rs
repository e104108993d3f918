use auproxy_net::{CodecResult, Reader, Writer};
use serde::Serialize;

/// Identity half of a player object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayerControl {
    /// Index into the player table.
    pub player_id: u8,
    /// The spawn was for a player who just joined (plays the intro animation).
    pub is_new: bool,
}

impl PlayerControl {
    /// Spawn layout: `[is_new: bool][player_id: u8]`.
    pub fn spawn(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        self.is_new = r.bool()?;
        self.player_id = r.u8()?;
        Ok(())
    }

    /// Update layout: `[player_id: u8]`.
    pub fn deserialize(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        self.player_id = r.u8()?;
        Ok(())
    }

    /// Spawn layout.
    pub fn serialize(&self, w: &mut Writer) {
        w.bool(self.is_new).u8(self.player_id);
    }
}
