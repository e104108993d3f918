//! Player table and vote-kick table, the two halves of the GameData object.

use auproxy_net::{CodecResult, PlayerData, Reader, Writer};
use serde::Serialize;
use std::collections::BTreeMap;

/// Player table keyed by player id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GameDataTable {
    /// Rows by player id.
    pub players: BTreeMap<u8, PlayerData>,
}

impl GameDataTable {
    /// Read `[count: packed]` followed by that many rows.
    ///
    /// Spawn and update share this layout. Returns the ids that were written.
    pub fn deserialize(&mut self, r: &mut Reader<'_>) -> CodecResult<Vec<u8>> {
        let count = r.packed()?;
        let mut rows = Vec::with_capacity(count.min(16) as usize);
        for _ in 0..count {
            rows.push(PlayerData::decode(r)?);
        }
        Ok(self.update_players(rows))
    }

    /// Replace rows, as done by the UpdateGameData RPC. Returns the ids written.
    pub fn update_players(&mut self, rows: impl IntoIterator<Item = PlayerData>) -> Vec<u8> {
        rows.into_iter()
            .map(|row| {
                let id = row.player_id;
                self.players.insert(id, row);
                id
            })
            .collect()
    }

    /// Row for `player_id`.
    pub fn player(&self, player_id: u8) -> Option<&PlayerData> {
        self.players.get(&player_id)
    }

    /// Mutable row for `player_id`, created empty when missing.
    pub fn player_mut(&mut self, player_id: u8) -> &mut PlayerData {
        self.players
            .entry(player_id)
            .or_insert_with(|| PlayerData::new(player_id))
    }

    /// Spawn layout.
    pub fn serialize(&self, w: &mut Writer) -> CodecResult<()> {
        w.packed(self.players.len() as u32);
        for row in self.players.values() {
            row.encode(w)?;
        }
        Ok(())
    }
}

/// Vote-kick tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VoteBanSystem {
    /// Voters (client ids, `0` for an empty slot) keyed by the targeted client.
    pub votes: BTreeMap<i32, [u32; 3]>,
}

impl VoteBanSystem {
    /// Read `[count: u8]` entries of `[target: i32][3 × voter: packed]`.
    ///
    /// A zero target ends the list early.
    pub fn deserialize(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        let count = r.u8()?;
        for _ in 0..count {
            let target = r.i32_le()?;
            if target == 0 {
                break;
            }
            let voters = [r.packed()?, r.packed()?, r.packed()?];
            self.votes.insert(target, voters);
        }
        Ok(())
    }

    /// Current layout.
    pub fn serialize(&self, w: &mut Writer) {
        w.u8(self.votes.len() as u8);
        for (&target, voters) in &self.votes {
            w.i32_le(target);
            for &voter in voters {
                w.packed(voter);
            }
        }
    }
}
