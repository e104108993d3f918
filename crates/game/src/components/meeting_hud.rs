//! Meeting voting area.
//!
//! The spawn and update layouts derive the vote target from the same low
//! nibble but disagree by one: spawn uses it as-is, updates subtract one.
//! Both are kept as observed on the wire.

use auproxy_net::{CodecResult, Reader};
use serde::Serialize;
use std::collections::BTreeMap;

/// Low nibble of the flags byte.
pub const VOTED_FOR_MASK: u8 = 0x0F;
/// The player reported the body or called the meeting.
pub const DID_REPORT: u8 = 0x20;
/// The player has voted.
pub const DID_VOTE: u8 = 0x40;
/// The player is dead.
pub const IS_DEAD: u8 = 0x80;

/// Ids at or above this are "no vote".
const MAX_VOTE_TARGET: i16 = 10;

/// Vote area state of one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteState {
    /// Raw flags byte.
    pub flags: u8,
    /// Player voted for, if any.
    pub voted_for: Option<u8>,
    /// Reported the body.
    pub reported: bool,
    /// Has voted.
    pub voted: bool,
    /// Dead.
    pub dead: bool,
}

impl VoteState {
    fn with_target(flags: u8, target: i16) -> Self {
        Self {
            flags,
            voted_for: (0..MAX_VOTE_TARGET).contains(&target).then_some(target as u8),
            reported: flags & DID_REPORT != 0,
            voted: flags & DID_VOTE != 0,
            dead: flags & IS_DEAD != 0,
        }
    }

    /// State as sent in the spawn blob.
    pub fn from_spawn(flags: u8) -> Self {
        Self::with_target(flags, (flags & VOTED_FOR_MASK) as i16)
    }

    /// State as sent in an update.
    pub fn from_update(flags: u8) -> Self {
        Self::with_target(flags, (flags & VOTED_FOR_MASK) as i16 - 1)
    }
}

/// A vote that became visible in an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewVote {
    /// Voting player id.
    pub voter: u8,
    /// Target, `None` for a skip.
    pub suspect: Option<u8>,
}

/// Voting area states by player id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MeetingHud {
    /// States by player id.
    pub states: BTreeMap<u8, VoteState>,
}

impl MeetingHud {
    /// One flags byte per player id, for the whole blob.
    pub fn spawn(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        let mut player_id = 0u8;
        while !r.is_empty() {
            self.states.insert(player_id, VoteState::from_spawn(r.u8()?));
            player_id = player_id.wrapping_add(1);
        }
        Ok(())
    }

    /// A packed mask, then one flags byte per player id; only masked players change.
    ///
    /// Returns votes from players who had a state and had not voted before.
    pub fn deserialize(&mut self, r: &mut Reader<'_>) -> CodecResult<Vec<NewVote>> {
        let mask = r.packed()?;
        let mut votes = Vec::new();
        let mut player_id = 0u8;
        while !r.is_empty() {
            let flags = r.u8()?;
            if player_id < 32 && mask & (1 << player_id) != 0 {
                let state = VoteState::from_update(flags);
                if let Some(old) = self.states.get(&player_id) {
                    if state.voted && !old.voted {
                        votes.push(NewVote {
                            voter: player_id,
                            suspect: state.voted_for,
                        });
                    }
                }
                self.states.insert(player_id, state);
            }
            player_id = player_id.wrapping_add(1);
        }
        Ok(votes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_uses_raw_nibble() {
        let mut hud = MeetingHud::default();
        hud.spawn(&mut Reader::new(&[0x03, 0x0F, DID_REPORT | IS_DEAD]))
            .unwrap();
        assert_eq!(hud.states[&0].voted_for, Some(3));
        assert_eq!(hud.states[&1].voted_for, None);
        assert_eq!(hud.states[&2].voted_for, Some(0));
        assert!(hud.states[&2].reported);
        assert!(hud.states[&2].dead);
    }

    #[test]
    fn test_update_subtracts_one() {
        let mut hud = MeetingHud::default();
        hud.spawn(&mut Reader::new(&[0x00, 0x00])).unwrap();
        // Only player 1 is masked; player 0's byte is read and ignored.
        let update = [0b10, DID_VOTE | 0x04, DID_VOTE | 0x04];
        let votes = hud.deserialize(&mut Reader::new(&update)).unwrap();
        assert_eq!(
            votes,
            vec![NewVote {
                voter: 1,
                suspect: Some(3)
            }]
        );
        assert!(!hud.states[&0].voted);
        assert_eq!(hud.states[&1].voted_for, Some(3));
    }

    #[test]
    fn test_zero_nibble_update_is_skip() {
        let mut hud = MeetingHud::default();
        hud.spawn(&mut Reader::new(&[0x00])).unwrap();
        let votes = hud.deserialize(&mut Reader::new(&[0b1, DID_VOTE])).unwrap();
        assert_eq!(votes[0].suspect, None);
    }

    #[test]
    fn test_repeat_vote_is_not_reported_twice() {
        let mut hud = MeetingHud::default();
        hud.spawn(&mut Reader::new(&[0x00])).unwrap();
        let update = [0b1, DID_VOTE | 0x02];
        assert_eq!(hud.deserialize(&mut Reader::new(&update)).unwrap().len(), 1);
        assert!(hud.deserialize(&mut Reader::new(&update)).unwrap().is_empty());
    }

    #[test]
    fn test_vote_without_prior_state_is_silent() {
        let mut hud = MeetingHud::default();
        let votes = hud.deserialize(&mut Reader::new(&[0b1, DID_VOTE | 0x02])).unwrap();
        assert!(votes.is_empty());
        assert!(hud.states[&0].voted);
    }
}
