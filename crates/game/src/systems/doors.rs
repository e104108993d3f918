use super::SubSystem;
use auproxy_net::{CodecResult, Reader, Writer};
use serde::Serialize;

/// Door count on The Skeld.
pub const SKELD_DOORS: usize = 13;
/// Door count on Polus.
pub const POLUS_DOORS: usize = 12;

/// Open/closed state of every door on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoorsSystem {
    /// `true` means open, indexed by door id.
    pub doors: Vec<bool>,
}

impl DoorsSystem {
    /// System with `count` doors, all closed until the spawn says otherwise.
    pub fn new(count: usize) -> Self {
        Self {
            doors: vec![false; count],
        }
    }
}

impl SubSystem for DoorsSystem {
    fn spawn(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        for door in self.doors.iter_mut() {
            *door = r.bool()?;
        }
        Ok(())
    }

    fn deserialize(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        let mask = r.packed()?;
        for (i, door) in self.doors.iter_mut().enumerate().take(32) {
            if mask & (1 << i) != 0 {
                *door = r.bool()?;
            }
        }
        Ok(())
    }

    fn serialize(&self, w: &mut Writer) {
        for &door in &self.doors {
            w.bool(door);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_reads_every_door() {
        let mut doors = DoorsSystem::new(3);
        doors.spawn(&mut Reader::new(&[1, 0, 1])).unwrap();
        assert_eq!(doors.doors, vec![true, false, true]);
    }

    #[test]
    fn test_update_reads_masked_doors_only() {
        let mut doors = DoorsSystem::new(SKELD_DOORS);
        // Doors 1 and 12 change.
        let mut w = Writer::new();
        w.packed((1 << 1) | (1 << 12)).bool(true).bool(true);
        doors.deserialize(&mut Reader::new(w.as_slice())).unwrap();

        let open: Vec<usize> = (0..SKELD_DOORS).filter(|&i| doors.doors[i]).collect();
        assert_eq!(open, vec![1, 12]);
    }

    #[test]
    fn test_mask_bits_past_last_door_are_ignored() {
        let mut doors = DoorsSystem::new(2);
        let mut w = Writer::new();
        w.packed(0b101).bool(true);
        let mut r = Reader::new(w.as_slice());
        doors.deserialize(&mut r).unwrap();
        assert_eq!(doors.doors, vec![true, false]);
        assert!(r.is_empty());
    }
}
