use super::SubSystem;
use auproxy_net::{CodecResult, Reader, Writer};
use serde::Serialize;

/// Countdown before meltdown.
pub const REACTOR_IDLE_COUNTDOWN: f32 = 10_000.0;

/// Reactor (and Polus laboratory) meltdown state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactorSystem {
    /// Seconds until meltdown; the idle value when not sabotaged.
    pub countdown: f32,
    /// `(player id, console id)` pairs of players holding a console.
    pub consoles: Vec<(u8, u8)>,
}

impl Default for ReactorSystem {
    fn default() -> Self {
        Self {
            countdown: REACTOR_IDLE_COUNTDOWN,
            consoles: Vec::new(),
        }
    }
}

impl ReactorSystem {
    /// Number of distinct consoles currently held.
    pub fn user_count(&self) -> usize {
        let mut seen = 0u32;
        let mut count = 0;
        for &(_, console) in &self.consoles {
            let bit = 1u32.checked_shl(console as u32).unwrap_or(0);
            if bit != 0 && seen & bit == 0 {
                seen |= bit;
                count += 1;
            }
        }
        count
    }
}

impl SubSystem for ReactorSystem {
    fn deserialize(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        let countdown = r.f32_le()?;
        let count = r.packed()?;
        let mut consoles = Vec::with_capacity(count.min(64) as usize);
        for _ in 0..count {
            consoles.push((r.u8()?, r.u8()?));
        }
        self.countdown = countdown;
        self.consoles = consoles;
        Ok(())
    }

    fn serialize(&self, w: &mut Writer) {
        w.f32_le(self.countdown).packed(self.consoles.len() as u32);
        for &(player, console) in &self.consoles {
            w.u8(player).u8(console);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_countdown_and_pairs() {
        let mut w = Writer::new();
        w.f32_le(30.0).packed(2).u8(1).u8(0).u8(4).u8(1);
        let mut reactor = ReactorSystem::default();
        reactor.deserialize(&mut Reader::new(w.as_slice())).unwrap();
        assert_eq!(reactor.countdown, 30.0);
        assert_eq!(reactor.consoles, vec![(1, 0), (4, 1)]);
    }

    #[test]
    fn test_user_count_ignores_repeated_consoles() {
        let reactor = ReactorSystem {
            countdown: 10.0,
            consoles: vec![(1, 0), (2, 0), (3, 1)],
        };
        assert_eq!(reactor.user_count(), 2);
    }
}
