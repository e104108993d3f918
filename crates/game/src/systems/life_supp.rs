use super::reactor::REACTOR_IDLE_COUNTDOWN;
use super::SubSystem;
use auproxy_net::{CodecResult, Reader, Writer};
use serde::Serialize;

/// Oxygen depletion state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifeSuppSystem {
    /// Seconds until depletion.
    pub countdown: f32,
    /// Consoles already fixed.
    pub consoles: Vec<u32>,
}

impl Default for LifeSuppSystem {
    fn default() -> Self {
        Self {
            countdown: REACTOR_IDLE_COUNTDOWN,
            consoles: Vec::new(),
        }
    }
}

impl SubSystem for LifeSuppSystem {
    fn deserialize(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        self.countdown = r.f32_le()?;
        // The console list is omitted when nothing is being repaired.
        if !r.is_empty() {
            let count = r.packed()?;
            let mut consoles = Vec::with_capacity(count.min(64) as usize);
            for _ in 0..count {
                consoles.push(r.packed()?);
            }
            self.consoles = consoles;
        }
        Ok(())
    }

    fn serialize(&self, w: &mut Writer) {
        w.f32_le(self.countdown).packed(self.consoles.len() as u32);
        for &console in &self.consoles {
            w.packed(console);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countdown_only_keeps_consoles() {
        let mut o2 = LifeSuppSystem {
            countdown: 30.0,
            consoles: vec![1],
        };
        let mut w = Writer::new();
        w.f32_le(25.0);
        o2.deserialize(&mut Reader::new(w.as_slice())).unwrap();
        assert_eq!(o2.countdown, 25.0);
        assert_eq!(o2.consoles, vec![1]);
    }

    #[test]
    fn test_reads_console_list() {
        let mut w = Writer::new();
        w.f32_le(20.0).packed(2).packed(0).packed(1);
        let mut o2 = LifeSuppSystem::default();
        o2.deserialize(&mut Reader::new(w.as_slice())).unwrap();
        assert_eq!(o2.consoles, vec![0, 1]);
    }
}
