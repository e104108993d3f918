use super::SubSystem;
use auproxy_core::{DeconState, Wire};
use auproxy_net::{CodecResult, Reader, Writer};
use serde::Serialize;

/// Cooldown shared by all sabotages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SabotageSystem {
    /// Seconds until impostors can sabotage again.
    pub timer: f32,
}

impl SubSystem for SabotageSystem {
    fn deserialize(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        self.timer = r.f32_le()?;
        Ok(())
    }

    fn serialize(&self, w: &mut Writer) {
        w.f32_le(self.timer);
    }
}

/// Decontamination chamber between two rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeconSystem {
    /// Seconds left in the current phase.
    pub timer: u8,
    /// Door phase.
    pub state: Wire<DeconState>,
}

impl Default for DeconSystem {
    fn default() -> Self {
        Self {
            timer: 0,
            state: Wire::Known(DeconState::Idle),
        }
    }
}

impl SubSystem for DeconSystem {
    fn deserialize(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        let timer = r.u8()?;
        let state = Wire::from_byte(r.u8()?);
        self.timer = timer;
        self.state = state;
        Ok(())
    }

    fn serialize(&self, w: &mut Writer) {
        w.u8(self.timer).u8(self.state.byte());
    }
}
