use super::SubSystem;
use auproxy_net::{CodecResult, Reader, Writer};
use serde::Serialize;

/// Security cameras.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SecuritySystem {
    /// Someone is watching the cameras.
    pub active: bool,
}

impl SubSystem for SecuritySystem {
    fn deserialize(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        self.active = r.bool()?;
        Ok(())
    }

    fn serialize(&self, w: &mut Writer) {
        w.bool(self.active);
    }
}

/// Communications sabotage on Skeld and Polus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HudOverrideSystem {
    /// Comms are down.
    pub active: bool,
}

impl SubSystem for HudOverrideSystem {
    fn deserialize(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        self.active = r.bool()?;
        Ok(())
    }

    fn serialize(&self, w: &mut Writer) {
        w.bool(self.active);
    }
}

/// Communications sabotage on Mira HQ, repaired at two consoles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HqHudOverrideSystem {
    /// `(player id, console id)` pairs of players at a console.
    pub consoles: Vec<(u8, u8)>,
    /// Consoles already fixed.
    pub fixed: Vec<u8>,
}

impl HqHudOverrideSystem {
    /// Comms stay down until both consoles are fixed.
    pub fn is_sabotaged(&self) -> bool {
        self.fixed.len() < 2
    }
}

impl SubSystem for HqHudOverrideSystem {
    fn deserialize(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        let count = r.packed()?;
        let mut consoles = Vec::with_capacity(count.min(64) as usize);
        for _ in 0..count {
            consoles.push((r.u8()?, r.u8()?));
        }
        let fixed_count = r.packed()?;
        let fixed = r.bytes(fixed_count as usize)?.to_vec();
        self.consoles = consoles;
        self.fixed = fixed;
        Ok(())
    }

    fn serialize(&self, w: &mut Writer) {
        w.packed(self.consoles.len() as u32);
        for &(player, console) in &self.consoles {
            w.u8(player).u8(console);
        }
        w.packed(self.fixed.len() as u32).bytes(&self.fixed);
    }
}
