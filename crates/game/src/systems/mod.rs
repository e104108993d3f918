//! ShipStatus sub-systems.
//!
//! A ship holds one [`System`] per populated [`SystemType`] slot. Each system
//! has its own spawn and update layouts; most of them read the same bytes in
//! both cases.

mod doors;
mod hud;
mod life_supp;
mod med_scan;
mod reactor;
mod sabotage;
mod switch;

pub use doors::{DoorsSystem, POLUS_DOORS, SKELD_DOORS};
pub use hud::{HqHudOverrideSystem, HudOverrideSystem, SecuritySystem};
pub use life_supp::LifeSuppSystem;
pub use med_scan::MedScanSystem;
pub use reactor::ReactorSystem;
pub use sabotage::{DeconSystem, SabotageSystem};
pub use switch::SwitchSystem;

use auproxy_net::{CodecResult, Reader, Writer};
use serde::Serialize;

/// Wire contract shared by every sub-system.
pub trait SubSystem {
    /// Read the full state sent with the ship's spawn.
    fn spawn(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        self.deserialize(r)
    }

    /// Read an incremental update.
    fn deserialize(&mut self, r: &mut Reader<'_>) -> CodecResult<()>;

    /// Write the full state, in the spawn layout.
    fn serialize(&self, w: &mut Writer);
}

/// State of one ship sub-system.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "system")]
pub enum System {
    /// Reactor meltdown, also used for the Polus laboratory.
    Reactor(ReactorSystem),
    /// Electrical switches.
    Switch(SwitchSystem),
    /// Oxygen depletion.
    LifeSupp(LifeSuppSystem),
    /// Medbay scanner queue.
    MedScan(MedScanSystem),
    /// Security cameras in use.
    Security(SecuritySystem),
    /// Comms sabotage on Skeld and Polus.
    HudOverride(HudOverrideSystem),
    /// Comms sabotage on Mira HQ.
    HqHudOverride(HqHudOverrideSystem),
    /// Door states.
    Doors(DoorsSystem),
    /// Sabotage cooldown.
    Sabotage(SabotageSystem),
    /// Decontamination chamber.
    Decon(DeconSystem),
}

impl System {
    fn inner(&self) -> &dyn SubSystem {
        match self {
            System::Reactor(s) => s,
            System::Switch(s) => s,
            System::LifeSupp(s) => s,
            System::MedScan(s) => s,
            System::Security(s) => s,
            System::HudOverride(s) => s,
            System::HqHudOverride(s) => s,
            System::Doors(s) => s,
            System::Sabotage(s) => s,
            System::Decon(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SubSystem {
        match self {
            System::Reactor(s) => s,
            System::Switch(s) => s,
            System::LifeSupp(s) => s,
            System::MedScan(s) => s,
            System::Security(s) => s,
            System::HudOverride(s) => s,
            System::HqHudOverride(s) => s,
            System::Doors(s) => s,
            System::Sabotage(s) => s,
            System::Decon(s) => s,
        }
    }

    /// Read the spawn layout.
    pub fn spawn(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        self.inner_mut().spawn(r)
    }

    /// Read an update.
    pub fn deserialize(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        self.inner_mut().deserialize(r)
    }

    /// Full state in the spawn layout.
    pub fn serialize(&self, w: &mut Writer) {
        self.inner().serialize(w)
    }

    /// Full state as bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.serialize(&mut w);
        w.into_inner()
    }
}
