//! Ship component: a table of sub-systems addressed by [`SystemType`].

use crate::systems::{
    DeconSystem, DoorsSystem, HqHudOverrideSystem, HudOverrideSystem, LifeSuppSystem,
    MedScanSystem, ReactorSystem, SabotageSystem, SecuritySystem, SwitchSystem, System,
    POLUS_DOORS, SKELD_DOORS,
};
use auproxy_core::{MapId, SpawnKind, SystemType};
use auproxy_net::{CodecResult, Reader, Writer};
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of addressable system slots in an update mask.
pub const SYSTEM_SLOTS: u8 = 30;

/// Ship state for one of the map spawn kinds.
///
/// Systems live in a `BTreeMap` keyed by [`SystemType`], so iteration is in
/// slot order, which is the order the spawn blob lists them in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipStatus {
    /// Map this ship belongs to.
    pub map: MapId,
    /// Populated slots.
    pub systems: BTreeMap<SystemType, System>,
}

impl ShipStatus {
    /// Ship layout for a map spawn kind, or `None` for non-ship kinds.
    pub fn for_spawn(kind: SpawnKind) -> Option<Self> {
        match kind {
            SpawnKind::ShipStatus | SpawnKind::AprilShipStatus => Some(Self::skeld()),
            SpawnKind::HeadQuarters => Some(Self::mira_hq()),
            SpawnKind::PlanetMap => Some(Self::polus()),
            _ => None,
        }
    }

    /// The Skeld (also used by the April Fools variant).
    pub fn skeld() -> Self {
        Self::with_systems(
            MapId::Skeld,
            [
                (SystemType::Reactor, System::Reactor(ReactorSystem::default())),
                (SystemType::Electrical, System::Switch(SwitchSystem::default())),
                (SystemType::O2, System::LifeSupp(LifeSuppSystem::default())),
                (SystemType::MedBay, System::MedScan(MedScanSystem::default())),
                (SystemType::Security, System::Security(SecuritySystem::default())),
                (
                    SystemType::Communications,
                    System::HudOverride(HudOverrideSystem::default()),
                ),
                (SystemType::Doors, System::Doors(DoorsSystem::new(SKELD_DOORS))),
                (SystemType::Sabotage, System::Sabotage(SabotageSystem::default())),
            ],
        )
    }

    /// Mira HQ.
    pub fn mira_hq() -> Self {
        Self::with_systems(
            MapId::MiraHq,
            [
                (SystemType::Reactor, System::Reactor(ReactorSystem::default())),
                (SystemType::Electrical, System::Switch(SwitchSystem::default())),
                (SystemType::O2, System::LifeSupp(LifeSuppSystem::default())),
                (SystemType::MedBay, System::MedScan(MedScanSystem::default())),
                (
                    SystemType::Communications,
                    System::HqHudOverride(HqHudOverrideSystem::default()),
                ),
                (SystemType::Sabotage, System::Sabotage(SabotageSystem::default())),
                (SystemType::Decontamination, System::Decon(DeconSystem::default())),
            ],
        )
    }

    /// Polus.
    pub fn polus() -> Self {
        Self::with_systems(
            MapId::Polus,
            [
                (SystemType::Electrical, System::Switch(SwitchSystem::default())),
                (SystemType::MedBay, System::MedScan(MedScanSystem::default())),
                (SystemType::Security, System::Security(SecuritySystem::default())),
                (
                    SystemType::Communications,
                    System::HudOverride(HudOverrideSystem::default()),
                ),
                (SystemType::Doors, System::Doors(DoorsSystem::new(POLUS_DOORS))),
                (SystemType::Sabotage, System::Sabotage(SabotageSystem::default())),
                (SystemType::Decontamination, System::Decon(DeconSystem::default())),
                (SystemType::Laboratory, System::Reactor(ReactorSystem::default())),
                (SystemType::Decontamination2, System::Decon(DeconSystem::default())),
            ],
        )
    }

    fn with_systems(map: MapId, systems: impl IntoIterator<Item = (SystemType, System)>) -> Self {
        Self {
            map,
            systems: systems.into_iter().collect(),
        }
    }

    /// System in `slot`, if this map has one.
    pub fn system(&self, slot: SystemType) -> Option<&System> {
        self.systems.get(&slot)
    }

    /// Read the spawn blob: every populated slot, in slot order.
    pub fn spawn(&mut self, r: &mut Reader<'_>) -> CodecResult<()> {
        for system in self.systems.values_mut() {
            system.spawn(r)?;
        }
        Ok(())
    }

    /// Read an update: a packed mask, then one update per set, populated slot.
    ///
    /// Returns the slots that changed.
    pub fn deserialize(&mut self, r: &mut Reader<'_>) -> CodecResult<Vec<SystemType>> {
        let mask = r.packed()?;
        let mut updated = Vec::new();
        for (&slot, system) in self.systems.iter_mut() {
            let bit = u8::from(slot);
            if bit < SYSTEM_SLOTS && mask & (1 << bit) != 0 {
                system.deserialize(r)?;
                updated.push(slot);
            }
        }
        Ok(updated)
    }

    /// Full state in the spawn layout.
    pub fn serialize(&self, w: &mut Writer) {
        for system in self.systems.values() {
            system.serialize(w);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(ship: &ShipStatus) -> Vec<(SystemType, Vec<u8>)> {
        ship.systems
            .iter()
            .map(|(&slot, system)| (slot, system.to_bytes()))
            .collect()
    }

    #[test]
    fn test_electrical_update_touches_only_electrical() {
        let mut ship = ShipStatus::skeld();
        let mut w = Writer::new();
        w.f32_le(45.0).packed(1).u8(2).u8(1); // reactor
        w.u8(0b10101).u8(0b10101).u8(255); // electrical
        w.f32_le(30.0).packed(0); // o2
        w.packed(0); // medbay
        w.bool(false); // security
        w.bool(false); // comms
        for i in 0..SKELD_DOORS {
            w.bool(i % 2 == 0);
        }
        w.f32_le(0.0); // sabotage
        ship.spawn(&mut Reader::new(w.as_slice())).unwrap();
        let before = snapshot(&ship);

        let update = [0x80, 0x01, 0b10101, 0b00101, 120];
        let mut r = Reader::new(&update);
        let changed = ship.deserialize(&mut r).unwrap();
        assert!(r.is_empty());
        assert_eq!(changed, vec![SystemType::Electrical]);

        let after = snapshot(&ship);
        for ((slot, old), (_, new)) in before.iter().zip(after.iter()) {
            if *slot == SystemType::Electrical {
                assert_eq!(new, &vec![0b10101, 0b00101, 120]);
            } else {
                assert_eq!(old, new, "{slot:?} changed");
            }
        }
        match ship.system(SystemType::Electrical) {
            Some(System::Switch(switch)) => assert!(switch.is_sabotaged()),
            other => panic!("unexpected electrical slot: {other:?}"),
        }
    }

    #[test]
    fn test_spawn_round_trips_through_serialize() {
        let mut source = ShipStatus::mira_hq();
        if let Some(System::Decon(decon)) = source.systems.get_mut(&SystemType::Decontamination) {
            decon.timer = 3;
            decon.state = auproxy_core::DeconState::Closed.into();
        }
        let mut w = Writer::new();
        source.serialize(&mut w);

        let mut ship = ShipStatus::mira_hq();
        let mut r = Reader::new(w.as_slice());
        ship.spawn(&mut r).unwrap();
        assert!(r.is_empty());
        assert_eq!(ship, source);
    }

    #[test]
    fn test_mask_bit_for_missing_slot_is_ignored() {
        let mut ship = ShipStatus::polus();
        // Reactor (bit 3) does not exist on Polus.
        let mut r = Reader::new(&[0x08]);
        assert!(ship.deserialize(&mut r).unwrap().is_empty());
    }

    #[test]
    fn test_layouts_by_spawn_kind() {
        assert_eq!(
            ShipStatus::for_spawn(SpawnKind::AprilShipStatus).map(|s| s.map),
            Some(MapId::Skeld)
        );
        assert_eq!(
            ShipStatus::for_spawn(SpawnKind::PlanetMap).map(|s| s.map),
            Some(MapId::Polus)
        );
        assert!(ShipStatus::for_spawn(SpawnKind::Player).is_none());
        assert!(matches!(
            ShipStatus::polus().system(SystemType::Laboratory),
            Some(System::Reactor(_))
        ));
    }
}
