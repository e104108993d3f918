//! Component kinds and their per-spawn-kind schemas.

mod game_data;
mod meeting_hud;
mod network_transform;
mod player_control;
mod ship_status;

pub use game_data::{GameDataTable, VoteBanSystem};
pub use meeting_hud::{MeetingHud, NewVote, VoteState, DID_REPORT, DID_VOTE, IS_DEAD};
pub use network_transform::{sequence_newer, CustomNetworkTransform, Vector2};
pub use player_control::PlayerControl;
pub use ship_status::{ShipStatus, SYSTEM_SLOTS};

use auproxy_core::{SpawnKind, SystemType};
use auproxy_net::{CodecResult, Reader};
use serde::Serialize;

/// Component class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ComponentKind {
    /// Player identity.
    PlayerControl,
    /// Player physics; carries no replicated state.
    PlayerPhysics,
    /// Player movement.
    CustomNetworkTransform,
    /// Player table.
    GameData,
    /// Vote-kick table.
    VoteBanSystem,
    /// Lobby marker; carries no replicated state.
    LobbyBehaviour,
    /// Meeting voting area.
    MeetingHud,
    /// Ship sub-systems.
    ShipStatus,
}

impl ComponentKind {
    /// Components of a spawn kind, in the order the spawn part lists them.
    pub fn schema(kind: SpawnKind) -> &'static [ComponentKind] {
        use ComponentKind::*;
        match kind {
            SpawnKind::Player => &[PlayerControl, PlayerPhysics, CustomNetworkTransform],
            SpawnKind::GameData => &[GameData, VoteBanSystem],
            SpawnKind::LobbyBehaviour => &[LobbyBehaviour],
            SpawnKind::MeetingHub => &[MeetingHud],
            SpawnKind::ShipStatus
            | SpawnKind::HeadQuarters
            | SpawnKind::PlanetMap
            | SpawnKind::AprilShipStatus => &[ShipStatus],
        }
    }
}

/// What a decode changed, for event generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Nothing observable.
    None,
    /// A movement update was applied.
    Moved,
    /// Player table rows written.
    Players(Vec<u8>),
    /// Votes cast since the last update.
    Votes(Vec<NewVote>),
    /// Ship slots updated.
    Systems(Vec<SystemType>),
}

/// Replicated state of one component.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum ComponentState {
    /// See [`PlayerControl`].
    PlayerControl(PlayerControl),
    /// Stateless.
    PlayerPhysics,
    /// See [`CustomNetworkTransform`].
    CustomNetworkTransform(CustomNetworkTransform),
    /// See [`GameDataTable`].
    GameData(GameDataTable),
    /// See [`VoteBanSystem`].
    VoteBanSystem(VoteBanSystem),
    /// Stateless.
    LobbyBehaviour,
    /// See [`MeetingHud`].
    MeetingHud(MeetingHud),
    /// See [`ShipStatus`].
    ShipStatus(ShipStatus),
}

impl ComponentState {
    /// Empty state for `kind` as part of a `spawn` object.
    pub fn new(kind: ComponentKind, spawn: SpawnKind) -> Self {
        match kind {
            ComponentKind::PlayerControl => ComponentState::PlayerControl(PlayerControl::default()),
            ComponentKind::PlayerPhysics => ComponentState::PlayerPhysics,
            ComponentKind::CustomNetworkTransform => {
                ComponentState::CustomNetworkTransform(CustomNetworkTransform::default())
            }
            ComponentKind::GameData => ComponentState::GameData(GameDataTable::default()),
            ComponentKind::VoteBanSystem => ComponentState::VoteBanSystem(VoteBanSystem::default()),
            ComponentKind::LobbyBehaviour => ComponentState::LobbyBehaviour,
            ComponentKind::MeetingHud => ComponentState::MeetingHud(MeetingHud::default()),
            ComponentKind::ShipStatus => ComponentState::ShipStatus(
                ShipStatus::for_spawn(spawn).unwrap_or_else(ShipStatus::skeld),
            ),
        }
    }

    /// Class of this state.
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentState::PlayerControl(_) => ComponentKind::PlayerControl,
            ComponentState::PlayerPhysics => ComponentKind::PlayerPhysics,
            ComponentState::CustomNetworkTransform(_) => ComponentKind::CustomNetworkTransform,
            ComponentState::GameData(_) => ComponentKind::GameData,
            ComponentState::VoteBanSystem(_) => ComponentKind::VoteBanSystem,
            ComponentState::LobbyBehaviour => ComponentKind::LobbyBehaviour,
            ComponentState::MeetingHud(_) => ComponentKind::MeetingHud,
            ComponentState::ShipStatus(_) => ComponentKind::ShipStatus,
        }
    }

    /// Decode the initial state carried by a spawn part.
    pub fn spawn(&mut self, data: &[u8]) -> CodecResult<Change> {
        let mut r = Reader::new(data);
        let change = match self {
            ComponentState::PlayerControl(pc) => {
                pc.spawn(&mut r)?;
                Change::None
            }
            ComponentState::CustomNetworkTransform(cnt) => {
                if cnt.deserialize(&mut r)? {
                    Change::Moved
                } else {
                    Change::None
                }
            }
            ComponentState::GameData(table) => Change::Players(table.deserialize(&mut r)?),
            ComponentState::VoteBanSystem(bans) => {
                bans.deserialize(&mut r)?;
                Change::None
            }
            ComponentState::MeetingHud(hud) => {
                hud.spawn(&mut r)?;
                Change::None
            }
            ComponentState::ShipStatus(ship) => {
                ship.spawn(&mut r)?;
                Change::None
            }
            ComponentState::PlayerPhysics | ComponentState::LobbyBehaviour => Change::None,
        };
        Ok(change)
    }

    /// Apply an incremental update from a data part.
    ///
    /// The update is decoded into a copy and committed only on success, so a
    /// malformed update leaves the component unchanged.
    pub fn deserialize(&mut self, data: &[u8]) -> CodecResult<Change> {
        let mut next = self.clone();
        let mut r = Reader::new(data);
        let change = match &mut next {
            ComponentState::PlayerControl(pc) => {
                pc.deserialize(&mut r)?;
                Change::None
            }
            ComponentState::CustomNetworkTransform(cnt) => {
                if cnt.deserialize(&mut r)? {
                    Change::Moved
                } else {
                    Change::None
                }
            }
            ComponentState::GameData(table) => Change::Players(table.deserialize(&mut r)?),
            ComponentState::VoteBanSystem(bans) => {
                bans.deserialize(&mut r)?;
                Change::None
            }
            ComponentState::MeetingHud(hud) => Change::Votes(hud.deserialize(&mut r)?),
            ComponentState::ShipStatus(ship) => Change::Systems(ship.deserialize(&mut r)?),
            ComponentState::PlayerPhysics | ComponentState::LobbyBehaviour => Change::None,
        };
        *self = next;
        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schemas() {
        assert_eq!(
            ComponentKind::schema(SpawnKind::Player),
            &[
                ComponentKind::PlayerControl,
                ComponentKind::PlayerPhysics,
                ComponentKind::CustomNetworkTransform
            ]
        );
        assert_eq!(ComponentKind::schema(SpawnKind::PlanetMap), &[ComponentKind::ShipStatus]);
        assert_eq!(ComponentKind::schema(SpawnKind::GameData).len(), 2);
    }

    #[test]
    fn test_failed_update_leaves_state_unchanged() {
        let mut state = ComponentState::new(ComponentKind::ShipStatus, SpawnKind::ShipStatus);
        let before = state.clone();
        // Electrical bit set but only two of its three bytes present.
        assert!(state.deserialize(&[0x80, 0x01, 0x01, 0x02]).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn test_ship_state_follows_spawn_kind() {
        let state = ComponentState::new(ComponentKind::ShipStatus, SpawnKind::HeadQuarters);
        match state {
            ComponentState::ShipStatus(ship) => assert_eq!(ship.map, auproxy_core::MapId::MiraHq),
            other => panic!("unexpected state {other:?}"),
        }
    }
}
