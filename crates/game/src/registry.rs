//! Arena of spawned objects and the netid lookup for their components.
//!
//! Objects are keyed by a local [`ObjectId`]; components by the netid the
//! host assigned. Both maps are `BTreeMap`s so iteration order is stable,
//! which keeps snapshots and event order reproducible.

use crate::components::{Change, ComponentKind, ComponentState, GameDataTable, PlayerControl};
use crate::events::{EventQueue, GameEvent};
use auproxy_core::SpawnKind;
use auproxy_net::{CodecError, SpawnComponent};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Owner id the server uses for objects that belong to nobody.
pub const SERVER_OWNER: i32 = -2;

/// Local identity of a spawned object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

/// Where an object hangs in the game tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Parent {
    /// Directly under the game.
    Root,
    /// Under a client (players).
    Client(u32),
}

/// Registry failures. None of them are fatal to the session.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No live component has this netid.
    #[error("no component with netid {0}")]
    UnknownNetId(u32),
    /// The spawn id is not a known archetype.
    #[error("unknown spawn kind {0}")]
    UnknownSpawnKind(u32),
    /// A component payload did not decode.
    #[error("failed to decode {kind:?} component {netid}")]
    ComponentDecode {
        /// Component netid.
        netid: u32,
        /// Component class.
        kind: ComponentKind,
        /// Decoder error.
        #[source]
        source: CodecError,
    },
}

/// A spawned object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameObject {
    /// Arena id.
    pub id: ObjectId,
    /// Archetype.
    pub kind: SpawnKind,
    /// Owning client, or [`SERVER_OWNER`].
    pub owner: i32,
    /// Tree position.
    pub parent: Parent,
    /// Component netids in schema order, including despawned ones.
    pub components: Vec<u32>,
}

/// A live component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    /// Host-assigned id.
    pub netid: u32,
    /// Object the component belongs to.
    pub object: ObjectId,
    /// Replicated state.
    pub state: ComponentState,
}

/// Object arena plus netid lookup.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    objects: BTreeMap<ObjectId, GameObject>,
    components: BTreeMap<u32, Component>,
    next_object: u32,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object from a spawn part and register all of its components.
    ///
    /// A component whose initial state fails to decode is still registered
    /// with default state; the failure is reported as an event.
    pub fn spawn(
        &mut self,
        spawn_id: u32,
        owner: i32,
        records: &[SpawnComponent],
        events: &mut EventQueue,
    ) -> Result<ObjectId, RegistryError> {
        let kind = u8::try_from(spawn_id)
            .ok()
            .and_then(|id| SpawnKind::try_from(id).ok())
            .ok_or(RegistryError::UnknownSpawnKind(spawn_id))?;
        let schema = ComponentKind::schema(kind);
        if records.len() > schema.len() {
            for extra in &records[schema.len()..] {
                warn!(
                    "Ignoring component {} beyond the {:?} schema",
                    extra.netid, kind
                );
            }
        } else if records.len() < schema.len() {
            debug!(
                "Spawn of {:?} carries {} components, expected {}",
                kind,
                records.len(),
                schema.len()
            );
        }

        let id = ObjectId(self.next_object);
        self.next_object += 1;
        let parent = match (kind, u32::try_from(owner)) {
            (SpawnKind::Player, Ok(client)) => Parent::Client(client),
            _ => Parent::Root,
        };

        let mut netids = Vec::with_capacity(schema.len());
        let mut changes = Vec::new();
        for (&component_kind, record) in schema.iter().zip(records) {
            let mut state = ComponentState::new(component_kind, kind);
            match state.spawn(&record.data) {
                Ok(change) => changes.push((record.netid, change)),
                Err(source) => {
                    Self::report_decode_failure(record.netid, component_kind, &source, events);
                    state = ComponentState::new(component_kind, kind);
                }
            }
            if let Some(previous) = self.components.get(&record.netid).map(|c| c.object) {
                debug!("Netid {} respawned, replacing", record.netid);
                self.detach(previous, record.netid);
            }
            self.components.insert(
                record.netid,
                Component {
                    netid: record.netid,
                    object: id,
                    state,
                },
            );
            netids.push(record.netid);
        }

        self.objects.insert(
            id,
            GameObject {
                id,
                kind,
                owner,
                parent,
                components: netids,
            },
        );
        debug!("Spawned {:?} as object {} owned by {}", kind, id.0, owner);
        events.push(GameEvent::Spawned {
            object: id,
            kind,
            owner,
        });
        for (netid, change) in changes {
            self.emit_change(netid, change, events);
        }
        Ok(id)
    }

    /// Unlink `netid` from `object`, dropping the object once none of its
    /// remaining components is live.
    fn detach(&mut self, object: ObjectId, netid: u32) {
        let Some(entry) = self.objects.get_mut(&object) else {
            return;
        };
        entry.components.retain(|&n| n != netid);
        let orphaned = !entry
            .components
            .iter()
            .any(|n| self.components.get(n).is_some_and(|c| c.object == object));
        if orphaned {
            debug!("Dropping object {} after its components were reused", object.0);
            self.objects.remove(&object);
        }
    }

    /// Remove exactly one netid. The owning object stays in the arena.
    pub fn despawn(&mut self, netid: u32) -> Result<Component, RegistryError> {
        self.components
            .remove(&netid)
            .ok_or(RegistryError::UnknownNetId(netid))
    }

    /// Apply a data part to the addressed component.
    pub fn apply_data(
        &mut self,
        netid: u32,
        data: &[u8],
        events: &mut EventQueue,
    ) -> Result<(), RegistryError> {
        let component = self
            .components
            .get_mut(&netid)
            .ok_or(RegistryError::UnknownNetId(netid))?;
        let kind = component.state.kind();
        match component.state.deserialize(data) {
            Ok(change) => {
                self.emit_change(netid, change, events);
                Ok(())
            }
            Err(source) => {
                Self::report_decode_failure(netid, kind, &source, events);
                Err(RegistryError::ComponentDecode { netid, kind, source })
            }
        }
    }

    fn report_decode_failure(
        netid: u32,
        kind: ComponentKind,
        source: &CodecError,
        events: &mut EventQueue,
    ) {
        warn!("Failed to decode {:?} component {}: {}", kind, netid, source);
        events.push(GameEvent::ComponentDecodeFailed {
            netid,
            kind,
            error: source.to_string(),
        });
    }

    fn emit_change(&self, netid: u32, change: Change, events: &mut EventQueue) {
        match change {
            Change::None => {}
            Change::Moved => {
                if let Some(ComponentState::CustomNetworkTransform(cnt)) =
                    self.components.get(&netid).map(|c| &c.state)
                {
                    events.push(GameEvent::Moved {
                        client_id: self.owner_of(netid).unwrap_or(SERVER_OWNER),
                        netid,
                        position: cnt.position,
                        velocity: cnt.velocity,
                    });
                }
            }
            Change::Players(player_ids) => {
                if !player_ids.is_empty() {
                    events.push(GameEvent::PlayerDataUpdated { player_ids });
                }
            }
            Change::Votes(votes) => {
                for vote in votes {
                    events.push(GameEvent::VoteCast {
                        voter: vote.voter,
                        suspect: vote.suspect,
                    });
                }
            }
            Change::Systems(slots) => trace!(netid, "Ship systems updated: {:?}", slots),
        }
    }

    /// Whether `netid` is live.
    pub fn contains(&self, netid: u32) -> bool {
        self.components.contains_key(&netid)
    }

    /// Number of live components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether no component is live.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Live component by netid.
    pub fn component(&self, netid: u32) -> Option<&Component> {
        self.components.get(&netid)
    }

    /// Mutable live component by netid.
    pub fn component_mut(&mut self, netid: u32) -> Option<&mut Component> {
        self.components.get_mut(&netid)
    }

    /// Live components in netid order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    /// Object by arena id.
    pub fn object(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    /// Objects in spawn order.
    pub fn objects(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.values()
    }

    /// Objects directly under `parent`.
    pub fn children(&self, parent: Parent) -> impl Iterator<Item = &GameObject> {
        self.objects.values().filter(move |o| o.parent == parent)
    }

    /// Object a live netid belongs to.
    pub fn object_of(&self, netid: u32) -> Option<&GameObject> {
        self.components
            .get(&netid)
            .and_then(|c| self.objects.get(&c.object))
    }

    /// Owner of the object a live netid belongs to.
    pub fn owner_of(&self, netid: u32) -> Option<i32> {
        self.object_of(netid).map(|o| o.owner)
    }

    /// Live component of `kind` on `object`.
    pub fn component_of(&self, object: &GameObject, kind: ComponentKind) -> Option<&Component> {
        object
            .components
            .iter()
            .filter_map(|netid| self.components.get(netid))
            .find(|c| c.state.kind() == kind)
    }

    /// First live component of `kind` anywhere, e.g. the single GameData table.
    pub fn find(&self, kind: ComponentKind) -> Option<&Component> {
        self.components.values().find(|c| c.state.kind() == kind)
    }

    /// Newest player object owned by `client_id`.
    pub fn player_object(&self, client_id: u32) -> Option<&GameObject> {
        self.children(Parent::Client(client_id))
            .filter(|o| o.kind == SpawnKind::Player)
            .last()
    }

    /// A client's live component of `kind` on its player object.
    pub fn player_component(&self, client_id: u32, kind: ComponentKind) -> Option<&Component> {
        self.player_object(client_id)
            .and_then(|object| self.component_of(object, kind))
    }

    /// PlayerControl state on `object`.
    pub fn player_control_on(&self, object: &GameObject) -> Option<&PlayerControl> {
        match self.component_of(object, ComponentKind::PlayerControl)?.state {
            ComponentState::PlayerControl(ref pc) => Some(pc),
            _ => None,
        }
    }

    /// Player id of a client.
    pub fn player_id(&self, client_id: u32) -> Option<u8> {
        let object = self.player_object(client_id)?;
        self.player_control_on(object).map(|pc| pc.player_id)
    }

    /// Player id of the player object that owns a live netid.
    pub fn player_id_of(&self, netid: u32) -> Option<u8> {
        let object = self.object_of(netid)?;
        self.player_control_on(object).map(|pc| pc.player_id)
    }

    /// Client whose player has `player_id`.
    pub fn client_by_player_id(&self, player_id: u8) -> Option<u32> {
        self.objects
            .values()
            .filter(|o| o.kind == SpawnKind::Player)
            .filter(|o| self.player_control_on(o).map(|pc| pc.player_id) == Some(player_id))
            .find_map(|o| u32::try_from(o.owner).ok())
    }

    /// Client owning the player object a live netid belongs to.
    pub fn client_by_netid(&self, netid: u32) -> Option<u32> {
        self.object_of(netid)
            .filter(|o| o.kind == SpawnKind::Player)
            .and_then(|o| u32::try_from(o.owner).ok())
    }

    /// The player table, once GameData has spawned.
    pub fn game_data(&self) -> Option<&GameDataTable> {
        match self.find(ComponentKind::GameData)?.state {
            ComponentState::GameData(ref table) => Some(table),
            _ => None,
        }
    }

    /// Mutable player table.
    pub fn game_data_mut(&mut self) -> Option<&mut GameDataTable> {
        self.components
            .values_mut()
            .find_map(|c| match &mut c.state {
                ComponentState::GameData(table) => Some(table),
                _ => None,
            })
    }

    /// Drop every object owned by `client_id` together with its live components.
    pub fn remove_owned(&mut self, client_id: u32) -> Vec<u32> {
        let owner = client_id as i32;
        let owned: Vec<ObjectId> = self
            .objects
            .values()
            .filter(|o| o.owner == owner)
            .map(|o| o.id)
            .collect();
        let mut removed = Vec::new();
        for id in owned {
            if let Some(object) = self.objects.remove(&id) {
                for netid in object.components {
                    if self.components.remove(&netid).is_some() {
                        removed.push(netid);
                    }
                }
            }
        }
        removed
    }

    /// Copy of the registry without the objects owned by `client_id`.
    pub fn snapshot(&self, client_id: u32) -> Registry {
        let mut copy = self.clone();
        copy.remove_owned(client_id);
        copy
    }

    /// Re-inject objects from `snapshot` that this registry does not already have.
    ///
    /// An object is skipped when any of its live netids is already present,
    /// so state received in the current session always wins over the snapshot.
    /// Returns how many objects were restored.
    pub fn restore(&mut self, snapshot: &Registry) -> usize {
        let mut restored = 0;
        for object in snapshot.objects.values() {
            let live: Vec<&Component> = object
                .components
                .iter()
                .filter_map(|netid| snapshot.components.get(netid))
                .collect();
            if live.is_empty() || live.iter().any(|c| self.components.contains_key(&c.netid)) {
                continue;
            }

            let id = ObjectId(self.next_object);
            self.next_object += 1;
            for component in live {
                self.components.insert(
                    component.netid,
                    Component {
                        object: id,
                        ..component.clone()
                    },
                );
            }
            self.objects.insert(
                id,
                GameObject {
                    id,
                    ..object.clone()
                },
            );
            restored += 1;
        }
        debug!("Restored {} objects from snapshot", restored);
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auproxy_net::Writer;

    fn record(netid: u32, data: Vec<u8>) -> SpawnComponent {
        SpawnComponent {
            netid,
            tag: 1,
            data,
        }
    }

    fn cnt_bytes(sequence: u16) -> Vec<u8> {
        let mut w = Writer::new();
        w.u16_le(sequence).u16_le(0x8000).u16_le(0x8000).u16_le(0x8000).u16_le(0x8000);
        w.into_inner()
    }

    fn spawn_player(registry: &mut Registry, client: i32, player_id: u8, base: u32) -> ObjectId {
        let mut events = EventQueue::default();
        registry
            .spawn(
                4,
                client,
                &[
                    record(base, vec![1, player_id]),
                    record(base + 1, vec![]),
                    record(base + 2, cnt_bytes(1)),
                ],
                &mut events,
            )
            .unwrap()
    }

    #[test]
    fn test_spawn_registers_every_component() {
        let mut registry = Registry::new();
        let mut events = EventQueue::default();
        let id = registry
            .spawn(
                4,
                7,
                &[record(10, vec![1, 3]), record(11, vec![]), record(12, cnt_bytes(1))],
                &mut events,
            )
            .unwrap();

        assert_eq!(registry.len(), 3);
        let object = registry.object(id).unwrap();
        assert_eq!(object.parent, Parent::Client(7));
        assert_eq!(object.components, vec![10, 11, 12]);
        assert_eq!(registry.player_id(7), Some(3));
        assert_eq!(registry.client_by_player_id(3), Some(7));
        assert_eq!(registry.client_by_netid(12), Some(7));

        let events = events.drain();
        assert!(matches!(events[0], GameEvent::Spawned { owner: 7, .. }));
        assert!(matches!(events[1], GameEvent::Moved { client_id: 7, netid: 12, .. }));
    }

    #[test]
    fn test_unknown_spawn_kind() {
        let mut registry = Registry::new();
        let err = registry
            .spawn(42, -2, &[], &mut EventQueue::default())
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownSpawnKind(42)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_despawn_removes_exactly_one_mapping() {
        let mut registry = Registry::new();
        let id = spawn_player(&mut registry, 1, 0, 20);
        spawn_player(&mut registry, 2, 1, 30);

        let removed = registry.despawn(21).unwrap();
        assert_eq!(removed.object, id);
        assert!(!registry.contains(21));
        for netid in [20, 22, 30, 31, 32] {
            assert!(registry.contains(netid), "netid {netid} lost");
        }
        assert!(registry.object(id).is_some());
        assert!(matches!(
            registry.despawn(21),
            Err(RegistryError::UnknownNetId(21))
        ));
    }

    #[test]
    fn test_data_for_removed_netid_is_rejected_without_side_effects() {
        let mut registry = Registry::new();
        spawn_player(&mut registry, 1, 0, 20);
        registry.despawn(22).unwrap();

        let mut events = EventQueue::default();
        let result = registry.apply_data(22, &cnt_bytes(5), &mut events);
        assert!(matches!(result, Err(RegistryError::UnknownNetId(22))));
        assert!(events.is_empty());
    }

    #[test]
    fn test_bad_component_payload_is_scoped() {
        let mut registry = Registry::new();
        let mut events = EventQueue::default();
        // PlayerControl blob is one byte short.
        registry
            .spawn(4, 1, &[record(5, vec![1]), record(6, vec![]), record(7, cnt_bytes(1))], &mut events)
            .unwrap();
        assert_eq!(registry.len(), 3);

        let events = events.drain();
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::ComponentDecodeFailed {
                netid: 5,
                kind: ComponentKind::PlayerControl,
                ..
            }
        )));
        assert!(events.iter().any(|e| matches!(e, GameEvent::Moved { netid: 7, .. })));
    }

    #[test]
    fn test_meeting_update_emits_votes() {
        let mut registry = Registry::new();
        let mut events = EventQueue::default();
        registry
            .spawn(1, -2, &[record(50, vec![0, 0, 0])], &mut events)
            .unwrap();
        events.drain();

        registry.apply_data(50, &[0b100, 0, 0, 0x40 | 0x02], &mut events).unwrap();
        assert_eq!(
            events.drain(),
            vec![GameEvent::VoteCast {
                voter: 2,
                suspect: Some(1)
            }]
        );
    }

    #[test]
    fn test_snapshot_excludes_own_objects_and_restore_merges() {
        let mut registry = Registry::new();
        spawn_player(&mut registry, 1, 0, 20);
        spawn_player(&mut registry, 2, 1, 30);
        let snapshot = registry.snapshot(2);
        assert!(snapshot.player_object(2).is_none());
        assert!(snapshot.contains(20));

        let mut fresh = Registry::new();
        spawn_player(&mut fresh, 3, 2, 40);
        assert_eq!(fresh.restore(&snapshot), 1);
        assert_eq!(fresh.player_id(1), Some(0));
        assert_eq!(fresh.player_id(3), Some(2));
        // Restoring twice adds nothing.
        assert_eq!(fresh.restore(&snapshot), 0);
    }

    #[test]
    fn test_remove_owned() {
        let mut registry = Registry::new();
        spawn_player(&mut registry, 1, 0, 20);
        spawn_player(&mut registry, 2, 1, 30);
        let mut removed = registry.remove_owned(1);
        removed.sort_unstable();
        assert_eq!(removed, vec![20, 21, 22]);
        assert!(registry.player_object(1).is_none());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_respawned_netids_move_to_the_new_object() {
        let mut registry = Registry::new();
        let stale = spawn_player(&mut registry, 1, 0, 20);
        let fresh = spawn_player(&mut registry, 2, 3, 20);

        assert!(registry.object(stale).is_none());
        assert_eq!(registry.objects().count(), 1);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.client_by_player_id(3), Some(2));
        assert_eq!(registry.client_by_player_id(0), None);
        assert_eq!(registry.player_id(1), None);
        assert_eq!(registry.player_id(2), Some(3));
        assert_eq!(registry.object_of(21).map(|o| o.id), Some(fresh));
    }

    #[test]
    fn test_partial_respawn_keeps_the_rest_of_the_old_object() {
        let mut registry = Registry::new();
        let old = spawn_player(&mut registry, 1, 0, 20);
        let mut events = EventQueue::default();
        let lobby = registry
            .spawn(2, SERVER_OWNER, &[record(22, vec![])], &mut events)
            .unwrap();

        assert_eq!(registry.object(old).unwrap().components, vec![20, 21]);
        assert_eq!(registry.player_id(1), Some(0));
        assert_eq!(registry.object_of(22).map(|o| o.id), Some(lobby));
    }

    #[test]
    fn test_records_beyond_the_schema_are_ignored() {
        let mut registry = Registry::new();
        let mut events = EventQueue::default();
        let id = registry
            .spawn(
                2,
                SERVER_OWNER,
                &[record(40, vec![]), record(41, vec![9, 9])],
                &mut events,
            )
            .unwrap();
        assert_eq!(registry.object(id).unwrap().components, vec![40]);
        assert!(!registry.contains(41));
    }
}
