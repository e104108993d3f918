//! Lobby state built from client-bound payloads.

use crate::components::{ComponentState, Vector2};
use crate::events::{EventQueue, GameEvent, VoteOutcome};
use crate::registry::{Registry, RegistryError, SERVER_OWNER};
use auproxy_core::{AlterGameTag, SpawnKind};
use auproxy_net::{GameOptions, Part, Payload, PlayerFlags, Rpc, EMERGENCY};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, trace, warn};

/// Whether the lobby is listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Join by code only.
    #[default]
    Private,
    /// Listed in game search.
    Public,
}

/// Per-client bookkeeping that is not part of any component.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientState {
    /// Client id.
    pub client_id: u32,
    /// Sent Ready after the game started.
    pub ready: bool,
    /// Killed or ejected.
    pub dead: bool,
    /// Task type ids assigned by the host.
    pub tasks: Vec<u8>,
    /// Last scene the client reported.
    pub scene: Option<String>,
}

impl ClientState {
    fn new(client_id: u32) -> Self {
        Self {
            client_id,
            ..Default::default()
        }
    }
}

/// State carried across a reconnect.
#[derive(Debug, Clone)]
pub struct GameSnapshot {
    /// Room code the snapshot was taken in.
    pub code: i32,
    /// Objects other than the local client's.
    pub registry: Registry,
    /// Clients other than the local one.
    pub clients: BTreeMap<u32, ClientState>,
    /// Host at snapshot time.
    pub host_id: u32,
    /// Settings, if synced.
    pub options: Option<GameOptions>,
    /// Impostor player ids.
    pub impostors: Vec<u8>,
    /// Game in progress.
    pub started: bool,
}

/// One joined lobby as seen by the local client.
#[derive(Debug, Clone)]
pub struct Game {
    code: i32,
    local_id: u32,
    host_id: u32,
    clients: BTreeMap<u32, ClientState>,
    registry: Registry,
    start_counter: i8,
    start_counter_seq: Option<u32>,
    started: bool,
    finished: bool,
    impostors: Vec<u8>,
    options: Option<GameOptions>,
    visibility: Visibility,
    events: EventQueue,
}

impl Game {
    /// State right after JoinedGame: the local client plus everyone already present.
    pub fn new(code: i32, local_id: u32, host_id: u32, others: &[u32]) -> Self {
        let clients = std::iter::once(local_id)
            .chain(others.iter().copied())
            .map(|id| (id, ClientState::new(id)))
            .collect();
        Self {
            code,
            local_id,
            host_id,
            clients,
            registry: Registry::new(),
            start_counter: -1,
            start_counter_seq: None,
            started: false,
            finished: false,
            impostors: Vec::new(),
            options: None,
            visibility: Visibility::default(),
            events: EventQueue::default(),
        }
    }

    /// Room code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Local client id.
    pub fn local_id(&self) -> u32 {
        self.local_id
    }

    /// Current host.
    pub fn host_id(&self) -> u32 {
        self.host_id
    }

    /// Whether the local client is the host.
    pub fn is_host(&self) -> bool {
        self.local_id == self.host_id
    }

    /// Clients in the lobby.
    pub fn clients(&self) -> &BTreeMap<u32, ClientState> {
        &self.clients
    }

    /// One client.
    pub fn client(&self, client_id: u32) -> Option<&ClientState> {
        self.clients.get(&client_id)
    }

    /// Object arena.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable object arena.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Seconds on the lobby countdown, `-1` when idle.
    pub fn start_counter(&self) -> i8 {
        self.start_counter
    }

    /// Whether a round is in progress.
    pub fn started(&self) -> bool {
        self.started
    }

    /// Whether the last round ended.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Impostor player ids.
    pub fn impostors(&self) -> &[u8] {
        &self.impostors
    }

    /// Settings, once the host synced them.
    pub fn options(&self) -> Option<&GameOptions> {
        self.options.as_ref()
    }

    /// Lobby visibility.
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Take queued events.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain()
    }

    fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    fn set_host(&mut self, host_id: u32) {
        if host_id != self.host_id {
            info!("Host changed from {} to {}", self.host_id, host_id);
            self.host_id = host_id;
            self.emit(GameEvent::HostChanged { host_id });
        }
    }

    /// Apply one client-bound payload. Payloads for other rooms are ignored.
    pub fn handle_payload(&mut self, payload: &Payload) {
        match payload {
            Payload::PlayerJoined {
                code,
                client_id,
                host_id,
            } if *code == self.code => {
                self.clients
                    .entry(*client_id)
                    .or_insert_with(|| ClientState::new(*client_id));
                debug!("Client {} joined", client_id);
                self.emit(GameEvent::PlayerJoined {
                    client_id: *client_id,
                });
                self.set_host(*host_id);
            }
            Payload::StartGame { code } if *code == self.code => {
                info!("Game {} started", self.code);
                self.started = true;
                self.finished = false;
                self.emit(GameEvent::GameStarted);
            }
            Payload::EndGame { code, reason, .. } if *code == self.code => {
                info!("Game {} ended: {:?}", self.code, reason);
                self.started = false;
                self.finished = true;
                self.emit(GameEvent::GameEnded { reason: *reason });
            }
            Payload::RemovePlayer {
                code,
                client_id,
                host_id,
                reason,
                ..
            } if *code == self.code => {
                if self.clients.remove(client_id).is_some() {
                    let removed = self.registry.remove_owned(*client_id);
                    debug!("Client {} left, dropped netids {:?}", client_id, removed);
                    self.emit(GameEvent::PlayerLeft {
                        client_id: *client_id,
                        reason: *reason,
                    });
                }
                self.set_host(*host_id);
            }
            Payload::PlayerKicked {
                code,
                client_id,
                banned,
            } if *code == self.code => {
                self.emit(GameEvent::Kicked {
                    client_id: *client_id,
                    banned: *banned,
                });
            }
            Payload::GameData { code, parts } | Payload::GameDataTo { code, parts, .. }
                if *code == self.code =>
            {
                for part in parts {
                    self.handle_part(part);
                }
            }
            Payload::AlterGame {
                code,
                tag: AlterGameTag::ChangePrivacy,
                is_public,
            } if *code == self.code => {
                self.visibility = if *is_public {
                    Visibility::Public
                } else {
                    Visibility::Private
                };
                self.emit(GameEvent::VisibilityChanged { public: *is_public });
            }
            other => trace!("Ignoring payload {:#04x}", other.id()),
        }
    }

    /// Apply one part of a GameData payload.
    pub fn handle_part(&mut self, part: &Part) {
        match part {
            Part::Data { netid, data } => {
                match self.registry.apply_data(*netid, data, &mut self.events) {
                    Ok(()) => {}
                    Err(RegistryError::UnknownNetId(_)) => {
                        debug!("Ignoring data for unknown netid {}", netid)
                    }
                    Err(e) => debug!("{}", e),
                }
            }
            Part::Rpc { netid, rpc } => self.handle_rpc(*netid, rpc),
            Part::Spawn {
                spawn_id,
                owner,
                components,
                ..
            } => self.handle_spawn(*spawn_id, *owner, components),
            Part::Despawn { netid } => match self.registry.despawn(*netid) {
                Ok(_) => self.emit(GameEvent::Despawned { netid: *netid }),
                Err(e) => debug!("Ignoring despawn: {}", e),
            },
            Part::SceneChange { client_id, scene } => {
                if let Some(client) = self.clients.get_mut(client_id) {
                    client.scene = Some(scene.clone());
                }
                self.emit(GameEvent::SceneChanged {
                    client_id: *client_id,
                    scene: scene.clone(),
                });
            }
            Part::Ready { client_id } => {
                if let Some(client) = self.clients.get_mut(client_id) {
                    client.ready = true;
                }
            }
            Part::ChangeSettings | Part::Unknown { .. } => {
                trace!("Ignoring part {:#04x}", part.tag())
            }
        }
    }

    fn handle_spawn(
        &mut self,
        spawn_id: u32,
        owner: i32,
        components: &[auproxy_net::SpawnComponent],
    ) {
        match self
            .registry
            .spawn(spawn_id, owner, components, &mut self.events)
        {
            Ok(id) => {
                let is_player = self
                    .registry
                    .object(id)
                    .is_some_and(|o| o.kind == SpawnKind::Player);
                if let (true, Ok(client_id)) = (is_player, u32::try_from(owner)) {
                    self.clients
                        .entry(client_id)
                        .or_insert_with(|| ClientState::new(client_id));
                }
            }
            Err(e) => warn!("Ignoring spawn: {}", e),
        }
    }

    /// Apply an RPC addressed to `netid`. RPCs to unknown netids are dropped.
    pub fn handle_rpc(&mut self, netid: u32, rpc: &Rpc) {
        if !self.registry.contains(netid) {
            debug!("Ignoring RPC for unknown netid {}", netid);
            return;
        }
        let player_id = self.registry.player_id_of(netid);

        match rpc {
            Rpc::SyncSettings { options } => {
                debug!("Settings synced, map {:?}", options.map);
                self.options = Some(options.clone());
                self.emit(GameEvent::SettingsSynced {
                    options: options.clone(),
                });
            }
            Rpc::SetInfected { impostors } => {
                self.impostors = impostors.clone();
                if let Some(table) = self.registry.game_data_mut() {
                    for &id in impostors {
                        table.player_mut(id).flags.insert(PlayerFlags::IMPOSTOR);
                    }
                }
                self.emit(GameEvent::ImpostersSet {
                    impostors: impostors.clone(),
                });
            }
            Rpc::MurderPlayer { target } => {
                let victim = self.registry.client_by_netid(*target);
                let murderer = self.registry.client_by_netid(netid);
                if let (Some(victim), Some(murderer)) = (victim, murderer) {
                    if let Some(victim_pid) = self.registry.player_id_of(*target) {
                        self.mark_dead(victim_pid);
                    }
                    if let Some(client) = self.clients.get_mut(&victim) {
                        client.dead = true;
                    }
                    self.emit(GameEvent::Murder { murderer, victim });
                } else {
                    debug!("Murder between unresolved netids {} and {}", netid, target);
                }
            }
            Rpc::StartMeeting { body } => {
                self.emit(GameEvent::MeetingStarted {
                    body: (*body != EMERGENCY).then_some(*body),
                });
            }
            Rpc::SetStartCounter { sequence, seconds } => {
                if self.start_counter_seq.map_or(true, |seq| *sequence > seq) {
                    self.start_counter_seq = Some(*sequence);
                    self.start_counter = *seconds;
                    self.emit(GameEvent::StartCounter { seconds: *seconds });
                }
            }
            Rpc::VotingComplete { exiled, tie, .. } => {
                let outcome = if *tie {
                    VoteOutcome::Tie
                } else if *exiled == EMERGENCY {
                    VoteOutcome::Skipped
                } else {
                    VoteOutcome::Exiled { player_id: *exiled }
                };
                self.emit(GameEvent::VotingComplete { outcome });
            }
            Rpc::SetTasks { player, tasks } => {
                if let Some(client_id) = self.registry.client_by_player_id(*player) {
                    if let Some(client) = self.clients.get_mut(&client_id) {
                        client.tasks = tasks.clone();
                    }
                }
                self.emit(GameEvent::TasksSet {
                    player_id: *player,
                    tasks: tasks.clone(),
                });
            }
            Rpc::UpdateGameData { players } => match self.registry.game_data_mut() {
                Some(table) => {
                    let player_ids = table.update_players(players.iter().cloned());
                    self.emit(GameEvent::PlayerDataUpdated { player_ids });
                }
                None => debug!("Player table update before GameData spawned"),
            },
            Rpc::SnapTo { x, y } => {
                let position = Vector2::new(*x, *y);
                let client_id = self.registry.owner_of(netid).unwrap_or(SERVER_OWNER);
                if let Some(ComponentState::CustomNetworkTransform(cnt)) =
                    self.registry.component_mut(netid).map(|c| &mut c.state)
                {
                    cnt.position = position;
                    cnt.velocity = Vector2::default();
                }
                self.emit(GameEvent::SnappedTo {
                    client_id,
                    position,
                });
            }
            rpc => match player_id {
                Some(player_id) => self.handle_player_rpc(player_id, rpc),
                None => trace!(netid, "Unhandled RPC {:?}", rpc),
            },
        }
    }

    /// RPCs whose effect is on the calling player's row.
    fn handle_player_rpc(&mut self, player_id: u8, rpc: &Rpc) {
        let event = match rpc {
            Rpc::SetName { name } => {
                self.row(player_id, |row| row.name = name.clone());
                GameEvent::NameChanged {
                    player_id,
                    name: name.clone(),
                }
            }
            Rpc::SetColour { colour } => {
                self.row(player_id, |row| row.colour = *colour);
                GameEvent::ColourChanged {
                    player_id,
                    colour: *colour,
                }
            }
            Rpc::SetHat { hat } => {
                self.row(player_id, |row| row.hat = *hat as u32);
                GameEvent::HatChanged {
                    player_id,
                    hat: *hat,
                }
            }
            Rpc::SetSkin { skin } => {
                self.row(player_id, |row| row.skin = *skin as u32);
                GameEvent::SkinChanged {
                    player_id,
                    skin: *skin,
                }
            }
            Rpc::SetPet { pet } => {
                self.row(player_id, |row| row.pet = *pet as u32);
                GameEvent::PetChanged {
                    player_id,
                    pet: *pet,
                }
            }
            Rpc::SendChat { text } => GameEvent::ChatMessage {
                player_id,
                text: text.clone(),
            },
            Rpc::CompleteTask { task } => {
                self.row(player_id, |row| {
                    if let Some(state) = row.tasks.get_mut(*task as usize) {
                        state.completed = true;
                    }
                });
                GameEvent::TaskCompleted {
                    player_id,
                    task: *task,
                }
            }
            Rpc::Exiled => {
                self.mark_dead(player_id);
                if let Some(client) = self
                    .registry
                    .client_by_player_id(player_id)
                    .and_then(|id| self.clients.get_mut(&id))
                {
                    client.dead = true;
                }
                GameEvent::Exiled { player_id }
            }
            Rpc::EnterVent { vent } => GameEvent::VentEntered {
                player_id,
                vent: *vent,
            },
            Rpc::ExitVent { vent } => GameEvent::VentExited {
                player_id,
                vent: *vent,
            },
            other => {
                trace!(player_id, "Unhandled player RPC {:?}", other);
                return;
            }
        };
        self.emit(event);
    }

    fn row(&mut self, player_id: u8, edit: impl FnOnce(&mut auproxy_net::PlayerData)) {
        if let Some(table) = self.registry.game_data_mut() {
            edit(table.player_mut(player_id));
        }
    }

    fn mark_dead(&mut self, player_id: u8) {
        self.row(player_id, |row| row.flags.insert(PlayerFlags::DEAD));
    }

    /// Copy of the state worth keeping across a reconnect.
    pub fn snapshot(&self) -> GameSnapshot {
        let mut clients = self.clients.clone();
        clients.remove(&self.local_id);
        GameSnapshot {
            code: self.code,
            registry: self.registry.snapshot(self.local_id),
            clients,
            host_id: self.host_id,
            options: self.options.clone(),
            impostors: self.impostors.clone(),
            started: self.started,
        }
    }

    /// Fill in state from a snapshot of the same room that this session has not
    /// received yet. Fresh state always wins. Returns the restored object count.
    pub fn restore(&mut self, snapshot: &GameSnapshot) -> usize {
        if snapshot.code != self.code {
            warn!(
                "Not restoring snapshot of {} into game {}",
                snapshot.code, self.code
            );
            return 0;
        }
        for (id, client) in &snapshot.clients {
            if *id != self.local_id {
                self.clients.entry(*id).or_insert_with(|| client.clone());
            }
        }
        if self.options.is_none() {
            self.options = snapshot.options.clone();
        }
        if self.impostors.is_empty() {
            self.impostors = snapshot.impostors.clone();
        }
        self.registry.restore(&snapshot.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auproxy_core::{Colour, DisconnectReason, GameEndReason};
    use auproxy_net::{SpawnComponent, Writer};

    const CODE: i32 = -2_000_000_000;

    fn component(netid: u32, data: Vec<u8>) -> SpawnComponent {
        SpawnComponent {
            netid,
            tag: 1,
            data,
        }
    }

    fn player_spawn(owner: i32, player_id: u8, base: u32) -> Part {
        let mut cnt = Writer::new();
        cnt.u16_le(1).u16_le(0).u16_le(0).u16_le(0).u16_le(0);
        Part::Spawn {
            spawn_id: 4,
            owner,
            flags: 0,
            components: vec![
                component(base, vec![0, player_id]),
                component(base + 1, vec![]),
                component(base + 2, cnt.into_inner()),
            ],
        }
    }

    fn game_data_spawn(netid: u32, rows: &[(u8, &str)]) -> Part {
        let mut w = Writer::new();
        w.packed(rows.len() as u32);
        for (id, name) in rows {
            let mut row = auproxy_net::PlayerData::new(*id);
            row.name = name.to_string();
            row.encode(&mut w).unwrap();
        }
        Part::Spawn {
            spawn_id: 3,
            owner: -2,
            flags: 0,
            components: vec![component(netid, w.into_inner()), component(netid + 1, vec![0])],
        }
    }

    fn lobby() -> Game {
        let mut game = Game::new(CODE, 5, 1, &[1]);
        game.handle_payload(&Payload::GameData {
            code: CODE,
            parts: vec![
                game_data_spawn(2, &[(0, "host"), (1, "me")]),
                player_spawn(1, 0, 10),
                player_spawn(5, 1, 20),
            ],
        });
        game.drain_events();
        game
    }

    fn rpc(game: &mut Game, netid: u32, rpc: Rpc) -> Vec<GameEvent> {
        game.handle_payload(&Payload::GameData {
            code: CODE,
            parts: vec![Part::Rpc { netid, rpc }],
        });
        game.drain_events()
    }

    #[test]
    fn test_new_game_tracks_local_and_existing_clients() {
        let game = Game::new(CODE, 5, 1, &[1, 3]);
        assert_eq!(game.clients().len(), 3);
        assert!(!game.is_host());
        assert_eq!(game.visibility(), Visibility::Private);
    }

    #[test]
    fn test_join_and_leave() {
        let mut game = lobby();
        game.handle_payload(&Payload::PlayerJoined {
            code: CODE,
            client_id: 9,
            host_id: 1,
        });
        game.handle_payload(&Payload::RemovePlayer {
            code: CODE,
            client_id: 1,
            host_id: 5,
            reason: Some(DisconnectReason::IntentionalLeaving),
            message: None,
        });
        let events = game.drain_events();
        assert_eq!(
            events,
            vec![
                GameEvent::PlayerJoined { client_id: 9 },
                GameEvent::PlayerLeft {
                    client_id: 1,
                    reason: Some(DisconnectReason::IntentionalLeaving)
                },
                GameEvent::HostChanged { host_id: 5 },
            ]
        );
        assert!(game.is_host());
        assert!(!game.registry().contains(10));
    }

    #[test]
    fn test_other_room_is_ignored() {
        let mut game = lobby();
        game.handle_payload(&Payload::StartGame { code: CODE + 1 });
        assert!(!game.started());
        game.handle_payload(&Payload::StartGame { code: CODE });
        game.handle_payload(&Payload::EndGame {
            code: CODE,
            reason: GameEndReason::HumansByTask,
            show_ad: false,
        });
        assert!(game.finished());
        assert_eq!(
            game.drain_events(),
            vec![
                GameEvent::GameStarted,
                GameEvent::GameEnded {
                    reason: GameEndReason::HumansByTask
                }
            ]
        );
    }

    #[test]
    fn test_murder_marks_victim_dead() {
        let mut game = lobby();
        let events = rpc(&mut game, 10, Rpc::MurderPlayer { target: 20 });
        assert_eq!(
            events,
            vec![GameEvent::Murder {
                murderer: 1,
                victim: 5
            }]
        );
        assert!(game.client(5).unwrap().dead);
        let row = game.registry().game_data().unwrap().player(1).unwrap();
        assert!(row.flags.contains(PlayerFlags::DEAD));
    }

    #[test]
    fn test_rpc_to_unknown_netid_is_noop() {
        let mut game = lobby();
        game.handle_payload(&Payload::GameData {
            code: CODE,
            parts: vec![Part::Despawn { netid: 20 }],
        });
        game.drain_events();
        assert!(rpc(&mut game, 20, Rpc::SetColour { colour: Colour::Lime }).is_empty());
        assert!(rpc(&mut game, 999, Rpc::SendChat { text: "hi".into() }).is_empty());
    }

    #[test]
    fn test_cosmetics_update_player_table() {
        let mut game = lobby();
        let events = rpc(&mut game, 20, Rpc::SetColour { colour: Colour::Lime });
        assert_eq!(
            events,
            vec![GameEvent::ColourChanged {
                player_id: 1,
                colour: Colour::Lime
            }]
        );
        let events = rpc(&mut game, 20, Rpc::SetName { name: "new".into() });
        assert_eq!(events.len(), 1);
        let row = game.registry().game_data().unwrap().player(1).unwrap();
        assert_eq!(row.colour, Colour::Lime);
        assert_eq!(row.name, "new");
    }

    #[test]
    fn test_start_counter_requires_newer_sequence() {
        let mut game = lobby();
        rpc(&mut game, 10, Rpc::SetStartCounter { sequence: 4, seconds: 5 });
        let stale = rpc(&mut game, 10, Rpc::SetStartCounter { sequence: 3, seconds: 2 });
        assert!(stale.is_empty());
        assert_eq!(game.start_counter(), 5);
    }

    #[test]
    fn test_meeting_and_voting_outcomes() {
        let mut game = lobby();
        assert_eq!(
            rpc(&mut game, 10, Rpc::StartMeeting { body: EMERGENCY }),
            vec![GameEvent::MeetingStarted { body: None }]
        );
        let outcome = |events: Vec<GameEvent>| match &events[..] {
            [GameEvent::VotingComplete { outcome }] => *outcome,
            other => panic!("unexpected events {other:?}"),
        };
        let complete = |exiled, tie| Rpc::VotingComplete {
            states: vec![],
            exiled,
            tie,
        };
        assert_eq!(outcome(rpc(&mut game, 2, complete(0xFF, true))), VoteOutcome::Tie);
        assert_eq!(outcome(rpc(&mut game, 2, complete(0xFF, false))), VoteOutcome::Skipped);
        assert_eq!(
            outcome(rpc(&mut game, 2, complete(1, false))),
            VoteOutcome::Exiled { player_id: 1 }
        );
    }

    #[test]
    fn test_set_tasks_and_visibility() {
        let mut game = lobby();
        rpc(&mut game, 2, Rpc::SetTasks {
            player: 1,
            tasks: vec![3, 4],
        });
        assert_eq!(game.client(5).unwrap().tasks, vec![3, 4]);

        game.handle_payload(&Payload::AlterGame {
            code: CODE,
            tag: AlterGameTag::ChangePrivacy,
            is_public: true,
        });
        assert_eq!(game.visibility(), Visibility::Public);
    }

    #[test]
    fn test_snapshot_restore_across_sessions() {
        let mut game = lobby();
        rpc(&mut game, 10, Rpc::SyncSettings {
            options: GameOptions::default(),
        });
        let snapshot = game.snapshot();
        assert!(snapshot.registry.player_object(5).is_none());
        assert!(!snapshot.clients.contains_key(&5));

        let mut rejoined = Game::new(CODE, 6, 1, &[1]);
        assert_eq!(rejoined.restore(&snapshot), 2);
        assert!(rejoined.options().is_some());
        assert_eq!(rejoined.registry().player_id(1), Some(0));
        assert!(rejoined.client(5).is_none());
    }

    #[test]
    fn test_spawn_part_adds_owner_and_respawn_replaces_restored_player() {
        let mut game = lobby();
        let snapshot = game.snapshot();

        let mut rejoined = Game::new(CODE, 6, 1, &[1]);
        rejoined.restore(&snapshot);
        rejoined.drain_events();
        rejoined.handle_payload(&Payload::GameData {
            code: CODE,
            parts: vec![player_spawn(9, 4, 10)],
        });

        let events = rejoined.drain_events();
        assert!(matches!(events[0], GameEvent::Spawned { owner: 9, .. }));
        assert!(rejoined.client(9).is_some());
        assert_eq!(rejoined.registry().player_id(9), Some(4));
        assert_eq!(rejoined.registry().player_id(1), None);
        assert_eq!(rejoined.registry().client_by_player_id(4), Some(9));
        assert_eq!(rejoined.registry().client_by_netid(12), Some(9));
    }
}
