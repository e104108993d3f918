//! Lobby mirror: follows a public lobby without keeping a player in it.
//!
//! The first join spawns a player so the host sends every object and the
//! settings. Once the GameData object and a SyncSettings call have arrived,
//! the mirror snapshots the room (minus its own objects), leaves, and joins
//! again without spawning, restoring the snapshot into the new session.

use crate::client::{Client, ClientConfig};
use anyhow::{anyhow, bail, Context, Result};
use auproxy_core::{decode_code, Colour, MapId, SpawnKind};
use auproxy_game::{Game, GameEvent, GameSnapshot, Vector2};
use auproxy_net::{Packet, Payload};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Mirror settings.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Server to join through.
    pub server: SocketAddr,
    /// Room code.
    pub code: i32,
    /// Name sent in Hello.
    pub username: String,
    /// Join attempts per re-join before giving up.
    pub max_join_attempts: u32,
    /// How long the first join may take to deliver spawns and settings.
    pub settle_timeout: Duration,
    /// Client settings.
    pub client: ClientConfig,
}

impl MirrorConfig {
    /// Settings for mirroring `code` through `server`.
    pub fn new(server: SocketAddr, code: i32) -> Self {
        Self {
            server,
            code,
            username: "auproxy".to_string(),
            max_join_attempts: 5,
            settle_timeout: Duration::from_secs(30),
            client: ClientConfig::default(),
        }
    }
}

/// Coarse phase of the mirrored game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyState {
    /// Waiting in the lobby.
    Lobby,
    /// Round in progress.
    Playing,
    /// Meeting in progress.
    Meeting,
}

/// What the mirror reports to the application.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MirrorEvent {
    /// A player moved.
    PlayerPose {
        /// Player name.
        name: String,
        /// New position.
        position: Vector2,
    },
    /// A player's colour, `None` once the player left.
    PlayerColour {
        /// Player name.
        name: String,
        /// Colour.
        colour: Option<Colour>,
    },
    /// The host changed.
    HostChange {
        /// Host's player name.
        name: String,
    },
    /// The game changed phase.
    GameState {
        /// New phase.
        state: LobbyState,
    },
    /// The host sent settings.
    SettingsUpdate {
        /// Crewmate vision multiplier.
        crew_vision: f32,
    },
    /// The map changed.
    MapChange {
        /// New map.
        map: MapId,
    },
    /// Something went wrong.
    Error {
        /// Human-readable description.
        message: String,
        /// Whether the mirror stopped.
        fatal: bool,
    },
}

impl MirrorEvent {
    /// Short label, as used in event logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MirrorEvent::PlayerPose { .. } => "player_pose",
            MirrorEvent::PlayerColour { .. } => "player_colour",
            MirrorEvent::HostChange { .. } => "host_change",
            MirrorEvent::GameState { .. } => "game_state",
            MirrorEvent::SettingsUpdate { .. } => "settings_update",
            MirrorEvent::MapChange { .. } => "map_change",
            MirrorEvent::Error { .. } => "error",
        }
    }
}

enum FollowUp {
    Continue,
    Rejoin,
    Stop,
}

/// Keeps a spectator view of one lobby.
pub struct LobbyMirror {
    config: MirrorConfig,
    client: Client,
    snapshot: Option<GameSnapshot>,
    map: Option<MapId>,
    events: mpsc::UnboundedSender<MirrorEvent>,
}

impl LobbyMirror {
    /// Mirror and the stream of events it reports.
    pub fn new(config: MirrorConfig) -> (Self, mpsc::UnboundedReceiver<MirrorEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let client = Client::new(config.client.clone());
        let mirror = Self {
            config,
            client,
            snapshot: None,
            map: None,
            events,
        };
        (mirror, receiver)
    }

    /// Underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Mirrored game, while joined.
    pub fn game(&self) -> Option<&Game> {
        self.client.game()
    }

    /// State carried across re-joins.
    pub fn snapshot(&self) -> Option<&GameSnapshot> {
        self.snapshot.as_ref()
    }

    fn emit(&self, event: MirrorEvent) {
        let _ = self.events.send(event);
    }

    fn emit_error(&self, message: impl Into<String>, fatal: bool) {
        self.emit(MirrorEvent::Error {
            message: message.into(),
            fatal,
        });
    }

    /// Join with a player to collect the room's state, then re-join as a spectator.
    pub async fn start(&mut self) -> Result<()> {
        info!(
            "Joining {} for the first time via {}",
            decode_code(self.config.code),
            self.config.server
        );
        if let Err(e) = self.initial_spawn().await {
            error!("Initial join failed: {:#}", e);
            self.emit_error(format!("Couldn't join the game: {:#}", e), true);
            let _ = self.client.disconnect().await;
            return Err(e);
        }
        self.rejoin().await
    }

    async fn initial_spawn(&mut self) -> Result<()> {
        self.client
            .connect(self.config.server)
            .await
            .context("Couldn't connect to the server")?;
        self.client.identify(&self.config.username).await?;
        self.client
            .join(self.config.code, true)
            .await
            .context("Couldn't join room")?;

        info!("Waiting for spawns and settings");
        self.settle().await?;

        let game = self
            .client
            .game()
            .ok_or_else(|| anyhow!("Left the game while waiting for settings"))?;
        if let Some(map) = game.options().and_then(|options| options.map.known()) {
            self.map = Some(map);
            self.emit(MirrorEvent::MapChange { map });
        }
        if let Some(name) = player_name(game, game.host_id()) {
            info!("Found host: {}", name);
            self.emit(MirrorEvent::HostChange { name });
        }

        self.snapshot = Some(game.snapshot());
        info!("Got spawns and settings, preparing to re-join");
        self.client.disconnect().await
    }

    async fn settle(&mut self) -> Result<()> {
        let limit = self.config.settle_timeout;
        tokio::time::timeout(limit, async {
            loop {
                if self
                    .client
                    .game()
                    .is_some_and(|g| g.registry().game_data().is_some() && g.options().is_some())
                {
                    return Ok(());
                }
                let Some(packet) = self.client.recv().await else {
                    bail!("Connection closed while waiting for spawns");
                };
                self.handle(&packet).await?;
            }
        })
        .await
        .map_err(|_| anyhow!("No spawns and settings within {:?}", limit))?
    }

    /// Join without spawning and restore the snapshot, retrying up to
    /// `max_join_attempts` times.
    pub async fn rejoin(&mut self) -> Result<()> {
        let attempts = self.config.max_join_attempts.max(1);
        for attempt in 1..=attempts {
            info!(
                "Joining {} without spawning, attempt #{}",
                decode_code(self.config.code),
                attempt
            );
            match self.join_once().await {
                Ok(restored) => {
                    info!("Joined and restored {} objects", restored);
                    return Ok(());
                }
                Err(e) => {
                    let left = attempts - attempt;
                    warn!("Failed to join game ({:#})", e);
                    warn!("Retrying {} more times", left);
                    self.emit_error(format!("{:#}. Retrying {} more times.", e, left), false);
                    if let Err(e) = self.client.disconnect().await {
                        warn!("Disconnect after failed join: {:#}", e);
                    }
                }
            }
        }

        error!("Could not join game {}", decode_code(self.config.code));
        self.client.disconnect().await?;
        self.emit_error("Could not join the game.", true);
        bail!(
            "Could not join game {} after {} attempts",
            decode_code(self.config.code),
            attempts
        )
    }

    async fn join_once(&mut self) -> Result<usize> {
        self.client.connect(self.config.server).await?;
        self.client.identify(&self.config.username).await?;
        self.client.join(self.config.code, false).await?;
        let game = self
            .client
            .game_mut()
            .ok_or_else(|| anyhow!("Joined game vanished"))?;
        Ok(match &self.snapshot {
            Some(snapshot) => game.restore(snapshot),
            None => 0,
        })
    }

    /// Follow the lobby until the session ends for good.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let Some(packet) = self.client.recv().await else {
                warn!("Client disconnected");
                return Ok(());
            };
            match self.handle(&packet).await? {
                FollowUp::Continue => {}
                FollowUp::Rejoin => {
                    if let Some(game) = self.client.game() {
                        self.snapshot = Some(game.snapshot());
                    }
                    self.client.disconnect().await?;
                    self.rejoin().await?;
                }
                FollowUp::Stop => {
                    self.client.disconnect().await?;
                    return Ok(());
                }
            }
        }
    }

    /// Leave the lobby.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.client.disconnect().await?;
        info!("Lobby mirror stopped");
        Ok(())
    }

    async fn handle(&mut self, packet: &Packet) -> Result<FollowUp> {
        // Names must be read before the leaving client's objects are dropped.
        let mut departed = BTreeMap::new();
        if let Some(game) = self.client.game() {
            for payload in packet.payloads() {
                if let Payload::RemovePlayer { client_id, .. } = payload {
                    if let Some(name) = player_name(game, *client_id) {
                        departed.insert(*client_id, name);
                    }
                }
            }
        }

        self.client.dispatch(packet).await?;

        if let Packet::Disconnect { reason, .. } = packet {
            let message = match reason {
                Some(reason) => format!("Disconnected by the server: {}", reason),
                None => "Disconnected by the server.".to_string(),
            };
            self.emit_error(message, true);
            return Ok(FollowUp::Continue);
        }

        let Some(game) = self.client.game_mut() else {
            return Ok(FollowUp::Continue);
        };
        let raised = game.drain_events();
        let game = &*game;
        for event in translate(game, &mut self.map, &departed, raised) {
            let _ = self.events.send(event);
        }

        let mut follow_up = FollowUp::Continue;
        for payload in packet.payloads() {
            match payload {
                Payload::EndGame { code, .. } if *code == game.code() => {
                    info!("Game ended, re-joining");
                    follow_up = FollowUp::Rejoin;
                }
                Payload::RemovePlayer { code, client_id, .. } if *code == game.code() => {
                    info!("Client {} was removed", client_id);
                    if game.is_host() {
                        if game.clients().len() <= 1 {
                            warn!("Every player left, disconnecting");
                            return Ok(FollowUp::Stop);
                        }
                        warn!("Became host, disconnecting and re-joining");
                        follow_up = FollowUp::Rejoin;
                    }
                }
                Payload::WaitForHost { .. } => info!("Waiting for host to re-connect"),
                _ => {}
            }
        }
        Ok(follow_up)
    }
}

/// Name of `client_id`'s player, from the GameData table.
fn player_name(game: &Game, client_id: u32) -> Option<String> {
    let player_id = game.registry().player_id(client_id)?;
    name_of(game, player_id)
}

fn name_of(game: &Game, player_id: u8) -> Option<String> {
    let row = game.registry().game_data()?.player(player_id)?;
    (!row.name.is_empty()).then(|| row.name.clone())
}

fn owner_name(game: &Game, owner: i32) -> Option<String> {
    u32::try_from(owner)
        .ok()
        .and_then(|client_id| player_name(game, client_id))
}

/// Turn game events into mirror events. `departed` holds the names of
/// clients removed by the packet that raised the events.
fn translate(
    game: &Game,
    map: &mut Option<MapId>,
    departed: &BTreeMap<u32, String>,
    events: Vec<GameEvent>,
) -> Vec<MirrorEvent> {
    let mut out = Vec::new();
    for event in events {
        match event {
            GameEvent::Moved {
                client_id,
                position,
                ..
            }
            | GameEvent::SnappedTo {
                client_id,
                position,
            } => {
                if let Some(name) = owner_name(game, client_id) {
                    out.push(MirrorEvent::PlayerPose { name, position });
                }
            }
            GameEvent::ColourChanged { player_id, colour } => {
                if let Some(name) = name_of(game, player_id) {
                    out.push(MirrorEvent::PlayerColour {
                        name,
                        colour: Some(colour),
                    });
                }
            }
            GameEvent::Spawned {
                kind: SpawnKind::GameData,
                ..
            } => {
                if let Some(table) = game.registry().game_data() {
                    out.extend(
                        table
                            .players
                            .values()
                            .filter(|row| !row.name.is_empty())
                            .map(|row| MirrorEvent::PlayerColour {
                                name: row.name.clone(),
                                colour: Some(row.colour),
                            }),
                    );
                }
            }
            GameEvent::PlayerLeft { client_id, .. } => {
                if let Some(name) = departed.get(&client_id) {
                    info!("Removed player {} ({})", name, client_id);
                    out.push(MirrorEvent::PlayerColour {
                        name: name.clone(),
                        colour: None,
                    });
                }
            }
            GameEvent::HostChanged { host_id } => {
                if let Some(name) = player_name(game, host_id) {
                    info!("Host changed to {}", name);
                    out.push(MirrorEvent::HostChange { name });
                }
            }
            GameEvent::GameStarted => out.push(MirrorEvent::GameState {
                state: LobbyState::Playing,
            }),
            GameEvent::GameEnded { .. } => out.push(MirrorEvent::GameState {
                state: LobbyState::Lobby,
            }),
            GameEvent::MeetingStarted { .. } => out.push(MirrorEvent::GameState {
                state: LobbyState::Meeting,
            }),
            GameEvent::VotingComplete { .. } => out.push(MirrorEvent::GameState {
                state: LobbyState::Playing,
            }),
            GameEvent::SettingsSynced { options } => {
                out.push(MirrorEvent::SettingsUpdate {
                    crew_vision: options.crew_vision,
                });
                match options.map.known() {
                    Some(synced) if *map != Some(synced) => {
                        *map = Some(synced);
                        out.push(MirrorEvent::MapChange { map: synced });
                    }
                    Some(_) => {}
                    None => warn!("Host picked an unknown map {:#04x}", options.map.byte()),
                }
            }
            GameEvent::ComponentDecodeFailed { netid, kind, error } => {
                warn!("Dropped update for {:?} {}: {}", kind, netid, error);
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use auproxy_core::{DisconnectReason, GameEndReason};
    use auproxy_game::VoteOutcome;
    use auproxy_net::{
        encode_packet, Bound, ConnectionConfig, GameOptions, Part, PlayerData, Rpc,
        SpawnComponent, Writer,
    };
    use auproxy_testkit::FakeServer;

    const CODE: i32 = -2_147_479_000;

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

    fn game_data_spawn(netid: u32, rows: &[(u8, &str, Colour)]) -> Part {
        let mut w = Writer::new();
        w.packed(rows.len() as u32);
        for (id, name, colour) in rows {
            let mut row = PlayerData::new(*id);
            row.name = name.to_string();
            row.colour = *colour;
            row.encode(&mut w).unwrap();
        }
        Part::Spawn {
            spawn_id: 3,
            owner: -2,
            flags: 0,
            components: vec![component(netid, w.into_inner()), component(netid + 1, vec![0])],
        }
    }

    fn polus() -> GameOptions {
        GameOptions {
            map: MapId::Polus.into(),
            crew_vision: 0.75,
            ..GameOptions::default()
        }
    }

    fn to_client(nonce: u16, payloads: Vec<Payload>) -> Vec<u8> {
        encode_packet(&Packet::Reliable { nonce, payloads }, Bound::Client).unwrap()
    }

    fn joined(client_id: u32) -> Payload {
        Payload::JoinedGame {
            code: CODE,
            client_id,
            host_id: 1,
            clients: vec![1],
        }
    }

    fn lobby_traffic() -> Payload {
        Payload::GameData {
            code: CODE,
            parts: vec![
                game_data_spawn(2, &[(0, "host", Colour::Red), (1, "mirror", Colour::Blue)]),
                player_spawn(1, 0, 10),
                player_spawn(7, 1, 20),
                Part::Rpc {
                    netid: 10,
                    rpc: Rpc::SyncSettings { options: polus() },
                },
            ],
        }
    }

    fn config(server: &FakeServer) -> MirrorConfig {
        let mut config = MirrorConfig::new(server.local_addr(), CODE);
        config.max_join_attempts = 2;
        config.settle_timeout = Duration::from_secs(2);
        config.client = ClientConfig {
            connection: ConnectionConfig {
                ack_interval: Duration::from_millis(40),
                disconnect_timeout: Duration::from_millis(50),
                ..ConnectionConfig::default()
            },
            max_redirects: 1,
            response_timeout: Duration::from_secs(2),
        };
        config
    }

    fn drain(events: &mut mpsc::UnboundedReceiver<MirrorEvent>) -> Vec<MirrorEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    fn game() -> Game {
        let mut game = Game::new(CODE, 7, 1, &[1]);
        game.handle_payload(&lobby_traffic());
        game
    }

    #[test]
    fn test_translate_spawn_and_settings() {
        let mut game = game();
        let mut map = None;
        let drained = game.drain_events();
        let mut events = translate(&game, &mut map, &BTreeMap::new(), drained);
        let poses: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                MirrorEvent::PlayerPose { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(poses, vec!["host", "mirror"]);
        events.retain(|e| !matches!(e, MirrorEvent::PlayerPose { .. }));
        assert_eq!(
            events,
            vec![
                MirrorEvent::PlayerColour {
                    name: "host".into(),
                    colour: Some(Colour::Red)
                },
                MirrorEvent::PlayerColour {
                    name: "mirror".into(),
                    colour: Some(Colour::Blue)
                },
                MirrorEvent::SettingsUpdate { crew_vision: 0.75 },
                MirrorEvent::MapChange { map: MapId::Polus },
            ]
        );
        assert_eq!(map, Some(MapId::Polus));

        let again = translate(
            &game,
            &mut map,
            &BTreeMap::new(),
            vec![GameEvent::SettingsSynced { options: polus() }],
        );
        assert_eq!(again, vec![MirrorEvent::SettingsUpdate { crew_vision: 0.75 }]);
    }

    #[test]
    fn test_translate_poses_phases_and_departures() {
        let game = game();
        let mut map = Some(MapId::Polus);
        let departed = BTreeMap::from([(1, "host".to_string())]);
        let events = translate(
            &game,
            &mut map,
            &departed,
            vec![
                GameEvent::Moved {
                    client_id: 1,
                    netid: 12,
                    position: Vector2::new(2.0, -1.0),
                    velocity: Vector2::default(),
                },
                GameEvent::Moved {
                    client_id: -2,
                    netid: 99,
                    position: Vector2::default(),
                    velocity: Vector2::default(),
                },
                GameEvent::MeetingStarted { body: None },
                GameEvent::VotingComplete {
                    outcome: VoteOutcome::Skipped,
                },
                GameEvent::PlayerLeft {
                    client_id: 1,
                    reason: Some(DisconnectReason::IntentionalLeaving),
                },
                GameEvent::HostChanged { host_id: 7 },
            ],
        );
        assert_eq!(
            events,
            vec![
                MirrorEvent::PlayerPose {
                    name: "host".into(),
                    position: Vector2::new(2.0, -1.0)
                },
                MirrorEvent::GameState {
                    state: LobbyState::Meeting
                },
                MirrorEvent::GameState {
                    state: LobbyState::Playing
                },
                MirrorEvent::PlayerColour {
                    name: "host".into(),
                    colour: None
                },
                MirrorEvent::HostChange {
                    name: "mirror".into()
                },
            ]
        );
    }

    #[test]
    fn test_mirror_event_json_shape() {
        let json = serde_json::to_value(MirrorEvent::Error {
            message: "boom".into(),
            fatal: true,
        })
        .unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["fatal"], true);
    }

    #[tokio::test]
    async fn test_start_snapshots_then_rejoins_without_spawning() {
        let mut server = FakeServer::bind().await.unwrap();
        let (mut mirror, mut events) = LobbyMirror::new(config(&server));

        let (started, _) = tokio::join!(mirror.start(), async {
            server.expect_opcode(0x08).await.unwrap();
            server.expect_opcode(0x01).await.unwrap();
            server.send(&to_client(1, vec![joined(7)])).await.unwrap();
            // SceneChange asking for a player.
            server.expect_opcode(0x01).await.unwrap();
            server.send(&to_client(2, vec![lobby_traffic()])).await.unwrap();

            server.expect_opcode(0x09).await.unwrap();
            server.expect_opcode(0x08).await.unwrap();
            server.expect_opcode(0x01).await.unwrap();
            server.send(&to_client(1, vec![joined(8)])).await.unwrap();
        });
        started.unwrap();

        let game = mirror.game().unwrap();
        assert_eq!(game.local_id(), 8);
        assert!(game.registry().contains(10));
        assert!(!game.registry().contains(20));
        assert_eq!(game.options().map(|o| o.map), Some(MapId::Polus.into()));
        assert!(mirror.snapshot().is_some());

        let events = drain(&mut events);
        assert!(events.contains(&MirrorEvent::MapChange { map: MapId::Polus }));
        assert!(events.contains(&MirrorEvent::HostChange {
            name: "host".into()
        }));
    }

    #[tokio::test]
    async fn test_rejoin_gives_up_after_max_attempts() {
        let mut server = FakeServer::bind().await.unwrap();
        let (mut mirror, mut events) = LobbyMirror::new(config(&server));

        let (result, _) = tokio::join!(mirror.rejoin(), async {
            for _ in 0..2 {
                server.expect_opcode(0x01).await.unwrap();
                let refusal = Payload::JoinGameError {
                    reason: DisconnectReason::GameStarted,
                    message: None,
                };
                server.send(&to_client(1, vec![refusal])).await.unwrap();
            }
        });

        assert!(result.is_err());
        let errors: Vec<bool> = drain(&mut events)
            .into_iter()
            .filter_map(|event| match event {
                MirrorEvent::Error { fatal, .. } => Some(fatal),
                _ => None,
            })
            .collect();
        assert_eq!(errors, vec![false, false, true]);
        assert!(!mirror.client().is_connected());
    }

    #[tokio::test]
    async fn test_run_rejoins_after_game_end() {
        let mut server = FakeServer::bind().await.unwrap();
        let (mut mirror, mut events) = LobbyMirror::new(config(&server));

        let (joined_once, _) = tokio::join!(mirror.rejoin(), async {
            server.expect_opcode(0x01).await.unwrap();
            server.send(&to_client(1, vec![joined(8)])).await.unwrap();
        });
        joined_once.unwrap();

        let (finished, _) = tokio::join!(mirror.run(), async {
            let end = Payload::EndGame {
                code: CODE,
                reason: GameEndReason::ImpostorByKill,
                show_ad: false,
            };
            server.send(&to_client(2, vec![end])).await.unwrap();

            server.expect_opcode(0x09).await.unwrap();
            server.expect_opcode(0x08).await.unwrap();
            server.expect_opcode(0x01).await.unwrap();
            server.send(&to_client(1, vec![joined(9)])).await.unwrap();

            // Let the join settle before closing the session.
            tokio::time::sleep(Duration::from_millis(50)).await;
            server.send(&[0x09]).await.unwrap();
        });
        finished.unwrap();

        let events = drain(&mut events);
        assert!(events.contains(&MirrorEvent::GameState {
            state: LobbyState::Lobby
        }));
        assert!(matches!(
            events.last(),
            Some(MirrorEvent::Error { fatal: true, .. })
        ));
    }
}
