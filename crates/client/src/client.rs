//! Session orchestration on top of a [`Connection`].
//!
//! A [`Client`] owns at most one connection and the [`Game`] mirrored from
//! it. Every inbound packet goes through [`Client::dispatch`] in arrival
//! order, so the game never sees traffic out of sequence, including the
//! packets read while a join is in flight.

use anyhow::{anyhow, bail, Context, Result};
use auproxy_core::{decode_code, DisconnectReason, Language, MapId};
use auproxy_game::{actions, ActionResult, Game, GameEvent, Vector2};
use auproxy_net::{
    Connection, ConnectionConfig, ConnectionState, GameListing, GameOptions, Inbound, Packet,
    Payload, SendOutcome,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Map ownership sent with every join: all three maps.
const OWNED_MAPS: u8 = 0x07;

/// Scene that asks the host to spawn a player for the local client.
pub const ONLINE_SCENE: &str = "OnlineGame";

/// Client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Transport settings used for every connection.
    pub connection: ConnectionConfig,
    /// Redirects followed by one join or host request.
    pub max_redirects: u32,
    /// How long to wait for the server to answer a join, host or search.
    pub response_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            max_redirects: 3,
            response_timeout: Duration::from_secs(10),
        }
    }
}

/// Why a join or host request failed.
#[derive(Debug, Error)]
pub enum JoinError {
    /// The server refused.
    #[error("join refused: {0}")]
    Rejected(DisconnectReason, Option<String>),
    /// The session ended before the server answered.
    #[error("connection lost while joining")]
    ConnectionLost,
    /// More redirects than `max_redirects`.
    #[error("too many redirects")]
    TooManyRedirects,
    /// Transport or codec failure.
    #[error(transparent)]
    Net(#[from] anyhow::Error),
}

enum JoinReply {
    Joined,
    Redirect(SocketAddr),
}

/// A game client: connection, identity and the joined game.
pub struct Client {
    config: ClientConfig,
    connection: Option<Connection>,
    inbound: Option<Inbound>,
    username: Option<String>,
    game: Option<Game>,
}

impl Client {
    /// Client with no connection yet.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            connection: None,
            inbound: None,
            username: None,
            game: None,
        }
    }

    /// Settings this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current connection, if any.
    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    /// Whether a session is open.
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| c.state() != ConnectionState::Disconnected)
    }

    /// Name sent by the last successful identify.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Joined game.
    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    /// Joined game, mutably.
    pub fn game_mut(&mut self) -> Option<&mut Game> {
        self.game.as_mut()
    }

    fn live(&self) -> Result<&Connection> {
        self.connection
            .as_ref()
            .ok_or_else(|| anyhow!("Client is not connected"))
    }

    /// Open a connection to `remote`, closing the current one first.
    pub async fn connect(&mut self, remote: SocketAddr) -> Result<()> {
        if self.connection.is_some() {
            self.disconnect().await?;
        }
        let (connection, inbound) = Connection::connect(remote, self.config.connection.clone())
            .await
            .with_context(|| format!("Failed to connect to {}", remote))?;
        self.connection = Some(connection);
        self.inbound = Some(inbound);
        Ok(())
    }

    /// Send Hello and wait for it to be acknowledged.
    pub async fn identify(&mut self, username: &str) -> Result<()> {
        self.live()?
            .identify(username)
            .await
            .context("Identify failed")?;
        self.username = Some(username.to_string());
        Ok(())
    }

    /// Close the session and forget the game.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.game = None;
        if let Some(connection) = self.connection.take() {
            connection.disconnect().await?;
        }
        self.inbound = None;
        Ok(())
    }

    async fn reconnect(&mut self, remote: SocketAddr) -> Result<()> {
        let username = self
            .username
            .clone()
            .ok_or_else(|| anyhow!("Cannot follow a redirect before identifying"))?;
        self.connect(remote).await?;
        self.identify(&username).await
    }

    /// Send payloads in one reliable packet and wait for the acknowledgment.
    pub async fn send_reliable(&self, payloads: Vec<Payload>) -> Result<SendOutcome> {
        self.live()?.send_reliable(payloads).await
    }

    /// Send payloads in one unreliable packet.
    pub async fn send_unreliable(&self, payloads: Vec<Payload>) -> Result<SendOutcome> {
        self.live()?.send_unreliable(payloads).await
    }

    /// Send the payload built by an action reliably.
    pub async fn perform(&self, action: ActionResult) -> Result<SendOutcome> {
        let payload = action?;
        self.send_reliable(vec![payload]).await
    }

    /// Move the local player. Movement is sent unreliably.
    pub async fn move_to(&mut self, position: Vector2, velocity: Vector2) -> Result<SendOutcome> {
        let game = self
            .game
            .as_mut()
            .ok_or_else(|| anyhow!("Not in a game"))?;
        let local = game.local_id();
        let payload = actions::move_to(game, local, position, velocity)?;
        self.send_unreliable(vec![payload]).await
    }

    /// Next inbound packet. `None` once the session is gone.
    pub async fn recv(&mut self) -> Option<Packet> {
        self.inbound.as_mut()?.recv().await
    }

    /// Apply one inbound packet: create the game on JoinedGame, feed it
    /// everything else, and answer StartGame with Ready.
    pub async fn dispatch(&mut self, packet: &Packet) -> Result<()> {
        if let Packet::Disconnect { reason, message } = packet {
            match reason {
                Some(reason) => warn!(
                    "Server closed the session: {} {}",
                    reason,
                    message.as_deref().unwrap_or_default()
                ),
                None => warn!("Server closed the session"),
            }
            self.game = None;
            return Ok(());
        }
        for payload in packet.payloads() {
            self.dispatch_payload(payload).await?;
        }
        Ok(())
    }

    async fn dispatch_payload(&mut self, payload: &Payload) -> Result<()> {
        match payload {
            Payload::JoinedGame {
                code,
                client_id,
                host_id,
                clients,
            } => {
                info!(
                    "Joined game {} as client {} (host {})",
                    decode_code(*code),
                    client_id,
                    host_id
                );
                self.game = Some(Game::new(*code, *client_id, *host_id, clients));
            }
            Payload::RemoveGame => {
                if self.game.take().is_some() {
                    info!("Game was removed by the server");
                }
            }
            Payload::StartGame { .. } => {
                let Some(game) = self.game.as_mut() else {
                    return Ok(());
                };
                let was_started = game.started();
                game.handle_payload(payload);
                if game.started() && !was_started {
                    let ready = actions::ready(game);
                    self.send_reliable(vec![ready]).await?;
                }
            }
            other => {
                if let Some(game) = self.game.as_mut() {
                    game.handle_payload(other);
                }
            }
        }
        Ok(())
    }

    /// Apply inbound packets until one raises events, and return them.
    ///
    /// Acks and other quiet traffic are applied and skipped. A server
    /// Disconnect ends the wait even without events. `None` once the session
    /// is gone.
    pub async fn poll(&mut self) -> Result<Option<Vec<GameEvent>>> {
        loop {
            let Some(packet) = self.recv().await else {
                return Ok(None);
            };
            self.dispatch(&packet).await?;
            let events = self
                .game
                .as_mut()
                .map(Game::drain_events)
                .unwrap_or_default();
            if !events.is_empty() || matches!(packet, Packet::Disconnect { .. }) {
                return Ok(Some(events));
            }
        }
    }

    /// Join the room `code`, following redirects. With `spawn`, also ask the
    /// host for a player object.
    pub async fn join(&mut self, code: i32, spawn: bool) -> Result<&Game, JoinError> {
        let mut redirects = 0;
        loop {
            info!("Joining game {}", decode_code(code));
            let join = Payload::JoinGame {
                code,
                map_ownership: OWNED_MAPS,
            };
            if self.send_reliable(vec![join]).await? == SendOutcome::ConnectionLost {
                return Err(JoinError::ConnectionLost);
            }

            match self.await_join_reply().await? {
                JoinReply::Joined => break,
                JoinReply::Redirect(remote) => {
                    redirects += 1;
                    if redirects > self.config.max_redirects {
                        return Err(JoinError::TooManyRedirects);
                    }
                    info!("Redirected to {}", remote);
                    self.reconnect(remote).await?;
                }
            }
        }

        if spawn {
            let game = self.game.as_ref().ok_or(JoinError::ConnectionLost)?;
            let scene = actions::scene_change(game, ONLINE_SCENE);
            self.send_reliable(vec![scene]).await?;
        }
        self.game.as_ref().ok_or(JoinError::ConnectionLost)
    }

    async fn await_join_reply(&mut self) -> Result<JoinReply, JoinError> {
        let limit = self.config.response_timeout;
        let reply = tokio::time::timeout(limit, async {
            loop {
                let Some(packet) = self.recv().await else {
                    return Err(JoinError::ConnectionLost);
                };
                if let Packet::Disconnect { reason, message } = &packet {
                    return Err(match reason {
                        Some(reason) => JoinError::Rejected(*reason, message.clone()),
                        None => JoinError::ConnectionLost,
                    });
                }

                let mut reply = None;
                for payload in packet.payloads() {
                    match payload {
                        Payload::JoinGameError { reason, message } => {
                            return Err(JoinError::Rejected(*reason, message.clone()));
                        }
                        Payload::Redirect { ip, port } => {
                            reply = Some(JoinReply::Redirect(SocketAddr::from((*ip, *port))));
                        }
                        Payload::JoinedGame { .. } => reply = Some(JoinReply::Joined),
                        _ => {}
                    }
                }
                self.dispatch(&packet).await?;
                if let Some(reply) = reply {
                    return Ok(reply);
                }
            }
        })
        .await;

        reply.unwrap_or_else(|_| Err(anyhow!("No join reply within {:?}", limit).into()))
    }

    /// Create a room with `options`, following redirects. Returns the room code.
    pub async fn host(&mut self, options: GameOptions) -> Result<i32, JoinError> {
        let mut redirects = 0;
        loop {
            let reply = self.live()?.await_payload(|p| {
                matches!(
                    p,
                    Payload::GameCreated { .. }
                        | Payload::Redirect { .. }
                        | Payload::JoinGameError { .. }
                )
            });
            let request = Payload::HostGame {
                options: options.clone(),
            };
            if self.send_reliable(vec![request]).await? == SendOutcome::ConnectionLost {
                return Err(JoinError::ConnectionLost);
            }

            let limit = self.config.response_timeout;
            match tokio::time::timeout(limit, reply).await {
                Ok(Some(Payload::GameCreated { code })) => {
                    info!("Created game {}", decode_code(code));
                    return Ok(code);
                }
                Ok(Some(Payload::Redirect { ip, port })) => {
                    redirects += 1;
                    if redirects > self.config.max_redirects {
                        return Err(JoinError::TooManyRedirects);
                    }
                    let remote = SocketAddr::from((ip, port));
                    info!("Redirected to {}", remote);
                    self.reconnect(remote).await?;
                }
                Ok(Some(Payload::JoinGameError { reason, message })) => {
                    return Err(JoinError::Rejected(reason, message));
                }
                Ok(_) => return Err(JoinError::ConnectionLost),
                Err(_) => return Err(anyhow!("No host reply within {:?}", limit).into()),
            }
        }
    }

    /// List public games on `map` with `impostors` impostors in `language`.
    pub async fn search(
        &mut self,
        map: MapId,
        impostors: u8,
        language: Language,
    ) -> Result<Vec<GameListing>> {
        let options = GameOptions {
            map: map.into(),
            impostor_count: impostors,
            language,
            ..GameOptions::default()
        };
        let reply = self
            .live()?
            .await_payload(|p| matches!(p, Payload::GameList { .. }));
        self.send_reliable(vec![Payload::SearchGames { options }])
            .await?;

        let limit = self.config.response_timeout;
        match tokio::time::timeout(limit, reply).await {
            Ok(Some(Payload::GameList { games, .. })) => {
                debug!("Search returned {} games", games.len());
                Ok(games)
            }
            Ok(_) => bail!("Connection closed before the game list arrived"),
            Err(_) => bail!("No game list within {:?}", limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auproxy_core::GameEndReason;
    use auproxy_net::{decode_packet, encode_packet, Bound, GameListing, Part};
    use auproxy_testkit::FakeServer;
    use std::net::Ipv4Addr;

    const CODE: i32 = -2_147_479_000;

    fn quick() -> ClientConfig {
        ClientConfig {
            connection: ConnectionConfig {
                ack_interval: Duration::from_millis(40),
                disconnect_timeout: Duration::from_millis(100),
                ..ConnectionConfig::default()
            },
            max_redirects: 2,
            response_timeout: Duration::from_secs(2),
        }
    }

    fn to_client(nonce: u16, payloads: Vec<Payload>) -> Vec<u8> {
        encode_packet(&Packet::Reliable { nonce, payloads }, Bound::Client).unwrap()
    }

    fn from_client(data: &[u8]) -> Vec<Payload> {
        decode_packet(data, Bound::Server)
            .unwrap()
            .payloads()
            .to_vec()
    }

    fn joined(client_id: u32) -> Payload {
        Payload::JoinedGame {
            code: CODE,
            client_id,
            host_id: 1,
            clients: vec![1],
        }
    }

    async fn connected(server: &mut FakeServer) -> Client {
        let mut client = Client::new(quick());
        client.connect(server.local_addr()).await.unwrap();
        client.identify("mirror").await.unwrap();
        server.expect_opcode(0x08).await.unwrap();
        client
    }

    #[tokio::test]
    async fn test_join_creates_game() {
        let mut server = FakeServer::bind().await.unwrap();
        let mut client = connected(&mut server).await;

        let (result, _) = tokio::join!(client.join(CODE, false), async {
            let request = server.expect_opcode(0x01).await.unwrap();
            assert_eq!(
                from_client(&request),
                vec![Payload::JoinGame {
                    code: CODE,
                    map_ownership: 0x07
                }]
            );
            server.send(&to_client(1, vec![joined(7)])).await.unwrap();
        });

        let game = result.unwrap();
        assert_eq!(game.code(), CODE);
        assert_eq!(game.local_id(), 7);
        assert_eq!(game.host_id(), 1);
        assert_eq!(game.clients().len(), 2);
    }

    #[tokio::test]
    async fn test_join_follows_redirect() {
        let mut first = FakeServer::bind().await.unwrap();
        let mut second = FakeServer::bind().await.unwrap();
        let mut client = connected(&mut first).await;
        let port = second.local_addr().port();

        let (result, _) = tokio::join!(client.join(CODE, false), async {
            first.expect_opcode(0x01).await.unwrap();
            let redirect = Payload::Redirect {
                ip: Ipv4Addr::LOCALHOST,
                port,
            };
            first.send(&to_client(1, vec![redirect])).await.unwrap();

            second.expect_opcode(0x08).await.unwrap();
            second.expect_opcode(0x01).await.unwrap();
            second.send(&to_client(1, vec![joined(3)])).await.unwrap();
        });

        assert_eq!(result.unwrap().local_id(), 3);
        assert_eq!(
            client.connection().unwrap().remote_addr(),
            second.local_addr()
        );
    }

    #[tokio::test]
    async fn test_join_gives_up_after_max_redirects() {
        let mut server = FakeServer::bind().await.unwrap();
        let mut client = connected(&mut server).await;
        client.config.max_redirects = 0;
        let port = server.local_addr().port();

        let (result, _) = tokio::join!(client.join(CODE, false), async {
            server.expect_opcode(0x01).await.unwrap();
            let redirect = Payload::Redirect {
                ip: Ipv4Addr::LOCALHOST,
                port,
            };
            server.send(&to_client(1, vec![redirect])).await.unwrap();
        });

        assert!(matches!(result, Err(JoinError::TooManyRedirects)));
    }

    #[tokio::test]
    async fn test_join_rejection_is_typed() {
        let mut server = FakeServer::bind().await.unwrap();
        let mut client = connected(&mut server).await;

        let (result, _) = tokio::join!(client.join(CODE, false), async {
            server.expect_opcode(0x01).await.unwrap();
            let refusal = Payload::JoinGameError {
                reason: DisconnectReason::GameFull,
                message: None,
            };
            server.send(&to_client(1, vec![refusal])).await.unwrap();
        });

        match result {
            Err(JoinError::Rejected(reason, message)) => {
                assert_eq!(reason, DisconnectReason::GameFull);
                assert_eq!(message, None);
            }
            other => panic!("expected rejection, got {:?}", other.map(|g| g.code())),
        }
        assert!(client.game().is_none());
    }

    #[tokio::test]
    async fn test_join_with_spawn_requests_online_scene() {
        let mut server = FakeServer::bind().await.unwrap();
        let mut client = connected(&mut server).await;

        let (result, scene) = tokio::join!(client.join(CODE, true), async {
            server.expect_opcode(0x01).await.unwrap();
            server.send(&to_client(1, vec![joined(7)])).await.unwrap();
            server.expect_opcode(0x01).await.unwrap()
        });

        result.unwrap();
        assert_eq!(
            from_client(&scene),
            vec![Payload::GameData {
                code: CODE,
                parts: vec![Part::SceneChange {
                    client_id: 7,
                    scene: ONLINE_SCENE.to_string()
                }]
            }]
        );
    }

    #[tokio::test]
    async fn test_start_game_is_answered_with_ready() {
        let mut server = FakeServer::bind().await.unwrap();
        let mut client = connected(&mut server).await;
        let (result, _) = tokio::join!(client.join(CODE, false), async {
            server.expect_opcode(0x01).await.unwrap();
            server.send(&to_client(1, vec![joined(7)])).await.unwrap();
        });
        result.unwrap();

        server
            .send(&to_client(2, vec![Payload::StartGame { code: CODE }]))
            .await
            .unwrap();
        let (events, ready) = tokio::join!(client.poll(), server.expect_opcode(0x01));

        assert_eq!(events.unwrap(), Some(vec![GameEvent::GameStarted]));
        assert_eq!(
            from_client(&ready.unwrap()),
            vec![Payload::GameData {
                code: CODE,
                parts: vec![Part::Ready { client_id: 7 }]
            }]
        );
        assert!(client.game().unwrap().started());

        // A bare ack in between raises nothing and is skipped.
        server.send(&[0x0a, 0x00, 0x63, 0xff]).await.unwrap();
        server
            .send(&to_client(
                3,
                vec![Payload::EndGame {
                    code: CODE,
                    reason: GameEndReason::HumansByVote,
                    show_ad: false,
                }],
            ))
            .await
            .unwrap();
        assert_eq!(
            client.poll().await.unwrap(),
            Some(vec![GameEvent::GameEnded {
                reason: GameEndReason::HumansByVote
            }])
        );
    }

    #[tokio::test]
    async fn test_host_returns_created_code() {
        let mut server = FakeServer::bind().await.unwrap();
        let mut client = connected(&mut server).await;

        let (code, _) = tokio::join!(client.host(GameOptions::default()), async {
            let request = server.expect_opcode(0x01).await.unwrap();
            assert!(matches!(
                from_client(&request).as_slice(),
                [Payload::HostGame { .. }]
            ));
            server
                .send(&to_client(1, vec![Payload::GameCreated { code: CODE }]))
                .await
                .unwrap();
        });

        assert_eq!(code.unwrap(), CODE);
    }

    #[tokio::test]
    async fn test_search_returns_listings() {
        let mut server = FakeServer::bind().await.unwrap();
        let mut client = connected(&mut server).await;
        let listing = GameListing {
            ip: Ipv4Addr::LOCALHOST,
            port: 22023,
            code: CODE,
            name: "host".to_string(),
            players: 4,
            age: 30,
            map: MapId::Polus,
            impostors: 2,
            max_players: 10,
        };

        let (games, _) = tokio::join!(
            client.search(MapId::Polus, 2, Language::ENGLISH),
            async {
                let request = server.expect_opcode(0x01).await.unwrap();
                match from_client(&request).as_slice() {
                    [Payload::SearchGames { options }] => {
                        assert_eq!(options.map.known(), Some(MapId::Polus));
                        assert_eq!(options.impostor_count, 2);
                    }
                    other => panic!("unexpected request {:?}", other),
                }
                let list = Payload::GameList {
                    games: vec![listing.clone()],
                    counts: None,
                };
                server.send(&to_client(1, vec![list])).await.unwrap();
            }
        );

        assert_eq!(games.unwrap(), vec![listing]);
    }

    #[tokio::test]
    async fn test_move_requires_a_game() {
        let mut server = FakeServer::bind().await.unwrap();
        let mut client = connected(&mut server).await;
        assert!(client
            .move_to(Vector2::new(1.0, 1.0), Vector2::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_server_disconnect_drops_game() {
        let mut server = FakeServer::bind().await.unwrap();
        let mut client = connected(&mut server).await;
        let (result, _) = tokio::join!(client.join(CODE, false), async {
            server.expect_opcode(0x01).await.unwrap();
            server.send(&to_client(1, vec![joined(7)])).await.unwrap();
        });
        result.unwrap();

        server.send(&[0x09]).await.unwrap();
        assert_eq!(client.poll().await.unwrap(), Some(vec![]));
        assert!(client.game().is_none());
        assert_eq!(client.poll().await.unwrap(), None);
    }
}
