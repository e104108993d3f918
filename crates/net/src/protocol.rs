//! Structured packet, payload, part and RPC types.
//!
//! Several payloads share an id but carry different fields depending on who
//! sends them. Those layouts get separate variants, and the codec picks one
//! using the [`Bound`] of the traffic.

use crate::buffer::{CodecError, CodecResult, Reader, Writer};
use crate::options::GameOptions;
use auproxy_core::{
    wire_enum, AlterGameTag, Colour, DisconnectReason, GameEndReason, MapId, SystemType,
};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Direction of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    /// Sent by a client to the server.
    Server,
    /// Sent by the server to a client.
    Client,
}

impl Bound {
    /// Lowercase name, as used in the JSON form.
    pub fn as_str(self) -> &'static str {
        match self {
            Bound::Server => "server",
            Bound::Client => "client",
        }
    }
}

wire_enum! {
    /// First byte of every datagram.
    Opcode {
        /// Payloads, no acknowledgment.
        Unreliable = 0x00,
        /// Payloads that must be acknowledged.
        Reliable = 0x01,
        /// Session start carrying the username.
        Hello = 0x08,
        /// Session end.
        Disconnect = 0x09,
        /// Acknowledges a nonce.
        Acknowledge = 0x0a,
        /// Keep-alive.
        Ping = 0x0c,
    }
}

impl Opcode {
    /// Whether packets with this opcode carry a nonce and expect an acknowledgment.
    pub fn needs_ack(self) -> bool {
        matches!(self, Opcode::Reliable | Opcode::Hello | Opcode::Ping)
    }
}

wire_enum! {
    /// Payload tag inside Reliable/Unreliable packets.
    PayloadId {
        /// Create a lobby / lobby created.
        HostGame = 0x00,
        /// Join a lobby / someone joined / join refused.
        JoinGame = 0x01,
        /// Game started.
        StartGame = 0x02,
        /// Lobby removed.
        RemoveGame = 0x03,
        /// A client left.
        RemovePlayer = 0x04,
        /// Object traffic for everyone.
        GameData = 0x05,
        /// Object traffic for one recipient.
        GameDataTo = 0x06,
        /// Local client joined.
        JoinedGame = 0x07,
        /// Game over.
        EndGame = 0x08,
        /// Legacy game list.
        GetGameList = 0x09,
        /// Lobby setting change.
        AlterGame = 0x0a,
        /// Kick or ban.
        KickPlayer = 0x0b,
        /// Waiting for the host to return to the lobby.
        WaitForHost = 0x0c,
        /// Move to another server.
        Redirect = 0x0d,
        /// Region server list.
        MasterServerList = 0x0e,
        /// Game search.
        GetGameListV2 = 0x10,
    }
}

wire_enum! {
    /// Tag of a part inside GameData/GameDataTo.
    PartType {
        /// Incremental component state.
        Data = 0x01,
        /// Remote procedure call.
        Rpc = 0x02,
        /// New object.
        Spawn = 0x04,
        /// Component removed.
        Despawn = 0x05,
        /// Client changed scene.
        SceneChange = 0x06,
        /// Client is ready.
        Ready = 0x07,
        /// Settings changed.
        ChangeSettings = 0x08,
    }
}

wire_enum! {
    /// RPC operation id.
    RpcId {
        /// Play an animation.
        PlayAnimation = 0x00,
        /// Finish a task.
        CompleteTask = 0x01,
        /// Host broadcasts settings.
        SyncSettings = 0x02,
        /// Host picks impostors.
        SetInfected = 0x03,
        /// Player ejected.
        Exiled = 0x04,
        /// Ask the host to approve a name.
        CheckName = 0x05,
        /// Host sets a name.
        SetName = 0x06,
        /// Ask the host to approve a colour.
        CheckColour = 0x07,
        /// Host sets a colour.
        SetColour = 0x08,
        /// Set hat.
        SetHat = 0x09,
        /// Set skin.
        SetSkin = 0x0a,
        /// Report a body or call an emergency.
        ReportDeadBody = 0x0b,
        /// Kill.
        MurderPlayer = 0x0c,
        /// Chat message.
        SendChat = 0x0d,
        /// Meeting begins.
        StartMeeting = 0x0e,
        /// Medbay scanner state.
        SetScanner = 0x0f,
        /// Chat system note.
        SendChatNote = 0x10,
        /// Set pet.
        SetPet = 0x11,
        /// Lobby countdown.
        SetStartCounter = 0x12,
        /// Enter a vent.
        EnterVent = 0x13,
        /// Exit a vent.
        ExitVent = 0x14,
        /// Teleport.
        SnapTo = 0x15,
        /// Meeting screen closes.
        Close = 0x16,
        /// Vote results.
        VotingComplete = 0x17,
        /// Cast a vote.
        CastVote = 0x18,
        /// Clear own vote.
        ClearVote = 0x19,
        /// Vote to kick.
        AddVote = 0x1a,
        /// Close a set of doors.
        CloseDoorsOfType = 0x1b,
        /// Repair or sabotage a system.
        RepairSystem = 0x1c,
        /// Host assigns tasks.
        SetTasks = 0x1d,
        /// Player table rows.
        UpdateGameData = 0x1e,
    }
}

/// One datagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Packet {
    /// Payloads without delivery guarantee.
    Unreliable {
        /// Payloads in wire order.
        payloads: Vec<Payload>,
    },
    /// Payloads that the receiver must acknowledge.
    Reliable {
        /// Per-connection sequence number.
        nonce: u16,
        /// Payloads in wire order.
        payloads: Vec<Payload>,
    },
    /// Opens a session.
    Hello {
        /// Per-connection sequence number.
        nonce: u16,
        /// Transport version byte, always `0`.
        hazel_version: u8,
        /// Client version, big-endian on the wire.
        client_version: i32,
        /// Player name.
        username: String,
    },
    /// Ends a session, optionally with a reason.
    Disconnect {
        /// Why, when the sender said.
        reason: Option<DisconnectReason>,
        /// Free text for [`DisconnectReason::Custom`].
        message: Option<String>,
    },
    /// Confirms receipt of a nonce.
    Acknowledge {
        /// Acknowledged sequence number.
        nonce: u16,
    },
    /// Keep-alive.
    Ping {
        /// Per-connection sequence number.
        nonce: u16,
    },
    /// An opcode this codec does not know.
    Unknown {
        /// Raw opcode.
        opcode: u8,
        /// Undecoded remainder.
        body: Vec<u8>,
    },
}

impl Packet {
    /// Reliable packet with a placeholder nonce; the transport assigns the real one.
    pub fn reliable(payloads: Vec<Payload>) -> Self {
        Packet::Reliable { nonce: 0, payloads }
    }

    /// Unreliable packet.
    pub fn unreliable(payloads: Vec<Payload>) -> Self {
        Packet::Unreliable { payloads }
    }

    /// Opcode of this packet, or `None` for [`Packet::Unknown`].
    pub fn opcode(&self) -> Option<Opcode> {
        Some(match self {
            Packet::Unreliable { .. } => Opcode::Unreliable,
            Packet::Reliable { .. } => Opcode::Reliable,
            Packet::Hello { .. } => Opcode::Hello,
            Packet::Disconnect { .. } => Opcode::Disconnect,
            Packet::Acknowledge { .. } => Opcode::Acknowledge,
            Packet::Ping { .. } => Opcode::Ping,
            Packet::Unknown { .. } => return None,
        })
    }

    /// Whether the receiver must answer with an [`Packet::Acknowledge`].
    pub fn needs_ack(&self) -> bool {
        self.opcode().is_some_and(Opcode::needs_ack)
    }

    /// Nonce of an acknowledged packet type.
    pub fn nonce(&self) -> Option<u16> {
        match self {
            Packet::Reliable { nonce, .. }
            | Packet::Hello { nonce, .. }
            | Packet::Ping { nonce } => Some(*nonce),
            _ => None,
        }
    }

    /// Overwrite the nonce. No effect on packet types without one.
    pub fn set_nonce(&mut self, value: u16) {
        if let Packet::Reliable { nonce, .. }
        | Packet::Hello { nonce, .. }
        | Packet::Ping { nonce } = self
        {
            *nonce = value;
        }
    }

    /// Payloads carried by Reliable/Unreliable packets; empty otherwise.
    pub fn payloads(&self) -> &[Payload] {
        match self {
            Packet::Reliable { payloads, .. } | Packet::Unreliable { payloads } => payloads,
            _ => &[],
        }
    }
}

/// Payload inside a Reliable or Unreliable packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Payload {
    /// Server-bound lobby creation.
    HostGame {
        /// Settings for the new lobby.
        options: GameOptions,
    },
    /// Client-bound answer to [`Payload::HostGame`].
    GameCreated {
        /// Room code of the new lobby.
        code: i32,
    },
    /// Server-bound join request.
    JoinGame {
        /// Room code.
        code: i32,
        /// Bit field of owned maps.
        map_ownership: u8,
    },
    /// Client-bound notice that another client joined.
    PlayerJoined {
        /// Room code.
        code: i32,
        /// Joining client.
        client_id: u32,
        /// Current host.
        host_id: u32,
    },
    /// Client-bound refusal of a join.
    JoinGameError {
        /// Reason code.
        reason: DisconnectReason,
        /// Free text for [`DisconnectReason::Custom`].
        message: Option<String>,
    },
    /// The game started.
    StartGame {
        /// Room code.
        code: i32,
    },
    /// The lobby was removed.
    RemoveGame,
    /// A client left.
    RemovePlayer {
        /// Room code.
        code: i32,
        /// Leaving client.
        client_id: u32,
        /// Host after the departure.
        host_id: u32,
        /// Why the client left.
        reason: Option<DisconnectReason>,
        /// Free text for [`DisconnectReason::Custom`].
        message: Option<String>,
    },
    /// Object traffic for every client.
    GameData {
        /// Room code.
        code: i32,
        /// Parts in wire order.
        parts: Vec<Part>,
    },
    /// Object traffic for one client.
    GameDataTo {
        /// Room code.
        code: i32,
        /// Recipient client id.
        recipient: u32,
        /// Parts in wire order.
        parts: Vec<Part>,
    },
    /// Client-bound confirmation that the local client joined.
    JoinedGame {
        /// Room code.
        code: i32,
        /// Id assigned to the local client.
        client_id: u32,
        /// Current host.
        host_id: u32,
        /// Other clients already present.
        clients: Vec<u32>,
    },
    /// Game over.
    EndGame {
        /// Room code.
        code: i32,
        /// Outcome.
        reason: GameEndReason,
        /// Whether to show an ad.
        show_ad: bool,
    },
    /// Lobby setting changed.
    AlterGame {
        /// Room code.
        code: i32,
        /// Which setting.
        tag: AlterGameTag,
        /// New visibility.
        is_public: bool,
    },
    /// Server-bound kick request.
    KickPlayer {
        /// Client to remove.
        client_id: u32,
        /// Ban instead of kick.
        banned: bool,
    },
    /// Client-bound kick notice.
    PlayerKicked {
        /// Room code.
        code: i32,
        /// Removed client.
        client_id: u32,
        /// Whether it was a ban.
        banned: bool,
    },
    /// The host is not in the lobby yet.
    WaitForHost {
        /// Room code.
        code: i32,
        /// Waiting client.
        client_id: u32,
    },
    /// Reconnect to another server and retry.
    Redirect {
        /// Server address.
        ip: Ipv4Addr,
        /// Server port.
        port: u16,
    },
    /// Servers in the region.
    MasterServerList {
        /// Known servers.
        servers: Vec<MasterServer>,
    },
    /// Server-bound game search.
    SearchGames {
        /// Filter; map and impostor count select games.
        options: GameOptions,
    },
    /// Client-bound search results.
    GameList {
        /// Open games.
        games: Vec<GameListing>,
        /// Per-map totals, when the server sent them.
        counts: Option<MapCounts>,
    },
    /// A payload id this codec does not know.
    Unknown {
        /// Raw payload id.
        id: u8,
        /// Undecoded body.
        body: Vec<u8>,
    },
}

impl Payload {
    /// Wire id of this payload.
    pub fn id(&self) -> u8 {
        let id = match self {
            Payload::HostGame { .. } | Payload::GameCreated { .. } => PayloadId::HostGame,
            Payload::JoinGame { .. }
            | Payload::PlayerJoined { .. }
            | Payload::JoinGameError { .. } => PayloadId::JoinGame,
            Payload::StartGame { .. } => PayloadId::StartGame,
            Payload::RemoveGame => PayloadId::RemoveGame,
            Payload::RemovePlayer { .. } => PayloadId::RemovePlayer,
            Payload::GameData { .. } => PayloadId::GameData,
            Payload::GameDataTo { .. } => PayloadId::GameDataTo,
            Payload::JoinedGame { .. } => PayloadId::JoinedGame,
            Payload::EndGame { .. } => PayloadId::EndGame,
            Payload::AlterGame { .. } => PayloadId::AlterGame,
            Payload::KickPlayer { .. } | Payload::PlayerKicked { .. } => PayloadId::KickPlayer,
            Payload::WaitForHost { .. } => PayloadId::WaitForHost,
            Payload::Redirect { .. } => PayloadId::Redirect,
            Payload::MasterServerList { .. } => PayloadId::MasterServerList,
            Payload::SearchGames { .. } | Payload::GameList { .. } => PayloadId::GetGameListV2,
            Payload::Unknown { id, .. } => return *id,
        };
        id.into()
    }
}

/// Entry of [`Payload::MasterServerList`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterServer {
    /// Entry flag; doubles as the entry's frame tag.
    pub flag: u8,
    /// Display name.
    pub name: String,
    /// Address.
    pub ip: Ipv4Addr,
    /// Port.
    pub port: u16,
    /// Connected players.
    pub players: u32,
}

/// Entry of [`Payload::GameList`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameListing {
    /// Server hosting the game.
    pub ip: Ipv4Addr,
    /// Port of that server.
    pub port: u16,
    /// Room code.
    pub code: i32,
    /// Host name.
    pub name: String,
    /// Players in the lobby.
    pub players: u8,
    /// Seconds since creation.
    pub age: u32,
    /// Map.
    pub map: MapId,
    /// Impostor count.
    pub impostors: u8,
    /// Capacity.
    pub max_players: u8,
}

/// Per-map game totals of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MapCounts {
    /// Games on The Skeld.
    pub skeld: u32,
    /// Games on Mira HQ.
    pub mira_hq: u32,
    /// Games on Polus.
    pub polus: u32,
}

/// Part inside GameData/GameDataTo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "part")]
pub enum Part {
    /// Incremental state for one component.
    Data {
        /// Target component.
        netid: u32,
        /// Component-specific bytes.
        data: Vec<u8>,
    },
    /// Remote procedure call on one component.
    Rpc {
        /// Handling component.
        netid: u32,
        /// Call and arguments.
        rpc: Rpc,
    },
    /// New object with its components.
    Spawn {
        /// Raw spawn id; see [`auproxy_core::SpawnKind`].
        spawn_id: u32,
        /// Owning client, or `-2` for the server.
        owner: i32,
        /// Spawn flags (`1` = this is the client's own player).
        flags: u8,
        /// Components in schema order.
        components: Vec<SpawnComponent>,
    },
    /// One component removed.
    Despawn {
        /// Removed component.
        netid: u32,
    },
    /// Client moved to a scene.
    SceneChange {
        /// Moving client.
        client_id: u32,
        /// Scene name, `"OnlineGame"` in practice.
        scene: String,
    },
    /// Client finished loading.
    Ready {
        /// Ready client.
        client_id: u32,
    },
    /// Settings changed.
    ChangeSettings,
    /// A part type this codec does not know.
    Unknown {
        /// Raw tag.
        tag: u8,
        /// Undecoded body.
        body: Vec<u8>,
    },
}

impl Part {
    /// Wire tag of this part.
    pub fn tag(&self) -> u8 {
        let tag = match self {
            Part::Data { .. } => PartType::Data,
            Part::Rpc { .. } => PartType::Rpc,
            Part::Spawn { .. } => PartType::Spawn,
            Part::Despawn { .. } => PartType::Despawn,
            Part::SceneChange { .. } => PartType::SceneChange,
            Part::Ready { .. } => PartType::Ready,
            Part::ChangeSettings => PartType::ChangeSettings,
            Part::Unknown { tag, .. } => return *tag,
        };
        tag.into()
    }
}

/// Component record inside a [`Part::Spawn`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnComponent {
    /// Assigned netid.
    pub netid: u32,
    /// Frame tag, `1` in practice.
    pub tag: u8,
    /// Initial state, decoded by the component's spawn handler.
    pub data: Vec<u8>,
}

/// Target id meaning "no body, emergency button".
pub const EMERGENCY: u8 = 0xFF;

/// RPC call and its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rpc")]
pub enum Rpc {
    /// Play an animation.
    PlayAnimation {
        /// Animation id.
        animation: u8,
    },
    /// Task finished.
    CompleteTask {
        /// Task index in the player's list.
        task: u8,
    },
    /// Lobby settings.
    SyncSettings {
        /// New settings.
        options: GameOptions,
    },
    /// Impostor selection.
    SetInfected {
        /// Player ids of the impostors.
        impostors: Vec<u8>,
    },
    /// The handler's player was ejected.
    Exiled,
    /// Name approval request.
    CheckName {
        /// Requested name.
        name: String,
    },
    /// Name assignment.
    SetName {
        /// New name.
        name: String,
    },
    /// Colour approval request.
    CheckColour {
        /// Requested colour.
        colour: Colour,
    },
    /// Colour assignment.
    SetColour {
        /// New colour.
        colour: Colour,
    },
    /// Hat change.
    SetHat {
        /// Hat id.
        hat: u8,
    },
    /// Skin change.
    SetSkin {
        /// Skin id.
        skin: u8,
    },
    /// Body report; [`EMERGENCY`] for the button.
    ReportDeadBody {
        /// Reported player id.
        body: u8,
    },
    /// Kill.
    MurderPlayer {
        /// Victim's PlayerControl netid.
        target: u32,
    },
    /// Chat line.
    SendChat {
        /// Message text.
        text: String,
    },
    /// Meeting start; [`EMERGENCY`] for the button.
    StartMeeting {
        /// Reported player id.
        body: u8,
    },
    /// Medbay scanner.
    SetScanner {
        /// Scanning or not.
        scanning: bool,
        /// Scanner sequence.
        sequence: u8,
    },
    /// Chat note.
    SendChatNote {
        /// Player the note is about.
        player: u8,
        /// Note kind.
        note: u8,
    },
    /// Pet change.
    SetPet {
        /// Pet id.
        pet: u8,
    },
    /// Lobby countdown tick.
    SetStartCounter {
        /// Counter sequence.
        sequence: u32,
        /// Seconds left, `-1` to cancel.
        seconds: i8,
    },
    /// Enter a vent.
    EnterVent {
        /// Vent id.
        vent: u32,
    },
    /// Exit a vent.
    ExitVent {
        /// Vent id.
        vent: u32,
    },
    /// Teleport.
    SnapTo {
        /// Target x.
        x: f32,
        /// Target y.
        y: f32,
    },
    /// Meeting screen closed.
    Close,
    /// Meeting results.
    VotingComplete {
        /// One state byte per player.
        states: Vec<u8>,
        /// Ejected player id, `0xFF` for none.
        exiled: u8,
        /// Whether the vote tied.
        tie: bool,
    },
    /// Vote.
    CastVote {
        /// Voting player id.
        voter: u8,
        /// Suspect player id; `0xFF` skips.
        suspect: u8,
    },
    /// Withdraw a vote.
    ClearVote,
    /// Vote-kick.
    AddVote {
        /// Client to kick.
        target: u8,
    },
    /// Close doors.
    CloseDoorsOfType {
        /// Room whose doors close.
        system: SystemType,
    },
    /// Repair or sabotage.
    RepairSystem {
        /// Target system.
        system: SystemType,
        /// Acting player's PlayerControl netid.
        handler: u32,
        /// System-specific argument.
        amount: u8,
    },
    /// Task assignment.
    SetTasks {
        /// Player id.
        player: u8,
        /// Task type ids.
        tasks: Vec<u8>,
    },
    /// Player table rows.
    UpdateGameData {
        /// Changed rows.
        players: Vec<PlayerData>,
    },
    /// An RPC id this codec does not know.
    Unknown {
        /// Raw RPC id.
        id: u8,
        /// Undecoded arguments.
        body: Vec<u8>,
    },
}

bitflags! {
    /// Status bits of a [`PlayerData`] row.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct PlayerFlags: u8 {
        /// Client left the game.
        const DISCONNECTED = 0x01;
        /// Impostor.
        const IMPOSTOR = 0x02;
        /// Dead.
        const DEAD = 0x04;
    }
}

/// One task in a player row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    /// Task instance id.
    pub task_id: u32,
    /// Whether it is done.
    pub completed: bool,
}

/// One row of the player table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerData {
    /// Player id (not the client id).
    pub player_id: u8,
    /// Display name.
    pub name: String,
    /// Body colour.
    pub colour: Colour,
    /// Hat id.
    pub hat: u32,
    /// Pet id.
    pub pet: u32,
    /// Skin id.
    pub skin: u32,
    /// Status bits.
    pub flags: PlayerFlags,
    /// Assigned tasks.
    pub tasks: Vec<TaskState>,
}

impl PlayerData {
    /// Empty row for `player_id`.
    pub fn new(player_id: u8) -> Self {
        Self {
            player_id,
            name: String::new(),
            colour: Colour::Red,
            hat: 0,
            pet: 0,
            skin: 0,
            flags: PlayerFlags::empty(),
            tasks: Vec::new(),
        }
    }

    /// Read a row that starts with the player id.
    pub fn decode(r: &mut Reader<'_>) -> CodecResult<Self> {
        let player_id = r.u8()?;
        Self::decode_fields(player_id, r)
    }

    /// Read the fields after an already-consumed player id.
    pub fn decode_fields(player_id: u8, r: &mut Reader<'_>) -> CodecResult<Self> {
        let name = r.string()?;
        let colour = Colour::try_from(r.u8()?)?;
        let hat = r.packed()?;
        let pet = r.packed()?;
        let skin = r.packed()?;
        let flags = PlayerFlags::from_bits_retain(r.u8()?);
        let count = r.u8()?;
        let mut tasks = Vec::with_capacity(count as usize);
        for _ in 0..count {
            tasks.push(TaskState {
                task_id: r.packed()?,
                completed: r.bool()?,
            });
        }
        Ok(Self {
            player_id,
            name,
            colour,
            hat,
            pet,
            skin,
            flags,
            tasks,
        })
    }

    /// Write the row, player id first.
    pub fn encode(&self, w: &mut Writer) -> CodecResult<()> {
        w.u8(self.player_id);
        self.encode_fields(w)
    }

    /// Write everything after the player id.
    pub fn encode_fields(&self, w: &mut Writer) -> CodecResult<()> {
        let task_count = u8::try_from(self.tasks.len())
            .map_err(|_| CodecError::ListTooLong {
                len: self.tasks.len(),
            })?;
        w.string(&self.name)
            .u8(self.colour.into())
            .packed(self.hat)
            .packed(self.pet)
            .packed(self.skin)
            .u8(self.flags.bits())
            .u8(task_count);
        for task in &self.tasks {
            w.packed(task.task_id).bool(task.completed);
        }
        Ok(())
    }
}
