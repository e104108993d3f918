//! Domain events raised while applying server traffic.
//!
//! Events are queued on the [`Game`](crate::Game) and drained by whoever
//! drives it. The set is closed: every observable change maps to one variant.

use crate::components::{ComponentKind, Vector2};
use crate::registry::ObjectId;
use auproxy_core::{Colour, DisconnectReason, GameEndReason, SpawnKind};
use auproxy_net::GameOptions;
use serde::Serialize;
use std::collections::VecDeque;

/// Result of a meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VoteOutcome {
    /// Nobody was ejected because the vote tied.
    Tie,
    /// Skip won.
    Skipped,
    /// A player was ejected.
    Exiled {
        /// Ejected player id.
        player_id: u8,
    },
}

/// Something that happened in the game.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    /// An object was spawned.
    Spawned {
        /// Arena id.
        object: ObjectId,
        /// Spawn kind.
        kind: SpawnKind,
        /// Owning client, `-2` for the server.
        owner: i32,
    },
    /// A component was removed.
    Despawned {
        /// Removed netid.
        netid: u32,
    },
    /// A client joined the lobby.
    PlayerJoined {
        /// Joining client.
        client_id: u32,
    },
    /// A client left the lobby.
    PlayerLeft {
        /// Leaving client.
        client_id: u32,
        /// Why, when the server said.
        reason: Option<DisconnectReason>,
    },
    /// The host changed.
    HostChanged {
        /// New host.
        host_id: u32,
    },
    /// Lobby countdown changed.
    StartCounter {
        /// Seconds left, `-1` when cancelled.
        seconds: i8,
    },
    /// The game started.
    GameStarted,
    /// The game ended.
    GameEnded {
        /// Outcome.
        reason: GameEndReason,
    },
    /// Impostors chosen.
    ImpostersSet {
        /// Impostor player ids.
        impostors: Vec<u8>,
    },
    /// A vote appeared in the meeting area.
    VoteCast {
        /// Voting player id.
        voter: u8,
        /// Target player id, `None` for a skip.
        suspect: Option<u8>,
    },
    /// Meeting result.
    VotingComplete {
        /// Tie, skip, or ejection.
        outcome: VoteOutcome,
    },
    /// A player was killed.
    Murder {
        /// Killer's client id.
        murderer: u32,
        /// Victim's client id.
        victim: u32,
    },
    /// A meeting started.
    MeetingStarted {
        /// Reported body, `None` for the emergency button.
        body: Option<u8>,
    },
    /// Host sent new settings.
    SettingsSynced {
        /// Settings now in effect.
        options: GameOptions,
    },
    /// Lobby visibility changed.
    VisibilityChanged {
        /// Listed publicly.
        public: bool,
    },
    /// A client changed scene.
    SceneChanged {
        /// Client.
        client_id: u32,
        /// Scene name.
        scene: String,
    },
    /// A client was kicked or banned.
    Kicked {
        /// Client.
        client_id: u32,
        /// Banned rather than kicked.
        banned: bool,
    },
    /// Host assigned tasks.
    TasksSet {
        /// Player id.
        player_id: u8,
        /// Task type ids.
        tasks: Vec<u8>,
    },
    /// A player completed a task.
    TaskCompleted {
        /// Player id.
        player_id: u8,
        /// Index into the player's task list.
        task: u8,
    },
    /// A movement update was applied.
    Moved {
        /// Owning client.
        client_id: i32,
        /// Transform netid.
        netid: u32,
        /// Position.
        position: Vector2,
        /// Velocity.
        velocity: Vector2,
    },
    /// A player teleported.
    SnappedTo {
        /// Owning client.
        client_id: i32,
        /// New position.
        position: Vector2,
    },
    /// Player table rows were written.
    PlayerDataUpdated {
        /// Rows that changed.
        player_ids: Vec<u8>,
    },
    /// A name was set.
    NameChanged {
        /// Player id.
        player_id: u8,
        /// New name.
        name: String,
    },
    /// A colour was set.
    ColourChanged {
        /// Player id.
        player_id: u8,
        /// New colour.
        colour: Colour,
    },
    /// A hat was set.
    HatChanged {
        /// Player id.
        player_id: u8,
        /// Hat id.
        hat: u8,
    },
    /// A skin was set.
    SkinChanged {
        /// Player id.
        player_id: u8,
        /// Skin id.
        skin: u8,
    },
    /// A pet was set.
    PetChanged {
        /// Player id.
        player_id: u8,
        /// Pet id.
        pet: u8,
    },
    /// A chat line.
    ChatMessage {
        /// Player id.
        player_id: u8,
        /// Text.
        text: String,
    },
    /// A player was ejected.
    Exiled {
        /// Player id.
        player_id: u8,
    },
    /// A player entered a vent.
    VentEntered {
        /// Player id.
        player_id: u8,
        /// Vent id.
        vent: u32,
    },
    /// A player left a vent.
    VentExited {
        /// Player id.
        player_id: u8,
        /// Vent id.
        vent: u32,
    },
    /// A component's payload could not be decoded; the component kept its previous state.
    ComponentDecodeFailed {
        /// Component netid.
        netid: u32,
        /// Component class.
        kind: ComponentKind,
        /// Decoder message.
        error: String,
    },
}

/// FIFO of pending events.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: VecDeque<GameEvent>,
}

impl EventQueue {
    /// Queue an event.
    pub fn push(&mut self, event: GameEvent) {
        self.events.push_back(event);
    }

    /// Take every queued event, oldest first.
    pub fn drain(&mut self) -> Vec<GameEvent> {
        self.events.drain(..).collect()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
