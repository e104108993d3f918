//! Builders for the payloads a client sends to act in a game.
//!
//! Each builder resolves the netids it needs through the [`Game`]'s registry
//! and fails with [`ActionError`] when an object has not spawned yet.

use crate::components::{ComponentKind, ComponentState, Vector2};
use crate::game::Game;
use auproxy_core::{Colour, SystemType};
use auproxy_net::{Part, Payload, Rpc, Writer, EMERGENCY};
use thiserror::Error;

/// An action needs an object that is not (or no longer) spawned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The client has no live component of this kind on its player.
    #[error("client {client_id} has no {kind:?}")]
    NoPlayer {
        /// Acting or targeted client.
        client_id: u32,
        /// Component that was looked for.
        kind: ComponentKind,
    },
    /// A singleton object (GameData, MeetingHud, ShipStatus) is missing.
    #[error("no {0:?} is spawned")]
    Missing(ComponentKind),
}

/// Result of an action builder.
pub type ActionResult = Result<Payload, ActionError>;

fn player_netid(game: &Game, client_id: u32, kind: ComponentKind) -> Result<u32, ActionError> {
    game.registry()
        .player_component(client_id, kind)
        .map(|c| c.netid)
        .ok_or(ActionError::NoPlayer { client_id, kind })
}

fn player_id(game: &Game, client_id: u32) -> Result<u8, ActionError> {
    game.registry()
        .player_id(client_id)
        .ok_or(ActionError::NoPlayer {
            client_id,
            kind: ComponentKind::PlayerControl,
        })
}

fn singleton_netid(game: &Game, kind: ComponentKind) -> Result<u32, ActionError> {
    game.registry()
        .find(kind)
        .map(|c| c.netid)
        .ok_or(ActionError::Missing(kind))
}

fn broadcast(game: &Game, parts: Vec<Part>) -> Payload {
    Payload::GameData {
        code: game.code(),
        parts,
    }
}

fn to_host(game: &Game, parts: Vec<Part>) -> Payload {
    Payload::GameDataTo {
        code: game.code(),
        recipient: game.host_id(),
        parts,
    }
}

fn player_rpc(game: &Game, client_id: u32, rpc: Rpc) -> ActionResult {
    let netid = player_netid(game, client_id, ComponentKind::PlayerControl)?;
    Ok(broadcast(game, vec![Part::Rpc { netid, rpc }]))
}

/// Kick or ban a client (host only).
pub fn kick(client_id: u32, banned: bool) -> Payload {
    Payload::KickPlayer { client_id, banned }
}

/// Mark the local client ready after the game starts.
pub fn ready(game: &Game) -> Payload {
    broadcast(
        game,
        vec![Part::Ready {
            client_id: game.local_id(),
        }],
    )
}

/// Ask the server to spawn the local player in the lobby scene.
pub fn scene_change(game: &Game, scene: &str) -> Payload {
    broadcast(
        game,
        vec![Part::SceneChange {
            client_id: game.local_id(),
            scene: scene.to_string(),
        }],
    )
}

/// `murderer` kills `victim`.
pub fn murder(game: &Game, murderer: u32, victim: u32) -> ActionResult {
    let target = player_netid(game, victim, ComponentKind::PlayerControl)?;
    player_rpc(game, murderer, Rpc::MurderPlayer { target })
}

/// Assign tasks to a client (host only).
pub fn set_tasks(game: &Game, client_id: u32, tasks: Vec<u8>) -> ActionResult {
    let player = player_id(game, client_id)?;
    let netid = singleton_netid(game, ComponentKind::GameData)?;
    Ok(broadcast(
        game,
        vec![Part::Rpc {
            netid,
            rpc: Rpc::SetTasks { player, tasks },
        }],
    ))
}

/// Complete the task at `task` in the client's list.
pub fn complete_task(game: &Game, client_id: u32, task: u8) -> ActionResult {
    player_rpc(game, client_id, Rpc::CompleteTask { task })
}

/// Vote for `suspect` in the current meeting, or skip with `None`.
pub fn vote(game: &Game, voter: u32, suspect: Option<u32>) -> ActionResult {
    let netid = singleton_netid(game, ComponentKind::MeetingHud)?;
    let voter = player_id(game, voter)?;
    let suspect = match suspect {
        Some(client_id) => player_id(game, client_id)?,
        None => EMERGENCY,
    };
    Ok(to_host(
        game,
        vec![Part::Rpc {
            netid,
            rpc: Rpc::CastVote { voter, suspect },
        }],
    ))
}

/// Vote to kick `target` from the lobby.
pub fn vote_kick(game: &Game, target: u32) -> ActionResult {
    let netid = singleton_netid(game, ComponentKind::VoteBanSystem)?;
    let target = player_id(game, target)?;
    Ok(broadcast(
        game,
        vec![Part::Rpc {
            netid,
            rpc: Rpc::AddVote { target },
        }],
    ))
}

/// Report a body (player id), or press the emergency button with `None`.
pub fn report(game: &Game, client_id: u32, body: Option<u8>) -> ActionResult {
    player_rpc(
        game,
        client_id,
        Rpc::ReportDeadBody {
            body: body.unwrap_or(EMERGENCY),
        },
    )
}

/// Sabotage `system`. Sent to the host on the ship.
pub fn sabotage(game: &Game, client_id: u32, system: SystemType) -> ActionResult {
    let handler = player_netid(game, client_id, ComponentKind::PlayerControl)?;
    let netid = singleton_netid(game, ComponentKind::ShipStatus)?;
    Ok(to_host(
        game,
        vec![Part::Rpc {
            netid,
            rpc: Rpc::RepairSystem {
                system: SystemType::Sabotage,
                handler,
                amount: system.into(),
            },
        }],
    ))
}

/// Set a name. The host sets it directly; anyone else asks the host.
pub fn set_name(game: &Game, client_id: u32, name: &str) -> ActionResult {
    let netid = player_netid(game, client_id, ComponentKind::PlayerControl)?;
    let name = name.to_string();
    Ok(if game.is_host() {
        broadcast(game, vec![Part::Rpc { netid, rpc: Rpc::SetName { name } }])
    } else {
        to_host(game, vec![Part::Rpc { netid, rpc: Rpc::CheckName { name } }])
    })
}

/// Set a colour. The host sets it directly; anyone else asks the host.
pub fn set_colour(game: &Game, client_id: u32, colour: Colour) -> ActionResult {
    let netid = player_netid(game, client_id, ComponentKind::PlayerControl)?;
    let rpc = if game.is_host() {
        Rpc::SetColour { colour }
    } else {
        Rpc::CheckColour { colour }
    };
    let part = Part::Rpc { netid, rpc };
    Ok(if game.is_host() {
        broadcast(game, vec![part])
    } else {
        to_host(game, vec![part])
    })
}

/// Set a hat.
pub fn set_hat(game: &Game, client_id: u32, hat: u8) -> ActionResult {
    player_rpc(game, client_id, Rpc::SetHat { hat })
}

/// Set a skin.
pub fn set_skin(game: &Game, client_id: u32, skin: u8) -> ActionResult {
    player_rpc(game, client_id, Rpc::SetSkin { skin })
}

/// Set a pet.
pub fn set_pet(game: &Game, client_id: u32, pet: u8) -> ActionResult {
    player_rpc(game, client_id, Rpc::SetPet { pet })
}

/// Send a chat line.
pub fn chat(game: &Game, client_id: u32, text: &str) -> ActionResult {
    player_rpc(
        game,
        client_id,
        Rpc::SendChat {
            text: text.to_string(),
        },
    )
}

/// Move a player. Advances the transform's sequence; send the result unreliably.
pub fn move_to(game: &mut Game, client_id: u32, position: Vector2, velocity: Vector2) -> ActionResult {
    let netid = player_netid(game, client_id, ComponentKind::CustomNetworkTransform)?;
    let missing = ActionError::NoPlayer {
        client_id,
        kind: ComponentKind::CustomNetworkTransform,
    };
    let data = match game.registry_mut().component_mut(netid).map(|c| &mut c.state) {
        Some(ComponentState::CustomNetworkTransform(cnt)) => {
            cnt.advance(position, velocity);
            let mut w = Writer::new();
            cnt.serialize(&mut w);
            w.into_inner()
        }
        _ => return Err(missing),
    };
    Ok(broadcast(game, vec![Part::Data { netid, data }]))
}

/// Teleport a player.
pub fn snap_to(game: &Game, client_id: u32, position: Vector2) -> ActionResult {
    let netid = player_netid(game, client_id, ComponentKind::CustomNetworkTransform)?;
    Ok(broadcast(
        game,
        vec![Part::Rpc {
            netid,
            rpc: Rpc::SnapTo {
                x: position.x,
                y: position.y,
            },
        }],
    ))
}
