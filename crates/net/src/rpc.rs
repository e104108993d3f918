//! RPC argument layouts.
//!
//! An RPC part body is `[handler netid: packed][rpc id: u8][arguments]`. The
//! part codec reads the netid and id; this module handles the arguments.

use crate::buffer::{CodecResult, Reader, Writer};
use crate::options::GameOptions;
use crate::protocol::{PlayerData, Rpc, RpcId};
use auproxy_core::lerp::{position_to_u16, u16_to_position};
use auproxy_core::{Colour, SystemType};

fn byte_list(r: &mut Reader<'_>) -> CodecResult<Vec<u8>> {
    let count = r.packed()? as usize;
    Ok(r.bytes(count)?.to_vec())
}

fn write_byte_list(w: &mut Writer, list: &[u8]) {
    w.packed(list.len() as u32).bytes(list);
}

/// Decode the arguments of RPC `id`. Unknown ids keep their raw bytes.
pub fn decode_rpc(id: u8, r: &mut Reader<'_>) -> CodecResult<Rpc> {
    let Ok(kind) = RpcId::try_from(id) else {
        return Ok(Rpc::Unknown {
            id,
            body: r.rest().to_vec(),
        });
    };

    let rpc = match kind {
        RpcId::PlayAnimation => Rpc::PlayAnimation { animation: r.u8()? },
        RpcId::CompleteTask => Rpc::CompleteTask { task: r.u8()? },
        RpcId::SyncSettings => Rpc::SyncSettings {
            options: GameOptions::decode(r)?,
        },
        RpcId::SetInfected => Rpc::SetInfected {
            impostors: byte_list(r)?,
        },
        RpcId::Exiled => Rpc::Exiled,
        RpcId::CheckName => Rpc::CheckName { name: r.string()? },
        RpcId::SetName => Rpc::SetName { name: r.string()? },
        RpcId::CheckColour => Rpc::CheckColour {
            colour: Colour::try_from(r.u8()?)?,
        },
        RpcId::SetColour => Rpc::SetColour {
            colour: Colour::try_from(r.u8()?)?,
        },
        RpcId::SetHat => Rpc::SetHat { hat: r.u8()? },
        RpcId::SetSkin => Rpc::SetSkin { skin: r.u8()? },
        RpcId::ReportDeadBody => Rpc::ReportDeadBody { body: r.u8()? },
        RpcId::MurderPlayer => Rpc::MurderPlayer {
            target: r.packed()?,
        },
        RpcId::SendChat => Rpc::SendChat { text: r.string()? },
        RpcId::StartMeeting => Rpc::StartMeeting { body: r.u8()? },
        RpcId::SetScanner => Rpc::SetScanner {
            scanning: r.bool()?,
            sequence: r.u8()?,
        },
        RpcId::SendChatNote => Rpc::SendChatNote {
            player: r.u8()?,
            note: r.u8()?,
        },
        RpcId::SetPet => Rpc::SetPet { pet: r.u8()? },
        RpcId::SetStartCounter => Rpc::SetStartCounter {
            sequence: r.packed()?,
            seconds: r.i8()?,
        },
        RpcId::EnterVent => Rpc::EnterVent { vent: r.packed()? },
        RpcId::ExitVent => Rpc::ExitVent { vent: r.packed()? },
        RpcId::SnapTo => Rpc::SnapTo {
            x: u16_to_position(r.u16_le()?),
            y: u16_to_position(r.u16_le()?),
        },
        RpcId::Close => Rpc::Close,
        RpcId::VotingComplete => Rpc::VotingComplete {
            states: byte_list(r)?,
            exiled: r.u8()?,
            tie: r.bool()?,
        },
        RpcId::CastVote => Rpc::CastVote {
            voter: r.u8()?,
            suspect: r.u8()?,
        },
        RpcId::ClearVote => Rpc::ClearVote,
        RpcId::AddVote => Rpc::AddVote { target: r.u8()? },
        RpcId::CloseDoorsOfType => Rpc::CloseDoorsOfType {
            system: SystemType::try_from(r.u8()?)?,
        },
        RpcId::RepairSystem => Rpc::RepairSystem {
            system: SystemType::try_from(r.u8()?)?,
            handler: r.packed()?,
            amount: r.u8()?,
        },
        RpcId::SetTasks => Rpc::SetTasks {
            player: r.u8()?,
            tasks: byte_list(r)?,
        },
        RpcId::UpdateGameData => {
            let mut players = Vec::new();
            while !r.is_empty() {
                let (player_id, mut row) = r.frame()?;
                players.push(PlayerData::decode_fields(player_id, &mut row)?);
            }
            Rpc::UpdateGameData { players }
        }
    };

    Ok(rpc)
}

/// Numeric id of an RPC.
pub fn rpc_id(rpc: &Rpc) -> u8 {
    let id = match rpc {
        Rpc::PlayAnimation { .. } => RpcId::PlayAnimation,
        Rpc::CompleteTask { .. } => RpcId::CompleteTask,
        Rpc::SyncSettings { .. } => RpcId::SyncSettings,
        Rpc::SetInfected { .. } => RpcId::SetInfected,
        Rpc::Exiled => RpcId::Exiled,
        Rpc::CheckName { .. } => RpcId::CheckName,
        Rpc::SetName { .. } => RpcId::SetName,
        Rpc::CheckColour { .. } => RpcId::CheckColour,
        Rpc::SetColour { .. } => RpcId::SetColour,
        Rpc::SetHat { .. } => RpcId::SetHat,
        Rpc::SetSkin { .. } => RpcId::SetSkin,
        Rpc::ReportDeadBody { .. } => RpcId::ReportDeadBody,
        Rpc::MurderPlayer { .. } => RpcId::MurderPlayer,
        Rpc::SendChat { .. } => RpcId::SendChat,
        Rpc::StartMeeting { .. } => RpcId::StartMeeting,
        Rpc::SetScanner { .. } => RpcId::SetScanner,
        Rpc::SendChatNote { .. } => RpcId::SendChatNote,
        Rpc::SetPet { .. } => RpcId::SetPet,
        Rpc::SetStartCounter { .. } => RpcId::SetStartCounter,
        Rpc::EnterVent { .. } => RpcId::EnterVent,
        Rpc::ExitVent { .. } => RpcId::ExitVent,
        Rpc::SnapTo { .. } => RpcId::SnapTo,
        Rpc::Close => RpcId::Close,
        Rpc::VotingComplete { .. } => RpcId::VotingComplete,
        Rpc::CastVote { .. } => RpcId::CastVote,
        Rpc::ClearVote => RpcId::ClearVote,
        Rpc::AddVote { .. } => RpcId::AddVote,
        Rpc::CloseDoorsOfType { .. } => RpcId::CloseDoorsOfType,
        Rpc::RepairSystem { .. } => RpcId::RepairSystem,
        Rpc::SetTasks { .. } => RpcId::SetTasks,
        Rpc::UpdateGameData { .. } => RpcId::UpdateGameData,
        Rpc::Unknown { id, .. } => return *id,
    };
    id.into()
}

/// Write `[rpc id][arguments]`.
pub fn encode_rpc(w: &mut Writer, rpc: &Rpc) -> CodecResult<()> {
    w.u8(rpc_id(rpc));

    match rpc {
        Rpc::PlayAnimation { animation } => {
            w.u8(*animation);
        }
        Rpc::CompleteTask { task } => {
            w.u8(*task);
        }
        Rpc::SyncSettings { options } => options.encode(w),
        Rpc::SetInfected { impostors } => write_byte_list(w, impostors),
        Rpc::Exiled | Rpc::Close | Rpc::ClearVote => {}
        Rpc::CheckName { name } | Rpc::SetName { name } => {
            w.string(name);
        }
        Rpc::CheckColour { colour } | Rpc::SetColour { colour } => {
            w.u8((*colour).into());
        }
        Rpc::SetHat { hat } => {
            w.u8(*hat);
        }
        Rpc::SetSkin { skin } => {
            w.u8(*skin);
        }
        Rpc::ReportDeadBody { body } | Rpc::StartMeeting { body } => {
            w.u8(*body);
        }
        Rpc::MurderPlayer { target } => {
            w.packed(*target);
        }
        Rpc::SendChat { text } => {
            w.string(text);
        }
        Rpc::SetScanner { scanning, sequence } => {
            w.bool(*scanning).u8(*sequence);
        }
        Rpc::SendChatNote { player, note } => {
            w.u8(*player).u8(*note);
        }
        Rpc::SetPet { pet } => {
            w.u8(*pet);
        }
        Rpc::SetStartCounter { sequence, seconds } => {
            w.packed(*sequence).i8(*seconds);
        }
        Rpc::EnterVent { vent } | Rpc::ExitVent { vent } => {
            w.packed(*vent);
        }
        Rpc::SnapTo { x, y } => {
            w.u16_le(position_to_u16(*x)).u16_le(position_to_u16(*y));
        }
        Rpc::VotingComplete {
            states,
            exiled,
            tie,
        } => {
            write_byte_list(w, states);
            w.u8(*exiled).bool(*tie);
        }
        Rpc::CastVote { voter, suspect } => {
            w.u8(*voter).u8(*suspect);
        }
        Rpc::AddVote { target } => {
            w.u8(*target);
        }
        Rpc::CloseDoorsOfType { system } => {
            w.u8((*system).into());
        }
        Rpc::RepairSystem {
            system,
            handler,
            amount,
        } => {
            w.u8((*system).into()).packed(*handler).u8(*amount);
        }
        Rpc::SetTasks { player, tasks } => {
            w.u8(*player);
            write_byte_list(w, tasks);
        }
        Rpc::UpdateGameData { players } => {
            for player in players {
                let mark = w.begin_frame(player.player_id);
                player.encode_fields(w)?;
                w.end_frame(mark)?;
            }
        }
        Rpc::Unknown { body, .. } => {
            w.bytes(body);
        }
    }

    Ok(())
}
