//! Packet framing.
//!
//! Frame format: `[opcode: u8][nonce: u16 BE, acked types only][body]`.
//! Reliable/Unreliable bodies are a run of `[len: u16 LE][id: u8][len bytes]`
//! payload frames, and GameData payloads hold a run of part frames with the
//! same shape. An unknown tag at any level becomes an `Unknown` variant holding
//! the frame's bytes; the cursor always moves to the declared frame end.

use crate::buffer::{CodecError, CodecResult, Reader, Writer};
use crate::options::GameOptions;
use crate::protocol::{
    Bound, GameListing, MapCounts, MasterServer, Opcode, Packet, Part, PartType, Payload,
    PayloadId, Rpc, SpawnComponent,
};
use crate::rpc::{decode_rpc, encode_rpc};
use auproxy_core::{AlterGameTag, DisconnectReason, GameEndReason, GameListTag, MapId};
use std::net::Ipv4Addr;
use tracing::warn;

/// Hazel transport version sent in Hello.
pub const HAZEL_VERSION: u8 = 0;

/// Client version sent in Hello unless configured otherwise.
pub const DEFAULT_CLIENT_VERSION: i32 = 0x4ae2_0203;

/// Trailing byte of every Acknowledge.
const ACK_TRAILER: u8 = 0xFF;

/// JoinGame body lengths that mean "a player joined" rather than an error.
const PLAYER_JOINED_LENGTHS: [usize; 2] = [12, 18];

/// Decode one datagram.
pub fn decode_packet(data: &[u8], bound: Bound) -> CodecResult<Packet> {
    let mut r = Reader::new(data);
    let opcode = r.u8()?;

    let op = match Opcode::try_from(opcode) {
        Ok(op) => op,
        Err(_) => {
            return Ok(Packet::Unknown {
                opcode,
                body: r.rest().to_vec(),
            })
        }
    };

    let packet = match op {
        Opcode::Unreliable => Packet::Unreliable {
            payloads: decode_payloads(&mut r, bound)?,
        },
        Opcode::Reliable => {
            let nonce = r.u16_be()?;
            Packet::Reliable {
                nonce,
                payloads: decode_payloads(&mut r, bound)?,
            }
        }
        Opcode::Hello => Packet::Hello {
            nonce: r.u16_be()?,
            hazel_version: r.u8()?,
            client_version: r.i32_be()?,
            username: r.string()?,
        },
        Opcode::Disconnect => {
            let (reason, message) = decode_disconnect_body(&mut r)?;
            Packet::Disconnect { reason, message }
        }
        Opcode::Acknowledge => {
            let nonce = r.u16_be()?;
            // Trailer is optional on receive.
            r.rest();
            Packet::Acknowledge { nonce }
        }
        Opcode::Ping => Packet::Ping { nonce: r.u16_be()? },
    };

    Ok(packet)
}

/// Encode one datagram.
pub fn encode_packet(packet: &Packet, bound: Bound) -> CodecResult<Vec<u8>> {
    let mut w = Writer::new();

    match packet {
        Packet::Unreliable { payloads } => {
            w.u8(Opcode::Unreliable.into());
            encode_payloads(&mut w, payloads, bound)?;
        }
        Packet::Reliable { nonce, payloads } => {
            w.u8(Opcode::Reliable.into()).u16_be(*nonce);
            encode_payloads(&mut w, payloads, bound)?;
        }
        Packet::Hello {
            nonce,
            hazel_version,
            client_version,
            username,
        } => {
            w.u8(Opcode::Hello.into())
                .u16_be(*nonce)
                .u8(*hazel_version)
                .i32_be(*client_version)
                .string(username);
        }
        Packet::Disconnect { reason, message } => {
            w.u8(Opcode::Disconnect.into());
            // Only the server attaches a reason.
            if let (Bound::Client, Some(reason)) = (bound, reason) {
                w.bool(true);
                let mark = w.begin_frame(0);
                encode_reason(&mut w, *reason, message.as_deref());
                w.end_frame(mark)?;
            }
        }
        Packet::Acknowledge { nonce } => {
            w.u8(Opcode::Acknowledge.into())
                .u16_be(*nonce)
                .u8(ACK_TRAILER);
        }
        Packet::Ping { nonce } => {
            w.u8(Opcode::Ping.into()).u16_be(*nonce);
        }
        Packet::Unknown { opcode, body } => {
            w.u8(*opcode).bytes(body);
        }
    }

    Ok(w.into_inner())
}

fn decode_disconnect_body(
    r: &mut Reader<'_>,
) -> CodecResult<(Option<DisconnectReason>, Option<String>)> {
    if r.is_empty() {
        return Ok((None, None));
    }
    let _forced = r.bool()?;
    if r.remaining() < 3 {
        return Ok((None, None));
    }
    let (_tag, mut body) = r.frame()?;
    decode_reason(&mut body)
}

/// Optional `[reason: u8][message: string if Custom]`.
fn decode_reason(r: &mut Reader<'_>) -> CodecResult<(Option<DisconnectReason>, Option<String>)> {
    if r.is_empty() {
        return Ok((None, None));
    }
    let reason = DisconnectReason::from(r.u8()?);
    let message = if reason == DisconnectReason::Custom && !r.is_empty() {
        Some(r.string()?)
    } else {
        None
    };
    Ok((Some(reason), message))
}

fn encode_reason(w: &mut Writer, reason: DisconnectReason, message: Option<&str>) {
    w.u8(reason.code());
    if reason == DisconnectReason::Custom {
        w.string(message.unwrap_or_default());
    }
}

fn decode_payloads(r: &mut Reader<'_>, bound: Bound) -> CodecResult<Vec<Payload>> {
    let mut payloads = Vec::new();
    while !r.is_empty() {
        let (id, mut body) = r.frame()?;
        payloads.push(decode_payload(id, &mut body, bound)?);
    }
    Ok(payloads)
}

fn encode_payloads(w: &mut Writer, payloads: &[Payload], bound: Bound) -> CodecResult<()> {
    for payload in payloads {
        let mark = w.begin_frame(payload.id());
        encode_payload(w, payload, bound)?;
        w.end_frame(mark)?;
    }
    Ok(())
}

fn ipv4(r: &mut Reader<'_>) -> CodecResult<Ipv4Addr> {
    let b = r.bytes(4)?;
    Ok(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
}

/// Decode one payload body. `r` is bounded to the payload frame.
pub fn decode_payload(id: u8, r: &mut Reader<'_>, bound: Bound) -> CodecResult<Payload> {
    let Ok(kind) = PayloadId::try_from(id) else {
        return Ok(Payload::Unknown {
            id,
            body: r.rest().to_vec(),
        });
    };

    let payload = match (kind, bound) {
        (PayloadId::HostGame, Bound::Server) => Payload::HostGame {
            options: GameOptions::decode(r)?,
        },
        (PayloadId::HostGame, Bound::Client) => Payload::GameCreated { code: r.i32_le()? },
        (PayloadId::JoinGame, Bound::Server) => Payload::JoinGame {
            code: r.i32_le()?,
            map_ownership: r.u8()?,
        },
        (PayloadId::JoinGame, Bound::Client) => {
            if PLAYER_JOINED_LENGTHS.contains(&r.remaining()) {
                Payload::PlayerJoined {
                    code: r.i32_le()?,
                    client_id: r.u32_le()?,
                    host_id: r.u32_le()?,
                }
            } else {
                let (reason, message) = decode_reason(r)?;
                Payload::JoinGameError {
                    reason: reason.unwrap_or(DisconnectReason::None),
                    message,
                }
            }
        }
        (PayloadId::StartGame, _) => Payload::StartGame { code: r.i32_le()? },
        (PayloadId::RemoveGame, _) => Payload::RemoveGame,
        (PayloadId::RemovePlayer, _) => {
            let code = r.i32_le()?;
            let client_id = r.u32_le()?;
            let host_id = r.u32_le()?;
            let (reason, message) = decode_reason(r)?;
            Payload::RemovePlayer {
                code,
                client_id,
                host_id,
                reason,
                message,
            }
        }
        (PayloadId::GameData, _) => Payload::GameData {
            code: r.i32_le()?,
            parts: decode_parts(r)?,
        },
        (PayloadId::GameDataTo, _) => Payload::GameDataTo {
            code: r.i32_le()?,
            recipient: r.packed()?,
            parts: decode_parts(r)?,
        },
        (PayloadId::JoinedGame, _) => {
            let code = r.i32_le()?;
            let client_id = r.u32_le()?;
            let host_id = r.u32_le()?;
            let count = r.packed()?;
            let mut clients = Vec::new();
            for _ in 0..count {
                clients.push(r.packed()?);
            }
            Payload::JoinedGame {
                code,
                client_id,
                host_id,
                clients,
            }
        }
        (PayloadId::EndGame, _) => Payload::EndGame {
            code: r.i32_le()?,
            reason: GameEndReason::try_from(r.u8()?)?,
            show_ad: r.bool()?,
        },
        (PayloadId::AlterGame, _) => Payload::AlterGame {
            code: r.i32_le()?,
            tag: AlterGameTag::try_from(r.u8()?)?,
            is_public: r.bool()?,
        },
        (PayloadId::KickPlayer, Bound::Server) => Payload::KickPlayer {
            client_id: r.packed()?,
            banned: r.bool()?,
        },
        (PayloadId::KickPlayer, Bound::Client) => Payload::PlayerKicked {
            code: r.i32_le()?,
            client_id: r.packed()?,
            banned: r.bool()?,
        },
        (PayloadId::WaitForHost, _) => Payload::WaitForHost {
            code: r.i32_le()?,
            client_id: r.u32_le()?,
        },
        (PayloadId::Redirect, _) => Payload::Redirect {
            ip: ipv4(r)?,
            port: r.u16_le()?,
        },
        (PayloadId::MasterServerList, _) => {
            let _list_flag = r.u8()?;
            let count = r.u8()?;
            let mut servers = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (flag, mut s) = r.frame()?;
                servers.push(MasterServer {
                    flag,
                    name: s.string()?,
                    ip: ipv4(&mut s)?,
                    port: s.u16_le()?,
                    players: s.packed()?,
                });
            }
            Payload::MasterServerList { servers }
        }
        (PayloadId::GetGameListV2, Bound::Server) => {
            let _include_private = r.u8()?;
            Payload::SearchGames {
                options: GameOptions::decode(r)?,
            }
        }
        (PayloadId::GetGameListV2, Bound::Client) => decode_game_list(r)?,
        (PayloadId::GetGameList, _) => Payload::Unknown {
            id,
            body: r.rest().to_vec(),
        },
    };

    Ok(payload)
}

fn decode_game_list(r: &mut Reader<'_>) -> CodecResult<Payload> {
    let mut games = Vec::new();
    let mut counts = None;
    while !r.is_empty() {
        let (tag, mut section) = r.frame()?;
        match GameListTag::try_from(tag) {
            Ok(GameListTag::List) => {
                while !section.is_empty() {
                    let (_, mut g) = section.frame()?;
                    games.push(GameListing {
                        ip: ipv4(&mut g)?,
                        port: g.u16_le()?,
                        code: g.i32_le()?,
                        name: g.string()?,
                        players: g.u8()?,
                        age: g.packed()?,
                        map: MapId::try_from(g.u8()?)?,
                        impostors: g.u8()?,
                        max_players: g.u8()?,
                    });
                }
            }
            Ok(GameListTag::Count) => {
                counts = Some(MapCounts {
                    skeld: section.u32_le()?,
                    mira_hq: section.u32_le()?,
                    polus: section.u32_le()?,
                });
            }
            Err(_) => {}
        }
    }
    Ok(Payload::GameList { games, counts })
}

/// Direction a payload variant is limited to, if any.
fn payload_bound(payload: &Payload) -> Option<Bound> {
    match payload {
        Payload::HostGame { .. }
        | Payload::JoinGame { .. }
        | Payload::KickPlayer { .. }
        | Payload::SearchGames { .. } => Some(Bound::Server),
        Payload::GameCreated { .. }
        | Payload::PlayerJoined { .. }
        | Payload::JoinGameError { .. }
        | Payload::PlayerKicked { .. }
        | Payload::GameList { .. } => Some(Bound::Client),
        _ => None,
    }
}

fn encode_payload(w: &mut Writer, payload: &Payload, bound: Bound) -> CodecResult<()> {
    if payload_bound(payload).is_some_and(|only| only != bound) {
        return Err(CodecError::WrongDirection {
            id: payload.id(),
            bound: bound.as_str(),
        });
    }

    match payload {
        Payload::HostGame { options } => options.encode(w),
        Payload::GameCreated { code } | Payload::StartGame { code } => {
            w.i32_le(*code);
        }
        Payload::JoinGame {
            code,
            map_ownership,
        } => {
            w.i32_le(*code).u8(*map_ownership);
        }
        Payload::PlayerJoined {
            code,
            client_id,
            host_id,
        } => {
            w.i32_le(*code).u32_le(*client_id).u32_le(*host_id);
        }
        Payload::JoinGameError { reason, message } => {
            encode_reason(w, *reason, message.as_deref());
        }
        Payload::RemoveGame => {}
        Payload::RemovePlayer {
            code,
            client_id,
            host_id,
            reason,
            message,
        } => {
            w.i32_le(*code).u32_le(*client_id).u32_le(*host_id);
            if let Some(reason) = reason {
                encode_reason(w, *reason, message.as_deref());
            }
        }
        Payload::GameData { code, parts } => {
            w.i32_le(*code);
            encode_parts(w, parts)?;
        }
        Payload::GameDataTo {
            code,
            recipient,
            parts,
        } => {
            w.i32_le(*code).packed(*recipient);
            encode_parts(w, parts)?;
        }
        Payload::JoinedGame {
            code,
            client_id,
            host_id,
            clients,
        } => {
            w.i32_le(*code)
                .u32_le(*client_id)
                .u32_le(*host_id)
                .packed(clients.len() as u32);
            for client in clients {
                w.packed(*client);
            }
        }
        Payload::EndGame {
            code,
            reason,
            show_ad,
        } => {
            w.i32_le(*code).u8((*reason).into()).bool(*show_ad);
        }
        Payload::AlterGame {
            code,
            tag,
            is_public,
        } => {
            w.i32_le(*code).u8((*tag).into()).bool(*is_public);
        }
        Payload::KickPlayer { client_id, banned } => {
            w.packed(*client_id).bool(*banned);
        }
        Payload::PlayerKicked {
            code,
            client_id,
            banned,
        } => {
            w.i32_le(*code).packed(*client_id).bool(*banned);
        }
        Payload::WaitForHost { code, client_id } => {
            w.i32_le(*code).u32_le(*client_id);
        }
        Payload::Redirect { ip, port } => {
            w.bytes(&ip.octets()).u16_le(*port);
        }
        Payload::MasterServerList { servers } => {
            let count = u8::try_from(servers.len())
                .map_err(|_| CodecError::ListTooLong { len: servers.len() })?;
            w.u8(0x01).u8(count);
            for server in servers {
                let mark = w.begin_frame(server.flag);
                w.string(&server.name)
                    .bytes(&server.ip.octets())
                    .u16_le(server.port)
                    .packed(server.players);
                w.end_frame(mark)?;
            }
        }
        Payload::SearchGames { options } => {
            w.u8(0x00);
            options.encode(w);
        }
        Payload::GameList { games, counts } => {
            if let Some(counts) = counts {
                let mark = w.begin_frame(GameListTag::Count.into());
                w.u32_le(counts.skeld)
                    .u32_le(counts.mira_hq)
                    .u32_le(counts.polus);
                w.end_frame(mark)?;
            }
            let list = w.begin_frame(GameListTag::List.into());
            for game in games {
                let mark = w.begin_frame(0);
                w.bytes(&game.ip.octets())
                    .u16_le(game.port)
                    .i32_le(game.code)
                    .string(&game.name)
                    .u8(game.players)
                    .packed(game.age)
                    .u8(game.map.into())
                    .u8(game.impostors)
                    .u8(game.max_players);
                w.end_frame(mark)?;
            }
            w.end_frame(list)?;
        }
        Payload::Unknown { body, .. } => {
            w.bytes(body);
        }
    }
    Ok(())
}

/// Decode the parts of a GameData/GameDataTo body.
pub fn decode_parts(r: &mut Reader<'_>) -> CodecResult<Vec<Part>> {
    let mut parts = Vec::new();
    while !r.is_empty() {
        let (tag, mut frame) = r.frame()?;
        let body = frame.rest();
        match decode_part(tag, &mut Reader::new(body)) {
            Ok(part) => parts.push(part),
            Err(e) => {
                warn!("Keeping malformed part {:#04x} raw: {}", tag, e);
                parts.push(Part::Unknown {
                    tag,
                    body: body.to_vec(),
                });
            }
        }
    }
    Ok(parts)
}

/// Encode parts as consecutive frames.
pub fn encode_parts(w: &mut Writer, parts: &[Part]) -> CodecResult<()> {
    for part in parts {
        let mark = w.begin_frame(part.tag());
        encode_part(w, part)?;
        w.end_frame(mark)?;
    }
    Ok(())
}

fn decode_part(tag: u8, r: &mut Reader<'_>) -> CodecResult<Part> {
    let Ok(kind) = PartType::try_from(tag) else {
        return Ok(Part::Unknown {
            tag,
            body: r.rest().to_vec(),
        });
    };

    let part = match kind {
        PartType::Data => Part::Data {
            netid: r.packed()?,
            data: r.rest().to_vec(),
        },
        PartType::Rpc => {
            let netid = r.packed()?;
            let id = r.u8()?;
            let args = r.rest();
            let rpc = decode_rpc(id, &mut Reader::new(args)).unwrap_or_else(|e| {
                warn!("Keeping malformed RPC {:#04x} to netid {} raw: {}", id, netid, e);
                Rpc::Unknown {
                    id,
                    body: args.to_vec(),
                }
            });
            Part::Rpc { netid, rpc }
        }
        PartType::Spawn => {
            let spawn_id = r.packed()?;
            let owner = r.packed_i32()?;
            let flags = r.u8()?;
            let count = r.packed()?;
            let mut components = Vec::new();
            for _ in 0..count {
                let netid = r.packed()?;
                let (tag, mut data) = r.frame()?;
                components.push(SpawnComponent {
                    netid,
                    tag,
                    data: data.rest().to_vec(),
                });
            }
            Part::Spawn {
                spawn_id,
                owner,
                flags,
                components,
            }
        }
        PartType::Despawn => Part::Despawn {
            netid: r.packed()?,
        },
        PartType::SceneChange => Part::SceneChange {
            client_id: r.packed()?,
            scene: r.string()?,
        },
        PartType::Ready => Part::Ready {
            client_id: r.packed()?,
        },
        PartType::ChangeSettings => Part::ChangeSettings,
    };

    Ok(part)
}

fn encode_part(w: &mut Writer, part: &Part) -> CodecResult<()> {
    match part {
        Part::Data { netid, data } => {
            w.packed(*netid).bytes(data);
        }
        Part::Rpc { netid, rpc } => {
            w.packed(*netid);
            encode_rpc(w, rpc)?;
        }
        Part::Spawn {
            spawn_id,
            owner,
            flags,
            components,
        } => {
            w.packed(*spawn_id)
                .packed_i32(*owner)
                .u8(*flags)
                .packed(components.len() as u32);
            for component in components {
                w.packed(component.netid);
                let mark = w.begin_frame(component.tag);
                w.bytes(&component.data);
                w.end_frame(mark)?;
            }
        }
        Part::Despawn { netid } => {
            w.packed(*netid);
        }
        Part::SceneChange { client_id, scene } => {
            w.packed(*client_id).string(scene);
        }
        Part::Ready { client_id } => {
            w.packed(*client_id);
        }
        Part::ChangeSettings => {}
        Part::Unknown { body, .. } => {
            w.bytes(body);
        }
    }
    Ok(())
}
