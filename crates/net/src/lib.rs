#![warn(missing_docs)]
//! Wire protocol and reliable UDP transport for the game server.
//!
//! Layers, bottom-up:
//! - [`buffer`]: byte cursors with packed integers and length-prefixed frames;
//! - [`protocol`] and [`options`]: the structured packet types;
//! - [`codec`] and [`rpc`]: bytes to packets and back, per direction;
//! - [`transport`] and [`connection`]: nonces, acknowledgments, retransmission.

pub mod buffer;
pub mod codec;
pub mod connection;
pub mod options;
pub mod protocol;
pub mod rpc;
pub mod servers;
pub mod transport;

pub use buffer::{CodecError, CodecResult, Reader, Writer};
pub use codec::{decode_packet, encode_packet, DEFAULT_CLIENT_VERSION, HAZEL_VERSION};
pub use connection::{Connection, ConnectionConfig, ConnectionState, Inbound, SendOutcome};
pub use options::GameOptions;
pub use protocol::{
    Bound, GameListing, MapCounts, MasterServer, Opcode, Packet, Part, PartType, Payload,
    PayloadId, PlayerData, PlayerFlags, Rpc, RpcId, SpawnComponent, TaskState, EMERGENCY,
};
pub use servers::Region;
