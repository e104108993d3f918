#![warn(missing_docs)]
//! Session layer: joining, hosting and searching games, and mirroring a lobby.
//!
//! [`Client`] drives one connection and feeds every inbound packet to its
//! [`Game`](auproxy_game::Game). [`LobbyMirror`] builds on it to watch a public
//! lobby from outside, re-joining when the game ends or the host leaves.

pub mod client;
pub mod mirror;

pub use client::{Client, ClientConfig, JoinError, ONLINE_SCENE};
pub use mirror::{LobbyMirror, LobbyState, MirrorConfig, MirrorEvent};
