#![warn(missing_docs)]
//! Client-side model of a lobby: spawned objects, their components, the ship's
//! sub-systems, and the events raised while applying server traffic.
//!
//! [`Game`] consumes decoded client-bound payloads. Object traffic goes through
//! the [`Registry`], which maps netids to component state. Outbound traffic is
//! built with the functions in [`actions`].

pub mod actions;
pub mod components;
pub mod events;
pub mod game;
pub mod registry;
pub mod systems;

pub use actions::{ActionError, ActionResult};
pub use components::{ComponentKind, ComponentState, Vector2};
pub use events::{EventQueue, GameEvent, VoteOutcome};
pub use game::{ClientState, Game, GameSnapshot, Visibility};
pub use registry::{Component, GameObject, ObjectId, Parent, Registry, RegistryError};
