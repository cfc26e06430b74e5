//! Client-side glue for the room: the identity gate, local profile
//! persistence, and message submission on top of the sync engine.

pub mod client;
pub mod identity;
pub mod profile;

pub use client::{ChatClient, RoomSession, SendError};
pub use identity::{IdentityError, IdentityGate, RegisterOutcome};
pub use profile::{ProfileStore, DISPLAY_NAME_KEY};
