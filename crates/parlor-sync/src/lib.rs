//! Keeps a local copy of the room's messages in step with the store.
//!
//! The moving parts: a pure [`Timeline`] reducer that folds history pages
//! and live additions into one newest-first list, and an engine task
//! ([`spawn`]) that owns the reducer state, drives page fetches and the
//! change feed, and publishes snapshots on a watch channel.

pub mod engine;
pub mod timeline;

pub use engine::{spawn, SyncHandle};
pub use timeline::{Timeline, TimelineEvent, PAGE_SIZE};
