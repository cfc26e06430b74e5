use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use parlor_store::{DocumentStore, StoreError};
use parlor_sync::{SyncHandle, Timeline};
use parlor_types::{collections, Draft, DraftError, Message};

use crate::identity::{IdentityError, IdentityGate, RegisterOutcome};
use crate::profile::ProfileStore;

#[derive(Debug, Error)]
pub enum SendError {
    /// The input failed validation; nothing was sent.
    #[error(transparent)]
    Draft(#[from] DraftError),

    /// The store rejected or never received the message. The timeline is
    /// untouched in this case.
    #[error("message was not stored: {0}")]
    Store(#[from] StoreError),
}

/// Everything the front needs, wired together: the identity gate up
/// front, then a [`RoomSession`] for syncing and sending.
pub struct ChatClient {
    store: Arc<dyn DocumentStore>,
    gate: IdentityGate,
}

impl ChatClient {
    pub fn new(store: Arc<dyn DocumentStore>, profile: Arc<ProfileStore>) -> Self {
        let gate = IdentityGate::new(store.clone(), profile);
        Self { store, gate }
    }

    /// See [`IdentityGate::ensure_identity`].
    pub async fn ensure_identity(&self) -> Result<Option<String>, IdentityError> {
        self.gate.ensure_identity().await
    }

    /// See [`IdentityGate::register_name`].
    pub async fn register_name(&self, candidate: &str) -> Result<RegisterOutcome, IdentityError> {
        self.gate.register_name(candidate).await
    }

    /// Enter the room as `author_name`: starts the sync engine and hands
    /// back the running session. Callers go through the identity gate
    /// first; the name passed here is the registered one.
    pub async fn join(&self, author_name: String) -> Result<RoomSession, StoreError> {
        let sync = parlor_sync::spawn(self.store.clone()).await?;
        debug!("'{}' joined the room", author_name);
        Ok(RoomSession {
            author_name,
            store: self.store.clone(),
            sync,
        })
    }
}

/// A live presence in the room: the synced timeline plus the ability to
/// send as the registered name.
pub struct RoomSession {
    author_name: String,
    store: Arc<dyn DocumentStore>,
    sync: SyncHandle,
}

impl RoomSession {
    pub fn author_name(&self) -> &str {
        &self.author_name
    }

    /// Channel of timeline snapshots, one per change.
    pub fn snapshots(&self) -> watch::Receiver<Timeline> {
        self.sync.snapshots()
    }

    /// The timeline as of now.
    pub fn snapshot(&self) -> Timeline {
        self.sync.snapshot()
    }

    /// Ask the engine for the next page of history.
    pub async fn load_older(&self) {
        self.sync.load_older().await;
    }

    /// Validate, store, and locally merge one message.
    ///
    /// The returned message carries the id the store assigned. It is
    /// pushed into the timeline right away rather than waiting for the
    /// feed echo; the echo dedups against it. If the store says no, the
    /// timeline stays as it was.
    pub async fn send(&self, raw: &str) -> Result<Message, SendError> {
        let draft = Draft::new(raw, &self.author_name)?;
        let id = self.store.insert(collections::MESSAGES, draft.to_fields()).await?;
        let message = draft.into_message(id);
        self.sync.push_local(message.clone()).await;
        debug!("sent message {}", message.id);
        Ok(message)
    }

    /// Leave the room: stops the engine and closes the subscription.
    /// Dropping the session does the same without waiting.
    pub async fn leave(self) {
        self.sync.shutdown().await;
    }
}
