pub mod cursor;
pub mod memory;
pub mod remote;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use parlor_types::Document;

pub use cursor::{Cursor, CursorError};
pub use memory::MemoryStore;
pub use remote::{RemoteConfig, RemoteStore};

/// Sort direction for ordered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// One page of an ordered query.
#[derive(Debug, Clone)]
pub struct Page {
    pub documents: Vec<Document>,
    /// Position to resume from. `None` when the page came back empty,
    /// because there is nothing to resume after.
    pub next_cursor: Option<Cursor>,
}

/// What happened to a document in a subscribed collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// A change the store pushed to a live subscription.
#[derive(Debug, Clone)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    pub document: Document,
}

/// Live feed of [`DocumentChange`]s. Dropping it tears the subscription
/// down (broadcast receiver or WebSocket task, depending on the store).
pub type ChangeStream = Pin<Box<dyn Stream<Item = DocumentChange> + Send>>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached, or the call died in transit.
    /// Never folded into an empty result, so callers can tell "network
    /// down" apart from "no more data".
    #[error("transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A unique-field insert collided with an existing document.
    #[error("a document with this {field} already exists")]
    Conflict { field: String },

    /// The store answered, but with something we could not decode.
    #[error("malformed store response: {0}")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The cursor was not minted by this store, or got corrupted.
    #[error(transparent)]
    BadCursor(#[from] CursorError),
}

impl StoreError {
    pub fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Transport(err.into())
    }

    pub fn decode(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Decode(err.into())
    }
}

/// The hosted document service the chat client is built against.
///
/// Four capabilities cover everything the client needs: inserts (plain,
/// or with a unique field the store enforces atomically), backward
/// pagination over an ordered field, equality lookup, and a live change
/// feed. [`MemoryStore`] implements it in-process for tests and local
/// runs; [`RemoteStore`] talks to the hosted service over HTTP and a
/// WebSocket gateway.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document; the store assigns and returns its id.
    async fn insert(&self, collection: &str, fields: Value) -> Result<String, StoreError>;

    /// Insert a document, failing with [`StoreError::Conflict`] when
    /// another document in the collection already holds the same value in
    /// `unique_field`. Check and insert are one atomic step on the store
    /// side, so two clients racing on the same value cannot both win.
    async fn insert_unique(
        &self,
        collection: &str,
        unique_field: &str,
        fields: Value,
    ) -> Result<String, StoreError>;

    /// Up to `limit` documents ordered by `order_field`, resuming
    /// strictly after `after` when one is given.
    async fn query_ordered(
        &self,
        collection: &str,
        order_field: &str,
        direction: Direction,
        limit: usize,
        after: Option<&Cursor>,
    ) -> Result<Page, StoreError>;

    /// All documents whose `field` equals `value`, oldest insert first.
    async fn query_equals(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError>;

    /// Change feed for `collection`, starting from now. Additions are
    /// delivered once each, in the order the store saw them; a remote
    /// reconnect may replay recent additions, which consumers are
    /// expected to deduplicate by id.
    async fn subscribe(&self, collection: &str) -> Result<ChangeStream, StoreError>;
}
