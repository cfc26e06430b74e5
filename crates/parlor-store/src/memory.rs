use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use parlor_types::Document;

use crate::cursor::{Cursor, Position};
use crate::{ChangeKind, ChangeStream, Direction, DocumentChange, DocumentStore, Page, StoreError};

/// Buffered changes per collection before a slow subscriber starts
/// losing events (it is warned when that happens).
const CHANGE_BUFFER: usize = 1024;

/// In-process [`DocumentStore`] with the same observable behavior as the
/// hosted service: ordered queries with resume cursors, atomic
/// unique-field inserts, and a broadcast feed of additions. Backs the
/// test suites and local runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    collections: HashMap<String, CollectionState>,
    next_seq: u64,
}

struct CollectionState {
    docs: Vec<StoredDoc>,
    changes: broadcast::Sender<DocumentChange>,
}

impl CollectionState {
    fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self { docs: Vec::new(), changes }
    }
}

#[derive(Clone)]
struct StoredDoc {
    seq: u64,
    doc: Document,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> Result<T, StoreError> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| StoreError::transport("memory store lock poisoned"))?;
        Ok(f(&mut state))
    }
}

fn insert_locked(state: &mut State, collection: &str, fields: Value) -> String {
    let seq = state.next_seq;
    state.next_seq += 1;

    let entry = state
        .collections
        .entry(collection.to_string())
        .or_insert_with(CollectionState::new);

    let id = Uuid::new_v4().to_string();
    let doc = Document { id: id.clone(), fields };
    entry.docs.push(StoredDoc { seq, doc: doc.clone() });

    // Publish while still holding the lock so subscribers see additions
    // in insertion order.
    let _ = entry.changes.send(DocumentChange { kind: ChangeKind::Added, document: doc });

    id
}

/// How order-field values compare: as instants when the value parses as
/// RFC 3339, as text otherwise. Documents missing the field sort before
/// everything that has it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum OrderKey {
    Missing,
    Text(String),
    Time(DateTime<Utc>),
}

fn key_of(value: Option<&Value>) -> OrderKey {
    match value {
        None | Some(Value::Null) => OrderKey::Missing,
        Some(Value::String(s)) => match DateTime::parse_from_rfc3339(s) {
            Ok(t) => OrderKey::Time(t.with_timezone(&Utc)),
            Err(_) => OrderKey::Text(s.clone()),
        },
        Some(other) => OrderKey::Text(other.to_string()),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, fields: Value) -> Result<String, StoreError> {
        self.with_state(|state| insert_locked(state, collection, fields))
    }

    /// Check and insert happen under one lock acquisition, so two racing
    /// registrations of the same value cannot both succeed.
    async fn insert_unique(
        &self,
        collection: &str,
        unique_field: &str,
        fields: Value,
    ) -> Result<String, StoreError> {
        self.with_state(|state| {
            let taken = state
                .collections
                .get(collection)
                .map(|entry| match fields.get(unique_field) {
                    Some(value) => entry
                        .docs
                        .iter()
                        .any(|d| d.doc.fields.get(unique_field) == Some(value)),
                    None => false,
                })
                .unwrap_or(false);

            if taken {
                return Err(StoreError::Conflict { field: unique_field.to_string() });
            }
            Ok(insert_locked(state, collection, fields))
        })?
    }

    async fn query_ordered(
        &self,
        collection: &str,
        order_field: &str,
        direction: Direction,
        limit: usize,
        after: Option<&Cursor>,
    ) -> Result<Page, StoreError> {
        let position = after.map(Position::decode).transpose()?;

        let snapshot = self.with_state(|state| {
            state
                .collections
                .get(collection)
                .map(|c| c.docs.clone())
                .unwrap_or_default()
        })?;

        let mut rows: Vec<(OrderKey, u64, Document)> = snapshot
            .into_iter()
            .map(|stored| {
                let key = key_of(stored.doc.fields.get(order_field));
                (key, stored.seq, stored.doc)
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        if direction == Direction::Descending {
            rows.reverse();
        }

        let is_after = |key: &OrderKey, seq: u64| -> bool {
            let Some(position) = &position else { return true };
            let anchor = key_of(Some(&position.last));
            let ord = key.cmp(&anchor).then(seq.cmp(&position.seq));
            match direction {
                Direction::Descending => ord == Ordering::Less,
                Direction::Ascending => ord == Ordering::Greater,
            }
        };

        let mut documents = Vec::new();
        let mut last_position = None;
        for (key, seq, doc) in rows {
            if documents.len() == limit {
                break;
            }
            if !is_after(&key, seq) {
                continue;
            }
            last_position = Some(Position {
                last: doc.fields.get(order_field).cloned().unwrap_or(Value::Null),
                seq,
            });
            documents.push(doc);
        }

        let next_cursor = last_position.map(|p| p.encode());
        Ok(Page { documents, next_cursor })
    }

    async fn query_equals(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        self.with_state(|state| {
            state
                .collections
                .get(collection)
                .map(|c| {
                    c.docs
                        .iter()
                        .filter(|d| d.doc.fields.get(field) == Some(value))
                        .map(|d| d.doc.clone())
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    async fn subscribe(&self, collection: &str) -> Result<ChangeStream, StoreError> {
        let mut rx = self.with_state(|state| {
            state
                .collections
                .entry(collection.to_string())
                .or_insert_with(CollectionState::new)
                .changes
                .subscribe()
        })?;

        let collection = collection.to_string();
        Ok(Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(change) => yield change,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("subscriber on '{}' lagged by {} changes", collection, n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }
}
