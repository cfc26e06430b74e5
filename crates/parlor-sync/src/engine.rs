use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use parlor_store::{ChangeKind, ChangeStream, Cursor, Direction, DocumentStore, Page, StoreError};
use parlor_types::{collections, Message, CREATED_AT_FIELD};

use crate::timeline::{Timeline, TimelineEvent, PAGE_SIZE};

/// Queue depth for merged feed + fetch events.
const EVENT_BUFFER: usize = 256;

enum Command {
    LoadOlder,
    PushLocal(Message),
    Shutdown,
}

/// Start the sync engine for the shared room.
///
/// One task owns the [`Timeline`]; the live change feed and page fetches
/// both funnel into it as events, so every merge runs against the latest
/// state. The first history page is requested immediately. Snapshots go
/// out on a watch channel after each change.
pub async fn spawn(store: Arc<dyn DocumentStore>) -> Result<SyncHandle, StoreError> {
    let changes = store.subscribe(collections::MESSAGES).await?;

    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let (commands_tx, commands_rx) = mpsc::channel(16);
    let (snapshots_tx, snapshots_rx) = watch::channel(Timeline::default());

    let pump = tokio::spawn(pump_changes(changes, events_tx.clone()));
    let task = tokio::spawn(run(store, commands_rx, events_rx, events_tx, snapshots_tx, pump));

    Ok(SyncHandle { commands: commands_tx, snapshots: snapshots_rx, task })
}

/// Handle to a running engine.
///
/// Dropping it stops the engine and the subscription behind it;
/// [`shutdown`](SyncHandle::shutdown) does the same but waits for the
/// task to finish.
pub struct SyncHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Timeline>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Channel of timeline snapshots, one per change.
    pub fn snapshots(&self) -> watch::Receiver<Timeline> {
        self.snapshots.clone()
    }

    /// The timeline as of now.
    pub fn snapshot(&self) -> Timeline {
        self.snapshots.borrow().clone()
    }

    /// Ask for the next page of history. Ignored while a fetch is
    /// already in flight or once history is exhausted.
    pub async fn load_older(&self) {
        let _ = self.commands.send(Command::LoadOlder).await;
    }

    /// Merge a message this client just sent, ahead of its echo on the
    /// live feed.
    pub async fn push_local(&self, message: Message) {
        let _ = self.commands.send(Command::PushLocal(message)).await;
    }

    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown).await;
        let _ = self.task.await;
    }
}

async fn run(
    store: Arc<dyn DocumentStore>,
    mut commands: mpsc::Receiver<Command>,
    mut events: mpsc::Receiver<TimelineEvent>,
    events_tx: mpsc::Sender<TimelineEvent>,
    snapshots: watch::Sender<Timeline>,
    pump: JoinHandle<()>,
) {
    let mut timeline = Timeline::default();
    let mut fetch_in_flight = true;
    spawn_fetch(store.clone(), None, events_tx.clone());

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                if matches!(event, TimelineEvent::PageLoaded { .. } | TimelineEvent::PageFailed(_)) {
                    fetch_in_flight = false;
                }
                timeline = timeline.apply(event);
                let _ = snapshots.send(timeline.clone());
            }
            command = commands.recv() => match command {
                Some(Command::LoadOlder) => {
                    if fetch_in_flight || timeline.reached_end() {
                        debug!(
                            "ignoring load_older: in_flight={} reached_end={}",
                            fetch_in_flight,
                            timeline.reached_end()
                        );
                    } else {
                        fetch_in_flight = true;
                        spawn_fetch(store.clone(), timeline.next_cursor().cloned(), events_tx.clone());
                    }
                }
                Some(Command::PushLocal(message)) => {
                    timeline = timeline.apply(TimelineEvent::MessageAdded(message));
                    let _ = snapshots.send(timeline.clone());
                }
                Some(Command::Shutdown) | None => break,
            },
        }
    }

    pump.abort();
    debug!("sync engine stopped");
}

/// Fetch one page without holding up the loop; the outcome comes back as
/// an event like everything else.
fn spawn_fetch(
    store: Arc<dyn DocumentStore>,
    after: Option<Cursor>,
    events: mpsc::Sender<TimelineEvent>,
) {
    tokio::spawn(async move {
        let result = store
            .query_ordered(
                collections::MESSAGES,
                CREATED_AT_FIELD,
                Direction::Descending,
                PAGE_SIZE,
                after.as_ref(),
            )
            .await;
        let event = match result {
            Ok(page) => page_event(page),
            Err(e) => {
                warn!("history fetch failed: {}", e);
                TimelineEvent::PageFailed(e.to_string())
            }
        };
        let _ = events.send(event).await;
    });
}

fn page_event(page: Page) -> TimelineEvent {
    let fetched = page.documents.len();
    let mut messages = Vec::with_capacity(fetched);
    for doc in &page.documents {
        match Message::from_document(doc) {
            Ok(message) => messages.push(message),
            Err(e) => warn!("skipping malformed history document: {}", e),
        }
    }
    TimelineEvent::PageLoaded { messages, fetched, next_cursor: page.next_cursor }
}

/// Relays additions from the change feed into the event queue. Messages
/// never change or disappear in the room, so the other change kinds are
/// skipped.
async fn pump_changes(mut changes: ChangeStream, events: mpsc::Sender<TimelineEvent>) {
    while let Some(change) = changes.next().await {
        if change.kind != ChangeKind::Added {
            continue;
        }
        match Message::from_document(&change.document) {
            Ok(message) => {
                if events.send(TimelineEvent::MessageAdded(message)).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("skipping malformed live document: {}", e),
        }
    }
    debug!("change feed ended");
}
