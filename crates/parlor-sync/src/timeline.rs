use std::cmp::Reverse;

use parlor_store::Cursor;
use parlor_types::Message;

/// Messages fetched per history page.
pub const PAGE_SIZE: usize = 25;

/// One thing that happened to the room, in the order the engine saw it.
#[derive(Debug, Clone)]
pub enum TimelineEvent {
    /// A history page came back. `fetched` is the raw document count of
    /// the page, before malformed entries were dropped.
    PageLoaded {
        messages: Vec<Message>,
        fetched: usize,
        next_cursor: Option<Cursor>,
    },
    /// A message arrived on the live feed, or was just sent from here.
    MessageAdded(Message),
    /// A history fetch failed; the messages already merged stay as they
    /// are.
    PageFailed(String),
}

/// The room's messages, newest first, plus what is known about fetching
/// more of them.
///
/// Every change goes through [`apply`](Timeline::apply), which consumes
/// the current state and returns the next one. Merging is keyed on
/// message ids, so replaying an event (a redelivered live addition, a
/// page that overlaps a message already seen) leaves the list unchanged,
/// and the order events arrive in does not affect the result.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    messages: Vec<Message>,
    next_cursor: Option<Cursor>,
    reached_end: bool,
    last_error: Option<String>,
}

impl Timeline {
    /// Fold one event into the state.
    pub fn apply(mut self, event: TimelineEvent) -> Self {
        match event {
            TimelineEvent::PageLoaded { messages, fetched, next_cursor } => {
                for message in messages {
                    self.insert(message);
                }
                self.reached_end = fetched < PAGE_SIZE || next_cursor.is_none();
                self.next_cursor = next_cursor;
                self.last_error = None;
            }
            TimelineEvent::MessageAdded(message) => self.insert(message),
            TimelineEvent::PageFailed(reason) => self.last_error = Some(reason),
        }
        self
    }

    /// Newest first: `created_at` descending, id ascending on ties.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// True once a page came back short or without a follow-up cursor.
    /// Distinct from [`last_error`](Timeline::last_error): "no more
    /// messages" is not "the fetch failed".
    pub fn reached_end(&self) -> bool {
        self.reached_end
    }

    /// The most recent fetch failure, cleared by the next successful
    /// page.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Where the next history fetch resumes.
    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.next_cursor.as_ref()
    }

    fn insert(&mut self, message: Message) {
        if self.messages.iter().any(|m| m.id == message.id) {
            return;
        }
        let at = self.messages.partition_point(|m| {
            (Reverse(m.created_at), &m.id) < (Reverse(message.created_at), &message.id)
        });
        self.messages.insert(at, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn msg(id: &str, secs: i64) -> Message {
        Message {
            id: id.to_string(),
            text: format!("text {}", id),
            created_at: Utc.timestamp_opt(1_800_000_000 + secs, 0).unwrap(),
            author_name: "mona".to_string(),
        }
    }

    fn page(messages: Vec<Message>, next_cursor: Option<Cursor>) -> TimelineEvent {
        let fetched = messages.len();
        TimelineEvent::PageLoaded { messages, fetched, next_cursor }
    }

    fn ids(timeline: &Timeline) -> Vec<&str> {
        timeline.messages().iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn live_additions_land_newest_first() {
        let timeline = Timeline::default()
            .apply(TimelineEvent::MessageAdded(msg("m1", 10)))
            .apply(TimelineEvent::MessageAdded(msg("m2", 9)))
            .apply(TimelineEvent::MessageAdded(msg("m3", 11)));
        assert_eq!(ids(&timeline), ["m3", "m1", "m2"]);

        // A redelivered m1 changes nothing.
        let timeline = timeline.apply(TimelineEvent::MessageAdded(msg("m1", 10)));
        assert_eq!(ids(&timeline), ["m3", "m1", "m2"]);
    }

    #[test]
    fn page_and_live_feed_merge_without_duplicates() {
        let timeline = Timeline::default()
            .apply(TimelineEvent::MessageAdded(msg("m3", 11)))
            .apply(page(vec![msg("m3", 11), msg("m2", 9), msg("m1", 8)], None));
        assert_eq!(ids(&timeline), ["m3", "m2", "m1"]);
    }

    #[test]
    fn applying_the_same_page_twice_is_idempotent() {
        let event = page(vec![msg("m2", 9), msg("m1", 8)], None);
        let once = Timeline::default().apply(event.clone());
        let twice = once.clone().apply(event);
        assert_eq!(ids(&once), ids(&twice));
    }

    #[test]
    fn merge_result_does_not_depend_on_arrival_order() {
        let history = page(vec![msg("m2", 9), msg("m1", 8)], None);
        let live = TimelineEvent::MessageAdded(msg("m3", 11));

        let a = Timeline::default().apply(history.clone()).apply(live.clone());
        let b = Timeline::default().apply(live).apply(history);
        assert_eq!(ids(&a), ids(&b));
        assert_eq!(ids(&a), ["m3", "m2", "m1"]);
    }

    #[test]
    fn equal_timestamps_fall_back_to_id_order() {
        let timeline = Timeline::default()
            .apply(TimelineEvent::MessageAdded(msg("b", 10)))
            .apply(TimelineEvent::MessageAdded(msg("a", 10)));
        assert_eq!(ids(&timeline), ["a", "b"]);
    }

    #[test]
    fn a_short_page_exhausts_history() {
        let timeline =
            Timeline::default().apply(page(vec![msg("m1", 8)], Some(Cursor::from_token("t"))));
        assert!(timeline.reached_end());
    }

    #[test]
    fn a_full_page_with_a_cursor_leaves_more_to_load() {
        let messages: Vec<Message> =
            (0..PAGE_SIZE).map(|i| msg(&format!("h{}", i), i as i64)).collect();
        let timeline =
            Timeline::default().apply(page(messages, Some(Cursor::from_token("t"))));
        assert!(!timeline.reached_end());
        assert_eq!(timeline.next_cursor().map(|c| c.as_str()), Some("t"));
    }

    #[test]
    fn a_full_page_without_a_cursor_still_ends_history() {
        let messages: Vec<Message> =
            (0..PAGE_SIZE).map(|i| msg(&format!("h{}", i), i as i64)).collect();
        let timeline = Timeline::default().apply(page(messages, None));
        assert!(timeline.reached_end());
    }

    #[test]
    fn an_empty_first_page_is_an_empty_room_not_an_error() {
        let timeline = Timeline::default().apply(page(vec![], None));
        assert!(timeline.is_empty());
        assert!(timeline.reached_end());
        assert!(timeline.last_error().is_none());
    }

    #[test]
    fn a_failed_fetch_is_reported_and_cleared_by_the_next_page() {
        let timeline = Timeline::default()
            .apply(TimelineEvent::MessageAdded(msg("m1", 8)))
            .apply(TimelineEvent::PageFailed("connection refused".to_string()));
        assert_eq!(timeline.last_error(), Some("connection refused"));
        assert_eq!(ids(&timeline), ["m1"]);
        assert!(!timeline.reached_end());

        let timeline = timeline.apply(page(vec![msg("m0", 5)], None));
        assert!(timeline.last_error().is_none());
        assert_eq!(ids(&timeline), ["m1", "m0"]);
    }
}
