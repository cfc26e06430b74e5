use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest message text the room accepts, in characters.
pub const MAX_MESSAGE_LEN: usize = 120;

/// Longest display name the room accepts, in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 40;

/// A message as stored in the room. Immutable once the store has
/// acknowledged it; the id is assigned by the store and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author_name: String,
}

/// A message the user has typed but the store has not acknowledged yet.
///
/// A draft has no id; only the store hands those out. It becomes a
/// [`Message`] through [`Draft::into_message`] once the insert is acked.
#[derive(Debug, Clone, Serialize)]
pub struct Draft {
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author_name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("message text is empty")]
    EmptyMessage,
    #[error("message text is {len} chars, limit is {MAX_MESSAGE_LEN}")]
    TooLong { len: usize },
}

impl Draft {
    /// Validate raw input into a draft stamped with the client clock.
    ///
    /// Leading/trailing whitespace is trimmed before the empty and length
    /// checks, so a line of spaces is rejected rather than sent.
    pub fn new(raw: &str, author_name: &str) -> Result<Self, DraftError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(DraftError::EmptyMessage);
        }
        let len = text.chars().count();
        if len > MAX_MESSAGE_LEN {
            return Err(DraftError::TooLong { len });
        }
        Ok(Self {
            text: text.to_string(),
            created_at: Utc::now(),
            author_name: author_name.to_string(),
        })
    }

    /// Promote the draft once the store has assigned it an id.
    pub fn into_message(self, id: String) -> Message {
        Message {
            id,
            text: self.text,
            created_at: self.created_at,
            author_name: self.author_name,
        }
    }
}

/// A registered room member. One per device, created through the
/// identity flow; never updated or deleted afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("display name is empty")]
    Empty,
    #[error("display name is {len} chars, limit is {MAX_DISPLAY_NAME_LEN}")]
    TooLong { len: usize },
}

impl User {
    /// Validate a candidate display name. Trims first, same as
    /// [`Draft::new`] does for message text.
    pub fn new(raw: &str) -> Result<Self, NameError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        let len = name.chars().count();
        if len > MAX_DISPLAY_NAME_LEN {
            return Err(NameError::TooLong { len });
        }
        Ok(Self { name: name.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_trims_whitespace() {
        let draft = Draft::new("  hello there \n", "mona").unwrap();
        assert_eq!(draft.text, "hello there");
        assert_eq!(draft.author_name, "mona");
    }

    #[test]
    fn draft_rejects_empty_input() {
        let err = Draft::new("", "mona").unwrap_err();
        assert_eq!(err, DraftError::EmptyMessage);
    }

    #[test]
    fn draft_rejects_whitespace_only_input() {
        let err = Draft::new("   \t  ", "mona").unwrap_err();
        assert_eq!(err, DraftError::EmptyMessage);
    }

    #[test]
    fn draft_rejects_overlong_text() {
        let raw = "x".repeat(MAX_MESSAGE_LEN + 1);
        let err = Draft::new(&raw, "mona").unwrap_err();
        assert_eq!(err, DraftError::TooLong { len: MAX_MESSAGE_LEN + 1 });
    }

    #[test]
    fn draft_accepts_text_at_the_limit() {
        let raw = "y".repeat(MAX_MESSAGE_LEN);
        assert!(Draft::new(&raw, "mona").is_ok());
    }

    #[test]
    fn into_message_keeps_draft_fields() {
        let draft = Draft::new("hi", "mona").unwrap();
        let stamp = draft.created_at;
        let message = draft.into_message("abc-123".to_string());
        assert_eq!(message.id, "abc-123");
        assert_eq!(message.text, "hi");
        assert_eq!(message.created_at, stamp);
    }

    #[test]
    fn user_name_is_trimmed() {
        let user = User::new("  mona  ").unwrap();
        assert_eq!(user.name, "mona");
    }

    #[test]
    fn user_rejects_blank_names() {
        assert_eq!(User::new("   ").unwrap_err(), NameError::Empty);
    }

    #[test]
    fn user_rejects_overlong_names() {
        let raw = "n".repeat(MAX_DISPLAY_NAME_LEN + 1);
        let err = User::new(&raw).unwrap_err();
        assert_eq!(err, NameError::TooLong { len: MAX_DISPLAY_NAME_LEN + 1 });
    }

    #[test]
    fn user_accepts_a_name_at_the_limit() {
        let raw = "n".repeat(MAX_DISPLAY_NAME_LEN);
        assert!(User::new(&raw).is_ok());
    }
}
