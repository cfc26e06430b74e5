use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::{Draft, Message, User};

/// Collection names on the remote store.
pub mod collections {
    pub const MESSAGES: &str = "messages";
    pub const USERS: &str = "users";
}

/// Field messages are ordered by, both in queries and in the timeline.
pub const CREATED_AT_FIELD: &str = "created_at";

/// Field holding a registered user's display name.
pub const NAME_FIELD: &str = "name";

/// A schemaless record in the remote store: an id the store assigned
/// plus a JSON object of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Value,
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document {id} is missing or has malformed fields: {source}")]
    Malformed {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Wire shape of a message document's fields (everything but the id).
#[derive(Debug, Serialize, Deserialize)]
struct MessageFields {
    text: String,
    created_at: DateTime<Utc>,
    author_name: String,
}

impl Message {
    /// Read a message back out of a store document.
    ///
    /// Documents written by other clients are not trusted: anything that
    /// does not carry the expected fields is reported, not panicked on.
    pub fn from_document(doc: &Document) -> Result<Self, DocumentError> {
        let fields: MessageFields =
            serde_json::from_value(doc.fields.clone()).map_err(|source| DocumentError::Malformed {
                id: doc.id.clone(),
                source,
            })?;
        Ok(Self {
            id: doc.id.clone(),
            text: fields.text,
            created_at: fields.created_at,
            author_name: fields.author_name,
        })
    }
}

impl Draft {
    /// Fields to hand the store on insert. The id is the store's to assign.
    pub fn to_fields(&self) -> Value {
        json!({
            "text": self.text,
            "created_at": self.created_at,
            "author_name": self.author_name,
        })
    }
}

impl User {
    pub fn from_document(doc: &Document) -> Result<Self, DocumentError> {
        serde_json::from_value(doc.fields.clone()).map_err(|source| DocumentError::Malformed {
            id: doc.id.clone(),
            source,
        })
    }

    pub fn to_fields(&self) -> Value {
        json!({ "name": self.name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_message() -> Message {
        Message {
            id: "m1".to_string(),
            text: "evening all".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 4, 18, 30, 0).unwrap(),
            author_name: "mona".to_string(),
        }
    }

    #[test]
    fn message_survives_the_document_round_trip() {
        let original = sample_message();
        let draft = Draft {
            text: original.text.clone(),
            created_at: original.created_at,
            author_name: original.author_name.clone(),
        };
        let doc = Document {
            id: original.id.clone(),
            fields: draft.to_fields(),
        };
        let parsed = Message::from_document(&doc).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn created_at_is_written_as_rfc3339() {
        let draft = Draft {
            text: "hi".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 4, 18, 30, 0).unwrap(),
            author_name: "mona".to_string(),
        };
        let fields = draft.to_fields();
        assert_eq!(fields["created_at"], json!("2026-03-04T18:30:00Z"));
    }

    #[test]
    fn malformed_document_is_an_error_not_a_panic() {
        let doc = Document {
            id: "m9".to_string(),
            fields: json!({ "text": 42 }),
        };
        let err = Message::from_document(&doc).unwrap_err();
        assert!(err.to_string().contains("m9"));
    }

    #[test]
    fn user_round_trip() {
        let user = User { name: "mona".to_string() };
        let doc = Document { id: "u1".to_string(), fields: user.to_fields() };
        assert_eq!(User::from_document(&doc).unwrap(), user);
    }
}
