use serde::{Deserialize, Serialize};

use parlor_types::Document;

use crate::{ChangeKind, DocumentChange};

/// Body of a successful insert: the id the service assigned.
#[derive(Debug, Deserialize)]
pub(crate) struct InsertResponse {
    pub id: String,
}

/// Body of an ordered or filtered query.
#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    pub documents: Vec<Document>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Commands the client sends up the gateway socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub(crate) enum GatewayCommand {
    Subscribe { collection: String },
}

/// Frames the gateway pushes down once a subscription is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub(crate) enum GatewayFrame {
    Added { document: Document },
    Modified { document: Document },
    Removed { document: Document },
}

impl GatewayFrame {
    pub fn into_change(self) -> DocumentChange {
        match self {
            Self::Added { document } => DocumentChange { kind: ChangeKind::Added, document },
            Self::Modified { document } => DocumentChange { kind: ChangeKind::Modified, document },
            Self::Removed { document } => DocumentChange { kind: ChangeKind::Removed, document },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscribe_command_has_the_tagged_shape() {
        let cmd = GatewayCommand::Subscribe { collection: "messages".to_string() };
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            value,
            json!({ "type": "subscribe", "data": { "collection": "messages" } })
        );
    }

    #[test]
    fn added_frame_decodes_into_a_change() {
        let text = r#"{
            "type": "added",
            "data": {
                "document": {
                    "id": "m1",
                    "fields": { "text": "hi", "created_at": "2026-03-04T18:30:00Z", "author_name": "mona" }
                }
            }
        }"#;
        let frame: GatewayFrame = serde_json::from_str(text).unwrap();
        let change = frame.into_change();
        assert_eq!(change.kind, ChangeKind::Added);
        assert_eq!(change.document.id, "m1");
        assert_eq!(change.document.fields["text"], json!("hi"));
    }

    #[test]
    fn removed_frame_keeps_its_kind() {
        let text = r#"{"type": "removed", "data": {"document": {"id": "m2", "fields": {}}}}"#;
        let frame: GatewayFrame = serde_json::from_str(text).unwrap();
        assert_eq!(frame.into_change().kind, ChangeKind::Removed);
    }

    #[test]
    fn unknown_frame_type_is_a_decode_error() {
        let text = r#"{"type": "renamed", "data": {}}"#;
        assert!(serde_json::from_str::<GatewayFrame>(text).is_err());
    }

    #[test]
    fn query_response_tolerates_a_missing_cursor() {
        let body: QueryResponse = serde_json::from_str(r#"{ "documents": [] }"#).unwrap();
        assert!(body.documents.is_empty());
        assert!(body.next_cursor.is_none());
    }
}
