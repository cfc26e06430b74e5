use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Opaque resume token for ordered queries.
///
/// Callers only hold it and hand it back on the next fetch; what is
/// inside is the minting store's business. [`crate::MemoryStore`] packs
/// the last-returned document's position in here, [`crate::RemoteStore`]
/// passes the server's token through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("cursor is not valid base64")]
    NotBase64,
    #[error("cursor payload is not a query position")]
    NotAPosition,
}

/// Where an ordered query stopped: the order field's value on the last
/// returned document, plus the store's insertion sequence as a tiebreak
/// so pagination stays stable when order values collide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Position {
    pub last: Value,
    pub seq: u64,
}

impl Position {
    pub(crate) fn encode(&self) -> Cursor {
        let payload = serde_json::to_vec(self).expect("a position is always serializable");
        Cursor(URL_SAFE_NO_PAD.encode(payload))
    }

    pub(crate) fn decode(cursor: &Cursor) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor.0.as_bytes())
            .map_err(|_| CursorError::NotBase64)?;
        serde_json::from_slice(&bytes).map_err(|_| CursorError::NotAPosition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn position_round_trips_through_a_cursor() {
        let position = Position { last: json!("2026-03-04T18:30:00Z"), seq: 41 };
        let decoded = Position::decode(&position.encode()).unwrap();
        assert_eq!(decoded.last, position.last);
        assert_eq!(decoded.seq, position.seq);
    }

    #[test]
    fn cursor_token_is_opaque_but_stable() {
        let position = Position { last: json!(null), seq: 7 };
        assert_eq!(position.encode(), position.encode());
    }

    #[test]
    fn garbage_is_rejected_as_not_base64() {
        let err = Position::decode(&Cursor::from_token("!!not base64!!")).unwrap_err();
        assert!(matches!(err, CursorError::NotBase64));
    }

    #[test]
    fn base64_of_non_position_is_rejected() {
        let token = URL_SAFE_NO_PAD.encode(b"{\"wrong\": true}");
        let err = Position::decode(&Cursor::from_token(token)).unwrap_err();
        assert!(matches!(err, CursorError::NotAPosition));
    }
}
