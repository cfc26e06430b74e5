pub mod document;
pub mod models;

pub use document::{collections, Document, DocumentError, CREATED_AT_FIELD, NAME_FIELD};
pub use models::{Draft, DraftError, Message, NameError, User, MAX_DISPLAY_NAME_LEN, MAX_MESSAGE_LEN};
