//! Persistence for users and messages.
//!
//! Both stores are whole-document XML files, rewritten in full on every
//! mutation, plus a plain-text transcript mirror for messages. The stores
//! sit behind the `UserStore` and `MessageStore` traits so the flows never
//! see file paths and an incremental backend could replace the XML files
//! without touching calling code.

use thiserror::Error;

use crate::models::{Message, User};

pub mod messages;
pub mod users;

pub use messages::XmlMessageStore;
pub use users::XmlUserStore;

/// Errors from the persistence layer.
///
/// A missing file is NOT an error: read paths treat it as an empty data set.
/// A file that exists but cannot be parsed is `Malformed`, so callers can
/// tell silent data loss apart from a store that was never created.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O failure reading or writing a store file
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a well-formed store document
    #[error("Malformed document {path}: {reason}")]
    Malformed { path: String, reason: String },

    /// Failure serializing a document before it reaches disk
    #[error("Serialization error for {path}: {reason}")]
    Serialize { path: String, reason: String },

    /// One or both halves of a message append failed. The XML rewrite and
    /// the transcript append are independent effects; this reports exactly
    /// which of them went wrong.
    #[error("Message append failed ({})", append_failure_summary(.xml_error, .text_error))]
    Append {
        xml_error: Option<String>,
        text_error: Option<String>,
    },
}

fn append_failure_summary(xml: &Option<String>, text: &Option<String>) -> String {
    match (xml, text) {
        (Some(x), Some(t)) => format!("XML store: {}; transcript: {}", x, t),
        (Some(x), None) => format!("XML store: {}; transcript written", x),
        (None, Some(t)) => format!("XML store written; transcript: {}", t),
        (None, None) => "no failure recorded".to_string(),
    }
}

impl StorageError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn malformed(path: &std::path::Path, reason: impl Into<String>) -> Self {
        StorageError::Malformed {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}

/// A message record whose sender or receiver could not be resolved against
/// the user store. Such records are dropped from the result and reported.
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedMessage {
    pub sender: String,
    pub receiver: String,
    pub content: String,
}

/// The outcome of loading the message store: the resolvable messages in
/// document order, plus the records that were skipped.
#[derive(Debug, Default)]
pub struct MessageLoad {
    pub messages: Vec<Message>,
    pub unresolved: Vec<UnresolvedMessage>,
}

/// Repository interface over the persisted user set.
pub trait UserStore {
    /// Load every user, with contacts as embedded leaf records. A missing
    /// file yields an empty set.
    fn load_all(&self) -> Result<Vec<User>, StorageError>;

    /// Overwrite the store with the full in-memory set.
    fn save_all(&self, users: &[User]) -> Result<(), StorageError>;

    /// Resolve one user by exact name from the persisted store.
    fn find_by_name(&self, name: &str) -> Result<Option<User>, StorageError> {
        Ok(self.load_all()?.into_iter().find(|u| u.name == name))
    }

    /// Whether `owner`'s persisted contact list contains `contact_name`
    /// (case-sensitive), re-read from disk.
    fn has_contact(&self, owner: &str, contact_name: &str) -> Result<bool, StorageError> {
        match self.find_by_name(owner)? {
            Some(user) => Ok(user.has_contact(contact_name)),
            None => Ok(false),
        }
    }
}

/// Repository interface over the persisted message sequence.
pub trait MessageStore {
    /// Load every resolvable message in document order.
    fn load_all(&self) -> Result<MessageLoad, StorageError>;

    /// Append one message: rewrite the XML document and append one
    /// transcript line. Both effects are always attempted; a partial
    /// failure is reported via `StorageError::Append`.
    fn append(&self, message: &Message) -> Result<(), StorageError>;
}
