use chrono::NaiveDateTime;
use std::hash::{Hash, Hasher};

/// A registered user. Identity is the name alone: two `User` values with the
/// same name compare equal even if their digest, image or contacts differ.
#[derive(Debug, Clone)]
pub struct User {
    pub name: String,
    /// Hex-encoded SHA3-256 digest of the password, never the plaintext.
    pub password_digest: String,
    /// Raw image bytes; empty when the user has no profile picture.
    pub profile_image: Vec<u8>,
    pub contacts: Vec<Contact>,
}

impl User {
    pub fn new(name: impl Into<String>, password_digest: impl Into<String>) -> Self {
        User {
            name: name.into(),
            password_digest: password_digest.into(),
            profile_image: Vec::new(),
            contacts: Vec::new(),
        }
    }

    /// Case-sensitive check against the in-memory contact list.
    pub fn has_contact(&self, name: &str) -> bool {
        self.contacts.iter().any(|c| c.name == name)
    }

    /// Case-insensitive check, used before inserting a new contact.
    pub fn has_contact_ignore_case(&self, name: &str) -> bool {
        self.contacts.iter().any(|c| c.name.eq_ignore_ascii_case(name))
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// A contact entry: a by-value snapshot of another user taken at the moment
/// it was added. It is NOT a reference: if the other user later changes
/// their password or picture, this copy keeps the old values. Contact
/// entries are leaf records and carry no contact list of their own.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub name: String,
    pub password_digest: String,
    pub profile_image: Vec<u8>,
}

impl Contact {
    /// Snapshot the identifying fields of `user`.
    pub fn snapshot_of(user: &User) -> Self {
        Contact {
            name: user.name.clone(),
            password_digest: user.password_digest.clone(),
            profile_image: user.profile_image.clone(),
        }
    }
}

/// One chat message. Immutable once created; never edited or deleted.
#[derive(Debug, Clone)]
pub struct Message {
    pub sender: User,
    pub receiver: User,
    pub content: String,
    pub timestamp: NaiveDateTime,
}

impl Message {
    pub fn new(
        sender: User,
        receiver: User,
        content: impl Into<String>,
        timestamp: NaiveDateTime,
    ) -> Self {
        Message {
            sender,
            receiver,
            content: content.into(),
            timestamp,
        }
    }

    /// ISO-8601 textual form used in the XML store and the transcript.
    pub fn timestamp_text(&self) -> String {
        self.timestamp.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
    }
}

/// Whether a displayed message was sent by the current user or received
/// from the selected peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}
