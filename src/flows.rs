//! Application flows: login, registration, contact management and chat.
//!
//! Each flow re-reads the persisted stores rather than trusting the session
//! snapshot, matching the whole-file persistence model: the file on disk is
//! the source of truth and another flow may have rewritten it since login.

use log::{info, warn};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

use crate::models::{Contact, Direction, Message, User};
use crate::security::{hash_password, verify_password};
use crate::session::Session;
use crate::storage::messages::transcript_line;
use crate::storage::{MessageStore, StorageError, UserStore};

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("No user is logged in")]
    NotLoggedIn,

    #[error("No chat partner is selected")]
    NoChatPartner,

    #[error("All fields must be filled in")]
    EmptyField,

    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("A user named {0} already exists")]
    UserExists(String),

    #[error("No user named {0} exists")]
    UnknownUser(String),

    #[error("{0} is already in your contact list")]
    ContactExists(String),

    #[error("Chat with {0} is not allowed: you are not each other's contacts")]
    NotMutualContacts(String),

    #[error("Cannot send an empty message")]
    EmptyMessage,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Export failed: {0}")]
    Export(std::io::Error),
}

pub struct ChatService<U: UserStore, M: MessageStore> {
    users: U,
    messages: M,
}

impl<U: UserStore, M: MessageStore> ChatService<U, M> {
    pub fn new(users: U, messages: M) -> Self {
        ChatService { users, messages }
    }

    pub fn user_store(&self) -> &U {
        &self.users
    }

    pub fn message_store(&self) -> &M {
        &self.messages
    }

    /// Verify the credentials against the persisted store and make `name`
    /// the session's current user.
    pub fn login(&self, session: &mut Session, name: &str, password: &str) -> Result<(), FlowError> {
        if name.is_empty() || password.is_empty() {
            return Err(FlowError::EmptyField);
        }

        let user = self
            .users
            .find_by_name(name)?
            .filter(|u| verify_password(password, &u.password_digest))
            .ok_or(FlowError::InvalidCredentials)?;

        info!("User {} logged in", user.name);
        session.set_current_user(user);
        Ok(())
    }

    /// Register a new user and persist the whole store. Names must be unique
    /// case-insensitively; the password is hashed before it is stored.
    pub fn register(
        &self,
        name: &str,
        password: &str,
        profile_image: Vec<u8>,
    ) -> Result<(), FlowError> {
        if name.is_empty() || password.is_empty() {
            return Err(FlowError::EmptyField);
        }

        let mut users = self.users.load_all()?;
        if users.iter().any(|u| u.name.eq_ignore_ascii_case(name)) {
            return Err(FlowError::UserExists(name.to_string()));
        }

        let mut user = User::new(name, hash_password(password));
        user.profile_image = profile_image;
        users.push(user);
        self.users.save_all(&users)?;

        info!("Registered new user {}", name);
        Ok(())
    }

    /// Everyone the current user could still add: all users except
    /// themselves and their existing contacts.
    pub fn available_users(&self, session: &Session) -> Result<Vec<User>, FlowError> {
        let current = session.current_user().ok_or(FlowError::NotLoggedIn)?;
        let users = self.users.load_all()?;

        Ok(users
            .into_iter()
            .filter(|u| u.name != current.name && !current.has_contact(&u.name))
            .collect())
    }

    /// One-directional contact add: appends a by-value snapshot of `name` to
    /// the current user's list and rewrites the store. The other user's list
    /// is untouched; chat stays locked until they reciprocate.
    pub fn add_contact(&self, session: &mut Session, name: &str) -> Result<(), FlowError> {
        let current = session.current_user().ok_or(FlowError::NotLoggedIn)?;

        if current.has_contact_ignore_case(name) {
            return Err(FlowError::ContactExists(name.to_string()));
        }

        let mut users = self.users.load_all()?;
        let new_contact = Contact::snapshot_of(
            users
                .iter()
                .find(|u| u.name == name)
                .ok_or_else(|| FlowError::UnknownUser(name.to_string()))?,
        );

        let owner = users
            .iter_mut()
            .find(|u| u.name.eq_ignore_ascii_case(&current.name))
            .ok_or_else(|| FlowError::UnknownUser(current.name.clone()))?;
        // The persisted record is authoritative; check it too in case another
        // flow already added this contact.
        if owner.has_contact_ignore_case(name) {
            return Err(FlowError::ContactExists(name.to_string()));
        }
        owner.contacts.push(new_contact);

        self.users.save_all(&users)?;

        // Refresh the session copy from what was just persisted.
        let current_name = current.name.clone();
        if let Some(updated) = users.into_iter().find(|u| u.name == current_name) {
            session.refresh_current_user(updated);
        }

        info!("Contact {} added for {}", name, current_name);
        Ok(())
    }

    /// Mutual-confirmation check: both parties are re-resolved from the
    /// persisted store and each one's contact list must contain the other.
    pub fn chat_eligible(&self, current_name: &str, peer_name: &str) -> Result<bool, FlowError> {
        let users = self.users.load_all()?;

        let current = users.iter().find(|u| u.name == current_name);
        let peer = users.iter().find(|u| u.name == peer_name);

        match (current, peer) {
            (Some(current), Some(peer)) => {
                Ok(current.has_contact(&peer.name) && peer.has_contact(&current.name))
            }
            _ => Ok(false),
        }
    }

    /// Select `name` as the chat partner, refusing unless the contact
    /// relation holds in both directions. Refusal changes no state.
    pub fn open_chat(&self, session: &mut Session, name: &str) -> Result<(), FlowError> {
        let current = session.current_user().ok_or(FlowError::NotLoggedIn)?;

        if !self.chat_eligible(&current.name, name)? {
            warn!("Chat refused between {} and {}", current.name, name);
            return Err(FlowError::NotMutualContacts(name.to_string()));
        }

        let peer = self
            .users
            .find_by_name(name)?
            .ok_or_else(|| FlowError::UnknownUser(name.to_string()))?;

        info!("Chat opened between {} and {}", current.name, peer.name);
        session.set_selected_user(peer);
        Ok(())
    }

    /// The conversation between the current user and the selected partner:
    /// every stored message whose {sender, receiver} pair equals the two of
    /// them in either order, in document order, labelled by direction.
    pub fn conversation(&self, session: &Session) -> Result<Vec<(Direction, Message)>, FlowError> {
        let current = session.current_user().ok_or(FlowError::NotLoggedIn)?;
        let selected = session.selected_user().ok_or(FlowError::NoChatPartner)?;

        let load = self.messages.load_all()?;
        for skipped in &load.unresolved {
            warn!(
                "Skipped message with unknown participant: {} -> {}",
                skipped.sender, skipped.receiver
            );
        }

        Ok(load
            .messages
            .into_iter()
            .filter_map(|m| {
                if m.sender == *current && m.receiver == *selected {
                    Some((Direction::Sent, m))
                } else if m.sender == *selected && m.receiver == *current {
                    Some((Direction::Received, m))
                } else {
                    None
                }
            })
            .collect())
    }

    /// Persist one message from the current user to the selected partner,
    /// stamped with the local time.
    pub fn send_message(&self, session: &Session, content: &str) -> Result<Message, FlowError> {
        let current = session.current_user().ok_or(FlowError::NotLoggedIn)?;
        let selected = session.selected_user().ok_or(FlowError::NoChatPartner)?;

        if content.is_empty() {
            return Err(FlowError::EmptyMessage);
        }

        let message = Message::new(
            current.clone(),
            selected.clone(),
            content,
            chrono::Local::now().naive_local(),
        );
        self.messages.append(&message)?;
        Ok(message)
    }

    /// Write the current conversation to `path`, one bracketed transcript
    /// line per message.
    pub fn export_conversation(&self, session: &Session, path: &Path) -> Result<usize, FlowError> {
        let conversation = self.conversation(session)?;

        let mut file = File::create(path).map_err(FlowError::Export)?;
        for (_, message) in &conversation {
            writeln!(file, "{}", transcript_line(message)).map_err(FlowError::Export)?;
        }

        info!(
            "Exported {} messages to {}",
            conversation.len(),
            path.display()
        );
        Ok(conversation.len())
    }
}
