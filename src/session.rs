//! Session state: who is logged in and who is selected for chat.
//!
//! An explicit context object owned by the caller and threaded through each
//! flow entry point, rather than a process-wide singleton. At most one
//! identity is active at a time; a new login simply replaces the previous
//! one, there is no explicit logout.

use crate::models::User;
use log::info;

#[derive(Debug, Default)]
pub struct Session {
    current_user: Option<User>,
    selected_user: Option<User>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    pub fn set_current_user(&mut self, user: User) {
        info!("Session: current user set to {}", user.name);
        self.current_user = Some(user);
        // A fresh login invalidates any previously selected chat partner.
        self.selected_user = None;
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn set_selected_user(&mut self, user: User) {
        info!("Session: selected chat partner set to {}", user.name);
        self.selected_user = Some(user);
    }

    pub fn selected_user(&self) -> Option<&User> {
        self.selected_user.as_ref()
    }

    pub fn clear_selected_user(&mut self) {
        self.selected_user = None;
    }

    /// Replace the stored copy of the current user with a freshly persisted
    /// record, e.g. after its contact list changed on disk.
    pub fn refresh_current_user(&mut self, user: User) {
        debug_assert!(
            self.current_user.as_ref().map(|u| u.name.as_str()) == Some(user.name.as_str()),
            "refresh must keep the same identity"
        );
        self.current_user = Some(user);
    }
}
