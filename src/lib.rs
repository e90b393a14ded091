pub mod config;
pub mod flows;
pub mod models;
pub mod security;
pub mod session;
pub mod storage;

// Re-export main types for convenience
pub use flows::{ChatService, FlowError};
pub use models::*;
pub use session::Session;
pub use storage::{MessageStore, StorageError, UserStore, XmlMessageStore, XmlUserStore};
