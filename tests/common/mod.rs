// Common test utilities for integration tests
// This module contains shared code for all integration tests
#![allow(dead_code)]

use std::sync::Once;

use log::LevelFilter;
use tempfile::TempDir;

use charla::{ChatService, Session, XmlMessageStore, XmlUserStore};

// Initialize logging once
static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .init();
    });
}

pub type TestService = ChatService<XmlUserStore, XmlMessageStore>;

/// A service wired to stores inside a fresh temp directory. The directory
/// must be kept alive for the duration of the test.
pub fn setup_service() -> (TempDir, TestService) {
    setup_logging();

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let users_path = dir.path().join("UsersData.xml");
    let service = ChatService::new(
        XmlUserStore::new(&users_path),
        XmlMessageStore::new(
            dir.path().join("ChatData.xml"),
            dir.path().join("ChatData.txt"),
            &users_path,
        ),
    );

    (dir, service)
}

/// Register a user and return nothing; panics on failure.
pub fn register(service: &TestService, name: &str, password: &str) {
    service
        .register(name, password, Vec::new())
        .unwrap_or_else(|e| panic!("Failed to register {}: {}", name, e));
}

/// Register and log in, returning the session.
pub fn login(service: &TestService, name: &str, password: &str) -> Session {
    let mut session = Session::new();
    service
        .login(&mut session, name, password)
        .unwrap_or_else(|e| panic!("Failed to log in {}: {}", name, e));
    session
}
