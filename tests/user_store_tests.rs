// User store tests
// These tests verify the XML user store: round-trips, contact snapshots,
// and the distinction between an absent file and a malformed one.

mod common;
use common::setup_logging;

use std::fs;

use charla::{Contact, StorageError, User, UserStore, XmlUserStore};

fn sample_users() -> Vec<User> {
    let mut alice = User::new("alice", "digest-alice");
    alice.profile_image = vec![0xde, 0xad, 0xbe, 0xef];

    let mut bob = User::new("bob", "digest-bob");
    bob.contacts.push(Contact::snapshot_of(&alice));

    // carol has an empty image and an empty contact list
    let carol = User::new("carol", "digest-carol");

    vec![alice, bob, carol]
}

#[test]
fn test_save_load_round_trip() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let store = XmlUserStore::new(dir.path().join("UsersData.xml"));

    let users = sample_users();
    store.save_all(&users).expect("Failed to save users");

    let loaded = store.load_all().expect("Failed to load users");
    assert_eq!(loaded.len(), 3);

    let alice = &loaded[0];
    assert_eq!(alice.name, "alice");
    assert_eq!(alice.password_digest, "digest-alice");
    assert_eq!(alice.profile_image, vec![0xde, 0xad, 0xbe, 0xef]);
    assert!(alice.contacts.is_empty());

    let bob = &loaded[1];
    assert_eq!(bob.name, "bob");
    assert_eq!(bob.contacts.len(), 1);
    assert_eq!(bob.contacts[0].name, "alice");
    assert_eq!(bob.contacts[0].password_digest, "digest-alice");
    assert_eq!(bob.contacts[0].profile_image, vec![0xde, 0xad, 0xbe, 0xef]);

    let carol = &loaded[2];
    assert_eq!(carol.name, "carol");
    assert!(carol.profile_image.is_empty());
    assert!(carol.contacts.is_empty());
}

#[test]
fn test_contact_snapshot_survives_canonical_edits() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let store = XmlUserStore::new(dir.path().join("UsersData.xml"));

    let mut users = sample_users();
    store.save_all(&users).unwrap();

    // alice changes her digest; bob's stored copy of her must not move
    users[0].password_digest = "digest-alice-v2".to_string();
    store.save_all(&users).unwrap();

    let loaded = store.load_all().unwrap();
    assert_eq!(loaded[0].password_digest, "digest-alice-v2");
    assert_eq!(loaded[1].contacts[0].password_digest, "digest-alice");
}

#[test]
fn test_save_overwrites_whole_document() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let store = XmlUserStore::new(dir.path().join("UsersData.xml"));

    store.save_all(&sample_users()).unwrap();
    store.save_all(&[User::new("dave", "digest-dave")]).unwrap();

    let loaded = store.load_all().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].name, "dave");
}

#[test]
fn test_absent_file_vs_malformed_file() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("UsersData.xml");
    let store = XmlUserStore::new(&path);

    // Absent file: legitimately empty, not an error
    assert!(store.load_all().unwrap().is_empty());

    // Malformed file: a distinguishable error, never an empty result
    fs::write(&path, "<users><user><username>trunc").unwrap();
    match store.load_all() {
        Err(StorageError::Malformed { path, .. }) => {
            assert!(path.ends_with("UsersData.xml"));
        }
        Ok(users) => panic!("Malformed store silently loaded {} users", users.len()),
        Err(e) => panic!("Expected Malformed, got {}", e),
    }
}

#[test]
fn test_has_contact_reads_persisted_state() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let store = XmlUserStore::new(dir.path().join("UsersData.xml"));

    store.save_all(&sample_users()).unwrap();

    assert!(store.has_contact("bob", "alice").unwrap());
    assert!(!store.has_contact("alice", "bob").unwrap());
    // Case-sensitive lookup
    assert!(!store.has_contact("bob", "Alice").unwrap());
    // Unknown owner is simply not a contact holder
    assert!(!store.has_contact("nobody", "alice").unwrap());
}

#[test]
fn test_duplicate_contact_entries_are_preserved() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let store = XmlUserStore::new(dir.path().join("UsersData.xml"));

    // The data model enforces no dedup invariant; only the flow layer checks
    let alice = User::new("alice", "da");
    let mut bob = User::new("bob", "db");
    bob.contacts.push(Contact::snapshot_of(&alice));
    bob.contacts.push(Contact::snapshot_of(&alice));

    store.save_all(&[alice, bob]).unwrap();
    let loaded = store.load_all().unwrap();
    assert_eq!(loaded[1].contacts.len(), 2);
}

#[test]
fn test_find_by_name_is_exact() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let store = XmlUserStore::new(dir.path().join("UsersData.xml"));
    store.save_all(&sample_users()).unwrap();

    assert_eq!(store.find_by_name("bob").unwrap().unwrap().name, "bob");
    assert!(store.find_by_name("Bob").unwrap().is_none());
    assert!(store.find_by_name("mallory").unwrap().is_none());
}
