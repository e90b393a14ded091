//! XML-backed user store.
//!
//! The whole user set lives in one document (`UsersData.xml` by default):
//!
//! ```xml
//! <users>
//!   <user>
//!     <username>alice</username>
//!     <password>…hex digest…</password>
//!     <image>…base64…</image>
//!     <contacts>
//!       <contact><username/><password/><image/></contact>
//!     </contacts>
//!   </user>
//! </users>
//! ```
//!
//! Contact records are by-value snapshots and leaves: they repeat the three
//! user fields but never a nested contact list of their own. Every save
//! rewrites the document in full, through a temp file and rename so a crash
//! mid-write cannot truncate the store.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{debug, info};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use xml::writer::{EmitterConfig, EventWriter, XmlEvent};

use crate::models::{Contact, User};
use crate::storage::{StorageError, UserStore};

pub struct XmlUserStore {
    path: PathBuf,
    // Serializes whole-file rewrites; concurrent writers would otherwise
    // interleave temp files on the same path.
    write_lock: Mutex<()>,
}

impl XmlUserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        XmlUserStore {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UserStore for XmlUserStore {
    fn load_all(&self) -> Result<Vec<User>, StorageError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            // Absent store means no one has registered yet, not an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("User store {} does not exist yet", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };

        let document = roxmltree::Document::parse(&contents)
            .map_err(|e| StorageError::malformed(&self.path, e.to_string()))?;

        let mut users = Vec::new();
        for user_node in document
            .root_element()
            .children()
            .filter(|n| n.has_tag_name("user"))
        {
            users.push(self.parse_user(&user_node)?);
        }

        debug!("Loaded {} users from {}", users.len(), self.path.display());
        Ok(users)
    }

    fn save_all(&self, users: &[User]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut output = Vec::new();
        {
            let mut writer = EmitterConfig::new()
                .perform_indent(true)
                .create_writer(&mut output);
            self.write_document(&mut writer, users)?;
        }

        write_atomically(&self.path, &output)?;
        info!("Saved {} users to {}", users.len(), self.path.display());
        Ok(())
    }
}

impl XmlUserStore {
    fn parse_user(&self, node: &roxmltree::Node) -> Result<User, StorageError> {
        let name = self.required_text(node, "username")?;
        let password_digest = self.required_text(node, "password")?;
        let profile_image = self.decode_image(node)?;

        let mut contacts = Vec::new();
        if let Some(block) = node.children().find(|n| n.has_tag_name("contacts")) {
            for contact_node in block.children().filter(|n| n.has_tag_name("contact")) {
                contacts.push(Contact {
                    name: self.required_text(&contact_node, "username")?,
                    password_digest: self.required_text(&contact_node, "password")?,
                    profile_image: self.decode_image(&contact_node)?,
                });
            }
        }

        Ok(User {
            name,
            password_digest,
            profile_image,
            contacts,
        })
    }

    /// Text of a direct child element. Direct children only: a `<user>`
    /// record also contains its contacts' `<username>` elements further
    /// down, which must not shadow the user's own.
    fn required_text(&self, node: &roxmltree::Node, tag: &str) -> Result<String, StorageError> {
        let child = node
            .children()
            .find(|n| n.has_tag_name(tag))
            .ok_or_else(|| {
                StorageError::malformed(&self.path, format!("<{}> record missing <{}>", node.tag_name().name(), tag))
            })?;
        Ok(child.text().unwrap_or("").to_string())
    }

    fn decode_image(&self, node: &roxmltree::Node) -> Result<Vec<u8>, StorageError> {
        let encoded = self.required_text(node, "image")?;
        BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| StorageError::malformed(&self.path, format!("invalid base64 image: {}", e)))
    }

    fn write_document<W: Write>(
        &self,
        writer: &mut EventWriter<W>,
        users: &[User],
    ) -> Result<(), StorageError> {
        let fail = |e: xml::writer::Error| StorageError::Serialize {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        };

        writer.write(XmlEvent::start_element("users")).map_err(fail)?;
        for user in users {
            writer.write(XmlEvent::start_element("user")).map_err(fail)?;
            self.write_record(writer, &user.name, &user.password_digest, &user.profile_image)?;

            writer.write(XmlEvent::start_element("contacts")).map_err(fail)?;
            for contact in &user.contacts {
                writer.write(XmlEvent::start_element("contact")).map_err(fail)?;
                self.write_record(writer, &contact.name, &contact.password_digest, &contact.profile_image)?;
                writer.write(XmlEvent::end_element()).map_err(fail)?;
            }
            writer.write(XmlEvent::end_element()).map_err(fail)?;

            writer.write(XmlEvent::end_element()).map_err(fail)?;
        }
        writer.write(XmlEvent::end_element()).map_err(fail)?;
        Ok(())
    }

    fn write_record<W: Write>(
        &self,
        writer: &mut EventWriter<W>,
        name: &str,
        digest: &str,
        image: &[u8],
    ) -> Result<(), StorageError> {
        let fail = |e: xml::writer::Error| StorageError::Serialize {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        };

        write_text_element(writer, "username", name).map_err(fail)?;
        write_text_element(writer, "password", digest).map_err(fail)?;
        write_text_element(writer, "image", &BASE64.encode(image)).map_err(fail)?;
        Ok(())
    }
}

/// Write one `<tag>text</tag>` element.
pub(crate) fn write_text_element<W: Write>(
    writer: &mut EventWriter<W>,
    tag: &str,
    text: &str,
) -> Result<(), xml::writer::Error> {
    writer.write(XmlEvent::start_element(tag))?;
    if !text.is_empty() {
        writer.write(XmlEvent::characters(text))?;
    }
    writer.write(XmlEvent::end_element())
}

/// Whole-file overwrite via temp file + rename, so a crash mid-write leaves
/// the previous document intact.
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    let tmp_path = temp_sibling(path);

    let mut file = fs::File::create(&tmp_path).map_err(|e| StorageError::io(&tmp_path, e))?;
    file.write_all(contents)
        .and_then(|_| file.sync_all())
        .map_err(|e| StorageError::io(&tmp_path, e))?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|e| StorageError::io(path, e))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = XmlUserStore::new(dir.path().join("UsersData.xml"));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_document_is_an_error_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("UsersData.xml");
        fs::write(&path, "<users><user>").unwrap();

        let store = XmlUserStore::new(&path);
        match store.load_all() {
            Err(StorageError::Malformed { .. }) => {}
            other => panic!("Expected Malformed, got {:?}", other.map(|u| u.len())),
        }
    }

    #[test]
    fn test_record_missing_field_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("UsersData.xml");
        fs::write(
            &path,
            "<users><user><username>alice</username><image></image><contacts/></user></users>",
        )
        .unwrap();

        let store = XmlUserStore::new(&path);
        assert!(matches!(store.load_all(), Err(StorageError::Malformed { .. })));
    }

    #[test]
    fn test_save_does_not_leave_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("UsersData.xml");
        let store = XmlUserStore::new(&path);
        store.save_all(&[User::new("alice", "d")]).unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("UsersData.xml.tmp").exists());
    }
}
