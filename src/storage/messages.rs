//! XML-backed message store with a plain-text transcript mirror.
//!
//! Messages live in one document (`ChatData.xml` by default):
//!
//! ```xml
//! <messages>
//!   <message>
//!     <sender>alice</sender>
//!     <receiver>bob</receiver>
//!     <content>hi</content>
//!     <timestamp>2024-05-01T10:15:30.250</timestamp>
//!   </message>
//! </messages>
//! ```
//!
//! Sender and receiver are stored as names and resolved against the user
//! store on load; a record naming an unknown user is dropped and reported,
//! never raised. Every append also writes one line to the transcript file,
//! `[timestamp] sender a receiver: content`. The XML rewrite and the
//! transcript append are independent effects with no transaction between
//! them; both are always attempted and a partial failure names the half
//! that went wrong.

use log::{debug, info, warn};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use xml::writer::{EmitterConfig, EventWriter, XmlEvent};

use crate::models::{Message, User};
use crate::storage::users::{write_atomically, write_text_element, XmlUserStore};
use crate::storage::{MessageLoad, MessageStore, StorageError, UnresolvedMessage, UserStore};

/// One `<message>` record as it sits in the document, names and timestamp
/// still textual. Kept verbatim when the document is rewritten on append so
/// existing records never change shape.
#[derive(Debug, Clone)]
struct RawMessage {
    sender: String,
    receiver: String,
    content: String,
    timestamp: String,
}

pub struct XmlMessageStore {
    xml_path: PathBuf,
    transcript_path: PathBuf,
    // Message records carry names only; resolving them needs the user store.
    users: XmlUserStore,
    write_lock: Mutex<()>,
}

impl XmlMessageStore {
    pub fn new(
        xml_path: impl Into<PathBuf>,
        transcript_path: impl Into<PathBuf>,
        users_path: impl Into<PathBuf>,
    ) -> Self {
        XmlMessageStore {
            xml_path: xml_path.into(),
            transcript_path: transcript_path.into(),
            users: XmlUserStore::new(users_path),
            write_lock: Mutex::new(()),
        }
    }
}

impl MessageStore for XmlMessageStore {
    fn load_all(&self) -> Result<MessageLoad, StorageError> {
        let raw_messages = self.read_raw()?;
        if raw_messages.is_empty() {
            return Ok(MessageLoad::default());
        }

        let users = self.users.load_all()?;

        let mut load = MessageLoad::default();
        for raw in raw_messages {
            let sender = find_user(&users, &raw.sender);
            let receiver = find_user(&users, &raw.receiver);

            match (sender, receiver) {
                (Some(sender), Some(receiver)) => {
                    let timestamp = raw.timestamp.parse().map_err(|e| {
                        StorageError::malformed(
                            &self.xml_path,
                            format!("invalid timestamp {:?}: {}", raw.timestamp, e),
                        )
                    })?;
                    load.messages
                        .push(Message::new(sender.clone(), receiver.clone(), raw.content, timestamp));
                }
                _ => {
                    warn!(
                        "Sender or receiver not found for message: {}",
                        raw.content
                    );
                    load.unresolved.push(UnresolvedMessage {
                        sender: raw.sender,
                        receiver: raw.receiver,
                        content: raw.content,
                    });
                }
            }
        }

        debug!(
            "Loaded {} messages ({} unresolved) from {}",
            load.messages.len(),
            load.unresolved.len(),
            self.xml_path.display()
        );
        Ok(load)
    }

    fn append(&self, message: &Message) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        // Two independent effects. Attempt both even if the first fails so
        // the caller learns the state of each.
        let xml_error = self.append_to_xml(message).err().map(|e| e.to_string());
        let text_error = self.append_to_transcript(message).err().map(|e| e.to_string());

        if xml_error.is_none() && text_error.is_none() {
            info!(
                "Appended message {} -> {} to {}",
                message.sender.name,
                message.receiver.name,
                self.xml_path.display()
            );
            Ok(())
        } else {
            Err(StorageError::Append { xml_error, text_error })
        }
    }
}

impl XmlMessageStore {
    fn read_raw(&self) -> Result<Vec<RawMessage>, StorageError> {
        let contents = match fs::read_to_string(&self.xml_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.xml_path, e)),
        };

        let document = roxmltree::Document::parse(&contents)
            .map_err(|e| StorageError::malformed(&self.xml_path, e.to_string()))?;

        let mut raw_messages = Vec::new();
        for node in document
            .root_element()
            .children()
            .filter(|n| n.has_tag_name("message"))
        {
            raw_messages.push(RawMessage {
                sender: self.required_text(&node, "sender")?,
                receiver: self.required_text(&node, "receiver")?,
                content: self.required_text(&node, "content")?,
                timestamp: self.required_text(&node, "timestamp")?,
            });
        }

        Ok(raw_messages)
    }

    fn required_text(&self, node: &roxmltree::Node, tag: &str) -> Result<String, StorageError> {
        let child = node.children().find(|n| n.has_tag_name(tag)).ok_or_else(|| {
            StorageError::malformed(&self.xml_path, format!("<message> record missing <{}>", tag))
        })?;
        Ok(child.text().unwrap_or("").to_string())
    }

    /// Parse-or-create the document, append one record in document order,
    /// rewrite the whole file.
    fn append_to_xml(&self, message: &Message) -> Result<(), StorageError> {
        let mut raw_messages = self.read_raw()?;
        raw_messages.push(RawMessage {
            sender: message.sender.name.clone(),
            receiver: message.receiver.name.clone(),
            content: message.content.clone(),
            timestamp: message.timestamp_text(),
        });

        let mut output = Vec::new();
        {
            let fail = |e: xml::writer::Error| StorageError::Serialize {
                path: self.xml_path.display().to_string(),
                reason: e.to_string(),
            };

            let mut writer = EmitterConfig::new()
                .perform_indent(true)
                .create_writer(&mut output);

            writer.write(XmlEvent::start_element("messages")).map_err(fail)?;
            for raw in &raw_messages {
                writer.write(XmlEvent::start_element("message")).map_err(fail)?;
                write_text_element(&mut writer, "sender", &raw.sender).map_err(fail)?;
                write_text_element(&mut writer, "receiver", &raw.receiver).map_err(fail)?;
                write_text_element(&mut writer, "content", &raw.content).map_err(fail)?;
                write_text_element(&mut writer, "timestamp", &raw.timestamp).map_err(fail)?;
                writer.write(XmlEvent::end_element()).map_err(fail)?;
            }
            writer.write(XmlEvent::end_element()).map_err(fail)?;
        }

        write_atomically(&self.xml_path, &output)
    }

    fn append_to_transcript(&self, message: &Message) -> Result<(), StorageError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.transcript_path)
            .map_err(|e| StorageError::io(&self.transcript_path, e))?;

        writeln!(file, "{}", transcript_line(message))
            .map_err(|e| StorageError::io(&self.transcript_path, e))
    }
}

/// The bracketed one-line form shared by the transcript file and
/// conversation export: `[timestamp] sender a receiver: content`.
pub fn transcript_line(message: &Message) -> String {
    format!(
        "[{}] {} a {}: {}",
        message.timestamp_text(),
        message.sender.name,
        message.receiver.name,
        message.content
    )
}

fn find_user<'a>(users: &'a [User], name: &str) -> Option<&'a User> {
    users.iter().find(|u| u.name == name)
}
