//! Application configuration.
//!
//! The data files the client reads and writes. The file names match the
//! historical defaults; they live in the current working directory unless a
//! data directory is supplied. The config itself is a small JSON file in the
//! platform config directory.

use anyhow::{anyhow, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

pub const DEFAULT_USERS_FILE: &str = "UsersData.xml";
pub const DEFAULT_MESSAGES_FILE: &str = "ChatData.xml";
pub const DEFAULT_TRANSCRIPT_FILE: &str = "ChatData.txt";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub users_path: PathBuf,
    pub messages_path: PathBuf,
    pub transcript_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            users_path: PathBuf::from(DEFAULT_USERS_FILE),
            messages_path: PathBuf::from(DEFAULT_MESSAGES_FILE),
            transcript_path: PathBuf::from(DEFAULT_TRANSCRIPT_FILE),
        }
    }
}

impl Config {
    /// All three data files rebased into `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Config {
            users_path: dir.join(DEFAULT_USERS_FILE),
            messages_path: dir.join(DEFAULT_MESSAGES_FILE),
            transcript_path: dir.join(DEFAULT_TRANSCRIPT_FILE),
        }
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?
        .join("charla");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.json"))
}

pub fn save_config(config: &Config) -> Result<()> {
    let config_path = get_config_path()?;
    let file = File::create(config_path)?;
    serde_json::to_writer_pretty(file, config)?;

    info!("Configuration saved");
    Ok(())
}

/// Load the saved configuration, or `None` when no config file exists yet.
pub fn load_config() -> Result<Option<Config>> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        return Ok(None);
    }

    let config_path_str = config_path.display().to_string();

    let mut file = File::open(config_path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let config: Config = serde_json::from_str(&contents)?;
    info!("Loaded configuration from {}", config_path_str);

    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let config = Config::default();
        assert_eq!(config.users_path, PathBuf::from("UsersData.xml"));
        assert_eq!(config.messages_path, PathBuf::from("ChatData.xml"));
        assert_eq!(config.transcript_path, PathBuf::from("ChatData.txt"));
    }

    #[test]
    fn test_in_dir_rebases_all_files() {
        let config = Config::in_dir(Path::new("/tmp/chat-data"));
        assert_eq!(config.users_path, PathBuf::from("/tmp/chat-data/UsersData.xml"));
        assert_eq!(config.messages_path, PathBuf::from("/tmp/chat-data/ChatData.xml"));
        assert_eq!(config.transcript_path, PathBuf::from("/tmp/chat-data/ChatData.txt"));
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = Config::in_dir(Path::new("data"));
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.users_path, config.users_path);
        assert_eq!(back.transcript_path, config.transcript_path);
    }
}
