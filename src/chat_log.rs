use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use log::warn;

use crate::store::{lenient_timestamp, StoreError};

const TITLE_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    #[serde(default = "Local::now", deserialize_with = "lenient_timestamp")]
    pub created_at: DateTime<Local>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl ChatSession {
    fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            created_at: Local::now(),
            title: String::new(),
            messages: Vec::new(),
        }
    }

    pub fn user_messages(&self) -> impl Iterator<Item = &str> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.text.as_str())
    }
}

/// Chat transcripts, one JSON file per session, the raw material for the
/// conversation digest.
#[derive(Debug, Clone)]
pub struct ChatLog {
    dir: PathBuf,
}

impl ChatLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", session_id))
    }

    pub fn load(&self, session_id: &str) -> Result<Option<ChatSession>, StoreError> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(read_session(&path)?))
    }

    /// Appends a message, creating the session on first use. The first user
    /// message names the session.
    pub fn append(&self, session_id: &str, role: Role, text: &str) -> Result<(), StoreError> {
        let mut session = self
            .load(session_id)?
            .unwrap_or_else(|| ChatSession::new(session_id));

        session.messages.push(ChatMessage {
            role,
            text: text.to_string(),
        });
        if role == Role::User && session.title.is_empty() {
            session.title = text.trim().chars().take(TITLE_CHARS).collect();
        }

        fs::create_dir_all(&self.dir)?;
        fs::write(
            self.session_path(session_id),
            serde_json::to_string_pretty(&session)?,
        )?;
        Ok(())
    }

    /// Every readable session. Unreadable files are skipped.
    pub fn sessions(&self) -> Vec<(SystemTime, ChatSession)> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut sessions = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            match read_session(&path) {
                Ok(session) => sessions.push((modified, session)),
                Err(err) => warn!("Skipping chat session {:?}: {}", path, err),
            }
        }
        sessions
    }

    /// User messages of the most recently modified session.
    pub fn latest_user_messages(&self) -> Vec<String> {
        self.sessions()
            .into_iter()
            .max_by(|(a, sa), (b, sb)| a.cmp(b).then_with(|| sa.created_at.cmp(&sb.created_at)))
            .map(|(_, session)| session.user_messages().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn total_user_messages(&self) -> usize {
        self.sessions()
            .iter()
            .map(|(_, session)| session.user_messages().count())
            .sum()
    }
}

fn read_session(path: &Path) -> Result<ChatSession, StoreError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
