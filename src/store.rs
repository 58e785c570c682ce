use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer};

use crate::profile::digest::ConversationDigest;
use crate::quiz::session::AnswerRecord;

pub const DEFAULT_USER_ID: &str = "default_user";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("learner data I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("learner data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One finished quiz. Appended once, never edited.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuizHistoryEntry {
    #[serde(default = "unknown_time", deserialize_with = "lenient_timestamp")]
    pub timestamp: DateTime<Local>,
    #[serde(default)]
    pub questions: Vec<AnswerRecord>,
}

impl QuizHistoryEntry {
    pub fn correct(&self) -> usize {
        self.questions.iter().filter(|q| q.is_correct).count()
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LearnerData {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "Local::now", deserialize_with = "lenient_timestamp")]
    pub created_at: DateTime<Local>,
    /// Last saved conversation digest.
    #[serde(default)]
    pub profile: ConversationDigest,
    #[serde(default)]
    pub quiz_history: Vec<QuizHistoryEntry>,
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

/// Stand-in for a timestamp that is missing or can't be read.
pub fn unknown_time() -> DateTime<Local> {
    DateTime::<Local>::from(std::time::UNIX_EPOCH)
}

/// Reads RFC 3339 as well as offset-less ISO 8601 (taken as local time).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    let raw = raw.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Some(time.with_timezone(&Local));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;
    Local.from_local_datetime(&naive).earliest()
}

/// Never fails: null or unreadable timestamps become [`unknown_time`].
pub fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Local>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(parse_timestamp)
        .unwrap_or_else(unknown_time))
}

impl Default for LearnerData {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            created_at: Local::now(),
            profile: ConversationDigest::default(),
            quiz_history: Vec::new(),
        }
    }
}

/// Whole-file JSON store for the single learner.
#[derive(Debug, Clone)]
pub struct LearnerStore {
    path: PathBuf,
}

impl LearnerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is a new learner, not an error.
    pub fn load(&self) -> Result<LearnerData, StoreError> {
        if !self.path.exists() {
            return Ok(LearnerData::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, data: &LearnerData) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }

    pub fn append_history(&self, entry: QuizHistoryEntry) -> Result<(), StoreError> {
        let mut data = self.load()?;
        data.quiz_history.push(entry);
        self.save(&data)
    }
}
