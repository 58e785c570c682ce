pub mod cache;
pub mod digest;
pub mod stats;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use log::{debug, info, warn};

use crate::ai_helper::{with_timeout, Summarizer};
use crate::chat_log::ChatLog;
use crate::quiz::session::AnswerRecord;
use crate::quiz::SkillLevel;
use crate::store::{LearnerData, LearnerStore, QuizHistoryEntry, StoreError};
use cache::TtlCache;
use digest::ConversationDigest;
use stats::{Grade, QuizDifficulty, QuizStats};

/// Everything quiz generation needs to know about the learner.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct LearnerProfile {
    pub vocab_weakness: BTreeSet<String>,
    pub grammar_patterns: BTreeSet<String>,
    pub common_mistakes: BTreeSet<String>,
    pub overall_skill: SkillLevel,
    pub total_quizzes: usize,
    pub average_accuracy: f64,
    pub recent_quiz_levels: Vec<Grade>,
    pub quiz_difficulty: QuizDifficulty,
}

impl LearnerProfile {
    pub fn new(digest: ConversationDigest, stats: &QuizStats) -> Self {
        Self {
            vocab_weakness: digest.vocab_weakness,
            grammar_patterns: digest.grammar_patterns,
            common_mistakes: digest.common_mistakes,
            overall_skill: digest.overall_skill,
            total_quizzes: stats.total_quizzes,
            average_accuracy: stats.average_accuracy,
            recent_quiz_levels: stats.recent_levels.clone(),
            quiz_difficulty: QuizDifficulty::from_accuracy(stats.average_accuracy),
        }
    }
}

/// Score of one finished quiz.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuizResult {
    pub timestamp: DateTime<Local>,
    pub score: usize,
    pub total: usize,
    pub accuracy: f64,
    pub grade: Grade,
}

impl QuizResult {
    pub fn new(score: usize, total: usize) -> Self {
        let accuracy = if total > 0 {
            score as f64 / total as f64
        } else {
            0.0
        };
        Self {
            timestamp: Local::now(),
            score,
            total,
            accuracy,
            grade: Grade::from_accuracy(accuracy),
        }
    }

    pub fn accuracy_percent(&self) -> f64 {
        self.accuracy * 100.0
    }
}

/// Builds the learner profile from stored data and the conversation digest,
/// and keeps it cached until it expires or a new result comes in.
pub struct ProfileEngine {
    store: LearnerStore,
    chat_log: ChatLog,
    summarizer: Arc<dyn Summarizer>,
    cache: TtlCache<LearnerProfile>,
    timeout: Duration,
}

impl ProfileEngine {
    pub fn new(
        store: LearnerStore,
        chat_log: ChatLog,
        summarizer: Arc<dyn Summarizer>,
        ttl: chrono::Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            chat_log,
            summarizer,
            cache: TtlCache::new(ttl),
            timeout,
        }
    }

    pub async fn build_profile(&mut self) -> LearnerProfile {
        let now = Utc::now();
        if let Some(profile) = self.cache.get(now) {
            debug!("Serving cached learner profile");
            return profile.clone();
        }

        info!("Rebuilding learner profile");
        let data = self.load_data();
        let digest = self.summarize().await;
        let history = data.as_ref().map_or(&[][..], |d| &d.quiz_history[..]);
        let profile = LearnerProfile::new(digest.clone(), &QuizStats::from_history(history));

        // an unreadable file is left as it is rather than replaced by defaults
        if let Some(mut data) = data {
            data.profile = digest;
            if let Err(err) = self.store.save(&data) {
                warn!("Couldn't save profile snapshot: {}", err);
            }
        }

        self.cache.insert(Utc::now(), profile).clone()
    }

    /// Scores a finished quiz and forces the next `build_profile` to rebuild.
    pub fn record_result(&mut self, score: usize, total: usize) -> QuizResult {
        self.cache.invalidate();
        QuizResult::new(score, total)
    }

    /// Appends a finished quiz to the history. Leaves the cache alone.
    pub fn record_session(&self, answers: Vec<AnswerRecord>) -> Result<(), StoreError> {
        self.store.append_history(QuizHistoryEntry {
            timestamp: Local::now(),
            questions: answers,
        })
    }

    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }

    pub fn quiz_history(&self) -> Vec<QuizHistoryEntry> {
        self.load_data().unwrap_or_default().quiz_history
    }

    pub fn user_stats(&self) -> QuizStats {
        QuizStats::from_history(&self.load_data().unwrap_or_default().quiz_history)
    }

    fn load_data(&self) -> Option<LearnerData> {
        match self.store.load() {
            Ok(data) => Some(data),
            Err(err) => {
                warn!("Couldn't read learner data {:?}: {}", self.store.path(), err);
                None
            }
        }
    }

    async fn summarize(&self) -> ConversationDigest {
        let messages = self.chat_log.latest_user_messages();
        if messages.is_empty() {
            return ConversationDigest::default();
        }

        match with_timeout(self.timeout, self.summarizer.summarize(&messages)).await {
            Ok(raw) => {
                let parsed = ConversationDigest::parse(&raw);
                if parsed.is_default() {
                    warn!("Summary reply wasn't usable JSON, using defaults");
                }
                parsed.into_inner()
            }
            Err(err) => {
                warn!("Summarizer failed: {}", err);
                ConversationDigest::default()
            }
        }
    }
}
