use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::ai_helper::{with_timeout, ServiceError};
use crate::profile::digest::{extract_json_object, Parsed};
use crate::vocab::{VocabEntry, VocabStore};

pub const NO_VOCAB_TARGET_TEXT: &str = "I couldn't detect which word you're asking about.";
pub const UNAVAILABLE_TEXT: &str =
    "Sorry, I can't answer right now. Try again in a moment, or take a quiz meanwhile!";

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["'](.+?)["']"#).expect("invalid quote regex"));

static VOCAB_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"what does the word\s+(.+?)\s+mean",
        r"what does\s+(.+?)\s+mean",
        r"what(?: is|'s) the (?:meaning|definition) of\s+(.+?)(?:\?|$)",
        r"(?:definition|meaning) of\s+(.+?)(?:\?|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid vocab regex"))
    .collect()
});

static GRAMMAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:(?:correct|fix|check) (?:the|my) (?:grammar|sentence)|grammar check|correct this sentence|please (?:correct|fix))[: ]+(.+)",
    )
    .expect("invalid grammar regex")
});

/// What a chat message is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Intent {
    VocabLookup,
    GrammarCorrection,
    #[default]
    GeneralChat,
}

impl Intent {
    fn from_label(label: &str) -> Intent {
        match label.trim().to_lowercase().as_str() {
            "vocab_lookup" => Intent::VocabLookup,
            "grammar_correction" => Intent::GrammarCorrection,
            _ => Intent::GeneralChat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntentAnalysis {
    pub intent: Intent,
    pub vocab_target: Option<String>,
    pub grammar_target: Option<String>,
}

impl IntentAnalysis {
    /// Reads the classifier reply. Unknown intents are general chat, and
    /// targets that aren't non-empty strings are dropped.
    pub fn parse(raw: &str) -> Parsed<IntentAnalysis> {
        let object = match extract_json_object(raw).and_then(|s| serde_json::from_str::<Value>(s).ok()) {
            Some(Value::Object(object)) => object,
            _ => return Parsed::Defaulted(IntentAnalysis::default()),
        };

        let intent = match object.get("intent") {
            Some(Value::String(label)) => Intent::from_label(label),
            _ => Intent::GeneralChat,
        };

        Parsed::Valid(IntentAnalysis {
            intent,
            vocab_target: target(&object, "vocab_target"),
            grammar_target: target(&object, "grammar_target"),
        })
    }
}

fn target(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Quoted text, else the word after "what does ... mean" and friends.
pub fn extract_vocab_target(message: &str) -> Option<String> {
    let text = message.trim();
    if let Some(quoted) = QUOTED.captures(text) {
        return Some(quoted[1].trim().to_string());
    }
    let lower = text.to_lowercase();
    VOCAB_PATTERNS
        .iter()
        .find_map(|re| re.captures(&lower))
        .map(|caps| caps[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Quoted text, else whatever follows "correct my sentence:" and friends,
/// else the whole message.
pub fn extract_grammar_target(message: &str) -> String {
    let text = message.trim();
    if let Some(quoted) = QUOTED.captures(text) {
        return quoted[1].trim().to_string();
    }
    GRAMMAR_PATTERN
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| text.to_string())
}

/// Dictionary context handed to the model along with the looked-up word.
pub fn dictionary_prompt(target: &str, entry: Option<&VocabEntry>) -> String {
    let Some(entry) = entry else {
        return format!("Target: {}\n\nDictionary data: NONE", target);
    };
    let example = |i: usize| entry.examples.get(i).map_or("N/A", String::as_str);
    format!(
        "Target: {}\n\nDictionary data:\nPOS: {}\nDefinition: {}\nExample1: {}\nExample2: {}\nSynonyms: {}",
        target,
        entry.pos.as_deref().unwrap_or("N/A"),
        if entry.definition.is_empty() { "N/A" } else { entry.definition.as_str() },
        example(0),
        example(1),
        if entry.synonyms.is_empty() {
            "None".to_string()
        } else {
            entry.synonyms.join(", ")
        }
    )
}

/// The model calls behind chat replies.
#[async_trait]
pub trait TutorService: Send + Sync {
    /// Raw JSON intent classification of `message`.
    async fn classify(&self, message: &str) -> Result<String, ServiceError>;
    async fn correct(&self, sentence: &str) -> Result<String, ServiceError>;
    async fn define(&self, target: &str, entry: Option<&VocabEntry>) -> Result<String, ServiceError>;
    async fn chat(&self, message: &str) -> Result<String, ServiceError>;
}

/// Answers free-text chat: classifies the message, then looks up a word,
/// corrects a sentence or just chats.
pub struct Tutor {
    service: Arc<dyn TutorService>,
    vocab: VocabStore,
    timeout: Duration,
}

impl Tutor {
    pub fn new(service: Arc<dyn TutorService>, vocab: VocabStore, timeout: Duration) -> Self {
        Self {
            service,
            vocab,
            timeout,
        }
    }

    pub async fn analyze(&self, message: &str) -> IntentAnalysis {
        match with_timeout(self.timeout, self.service.classify(message)).await {
            Ok(raw) => {
                let parsed = IntentAnalysis::parse(&raw);
                if parsed.is_default() {
                    debug!("Intent reply wasn't usable JSON: {:?}", raw);
                }
                parsed.into_inner()
            }
            Err(err) => {
                warn!("Intent classification failed: {}", err);
                IntentAnalysis::default()
            }
        }
    }

    pub async fn reply(&self, message: &str) -> String {
        let analysis = self.analyze(message).await;
        info!("Chat intent: {:?}", analysis.intent);

        let answer = match analysis.intent {
            Intent::VocabLookup => {
                let Some(target) = analysis.vocab_target.or_else(|| extract_vocab_target(message)) else {
                    return NO_VOCAB_TARGET_TEXT.to_string();
                };
                let entry = self.vocab.best_entry(&target);
                debug!("Looking up {:?}, dictionary hit: {}", target, entry.is_some());
                with_timeout(self.timeout, self.service.define(&target, entry)).await
            }
            Intent::GrammarCorrection => {
                let sentence = analysis
                    .grammar_target
                    .unwrap_or_else(|| extract_grammar_target(message));
                with_timeout(self.timeout, self.service.correct(&sentence)).await
            }
            Intent::GeneralChat => with_timeout(self.timeout, self.service.chat(message)).await,
        };

        answer.unwrap_or_else(|err| {
            warn!("Tutor reply failed: {}", err);
            UNAVAILABLE_TEXT.to_string()
        })
    }
}
