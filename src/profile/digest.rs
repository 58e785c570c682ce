use std::collections::BTreeSet;

use serde_json::Value;

use crate::quiz::SkillLevel;

/// What the summarizer learned about the learner from their chat messages.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct ConversationDigest {
    #[serde(default)]
    pub vocab_weakness: BTreeSet<String>,
    #[serde(default)]
    pub grammar_patterns: BTreeSet<String>,
    #[serde(default)]
    pub common_mistakes: BTreeSet<String>,
    #[serde(default)]
    pub overall_skill: SkillLevel,
}

/// Outcome of reading an external response: either it parsed (fields that
/// failed validation still fall back individually) or nothing usable came
/// back and the whole value is the default.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Valid(T),
    Defaulted(T),
}

impl<T> Parsed<T> {
    pub fn into_inner(self) -> T {
        match self {
            Parsed::Valid(value) | Parsed::Defaulted(value) => value,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Parsed::Defaulted(_))
    }
}

impl ConversationDigest {
    /// Validates a raw summarizer reply field by field. Anything outside the
    /// outermost braces is ignored.
    pub fn parse(raw: &str) -> Parsed<ConversationDigest> {
        let object = match extract_json_object(raw).and_then(|s| serde_json::from_str::<Value>(s).ok()) {
            Some(Value::Object(object)) => object,
            _ => return Parsed::Defaulted(ConversationDigest::default()),
        };

        let overall_skill = match object.get("overall_skill") {
            Some(Value::String(skill)) => SkillLevel::from(skill.clone()),
            _ => SkillLevel::NotAssessed,
        };

        Parsed::Valid(ConversationDigest {
            vocab_weakness: string_set(object.get("vocab_weakness")),
            grammar_patterns: string_set(object.get("grammar_patterns")),
            common_mistakes: string_set(object.get("common_mistakes")),
            overall_skill,
        })
    }
}

pub(crate) fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

// A list of strings, or nothing at all: a list with a non-string item is
// treated as malformed.
fn string_set(value: Option<&Value>) -> BTreeSet<String> {
    let Some(Value::Array(items)) = value else {
        return BTreeSet::new();
    };
    let strings: Option<BTreeSet<String>> = items
        .iter()
        .map(|item| item.as_str().map(|s| s.trim().to_string()))
        .collect();
    strings
        .unwrap_or_default()
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect()
}
