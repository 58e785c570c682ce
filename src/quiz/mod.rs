pub mod align;
pub mod builder;
pub mod distractors;
pub mod selector;
pub mod session;
pub mod topics;

use std::fmt;

use topics::Topic;

/// Placeholder shown to the learner in place of the answer.
pub const BLANK_PLACEHOLDER: &str = "___";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Difficulty {
    Basic,
    Intermediate,
    Advanced,
}

/// Skill level reported by the conversation summary. Anything the summary
/// produces that isn't a known tier collapses into `NotAssessed` ("N/A").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum SkillLevel {
    Basic,
    Intermediate,
    Advanced,
    #[default]
    NotAssessed,
}

impl SkillLevel {
    /// Tier used to pick skeletons. Unassessed learners start at `Basic`.
    pub fn difficulty(&self) -> Difficulty {
        match self {
            SkillLevel::Basic | SkillLevel::NotAssessed => Difficulty::Basic,
            SkillLevel::Intermediate => Difficulty::Intermediate,
            SkillLevel::Advanced => Difficulty::Advanced,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SkillLevel::Basic => "Basic",
            SkillLevel::Intermediate => "Intermediate",
            SkillLevel::Advanced => "Advanced",
            SkillLevel::NotAssessed => "N/A",
        }
    }
}

impl From<String> for SkillLevel {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "basic" => SkillLevel::Basic,
            "intermediate" => SkillLevel::Intermediate,
            "advanced" => SkillLevel::Advanced,
            _ => SkillLevel::NotAssessed,
        }
    }
}

impl From<Option<String>> for SkillLevel {
    fn from(value: Option<String>) -> Self {
        value.map_or(SkillLevel::NotAssessed, SkillLevel::from)
    }
}

impl From<SkillLevel> for String {
    fn from(value: SkillLevel) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub topic: Topic,
    pub difficulty: Difficulty,
    /// Completed sentence with the answer replaced by [`BLANK_PLACEHOLDER`].
    pub text: String,
    pub choices: Vec<String>,
    pub correct_index: usize,
    pub correct_answer: String,
    pub original_sentence: String,
    pub explanation: Option<String>,
}

impl Question {
    /// Renders the question the way the learner sees it, `number` is 1-based.
    pub fn display(&self, number: usize) -> String {
        let mut lines = vec![format!("Q{}: {}", number, self.text)];
        for (i, choice) in self.choices.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, choice));
        }
        lines.push(String::new());
        lines.push(format!(
            "Please answer with {}.",
            choice_numbers(self.choices.len())
        ));
        lines.join("\n")
    }
}

// "1, 2, 3, or 4"
fn choice_numbers(count: usize) -> String {
    let numbers = (1..=count).map(|n| n.to_string()).collect::<Vec<_>>();
    match numbers.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{}, or {}", rest.join(", "), last),
        Some((last, _)) => last.clone(),
        None => String::new(),
    }
}

pub fn progress(number: usize, total: usize) -> String {
    format!("Q{}/{}", number, total)
}
