use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};

use super::align::recover_blank;
use super::distractors::make_distractors;
use super::selector::select_topic;
use super::topics::Topic;
use super::{Difficulty, Question, BLANK_PLACEHOLDER};
use crate::ai_helper::{with_timeout, Completer};
use crate::profile::LearnerProfile;
use crate::retry::RetryBudget;

/// Attempts allowed per requested question.
pub const ATTEMPTS_PER_QUESTION: usize = 15;

const ANSWER_PUNCTUATION: &[char] = &[',', '.', '?', '!', ';', ':', '"', '\'', '(', ')'];

pub struct QuestionBuilder {
    completer: Arc<dyn Completer>,
    timeout: Duration,
}

impl QuestionBuilder {
    pub fn new(completer: Arc<dyn Completer>, timeout: Duration) -> Self {
        Self { completer, timeout }
    }

    /// One attempt at a question for `profile`. `None` means the attempt
    /// failed and the caller may try again.
    pub async fn build_one(&self, profile: &LearnerProfile) -> Option<Question> {
        let difficulty = profile.overall_skill.difficulty();
        let (topic, skeleton) = {
            let mut rng = thread_rng();
            let topic = select_topic(profile, &mut rng);
            let skeleton = *topic.skeletons(difficulty).choose(&mut rng)?;
            (topic, skeleton)
        };

        let completion = match with_timeout(self.timeout, self.completer.complete(skeleton)).await {
            Ok(completion) => completion,
            Err(err) => {
                warn!("Completion failed for {:?}: {}", skeleton, err);
                return None;
            }
        };

        let question = assemble(topic, difficulty, skeleton, &completion, &mut thread_rng());
        if question.is_none() {
            debug!("Rejected completion {:?} for {:?}", completion, skeleton);
        }
        question
    }

    /// Collects up to `count` questions within `count * ATTEMPTS_PER_QUESTION`
    /// attempts. Fewer questions (possibly none) come back when the budget
    /// runs out.
    pub async fn build_quiz(&self, profile: &LearnerProfile, count: usize) -> Vec<Question> {
        let mut budget = RetryBudget::new(count * ATTEMPTS_PER_QUESTION);
        let mut questions = Vec::with_capacity(count);

        while questions.len() < count {
            match budget.retry(move || self.build_one(profile)).await {
                Some(question) => questions.push(question),
                None => break,
            }
        }

        info!(
            "Built {}/{} questions in {} attempts",
            questions.len(),
            count,
            budget.used()
        );
        questions
    }
}

/// Turns a skeleton and its completion into a finished question, or `None`
/// if the completion doesn't give a usable answer for `topic`.
pub fn assemble<R: Rng + ?Sized>(
    topic: Topic,
    difficulty: Difficulty,
    skeleton: &str,
    completion: &str,
    rng: &mut R,
) -> Option<Question> {
    let raw_answer = recover_blank(skeleton, completion)?;
    let answer = raw_answer.trim_matches(ANSWER_PUNCTUATION);
    let pool_answer = topic.pool_word(answer)?;

    // keep the completion's casing, e.g. "What" at the start of a question
    let answer = answer.to_string();
    let text = blank_out(completion, &answer)?;

    let mut choices: Vec<String> = make_distractors(topic, pool_answer, difficulty, rng)
        .into_iter()
        .map(|d| match_case(&d, &answer))
        .collect();
    choices.push(answer.clone());

    let distinct: HashSet<&String> = choices.iter().collect();
    if distinct.len() != choices.len() {
        return None;
    }

    choices.shuffle(rng);
    let correct_index = choices.iter().position(|c| *c == answer)?;

    Some(Question {
        topic,
        difficulty,
        text,
        choices,
        correct_index,
        correct_answer: answer,
        original_sentence: completion.to_string(),
        explanation: None,
    })
}

/// Replaces the first token equal to `answer` (ignoring surrounding
/// punctuation) with the placeholder, keeping the punctuation.
fn blank_out(sentence: &str, answer: &str) -> Option<String> {
    let mut tokens: Vec<String> = sentence.split_whitespace().map(str::to_string).collect();
    let token = tokens
        .iter_mut()
        .find(|t| t.trim_matches(ANSWER_PUNCTUATION) == answer)?;
    *token = token.replacen(answer, BLANK_PLACEHOLDER, 1);
    Some(tokens.join(" "))
}

fn match_case(word: &str, like: &str) -> String {
    let capitalized = like.chars().next().map_or(false, char::is_uppercase);
    if !capitalized {
        return word.to_string();
    }
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_helper::mock::{EchoCompleter, ScriptedCompleter};
    use crate::quiz::SkillLevel;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::Ordering;

    fn tense_profile() -> LearnerProfile {
        LearnerProfile {
            grammar_patterns: ["tense".to_string()].into(),
            overall_skill: SkillLevel::Advanced,
            ..LearnerProfile::default()
        }
    }

    #[test]
    fn assembles_advanced_tense_question() {
        let mut rng = StdRng::seed_from_u64(17);
        let question = assemble(
            Topic::Tense,
            Difficulty::Advanced,
            "Tom <BLANK> to school yesterday.",
            "Tom went to school yesterday.",
            &mut rng,
        )
        .unwrap();

        assert_eq!(question.correct_answer, "went");
        assert_eq!(question.text, "Tom ___ to school yesterday.");
        assert_eq!(question.original_sentence, "Tom went to school yesterday.");
        assert_eq!(question.choices.len(), 4);
        assert_eq!(question.choices[question.correct_index], "went");
        let mut sorted = question.choices.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["go", "goes", "gone", "went"]);
        assert_eq!(question.explanation, None);
    }

    #[test]
    fn advanced_tense_distractors_start_with_neighbours() {
        let mut rng = StdRng::seed_from_u64(2);
        let distractors = make_distractors(Topic::Tense, "went", Difficulty::Advanced, &mut rng);
        let first_two: HashSet<&str> = distractors[..2].iter().map(String::as_str).collect();
        assert_eq!(first_two, HashSet::from(["goes", "gone"]));
        assert_eq!(distractors[2], "go");
    }

    #[test]
    fn capitalised_answer_keeps_case_across_choices() {
        let mut rng = StdRng::seed_from_u64(4);
        let question = assemble(
            Topic::WhQuestion,
            Difficulty::Basic,
            "<BLANK> is your name?",
            "What is your name?",
            &mut rng,
        )
        .unwrap();
        assert_eq!(question.correct_answer, "What");
        assert_eq!(question.text, "___ is your name?");
        assert!(question
            .choices
            .iter()
            .all(|c| c.chars().next().unwrap().is_uppercase()));
    }

    #[test]
    fn punctuation_is_stripped_and_kept_in_text() {
        let mut rng = StdRng::seed_from_u64(8);
        let question = assemble(
            Topic::Preposition,
            Difficulty::Basic,
            "She looked <BLANK>",
            "She looked on.",
            &mut rng,
        )
        .unwrap();
        assert_eq!(question.correct_answer, "on");
        assert_eq!(question.text, "She looked ___.");
    }

    #[test]
    fn off_topic_answer_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(assemble(
            Topic::Tense,
            Difficulty::Basic,
            "Tom <BLANK> to school yesterday.",
            "Tom walked to school yesterday.",
            &mut rng,
        )
        .is_none());
        assert!(assemble(
            Topic::Article,
            Difficulty::Basic,
            "I bought <BLANK> apple.",
            "I bought",
            &mut rng,
        )
        .is_none());
    }

    #[test]
    fn blank_out_replaces_first_occurrence_only() {
        assert_eq!(
            blank_out("The cat and the dog.", "the").as_deref(),
            Some("The cat and ___ dog.")
        );
        assert_eq!(blank_out("no match here", "an"), None);
    }

    #[tokio::test]
    async fn failing_builder_spends_whole_budget() {
        let completer = Arc::new(ScriptedCompleter::always("zzz zzz zzz"));
        let builder = QuestionBuilder::new(completer.clone(), Duration::from_secs(1));

        let quiz = builder.build_quiz(&tense_profile(), 5).await;
        assert!(quiz.is_empty());
        assert_eq!(completer.calls(), 75);
    }

    #[tokio::test]
    async fn service_errors_count_as_attempts() {
        let completer = Arc::new(ScriptedCompleter::failing());
        let builder = QuestionBuilder::new(completer.clone(), Duration::from_secs(1));

        let quiz = builder.build_quiz(&LearnerProfile::default(), 2).await;
        assert!(quiz.is_empty());
        assert_eq!(completer.calls(), 30);
    }

    #[tokio::test]
    async fn stops_as_soon_as_enough_questions_exist() {
        // "went" only fits tense skeletons; other topics fail and retry
        let completer = Arc::new(EchoCompleter::new("went"));
        let builder = QuestionBuilder::new(completer.clone(), Duration::from_secs(1));

        let quiz = builder.build_quiz(&tense_profile(), 3).await;
        assert_eq!(quiz.len(), 3);
        assert!(quiz.iter().all(|q| q.topic == Topic::Tense));
        assert!(quiz.iter().all(|q| q.difficulty == Difficulty::Advanced));
        assert!(completer.calls.load(Ordering::SeqCst) <= 45);
    }
}
