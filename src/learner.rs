use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::ai_helper::{with_timeout, Completer, Explainer, Summarizer};
use crate::chat_log::{ChatLog, Role};
use crate::config::Config;
use crate::profile::stats::{Grade, QuizStats};
use crate::profile::{LearnerProfile, ProfileEngine, QuizResult};
use crate::quiz::builder::QuestionBuilder;
use crate::quiz::session::{AnswerRecord, Quiz, QuizState};
use crate::quiz::{progress, Question};
use crate::retry::retry;
use crate::store::{LearnerStore, QuizHistoryEntry, StoreError};

pub const NO_QUIZ_TEXT: &str = "I couldn't generate a quiz right now. Please try again later.";
pub const NOT_ACTIVE_TEXT: &str = "Quiz not active";

const EXPLANATION_ATTEMPTS: usize = 2;

/// Feedback for one submitted answer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerFeedback {
    pub is_correct: bool,
    pub feedback: String,
    pub explanation: Option<String>,
    /// Present once the last question has been answered.
    pub result: Option<QuizResult>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    NotActive,
    InvalidChoice { choice: usize, choices: usize },
    Answered(AnswerFeedback),
}

/// The question the learner should answer next.
#[derive(Debug, Clone, PartialEq)]
pub struct NextQuestion {
    pub progress: String,
    pub text: String,
    pub choices: usize,
}

/// Everything one learner's requests touch: profile cache, quiz state and
/// the services behind them. Owned by the caller and handed to every call.
pub struct LearnerContext {
    profiles: ProfileEngine,
    builder: QuestionBuilder,
    explainer: Arc<dyn Explainer>,
    chat_log: ChatLog,
    state: QuizState,
    timeout: Duration,
    refresh_every: usize,
}

/// The three external services the context depends on.
pub struct Services {
    pub completer: Arc<dyn Completer>,
    pub summarizer: Arc<dyn Summarizer>,
    pub explainer: Arc<dyn Explainer>,
}

impl LearnerContext {
    pub fn new(config: &Config, services: Services) -> Self {
        let chat_log = ChatLog::new(config.sessions_dir());
        Self {
            profiles: ProfileEngine::new(
                LearnerStore::new(config.user_data_path()),
                chat_log.clone(),
                services.summarizer,
                config.profile_ttl,
                config.service_timeout,
            ),
            builder: QuestionBuilder::new(services.completer, config.service_timeout),
            explainer: services.explainer,
            chat_log,
            state: QuizState::Idle,
            timeout: config.service_timeout,
            refresh_every: config.refresh_every,
        }
    }

    /// Cached profile, rebuilt when stale.
    pub async fn prepare_quiz(&mut self) -> LearnerProfile {
        self.profiles.build_profile().await
    }

    /// Builds up to `count` questions with explanations and makes them the
    /// active quiz, discarding any quiz still in progress. An empty result
    /// leaves the current state alone.
    pub async fn generate_quiz(&mut self, profile: &LearnerProfile, count: usize) -> Vec<Question> {
        let mut questions = self.builder.build_quiz(profile, count).await;
        if questions.is_empty() {
            warn!("No questions could be generated");
            return questions;
        }

        for question in questions.iter_mut() {
            question.explanation = self.explain(question).await;
        }

        if self.state.is_active() {
            info!("Replacing unfinished quiz");
        }
        self.state = QuizState::InProgress(Quiz::new(questions.clone()));
        questions
    }

    /// Answers the current question. `choice` is 1-based, as shown to the
    /// learner.
    pub fn submit_answer(&mut self, choice: usize) -> SubmitOutcome {
        let QuizState::InProgress(quiz) = &mut self.state else {
            return SubmitOutcome::NotActive;
        };
        let choices = quiz.current().map_or(0, |q| q.choices.len());
        let Some(step) = choice.checked_sub(1).and_then(|index| quiz.answer(index)) else {
            return SubmitOutcome::InvalidChoice { choice, choices };
        };

        let record = &step.record;
        let feedback = if record.is_correct {
            "Correct!".to_string()
        } else {
            format!(
                "Incorrect.\nCorrect answer: {}. {}",
                record.correct_index + 1,
                record.choices[record.correct_index]
            )
        };

        let result = if step.finished {
            let (answers, score, total) = (quiz.answers.clone(), quiz.score, quiz.total());
            Some(self.complete(answers, score, total))
        } else {
            None
        };

        SubmitOutcome::Answered(AnswerFeedback {
            is_correct: record.is_correct,
            feedback,
            explanation: record.explanation.clone(),
            result,
        })
    }

    fn complete(&mut self, answers: Vec<AnswerRecord>, score: usize, total: usize) -> QuizResult {
        if let Err(err) = self.profiles.record_session(answers) {
            warn!("Couldn't save quiz history: {}", err);
        }
        let result = self.profiles.record_result(score, total);
        info!(
            "Quiz finished: {}/{} ({:.0}%), grade {}",
            score,
            total,
            result.accuracy_percent(),
            result.grade
        );
        self.state = QuizState::Completed { score, total };
        result
    }

    /// The question awaiting an answer, formatted for display.
    pub fn next_question(&self) -> Option<NextQuestion> {
        let quiz = self.state.quiz()?;
        let question = quiz.current()?;
        let number = quiz.current_question + 1;
        Some(NextQuestion {
            progress: progress(number, quiz.total()),
            text: question.display(number),
            choices: question.choices.len(),
        })
    }

    pub fn state(&self) -> &QuizState {
        &self.state
    }

    pub fn quiz_history(&self) -> Vec<QuizHistoryEntry> {
        self.profiles.quiz_history()
    }

    pub fn user_stats(&self) -> QuizStats {
        self.profiles.user_stats()
    }

    pub fn invalidate_profile_cache(&mut self) {
        info!("Profile cache invalidated");
        self.profiles.invalidate();
    }

    /// Logs a chat message. Every `refresh_every`-th user message across all
    /// sessions invalidates the profile so the digest picks it up.
    pub fn record_chat_message(&mut self, session_id: &str, role: Role, text: &str) -> Result<(), StoreError> {
        self.chat_log.append(session_id, role, text)?;
        if role == Role::User && self.refresh_every > 0 {
            let total = self.chat_log.total_user_messages();
            if total % self.refresh_every == 0 {
                self.invalidate_profile_cache();
            }
        }
        Ok(())
    }

    async fn explain(&self, question: &Question) -> Option<String> {
        let explainer = &self.explainer;
        let timeout = self.timeout;
        retry(EXPLANATION_ATTEMPTS, move || async move {
            match with_timeout(
                timeout,
                explainer.explain(&question.original_sentence, &question.correct_answer, question.topic),
            )
            .await
            {
                Ok(text) => Some(text),
                Err(err) => {
                    warn!("Explanation failed: {}", err);
                    None
                }
            }
        })
        .await
    }
}

/// Closing line for a finished quiz.
pub fn result_summary(result: &QuizResult) -> String {
    let cheer = match result.grade {
        Grade::A => "Excellent work!",
        Grade::B => "Good job!",
        Grade::C => "Not bad, keep practising.",
        Grade::D => "Keep going, practice makes perfect.",
    };
    format!(
        "Quiz finished! Score: {}/{} ({:.0}%). Level: {}\n{}",
        result.score,
        result.total,
        result.accuracy_percent(),
        result.grade,
        cheer
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_helper::mock::{EchoCompleter, ScriptedCompleter, StaticExplainer, StaticSummarizer};
    use crate::quiz::SkillLevel;
    use tempfile::TempDir;

    fn context(dir: &TempDir, completer: Arc<dyn Completer>, summarizer: Arc<StaticSummarizer>) -> LearnerContext {
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        LearnerContext::new(
            &config,
            Services {
                completer,
                summarizer,
                explainer: Arc::new(StaticExplainer(Some("Past tense of go".to_string()))),
            },
        )
    }

    fn tense_profile() -> LearnerProfile {
        LearnerProfile {
            grammar_patterns: ["tense".to_string()].into(),
            overall_skill: SkillLevel::Advanced,
            ..LearnerProfile::default()
        }
    }

    fn answered(outcome: SubmitOutcome) -> AnswerFeedback {
        match outcome {
            SubmitOutcome::Answered(feedback) => feedback,
            other => panic!("expected an answer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn submitting_without_quiz_is_not_active() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(&dir, Arc::new(EchoCompleter::new("went")), Arc::new(StaticSummarizer::new(None)));
        assert_eq!(ctx.submit_answer(1), SubmitOutcome::NotActive);
        assert!(ctx.next_question().is_none());
    }

    #[tokio::test]
    async fn five_question_quiz_runs_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(&dir, Arc::new(EchoCompleter::new("went")), Arc::new(StaticSummarizer::new(None)));
        assert!(matches!(ctx.state(), QuizState::Idle));

        let questions = ctx.generate_quiz(&tense_profile(), 5).await;
        assert_eq!(questions.len(), 5);
        assert!(ctx.state().is_active());
        assert!(questions
            .iter()
            .all(|q| q.explanation.as_deref() == Some("Past tense of go (went)")));

        let next = ctx.next_question().unwrap();
        assert_eq!(next.progress, "Q1/5");
        assert_eq!(next.choices, 4);
        assert!(next.text.starts_with("Q1: "));

        for (i, question) in questions.iter().enumerate() {
            // first answer right, the rest wrong
            let choice = if i == 0 {
                question.correct_index + 1
            } else {
                (question.correct_index + 1) % 4 + 1
            };
            let feedback = answered(ctx.submit_answer(choice));
            assert_eq!(feedback.result.is_some(), i == 4, "question {}", i);
            assert_eq!(feedback.is_correct, i == 0);
            assert_eq!(feedback.explanation, question.explanation);
            if i == 0 {
                assert_eq!(feedback.feedback, "Correct!");
            } else {
                assert_eq!(
                    feedback.feedback,
                    format!("Incorrect.\nCorrect answer: {}. went", question.correct_index + 1)
                );
            }
            if let Some(result) = feedback.result {
                assert_eq!((result.score, result.total), (1, 5));
                assert!((result.accuracy_percent() - 20.0).abs() < 1e-9);
                assert_eq!(result.grade, Grade::D);
            }
        }

        assert!(matches!(ctx.state(), QuizState::Completed { score: 1, total: 5 }));
        assert_eq!(ctx.submit_answer(1), SubmitOutcome::NotActive);

        let history = ctx.quiz_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].questions.len(), 5);
        assert_eq!(history[0].correct(), 1);
        assert_eq!(ctx.user_stats().total_quizzes, 1);
    }

    #[tokio::test]
    async fn invalid_choice_is_reported_without_advancing() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(&dir, Arc::new(EchoCompleter::new("went")), Arc::new(StaticSummarizer::new(None)));
        ctx.generate_quiz(&tense_profile(), 1).await;

        assert_eq!(ctx.submit_answer(0), SubmitOutcome::InvalidChoice { choice: 0, choices: 4 });
        assert_eq!(ctx.submit_answer(5), SubmitOutcome::InvalidChoice { choice: 5, choices: 4 });
        assert_eq!(ctx.next_question().unwrap().progress, "Q1/1");
        assert!(answered(ctx.submit_answer(2)).result.is_some());
    }

    #[tokio::test]
    async fn new_quiz_replaces_unfinished_one() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(&dir, Arc::new(EchoCompleter::new("went")), Arc::new(StaticSummarizer::new(None)));
        ctx.generate_quiz(&tense_profile(), 3).await;
        answered(ctx.submit_answer(1));
        assert_eq!(ctx.next_question().unwrap().progress, "Q2/3");

        ctx.generate_quiz(&tense_profile(), 2).await;
        assert_eq!(ctx.next_question().unwrap().progress, "Q1/2");
        assert!(ctx.quiz_history().is_empty());
    }

    #[tokio::test]
    async fn failed_generation_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(&dir, Arc::new(ScriptedCompleter::failing()), Arc::new(StaticSummarizer::new(None)));
        let questions = ctx.generate_quiz(&tense_profile(), 5).await;
        assert!(questions.is_empty());
        assert!(matches!(ctx.state(), QuizState::Idle));
    }

    #[tokio::test]
    async fn finishing_a_quiz_refreshes_the_profile() {
        let dir = tempfile::tempdir().unwrap();
        let summarizer = Arc::new(StaticSummarizer::new(Some(r#"{"grammar_patterns": ["tense"], "overall_skill": "Advanced"}"#)));
        let mut ctx = context(&dir, Arc::new(EchoCompleter::new("went")), summarizer.clone());
        ctx.record_chat_message("chat_1", Role::User, "I goed to school").unwrap();

        let profile = ctx.prepare_quiz().await;
        assert_eq!(profile.overall_skill, SkillLevel::Advanced);
        assert_eq!(ctx.prepare_quiz().await, profile);
        assert_eq!(summarizer.calls(), 1);

        let questions = ctx.generate_quiz(&profile, 1).await;
        answered(ctx.submit_answer(questions[0].correct_index + 1));

        let refreshed = ctx.prepare_quiz().await;
        assert_eq!(summarizer.calls(), 2);
        assert_eq!(refreshed.total_quizzes, 1);
        assert_eq!(refreshed.average_accuracy, 1.0);
    }

    #[tokio::test]
    async fn every_fifth_user_message_invalidates_profile() {
        let dir = tempfile::tempdir().unwrap();
        let summarizer = Arc::new(StaticSummarizer::new(Some("{}")));
        let mut ctx = context(&dir, Arc::new(EchoCompleter::new("went")), summarizer.clone());

        ctx.record_chat_message("chat_1", Role::User, "one").unwrap();
        ctx.prepare_quiz().await;
        assert_eq!(summarizer.calls(), 1);

        for text in ["two", "three", "four"] {
            ctx.record_chat_message("chat_1", Role::User, text).unwrap();
            ctx.record_chat_message("chat_1", Role::Assistant, "reply").unwrap();
        }
        ctx.prepare_quiz().await;
        assert_eq!(summarizer.calls(), 1);

        ctx.record_chat_message("chat_1", Role::User, "five").unwrap();
        ctx.prepare_quiz().await;
        assert_eq!(summarizer.calls(), 2);
    }

    #[test]
    fn summary_mentions_score_and_grade() {
        let text = result_summary(&QuizResult::new(4, 5));
        assert!(text.starts_with("Quiz finished! Score: 4/5 (80%). Level: B"));
    }
}
