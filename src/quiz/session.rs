use super::Question;

/// What the learner answered to one question. Never edited once recorded.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    pub choices: Vec<String>,
    #[serde(rename = "correct")]
    pub correct_index: usize,
    #[serde(rename = "user_answer")]
    pub submitted_index: usize,
    pub is_correct: bool,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// A quiz in progress.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Quiz {
    pub questions: Vec<Question>,
    pub current_question: usize,
    pub score: usize,
    pub answers: Vec<AnswerRecord>,
}

/// Result of answering the current question.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub record: AnswerRecord,
    /// Set once the last question has been answered.
    pub finished: bool,
}

impl Quiz {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            current_question: 0,
            score: 0,
            answers: Vec::new(),
        }
    }

    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.current_question)
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn is_finished(&self) -> bool {
        self.current_question >= self.questions.len()
    }

    /// Answers the current question with `choice` (0-based) and moves on.
    /// Returns `None` when there is nothing left to answer or `choice` is
    /// not one of the question's choices; the quiz is left untouched then.
    pub fn answer(&mut self, choice: usize) -> Option<Step> {
        let question = self.current()?;
        if choice >= question.choices.len() {
            return None;
        }

        let is_correct = choice == question.correct_index;
        let record = AnswerRecord {
            question: question.text.clone(),
            choices: question.choices.clone(),
            correct_index: question.correct_index,
            submitted_index: choice,
            is_correct,
            explanation: question.explanation.clone(),
        };

        if is_correct {
            self.score += 1;
        }
        self.answers.push(record.clone());
        self.current_question += 1;

        Some(Step {
            record,
            finished: self.is_finished(),
        })
    }
}

/// Lifecycle of the single tracked quiz.
#[derive(Debug, Clone, Default)]
pub enum QuizState {
    #[default]
    Idle,
    InProgress(Quiz),
    Completed {
        score: usize,
        total: usize,
    },
}

impl QuizState {
    pub fn is_active(&self) -> bool {
        matches!(self, QuizState::InProgress(_))
    }

    pub fn quiz(&self) -> Option<&Quiz> {
        match self {
            QuizState::InProgress(quiz) => Some(quiz),
            _ => None,
        }
    }
}
