use std::fmt;

use crate::store::QuizHistoryEntry;

/// Entries of history that count towards the stats.
pub const STATS_WINDOW: usize = 10;
/// Grades kept in `recent_quiz_levels`.
pub const RECENT_GRADES: usize = 5;

/// Letter grade of a single quiz result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl Grade {
    pub fn from_accuracy(accuracy: f64) -> Grade {
        if accuracy >= 0.90 {
            Grade::A
        } else if accuracy >= 0.75 {
            Grade::B
        } else if accuracy >= 0.50 {
            Grade::C
        } else {
            Grade::D
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Difficulty signal for quiz generation, derived from average accuracy.
/// Uses its own thresholds; not interchangeable with [`Grade`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum QuizDifficulty {
    A,
    B,
    C,
    #[default]
    D,
}

impl QuizDifficulty {
    pub fn from_accuracy(accuracy: f64) -> QuizDifficulty {
        if accuracy >= 0.85 {
            QuizDifficulty::A
        } else if accuracy >= 0.70 {
            QuizDifficulty::B
        } else if accuracy >= 0.50 {
            QuizDifficulty::C
        } else {
            QuizDifficulty::D
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            QuizDifficulty::A => "advanced",
            QuizDifficulty::B => "upper-intermediate",
            QuizDifficulty::C => "intermediate",
            QuizDifficulty::D => "beginner",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct QuizStats {
    pub total_quizzes: usize,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub average_accuracy: f64,
    /// Oldest first.
    pub recent_levels: Vec<Grade>,
}

impl QuizStats {
    pub fn from_history(history: &[QuizHistoryEntry]) -> QuizStats {
        let window = &history[history.len().saturating_sub(STATS_WINDOW)..];

        let mut total_questions = 0;
        let mut correct_answers = 0;
        let mut recent_levels = Vec::new();
        for entry in window {
            let total = entry.questions.len();
            let correct = entry.correct();
            total_questions += total;
            correct_answers += correct;
            if total > 0 {
                recent_levels.push(Grade::from_accuracy(correct as f64 / total as f64));
            }
        }
        let keep_from = recent_levels.len().saturating_sub(RECENT_GRADES);
        recent_levels.drain(..keep_from);

        let average_accuracy = if total_questions > 0 {
            correct_answers as f64 / total_questions as f64
        } else {
            0.0
        };

        QuizStats {
            total_quizzes: history.len(),
            total_questions,
            correct_answers,
            average_accuracy,
            recent_levels,
        }
    }
}
