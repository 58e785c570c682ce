use rand::seq::SliceRandom;
use rand::Rng;

use super::topics::{all_pool_words, Topic};
use super::Difficulty;

pub const DISTRACTOR_COUNT: usize = 3;

/// Tense forms in the order learners confuse them; neighbours are the
/// hardest wrong answers.
const TENSE_ORDER: [&str; 4] = ["go", "goes", "went", "gone"];

/// Builds the wrong choices for a question on `topic` whose answer is
/// `answer` (pool spelling). Always returns [`DISTRACTOR_COUNT`] words,
/// none equal to the answer.
pub fn make_distractors<R: Rng + ?Sized>(
    topic: Topic,
    answer: &str,
    difficulty: Difficulty,
    rng: &mut R,
) -> Vec<String> {
    let mut pool: Vec<&str> = topic
        .word_pool()
        .iter()
        .copied()
        .filter(|w| *w != answer)
        .collect();

    if pool.len() < DISTRACTOR_COUNT {
        let missing = DISTRACTOR_COUNT - pool.len();
        let extra = filler(answer, &pool, rng);
        pool.extend(extra.into_iter().take(missing));
    }

    let picked = match difficulty {
        Difficulty::Advanced if topic == Topic::Tense => adjacent_first(answer, pool, rng),
        Difficulty::Basic | Difficulty::Intermediate | Difficulty::Advanced => {
            pool.shuffle(rng);
            pool
        }
    };

    picked
        .into_iter()
        .take(DISTRACTOR_COUNT)
        .map(str::to_string)
        .collect()
}

fn adjacent_first<'a, R: Rng + ?Sized>(answer: &str, mut pool: Vec<&'a str>, rng: &mut R) -> Vec<&'a str> {
    let Some(idx) = TENSE_ORDER.iter().position(|w| *w == answer) else {
        pool.shuffle(rng);
        return pool;
    };

    let mut candidates: Vec<&str> = Vec::new();
    if idx > 0 {
        candidates.push(TENSE_ORDER[idx - 1]);
    }
    if idx + 1 < TENSE_ORDER.len() {
        candidates.push(TENSE_ORDER[idx + 1]);
    }

    let mut others: Vec<&str> = pool
        .into_iter()
        .filter(|w| !candidates.contains(w))
        .collect();
    others.shuffle(rng);
    candidates.extend(others);

    if candidates.len() < DISTRACTOR_COUNT {
        let missing = DISTRACTOR_COUNT - candidates.len();
        let extra = filler(answer, &candidates, rng);
        candidates.extend(extra.into_iter().take(missing));
    }
    candidates
}

/// Cross-topic words not yet used, shuffled.
fn filler<R: Rng + ?Sized>(answer: &str, used: &[&str], rng: &mut R) -> Vec<&'static str> {
    let mut words: Vec<&'static str> = all_pool_words()
        .into_iter()
        .filter(|w| *w != answer && !used.contains(w))
        .collect();
    words.shuffle(rng);
    words
}
