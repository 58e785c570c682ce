use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use super::topics::Topic;
use crate::profile::LearnerProfile;

/// Share of probability mass reserved for the learner's weak topics.
pub const WEAK_MASS: f64 = 0.6;

/// Weak topics named by the profile, or [`Topic::DEFAULT_WEAK`] when none
/// of the reported patterns map onto a known topic.
pub fn weak_topics(profile: &LearnerProfile) -> Vec<Topic> {
    let mut weak: Vec<Topic> = profile
        .grammar_patterns
        .iter()
        .chain(profile.common_mistakes.iter())
        .filter_map(|label| Topic::from_label(label))
        .collect();
    weak.sort();
    weak.dedup();
    if weak.is_empty() {
        weak = Topic::DEFAULT_WEAK.to_vec();
    }
    weak
}

/// Probability of every topic, in [`Topic::ALL`] order.
pub fn topic_weights(profile: &LearnerProfile) -> Vec<(Topic, f64)> {
    let weak = weak_topics(profile);
    let strong_count = Topic::ALL.len() - weak.len();
    // nothing left to hand the remaining share to
    let weak_mass = if strong_count == 0 { 1.0 } else { WEAK_MASS };

    Topic::ALL
        .iter()
        .map(|topic| {
            let weight = if weak.contains(topic) {
                weak_mass / weak.len() as f64
            } else {
                (1.0 - weak_mass) / strong_count as f64
            };
            (*topic, weight)
        })
        .collect()
}

pub fn select_topic<R: Rng + ?Sized>(profile: &LearnerProfile, rng: &mut R) -> Topic {
    let weights = topic_weights(profile);
    match WeightedIndex::new(weights.iter().map(|(_, w)| *w)) {
        Ok(dist) => weights[dist.sample(rng)].0,
        Err(_) => Topic::ALL[rng.gen_range(0..Topic::ALL.len())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn profile_with(patterns: &[&str], mistakes: &[&str]) -> LearnerProfile {
        LearnerProfile {
            grammar_patterns: patterns.iter().map(|s| s.to_string()).collect(),
            common_mistakes: mistakes.iter().map(|s| s.to_string()).collect(),
            ..LearnerProfile::default()
        }
    }

    #[test]
    fn unknown_weaknesses_fall_back_to_defaults() {
        let profile = profile_with(&["phrasal verbs"], &[]);
        assert_eq!(weak_topics(&profile), Topic::DEFAULT_WEAK.to_vec());
    }

    #[test]
    fn weaknesses_merge_patterns_and_mistakes() {
        let profile = profile_with(&["tense", "idioms"], &["tense", "wh"]);
        assert_eq!(weak_topics(&profile), vec![Topic::Tense, Topic::WhQuestion]);
    }

    #[test]
    fn weights_sum_to_one_and_stay_positive() {
        for profile in [
            profile_with(&[], &[]),
            profile_with(&["tense"], &[]),
            profile_with(&["article", "sva", "tense", "preposition", "comparative"], &[]),
            profile_with(&["article", "sva", "tense", "preposition", "comparative"], &["wh"]),
        ] {
            let weights = topic_weights(&profile);
            let total: f64 = weights.iter().map(|(_, w)| w).sum();
            assert!((total - 1.0).abs() < 1e-9);
            assert!(weights.iter().all(|(_, w)| *w > 0.0));
        }
    }

    #[test]
    fn all_topics_weak_is_uniform() {
        let labels: Vec<&str> = Topic::ALL.iter().map(|t| t.label()).collect();
        let profile = profile_with(&labels, &[]);
        assert!(topic_weights(&profile)
            .iter()
            .all(|(_, w)| (*w - 1.0 / 6.0).abs() < 1e-9));
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(select_topic(&profile, &mut rng));
        }
        assert_eq!(seen.len(), Topic::ALL.len());
    }

    #[test]
    fn sampling_converges_to_sixty_forty() {
        let profile = profile_with(&["tense"], &["preposition"]);
        let weak = weak_topics(&profile);
        let mut rng = StdRng::seed_from_u64(42);
        let samples = 20_000;
        let mut weak_hits = 0;
        let mut counts = std::collections::HashMap::new();
        for _ in 0..samples {
            let topic = select_topic(&profile, &mut rng);
            *counts.entry(topic).or_insert(0usize) += 1;
            if weak.contains(&topic) {
                weak_hits += 1;
            }
        }
        let share = weak_hits as f64 / samples as f64;
        assert!((share - 0.6).abs() < 0.02, "weak share was {}", share);
        // every topic keeps some coverage
        assert_eq!(counts.len(), Topic::ALL.len());
    }
}
