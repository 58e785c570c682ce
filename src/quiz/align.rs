use std::ops::Range;

use similar::{capture_diff_slices, Algorithm, DiffTag};

use super::topics::BLANK_MARKER;

/// One aligned span: `source[old]` corresponds to `target[new]`.
pub type Span = (DiffTag, Range<usize>, Range<usize>);

/// LCS token alignment of `source` against `target`. Spans cover both
/// sequences end to end, in order.
pub fn align(source: &[&str], target: &[&str]) -> Vec<Span> {
    capture_diff_slices(Algorithm::Lcs, source, target)
        .iter()
        .map(|op| op.as_tag_tuple())
        .collect()
}

/// Recovers the word the completion service put where the skeleton had
/// [`BLANK_MARKER`]. The raw token is returned, punctuation included.
pub fn recover_blank(skeleton: &str, completion: &str) -> Option<String> {
    let skeleton_tokens: Vec<&str> = skeleton.split_whitespace().collect();
    let completion_tokens: Vec<&str> = completion.split_whitespace().collect();

    let blank_idx = skeleton_tokens.iter().position(|t| *t == BLANK_MARKER)?;

    if skeleton_tokens.len() == completion_tokens.len() {
        return Some(completion_tokens[blank_idx].to_string());
    }

    let spans = align(&skeleton_tokens, &completion_tokens);
    let filled = spans
        .iter()
        .position(|(_, old, _)| old.contains(&blank_idx))
        .and_then(|at| match &spans[at] {
            // an insert right next to the delete fills the same gap
            (DiffTag::Delete, _, _) => [at.checked_sub(1), Some(at + 1)]
                .into_iter()
                .flatten()
                .filter_map(|i| spans.get(i))
                .find(|(tag, _, new)| *tag == DiffTag::Insert && !new.is_empty())
                .map(|(_, _, new)| new.start),
            (_, _, new) if !new.is_empty() => Some(new.start),
            _ => None,
        });
    if let Some(j) = filled {
        return Some(completion_tokens[j].to_string());
    }

    completion_tokens.get(blank_idx).map(|t| t.to_string())
}
