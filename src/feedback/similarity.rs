//! Name similarity used to pick few-shot examples.
//!
//! Names are compared after normalization (trimmed, lower-cased) using
//! normalized Levenshtein similarity in `[0.0, 1.0]`.

use crate::models::FeedbackEntry;

use super::normalize_name;

/// Rank `entries` by similarity to `subject`, best first, keeping at most `k`.
///
/// Entries with zero similarity are dropped, and so are exact (normalized)
/// matches unless `include_exact` is set, in which case they score 1.0 and
/// come first. Equal scores keep insertion order.
pub fn rank_similar<'a>(
    subject: &str,
    entries: &'a [FeedbackEntry],
    k: usize,
    include_exact: bool,
) -> Vec<&'a FeedbackEntry> {
    let subject = normalize_name(subject);
    if k == 0 || subject.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(f64, &FeedbackEntry)> = entries
        .iter()
        .filter_map(|entry| {
            let candidate = normalize_name(&entry.name);
            if candidate == subject && !include_exact {
                return None;
            }
            let score = strsim::normalized_levenshtein(&subject, &candidate);
            (score > 0.0).then_some((score, entry))
        })
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().take(k).map(|(_, entry)| entry).collect()
}
