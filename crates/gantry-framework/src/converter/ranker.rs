//! Picking the best candidate for a by-name lookup.

/// Chooses among candidates returned by a remote name search.
///
/// Implementations must be deterministic and keep the collaborator's order
/// for candidates they consider equally good.
pub trait NameRanker: Send + Sync {
    /// Returns the index of the best candidate, or `None` if there is none.
    fn best(&self, query: &str, candidates: &[&str]) -> Option<usize>;
}

/// Ranks exact matches first, then prefix matches, then substring matches,
/// all case-insensitive. When nothing matches textually the first candidate
/// wins, since the remote already filtered by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRanker;

impl DefaultRanker {
    fn score(query: &str, candidate: &str) -> u8 {
        let candidate = candidate.to_lowercase();
        if candidate == query {
            3
        } else if candidate.starts_with(query) {
            2
        } else if candidate.contains(query) {
            1
        } else {
            0
        }
    }
}

impl NameRanker for DefaultRanker {
    fn best(&self, query: &str, candidates: &[&str]) -> Option<usize> {
        let query = query.to_lowercase();
        let mut best: Option<(usize, u8)> = None;
        for (i, candidate) in candidates.iter().enumerate() {
            let score = Self::score(&query, candidate);
            // strictly greater keeps the earliest candidate on ties
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((i, score));
            }
        }
        best.map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_beats_prefix() {
        let ranker = DefaultRanker;
        assert_eq!(ranker.best("mod", &["moderators", "Mod", "admod"]), Some(1));
    }

    #[test]
    fn test_prefix_beats_substring() {
        let ranker = DefaultRanker;
        assert_eq!(ranker.best("gen", &["regenerate", "general"]), Some(1));
    }

    #[test]
    fn test_ties_keep_collaborator_order() {
        let ranker = DefaultRanker;
        assert_eq!(ranker.best("a", &["alpha", "apple"]), Some(0));
        assert_eq!(ranker.best("zzz", &["x", "y"]), Some(0));
    }

    #[test]
    fn test_empty_candidates() {
        assert_eq!(DefaultRanker.best("a", &[]), None);
    }
}
