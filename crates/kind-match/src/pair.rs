use std::fmt;

use serde::Serialize;

const SEPARATOR: char = '|';

/// Order-independent key for a pair of user ids. Used to correlate a match
/// with a conversation that carries no `match_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PairKey(String);

impl PairKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sorts the two ids and joins them. Returns `None` when either id is blank.
pub fn pair_key(a: &str, b: &str) -> Option<PairKey> {
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    Some(PairKey(format!("{lo}{SEPARATOR}{hi}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric() {
        let ids = ["user_2abc", "user_9zz", "a", "user_2abd", "Z"];
        for a in ids {
            for b in ids {
                assert_eq!(pair_key(a, b), pair_key(b, a));
            }
        }
    }

    #[test]
    fn test_sorted_join() {
        assert_eq!(pair_key("worker_1", "boss_1").unwrap().as_str(), "boss_1|worker_1");
    }

    #[test]
    fn test_blank_ids_have_no_key() {
        assert_eq!(pair_key("", "user_1"), None);
        assert_eq!(pair_key("user_1", ""), None);
        assert_eq!(pair_key("  ", "user_1"), None);
        assert_eq!(pair_key("", ""), None);
    }

    #[test]
    fn test_distinct_pairs_distinct_keys() {
        assert_ne!(pair_key("a", "bc"), pair_key("ab", "c"));
    }
}
