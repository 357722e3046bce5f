//! Eviction Order Module
//!
//! Orders capacity-eviction candidates by insertion age.

use chrono::{DateTime, Utc};

// == Eviction Queue ==
/// Candidates for capacity eviction, oldest-inserted first.
///
/// This approximates LRU by insertion time only; reads do not refresh an
/// entry's position.
#[derive(Debug, Default)]
pub struct EvictionQueue {
    order: Vec<(String, DateTime<Utc>)>,
}

impl EvictionQueue {
    // == Constructor ==
    /// Builds the queue from `(key, created_at)` pairs.
    ///
    /// Identical timestamps fall back to key order so a given set of
    /// candidates always evicts in the same order.
    pub fn new(mut candidates: Vec<(String, DateTime<Utc>)>) -> Self {
        candidates.sort_unstable_by(|(ka, ta), (kb, tb)| ta.cmp(tb).then_with(|| ka.cmp(kb)));
        candidates.reverse();
        Self { order: candidates }
    }

    // == Pop Oldest ==
    /// Returns and removes the oldest key.
    pub fn pop_oldest(&mut self) -> Option<String> {
        self.order.pop().map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_queue_empty() {
        let mut queue = EvictionQueue::new(Vec::new());
        assert!(queue.is_empty());
        assert_eq!(queue.pop_oldest(), None);
    }

    #[test]
    fn test_pops_in_creation_order() {
        let mut queue = EvictionQueue::new(vec![
            ("c".to_string(), at(3)),
            ("a".to_string(), at(1)),
            ("b".to_string(), at(2)),
        ]);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop_oldest(), Some("a".to_string()));
        assert_eq!(queue.pop_oldest(), Some("b".to_string()));
        assert_eq!(queue.pop_oldest(), Some("c".to_string()));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_identical_timestamps_do_not_panic() {
        let t = at(0);
        let mut queue = EvictionQueue::new(vec![
            ("y".to_string(), t),
            ("x".to_string(), t),
            ("z".to_string(), t + ChronoDuration::milliseconds(-1)),
        ]);

        assert_eq!(queue.pop_oldest(), Some("z".to_string()));
        assert_eq!(queue.pop_oldest(), Some("x".to_string()));
        assert_eq!(queue.pop_oldest(), Some("y".to_string()));
    }
}
