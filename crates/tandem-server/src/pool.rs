//! Waiting pool.
//!
//! Ordered set of participants looking for an opponent. Insertion order is
//! preserved for `poolUpdate` listings and for automatic pairing, which always
//! picks the earliest waiting participant.

use std::collections::{BTreeMap, HashMap};

use tandem_proto::{ParticipantId, ParticipantSummary};

use crate::registry::IdentityRegistry;

/// Insertion-ordered set of waiting participants.
#[derive(Debug, Default)]
pub struct WaitingPool {
    /// Insertion sequence → participant
    order: BTreeMap<u64, ParticipantId>,
    /// Participant → insertion sequence (reverse index)
    positions: HashMap<ParticipantId, u64>,
    next_seq: u64,
}

impl WaitingPool {
    /// Create a new empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a participant at the back of the pool.
    ///
    /// Returns `false` (and keeps the original position) if already queued.
    pub fn enqueue(&mut self, id: ParticipantId) -> bool {
        if self.positions.contains_key(&id) {
            return false;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, id);
        self.positions.insert(id, seq);
        true
    }

    /// Remove a participant. Returns `true` if it was queued.
    pub fn dequeue(&mut self, id: ParticipantId) -> bool {
        match self.positions.remove(&id) {
            Some(seq) => {
                self.order.remove(&seq);
                true
            },
            None => false,
        }
    }

    /// Whether the participant is queued.
    pub fn contains(&self, id: ParticipantId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Earliest queued participant other than `except`.
    pub fn earliest_except(&self, except: ParticipantId) -> Option<ParticipantId> {
        self.order.values().copied().find(|&id| id != except)
    }

    /// Queued participants in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.order.values().copied()
    }

    /// `{id, displayName}` for every queued participant, in insertion order.
    pub fn list(&self, registry: &IdentityRegistry) -> Vec<ParticipantSummary> {
        self.iter().filter_map(|id| registry.summary(id)).collect()
    }

    /// Number of queued participants.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn enqueue_preserves_insertion_order() {
        let mut pool = WaitingPool::new();

        pool.enqueue(ParticipantId(3));
        pool.enqueue(ParticipantId(1));
        pool.enqueue(ParticipantId(2));

        let order: Vec<_> = pool.iter().collect();
        assert_eq!(order, vec![ParticipantId(3), ParticipantId(1), ParticipantId(2)]);
    }

    #[test]
    fn enqueue_twice_is_noop() {
        let mut pool = WaitingPool::new();

        assert!(pool.enqueue(ParticipantId(1)));
        pool.enqueue(ParticipantId(2));
        assert!(!pool.enqueue(ParticipantId(1)));

        let order: Vec<_> = pool.iter().collect();
        assert_eq!(order, vec![ParticipantId(1), ParticipantId(2)]);
    }

    #[test]
    fn dequeue_removes_from_both_maps() {
        let mut pool = WaitingPool::new();

        pool.enqueue(ParticipantId(1));
        assert!(pool.dequeue(ParticipantId(1)));
        assert!(!pool.contains(ParticipantId(1)));
        assert!(pool.is_empty());
        assert!(!pool.dequeue(ParticipantId(1)));
    }

    #[test]
    fn requeue_goes_to_back() {
        let mut pool = WaitingPool::new();

        pool.enqueue(ParticipantId(1));
        pool.enqueue(ParticipantId(2));
        pool.dequeue(ParticipantId(1));
        pool.enqueue(ParticipantId(1));

        assert_eq!(pool.earliest_except(ParticipantId(99)), Some(ParticipantId(2)));
    }

    #[test]
    fn earliest_except_skips_given_participant() {
        let mut pool = WaitingPool::new();

        pool.enqueue(ParticipantId(1));
        assert_eq!(pool.earliest_except(ParticipantId(1)), None);

        pool.enqueue(ParticipantId(2));
        assert_eq!(pool.earliest_except(ParticipantId(1)), Some(ParticipantId(2)));
        assert_eq!(pool.earliest_except(ParticipantId(2)), Some(ParticipantId(1)));
    }

    #[test]
    fn list_resolves_display_names() {
        let mut registry = IdentityRegistry::new();
        let mut pool = WaitingPool::new();

        let ada = registry.register(1, "ada", 32).unwrap().id;
        let bob = registry.register(2, "bob", 32).unwrap().id;
        pool.enqueue(bob);
        pool.enqueue(ada);

        let names: Vec<_> = pool.list(&registry).into_iter().map(|p| p.display_name).collect();
        assert_eq!(names, vec!["bob", "ada"]);
    }

    proptest! {
        /// The pool always lists exactly what a plain ordered vector would.
        #[test]
        fn prop_matches_ordered_vec(ops in prop::collection::vec((any::<bool>(), 0..8u64), 0..64)) {
            let mut pool = WaitingPool::new();
            let mut expected: Vec<ParticipantId> = Vec::new();

            for (enqueue, raw) in ops {
                let id = ParticipantId(raw);
                if enqueue {
                    let fresh = !expected.contains(&id);
                    prop_assert_eq!(pool.enqueue(id), fresh);
                    if fresh {
                        expected.push(id);
                    }
                } else {
                    let present = expected.contains(&id);
                    prop_assert_eq!(pool.dequeue(id), present);
                    expected.retain(|&p| p != id);
                }
            }

            prop_assert_eq!(pool.iter().collect::<Vec<_>>(), expected.clone());
            prop_assert_eq!(pool.len(), expected.len());
            prop_assert_eq!(pool.earliest_except(ParticipantId(99)), expected.first().copied());
        }
    }
}
