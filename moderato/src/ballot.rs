//! # Summary
//!
//! Ballots establish proposal priority between competing leaders. A
//! ballot is a (round, proposer) pair compared lexicographically; the
//! proposer id breaks ties, so no two leaders ever issue an equal
//! ballot. An acceptor's "bottom" ballot is modeled as `Option::None`
//! at the use site, which is smaller than every real ballot.

use serde_derive::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ballot {
    /// Round number, advanced by the owning leader's generator
    pub b_id: usize,

    /// Server id of the proposing leader
    pub l_id: usize,
}

impl Ballot {
    /// Strict lexicographic comparison on (round, proposer).
    ///
    /// Panics when both ballots are structurally equal: ballots are
    /// unique system-wide, so comparing a ballot against itself is a
    /// caller bug, not a tie to break silently.
    pub fn greater_than(&self, other: &Ballot) -> bool {
        assert!(
            self != other,
            "[INTERNAL ERROR]: compared equal ballots {:?}",
            self,
        );
        self > other
    }
}

/// Hands a leader its successive ballots. Every ballot issued for a
/// fixed proposer is strictly greater than all of its predecessors.
#[derive(Debug)]
pub struct BallotGenerator {
    l_id: usize,
    b_id: usize,
}

impl BallotGenerator {
    pub fn new(l_id: usize) -> Self {
        BallotGenerator { l_id, b_id: 0 }
    }

    /// The most recently issued ballot (round 0 before any `next` call).
    pub fn current(&self) -> Ballot {
        Ballot {
            b_id: self.b_id,
            l_id: self.l_id,
        }
    }

    /// Issues a fresh ballot one round above the previous one.
    pub fn next(&mut self) -> Ballot {
        self.b_id += 1;
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_round_then_proposer() {
        let low = Ballot { b_id: 1, l_id: 2 };
        let mid = Ballot { b_id: 2, l_id: 0 };
        let high = Ballot { b_id: 2, l_id: 1 };
        assert!(mid.greater_than(&low));
        assert!(high.greater_than(&mid));
        assert!(high.greater_than(&low));
        assert!(!low.greater_than(&high));
    }

    #[test]
    #[should_panic(expected = "compared equal ballots")]
    fn equal_ballots_panic() {
        let ballot = Ballot { b_id: 3, l_id: 1 };
        ballot.greater_than(&ballot.clone());
    }

    #[test]
    fn generator_is_monotone() {
        let mut generator = BallotGenerator::new(2);
        let mut previous = generator.current();
        assert_eq!(previous, Ballot { b_id: 0, l_id: 2 });
        for _ in 0..10 {
            let next = generator.next();
            assert!(next.greater_than(&previous));
            previous = next;
        }
    }

    #[test]
    fn distinct_proposers_never_collide() {
        let mut a = BallotGenerator::new(0);
        let mut b = BallotGenerator::new(1);
        for _ in 0..5 {
            assert_ne!(a.next(), b.next());
        }
    }
}
