use std::collections::HashSet;

use crate::entry::UserId;

/// Distinct voters asking to skip the currently playing entry. Rebuilt on
/// every play transition; never persisted.
#[derive(Debug, Default)]
pub struct SkipVoteTracker {
    voters: HashSet<UserId>,
}

impl SkipVoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a vote and return the distinct-voter count. Voting twice
    /// from the same ID changes nothing.
    pub fn add_voter(&mut self, id: UserId) -> usize {
        self.voters.insert(id);
        self.voters.len()
    }

    pub fn voter_count(&self) -> usize {
        self.voters.len()
    }

    pub fn reset(&mut self) {
        self.voters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_votes_count_once() {
        let mut votes = SkipVoteTracker::new();
        assert_eq!(votes.add_voter(UserId(7)), 1);
        assert_eq!(votes.add_voter(UserId(7)), 1);
        assert_eq!(votes.add_voter(UserId(8)), 2);
        assert_eq!(votes.voter_count(), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let mut votes = SkipVoteTracker::new();
        votes.add_voter(UserId(1));
        votes.add_voter(UserId(2));
        votes.reset();
        assert_eq!(votes.voter_count(), 0);
        assert_eq!(votes.add_voter(UserId(1)), 1);
    }
}
