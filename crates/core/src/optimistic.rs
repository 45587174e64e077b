//! Optimistic feed state for clients.
//!
//! A client applies a vote or delete to its local feed immediately and then
//! settles the change once the server answers. Every change moves through
//! `Pending -> Committed | RolledBack`. Rolling back a vote restores the
//! entry as it was; rolling back a delete puts the post back in its server
//! order, whatever else was deleted meanwhile. Only pending changes are kept.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::services::vote::{VoteAction, VoteOutcome};

/// Identifier of a locally applied change.
pub type MutationId = u64;

/// Lifecycle of a local change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationState {
    Pending,
    Committed,
    RolledBack,
}

/// Errors from settling or applying local changes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MutationError {
    #[error("Post not in feed: {0}")]
    UnknownPost(String),

    #[error("Unknown mutation: {0}")]
    UnknownMutation(MutationId),

    #[error("Mutation {0} is already settled")]
    AlreadySettled(MutationId),

    #[error("Post {0} has a pending change")]
    Busy(String),

    #[error("Mutation {0} is not a vote")]
    NotAVote(MutationId),
}

/// A post as the client sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub post_id: String,
    pub vote_count: i64,
    /// Whether the current user has voted for it.
    pub voted: bool,
}

#[derive(Debug, Clone)]
enum Change {
    Vote { before: FeedEntry },
    Delete { before: FeedEntry },
}

impl Change {
    fn post_id(&self) -> &str {
        match self {
            Self::Vote { before } | Self::Delete { before } => &before.post_id,
        }
    }
}

/// Local feed with optimistic changes applied.
#[derive(Debug, Default)]
pub struct OptimisticFeed {
    entries: Vec<FeedEntry>,
    /// Position of each post in the feed the server sent.
    rank: HashMap<String, usize>,
    /// Changes awaiting the server's answer.
    pending: HashMap<MutationId, Change>,
    next_id: MutationId,
}

impl OptimisticFeed {
    /// Start from a server-provided feed.
    #[must_use]
    pub fn new(entries: Vec<FeedEntry>) -> Self {
        let rank = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.post_id.clone(), i))
            .collect();
        Self {
            entries,
            rank,
            ..Self::default()
        }
    }

    /// Entries as currently displayed.
    #[must_use]
    pub fn entries(&self) -> &[FeedEntry] {
        &self.entries
    }

    /// `Some(Pending)` while a change awaits settlement, `None` otherwise.
    #[must_use]
    pub fn state(&self, id: MutationId) -> Option<MutationState> {
        self.pending.get(&id).map(|_| MutationState::Pending)
    }

    /// Number of changes awaiting settlement.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Flip the user's vote on a post locally.
    pub fn toggle_vote(&mut self, post_id: &str) -> Result<MutationId, MutationError> {
        self.ensure_idle(post_id)?;
        let entry = self.entry_mut(post_id)?;
        let before = entry.clone();

        entry.vote_count += if entry.voted { -1 } else { 1 };
        entry.voted = !entry.voted;

        Ok(self.record(Change::Vote { before }))
    }

    /// Hide a post locally.
    pub fn delete_post(&mut self, post_id: &str) -> Result<MutationId, MutationError> {
        self.ensure_idle(post_id)?;
        let index = self
            .entries
            .iter()
            .position(|e| e.post_id == post_id)
            .ok_or_else(|| MutationError::UnknownPost(post_id.to_string()))?;
        let before = self.entries.remove(index);

        Ok(self.record(Change::Delete { before }))
    }

    /// Accept a vote using the server's answer as the source of truth.
    pub fn commit_vote(
        &mut self,
        id: MutationId,
        outcome: &VoteOutcome,
    ) -> Result<MutationState, MutationError> {
        let post_id = match self.pending_change(id)? {
            Change::Vote { before } => before.post_id.clone(),
            Change::Delete { .. } => return Err(MutationError::NotAVote(id)),
        };

        if let Ok(entry) = self.entry_mut(&post_id) {
            entry.vote_count = i64::try_from(outcome.vote_count).unwrap_or(i64::MAX);
            entry.voted = outcome.action == VoteAction::Added;
        }
        self.pending.remove(&id);
        Ok(MutationState::Committed)
    }

    /// Accept a change as applied.
    pub fn commit(&mut self, id: MutationId) -> Result<MutationState, MutationError> {
        self.take_pending(id)?;
        Ok(MutationState::Committed)
    }

    /// Undo a change after the server rejected it.
    pub fn rollback(&mut self, id: MutationId) -> Result<MutationState, MutationError> {
        match self.take_pending(id)? {
            Change::Vote { before } => {
                if let Ok(entry) = self.entry_mut(&before.post_id) {
                    *entry = before;
                }
            }
            Change::Delete { before } => {
                let rank = self.rank_of(&before.post_id);
                let index = self
                    .entries
                    .iter()
                    .position(|e| self.rank_of(&e.post_id) > rank)
                    .unwrap_or(self.entries.len());
                self.entries.insert(index, before);
            }
        }
        Ok(MutationState::RolledBack)
    }

    fn record(&mut self, change: Change) -> MutationId {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id, change);
        id
    }

    fn unknown_or_settled(&self, id: MutationId) -> MutationError {
        if id < self.next_id {
            MutationError::AlreadySettled(id)
        } else {
            MutationError::UnknownMutation(id)
        }
    }

    fn pending_change(&self, id: MutationId) -> Result<&Change, MutationError> {
        self.pending
            .get(&id)
            .ok_or_else(|| self.unknown_or_settled(id))
    }

    fn take_pending(&mut self, id: MutationId) -> Result<Change, MutationError> {
        match self.pending.remove(&id) {
            Some(change) => Ok(change),
            None => Err(self.unknown_or_settled(id)),
        }
    }

    fn rank_of(&self, post_id: &str) -> usize {
        self.rank.get(post_id).copied().unwrap_or(usize::MAX)
    }

    /// One change in flight per post.
    fn ensure_idle(&self, post_id: &str) -> Result<(), MutationError> {
        if self.pending.values().any(|c| c.post_id() == post_id) {
            Err(MutationError::Busy(post_id.to_string()))
        } else {
            Ok(())
        }
    }

    fn entry_mut(&mut self, post_id: &str) -> Result<&mut FeedEntry, MutationError> {
        self.entries
            .iter_mut()
            .find(|e| e.post_id == post_id)
            .ok_or_else(|| MutationError::UnknownPost(post_id.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn entry(id: &str, votes: i64, voted: bool) -> FeedEntry {
        FeedEntry {
            post_id: id.to_string(),
            vote_count: votes,
            voted,
        }
    }

    fn feed() -> OptimisticFeed {
        OptimisticFeed::new(vec![entry("a", 2, false), entry("b", 5, true), entry("c", 0, false)])
    }

    #[test]
    fn test_vote_applies_immediately() {
        let mut feed = feed();
        let id = feed.toggle_vote("a").unwrap();

        assert_eq!(feed.entries()[0], entry("a", 3, true));
        assert_eq!(feed.state(id), Some(MutationState::Pending));
    }

    #[test]
    fn test_vote_rollback_restores_snapshot() {
        let mut feed = feed();
        let id = feed.toggle_vote("b").unwrap();
        assert_eq!(feed.entries()[1], entry("b", 4, false));

        assert_eq!(feed.rollback(id).unwrap(), MutationState::RolledBack);
        assert_eq!(feed.entries()[1], entry("b", 5, true));
        assert_eq!(feed.state(id), None);
    }

    #[test]
    fn test_commit_vote_uses_server_count() {
        let mut feed = feed();
        let id = feed.toggle_vote("a").unwrap();

        let outcome = VoteOutcome {
            action: VoteAction::Added,
            post_id: "a".to_string(),
            vote_count: 7,
        };
        assert_eq!(
            feed.commit_vote(id, &outcome).unwrap(),
            MutationState::Committed
        );

        assert_eq!(feed.entries()[0], entry("a", 7, true));
        assert_eq!(feed.state(id), None);
    }

    #[test]
    fn test_delete_rollback_reinserts_in_place() {
        let mut feed = feed();
        let id = feed.delete_post("b").unwrap();
        assert_eq!(feed.entries().len(), 2);

        feed.rollback(id).unwrap();
        let ids: Vec<_> = feed.entries().iter().map(|e| e.post_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_settled_mutation_cannot_settle_again() {
        let mut feed = feed();
        let id = feed.delete_post("c").unwrap();
        feed.commit(id).unwrap();

        assert_eq!(feed.rollback(id), Err(MutationError::AlreadySettled(id)));
        assert_eq!(feed.entries().len(), 2);
    }

    #[test]
    fn test_one_pending_change_per_post() {
        let mut feed = feed();
        let id = feed.toggle_vote("a").unwrap();

        assert_eq!(
            feed.toggle_vote("a"),
            Err(MutationError::Busy("a".to_string()))
        );
        assert!(feed.delete_post("a").is_err());

        feed.commit(id).unwrap();
        assert!(feed.toggle_vote("a").is_ok());
    }

    #[test]
    fn test_unknown_post_and_mutation() {
        let mut feed = feed();
        assert_eq!(
            feed.toggle_vote("zzz"),
            Err(MutationError::UnknownPost("zzz".to_string()))
        );
        assert_eq!(feed.commit(42), Err(MutationError::UnknownMutation(42)));
    }

    #[test]
    fn test_commit_vote_rejects_delete_mutation() {
        let mut feed = feed();
        let id = feed.delete_post("a").unwrap();
        let outcome = VoteOutcome {
            action: VoteAction::Removed,
            post_id: "a".to_string(),
            vote_count: 0,
        };

        assert_eq!(feed.commit_vote(id, &outcome), Err(MutationError::NotAVote(id)));
    }

    #[test]
    fn test_interleaved_delete_rollbacks_keep_server_order() {
        let mut feed = feed();
        let first = feed.delete_post("a").unwrap();
        let second = feed.delete_post("b").unwrap();
        assert_eq!(feed.entries().len(), 1);

        feed.rollback(first).unwrap();
        feed.rollback(second).unwrap();

        let ids: Vec<_> = feed.entries().iter().map(|e| e.post_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_rollback_in_reverse_order_keeps_server_order() {
        let mut feed = feed();
        let first = feed.delete_post("a").unwrap();
        let second = feed.delete_post("c").unwrap();

        feed.rollback(second).unwrap();
        feed.rollback(first).unwrap();

        let ids: Vec<_> = feed.entries().iter().map(|e| e.post_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_settled_mutations_are_dropped() {
        let mut feed = feed();
        let vote = feed.toggle_vote("a").unwrap();
        let delete = feed.delete_post("c").unwrap();
        assert_eq!(feed.pending_count(), 2);

        feed.commit(vote).unwrap();
        feed.rollback(delete).unwrap();

        assert_eq!(feed.pending_count(), 0);
        assert_eq!(feed.commit(vote), Err(MutationError::AlreadySettled(vote)));
    }
}
