//! Undo/redo history.
//!
//! Provides:
//! - `UndoManager` trait for anything that can actually perform undo/redo
//! - `History`, a bounded stack of post snapshots taken at transaction
//!   boundaries
//!
//! Entries store whole posts. Node ids survive in snapshots, so restoring one
//! brings back the same identities and the renderer reuses every section the
//! restored post shares with the current one.

use std::collections::VecDeque;
use std::time::Duration;

use web_time::Instant;

use crate::config::HistoryPolicy;
use crate::edit::EditKind;
use crate::model::Post;
use crate::range::Range;

/// Trait for managing undo/redo operations.
///
/// Implementations must actually perform the undo/redo, not just track state.
pub trait UndoManager {
    /// Check if undo is available.
    fn can_undo(&self) -> bool;

    /// Check if redo is available.
    fn can_redo(&self) -> bool;

    /// Perform undo. Returns true if successful.
    fn undo(&mut self) -> bool;

    /// Perform redo. Returns true if successful.
    fn redo(&mut self) -> bool;

    /// Clear all undo/redo history.
    fn clear_history(&mut self);
}

/// Post and range at one transaction boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub post: Post,
    pub range: Option<Range>,
}

#[derive(Debug, Clone)]
struct Entry {
    before: Snapshot,
    after: Snapshot,
    kind: EditKind,
    at: Instant,
    /// Set when the caret moved on its own since this entry, so the next
    /// edit starts a new entry.
    sealed: bool,
}

/// Bounded undo and redo stacks.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: VecDeque<Entry>,
    redo_stack: Vec<Entry>,
    policy: HistoryPolicy,
}

impl Default for History {
    fn default() -> Self {
        Self::new(HistoryPolicy::default())
    }
}

impl History {
    pub fn new(policy: HistoryPolicy) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &HistoryPolicy {
        &self.policy
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    fn coalesces(&self, last: &Entry, kind: EditKind, before: &Snapshot, now: Instant) -> bool {
        let Some(window) = self.policy.coalesce_window_ms else {
            return false;
        };
        !last.sealed
            && last.kind == kind
            && self.policy.coalesce_kinds.contains(&kind)
            && last.after.range == before.range
            && now.duration_since(last.at) <= Duration::from_millis(window)
    }

    /// Record a finished transaction. Clears the redo stack.
    pub fn commit(&mut self, before: Snapshot, after: Snapshot, kind: EditKind) {
        self.redo_stack.clear();
        if self.policy.max_depth == 0 {
            return;
        }
        let now = Instant::now();
        if let Some(last) = self.undo_stack.back() {
            if self.coalesces(last, kind, &before, now) {
                if let Some(last) = self.undo_stack.back_mut() {
                    last.after = after;
                    last.at = now;
                }
                tracing::trace!(target: "folio::history", ?kind, "coalesced into last entry");
                return;
            }
        }
        self.undo_stack.push_back(Entry {
            before,
            after,
            kind,
            at: now,
            sealed: false,
        });
        while self.undo_stack.len() > self.policy.max_depth {
            self.undo_stack.pop_front();
        }
        tracing::debug!(
            target: "folio::history",
            ?kind,
            depth = self.undo_stack.len(),
            "committed history entry"
        );
    }

    /// Stop the newest entry from absorbing further edits.
    pub fn seal(&mut self) {
        if let Some(last) = self.undo_stack.back_mut() {
            last.sealed = true;
        }
    }

    /// Pop the newest entry and return the state before it.
    pub fn undo(&mut self) -> Option<Snapshot> {
        let mut entry = self.undo_stack.pop_back()?;
        entry.sealed = true;
        let before = entry.before.clone();
        self.redo_stack.push(entry);
        Some(before)
    }

    /// Pop the newest undone entry and return the state after it.
    pub fn redo(&mut self) -> Option<Snapshot> {
        let entry = self.redo_stack.pop()?;
        let after = entry.after.clone();
        self.undo_stack.push_back(entry);
        Some(after)
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PostBuilder, text};

    fn snap(t: &str) -> Snapshot {
        let post = PostBuilder::new().paragraph(vec![text(t)]).build().unwrap();
        Snapshot { post, range: None }
    }

    #[test]
    fn test_undo_redo_walk() {
        let mut history = History::new(HistoryPolicy::without_coalescing());
        history.commit(snap(""), snap("a"), EditKind::InsertText);
        history.commit(snap("a"), snap("ab"), EditKind::InsertText);
        assert_eq!(history.undo_depth(), 2);

        assert_eq!(history.undo().unwrap().post.text(), "a");
        assert_eq!(history.undo().unwrap().post.text(), "");
        assert!(history.undo().is_none());
        assert_eq!(history.redo().unwrap().post.text(), "a");
        assert_eq!(history.redo().unwrap().post.text(), "ab");
        assert!(!history.can_redo());
    }

    #[test]
    fn test_commit_clears_redo() {
        let mut history = History::new(HistoryPolicy::without_coalescing());
        history.commit(snap(""), snap("a"), EditKind::InsertText);
        history.undo();
        assert!(history.can_redo());
        history.commit(snap(""), snap("b"), EditKind::InsertText);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_depth_is_bounded() {
        let mut history = History::new(HistoryPolicy {
            max_depth: 2,
            ..HistoryPolicy::without_coalescing()
        });
        for t in ["a", "b", "c"] {
            history.commit(snap(""), snap(t), EditKind::InsertText);
        }
        assert_eq!(history.undo_depth(), 2);
        assert_eq!(history.undo().unwrap().post.text(), "");
        assert_eq!(history.undo().unwrap().post.text(), "");
        assert!(!history.can_undo());
    }

    #[test]
    fn test_typing_coalesces_until_sealed() {
        let mut history = History::default();
        history.commit(snap(""), snap("a"), EditKind::InsertText);
        history.commit(snap("a"), snap("ab"), EditKind::InsertText);
        assert_eq!(history.undo_depth(), 1);

        history.commit(snap("ab"), snap("a"), EditKind::DeleteRange);
        assert_eq!(history.undo_depth(), 2);

        history.seal();
        history.commit(snap("a"), snap("ax"), EditKind::InsertText);
        history.commit(snap("ax"), snap("axy"), EditKind::InsertText);
        assert_eq!(history.undo_depth(), 3);
        assert_eq!(history.undo().unwrap().post.text(), "a");
    }
}
