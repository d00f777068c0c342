//! Edit transactions.
//!
//! [`PostEditor`] is what a mutator passed to
//! [`Editor::run`](crate::editor::Editor::run) works with. Every primitive
//! mutates the post directly, records which blocks it touched, and moves the
//! transaction's range to where the edit left the caret. The editor turns the
//! finished transaction into a render pass, a selection restore and a history
//! entry.
//!
//! Opaque blocks (cards and images) only accept structural edits. Text
//! insertion at one of their boundaries is ignored and hands back the
//! position it was given.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::embed::CardMode;
use crate::model::{Block, Leaf, LeafId, Markup, Post, Section, SectionId};
use crate::range::{Position, Range};

/// What kind of change a transaction made. Used for history coalescing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    InsertText,
    DeleteRange,
    ToggleMarkup,
    SplitSection,
    InsertSection,
    RemoveSection,
    InsertMarkers,
    Payload,
    /// More than one kind of primitive ran in the transaction.
    Mixed,
}

/// Mutation primitives available inside one transaction.
pub struct PostEditor<'a> {
    post: &'a mut Post,
    range: Option<Range>,
    pending: Option<Vec<Markup>>,
    touched: BTreeSet<SectionId>,
    /// Blocks whose edges moved: split, joined, inserted or next to a removal.
    reshaped: BTreeSet<SectionId>,
    kinds: Vec<EditKind>,
    modes: Vec<(SectionId, CardMode)>,
    undoable: bool,
}

/// Everything the editor needs after the mutator returns.
#[derive(Debug)]
pub(crate) struct EditOutcome {
    pub(crate) touched: Vec<SectionId>,
    pub(crate) kinds: Vec<EditKind>,
    pub(crate) modes: Vec<(SectionId, CardMode)>,
    pub(crate) range: Option<Range>,
    pub(crate) pending: Option<Vec<Markup>>,
    pub(crate) undoable: bool,
}

impl EditOutcome {
    /// Single kind describing the transaction, `None` if nothing was edited.
    pub(crate) fn kind(&self) -> Option<EditKind> {
        let first = *self.kinds.first()?;
        if self.kinds.iter().all(|k| *k == first) {
            Some(first)
        } else {
            Some(EditKind::Mixed)
        }
    }
}

fn block_ids(post: &Post) -> Vec<SectionId> {
    post.blocks().iter().map(Block::id).collect()
}

impl<'a> PostEditor<'a> {
    pub(crate) fn new(post: &'a mut Post, range: Option<Range>, pending: Option<Vec<Markup>>) -> Self {
        Self {
            post,
            range,
            pending,
            touched: BTreeSet::new(),
            reshaped: BTreeSet::new(),
            kinds: Vec::new(),
            modes: Vec::new(),
            undoable: true,
        }
    }

    pub fn post(&self) -> &Post {
        self.post
    }

    /// Range the transaction will restore when it finishes.
    pub fn range(&self) -> Option<Range> {
        self.range
    }

    /// Move the caret or selection. Clears pending markups.
    pub fn set_range(&mut self, range: Range) {
        let anchor = self.post.normalize_position(&range.anchor());
        let focus = self.post.normalize_position(&range.focus());
        self.range = Some(self.post.range(anchor, focus));
        self.pending = None;
    }

    /// Markups the next inserted text will carry, if a collapsed toggle set
    /// them.
    pub fn pending_markups(&self) -> Option<&[Markup]> {
        self.pending.as_deref()
    }

    /// Keep this transaction out of the undo history.
    pub fn set_undoable(&mut self, undoable: bool) {
        self.undoable = undoable;
    }

    fn touch(&mut self, id: SectionId) {
        self.touched.insert(id);
    }

    fn reshape(&mut self, id: SectionId) {
        self.touched.insert(id);
        self.reshaped.insert(id);
    }

    fn record(&mut self, kind: EditKind) {
        self.kinds.push(kind);
    }

    fn caret(&mut self, block: SectionId, offset: usize) -> Position {
        let position = self
            .post
            .position_at(block, offset)
            .unwrap_or_else(|| self.post.start_position());
        self.range = Some(Range::collapsed(position));
        position
    }

    /// Insert `text`, replacing the range's content first if it is not
    /// collapsed. Returns the caret after the inserted text.
    pub fn insert_text(&mut self, range: Range, text: &str) -> Position {
        let position = if range.is_collapsed() {
            self.post.normalize_position(&range.head())
        } else {
            self.delete_range(range)
        };
        if text.is_empty() {
            return position;
        }
        let (block, offset) = self.post.resolve_or_start(&position);
        let markups = self.pending.take();
        let Some(inlines) = self.post.inlines_mut(block) else {
            tracing::debug!(
                target: "folio::txn",
                %block,
                offset,
                "text insertion at opaque boundary ignored"
            );
            self.pending = markups;
            return position;
        };
        let end = inlines.insert_text(offset, text, markups.as_deref());
        self.touch(block);
        self.record(EditKind::InsertText);
        self.caret(block, end)
    }

    /// Remove everything between the range's ends, joining the end blocks
    /// when the range crosses a block boundary. Returns the earlier end.
    pub fn delete_range(&mut self, range: Range) -> Position {
        if range.is_collapsed() {
            return self.post.normalize_position(&range.head());
        }
        let (head, head_offset) = self.post.resolve_or_start(&range.head());
        let (tail, tail_offset) = self.post.resolve_or_start(&range.tail());
        self.record(EditKind::DeleteRange);
        let (block, offset) = if head == tail {
            self.delete_within(head, head_offset, tail_offset)
        } else {
            self.delete_across(head, head_offset, tail, tail_offset)
        };
        self.caret(block, offset)
    }

    fn delete_within(&mut self, block: SectionId, start: usize, end: usize) -> (SectionId, usize) {
        self.touch(block);
        if let Some(inlines) = self.post.inlines_mut(block) {
            inlines.delete(start..end);
            return (block, start);
        }
        // An opaque block fully covered by the range is replaced, not removed,
        // so the caret keeps a place to land.
        if start == 0 && end >= 1 {
            if let Some(p) = self.post.replace_with_paragraph(block) {
                self.reshape(p);
                return (p, 0);
            }
        }
        (block, start)
    }

    fn delete_across(
        &mut self,
        head: SectionId,
        head_offset: usize,
        tail: SectionId,
        tail_offset: usize,
    ) -> (SectionId, usize) {
        let blocks = block_ids(self.post);
        let (Some(hi), Some(ti)) = (
            blocks.iter().position(|b| *b == head),
            blocks.iter().position(|b| *b == tail),
        ) else {
            return (head, head_offset);
        };
        if hi > ti {
            return (head, head_offset);
        }
        self.touch(head);
        self.touch(tail);

        let mut head = head;
        let mut reshaped = ti > hi + 1;
        match self.post.inlines_mut(head) {
            Some(inlines) => {
                let len = inlines.len();
                inlines.delete(head_offset..len);
            }
            None => {
                if head_offset == 0 {
                    if let Some(p) = self.post.replace_with_paragraph(head) {
                        self.touch(p);
                        head = p;
                        reshaped = true;
                    }
                }
            }
        }

        for id in &blocks[hi + 1..ti] {
            self.post.remove(*id);
        }

        let tail_survives = match self.post.inlines_mut(tail) {
            Some(inlines) => {
                inlines.delete(0..tail_offset);
                true
            }
            None => {
                if tail_offset >= 1 {
                    self.post.remove(tail);
                    reshaped = true;
                    false
                } else {
                    true
                }
            }
        };

        let both_text =
            self.post.inlines(head).is_some() && self.post.inlines(tail).is_some();
        if tail_survives && both_text {
            reshaped |= self.post.join_blocks(head, tail);
        }
        if reshaped {
            self.reshape(head);
            if self.post.contains(tail) {
                self.reshape(tail);
            }
        }
        (head, head_offset)
    }

    /// Toggle `markup` over a range.
    ///
    /// The markup counts as active when every covered leaf already carries
    /// its tag; active markups are removed, otherwise added everywhere. A
    /// collapsed range toggles the markups the next inserted text gets.
    pub fn toggle_markup(&mut self, range: Range, markup: Markup) -> Range {
        if range.is_collapsed() {
            self.toggle_pending(&range, markup);
            return range;
        }

        let (head, head_offset) = self.post.resolve_or_start(&range.head());
        let (tail, tail_offset) = self.post.resolve_or_start(&range.tail());
        let blocks = block_ids(self.post);
        let (Some(hi), Some(ti)) = (
            blocks.iter().position(|b| *b == head),
            blocks.iter().position(|b| *b == tail),
        ) else {
            return range;
        };
        if hi > ti {
            return range;
        }

        // Align leaf boundaries with the range edges first.
        let mut spans: Vec<(SectionId, usize, usize)> = Vec::new();
        for id in &blocks[hi..=ti] {
            let Some(inlines) = self.post.inlines_mut(*id) else {
                continue;
            };
            let start = if *id == head { head_offset } else { 0 };
            let end = if *id == tail { tail_offset } else { inlines.len() };
            if start >= end {
                continue;
            }
            let first = inlines.split_boundary(start);
            let last = inlines.split_boundary(end);
            spans.push((*id, first, last));
        }
        if spans.is_empty() {
            return range;
        }

        let tag = markup.tag();
        let active = spans.iter().all(|(id, first, last)| {
            self.post.inlines(*id).is_some_and(|inlines| {
                inlines.leaves()[*first..*last]
                    .iter()
                    .all(|leaf| leaf.has_markup(tag))
            })
        });

        for (id, first, last) in &spans {
            if let Some(inlines) = self.post.inlines_mut(*id) {
                for leaf in &mut inlines.leaves_mut()[*first..*last] {
                    if active {
                        leaf.remove_markup(tag);
                    } else {
                        leaf.add_markup(markup.clone());
                    }
                }
                inlines.normalize();
            }
        }
        for (id, _, _) in &spans {
            self.touch(*id);
        }
        self.record(EditKind::ToggleMarkup);
        tracing::trace!(
            target: "folio::txn",
            tag,
            active,
            blocks = spans.len(),
            "toggled markup"
        );

        let toggled = self
            .post
            .range_between((head, head_offset), (tail, tail_offset), range.direction())
            .unwrap_or(range);
        self.range = Some(toggled);
        toggled
    }

    fn toggle_pending(&mut self, range: &Range, markup: Markup) {
        let mut markups = match self.pending.take() {
            Some(pending) => pending,
            None => {
                let (block, offset) = self.post.resolve_or_start(&range.head());
                self.post
                    .inlines(block)
                    .map(|inlines| inlines.markups_at(offset))
                    .unwrap_or_default()
            }
        };
        if markups.iter().any(|m| m.has_tag(markup.tag())) {
            markups.retain(|m| !m.has_tag(markup.tag()));
        } else {
            markups.push(markup);
        }
        self.pending = Some(markups);
    }

    /// Structural break at `position`.
    ///
    /// Text blocks move everything after the position into a new sibling of
    /// the same kind; the caret lands at its start. Breaking an empty list
    /// item turns it into a paragraph after the list instead. At a card or
    /// image boundary an empty paragraph is inserted on that side.
    pub fn split_section(&mut self, position: Position) -> Position {
        let (block, offset) = self.post.resolve_or_start(&position);
        let blank_item = matches!(
            self.post.block(block),
            Some(Block::Text { list: Some(_), inlines, .. }) if inlines.is_empty()
        );
        if blank_item {
            if let Some(p) = self.post.exit_list_item(block) {
                self.reshape(p);
                self.record(EditKind::SplitSection);
                return self.caret(p, 0);
            }
        }
        match self.post.split_block(block, offset) {
            Some((before, after)) => {
                self.reshape(before);
                self.reshape(after);
                self.record(EditKind::SplitSection);
                self.caret(after, 0)
            }
            None => position,
        }
    }

    fn prepare_section(&self, mut section: Section) -> Section {
        if self.post.contains(section.id()) {
            section.reassign_ids();
        }
        section
    }

    fn insert_section_at(&mut self, index: usize, section: Section) -> SectionId {
        let section = self.prepare_section(section);
        let id = section.id();
        self.post.insert_section(index, section);
        self.reshape(id);
        self.record(EditKind::InsertSection);
        id
    }

    /// Insert a section before the top-level section holding `anchor`.
    pub fn insert_section_before(&mut self, anchor: SectionId, section: Section) -> Option<SectionId> {
        let owner = self.post.owner_of(anchor)?;
        let index = self.post.section_index(owner)?;
        Some(self.insert_section_at(index, section))
    }

    /// Insert a section after the top-level section holding `anchor`.
    pub fn insert_section_after(&mut self, anchor: SectionId, section: Section) -> Option<SectionId> {
        let owner = self.post.owner_of(anchor)?;
        let index = self.post.section_index(owner)?;
        Some(self.insert_section_at(index + 1, section))
    }

    pub fn append_section(&mut self, section: Section) -> SectionId {
        let index = self.post.sections().len();
        self.insert_section_at(index, section)
    }

    /// Remove a top-level section or list item. A caret inside it moves to
    /// the start of the block that took its place.
    pub fn remove_section(&mut self, id: SectionId) -> bool {
        let blocks = block_ids(self.post);
        let first = blocks
            .iter()
            .position(|b| *b == id || self.post.owner_of(*b) == Some(id))
            .unwrap_or(0);
        if !self.post.remove(id) {
            return false;
        }
        self.record(EditKind::RemoveSection);

        let blocks = block_ids(self.post);
        let at = first.min(blocks.len().saturating_sub(1));
        if let Some(next) = blocks.get(at) {
            self.reshape(*next);
        }
        if let Some(prev) = at.checked_sub(1).and_then(|i| blocks.get(i)) {
            self.reshape(*prev);
        }
        let stale = self.range.is_some_and(|r| {
            self.post.resolve(&r.head()).is_none() || self.post.resolve(&r.tail()).is_none()
        });
        if stale {
            if let Some(next) = blocks.get(at) {
                self.caret(*next, 0);
            }
        }
        true
    }

    /// Insert leaves (markers and atoms) at a position. Returns the caret
    /// after them, or the position unchanged at an opaque boundary.
    pub fn insert_markers(&mut self, position: Position, leaves: Vec<Leaf>) -> Position {
        if leaves.is_empty() {
            return position;
        }
        let (block, offset) = self.post.resolve_or_start(&position);
        let leaves: Vec<Leaf> = leaves
            .into_iter()
            .map(|mut leaf| {
                if self.post.block_of_leaf(leaf.id()).is_some() {
                    leaf.reassign_id();
                }
                leaf
            })
            .collect();
        let Some(inlines) = self.post.inlines_mut(block) else {
            tracing::debug!(target: "folio::txn", %block, "marker insertion at opaque boundary ignored");
            return position;
        };
        let end = inlines.insert_leaves(offset, leaves);
        self.touch(block);
        self.record(EditKind::InsertMarkers);
        self.caret(block, end)
    }

    /// Remove one atom from its block.
    pub fn remove_atom(&mut self, leaf: LeafId) -> bool {
        let Some(block) = self.post.block_of_leaf(leaf) else {
            return false;
        };
        let Some(inlines) = self.post.inlines_mut(block) else {
            return false;
        };
        let Some(start) = inlines.leaf_start(leaf) else {
            return false;
        };
        inlines.delete(start..start + 1);
        self.touch(block);
        self.record(EditKind::DeleteRange);
        let stale = self.range.is_some_and(|r| {
            self.post.resolve(&r.head()).is_none() || self.post.resolve(&r.tail()).is_none()
        });
        if stale {
            self.caret(block, start);
        }
        true
    }

    /// Switch a card between its display and edit views. Only the card is
    /// rebuilt and the post itself does not change.
    pub fn set_card_mode(&mut self, card: SectionId, mode: CardMode) -> bool {
        if !matches!(self.post.section(card), Some(Section::Card(_))) {
            return false;
        }
        self.modes.push((card, mode));
        self.touch(card);
        true
    }

    pub fn set_card_payload(&mut self, card: SectionId, payload: Value) -> bool {
        let Some(section) = self.post.card_mut(card) else {
            return false;
        };
        section.set_payload(payload);
        self.touch(card);
        self.record(EditKind::Payload);
        true
    }

    pub fn set_atom_payload(&mut self, leaf: LeafId, payload: Value) -> bool {
        let Some(block) = self.post.block_of_leaf(leaf) else {
            return false;
        };
        let Some(atom) = self.post.atom_mut(leaf) else {
            return false;
        };
        atom.set_payload(payload);
        self.touch(block);
        self.record(EditKind::Payload);
        true
    }

    pub(crate) fn finish(self) -> EditOutcome {
        let post: &Post = self.post;
        let blocks = post.blocks();
        let mut touched = self.touched;

        // A structural edit next to a card or image rebuilds both sides of
        // that boundary. Edits inside one block never reach a neighbour.
        let mut adjacent = Vec::new();
        for (i, block) in blocks.iter().enumerate() {
            if !self.reshaped.contains(&block.id()) {
                continue;
            }
            for j in [i.checked_sub(1), Some(i + 1)].into_iter().flatten() {
                if let Some(next) = blocks.get(j) {
                    if block.is_opaque() || next.is_opaque() {
                        adjacent.push(next.id());
                    }
                }
            }
        }
        touched.extend(adjacent);
        touched.retain(|id| post.contains(*id));

        let range = self.range.map(|r| {
            let anchor = post.normalize_position(&r.anchor());
            let focus = post.normalize_position(&r.focus());
            post.range(anchor, focus)
        });

        EditOutcome {
            touched: touched.into_iter().collect(),
            kinds: self.kinds,
            modes: self.modes,
            range,
            pending: self.pending,
            undoable: self.undoable,
        }
    }
}
