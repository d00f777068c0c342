//! Logical positions and ranges, and their translation to and from the live
//! selection.
//!
//! A [`Position`] names a block, the leaf the offset falls in, and the offset
//! inside that leaf. Positions are kept in canonical form: an offset on the
//! boundary between two leaves always belongs to the end of the left one, so
//! two positions naming the same place compare equal.
//!
//! Opaque blocks (cards and images) have exactly two positions, 0 (before)
//! and 1 (after). Nothing maps inside them.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::{Block, LeafId, Post, Section, SectionId};
use crate::platform::{LivePoint, LiveSelection, ViewId, ViewTree};
use crate::render::{PartView, RenderKind, Renderer, ViewRole};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

/// A logical caret location.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    section: SectionId,
    leaf: Option<LeafId>,
    offset: usize,
}

impl Position {
    /// Block (markup section, list item, card or image) holding the position.
    pub fn section(&self) -> SectionId {
        self.section
    }

    /// Leaf the offset is measured in. `None` for empty and opaque blocks.
    pub fn leaf(&self) -> Option<LeafId> {
        self.leaf
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// An ordered pair of positions. `head` never comes after `tail`.
///
/// Equality compares the two positions only; the direction is a hint for
/// which end the user is moving.
#[derive(Clone, Copy, Debug)]
pub struct Range {
    head: Position,
    tail: Position,
    direction: Option<Direction>,
}

impl PartialEq for Range {
    fn eq(&self, other: &Self) -> bool {
        self.head == other.head && self.tail == other.tail
    }
}

impl Eq for Range {}

impl Range {
    pub fn collapsed(position: Position) -> Self {
        Self {
            head: position,
            tail: position,
            direction: None,
        }
    }

    pub fn head(&self) -> Position {
        self.head
    }

    pub fn tail(&self) -> Position {
        self.tail
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn is_collapsed(&self) -> bool {
        self.head == self.tail
    }

    /// Where the selection started.
    pub fn anchor(&self) -> Position {
        match self.direction {
            Some(Direction::Backward) => self.tail,
            _ => self.head,
        }
    }

    /// Where the selection is being extended.
    pub fn focus(&self) -> Position {
        match self.direction {
            Some(Direction::Backward) => self.head,
            _ => self.tail,
        }
    }
}

impl Post {
    /// Canonical position at `offset` in a block. Offsets past the end clamp.
    pub fn position_at(&self, block: SectionId, offset: usize) -> Option<Position> {
        let position = match self.block(block)? {
            Block::Text { inlines, .. } => {
                let (leaf, offset) = inlines.locate(offset);
                Position {
                    section: block,
                    leaf,
                    offset: if leaf.is_some() { offset } else { 0 },
                }
            }
            Block::Card(_) | Block::Image(_) => Position {
                section: block,
                leaf: None,
                offset: offset.min(1),
            },
        };
        Some(position)
    }

    fn boundary_position(&self, block: Option<Block<'_>>, at_end: bool) -> Position {
        let Some(block) = block else {
            // A post always has a block; this is only reachable mid-mutation.
            return Position {
                section: self.sections()[0].id(),
                leaf: None,
                offset: 0,
            };
        };
        let offset = if at_end { block.len() } else { 0 };
        self.position_at(block.id(), offset).unwrap_or(Position {
            section: block.id(),
            leaf: None,
            offset: 0,
        })
    }

    /// First position of the post.
    pub fn start_position(&self) -> Position {
        self.boundary_position(self.first_block(), false)
    }

    /// Last position of the post.
    pub fn end_position(&self) -> Position {
        self.boundary_position(self.last_block(), true)
    }

    pub fn block_start(&self, block: SectionId) -> Option<Position> {
        self.position_at(block, 0)
    }

    pub fn block_end(&self, block: SectionId) -> Option<Position> {
        let len = self.block(block)?.len();
        self.position_at(block, len)
    }

    /// Block id and block-relative offset of a position, or `None` when it
    /// refers to a block or leaf that is no longer in the post.
    pub fn resolve(&self, position: &Position) -> Option<(SectionId, usize)> {
        match self.block(position.section)? {
            Block::Text { inlines, .. } => match position.leaf {
                Some(leaf) => {
                    let start = inlines.leaf_start(leaf)?;
                    let len = inlines.leaf(leaf)?.len();
                    (position.offset <= len).then_some((position.section, start + position.offset))
                }
                None => Some((position.section, position.offset.min(inlines.len()))),
            },
            Block::Card(_) | Block::Image(_) => {
                (position.leaf.is_none() && position.offset <= 1)
                    .then_some((position.section, position.offset))
            }
        }
    }

    /// Like [`Post::resolve`], falling back to the post start for stale
    /// positions.
    pub(crate) fn resolve_or_start(&self, position: &Position) -> (SectionId, usize) {
        match self.resolve(position) {
            Some(resolved) => resolved,
            None => {
                tracing::debug!(
                    target: "folio::range",
                    section = %position.section,
                    offset = position.offset,
                    "stale position, falling back to post start"
                );
                let start = self.start_position();
                (start.section, 0)
            }
        }
    }

    /// Re-canonicalize a position, or the post start when it is stale.
    pub fn normalize_position(&self, position: &Position) -> Position {
        let (block, offset) = self.resolve_or_start(position);
        self.position_at(block, offset)
            .unwrap_or_else(|| self.start_position())
    }

    /// Document order of two positions.
    pub fn compare(&self, a: &Position, b: &Position) -> Ordering {
        let (ab, ao) = self.resolve_or_start(a);
        let (bb, bo) = self.resolve_or_start(b);
        let ai = self.block_index(ab).unwrap_or(0);
        let bi = self.block_index(bb).unwrap_or(0);
        ai.cmp(&bi).then(ao.cmp(&bo))
    }

    /// Range from `anchor` to `focus`, ordered, with direction recorded.
    pub fn range(&self, anchor: Position, focus: Position) -> Range {
        match self.compare(&anchor, &focus) {
            Ordering::Equal => Range::collapsed(anchor),
            Ordering::Less => Range {
                head: anchor,
                tail: focus,
                direction: Some(Direction::Forward),
            },
            Ordering::Greater => Range {
                head: focus,
                tail: anchor,
                direction: Some(Direction::Backward),
            },
        }
    }

    /// Range covering the whole post.
    pub fn full_range(&self) -> Range {
        self.range(self.start_position(), self.end_position())
    }

    /// A range over block offsets, the way transactions record results.
    pub(crate) fn range_between(
        &self,
        head: (SectionId, usize),
        tail: (SectionId, usize),
        direction: Option<Direction>,
    ) -> Option<Range> {
        let head = self.position_at(head.0, head.1)?;
        let tail = self.position_at(tail.0, tail.1)?;
        let mut range = self.range(head, tail);
        if !range.is_collapsed() {
            range.direction = direction.or(range.direction);
        }
        Some(range)
    }
}

/// Live point for a logical position. Uses the placeholder nodes around
/// opaque content, never a point inside it.
pub fn to_live_point(post: &Post, renderer: &Renderer, position: &Position) -> Option<LivePoint> {
    let (block, offset) = post.resolve(position)?;
    let node = renderer.node(block)?;
    match node.kind() {
        RenderKind::Opaque { view, .. } => Some(if offset == 0 {
            LivePoint::new(view.head(), 0)
        } else {
            LivePoint::new(view.tail(), 1)
        }),
        RenderKind::Block { .. } => {
            let inlines = post.block(block)?.inlines()?;
            let (leaf, in_leaf) = inlines.locate(offset);
            let Some(leaf) = leaf else {
                return Some(LivePoint::new(node.element(), 0));
            };
            let point = match node.part(leaf) {
                Some(PartView::Text { text, .. }) => LivePoint::new(*text, in_leaf),
                Some(PartView::Atom { opaque, .. }) => {
                    if in_leaf == 0 {
                        LivePoint::new(opaque.head(), 0)
                    } else {
                        LivePoint::new(opaque.tail(), 1)
                    }
                }
                // Stale render: anchor to the block element itself.
                None => LivePoint::new(node.element(), 0),
            };
            Some(point)
        }
        RenderKind::List { .. } => None,
    }
}

pub fn to_live_selection(post: &Post, renderer: &Renderer, range: &Range) -> Option<LiveSelection> {
    let anchor = to_live_point(post, renderer, &range.anchor())?;
    let focus = to_live_point(post, renderer, &range.focus())?;
    Some(LiveSelection::new(anchor, focus))
}

fn child_index(view: &dyn ViewTree, parent: ViewId, child: ViewId) -> Option<usize> {
    view.children(parent).iter().position(|c| *c == child)
}

/// Block offset for a live point.
pub fn from_live_point(
    post: &Post,
    renderer: &Renderer,
    view: &dyn ViewTree,
    point: LivePoint,
) -> Option<(SectionId, usize)> {
    let mut node = point.node;
    let mut from: Option<ViewId> = None;
    let role = loop {
        match renderer.role(node) {
            Some(role) => break role,
            None => {
                from = Some(node);
                node = view.parent(node)?;
            }
        }
    };
    // Child index the point sits at when it is on an element.
    let index = match from {
        Some(child) => child_index(view, node, child)?,
        None => point.offset,
    };

    let leaf_start = |block: SectionId, leaf: LeafId| -> Option<usize> {
        post.block(block)?.inlines()?.leaf_start(leaf)
    };
    let opaque_base = |block: SectionId, leaf: Option<LeafId>| -> Option<usize> {
        match leaf {
            Some(leaf) => leaf_start(block, leaf),
            None => Some(0),
        }
    };

    match role {
        ViewRole::Text { block, leaf } => {
            let inlines = post.block(block)?.inlines()?;
            let len = inlines.leaf(leaf)?.len();
            let within = if from.is_none() { point.offset.min(len) } else { 0 };
            Some((block, inlines.leaf_start(leaf)? + within))
        }
        ViewRole::Markup { block, leaf } => {
            let inlines = post.block(block)?.inlines()?;
            let start = inlines.leaf_start(leaf)?;
            let after = from.is_none() && index > 0;
            Some((block, if after { start + inlines.leaf(leaf)?.len() } else { start }))
        }
        ViewRole::Block(block) => {
            let rendered = renderer.node(block)?;
            let inlines = post.block(block)?.inlines()?;
            let children = view.children(node);
            let mut offset = 0;
            for child in children.iter().take(index) {
                if let Some(part) = rendered.parts().iter().find(|p| p.outer() == *child) {
                    offset += inlines.leaf(part.leaf()).map(|l| l.len()).unwrap_or(0);
                }
            }
            Some((block, offset.min(inlines.len())))
        }
        ViewRole::LineBreak(block) => Some((block, 0)),
        ViewRole::Opaque { block, leaf } => {
            let base = opaque_base(block, leaf)?;
            Some((block, if index >= 2 { base + 1 } else { base }))
        }
        ViewRole::Head { block, leaf } | ViewRole::Content { block, leaf } => {
            Some((block, opaque_base(block, leaf)?))
        }
        ViewRole::Tail { block, leaf } => Some((block, opaque_base(block, leaf)? + 1)),
        ViewRole::List(list) => {
            let Some(Section::List(list)) = post.section(list) else {
                return None;
            };
            match list.items().get(index) {
                Some(item) => Some((item.id(), 0)),
                None => {
                    let last = list.items().last()?;
                    Some((last.id(), last.content().len()))
                }
            }
        }
        ViewRole::Root => {
            let first_block_of = |section: &Section| -> Option<SectionId> {
                match section {
                    Section::List(l) => l.items().first().map(|i| i.id()),
                    other => Some(other.id()),
                }
            };
            match post.sections().get(index) {
                Some(section) => Some((first_block_of(section)?, 0)),
                None => {
                    let last = post.last_block()?;
                    Some((last.id(), last.len()))
                }
            }
        }
    }
}

/// Logical range for the live selection. A collapsed live selection gives a
/// collapsed range.
pub fn from_live_selection(
    post: &Post,
    renderer: &Renderer,
    view: &dyn ViewTree,
    selection: LiveSelection,
) -> Option<Range> {
    let (ab, ao) = from_live_point(post, renderer, view, selection.anchor)?;
    let anchor = post.position_at(ab, ao)?;
    if selection.is_collapsed() {
        return Some(Range::collapsed(anchor));
    }
    let (fb, fo) = from_live_point(post, renderer, view, selection.focus)?;
    let focus = post.position_at(fb, fo)?;
    let range = post.range(anchor, focus);
    tracing::trace!(
        target: "folio::range",
        ?anchor,
        ?focus,
        collapsed = range.is_collapsed(),
        "read live selection"
    );
    Some(range)
}
