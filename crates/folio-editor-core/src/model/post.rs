//! The document root and its block-level structure operations.
//!
//! A post is a list of sections. Cursor positions live in *blocks*: markup
//! sections, list items, cards and images. Lists themselves never hold a
//! position, only their items do.

use smol_str::SmolStr;

use super::ids::{LeafId, SectionId};
use super::leaf::{Atom, Inlines, Leaf};
use super::section::{
    CardSection, ImageSection, ListItem, ListSection, MarkupSection, Section,
};

/// Where a block lives: top-level section index plus list item index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockAddr {
    pub(crate) section: usize,
    pub(crate) item: Option<usize>,
}

/// Borrowed view of one block.
#[derive(Clone, Copy, Debug)]
pub enum Block<'a> {
    /// A markup section (`list` is `None`) or list item.
    Text {
        id: SectionId,
        list: Option<SectionId>,
        inlines: &'a Inlines,
    },
    Card(&'a CardSection),
    Image(&'a ImageSection),
}

impl<'a> Block<'a> {
    pub fn id(&self) -> SectionId {
        match self {
            Block::Text { id, .. } => *id,
            Block::Card(c) => c.id(),
            Block::Image(i) => i.id(),
        }
    }

    /// Logical length. Opaque blocks have a before (0) and an after (1).
    pub fn len(&self) -> usize {
        match self {
            Block::Text { inlines, .. } => inlines.len(),
            Block::Card(_) | Block::Image(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Block::Text { .. })
    }

    pub fn is_opaque(&self) -> bool {
        !self.is_text()
    }

    pub fn inlines(&self) -> Option<&'a Inlines> {
        match self {
            Block::Text { inlines, .. } => Some(inlines),
            _ => None,
        }
    }
}

/// Root document node. Always holds at least one section.
#[derive(Clone, Debug, PartialEq)]
pub struct Post {
    sections: Vec<Section>,
}

impl Default for Post {
    fn default() -> Self {
        Self::new()
    }
}

impl Post {
    /// A post with one empty paragraph.
    pub fn new() -> Self {
        Self {
            sections: vec![MarkupSection::paragraph().into()],
        }
    }

    /// Build from sections. An empty list yields one empty paragraph.
    pub fn from_sections(sections: Vec<Section>) -> Self {
        let mut post = Self { sections };
        post.ensure_not_empty();
        post
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.iter().find(|s| s.id() == id)
    }

    pub fn section_index(&self, id: SectionId) -> Option<usize> {
        self.sections.iter().position(|s| s.id() == id)
    }

    /// All blocks in document order.
    pub fn blocks(&self) -> Vec<Block<'_>> {
        let mut out = Vec::new();
        for section in &self.sections {
            match section {
                Section::Markup(s) => out.push(Block::Text {
                    id: s.id(),
                    list: None,
                    inlines: s.content(),
                }),
                Section::List(l) => {
                    for item in l.items() {
                        out.push(Block::Text {
                            id: item.id(),
                            list: Some(l.id()),
                            inlines: item.content(),
                        });
                    }
                }
                Section::Card(c) => out.push(Block::Card(c)),
                Section::Image(i) => out.push(Block::Image(i)),
            }
        }
        out
    }

    pub fn block(&self, id: SectionId) -> Option<Block<'_>> {
        self.blocks().into_iter().find(|b| b.id() == id)
    }

    /// Index of a block in [`Post::blocks`] order.
    pub fn block_index(&self, id: SectionId) -> Option<usize> {
        self.blocks().iter().position(|b| b.id() == id)
    }

    pub fn first_block(&self) -> Option<Block<'_>> {
        self.blocks().into_iter().next()
    }

    pub fn last_block(&self) -> Option<Block<'_>> {
        self.blocks().into_iter().last()
    }

    /// Whether any section, list item, or block carries `id`.
    pub fn contains(&self, id: SectionId) -> bool {
        self.section(id).is_some() || self.addr(id).is_some()
    }

    /// Text of every text block, one line per block.
    pub fn text(&self) -> String {
        self.blocks()
            .iter()
            .filter_map(|b| b.inlines().map(Inlines::text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// True for a post holding a single blank markup section.
    pub fn is_blank(&self) -> bool {
        matches!(self.sections.as_slice(), [Section::Markup(s)] if s.is_blank())
    }

    /// Id of the top-level section owning a block or section id.
    pub fn owner_of(&self, id: SectionId) -> Option<SectionId> {
        self.addr(id).map(|a| self.sections[a.section].id())
    }

    pub(crate) fn addr(&self, id: SectionId) -> Option<BlockAddr> {
        for (i, section) in self.sections.iter().enumerate() {
            if section.id() == id {
                return Some(BlockAddr {
                    section: i,
                    item: None,
                });
            }
            if let Section::List(l) = section {
                if let Some(j) = l.items().iter().position(|it| it.id() == id) {
                    return Some(BlockAddr {
                        section: i,
                        item: Some(j),
                    });
                }
            }
        }
        None
    }

    pub(crate) fn inlines(&self, id: SectionId) -> Option<&Inlines> {
        self.block(id).and_then(|b| b.inlines())
    }

    pub(crate) fn inlines_mut(&mut self, id: SectionId) -> Option<&mut Inlines> {
        let addr = self.addr(id)?;
        match (&mut self.sections[addr.section], addr.item) {
            (Section::Markup(s), None) => Some(s.content_mut()),
            (Section::List(l), Some(j)) => Some(l.items_mut()[j].content_mut()),
            _ => None,
        }
    }

    pub(crate) fn card_mut(&mut self, id: SectionId) -> Option<&mut CardSection> {
        self.sections.iter_mut().find_map(|s| match s {
            Section::Card(c) if c.id() == id => Some(c),
            _ => None,
        })
    }

    pub(crate) fn atom_mut(&mut self, leaf: LeafId) -> Option<&mut Atom> {
        let block = self.block_of_leaf(leaf)?;
        match self.inlines_mut(block)?.leaf_mut(leaf)? {
            Leaf::Atom(a) => Some(a),
            Leaf::Marker(_) => None,
        }
    }

    /// Block id containing a leaf.
    pub fn block_of_leaf(&self, leaf: LeafId) -> Option<SectionId> {
        self.blocks()
            .iter()
            .find(|b| b.inlines().is_some_and(|i| i.leaf(leaf).is_some()))
            .map(Block::id)
    }

    pub(crate) fn insert_section(&mut self, index: usize, section: Section) {
        let index = index.min(self.sections.len());
        self.sections.insert(index, section);
    }

    fn ensure_not_empty(&mut self) {
        if self.sections.is_empty() {
            self.sections.push(MarkupSection::paragraph().into());
        }
    }

    /// Remove a top-level section or a list item. A list left without items
    /// is removed too. Returns `false` for an unknown id.
    pub(crate) fn remove(&mut self, id: SectionId) -> bool {
        let Some(addr) = self.addr(id) else {
            return false;
        };
        match addr.item {
            None => {
                self.sections.remove(addr.section);
            }
            Some(j) => {
                if let Section::List(l) = &mut self.sections[addr.section] {
                    l.items_mut().remove(j);
                    if l.items().is_empty() {
                        self.sections.remove(addr.section);
                    }
                }
            }
        }
        self.ensure_not_empty();
        true
    }

    /// Split a block at `offset`. Returns `(before, after)` block ids.
    ///
    /// Text blocks move their tail into a new sibling of the same kind.
    /// Opaque blocks get an empty paragraph inserted before (offset 0) or
    /// after (offset 1) them.
    pub(crate) fn split_block(
        &mut self,
        id: SectionId,
        offset: usize,
    ) -> Option<(SectionId, SectionId)> {
        let addr = self.addr(id)?;
        match (&mut self.sections[addr.section], addr.item) {
            (Section::Markup(s), None) => {
                let tail = s.content_mut().split_off(offset);
                let new = MarkupSection::from_inlines(SmolStr::new(s.tag()), tail);
                let new_id = new.id();
                self.sections.insert(addr.section + 1, new.into());
                Some((id, new_id))
            }
            (Section::List(l), Some(j)) => {
                let tail = l.items_mut()[j].content_mut().split_off(offset);
                let new = ListItem::from_inlines(tail);
                let new_id = new.id();
                l.items_mut().insert(j + 1, new);
                Some((id, new_id))
            }
            (Section::Card(_) | Section::Image(_), None) => {
                let p = MarkupSection::paragraph();
                let p_id = p.id();
                if offset == 0 {
                    self.sections.insert(addr.section, p.into());
                    Some((p_id, id))
                } else {
                    self.sections.insert(addr.section + 1, p.into());
                    Some((id, p_id))
                }
            }
            _ => None,
        }
    }

    /// Append the content of text block `right` to text block `left` and
    /// remove `right`. `left` keeps its id.
    pub(crate) fn join_blocks(&mut self, left: SectionId, right: SectionId) -> bool {
        if left == right || self.inlines(left).is_none() {
            return false;
        }
        let Some(tail) = self.inlines(right).cloned() else {
            return false;
        };
        self.remove(right);
        match self.inlines_mut(left) {
            Some(inlines) => {
                inlines.append(tail);
                true
            }
            None => false,
        }
    }

    /// Turn a list item into a paragraph placed where the item was, splitting
    /// the list around it. Returns the new paragraph's id.
    pub(crate) fn exit_list_item(&mut self, id: SectionId) -> Option<SectionId> {
        let addr = self.addr(id)?;
        let j = addr.item?;
        let Section::List(list) = &mut self.sections[addr.section] else {
            return None;
        };
        let tag = list.tag_smol();
        let mut after = list.items_mut().split_off(j);
        let item = after.remove(0);
        let p = MarkupSection::from_inlines(SmolStr::new_static("p"), item.into_inlines());
        let p_id = p.id();
        let before_empty = list.items().is_empty();

        if !before_empty {
            let mut at = addr.section + 1;
            self.sections.insert(at, p.into());
            if !after.is_empty() {
                at += 1;
                self.sections
                    .insert(at, ListSection::with_tag(tag, after).into());
            }
        } else if !after.is_empty() {
            *list.items_mut() = after;
            self.sections.insert(addr.section, p.into());
        } else {
            self.sections[addr.section] = p.into();
        }
        Some(p_id)
    }

    /// Replace a top-level opaque section with an empty paragraph.
    pub(crate) fn replace_with_paragraph(&mut self, id: SectionId) -> Option<SectionId> {
        let index = self.section_index(id)?;
        let p = MarkupSection::paragraph();
        let p_id = p.id();
        self.sections[index] = p.into();
        Some(p_id)
    }
}
