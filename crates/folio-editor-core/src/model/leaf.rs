//! Inline leaves: text markers, atoms, and the ordered run that holds them.

use std::hash::{Hash, Hasher};
use std::ops::Range;

use serde_json::Value;
use smol_str::SmolStr;

use super::ids::LeafId;
use super::markup::{Markup, dedup_markups, same_markups};
use crate::error::ValidationError;

/// Byte index of the `char_offset`-th character, clamped to the end.
fn byte_index(s: &str, char_offset: usize) -> usize {
    s.char_indices()
        .nth(char_offset)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// A run of text with its active markup stack.
#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    id: LeafId,
    text: SmolStr,
    markups: Vec<Markup>,
}

impl Marker {
    /// Build a marker. Duplicate tags in `markups` are dropped.
    pub fn new(text: impl Into<SmolStr>, markups: Vec<Markup>) -> Self {
        Self {
            id: LeafId::fresh(),
            text: text.into(),
            markups: dedup_markups(markups),
        }
    }

    pub fn id(&self) -> LeafId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn markups(&self) -> &[Markup] {
        &self.markups
    }

    /// Length in chars.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn has_markup(&self, tag: &str) -> bool {
        self.markups.iter().any(|m| m.has_tag(tag))
    }

    /// Split at a char offset. `self` keeps the head and its id; the tail gets
    /// a fresh id and the same markup stack.
    pub(crate) fn split_off(&mut self, offset: usize) -> Marker {
        let at = byte_index(&self.text, offset);
        let tail = SmolStr::new(&self.text[at..]);
        self.text = SmolStr::new(&self.text[..at]);
        Marker {
            id: LeafId::fresh(),
            text: tail,
            markups: self.markups.clone(),
        }
    }

    pub(crate) fn insert_text(&mut self, offset: usize, text: &str) {
        let at = byte_index(&self.text, offset);
        let mut s = String::with_capacity(self.text.len() + text.len());
        s.push_str(&self.text[..at]);
        s.push_str(text);
        s.push_str(&self.text[at..]);
        self.text = s.into();
    }

    pub(crate) fn push_text(&mut self, text: &str) {
        let len = self.len();
        self.insert_text(len, text);
    }

    pub(crate) fn add_markup(&mut self, markup: Markup) {
        if !self.has_markup(markup.tag()) {
            self.markups.push(markup);
        }
    }

    pub(crate) fn remove_markup(&mut self, tag: &str) {
        self.markups.retain(|m| !m.has_tag(tag));
    }
}

/// Opaque inline content rendered by a registered atom.
#[derive(Clone, Debug, PartialEq)]
pub struct Atom {
    id: LeafId,
    name: SmolStr,
    value: SmolStr,
    payload: Value,
    markups: Vec<Markup>,
}

impl Atom {
    pub fn new(
        name: impl Into<SmolStr>,
        value: impl Into<SmolStr>,
        payload: Value,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::EmptyEmbedName);
        }
        Ok(Self {
            id: LeafId::fresh(),
            name,
            value: value.into(),
            payload,
            markups: Vec::new(),
        })
    }

    pub fn with_markups(mut self, markups: Vec<Markup>) -> Self {
        self.markups = dedup_markups(markups);
        self
    }

    pub fn id(&self) -> LeafId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display text of the atom.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn markups(&self) -> &[Markup] {
        &self.markups
    }

    pub(crate) fn set_payload(&mut self, payload: Value) {
        self.payload = payload;
    }
}

/// An inline leaf.
#[derive(Clone, Debug, PartialEq)]
pub enum Leaf {
    Marker(Marker),
    Atom(Atom),
}

impl Leaf {
    pub fn id(&self) -> LeafId {
        match self {
            Leaf::Marker(m) => m.id,
            Leaf::Atom(a) => a.id,
        }
    }

    /// Logical length. Atoms always count as one unit.
    pub fn len(&self) -> usize {
        match self {
            Leaf::Marker(m) => m.len(),
            Leaf::Atom(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn markups(&self) -> &[Markup] {
        match self {
            Leaf::Marker(m) => &m.markups,
            Leaf::Atom(a) => &a.markups,
        }
    }

    pub fn has_markup(&self, tag: &str) -> bool {
        self.markups().iter().any(|m| m.has_tag(tag))
    }

    pub fn as_marker(&self) -> Option<&Marker> {
        match self {
            Leaf::Marker(m) => Some(m),
            Leaf::Atom(_) => None,
        }
    }

    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            Leaf::Atom(a) => Some(a),
            Leaf::Marker(_) => None,
        }
    }

    pub(crate) fn add_markup(&mut self, markup: Markup) {
        match self {
            Leaf::Marker(m) => m.add_markup(markup),
            Leaf::Atom(a) => {
                if !a.markups.iter().any(|m| m.has_tag(markup.tag())) {
                    a.markups.push(markup);
                }
            }
        }
    }

    pub(crate) fn remove_markup(&mut self, tag: &str) {
        match self {
            Leaf::Marker(m) => m.remove_markup(tag),
            Leaf::Atom(a) => a.markups.retain(|m| !m.has_tag(tag)),
        }
    }

    pub(crate) fn reassign_id(&mut self) {
        match self {
            Leaf::Marker(m) => m.id = LeafId::fresh(),
            Leaf::Atom(a) => a.id = LeafId::fresh(),
        }
    }

    pub(crate) fn hash_into<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
        match self {
            Leaf::Marker(m) => {
                0u8.hash(state);
                m.text.hash(state);
            }
            Leaf::Atom(a) => {
                1u8.hash(state);
                a.name.hash(state);
                a.value.hash(state);
                a.payload.to_string().hash(state);
            }
        }
        self.markups().hash(state);
    }
}

impl From<Marker> for Leaf {
    fn from(m: Marker) -> Self {
        Leaf::Marker(m)
    }
}

impl From<Atom> for Leaf {
    fn from(a: Atom) -> Self {
        Leaf::Atom(a)
    }
}

/// The ordered leaves of a text-bearing block (markup section or list item).
///
/// Offsets are logical: characters of markers plus one unit per atom.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Inlines {
    leaves: Vec<Leaf>,
}

impl Inlines {
    pub fn new(leaves: Vec<Leaf>) -> Self {
        Self { leaves }
    }

    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    pub fn len(&self) -> usize {
        self.leaves.iter().map(Leaf::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Plain text, with atoms contributing their display value.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for leaf in &self.leaves {
            match leaf {
                Leaf::Marker(m) => out.push_str(m.text()),
                Leaf::Atom(a) => out.push_str(a.value()),
            }
        }
        out
    }

    pub fn leaf(&self, id: LeafId) -> Option<&Leaf> {
        self.leaves.iter().find(|l| l.id() == id)
    }

    /// Offset at which the given leaf starts.
    pub fn leaf_start(&self, id: LeafId) -> Option<usize> {
        let mut start = 0;
        for leaf in &self.leaves {
            if leaf.id() == id {
                return Some(start);
            }
            start += leaf.len();
        }
        None
    }

    /// Resolve an offset to `(leaf, offset within leaf)`.
    ///
    /// A boundary between two leaves resolves to the end of the left one, so
    /// every offset has exactly one resolution. Out-of-range offsets clamp.
    pub fn locate(&self, offset: usize) -> (Option<LeafId>, usize) {
        let offset = offset.min(self.len());
        let mut start = 0;
        for leaf in &self.leaves {
            let end = start + leaf.len();
            if offset <= end {
                return (Some(leaf.id()), offset - start);
            }
            start = end;
        }
        (None, 0)
    }

    /// Markup stack a caret at `offset` would type with.
    pub fn markups_at(&self, offset: usize) -> Vec<Markup> {
        match self.locate(offset) {
            (Some(id), _) => self
                .leaf(id)
                .map(|l| l.markups().to_vec())
                .unwrap_or_default(),
            (None, _) => Vec::new(),
        }
    }

    pub(crate) fn leaves_mut(&mut self) -> &mut [Leaf] {
        &mut self.leaves
    }

    pub(crate) fn leaf_mut(&mut self, id: LeafId) -> Option<&mut Leaf> {
        self.leaves.iter_mut().find(|l| l.id() == id)
    }

    /// Ensure a leaf boundary exists at `offset`, splitting a marker if
    /// needed. Returns the index of the first leaf starting at `offset`.
    pub(crate) fn split_boundary(&mut self, offset: usize) -> usize {
        let mut start = 0;
        for idx in 0..self.leaves.len() {
            if offset == start {
                return idx;
            }
            let len = self.leaves[idx].len();
            if offset < start + len {
                let tail = match &mut self.leaves[idx] {
                    Leaf::Marker(m) => Some(m.split_off(offset - start)),
                    Leaf::Atom(_) => None,
                };
                if let Some(tail) = tail {
                    self.leaves.insert(idx + 1, Leaf::Marker(tail));
                }
                return idx + 1;
            }
            start += len;
        }
        self.leaves.len()
    }

    /// Remove and return everything after `offset`.
    pub(crate) fn split_off(&mut self, offset: usize) -> Inlines {
        let idx = self.split_boundary(offset);
        let tail = self.leaves.split_off(idx);
        self.normalize();
        let mut tail = Inlines { leaves: tail };
        tail.normalize();
        tail
    }

    pub(crate) fn append(&mut self, other: Inlines) {
        self.leaves.extend(other.leaves);
        self.normalize();
    }

    /// Insert text at `offset`, returning the offset right after it.
    ///
    /// With `markups` the text becomes its own run carrying exactly that
    /// stack. Without, it joins the leaf the caret resolves to.
    pub(crate) fn insert_text(
        &mut self,
        offset: usize,
        text: &str,
        markups: Option<&[Markup]>,
    ) -> usize {
        let offset = offset.min(self.len());
        let inserted = text.chars().count();
        if inserted == 0 {
            return offset;
        }
        match markups {
            Some(markups) => {
                let idx = self.split_boundary(offset);
                self.leaves
                    .insert(idx, Leaf::Marker(Marker::new(text, markups.to_vec())));
                self.normalize();
            }
            None => self.insert_inheriting(offset, text),
        }
        offset + inserted
    }

    fn insert_inheriting(&mut self, offset: usize, text: &str) {
        let mut start = 0;
        for idx in 0..self.leaves.len() {
            let len = self.leaves[idx].len();
            if offset <= start + len {
                let is_atom = matches!(self.leaves[idx], Leaf::Atom(_));
                if !is_atom {
                    if let Leaf::Marker(m) = &mut self.leaves[idx] {
                        m.insert_text(offset - start, text);
                    }
                    return;
                }
                if offset == start {
                    self.leaves
                        .insert(idx, Leaf::Marker(Marker::new(text, Vec::new())));
                    return;
                }
                if let Some(Leaf::Marker(next)) = self.leaves.get_mut(idx + 1) {
                    next.insert_text(0, text);
                    return;
                }
                self.leaves
                    .insert(idx + 1, Leaf::Marker(Marker::new(text, Vec::new())));
                return;
            }
            start += len;
        }
        self.leaves
            .push(Leaf::Marker(Marker::new(text, Vec::new())));
    }

    /// Insert whole leaves at `offset`, returning the offset after them.
    pub(crate) fn insert_leaves(&mut self, offset: usize, leaves: Vec<Leaf>) -> usize {
        let offset = offset.min(self.len());
        let added: usize = leaves.iter().map(Leaf::len).sum();
        let idx = self.split_boundary(offset);
        self.leaves.splice(idx..idx, leaves);
        self.normalize();
        offset + added
    }

    pub(crate) fn delete(&mut self, range: Range<usize>) {
        let len = self.len();
        let end = range.end.min(len);
        let start = range.start.min(end);
        if start == end {
            return;
        }
        let i = self.split_boundary(start);
        let j = self.split_boundary(end);
        self.leaves.drain(i..j);
        self.normalize();
    }

    /// Drop empty markers and merge neighbouring markers whose markup stacks
    /// match. The left marker of a merged pair keeps its id.
    pub(crate) fn normalize(&mut self) {
        let mut out: Vec<Leaf> = Vec::with_capacity(self.leaves.len());
        for leaf in self.leaves.drain(..) {
            if let Leaf::Marker(m) = &leaf {
                if m.is_empty() {
                    continue;
                }
            }
            if let (Some(Leaf::Marker(prev)), Leaf::Marker(cur)) = (out.last_mut(), &leaf) {
                if same_markups(prev.markups(), cur.markups()) {
                    prev.push_text(cur.text());
                    continue;
                }
            }
            out.push(leaf);
        }
        self.leaves = out;
    }

    pub(crate) fn reassign_ids(&mut self) {
        for leaf in &mut self.leaves {
            leaf.reassign_id();
        }
    }

    pub(crate) fn hash_into<H: Hasher>(&self, state: &mut H) {
        self.leaves.len().hash(state);
        for leaf in &self.leaves {
            leaf.hash_into(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold() -> Markup {
        Markup::new("b").unwrap()
    }

    fn runs(inlines: &Inlines) -> Vec<(String, bool)> {
        inlines
            .leaves()
            .iter()
            .map(|l| match l {
                Leaf::Marker(m) => (m.text().to_string(), m.has_markup("b")),
                Leaf::Atom(a) => (format!("@{}", a.name()), a.markups().is_empty()),
            })
            .collect()
    }

    #[test]
    fn test_marker_split_keeps_markups() {
        let mut m = Marker::new("héllo", vec![bold()]);
        let id = m.id();
        let tail = m.split_off(2);
        assert_eq!(m.text(), "hé");
        assert_eq!(tail.text(), "llo");
        assert_eq!(m.id(), id);
        assert_ne!(tail.id(), id);
        assert!(tail.has_markup("b"));
        assert!(m.has_markup("b"));
    }

    #[test]
    fn test_locate_prefers_left_leaf() {
        let a = Marker::new("abc", vec![]);
        let b = Marker::new("def", vec![bold()]);
        let (a_id, b_id) = (a.id(), b.id());
        let inlines = Inlines::new(vec![a.into(), b.into()]);
        assert_eq!(inlines.locate(0), (Some(a_id), 0));
        assert_eq!(inlines.locate(3), (Some(a_id), 3));
        assert_eq!(inlines.locate(4), (Some(b_id), 1));
        assert_eq!(inlines.locate(99), (Some(b_id), 3));
        assert_eq!(Inlines::default().locate(5), (None, 0));
    }

    #[test]
    fn test_insert_text_into_empty() {
        let mut inlines = Inlines::default();
        let end = inlines.insert_text(0, "X", None);
        assert_eq!(end, 1);
        let end = inlines.insert_text(end, "Y", None);
        assert_eq!(end, 2);
        assert_eq!(inlines.text(), "XY");
        assert_eq!(inlines.leaves().len(), 1);
    }

    #[test]
    fn test_insert_text_inherits_left_markups() {
        let mut inlines = Inlines::new(vec![
            Marker::new("ab", vec![bold()]).into(),
            Marker::new("cd", vec![]).into(),
        ]);
        inlines.insert_text(2, "X", None);
        assert_eq!(
            runs(&inlines),
            vec![("abX".to_string(), true), ("cd".to_string(), false)]
        );
    }

    #[test]
    fn test_insert_text_with_explicit_markups() {
        let mut inlines = Inlines::new(vec![Marker::new("abcd", vec![]).into()]);
        let end = inlines.insert_text(2, "X", Some(&[bold()]));
        assert_eq!(end, 3);
        assert_eq!(
            runs(&inlines),
            vec![
                ("ab".to_string(), false),
                ("X".to_string(), true),
                ("cd".to_string(), false)
            ]
        );
    }

    #[test]
    fn test_insert_after_atom() {
        let atom = Atom::new("mention", "@bob", Value::Null).unwrap();
        let mut inlines = Inlines::new(vec![Marker::new("hi ", vec![]).into(), atom.into()]);
        let end = inlines.insert_text(4, "!", None);
        assert_eq!(end, 5);
        assert_eq!(inlines.text(), "hi @bob!");
        assert_eq!(inlines.leaves().len(), 3);
    }

    #[test]
    fn test_delete_across_markers_merges() {
        let mut inlines = Inlines::new(vec![
            Marker::new("abc", vec![]).into(),
            Marker::new("123", vec![bold()]).into(),
            Marker::new("def", vec![]).into(),
        ]);
        inlines.delete(3..6);
        assert_eq!(runs(&inlines), vec![("abcdef".to_string(), false)]);
    }

    #[test]
    fn test_split_off_and_append_roundtrip() {
        let mut inlines = Inlines::new(vec![
            Marker::new("abc", vec![bold()]).into(),
            Marker::new("def", vec![]).into(),
        ]);
        let before = runs(&inlines);
        let tail = inlines.split_off(1);
        assert_eq!(inlines.text(), "a");
        assert_eq!(tail.text(), "bcdef");
        inlines.append(tail);
        assert_eq!(runs(&inlines), before);
    }

    #[test]
    fn test_normalize_drops_empty_markers() {
        let mut inlines = Inlines::new(vec![
            Marker::new("", vec![]).into(),
            Marker::new("a", vec![]).into(),
            Marker::new("", vec![bold()]).into(),
            Marker::new("b", vec![]).into(),
        ]);
        inlines.normalize();
        assert_eq!(runs(&inlines), vec![("ab".to_string(), false)]);
    }
}
