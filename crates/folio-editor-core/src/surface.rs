//! Headless live surface.
//!
//! `MemorySurface` is an arena-backed element/text tree with a native-style
//! selection, a focus flag and an external-mutation log. It implements
//! [`ViewTree`] and [`SelectionSync`], so the editor can attach to it exactly
//! as it would to a browser adapter. Tests use the HTML dump and the
//! selection helpers to drive and observe the editor.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use smol_str::SmolStr;

use crate::platform::{LivePoint, LiveSelection, PlatformError, SelectionSync, ViewId, ViewTree};

const VOID_TAGS: &[&str] = &["br", "img", "hr"];

#[derive(Clone, Debug)]
enum NodeKind {
    Element {
        tag: SmolStr,
        attributes: Vec<(SmolStr, String)>,
    },
    Text(String),
}

#[derive(Clone, Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<ViewId>,
    children: Vec<ViewId>,
}

#[derive(Clone, Debug)]
pub struct MemorySurface {
    nodes: BTreeMap<ViewId, Node>,
    next_id: u64,
    root: ViewId,
    selection: Option<LiveSelection>,
    focused: bool,
    mutations: Vec<ViewId>,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{200C}' => out.push_str("&zwnj;"),
            '\u{00A0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

impl MemorySurface {
    /// A surface whose root is an empty `div`.
    pub fn new() -> Self {
        let root = ViewId(0);
        let mut nodes = BTreeMap::new();
        nodes.insert(
            root,
            Node {
                kind: NodeKind::Element {
                    tag: SmolStr::new_static("div"),
                    attributes: Vec::new(),
                },
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            nodes,
            next_id: 1,
            root,
            selection: None,
            focused: false,
            mutations: Vec::new(),
        }
    }

    fn alloc(&mut self, kind: NodeKind) -> ViewId {
        let id = ViewId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                kind,
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    fn detach(&mut self, node: ViewId) {
        let Some(parent) = self.nodes.get(&node).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != node);
        }
        if let Some(n) = self.nodes.get_mut(&node) {
            n.parent = None;
        }
    }

    fn release(&mut self, node: ViewId) {
        if let Some(n) = self.nodes.remove(&node) {
            for child in n.children {
                self.release(child);
            }
        }
    }

    pub fn contains(&self, node: ViewId) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Number of live nodes, root included.
    pub fn live_node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn tag(&self, node: ViewId) -> Option<&str> {
        match &self.nodes.get(&node)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    fn write_node(&self, node: ViewId, out: &mut String) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        match &n.kind {
            NodeKind::Text(text) => escape_text(text, out),
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (k, v) in attributes {
                    let _ = write!(out, " {k}=\"{}\"", v.replace('"', "&quot;"));
                }
                out.push('>');
                if VOID_TAGS.contains(&tag.as_str()) {
                    return;
                }
                for child in &n.children {
                    self.write_node(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    /// HTML of the whole surface, root element included.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_node(self.root, &mut out);
        out
    }

    /// HTML of the root's children.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in self.children(self.root) {
            self.write_node(child, &mut out);
        }
        out
    }

    /// Text nodes under `node` in document order.
    fn text_nodes_under(&self, node: ViewId, out: &mut Vec<ViewId>) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        if matches!(n.kind, NodeKind::Text(_)) {
            out.push(node);
        }
        for child in &n.children {
            self.text_nodes_under(*child, out);
        }
    }

    fn text_nodes(&self) -> Vec<ViewId> {
        let mut out = Vec::new();
        self.text_nodes_under(self.root, &mut out);
        out
    }

    /// First text node whose content contains `needle`.
    pub fn find_text(&self, needle: &str) -> Option<ViewId> {
        self.text_nodes()
            .into_iter()
            .find(|t| self.text(*t).is_some_and(|s| s.contains(needle)))
    }

    /// Put a collapsed selection at `offset` in `node`.
    pub fn set_caret(&mut self, node: ViewId, offset: usize) {
        self.selection = Some(LiveSelection::collapsed(LivePoint::new(node, offset)));
    }

    /// Select `needle` inside the first text node containing it.
    pub fn select_text(&mut self, needle: &str) -> bool {
        let Some(node) = self.find_text(needle) else {
            return false;
        };
        let Some(text) = self.text(node) else {
            return false;
        };
        let Some(byte) = text.find(needle) else {
            return false;
        };
        let start = text[..byte].chars().count();
        let end = start + needle.chars().count();
        self.selection = Some(LiveSelection::new(
            LivePoint::new(node, start),
            LivePoint::new(node, end),
        ));
        true
    }

    /// Select everything from the first to the last text node.
    pub fn select_all(&mut self) {
        let texts = self.text_nodes();
        let (Some(first), Some(last)) = (texts.first(), texts.last()) else {
            let root = self.root;
            let end = self.children(root).len();
            self.selection = Some(LiveSelection::new(
                LivePoint::new(root, 0),
                LivePoint::new(root, end),
            ));
            return;
        };
        let len = self.text(*last).map(|t| t.chars().count()).unwrap_or(0);
        self.selection = Some(LiveSelection::new(
            LivePoint::new(*first, 0),
            LivePoint::new(*last, len),
        ));
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Character index of a point across all text nodes in document order.
    fn linear_offset(&self, point: LivePoint) -> Option<usize> {
        let mut count = 0;
        self.linear_walk(self.root, point, &mut count).then_some(count)
    }

    fn linear_walk(&self, node: ViewId, point: LivePoint, count: &mut usize) -> bool {
        let Some(n) = self.nodes.get(&node) else {
            return false;
        };
        if let NodeKind::Text(text) = &n.kind {
            if node == point.node {
                *count += point.offset.min(text.chars().count());
                return true;
            }
            *count += text.chars().count();
            return false;
        }
        for (i, child) in n.children.iter().enumerate() {
            if node == point.node && i == point.offset {
                return true;
            }
            if self.linear_walk(*child, point, count) {
                return true;
            }
        }
        node == point.node
    }

    /// Text covered by the current selection, placeholders stripped.
    pub fn selected_text(&self) -> Option<String> {
        let sel = self.selection?;
        let a = self.linear_offset(sel.anchor)?;
        let b = self.linear_offset(sel.focus)?;
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        let all: String = self
            .text_nodes()
            .into_iter()
            .filter_map(|t| self.text(t))
            .collect();
        Some(
            all.chars()
                .skip(start)
                .take(end - start)
                .filter(|c| *c != '\u{200C}')
                .collect(),
        )
    }

    /// Change a text node the way the user or a browser extension would,
    /// without going through the editor.
    pub fn external_set_text(&mut self, node: ViewId, text: &str) {
        self.set_text(node, text);
        self.mutations.push(node);
    }

    /// Remove a node behind the editor's back.
    pub fn external_remove(&mut self, node: ViewId) {
        let parent = self.parent(node);
        self.remove(node);
        if let Some(parent) = parent {
            self.mutations.push(parent);
        }
    }
}

impl ViewTree for MemorySurface {
    fn root(&self) -> ViewId {
        self.root
    }

    fn create_element(&mut self, tag: &str) -> ViewId {
        self.alloc(NodeKind::Element {
            tag: SmolStr::new(tag),
            attributes: Vec::new(),
        })
    }

    fn create_text(&mut self, text: &str) -> ViewId {
        self.alloc(NodeKind::Text(text.to_string()))
    }

    fn set_text(&mut self, node: ViewId, text: &str) {
        if let Some(Node {
            kind: NodeKind::Text(t),
            ..
        }) = self.nodes.get_mut(&node)
        {
            *t = text.to_string();
        }
    }

    fn text(&self, node: ViewId) -> Option<String> {
        match &self.nodes.get(&node)?.kind {
            NodeKind::Text(t) => Some(t.clone()),
            NodeKind::Element { .. } => None,
        }
    }

    fn set_attribute(&mut self, node: ViewId, name: &str, value: &str) {
        if let Some(Node {
            kind: NodeKind::Element { attributes, .. },
            ..
        }) = self.nodes.get_mut(&node)
        {
            match attributes.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => attributes.push((SmolStr::new(name), value.to_string())),
            }
        }
    }

    fn remove_attribute(&mut self, node: ViewId, name: &str) {
        if let Some(Node {
            kind: NodeKind::Element { attributes, .. },
            ..
        }) = self.nodes.get_mut(&node)
        {
            attributes.retain(|(k, _)| k != name);
        }
    }

    fn attribute(&self, node: ViewId, name: &str) -> Option<String> {
        match &self.nodes.get(&node)?.kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
            NodeKind::Text(_) => None,
        }
    }

    fn insert_before(&mut self, parent: ViewId, child: ViewId, reference: Option<ViewId>) {
        if !self.nodes.contains_key(&parent) || !self.nodes.contains_key(&child) {
            return;
        }
        self.detach(child);
        if let Some(p) = self.nodes.get_mut(&parent) {
            let at = reference
                .and_then(|r| p.children.iter().position(|c| *c == r))
                .unwrap_or(p.children.len());
            p.children.insert(at, child);
        }
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = Some(parent);
        }
    }

    fn remove(&mut self, node: ViewId) {
        if node == self.root {
            return;
        }
        self.detach(node);
        self.release(node);
        if let Some(sel) = self.selection {
            if !self.contains(sel.anchor.node) || !self.contains(sel.focus.node) {
                self.selection = None;
            }
        }
    }

    fn parent(&self, node: ViewId) -> Option<ViewId> {
        self.nodes.get(&node)?.parent
    }

    fn children(&self, node: ViewId) -> Vec<ViewId> {
        self.nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }
}

impl SelectionSync for MemorySurface {
    fn selection(&self) -> Option<LiveSelection> {
        self.selection
    }

    fn set_selection(&mut self, selection: Option<LiveSelection>) -> Result<(), PlatformError> {
        if let Some(sel) = selection {
            for point in [sel.anchor, sel.focus] {
                if !self.contains(point.node) {
                    return Err(format!("selection references released node {:?}", point.node).into());
                }
            }
        }
        self.selection = selection;
        Ok(())
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn take_external_mutations(&mut self) -> Vec<ViewId> {
        std::mem::take(&mut self.mutations)
    }
}
