//! Renderer: mirrors the post onto a live view tree and keeps it in sync.
//!
//! Every section, list item and leaf gets a [`RenderNode`] (leaves are kept as
//! parts of their block's node). A node is reused on the next reconcile when
//! its target id still exists, its fingerprint still matches, it was not
//! marked dirty, and its element is still where we put it. Anything else is
//! torn down and rebuilt. Only whole blocks are rebuilt; lists reconcile their
//! items one by one.
//!
//! Cards, images and atoms are flanked by zero-width-non-joiner text nodes
//! (the head and tail placeholders) so a caret can sit right before or after
//! the opaque content without entering it.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use smol_str::SmolStr;

use crate::embed::{CardMode, EmbedEnv, EmbedKind, EmbedRegistry, EmbedTarget, Embeddable};
use crate::model::{
    Atom, CardSection, ImageSection, Inlines, Leaf, LeafId, ListSection, Markup, Post, Section,
    SectionId,
};
use crate::platform::{ViewId, ViewTree};

/// Content of the boundary placeholders around opaque content.
pub const ZWNJ: &str = "\u{200C}";

pub const CARD_CLASS: &str = "__folio-card";
pub const IMAGE_CLASS: &str = "__folio-image";
pub const ATOM_CLASS: &str = "__folio-atom";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderState {
    Clean,
    Dirty,
    TornDown,
}

/// What an indexed live node stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ViewRole {
    Root,
    List(SectionId),
    /// Markup section or list item element.
    Block(SectionId),
    /// Markup element wrapping a leaf.
    Markup { block: SectionId, leaf: LeafId },
    Text { block: SectionId, leaf: LeafId },
    /// Wrapper element of a card, image (`leaf: None`) or atom.
    Opaque { block: SectionId, leaf: Option<LeafId> },
    Head { block: SectionId, leaf: Option<LeafId> },
    Tail { block: SectionId, leaf: Option<LeafId> },
    /// Root of content produced by an embeddable (or an image element).
    Content { block: SectionId, leaf: Option<LeafId> },
    LineBreak(SectionId),
}

/// Live nodes around one piece of opaque content.
pub struct OpaqueView {
    head: ViewId,
    content: ViewId,
    tail: ViewId,
    embed: Option<Rc<dyn Embeddable>>,
}

impl fmt::Debug for OpaqueView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueView")
            .field("head", &self.head)
            .field("content", &self.content)
            .field("tail", &self.tail)
            .field("embed", &self.embed.as_ref().map(|e| e.name().to_string()))
            .finish()
    }
}

impl OpaqueView {
    pub fn head(&self) -> ViewId {
        self.head
    }

    pub fn content(&self) -> ViewId {
        self.content
    }

    pub fn tail(&self) -> ViewId {
        self.tail
    }
}

/// One leaf of a rendered text block.
#[derive(Debug)]
pub enum PartView {
    Text {
        leaf: LeafId,
        /// Outermost markup element, or the text node itself.
        outer: ViewId,
        text: ViewId,
    },
    Atom {
        leaf: LeafId,
        outer: ViewId,
        opaque: OpaqueView,
    },
}

impl PartView {
    pub fn leaf(&self) -> LeafId {
        match self {
            PartView::Text { leaf, .. } | PartView::Atom { leaf, .. } => *leaf,
        }
    }

    pub fn outer(&self) -> ViewId {
        match self {
            PartView::Text { outer, .. } | PartView::Atom { outer, .. } => *outer,
        }
    }
}

#[derive(Debug)]
pub enum RenderKind {
    Block {
        parts: Vec<PartView>,
        line_break: Option<ViewId>,
    },
    List {
        tag: SmolStr,
        items: Vec<RenderNode>,
    },
    Opaque {
        view: OpaqueView,
        mode: CardMode,
    },
}

/// Live mirror of one section or list item.
#[derive(Debug)]
pub struct RenderNode {
    target: SectionId,
    element: ViewId,
    fingerprint: u64,
    state: RenderState,
    kind: RenderKind,
    /// Indexed views this node created, children's excluded.
    owned: Vec<ViewId>,
}

impl RenderNode {
    pub fn target(&self) -> SectionId {
        self.target
    }

    pub fn element(&self) -> ViewId {
        self.element
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn kind(&self) -> &RenderKind {
        &self.kind
    }

    /// List items of a list node.
    pub fn children(&self) -> &[RenderNode] {
        match &self.kind {
            RenderKind::List { items, .. } => items,
            _ => &[],
        }
    }

    pub fn parts(&self) -> &[PartView] {
        match &self.kind {
            RenderKind::Block { parts, .. } => parts,
            _ => &[],
        }
    }

    pub fn opaque(&self) -> Option<&OpaqueView> {
        match &self.kind {
            RenderKind::Opaque { view, .. } => Some(view),
            _ => None,
        }
    }

    pub fn line_break(&self) -> Option<ViewId> {
        match &self.kind {
            RenderKind::Block { line_break, .. } => *line_break,
            _ => None,
        }
    }

    pub fn part(&self, leaf: LeafId) -> Option<&PartView> {
        self.parts().iter().find(|p| p.leaf() == leaf)
    }

    fn find(&self, id: SectionId) -> Option<&RenderNode> {
        if self.target == id {
            return Some(self);
        }
        self.children().iter().find(|c| c.target == id)
    }

    fn find_mut(&mut self, id: SectionId) -> Option<&mut RenderNode> {
        if self.target == id {
            return Some(self);
        }
        match &mut self.kind {
            RenderKind::List { items, .. } => items.iter_mut().find(|c| c.target == id),
            _ => None,
        }
    }
}

/// Counts from one reconcile pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub reused: usize,
    pub built: usize,
    pub torn_down: usize,
}

pub struct Renderer {
    registry: EmbedRegistry,
    root: Option<ViewId>,
    sections: Vec<RenderNode>,
    index: HashMap<ViewId, ViewRole>,
    card_modes: HashMap<SectionId, CardMode>,
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("root", &self.root)
            .field("sections", &self.sections.len())
            .field("indexed", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl Renderer {
    pub fn new(registry: EmbedRegistry) -> Self {
        Self {
            registry,
            root: None,
            sections: Vec::new(),
            index: HashMap::new(),
            card_modes: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &EmbedRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EmbedRegistry {
        &mut self.registry
    }

    pub fn is_attached(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<ViewId> {
        self.root
    }

    /// Top-level render nodes in document order.
    pub fn nodes(&self) -> &[RenderNode] {
        &self.sections
    }

    /// Render node of a section or list item.
    pub fn node(&self, id: SectionId) -> Option<&RenderNode> {
        self.sections.iter().find_map(|n| n.find(id))
    }

    pub(crate) fn role(&self, view: ViewId) -> Option<ViewRole> {
        self.index.get(&view).copied()
    }

    pub fn card_mode(&self, id: SectionId) -> CardMode {
        self.card_modes.get(&id).copied().unwrap_or_default()
    }

    /// Select the render context for a card. Takes effect on the next
    /// reconcile, which rebuilds just that card.
    pub fn set_card_mode(&mut self, id: SectionId, mode: CardMode) {
        if mode == CardMode::Display {
            self.card_modes.remove(&id);
        } else {
            self.card_modes.insert(id, mode);
        }
    }

    /// Force a rebuild of a section or list item on the next reconcile.
    pub fn mark_dirty(&mut self, id: SectionId) {
        if let Some(node) = self.sections.iter_mut().find_map(|n| n.find_mut(id)) {
            if node.state == RenderState::Clean {
                node.state = RenderState::Dirty;
            }
        }
    }

    /// Bind to a view tree and render the post into its root.
    pub fn attach(&mut self, view: &mut dyn ViewTree, post: &Post) -> ReconcileStats {
        let root = view.root();
        self.root = Some(root);
        self.index.insert(root, ViewRole::Root);
        tracing::debug!(target: "folio::render", ?root, "attached renderer");
        self.reconcile(view, post)
    }

    /// Tear down every render node and release the live views.
    pub fn detach(&mut self, view: &mut dyn ViewTree) -> ReconcileStats {
        let mut stats = ReconcileStats::default();
        for mut node in std::mem::take(&mut self.sections) {
            self.teardown(view, &mut node, &mut stats);
        }
        if let Some(root) = self.root.take() {
            self.index.remove(&root);
        }
        self.card_modes.clear();
        tracing::debug!(
            target: "folio::render",
            torn_down = stats.torn_down,
            "detached renderer"
        );
        stats
    }

    /// Bring the live view in line with `post`.
    pub fn reconcile(&mut self, view: &mut dyn ViewTree, post: &Post) -> ReconcileStats {
        let mut stats = ReconcileStats::default();
        let Some(root) = self.root else {
            return stats;
        };

        let mut old: HashMap<SectionId, RenderNode> = std::mem::take(&mut self.sections)
            .into_iter()
            .map(|n| (n.target, n))
            .collect();
        let mut fresh = Vec::with_capacity(post.sections().len());

        for section in post.sections() {
            let id = section.id();
            let fingerprint = section.fingerprint();
            let node = match old.remove(&id) {
                Some(node) if self.reusable(view, &node, fingerprint, root) => {
                    stats.reused += 1;
                    node
                }
                Some(mut node) => {
                    // A clean list with the same tag keeps its element and
                    // reconciles item by item.
                    let keep_list = match (section, &node.kind) {
                        (Section::List(list), RenderKind::List { tag, .. }) => {
                            node.state == RenderState::Clean
                                && tag.as_str() == list.tag()
                                && view.parent(node.element) == Some(root)
                        }
                        _ => false,
                    };
                    match section {
                        Section::List(list) if keep_list => {
                            self.reconcile_list(view, &mut node, list, fingerprint, &mut stats);
                            node
                        }
                        _ => {
                            self.teardown(view, &mut node, &mut stats);
                            self.build_section(view, section, &mut stats)
                        }
                    }
                }
                None => self.build_section(view, section, &mut stats),
            };
            fresh.push(node);
        }

        for (_, mut stale) in old {
            self.teardown(view, &mut stale, &mut stats);
        }

        let order: Vec<ViewId> = fresh.iter().map(|n| n.element).collect();
        place_children(view, root, &order);
        self.sections = fresh;
        self.card_modes.retain(|id, _| post.section(*id).is_some());

        tracing::debug!(
            target: "folio::render",
            reused = stats.reused,
            built = stats.built,
            torn_down = stats.torn_down,
            "reconciled"
        );
        stats
    }

    fn reusable(&self, view: &dyn ViewTree, node: &RenderNode, fingerprint: u64, parent: ViewId) -> bool {
        if node.state != RenderState::Clean || node.fingerprint != fingerprint {
            return false;
        }
        if view.parent(node.element) != Some(parent) {
            return false;
        }
        match &node.kind {
            RenderKind::Opaque { mode, .. } => *mode == self.card_mode(node.target),
            _ => true,
        }
    }

    fn reconcile_list(
        &mut self,
        view: &mut dyn ViewTree,
        node: &mut RenderNode,
        list: &ListSection,
        fingerprint: u64,
        stats: &mut ReconcileStats,
    ) {
        let RenderKind::List { items, .. } = &mut node.kind else {
            return;
        };
        let mut old: HashMap<SectionId, RenderNode> = std::mem::take(items)
            .into_iter()
            .map(|n| (n.target, n))
            .collect();
        let mut fresh = Vec::with_capacity(list.items().len());

        for item in list.items() {
            let item_fp = item.fingerprint();
            let rendered = match old.remove(&item.id()) {
                Some(n) if self.reusable(view, &n, item_fp, node.element) => {
                    stats.reused += 1;
                    n
                }
                Some(mut stale) => {
                    self.teardown(view, &mut stale, stats);
                    self.build_block(view, item.id(), "li", item.content(), item_fp, stats)
                }
                None => self.build_block(view, item.id(), "li", item.content(), item_fp, stats),
            };
            fresh.push(rendered);
        }
        for (_, mut stale) in old {
            self.teardown(view, &mut stale, stats);
        }

        let order: Vec<ViewId> = fresh.iter().map(|n| n.element).collect();
        place_children(view, node.element, &order);
        node.kind = RenderKind::List {
            tag: SmolStr::new(list.tag()),
            items: fresh,
        };
        node.fingerprint = fingerprint;
    }

    fn teardown(&mut self, view: &mut dyn ViewTree, node: &mut RenderNode, stats: &mut ReconcileStats) {
        debug_assert_ne!(node.state, RenderState::TornDown, "render node torn down twice");
        match &mut node.kind {
            RenderKind::Block { parts, .. } => {
                for part in parts.iter() {
                    if let PartView::Atom { opaque, .. } = part {
                        release_embed(view, opaque);
                    }
                }
            }
            RenderKind::List { items, .. } => {
                for mut item in std::mem::take(items) {
                    self.teardown(view, &mut item, stats);
                }
            }
            RenderKind::Opaque { view: opaque, .. } => release_embed(view, opaque),
        }
        for owned in &node.owned {
            self.index.remove(owned);
        }
        view.remove(node.element);
        node.state = RenderState::TornDown;
        stats.torn_down += 1;
        if tracing::enabled!(target: "folio::render", tracing::Level::TRACE) {
            tracing::trace!(
                target: "folio::render",
                node = %node.target,
                element = ?node.element,
                "tore down render node"
            );
        }
    }

    fn build_section(
        &mut self,
        view: &mut dyn ViewTree,
        section: &Section,
        stats: &mut ReconcileStats,
    ) -> RenderNode {
        let fingerprint = section.fingerprint();
        match section {
            Section::Markup(s) => {
                self.build_block(view, s.id(), s.tag(), s.content(), fingerprint, stats)
            }
            Section::List(list) => {
                let element = view.create_element(list.tag());
                self.index.insert(element, ViewRole::List(list.id()));
                let items = list
                    .items()
                    .iter()
                    .map(|item| {
                        let node = self.build_block(
                            view,
                            item.id(),
                            "li",
                            item.content(),
                            item.fingerprint(),
                            stats,
                        );
                        view.append_child(element, node.element);
                        node
                    })
                    .collect();
                stats.built += 1;
                RenderNode {
                    target: list.id(),
                    element,
                    fingerprint,
                    state: RenderState::Clean,
                    kind: RenderKind::List {
                        tag: SmolStr::new(list.tag()),
                        items,
                    },
                    owned: vec![element],
                }
            }
            Section::Card(card) => self.build_card(view, card, fingerprint, stats),
            Section::Image(image) => self.build_image(view, image, fingerprint, stats),
        }
    }

    fn build_block(
        &mut self,
        view: &mut dyn ViewTree,
        id: SectionId,
        tag: &str,
        inlines: &Inlines,
        fingerprint: u64,
        stats: &mut ReconcileStats,
    ) -> RenderNode {
        let element = view.create_element(tag);
        let mut owned = vec![element];
        self.index.insert(element, ViewRole::Block(id));

        let mut parts = Vec::with_capacity(inlines.leaves().len());
        let mut line_break = None;
        if inlines.leaves().is_empty() {
            let br = view.create_element("br");
            view.append_child(element, br);
            self.index.insert(br, ViewRole::LineBreak(id));
            owned.push(br);
            line_break = Some(br);
        }

        for leaf in inlines.leaves() {
            let part = match leaf {
                Leaf::Marker(m) => {
                    let text = view.create_text(m.text());
                    self.index.insert(
                        text,
                        ViewRole::Text {
                            block: id,
                            leaf: m.id(),
                        },
                    );
                    owned.push(text);
                    let outer = self.wrap_markups(view, id, m.id(), m.markups(), text, &mut owned);
                    PartView::Text {
                        leaf: m.id(),
                        outer,
                        text,
                    }
                }
                Leaf::Atom(a) => {
                    let (wrapper, opaque) = self.build_atom(view, id, a, &mut owned);
                    let outer = self.wrap_markups(view, id, a.id(), a.markups(), wrapper, &mut owned);
                    PartView::Atom {
                        leaf: a.id(),
                        outer,
                        opaque,
                    }
                }
            };
            view.append_child(element, part.outer());
            parts.push(part);
        }

        stats.built += 1;
        RenderNode {
            target: id,
            element,
            fingerprint,
            state: RenderState::Clean,
            kind: RenderKind::Block { parts, line_break },
            owned,
        }
    }

    /// Nest `inner` in one element per markup, first markup outermost.
    fn wrap_markups(
        &mut self,
        view: &mut dyn ViewTree,
        block: SectionId,
        leaf: LeafId,
        markups: &[Markup],
        inner: ViewId,
        owned: &mut Vec<ViewId>,
    ) -> ViewId {
        let mut outer = inner;
        for markup in markups.iter().rev() {
            let el = view.create_element(markup.tag());
            for (k, v) in markup.attributes() {
                view.set_attribute(el, k, v);
            }
            view.append_child(el, outer);
            self.index.insert(el, ViewRole::Markup { block, leaf });
            owned.push(el);
            outer = el;
        }
        outer
    }

    /// Build head placeholder, content, tail placeholder under `wrapper`.
    #[allow(clippy::too_many_arguments)]
    fn build_opaque(
        &mut self,
        view: &mut dyn ViewTree,
        wrapper: ViewId,
        block: SectionId,
        leaf: Option<LeafId>,
        content: ViewId,
        embed: Option<Rc<dyn Embeddable>>,
        owned: &mut Vec<ViewId>,
    ) -> OpaqueView {
        let head = view.create_text(ZWNJ);
        let tail = view.create_text(ZWNJ);
        view.set_attribute(content, "contenteditable", "false");
        view.append_child(wrapper, head);
        view.append_child(wrapper, content);
        view.append_child(wrapper, tail);
        self.index.insert(wrapper, ViewRole::Opaque { block, leaf });
        self.index.insert(head, ViewRole::Head { block, leaf });
        self.index.insert(content, ViewRole::Content { block, leaf });
        self.index.insert(tail, ViewRole::Tail { block, leaf });
        owned.extend([wrapper, head, content, tail]);
        OpaqueView {
            head,
            content,
            tail,
            embed,
        }
    }

    fn build_atom(
        &mut self,
        view: &mut dyn ViewTree,
        block: SectionId,
        atom: &Atom,
        owned: &mut Vec<ViewId>,
    ) -> (ViewId, OpaqueView) {
        let embed = self.registry.resolve(EmbedKind::Atom, atom.name());
        let handle = self.registry.handle(EmbedTarget::Atom(atom.id()));
        let content = {
            let mut env = EmbedEnv::new(
                &mut *view,
                atom.name(),
                EmbedKind::Atom,
                CardMode::Display,
                handle,
            );
            embed.render(atom.payload(), &mut env)
        };
        let wrapper = view.create_element("span");
        view.set_attribute(wrapper, "class", ATOM_CLASS);
        view.set_attribute(wrapper, "data-atom", atom.name());
        let opaque = self.build_opaque(
            view,
            wrapper,
            block,
            Some(atom.id()),
            content,
            Some(embed),
            owned,
        );
        (wrapper, opaque)
    }

    fn build_card(
        &mut self,
        view: &mut dyn ViewTree,
        card: &CardSection,
        fingerprint: u64,
        stats: &mut ReconcileStats,
    ) -> RenderNode {
        let mode = self.card_mode(card.id());
        let embed = self.registry.resolve(EmbedKind::Card, card.name());
        let handle = self.registry.handle(EmbedTarget::Card(card.id()));
        let content = {
            let mut env = EmbedEnv::new(&mut *view, card.name(), EmbedKind::Card, mode, handle);
            match mode {
                CardMode::Edit => match embed.edit(card.payload(), &mut env) {
                    Some(edited) => edited,
                    None => embed.render(card.payload(), &mut env),
                },
                CardMode::Display => embed.render(card.payload(), &mut env),
            }
        };

        let element = view.create_element("div");
        view.set_attribute(element, "class", CARD_CLASS);
        view.set_attribute(element, "data-card", card.name());
        let mut owned = Vec::with_capacity(4);
        let opaque = self.build_opaque(
            view,
            element,
            card.id(),
            None,
            content,
            Some(embed),
            &mut owned,
        );
        stats.built += 1;
        tracing::trace!(
            target: "folio::render",
            card = card.name(),
            ?mode,
            "built card"
        );
        RenderNode {
            target: card.id(),
            element,
            fingerprint,
            state: RenderState::Clean,
            kind: RenderKind::Opaque { view: opaque, mode },
            owned,
        }
    }

    fn build_image(
        &mut self,
        view: &mut dyn ViewTree,
        image: &ImageSection,
        fingerprint: u64,
        stats: &mut ReconcileStats,
    ) -> RenderNode {
        let img = view.create_element("img");
        view.set_attribute(img, "src", image.src());
        let element = view.create_element("div");
        view.set_attribute(element, "class", IMAGE_CLASS);
        let mut owned = Vec::with_capacity(4);
        let opaque = self.build_opaque(view, element, image.id(), None, img, None, &mut owned);
        stats.built += 1;
        RenderNode {
            target: image.id(),
            element,
            fingerprint,
            state: RenderState::Clean,
            kind: RenderKind::Opaque {
                view: opaque,
                mode: CardMode::Display,
            },
            owned,
        }
    }

    /// Id of the block (or list) owning a live node, walking up through
    /// unindexed nodes.
    pub(crate) fn owner_of_view(&self, view: &dyn ViewTree, node: ViewId) -> Option<SectionId> {
        let mut current = Some(node);
        while let Some(n) = current {
            match self.role(n) {
                Some(ViewRole::Root) => return None,
                Some(ViewRole::List(id)) | Some(ViewRole::Block(id)) | Some(ViewRole::LineBreak(id)) => {
                    return Some(id);
                }
                Some(
                    ViewRole::Markup { block, .. }
                    | ViewRole::Text { block, .. }
                    | ViewRole::Opaque { block, .. }
                    | ViewRole::Head { block, .. }
                    | ViewRole::Tail { block, .. }
                    | ViewRole::Content { block, .. },
                ) => return Some(block),
                None => current = view.parent(n),
            }
        }
        None
    }
}

fn release_embed(view: &mut dyn ViewTree, opaque: &OpaqueView) {
    if let Some(embed) = &opaque.embed {
        embed.teardown(opaque.content, view);
    }
}

/// Put `expected` under `parent` in order, moving misplaced nodes and
/// dropping children nobody expects.
fn place_children(view: &mut dyn ViewTree, parent: ViewId, expected: &[ViewId]) {
    let mut current = view.children(parent);
    let mut cursor = 0;
    for el in expected {
        if current.get(cursor) == Some(el) {
            cursor += 1;
            continue;
        }
        let reference = current.get(cursor).copied();
        view.insert_before(parent, *el, reference);
        current.retain(|c| c != el);
        current.insert(cursor, *el);
        cursor += 1;
    }
    for foreign in current.into_iter().skip(cursor) {
        tracing::debug!(target: "folio::render", node = ?foreign, "removing foreign view node");
        view.remove(foreign);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PostBuilder, marker, text};
    use crate::surface::MemorySurface;
    use serde_json::json;

    fn render(post: &Post) -> (Renderer, MemorySurface) {
        let mut renderer = Renderer::new(EmbedRegistry::new());
        let mut surface = MemorySurface::new();
        renderer.attach(&mut surface, post);
        (renderer, surface)
    }

    #[test]
    fn test_renders_markups_nested() {
        let post = PostBuilder::new()
            .paragraph(vec![
                text("abc"),
                marker("123", &["b", "em"]).unwrap(),
            ])
            .build()
            .unwrap();
        let (_, surface) = render(&post);
        insta::assert_snapshot!(surface.inner_html(), @"<p>abc<b><em>123</em></b></p>");
    }

    #[test]
    fn test_empty_block_gets_line_break() {
        let (_, surface) = render(&Post::new());
        insta::assert_snapshot!(surface.inner_html(), @"<p><br></p>");
    }

    #[test]
    fn test_card_is_flanked_by_placeholders() {
        let post = PostBuilder::new()
            .card("mystery", json!({}))
            .build()
            .unwrap();
        let (renderer, surface) = render(&post);
        insta::assert_snapshot!(
            surface.inner_html(),
            @r#"<div class="__folio-card" data-card="mystery">&zwnj;<div data-unknown-embed="mystery" contenteditable="false"></div>&zwnj;</div>"#
        );
        let node = &renderer.nodes()[0];
        assert!(node.opaque().is_some());
    }

    #[test]
    fn test_list_renders_items() {
        let post = PostBuilder::new()
            .list("ol", vec![vec![text("a")], vec![]])
            .build()
            .unwrap();
        let (renderer, surface) = render(&post);
        insta::assert_snapshot!(surface.inner_html(), @"<ol><li>a</li><li><br></li></ol>");
        assert_eq!(renderer.nodes()[0].children().len(), 2);
    }

    #[test]
    fn test_reconcile_without_changes_reuses_everything() {
        let post = PostBuilder::new()
            .paragraph(vec![text("a")])
            .list("ul", vec![vec![text("b")]])
            .build()
            .unwrap();
        let (mut renderer, mut surface) = render(&post);
        let stats = renderer.reconcile(&mut surface, &post);
        assert_eq!(
            stats,
            ReconcileStats {
                reused: 2,
                built: 0,
                torn_down: 0
            }
        );
    }

    #[test]
    fn test_dirty_node_is_rebuilt() {
        let post = PostBuilder::new()
            .paragraph(vec![text("a")])
            .paragraph(vec![text("b")])
            .build()
            .unwrap();
        let (mut renderer, mut surface) = render(&post);
        let first = renderer.nodes()[0].element();
        let second_id = post.sections()[1].id();
        let second = renderer.nodes()[1].element();

        renderer.mark_dirty(second_id);
        let stats = renderer.reconcile(&mut surface, &post);
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.built, 1);
        assert_eq!(stats.torn_down, 1);
        assert_eq!(renderer.nodes()[0].element(), first);
        assert_ne!(renderer.nodes()[1].element(), second);
        assert!(!surface.contains(second));
        assert_eq!(surface.inner_html(), "<p>a</p><p>b</p>");
    }

    #[test]
    fn test_detach_releases_views() {
        let post = PostBuilder::new()
            .paragraph(vec![text("a")])
            .card("x", json!(null))
            .build()
            .unwrap();
        let (mut renderer, mut surface) = render(&post);
        assert!(surface.live_node_count() > 1);
        renderer.detach(&mut surface);
        assert_eq!(surface.live_node_count(), 1);
        assert!(renderer.nodes().is_empty());
        assert!(!renderer.is_attached());
    }

    #[test]
    fn test_place_children_reorders_and_drops_foreign() {
        let mut surface = MemorySurface::new();
        let root = surface.root();
        let a = surface.create_text("a");
        let b = surface.create_text("b");
        let junk = surface.create_text("junk");
        surface.append_child(root, b);
        surface.append_child(root, junk);
        surface.append_child(root, a);
        place_children(&mut surface, root, &[a, b]);
        assert_eq!(surface.children(root), vec![a, b]);
        assert!(!surface.contains(junk));
    }
}
