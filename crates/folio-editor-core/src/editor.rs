//! The editing session.
//!
//! [`Editor`] owns one post, one renderer, the current range and the history,
//! and binds them to at most one live surface. Every change goes through
//! [`Editor::run`], which follows the same path each time:
//!
//! 1. snapshot the post and range
//! 2. run the mutator against a [`PostEditor`]
//! 3. mark touched render nodes dirty and reconcile
//! 4. restore the live selection from the transaction's range
//! 5. commit a history entry
//!
//! Host input arrives through the `*_at_cursor` helpers, which first read the
//! live selection back into a range and ignore input when there is none.

use std::fmt;

use crate::config::EditorConfig;
use crate::edit::PostEditor;
use crate::embed::{CardMode, EmbedRegistry, EmbedRequest, EmbedTarget, Embeddable};
use crate::error::{EditorError, ValidationError};
use crate::history::{History, Snapshot, UndoManager};
use crate::interchange::{self, PortableDoc};
use crate::model::{Markup, Post, SectionId};
use crate::platform::Surface;
use crate::range::{Direction, Position, Range, from_live_selection, to_live_selection};
use crate::render::Renderer;

/// Cancellable notice that a structural break is about to happen.
#[derive(Debug)]
pub struct BreakEvent {
    position: Position,
    prevented: bool,
}

impl BreakEvent {
    /// Where the break would happen.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Skip the default break. The hook has handled the input.
    pub fn prevent_default(&mut self) {
        self.prevented = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.prevented
    }
}

type BreakHook = Box<dyn FnMut(&mut BreakEvent)>;

/// Outcome of one caret delete.
#[derive(Debug)]
enum CaretStep {
    Delete(Range),
    Move(Position),
    /// Remove a card or image. The caret lands in the neighbour on the side
    /// the delete moves towards, if there is one.
    Remove {
        block: SectionId,
        landing: Option<(SectionId, usize)>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Mutating,
    Reconciling,
}

/// Collects the code side of an editor's configuration.
pub struct EditorBuilder {
    registry: EmbedRegistry,
    config: EditorConfig,
    post: Option<Post>,
}

impl Default for EditorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EditorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorBuilder")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EditorBuilder {
    pub fn new() -> Self {
        Self {
            registry: EmbedRegistry::new(),
            config: EditorConfig::default(),
            post: None,
        }
    }

    pub fn config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn card(mut self, card: impl Embeddable + 'static) -> Self {
        self.registry.register_card(card);
        self
    }

    pub fn atom(mut self, atom: impl Embeddable + 'static) -> Self {
        self.registry.register_atom(atom);
        self
    }

    pub fn unknown_handler(mut self, handler: impl Embeddable + 'static) -> Self {
        self.registry.set_unknown_handler(handler);
        self
    }

    /// Start from this post instead of the configured initial content.
    pub fn post(mut self, post: Post) -> Self {
        self.post = Some(post);
        self
    }

    /// Fails only when the configured initial content does not parse.
    pub fn build<S: Surface>(self) -> Result<Editor<S>, EditorError> {
        let post = match (self.post, &self.config.initial_content) {
            (Some(post), _) => post,
            (None, Some(doc)) => interchange::parse(doc)?,
            (None, None) => Post::new(),
        };
        Ok(Editor::from_parts(post, self.registry, self.config))
    }
}

/// One editing session.
pub struct Editor<S: Surface> {
    post: Post,
    renderer: Renderer,
    surface: Option<S>,
    range: Option<Range>,
    pending: Option<Vec<Markup>>,
    history: History,
    config: EditorConfig,
    editable: bool,
    phase: Phase,
    break_hooks: Vec<BreakHook>,
}

impl<S: Surface> fmt::Debug for Editor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("post", &self.post)
            .field("range", &self.range)
            .field("attached", &self.surface.is_some())
            .field("editable", &self.editable)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl<S: Surface> Editor<S> {
    fn from_parts(post: Post, registry: EmbedRegistry, config: EditorConfig) -> Self {
        Self {
            post,
            renderer: Renderer::new(registry),
            surface: None,
            range: None,
            pending: None,
            history: History::new(config.history.clone()),
            editable: config.editable,
            config,
            phase: Phase::Idle,
            break_hooks: Vec::new(),
        }
    }

    /// Editor over `post` with default configuration and no embeddables.
    pub fn with_post(post: Post) -> Self {
        Self::from_parts(post, EmbedRegistry::new(), EditorConfig::default())
    }

    pub fn post(&self) -> &Post {
        &self.post
    }

    pub fn range(&self) -> Option<Range> {
        self.range
    }

    pub fn has_cursor(&self) -> bool {
        self.range.is_some()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn registry_mut(&mut self) -> &mut EmbedRegistry {
        self.renderer.registry_mut()
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    /// The bound surface, for host-side changes such as moving the native
    /// selection. Call [`Editor::sync_range_from_surface`] afterwards.
    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    pub fn is_attached(&self) -> bool {
        self.surface.is_some()
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    fn enter(&mut self, phase: Phase) {
        assert!(
            self.phase == Phase::Idle,
            "cannot start {phase:?} while {:?} is in progress",
            self.phase
        );
        self.phase = phase;
    }

    /// Bind to a surface and render the post into it.
    pub fn attach(&mut self, mut surface: S) -> Result<(), EditorError> {
        if self.surface.is_some() {
            return Err(EditorError::AlreadyAttached);
        }
        self.enter(Phase::Reconciling);
        let root = surface.root();
        if self.editable {
            surface.set_attribute(root, "contenteditable", "true");
        }
        let stats = self.renderer.attach(&mut surface, &self.post);
        tracing::debug!(
            target: "folio::editor",
            built = stats.built,
            editable = self.editable,
            "attached editor"
        );
        if self.config.autofocus {
            surface.focus();
            if self.range.is_none() {
                self.range = Some(Range::collapsed(self.post.start_position()));
            }
        }
        self.surface = Some(surface);
        self.sync_placeholder();
        self.restore_selection();
        self.phase = Phase::Idle;
        Ok(())
    }

    /// Tear down every render node and hand the surface back.
    pub fn detach(&mut self) -> Result<S, EditorError> {
        self.enter(Phase::Reconciling);
        let Some(mut surface) = self.surface.take() else {
            self.phase = Phase::Idle;
            return Err(EditorError::NotAttached);
        };
        let stats = self.renderer.detach(&mut surface);
        let root = surface.root();
        surface.remove_attribute(root, "contenteditable");
        surface.remove_attribute(root, "data-placeholder");
        if let Err(err) = surface.set_selection(None) {
            tracing::warn!(target: "folio::editor", %err, "could not clear selection on detach");
        }
        tracing::debug!(target: "folio::editor", torn_down = stats.torn_down, "detached editor");
        self.phase = Phase::Idle;
        Ok(surface)
    }

    pub fn enable_editing(&mut self) {
        self.set_editable(true);
    }

    pub fn disable_editing(&mut self) {
        self.set_editable(false);
    }

    fn set_editable(&mut self, editable: bool) {
        self.editable = editable;
        if let Some(surface) = self.surface.as_mut() {
            let root = surface.root();
            let value = if editable { "true" } else { "false" };
            surface.set_attribute(root, "contenteditable", value);
        }
        self.sync_placeholder();
    }

    /// Whether the configured placeholder is showing.
    pub fn is_placeholder_visible(&self) -> bool {
        self.editable && !self.config.placeholder.is_empty() && self.post.is_blank()
    }

    fn sync_placeholder(&mut self) {
        let visible = self.is_placeholder_visible();
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let root = surface.root();
        if visible {
            surface.set_attribute(root, "data-placeholder", &self.config.placeholder);
        } else {
            surface.remove_attribute(root, "data-placeholder");
        }
    }

    fn restore_selection(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let live = self
            .range
            .and_then(|range| to_live_selection(&self.post, &self.renderer, &range));
        if let Err(err) = surface.set_selection(live) {
            tracing::warn!(target: "folio::range", %err, "could not restore live selection");
        }
    }

    /// Reconcile, then bring the placeholder and selection up to date.
    fn render(&mut self) {
        if let Some(surface) = self.surface.as_mut() {
            let stats = self.renderer.reconcile(surface, &self.post);
            if tracing::enabled!(target: "folio::render", tracing::Level::TRACE) {
                tracing::trace!(
                    target: "folio::render",
                    reused = stats.reused,
                    built = stats.built,
                    torn_down = stats.torn_down,
                    "reconciled"
                );
            }
        }
        self.sync_placeholder();
        self.restore_selection();
    }

    /// Run one transaction.
    ///
    /// # Panics
    ///
    /// If another transaction or a render pass is still in progress, which
    /// can only happen after a mutator panicked and the panic was caught.
    pub fn run<R>(&mut self, mutator: impl FnOnce(&mut PostEditor<'_>) -> R) -> R {
        self.enter(Phase::Mutating);
        let before = Snapshot {
            post: self.post.clone(),
            range: self.range,
        };

        let mut txn = PostEditor::new(&mut self.post, self.range, self.pending.take());
        let result = mutator(&mut txn);
        let outcome = txn.finish();

        self.phase = Phase::Reconciling;
        for id in &outcome.touched {
            self.renderer.mark_dirty(*id);
        }
        for (card, mode) in &outcome.modes {
            self.renderer.set_card_mode(*card, *mode);
        }
        self.range = outcome.range;
        self.pending = outcome.pending.clone();
        self.render();

        let changed = self.post != before.post;
        match outcome.kind() {
            Some(kind) if changed && outcome.undoable => {
                let after = Snapshot {
                    post: self.post.clone(),
                    range: self.range,
                };
                self.history.commit(before, after, kind);
            }
            _ => {}
        }
        tracing::debug!(
            target: "folio::txn",
            kind = ?outcome.kind(),
            touched = outcome.touched.len(),
            changed,
            "transaction finished"
        );
        self.phase = Phase::Idle;
        result
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.enter(Phase::Reconciling);
        self.post = snapshot.post;
        self.range = snapshot.range.map(|range| {
            let anchor = self.post.normalize_position(&range.anchor());
            let focus = self.post.normalize_position(&range.focus());
            self.post.range(anchor, focus)
        });
        self.pending = None;
        self.render();
        self.phase = Phase::Idle;
    }

    /// Serialize the post to the portable format.
    pub fn serialize(&self) -> PortableDoc {
        interchange::serialize(&self.post)
    }

    /// Register a hook that runs before every default line break and may
    /// cancel it.
    pub fn on_before_break(&mut self, hook: impl FnMut(&mut BreakEvent) + 'static) {
        self.break_hooks.push(Box::new(hook));
    }

    /// Move the caret or selection and show it on the surface.
    pub fn set_range(&mut self, range: Range) {
        let anchor = self.post.normalize_position(&range.anchor());
        let focus = self.post.normalize_position(&range.focus());
        self.range = Some(self.post.range(anchor, focus));
        self.pending = None;
        self.history.seal();
        self.restore_selection();
    }

    pub fn select_all(&mut self) {
        let range = self.post.full_range();
        self.set_range(range);
    }

    /// Read the live selection back into the editor's range. A surface with
    /// no selection leaves the editor without a cursor.
    pub fn sync_range_from_surface(&mut self) {
        let Some(surface) = self.surface.as_ref() else {
            return;
        };
        let range = surface
            .selection()
            .and_then(|live| from_live_selection(&self.post, &self.renderer, surface, live));
        if range != self.range {
            self.range = range;
            self.pending = None;
            self.history.seal();
        }
    }

    fn input_range(&mut self) -> Option<Range> {
        if !self.editable {
            return None;
        }
        self.sync_range_from_surface();
        if self.range.is_none() {
            tracing::trace!(target: "folio::editor", "input without a cursor ignored");
        }
        self.range
    }

    /// Insert typed text at the cursor. Newlines become structural breaks;
    /// tabs are plain text. Returns `false` when the input was ignored.
    pub fn insert_text_at_cursor(&mut self, text: &str) -> bool {
        if self.input_range().is_none() {
            return false;
        }
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                self.insert_new_line();
            }
            if line.is_empty() {
                continue;
            }
            let Some(range) = self.input_range() else {
                return false;
            };
            self.run(|txn| {
                txn.insert_text(range, line);
            });
        }
        true
    }

    /// Break the block at the cursor unless a before-break hook cancels it.
    /// Returns whether the break happened.
    pub fn insert_new_line(&mut self) -> bool {
        let Some(range) = self.input_range() else {
            return false;
        };
        let mut event = BreakEvent {
            position: range.head(),
            prevented: false,
        };
        for hook in &mut self.break_hooks {
            hook(&mut event);
        }
        if event.prevented {
            tracing::debug!(target: "folio::editor", "line break cancelled by hook");
            return false;
        }
        self.run(|txn| {
            let at = if range.is_collapsed() {
                range.head()
            } else {
                txn.delete_range(range)
            };
            txn.split_section(at);
        });
        true
    }

    /// What one caret delete from `position` does. Text is deleted one
    /// step at a time and block edges join. A caret on a card or image
    /// removes it, and a caret stepping onto one from a neighbour only moves.
    fn caret_step(&self, position: &Position, direction: Direction) -> Option<CaretStep> {
        let (block, offset) = self.post.resolve_or_start(position);
        let blocks = self.post.blocks();
        let index = blocks.iter().position(|b| b.id() == block)?;
        let current = &blocks[index];
        let prev = index.checked_sub(1).and_then(|i| blocks.get(i));
        let next = blocks.get(index + 1);

        let step = match direction {
            Direction::Backward if offset > 0 => {
                if current.is_opaque() {
                    CaretStep::Remove {
                        block,
                        landing: prev.map(|b| (b.id(), b.len())),
                    }
                } else {
                    let range = self.post.range_between(
                        (block, offset - 1),
                        (block, offset),
                        Some(direction),
                    )?;
                    CaretStep::Delete(range)
                }
            }
            Direction::Backward => {
                let prev = prev?;
                if prev.is_opaque() || current.is_opaque() {
                    CaretStep::Move(self.post.position_at(prev.id(), prev.len())?)
                } else {
                    let range = self.post.range_between(
                        (prev.id(), prev.len()),
                        (block, 0),
                        Some(direction),
                    )?;
                    CaretStep::Delete(range)
                }
            }
            Direction::Forward if offset < current.len() => {
                if current.is_opaque() {
                    CaretStep::Remove {
                        block,
                        landing: next.map(|b| (b.id(), 0)),
                    }
                } else {
                    let range = self.post.range_between(
                        (block, offset),
                        (block, offset + 1),
                        Some(direction),
                    )?;
                    CaretStep::Delete(range)
                }
            }
            Direction::Forward => {
                let next = next?;
                if next.is_opaque() || current.is_opaque() {
                    CaretStep::Move(self.post.position_at(next.id(), 0)?)
                } else {
                    let range = self.post.range_between(
                        (block, offset),
                        (next.id(), 0),
                        Some(direction),
                    )?;
                    CaretStep::Delete(range)
                }
            }
        };
        Some(step)
    }

    /// Backspace or forward delete. A selection is deleted as a whole. A
    /// caret removes one character or joins with the neighbouring block at
    /// a block edge. Next to a card the first delete moves the caret onto
    /// the card and the second removes it.
    pub fn delete_at_cursor(&mut self, direction: Direction) -> bool {
        let Some(range) = self.input_range() else {
            return false;
        };
        if !range.is_collapsed() {
            self.run(|txn| {
                txn.delete_range(range);
            });
            return true;
        }
        match self.caret_step(&range.head(), direction) {
            Some(CaretStep::Delete(target)) => {
                self.run(|txn| {
                    txn.delete_range(target);
                });
            }
            Some(CaretStep::Move(position)) => self.set_range(Range::collapsed(position)),
            Some(CaretStep::Remove { block, landing }) => {
                tracing::debug!(target: "folio::editor", %block, ?direction, "removing opaque block");
                self.run(|txn| {
                    txn.remove_section(block);
                    let landing = landing.and_then(|(id, offset)| txn.post().position_at(id, offset));
                    if let Some(position) = landing {
                        txn.set_range(Range::collapsed(position));
                    }
                });
            }
            None => {}
        }
        true
    }

    /// Toggle a markup over the selection, or for the next typed text when
    /// the selection is collapsed.
    pub fn toggle_markup(&mut self, tag: &str) -> Result<bool, ValidationError> {
        let markup = Markup::new(tag)?;
        let Some(range) = self.input_range() else {
            return Ok(false);
        };
        self.run(|txn| {
            txn.toggle_markup(range, markup);
        });
        Ok(true)
    }

    /// Switch a card between its display and edit views.
    pub fn set_card_mode(&mut self, card: SectionId, mode: CardMode) -> bool {
        self.run(|txn| txn.set_card_mode(card, mode))
    }

    /// Apply everything embeddables asked for through their handles.
    /// Returns how many requests were applied.
    pub fn process_embed_requests(&mut self) -> usize {
        let requests = self.renderer.registry().take_requests();
        if requests.is_empty() {
            return 0;
        }
        let count = requests.len();
        tracing::debug!(target: "folio::embed", count, "applying embed requests");
        self.run(|txn| {
            for request in requests {
                match request {
                    EmbedRequest::SavePayload {
                        target: EmbedTarget::Card(id),
                        payload,
                    } => {
                        txn.set_card_payload(id, payload);
                    }
                    EmbedRequest::SavePayload {
                        target: EmbedTarget::Atom(leaf),
                        payload,
                    } => {
                        txn.set_atom_payload(leaf, payload);
                    }
                    EmbedRequest::Remove {
                        target: EmbedTarget::Card(id),
                    } => {
                        txn.remove_section(id);
                    }
                    EmbedRequest::Remove {
                        target: EmbedTarget::Atom(leaf),
                    } => {
                        txn.remove_atom(leaf);
                    }
                    EmbedRequest::SetMode {
                        target: EmbedTarget::Card(id),
                        mode,
                    } => {
                        txn.set_card_mode(id, mode);
                    }
                    EmbedRequest::SetMode {
                        target: EmbedTarget::Atom(_),
                        ..
                    } => {}
                }
            }
        });
        count
    }

    /// Re-render whatever the surface reports was changed behind the
    /// editor's back. Returns the number of reported nodes.
    pub fn handle_external_mutations(&mut self) -> usize {
        let Some(surface) = self.surface.as_mut() else {
            return 0;
        };
        let nodes = surface.take_external_mutations();
        if nodes.is_empty() {
            return 0;
        }
        for node in &nodes {
            if let Some(owner) = self.renderer.owner_of_view(&*surface, *node) {
                self.renderer.mark_dirty(owner);
            }
        }
        tracing::debug!(
            target: "folio::editor",
            count = nodes.len(),
            "repairing external mutations"
        );
        self.enter(Phase::Reconciling);
        self.render();
        self.phase = Phase::Idle;
        nodes.len()
    }
}

impl<S: Surface> UndoManager for Editor<S> {
    fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn undo(&mut self) -> bool {
        let Some(snapshot) = self.history.undo() else {
            return false;
        };
        tracing::debug!(target: "folio::history", "undo");
        self.restore(snapshot);
        true
    }

    fn redo(&mut self) -> bool {
        let Some(snapshot) = self.history.redo() else {
            return false;
        };
        tracing::debug!(target: "folio::history", "redo");
        self.restore(snapshot);
        true
    }

    fn clear_history(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::build_from_text;
    use crate::platform::{SelectionSync, ViewTree};
    use crate::surface::MemorySurface;

    fn editor(source: &str) -> Editor<MemorySurface> {
        let (post, range) = build_from_text(source).unwrap();
        let mut editor = Editor::with_post(post);
        editor.attach(MemorySurface::new()).unwrap();
        if let Some(range) = range {
            editor.set_range(range);
        }
        editor
    }

    #[test]
    fn test_attach_twice_fails() {
        let mut editor = editor("abc");
        let err = editor.attach(MemorySurface::new()).unwrap_err();
        assert!(matches!(err, EditorError::AlreadyAttached));
    }

    #[test]
    fn test_detach_releases_views() {
        let mut editor = editor("abc|");
        let surface = editor.detach().unwrap();
        assert_eq!(surface.live_node_count(), 1);
        assert!(surface.selection().is_none());
        assert!(matches!(editor.detach(), Err(EditorError::NotAttached)));
    }

    #[test]
    fn test_run_restores_live_selection() {
        let mut editor = editor("ab|");
        let range = editor.range().unwrap();
        editor.run(|txn| {
            txn.insert_text(range, "c");
        });
        let surface = editor.surface().unwrap();
        let live = surface.selection().unwrap();
        assert!(live.is_collapsed());
        assert_eq!(surface.text(live.anchor.node).as_deref(), Some("abc"));
        assert_eq!(live.anchor.offset, 3);
    }

    #[test]
    fn test_non_undoable_transaction() {
        let mut editor = editor("ab|");
        let range = editor.range().unwrap();
        editor.run(|txn| {
            txn.set_undoable(false);
            txn.insert_text(range, "c");
        });
        assert_eq!(editor.post().text(), "abc");
        assert!(!editor.can_undo());
    }

    #[test]
    fn test_poisoned_transaction_is_fatal() {
        let mut editor = editor("ab|");
        let first = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            editor.run(|txn| {
                if txn.range().is_some() {
                    panic!("mutator failed");
                }
            });
        }));
        assert!(first.is_err());
        let second = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            editor.run(|_| ());
        }));
        assert!(second.is_err());
    }
}
