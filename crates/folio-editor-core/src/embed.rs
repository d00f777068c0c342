//! Embeddable registry: named renderers for cards and atoms.
//!
//! The renderer never looks inside what an embeddable produces. Embeddables in
//! turn never see the document: they get their payload, a view tree to build
//! into, and an [`EmbedHandle`] that can only queue requests against their own
//! node. The editor applies queued requests in
//! [`Editor::process_embed_requests`](crate::editor::Editor::process_embed_requests).

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;

use crate::model::{LeafId, SectionId};
use crate::platform::{ViewId, ViewTree};

/// Whether an embeddable renders a block (card) or an inline (atom).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EmbedKind {
    Card,
    Atom,
}

/// Render context for a card.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardMode {
    #[default]
    Display,
    Edit,
}

/// The node an [`EmbedHandle`] is scoped to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EmbedTarget {
    Card(SectionId),
    Atom(LeafId),
}

/// Something an embeddable asked the editor to do to its own node.
#[derive(Clone, Debug, PartialEq)]
pub enum EmbedRequest {
    SavePayload { target: EmbedTarget, payload: Value },
    Remove { target: EmbedTarget },
    SetMode { target: EmbedTarget, mode: CardMode },
}

impl EmbedRequest {
    pub fn target(&self) -> EmbedTarget {
        match self {
            EmbedRequest::SavePayload { target, .. }
            | EmbedRequest::Remove { target }
            | EmbedRequest::SetMode { target, .. } => *target,
        }
    }
}

type RequestQueue = Rc<RefCell<VecDeque<EmbedRequest>>>;

/// Payload-scoped mutation capability handed to an embeddable.
///
/// Requests are queued, never applied in place, so an embeddable cannot
/// mutate the document while it is being rendered.
#[derive(Clone)]
pub struct EmbedHandle {
    target: EmbedTarget,
    queue: RequestQueue,
}

impl fmt::Debug for EmbedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedHandle")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl EmbedHandle {
    pub fn target(&self) -> EmbedTarget {
        self.target
    }

    fn push(&self, request: EmbedRequest) {
        self.queue.borrow_mut().push_back(request);
    }

    /// Replace this node's payload.
    pub fn save(&self, payload: Value) {
        self.push(EmbedRequest::SavePayload {
            target: self.target,
            payload,
        });
    }

    /// Remove this node from the document.
    pub fn remove(&self) {
        self.push(EmbedRequest::Remove {
            target: self.target,
        });
    }

    /// Switch a card to its edit context. No effect for atoms.
    pub fn edit(&self) {
        self.push(EmbedRequest::SetMode {
            target: self.target,
            mode: CardMode::Edit,
        });
    }

    /// Switch a card to its display context. No effect for atoms.
    pub fn display(&self) {
        self.push(EmbedRequest::SetMode {
            target: self.target,
            mode: CardMode::Display,
        });
    }
}

/// What an embeddable gets while rendering.
pub struct EmbedEnv<'a> {
    view: &'a mut dyn ViewTree,
    name: &'a str,
    kind: EmbedKind,
    mode: CardMode,
    handle: EmbedHandle,
}

impl<'a> EmbedEnv<'a> {
    pub(crate) fn new(
        view: &'a mut dyn ViewTree,
        name: &'a str,
        kind: EmbedKind,
        mode: CardMode,
        handle: EmbedHandle,
    ) -> Self {
        Self {
            view,
            name,
            kind,
            mode,
            handle,
        }
    }

    /// View tree to build the embed's own subtree in.
    pub fn view(&mut self) -> &mut dyn ViewTree {
        &mut *self.view
    }

    /// Name the node was registered under in the document.
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn kind(&self) -> EmbedKind {
        self.kind
    }

    pub fn mode(&self) -> CardMode {
        self.mode
    }

    pub fn handle(&self) -> EmbedHandle {
        self.handle.clone()
    }
}

/// A renderable card or atom implementation.
pub trait Embeddable {
    /// Name this embeddable is looked up by.
    fn name(&self) -> &str;

    /// Build the display view. The returned node is inserted by the renderer.
    fn render(&self, payload: &Value, env: &mut EmbedEnv<'_>) -> ViewId;

    /// Build the edit view, if this embeddable has one.
    fn edit(&self, payload: &Value, env: &mut EmbedEnv<'_>) -> Option<ViewId> {
        let _ = (payload, env);
        None
    }

    /// Called before the renderer releases a view this embeddable produced.
    fn teardown(&self, view: ViewId, tree: &mut dyn ViewTree) {
        let _ = (view, tree);
    }
}

/// Inert stand-in for names nobody registered.
struct Placeholder;

impl Embeddable for Placeholder {
    fn name(&self) -> &str {
        "placeholder"
    }

    fn render(&self, _payload: &Value, env: &mut EmbedEnv<'_>) -> ViewId {
        let tag = match env.kind() {
            EmbedKind::Card => "div",
            EmbedKind::Atom => "span",
        };
        let name = env.name().to_string();
        let view = env.view();
        let el = view.create_element(tag);
        view.set_attribute(el, "data-unknown-embed", &name);
        el
    }
}

/// Name → embeddable lookup for cards and atoms.
pub struct EmbedRegistry {
    cards: HashMap<SmolStr, Rc<dyn Embeddable>>,
    atoms: HashMap<SmolStr, Rc<dyn Embeddable>>,
    unknown: Option<Rc<dyn Embeddable>>,
    placeholder: Rc<dyn Embeddable>,
    queue: RequestQueue,
}

impl fmt::Debug for EmbedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedRegistry")
            .field("cards", &self.cards.keys().collect::<Vec<_>>())
            .field("atoms", &self.atoms.keys().collect::<Vec<_>>())
            .field("unknown", &self.unknown.as_ref().map(|u| u.name().to_string()))
            .finish_non_exhaustive()
    }
}

impl Default for EmbedRegistry {
    fn default() -> Self {
        Self {
            cards: HashMap::new(),
            atoms: HashMap::new(),
            unknown: None,
            placeholder: Rc::new(Placeholder),
            queue: Rc::default(),
        }
    }
}

impl EmbedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_card(&mut self, card: impl Embeddable + 'static) {
        self.cards.insert(SmolStr::new(card.name()), Rc::new(card));
    }

    pub fn register_atom(&mut self, atom: impl Embeddable + 'static) {
        self.atoms.insert(SmolStr::new(atom.name()), Rc::new(atom));
    }

    /// Embeddable used for any name without a registration.
    pub fn set_unknown_handler(&mut self, handler: impl Embeddable + 'static) {
        self.unknown = Some(Rc::new(handler));
    }

    pub fn is_registered(&self, kind: EmbedKind, name: &str) -> bool {
        match kind {
            EmbedKind::Card => self.cards.contains_key(name),
            EmbedKind::Atom => self.atoms.contains_key(name),
        }
    }

    /// Look up an embeddable. Never fails: unregistered names go to the
    /// unknown handler, or to an inert placeholder without one.
    pub fn resolve(&self, kind: EmbedKind, name: &str) -> Rc<dyn Embeddable> {
        let table = match kind {
            EmbedKind::Card => &self.cards,
            EmbedKind::Atom => &self.atoms,
        };
        if let Some(found) = table.get(name) {
            return Rc::clone(found);
        }
        match &self.unknown {
            Some(handler) => {
                tracing::debug!(
                    target: "folio::embed",
                    ?kind,
                    embed = name,
                    "unregistered embeddable, using unknown handler"
                );
                Rc::clone(handler)
            }
            None => {
                tracing::warn!(
                    target: "folio::embed",
                    ?kind,
                    embed = name,
                    "unregistered embeddable, rendering placeholder"
                );
                Rc::clone(&self.placeholder)
            }
        }
    }

    pub(crate) fn handle(&self, target: EmbedTarget) -> EmbedHandle {
        EmbedHandle {
            target,
            queue: Rc::clone(&self.queue),
        }
    }

    pub(crate) fn take_requests(&self) -> Vec<EmbedRequest> {
        self.queue.borrow_mut().drain(..).collect()
    }

    pub fn has_pending_requests(&self) -> bool {
        !self.queue.borrow().is_empty()
    }
}
