//! Platform abstraction traits for the live editing surface.
//!
//! These traits define the interface between the editing engine and whatever
//! actually displays the document (a browser DOM, a native widget tree, the
//! headless [`MemorySurface`](crate::surface::MemorySurface)). The document
//! model, renderer, range model and transaction layer only ever talk to a
//! surface through them.
//!
//! Offsets in a [`LivePoint`] follow DOM conventions: inside a text node the
//! offset counts characters, inside an element it is a child index.

/// Error type for platform operations.
#[derive(thiserror::Error, Debug, Clone)]
#[error("platform error: {0}")]
pub struct PlatformError(pub String);

impl From<&str> for PlatformError {
    fn from(s: &str) -> Self {
        PlatformError(s.to_string())
    }
}

impl From<String> for PlatformError {
    fn from(s: String) -> Self {
        PlatformError(s)
    }
}

/// Handle to one node of the live view tree. Only meaningful to the surface
/// that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

/// A point in the live view tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LivePoint {
    pub node: ViewId,
    pub offset: usize,
}

impl LivePoint {
    pub fn new(node: ViewId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// The surface's native selection: where it started and where it is now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiveSelection {
    pub anchor: LivePoint,
    pub focus: LivePoint,
}

impl LiveSelection {
    pub fn new(anchor: LivePoint, focus: LivePoint) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: LivePoint) -> Self {
        Self {
            anchor: point,
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

/// Structural operations on the live view tree.
///
/// Newly created nodes are detached until inserted. `remove` detaches a node
/// and releases it together with its whole subtree; ids of released nodes
/// must not be reused by the surface.
pub trait ViewTree {
    /// The element the editor renders into.
    fn root(&self) -> ViewId;

    fn create_element(&mut self, tag: &str) -> ViewId;

    fn create_text(&mut self, text: &str) -> ViewId;

    fn set_text(&mut self, node: ViewId, text: &str);

    /// Text content of a text node, `None` for elements and released nodes.
    fn text(&self, node: ViewId) -> Option<String>;

    fn set_attribute(&mut self, node: ViewId, name: &str, value: &str);

    fn remove_attribute(&mut self, node: ViewId, name: &str);

    fn attribute(&self, node: ViewId, name: &str) -> Option<String>;

    /// Insert `child` under `parent` before `reference`, or at the end when
    /// `reference` is `None`. Moves the child if it is already attached.
    fn insert_before(&mut self, parent: ViewId, child: ViewId, reference: Option<ViewId>);

    fn append_child(&mut self, parent: ViewId, child: ViewId) {
        self.insert_before(parent, child, None);
    }

    /// Detach and release a node and everything below it.
    fn remove(&mut self, node: ViewId);

    fn parent(&self, node: ViewId) -> Option<ViewId>;

    fn children(&self, node: ViewId) -> Vec<ViewId>;

    fn is_text(&self, node: ViewId) -> bool {
        self.text(node).is_some()
    }
}

/// Selection, focus and external-change observation on the live surface.
///
/// This is the inverse direction of [`ViewTree`]: it reports what the user
/// (or the platform) did to the surface back to the engine.
pub trait SelectionSync {
    /// Read the current native selection, if the surface has one.
    fn selection(&self) -> Option<LiveSelection>;

    /// Replace the native selection. `None` clears it.
    fn set_selection(&mut self, selection: Option<LiveSelection>) -> Result<(), PlatformError>;

    fn focus(&mut self);

    /// Nodes changed behind the engine's back since the last call.
    fn take_external_mutations(&mut self) -> Vec<ViewId>;
}

/// A complete live surface.
pub trait Surface: ViewTree + SelectionSync {}

impl<T: ViewTree + SelectionSync> Surface for T {}
