//! folio-editor-core: structured rich-text editing without a framework.
//!
//! This crate provides:
//! - `model` - posts, sections, markers, markups and atoms
//! - `interchange` - the versioned portable document format
//! - `Renderer` - incremental reconciliation of a post onto a `ViewTree`
//! - `Position` / `Range` - logical coordinates and live selection mapping
//! - `PostEditor` - transaction primitives, driven by `Editor::run`
//! - `History` - snapshot undo/redo with configurable coalescing
//! - `MemorySurface` - a headless surface for tests and servers

pub mod actions;
pub mod config;
pub mod edit;
pub mod editor;
pub mod embed;
pub mod error;
pub mod fixture;
pub mod history;
pub mod interchange;
pub mod model;
pub mod platform;
pub mod range;
pub mod render;
pub mod surface;

pub use actions::{EditorAction, execute_action};
pub use config::{EditorConfig, HistoryPolicy};
pub use edit::{EditKind, PostEditor};
pub use editor::{BreakEvent, Editor, EditorBuilder};
pub use embed::{
    CardMode, EmbedEnv, EmbedHandle, EmbedKind, EmbedRegistry, EmbedRequest, EmbedTarget,
    Embeddable,
};
pub use error::{EditorError, ParseError, ParseErrorKind, ValidationError};
pub use history::{History, Snapshot, UndoManager};
pub use interchange::PortableDoc;
pub use model::{LeafId, Markup, Post, PostBuilder, Section, SectionId};
pub use platform::{
    LivePoint, LiveSelection, PlatformError, SelectionSync, Surface, ViewId, ViewTree,
};
pub use range::{Direction, Position, Range};
pub use render::{ReconcileStats, RenderNode, RenderState, Renderer};
pub use smol_str::SmolStr;
pub use surface::MemorySurface;
