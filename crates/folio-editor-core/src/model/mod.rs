//! Abstract document model: posts, sections, markers, markups and atoms.
//!
//! Nodes are plain owned values. A [`Post`] owns its sections, sections own
//! their leaves. Every section, list item and leaf carries a stable id that
//! survives edits which keep the node alive, which is what the renderer and
//! range model key on.

pub mod builder;
pub mod ids;
pub mod leaf;
pub mod markup;
pub mod post;
pub mod section;
pub mod similar;

pub use builder::{PostBuilder, atom, marker, text};
pub use ids::{LeafId, SectionId};
pub use leaf::{Atom, Inlines, Leaf, Marker};
pub use markup::{MARKUP_TAGS, Markup};
pub use post::{Block, Post};
pub use section::{
    CardSection, ImageSection, LIST_TAGS, ListItem, ListSection, MarkupSection, SECTION_TAGS,
    Section,
};
pub use similar::{InlineShape, PostShape, SectionShape, shape, similar};
