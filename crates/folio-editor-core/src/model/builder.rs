//! Fluent construction of posts outside a transaction.
//!
//! ```
//! use folio_editor_core::model::{PostBuilder, marker, text};
//!
//! let post = PostBuilder::new()
//!     .paragraph(vec![text("abc"), marker("123", &["b"]).unwrap()])
//!     .card("image", serde_json::json!({ "src": "a.png" }))
//!     .build()
//!     .unwrap();
//! assert_eq!(post.sections().len(), 2);
//! ```

use serde_json::Value;
use smol_str::SmolStr;

use super::leaf::{Atom, Leaf, Marker};
use super::markup::Markup;
use super::post::Post;
use super::section::{CardSection, ImageSection, ListItem, ListSection, MarkupSection, Section};
use crate::error::ValidationError;

/// Plain text leaf.
pub fn text(text: impl Into<SmolStr>) -> Leaf {
    Marker::new(text, Vec::new()).into()
}

/// Text leaf carrying attribute-less markups named by tag.
pub fn marker(text: impl Into<SmolStr>, tags: &[&str]) -> Result<Leaf, ValidationError> {
    let markups = tags
        .iter()
        .map(|t| Markup::new(t))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Marker::new(text, markups).into())
}

pub fn atom(
    name: impl Into<SmolStr>,
    value: impl Into<SmolStr>,
    payload: Value,
) -> Result<Leaf, ValidationError> {
    Ok(Atom::new(name, value, payload)?.into())
}

/// Accumulates sections; the first construction error is reported by
/// [`PostBuilder::build`].
#[derive(Debug, Default)]
pub struct PostBuilder {
    sections: Vec<Section>,
    error: Option<ValidationError>,
}

impl PostBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, section: Result<Section, ValidationError>) -> Self {
        match section {
            Ok(s) => self.sections.push(s),
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(e);
                }
            }
        }
        self
    }

    pub fn section(self, section: impl Into<Section>) -> Self {
        self.push(Ok(section.into()))
    }

    pub fn paragraph(self, leaves: Vec<Leaf>) -> Self {
        self.markup_section("p", leaves)
    }

    pub fn markup_section(self, tag: &str, leaves: Vec<Leaf>) -> Self {
        self.push(MarkupSection::new(tag, leaves).map(Section::from))
    }

    /// A list with one item per leaf sequence.
    pub fn list(self, tag: &str, items: Vec<Vec<Leaf>>) -> Self {
        let items = items.into_iter().map(ListItem::new).collect();
        self.push(ListSection::new(tag, items).map(Section::from))
    }

    pub fn card(self, name: &str, payload: Value) -> Self {
        self.push(CardSection::new(name, payload).map(Section::from))
    }

    pub fn image(self, src: &str) -> Self {
        self.push(Ok(ImageSection::new(src).into()))
    }

    pub fn build(self) -> Result<Post, ValidationError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(Post::from_sections(self.sections)),
        }
    }
}
