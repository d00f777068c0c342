//! Block-level sections.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde_json::Value;
use smol_str::SmolStr;

use super::ids::SectionId;
use super::leaf::{Inlines, Leaf};
use crate::error::ValidationError;

/// Tags a [`MarkupSection`] may carry.
pub const SECTION_TAGS: &[&str] = &[
    "aside",
    "blockquote",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "p",
    "pull-quote",
];

/// Tags a [`ListSection`] may carry.
pub const LIST_TAGS: &[&str] = &["ul", "ol"];

fn normalize_tag(tag: &str) -> SmolStr {
    SmolStr::new(tag.to_ascii_lowercase())
}

fn validate_section_tag(tag: &str) -> Result<SmolStr, ValidationError> {
    let tag = normalize_tag(tag);
    if SECTION_TAGS.contains(&tag.as_str()) {
        Ok(tag)
    } else {
        Err(ValidationError::InvalidSectionTag(tag))
    }
}

fn validate_list_tag(tag: &str) -> Result<SmolStr, ValidationError> {
    let tag = normalize_tag(tag);
    if LIST_TAGS.contains(&tag.as_str()) {
        Ok(tag)
    } else {
        Err(ValidationError::InvalidListTag(tag))
    }
}

/// Paragraph-like section holding inline leaves.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkupSection {
    id: SectionId,
    tag: SmolStr,
    content: Inlines,
}

impl MarkupSection {
    pub fn new(tag: &str, leaves: Vec<Leaf>) -> Result<Self, ValidationError> {
        let mut content = Inlines::new(leaves);
        content.normalize();
        Ok(Self {
            id: SectionId::fresh(),
            tag: validate_section_tag(tag)?,
            content,
        })
    }

    /// An empty `p`.
    pub fn paragraph() -> Self {
        Self::from_inlines(SmolStr::new_static("p"), Inlines::default())
    }

    pub(crate) fn from_inlines(tag: SmolStr, content: Inlines) -> Self {
        Self {
            id: SectionId::fresh(),
            tag,
            content,
        }
    }

    pub fn id(&self) -> SectionId {
        self.id
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn content(&self) -> &Inlines {
        &self.content
    }

    pub fn text(&self) -> String {
        self.content.text()
    }

    pub fn is_blank(&self) -> bool {
        self.content.is_empty()
    }

    pub(crate) fn content_mut(&mut self) -> &mut Inlines {
        &mut self.content
    }

    pub(crate) fn set_tag(&mut self, tag: &str) -> Result<(), ValidationError> {
        self.tag = validate_section_tag(tag)?;
        Ok(())
    }
}

/// One item of a [`ListSection`].
#[derive(Clone, Debug, PartialEq)]
pub struct ListItem {
    id: SectionId,
    content: Inlines,
}

impl ListItem {
    pub fn new(leaves: Vec<Leaf>) -> Self {
        let mut content = Inlines::new(leaves);
        content.normalize();
        Self::from_inlines(content)
    }

    pub(crate) fn from_inlines(content: Inlines) -> Self {
        Self {
            id: SectionId::fresh(),
            content,
        }
    }

    pub fn id(&self) -> SectionId {
        self.id
    }

    pub fn content(&self) -> &Inlines {
        &self.content
    }

    pub fn text(&self) -> String {
        self.content.text()
    }

    pub fn is_blank(&self) -> bool {
        self.content.is_empty()
    }

    pub(crate) fn content_mut(&mut self) -> &mut Inlines {
        &mut self.content
    }

    pub(crate) fn into_inlines(self) -> Inlines {
        self.content
    }

    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.id.hash(&mut hasher);
        self.content.hash_into(&mut hasher);
        hasher.finish()
    }
}

/// `ul` / `ol` section.
#[derive(Clone, Debug, PartialEq)]
pub struct ListSection {
    id: SectionId,
    tag: SmolStr,
    items: Vec<ListItem>,
}

impl ListSection {
    pub fn new(tag: &str, items: Vec<ListItem>) -> Result<Self, ValidationError> {
        Ok(Self {
            id: SectionId::fresh(),
            tag: validate_list_tag(tag)?,
            items,
        })
    }

    pub(crate) fn with_tag(tag: SmolStr, items: Vec<ListItem>) -> Self {
        Self {
            id: SectionId::fresh(),
            tag,
            items,
        }
    }

    pub fn id(&self) -> SectionId {
        self.id
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn items(&self) -> &[ListItem] {
        &self.items
    }

    pub fn item(&self, id: SectionId) -> Option<&ListItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<ListItem> {
        &mut self.items
    }

    pub(crate) fn tag_smol(&self) -> SmolStr {
        self.tag.clone()
    }
}

/// Opaque block rendered by a registered card.
#[derive(Clone, Debug, PartialEq)]
pub struct CardSection {
    id: SectionId,
    name: SmolStr,
    payload: Value,
}

impl CardSection {
    pub fn new(name: impl Into<SmolStr>, payload: Value) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::EmptyEmbedName);
        }
        Ok(Self {
            id: SectionId::fresh(),
            name,
            payload,
        })
    }

    pub fn id(&self) -> SectionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub(crate) fn set_payload(&mut self, payload: Value) {
        self.payload = payload;
    }
}

/// Block image.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageSection {
    id: SectionId,
    src: SmolStr,
}

impl ImageSection {
    pub fn new(src: impl Into<SmolStr>) -> Self {
        Self {
            id: SectionId::fresh(),
            src: src.into(),
        }
    }

    pub fn id(&self) -> SectionId {
        self.id
    }

    pub fn src(&self) -> &str {
        &self.src
    }
}

/// A top-level section of a post.
#[derive(Clone, Debug, PartialEq)]
pub enum Section {
    Markup(MarkupSection),
    List(ListSection),
    Card(CardSection),
    Image(ImageSection),
}

impl Section {
    pub fn id(&self) -> SectionId {
        match self {
            Section::Markup(s) => s.id,
            Section::List(s) => s.id,
            Section::Card(s) => s.id,
            Section::Image(s) => s.id,
        }
    }

    pub fn as_markup(&self) -> Option<&MarkupSection> {
        match self {
            Section::Markup(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListSection> {
        match self {
            Section::List(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_card(&self) -> Option<&CardSection> {
        match self {
            Section::Card(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the section has no content. Cards and images never are.
    pub fn is_blank(&self) -> bool {
        match self {
            Section::Markup(s) => s.is_blank(),
            Section::List(l) => l.items.iter().all(ListItem::is_blank),
            Section::Card(_) | Section::Image(_) => false,
        }
    }

    /// Content hash used for render reuse. Includes node ids, so a section
    /// whose leaves were split or replaced hashes differently even when its
    /// text did not change.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.id().hash(&mut hasher);
        match self {
            Section::Markup(s) => {
                0u8.hash(&mut hasher);
                s.tag.hash(&mut hasher);
                s.content.hash_into(&mut hasher);
            }
            Section::List(l) => {
                1u8.hash(&mut hasher);
                l.tag.hash(&mut hasher);
                for item in &l.items {
                    item.fingerprint().hash(&mut hasher);
                }
            }
            Section::Card(c) => {
                2u8.hash(&mut hasher);
                c.name.hash(&mut hasher);
                c.payload.to_string().hash(&mut hasher);
            }
            Section::Image(i) => {
                3u8.hash(&mut hasher);
                i.src.hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    /// Give this section (and its items and leaves) fresh ids.
    pub(crate) fn reassign_ids(&mut self) {
        match self {
            Section::Markup(s) => {
                s.id = SectionId::fresh();
                s.content.reassign_ids();
            }
            Section::List(l) => {
                l.id = SectionId::fresh();
                for item in &mut l.items {
                    item.id = SectionId::fresh();
                    item.content.reassign_ids();
                }
            }
            Section::Card(c) => c.id = SectionId::fresh(),
            Section::Image(i) => i.id = SectionId::fresh(),
        }
    }
}

impl From<MarkupSection> for Section {
    fn from(s: MarkupSection) -> Self {
        Section::Markup(s)
    }
}

impl From<ListSection> for Section {
    fn from(s: ListSection) -> Self {
        Section::List(s)
    }
}

impl From<CardSection> for Section {
    fn from(s: CardSection) -> Self {
        Section::Card(s)
    }
}

impl From<ImageSection> for Section {
    fn from(s: ImageSection) -> Self {
        Section::Image(s)
    }
}
