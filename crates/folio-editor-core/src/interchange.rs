//! Portable document format.
//!
//! A versioned JSON descriptor with three lookup tables (atoms, cards,
//! markups) and an ordered section list that refers into them by index:
//!
//! ```text
//! markup:   [tag] | [tag, [attr, value, ...]]
//! marker:   [0, [open markup idx...], closed count, text]
//!           [1, [open markup idx...], closed count, atom idx]
//! sections: [1, tag, [marker...]]          markup section
//!           [2, src]                       image
//!           [3, tag, [[marker...]...]]     list, one marker list per item
//!           [10, card idx]                 card
//! ```
//!
//! Markups open and close like a stack across the markers of one section.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use smol_str::SmolStr;

use crate::error::{ParseError, ParseErrorKind};
use crate::model::{
    Atom, CardSection, ImageSection, Inlines, Leaf, ListItem, ListSection, Markup, Marker,
    MarkupSection, Post, Section,
};

/// Version written by [`serialize`].
pub const VERSION: &str = "0.3.2";

/// Versions [`parse`] accepts.
pub const SUPPORTED_VERSIONS: &[&str] = &["0.3.0", "0.3.1", "0.3.2"];

const MARKUP_SECTION: u64 = 1;
const IMAGE_SECTION: u64 = 2;
const LIST_SECTION: u64 = 3;
const CARD_SECTION: u64 = 10;

const TEXT_MARKER: u64 = 0;
const ATOM_MARKER: u64 = 1;

/// Serialized document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortableDoc {
    pub version: String,
    #[serde(default)]
    pub atoms: Vec<(String, String, Value)>,
    #[serde(default)]
    pub cards: Vec<(String, Value)>,
    #[serde(default)]
    pub markups: Vec<Value>,
    #[serde(default)]
    pub sections: Vec<Value>,
}

impl Default for PortableDoc {
    fn default() -> Self {
        Self {
            version: VERSION.to_string(),
            atoms: Vec::new(),
            cards: Vec::new(),
            markups: Vec::new(),
            sections: Vec::new(),
        }
    }
}

impl PortableDoc {
    pub fn from_json(json: &str) -> Result<Self, ParseError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_post(&self) -> Result<Post, ParseError> {
        parse(self)
    }

    pub fn from_post(post: &Post) -> Self {
        serialize(post)
    }
}

fn malformed(section: usize, reason: impl Into<String>) -> ParseError {
    ParseErrorKind::MalformedSection {
        section,
        reason: reason.into(),
    }
    .into()
}

fn parse_markup(index: usize, raw: &Value) -> Result<Markup, ParseError> {
    let bad = || ParseError::new(ParseErrorKind::MalformedMarkup(index));
    let parts = raw.as_array().ok_or_else(bad)?;
    let tag = parts.first().and_then(Value::as_str).ok_or_else(bad)?;
    let mut attributes: Vec<(SmolStr, SmolStr)> = Vec::new();
    if let Some(raw_attrs) = parts.get(1) {
        let flat = raw_attrs.as_array().ok_or_else(bad)?;
        if flat.len() % 2 != 0 {
            return Err(bad());
        }
        for pair in flat.chunks(2) {
            let k = pair[0].as_str().ok_or_else(bad)?;
            let v = pair[1].as_str().ok_or_else(bad)?;
            attributes.push((k.into(), v.into()));
        }
    }
    Ok(Markup::with_attributes(tag, attributes)?)
}

struct Tables {
    markups: Vec<Markup>,
    atoms: Vec<Atom>,
    cards: Vec<(String, Value)>,
}

fn parse_markers(
    section: usize,
    raw: &Value,
    tables: &Tables,
) -> Result<Inlines, ParseError> {
    let markers = raw
        .as_array()
        .ok_or_else(|| malformed(section, "markers must be an array"))?;
    let mut open: Vec<Markup> = Vec::new();
    let mut leaves: Vec<Leaf> = Vec::with_capacity(markers.len());

    for raw_marker in markers {
        let parts = raw_marker
            .as_array()
            .filter(|p| p.len() == 4)
            .ok_or_else(|| malformed(section, "marker must have four elements"))?;
        let kind = parts[0]
            .as_u64()
            .ok_or_else(|| malformed(section, "marker type must be a number"))?;
        let opens = parts[1]
            .as_array()
            .ok_or_else(|| malformed(section, "opened markups must be an array"))?;
        for idx in opens {
            let index = idx
                .as_u64()
                .ok_or_else(|| malformed(section, "markup index must be a number"))?
                as usize;
            let markup = tables
                .markups
                .get(index)
                .ok_or(ParseErrorKind::MarkupIndex { section, index })?;
            open.push(markup.clone());
        }

        let leaf: Leaf = match kind {
            TEXT_MARKER => {
                let text = parts[3]
                    .as_str()
                    .ok_or_else(|| malformed(section, "text marker value must be a string"))?;
                Marker::new(text, open.clone()).into()
            }
            ATOM_MARKER => {
                let index = parts[3]
                    .as_u64()
                    .ok_or_else(|| malformed(section, "atom marker value must be an index"))?
                    as usize;
                let atom = tables
                    .atoms
                    .get(index)
                    .ok_or(ParseErrorKind::AtomIndex { section, index })?;
                // Each use of a table entry is its own leaf.
                Atom::new(atom.name(), atom.value(), atom.payload().clone())?
                    .with_markups(open.clone())
                    .into()
            }
            other => {
                return Err(malformed(section, format!("unknown marker type {other}")));
            }
        };
        leaves.push(leaf);

        let closed = parts[2]
            .as_u64()
            .ok_or_else(|| malformed(section, "closed count must be a number"))?
            as usize;
        if closed > open.len() {
            return Err(ParseErrorKind::UnbalancedMarkups {
                section,
                closed,
                open: open.len(),
            }
            .into());
        }
        open.truncate(open.len() - closed);
    }

    let mut inlines = Inlines::new(leaves);
    inlines.normalize();
    Ok(inlines)
}

fn parse_section(index: usize, raw: &Value, tables: &Tables) -> Result<Section, ParseError> {
    let parts = raw
        .as_array()
        .ok_or_else(|| malformed(index, "section must be an array"))?;
    let type_id = parts
        .first()
        .and_then(Value::as_u64)
        .ok_or_else(|| malformed(index, "section type must be a number"))?;
    let tag = || {
        parts
            .get(1)
            .and_then(Value::as_str)
            .ok_or_else(|| malformed(index, "section tag must be a string"))
    };

    match type_id {
        MARKUP_SECTION => {
            let raw_markers = parts
                .get(2)
                .ok_or_else(|| malformed(index, "markup section needs markers"))?;
            let inlines = parse_markers(index, raw_markers, tables)?;
            let mut section = MarkupSection::paragraph();
            section.set_tag(tag()?)?;
            *section.content_mut() = inlines;
            Ok(section.into())
        }
        IMAGE_SECTION => {
            let src = tag()?;
            Ok(ImageSection::new(src).into())
        }
        LIST_SECTION => {
            let raw_items = parts
                .get(2)
                .and_then(Value::as_array)
                .ok_or_else(|| malformed(index, "list section needs items"))?;
            let items = raw_items
                .iter()
                .map(|raw| parse_markers(index, raw, tables).map(ListItem::from_inlines))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ListSection::new(tag()?, items)?.into())
        }
        CARD_SECTION => {
            let card = parts
                .get(1)
                .and_then(Value::as_u64)
                .ok_or_else(|| malformed(index, "card section needs a card index"))?
                as usize;
            let (name, payload) = tables.cards.get(card).ok_or(ParseErrorKind::CardIndex {
                section: index,
                index: card,
            })?;
            Ok(CardSection::new(name.as_str(), payload.clone())?.into())
        }
        other => Err(ParseErrorKind::UnknownSectionType {
            section: index,
            type_id: other,
        }
        .into()),
    }
}

/// Load a post. Fails on an unsupported version, malformed structure, or a
/// table index that does not resolve.
pub fn parse(doc: &PortableDoc) -> Result<Post, ParseError> {
    if !SUPPORTED_VERSIONS.contains(&doc.version.as_str()) {
        return Err(ParseError::new(ParseErrorKind::UnsupportedVersion(
            doc.version.clone(),
        ))
        .with_advice(format!("supported versions: {}", SUPPORTED_VERSIONS.join(", "))));
    }

    let markups = doc
        .markups
        .iter()
        .enumerate()
        .map(|(i, raw)| parse_markup(i, raw))
        .collect::<Result<Vec<_>, _>>()?;
    let atoms = doc
        .atoms
        .iter()
        .map(|(name, value, payload)| Atom::new(name.as_str(), value.as_str(), payload.clone()))
        .collect::<Result<Vec<_>, _>>()?;
    let tables = Tables {
        markups,
        atoms,
        cards: doc.cards.clone(),
    };

    let sections = doc
        .sections
        .iter()
        .enumerate()
        .map(|(i, raw)| parse_section(i, raw, &tables))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        target: "folio::editor",
        version = %doc.version,
        sections = sections.len(),
        "parsed portable document"
    );
    Ok(Post::from_sections(sections))
}

#[derive(Default)]
struct Writer {
    markups: Vec<Markup>,
    atoms: Vec<(String, String, Value)>,
    cards: Vec<(String, Value)>,
}

impl Writer {
    fn markup_index(&mut self, markup: &Markup) -> usize {
        match self.markups.iter().position(|m| m == markup) {
            Some(i) => i,
            None => {
                self.markups.push(markup.clone());
                self.markups.len() - 1
            }
        }
    }

    /// Encode one run of leaves, computing the open/close stack so that
    /// markups shared by neighbouring leaves stay open across them.
    fn markers(&mut self, inlines: &Inlines) -> Value {
        let leaves = inlines.leaves();
        let mut stack: Vec<Markup> = Vec::new();
        let mut out = Vec::with_capacity(leaves.len());

        for (i, leaf) in leaves.iter().enumerate() {
            let mut opens = Vec::new();
            for markup in leaf.markups() {
                if !stack.contains(markup) {
                    opens.push(self.markup_index(markup));
                    stack.push(markup.clone());
                }
            }

            let next: &[Markup] = leaves.get(i + 1).map(Leaf::markups).unwrap_or(&[]);
            let keep = stack.iter().take_while(|m| next.contains(m)).count();
            let closed = stack.len() - keep;
            stack.truncate(keep);

            let value = match leaf {
                Leaf::Marker(m) => json!([TEXT_MARKER, opens, closed, m.text()]),
                Leaf::Atom(a) => {
                    self.atoms.push((
                        a.name().to_string(),
                        a.value().to_string(),
                        a.payload().clone(),
                    ));
                    json!([ATOM_MARKER, opens, closed, self.atoms.len() - 1])
                }
            };
            out.push(value);
        }
        Value::Array(out)
    }

    fn section(&mut self, section: &Section) -> Value {
        match section {
            Section::Markup(s) => json!([MARKUP_SECTION, s.tag(), self.markers(s.content())]),
            Section::Image(i) => json!([IMAGE_SECTION, i.src()]),
            Section::List(l) => {
                let items: Vec<Value> = l.items().iter().map(|it| self.markers(it.content())).collect();
                json!([LIST_SECTION, l.tag(), items])
            }
            Section::Card(c) => {
                self.cards.push((c.name().to_string(), c.payload().clone()));
                json!([CARD_SECTION, self.cards.len() - 1])
            }
        }
    }
}

fn encode_markup(markup: &Markup) -> Value {
    if markup.attributes().is_empty() {
        json!([markup.tag()])
    } else {
        let flat: Vec<&str> = markup
            .attributes()
            .iter()
            .flat_map(|(k, v)| [k.as_str(), v.as_str()])
            .collect();
        json!([markup.tag(), flat])
    }
}

/// Encode a post at [`VERSION`].
pub fn serialize(post: &Post) -> PortableDoc {
    let mut writer = Writer::default();
    let sections = post.sections().iter().map(|s| writer.section(s)).collect();
    PortableDoc {
        version: VERSION.to_string(),
        atoms: writer.atoms,
        cards: writer.cards,
        markups: writer.markups.iter().map(encode_markup).collect(),
        sections,
    }
}
