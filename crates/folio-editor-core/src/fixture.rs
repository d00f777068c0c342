//! Compact text notation for building posts with a range, for tests and
//! demos.
//!
//! One line per block:
//!
//! - `|` marks a caret, `<` and `>` the anchor and focus of a selection
//! - `*` toggles bold and `_` toggles italic for the text that follows
//! - `{name}` is an atom named `name`, displayed as `@name`
//! - a line reading `[name]` is a card section
//! - `- ` and `1. ` prefixes make unordered and ordered list items;
//!   neighbouring items of the same kind share one list
//!
//! ```
//! use folio_editor_core::fixture::build_from_text;
//!
//! let (post, range) = build_from_text("*abc*12|3\n[image]").unwrap();
//! assert_eq!(post.text(), "abc123");
//! assert!(range.unwrap().is_collapsed());
//! ```

use serde_json::Value;

use crate::error::ValidationError;
use crate::model::{Leaf, Post, PostBuilder, atom, marker};
use crate::range::Range;

#[derive(Debug, Default)]
struct Marks {
    caret: Option<(usize, usize)>,
    anchor: Option<(usize, usize)>,
    focus: Option<(usize, usize)>,
}

impl Marks {
    fn record(&mut self, mark: char, block: usize, offset: usize) {
        let at = Some((block, offset));
        match mark {
            '|' => self.caret = at,
            '<' => self.anchor = at,
            '>' => self.focus = at,
            _ => {}
        }
    }

    fn into_range(self, post: &Post) -> Option<Range> {
        let blocks = post.blocks();
        let position = |(block, offset): (usize, usize)| {
            let id = blocks.get(block)?.id();
            post.position_at(id, offset)
        };
        match (self.anchor, self.focus, self.caret) {
            (Some(anchor), Some(focus), _) => Some(post.range(position(anchor)?, position(focus)?)),
            (Some(at), None, _) | (None, Some(at), _) | (None, None, Some(at)) => {
                position(at).map(Range::collapsed)
            }
            (None, None, None) => None,
        }
    }
}

fn is_mark(c: char) -> bool {
    matches!(c, '|' | '<' | '>')
}

/// Inline content of one line.
fn parse_inline(source: &str, block: usize, marks: &mut Marks) -> Result<Vec<Leaf>, ValidationError> {
    let mut leaves = Vec::new();
    let mut buffer = String::new();
    let mut tags: Vec<&str> = Vec::new();
    let mut offset = 0;
    let mut chars = source.chars();

    let flush = |buffer: &mut String, tags: &[&str], leaves: &mut Vec<Leaf>| -> Result<(), ValidationError> {
        if !buffer.is_empty() {
            leaves.push(marker(buffer.as_str(), tags)?);
            buffer.clear();
        }
        Ok(())
    };

    while let Some(c) = chars.next() {
        match c {
            c if is_mark(c) => marks.record(c, block, offset),
            '*' | '_' => {
                flush(&mut buffer, tags.as_slice(), &mut leaves)?;
                let tag = if c == '*' { "b" } else { "i" };
                match tags.iter().position(|t| *t == tag) {
                    Some(i) => {
                        tags.remove(i);
                    }
                    None => tags.push(tag),
                }
            }
            '{' => {
                flush(&mut buffer, tags.as_slice(), &mut leaves)?;
                let name: String = chars.by_ref().take_while(|c| *c != '}').collect();
                leaves.push(atom(name.as_str(), format!("@{name}"), Value::Null)?);
                offset += 1;
            }
            c => {
                buffer.push(c);
                offset += 1;
            }
        }
    }
    flush(&mut buffer, tags.as_slice(), &mut leaves)?;
    Ok(leaves)
}

/// Card name if the line is a card, recording marks on either side.
fn parse_card(source: &str, block: usize, marks: &mut Marks) -> Option<String> {
    let leading: String = source.chars().take_while(|c| is_mark(*c)).collect();
    let rest = &source[leading.len()..];
    let trailing_len = rest.chars().rev().take_while(|c| is_mark(*c)).count();
    let body = &rest[..rest.len() - trailing_len];
    let name = body.strip_prefix('[')?.strip_suffix(']')?;
    if name.is_empty() || name.contains(['[', ']']) {
        return None;
    }
    for c in leading.chars() {
        marks.record(c, block, 0);
    }
    for c in rest[rest.len() - trailing_len..].chars() {
        marks.record(c, block, 1);
    }
    Some(name.to_string())
}

/// Build a post from one notation string per block.
pub fn build_from_sections(lines: &[&str]) -> Result<(Post, Option<Range>), ValidationError> {
    let mut builder = PostBuilder::new();
    let mut list: Option<(&'static str, Vec<Vec<Leaf>>)> = None;
    let mut marks = Marks::default();

    for (block, line) in lines.iter().enumerate() {
        let (list_tag, body) = if let Some(rest) = line.strip_prefix("- ") {
            (Some("ul"), rest)
        } else if let Some(rest) = line.strip_prefix("1. ") {
            (Some("ol"), rest)
        } else {
            (None, *line)
        };

        if list.as_ref().is_some_and(|(tag, _)| Some(*tag) != list_tag) {
            if let Some((tag, items)) = list.take() {
                builder = builder.list(tag, items);
            }
        }

        match list_tag {
            Some(tag) => {
                let leaves = parse_inline(body, block, &mut marks)?;
                list.get_or_insert_with(|| (tag, Vec::new())).1.push(leaves);
            }
            None => match parse_card(body, block, &mut marks) {
                Some(name) => builder = builder.card(&name, Value::Null),
                None => builder = builder.paragraph(parse_inline(body, block, &mut marks)?),
            },
        }
    }
    if let Some((tag, items)) = list.take() {
        builder = builder.list(tag, items);
    }

    let post = builder.build()?;
    let range = marks.into_range(&post);
    Ok((post, range))
}

/// Build a post from newline-separated notation.
pub fn build_from_text(source: &str) -> Result<(Post, Option<Range>), ValidationError> {
    let lines: Vec<&str> = source.split('\n').collect();
    build_from_sections(&lines)
}
