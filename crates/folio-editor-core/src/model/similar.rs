//! Structural similarity.
//!
//! Two posts are similar when they read the same and carry the same markups,
//! regardless of node ids, empty markers, or how runs with equal markup
//! stacks happen to be split.

use serde::Serialize;
use serde_json::Value;

use super::leaf::{Inlines, Leaf};
use super::markup::Markup;
use super::post::Post;
use super::section::Section;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InlineShape {
    Text {
        text: String,
        markups: Vec<String>,
    },
    Atom {
        name: String,
        value: String,
        payload: Value,
        markups: Vec<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SectionShape {
    Markup {
        tag: String,
        content: Vec<InlineShape>,
    },
    List {
        tag: String,
        items: Vec<Vec<InlineShape>>,
    },
    Card {
        name: String,
        payload: Value,
    },
    Image {
        src: String,
    },
}

/// Canonical, id-free description of a post.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PostShape {
    pub sections: Vec<SectionShape>,
}

fn markup_key(markup: &Markup) -> String {
    let mut key = markup.tag().to_string();
    for (k, v) in markup.attributes() {
        key.push_str(&format!(" {k}={v}"));
    }
    key
}

fn markup_keys(markups: &[Markup]) -> Vec<String> {
    let mut keys: Vec<String> = markups.iter().map(markup_key).collect();
    keys.sort();
    keys
}

fn inline_shapes(inlines: &Inlines) -> Vec<InlineShape> {
    let mut out: Vec<InlineShape> = Vec::new();
    for leaf in inlines.leaves() {
        match leaf {
            Leaf::Marker(m) => {
                if m.is_empty() {
                    continue;
                }
                let markups = markup_keys(m.markups());
                if let Some(InlineShape::Text {
                    text,
                    markups: prev,
                }) = out.last_mut()
                {
                    if *prev == markups {
                        text.push_str(m.text());
                        continue;
                    }
                }
                out.push(InlineShape::Text {
                    text: m.text().to_string(),
                    markups,
                });
            }
            Leaf::Atom(a) => out.push(InlineShape::Atom {
                name: a.name().to_string(),
                value: a.value().to_string(),
                payload: a.payload().clone(),
                markups: markup_keys(a.markups()),
            }),
        }
    }
    out
}

pub fn shape(post: &Post) -> PostShape {
    let sections = post
        .sections()
        .iter()
        .map(|section| match section {
            Section::Markup(s) => SectionShape::Markup {
                tag: s.tag().to_string(),
                content: inline_shapes(s.content()),
            },
            Section::List(l) => SectionShape::List {
                tag: l.tag().to_string(),
                items: l.items().iter().map(|i| inline_shapes(i.content())).collect(),
            },
            Section::Card(c) => SectionShape::Card {
                name: c.name().to_string(),
                payload: c.payload().clone(),
            },
            Section::Image(i) => SectionShape::Image {
                src: i.src().to_string(),
            },
        })
        .collect();
    PostShape { sections }
}

/// Whether two posts are structurally similar.
pub fn similar(a: &Post, b: &Post) -> bool {
    shape(a) == shape(b)
}
