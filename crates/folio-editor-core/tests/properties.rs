//! Properties over arbitrary posts.

use folio_editor_core::model::{Leaf, atom, marker, similar};
use folio_editor_core::range::{from_live_selection, to_live_selection};
use folio_editor_core::{
    Direction, Editor, EmbedRegistry, MemorySurface, PortableDoc, Post, PostBuilder, Range,
    Renderer,
};
use proptest::prelude::*;
use serde_json::json;

#[derive(Clone, Debug)]
enum InlineGen {
    Text(String, Vec<&'static str>),
    Atom(String),
}

#[derive(Clone, Debug)]
enum SectionGen {
    Paragraph(Vec<InlineGen>),
    List(&'static str, Vec<Vec<InlineGen>>),
    Card(String),
}

fn inline() -> impl Strategy<Value = InlineGen> {
    prop_oneof![
        4 => (
            "[a-z]{1,6}",
            prop::sample::subsequence(vec!["em", "code", "u"], 0..=2),
        )
            .prop_map(|(text, tags)| InlineGen::Text(text, tags)),
        1 => "[a-z]{1,4}".prop_map(InlineGen::Atom),
    ]
}

fn inlines() -> impl Strategy<Value = Vec<InlineGen>> {
    prop::collection::vec(inline(), 0..5)
}

fn section() -> impl Strategy<Value = SectionGen> {
    prop_oneof![
        4 => inlines().prop_map(SectionGen::Paragraph),
        1 => (
            prop::sample::select(vec!["ul", "ol"]),
            prop::collection::vec(inlines(), 1..4),
        )
            .prop_map(|(tag, items)| SectionGen::List(tag, items)),
        1 => "[a-z]{1,6}".prop_map(SectionGen::Card),
    ]
}

fn leaves(gens: &[InlineGen]) -> Vec<Leaf> {
    gens
        .iter()
        .map(|genr| match genr {
            InlineGen::Text(text, tags) => marker(text.as_str(), tags).unwrap(),
            InlineGen::Atom(name) => {
                atom(name.as_str(), format!("@{name}"), json!({"id": name})).unwrap()
            }
        })
        .collect()
}

fn build(gens: &[SectionGen]) -> Post {
    let mut builder = PostBuilder::new();
    for genr in gens {
        builder = match genr {
            SectionGen::Paragraph(content) => builder.paragraph(leaves(content)),
            SectionGen::List(tag, items) => {
                builder.list(tag, items.iter().map(|item| leaves(item)).collect())
            }
            SectionGen::Card(name) => builder.card(name, json!({"name": name})),
        };
    }
    builder.build().unwrap()
}

fn arb_post() -> impl Strategy<Value = Post> {
    prop::collection::vec(section(), 1..5).prop_map(|gens| build(&gens))
}

/// Paragraph-only posts, with a block index and offset seed.
fn arb_paragraphs() -> impl Strategy<Value = (Post, usize, usize)> {
    (
        prop::collection::vec(inlines().prop_map(SectionGen::Paragraph), 1..4),
        any::<usize>(),
        any::<usize>(),
    )
        .prop_map(|(gens, block, offset)| (build(&gens), block, offset))
}

proptest! {
    #[test]
    fn test_interchange_round_trip(post in arb_post()) {
        let doc = PortableDoc::from_post(&post);
        let json = doc.to_json().unwrap();
        let parsed = PortableDoc::from_json(&json).unwrap().to_post().unwrap();
        prop_assert!(similar(&parsed, &post));
    }

    #[test]
    fn test_toggle_twice_restores_post(
        post in arb_post(),
        a in any::<(usize, usize)>(),
        b in any::<(usize, usize)>(),
    ) {
        let blocks: Vec<_> = post.blocks().iter().map(|blk| (blk.id(), blk.len())).collect();
        let at = |(block, offset): (usize, usize)| {
            let (id, len) = blocks[block % blocks.len()];
            post.position_at(id, offset % (len + 1)).unwrap()
        };
        let range = post.range(at(a), at(b));
        let before = post.clone();

        let mut editor: Editor<MemorySurface> = Editor::with_post(post);
        editor.set_range(range);
        prop_assert!(editor.toggle_markup("b").unwrap());
        prop_assert!(editor.toggle_markup("b").unwrap());
        prop_assert!(similar(editor.post(), &before));
    }

    #[test]
    fn test_break_then_backspace_restores_post((post, block, offset) in arb_paragraphs()) {
        let blocks: Vec<_> = post.blocks().iter().map(|blk| (blk.id(), blk.len())).collect();
        let (id, len) = blocks[block % blocks.len()];
        let caret = post.position_at(id, offset % (len + 1)).unwrap();
        let before = post.clone();

        let mut editor: Editor<MemorySurface> = Editor::with_post(post);
        editor.set_range(Range::collapsed(caret));
        prop_assert!(editor.insert_new_line());
        prop_assert_eq!(editor.post().sections().len(), before.sections().len() + 1);
        prop_assert!(editor.delete_at_cursor(Direction::Backward));
        prop_assert!(similar(editor.post(), &before));
    }

    #[test]
    fn test_every_position_survives_live_selection(post in arb_post()) {
        let mut renderer = Renderer::new(EmbedRegistry::new());
        let mut surface = MemorySurface::new();
        renderer.attach(&mut surface, &post);

        for block in post.blocks() {
            for offset in 0..=block.len() {
                let position = post.position_at(block.id(), offset).unwrap();
                let range = Range::collapsed(position);
                let live = to_live_selection(&post, &renderer, &range).unwrap();
                let back = from_live_selection(&post, &renderer, &surface, live).unwrap();
                prop_assert_eq!(back, range);
                prop_assert_eq!(post.resolve(&back.head()), Some((block.id(), offset)));
            }
        }
    }

    #[test]
    fn test_every_range_survives_live_selection(
        post in arb_post(),
        pairs in prop::collection::vec(any::<(usize, usize)>(), 1..24),
    ) {
        let mut renderer = Renderer::new(EmbedRegistry::new());
        let mut surface = MemorySurface::new();
        renderer.attach(&mut surface, &post);

        let points: Vec<_> = post
            .blocks()
            .iter()
            .flat_map(|block| (0..=block.len()).map(move |offset| (block.id(), offset)))
            .collect();
        for (a, f) in pairs {
            let anchor = points[a % points.len()];
            let focus = points[f % points.len()];
            let range = post.range(
                post.position_at(anchor.0, anchor.1).unwrap(),
                post.position_at(focus.0, focus.1).unwrap(),
            );
            let live = to_live_selection(&post, &renderer, &range).unwrap();
            let back = from_live_selection(&post, &renderer, &surface, live).unwrap();
            prop_assert_eq!(back, range);
            prop_assert_eq!(back.direction(), range.direction());
            prop_assert_eq!(post.resolve(&back.anchor()), Some(anchor));
            prop_assert_eq!(post.resolve(&back.focus()), Some(focus));
        }
    }
}
