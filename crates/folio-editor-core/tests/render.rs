//! Render lifecycle as seen from the surface: view reuse, embeddable
//! callbacks and handles, card modes, teardown.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use folio_editor_core::model::text;
use folio_editor_core::{
    CardMode, Editor, EditorBuilder, EmbedEnv, EmbedHandle, Embeddable, MemorySurface, PostBuilder,
    Range, UndoManager, ViewId, ViewTree,
};
use insta::assert_snapshot;
use serde_json::{Value, json};

/// Card showing a counter, recording its handles and teardowns.
#[derive(Default, Clone)]
struct Counter {
    handles: Rc<RefCell<Vec<EmbedHandle>>>,
    torn_down: Rc<Cell<usize>>,
}

impl Counter {
    fn last_handle(&self) -> EmbedHandle {
        self.handles.borrow().last().cloned().unwrap()
    }
}

impl Embeddable for Counter {
    fn name(&self) -> &str {
        "counter"
    }

    fn render(&self, payload: &Value, env: &mut EmbedEnv<'_>) -> ViewId {
        self.handles.borrow_mut().push(env.handle());
        let count = payload.get("count").and_then(Value::as_u64).unwrap_or(0);
        let view = env.view();
        let el = view.create_element("figure");
        let label = view.create_text(&format!("count {count}"));
        view.append_child(el, label);
        el
    }

    fn edit(&self, _payload: &Value, env: &mut EmbedEnv<'_>) -> Option<ViewId> {
        self.handles.borrow_mut().push(env.handle());
        Some(env.view().create_element("form"))
    }

    fn teardown(&self, _view: ViewId, _tree: &mut dyn ViewTree) {
        self.torn_down.set(self.torn_down.get() + 1);
    }
}

fn counter_editor(counter: &Counter) -> Editor<MemorySurface> {
    let post = PostBuilder::new()
        .paragraph(vec![text("a")])
        .paragraph(vec![text("b")])
        .card("counter", json!({"count": 0}))
        .paragraph(vec![text("c")])
        .build()
        .unwrap();
    let mut editor: Editor<MemorySurface> = EditorBuilder::new()
        .card(counter.clone())
        .post(post)
        .build()
        .unwrap();
    editor.attach(MemorySurface::new()).unwrap();
    editor
}

fn html(editor: &Editor<MemorySurface>) -> String {
    editor.surface().unwrap().inner_html()
}

#[test]
fn test_registered_card_renders_between_placeholders() {
    let counter = Counter::default();
    let editor = counter_editor(&counter);
    assert_snapshot!(
        html(&editor),
        @r#"<p>a</p><p>b</p><div class="__folio-card" data-card="counter">&zwnj;<figure contenteditable="false">count 0</figure>&zwnj;</div><p>c</p>"#
    );
    assert_eq!(counter.handles.borrow().len(), 1);
}

#[test]
fn test_saving_payload_rebuilds_card_and_is_undoable() {
    let counter = Counter::default();
    let mut editor = counter_editor(&counter);
    let untouched = editor.renderer().nodes()[0].element();

    counter.last_handle().save(json!({"count": 1}));
    assert!(editor.renderer().registry().has_pending_requests());
    assert_eq!(editor.process_embed_requests(), 1);
    assert!(!editor.renderer().registry().has_pending_requests());

    let card = editor.post().sections()[2].as_card().unwrap();
    assert_eq!(card.payload(), &json!({"count": 1}));
    assert!(html(&editor).contains("count 1"));
    assert_eq!(counter.torn_down.get(), 1);
    assert_eq!(editor.renderer().nodes()[0].element(), untouched);

    assert!(editor.undo());
    assert!(html(&editor).contains("count 0"));
    assert_eq!(editor.process_embed_requests(), 0);
}

#[test]
fn test_edit_mode_rebuilds_only_the_card() {
    let counter = Counter::default();
    let mut editor = counter_editor(&counter);
    let paragraphs = [0, 1, 3].map(|i| editor.renderer().nodes()[i].element());
    let card_id = editor.post().sections()[2].id();

    counter.last_handle().edit();
    assert_eq!(editor.process_embed_requests(), 1);

    assert_eq!(editor.renderer().card_mode(card_id), CardMode::Edit);
    assert!(html(&editor).contains(r#"<form contenteditable="false"></form>"#));
    let after = [0, 1, 3].map(|i| editor.renderer().nodes()[i].element());
    assert_eq!(after, paragraphs);
    assert_eq!(counter.torn_down.get(), 1);
    assert!(!editor.can_undo());

    counter.last_handle().display();
    assert_eq!(editor.process_embed_requests(), 1);
    assert_eq!(editor.renderer().card_mode(card_id), CardMode::Display);
    assert!(html(&editor).contains("count 0"));
}

#[test]
fn test_set_card_mode_reuses_neighbours() {
    let counter = Counter::default();
    let mut editor = counter_editor(&counter);
    let before = editor.renderer().nodes()[1].element();
    let after = editor.renderer().nodes()[3].element();
    let card_id = editor.post().sections()[2].id();

    assert!(editor.set_card_mode(card_id, CardMode::Edit));

    assert_eq!(editor.renderer().nodes()[1].element(), before);
    assert_eq!(editor.renderer().nodes()[3].element(), after);
    assert_eq!(counter.torn_down.get(), 1);
    assert_snapshot!(
        html(&editor),
        @r#"<p>a</p><p>b</p><div class="__folio-card" data-card="counter">&zwnj;<form contenteditable="false"></form>&zwnj;</div><p>c</p>"#
    );
}

#[test]
fn test_removing_card_tears_it_down_once() {
    let counter = Counter::default();
    let mut editor = counter_editor(&counter);

    counter.last_handle().remove();
    assert_eq!(editor.process_embed_requests(), 1);

    assert_eq!(counter.torn_down.get(), 1);
    assert_eq!(editor.post().sections().len(), 3);
    assert_snapshot!(html(&editor), @"<p>a</p><p>b</p><p>c</p>");
}

#[test]
fn test_detach_tears_down_everything() {
    let counter = Counter::default();
    let mut editor = counter_editor(&counter);
    let surface = editor.detach().unwrap();

    assert_eq!(counter.torn_down.get(), 1);
    assert_eq!(surface.live_node_count(), 1);
    assert_eq!(surface.inner_html(), "");

    editor.attach(surface).unwrap();
    assert_eq!(counter.handles.borrow().len(), 2);
    assert!(html(&editor).contains("count 0"));
}

#[test]
fn test_unknown_card_uses_unknown_handler() {
    struct Fallback;

    impl Embeddable for Fallback {
        fn name(&self) -> &str {
            "fallback"
        }

        fn render(&self, _payload: &Value, env: &mut EmbedEnv<'_>) -> ViewId {
            let name = env.name().to_string();
            let view = env.view();
            let el = view.create_element("aside");
            view.set_attribute(el, "data-missing", &name);
            el
        }
    }

    let post = PostBuilder::new()
        .card("poll", Value::Null)
        .build()
        .unwrap();
    let mut editor: Editor<MemorySurface> = EditorBuilder::new()
        .unknown_handler(Fallback)
        .post(post)
        .build()
        .unwrap();
    editor.attach(MemorySurface::new()).unwrap();
    assert_snapshot!(
        html(&editor),
        @r#"<div class="__folio-card" data-card="poll">&zwnj;<aside data-missing="poll" contenteditable="false"></aside>&zwnj;</div>"#
    );
}

#[test]
fn test_typing_reuses_other_blocks() {
    let counter = Counter::default();
    let mut editor = counter_editor(&counter);
    let first = editor.renderer().nodes()[0].element();
    let last = editor.renderer().nodes()[3].element();

    let end = editor.post().end_position();
    editor.set_range(Range::collapsed(end));
    assert!(editor.insert_text_at_cursor("d"));

    assert_snapshot!(
        html(&editor),
        @r#"<p>a</p><p>b</p><div class="__folio-card" data-card="counter">&zwnj;<figure contenteditable="false">count 0</figure>&zwnj;</div><p>cd</p>"#
    );
    assert_eq!(editor.renderer().nodes()[0].element(), first);
    assert_ne!(editor.renderer().nodes()[3].element(), last);
    assert_eq!(counter.torn_down.get(), 0);
    assert_eq!(counter.handles.borrow().len(), 1);
}

#[test]
fn test_typing_next_to_card_keeps_it_live() {
    let counter = Counter::default();
    let mut editor = counter_editor(&counter);
    let card = editor.renderer().nodes()[2].element();

    let end = editor.post().end_position();
    editor.set_range(Range::collapsed(end));
    for c in ["x", "y", "z"] {
        assert!(editor.insert_text_at_cursor(c));
    }
    let b = editor.post().sections()[1].id();
    let after_b = editor.post().position_at(b, 1).unwrap();
    editor.set_range(Range::collapsed(after_b));
    assert!(editor.insert_text_at_cursor("!"));

    assert_eq!(editor.post().text(), "a\nb!\ncxyz");
    assert_eq!(editor.renderer().nodes()[2].element(), card);
    assert_eq!(counter.handles.borrow().len(), 1);
    assert_eq!(counter.torn_down.get(), 0);
}

#[test]
fn test_break_next_to_card_rebuilds_it() {
    let counter = Counter::default();
    let mut editor = counter_editor(&counter);
    let first = editor.renderer().nodes()[0].element();

    let b = editor.post().sections()[1].id();
    let after_b = editor.post().position_at(b, 1).unwrap();
    editor.set_range(Range::collapsed(after_b));
    assert!(editor.insert_new_line());

    assert_eq!(editor.post().sections().len(), 5);
    assert_eq!(counter.torn_down.get(), 1);
    assert_eq!(editor.renderer().nodes()[0].element(), first);
}
