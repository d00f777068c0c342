//! An attached editor driven the way a host drives it: native selection in,
//! input helpers, surface observed through its HTML dump.

use std::cell::Cell;
use std::rc::Rc;

use folio_editor_core::fixture::build_from_text;
use folio_editor_core::model::similar;
use folio_editor_core::{
    Direction, Editor, EditorBuilder, EditorConfig, EditorError, MemorySurface, PortableDoc, Post,
    Range, SelectionSync, UndoManager, ViewTree,
};
use insta::assert_snapshot;

fn attached(source: &str) -> Editor<MemorySurface> {
    let (post, range) = build_from_text(source).unwrap();
    let mut editor = Editor::with_post(post);
    editor.attach(MemorySurface::new()).unwrap();
    if let Some(range) = range {
        editor.set_range(range);
    }
    editor
}

fn html(editor: &Editor<MemorySurface>) -> String {
    editor.surface().unwrap().inner_html()
}

#[test]
fn test_typing_into_empty_post() {
    let mut editor: Editor<MemorySurface> = Editor::with_post(Post::new());
    editor.attach(MemorySurface::new()).unwrap();
    assert_snapshot!(html(&editor), @"<p><br></p>");

    let start = editor.post().start_position();
    editor.set_range(Range::collapsed(start));
    assert!(editor.insert_text_at_cursor("X"));
    assert!(editor.insert_text_at_cursor("Y"));

    assert_eq!(editor.post().text(), "XY");
    assert_eq!(editor.post().sections().len(), 1);
    assert_snapshot!(html(&editor), @"<p>XY</p>");
}

#[test]
fn test_toggle_bold_across_nested_runs() {
    let mut editor = attached("*abc*<123>*def*");
    assert_snapshot!(html(&editor), @"<p><b>abc</b>123<b>def</b></p>");

    assert!(editor.toggle_markup("b").unwrap());
    assert_snapshot!(html(&editor), @"<p><b>abc123def</b></p>");
    let selected = editor.surface().unwrap().selected_text();
    assert_eq!(selected.as_deref(), Some("123"));

    assert!(editor.toggle_markup("b").unwrap());
    assert_snapshot!(html(&editor), @"<p><b>abc</b>123<b>def</b></p>");
    let selected = editor.surface().unwrap().selected_text();
    assert_eq!(selected.as_deref(), Some("123"));
}

#[test]
fn test_line_break_splits_section() {
    let mut editor = attached("hi|hey");
    assert!(editor.insert_new_line());
    assert_snapshot!(html(&editor), @"<p>hi</p><p>hey</p>");

    let range = editor.range().unwrap();
    let second = editor.post().sections()[1].id();
    assert!(range.is_collapsed());
    assert_eq!(editor.post().resolve(&range.head()), Some((second, 0)));
}

#[test]
fn test_newline_in_typed_text_breaks() {
    let mut editor = attached("a|");
    assert!(editor.insert_text_at_cursor("b\nc"));
    assert_eq!(editor.post().sections().len(), 2);
    assert_snapshot!(html(&editor), @"<p>ab</p><p>c</p>");
}

#[test]
fn test_tab_is_plain_text() {
    let mut editor = attached("a|b");
    assert!(editor.insert_text_at_cursor("\t"));
    assert_eq!(editor.post().text(), "a\tb");
    assert_eq!(editor.post().sections().len(), 1);
}

#[test]
fn test_select_all_then_type_replaces_everything() {
    let mut editor = attached("abc\ndef");
    editor.surface_mut().unwrap().select_all();
    assert!(editor.insert_text_at_cursor("z"));
    assert_eq!(editor.post().text(), "z");
    assert_eq!(editor.post().sections().len(), 1);
    assert_snapshot!(html(&editor), @"<p>z</p>");
}

#[test]
fn test_input_without_selection_is_ignored() {
    let mut editor = attached("ab|");
    editor.surface_mut().unwrap().clear_selection();

    assert!(!editor.insert_text_at_cursor("x"));
    assert!(!editor.insert_new_line());
    assert!(!editor.delete_at_cursor(Direction::Backward));
    assert!(!editor.toggle_markup("b").unwrap());
    assert_eq!(editor.post().text(), "ab");
    assert!(!editor.has_cursor());
    assert!(!editor.can_undo());
}

#[test]
fn test_native_caret_is_read_before_input() {
    let mut editor = attached("abc|");
    let surface = editor.surface_mut().unwrap();
    let node = surface.find_text("abc").unwrap();
    surface.set_caret(node, 1);
    assert!(editor.insert_text_at_cursor("X"));
    assert_eq!(editor.post().text(), "aXbc");
}

#[test]
fn test_typing_at_card_boundary_is_blocked() {
    let mut editor = attached("[image]|");
    let before = html(&editor);
    let card = editor.renderer().nodes()[0].element();

    assert!(editor.insert_text_at_cursor("x"));

    assert_eq!(editor.post().sections().len(), 1);
    assert!(editor.post().sections()[0].as_card().is_some());
    assert_eq!(html(&editor), before);
    assert_eq!(editor.renderer().nodes()[0].element(), card);
    assert!(!editor.can_undo());
}

#[test]
fn test_typing_on_either_card_placeholder_is_blocked() {
    let mut editor = attached("|[image]");
    let before = html(&editor);
    let opaque = editor.renderer().nodes()[0].opaque().unwrap();
    let (head, tail) = (opaque.head(), opaque.tail());

    for (node, offset) in [(head, 0), (head, 1), (tail, 0), (tail, 1)] {
        editor.surface_mut().unwrap().set_caret(node, offset);
        assert!(editor.insert_text_at_cursor("X"));
        assert_eq!(html(&editor), before);
    }
    assert!(!editor.can_undo());
}

#[test]
fn test_backspace_after_card_steps_onto_then_removes_it() {
    let mut editor = attached("ab\n[image]\n|cd");

    assert!(editor.delete_at_cursor(Direction::Backward));
    assert_eq!(editor.post().sections().len(), 3);
    let card = editor.post().sections()[1].id();
    let caret = editor.range().unwrap().head();
    assert_eq!(editor.post().resolve(&caret), Some((card, 1)));
    assert!(!editor.can_undo());

    assert!(editor.delete_at_cursor(Direction::Backward));
    assert_eq!(editor.post().sections().len(), 2);
    assert_snapshot!(html(&editor), @"<p>ab</p><p>cd</p>");
    let first = editor.post().sections()[0].id();
    let caret = editor.range().unwrap().head();
    assert_eq!(editor.post().resolve(&caret), Some((first, 2)));

    assert!(editor.undo());
    assert_eq!(editor.post().sections().len(), 3);
    assert!(editor.post().sections()[1].as_card().is_some());
}

#[test]
fn test_forward_delete_before_card_steps_onto_then_removes_it() {
    let mut editor = attached("ab|\n[image]\ncd");

    assert!(editor.delete_at_cursor(Direction::Forward));
    assert_eq!(editor.post().sections().len(), 3);
    let card = editor.post().sections()[1].id();
    let caret = editor.range().unwrap().head();
    assert_eq!(editor.post().resolve(&caret), Some((card, 0)));

    assert!(editor.delete_at_cursor(Direction::Forward));
    assert_eq!(editor.post().sections().len(), 2);
    assert_snapshot!(html(&editor), @"<p>ab</p><p>cd</p>");
    let last = editor.post().sections()[1].id();
    let caret = editor.range().unwrap().head();
    assert_eq!(editor.post().resolve(&caret), Some((last, 0)));
}

#[test]
fn test_deleting_lone_card_leaves_empty_paragraph() {
    let mut editor = attached("[image]|");
    assert!(editor.delete_at_cursor(Direction::Backward));
    assert_eq!(editor.post().sections().len(), 1);
    assert!(editor.post().sections()[0].as_markup().is_some());
    assert_snapshot!(html(&editor), @"<p><br></p>");
}

#[test]
fn test_before_break_hook_can_cancel() {
    let mut editor = attached("ab|cd");
    let seen = Rc::new(Cell::new(0));
    let counter = Rc::clone(&seen);
    editor.on_before_break(move |event| {
        counter.set(counter.get() + 1);
        assert_eq!(event.position().offset(), 2);
        event.prevent_default();
    });

    assert!(!editor.insert_new_line());
    assert_eq!(seen.get(), 1);
    assert_eq!(editor.post().sections().len(), 1);
    assert!(!editor.can_undo());

    // Typed newlines go through the same hook.
    assert!(editor.insert_text_at_cursor("\n"));
    assert_eq!(seen.get(), 2);
    assert_eq!(editor.post().text(), "abcd");
}

#[test]
fn test_editing_toggle_and_placeholder() {
    let config = EditorConfig {
        placeholder: "Write something".into(),
        ..EditorConfig::default()
    };
    let mut editor: Editor<MemorySurface> = EditorBuilder::new().config(config).build().unwrap();
    editor.attach(MemorySurface::new()).unwrap();
    let root = editor.surface().unwrap().root();
    let attribute = |editor: &Editor<MemorySurface>, name: &str| {
        editor.surface().unwrap().attribute(root, name)
    };

    assert_eq!(attribute(&editor, "contenteditable").as_deref(), Some("true"));
    assert_eq!(
        attribute(&editor, "data-placeholder").as_deref(),
        Some("Write something")
    );
    assert!(editor.is_placeholder_visible());

    let start = editor.post().start_position();
    editor.set_range(Range::collapsed(start));
    assert!(editor.insert_text_at_cursor("a"));
    assert!(!editor.is_placeholder_visible());
    assert_eq!(attribute(&editor, "data-placeholder"), None);

    editor.disable_editing();
    assert_eq!(attribute(&editor, "contenteditable").as_deref(), Some("false"));
    assert!(!editor.insert_text_at_cursor("b"));
    assert_eq!(editor.post().text(), "a");

    editor.enable_editing();
    assert_eq!(attribute(&editor, "contenteditable").as_deref(), Some("true"));
    assert!(editor.insert_text_at_cursor("b"));
    assert_eq!(editor.post().text(), "ab");
}

#[test]
fn test_disabled_before_attach_leaves_surface_inert() {
    let config = EditorConfig {
        editable: false,
        placeholder: "Write something".into(),
        ..EditorConfig::default()
    };
    let mut editor: Editor<MemorySurface> = EditorBuilder::new().config(config).build().unwrap();
    editor.attach(MemorySurface::new()).unwrap();
    let surface = editor.surface().unwrap();
    assert_eq!(surface.attribute(surface.root(), "contenteditable"), None);
    assert_eq!(surface.attribute(surface.root(), "data-placeholder"), None);
    assert!(!editor.is_placeholder_visible());
}

#[test]
fn test_autofocus_places_caret_at_start() {
    let config = EditorConfig {
        autofocus: true,
        ..EditorConfig::default()
    };
    let (post, _) = build_from_text("abc\ndef").unwrap();
    let mut editor: Editor<MemorySurface> = EditorBuilder::new()
        .config(config)
        .post(post)
        .build()
        .unwrap();
    editor.attach(MemorySurface::new()).unwrap();

    assert!(editor.surface().unwrap().is_focused());
    let range = editor.range().unwrap();
    assert_eq!(range.head(), editor.post().start_position());
    assert!(editor.surface().unwrap().selection().is_some());
}

#[test]
fn test_external_text_change_is_repaired() {
    let mut editor = attached("abc|\ndef");
    let surface = editor.surface_mut().unwrap();
    let node = surface.find_text("def").unwrap();
    surface.external_set_text(node, "dXf");

    assert_eq!(editor.handle_external_mutations(), 1);
    assert_snapshot!(html(&editor), @"<p>abc</p><p>def</p>");
    assert!(!editor.surface().unwrap().contains(node));
    assert_eq!(editor.handle_external_mutations(), 0);
}

#[test]
fn test_externally_removed_block_is_rebuilt() {
    let mut editor = attached("abc|\ndef");
    let first = editor.renderer().nodes()[0].element();
    editor.surface_mut().unwrap().external_remove(first);
    assert_snapshot!(html(&editor), @"<p>def</p>");

    assert_eq!(editor.handle_external_mutations(), 1);
    assert_snapshot!(html(&editor), @"<p>abc</p><p>def</p>");
    assert_ne!(editor.renderer().nodes()[0].element(), first);
}

#[test]
fn test_initial_content_is_loaded() {
    let (post, _) = build_from_text("*hi* there\n[image]\n- one").unwrap();
    let config = EditorConfig {
        initial_content: Some(PortableDoc::from_post(&post)),
        ..EditorConfig::default()
    };
    let editor: Editor<MemorySurface> = EditorBuilder::new().config(config).build().unwrap();
    assert!(similar(editor.post(), &post));
    assert!(similar(&editor.serialize().to_post().unwrap(), &post));
}

#[test]
fn test_unsupported_initial_content_fails_build() {
    let config = EditorConfig {
        initial_content: Some(PortableDoc {
            version: "9.9.9".into(),
            ..PortableDoc::default()
        }),
        ..EditorConfig::default()
    };
    let result = EditorBuilder::new().config(config).build::<MemorySurface>();
    assert!(matches!(result, Err(EditorError::Parse(_))));
}
