//! Editor actions.
//!
//! Platform-agnostic definitions for editor operations. An `EditorAction`
//! names a semantic editing operation, decoupled from whatever key, menu or
//! toolbar triggered it. [`execute_action`] is the central dispatch point.

use smol_str::SmolStr;

use crate::editor::Editor;
use crate::history::UndoManager;
use crate::platform::Surface;
use crate::range::Direction;

/// All editor actions a host can dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    // === Text Insertion ===
    /// Insert text at the cursor (replacing any selected content).
    Insert { text: SmolStr },

    /// Break the current block (Enter).
    InsertParagraph,

    // === Deletion ===
    /// Delete content backward (Backspace).
    DeleteBackward,

    /// Delete content forward (Delete key).
    DeleteForward,

    // === History ===
    Undo,
    Redo,

    // === Formatting ===
    ToggleBold,
    ToggleItalic,
    ToggleCode,
    ToggleStrikethrough,
    /// Toggle any markup tag over the selection.
    ToggleMarkup { tag: SmolStr },

    // === Selection ===
    SelectAll,
}

impl EditorAction {
    /// Whether the action can change the post.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::SelectAll)
    }
}

/// Execute an action against an editor.
///
/// Returns true if the action was handled. Input without a cursor, a
/// cancelled line break, and undo/redo with nothing to apply all return false.
pub fn execute_action<S: Surface>(editor: &mut Editor<S>, action: &EditorAction) -> bool {
    match action {
        EditorAction::Insert { text } => editor.insert_text_at_cursor(text),
        EditorAction::InsertParagraph => editor.insert_new_line(),
        EditorAction::DeleteBackward => editor.delete_at_cursor(Direction::Backward),
        EditorAction::DeleteForward => editor.delete_at_cursor(Direction::Forward),
        EditorAction::Undo => editor.undo(),
        EditorAction::Redo => editor.redo(),
        EditorAction::ToggleBold => execute_toggle(editor, "strong"),
        EditorAction::ToggleItalic => execute_toggle(editor, "em"),
        EditorAction::ToggleCode => execute_toggle(editor, "code"),
        EditorAction::ToggleStrikethrough => execute_toggle(editor, "s"),
        EditorAction::ToggleMarkup { tag } => execute_toggle(editor, tag),
        EditorAction::SelectAll => {
            editor.select_all();
            true
        }
    }
}

fn execute_toggle<S: Surface>(editor: &mut Editor<S>, tag: &str) -> bool {
    match editor.toggle_markup(tag) {
        Ok(handled) => handled,
        Err(err) => {
            tracing::warn!(target: "folio::editor", %err, "ignoring toggle of invalid markup");
            false
        }
    }
}
