//! Editor configuration.

use serde::{Deserialize, Serialize};

use crate::edit::EditKind;
use crate::interchange::PortableDoc;

/// Data side of an editor's configuration. Embeddables and hooks are code
/// and go through [`EditorBuilder`](crate::editor::EditorBuilder) instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Whether the surface accepts input once attached.
    pub editable: bool,
    /// Focus the surface and place the caret at the start on attach.
    pub autofocus: bool,
    /// Shown while the post is blank and editing is enabled.
    pub placeholder: String,
    pub history: HistoryPolicy,
    /// Document to load instead of an empty post.
    pub initial_content: Option<PortableDoc>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            editable: true,
            autofocus: false,
            placeholder: String::new(),
            history: HistoryPolicy::default(),
            initial_content: None,
        }
    }
}

/// How many transactions the history keeps and which ones it merges.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryPolicy {
    /// Oldest entries are dropped past this depth. Zero disables history.
    pub max_depth: usize,
    /// Consecutive transactions of a coalescing kind within this many
    /// milliseconds of each other share one entry. `None` never merges.
    pub coalesce_window_ms: Option<u64>,
    pub coalesce_kinds: Vec<EditKind>,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self {
            max_depth: 100,
            coalesce_window_ms: Some(1000),
            coalesce_kinds: vec![EditKind::InsertText],
        }
    }
}

impl HistoryPolicy {
    /// One entry per transaction.
    pub fn without_coalescing() -> Self {
        Self {
            coalesce_window_ms: None,
            ..Self::default()
        }
    }
}
