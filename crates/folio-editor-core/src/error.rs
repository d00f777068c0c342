//! Error types for the editing engine.
//!
//! Load-time failures (`ParseError`) and construction failures
//! (`ValidationError`) are ordinary `Result` errors. Invariant violations inside
//! a transaction are not represented here: they panic.

use miette::Diagnostic;
use smol_str::SmolStr;

use crate::platform::PlatformError;

/// Main error type for editor sessions.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum EditorError {
    /// Initial content could not be loaded.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    /// A node was built from invalid tag data.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    /// The live surface refused an operation.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// `attach` was called while a surface is already bound.
    #[error("editor is already attached to a surface")]
    #[diagnostic(
        code(folio::editor::already_attached),
        help("call `detach` before attaching to another surface")
    )]
    AlreadyAttached,

    /// A surface operation was requested with no surface bound.
    #[error("editor is not attached to a surface")]
    #[diagnostic(code(folio::editor::not_attached))]
    NotAttached,
}

/// Invalid tag data handed to a document-model constructor.
#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("invalid markup tag `{0}`")]
    #[diagnostic(
        code(folio::validation::markup_tag),
        help("markup tags are one of: a, b, code, em, i, s, strong, sub, sup, u")
    )]
    InvalidMarkupTag(SmolStr),

    #[error("invalid markup section tag `{0}`")]
    #[diagnostic(
        code(folio::validation::section_tag),
        help("section tags are one of: aside, blockquote, h1-h6, p, pull-quote")
    )]
    InvalidSectionTag(SmolStr),

    #[error("invalid list section tag `{0}`")]
    #[diagnostic(code(folio::validation::list_tag), help("list tags are `ul` or `ol`"))]
    InvalidListTag(SmolStr),

    #[error("embeddable name must not be empty")]
    #[diagnostic(code(folio::validation::embed_name))]
    EmptyEmbedName,
}

/// Failure to load an interchange document.
#[derive(thiserror::Error, Debug, Diagnostic)]
#[error("parse error: {kind}")]
#[diagnostic(code(folio::parse))]
pub struct ParseError {
    #[diagnostic_source]
    kind: ParseErrorKind,
    #[help]
    advice: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind) -> Self {
        Self { kind, advice: None }
    }

    pub fn with_advice(mut self, advice: impl Into<String>) -> Self {
        self.advice = Some(advice.into());
        self
    }

    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }
}

impl From<ParseErrorKind> for ParseError {
    fn from(kind: ParseErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ParseErrorKind::Json(err))
    }
}

impl From<ValidationError> for ParseError {
    fn from(err: ValidationError) -> Self {
        Self::new(ParseErrorKind::Validation(err))
    }
}

#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum ParseErrorKind {
    #[error(transparent)]
    Json(serde_json::Error),

    #[error("unsupported document version `{0}`")]
    UnsupportedVersion(String),

    #[error("section {section}: unknown section type {type_id}")]
    UnknownSectionType { section: usize, type_id: u64 },

    #[error("section {section}: {reason}")]
    MalformedSection { section: usize, reason: String },

    #[error("section {section}: markup index {index} is out of range")]
    MarkupIndex { section: usize, index: usize },

    #[error("section {section}: card index {index} is out of range")]
    CardIndex { section: usize, index: usize },

    #[error("section {section}: atom index {index} is out of range")]
    AtomIndex { section: usize, index: usize },

    #[error("section {section}: closes {closed} markups but only {open} are open")]
    UnbalancedMarkups {
        section: usize,
        closed: usize,
        open: usize,
    },

    #[error("malformed markup definition at index {0}")]
    MalformedMarkup(usize),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(ValidationError),
}
