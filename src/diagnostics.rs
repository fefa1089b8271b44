use std::fmt;

use thiserror::Error;

/// Represents a byte span within a script source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn to(self, other: SourceSpan) -> Self {
        Self {
            start: self.start,
            end: other.end,
        }
    }
}

/// Classification of a diagnostic event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexer,
    Parser,
    Runtime,
}

/// Message plus source context for syntax and runtime failures.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<SourceSpan>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Runtime, message)
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    /// Attaches a span only if none was recorded closer to the failure.
    pub fn or_span(mut self, span: SourceSpan) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Diagnostic {}

/// Discriminant of [`ScriptError`], handy for matching without payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Assignment,
    Deletion,
    Syntax,
    Runtime,
    Io,
    Json,
}

/// Unified error type for the engine and its tooling.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Reserved word or name collision detected while constructing an engine.
    #[error("{0}")]
    Configuration(String),
    /// A write was rejected by the resolver.
    #[error("{0}")]
    Assignment(String),
    /// A delete was rejected by the resolver.
    #[error("{0}")]
    Deletion(String),
    #[error("{0}")]
    Syntax(Diagnostic),
    #[error("{0}")]
    Runtime(Diagnostic),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScriptError {
    /// Convenience for host functions reporting a failure.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(Diagnostic::runtime(message))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Assignment(_) => ErrorKind::Assignment,
            Self::Deletion(_) => ErrorKind::Deletion,
            Self::Syntax(_) => ErrorKind::Syntax,
            Self::Runtime(_) => ErrorKind::Runtime,
            Self::Io(_) => ErrorKind::Io,
            Self::Json(_) => ErrorKind::Json,
        }
    }

    /// The bare message, without kind prefix or span.
    pub fn message(&self) -> String {
        match self {
            Self::Configuration(message) | Self::Assignment(message) | Self::Deletion(message) => {
                message.clone()
            }
            Self::Syntax(diag) | Self::Runtime(diag) => diag.message.clone(),
            Self::Io(err) => err.to_string(),
            Self::Json(err) => err.to_string(),
        }
    }

    pub fn span(&self) -> Option<SourceSpan> {
        match self {
            Self::Syntax(diag) | Self::Runtime(diag) => diag.span,
            _ => None,
        }
    }

    /// Removes a generic `Error: ` prefix from runtime messages.
    pub(crate) fn strip_generic_prefix(self) -> Self {
        match self {
            Self::Runtime(mut diag) => {
                if let Some(rest) = diag.message.strip_prefix("Error: ") {
                    diag.message = rest.to_string();
                }
                Self::Runtime(diag)
            }
            other => other,
        }
    }
}

impl From<Diagnostic> for ScriptError {
    fn from(diag: Diagnostic) -> Self {
        match diag.kind {
            DiagnosticKind::Lexer | DiagnosticKind::Parser => Self::Syntax(diag),
            DiagnosticKind::Runtime => Self::Runtime(diag),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScriptError>;
