use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use thiserror::Error;

/// Step code that does not parse. `span` is a byte range into the source
/// registered under `file_id`; for marker text that is the marker's payload.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (bytes {}..{})", span.start, span.end)]
pub struct ParseError {
    pub message: String,
    pub span: Range<usize>,
    pub file_id: usize,
    pub notes: Vec<String>,
}

impl ParseError {
    pub fn new(file_id: usize, span: Range<usize>, message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
            span,
            file_id,
            notes: Vec::new(),
        }
    }

    /// Attach a hint, e.g. the forms allowed where this one was found.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        Diagnostic::error()
            .with_message(&self.message)
            .with_labels(vec![Label::primary(self.file_id, self.span.clone())])
            .with_notes(self.notes.clone())
    }
}
