use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use sktemplate::parser::ParseError;
use thiserror::Error;

/// Failure reported by a function implementation.
#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("{0}")]
    Failed(String),
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },
    #[error("function was cancelled")]
    Cancelled,
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl FunctionError {
    pub fn failed(message: impl Into<String>) -> Self {
        FunctionError::Failed(message.into())
    }
}

/// Why a template could not be rendered. No partial output accompanies an
/// error.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template syntax error: {}", join_messages(.0))]
    Syntax(Vec<ParseError>),

    #[error("function '{name}' not found")]
    FunctionNotFound { name: String, span: Range<usize> },

    #[error("function '{name}' failed: {source}")]
    FunctionExecution {
        name: String,
        span: Range<usize>,
        #[source]
        source: FunctionError,
    },

    #[error(
        "function '{name}' does not take any arguments but it is being called in the template with {count} arguments"
    )]
    NoParameters {
        name: String,
        count: usize,
        span: Range<usize>,
    },

    #[error(
        "ambiguity found as a named parameter '{parameter}' cannot be set for the first parameter of '{name}' when there is also a positional value"
    )]
    AmbiguousArgument {
        name: String,
        parameter: String,
        span: Range<usize>,
    },

    #[error("rendering was cancelled while calling '{name}'")]
    Cancelled { name: String, span: Range<usize> },

    #[error("prompt template format '{0}' is not supported")]
    UnsupportedFormat(String),
}

impl RenderError {
    /// Source span of the block that failed, when known.
    pub fn span(&self) -> Option<&Range<usize>> {
        match self {
            RenderError::Syntax(errors) => errors.first().map(|e| &e.span),
            RenderError::FunctionNotFound { span, .. }
            | RenderError::FunctionExecution { span, .. }
            | RenderError::NoParameters { span, .. }
            | RenderError::AmbiguousArgument { span, .. }
            | RenderError::Cancelled { span, .. } => Some(span),
            RenderError::UnsupportedFormat(_) => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            RenderError::Cancelled { .. }
                | RenderError::FunctionExecution {
                    source: FunctionError::Cancelled,
                    ..
                }
        )
    }

    /// Diagnostics for display with codespan-reporting.
    pub fn to_diagnostics(&self, file_id: usize) -> Vec<Diagnostic<usize>> {
        match self {
            RenderError::Syntax(errors) => errors.iter().map(ParseError::to_diagnostic).collect(),
            other => {
                let mut diagnostic = Diagnostic::error().with_message(other.to_string());
                if let Some(span) = other.span() {
                    diagnostic = diagnostic.with_labels(vec![Label::primary(file_id, span.clone())]);
                }
                vec![diagnostic]
            }
        }
    }
}

fn join_messages(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
