//! IQL error taxonomy
//!
//! Every variant renders into a single message that names the offending IQL
//! fragment. The retry loop feeds these messages back to the language model.

use iql_registry::SimilarityError;
use pest::iterators::Pair;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::grammar::Rule;

/// Byte range of a fragment plus its 1-based line/column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

/// Offending IQL fragment as it appeared in the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub text: String,
    pub span: Span,
}

impl Snippet {
    /// Spans come from the normalized text; the text is cut from the original,
    /// which has identical byte offsets.
    pub(crate) fn of(pair: &Pair<'_, Rule>, source: &str) -> Self {
        let span = pair.as_span();
        let (line, column) = span.start_pos().line_col();
        let text = source
            .get(span.start()..span.end())
            .unwrap_or_else(|| span.as_str())
            .to_string();
        Self {
            text,
            span: Span {
                start: span.start(),
                end: span.end(),
                line,
                column,
            },
        }
    }
}

impl fmt::Display for Snippet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` (line {}, column {})",
            self.text, self.span.line, self.span.column
        )
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IqlError {
    // Structural
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
        text: String,
    },

    #[error("Empty IQL: no statement found")]
    NoStatement { text: String },

    #[error("Multiple statements in IQL are not supported: {}", list_snippets(.statements))]
    MultipleStatements { statements: Vec<Snippet> },

    #[error("Not a valid IQL expression: {snippet}")]
    NoExpression { snippet: Snippet },

    // Grammar
    #[error("{kind} syntax is not supported {context}: {snippet}")]
    UnsupportedSyntax {
        kind: String,
        context: String,
        snippet: Snippet,
    },

    // Resolution
    #[error("Function {name} does not exist: {snippet}")]
    FunctionNotExists { name: String, snippet: Snippet },

    #[error("Function {name} takes {expected} argument(s) but {actual} were given: {snippet}")]
    IncorrectNumberArguments {
        name: String,
        expected: usize,
        actual: usize,
        snippet: Snippet,
    },

    #[error("Not a valid IQL argument: {snippet}")]
    ArgumentParsing { snippet: Snippet },

    #[error("Context is not allowed as argument {parameter}: {snippet}")]
    ContextNotAllowed { parameter: String, snippet: Snippet },

    #[error("Context {alias} not found: {snippet}")]
    ContextNotFound { alias: String, snippet: Snippet },

    // Validation
    #[error("{snippet} is not a valid value for argument {parameter} of type {expected}: {reason}")]
    ArgumentValidation {
        parameter: String,
        expected: String,
        reason: String,
        snippet: Snippet,
    },
}

fn list_snippets(statements: &[Snippet]) -> String {
    statements
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl IqlError {
    /// Fragment the error points at, when it points at one
    pub fn snippet(&self) -> Option<&Snippet> {
        match self {
            IqlError::Syntax { .. } | IqlError::NoStatement { .. } => None,
            IqlError::MultipleStatements { statements } => statements.first(),
            IqlError::NoExpression { snippet }
            | IqlError::UnsupportedSyntax { snippet, .. }
            | IqlError::FunctionNotExists { snippet, .. }
            | IqlError::IncorrectNumberArguments { snippet, .. }
            | IqlError::ArgumentParsing { snippet }
            | IqlError::ContextNotAllowed { snippet, .. }
            | IqlError::ContextNotFound { snippet, .. }
            | IqlError::ArgumentValidation { snippet, .. } => Some(snippet),
        }
    }
}

/// Failure of one parse attempt
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Iql(#[from] IqlError),

    /// The similarity store failed; not an IQL problem and not retried
    #[error(transparent)]
    Similarity(#[from] SimilarityError),
}
