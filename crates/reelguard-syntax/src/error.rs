//! Error types for parsing infrastructure failures.
//!
//! These cover the parser itself misbehaving (grammar mismatch, no tree
//! produced). Rejections of user source are never represented here; those
//! are data carried by `ValidationResult` and `LowerError`.

use thiserror::Error;

use crate::dialect::SourceDialect;

/// Errors from the Tree-sitter parsing layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyntaxError {
    /// Failed to initialise the Tree-sitter parser for a dialect.
    #[error("failed to initialise parser for {dialect}: {message}")]
    ParserInitError {
        /// The dialect that failed to initialise.
        dialect: SourceDialect,
        /// Description of the failure.
        message: String,
    },

    /// The parser produced no tree at all.
    #[error("failed to parse {dialect}: {message}")]
    ParseError {
        /// The dialect being parsed.
        dialect: SourceDialect,
        /// Description of the failure.
        message: String,
    },
}

impl SyntaxError {
    /// Creates a parser initialisation error.
    #[must_use]
    pub fn parser_init(dialect: SourceDialect, message: impl Into<String>) -> Self {
        Self::ParserInitError {
            dialect,
            message: message.into(),
        }
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(dialect: SourceDialect, message: impl Into<String>) -> Self {
        Self::ParseError {
            dialect,
            message: message.into(),
        }
    }
}
