//! Error type for compilation and execution.

use thiserror::Error;

/// Errors from compiling or running lowered source.
///
/// These are normal, expected outcomes communicated as data; the render
/// surface converts them into an in-frame fallback panel rather than
/// letting them abort the hosting process.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExecError {
    /// The lowered source did not parse. Should not occur for source that
    /// passed validation and lowering.
    #[error("lowered source contains syntax errors")]
    InvalidLoweredSource,

    /// The source uses a construct outside the executable dialect.
    #[error("unsupported syntax '{kind}' at line {line}")]
    UnsupportedSyntax {
        /// Node kind that could not be compiled.
        kind: String,
        /// One-based line number.
        line: u32,
    },

    /// No binding with the conventional entry name was defined.
    #[error("code must define a component named {expected}")]
    MissingComponent {
        /// The expected entry binding name.
        expected: &'static str,
    },

    /// The entry binding exists but is not callable.
    #[error("{expected} must be a function component")]
    NotAComponent {
        /// The expected entry binding name.
        expected: &'static str,
    },

    /// The per-frame execution budget ran out.
    #[error("execution budget exhausted")]
    BudgetExhausted,

    /// The interpreter call stack grew beyond its bound.
    #[error("call stack depth limit exceeded")]
    StackOverflow,

    /// Any other failure raised while evaluating the code.
    #[error("{message}")]
    Runtime {
        /// Description of the failure.
        message: String,
    },
}

impl ExecError {
    /// Creates a runtime failure.
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Creates an unsupported-syntax failure for a node.
    #[must_use]
    pub(crate) fn unsupported(node: tree_sitter::Node<'_>) -> Self {
        let line = u32::try_from(node.start_position().row.saturating_add(1)).unwrap_or(u32::MAX);
        Self::UnsupportedSyntax {
            kind: node.kind().to_owned(),
            line,
        }
    }
}
