//! Static validation and lowering for the markup-embedded animation dialect.
//!
//! Generated compositions arrive as TSX-style source. This crate provides
//! the two static stages of the pipeline:
//!
//! - **Validation** via [`validate`]: parse the source and walk every node,
//!   rejecting any construct the capability allowlist does not clear.
//!   Violations are reported with positions but deliberately generic
//!   messages.
//! - **Lowering** via [`lower`]: erase the static types and imports and
//!   rewrite the markup into explicit `createElement(...)` calls, producing
//!   the plain dialect the executor consumes.
//!
//! Lowering performs no policy checks of its own and must only be invoked
//! on source that validation has already accepted.

mod dialect;
mod error;
mod lower;
mod parser;
mod position;
mod validator;

pub use dialect::SourceDialect;
pub use error::SyntaxError;
pub use lower::{LowerError, lower};
pub use parser::{ParseResult, Parser};
pub use validator::{
    SYNTAX_ERROR_MESSAGE, UNSAFE_PATTERN_MESSAGE, ValidationError, ValidationResult, validate,
};
