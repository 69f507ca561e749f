//! Error types for allowlist construction.

use thiserror::Error;

/// Errors raised while building or loading an [`crate::Allowlist`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PolicyError {
    /// An import namespace prefix did not end with `/`.
    ///
    /// Prefixes are matched with a plain `starts_with`, so a prefix that
    /// does not terminate at a path boundary would also admit lookalike
    /// package names (`@remotion-evil/...`).
    #[error("import prefix '{prefix}' must end with '/'")]
    InvalidImportPrefix {
        /// The offending prefix entry.
        prefix: String,
    },

    /// A blocked member pair entry was missing its object or property.
    #[error("blocked member pair '{entry}' must name both an object and a property")]
    InvalidMemberPair {
        /// The offending entry in `object.property` form.
        entry: String,
    },
}

impl PolicyError {
    /// Creates an invalid-prefix error.
    #[must_use]
    pub fn invalid_import_prefix(prefix: impl Into<String>) -> Self {
        Self::InvalidImportPrefix {
            prefix: prefix.into(),
        }
    }

    /// Creates an invalid member pair error.
    #[must_use]
    pub fn invalid_member_pair(entry: impl Into<String>) -> Self {
        Self::InvalidMemberPair {
            entry: entry.into(),
        }
    }
}
