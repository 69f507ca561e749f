//! Source dialect selection and Tree-sitter grammar mapping.

use std::fmt;

/// The two dialects the pipeline parses.
///
/// Generated source arrives in the markup-embedded dialect; the transformer
/// lowers it to the plain dialect consumed by the executor. Each maps to a
/// Tree-sitter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceDialect {
    /// Markup-embedded, optionally typed source as produced by the model.
    #[default]
    Markup,
    /// The plain executable dialect produced by lowering.
    Plain,
}

impl SourceDialect {
    /// Returns the Tree-sitter grammar for this dialect.
    ///
    /// The markup dialect uses the TSX grammar so embedded elements parse
    /// correctly; the plain dialect uses the TypeScript grammar, which
    /// parses the lowered output without markup ambiguities.
    #[must_use]
    pub fn tree_sitter_language(self) -> tree_sitter::Language {
        match self {
            Self::Markup => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::Plain => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        }
    }

    /// Returns the lower-case identifier for this dialect.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Markup => "markup",
            Self::Plain => "plain",
        }
    }
}

impl fmt::Display for SourceDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialects_display_as_lowercase_names() {
        assert_eq!(SourceDialect::Markup.to_string(), "markup");
        assert_eq!(SourceDialect::Plain.to_string(), "plain");
    }
}
