//! Tree-sitter parsing wrapper with error recovery.
//!
//! Wraps the raw Tree-sitter parser behind a dialect-aware interface and
//! provides structured access to parse results and syntax error locations.
//! Tree-sitter is error-tolerant, so a parse result may contain both a
//! usable tree and error nodes.

use crate::dialect::SourceDialect;
use crate::error::SyntaxError;
use crate::position::point_to_location;

/// Result of parsing source code.
#[derive(Debug)]
pub struct ParseResult {
    tree: tree_sitter::Tree,
    source: String,
    dialect: SourceDialect,
}

impl ParseResult {
    /// Returns the parsed syntax tree.
    #[must_use]
    pub const fn tree(&self) -> &tree_sitter::Tree {
        &self.tree
    }

    /// Returns the source code that was parsed.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the dialect the source was parsed as.
    #[must_use]
    pub const fn dialect(&self) -> SourceDialect {
        self.dialect
    }

    /// Returns the root node of the syntax tree.
    #[must_use]
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// Returns whether the tree contains any ERROR or MISSING nodes.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Returns the location of the first syntax error, when one exists.
    ///
    /// The location is a one-based line and zero-based column.
    #[must_use]
    pub fn first_error_location(&self) -> Option<(u32, u32)> {
        first_error_node(self.tree.root_node()).map(|node| point_to_location(node.start_position()))
    }

    /// Returns the text of a node within this parse result's source.
    #[must_use]
    pub fn node_text(&self, node: tree_sitter::Node<'_>) -> &str {
        self.source.get(node.byte_range()).unwrap_or_default()
    }
}

/// Tree-sitter parser wrapper for a single dialect.
pub struct Parser {
    inner: tree_sitter::Parser,
    dialect: SourceDialect,
}

impl Parser {
    /// Creates a new parser for the given dialect.
    ///
    /// # Errors
    ///
    /// Returns an error if the Tree-sitter parser cannot be initialised
    /// with the dialect's grammar.
    pub fn new(dialect: SourceDialect) -> Result<Self, SyntaxError> {
        let mut inner = tree_sitter::Parser::new();
        inner
            .set_language(&dialect.tree_sitter_language())
            .map_err(|e| SyntaxError::parser_init(dialect, e.to_string()))?;

        Ok(Self { inner, dialect })
    }

    /// Returns the dialect this parser is configured for.
    #[must_use]
    pub const fn dialect(&self) -> SourceDialect {
        self.dialect
    }

    /// Parses source code and returns the result.
    ///
    /// Tree-sitter is error-tolerant, so this returns a parse result even
    /// when the source contains syntax errors. Use
    /// [`ParseResult::has_errors`] to check.
    ///
    /// # Errors
    ///
    /// Returns an error if the parser fails to produce a tree at all. This
    /// is rare and indicates a parser configuration issue rather than bad
    /// input.
    pub fn parse(&mut self, source: &str) -> Result<ParseResult, SyntaxError> {
        let tree = self
            .inner
            .parse(source, None)
            .ok_or_else(|| SyntaxError::parse(self.dialect, "parsing failed"))?;

        Ok(ParseResult {
            tree,
            source: source.to_owned(),
            dialect: self.dialect,
        })
    }
}

/// Depth-first search for the first ERROR or MISSING node.
fn first_error_node(node: tree_sitter::Node<'_>) -> Option<tree_sitter::Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }

    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error_node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SourceDialect::Markup, "const C = () => <div>hi</div>;")]
    #[case(SourceDialect::Markup, "const n: number = 1;")]
    #[case(SourceDialect::Plain, "const f = (a, b) => a + b;")]
    fn parser_parses_valid_source(#[case] dialect: SourceDialect, #[case] source: &str) {
        let mut parser = Parser::new(dialect).expect("parser init");
        let result = parser.parse(source).expect("parse");

        assert!(!result.has_errors());
        assert_eq!(result.dialect(), dialect);
    }

    #[rstest]
    #[case(SourceDialect::Markup, "const C = () => <div>")]
    #[case(SourceDialect::Plain, "function broken( {")]
    fn parser_detects_syntax_errors(#[case] dialect: SourceDialect, #[case] source: &str) {
        let mut parser = Parser::new(dialect).expect("parser init");
        let result = parser.parse(source).expect("parse");

        assert!(result.has_errors());
        assert!(result.first_error_location().is_some());
    }

    #[test]
    fn error_location_is_one_based_line_zero_based_column() {
        let mut parser = Parser::new(SourceDialect::Plain).expect("parser init");
        let result = parser.parse("const a = 1;\nconst b = ;").expect("parse");

        let (line, _column) = result.first_error_location().expect("location");
        assert_eq!(line, 2);
    }
}
