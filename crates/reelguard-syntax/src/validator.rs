//! Allowlist-driven static validation of generated source.
//!
//! The validator parses the markup dialect and walks every node of the
//! resulting tree, collecting a violation for each construct the policy
//! does not clear. Operating on node shape rather than source text means
//! whitespace or comment obfuscation cannot slip anything past the checks.
//!
//! Violations are reported with a single generic message. Which rule fired
//! is intentionally not exposed: specific messages would let an adversary
//! map the blocklist one probe at a time.

use reelguard_policy::Allowlist;

use crate::dialect::SourceDialect;
use crate::parser::{ParseResult, Parser};
use crate::position::point_to_location;

/// Message used for every policy violation, regardless of the rule.
pub const UNSAFE_PATTERN_MESSAGE: &str = "code contains unsafe patterns";

/// Message used when the source does not parse.
pub const SYNTAX_ERROR_MESSAGE: &str = "code contains syntax errors";

/// Callees rejected at the call site even though the identifier rule
/// already covers them. The call-site check produces a more specific
/// location and stands on its own if the identifier rule is ever relaxed.
const FORBIDDEN_CALLEES: &[&str] = &["require", "eval", "Function"];

/// A single validation finding with its source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// One-based line number.
    pub line: u32,
    /// Zero-based column number.
    pub column: u32,
    /// Stable, generic description. Never names the rule that fired.
    pub message: String,
}

impl ValidationError {
    fn at(node: tree_sitter::Node<'_>, message: &str) -> Self {
        let (line, column) = point_to_location(node.start_position());
        Self {
            line,
            column,
            message: message.to_owned(),
        }
    }
}

/// Outcome of validating one source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the source may proceed to lowering.
    pub valid: bool,
    /// Every violation found, in traversal order. Empty iff `valid`.
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    fn syntax_failure(line: u32, column: u32) -> Self {
        Self::from_errors(vec![ValidationError {
            line,
            column,
            message: SYNTAX_ERROR_MESSAGE.to_owned(),
        }])
    }
}

/// Validates markup-dialect source against the capability allowlist.
///
/// Pure function of its inputs: parses the source, then depth-first walks
/// every child of every node, collecting all violations rather than
/// stopping at the first. A source that fails to parse yields a single
/// syntax-error finding at the first error location (line 1, column 0 when
/// no location is recoverable).
///
/// Rejection is a normal outcome communicated as data; this function does
/// not fail on bad input.
#[must_use]
pub fn validate(source: &str, policy: &Allowlist) -> ValidationResult {
    let parsed = match Parser::new(SourceDialect::Markup).and_then(|mut p| p.parse(source)) {
        Ok(parsed) => parsed,
        // Parser infrastructure failure: fail closed as a syntax error.
        Err(_) => return ValidationResult::syntax_failure(1, 0),
    };

    if parsed.has_errors() {
        let (line, column) = parsed.first_error_location().unwrap_or((1, 0));
        return ValidationResult::syntax_failure(line, column);
    }

    let mut errors = Vec::new();
    walk(parsed.root_node(), &parsed, policy, &mut errors);
    ValidationResult::from_errors(errors)
}

/// Generic depth-first traversal over every child of every node.
///
/// Children are enumerated through the tree cursor rather than a fixed set
/// of known fields, so syntax forms added by grammar updates are still
/// visited instead of silently skipped.
fn walk(
    node: tree_sitter::Node<'_>,
    parsed: &ParseResult,
    policy: &Allowlist,
    errors: &mut Vec<ValidationError>,
) {
    check_node(node, parsed, policy, errors);

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, parsed, policy, errors);
    }
}

fn check_node(
    node: tree_sitter::Node<'_>,
    parsed: &ParseResult,
    policy: &Allowlist,
    errors: &mut Vec<ValidationError>,
) {
    match node.kind() {
        "import_statement" => check_import(node, parsed, policy, errors),
        "call_expression" => check_call(node, parsed, errors),
        "identifier" => {
            if policy.is_identifier_blocked(parsed.node_text(node)) {
                errors.push(ValidationError::at(node, UNSAFE_PATTERN_MESSAGE));
            }
        }
        "member_expression" => check_member(node, parsed, policy, errors),
        "new_expression" => check_new(node, parsed, policy, errors),
        _ => {}
    }
}

fn check_import(
    node: tree_sitter::Node<'_>,
    parsed: &ParseResult,
    policy: &Allowlist,
    errors: &mut Vec<ValidationError>,
) {
    let source = node
        .child_by_field_name("source")
        .map(|string_node| string_literal_text(string_node, parsed))
        .unwrap_or_default();

    if !policy.is_import_allowed(&source) {
        errors.push(ValidationError::at(node, UNSAFE_PATTERN_MESSAGE));
    }
}

fn check_call(
    node: tree_sitter::Node<'_>,
    parsed: &ParseResult,
    errors: &mut Vec<ValidationError>,
) {
    let Some(callee) = node.child_by_field_name("function") else {
        return;
    };

    // Dynamic imports are rejected unconditionally: static analysis cannot
    // prove what they would load, so no allowlist exception exists.
    if callee.kind() == "import" {
        errors.push(ValidationError::at(node, UNSAFE_PATTERN_MESSAGE));
        return;
    }

    if callee.kind() == "identifier" && FORBIDDEN_CALLEES.contains(&parsed.node_text(callee)) {
        errors.push(ValidationError::at(node, UNSAFE_PATTERN_MESSAGE));
    }
}

fn check_member(
    node: tree_sitter::Node<'_>,
    parsed: &ParseResult,
    policy: &Allowlist,
    errors: &mut Vec<ValidationError>,
) {
    let Some(object) = node.child_by_field_name("object") else {
        return;
    };
    if object.kind() != "identifier" {
        return;
    }
    let object_name = parsed.node_text(object);

    // Any property access on a blocked object is rejected outright.
    if policy.is_identifier_blocked(object_name) {
        errors.push(ValidationError::at(node, UNSAFE_PATTERN_MESSAGE));
        return;
    }

    // Pair entries catch prototype-chain escapes from permitted globals.
    let property_name = node
        .child_by_field_name("property")
        .map(|property| parsed.node_text(property))
        .unwrap_or_default();
    if policy.is_member_pair_blocked(object_name, property_name) {
        errors.push(ValidationError::at(node, UNSAFE_PATTERN_MESSAGE));
    }
}

fn check_new(
    node: tree_sitter::Node<'_>,
    parsed: &ParseResult,
    policy: &Allowlist,
    errors: &mut Vec<ValidationError>,
) {
    let Some(constructor) = node.child_by_field_name("constructor") else {
        return;
    };
    if constructor.kind() != "identifier" {
        return;
    }

    let name = parsed.node_text(constructor);
    if name == "Function" || policy.is_identifier_blocked(name) {
        errors.push(ValidationError::at(node, UNSAFE_PATTERN_MESSAGE));
    }
}

/// Extracts the content of a string literal node, without its quotes.
fn string_literal_text(string_node: tree_sitter::Node<'_>, parsed: &ParseResult) -> String {
    let mut cursor = string_node.walk();
    string_node
        .named_children(&mut cursor)
        .filter(|child| child.kind() == "string_fragment")
        .map(|child| parsed.node_text(child))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn run(source: &str) -> ValidationResult {
        validate(source, Allowlist::standard())
    }

    #[test]
    fn valid_composition_passes() {
        let result = run(concat!(
            "import { AbsoluteFill, useCurrentFrame } from 'remotion';\n",
            "const MyComposition = () => {\n",
            "  const frame = useCurrentFrame();\n",
            "  return <AbsoluteFill style={{ opacity: frame / 30 }} />;\n",
            "};\n",
        ));
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn valid_flag_always_mirrors_error_list() {
        for source in ["const a = 1;", "fetch('x')", "const b = <div>"] {
            let result = run(source);
            assert_eq!(result.valid, result.errors.is_empty());
        }
    }

    #[test]
    fn validation_is_idempotent() {
        let source = "window.location.href = 'x';";
        assert_eq!(run(source), run(source));
    }

    #[rstest]
    #[case("eval('1')")]
    #[case("const f = Function;")]
    #[case("require('fs')")]
    #[case("document.title")]
    #[case("window.location")]
    #[case("process.env.SECRET")]
    #[case("globalThis.fetch")]
    #[case("setTimeout(() => {}, 0)")]
    #[case("fetch('https://evil.example')")]
    fn blocked_identifiers_are_rejected(#[case] source: &str) {
        let result = run(source);
        assert!(!result.valid, "{source} should be rejected");
    }

    #[test]
    fn blocked_identifier_is_rejected_even_as_shadowed_local() {
        // Deliberately conservative: a local named `eval` is still rejected.
        let result = run("const eval = 1; const x = eval + 1;");
        assert!(!result.valid);
    }

    #[rstest]
    #[case("import x from 'left-pad';")]
    #[case("import { writeFile } from 'fs';")]
    #[case("import evil from 'remotion-evil';")]
    fn disallowed_imports_are_rejected(#[case] source: &str) {
        assert!(!run(source).valid);
    }

    #[rstest]
    #[case("import { AbsoluteFill } from 'remotion';")]
    #[case("import { Gif } from '@remotion/gif';")]
    #[case("import { useState } from 'react';")]
    fn allowed_imports_pass(#[case] source: &str) {
        assert!(run(source).valid);
    }

    #[rstest]
    #[case("import('remotion')")]
    #[case("const m = import('left-pad');")]
    fn dynamic_imports_are_always_rejected(#[case] source: &str) {
        // No allowlist exception applies, even for permitted specifiers.
        assert!(!run(source).valid);
    }

    #[rstest]
    #[case("Object.constructor")]
    #[case("Function.prototype")]
    #[case("Math.constructor")]
    #[case("Object.getPrototypeOf(x)")]
    fn blocked_member_pairs_are_rejected(#[case] source: &str) {
        assert!(!run(source).valid);
    }

    #[rstest]
    #[case("Math.random()")]
    #[case("Math.floor(1.5)")]
    #[case("Object.keys(props)")]
    fn permitted_member_accesses_pass(#[case] source: &str) {
        assert!(run(source).valid);
    }

    #[rstest]
    #[case("new Function('return 1')")]
    #[case("new WebSocket('wss://evil.example')")]
    #[case("new Worker('w.js')")]
    fn blocked_constructors_are_rejected(#[case] source: &str) {
        assert!(!run(source).valid);
    }

    #[test]
    fn obfuscated_calls_are_still_caught() {
        // Node-shape checks are immune to whitespace and comment games.
        let result = run("eval /* harmless? */ \n ('1')");
        assert!(!result.valid);
    }

    #[test]
    fn all_violations_are_collected_not_just_the_first() {
        let result = run("fetch('a');\ndocument.title;\neval('b');");
        assert!(!result.valid);
        assert!(result.errors.len() >= 3);
    }

    #[test]
    fn violation_messages_are_generic_and_uniform() {
        let result = run("fetch('a');\nObject.constructor;");
        assert!(
            result
                .errors
                .iter()
                .all(|e| e.message == UNSAFE_PATTERN_MESSAGE)
        );
    }

    #[test]
    fn syntax_error_reports_single_generic_error_with_location() {
        let result = run("const C = () => <AbsoluteFill>");
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        let error = result.errors.first().expect("error");
        assert_eq!(error.message, SYNTAX_ERROR_MESSAGE);
        assert!(error.line >= 1);
    }

    #[test]
    fn error_locations_use_one_based_lines() {
        let result = run("const a = 1;\nfetch('x');");
        let error = result.errors.first().expect("error");
        assert_eq!(error.line, 2);
        assert_eq!(error.column, 0);
    }
}
