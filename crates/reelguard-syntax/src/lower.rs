//! Lowering from the markup dialect to the plain executable dialect.
//!
//! The emitter walks the parsed tree and re-emits source text, splicing at
//! the byte ranges of the nodes it transforms and copying the gaps between
//! children verbatim so surrounding formatting survives. Three families of
//! nodes are rewritten:
//!
//! - markup elements become explicit `createElement(tag, props, ...children)`
//!   calls in the classic construction form, so the executor injects the
//!   construction function as a named capability rather than an implicit
//!   helper import;
//! - static-type syntax (annotations, casts, interfaces) is erased;
//! - import declarations are erased, since every validated import binds a
//!   name the executor already supplies. Aliased named imports are rebound
//!   with a `const` so the alias still resolves.
//!
//! Lowering performs no policy checks. It must only run on source the
//! validator has accepted.

use thiserror::Error;

use crate::dialect::SourceDialect;
use crate::parser::Parser;
use crate::position::point_to_location;

/// Error from a failed lowering.
///
/// The message is path-free and position-free; any best-effort line number
/// is carried separately.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("lowering failed: {message}")]
pub struct LowerError {
    message: String,
    line: Option<u32>,
}

impl LowerError {
    fn new(message: impl Into<String>, line: Option<u32>) -> Self {
        let (message, extracted) = clean_error_text(&message.into());
        Self {
            message,
            line: line.or(extracted),
        }
    }

    /// Returns the cleaned error description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the best-effort one-based line number, when known.
    #[must_use]
    pub const fn line(&self) -> Option<u32> {
        self.line
    }
}

/// Lowers validated markup-dialect source to the plain dialect.
///
/// # Errors
///
/// Returns an error if the source does not parse, or if the emitted output
/// fails to reparse in the plain dialect (an emitter bug, reported rather
/// than handed to the executor).
pub fn lower(source: &str) -> Result<String, LowerError> {
    let parsed = Parser::new(SourceDialect::Markup)
        .and_then(|mut p| p.parse(source))
        .map_err(|e| LowerError::new(e.to_string(), None))?;

    if parsed.has_errors() {
        let line = parsed.first_error_location().map(|(line, _)| line);
        return Err(LowerError::new("source contains syntax errors", line));
    }

    let emitter = Emitter { source };
    let mut out = String::with_capacity(source.len());
    emitter
        .emit_children(parsed.root_node(), &mut out, |_| false)
        .map_err(EmitError::into_lower_error)?;

    verify_plain(&out)?;
    Ok(out)
}

/// Reparses the lowered output to guard the executor's input contract.
fn verify_plain(lowered: &str) -> Result<(), LowerError> {
    let reparsed = Parser::new(SourceDialect::Plain)
        .and_then(|mut p| p.parse(lowered))
        .map_err(|e| LowerError::new(e.to_string(), None))?;

    if reparsed.has_errors() {
        let line = reparsed.first_error_location().map(|(line, _)| line);
        return Err(LowerError::new("lowered output failed to reparse", line));
    }
    Ok(())
}

#[derive(Debug)]
struct EmitError {
    message: String,
    point: Option<tree_sitter::Point>,
}

impl EmitError {
    fn at(node: tree_sitter::Node<'_>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            point: Some(node.start_position()),
        }
    }

    fn into_lower_error(self) -> LowerError {
        let line = self.point.map(|p| point_to_location(p).0);
        LowerError::new(self.message, line)
    }
}

struct Emitter<'a> {
    source: &'a str,
}

impl Emitter<'_> {
    fn text(&self, node: tree_sitter::Node<'_>) -> &str {
        self.source.get(node.byte_range()).unwrap_or_default()
    }

    fn emit(&self, node: tree_sitter::Node<'_>, out: &mut String) -> Result<(), EmitError> {
        match node.kind() {
            // Type syntax is erased wholesale.
            "type_annotation"
            | "type_arguments"
            | "type_parameters"
            | "interface_declaration"
            | "type_alias_declaration" => Ok(()),

            // Casts and non-null assertions keep only their expression.
            "as_expression" | "satisfies_expression" | "non_null_expression" => {
                match node.named_child(0) {
                    Some(inner) => self.emit(inner, out),
                    None => Ok(()),
                }
            }

            "import_statement" => self.emit_import(node, out),

            // `export` / `export default` markers are dropped; the bound
            // declaration itself is kept.
            "export_statement" => {
                self.emit_children(node, out, |c| matches!(c.kind(), "export" | "default"))
            }

            "optional_parameter" => self.emit_children(node, out, |c| c.kind() == "?"),

            "jsx_element" | "jsx_self_closing_element" | "jsx_fragment" => {
                let call = self.jsx_call(node)?;
                out.push_str(&call);
                Ok(())
            }

            _ if node.child_count() == 0 => {
                out.push_str(self.text(node));
                Ok(())
            }

            _ => self.emit_children(node, out, |_| false),
        }
    }

    /// Emits a node's children in order, copying the source gaps between
    /// them verbatim. `skip` drops a child while preserving the gaps.
    fn emit_children(
        &self,
        node: tree_sitter::Node<'_>,
        out: &mut String,
        skip: impl Fn(tree_sitter::Node<'_>) -> bool,
    ) -> Result<(), EmitError> {
        let mut pos = node.start_byte();
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();

        for child in children {
            if let Some(gap) = self.source.get(pos..child.start_byte()) {
                out.push_str(gap);
            }
            if !skip(child) {
                self.emit(child, out)?;
            }
            pos = child.end_byte();
        }
        if let Some(tail) = self.source.get(pos..node.end_byte()) {
            out.push_str(tail);
        }
        Ok(())
    }

    /// Erases an import declaration, rebinding aliased named imports.
    fn emit_import(
        &self,
        node: tree_sitter::Node<'_>,
        out: &mut String,
    ) -> Result<(), EmitError> {
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();

        // `import type` carries no runtime bindings at all.
        if children.iter().any(|c| c.kind() == "type") {
            return Ok(());
        }

        let Some(clause) = children.iter().find(|c| c.kind() == "import_clause") else {
            return Ok(());
        };

        let mut rebindings = Vec::new();
        let mut clause_cursor = clause.walk();
        for part in clause.named_children(&mut clause_cursor) {
            if part.kind() != "named_imports" {
                // Default and namespace imports erase with no rebinding;
                // an unresolved reference surfaces at execution time.
                continue;
            }
            let mut specs = part.walk();
            for spec in part.named_children(&mut specs) {
                if spec.kind() != "import_specifier" {
                    continue;
                }
                let Some(alias) = spec.child_by_field_name("alias") else {
                    continue;
                };
                let Some(name) = spec.child_by_field_name("name") else {
                    return Err(EmitError::at(spec, "import specifier has no name"));
                };
                rebindings.push(format!(
                    "const {} = {};",
                    self.text(alias),
                    self.text(name)
                ));
            }
        }

        out.push_str(&rebindings.join(" "));
        Ok(())
    }

    /// Rewrites a markup element into a `createElement(...)` call string.
    fn jsx_call(&self, node: tree_sitter::Node<'_>) -> Result<String, EmitError> {
        let (tag, props_owner, children) = match node.kind() {
            "jsx_self_closing_element" => {
                let tag = self.jsx_tag(node)?;
                (tag, Some(node), Vec::new())
            }
            "jsx_element" => {
                let Some(open) = node.child(0).filter(|c| c.kind() == "jsx_opening_element")
                else {
                    return Err(EmitError::at(node, "element has no opening tag"));
                };
                if open.child_by_field_name("name").is_none() {
                    // Fragments (`<>...</>`) parse as an element whose opening
                    // tag has no name field in this grammar version.
                    ("Fragment".to_owned(), None, element_children(node))
                } else {
                    let tag = self.jsx_tag(open)?;
                    (tag, Some(open), element_children(node))
                }
            }
            "jsx_fragment" => ("Fragment".to_owned(), None, element_children(node)),
            _ => return Err(EmitError::at(node, "not a markup element")),
        };

        let props = match props_owner {
            Some(owner) => self.jsx_props(owner)?,
            None => "null".to_owned(),
        };

        let mut call = format!("createElement({tag}, {props}");
        for child in children {
            if let Some(rendered) = self.jsx_child(child)? {
                call.push_str(", ");
                call.push_str(&rendered);
            }
        }
        call.push(')');
        Ok(call)
    }

    /// Resolves the tag expression for an element.
    ///
    /// Capitalised names reference a component binding; lower-case names are
    /// intrinsic tags and become string literals. Dotted names are emitted
    /// as the member expression they are.
    fn jsx_tag(&self, element: tree_sitter::Node<'_>) -> Result<String, EmitError> {
        let Some(name) = element.child_by_field_name("name") else {
            return Err(EmitError::at(element, "element has no tag name"));
        };
        let text = self.text(name);

        let intrinsic = name.kind() == "identifier"
            && text
                .chars()
                .next()
                .is_some_and(|first| first.is_ascii_lowercase());
        if intrinsic {
            Ok(quote_string(text))
        } else {
            Ok(text.to_owned())
        }
    }

    /// Builds the props object literal for an opening or self-closing tag.
    fn jsx_props(&self, owner: tree_sitter::Node<'_>) -> Result<String, EmitError> {
        let mut entries = Vec::new();
        let mut cursor = owner.walk();

        for child in owner.named_children(&mut cursor) {
            match child.kind() {
                "jsx_attribute" => {
                    let Some(name) = child.child(0) else {
                        return Err(EmitError::at(child, "attribute has no name"));
                    };
                    let key = quote_string(self.text(name));
                    let value = self.jsx_attribute_value(child)?;
                    entries.push(format!("{key}: {value}"));
                }
                // `{...spread}` in attribute position.
                "jsx_expression" => {
                    let Some(inner) = child.named_child(0) else {
                        continue;
                    };
                    if inner.kind() == "spread_element" {
                        let Some(expr) = inner.named_child(0) else {
                            return Err(EmitError::at(inner, "spread has no expression"));
                        };
                        let mut rendered = String::new();
                        self.emit(expr, &mut rendered)?;
                        entries.push(format!("...{rendered}"));
                    } else {
                        return Err(EmitError::at(child, "unexpected attribute expression"));
                    }
                }
                _ => {}
            }
        }

        if entries.is_empty() {
            Ok("null".to_owned())
        } else {
            Ok(format!("{{ {} }}", entries.join(", ")))
        }
    }

    fn jsx_attribute_value(&self, attr: tree_sitter::Node<'_>) -> Result<String, EmitError> {
        let mut cursor = attr.walk();
        let children: Vec<_> = attr.children(&mut cursor).collect();

        for child in children.iter().skip(1) {
            match child.kind() {
                "string" => return Ok(self.text(*child).to_owned()),
                "jsx_expression" => {
                    let Some(inner) = child.named_child(0) else {
                        return Err(EmitError::at(*child, "empty attribute expression"));
                    };
                    let mut rendered = String::new();
                    self.emit(inner, &mut rendered)?;
                    return Ok(rendered);
                }
                "jsx_element" | "jsx_self_closing_element" | "jsx_fragment" => {
                    return self.jsx_call(*child);
                }
                _ => {}
            }
        }

        // Bare attribute: `<Video muted />`.
        Ok("true".to_owned())
    }

    /// Renders one element child; `None` drops whitespace-only text and
    /// comment-only expressions.
    fn jsx_child(&self, child: tree_sitter::Node<'_>) -> Result<Option<String>, EmitError> {
        match child.kind() {
            "jsx_text" | "html_character_reference" => {
                let collapsed = collapse_jsx_text(self.text(child));
                if collapsed.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(quote_string(&collapsed)))
                }
            }
            "jsx_expression" => {
                let mut cursor = child.walk();
                let inner = child
                    .named_children(&mut cursor)
                    .find(|c| c.kind() != "comment");
                match inner {
                    Some(expr) => {
                        let mut rendered = String::new();
                        self.emit(expr, &mut rendered)?;
                        Ok(Some(rendered))
                    }
                    None => Ok(None),
                }
            }
            "jsx_element" | "jsx_self_closing_element" | "jsx_fragment" => {
                self.jsx_call(child).map(Some)
            }
            _ => Ok(None),
        }
    }
}

/// Collects the child nodes between an element's opening and closing tags.
fn element_children(node: tree_sitter::Node<'_>) -> Vec<tree_sitter::Node<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|c| {
            !matches!(
                c.kind(),
                "jsx_opening_element" | "jsx_closing_element" | "<" | ">" | "</"
            )
        })
        .collect()
}

/// Applies markup whitespace semantics: lines are trimmed, blank lines
/// dropped, and the remainder joined with single spaces.
fn collapse_jsx_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Produces a double-quoted plain-dialect string literal.
fn quote_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Strips a trailing `(line:column)` position suffix from an error string,
/// returning the cleaned text and the extracted line when present.
fn clean_error_text(text: &str) -> (String, Option<u32>) {
    let trimmed = text.trim_end();
    if let Some(rest) = trimmed.strip_suffix(')')
        && let Some(open) = rest.rfind('(')
        && let Some((line, column)) = rest.get(open + 1..).and_then(|s| s.split_once(':'))
        && let Ok(line) = line.trim().parse::<u32>()
        && column.trim().parse::<u32>().is_ok()
    {
        let cleaned = rest.get(..open).unwrap_or_default().trim_end();
        return (cleaned.to_owned(), Some(line));
    }
    (trimmed.to_owned(), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn lower_ok(source: &str) -> String {
        lower(source).expect("lowering succeeds")
    }

    #[test]
    fn lowers_self_closing_element_to_classic_call() {
        let out = lower_ok("const MyComposition = () => <AbsoluteFill />;");
        assert!(out.contains("createElement(AbsoluteFill, null)"));
        assert!(!out.contains('<'));
    }

    #[test]
    fn lowercase_tags_become_string_literals() {
        let out = lower_ok("const C = () => <div />;");
        assert!(out.contains("createElement(\"div\", null)"));
    }

    #[test]
    fn attributes_map_to_props_object() {
        let out = lower_ok(r#"const C = () => <Img src="a.png" width={100} muted />;"#);
        assert!(out.contains(r#""src": "a.png""#));
        assert!(out.contains(r#""width": 100"#));
        assert!(out.contains(r#""muted": true"#));
    }

    #[test]
    fn spread_attributes_are_preserved() {
        let out = lower_ok("const C = (props) => <AbsoluteFill {...props} />;");
        assert!(out.contains("createElement(AbsoluteFill, { ...props })"));
    }

    #[test]
    fn nested_elements_and_text_children_lower_recursively() {
        let out = lower_ok("const C = () => <div>\n  hello <b>world</b>\n</div>;");
        assert!(out.contains(r#"createElement("div", null, "hello", createElement("b", null, "world"))"#));
    }

    #[test]
    fn expression_children_are_emitted_inline() {
        let out = lower_ok("const C = () => <div>{frame + 1}</div>;");
        assert!(out.contains(r#"createElement("div", null, frame + 1)"#));
    }

    #[test]
    fn fragments_lower_to_fragment_calls() {
        let out = lower_ok("const C = () => <><Sequence /></>;");
        assert!(out.contains("createElement(Fragment, null, createElement(Sequence, null))"));
    }

    #[test]
    fn comment_only_expressions_are_dropped() {
        let out = lower_ok("const C = () => <div>{/* note */}</div>;");
        assert!(out.contains(r#"createElement("div", null)"#));
    }

    #[rstest]
    #[case("const x: number = 1;", "const x = 1;")]
    #[case("const y = value as string;", "const y = value;")]
    #[case("const z = maybe!;", "const z = maybe;")]
    fn type_syntax_is_erased(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(lower_ok(source).trim(), expected);
    }

    #[test]
    fn function_annotations_are_erased() {
        let out = lower_ok("const f = (a: number, b: number): number => a + b;");
        assert_eq!(out.trim(), "const f = (a, b) => a + b;");
    }

    #[test]
    fn interfaces_and_type_aliases_are_dropped() {
        let out = lower_ok("interface P { x: number }\ntype Q = string;\nconst a = 1;");
        assert!(!out.contains("interface"));
        assert!(!out.contains("type Q"));
        assert!(out.contains("const a = 1;"));
    }

    #[test]
    fn plain_named_imports_are_erased() {
        let out = lower_ok("import { AbsoluteFill, interpolate } from 'remotion';\nconst a = 1;");
        assert!(!out.contains("import"));
        assert!(out.contains("const a = 1;"));
    }

    #[test]
    fn aliased_imports_are_rebound() {
        let out = lower_ok("import { AbsoluteFill as Fill } from 'remotion';");
        assert!(out.contains("const Fill = AbsoluteFill;"));
    }

    #[test]
    fn type_only_imports_erase_without_rebinding() {
        let out = lower_ok("import type { CSSProperties as Style } from 'react';");
        assert!(!out.contains("Style"));
    }

    #[test]
    fn export_markers_are_stripped() {
        let out = lower_ok("export const MyComposition = () => <AbsoluteFill />;");
        assert!(!out.contains("export"));
        assert!(out.contains("const MyComposition"));
    }

    #[test]
    fn syntax_errors_fail_with_line_number() {
        let err = lower("const C = () => <div>").expect_err("must fail");
        assert!(err.line().is_some());
        assert!(!err.message().contains('('));
    }

    #[test]
    fn lowered_output_reparses_in_plain_dialect() {
        let source = concat!(
            "import { AbsoluteFill, useCurrentFrame, interpolate } from 'remotion';\n",
            "export const MyComposition = () => {\n",
            "  const frame = useCurrentFrame();\n",
            "  const opacity = interpolate(frame, [0, 30], [0, 1]);\n",
            "  return (\n",
            "    <AbsoluteFill style={{ opacity, backgroundColor: \"black\" }}>\n",
            "      <h1>Title</h1>\n",
            "    </AbsoluteFill>\n",
            "  );\n",
            "};\n",
        );
        let out = lower_ok(source);
        assert!(out.contains("createElement(AbsoluteFill"));
        assert!(out.contains(r#"createElement("h1", null, "Title")"#));
    }

    #[rstest]
    #[case("Unexpected token (3:17)", "Unexpected token", Some(3))]
    #[case("plain failure", "plain failure", None)]
    #[case("odd suffix (a:b)", "odd suffix (a:b)", None)]
    fn error_text_cleaning_strips_position_suffixes(
        #[case] raw: &str,
        #[case] cleaned: &str,
        #[case] line: Option<u32>,
    ) {
        assert_eq!(clean_error_text(raw), (cleaned.to_owned(), line));
    }

    #[test]
    fn collapse_trims_and_joins_lines() {
        assert_eq!(collapse_jsx_text("\n   hello\n   world\n "), "hello world");
        assert_eq!(collapse_jsx_text("  \n \n"), "");
    }

    #[test]
    fn quote_string_escapes_specials() {
        assert_eq!(quote_string("a\"b\\c\nd"), "\"a\\\"b\\\\c\\nd\"");
    }
}
