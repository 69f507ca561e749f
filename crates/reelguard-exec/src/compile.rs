//! Compilation of lowered source into the executable AST.
//!
//! Parses the plain dialect with Tree-sitter and maps each node onto the
//! AST in [`crate::ast`]. Node kinds outside the dialect are a compile
//! error; the validator has already proven the tree contains nothing
//! dangerous, so the only surprises here are benign-but-unsupported
//! constructs.

use std::rc::Rc;

use reelguard_syntax::{ParseResult, Parser, SourceDialect};

use crate::ast::{
    Arg, BinaryOp, Expr, FunctionBody, LogicalOp, ObjectPatternProp, ObjectProp, Param, Pattern,
    Program, Stmt, TemplatePart, UnaryOp,
};
use crate::error::ExecError;

/// Compiles lowered source into a program.
pub(crate) fn compile(lowered: &str) -> Result<Program, ExecError> {
    let parsed = Parser::new(SourceDialect::Plain)
        .and_then(|mut p| p.parse(lowered))
        .map_err(|_| ExecError::InvalidLoweredSource)?;

    if parsed.has_errors() {
        return Err(ExecError::InvalidLoweredSource);
    }

    let compiler = Compiler { parsed: &parsed };
    let mut body = Vec::new();
    let root = parsed.root_node();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        compiler.compile_statement(child, &mut body)?;
    }
    Ok(Program { body })
}

struct Compiler<'a> {
    parsed: &'a ParseResult,
}

type Node<'t> = tree_sitter::Node<'t>;

impl Compiler<'_> {
    fn text(&self, node: Node<'_>) -> &str {
        self.parsed.node_text(node)
    }

    fn compile_statement(&self, node: Node<'_>, out: &mut Vec<Stmt>) -> Result<(), ExecError> {
        match node.kind() {
            "comment" | "empty_statement" => Ok(()),
            "lexical_declaration" | "variable_declaration" => {
                let mut cursor = node.walk();
                for declarator in node.named_children(&mut cursor) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    let Some(name) = declarator.child_by_field_name("name") else {
                        return Err(ExecError::unsupported(declarator));
                    };
                    let pattern = self.compile_pattern(name)?;
                    let init = declarator
                        .child_by_field_name("value")
                        .map(|value| self.compile_expr(value))
                        .transpose()?;
                    out.push(Stmt::Decl { pattern, init });
                }
                Ok(())
            }
            "function_declaration" => {
                let Some(name) = node.child_by_field_name("name") else {
                    return Err(ExecError::unsupported(node));
                };
                let params = self.compile_params(node)?;
                let Some(body) = node.child_by_field_name("body") else {
                    return Err(ExecError::unsupported(node));
                };
                out.push(Stmt::Func {
                    name: self.text(name).to_owned(),
                    params: Rc::new(params),
                    body: Rc::new(FunctionBody::Block(self.compile_block(body)?)),
                });
                Ok(())
            }
            "expression_statement" => {
                if let Some(inner) = node.named_child(0) {
                    out.push(Stmt::Expr(self.compile_expr(inner)?));
                }
                Ok(())
            }
            "return_statement" => {
                let value = node
                    .named_child(0)
                    .map(|inner| self.compile_expr(inner))
                    .transpose()?;
                out.push(Stmt::Return(value));
                Ok(())
            }
            "if_statement" => {
                let Some(condition) = node.child_by_field_name("condition") else {
                    return Err(ExecError::unsupported(node));
                };
                let Some(consequence) = node.child_by_field_name("consequence") else {
                    return Err(ExecError::unsupported(node));
                };
                let otherwise = match node.child_by_field_name("alternative") {
                    Some(alternative) => {
                        // The alternative field is the else clause wrapper.
                        let inner = alternative.named_child(0).unwrap_or(alternative);
                        Some(self.compile_block(inner)?)
                    }
                    None => None,
                };
                out.push(Stmt::If {
                    cond: self.compile_expr(condition)?,
                    then: self.compile_block(consequence)?,
                    otherwise,
                });
                Ok(())
            }
            "while_statement" => {
                let Some(condition) = node.child_by_field_name("condition") else {
                    return Err(ExecError::unsupported(node));
                };
                let Some(body) = node.child_by_field_name("body") else {
                    return Err(ExecError::unsupported(node));
                };
                out.push(Stmt::While {
                    cond: self.compile_expr(condition)?,
                    body: self.compile_block(body)?,
                });
                Ok(())
            }
            "for_statement" => {
                let mut init = Vec::new();
                if let Some(initializer) = node.child_by_field_name("initializer")
                    && initializer.kind() != "empty_statement"
                {
                    self.compile_statement(initializer, &mut init)?;
                }
                let cond = match node.child_by_field_name("condition") {
                    Some(condition) if condition.kind() == "expression_statement" => condition
                        .named_child(0)
                        .map(|inner| self.compile_expr(inner))
                        .transpose()?,
                    Some(condition) if condition.kind() != "empty_statement" => {
                        Some(self.compile_expr(condition)?)
                    }
                    _ => None,
                };
                let update = node
                    .child_by_field_name("increment")
                    .map(|increment| self.compile_expr(increment))
                    .transpose()?;
                let Some(body) = node.child_by_field_name("body") else {
                    return Err(ExecError::unsupported(node));
                };
                out.push(Stmt::For {
                    init,
                    cond,
                    update,
                    body: self.compile_block(body)?,
                });
                Ok(())
            }
            "for_in_statement" => {
                // Only the `of` form is in the dialect.
                let mut cursor = node.walk();
                let is_of = node.children(&mut cursor).any(|c| c.kind() == "of");
                if !is_of {
                    return Err(ExecError::unsupported(node));
                }
                let Some(left) = node.child_by_field_name("left") else {
                    return Err(ExecError::unsupported(node));
                };
                let Some(right) = node.child_by_field_name("right") else {
                    return Err(ExecError::unsupported(node));
                };
                let Some(body) = node.child_by_field_name("body") else {
                    return Err(ExecError::unsupported(node));
                };
                out.push(Stmt::ForOf {
                    pattern: self.compile_pattern(left)?,
                    iterable: self.compile_expr(right)?,
                    body: self.compile_block(body)?,
                });
                Ok(())
            }
            "statement_block" => {
                out.extend(self.compile_block(node)?);
                Ok(())
            }
            "break_statement" => {
                out.push(Stmt::Break);
                Ok(())
            }
            "continue_statement" => {
                out.push(Stmt::Continue);
                Ok(())
            }
            _ => Err(ExecError::unsupported(node)),
        }
    }

    /// Compiles a statement block, or a single statement used as a body.
    fn compile_block(&self, node: Node<'_>) -> Result<Vec<Stmt>, ExecError> {
        let mut body = Vec::new();
        if node.kind() == "statement_block" {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                self.compile_statement(child, &mut body)?;
            }
        } else {
            self.compile_statement(node, &mut body)?;
        }
        Ok(body)
    }

    fn compile_pattern(&self, node: Node<'_>) -> Result<Pattern, ExecError> {
        match node.kind() {
            "identifier" | "shorthand_property_identifier_pattern" => {
                Ok(Pattern::Ident(self.text(node).to_owned()))
            }
            "object_pattern" => {
                let mut props = Vec::new();
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    match child.kind() {
                        "shorthand_property_identifier_pattern" => {
                            let name = self.text(child).to_owned();
                            props.push(ObjectPatternProp {
                                key: name.clone(),
                                binding: Box::new(Param {
                                    pattern: Pattern::Ident(name),
                                    default: None,
                                }),
                            });
                        }
                        "object_assignment_pattern" => {
                            let (left, right) = self.assignment_pattern_parts(child)?;
                            let key = self.text(left).to_owned();
                            props.push(ObjectPatternProp {
                                key: key.clone(),
                                binding: Box::new(Param {
                                    pattern: Pattern::Ident(key),
                                    default: Some(self.compile_expr(right)?),
                                }),
                            });
                        }
                        "pair_pattern" => {
                            let Some(key) = child.child_by_field_name("key") else {
                                return Err(ExecError::unsupported(child));
                            };
                            let Some(value) = child.child_by_field_name("value") else {
                                return Err(ExecError::unsupported(child));
                            };
                            props.push(ObjectPatternProp {
                                key: self.property_key_text(key)?,
                                binding: Box::new(self.compile_binding(value)?),
                            });
                        }
                        "comment" => {}
                        _ => return Err(ExecError::unsupported(child)),
                    }
                }
                Ok(Pattern::Object(props))
            }
            "array_pattern" => {
                let mut items = Vec::new();
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.kind() == "comment" {
                        continue;
                    }
                    items.push(Some(self.compile_binding(child)?));
                }
                Ok(Pattern::Array(items))
            }
            _ => Err(ExecError::unsupported(node)),
        }
    }

    /// Compiles a binding position that may carry a default value.
    fn compile_binding(&self, node: Node<'_>) -> Result<Param, ExecError> {
        if node.kind() == "assignment_pattern" {
            let (left, right) = self.assignment_pattern_parts(node)?;
            return Ok(Param {
                pattern: self.compile_pattern(left)?,
                default: Some(self.compile_expr(right)?),
            });
        }
        Ok(Param {
            pattern: self.compile_pattern(node)?,
            default: None,
        })
    }

    fn assignment_pattern_parts<'t>(
        &self,
        node: Node<'t>,
    ) -> Result<(Node<'t>, Node<'t>), ExecError> {
        let Some(left) = node.child_by_field_name("left") else {
            return Err(ExecError::unsupported(node));
        };
        let Some(right) = node.child_by_field_name("right") else {
            return Err(ExecError::unsupported(node));
        };
        Ok((left, right))
    }

    fn property_key_text(&self, key: Node<'_>) -> Result<String, ExecError> {
        match key.kind() {
            "property_identifier" | "identifier" | "number" => Ok(self.text(key).to_owned()),
            "string" => Ok(self.string_content(key)?),
            _ => Err(ExecError::unsupported(key)),
        }
    }

    /// Compiles the parameter list of a function or arrow.
    fn compile_params(&self, node: Node<'_>) -> Result<Vec<Param>, ExecError> {
        // Parenless single-parameter arrows use the `parameter` field.
        if let Some(single) = node.child_by_field_name("parameter") {
            return Ok(vec![Param {
                pattern: Pattern::Ident(self.text(single).to_owned()),
                default: None,
            }]);
        }

        let Some(list) = node.child_by_field_name("parameters") else {
            return Ok(Vec::new());
        };

        let mut params = Vec::new();
        let mut cursor = list.walk();
        for child in list.named_children(&mut cursor) {
            match child.kind() {
                "comment" => {}
                // The grammar wraps parameters in (required|optional)_parameter.
                "required_parameter" | "optional_parameter" => {
                    let Some(pattern) = child.child_by_field_name("pattern") else {
                        return Err(ExecError::unsupported(child));
                    };
                    let default = child
                        .child_by_field_name("value")
                        .map(|value| self.compile_expr(value))
                        .transpose()?;
                    params.push(Param {
                        pattern: self.compile_pattern(pattern)?,
                        default,
                    });
                }
                _ => params.push(self.compile_binding(child)?),
            }
        }
        Ok(params)
    }

    fn compile_expr(&self, node: Node<'_>) -> Result<Expr, ExecError> {
        match node.kind() {
            "parenthesized_expression" => match node.named_child(0) {
                Some(inner) => self.compile_expr(inner),
                None => Err(ExecError::unsupported(node)),
            },
            "number" => Ok(Expr::Number(parse_number(self.text(node)))),
            "string" => Ok(Expr::Str(Rc::from(self.string_content(node)?))),
            "template_string" => self.compile_template(node),
            "true" => Ok(Expr::Bool(true)),
            "false" => Ok(Expr::Bool(false)),
            "null" => Ok(Expr::Null),
            "undefined" => Ok(Expr::Undefined),
            "identifier" => Ok(Expr::Ident(self.text(node).to_owned())),
            "array" => {
                let mut items = Vec::new();
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.kind() == "comment" {
                        continue;
                    }
                    items.push(self.compile_arg(child)?);
                }
                Ok(Expr::Array(items))
            }
            "object" => self.compile_object(node),
            "member_expression" => {
                let Some(object) = node.child_by_field_name("object") else {
                    return Err(ExecError::unsupported(node));
                };
                let Some(property) = node.child_by_field_name("property") else {
                    return Err(ExecError::unsupported(node));
                };
                Ok(Expr::Member {
                    object: Box::new(self.compile_expr(object)?),
                    property: self.text(property).to_owned(),
                    optional: self.has_optional_chain(node),
                })
            }
            "subscript_expression" => {
                let Some(object) = node.child_by_field_name("object") else {
                    return Err(ExecError::unsupported(node));
                };
                let Some(index) = node.child_by_field_name("index") else {
                    return Err(ExecError::unsupported(node));
                };
                Ok(Expr::Index {
                    object: Box::new(self.compile_expr(object)?),
                    index: Box::new(self.compile_expr(index)?),
                    optional: self.has_optional_chain(node),
                })
            }
            "call_expression" | "new_expression" => self.compile_call(node),
            "arrow_function" => {
                let params = self.compile_params(node)?;
                let Some(body) = node.child_by_field_name("body") else {
                    return Err(ExecError::unsupported(node));
                };
                let body = if body.kind() == "statement_block" {
                    FunctionBody::Block(self.compile_block(body)?)
                } else {
                    FunctionBody::Expr(self.compile_expr(body)?)
                };
                Ok(Expr::Function {
                    params: Rc::new(params),
                    body: Rc::new(body),
                })
            }
            "function_expression" | "function" => {
                let params = self.compile_params(node)?;
                let Some(body) = node.child_by_field_name("body") else {
                    return Err(ExecError::unsupported(node));
                };
                Ok(Expr::Function {
                    params: Rc::new(params),
                    body: Rc::new(FunctionBody::Block(self.compile_block(body)?)),
                })
            }
            "unary_expression" => {
                let Some(operator) = node.child_by_field_name("operator") else {
                    return Err(ExecError::unsupported(node));
                };
                let Some(argument) = node.child_by_field_name("argument") else {
                    return Err(ExecError::unsupported(node));
                };
                let op = match self.text(operator) {
                    "-" => UnaryOp::Neg,
                    "+" => UnaryOp::Plus,
                    "!" => UnaryOp::Not,
                    "typeof" => UnaryOp::TypeOf,
                    "void" => UnaryOp::Void,
                    _ => return Err(ExecError::unsupported(node)),
                };
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(self.compile_expr(argument)?),
                })
            }
            "binary_expression" => self.compile_binary(node),
            "ternary_expression" => {
                let Some(condition) = node.child_by_field_name("condition") else {
                    return Err(ExecError::unsupported(node));
                };
                let Some(consequence) = node.child_by_field_name("consequence") else {
                    return Err(ExecError::unsupported(node));
                };
                let Some(alternative) = node.child_by_field_name("alternative") else {
                    return Err(ExecError::unsupported(node));
                };
                Ok(Expr::Conditional {
                    cond: Box::new(self.compile_expr(condition)?),
                    then: Box::new(self.compile_expr(consequence)?),
                    otherwise: Box::new(self.compile_expr(alternative)?),
                })
            }
            "assignment_expression" => {
                let (left, right) = self.left_right(node)?;
                Ok(Expr::Assign {
                    target: Box::new(self.compile_expr(left)?),
                    op: None,
                    value: Box::new(self.compile_expr(right)?),
                })
            }
            "augmented_assignment_expression" => {
                let (left, right) = self.left_right(node)?;
                let Some(operator) = node.child_by_field_name("operator") else {
                    return Err(ExecError::unsupported(node));
                };
                let op = match self.text(operator) {
                    "+=" => BinaryOp::Add,
                    "-=" => BinaryOp::Sub,
                    "*=" => BinaryOp::Mul,
                    "/=" => BinaryOp::Div,
                    "%=" => BinaryOp::Mod,
                    _ => return Err(ExecError::unsupported(node)),
                };
                Ok(Expr::Assign {
                    target: Box::new(self.compile_expr(left)?),
                    op: Some(op),
                    value: Box::new(self.compile_expr(right)?),
                })
            }
            "update_expression" => {
                let Some(argument) = node.child_by_field_name("argument") else {
                    return Err(ExecError::unsupported(node));
                };
                let Some(operator) = node.child_by_field_name("operator") else {
                    return Err(ExecError::unsupported(node));
                };
                Ok(Expr::Update {
                    target: Box::new(self.compile_expr(argument)?),
                    increment: self.text(operator) == "++",
                    prefix: operator.start_byte() < argument.start_byte(),
                })
            }
            _ => Err(ExecError::unsupported(node)),
        }
    }

    fn has_optional_chain(&self, node: Node<'_>) -> bool {
        let mut cursor = node.walk();
        node.children(&mut cursor)
            .any(|c| c.kind() == "optional_chain")
    }

    fn left_right<'t>(&self, node: Node<'t>) -> Result<(Node<'t>, Node<'t>), ExecError> {
        let Some(left) = node.child_by_field_name("left") else {
            return Err(ExecError::unsupported(node));
        };
        let Some(right) = node.child_by_field_name("right") else {
            return Err(ExecError::unsupported(node));
        };
        Ok((left, right))
    }

    fn compile_binary(&self, node: Node<'_>) -> Result<Expr, ExecError> {
        let (left, right) = self.left_right(node)?;
        let Some(operator) = node.child_by_field_name("operator") else {
            return Err(ExecError::unsupported(node));
        };
        let left = Box::new(self.compile_expr(left)?);
        let right = Box::new(self.compile_expr(right)?);

        let logical = match self.text(operator) {
            "&&" => Some(LogicalOp::And),
            "||" => Some(LogicalOp::Or),
            "??" => Some(LogicalOp::Nullish),
            _ => None,
        };
        if let Some(op) = logical {
            return Ok(Expr::Logical { op, left, right });
        }

        let op = match self.text(operator) {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "**" => BinaryOp::Pow,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "===" | "==" => BinaryOp::Eq,
            "!==" | "!=" => BinaryOp::Ne,
            _ => return Err(ExecError::unsupported(node)),
        };
        Ok(Expr::Binary { op, left, right })
    }

    fn compile_call(&self, node: Node<'_>) -> Result<Expr, ExecError> {
        let callee = node
            .child_by_field_name("function")
            .or_else(|| node.child_by_field_name("constructor"));
        let Some(callee) = callee else {
            return Err(ExecError::unsupported(node));
        };

        let mut args = Vec::new();
        if let Some(arguments) = node.child_by_field_name("arguments") {
            if arguments.kind() != "arguments" {
                // Tagged template calls are outside the dialect.
                return Err(ExecError::unsupported(node));
            }
            let mut cursor = arguments.walk();
            for child in arguments.named_children(&mut cursor) {
                if child.kind() == "comment" {
                    continue;
                }
                args.push(self.compile_arg(child)?);
            }
        }

        Ok(Expr::Call {
            callee: Box::new(self.compile_expr(callee)?),
            args,
        })
    }

    fn compile_arg(&self, node: Node<'_>) -> Result<Arg, ExecError> {
        if node.kind() == "spread_element" {
            let Some(inner) = node.named_child(0) else {
                return Err(ExecError::unsupported(node));
            };
            return Ok(Arg {
                spread: true,
                expr: self.compile_expr(inner)?,
            });
        }
        Ok(Arg {
            spread: false,
            expr: self.compile_expr(node)?,
        })
    }

    fn compile_object(&self, node: Node<'_>) -> Result<Expr, ExecError> {
        let mut props = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "comment" => {}
                "pair" => {
                    let Some(key) = child.child_by_field_name("key") else {
                        return Err(ExecError::unsupported(child));
                    };
                    let Some(value) = child.child_by_field_name("value") else {
                        return Err(ExecError::unsupported(child));
                    };
                    let value = self.compile_expr(value)?;
                    if key.kind() == "computed_property_name" {
                        let Some(inner) = key.named_child(0) else {
                            return Err(ExecError::unsupported(key));
                        };
                        props.push(ObjectProp::Computed(self.compile_expr(inner)?, value));
                    } else {
                        props.push(ObjectProp::KeyValue(self.property_key_text(key)?, value));
                    }
                }
                "shorthand_property_identifier" => {
                    props.push(ObjectProp::Shorthand(self.text(child).to_owned()));
                }
                "spread_element" => {
                    let Some(inner) = child.named_child(0) else {
                        return Err(ExecError::unsupported(child));
                    };
                    props.push(ObjectProp::Spread(self.compile_expr(inner)?));
                }
                _ => return Err(ExecError::unsupported(child)),
            }
        }
        Ok(Expr::Object(props))
    }

    fn compile_template(&self, node: Node<'_>) -> Result<Expr, ExecError> {
        let mut parts = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "string_fragment" => {
                    parts.push(TemplatePart::Text(Rc::from(self.text(child))));
                }
                "escape_sequence" => {
                    parts.push(TemplatePart::Text(Rc::from(unescape(self.text(child)))));
                }
                "template_substitution" => {
                    let Some(inner) = child.named_child(0) else {
                        return Err(ExecError::unsupported(child));
                    };
                    parts.push(TemplatePart::Expr(self.compile_expr(inner)?));
                }
                _ => {}
            }
        }
        Ok(Expr::Template(parts))
    }

    /// Extracts the unescaped content of a string literal.
    fn string_content(&self, node: Node<'_>) -> Result<String, ExecError> {
        let mut content = String::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "string_fragment" => content.push_str(self.text(child)),
                "escape_sequence" => content.push_str(&unescape(self.text(child))),
                _ => {}
            }
        }
        Ok(content)
    }
}

/// Parses a numeric literal, covering the separator and radix forms.
fn parse_number(text: &str) -> f64 {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    if let Some(hex) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    if let Some(bin) = cleaned.strip_prefix("0b").or_else(|| cleaned.strip_prefix("0B")) {
        return u64::from_str_radix(bin, 2).map_or(f64::NAN, |n| n as f64);
    }
    if let Some(oct) = cleaned.strip_prefix("0o").or_else(|| cleaned.strip_prefix("0O")) {
        return u64::from_str_radix(oct, 8).map_or(f64::NAN, |n| n as f64);
    }
    cleaned.parse::<f64>().unwrap_or(f64::NAN)
}

/// Decodes one escape sequence (`\n`, `A`, `\u{1F600}`, `\x41`, ...).
fn unescape(sequence: &str) -> String {
    let Some(rest) = sequence.strip_prefix('\\') else {
        return sequence.to_owned();
    };
    let mut chars = rest.chars();
    let Some(kind) = chars.next() else {
        return String::new();
    };
    match kind {
        'n' => "\n".to_owned(),
        't' => "\t".to_owned(),
        'r' => "\r".to_owned(),
        '0' => "\0".to_owned(),
        'u' => {
            let rest: String = chars.collect();
            let digits = rest
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                .unwrap_or(&rest);
            u32::from_str_radix(digits, 16)
                .ok()
                .and_then(char::from_u32)
                .map_or_else(String::new, String::from)
        }
        'x' => {
            let digits: String = chars.collect();
            u32::from_str_radix(&digits, 16)
                .ok()
                .and_then(char::from_u32)
                .map_or_else(String::new, String::from)
        }
        other => other.to_string(),
    }
}
