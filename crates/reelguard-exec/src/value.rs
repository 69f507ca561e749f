//! Runtime value model for the scoped interpreter.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::{FunctionBody, Param};

/// A runtime value.
///
/// Aggregates use `Rc` with interior mutability so cloning a value is
/// cheap and aliasing behaves the way the source dialect expects.
#[derive(Clone)]
pub enum Value {
    /// The absent value.
    Undefined,
    /// The explicit null value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A double-precision number.
    Number(f64),
    /// An immutable string.
    Str(Rc<str>),
    /// A mutable array.
    Array(Rc<RefCell<Vec<Value>>>),
    /// A mutable string-keyed object.
    Object(Rc<RefCell<Vec<(String, Value)>>>),
    /// A user-defined function with its captured environment.
    Closure(Rc<Closure>),
    /// A built-in capability function.
    Native(Native),
    /// A built-in component marker (`AbsoluteFill`, `Sequence`, ...).
    Intrinsic(&'static str),
    /// A constructed element tree node.
    Element(Rc<Element>),
}

/// A user function: parameters, body and captured scope.
pub struct Closure {
    pub(crate) params: Rc<Vec<Param>>,
    pub(crate) body: Rc<FunctionBody>,
    pub(crate) env: Rc<Scope>,
}

/// Built-in capability functions, dispatched by variant rather than by any
/// dynamic code construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Native {
    /// `createElement(tag, props, ...children)`.
    CreateElement,
    /// The `useCurrentFrame` hook.
    UseCurrentFrame,
    /// The `useVideoConfig` hook.
    UseVideoConfig,
    /// The `interpolate` animation primitive.
    Interpolate,
    /// The `spring` animation primitive.
    Spring,
    /// `JSON.stringify`.
    JsonStringify,
    /// A method of the injected `Math` object.
    Math(MathFn),
}

/// Methods of the injected `Math` object, named after their counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
#[expect(missing_docs, reason = "variants mirror the Math methods one-to-one")]
pub enum MathFn {
    Abs,
    Floor,
    Ceil,
    Round,
    Trunc,
    Sign,
    Min,
    Max,
    Sqrt,
    Pow,
    Sin,
    Cos,
    Tan,
    Atan2,
    Log,
    Exp,
    Random,
    Hypot,
}

/// A node in the element tree produced by `createElement`.
#[derive(Clone)]
pub struct Element {
    /// The tag: an intrinsic component, a string tag, or a user component.
    pub tag: Value,
    /// Props in declaration order.
    pub props: Vec<(String, Value)>,
    /// Child values (elements, strings, numbers, nested arrays).
    pub children: Vec<Value>,
}

impl Element {
    /// Returns the prop with the given name, when present.
    #[must_use]
    pub fn prop(&self, name: &str) -> Option<&Value> {
        self.props
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Returns the tag as a display name when it is intrinsic or a string.
    #[must_use]
    pub fn tag_name(&self) -> Option<&str> {
        match &self.tag {
            Value::Intrinsic(name) => Some(name),
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// A lexical scope: local bindings plus a parent link.
pub(crate) struct Scope {
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub(crate) fn root() -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    pub(crate) fn child(parent: &Rc<Self>) -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    /// Defines a binding in this scope, shadowing any outer binding.
    pub(crate) fn define(&self, name: impl Into<String>, value: Value) {
        self.vars.borrow_mut().insert(name.into(), value);
    }

    /// Looks a name up through the scope chain.
    pub(crate) fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.vars.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    /// Reassigns an existing binding. Returns `false` if the name is not
    /// bound anywhere in the chain.
    pub(crate) fn assign(&self, name: &str, value: Value) -> bool {
        if self.vars.borrow().contains_key(name) {
            self.vars.borrow_mut().insert(name.to_owned(), value);
            return true;
        }
        self.parent
            .as_ref()
            .is_some_and(|parent| parent.assign(name, value))
    }
}

impl Value {
    /// Creates a string value.
    #[must_use]
    pub fn string(text: impl Into<Rc<str>>) -> Self {
        Self::Str(text.into())
    }

    /// Creates an array value.
    #[must_use]
    pub fn array(items: Vec<Self>) -> Self {
        Self::Array(Rc::new(RefCell::new(items)))
    }

    /// Creates an object value from ordered entries.
    #[must_use]
    pub fn object(entries: Vec<(String, Self)>) -> Self {
        Self::Object(Rc::new(RefCell::new(entries)))
    }

    /// Truthiness under the source dialect's rules.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Returns whether the value is `undefined` or `null`.
    #[must_use]
    pub const fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Returns whether the value can be invoked.
    #[must_use]
    pub const fn is_callable(&self) -> bool {
        matches!(self, Self::Closure(_) | Self::Native(_))
    }

    /// Numeric coercion: `undefined` is NaN, `null` is 0, booleans are
    /// 0/1, strings parse or NaN.
    #[must_use]
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            _ => f64::NAN,
        }
    }

    /// Display coercion used for string concatenation and templates.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_owned(),
            Self::Null => "null".to_owned(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::Str(s) => String::from(s.as_ref()),
            Self::Array(items) => items
                .borrow()
                .iter()
                .map(Self::to_display_string)
                .collect::<Vec<_>>()
                .join(","),
            Self::Object(_) => "[object Object]".to_owned(),
            Self::Closure(_) | Self::Native(_) => "[function]".to_owned(),
            Self::Intrinsic(name) => format!("[component {name}]"),
            Self::Element(_) => "[element]".to_owned(),
        }
    }

    /// The `typeof` operator's answer for this value.
    #[must_use]
    pub const fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Closure(_) | Self::Native(_) => "function",
            Self::Null
            | Self::Array(_)
            | Self::Object(_)
            | Self::Intrinsic(_)
            | Self::Element(_) => "object",
        }
    }

    /// Strict equality: same shape and same content, or same identity for
    /// aggregates.
    #[must_use]
    pub fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Closure(a), Self::Closure(b)) => Rc::ptr_eq(a, b),
            (Self::Element(a), Self::Element(b)) => Rc::ptr_eq(a, b),
            (Self::Native(a), Self::Native(b)) => a == b,
            (Self::Intrinsic(a), Self::Intrinsic(b)) => a == b,
            _ => false,
        }
    }

    /// Serialises the value for the render surface.
    ///
    /// Functions serialise as null markers; elements carry their tag name,
    /// props and children.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Undefined | Self::Null | Self::Closure(_) | Self::Native(_) => {
                serde_json::Value::Null
            }
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Str(s) => serde_json::Value::String(String::from(s.as_ref())),
            Self::Array(items) => {
                serde_json::Value::Array(items.borrow().iter().map(Self::to_json).collect())
            }
            Self::Object(entries) => serde_json::Value::Object(
                entries
                    .borrow()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            Self::Intrinsic(name) => serde_json::Value::String((*name).to_owned()),
            Self::Element(element) => {
                let mut node = serde_json::Map::new();
                node.insert("tag".to_owned(), element.tag.to_json());
                node.insert(
                    "props".to_owned(),
                    serde_json::Value::Object(
                        element
                            .props
                            .iter()
                            .map(|(key, value)| (key.clone(), value.to_json()))
                            .collect(),
                    ),
                );
                node.insert(
                    "children".to_owned(),
                    serde_json::Value::Array(element.children.iter().map(Self::to_json).collect()),
                );
                serde_json::Value::Object(node)
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Array(items) => write!(f, "Array(len={})", items.borrow().len()),
            Self::Object(entries) => write!(f, "Object(len={})", entries.borrow().len()),
            Self::Closure(_) => write!(f, "[closure]"),
            Self::Native(n) => write!(f, "[native {n:?}]"),
            Self::Intrinsic(name) => write!(f, "[component {name}]"),
            Self::Element(element) => {
                write!(f, "Element({})", element.tag_name().unwrap_or("?"))
            }
        }
    }
}

/// Formats a number the way the source dialect displays it: integral
/// values without a fractional part.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    if n == n.trunc() && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_dialect_rules() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::string("x").is_truthy());
        assert!(Value::array(Vec::new()).is_truthy());
    }

    #[test]
    fn numeric_coercion_matches_dialect() {
        assert_eq!(Value::Null.as_number(), 0.0);
        assert!(Value::Undefined.as_number().is_nan());
        assert_eq!(Value::Bool(true).as_number(), 1.0);
        assert_eq!(Value::string("12.5").as_number(), 12.5);
        assert!(Value::string("nope").as_number().is_nan());
    }

    #[test]
    fn display_formats_integral_numbers_without_fraction() {
        assert_eq!(Value::Number(30.0).to_display_string(), "30");
        assert_eq!(Value::Number(0.5).to_display_string(), "0.5");
    }

    #[test]
    fn strict_eq_is_identity_for_aggregates() {
        let a = Value::array(vec![Value::Number(1.0)]);
        let b = Value::array(vec![Value::Number(1.0)]);
        assert!(a.strict_eq(&a.clone()));
        assert!(!a.strict_eq(&b));
    }

    #[test]
    fn scope_lookup_walks_the_chain_and_assign_mutates_in_place() {
        let root = Scope::root();
        root.define("a", Value::Number(1.0));
        let inner = Scope::child(&root);

        assert!(matches!(inner.lookup("a"), Some(Value::Number(n)) if n == 1.0));
        assert!(inner.assign("a", Value::Number(2.0)));
        assert!(matches!(root.lookup("a"), Some(Value::Number(n)) if n == 2.0));
        assert!(!inner.assign("missing", Value::Null));
    }

    #[test]
    fn element_json_carries_tag_props_and_children() {
        let element = Element {
            tag: Value::Intrinsic("AbsoluteFill"),
            props: vec![("opacity".to_owned(), Value::Number(0.5))],
            children: vec![Value::string("hi")],
        };
        let json = Value::Element(Rc::new(element)).to_json();
        assert_eq!(json["tag"], "AbsoluteFill");
        assert_eq!(json["props"]["opacity"], 0.5);
        assert_eq!(json["children"][0], "hi");
    }
}
