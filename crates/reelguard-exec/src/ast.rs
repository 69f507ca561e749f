//! In-process representation of the executable dialect.
//!
//! Deliberately narrower than the full base language: only the shapes the
//! lowered generated dialect actually uses exist here, so anything else is
//! unrepresentable rather than merely unchecked. The compiler rejects
//! source containing other shapes.

use std::rc::Rc;

/// A compiled program: the lowered source's top-level statements.
#[derive(Debug)]
pub(crate) struct Program {
    pub(crate) body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub(crate) enum Stmt {
    Decl {
        pattern: Pattern,
        init: Option<Expr>,
    },
    Func {
        name: String,
        params: Rc<Vec<Param>>,
        body: Rc<FunctionBody>,
    },
    Expr(Expr),
    Return(Option<Expr>),
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    For {
        init: Vec<Stmt>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Vec<Stmt>,
    },
    ForOf {
        pattern: Pattern,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    Empty,
}

/// A binding parameter: a pattern with an optional default expression.
#[derive(Debug, Clone)]
pub(crate) struct Param {
    pub(crate) pattern: Pattern,
    pub(crate) default: Option<Expr>,
}

/// A destructuring-capable binding target.
#[derive(Debug, Clone)]
pub(crate) enum Pattern {
    Ident(String),
    Object(Vec<ObjectPatternProp>),
    Array(Vec<Option<Param>>),
}

#[derive(Debug, Clone)]
pub(crate) struct ObjectPatternProp {
    pub(crate) key: String,
    pub(crate) binding: Box<Param>,
}

/// A function body: expression-bodied arrows or statement blocks.
#[derive(Debug)]
pub(crate) enum FunctionBody {
    Expr(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Template(Vec<TemplatePart>),
    Ident(String),
    Array(Vec<Arg>),
    Object(Vec<ObjectProp>),
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Arg>,
    },
    Function {
        params: Rc<Vec<Param>>,
        body: Rc<FunctionBody>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        op: Option<BinaryOp>,
        value: Box<Expr>,
    },
    Update {
        target: Box<Expr>,
        increment: bool,
        prefix: bool,
    },
}

/// A call argument or array item, possibly spread.
#[derive(Debug, Clone)]
pub(crate) struct Arg {
    pub(crate) spread: bool,
    pub(crate) expr: Expr,
}

#[derive(Debug, Clone)]
pub(crate) enum ObjectProp {
    KeyValue(String, Expr),
    Computed(Expr, Expr),
    Shorthand(String),
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub(crate) enum TemplatePart {
    Text(Rc<str>),
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Plus,
    Not,
    TypeOf,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogicalOp {
    And,
    Or,
    Nullish,
}
