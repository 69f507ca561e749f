//! Tree-walking evaluator for the compiled dialect.
//!
//! Every statement and expression evaluation charges one budget step, so a
//! runaway loop fails with a budget error instead of stalling the render
//! thread. Call depth is bounded separately so recursive generated code
//! cannot overflow the host stack.

use std::cell::Cell;
use std::rc::Rc;

use crate::ast::{
    Arg, BinaryOp, Expr, FunctionBody, LogicalOp, ObjectProp, Param, Pattern, Stmt, TemplatePart,
    UnaryOp,
};
use crate::budget::FrameBudget;
use crate::capabilities;
use crate::error::ExecError;
use crate::frame::FrameContext;
use crate::methods;
use crate::value::{Closure, Scope, Value};

const MAX_CALL_DEPTH: u32 = 200;

/// Statement completion: fall through, early return, or loop control.
pub(crate) enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// One evaluation context: a budget to charge and an optional frame.
pub(crate) struct Interp<'a> {
    budget: &'a FrameBudget,
    frame: Option<FrameContext>,
    depth: Cell<u32>,
    rand: Cell<u64>,
}

impl<'a> Interp<'a> {
    pub(crate) fn new(budget: &'a FrameBudget, frame: Option<FrameContext>) -> Self {
        // Fixed seed: renders must be reproducible, so `Math.random` is a
        // deterministic sequence rather than host entropy.
        let seed = 0x9E37_79B9_7F4A_7C15_u64 ^ u64::from(frame.map_or(0, |f| f.frame) + 1);
        Self {
            budget,
            frame,
            depth: Cell::new(0),
            rand: Cell::new(seed),
        }
    }

    pub(crate) const fn frame(&self) -> Option<FrameContext> {
        self.frame
    }

    /// Draws the next value from the deterministic random sequence.
    pub(crate) fn next_random(&self) -> f64 {
        let mut state = self.rand.get();
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        self.rand.set(state);
        (state >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Charges one step against the frame budget.
    pub(crate) fn step(&self) -> Result<(), ExecError> {
        if self.budget.charge() {
            Ok(())
        } else {
            Err(ExecError::BudgetExhausted)
        }
    }

    /// Executes a statement list in the given scope.
    ///
    /// Function declarations are hoisted so helpers may be defined below
    /// their first use, as generated code often does.
    pub(crate) fn exec_block(&self, stmts: &[Stmt], env: &Rc<Scope>) -> Result<Flow, ExecError> {
        for stmt in stmts {
            if let Stmt::Func { name, params, body } = stmt {
                env.define(
                    name.clone(),
                    Value::Closure(Rc::new(Closure {
                        params: Rc::clone(params),
                        body: Rc::clone(body),
                        env: Rc::clone(env),
                    })),
                );
            }
        }

        for stmt in stmts {
            match self.exec_stmt(stmt, env)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&self, stmt: &Stmt, env: &Rc<Scope>) -> Result<Flow, ExecError> {
        self.step()?;
        match stmt {
            Stmt::Decl { pattern, init } => {
                let value = match init {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Undefined,
                };
                self.bind_pattern(pattern, value, env)?;
                Ok(Flow::Normal)
            }
            // Hoisted by exec_block.
            Stmt::Func { .. } | Stmt::Empty => Ok(Flow::Normal),
            Stmt::Expr(expr) => {
                self.eval(expr, env)?;
                Ok(Flow::Normal)
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond, env)?.is_truthy() {
                    self.exec_block(then, &Scope::child(env))
                } else if let Some(otherwise) = otherwise {
                    self.exec_block(otherwise, &Scope::child(env))
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body } => {
                while self.eval(cond, env)?.is_truthy() {
                    self.step()?;
                    match self.exec_block(body, &Scope::child(env))? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                let loop_env = Scope::child(env);
                for stmt in init {
                    self.exec_stmt(stmt, &loop_env)?;
                }
                loop {
                    if let Some(cond) = cond
                        && !self.eval(cond, &loop_env)?.is_truthy()
                    {
                        break;
                    }
                    self.step()?;
                    match self.exec_block(body, &Scope::child(&loop_env))? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                    if let Some(update) = update {
                        self.eval(update, &loop_env)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::ForOf {
                pattern,
                iterable,
                body,
            } => {
                let items = self.iterate(&self.eval(iterable, env)?)?;
                for item in items {
                    self.step()?;
                    let iter_env = Scope::child(env);
                    self.bind_pattern(pattern, item, &iter_env)?;
                    match self.exec_block(body, &iter_env)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
        }
    }

    /// Materialises an iterable into a vector of values.
    pub(crate) fn iterate(&self, value: &Value) -> Result<Vec<Value>, ExecError> {
        match value {
            Value::Array(items) => Ok(items.borrow().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::string(c.to_string())).collect()),
            other => Err(ExecError::runtime(format!(
                "{} is not iterable",
                other.type_of()
            ))),
        }
    }

    fn bind_pattern(
        &self,
        pattern: &Pattern,
        value: Value,
        env: &Rc<Scope>,
    ) -> Result<(), ExecError> {
        match pattern {
            Pattern::Ident(name) => {
                env.define(name.clone(), value);
                Ok(())
            }
            Pattern::Object(props) => {
                if value.is_nullish() {
                    return Err(ExecError::runtime("cannot destructure a nullish value"));
                }
                for prop in props {
                    let field = self.get_member(&value, &prop.key, false)?;
                    self.bind_param(&prop.binding, field, env)?;
                }
                Ok(())
            }
            Pattern::Array(items) => {
                let values = self.iterate(&value)?;
                for (index, item) in items.iter().enumerate() {
                    if let Some(param) = item {
                        let element = values.get(index).cloned().unwrap_or(Value::Undefined);
                        self.bind_param(param, element, env)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn bind_param(&self, param: &Param, value: Value, env: &Rc<Scope>) -> Result<(), ExecError> {
        let value = match (&param.default, &value) {
            (Some(default), Value::Undefined) => self.eval(default, env)?,
            _ => value,
        };
        self.bind_pattern(&param.pattern, value, env)
    }

    pub(crate) fn eval(&self, expr: &Expr, env: &Rc<Scope>) -> Result<Value, ExecError> {
        self.step()?;
        match expr {
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(Rc::clone(s))),
            Expr::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => out.push_str(text),
                        TemplatePart::Expr(expr) => {
                            out.push_str(&self.eval(expr, env)?.to_display_string());
                        }
                    }
                }
                Ok(Value::string(out))
            }
            Expr::Ident(name) => env
                .lookup(name)
                .ok_or_else(|| ExecError::runtime(format!("{name} is not defined"))),
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                self.eval_args(items, env, &mut values)?;
                Ok(Value::array(values))
            }
            Expr::Object(props) => {
                let mut entries: Vec<(String, Value)> = Vec::with_capacity(props.len());
                for prop in props {
                    match prop {
                        ObjectProp::KeyValue(key, value) => {
                            upsert(&mut entries, key.clone(), self.eval(value, env)?);
                        }
                        ObjectProp::Computed(key, value) => {
                            let key = self.eval(key, env)?.to_display_string();
                            upsert(&mut entries, key, self.eval(value, env)?);
                        }
                        ObjectProp::Shorthand(name) => {
                            let value = env.lookup(name).ok_or_else(|| {
                                ExecError::runtime(format!("{name} is not defined"))
                            })?;
                            upsert(&mut entries, name.clone(), value);
                        }
                        ObjectProp::Spread(expr) => match self.eval(expr, env)? {
                            Value::Object(source) => {
                                for (key, value) in source.borrow().iter() {
                                    upsert(&mut entries, key.clone(), value.clone());
                                }
                            }
                            Value::Undefined | Value::Null => {}
                            other => {
                                return Err(ExecError::runtime(format!(
                                    "cannot spread a {} into an object",
                                    other.type_of()
                                )));
                            }
                        },
                    }
                }
                Ok(Value::object(entries))
            }
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let object = self.eval(object, env)?;
                self.get_member(&object, property, *optional)
            }
            Expr::Index {
                object,
                index,
                optional,
            } => {
                let object = self.eval(object, env)?;
                if *optional && object.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let index = self.eval(index, env)?;
                self.get_index(&object, &index)
            }
            Expr::Call { callee, args } => self.eval_call(callee, args, env),
            Expr::Function { params, body } => Ok(Value::Closure(Rc::new(Closure {
                params: Rc::clone(params),
                body: Rc::clone(body),
                env: Rc::clone(env),
            }))),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand, env)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Number(-value.as_number()),
                    UnaryOp::Plus => Value::Number(value.as_number()),
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::TypeOf => Value::string(value.type_of()),
                    UnaryOp::Void => Value::Undefined,
                })
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                Ok(apply_binary(*op, &left, &right))
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, env)?;
                let take_right = match op {
                    LogicalOp::And => left.is_truthy(),
                    LogicalOp::Or => !left.is_truthy(),
                    LogicalOp::Nullish => left.is_nullish(),
                };
                if take_right {
                    self.eval(right, env)
                } else {
                    Ok(left)
                }
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond, env)?.is_truthy() {
                    self.eval(then, env)
                } else {
                    self.eval(otherwise, env)
                }
            }
            Expr::Assign { target, op, value } => {
                let mut next = self.eval(value, env)?;
                if let Some(op) = op {
                    let current = self.eval(target, env)?;
                    next = apply_binary(*op, &current, &next);
                }
                self.store(target, next.clone(), env)?;
                Ok(next)
            }
            Expr::Update {
                target,
                increment,
                prefix,
            } => {
                let current = self.eval(target, env)?.as_number();
                let delta = if *increment { 1.0 } else { -1.0 };
                let next = current + delta;
                self.store(target, Value::Number(next), env)?;
                Ok(Value::Number(if *prefix { next } else { current }))
            }
        }
    }

    /// Evaluates call/array arguments, flattening spreads.
    fn eval_args(
        &self,
        args: &[Arg],
        env: &Rc<Scope>,
        out: &mut Vec<Value>,
    ) -> Result<(), ExecError> {
        for arg in args {
            let value = self.eval(&arg.expr, env)?;
            if arg.spread {
                out.extend(self.iterate(&value)?);
            } else {
                out.push(value);
            }
        }
        Ok(())
    }

    fn eval_call(&self, callee: &Expr, args: &[Arg], env: &Rc<Scope>) -> Result<Value, ExecError> {
        let mut values = Vec::with_capacity(args.len());

        // Method calls resolve the receiver once, then dispatch either to
        // a stored callable or to the built-in method table.
        if let Expr::Member {
            object,
            property,
            optional,
        } = callee
        {
            let receiver = self.eval(object, env)?;
            if *optional && receiver.is_nullish() {
                return Ok(Value::Undefined);
            }
            self.eval_args(args, env, &mut values)?;

            if let Value::Object(entries) = &receiver {
                let stored = entries
                    .borrow()
                    .iter()
                    .find(|(key, _)| key == property)
                    .map(|(_, value)| value.clone());
                if let Some(stored) = stored
                    && stored.is_callable()
                {
                    return self.call(&stored, values);
                }
            }
            return methods::call_builtin(self, &receiver, property, values);
        }

        let callee = self.eval(callee, env)?;
        self.eval_args(args, env, &mut values)?;
        self.call(&callee, values)
    }

    /// Invokes a callable value.
    pub(crate) fn call(&self, callee: &Value, args: Vec<Value>) -> Result<Value, ExecError> {
        self.step()?;
        match callee {
            Value::Closure(closure) => {
                let depth = self.depth.get();
                if depth >= MAX_CALL_DEPTH {
                    return Err(ExecError::StackOverflow);
                }
                self.depth.set(depth + 1);
                let result = self.call_closure(closure, args);
                self.depth.set(depth);
                result
            }
            Value::Native(native) => capabilities::call_native(self, *native, args),
            Value::Intrinsic(name) => Err(ExecError::runtime(format!(
                "{name} is a component and must be used with createElement"
            ))),
            other => Err(ExecError::runtime(format!(
                "{} is not a function",
                other.type_of()
            ))),
        }
    }

    fn call_closure(&self, closure: &Closure, args: Vec<Value>) -> Result<Value, ExecError> {
        let scope = Scope::child(&closure.env);
        let mut args = args.into_iter();
        for param in closure.params.iter() {
            let value = args.next().unwrap_or(Value::Undefined);
            self.bind_param(param, value, &scope)?;
        }

        match closure.body.as_ref() {
            FunctionBody::Expr(expr) => self.eval(expr, &scope),
            FunctionBody::Block(stmts) => match self.exec_block(stmts, &scope)? {
                Flow::Return(value) => Ok(value),
                _ => Ok(Value::Undefined),
            },
        }
    }

    /// Reads a named property from a value.
    pub(crate) fn get_member(
        &self,
        object: &Value,
        property: &str,
        optional: bool,
    ) -> Result<Value, ExecError> {
        match object {
            Value::Undefined | Value::Null => {
                if optional {
                    Ok(Value::Undefined)
                } else {
                    Err(ExecError::runtime(format!(
                        "cannot read property '{property}' of {}",
                        object.to_display_string()
                    )))
                }
            }
            Value::Object(entries) => Ok(entries
                .borrow()
                .iter()
                .find(|(key, _)| key == property)
                .map_or(Value::Undefined, |(_, value)| value.clone())),
            Value::Array(items) => {
                if property == "length" {
                    Ok(Value::Number(items.borrow().len() as f64))
                } else {
                    Ok(Value::Undefined)
                }
            }
            Value::Str(s) => {
                if property == "length" {
                    Ok(Value::Number(s.chars().count() as f64))
                } else {
                    Ok(Value::Undefined)
                }
            }
            _ => Ok(Value::Undefined),
        }
    }

    fn get_index(&self, object: &Value, index: &Value) -> Result<Value, ExecError> {
        match object {
            Value::Array(items) => {
                let idx = index.as_number();
                if idx.is_nan() || idx < 0.0 {
                    return Ok(Value::Undefined);
                }
                Ok(items
                    .borrow()
                    .get(idx as usize)
                    .cloned()
                    .unwrap_or(Value::Undefined))
            }
            Value::Str(s) => {
                let idx = index.as_number();
                if idx.is_nan() || idx < 0.0 {
                    return Ok(Value::Undefined);
                }
                Ok(s.chars()
                    .nth(idx as usize)
                    .map_or(Value::Undefined, |c| Value::string(c.to_string())))
            }
            Value::Object(_) => self.get_member(object, &index.to_display_string(), false),
            Value::Undefined | Value::Null => Err(ExecError::runtime(format!(
                "cannot index {}",
                object.to_display_string()
            ))),
            _ => Ok(Value::Undefined),
        }
    }

    /// Writes through an assignment target.
    fn store(&self, target: &Expr, value: Value, env: &Rc<Scope>) -> Result<(), ExecError> {
        match target {
            Expr::Ident(name) => {
                if env.assign(name, value) {
                    Ok(())
                } else {
                    Err(ExecError::runtime(format!("{name} is not defined")))
                }
            }
            Expr::Member {
                object, property, ..
            } => {
                let object = self.eval(object, env)?;
                self.set_member(&object, property, value)
            }
            Expr::Index { object, index, .. } => {
                let object = self.eval(object, env)?;
                let index = self.eval(index, env)?;
                match &object {
                    Value::Array(items) => {
                        let idx = index.as_number();
                        if idx.is_nan() || idx < 0.0 || idx.fract() != 0.0 {
                            return Err(ExecError::runtime("invalid array index"));
                        }
                        let idx = idx as usize;
                        let mut items = items.borrow_mut();
                        if idx >= items.len() {
                            items.resize(idx + 1, Value::Undefined);
                        }
                        if let Some(slot) = items.get_mut(idx) {
                            *slot = value;
                        }
                        Ok(())
                    }
                    _ => self.set_member(&object, &index.to_display_string(), value),
                }
            }
            _ => Err(ExecError::runtime("invalid assignment target")),
        }
    }

    fn set_member(&self, object: &Value, property: &str, value: Value) -> Result<(), ExecError> {
        match object {
            Value::Object(entries) => {
                let mut entries = entries.borrow_mut();
                if let Some(slot) = entries.iter_mut().find(|(key, _)| key == property) {
                    slot.1 = value;
                } else {
                    entries.push((property.to_owned(), value));
                }
                Ok(())
            }
            other => Err(ExecError::runtime(format!(
                "cannot set property '{property}' on a {}",
                other.type_of()
            ))),
        }
    }
}

/// Inserts or replaces an entry, preserving first-write position.
fn upsert(entries: &mut Vec<(String, Value)>, key: String, value: Value) {
    if let Some(slot) = entries.iter_mut().find(|(existing, _)| *existing == key) {
        slot.1 = value;
    } else {
        entries.push((key, value));
    }
}

/// Applies a binary operator with the dialect's coercion rules.
fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
                Value::string(format!(
                    "{}{}",
                    left.to_display_string(),
                    right.to_display_string()
                ))
            } else {
                Value::Number(left.as_number() + right.as_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.as_number() - right.as_number()),
        BinaryOp::Mul => Value::Number(left.as_number() * right.as_number()),
        BinaryOp::Div => Value::Number(left.as_number() / right.as_number()),
        BinaryOp::Mod => Value::Number(left.as_number() % right.as_number()),
        BinaryOp::Pow => Value::Number(left.as_number().powf(right.as_number())),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = if let (Value::Str(a), Value::Str(b)) = (left, right) {
                Some(a.cmp(b))
            } else {
                left.as_number().partial_cmp(&right.as_number())
            };
            let result = ordering.is_some_and(|ord| match op {
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::Le => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            });
            Value::Bool(result)
        }
        BinaryOp::Eq => Value::Bool(left.strict_eq(right)),
        BinaryOp::Ne => Value::Bool(!left.strict_eq(right)),
    }
}
