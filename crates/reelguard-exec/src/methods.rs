//! Built-in methods on arrays, strings and numbers.
//!
//! Dispatch is by receiver shape and method name. Unknown methods fail
//! with a runtime error naming the method, which surfaces in the preview
//! fallback panel exactly like any other script failure.

use std::rc::Rc;

use crate::error::ExecError;
use crate::interp::Interp;
use crate::value::Value;

pub(crate) fn call_builtin(
    interp: &Interp<'_>,
    receiver: &Value,
    name: &str,
    args: Vec<Value>,
) -> Result<Value, ExecError> {
    match receiver {
        Value::Array(_) => call_array(interp, receiver, name, args),
        Value::Str(s) => call_string(s, name, &args),
        Value::Number(n) => call_number(*n, name, &args),
        other => Err(not_a_function(other, name)),
    }
}

fn not_a_function(receiver: &Value, name: &str) -> ExecError {
    ExecError::runtime(format!("{}.{name} is not a function", receiver.type_of()))
}

fn call_array(
    interp: &Interp<'_>,
    receiver: &Value,
    name: &str,
    args: Vec<Value>,
) -> Result<Value, ExecError> {
    let Value::Array(items) = receiver else {
        return Err(not_a_function(receiver, name));
    };
    // Iteration works on a snapshot so callbacks that push to the receiver
    // cannot extend the loop they run in.
    let snapshot: Vec<Value> = items.borrow().clone();

    match name {
        "map" => {
            let callback = callback_arg(&args, name)?;
            let mut out = Vec::with_capacity(snapshot.len());
            for (index, item) in snapshot.into_iter().enumerate() {
                out.push(interp.call(&callback, vec![item, Value::Number(index as f64)])?);
            }
            Ok(Value::array(out))
        }
        "filter" => {
            let callback = callback_arg(&args, name)?;
            let mut out = Vec::new();
            for (index, item) in snapshot.into_iter().enumerate() {
                let keep = interp
                    .call(&callback, vec![item.clone(), Value::Number(index as f64)])?
                    .is_truthy();
                if keep {
                    out.push(item);
                }
            }
            Ok(Value::array(out))
        }
        "forEach" => {
            let callback = callback_arg(&args, name)?;
            for (index, item) in snapshot.into_iter().enumerate() {
                interp.call(&callback, vec![item, Value::Number(index as f64)])?;
            }
            Ok(Value::Undefined)
        }
        "reduce" => {
            let callback = callback_arg(&args, name)?;
            let mut iter = snapshot.into_iter().enumerate();
            let mut acc = match args.get(1) {
                Some(seed) => seed.clone(),
                None => match iter.next() {
                    Some((_, first)) => first,
                    None => {
                        return Err(ExecError::runtime(
                            "reduce of an empty array with no initial value",
                        ));
                    }
                },
            };
            for (index, item) in iter {
                acc = interp.call(&callback, vec![acc, item, Value::Number(index as f64)])?;
            }
            Ok(acc)
        }
        "find" | "findIndex" => {
            let callback = callback_arg(&args, name)?;
            for (index, item) in snapshot.into_iter().enumerate() {
                let hit = interp
                    .call(&callback, vec![item.clone(), Value::Number(index as f64)])?
                    .is_truthy();
                if hit {
                    return Ok(if name == "find" {
                        item
                    } else {
                        Value::Number(index as f64)
                    });
                }
            }
            Ok(if name == "find" {
                Value::Undefined
            } else {
                Value::Number(-1.0)
            })
        }
        "some" | "every" => {
            let callback = callback_arg(&args, name)?;
            let want = name == "some";
            for (index, item) in snapshot.into_iter().enumerate() {
                let hit = interp
                    .call(&callback, vec![item, Value::Number(index as f64)])?
                    .is_truthy();
                if hit == want {
                    return Ok(Value::Bool(want));
                }
            }
            Ok(Value::Bool(!want))
        }
        "join" => {
            let separator = match args.first() {
                Some(Value::Undefined) | None => ",".to_owned(),
                Some(value) => value.to_display_string(),
            };
            let joined = snapshot
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_display_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(&separator);
            Ok(Value::string(joined))
        }
        "includes" => {
            let needle = args.first().cloned().unwrap_or(Value::Undefined);
            Ok(Value::Bool(
                snapshot.iter().any(|item| item.strict_eq(&needle)),
            ))
        }
        "indexOf" => {
            let needle = args.first().cloned().unwrap_or(Value::Undefined);
            let found = snapshot.iter().position(|item| item.strict_eq(&needle));
            Ok(Value::Number(
                found.map_or(-1.0, |index| index as f64),
            ))
        }
        "push" => {
            let mut items = items.borrow_mut();
            items.extend(args);
            Ok(Value::Number(items.len() as f64))
        }
        "pop" => Ok(items.borrow_mut().pop().unwrap_or(Value::Undefined)),
        "slice" => {
            let (start, end) = slice_bounds(&args, snapshot.len());
            Ok(Value::array(snapshot[start..end].to_vec()))
        }
        "concat" => {
            let mut out = snapshot;
            for arg in args {
                match arg {
                    Value::Array(more) => out.extend(more.borrow().iter().cloned()),
                    other => out.push(other),
                }
            }
            Ok(Value::array(out))
        }
        "reverse" => {
            items.borrow_mut().reverse();
            Ok(receiver.clone())
        }
        "fill" => {
            let fill = args.first().cloned().unwrap_or(Value::Undefined);
            for slot in items.borrow_mut().iter_mut() {
                *slot = fill.clone();
            }
            Ok(receiver.clone())
        }
        "flat" => {
            let mut out = Vec::with_capacity(snapshot.len());
            for item in snapshot {
                match item {
                    Value::Array(inner) => out.extend(inner.borrow().iter().cloned()),
                    other => out.push(other),
                }
            }
            Ok(Value::array(out))
        }
        _ => Err(not_a_function(receiver, name)),
    }
}

fn callback_arg(args: &[Value], method: &str) -> Result<Value, ExecError> {
    match args.first() {
        Some(value) if value.is_callable() => Ok(value.clone()),
        _ => Err(ExecError::runtime(format!(
            "{method} expects a callback function"
        ))),
    }
}

/// Normalises optional `slice(start, end)` arguments against a length,
/// with negative offsets counting from the end.
fn slice_bounds(args: &[Value], len: usize) -> (usize, usize) {
    let resolve = |value: Option<&Value>, default: usize| -> usize {
        match value {
            Some(Value::Undefined) | None => default,
            Some(value) => {
                let n = value.as_number();
                if n.is_nan() {
                    0
                } else if n < 0.0 {
                    len.saturating_sub((-n) as usize)
                } else {
                    (n as usize).min(len)
                }
            }
        }
    };
    let start = resolve(args.first(), 0);
    let end = resolve(args.get(1), len);
    (start, end.max(start))
}

fn call_string(s: &Rc<str>, name: &str, args: &[Value]) -> Result<Value, ExecError> {
    let chars: Vec<char> = s.chars().collect();
    match name {
        "toUpperCase" => Ok(Value::string(s.to_uppercase())),
        "toLowerCase" => Ok(Value::string(s.to_lowercase())),
        "trim" => Ok(Value::string(s.trim().to_owned())),
        "slice" | "substring" => {
            let (start, end) = slice_bounds(args, chars.len());
            Ok(Value::string(chars[start..end].iter().collect::<String>()))
        }
        "split" => {
            let parts: Vec<Value> = match args.first() {
                Some(Value::Str(separator)) if !separator.is_empty() => s
                    .split(separator.as_ref())
                    .map(|part| Value::string(part.to_owned()))
                    .collect(),
                Some(Value::Str(_)) => chars
                    .iter()
                    .map(|c| Value::string(c.to_string()))
                    .collect(),
                _ => vec![Value::Str(Rc::clone(s))],
            };
            Ok(Value::array(parts))
        }
        "includes" => Ok(Value::Bool(
            s.contains(string_arg(args, 0).as_str()),
        )),
        "startsWith" => Ok(Value::Bool(
            s.starts_with(string_arg(args, 0).as_str()),
        )),
        "endsWith" => Ok(Value::Bool(s.ends_with(string_arg(args, 0).as_str()))),
        "indexOf" => {
            let needle = string_arg(args, 0);
            let found = s.find(needle.as_str()).map(|byte| {
                // Convert the byte offset into a character index.
                s[..byte].chars().count() as f64
            });
            Ok(Value::Number(found.unwrap_or(-1.0)))
        }
        "charAt" => {
            let index = args.first().map_or(0.0, Value::as_number);
            if index.is_nan() || index < 0.0 {
                return Ok(Value::string(""));
            }
            Ok(Value::string(
                chars
                    .get(index as usize)
                    .map(|c| c.to_string())
                    .unwrap_or_default(),
            ))
        }
        "repeat" => {
            let count = args.first().map_or(0.0, Value::as_number);
            if !(0.0..=10_000.0).contains(&count) {
                return Err(ExecError::runtime("invalid repeat count"));
            }
            Ok(Value::string(s.repeat(count as usize)))
        }
        "padStart" | "padEnd" => {
            let target = args.first().map_or(0.0, Value::as_number).max(0.0) as usize;
            let pad = match args.get(1) {
                Some(Value::Undefined) | None => " ".to_owned(),
                Some(value) => value.to_display_string(),
            };
            if pad.is_empty() || chars.len() >= target {
                return Ok(Value::Str(Rc::clone(s)));
            }
            let missing = target - chars.len();
            let filler: String = pad.chars().cycle().take(missing).collect();
            let out = if name == "padStart" {
                format!("{filler}{s}")
            } else {
                format!("{s}{filler}")
            };
            Ok(Value::string(out))
        }
        "replace" => {
            let needle = string_arg(args, 0);
            let replacement = string_arg(args, 1);
            Ok(Value::string(s.replacen(needle.as_str(), &replacement, 1)))
        }
        "replaceAll" => {
            let needle = string_arg(args, 0);
            let replacement = string_arg(args, 1);
            if needle.is_empty() {
                return Ok(Value::Str(Rc::clone(s)));
            }
            Ok(Value::string(s.replace(needle.as_str(), &replacement)))
        }
        _ => Err(not_a_function(&Value::Str(Rc::clone(s)), name)),
    }
}

fn string_arg(args: &[Value], index: usize) -> String {
    args.get(index)
        .map(Value::to_display_string)
        .unwrap_or_default()
}

fn call_number(n: f64, name: &str, args: &[Value]) -> Result<Value, ExecError> {
    match name {
        "toFixed" => {
            let digits = args.first().map_or(0.0, Value::as_number);
            if !(0.0..=100.0).contains(&digits) {
                return Err(ExecError::runtime("invalid toFixed digit count"));
            }
            Ok(Value::string(format!("{n:.*}", digits as usize)))
        }
        "toString" => Ok(Value::string(Value::Number(n).to_display_string())),
        _ => Err(not_a_function(&Value::Number(n), name)),
    }
}
