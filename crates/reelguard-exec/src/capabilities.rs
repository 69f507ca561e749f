//! The capability set injected into the root scope.
//!
//! This module is the complete inventory of what generated code can reach
//! at runtime: element construction, the intrinsic components, the frame
//! hooks, the animation primitives, and the permitted base globals. The
//! root scope has no parent, so a name that is not installed here does not
//! exist.

use std::rc::Rc;

use crate::error::ExecError;
use crate::frame::FrameContext;
use crate::interp::Interp;
use crate::value::{Element, MathFn, Native, Scope, Value};

/// The binding name the executor looks up as the composition entry point.
pub const ENTRY_COMPONENT_NAME: &str = "MyComposition";

/// Intrinsic component markers available without any import at runtime.
/// Import statements for them are erased during lowering.
const INTRINSIC_COMPONENTS: &[&str] = &["AbsoluteFill", "Sequence", "Img", "Fragment"];

/// Builds a fresh root scope containing exactly the capability set.
///
/// Fresh per execution: aggregate capability values (`Math`, `JSON`) are
/// mutable objects, and one script must not observe another's edits.
pub(crate) fn root_scope() -> Rc<Scope> {
    let scope = Scope::root();

    scope.define("createElement", Value::Native(Native::CreateElement));
    scope.define("useCurrentFrame", Value::Native(Native::UseCurrentFrame));
    scope.define("useVideoConfig", Value::Native(Native::UseVideoConfig));
    scope.define("interpolate", Value::Native(Native::Interpolate));
    scope.define("spring", Value::Native(Native::Spring));

    for name in INTRINSIC_COMPONENTS {
        scope.define(*name, Value::Intrinsic(name));
    }

    scope.define("Math", math_object());
    scope.define(
        "JSON",
        Value::object(vec![(
            "stringify".to_owned(),
            Value::Native(Native::JsonStringify),
        )]),
    );
    scope.define("Infinity", Value::Number(f64::INFINITY));
    scope.define("NaN", Value::Number(f64::NAN));
    scope.define("undefined", Value::Undefined);

    scope
}

fn math_object() -> Value {
    let entries = vec![
        ("PI".to_owned(), Value::Number(std::f64::consts::PI)),
        ("E".to_owned(), Value::Number(std::f64::consts::E)),
        ("abs".to_owned(), Value::Native(Native::Math(MathFn::Abs))),
        ("floor".to_owned(), Value::Native(Native::Math(MathFn::Floor))),
        ("ceil".to_owned(), Value::Native(Native::Math(MathFn::Ceil))),
        ("round".to_owned(), Value::Native(Native::Math(MathFn::Round))),
        ("trunc".to_owned(), Value::Native(Native::Math(MathFn::Trunc))),
        ("sign".to_owned(), Value::Native(Native::Math(MathFn::Sign))),
        ("min".to_owned(), Value::Native(Native::Math(MathFn::Min))),
        ("max".to_owned(), Value::Native(Native::Math(MathFn::Max))),
        ("sqrt".to_owned(), Value::Native(Native::Math(MathFn::Sqrt))),
        ("pow".to_owned(), Value::Native(Native::Math(MathFn::Pow))),
        ("sin".to_owned(), Value::Native(Native::Math(MathFn::Sin))),
        ("cos".to_owned(), Value::Native(Native::Math(MathFn::Cos))),
        ("tan".to_owned(), Value::Native(Native::Math(MathFn::Tan))),
        ("atan2".to_owned(), Value::Native(Native::Math(MathFn::Atan2))),
        ("log".to_owned(), Value::Native(Native::Math(MathFn::Log))),
        ("exp".to_owned(), Value::Native(Native::Math(MathFn::Exp))),
        ("random".to_owned(), Value::Native(Native::Math(MathFn::Random))),
        ("hypot".to_owned(), Value::Native(Native::Math(MathFn::Hypot))),
    ];
    Value::object(entries)
}

/// Dispatches a call to a built-in capability.
pub(crate) fn call_native(
    interp: &Interp<'_>,
    native: Native,
    args: Vec<Value>,
) -> Result<Value, ExecError> {
    match native {
        Native::CreateElement => create_element(interp, args),
        Native::UseCurrentFrame => {
            let ctx = frame_context(interp, "useCurrentFrame")?;
            Ok(Value::Number(f64::from(ctx.frame)))
        }
        Native::UseVideoConfig => {
            let ctx = frame_context(interp, "useVideoConfig")?;
            Ok(Value::object(vec![
                ("width".to_owned(), Value::Number(f64::from(ctx.config.width))),
                (
                    "height".to_owned(),
                    Value::Number(f64::from(ctx.config.height)),
                ),
                ("fps".to_owned(), Value::Number(ctx.config.fps)),
                (
                    "durationInFrames".to_owned(),
                    Value::Number(f64::from(ctx.config.duration_in_frames)),
                ),
            ]))
        }
        Native::Interpolate => interpolate(&args),
        Native::Spring => spring(interp, &args),
        Native::JsonStringify => json_stringify(&args),
        Native::Math(f) => math_call(interp, f, &args),
    }
}

fn frame_context(interp: &Interp<'_>, hook: &str) -> Result<FrameContext, ExecError> {
    interp.frame().ok_or_else(|| {
        ExecError::runtime(format!("{hook} may only be called while rendering a frame"))
    })
}

/// `createElement(tag, props, ...children)`.
///
/// User components are invoked here with a single props object carrying the
/// children, so the returned tree contains only intrinsic and string tags.
fn create_element(interp: &Interp<'_>, args: Vec<Value>) -> Result<Value, ExecError> {
    let mut args = args.into_iter();
    let tag = args.next().unwrap_or(Value::Undefined);
    let props_arg = args.next().unwrap_or(Value::Null);

    let mut props: Vec<(String, Value)> = match &props_arg {
        Value::Object(entries) => entries.borrow().clone(),
        Value::Null | Value::Undefined => Vec::new(),
        other => {
            return Err(ExecError::runtime(format!(
                "createElement props must be an object, got {}",
                other.type_of()
            )));
        }
    };

    let mut children = Vec::new();
    for child in args {
        flatten_child(child, &mut children);
    }

    match tag {
        Value::Str(_) | Value::Intrinsic(_) => Ok(Value::Element(Rc::new(Element {
            tag,
            props,
            children,
        }))),
        Value::Closure(_) => {
            if !children.is_empty() {
                let children_value = if children.len() == 1 {
                    children.remove(0)
                } else {
                    Value::array(children)
                };
                props.push(("children".to_owned(), children_value));
            }
            interp.call(&tag, vec![Value::object(props)])
        }
        other => Err(ExecError::runtime(format!(
            "createElement tag must be a component or string, got {}",
            other.type_of()
        ))),
    }
}

/// Flattens nested child arrays and drops the values the renderer ignores.
fn flatten_child(child: Value, out: &mut Vec<Value>) {
    match child {
        Value::Undefined | Value::Null | Value::Bool(_) => {}
        Value::Array(items) => {
            for item in items.borrow().iter() {
                flatten_child(item.clone(), out);
            }
        }
        other => out.push(other),
    }
}

/// How `interpolate` maps inputs outside the input range.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Extrapolate {
    Extend,
    Clamp,
}

fn extrapolate_option(options: Option<&Value>, key: &str) -> Result<Extrapolate, ExecError> {
    let Some(Value::Object(entries)) = options else {
        return Ok(Extrapolate::Extend);
    };
    let value = entries
        .borrow()
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone());
    match value {
        None => Ok(Extrapolate::Extend),
        Some(Value::Str(s)) if s.as_ref() == "extend" => Ok(Extrapolate::Extend),
        Some(Value::Str(s)) if s.as_ref() == "clamp" => Ok(Extrapolate::Clamp),
        Some(other) => Err(ExecError::runtime(format!(
            "{key} must be \"clamp\" or \"extend\", got {}",
            other.to_display_string()
        ))),
    }
}

fn number_range(value: Option<&Value>, name: &str) -> Result<Vec<f64>, ExecError> {
    let Some(Value::Array(items)) = value else {
        return Err(ExecError::runtime(format!("{name} must be an array of numbers")));
    };
    let numbers: Vec<f64> = items.borrow().iter().map(Value::as_number).collect();
    if numbers.len() < 2 {
        return Err(ExecError::runtime(format!(
            "{name} must have at least two elements"
        )));
    }
    if numbers.iter().any(|n| n.is_nan()) {
        return Err(ExecError::runtime(format!("{name} must contain only numbers")));
    }
    Ok(numbers)
}

/// `interpolate(input, inputRange, outputRange, options?)`.
///
/// Multi-segment linear interpolation. The input range must be
/// monotonically non-decreasing; out-of-range inputs extend the edge
/// segments unless clamped.
fn interpolate(args: &[Value]) -> Result<Value, ExecError> {
    let input = args.first().map_or(f64::NAN, Value::as_number);
    let input_range = number_range(args.get(1), "inputRange")?;
    let output_range = number_range(args.get(2), "outputRange")?;
    if input_range.len() != output_range.len() {
        return Err(ExecError::runtime(
            "inputRange and outputRange must have the same length",
        ));
    }
    if input_range.windows(2).any(|pair| pair[0] > pair[1]) {
        return Err(ExecError::runtime(
            "inputRange must be monotonically non-decreasing",
        ));
    }
    let left = extrapolate_option(args.get(3), "extrapolateLeft")?;
    let right = extrapolate_option(args.get(3), "extrapolateRight")?;

    if input.is_nan() {
        return Ok(Value::Number(f64::NAN));
    }

    let last = input_range.len() - 1;
    let input = match (input < input_range[0], input > input_range[last]) {
        (true, _) if left == Extrapolate::Clamp => input_range[0],
        (_, true) if right == Extrapolate::Clamp => input_range[last],
        _ => input,
    };

    // Segment whose start is the greatest range point not above the input.
    let segment = input_range[..last]
        .iter()
        .rposition(|start| *start <= input)
        .unwrap_or(0);
    let (x0, x1) = (input_range[segment], input_range[segment + 1]);
    let (y0, y1) = (output_range[segment], output_range[segment + 1]);
    if x0 == x1 {
        return Ok(Value::Number(y1));
    }
    Ok(Value::Number(y0 + (input - x0) / (x1 - x0) * (y1 - y0)))
}

fn object_field(options: &Value, key: &str) -> Option<Value> {
    match options {
        Value::Object(entries) => entries
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone()),
        _ => None,
    }
}

fn numeric_field(options: &Value, key: &str, default: f64) -> f64 {
    match object_field(options, key) {
        Some(value) if !value.is_nullish() => value.as_number(),
        _ => default,
    }
}

/// `spring({frame, fps, config?, from?, to?})`.
///
/// Damped spring integration with semi-implicit Euler at one step per
/// frame of simulated time. Each integration step charges the budget, so a
/// huge `frame` cannot buy unmetered work.
fn spring(interp: &Interp<'_>, args: &[Value]) -> Result<Value, ExecError> {
    let options = args.first().cloned().unwrap_or(Value::Undefined);
    if !matches!(options, Value::Object(_)) {
        return Err(ExecError::runtime("spring expects an options object"));
    }

    let frame = numeric_field(&options, "frame", f64::NAN);
    let fps = numeric_field(&options, "fps", f64::NAN);
    if !frame.is_finite() || !fps.is_finite() || fps <= 0.0 {
        return Err(ExecError::runtime("spring requires numeric frame and fps"));
    }
    let from = numeric_field(&options, "from", 0.0);
    let to = numeric_field(&options, "to", 1.0);

    let config = object_field(&options, "config").unwrap_or(Value::Undefined);
    let damping = numeric_field(&config, "damping", 10.0);
    let mass = numeric_field(&config, "mass", 1.0);
    let stiffness = numeric_field(&config, "stiffness", 100.0);
    if mass <= 0.0 || stiffness <= 0.0 || damping < 0.0 {
        return Err(ExecError::runtime("invalid spring config"));
    }

    let dt = 1.0 / fps;
    let steps = frame.max(0.0).floor() as u64;
    let mut position = from;
    let mut velocity = 0.0;
    for _ in 0..steps {
        interp.step()?;
        let acceleration = (-stiffness * (position - to) - damping * velocity) / mass;
        velocity += acceleration * dt;
        position += velocity * dt;
    }
    Ok(Value::Number(position))
}

fn json_stringify(args: &[Value]) -> Result<Value, ExecError> {
    let value = args.first().cloned().unwrap_or(Value::Undefined);
    if matches!(value, Value::Undefined | Value::Closure(_) | Value::Native(_)) {
        return Ok(Value::Undefined);
    }
    let json = value.to_json();
    let indent = args.get(2).map_or(0.0, Value::as_number);
    let rendered = if indent >= 1.0 {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    }
    .map_err(|e| ExecError::runtime(format!("JSON.stringify failed: {e}")))?;
    Ok(Value::string(rendered))
}

fn math_call(interp: &Interp<'_>, f: MathFn, args: &[Value]) -> Result<Value, ExecError> {
    let arg = |index: usize| args.get(index).map_or(f64::NAN, Value::as_number);
    let result = match f {
        MathFn::Abs => arg(0).abs(),
        MathFn::Floor => arg(0).floor(),
        MathFn::Ceil => arg(0).ceil(),
        MathFn::Round => {
            // Half-way cases round toward positive infinity.
            let n = arg(0);
            (n + 0.5).floor()
        }
        MathFn::Trunc => arg(0).trunc(),
        MathFn::Sign => {
            let n = arg(0);
            if n.is_nan() || n == 0.0 { n } else { n.signum() }
        }
        MathFn::Min => args
            .iter()
            .map(Value::as_number)
            .fold(f64::INFINITY, fold_nan(f64::min)),
        MathFn::Max => args
            .iter()
            .map(Value::as_number)
            .fold(f64::NEG_INFINITY, fold_nan(f64::max)),
        MathFn::Sqrt => arg(0).sqrt(),
        MathFn::Pow => arg(0).powf(arg(1)),
        MathFn::Sin => arg(0).sin(),
        MathFn::Cos => arg(0).cos(),
        MathFn::Tan => arg(0).tan(),
        MathFn::Atan2 => arg(0).atan2(arg(1)),
        MathFn::Log => arg(0).ln(),
        MathFn::Exp => arg(0).exp(),
        MathFn::Random => interp.next_random(),
        MathFn::Hypot => args
            .iter()
            .map(Value::as_number)
            .fold(0.0_f64, |acc, n| acc.hypot(n)),
    };
    Ok(Value::Number(result))
}

/// Wraps a min/max fold so a NaN argument poisons the result.
fn fold_nan(pick: fn(f64, f64) -> f64) -> impl Fn(f64, f64) -> f64 {
    move |acc, n| if n.is_nan() { f64::NAN } else { pick(acc, n) }
}
