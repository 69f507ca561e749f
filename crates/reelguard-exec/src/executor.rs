//! Compiling lowered source and rendering frames from it.

use tracing::debug;

use crate::budget::FrameBudget;
use crate::capabilities::{self, ENTRY_COMPONENT_NAME};
use crate::compile;
use crate::error::ExecError;
use crate::frame::{FrameContext, VideoConfig};
use crate::interp::Interp;
use crate::value::Value;

/// Compiles lowered source into renderable compositions.
#[derive(Debug, Default, Clone, Copy)]
pub struct Executor;

impl Executor {
    /// Creates an executor with the standard capability set.
    #[must_use]
    pub fn standard() -> Self {
        Self
    }

    /// Compiles lowered source and evaluates its top level.
    ///
    /// Top-level evaluation runs without a frame context, so the frame
    /// hooks fail there; generated code calls them inside the component.
    /// The budget meters top-level work the same way it meters frames.
    pub fn execute(
        &self,
        lowered: &str,
        budget: &FrameBudget,
    ) -> Result<Composition, ExecError> {
        let program = compile::compile(lowered)?;
        debug!(statements = program.body.len(), "compiled lowered source");

        let scope = capabilities::root_scope();
        let interp = Interp::new(budget, None);
        interp.exec_block(&program.body, &scope)?;

        let component = scope
            .lookup(ENTRY_COMPONENT_NAME)
            .ok_or(ExecError::MissingComponent {
                expected: ENTRY_COMPONENT_NAME,
            })?;
        if !component.is_callable() {
            return Err(ExecError::NotAComponent {
                expected: ENTRY_COMPONENT_NAME,
            });
        }

        Ok(Composition { component })
    }
}

/// An executed program with its resolved entry component.
///
/// The component closure keeps the top-level scope alive, so module-level
/// helpers and constants remain visible across frames.
#[derive(Debug)]
pub struct Composition {
    component: Value,
}

impl Composition {
    /// Renders one frame by calling the entry component.
    ///
    /// The caller owns the budget and is expected to reset it before each
    /// frame. The result is the element tree, or `null` for an empty frame.
    pub fn render_frame(
        &self,
        frame: u32,
        config: VideoConfig,
        budget: &FrameBudget,
    ) -> Result<Value, ExecError> {
        let interp = Interp::new(budget, Some(FrameContext { frame, config }));
        let rendered = interp.call(&self.component, vec![Value::object(Vec::new())])?;
        match rendered {
            Value::Element(_) | Value::Null => {
                debug!(frame, steps = budget.used(), "rendered frame");
                Ok(rendered)
            }
            other => Err(ExecError::runtime(format!(
                "{ENTRY_COMPONENT_NAME} must return an element or null, got {}",
                other.type_of()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::value::Element;

    fn render(source: &str, frame: u32) -> Result<Value, ExecError> {
        let budget = FrameBudget::standard();
        let composition = Executor::standard().execute(source, &budget)?;
        budget.reset();
        composition.render_frame(frame, VideoConfig::default(), &budget)
    }

    fn element(value: &Value) -> &Element {
        match value {
            Value::Element(element) => element,
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn renders_a_simple_component() {
        let out = render(
            "const MyComposition = () => createElement(\"div\", null, \"hi\");",
            0,
        )
        .unwrap();
        let el = element(&out);
        assert_eq!(el.tag_name(), Some("div"));
        assert!(matches!(&el.children[0], Value::Str(s) if s.as_ref() == "hi"));
    }

    #[test]
    fn missing_entry_component_is_reported() {
        let budget = FrameBudget::standard();
        let err = Executor::standard()
            .execute("const Other = () => null;", &budget)
            .unwrap_err();
        assert_eq!(
            err,
            ExecError::MissingComponent {
                expected: ENTRY_COMPONENT_NAME
            }
        );
        assert!(err.to_string().contains("MyComposition"));
    }

    #[test]
    fn non_function_entry_is_reported() {
        let budget = FrameBudget::standard();
        let err = Executor::standard()
            .execute("const MyComposition = 5;", &budget)
            .unwrap_err();
        assert_eq!(
            err,
            ExecError::NotAComponent {
                expected: ENTRY_COMPONENT_NAME
            }
        );
    }

    #[test]
    fn use_current_frame_tracks_the_rendered_frame() {
        let source = "const MyComposition = () => {
            const frame = useCurrentFrame();
            return createElement(\"div\", { opacity: frame / 30 });
        };";
        let out = render(source, 15).unwrap();
        let opacity = element(&out).prop("opacity").map(Value::as_number);
        assert_eq!(opacity, Some(0.5));
    }

    #[test]
    fn use_video_config_exposes_composition_parameters() {
        let source = "const MyComposition = () => {
            const { width, fps } = useVideoConfig();
            return createElement(\"div\", null, width + \"x\" + fps);
        };";
        let out = render(source, 0).unwrap();
        assert!(matches!(&element(&out).children[0], Value::Str(s) if s.as_ref() == "1920x30"));
    }

    #[test]
    fn intrinsic_components_build_elements() {
        let source = "const MyComposition = () =>
            createElement(AbsoluteFill, { style: { backgroundColor: \"black\" } },
                createElement(Img, { src: \"logo.png\" }));";
        let out = render(source, 0).unwrap();
        let el = element(&out);
        assert_eq!(el.tag_name(), Some("AbsoluteFill"));
        assert_eq!(element(&el.children[0]).tag_name(), Some("Img"));
    }

    #[test]
    fn user_components_are_invoked_with_props_and_children() {
        let source = "const Label = ({ text, children }) =>
            createElement(\"span\", null, text, children);
        const MyComposition = () =>
            createElement(Label, { text: \"a\" }, \"b\");";
        let out = render(source, 0).unwrap();
        let el = element(&out);
        assert_eq!(el.tag_name(), Some("span"));
        assert_eq!(el.children.len(), 2);
    }

    #[test]
    fn animation_primitives_are_available() {
        let source = "const MyComposition = () => {
            const frame = useCurrentFrame();
            const { fps } = useVideoConfig();
            const opacity = interpolate(frame, [0, 30], [0, 1], {
                extrapolateRight: \"clamp\",
            });
            const scale = spring({ frame, fps });
            return createElement(\"div\", { opacity, scale });
        };";
        let out = render(source, 60).unwrap();
        let el = element(&out);
        assert_eq!(el.prop("opacity").map(Value::as_number), Some(1.0));
        let scale = el.prop("scale").map(Value::as_number).unwrap_or_default();
        assert!((scale - 1.0).abs() < 1e-2);
    }

    #[test]
    fn null_frames_are_permitted() {
        let out = render("const MyComposition = () => null;", 0).unwrap();
        assert!(matches!(out, Value::Null));
    }

    #[test]
    fn non_element_returns_are_rejected() {
        let err = render("const MyComposition = () => 42;", 0).unwrap_err();
        assert!(matches!(err, ExecError::Runtime { .. }));
    }

    #[test]
    fn unbound_names_fail_at_runtime() {
        let err = render(
            "const MyComposition = () => { fetch(\"http://x\"); return null; };",
            0,
        )
        .unwrap_err();
        assert!(err.to_string().contains("fetch is not defined"));
    }

    #[test]
    fn infinite_loops_exhaust_the_budget() {
        let source = "const MyComposition = () => {
            let n = 0;
            while (true) { n = n + 1; }
            return null;
        };";
        let err = render(source, 0).unwrap_err();
        assert_eq!(err, ExecError::BudgetExhausted);
    }

    #[test]
    fn budget_resets_allow_long_compositions() {
        let budget = FrameBudget::new(50_000);
        let source = "const MyComposition = () => {
            let total = 0;
            for (let i = 0; i < 1000; i++) { total += i; }
            return createElement(\"div\", { total });
        };";
        let composition = Executor::standard().execute(source, &budget).unwrap();
        for frame in 0..5 {
            budget.reset();
            composition
                .render_frame(frame, VideoConfig::default(), &budget)
                .unwrap();
        }
    }

    #[test]
    fn budget_carries_over_without_reset() {
        let budget = FrameBudget::new(20_000);
        let source = "const MyComposition = () => {
            let total = 0;
            for (let i = 0; i < 1000; i++) { total += i; }
            return null;
        };";
        let composition = Executor::standard().execute(source, &budget).unwrap();
        let mut failed = false;
        for frame in 0..10 {
            if composition
                .render_frame(frame, VideoConfig::default(), &budget)
                .is_err()
            {
                failed = true;
                break;
            }
        }
        assert!(failed, "an unreset budget must eventually exhaust");
    }

    #[test]
    fn runaway_recursion_overflows_the_call_stack() {
        let source = "const loop = () => loop();
        const MyComposition = () => { loop(); return null; };";
        let err = render(source, 0).unwrap_err();
        assert_eq!(err, ExecError::StackOverflow);
    }

    #[test]
    fn top_level_frame_hook_use_fails() {
        let budget = FrameBudget::standard();
        let err = Executor::standard()
            .execute("const frame = useCurrentFrame();", &budget)
            .unwrap_err();
        assert!(matches!(err, ExecError::Runtime { .. }));
    }

    #[rstest]
    #[case("Math.min(3, 1, 2)", 1.0)]
    #[case("Math.round(2.5)", 3.0)]
    #[case("Math.abs(-4)", 4.0)]
    #[case("Math.hypot(3, 4)", 5.0)]
    fn math_helpers_compute(#[case] expr: &str, #[case] expected: f64) {
        let source = format!(
            "const MyComposition = () => createElement(\"div\", {{ value: {expr} }});"
        );
        let out = render(&source, 0).unwrap();
        assert_eq!(
            element(&out).prop("value").map(Value::as_number),
            Some(expected)
        );
    }

    #[test]
    fn json_stringify_serialises_objects() {
        let source = "const MyComposition = () =>
            createElement(\"div\", { data: JSON.stringify({ a: 1, b: [true, null] }) });";
        let out = render(source, 0).unwrap();
        let data = element(&out).prop("data").map(Value::to_display_string);
        assert_eq!(data.as_deref(), Some("{\"a\":1.0,\"b\":[true,null]}"));
    }

    #[test]
    fn fresh_capabilities_per_execution() {
        let budget = FrameBudget::standard();
        let tamper = "Math.min = 0; const MyComposition = () => null;";
        Executor::standard().execute(tamper, &budget).unwrap();

        budget.reset();
        let source = "const MyComposition = () => createElement(\"div\", { v: Math.min(1, 2) });";
        let composition = Executor::standard().execute(source, &budget).unwrap();
        budget.reset();
        let out = composition
            .render_frame(0, VideoConfig::default(), &budget)
            .unwrap();
        assert_eq!(element(&out).prop("v").map(Value::as_number), Some(1.0));
    }
}
