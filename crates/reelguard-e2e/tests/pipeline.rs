//! End-to-end scenarios across validation, lowering and execution.

use std::time::Instant;

use reelguard_e2e::{PipelineError, build_composition, render_frame, run_static_pipeline};
use reelguard_exec::{
    ENTRY_COMPONENT_NAME, ExecError, Executor, FrameBudget, Value, VideoConfig,
};
use reelguard_session::{
    DEFAULT_DEBOUNCE, SessionState, ValidationSession, read_directives,
};
use rstest::rstest;

fn init_tracing() {
    drop(tracing_subscriber::fmt().with_test_writer().try_init());
}

const ROUND_TRIP_SOURCE: &str =
    "import { AbsoluteFill } from 'remotion'; const MyComposition = () => <AbsoluteFill/>;";

#[test]
fn generated_composition_round_trips_to_a_renderable_element() {
    init_tracing();
    let rendered = render_frame(ROUND_TRIP_SOURCE, 0).unwrap();
    let Value::Element(element) = rendered else {
        panic!("expected an element, got {rendered:?}");
    };
    assert_eq!(element.tag_name(), Some("AbsoluteFill"));
}

#[test]
fn typed_animated_source_renders_across_frames() {
    init_tracing();
    let source = "// duration: 5s
// fps: 30
import { AbsoluteFill, interpolate, useCurrentFrame } from 'remotion';

type TitleProps = { text: string };

const Title = ({ text }: TitleProps) => {
    const frame = useCurrentFrame();
    const opacity = interpolate(frame, [0, 30], [0, 1], {
        extrapolateRight: 'clamp',
    });
    return <div style={{ opacity }}>{text}</div>;
};

export const MyComposition = () => (
    <AbsoluteFill style={{ backgroundColor: 'black' }}>
        <Title text=\"hello\" />
    </AbsoluteFill>
);";

    let budget = FrameBudget::standard();
    let composition = build_composition(source, &budget).unwrap();

    for frame in [0_u32, 15, 30, 60] {
        budget.reset();
        let rendered = composition
            .render_frame(frame, VideoConfig::default(), &budget)
            .unwrap();
        let json = rendered.to_json();
        assert_eq!(json["tag"], "AbsoluteFill");
        let expected = f64::from(frame.min(30)) / 30.0;
        let opacity = json["children"][0]["props"]["style"]["opacity"]
            .as_f64()
            .unwrap();
        assert!((opacity - expected).abs() < 1e-9, "frame {frame}");
    }
}

#[rstest]
#[case::fetch("fetch('https://evil.example')")]
#[case::dynamic_import("const m = import('remotion');")]
#[case::blocked_member_pair("const c = Object.constructor;")]
#[case::unlisted_import("import fs from 'fs'; const MyComposition = () => null;")]
fn unsafe_source_is_rejected_with_the_generic_message(#[case] source: &str) {
    let snapshot = run_static_pipeline(source);
    assert!(!snapshot.is_valid);
    assert!(snapshot.lowered_code.is_none());
    for error in &snapshot.errors {
        assert_eq!(error.message, "code contains unsafe patterns");
    }
}

#[test]
fn syntax_errors_carry_their_own_generic_message() {
    let snapshot = run_static_pipeline("const MyComposition = () => <AbsoluteFill>;");
    assert!(!snapshot.is_valid);
    assert_eq!(snapshot.errors[0].message, "code contains syntax errors");
}

#[test]
fn wrong_entry_name_passes_statically_but_fails_execution() {
    let source = "const NotMyComposition = () => null;";
    let snapshot = run_static_pipeline(source);
    assert!(snapshot.is_valid, "static stages accept the source");

    let budget = FrameBudget::standard();
    let err = match build_composition(source, &budget) {
        Err(PipelineError::Exec(err)) => err,
        other => panic!("expected an execution failure, got {other:?}"),
    };
    assert_eq!(
        err,
        ExecError::MissingComponent {
            expected: ENTRY_COMPONENT_NAME
        }
    );
    assert!(err.to_string().contains("must define a component"));
}

#[test]
fn math_random_is_allowed_end_to_end() {
    let source = "const MyComposition = () => <div data-x={Math.random()} />;";
    let rendered = render_frame(source, 0).unwrap();
    let Value::Element(element) = rendered else {
        panic!("expected an element");
    };
    let x = element.prop("data-x").map(Value::as_number).unwrap_or(-1.0);
    assert!((0.0..1.0).contains(&x));
}

#[test]
fn pathological_loops_exhaust_the_frame_budget() {
    let source = "const MyComposition = () => {
        let n = 0;
        while (true) { n += 1; }
        return null;
    };";
    let err = match render_frame(source, 0) {
        Err(PipelineError::Exec(err)) => err,
        other => panic!("expected budget exhaustion, got {other:?}"),
    };
    assert_eq!(err, ExecError::BudgetExhausted);
}

#[test]
fn per_frame_budget_reset_supports_long_compositions() {
    let source = "const MyComposition = () => {
        const frame = useCurrentFrame();
        let total = 0;
        for (let i = 0; i < 500; i++) { total += i; }
        return <div total={total} frame={frame} />;
    };";
    let budget = FrameBudget::new(40_000);
    let composition = build_composition(source, &budget).unwrap();
    for frame in 0..20 {
        budget.reset();
        composition
            .render_frame(frame, VideoConfig::default(), &budget)
            .unwrap();
    }
}

#[test]
fn operator_policy_overrides_flow_through_the_session() {
    let policy: reelguard_policy::Allowlist = serde_json::from_value(serde_json::json!({
        "allowed_import_sources": ["react"],
        "allowed_import_prefixes": [],
        "allowed_globals": ["Math"],
        "blocked_identifiers": ["fetch"],
        "blocked_member_pairs": []
    }))
    .unwrap();
    policy.verify().unwrap();

    let mut session = ValidationSession::with_policy(policy);
    let start = Instant::now();
    session.record_edit(
        "import { AbsoluteFill } from 'remotion'; const MyComposition = () => null;",
        start,
    );
    let snapshot = session.poll(start + DEFAULT_DEBOUNCE).unwrap();
    // 'remotion' is not in this operator's allowlist.
    assert!(!snapshot.is_valid);
}

#[test]
fn trust_mode_publishes_valid_without_lowered_code() {
    let mut session = ValidationSession::new();
    session.record_edit("fetch('x');", Instant::now());
    session.reset_to_valid(ROUND_TRIP_SOURCE);

    assert_eq!(session.state(), SessionState::Valid);
    assert!(session.snapshot().is_valid);
    assert!(session.snapshot().lowered_code.is_none());
}

#[test]
fn directives_feed_the_video_config() {
    let source = "// duration: 2s\n// fps: 60\nconst MyComposition = () => <div/>;";
    let directives = read_directives(source);
    let fps = directives.fps.unwrap();
    let config = VideoConfig {
        fps,
        duration_in_frames: (directives.duration_seconds.unwrap() * fps) as u32,
        ..VideoConfig::default()
    };
    assert_eq!(config.duration_in_frames, 120);

    let budget = FrameBudget::standard();
    let composition = build_composition(source, &budget).unwrap();
    budget.reset();
    composition.render_frame(0, config, &budget).unwrap();
}

#[test]
fn executor_rejects_source_that_bypassed_lowering() {
    // Raw markup never reaches the executor in the real wiring; if it does,
    // compilation fails rather than guessing.
    let budget = FrameBudget::standard();
    let err = Executor::standard()
        .execute("const MyComposition = () => <div/>;", &budget)
        .unwrap_err();
    assert!(matches!(
        err,
        ExecError::UnsupportedSyntax { .. } | ExecError::InvalidLoweredSource
    ));
}

#[test]
fn rendered_trees_serialise_for_the_render_surface() {
    let source = "const MyComposition = () =>
        <AbsoluteFill>
            <Sequence from={30}>
                <Img src=\"logo.png\" />
            </Sequence>
        </AbsoluteFill>;";
    let rendered = render_frame(source, 0).unwrap();
    let json = rendered.to_json();
    assert_eq!(json["tag"], "AbsoluteFill");
    assert_eq!(json["children"][0]["tag"], "Sequence");
    assert_eq!(json["children"][0]["props"]["from"], 30.0);
    assert_eq!(json["children"][0]["children"][0]["props"]["src"], "logo.png");
}
