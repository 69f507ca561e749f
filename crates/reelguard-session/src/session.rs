//! The per-session debounce and publication state machine.

use std::time::{Duration, Instant};

use reelguard_policy::Allowlist;
use reelguard_syntax::{ValidationError, lower, validate};
use tracing::debug;

/// How long after the last edit the pipeline re-runs.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// The observable lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No source recorded yet.
    Idle,
    /// An edit is waiting out its debounce interval.
    PendingDebounce,
    /// The last pipeline run accepted the source.
    Valid,
    /// The last pipeline run rejected the source.
    Invalid,
}

/// The published verdict for the session's current source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationSnapshot {
    /// Whether the source may be rendered.
    pub is_valid: bool,
    /// Violations from the last run, empty when valid.
    pub errors: Vec<ValidationError>,
    /// The lowered source, when validation and lowering both succeeded.
    ///
    /// Absent in trust mode: callers fall back to a separately supplied,
    /// already-trusted lowered form.
    pub lowered_code: Option<String>,
}

impl ValidationSnapshot {
    fn initial() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            lowered_code: None,
        }
    }
}

/// One editing surface's validation session.
///
/// Owns the source text, a single-slot debounce deadline and the last
/// published snapshot. Replacing the deadline is the only cancellation
/// primitive: older deadlines simply never fire.
pub struct ValidationSession {
    policy: Allowlist,
    debounce: Duration,
    source: String,
    deadline: Option<Instant>,
    state: SessionState,
    snapshot: ValidationSnapshot,
    trust_mode: bool,
}

impl Default for ValidationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationSession {
    /// Creates a session with the standard policy and debounce interval.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(Allowlist::standard().clone())
    }

    /// Creates a session with an operator-supplied policy.
    #[must_use]
    pub fn with_policy(policy: Allowlist) -> Self {
        Self {
            policy,
            debounce: DEFAULT_DEBOUNCE,
            source: String::new(),
            deadline: None,
            state: SessionState::Idle,
            snapshot: ValidationSnapshot::initial(),
            trust_mode: false,
        }
    }

    /// Overrides the debounce interval.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Records an edit, replacing any pending deadline.
    ///
    /// Any hand edit ends trust mode: the source is no longer the verbatim
    /// generated text, so it must earn validation again.
    pub fn record_edit(&mut self, source: impl Into<String>, now: Instant) {
        self.source = source.into();
        self.trust_mode = false;
        self.deadline = Some(now + self.debounce);
        self.state = SessionState::PendingDebounce;
        debug!(len = self.source.len(), "edit recorded, debounce restarted");
    }

    /// Runs the pipeline if the debounce deadline has passed.
    ///
    /// Returns the freshly published snapshot when a run happened, `None`
    /// otherwise. At most the most recent deadline ever fires.
    pub fn poll(&mut self, now: Instant) -> Option<&ValidationSnapshot> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;
        self.run_pipeline();
        Some(&self.snapshot)
    }

    /// Marks the current source as trusted, bypassing the pipeline.
    ///
    /// For source just produced by the generator and not yet touched by the
    /// user. Cancels any pending deadline and publishes a valid snapshot
    /// with no lowered-code cache.
    pub fn reset_to_valid(&mut self, source: impl Into<String>) {
        self.source = source.into();
        self.trust_mode = true;
        self.deadline = None;
        self.state = SessionState::Valid;
        self.snapshot = ValidationSnapshot::initial();
        debug!("session reset to trusted-valid");
    }

    /// The last published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &ValidationSnapshot {
        &self.snapshot
    }

    /// The current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session is in trust mode.
    #[must_use]
    pub const fn is_trusted(&self) -> bool {
        self.trust_mode
    }

    /// The source text the session currently holds.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    fn run_pipeline(&mut self) {
        let verdict = validate(&self.source, &self.policy);
        if !verdict.valid {
            // Stop here: lowering unvalidated source could leak different
            // error text for different blocked constructs.
            debug!(errors = verdict.errors.len(), "validation rejected source");
            self.state = SessionState::Invalid;
            self.snapshot = ValidationSnapshot {
                is_valid: false,
                errors: verdict.errors,
                lowered_code: None,
            };
            return;
        }

        match lower(&self.source) {
            Ok(lowered) => {
                debug!(lowered_len = lowered.len(), "source validated and lowered");
                self.state = SessionState::Valid;
                self.snapshot = ValidationSnapshot {
                    is_valid: true,
                    errors: Vec::new(),
                    lowered_code: Some(lowered),
                };
            }
            Err(error) => {
                debug!("lowering failed after validation");
                self.state = SessionState::Invalid;
                self.snapshot = ValidationSnapshot {
                    is_valid: false,
                    errors: vec![ValidationError {
                        line: error.line().unwrap_or(1),
                        column: 0,
                        message: error.message().to_owned(),
                    }],
                    lowered_code: None,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const VALID_SOURCE: &str =
        "import { AbsoluteFill } from 'remotion';\nconst MyComposition = () => <AbsoluteFill/>;";

    fn fire(session: &mut ValidationSession, source: &str) -> ValidationSnapshot {
        let start = Instant::now();
        session.record_edit(source, start);
        session
            .poll(start + DEFAULT_DEBOUNCE)
            .expect("deadline should have fired")
            .clone()
    }

    #[test]
    fn starts_idle_with_a_benign_snapshot() {
        let session = ValidationSession::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.snapshot().is_valid);
        assert!(session.snapshot().lowered_code.is_none());
    }

    #[test]
    fn poll_before_the_deadline_does_nothing() {
        let mut session = ValidationSession::new();
        let start = Instant::now();
        session.record_edit(VALID_SOURCE, start);

        assert_eq!(session.state(), SessionState::PendingDebounce);
        assert!(session.poll(start).is_none());
        assert!(
            session
                .poll(start + DEFAULT_DEBOUNCE - Duration::from_millis(1))
                .is_none()
        );
        assert_eq!(session.state(), SessionState::PendingDebounce);
    }

    #[test]
    fn valid_source_publishes_lowered_code() {
        let mut session = ValidationSession::new();
        let snapshot = fire(&mut session, VALID_SOURCE);

        assert!(snapshot.is_valid);
        let lowered = snapshot.lowered_code.expect("lowered code");
        assert!(lowered.contains("createElement(AbsoluteFill"));
        assert_eq!(session.state(), SessionState::Valid);
    }

    #[test]
    fn invalid_source_publishes_errors_without_lowering() {
        let mut session = ValidationSession::new();
        let snapshot = fire(&mut session, "fetch('https://evil.example');");

        assert!(!snapshot.is_valid);
        assert!(!snapshot.errors.is_empty());
        assert!(snapshot.lowered_code.is_none());
        assert_eq!(session.state(), SessionState::Invalid);
    }

    #[test]
    fn a_new_edit_replaces_the_pending_deadline() {
        let mut session = ValidationSession::new();
        let start = Instant::now();

        session.record_edit("fetch('x');", start);
        session.record_edit(VALID_SOURCE, start + Duration::from_millis(100));

        // The first edit's deadline never fires.
        assert!(session.poll(start + DEFAULT_DEBOUNCE).is_none());

        let snapshot = session
            .poll(start + Duration::from_millis(100) + DEFAULT_DEBOUNCE)
            .expect("second deadline");
        assert!(snapshot.is_valid);
    }

    #[test]
    fn each_deadline_fires_at_most_once() {
        let mut session = ValidationSession::new();
        let start = Instant::now();
        session.record_edit(VALID_SOURCE, start);

        assert!(session.poll(start + DEFAULT_DEBOUNCE).is_some());
        assert!(session.poll(start + DEFAULT_DEBOUNCE * 2).is_none());
    }

    #[test]
    fn reset_to_valid_bypasses_the_pipeline() {
        let mut session = ValidationSession::new();
        let start = Instant::now();
        session.record_edit("fetch('x');", start);

        session.reset_to_valid("freshly generated source");

        assert!(session.is_trusted());
        assert_eq!(session.state(), SessionState::Valid);
        assert!(session.snapshot().is_valid);
        assert!(session.snapshot().lowered_code.is_none());
        // The cancelled deadline never fires.
        assert!(session.poll(start + DEFAULT_DEBOUNCE).is_none());
    }

    #[test]
    fn an_edit_ends_trust_mode() {
        let mut session = ValidationSession::new();
        session.reset_to_valid(VALID_SOURCE);
        assert!(session.is_trusted());

        session.record_edit(VALID_SOURCE, Instant::now());
        assert!(!session.is_trusted());
        assert_eq!(session.state(), SessionState::PendingDebounce);
    }

    #[rstest]
    #[case("const x = <div>;", "code contains syntax errors")]
    #[case("eval('1');", "code contains unsafe patterns")]
    fn error_messages_stay_generic(#[case] source: &str, #[case] expected: &str) {
        let mut session = ValidationSession::new();
        let snapshot = fire(&mut session, source);
        assert!(!snapshot.is_valid);
        assert_eq!(snapshot.errors[0].message, expected);
    }

    #[test]
    fn custom_debounce_interval_is_honoured() {
        let mut session = ValidationSession::new().with_debounce(Duration::from_millis(50));
        let start = Instant::now();
        session.record_edit(VALID_SOURCE, start);

        assert!(session.poll(start + Duration::from_millis(49)).is_none());
        assert!(session.poll(start + Duration::from_millis(50)).is_some());
    }
}
