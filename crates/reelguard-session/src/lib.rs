//! Debounced validation orchestration for one editing session.
//!
//! An editing surface feeds every keystroke into a [`ValidationSession`].
//! The session debounces edits with a single replaceable deadline, re-runs
//! validation and lowering when the deadline fires, and exposes one
//! consistent [`ValidationSnapshot`] to the rest of the application.
//! Freshly generated, not-yet-edited source can bypass the pipeline through
//! trust mode.
//!
//! Everything is synchronous and clock-driven: the caller supplies
//! `Instant`s to [`ValidationSession::record_edit`] and
//! [`ValidationSession::poll`], which keeps the state machine deterministic
//! under test and leaves timer ownership to the host event loop.

mod directives;
mod session;

pub use directives::{Directives, read_directives};
pub use session::{DEFAULT_DEBOUNCE, SessionState, ValidationSession, ValidationSnapshot};
