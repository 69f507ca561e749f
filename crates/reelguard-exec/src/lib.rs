//! Scoped execution of lowered animation code.
//!
//! The executor never builds executable code from strings. The lowered
//! source is compiled once into an in-process AST restricted to exactly the
//! statement and expression shapes the validated dialect uses, then run by
//! a tree-walking interpreter whose root scope contains nothing but the
//! explicitly injected capability set: element construction, the frame
//! hooks, the animation primitives and the permitted base globals. There is
//! no ambient scope, no host access, and no dynamic-eval facility anywhere
//! in the trust boundary.
//!
//! Every interpreter step charges an externally owned [`FrameBudget`]. The
//! render loop resets the budget before each frame, so a long animation
//! never saturates a counter that was only sized for one frame.
//!
//! All failures (compile, top-level evaluation, per-frame rendering) are
//! returned as [`ExecError`] data. Nothing panics across this boundary: in
//! a cloud render job a single bad frame must become a visible fallback,
//! not a crashed process.

mod ast;
mod budget;
mod capabilities;
mod compile;
mod error;
mod executor;
mod frame;
mod interp;
mod methods;
mod value;

pub use budget::FrameBudget;
pub use capabilities::ENTRY_COMPONENT_NAME;
pub use error::ExecError;
pub use executor::{Composition, Executor};
pub use frame::VideoConfig;
pub use value::{Element, Value};
