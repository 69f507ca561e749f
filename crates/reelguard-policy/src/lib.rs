//! Capability allowlist for generated animation code.
//!
//! This crate holds the authoritative description of what model-generated
//! source is permitted to reference: which module specifiers may be
//! imported, which globals the executor will supply, which identifiers are
//! forbidden outright, and which `object.property` pairs are forbidden even
//! when the object itself is otherwise permitted.
//!
//! The allowlist is configuration, not logic. The committed defaults live
//! in [`defaults`] as a single reviewable table; any change to that table
//! is a security-relevant change and should be treated as such in review.

mod allowlist;
mod defaults;
mod error;

pub use allowlist::{Allowlist, MemberPair};
pub use error::PolicyError;
