//! Committed default allowlist tables.
//!
//! Everything the pipeline permits or forbids by default is listed here and
//! nowhere else, so the whole policy is reviewable as one diff. Entries are
//! kept sorted.

/// Module specifiers that may be imported verbatim.
pub(crate) const ALLOWED_IMPORT_SOURCES: &[&str] = &["react", "remotion"];

/// Namespace prefixes under which any import is permitted.
///
/// Matched by exact string prefix; every entry must end with `/`.
pub(crate) const ALLOWED_IMPORT_PREFIXES: &[&str] = &["@remotion/"];

/// Globals the executor supplies to generated code.
pub(crate) const ALLOWED_GLOBALS: &[&str] = &["Infinity", "JSON", "Math", "NaN", "undefined"];

/// Identifiers rejected wherever they appear, including as shadowed locals.
pub(crate) const BLOCKED_IDENTIFIERS: &[&str] = &[
    "Function",
    "WebSocket",
    "Worker",
    "XMLHttpRequest",
    "alert",
    "document",
    "eval",
    "fetch",
    "globalThis",
    "importScripts",
    "indexedDB",
    "localStorage",
    "navigator",
    "process",
    "require",
    "sessionStorage",
    "setInterval",
    "setTimeout",
    "window",
];

/// `object.property` accesses rejected even when the object is permitted.
///
/// These close off prototype-chain escapes from globals that are otherwise
/// allowed (`Math.constructor` reaches `Function`).
pub(crate) const BLOCKED_MEMBER_PAIRS: &[(&str, &str)] = &[
    ("Function", "prototype"),
    ("JSON", "constructor"),
    ("Math", "constructor"),
    ("Object", "constructor"),
    ("Object", "getPrototypeOf"),
    ("Object", "setPrototypeOf"),
    ("Reflect", "construct"),
];
