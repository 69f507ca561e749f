//! Allowlist data model and membership predicates.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::defaults;
use crate::error::PolicyError;

/// An `object.property` pair that is forbidden as a member access.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
pub struct MemberPair {
    /// Name of the object being accessed.
    pub object: String,
    /// Name of the property accessed on it.
    pub property: String,
}

impl MemberPair {
    /// Creates a member pair.
    #[must_use]
    pub fn new(object: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            property: property.into(),
        }
    }
}

/// The capability allowlist applied to generated source.
///
/// Immutable once constructed. The validator consults the import and
/// blocklist predicates; the executor's capability set mirrors
/// [`Allowlist::is_global_allowed`]. Use [`Allowlist::standard`] for the
/// committed default policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Allowlist {
    /// Module specifiers importable verbatim.
    allowed_import_sources: BTreeSet<String>,
    /// Namespace prefixes under which any import is permitted.
    allowed_import_prefixes: Vec<String>,
    /// Globals the executor supplies.
    allowed_globals: BTreeSet<String>,
    /// Identifiers forbidden wherever they appear.
    blocked_identifiers: BTreeSet<String>,
    /// Member accesses forbidden even on permitted objects.
    blocked_member_pairs: BTreeSet<MemberPair>,
}

/// Process-wide default policy, built once.
static STANDARD: Lazy<Allowlist> = Lazy::new(Allowlist::built_in);

impl Allowlist {
    /// Returns the committed default policy.
    #[must_use]
    pub fn standard() -> &'static Self {
        &STANDARD
    }

    fn built_in() -> Self {
        Self {
            allowed_import_sources: defaults::ALLOWED_IMPORT_SOURCES
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            allowed_import_prefixes: defaults::ALLOWED_IMPORT_PREFIXES
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            allowed_globals: defaults::ALLOWED_GLOBALS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            blocked_identifiers: defaults::BLOCKED_IDENTIFIERS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            blocked_member_pairs: defaults::BLOCKED_MEMBER_PAIRS
                .iter()
                .map(|(o, p)| MemberPair::new(*o, *p))
                .collect(),
        }
    }

    /// Checks structural invariants after deserialising operator overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a prefix does not end with `/` or a member pair
    /// entry is missing a side.
    pub fn verify(&self) -> Result<(), PolicyError> {
        for prefix in &self.allowed_import_prefixes {
            if !prefix.ends_with('/') {
                return Err(PolicyError::invalid_import_prefix(prefix));
            }
        }
        for pair in &self.blocked_member_pairs {
            if pair.object.is_empty() || pair.property.is_empty() {
                return Err(PolicyError::invalid_member_pair(format!(
                    "{}.{}",
                    pair.object, pair.property
                )));
            }
        }
        Ok(())
    }

    /// Returns whether an import specifier is permitted.
    ///
    /// A specifier passes if it matches an allowed source exactly, or
    /// starts with one of the permitted namespace prefixes. No other
    /// wildcarding exists.
    #[must_use]
    pub fn is_import_allowed(&self, source: &str) -> bool {
        self.allowed_import_sources.contains(source)
            || self
                .allowed_import_prefixes
                .iter()
                .any(|prefix| source.starts_with(prefix.as_str()))
    }

    /// Returns whether an identifier name is forbidden.
    #[must_use]
    pub fn is_identifier_blocked(&self, name: &str) -> bool {
        self.blocked_identifiers.contains(name)
    }

    /// Returns whether an `object.property` access is forbidden.
    #[must_use]
    pub fn is_member_pair_blocked(&self, object: &str, property: &str) -> bool {
        self.blocked_member_pairs
            .iter()
            .any(|pair| pair.object == object && pair.property == property)
    }

    /// Returns whether a base-language global is part of the permitted set.
    #[must_use]
    pub fn is_global_allowed(&self, name: &str) -> bool {
        self.allowed_globals.contains(name)
    }

    /// Iterates the permitted base-language globals.
    pub fn allowed_globals(&self) -> impl Iterator<Item = &str> {
        self.allowed_globals.iter().map(String::as_str)
    }
}
