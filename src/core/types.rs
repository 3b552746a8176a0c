//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`Oid`] - Remote object identifier (40-hex SHA)
//! - [`BranchName`] - Validated Git branch name
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, so ref-resolution and ref-update code never
//! has to re-check its inputs.
//!
//! # Examples
//!
//! ```
//! use graftwork::core::types::{BranchName, Oid};
//!
//! let branch = BranchName::new("release/1.0").unwrap();
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//!
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),
}

/// A remote object identifier (blob, tree, or commit SHA).
///
/// Exactly 40 hex characters, normalized to lowercase. This is the only
/// currency accepted by object-creation and ref-update operations; branch
/// and tag names must be resolved to an `Oid` first.
///
/// # Example
///
/// ```
/// use graftwork::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id, normalized to lowercase.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` unless the string is exactly 40 hex
    /// characters.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if Self::looks_like_sha(&oid) {
            Ok(Self(oid))
        } else {
            Err(TypeError::InvalidOid(oid))
        }
    }

    /// Whether a string has the shape of a full 40-hex SHA.
    ///
    /// Used to short-circuit ref resolution: a full SHA resolves to itself
    /// without a network round-trip.
    pub fn looks_like_sha(s: &str) -> bool {
        s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form (first `len` characters).
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated Git branch name.
///
/// Branch names must conform to Git's refname rules (see
/// `git check-ref-format`): non-empty, no leading `.` or `-`, no trailing
/// `.lock` or `/`, no `..`, `@{`, `//`, control characters, or the
/// characters `space ~ ^ : \ ? * [`, and not exactly `@`.
///
/// # Example
///
/// ```
/// use graftwork::core::types::BranchName;
///
/// let name = BranchName::new("rel_1.0_dev").unwrap();
/// assert_eq!(name.as_str(), "rel_1.0_dev");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("has space").is_err());
/// assert!(BranchName::new("branch.lock").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's
    /// refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        let fail = |why: &str| Err(TypeError::InvalidBranchName(why.to_string()));

        if name.is_empty() {
            return fail("branch name cannot be empty");
        }
        if name == "@" {
            return fail("branch name cannot be '@' (reserved)");
        }
        if name.starts_with('.') || name.starts_with('-') {
            return fail("branch name cannot start with '.' or '-'");
        }
        if name.ends_with('/') {
            return fail("branch name cannot end with '/'");
        }
        for bad in ["..", "@{", "//"] {
            if name.contains(bad) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{bad}'"
                )));
            }
        }
        for c in name.chars() {
            if c.is_ascii_control() {
                return fail("branch name cannot contain control characters");
            }
            if [' ', '~', '^', ':', '\\', '?', '*', '['].contains(&c) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{c}'"
                )));
            }
        }
        // Per-component rules: no hidden components, no .lock suffix anywhere
        for component in name.split('/') {
            if component.starts_with('.') {
                return fail("path component cannot start with '.'");
            }
            if component.ends_with(".lock") {
                return fail("path component cannot end with '.lock'");
            }
        }

        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod oid {
        use super::*;

        #[test]
        fn accepts_full_sha_and_normalizes_case() {
            let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
            assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
        }

        #[test]
        fn rejects_short_and_long_strings() {
            assert!(Oid::new("abc123").is_err());
            assert!(Oid::new("a".repeat(41)).is_err());
        }

        #[test]
        fn rejects_non_hex() {
            assert!(Oid::new("zzz123def4567890abc123def4567890abc12345").is_err());
        }

        #[test]
        fn looks_like_sha_matches_validation() {
            assert!(Oid::looks_like_sha(
                "0123456789abcdef0123456789abcdef01234567"
            ));
            assert!(!Oid::looks_like_sha("main"));
            assert!(!Oid::looks_like_sha("v1.0.2"));
        }

        #[test]
        fn short_abbreviates() {
            let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
            assert_eq!(oid.short(7), "abc123d");
            assert_eq!(oid.short(100), oid.as_str());
        }

        #[test]
        fn serde_round_trip() {
            let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
            let json = serde_json::to_string(&oid).unwrap();
            let back: Oid = serde_json::from_str(&json).unwrap();
            assert_eq!(oid, back);
        }

        #[test]
        fn serde_rejects_invalid() {
            let result: Result<Oid, _> = serde_json::from_str("\"nope\"");
            assert!(result.is_err());
        }
    }

    mod branch_name {
        use super::*;

        #[test]
        fn accepts_typical_names() {
            for name in ["main", "rel_1.0_dev", "feature/patch-delivery", "user@host"] {
                assert!(BranchName::new(name).is_ok(), "expected ok: {name}");
            }
        }

        #[test]
        fn rejects_invalid_names() {
            for name in [
                "",
                "@",
                ".hidden",
                "-flag",
                "bad..name",
                "bad@{name",
                "a//b",
                "end/",
                "has space",
                "tab\tname",
                "wild*card",
                "branch.lock",
                "nested/.hidden",
                "nested/x.lock",
            ] {
                assert!(BranchName::new(name).is_err(), "expected err: {name}");
            }
        }

        #[test]
        fn display_round_trips() {
            let name = BranchName::new("release/2.4").unwrap();
            assert_eq!(name.to_string(), "release/2.4");
        }
    }
}
