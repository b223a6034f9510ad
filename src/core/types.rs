//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ResType`] - Four-byte resource type code
//! - [`ResourceKey`] - Resource identity: (type, id)
//! - [`ResourceRecord`] - A resource with its opaque payload and attributes
//! - [`VersionLabel`] - Validated OS release label naming a snapshot
//!
//! # Validation
//!
//! These types enforce validity at construction time. A type code is always
//! exactly four bytes and a version label is always usable as a file name.
//!
//! # Examples
//!
//! ```
//! use forkmerge::core::types::{ResType, ResourceKey, VersionLabel};
//!
//! let key = ResourceKey::new(ResType::new("ptch").unwrap(), -20217);
//! assert_eq!(key.to_string(), "'ptch' -20217");
//!
//! let label = VersionLabel::new("7.6.1").unwrap();
//! assert!(label.is_release());
//!
//! assert!(ResType::new("toolong").is_err());
//! assert!(VersionLabel::new("../etc").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid resource type: {0}")]
    InvalidResType(String),

    #[error("invalid version label: {0}")]
    InvalidVersionLabel(String),
}

/// A four-byte resource type code such as `ptch` or `STR#`.
///
/// Type codes are raw bytes. The string form maps each byte to the Unicode
/// code point of the same value, so only characters up to U+00FF are
/// accepted. Ordering is raw byte order.
///
/// # Example
///
/// ```
/// use forkmerge::core::types::ResType;
///
/// let t = ResType::new("STR#").unwrap();
/// assert_eq!(t.as_bytes(), b"STR#");
/// assert_eq!(t.to_string(), "STR#");
///
/// assert!(ResType::new("abc").is_err());
/// assert!(ResType::new("ab\u{2022}d").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResType([u8; 4]);

impl ResType {
    /// Create a type code from its four-character string form.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidResType` unless the string is exactly four
    /// characters, each at most U+00FF.
    pub fn new(code: &str) -> Result<Self, TypeError> {
        let mut bytes = [0u8; 4];
        let mut len = 0;
        for c in code.chars() {
            if len == 4 {
                return Err(TypeError::InvalidResType(format!(
                    "'{code}' is longer than four characters"
                )));
            }
            bytes[len] = u8::try_from(u32::from(c)).map_err(|_| {
                TypeError::InvalidResType(format!("'{code}' contains non-byte character '{c}'"))
            })?;
            len += 1;
        }
        if len != 4 {
            return Err(TypeError::InvalidResType(format!(
                "'{code}' is shorter than four characters"
            )));
        }
        Ok(Self(bytes))
    }

    /// Create a type code from raw bytes.
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl TryFrom<String> for ResType {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl TryFrom<&str> for ResType {
    type Error = TypeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ResType> for String {
    fn from(t: ResType) -> Self {
        t.to_string()
    }
}

impl std::fmt::Display for ResType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in self.0 {
            write!(f, "{}", char::from(b))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ResType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ResType('{}')", self)
    }
}

/// Identity of a resource within a fork.
///
/// Two records are the same resource exactly when their keys are equal.
/// The derived ordering (type bytes, then id) is the canonical output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Resource type code.
    pub res_type: ResType,
    /// Signed 16-bit resource id.
    pub id: i16,
}

impl ResourceKey {
    /// Create a new key.
    pub fn new(res_type: ResType, id: i16) -> Self {
        Self { res_type, id }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' {}", self.res_type, self.id)
    }
}

/// One resource: its key, opaque payload and opaque attributes.
///
/// Nothing in this crate looks inside `data` except the conditional guard's
/// byte-pattern search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    /// Resource identity.
    pub key: ResourceKey,
    /// Optional resource name.
    pub name: Option<String>,
    /// Attribute flags byte, carried through untouched.
    pub attributes: u8,
    /// Payload bytes.
    pub data: Vec<u8>,
}

impl ResourceRecord {
    /// Create an unnamed record with no attributes set.
    pub fn new(key: ResourceKey, data: impl Into<Vec<u8>>) -> Self {
        Self {
            key,
            name: None,
            attributes: 0,
            data: data.into(),
        }
    }

    /// Set the resource name (builder pattern).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the attribute flags (builder pattern).
    pub fn with_attributes(mut self, attributes: u8) -> Self {
        self.attributes = attributes;
        self
    }

    /// Shorthand for the record's type code.
    pub fn res_type(&self) -> ResType {
        self.key.res_type
    }

    /// Shorthand for the record's id.
    pub fn id(&self) -> i16 {
        self.key.id
    }

    /// Check whether `pattern` occurs anywhere in the payload.
    ///
    /// An empty pattern occurs in every payload.
    pub fn data_contains(&self, pattern: &[u8]) -> bool {
        pattern.is_empty() || self.data.windows(pattern.len()).any(|w| w == pattern)
    }
}

/// A label naming one OS release snapshot, e.g. `7.6.1` or `9.2.2`.
///
/// Labels double as file names under the sample-systems directory, so they
/// cannot be empty, cannot contain path separators and cannot start with `.`.
///
/// # Example
///
/// ```
/// use forkmerge::core::types::VersionLabel;
///
/// let v = VersionLabel::new("7.5.3").unwrap();
/// assert_eq!(v.release_number(), Some(753));
///
/// let other = VersionLabel::new("DT_8.1_PPC").unwrap();
/// assert!(!other.is_release());
/// assert_eq!(other.release_number(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionLabel(String);

impl VersionLabel {
    /// Create a new validated label.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidVersionLabel` if the label is not a usable
    /// file name.
    pub fn new(label: impl Into<String>) -> Result<Self, TypeError> {
        let label = label.into();
        if label.is_empty() {
            return Err(TypeError::InvalidVersionLabel(
                "label cannot be empty".into(),
            ));
        }
        if label.starts_with('.') {
            return Err(TypeError::InvalidVersionLabel(format!(
                "'{label}' cannot start with '.'"
            )));
        }
        if label.contains(['/', '\\']) || label.chars().any(|c| c.is_control()) {
            return Err(TypeError::InvalidVersionLabel(format!(
                "'{label}' contains a path separator or control character"
            )));
        }
        Ok(Self(label))
    }

    /// Get the label as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether this is a plain `D.D.D` release label.
    pub fn is_release(&self) -> bool {
        let b = self.0.as_bytes();
        b.len() == 5
            && b[0].is_ascii_digit()
            && b[1] == b'.'
            && b[2].is_ascii_digit()
            && b[3] == b'.'
            && b[4].is_ascii_digit()
    }

    /// The release digits read as one decimal number (`7.6.1` is 761).
    ///
    /// Returns `None` for labels that are not `D.D.D` releases.
    pub fn release_number(&self) -> Option<u32> {
        if !self.is_release() {
            return None;
        }
        Some(
            self.0
                .bytes()
                .filter(u8::is_ascii_digit)
                .fold(0, |acc, d| acc * 10 + u32::from(d - b'0')),
        )
    }
}

impl TryFrom<String> for VersionLabel {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<VersionLabel> for String {
    fn from(label: VersionLabel) -> Self {
        label.0
    }
}

impl AsRef<str> for VersionLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VersionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod res_type {
        use super::*;

        #[test]
        fn valid_codes() {
            assert!(ResType::new("ptch").is_ok());
            assert!(ResType::new("STR#").is_ok());
            assert!(ResType::new("p2u#").is_ok());
            assert!(ResType::new("    ").is_ok());
        }

        #[test]
        fn wrong_length_rejected() {
            assert!(ResType::new("").is_err());
            assert!(ResType::new("abc").is_err());
            assert!(ResType::new("abcde").is_err());
        }

        #[test]
        fn high_latin1_accepted() {
            let t = ResType::new("ab\u{a9}d").unwrap();
            assert_eq!(t.as_bytes(), &[b'a', b'b', 0xA9, b'd']);
            assert_eq!(t.to_string(), "ab\u{a9}d");
        }

        #[test]
        fn beyond_latin1_rejected() {
            let err = ResType::new("ab\u{2122}d").unwrap_err();
            assert!(matches!(err, TypeError::InvalidResType(_)));
        }

        #[test]
        fn ordering_is_byte_order() {
            let upper = ResType::new("AAAA").unwrap();
            let lower = ResType::new("zzzz").unwrap();
            let high = ResType::from_bytes([0x80, b'a', b'a', b'a']);
            assert!(upper < lower);
            assert!(lower < high);
        }

        #[test]
        fn serde_roundtrip() {
            let t = ResType::new("DRVR").unwrap();
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, "\"DRVR\"");
            let parsed: ResType = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, t);
        }

        #[test]
        fn serde_rejects_bad_code() {
            let result: Result<ResType, _> = serde_json::from_str("\"no\"");
            assert!(result.is_err());
        }
    }

    mod resource_key {
        use super::*;

        #[test]
        fn ordering_type_then_id() {
            let a = ResourceKey::new(ResType::new("STR#").unwrap(), 5);
            let b = ResourceKey::new(ResType::new("ptch").unwrap(), -20217);
            let c = ResourceKey::new(ResType::new("ptch").unwrap(), 41);
            assert!(a < b);
            assert!(b < c);
        }

        #[test]
        fn display() {
            let key = ResourceKey::new(ResType::new("boot").unwrap(), 2);
            assert_eq!(key.to_string(), "'boot' 2");
        }
    }

    mod record {
        use super::*;

        fn record(data: &[u8]) -> ResourceRecord {
            ResourceRecord::new(ResourceKey::new(ResType::new("boot").unwrap(), 2), data)
        }

        #[test]
        fn data_contains_finds_pattern() {
            let r = record(&[0x00, 0x30, 0x3C, 0xB1, 0x07, 0xFF]);
            assert!(r.data_contains(&[0x30, 0x3C, 0xB1, 0x07]));
        }

        #[test]
        fn data_contains_misses_partial() {
            let r = record(&[0x30, 0x3C, 0xB1]);
            assert!(!r.data_contains(&[0x30, 0x3C, 0xB1, 0x07]));
        }

        #[test]
        fn empty_pattern_always_present() {
            assert!(record(&[]).data_contains(&[]));
        }

        #[test]
        fn builders() {
            let r = record(b"x").with_name("Boot").with_attributes(0x50);
            assert_eq!(r.name.as_deref(), Some("Boot"));
            assert_eq!(r.attributes, 0x50);
            assert_eq!(r.id(), 2);
        }
    }

    mod version_label {
        use super::*;

        #[test]
        fn release_labels() {
            let v = VersionLabel::new("8.1.0").unwrap();
            assert!(v.is_release());
            assert_eq!(v.release_number(), Some(810));
        }

        #[test]
        fn non_release_labels() {
            for label in ["9.2.2.1", "7.6", "7-6-1", "DT_8.1_PPC", "a.b.c"] {
                let v = VersionLabel::new(label).unwrap();
                assert!(!v.is_release(), "{label} should not be a release");
            }
        }

        #[test]
        fn invalid_labels() {
            assert!(VersionLabel::new("").is_err());
            assert!(VersionLabel::new(".hidden").is_err());
            assert!(VersionLabel::new("a/b").is_err());
            assert!(VersionLabel::new("a\\b").is_err());
        }
    }
}
