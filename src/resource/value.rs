//! Typed attribute values for capabilities and requirements.
//!
//! Attributes carry one of a small set of types. Versions are real semantic
//! versions and order accordingly; everything else compares the obvious way.
//! Filter evaluation (see [`crate::filter`]) coerces the textual operand of a
//! comparison to the type of the attribute it is compared against.

use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A typed attribute value.
///
/// Serializes as the underlying scalar or sequence. Bare deserialization
/// favors plain strings; version-typed values are produced through the
/// explicit `{ type: version, value: ".." }` spec form or programmatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A plain string.
    Str(String),
    /// A semantic version.
    Version(Version),
    /// A signed integer.
    Int(i64),
    /// A boolean.
    Bool(bool),
    /// A list of strings.
    StrList(Vec<String>),
    /// A list of semantic versions.
    VersionList(Vec<Version>),
}

impl Value {
    /// The version carried by this value, if it is version-typed.
    pub fn version(&self) -> Option<&Version> {
        match self {
            Value::Version(v) => Some(v),
            _ => None,
        }
    }

    /// Short type name, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Version(_) => "version",
            Value::Int(_) => "integer",
            Value::Bool(_) => "boolean",
            Value::StrList(_) => "list<string>",
            Value::VersionList(_) => "list<version>",
        }
    }

    /// Whether this value is one of the list types.
    pub fn is_list(&self) -> bool {
        matches!(self, Value::StrList(_) | Value::VersionList(_))
    }

    /// The canonical textual forms of this value, one per element for lists.
    ///
    /// Used by the registry to key its exact-match index: list-valued
    /// canonical attributes are indexed once per element.
    pub fn index_keys(&self) -> Vec<String> {
        match self {
            Value::StrList(items) => items.clone(),
            Value::VersionList(items) => items.iter().map(|v| v.to_string()).collect(),
            other => vec![other.to_string()],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            Value::Version(v) => write!(f, "{v}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::StrList(items) => write!(f, "[{}]", items.join(", ")),
            Value::VersionList(items) => {
                let rendered: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Version> for Value {
    fn from(v: Version) -> Self {
        Value::Version(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::StrList(items)
    }
}

impl From<Vec<Version>> for Value {
    fn from(items: Vec<Version>) -> Self {
        Value::VersionList(items)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_scalars() {
        assert_eq!(Value::from("jack").to_string(), "jack");
        assert_eq!(Value::from(42i64).to_string(), "42");
        assert_eq!(Value::from(true).to_string(), "true");
        assert_eq!(
            Value::Version(Version::new(1, 2, 3)).to_string(),
            "1.2.3"
        );
    }

    #[test]
    fn test_display_lists() {
        let v = Value::StrList(vec!["a".into(), "b".into()]);
        assert_eq!(v.to_string(), "[a, b]");
        let v = Value::VersionList(vec![Version::new(1, 0, 0), Version::new(2, 0, 0)]);
        assert_eq!(v.to_string(), "[1.0.0, 2.0.0]");
    }

    #[test]
    fn test_index_keys_per_element() {
        let v = Value::StrList(vec!["left".into(), "right".into()]);
        assert_eq!(v.index_keys(), vec!["left".to_string(), "right".to_string()]);
        let v = Value::from("mono");
        assert_eq!(v.index_keys(), vec!["mono".to_string()]);
    }

    #[test]
    fn test_version_accessor() {
        let v = Value::Version(Version::new(2, 1, 0));
        assert_eq!(v.version(), Some(&Version::new(2, 1, 0)));
        assert_eq!(Value::from("2.1.0").version(), None);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::from("x").type_name(), "string");
        assert_eq!(Value::from(1i64).type_name(), "integer");
        assert!(Value::StrList(vec![]).is_list());
        assert!(!Value::from(false).is_list());
    }

    #[test]
    fn test_serialize_version_as_string() {
        let v = Value::Version(Version::new(1, 4, 0));
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"1.4.0\"");
    }
}
