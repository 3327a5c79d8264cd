//! Capability declarations.

use indexmap::IndexMap;
use semver::Version;
use serde::{Deserialize, Serialize};

use super::{
    Value, EFFECTIVE_DIRECTIVE, EFFECTIVE_RESOLVE, MANDATORY_DIRECTIVE, USES_DIRECTIVE,
    VERSION_ATTRIBUTE,
};

/// A typed feature a resource offers to the rest of the system.
///
/// The attribute whose key equals the namespace is the *canonical
/// attribute*; the registry indexes capabilities by its value for exact
/// lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// The namespace this capability lives in.
    pub namespace: String,
    /// Typed attributes, in declaration order.
    #[serde(default)]
    pub attributes: IndexMap<String, Value>,
    /// String directives, in declaration order.
    #[serde(default)]
    pub directives: IndexMap<String, String>,
}

impl Capability {
    /// Create an empty capability in `namespace`.
    pub fn new(namespace: impl Into<String>) -> Capability {
        Capability {
            namespace: namespace.into(),
            attributes: IndexMap::new(),
            directives: IndexMap::new(),
        }
    }

    /// Add an attribute, chaining.
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Capability {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Add a directive, chaining.
    pub fn directive(mut self, key: impl Into<String>, value: impl Into<String>) -> Capability {
        self.directives.insert(key.into(), value.into());
        self
    }

    /// The value of the canonical attribute, if declared.
    pub fn canonical_value(&self) -> Option<&Value> {
        self.attributes.get(&self.namespace)
    }

    /// The `version` attribute, when it is version-typed.
    pub fn version(&self) -> Option<&Version> {
        self.attributes.get(VERSION_ATTRIBUTE).and_then(Value::version)
    }

    /// Whether this capability participates in resolution.
    pub fn is_effective(&self) -> bool {
        self.directives
            .get(EFFECTIVE_DIRECTIVE)
            .map_or(true, |v| v == EFFECTIVE_RESOLVE)
    }

    /// Packages named by the `uses` directive.
    pub fn uses(&self) -> Vec<&str> {
        split_list(self.directives.get(USES_DIRECTIVE))
    }

    /// Attributes a matching filter must pin with an equality comparison.
    pub fn mandatory_attributes(&self) -> Vec<&str> {
        split_list(self.directives.get(MANDATORY_DIRECTIVE))
    }
}

fn split_list(raw: Option<&String>) -> Vec<&str> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
