//! Requirement declarations.

use indexmap::IndexMap;
use serde::Serialize;

use super::{
    Capability, Value, CARDINALITY_DIRECTIVE, CARDINALITY_MULTIPLE, EFFECTIVE_DIRECTIVE,
    EFFECTIVE_RESOLVE, FILTER_DIRECTIVE, RESOLUTION_DIRECTIVE, RESOLUTION_DYNAMIC,
    RESOLUTION_OPTIONAL,
};
use crate::filter::{Filter, FilterError};

/// A typed need a resource must have satisfied before it can resolve.
///
/// The filter lives in the `filter` directive and is parsed once at
/// construction time; [`Requirement::matches`] is the single source of truth
/// for whether a capability satisfies a requirement. Deserialization goes
/// through [`super::RequirementSpec`], which re-parses the filter directive.
#[derive(Debug, Clone, Serialize)]
pub struct Requirement {
    /// The namespace this requirement draws from.
    pub namespace: String,
    /// Typed attributes, in declaration order.
    pub attributes: IndexMap<String, Value>,
    /// String directives, in declaration order.
    pub directives: IndexMap<String, String>,
    /// Parsed form of the `filter` directive.
    #[serde(skip)]
    filter: Option<Filter>,
}

impl Requirement {
    /// Create an unfiltered requirement in `namespace`. Without a filter it
    /// matches every capability of the namespace (subject to
    /// mandatory-attribute rules).
    pub fn new(namespace: impl Into<String>) -> Requirement {
        Requirement {
            namespace: namespace.into(),
            attributes: IndexMap::new(),
            directives: IndexMap::new(),
            filter: None,
        }
    }

    /// Add an attribute, chaining.
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Requirement {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Add a non-filter directive, chaining. Use [`Requirement::filter`] for
    /// the filter directive so the parsed form stays in sync.
    pub fn directive(mut self, key: impl Into<String>, value: impl Into<String>) -> Requirement {
        self.directives.insert(key.into(), value.into());
        self
    }

    /// Set the filter directive, parsing it.
    pub fn filter(mut self, text: impl Into<String>) -> Result<Requirement, FilterError> {
        let text = text.into();
        let parsed = Filter::parse(&text)?;
        self.directives.insert(FILTER_DIRECTIVE.to_string(), text);
        self.filter = Some(parsed);
        Ok(self)
    }

    /// Install an already parsed filter. Keeps directive text and parsed
    /// tree consistent without re-parsing.
    pub(crate) fn with_parsed_filter(mut self, filter: Filter) -> Requirement {
        self.directives
            .insert(FILTER_DIRECTIVE.to_string(), filter.text().to_string());
        self.filter = Some(filter);
        self
    }

    /// The parsed filter, if one was declared.
    pub fn parsed_filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Whether this requirement participates in resolution.
    pub fn is_effective(&self) -> bool {
        self.directives
            .get(EFFECTIVE_DIRECTIVE)
            .map_or(true, |v| v == EFFECTIVE_RESOLVE)
    }

    /// Whether an unsatisfied requirement is tolerated.
    pub fn is_optional(&self) -> bool {
        self.directives
            .get(RESOLUTION_DIRECTIVE)
            .is_some_and(|v| v == RESOLUTION_OPTIONAL)
    }

    /// Whether this requirement is late-bound and skipped by batch
    /// resolution.
    pub fn is_dynamic(&self) -> bool {
        self.directives
            .get(RESOLUTION_DIRECTIVE)
            .is_some_and(|v| v == RESOLUTION_DYNAMIC)
    }

    /// Whether a missing provider fails resolution.
    pub fn is_mandatory(&self) -> bool {
        !self.is_optional() && !self.is_dynamic()
    }

    /// Whether every satisfying candidate should be wired instead of only
    /// the best one.
    pub fn cardinality_multiple(&self) -> bool {
        self.directives
            .get(CARDINALITY_DIRECTIVE)
            .is_some_and(|v| v == CARDINALITY_MULTIPLE)
    }

    /// Whether `capability` satisfies this requirement: same namespace, the
    /// filter (if any) accepts the attributes, and every mandatory attribute
    /// the capability declares is pinned by the filter.
    pub fn matches(&self, capability: &Capability) -> bool {
        if self.namespace != capability.namespace {
            return false;
        }
        if let Some(filter) = &self.filter {
            if !filter.matches(&capability.attributes) {
                return false;
            }
        }
        self.mandatory_satisfied(capability)
    }

    /// The mandatory-attribute part of [`Requirement::matches`]: every
    /// attribute the capability's `mandatory` directive names must be pinned
    /// by an equality in the filter. Applies on every lookup path, including
    /// the exact-index one.
    pub(crate) fn mandatory_satisfied(&self, capability: &Capability) -> bool {
        let mandatory = capability.mandatory_attributes();
        if mandatory.is_empty() {
            return true;
        }
        match &self.filter {
            Some(filter) => mandatory
                .iter()
                .all(|attr| filter.references_equality(attr)),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use semver::Version;

    use super::*;
    use crate::resource::{MANDATORY_DIRECTIVE, PACKAGE_NAMESPACE, VERSION_ATTRIBUTE};

    fn package_capability(name: &str, version: Version) -> Capability {
        Capability::new(PACKAGE_NAMESPACE)
            .attribute(PACKAGE_NAMESPACE, name)
            .attribute(VERSION_ATTRIBUTE, version)
    }

    #[test]
    fn test_matches_namespace_and_filter() {
        let cap = package_capability("app.core.api", Version::new(1, 2, 0));
        let req = Requirement::new(PACKAGE_NAMESPACE)
            .filter("(&(patchbay.package=app.core.api)(version>=1.0.0))")
            .unwrap();
        assert!(req.matches(&cap));

        let req = Requirement::new(PACKAGE_NAMESPACE)
            .filter("(patchbay.package=app.other)")
            .unwrap();
        assert!(!req.matches(&cap));

        let req = Requirement::new("different.namespace")
            .filter("(patchbay.package=app.core.api)")
            .unwrap();
        assert!(!req.matches(&cap));
    }

    #[test]
    fn test_unfiltered_matches_namespace() {
        let cap = package_capability("app.core.api", Version::new(1, 0, 0));
        let req = Requirement::new(PACKAGE_NAMESPACE);
        assert!(req.matches(&cap));
    }

    #[test]
    fn test_mandatory_attribute_enforcement() {
        let cap = package_capability("app.core.api", Version::new(1, 0, 0))
            .directive(MANDATORY_DIRECTIVE, "vendor");
        // Filter does not pin `vendor`.
        let req = Requirement::new(PACKAGE_NAMESPACE)
            .filter("(patchbay.package=app.core.api)")
            .unwrap();
        assert!(!req.matches(&cap));
        // Filter pins it.
        let req = Requirement::new(PACKAGE_NAMESPACE)
            .filter("(&(patchbay.package=app.core.api)(vendor=acme))")
            .unwrap();
        // Still needs the attribute itself to match.
        assert!(!req.matches(&cap));
        let cap = cap.attribute("vendor", "acme");
        assert!(req.matches(&cap));
        // No filter at all cannot pin anything.
        let req = Requirement::new(PACKAGE_NAMESPACE);
        assert!(!req.matches(&cap));
    }

    #[test]
    fn test_directive_accessors() {
        let req = Requirement::new(PACKAGE_NAMESPACE);
        assert!(req.is_mandatory());
        assert!(!req.is_optional());
        assert!(!req.is_dynamic());
        assert!(!req.cardinality_multiple());
        assert!(req.is_effective());

        let req = Requirement::new(PACKAGE_NAMESPACE)
            .directive(RESOLUTION_DIRECTIVE, RESOLUTION_OPTIONAL)
            .directive(CARDINALITY_DIRECTIVE, CARDINALITY_MULTIPLE)
            .directive(EFFECTIVE_DIRECTIVE, "active");
        assert!(req.is_optional());
        assert!(!req.is_mandatory());
        assert!(req.cardinality_multiple());
        assert!(!req.is_effective());

        let req = Requirement::new(PACKAGE_NAMESPACE)
            .directive(RESOLUTION_DIRECTIVE, RESOLUTION_DYNAMIC);
        assert!(req.is_dynamic());
        assert!(!req.is_mandatory());
    }

    #[test]
    fn test_filter_directive_stays_in_sync() {
        let req = Requirement::new(PACKAGE_NAMESPACE)
            .filter("(patchbay.package=x)")
            .unwrap();
        assert_eq!(
            req.directives.get(FILTER_DIRECTIVE).map(String::as_str),
            Some("(patchbay.package=x)")
        );
        assert!(req.parsed_filter().is_some());
    }

    #[test]
    fn test_bad_filter_rejected() {
        let err = Requirement::new(PACKAGE_NAMESPACE).filter("(broken");
        assert!(err.is_err());
    }
}
