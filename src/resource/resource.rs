//! Resources and their builder.

use semver::Version;
use serde::Serialize;

use super::{
    Capability, Requirement, Value, HOST_NAMESPACE, IDENTITY_NAMESPACE, SINGLETON_DIRECTIVE,
    VERSION_ATTRIBUTE,
};
use crate::filter::{Comparator, Filter, FilterLeaf, FilterNode};

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

/// An installable unit: an ordered list of capability declarations and an
/// ordered list of requirement declarations.
///
/// Identity is optional and, when present, is carried as a capability in the
/// identity namespace (canonical attribute = symbolic name). A resource that
/// declares a requirement in the host namespace is a *fragment*; one that
/// declares a capability there accepts fragment attachment.
#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
}

impl Resource {
    /// Start building a resource.
    pub fn builder() -> ResourceBuilder {
        ResourceBuilder::default()
    }

    /// Declared capabilities, in order.
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Declared requirements, in order.
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Capabilities of one namespace, with their declaration indices.
    pub fn capabilities_in<'a>(
        &'a self,
        namespace: &'a str,
    ) -> impl Iterator<Item = (usize, &'a Capability)> + 'a {
        self.capabilities
            .iter()
            .enumerate()
            .filter(move |(_, cap)| cap.namespace == namespace)
    }

    /// Requirements of one namespace, with their declaration indices.
    pub fn requirements_in<'a>(
        &'a self,
        namespace: &'a str,
    ) -> impl Iterator<Item = (usize, &'a Requirement)> + 'a {
        self.requirements
            .iter()
            .enumerate()
            .filter(move |(_, req)| req.namespace == namespace)
    }

    /// The identity capability, if declared.
    pub fn identity(&self) -> Option<&Capability> {
        self.identity_index().map(|i| &self.capabilities[i])
    }

    /// Declaration index of the identity capability.
    pub fn identity_index(&self) -> Option<usize> {
        self.capabilities_in(IDENTITY_NAMESPACE).map(|(i, _)| i).next()
    }

    /// The symbolic name, when identity is declared with a string canonical
    /// attribute.
    pub fn symbolic_name(&self) -> Option<&str> {
        match self.identity()?.canonical_value()? {
            Value::Str(name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// The identity version.
    pub fn version(&self) -> Option<&Version> {
        self.identity()?.version()
    }

    /// Whether identity is declared singleton.
    pub fn is_singleton(&self) -> bool {
        self.identity()
            .and_then(|cap| cap.directives.get(SINGLETON_DIRECTIVE))
            .is_some_and(|v| v == "true")
    }

    /// Whether this resource is a fragment (declares a host requirement).
    pub fn is_fragment(&self) -> bool {
        self.host_requirement_index().is_some()
    }

    /// Declaration index of the first host-namespace requirement.
    pub fn host_requirement_index(&self) -> Option<usize> {
        self.requirements_in(HOST_NAMESPACE).map(|(i, _)| i).next()
    }

    /// Declaration index of the first host-namespace capability, present
    /// when the resource accepts fragment attachment.
    pub fn host_capability_index(&self) -> Option<usize> {
        self.capabilities_in(HOST_NAMESPACE).map(|(i, _)| i).next()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`Resource`]. Identity, host and package declarations have
/// dedicated shorthands; anything else goes through
/// [`capability`](ResourceBuilder::capability) /
/// [`requirement`](ResourceBuilder::requirement).
#[derive(Debug, Default)]
pub struct ResourceBuilder {
    identity: Option<(String, Version)>,
    singleton: bool,
    attachable: bool,
    fragment_host: Option<String>,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
}

impl ResourceBuilder {
    /// Declare identity as `(symbolic name, version)`.
    pub fn identity(mut self, name: impl Into<String>, version: Version) -> ResourceBuilder {
        self.identity = Some((name.into(), version));
        self
    }

    /// Mark the identity singleton.
    pub fn singleton(mut self) -> ResourceBuilder {
        self.singleton = true;
        self
    }

    /// Declare a host capability so fragments can attach. Requires identity.
    pub fn attachable(mut self) -> ResourceBuilder {
        self.attachable = true;
        self
    }

    /// Turn the resource into a fragment of the named host.
    pub fn fragment_of(mut self, host: impl Into<String>) -> ResourceBuilder {
        self.fragment_host = Some(host.into());
        self
    }

    /// Add a capability declaration.
    pub fn capability(mut self, capability: Capability) -> ResourceBuilder {
        self.capabilities.push(capability);
        self
    }

    /// Add a requirement declaration.
    pub fn requirement(mut self, requirement: Requirement) -> ResourceBuilder {
        self.requirements.push(requirement);
        self
    }

    /// Shorthand: export a package at a version.
    pub fn package_export(self, name: impl Into<String>, version: Version) -> ResourceBuilder {
        let name = name.into();
        self.capability(
            Capability::new(super::PACKAGE_NAMESPACE)
                .attribute(super::PACKAGE_NAMESPACE, name)
                .attribute(VERSION_ATTRIBUTE, version),
        )
    }

    /// Shorthand: import a package by exact name.
    pub fn package_import(self, name: &str) -> ResourceBuilder {
        let requirement = Requirement::new(super::PACKAGE_NAMESPACE)
            .with_parsed_filter(equality_filter(super::PACKAGE_NAMESPACE, name));
        self.requirement(requirement)
    }

    /// Assemble the resource. Shorthand declarations come first: identity,
    /// then the host capability, then explicit capabilities; the fragment
    /// host requirement precedes explicit requirements.
    pub fn build(self) -> Resource {
        let mut capabilities = Vec::new();
        let mut requirements = Vec::new();

        if let Some((name, version)) = &self.identity {
            let mut identity = Capability::new(IDENTITY_NAMESPACE)
                .attribute(IDENTITY_NAMESPACE, name.as_str())
                .attribute(VERSION_ATTRIBUTE, version.clone());
            if self.singleton {
                identity = identity.directive(SINGLETON_DIRECTIVE, "true");
            }
            capabilities.push(identity);

            if self.attachable {
                capabilities.push(
                    Capability::new(HOST_NAMESPACE)
                        .attribute(HOST_NAMESPACE, name.as_str())
                        .attribute(VERSION_ATTRIBUTE, version.clone()),
                );
            }
        }
        capabilities.extend(self.capabilities);

        if let Some(host) = &self.fragment_host {
            requirements.push(
                Requirement::new(HOST_NAMESPACE)
                    .with_parsed_filter(equality_filter(HOST_NAMESPACE, host)),
            );
        }
        requirements.extend(self.requirements);

        Resource {
            capabilities,
            requirements,
        }
    }
}

/// Build `(attribute=value)` directly as a parsed tree. Escaping the value
/// text keeps the directive form re-parseable.
fn equality_filter(attribute: &str, value: &str) -> Filter {
    let text = format!("({}={})", attribute, crate::filter::escape(value));
    Filter::from_parts(
        text,
        FilterNode::Leaf(FilterLeaf {
            attribute: attribute.to_string(),
            comparator: Comparator::Equal,
            value: value.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::PACKAGE_NAMESPACE;

    #[test]
    fn test_identity_declarations() {
        let resource = Resource::builder()
            .identity("app.core", Version::new(1, 2, 0))
            .singleton()
            .build();
        assert_eq!(resource.symbolic_name(), Some("app.core"));
        assert_eq!(resource.version(), Some(&Version::new(1, 2, 0)));
        assert!(resource.is_singleton());
        assert!(!resource.is_fragment());
        assert_eq!(resource.identity_index(), Some(0));
    }

    #[test]
    fn test_anonymous_resource() {
        let resource = Resource::builder().package_import("app.core.api").build();
        assert_eq!(resource.symbolic_name(), None);
        assert!(!resource.is_singleton());
        assert_eq!(resource.requirements().len(), 1);
    }

    #[test]
    fn test_attachable_host() {
        let resource = Resource::builder()
            .identity("app.host", Version::new(2, 0, 0))
            .attachable()
            .build();
        let host_index = resource.host_capability_index().unwrap();
        let host = &resource.capabilities()[host_index];
        assert_eq!(host.canonical_value(), Some(&Value::from("app.host")));
        assert_eq!(host.version(), Some(&Version::new(2, 0, 0)));
    }

    #[test]
    fn test_fragment_shape() {
        let fragment = Resource::builder()
            .identity("app.theme", Version::new(1, 0, 0))
            .fragment_of("app.host")
            .package_export("app.theme.colors", Version::new(1, 0, 0))
            .build();
        assert!(fragment.is_fragment());
        let index = fragment.host_requirement_index().unwrap();
        let host_req = &fragment.requirements()[index];
        assert_eq!(
            host_req.directives.get("filter").map(String::as_str),
            Some("(patchbay.host=app.host)")
        );
        assert!(host_req.parsed_filter().is_some());
    }

    #[test]
    fn test_package_shorthands() {
        let resource = Resource::builder()
            .identity("app.core", Version::new(1, 0, 0))
            .package_export("app.core.api", Version::new(1, 4, 0))
            .package_import("app.log")
            .build();
        let exported: Vec<_> = resource.capabilities_in(PACKAGE_NAMESPACE).collect();
        assert_eq!(exported.len(), 1);
        assert_eq!(
            exported[0].1.canonical_value(),
            Some(&Value::from("app.core.api"))
        );
        let imported: Vec<_> = resource.requirements_in(PACKAGE_NAMESPACE).collect();
        assert_eq!(imported.len(), 1);
    }

    #[test]
    fn test_escaped_fragment_host_filter_reparses() {
        let fragment = Resource::builder()
            .fragment_of("odd(name)*")
            .build();
        let req = &fragment.requirements()[0];
        let text = req.directives.get("filter").unwrap();
        let reparsed = crate::filter::Filter::parse(text).unwrap();
        assert_eq!(reparsed.root(), req.parsed_filter().unwrap().root());
    }
}
