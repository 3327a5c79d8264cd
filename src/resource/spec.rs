//! Declarative resource descriptions.
//!
//! A [`ResourceSpec`] is the YAML-friendly form of a resource declaration;
//! [`ResourceSet`] wraps a list of them, which is the shape the CLI harness
//! reads. Example:
//!
//! ```yaml
//! resources:
//!   - symbolic-name: app.core
//!     version: 1.2.0
//!     capabilities:
//!       - namespace: patchbay.package
//!         attributes:
//!           patchbay.package: app.core.api
//!           version: { type: version, value: "1.4.0" }
//!         directives:
//!           uses: app.log.api
//!   - symbolic-name: app.ui
//!     version: 0.9.0
//!     requirements:
//!       - namespace: patchbay.package
//!         directives:
//!           filter: "(&(patchbay.package=app.core.api)(version>=1.0.0))"
//! ```
//!
//! Plain scalars map to string/integer/boolean values and sequences of
//! strings to string lists; version-typed values use the explicit
//! `{ type: version, value: ".." }` form (`versions` for a version list).

use std::path::Path;

use indexmap::IndexMap;
use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Capability, Requirement, Resource, Value, FILTER_DIRECTIVE};
use crate::filter::FilterError;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error raised while loading or converting declarative specs.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid filter '{text}': {source}")]
    Filter {
        text: String,
        #[source]
        source: FilterError,
    },

    #[error("invalid version '{text}': {source}")]
    Version {
        text: String,
        #[source]
        source: semver::Error,
    },

    #[error("validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Specs
// ---------------------------------------------------------------------------

/// Declarative form of one capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySpec {
    /// Target namespace.
    pub namespace: String,
    /// Attribute values in YAML form.
    #[serde(default)]
    pub attributes: IndexMap<String, serde_yaml::Value>,
    /// Directives.
    #[serde(default)]
    pub directives: IndexMap<String, String>,
}

/// Declarative form of one requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementSpec {
    /// Target namespace.
    pub namespace: String,
    /// Attribute values in YAML form.
    #[serde(default)]
    pub attributes: IndexMap<String, serde_yaml::Value>,
    /// Directives; the `filter` directive is parsed during conversion.
    #[serde(default)]
    pub directives: IndexMap<String, String>,
}

/// Declarative form of one resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceSpec {
    /// Symbolic name; optional, but required by `singleton`/`attachable`.
    #[serde(default)]
    pub symbolic_name: Option<String>,
    /// Identity version, `0.0.0` when omitted.
    #[serde(default)]
    pub version: Option<String>,
    /// Marks the identity singleton.
    #[serde(default)]
    pub singleton: bool,
    /// Declares a host capability so fragments can attach.
    #[serde(default)]
    pub attachable: bool,
    /// Makes this resource a fragment of the named host.
    #[serde(default)]
    pub fragment_host: Option<String>,
    /// Capability declarations.
    #[serde(default)]
    pub capabilities: Vec<CapabilitySpec>,
    /// Requirement declarations.
    #[serde(default)]
    pub requirements: Vec<RequirementSpec>,
}

/// A set of resource specs, the top-level shape of a spec file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSet {
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

impl CapabilitySpec {
    /// Convert to a [`Capability`].
    pub fn to_capability(&self) -> Result<Capability, SpecError> {
        let mut capability = Capability::new(&self.namespace);
        for (key, raw) in &self.attributes {
            capability
                .attributes
                .insert(key.clone(), convert_value(key, raw)?);
        }
        for (key, value) in &self.directives {
            capability.directives.insert(key.clone(), value.clone());
        }
        Ok(capability)
    }
}

impl RequirementSpec {
    /// Convert to a [`Requirement`], parsing the filter directive.
    pub fn to_requirement(&self) -> Result<Requirement, SpecError> {
        let mut requirement = Requirement::new(&self.namespace);
        for (key, raw) in &self.attributes {
            requirement
                .attributes
                .insert(key.clone(), convert_value(key, raw)?);
        }
        for (key, value) in &self.directives {
            if key == FILTER_DIRECTIVE {
                continue;
            }
            requirement.directives.insert(key.clone(), value.clone());
        }
        if let Some(text) = self.directives.get(FILTER_DIRECTIVE) {
            requirement = requirement
                .filter(text.clone())
                .map_err(|source| SpecError::Filter {
                    text: text.clone(),
                    source,
                })?;
        }
        Ok(requirement)
    }
}

impl ResourceSpec {
    /// Parse a single spec from YAML text.
    pub fn from_yaml(text: &str) -> Result<ResourceSpec, SpecError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Build the [`Resource`] this spec describes.
    pub fn to_resource(&self) -> Result<Resource, SpecError> {
        let mut builder = Resource::builder();

        match &self.symbolic_name {
            Some(name) => {
                let version = match &self.version {
                    Some(text) => {
                        Version::parse(text).map_err(|source| SpecError::Version {
                            text: text.clone(),
                            source,
                        })?
                    }
                    None => Version::new(0, 0, 0),
                };
                builder = builder.identity(name, version);
                if self.singleton {
                    builder = builder.singleton();
                }
                if self.attachable {
                    builder = builder.attachable();
                }
            }
            None => {
                if self.singleton || self.attachable || self.version.is_some() {
                    return Err(SpecError::Validation(
                        "singleton, attachable and version require a symbolic-name".to_string(),
                    ));
                }
            }
        }

        if let Some(host) = &self.fragment_host {
            if self.attachable {
                return Err(SpecError::Validation(
                    "a fragment cannot itself accept fragments".to_string(),
                ));
            }
            builder = builder.fragment_of(host);
        }

        for capability in &self.capabilities {
            builder = builder.capability(capability.to_capability()?);
        }
        for requirement in &self.requirements {
            builder = builder.requirement(requirement.to_requirement()?);
        }
        Ok(builder.build())
    }
}

impl ResourceSet {
    /// Parse a spec set from YAML text.
    pub fn from_yaml(text: &str) -> Result<ResourceSet, SpecError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read and parse a spec file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<ResourceSet, SpecError> {
        let text = std::fs::read_to_string(path)?;
        ResourceSet::from_yaml(&text)
    }

    /// Build every resource in declaration order.
    pub fn to_resources(&self) -> Result<Vec<Resource>, SpecError> {
        self.resources.iter().map(ResourceSpec::to_resource).collect()
    }
}

fn convert_value(key: &str, raw: &serde_yaml::Value) -> Result<Value, SpecError> {
    match raw {
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => n.as_i64().map(Value::Int).ok_or_else(|| {
            SpecError::Validation(format!(
                "attribute '{key}': non-integer numbers are not supported"
            ))
        }),
        serde_yaml::Value::String(s) => Ok(Value::Str(s.clone())),
        serde_yaml::Value::Sequence(items) => {
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    serde_yaml::Value::String(s) => list.push(s.clone()),
                    other => {
                        return Err(SpecError::Validation(format!(
                            "attribute '{key}': list elements must be strings, got {other:?}"
                        )))
                    }
                }
            }
            Ok(Value::StrList(list))
        }
        serde_yaml::Value::Mapping(_) => convert_typed_value(key, raw),
        other => Err(SpecError::Validation(format!(
            "attribute '{key}': unsupported value {other:?}"
        ))),
    }
}

/// The explicit `{ type: .., value: .. }` form.
fn convert_typed_value(key: &str, raw: &serde_yaml::Value) -> Result<Value, SpecError> {
    #[derive(Deserialize)]
    struct Typed {
        #[serde(rename = "type")]
        kind: String,
        value: serde_yaml::Value,
    }

    let typed: Typed = serde_yaml::from_value(raw.clone())?;
    match typed.kind.as_str() {
        "version" => match &typed.value {
            serde_yaml::Value::String(text) => {
                let version = Version::parse(text).map_err(|source| SpecError::Version {
                    text: text.clone(),
                    source,
                })?;
                Ok(Value::Version(version))
            }
            other => Err(SpecError::Validation(format!(
                "attribute '{key}': version value must be a string, got {other:?}"
            ))),
        },
        "versions" => match &typed.value {
            serde_yaml::Value::Sequence(items) => {
                let mut versions = Vec::with_capacity(items.len());
                for item in items {
                    let serde_yaml::Value::String(text) = item else {
                        return Err(SpecError::Validation(format!(
                            "attribute '{key}': versions elements must be strings"
                        )));
                    };
                    versions.push(Version::parse(text).map_err(|source| {
                        SpecError::Version {
                            text: text.clone(),
                            source,
                        }
                    })?);
                }
                Ok(Value::VersionList(versions))
            }
            other => Err(SpecError::Validation(format!(
                "attribute '{key}': versions value must be a sequence, got {other:?}"
            ))),
        },
        other => Err(SpecError::Validation(format!(
            "attribute '{key}': unknown attribute type '{other}'"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::resource::{PACKAGE_NAMESPACE, VERSION_ATTRIBUTE};

    const SHEET: &str = r#"
resources:
  - symbolic-name: app.core
    version: 1.2.0
    capabilities:
      - namespace: patchbay.package
        attributes:
          patchbay.package: app.core.api
          version: { type: version, value: "1.4.0" }
        directives:
          uses: app.log.api
  - symbolic-name: app.ui
    version: 0.9.0
    requirements:
      - namespace: patchbay.package
        directives:
          filter: "(&(patchbay.package=app.core.api)(version>=1.0.0))"
"#;

    #[test]
    fn test_sheet_round_trip() {
        let set = ResourceSet::from_yaml(SHEET).unwrap();
        assert_eq!(set.resources.len(), 2);
        let resources = set.to_resources().unwrap();

        let core = &resources[0];
        assert_eq!(core.symbolic_name(), Some("app.core"));
        assert_eq!(core.version(), Some(&Version::new(1, 2, 0)));
        let (_, exported) = core.capabilities_in(PACKAGE_NAMESPACE).next().unwrap();
        assert_eq!(
            exported.attributes.get(VERSION_ATTRIBUTE),
            Some(&Value::Version(Version::new(1, 4, 0)))
        );
        assert_eq!(exported.uses(), vec!["app.log.api"]);

        let ui = &resources[1];
        let (_, import) = ui.requirements_in(PACKAGE_NAMESPACE).next().unwrap();
        assert!(import.parsed_filter().is_some());
        assert!(import.matches(exported));
    }

    #[test]
    fn test_plain_scalars() {
        let spec = ResourceSpec::from_yaml(
            r#"
capabilities:
  - namespace: ns
    attributes:
      name: mixer
      channels: 16
      active: true
      tags: [input, output]
"#,
        )
        .unwrap();
        let resource = spec.to_resource().unwrap();
        let cap = &resource.capabilities()[0];
        assert_eq!(cap.attributes.get("name"), Some(&Value::from("mixer")));
        assert_eq!(cap.attributes.get("channels"), Some(&Value::from(16i64)));
        assert_eq!(cap.attributes.get("active"), Some(&Value::from(true)));
        assert_eq!(
            cap.attributes.get("tags"),
            Some(&Value::StrList(vec!["input".into(), "output".into()]))
        );
    }

    #[test]
    fn test_bad_filter_is_reported() {
        let spec = ResourceSpec::from_yaml(
            r#"
requirements:
  - namespace: ns
    directives:
      filter: "(broken"
"#,
        )
        .unwrap();
        let err = spec.to_resource().unwrap_err();
        assert!(matches!(err, SpecError::Filter { .. }), "got {err:?}");
    }

    #[test]
    fn test_bad_version_is_reported() {
        let spec = ResourceSpec {
            symbolic_name: Some("x".into()),
            version: Some("not-a-version".into()),
            ..ResourceSpec::default()
        };
        assert!(matches!(
            spec.to_resource().unwrap_err(),
            SpecError::Version { .. }
        ));
    }

    #[test]
    fn test_validation_rules() {
        let spec = ResourceSpec {
            singleton: true,
            ..ResourceSpec::default()
        };
        assert!(matches!(
            spec.to_resource().unwrap_err(),
            SpecError::Validation(_)
        ));

        let spec = ResourceSpec {
            symbolic_name: Some("x".into()),
            attachable: true,
            fragment_host: Some("h".into()),
            ..ResourceSpec::default()
        };
        assert!(matches!(
            spec.to_resource().unwrap_err(),
            SpecError::Validation(_)
        ));
    }

    #[test]
    fn test_float_attribute_rejected() {
        let spec = ResourceSpec::from_yaml(
            r#"
capabilities:
  - namespace: ns
    attributes:
      ratio: 1.5
"#,
        )
        .unwrap();
        assert!(matches!(
            spec.to_resource().unwrap_err(),
            SpecError::Validation(_)
        ));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SHEET.as_bytes()).unwrap();
        let set = ResourceSet::from_yaml_file(file.path()).unwrap();
        assert_eq!(set.resources.len(), 2);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ResourceSet::from_yaml_file("/nonexistent/specs.yaml").unwrap_err();
        assert!(matches!(err, SpecError::Io(_)));
    }
}
