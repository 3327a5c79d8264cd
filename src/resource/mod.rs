//! The resource model: resources, their capabilities and requirements,
//! typed attribute values, and the arena they live in.
//!
//! Resources are addressed by [`ResourceId`]; individual declarations are
//! addressed by [`CapabilityRef`] / [`RequirementRef`] handles carrying the
//! owning id and the declaration index. Everything downstream of the store
//! (registry, wires, resolver bookkeeping) works in terms of these copyable
//! handles, which keeps the otherwise cyclic resource/wire graph flat.

mod capability;
mod requirement;
mod resource;
mod spec;
mod store;
mod value;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use capability::Capability;
pub use requirement::Requirement;
pub use resource::{Resource, ResourceBuilder};
pub use spec::{CapabilitySpec, RequirementSpec, ResourceSet, ResourceSpec, SpecError};
pub use store::ResourceStore;
pub use value::Value;

// ---------------------------------------------------------------------------
// Well-known namespaces and directives
// ---------------------------------------------------------------------------

/// Namespace of identity capabilities. The canonical attribute is the
/// symbolic name.
pub const IDENTITY_NAMESPACE: &str = "patchbay.identity";

/// Namespace of host capabilities and fragment host requirements. The
/// canonical attribute is the host's symbolic name.
pub const HOST_NAMESPACE: &str = "patchbay.host";

/// Namespace of shared packages. The canonical attribute is the package
/// name.
pub const PACKAGE_NAMESPACE: &str = "patchbay.package";

/// Requirement directive holding the filter expression.
pub const FILTER_DIRECTIVE: &str = "filter";
/// Requirement directive: `mandatory` (default), `optional` or `dynamic`.
pub const RESOLUTION_DIRECTIVE: &str = "resolution";
/// Requirement directive: `single` (default) or `multiple`.
pub const CARDINALITY_DIRECTIVE: &str = "cardinality";
/// Directive gating visibility to resolution; absent or `resolve` is in
/// effect.
pub const EFFECTIVE_DIRECTIVE: &str = "effective";
/// Capability directive listing packages this capability's implementation
/// depends on, comma separated.
pub const USES_DIRECTIVE: &str = "uses";
/// Capability directive naming attributes a matching filter must pin.
pub const MANDATORY_DIRECTIVE: &str = "mandatory";
/// Identity directive marking a resource as a singleton.
pub const SINGLETON_DIRECTIVE: &str = "singleton";

pub const RESOLUTION_MANDATORY: &str = "mandatory";
pub const RESOLUTION_OPTIONAL: &str = "optional";
pub const RESOLUTION_DYNAMIC: &str = "dynamic";
pub const CARDINALITY_SINGLE: &str = "single";
pub const CARDINALITY_MULTIPLE: &str = "multiple";
pub const EFFECTIVE_RESOLVE: &str = "resolve";

/// Attribute key for version values, used by candidate ranking.
pub const VERSION_ATTRIBUTE: &str = "version";

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifier of an installed resource. Ids are assigned from a monotonic
/// counter, so a lower id means the resource was installed earlier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to one declared capability: owning resource plus declaration
/// index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CapabilityRef {
    /// The resource declaring the capability.
    pub owner: ResourceId,
    /// Position in the owner's capability list.
    pub index: usize,
}

impl CapabilityRef {
    pub fn new(owner: ResourceId, index: usize) -> CapabilityRef {
        CapabilityRef { owner, index }
    }
}

/// Handle to one declared requirement: owning resource plus declaration
/// index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RequirementRef {
    /// The resource declaring the requirement.
    pub owner: ResourceId,
    /// Position in the owner's requirement list.
    pub index: usize,
}

impl RequirementRef {
    pub fn new(owner: ResourceId, index: usize) -> RequirementRef {
        RequirementRef { owner, index }
    }
}
