//! The per-resource wiring aggregate.

use indexmap::IndexMap;
use serde::Serialize;

use super::Wire;
use crate::resource::{CapabilityRef, RequirementRef, ResourceId};

/// Everything resolution established for one resource: the capability and
/// requirement lists in effect (with fragment contributions merged for
/// hosts), plus the wires it provides and requires, grouped by namespace.
///
/// A wiring starts current and is invalidated when a wire it holds is
/// pruned because some resource it depended on went away. Invalidation is
/// one-way; a resource gets a fresh wiring by being resolved again.
#[derive(Debug, Clone, Serialize)]
pub struct Wiring {
    resource: ResourceId,
    effective_capabilities: Vec<CapabilityRef>,
    effective_requirements: Vec<RequirementRef>,
    provided: IndexMap<String, Vec<Wire>>,
    required: IndexMap<String, Vec<Wire>>,
    current: bool,
}

impl Wiring {
    pub(crate) fn new(
        resource: ResourceId,
        effective_capabilities: Vec<CapabilityRef>,
        effective_requirements: Vec<RequirementRef>,
    ) -> Wiring {
        Wiring {
            resource,
            effective_capabilities,
            effective_requirements,
            provided: IndexMap::new(),
            required: IndexMap::new(),
            current: true,
        }
    }

    /// The resource this wiring belongs to.
    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    /// Whether this wiring is still current.
    pub fn is_current(&self) -> bool {
        self.current
    }

    /// Capabilities in effect, fragment contributions included for hosts.
    pub fn capabilities(&self) -> &[CapabilityRef] {
        &self.effective_capabilities
    }

    /// Requirements in effect.
    pub fn requirements(&self) -> &[RequirementRef] {
        &self.effective_requirements
    }

    /// Wires provided to other resources in `namespace`.
    pub fn provided_wires(&self, namespace: &str) -> &[Wire] {
        self.provided.get(namespace).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Wires required from other resources in `namespace`.
    pub fn required_wires(&self, namespace: &str) -> &[Wire] {
        self.required.get(namespace).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Namespaces with at least one provided wire.
    pub fn provided_namespaces(&self) -> impl Iterator<Item = &str> {
        self.provided.keys().map(String::as_str)
    }

    /// Namespaces with at least one required wire.
    pub fn required_namespaces(&self) -> impl Iterator<Item = &str> {
        self.required.keys().map(String::as_str)
    }

    /// All provided wires, namespace groups in first-wire order.
    pub fn all_provided(&self) -> impl Iterator<Item = &Wire> {
        self.provided.values().flatten()
    }

    /// All required wires, namespace groups in first-wire order.
    pub fn all_required(&self) -> impl Iterator<Item = &Wire> {
        self.required.values().flatten()
    }

    pub(crate) fn add_provided(&mut self, namespace: &str, wire: Wire) {
        let wires = self.provided.entry(namespace.to_string()).or_default();
        if !wires.contains(&wire) {
            wires.push(wire);
        }
    }

    pub(crate) fn add_required(&mut self, namespace: &str, wire: Wire) {
        let wires = self.required.entry(namespace.to_string()).or_default();
        if !wires.contains(&wire) {
            wires.push(wire);
        }
    }

    /// Whether any effective capability is owned by `id`. True on a host
    /// wiring for its attached fragments.
    pub(crate) fn carries_capabilities_of(&self, id: ResourceId) -> bool {
        self.resource != id && self.effective_capabilities.iter().any(|cap| cap.owner == id)
    }

    /// Drop wires touching any id accepted by `gone`. Losing a required
    /// wire breaks a dependency and invalidates the wiring; losing only
    /// provided wires does not.
    pub(crate) fn prune_references(&mut self, gone: &dyn Fn(ResourceId) -> bool) {
        for wires in self.provided.values_mut() {
            wires.retain(|wire| !gone(wire.requirer));
        }
        self.provided.retain(|_, wires| !wires.is_empty());

        let mut lost_dependency = false;
        for wires in self.required.values_mut() {
            let before = wires.len();
            wires.retain(|wire| !gone(wire.provider));
            lost_dependency |= wires.len() != before;
        }
        self.required.retain(|_, wires| !wires.is_empty());

        if lost_dependency {
            self.current = false;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::PACKAGE_NAMESPACE;

    fn wire(provider: u64, requirer: u64) -> Wire {
        Wire::new(
            CapabilityRef::new(ResourceId(provider), 0),
            RequirementRef::new(ResourceId(requirer), 0),
        )
    }

    #[test]
    fn test_namespace_grouping() {
        let mut wiring = Wiring::new(ResourceId(1), vec![], vec![]);
        wiring.add_required(PACKAGE_NAMESPACE, wire(2, 1));
        wiring.add_required("other.ns", wire(3, 1));
        assert_eq!(wiring.required_wires(PACKAGE_NAMESPACE).len(), 1);
        assert_eq!(wiring.required_wires("other.ns").len(), 1);
        assert!(wiring.required_wires("missing.ns").is_empty());
        assert_eq!(wiring.all_required().count(), 2);
        let namespaces: Vec<&str> = wiring.required_namespaces().collect();
        assert_eq!(namespaces, vec![PACKAGE_NAMESPACE, "other.ns"]);
    }

    #[test]
    fn test_duplicate_wires_ignored() {
        let mut wiring = Wiring::new(ResourceId(1), vec![], vec![]);
        wiring.add_required(PACKAGE_NAMESPACE, wire(2, 1));
        wiring.add_required(PACKAGE_NAMESPACE, wire(2, 1));
        assert_eq!(wiring.required_wires(PACKAGE_NAMESPACE).len(), 1);
    }

    #[test]
    fn test_prune_required_invalidates() {
        let mut wiring = Wiring::new(ResourceId(1), vec![], vec![]);
        wiring.add_required(PACKAGE_NAMESPACE, wire(2, 1));
        assert!(wiring.is_current());
        wiring.prune_references(&|id| id == ResourceId(2));
        assert!(!wiring.is_current());
        assert!(wiring.required_wires(PACKAGE_NAMESPACE).is_empty());
    }

    #[test]
    fn test_prune_provided_keeps_current() {
        let mut wiring = Wiring::new(ResourceId(1), vec![], vec![]);
        wiring.add_provided(PACKAGE_NAMESPACE, wire(1, 5));
        wiring.prune_references(&|id| id == ResourceId(5));
        assert!(wiring.is_current());
        assert!(wiring.provided_wires(PACKAGE_NAMESPACE).is_empty());
    }

    #[test]
    fn test_carries_capabilities_of() {
        let fragment_cap = CapabilityRef::new(ResourceId(9), 1);
        let own_cap = CapabilityRef::new(ResourceId(1), 0);
        let wiring = Wiring::new(ResourceId(1), vec![own_cap, fragment_cap], vec![]);
        assert!(wiring.carries_capabilities_of(ResourceId(9)));
        assert!(!wiring.carries_capabilities_of(ResourceId(1)));
        assert!(!wiring.carries_capabilities_of(ResourceId(2)));
    }
}
