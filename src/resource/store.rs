//! The resource arena.

use indexmap::IndexMap;

use super::{Capability, CapabilityRef, Requirement, RequirementRef, Resource, ResourceId};

/// Owns every installed resource and hands out ids.
///
/// Ids come from a monotonic counter starting at 1 and are never reused;
/// iteration follows install order. All handle lookups return `None` for
/// uninstalled resources rather than panicking, so stale handles are safe to
/// hold across uninstalls.
#[derive(Debug, Default)]
pub struct ResourceStore {
    entries: IndexMap<ResourceId, Resource>,
    next_id: u64,
}

impl ResourceStore {
    pub fn new() -> ResourceStore {
        ResourceStore {
            entries: IndexMap::new(),
            next_id: 0,
        }
    }

    /// Store a resource and assign its id.
    pub fn insert(&mut self, resource: Resource) -> ResourceId {
        self.next_id += 1;
        let id = ResourceId(self.next_id);
        self.entries.insert(id, resource);
        id
    }

    /// Remove a resource, returning it.
    pub fn remove(&mut self, id: ResourceId) -> Option<Resource> {
        self.entries.shift_remove(&id)
    }

    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids in install order.
    pub fn ids(&self) -> Vec<ResourceId> {
        self.entries.keys().copied().collect()
    }

    /// Resources in install order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &Resource)> {
        self.entries.iter().map(|(id, resource)| (*id, resource))
    }

    /// Resolve a capability handle.
    pub fn capability(&self, cap: CapabilityRef) -> Option<&Capability> {
        self.get(cap.owner)?.capabilities().get(cap.index)
    }

    /// Resolve a requirement handle.
    pub fn requirement(&self, req: RequirementRef) -> Option<&Requirement> {
        self.get(req.owner)?.requirements().get(req.index)
    }

    /// Handle to a resource's identity capability.
    pub fn identity_ref(&self, id: ResourceId) -> Option<CapabilityRef> {
        let index = self.get(id)?.identity_index()?;
        Some(CapabilityRef::new(id, index))
    }

    /// Handle to a resource's host capability.
    pub fn host_capability_ref(&self, id: ResourceId) -> Option<CapabilityRef> {
        let index = self.get(id)?.host_capability_index()?;
        Some(CapabilityRef::new(id, index))
    }

    /// Handle to a fragment's host requirement.
    pub fn host_requirement_ref(&self, id: ResourceId) -> Option<RequirementRef> {
        let index = self.get(id)?.host_requirement_index()?;
        Some(RequirementRef::new(id, index))
    }

    /// Human-readable name for logs and reports.
    pub fn display_name(&self, id: ResourceId) -> String {
        match self.get(id).and_then(Resource::symbolic_name) {
            Some(name) => format!("{name} [{id}]"),
            None => format!("resource [{id}]"),
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
    use crate::resource::PACKAGE_NAMESPACE;

    fn named(name: &str) -> Resource {
        Resource::builder()
            .identity(name, Version::new(1, 0, 0))
            .package_export(format!("{name}.api"), Version::new(1, 0, 0))
            .build()
    }

    #[test]
    fn test_monotonic_ids() {
        let mut store = ResourceStore::new();
        let a = store.insert(named("a"));
        let b = store.insert(named("b"));
        assert!(a < b);
        store.remove(a);
        let c = store.insert(named("c"));
        assert!(b < c, "ids are never reused");
        assert_eq!(store.ids(), vec![b, c]);
    }

    #[test]
    fn test_handle_lookups() {
        let mut store = ResourceStore::new();
        let id = store.insert(named("app.core"));
        let identity = store.identity_ref(id).unwrap();
        assert_eq!(
            store.capability(identity).unwrap().namespace,
            crate::resource::IDENTITY_NAMESPACE
        );
        let (pkg_index, _) = store
            .get(id)
            .unwrap()
            .capabilities_in(PACKAGE_NAMESPACE)
            .next()
            .unwrap();
        let cap = store
            .capability(CapabilityRef::new(id, pkg_index))
            .unwrap();
        assert_eq!(cap.namespace, PACKAGE_NAMESPACE);
    }

    #[test]
    fn test_stale_handles_are_none() {
        let mut store = ResourceStore::new();
        let id = store.insert(named("a"));
        let identity = store.identity_ref(id).unwrap();
        store.remove(id);
        assert!(store.capability(identity).is_none());
        assert!(store.requirement(RequirementRef::new(id, 0)).is_none());
        assert!(store.identity_ref(id).is_none());
    }

    #[test]
    fn test_display_name() {
        let mut store = ResourceStore::new();
        let named_id = store.insert(named("app.core"));
        let anon_id = store.insert(Resource::builder().build());
        assert_eq!(store.display_name(named_id), format!("app.core [{named_id}]"));
        assert_eq!(store.display_name(anon_id), format!("resource [{anon_id}]"));
    }
}
