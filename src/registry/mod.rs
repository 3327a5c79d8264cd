//! The capability registry.
//!
//! Every capability of every installed resource is registered here, grouped
//! by namespace in insertion order. A secondary index maps the textual form
//! of the canonical attribute (the attribute whose key equals the namespace)
//! to the capabilities carrying exactly that value, which is what makes
//! equality lookups O(1) instead of a namespace scan. List-valued canonical
//! attributes are indexed once per element.
//!
//! Only in-effect capabilities enter the exact index; the per-namespace
//! lists hold everything. Lookups never return "null": unknown namespaces
//! and keys yield empty results.

pub mod planner;

use std::collections::HashMap;

use indexmap::IndexMap;
use log::trace;

use crate::resource::{Capability, CapabilityRef, ResourceId, ResourceStore, Value};

/// Namespace-indexed storage of all registered capabilities.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    by_namespace: IndexMap<String, Vec<CapabilityRef>>,
    exact: HashMap<String, HashMap<String, Vec<CapabilityRef>>>,
}

impl CapabilityRegistry {
    pub fn new() -> CapabilityRegistry {
        CapabilityRegistry::default()
    }

    /// Register one capability.
    pub fn add(&mut self, capability: &Capability, handle: CapabilityRef) {
        self.by_namespace
            .entry(capability.namespace.clone())
            .or_default()
            .push(handle);
        if !capability.is_effective() {
            return;
        }
        if let Some(value) = capability.canonical_value() {
            let index = self.exact.entry(capability.namespace.clone()).or_default();
            for key in value.index_keys() {
                index.entry(key).or_default().push(handle);
            }
        }
        trace!(
            "registered capability {}#{} in {}",
            handle.owner,
            handle.index,
            capability.namespace
        );
    }

    /// Register every capability a resource declares.
    pub fn add_resource(&mut self, store: &ResourceStore, id: ResourceId) {
        let Some(resource) = store.get(id) else {
            return;
        };
        for (index, capability) in resource.capabilities().iter().enumerate() {
            self.add(capability, CapabilityRef::new(id, index));
        }
    }

    /// Atomically unregister every capability a resource owns.
    pub fn remove_all(&mut self, id: ResourceId) {
        for handles in self.by_namespace.values_mut() {
            handles.retain(|handle| handle.owner != id);
        }
        self.by_namespace.retain(|_, handles| !handles.is_empty());
        for index in self.exact.values_mut() {
            for handles in index.values_mut() {
                handles.retain(|handle| handle.owner != id);
            }
            index.retain(|_, handles| !handles.is_empty());
        }
        self.exact.retain(|_, index| !index.is_empty());
        trace!("unregistered all capabilities of resource {id}");
    }

    /// All capabilities of a namespace, in insertion order.
    pub fn get_all(&self, namespace: &str) -> &[CapabilityRef] {
        self.by_namespace
            .get(namespace)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// In-effect capabilities whose canonical attribute has exactly this
    /// textual form.
    pub fn get_by_key(&self, namespace: &str, key: &str) -> &[CapabilityRef] {
        self.exact
            .get(namespace)
            .and_then(|index| index.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// In-effect capabilities whose canonical attribute equals `value`.
    /// List values look up every element and merge, preserving first-seen
    /// order.
    pub fn get_by_value(&self, namespace: &str, value: &Value) -> Vec<CapabilityRef> {
        let keys = value.index_keys();
        if keys.len() == 1 {
            return self.get_by_key(namespace, &keys[0]).to_vec();
        }
        let mut merged: Vec<CapabilityRef> = Vec::new();
        for key in keys {
            for handle in self.get_by_key(namespace, &key) {
                if !merged.contains(handle) {
                    merged.push(*handle);
                }
            }
        }
        merged
    }

    /// Registered namespaces, in first-registration order.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.by_namespace.keys().map(String::as_str)
    }

    /// Total number of registered capabilities.
    pub fn len(&self) -> usize {
        self.by_namespace.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_namespace.is_empty()
    }

    /// Rebuild from scratch for the resources of a store. Used after bulk
    /// mutations where incremental removal is not worth the bookkeeping.
    pub fn rebuild(&mut self, store: &ResourceStore) {
        self.by_namespace.clear();
        self.exact.clear();
        for (id, resource) in store.iter() {
            for (index, capability) in resource.capabilities().iter().enumerate() {
                self.add(capability, CapabilityRef::new(id, index));
            }
        }
    }

    /// Look up the capabilities of one resource in a namespace, keeping
    /// registry order. Handy for assertions and snapshots.
    pub fn owned_in(&self, namespace: &str, id: ResourceId) -> Vec<CapabilityRef> {
        self.get_all(namespace)
            .iter()
            .filter(|handle| handle.owner == id)
            .copied()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use semver::Version;

    use super::*;
    use crate::resource::{
        Resource, EFFECTIVE_DIRECTIVE, PACKAGE_NAMESPACE, VERSION_ATTRIBUTE,
    };

    fn exporter(name: &str, pkg: &str, version: Version) -> Resource {
        Resource::builder()
            .identity(name, version.clone())
            .package_export(pkg, version)
            .build()
    }

    fn setup(resources: Vec<Resource>) -> (ResourceStore, CapabilityRegistry, Vec<ResourceId>) {
        let mut store = ResourceStore::new();
        let mut registry = CapabilityRegistry::new();
        let mut ids = Vec::new();
        for resource in resources {
            let id = store.insert(resource);
            registry.add_resource(&store, id);
            ids.push(id);
        }
        (store, registry, ids)
    }

    #[test]
    fn test_insertion_order_preserved() {
        let (_store, registry, ids) = setup(vec![
            exporter("a", "pkg.one", Version::new(1, 0, 0)),
            exporter("b", "pkg.one", Version::new(2, 0, 0)),
            exporter("c", "pkg.two", Version::new(1, 0, 0)),
        ]);
        let all = registry.get_all(PACKAGE_NAMESPACE);
        let owners: Vec<ResourceId> = all.iter().map(|h| h.owner).collect();
        assert_eq!(owners, ids);
    }

    #[test]
    fn test_exact_lookup() {
        let (store, registry, ids) = setup(vec![
            exporter("a", "pkg.one", Version::new(1, 0, 0)),
            exporter("b", "pkg.one", Version::new(2, 0, 0)),
            exporter("c", "pkg.two", Version::new(1, 0, 0)),
        ]);
        let hits = registry.get_by_key(PACKAGE_NAMESPACE, "pkg.one");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].owner, ids[0]);
        assert_eq!(hits[1].owner, ids[1]);
        for hit in hits {
            let cap = store.capability(*hit).unwrap();
            assert_eq!(cap.canonical_value(), Some(&Value::from("pkg.one")));
        }
        assert!(registry.get_by_key(PACKAGE_NAMESPACE, "pkg.three").is_empty());
        assert!(registry.get_by_key("unknown.namespace", "x").is_empty());
    }

    #[test]
    fn test_get_by_value_list_elements() {
        let resource = Resource::builder()
            .capability(
                Capability::new("ns").attribute("ns", vec!["left".to_string(), "right".to_string()]),
            )
            .build();
        let (_store, registry, ids) = setup(vec![resource]);
        assert_eq!(registry.get_by_key("ns", "left").len(), 1);
        assert_eq!(registry.get_by_key("ns", "right").len(), 1);
        let both = registry.get_by_value(
            "ns",
            &Value::StrList(vec!["left".into(), "right".into()]),
        );
        assert_eq!(both.len(), 1, "same capability merged once");
        assert_eq!(both[0].owner, ids[0]);
    }

    #[test]
    fn test_remove_all_is_atomic() {
        let (_store, mut registry, ids) = setup(vec![
            exporter("a", "pkg.one", Version::new(1, 0, 0)),
            exporter("b", "pkg.one", Version::new(2, 0, 0)),
        ]);
        registry.remove_all(ids[0]);
        assert!(registry
            .get_all(PACKAGE_NAMESPACE)
            .iter()
            .all(|h| h.owner != ids[0]));
        assert!(registry
            .get_by_key(PACKAGE_NAMESPACE, "pkg.one")
            .iter()
            .all(|h| h.owner != ids[0]));
        // The other resource is untouched.
        assert_eq!(registry.get_by_key(PACKAGE_NAMESPACE, "pkg.one").len(), 1);
    }

    #[test]
    fn test_non_effective_not_indexed() {
        let resource = Resource::builder()
            .capability(
                Capability::new(PACKAGE_NAMESPACE)
                    .attribute(PACKAGE_NAMESPACE, "pkg.lazy")
                    .attribute(VERSION_ATTRIBUTE, Version::new(1, 0, 0))
                    .directive(EFFECTIVE_DIRECTIVE, "active"),
            )
            .build();
        let (_store, registry, _ids) = setup(vec![resource]);
        assert!(registry.get_by_key(PACKAGE_NAMESPACE, "pkg.lazy").is_empty());
        assert_eq!(registry.get_all(PACKAGE_NAMESPACE).len(), 1);
    }

    #[test]
    fn test_rebuild_matches_incremental() {
        let (store, mut registry, _ids) = setup(vec![
            exporter("a", "pkg.one", Version::new(1, 0, 0)),
            exporter("b", "pkg.two", Version::new(1, 0, 0)),
        ]);
        let before: Vec<CapabilityRef> = registry.get_all(PACKAGE_NAMESPACE).to_vec();
        registry.rebuild(&store);
        assert_eq!(registry.get_all(PACKAGE_NAMESPACE), before.as_slice());
    }
}
