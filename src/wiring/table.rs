//! Committed wiring state and its teardown rules.

use indexmap::IndexMap;
use log::debug;

use super::{Wire, Wiring};
use crate::resource::{
    CapabilityRef, RequirementRef, Resource, ResourceId, ResourceStore, HOST_NAMESPACE,
    IDENTITY_NAMESPACE,
};

// ---------------------------------------------------------------------------
// Solution entries
// ---------------------------------------------------------------------------

/// Wires and fragment attachments accumulated for one resource while a batch
/// is being resolved. The batch solution maps resource ids to these; commit
/// turns each into a [`Wiring`].
#[derive(Debug, Clone, Default)]
pub struct ResourceWires {
    wires: Vec<Wire>,
    attached_fragments: Vec<ResourceId>,
}

impl ResourceWires {
    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    pub fn attached_fragments(&self) -> &[ResourceId] {
        &self.attached_fragments
    }

    pub(crate) fn add_wire(&mut self, wire: Wire) {
        if !self.wires.contains(&wire) {
            self.wires.push(wire);
        }
    }

    pub(crate) fn attach_fragment(&mut self, fragment: ResourceId) {
        if !self.attached_fragments.contains(&fragment) {
            self.attached_fragments.push(fragment);
        }
    }
}

// ---------------------------------------------------------------------------
// Wiring table
// ---------------------------------------------------------------------------

/// The committed wirings of every resolved resource.
///
/// Entries appear when a batch commits and disappear on purge (refresh or
/// uninstall). Between those points a wiring only ever changes by gaining
/// provided wires from later batches, or by losing wires and currency when a
/// purge prunes it.
#[derive(Debug, Default)]
pub struct WiringTable {
    entries: IndexMap<ResourceId, Wiring>,
}

impl WiringTable {
    pub fn new() -> WiringTable {
        WiringTable {
            entries: IndexMap::new(),
        }
    }

    /// The committed wiring of a resource, current or not.
    pub fn get(&self, id: ResourceId) -> Option<&Wiring> {
        self.entries.get(&id)
    }

    /// Whether the resource holds a committed wiring.
    pub fn is_resolved(&self, id: ResourceId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Whether the resource holds a current committed wiring.
    pub fn is_current(&self, id: ResourceId) -> bool {
        self.entries.get(&id).is_some_and(Wiring::is_current)
    }

    /// Whether some other current wiring depends on this resource, either
    /// through a wire it provides or by carrying its capabilities (a host
    /// carrying an attached fragment's declarations).
    pub fn is_in_use(&self, id: ResourceId) -> bool {
        self.entries.values().any(|wiring| {
            wiring.resource() != id
                && wiring.is_current()
                && (wiring.all_required().any(|wire| wire.provider == id)
                    || wiring.carries_capabilities_of(id))
        })
    }

    /// Wirings in commit order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &Wiring)> {
        self.entries.iter().map(|(id, wiring)| (*id, wiring))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Turn a batch solution into committed wirings.
    ///
    /// Two passes: every solved resource first gets its wiring with its
    /// required wires in place, then provided wires are distributed to the
    /// providers, which may hold wirings committed by an earlier batch. A
    /// provider that ended up without any wiring (its own resolution failed
    /// after the optimistic cycle answer) leaves the requirer's wire in
    /// place with no provided-side record.
    pub(crate) fn commit(
        &mut self,
        store: &ResourceStore,
        solution: &IndexMap<ResourceId, ResourceWires>,
    ) {
        for (&id, entry) in solution {
            if self.entries.contains_key(&id) {
                debug!("{} is already wired, skipping commit", store.display_name(id));
                continue;
            }
            let Some(resource) = store.get(id) else {
                continue;
            };

            let mut wiring = Wiring::new(
                id,
                effective_capabilities(store, id, resource, entry),
                effective_requirements(id, resource),
            );
            for wire in &entry.wires {
                let Some(capability) = store.capability(wire.capability) else {
                    continue;
                };
                wiring.add_required(&capability.namespace, *wire);
            }
            debug!(
                "committed wiring for {}: {} required wires, {} attached fragments",
                store.display_name(id),
                entry.wires.len(),
                entry.attached_fragments.len()
            );
            self.entries.insert(id, wiring);
        }

        for entry in solution.values() {
            for wire in &entry.wires {
                let Some(capability) = store.capability(wire.capability) else {
                    continue;
                };
                match self.entries.get_mut(&wire.provider) {
                    Some(provider) => provider.add_provided(&capability.namespace, *wire),
                    None => debug!(
                        "{} provides a committed wire but has no wiring",
                        store.display_name(wire.provider)
                    ),
                }
            }
        }
    }

    /// Destroy the wiring of `id` together with its attachment family: a
    /// wiring that carries capabilities owned by a destroyed resource (host
    /// of a destroyed fragment) or that is attached to a destroyed host goes
    /// down with it, to a fixpoint. Surviving wirings drop every wire that
    /// references a destroyed resource and become non-current if that costs
    /// them a required wire.
    ///
    /// Returns the resources whose wirings were destroyed.
    pub(crate) fn purge(&mut self, store: &ResourceStore, id: ResourceId) -> Vec<ResourceId> {
        let mut destroyed = vec![id];
        let mut cursor = 0;
        while cursor < destroyed.len() {
            let next = destroyed[cursor];
            cursor += 1;
            for (&other, wiring) in &self.entries {
                if destroyed.contains(&other) {
                    continue;
                }
                let hosts_next = wiring.carries_capabilities_of(next);
                let attached_to_next = wiring
                    .required_wires(HOST_NAMESPACE)
                    .iter()
                    .any(|wire| wire.provider == next);
                if hosts_next || attached_to_next {
                    destroyed.push(other);
                }
            }
        }

        let mut removed = Vec::new();
        for &gone in &destroyed {
            if self.entries.shift_remove(&gone).is_some() {
                debug!("destroyed wiring of {}", store.display_name(gone));
                removed.push(gone);
            }
        }
        for wiring in self.entries.values_mut() {
            wiring.prune_references(&|candidate| destroyed.contains(&candidate));
        }
        removed
    }
}

/// Capability handles in effect for a committed wiring. An attached fragment
/// keeps only its identity; a host appends each attached fragment's
/// non-identity capabilities after its own.
fn effective_capabilities(
    store: &ResourceStore,
    id: ResourceId,
    resource: &Resource,
    entry: &ResourceWires,
) -> Vec<CapabilityRef> {
    let mut refs = Vec::new();
    if resource.is_fragment() {
        if let Some(index) = resource.identity_index() {
            refs.push(CapabilityRef::new(id, index));
        }
        return refs;
    }
    for (index, capability) in resource.capabilities().iter().enumerate() {
        if capability.is_effective() {
            refs.push(CapabilityRef::new(id, index));
        }
    }
    for &fragment_id in entry.attached_fragments() {
        let Some(fragment) = store.get(fragment_id) else {
            continue;
        };
        for (index, capability) in fragment.capabilities().iter().enumerate() {
            if capability.namespace != IDENTITY_NAMESPACE && capability.is_effective() {
                refs.push(CapabilityRef::new(fragment_id, index));
            }
        }
    }
    refs
}

fn effective_requirements(id: ResourceId, resource: &Resource) -> Vec<RequirementRef> {
    resource
        .requirements()
        .iter()
        .enumerate()
        .filter(|(_, requirement)| requirement.is_effective())
        .map(|(index, _)| RequirementRef::new(id, index))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
