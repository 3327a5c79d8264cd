//! The embedding facade: install, resolve, refresh, uninstall.
//!
//! A [`Runtime`] owns the resource store, the capability registry and the
//! wiring table, and drives the resolver over them. Hook sources and
//! lifecycle listeners register here. Resolve passes run under a
//! single-flight gate; an overlapping pass fails fast with
//! [`ResolveError::ReentrantResolve`] instead of observing half-committed
//! state.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use log::info;
use serde::Serialize;

use crate::hooks::ResolverHookSource;
use crate::registry::planner::{classify, LookupPlan};
use crate::registry::CapabilityRegistry;
use crate::resolver::{self, BatchOutcome, ResolveError};
use crate::resource::{
    CapabilityRef, Requirement, RequirementRef, Resource, ResourceId, ResourceSet, ResourceSpec,
    ResourceStore, SpecError, Value, PACKAGE_NAMESPACE,
};
use crate::wiring::{Wiring, WiringTable};

mod listener;
mod snapshot;

pub use listener::LifecycleListener;
pub use snapshot::{ResourceSnapshot, Snapshot, WireSnapshot};

// ---------------------------------------------------------------------------
// Configuration and states
// ---------------------------------------------------------------------------

/// Tunables for a [`Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Whether fragment attachment runs at all. Disabled, fragments are
    /// ordinary resources whose host requirements go unsatisfied.
    pub fragments_enabled: bool,
}

impl Default for RuntimeConfig {
    fn default() -> RuntimeConfig {
        RuntimeConfig {
            fragments_enabled: true,
        }
    }
}

/// Lifecycle state of an installed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    /// No committed wiring.
    Installed,
    /// Holding a committed wiring, current or not.
    Resolved,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceState::Installed => write!(f, "installed"),
            ResourceState::Resolved => write!(f, "resolved"),
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// The engine's front door.
///
/// All mutation goes through `&mut self`, so a runtime is single-writer by
/// construction; the resolve gate backs that up at runtime for embeddings
/// that route calls through shared wrappers.
pub struct Runtime {
    store: ResourceStore,
    registry: CapabilityRegistry,
    table: WiringTable,
    hook_sources: Vec<Box<dyn ResolverHookSource>>,
    listeners: Vec<Box<dyn LifecycleListener>>,
    config: RuntimeConfig,
    resolving: AtomicBool,
}

impl Default for Runtime {
    fn default() -> Runtime {
        Runtime::new()
    }
}

impl Runtime {
    pub fn new() -> Runtime {
        Runtime::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Runtime {
        Runtime {
            store: ResourceStore::new(),
            registry: CapabilityRegistry::new(),
            table: WiringTable::new(),
            hook_sources: Vec::new(),
            listeners: Vec::new(),
            config,
            resolving: AtomicBool::new(false),
        }
    }

    /// Register a hook source. Sources are consulted in registration order
    /// at the start of every resolve pass.
    pub fn add_hook_source(&mut self, source: impl ResolverHookSource) {
        self.hook_sources.push(Box::new(source));
    }

    /// Register a lifecycle listener.
    pub fn add_listener(&mut self, listener: impl LifecycleListener) {
        self.listeners.push(Box::new(listener));
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The installed resources.
    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Install / uninstall / refresh
    // -----------------------------------------------------------------------

    /// Install a resource: assign its id, register its capabilities, notify
    /// listeners. The resource starts in the installed state.
    pub fn install(&mut self, resource: Resource) -> ResourceId {
        let id = self.store.insert(resource);
        self.registry.add_resource(&self.store, id);
        info!("installed {}", self.store.display_name(id));
        for listener in &self.listeners {
            listener.resource_installed(id);
        }
        id
    }

    /// Install the resource a declarative spec describes.
    pub fn install_spec(&mut self, spec: &ResourceSpec) -> Result<ResourceId, SpecError> {
        Ok(self.install(spec.to_resource()?))
    }

    /// Install every resource of a spec set, in declaration order. Nothing
    /// is installed if any spec fails to convert.
    pub fn install_set(&mut self, set: &ResourceSet) -> Result<Vec<ResourceId>, SpecError> {
        let resources = set.to_resources()?;
        Ok(resources
            .into_iter()
            .map(|resource| self.install(resource))
            .collect())
    }

    /// Uninstall a resource: destroy its wiring and its attachment family's,
    /// unregister its capabilities, remove it from the store. Wires pointing
    /// at it are pruned from surviving wirings. Returns the resource.
    pub fn uninstall(&mut self, id: ResourceId) -> Result<Resource, ResolveError> {
        let name = self.store.display_name(id);
        let Some(resource) = self.store.remove(id) else {
            return Err(ResolveError::NoSuchResource(id));
        };
        self.registry.remove_all(id);
        let destroyed = self.table.purge(&self.store, id);
        info!("uninstalled {name}");
        for &gone in &destroyed {
            if gone == id {
                continue;
            }
            for listener in &self.listeners {
                listener.resource_unresolved(gone);
            }
        }
        for listener in &self.listeners {
            listener.resource_uninstalled(id);
        }
        Ok(resource)
    }

    /// Destroy the wiring of `id` and of its attachment family without
    /// removing any resource. Affected resources return to the installed
    /// state and may be resolved again. Returns the resources whose wirings
    /// were destroyed.
    pub fn refresh(&mut self, id: ResourceId) -> Result<Vec<ResourceId>, ResolveError> {
        if !self.store.contains(id) {
            return Err(ResolveError::NoSuchResource(id));
        }
        let destroyed = self.table.purge(&self.store, id);
        info!(
            "refreshed {}: {} wiring(s) destroyed",
            self.store.display_name(id),
            destroyed.len()
        );
        for &gone in &destroyed {
            for listener in &self.listeners {
                listener.resource_unresolved(gone);
            }
        }
        Ok(destroyed)
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Resolve a batch of installed resources. Members that cannot be
    /// resolved are reported in the outcome; everything that could be
    /// resolved stays resolved.
    pub fn resolve(&mut self, batch: &[ResourceId]) -> Result<BatchOutcome, ResolveError> {
        self.run_batch(batch, false)
    }

    /// Like [`Runtime::resolve`], but any unresolved member turns the
    /// report into an error. Partial successes are still committed first.
    pub fn resolve_critical(&mut self, batch: &[ResourceId]) -> Result<BatchOutcome, ResolveError> {
        self.run_batch(batch, true)
    }

    /// Resolve every installed resource.
    pub fn resolve_all(&mut self) -> Result<BatchOutcome, ResolveError> {
        let batch = self.store.ids();
        self.run_batch(&batch, false)
    }

    fn run_batch(
        &mut self,
        batch: &[ResourceId],
        critical: bool,
    ) -> Result<BatchOutcome, ResolveError> {
        for &id in batch {
            if !self.store.contains(id) {
                return Err(ResolveError::NoSuchResource(id));
            }
        }
        let _gate = acquire(&self.resolving)?;
        let outcome = resolver::resolve_batch(
            &self.store,
            &self.registry,
            &mut self.table,
            &self.hook_sources,
            self.config.fragments_enabled,
            batch,
        )?;
        info!(
            "resolve pass over {} member(s): {} resolved, {} unresolved, {} wiring(s) committed",
            batch.len(),
            outcome.resolved.len(),
            outcome.unresolved.len(),
            outcome.committed.len()
        );
        for &id in &outcome.committed {
            for listener in &self.listeners {
                listener.resource_resolved(id);
            }
        }
        if critical && !outcome.satisfied() {
            return Err(ResolveError::Unresolved(outcome.report));
        }
        Ok(outcome)
    }

    /// Satisfy one dynamic package requirement of an already resolved
    /// trigger. Locates the trigger's dynamic requirement covering
    /// `package`, resolves and commits matching providers, and returns the
    /// capabilities now available; the trigger's own wiring is not changed.
    pub fn resolve_dynamic(
        &mut self,
        trigger: ResourceId,
        package: &str,
    ) -> Result<Vec<CapabilityRef>, ResolveError> {
        if !self.store.contains(trigger) {
            return Err(ResolveError::NoSuchResource(trigger));
        }
        if !self.table.is_resolved(trigger) {
            return Err(ResolveError::NotResolved(trigger));
        }
        let Some(requirement_ref) = self.dynamic_requirement_for(trigger, package) else {
            return Err(ResolveError::NoDynamicRequirement {
                resource: trigger,
                package: package.to_string(),
            });
        };
        let _gate = acquire(&self.resolving)?;
        let outcome = resolver::resolve_dynamic(
            &self.store,
            &self.registry,
            &mut self.table,
            &self.hook_sources,
            self.config.fragments_enabled,
            trigger,
            requirement_ref,
            package,
        )?;
        for &id in &outcome.committed {
            for listener in &self.listeners {
                listener.resource_resolved(id);
            }
        }
        Ok(outcome.providers)
    }

    /// The trigger's first effective dynamic package requirement whose
    /// filter can accept `package`.
    fn dynamic_requirement_for(&self, trigger: ResourceId, package: &str) -> Option<RequirementRef> {
        let resource = self.store.get(trigger)?;
        for (index, requirement) in resource.requirements_in(PACKAGE_NAMESPACE) {
            if !requirement.is_dynamic() || !requirement.is_effective() {
                continue;
            }
            if dynamic_covers(requirement, package) {
                return Some(RequirementRef::new(trigger, index));
            }
        }
        None
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// The committed wiring of a resource, current or not.
    pub fn wiring(&self, id: ResourceId) -> Option<&Wiring> {
        self.table.get(id)
    }

    /// Committed wirings in commit order.
    pub fn wirings(&self) -> impl Iterator<Item = (ResourceId, &Wiring)> {
        self.table.iter()
    }

    /// Lifecycle state of a resource, `None` if not installed.
    pub fn state(&self, id: ResourceId) -> Option<ResourceState> {
        if !self.store.contains(id) {
            return None;
        }
        Some(if self.table.is_resolved(id) {
            ResourceState::Resolved
        } else {
            ResourceState::Installed
        })
    }

    /// Serializable view of the whole runtime.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.store, &self.table)
    }
}

// ---------------------------------------------------------------------------
// The resolve gate
// ---------------------------------------------------------------------------

/// Clears the single-flight flag when the pass holding it ends.
struct ResolveGate<'a> {
    flag: &'a AtomicBool,
}

impl Drop for ResolveGate<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

fn acquire(flag: &AtomicBool) -> Result<ResolveGate<'_>, ResolveError> {
    if flag.swap(true, Ordering::Acquire) {
        return Err(ResolveError::ReentrantResolve);
    }
    Ok(ResolveGate { flag })
}

/// Whether a dynamic requirement's filter can ever accept `package`: an
/// index-usable equality must name it exactly; any other filter is probed
/// with a synthetic attribute map, which is what lets wildcard declarations
/// like `(patchbay.package=plugins.*)` cover whole package trees. No filter
/// at all covers everything.
fn dynamic_covers(requirement: &Requirement, package: &str) -> bool {
    match classify(requirement.parsed_filter(), PACKAGE_NAMESPACE) {
        LookupPlan::Required { key } | LookupPlan::Necessary { key } => key == package,
        LookupPlan::Insufficient => match requirement.parsed_filter() {
            Some(filter) => {
                let mut probe = IndexMap::new();
                probe.insert(PACKAGE_NAMESPACE.to_string(), Value::from(package));
                filter.matches(&probe)
            }
            None => true,
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
