//! The resolution engine.
//!
//! One session runs one pass. Resolution walks depth-first from each batch
//! member: for every in-effect, non-dynamic requirement it takes the ranked
//! candidates, resolves the chosen provider first, wires it, and carries
//! `uses` constraints forward so sibling requirements bind to the same
//! providers. The session accumulates a tentative solution; only a finished
//! pass commits it to the wiring table, so an aborted pass leaves no trace.
//! A partially successful pass commits its successes and reports the rest.
//!
//! A resource that is already being resolved deeper in the stack counts as
//! provisionally satisfied when a dependency cycle closes on it; both
//! wirings land in the same commit or neither does.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use log::{debug, trace};

use crate::hooks::{HookContext, HookError, HookSession, ResolverHookSource};
use crate::registry::CapabilityRegistry;
use crate::resource::{
    CapabilityRef, Requirement, RequirementRef, Resource, ResourceId, ResourceStore, Value,
    HOST_NAMESPACE, PACKAGE_NAMESPACE,
};
use crate::wiring::{ResourceWires, Wire, WiringTable};

use super::candidates::{find_candidates, rank};
use super::error::{
    BatchOutcome, FailedRequirement, RejectReason, RejectedResource, ResolveError,
    UnresolvedReport,
};

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Resolve a batch of resources against the current store and table.
///
/// Members that already hold a wiring are left untouched. Everything the
/// pass managed to resolve is committed even when other members failed; a
/// hook abort commits nothing and surfaces the hook error instead. The
/// outcome names every wiring the pass committed, transitively resolved
/// providers included.
pub(crate) fn resolve_batch(
    store: &ResourceStore,
    registry: &CapabilityRegistry,
    table: &mut WiringTable,
    sources: &[Box<dyn ResolverHookSource>],
    fragments_enabled: bool,
    batch: &[ResourceId],
) -> Result<BatchOutcome, ResolveError> {
    let mut members: Vec<ResourceId> = Vec::new();
    for &id in batch {
        if !members.contains(&id) {
            members.push(id);
        }
    }
    debug!("resolving batch of {} resource(s)", members.len());

    let ctx = HookContext::new(store);
    let mut hooks = HookSession::begin(sources, &members, &ctx)?;
    let mut resolvable = members.clone();
    hooks.filter_resolvable(&mut resolvable, &ctx)?;

    let mut session = ResolveSession::new(store, registry, table, fragments_enabled, hooks, ctx);
    for &id in &members {
        if !resolvable.contains(&id) {
            session.vetoed.insert(id);
            session.rejected.push(RejectedResource {
                resource: id,
                resource_name: store.display_name(id),
                reason: RejectReason::HookVeto,
            });
            debug!("{} removed from the batch by a resolver hook", store.display_name(id));
        }
    }
    for &id in &resolvable {
        if session.table.is_resolved(id) {
            continue;
        }
        session.resolve_resource(id)?;
    }
    session.hooks.end_all();

    let ResolveSession {
        solution,
        failed_requirements,
        rejected,
        ..
    } = session;
    let committed: Vec<ResourceId> = solution.keys().copied().collect();
    table.commit(store, &solution);

    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();
    for &id in &members {
        if table.is_resolved(id) {
            resolved.push(id);
        } else {
            unresolved.push(id);
        }
    }
    debug!(
        "batch done: {}/{} resolved, {} wiring(s) committed",
        resolved.len(),
        members.len(),
        committed.len()
    );
    Ok(BatchOutcome {
        resolved,
        unresolved,
        committed,
        report: UnresolvedReport {
            requirements: failed_requirements,
            resources: rejected,
        },
    })
}

/// What a dynamic lookup established.
#[derive(Debug, Default)]
pub(crate) struct DynamicOutcome {
    /// Usable providers in preference order.
    pub(crate) providers: Vec<CapabilityRef>,
    /// Resources whose wirings the lookup committed, in commit order.
    pub(crate) committed: Vec<ResourceId>,
}

/// Establish providers for one dynamic requirement of an already resolved
/// resource.
///
/// Unresolved providers are resolved opportunistically and committed; the
/// trigger's own wiring is never touched, so the caller decides what to do
/// with the returned capabilities. Both outcome lists are empty when the
/// package is already covered by a static wire or no provider resolves.
#[allow(clippy::too_many_arguments)]
pub(crate) fn resolve_dynamic(
    store: &ResourceStore,
    registry: &CapabilityRegistry,
    table: &mut WiringTable,
    sources: &[Box<dyn ResolverHookSource>],
    fragments_enabled: bool,
    trigger: ResourceId,
    requirement_ref: RequirementRef,
    package: &str,
) -> Result<DynamicOutcome, ResolveError> {
    let Some(requirement) = store.requirement(requirement_ref) else {
        return Ok(DynamicOutcome::default());
    };
    if let Some(wiring) = table.get(trigger) {
        for wire in wiring.required_wires(PACKAGE_NAMESPACE) {
            if package_name(store, wire.capability) == Some(package) {
                debug!(
                    "{} already imports '{package}', dynamic lookup is a no-op",
                    store.display_name(trigger)
                );
                return Ok(DynamicOutcome::default());
            }
        }
    }

    // Dynamic lookups name one concrete package, so the exact index is the
    // candidate pool; the requirement's filter still has the last word.
    let mut candidates: Vec<CapabilityRef> = Vec::new();
    for &handle in registry.get_by_key(PACKAGE_NAMESPACE, package) {
        let Some(capability) = store.capability(handle) else {
            continue;
        };
        if requirement.matches(capability) {
            candidates.push(handle);
        }
    }
    rank(store, table, &mut candidates);

    let ctx = HookContext::new(store);
    let hooks = HookSession::begin(sources, &[trigger], &ctx)?;
    let mut session = ResolveSession::new(store, registry, table, fragments_enabled, hooks, ctx);
    session
        .hooks
        .filter_matches(requirement_ref, &mut candidates, &session.ctx)?;

    let mut providers: Vec<CapabilityRef> = Vec::new();
    for capability in candidates {
        if session.resolve_resource(capability.owner)? {
            providers.push(capability);
            if !requirement.cardinality_multiple() {
                break;
            }
        }
    }
    session.hooks.end_all();
    let ResolveSession { solution, .. } = session;
    let committed: Vec<ResourceId> = solution.keys().copied().collect();
    table.commit(store, &solution);
    debug!(
        "dynamic lookup of '{package}' for {} found {} provider(s)",
        store.display_name(trigger),
        providers.len()
    );
    Ok(DynamicOutcome {
        providers,
        committed,
    })
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Per-requirement-loop outcome.
struct RequirementsOutcome {
    /// A mandatory requirement went unsatisfied.
    missing: bool,
    /// A host attached this fragment mid-loop; the solution entry is the
    /// host's, not the caller's.
    entered: bool,
    /// Host found in the tentative solution; its entry still needs the
    /// fragment recorded once the fragment itself succeeds.
    deferred_host: Option<ResourceId>,
}

enum HostOutcome {
    Entered,
    Attached(ResourceId),
    Unsatisfied,
}

/// State of one resolution pass.
struct ResolveSession<'a> {
    store: &'a ResourceStore,
    registry: &'a CapabilityRegistry,
    table: &'a WiringTable,
    fragments_enabled: bool,
    hooks: HookSession,
    ctx: HookContext<'a>,
    /// Tentative wirings, committed together at the end of the pass.
    solution: IndexMap<ResourceId, ResourceWires>,
    /// Resources currently on the resolution stack; a cycle closing on one
    /// of these treats it as satisfied.
    in_resolution: HashSet<ResourceId>,
    vetoed: HashSet<ResourceId>,
    failed: HashSet<ResourceId>,
    failed_requirements: Vec<FailedRequirement>,
    rejected: Vec<RejectedResource>,
}

impl<'a> ResolveSession<'a> {
    fn new(
        store: &'a ResourceStore,
        registry: &'a CapabilityRegistry,
        table: &'a WiringTable,
        fragments_enabled: bool,
        hooks: HookSession,
        ctx: HookContext<'a>,
    ) -> ResolveSession<'a> {
        ResolveSession {
            store,
            registry,
            table,
            fragments_enabled,
            hooks,
            ctx,
            solution: IndexMap::new(),
            in_resolution: HashSet::new(),
            vetoed: HashSet::new(),
            failed: HashSet::new(),
            failed_requirements: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// Resolve one resource, recursing into providers. `Ok(true)` means the
    /// resource holds a wiring, sits in the solution, or is further up the
    /// stack; `Ok(false)` means it cannot resolve in this pass.
    fn resolve_resource(&mut self, id: ResourceId) -> Result<bool, HookError> {
        if self.table.is_resolved(id) || self.solution.contains_key(&id) {
            return Ok(true);
        }
        if self.in_resolution.contains(&id) {
            trace!("cycle closed on resource {id}, treating as satisfied");
            return Ok(true);
        }
        if self.vetoed.contains(&id) || self.failed.contains(&id) {
            return Ok(false);
        }
        if !self.store.contains(id) {
            return Ok(false);
        }
        self.in_resolution.insert(id);
        let outcome = self.resolve_inner(id);
        self.in_resolution.remove(&id);
        let resolved = outcome?;
        if !resolved {
            self.failed.insert(id);
        }
        Ok(resolved)
    }

    fn resolve_inner(&mut self, id: ResourceId) -> Result<bool, HookError> {
        let store = self.store;
        let Some(resource) = store.get(id) else {
            return Ok(false);
        };
        if !self.check_singleton(id, resource)? {
            self.rejected.push(RejectedResource {
                resource: id,
                resource_name: store.display_name(id),
                reason: RejectReason::SingletonCollision,
            });
            debug!("{} rejected: singleton collision", store.display_name(id));
            return Ok(false);
        }

        let mut entry = ResourceWires::default();
        if self.fragments_enabled && !resource.is_fragment() {
            if let Some(index) = resource.host_capability_index() {
                self.attach_pending_fragments(id, CapabilityRef::new(id, index), &mut entry)?;
            }
        }

        let outcome = self.resolve_requirements(id, resource, false, &mut entry)?;
        if outcome.entered {
            return Ok(true);
        }
        if outcome.missing {
            // The host never made it; attached fragments go back to the
            // pending pool for some other host or a later pass.
            for &fragment in entry.attached_fragments() {
                self.solution.shift_remove(&fragment);
            }
            return Ok(false);
        }
        if let Some(host) = outcome.deferred_host {
            if let Some(host_entry) = self.solution.get_mut(&host) {
                host_entry.attach_fragment(id);
            }
        }
        debug!(
            "resolved {} with {} wire(s)",
            store.display_name(id),
            entry.wires().len()
        );
        self.solution.insert(id, entry);
        Ok(true)
    }

    /// Wire every in-effect, non-dynamic requirement of `resource` into
    /// `entry`. Host requirements go through fragment attachment;
    /// everything else through candidate selection.
    fn resolve_requirements(
        &mut self,
        id: ResourceId,
        resource: &Resource,
        skip_host: bool,
        entry: &mut ResourceWires,
    ) -> Result<RequirementsOutcome, HookError> {
        let mut outcome = RequirementsOutcome {
            missing: false,
            entered: false,
            deferred_host: None,
        };
        // Bindings a uses-walk pinned for requirements further down the
        // list, keyed by declaration index.
        let mut pinned: HashMap<usize, Wire> = HashMap::new();

        for (index, requirement) in resource.requirements().iter().enumerate() {
            if !requirement.is_effective() || requirement.is_dynamic() {
                continue;
            }
            let req_ref = RequirementRef::new(id, index);

            if requirement.namespace == HOST_NAMESPACE {
                if skip_host {
                    continue;
                }
                match self.satisfy_host_requirement(id, req_ref, requirement, entry)? {
                    HostOutcome::Entered => {
                        outcome.entered = true;
                        return Ok(outcome);
                    }
                    HostOutcome::Attached(host) => {
                        outcome.deferred_host = Some(host);
                    }
                    HostOutcome::Unsatisfied => {
                        if requirement.is_mandatory() {
                            self.record_missing(id, index, requirement);
                            outcome.missing = true;
                        }
                    }
                }
                continue;
            }

            if let Some(wire) = pinned.remove(&index) {
                entry.add_wire(wire);
                continue;
            }

            let mut candidates =
                find_candidates(self.store, self.registry, self.table, requirement);
            self.hooks.filter_matches(req_ref, &mut candidates, &self.ctx)?;

            let mut wired = false;
            for capability in candidates {
                if !self.resolve_resource(capability.owner)? {
                    trace!(
                        "provider {} unusable for {}#{}",
                        capability.owner,
                        id,
                        index
                    );
                    continue;
                }
                entry.add_wire(Wire::new(capability, req_ref));
                wired = true;
                self.walk_uses(id, resource, index, capability, &mut pinned);
                if !requirement.cardinality_multiple() {
                    break;
                }
            }
            if !wired && requirement.is_mandatory() {
                self.record_missing(id, index, requirement);
                outcome.missing = true;
            }
        }
        Ok(outcome)
    }

    /// Find a host for a fragment's host requirement. Prefers hosts already
    /// in the tentative solution; otherwise resolves a candidate host,
    /// which normally attaches the fragment from its own side.
    fn satisfy_host_requirement(
        &mut self,
        fragment_id: ResourceId,
        req_ref: RequirementRef,
        requirement: &Requirement,
        entry: &mut ResourceWires,
    ) -> Result<HostOutcome, HookError> {
        if !self.fragments_enabled {
            return Ok(HostOutcome::Unsatisfied);
        }
        let mut candidates = find_candidates(self.store, self.registry, self.table, requirement);
        self.hooks.filter_matches(req_ref, &mut candidates, &self.ctx)?;

        for host_cap in candidates {
            let host = host_cap.owner;
            if host == fragment_id {
                continue;
            }
            if self.table.is_resolved(host) {
                // A committed wiring is immutable; attaching would change
                // the host's capability set after the fact.
                trace!("host {host} already wired, fragment {fragment_id} cannot attach");
                continue;
            }
            if self.solution.contains_key(&host) {
                entry.add_wire(Wire::new(host_cap, req_ref));
                return Ok(HostOutcome::Attached(host));
            }
            if self.resolve_resource(host)? {
                if self.solution.contains_key(&fragment_id) {
                    // The host's pass picked us up as a pending fragment
                    // and resolved the rest of our requirements with it.
                    return Ok(HostOutcome::Entered);
                }
                if self.solution.contains_key(&host) {
                    entry.add_wire(Wire::new(host_cap, req_ref));
                    return Ok(HostOutcome::Attached(host));
                }
            }
        }
        Ok(HostOutcome::Unsatisfied)
    }

    /// Attach every pending fragment whose host requirement matches
    /// `host_cap`. Runs before the host's own requirements so hosted
    /// capabilities exist by the time the host is wired up.
    fn attach_pending_fragments(
        &mut self,
        host_id: ResourceId,
        host_cap: CapabilityRef,
        host_entry: &mut ResourceWires,
    ) -> Result<(), HookError> {
        let store = self.store;
        let pending: Vec<ResourceId> = store
            .iter()
            .filter(|(fragment_id, fragment)| {
                fragment.is_fragment()
                    && !self.table.is_resolved(*fragment_id)
                    && !self.solution.contains_key(fragment_id)
                    && !self.vetoed.contains(fragment_id)
                    && !self.failed.contains(fragment_id)
            })
            .map(|(fragment_id, _)| fragment_id)
            .collect();

        for fragment_id in pending {
            // Attaching one fragment can resolve others along the way.
            if self.solution.contains_key(&fragment_id) || self.failed.contains(&fragment_id) {
                continue;
            }
            let Some(fragment) = store.get(fragment_id) else {
                continue;
            };
            let Some(req_ref) = store.host_requirement_ref(fragment_id) else {
                continue;
            };
            let Some(requirement) = store.requirement(req_ref) else {
                continue;
            };
            if !requirement.is_effective() {
                continue;
            }
            let mut candidates =
                find_candidates(self.store, self.registry, self.table, requirement);
            self.hooks.filter_matches(req_ref, &mut candidates, &self.ctx)?;
            if !candidates.contains(&host_cap) {
                continue;
            }

            let mut fragment_entry = ResourceWires::default();
            fragment_entry.add_wire(Wire::new(host_cap, req_ref));
            // The fragment may itself be mid-resolution further up the
            // stack; only take the guard if we put it there.
            let was_new = self.in_resolution.insert(fragment_id);
            let outcome = self.resolve_requirements(fragment_id, fragment, true, &mut fragment_entry);
            if was_new {
                self.in_resolution.remove(&fragment_id);
            }
            let outcome = outcome?;
            if outcome.missing {
                debug!(
                    "fragment {} skipped: its own requirements failed",
                    store.display_name(fragment_id)
                );
                self.failed.insert(fragment_id);
                continue;
            }
            self.solution.insert(fragment_id, fragment_entry);
            host_entry.attach_fragment(fragment_id);
            debug!(
                "attached fragment {} to {}",
                store.display_name(fragment_id),
                store.display_name(host_id)
            );
        }
        Ok(())
    }

    /// Whether `id` may resolve given the singleton rules. A collision with
    /// a standing singleton of the same name fails unless hooks waive it
    /// from both sides.
    fn check_singleton(&mut self, id: ResourceId, resource: &Resource) -> Result<bool, HookError> {
        if !resource.is_singleton() {
            return Ok(true);
        }
        let Some(name) = resource.symbolic_name() else {
            return Ok(true);
        };
        let store = self.store;
        let mut collisions: Vec<CapabilityRef> = Vec::new();
        for (other_id, other) in store.iter() {
            if other_id == id || !other.is_singleton() || other.symbolic_name() != Some(name) {
                continue;
            }
            if !self.table.is_resolved(other_id) && !self.solution.contains_key(&other_id) {
                continue;
            }
            if let Some(identity) = store.identity_ref(other_id) {
                collisions.push(identity);
            }
        }
        if collisions.is_empty() {
            return Ok(true);
        }
        let Some(identity) = store.identity_ref(id) else {
            return Ok(true);
        };

        let mut standing = collisions;
        self.hooks
            .filter_singleton_collisions(identity, &mut standing, &self.ctx)?;
        for other in standing {
            // A waiver must hold from both perspectives.
            let mut reverse = vec![identity];
            self.hooks
                .filter_singleton_collisions(other, &mut reverse, &self.ctx)?;
            if reverse.contains(&identity) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Propagate the `uses` constraints of a freshly wired capability: any
    /// package bound through it is offered to the requirer's later
    /// requirements, pinning them to the same provider.
    fn walk_uses(
        &self,
        id: ResourceId,
        resource: &Resource,
        index: usize,
        capability: CapabilityRef,
        pinned: &mut HashMap<usize, Wire>,
    ) {
        let store = self.store;
        let Some(start) = store.capability(capability) else {
            return;
        };
        let mut queue: Vec<(ResourceId, String)> = start
            .uses()
            .iter()
            .map(|package| (capability.owner, (*package).to_string()))
            .collect();
        let mut visited: HashSet<String> = HashSet::new();

        while let Some((provider, package)) = queue.pop() {
            if !visited.insert(package.clone()) {
                continue;
            }
            let Some(bound) = self.bound_package(provider, &package) else {
                continue;
            };
            if let Some(bound_cap) = store.capability(bound) {
                for used in bound_cap.uses() {
                    queue.push((bound.owner, used.to_string()));
                }
                for (later_index, later) in
                    resource.requirements().iter().enumerate().skip(index + 1)
                {
                    if !later.is_effective()
                        || later.is_dynamic()
                        || later.namespace == HOST_NAMESPACE
                    {
                        continue;
                    }
                    if later.matches(bound_cap) {
                        trace!(
                            "uses constraint pins {}#{} to provider {}",
                            id,
                            later_index,
                            bound.owner
                        );
                        pinned.insert(
                            later_index,
                            Wire::new(bound, RequirementRef::new(id, later_index)),
                        );
                    }
                }
            }
        }
    }

    /// The package capability `provider` is actually wired to for
    /// `package`: what it imports wins over what it exports.
    fn bound_package(&self, provider: ResourceId, package: &str) -> Option<CapabilityRef> {
        let store = self.store;
        if let Some(wiring) = self.table.get(provider) {
            for wire in wiring.required_wires(PACKAGE_NAMESPACE) {
                if package_name(store, wire.capability) == Some(package) {
                    return Some(wire.capability);
                }
            }
        } else if let Some(entry) = self.solution.get(&provider) {
            for wire in entry.wires() {
                if package_name(store, wire.capability) == Some(package) {
                    return Some(wire.capability);
                }
            }
        }
        let resource = store.get(provider)?;
        for (index, capability) in resource.capabilities_in(PACKAGE_NAMESPACE) {
            if !capability.is_effective() {
                continue;
            }
            let handle = CapabilityRef::new(provider, index);
            if package_name(store, handle) == Some(package) {
                return Some(handle);
            }
        }
        None
    }

    fn record_missing(&mut self, id: ResourceId, index: usize, requirement: &Requirement) {
        let resource_name = self.store.display_name(id);
        debug!(
            "{resource_name}: no provider for {}{}",
            requirement.namespace,
            requirement
                .parsed_filter()
                .map(|filter| format!(" matching {}", filter.text()))
                .unwrap_or_default()
        );
        self.failed_requirements.push(FailedRequirement {
            resource: id,
            resource_name,
            requirement: RequirementRef::new(id, index),
            namespace: requirement.namespace.clone(),
            filter: requirement
                .parsed_filter()
                .map(|filter| filter.text().to_string()),
        });
    }
}

/// Canonical package name of a package capability, `None` for anything
/// else.
fn package_name(store: &ResourceStore, capability: CapabilityRef) -> Option<&str> {
    let capability = store.capability(capability)?;
    if capability.namespace != PACKAGE_NAMESPACE {
        return None;
    }
    match capability.canonical_value() {
        Some(Value::Str(name)) => Some(name.as_str()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
