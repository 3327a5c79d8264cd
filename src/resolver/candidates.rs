//! Candidate discovery and ranking for one requirement.
//!
//! Discovery follows the lookup plan: a namespace scan when the filter
//! cannot use the exact index, index buckets when it can. The exact index
//! stores the *display form* of canonical values, so a filter operand that
//! spells a number or version differently ("042", "1.0.0 ") would miss its
//! bucket; [`canonical_probes`] closes that gap by also probing the display
//! form of every successful typed parse of the operand. Either way the
//! result is exactly what a full scan plus [`Requirement::matches`] would
//! produce, just cheaper.
//!
//! Ranking is deterministic: providers that already hold a current wiring
//! sort first, then higher versions, then lower resource ids.

use std::cmp::Ordering;

use log::trace;
use semver::Version;

use crate::registry::planner::{classify, LookupPlan};
use crate::registry::CapabilityRegistry;
use crate::resource::{Capability, CapabilityRef, Requirement, ResourceStore};
use crate::wiring::WiringTable;

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// All usable providers for `requirement`, ranked. The caller applies hook
/// filtering and resolvability on top.
pub(crate) fn find_candidates(
    store: &ResourceStore,
    registry: &CapabilityRegistry,
    table: &WiringTable,
    requirement: &Requirement,
) -> Vec<CapabilityRef> {
    let mut candidates = collect_candidates(store, registry, requirement);
    rank(store, table, &mut candidates);
    candidates
}

/// Matching capabilities in registry order, before ranking.
pub(crate) fn collect_candidates(
    store: &ResourceStore,
    registry: &CapabilityRegistry,
    requirement: &Requirement,
) -> Vec<CapabilityRef> {
    let namespace = requirement.namespace.as_str();
    let plan = classify(requirement.parsed_filter(), namespace);
    let mut out: Vec<CapabilityRef> = Vec::new();
    match plan {
        LookupPlan::Insufficient => {
            // The per-namespace list also holds non-effective capabilities;
            // the exact index already excludes them.
            for &handle in registry.get_all(namespace) {
                let Some(capability) = store.capability(handle) else {
                    continue;
                };
                if capability.is_effective() && requirement.matches(capability) {
                    out.push(handle);
                }
            }
        }
        LookupPlan::Required { key } | LookupPlan::Necessary { key } => {
            let exact = !plan.needs_residual_filter();
            for (nth, probe) in canonical_probes(key).iter().enumerate() {
                for &handle in registry.get_by_key(namespace, probe) {
                    if out.contains(&handle) {
                        continue;
                    }
                    let Some(capability) = store.capability(handle) else {
                        continue;
                    };
                    // Membership in the literal bucket already proves the
                    // single equality leaf, leaving only the mandatory
                    // check. Buckets reached through a re-spelled probe
                    // still need the full filter: the bucket also holds
                    // string values that happen to share the display form.
                    let usable = if exact && nth == 0 {
                        requirement.mandatory_satisfied(capability)
                    } else {
                        requirement.matches(capability)
                    };
                    if usable {
                        out.push(handle);
                    }
                }
            }
        }
    }
    trace!(
        "{} candidate(s) for {} via {:?}",
        out.len(),
        namespace,
        plan
    );
    out
}

/// Index keys that can hold a capability whose canonical value equals the
/// filter operand `key`: the operand itself, plus the display form of every
/// typed reading of it. Mirrors the evaluator's coercions, which trim the
/// operand before parsing it as integer, boolean or version.
pub(crate) fn canonical_probes(key: &str) -> Vec<String> {
    let mut probes = vec![key.to_string()];
    let trimmed = key.trim();
    let mut push = |probe: String| {
        if !probes.contains(&probe) {
            probes.push(probe);
        }
    };
    if let Ok(int) = trimmed.parse::<i64>() {
        push(int.to_string());
    }
    if let Ok(flag) = trimmed.parse::<bool>() {
        push(flag.to_string());
    }
    if let Ok(version) = Version::parse(trimmed) {
        push(version.to_string());
    }
    probes
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Order candidates for selection: providers with a current wiring first,
/// then by descending `version` attribute (versionless last), then by
/// ascending owner id and declaration index. Stable across runs for a given
/// store and table.
pub(crate) fn rank(store: &ResourceStore, table: &WiringTable, candidates: &mut [CapabilityRef]) {
    candidates.sort_by(|a, b| {
        let a_current = table.is_current(a.owner);
        let b_current = table.is_current(b.owner);
        b_current
            .cmp(&a_current)
            .then_with(|| {
                let a_version = store.capability(*a).and_then(Capability::version);
                let b_version = store.capability(*b).and_then(Capability::version);
                match (a_version, b_version) {
                    (Some(a), Some(b)) => b.cmp(a),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            })
            .then_with(|| a.owner.cmp(&b.owner))
            .then_with(|| a.index.cmp(&b.index))
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
