//! Serializable views of runtime state.
//!
//! A [`Snapshot`] is a point-in-time, JSON-friendly rendering of every
//! installed resource, its state and its wires. The CLI prints these; they
//! also make decent fixtures for debugging a resolution gone wrong.

use chrono::{DateTime, Utc};
use semver::Version;
use serde::Serialize;

use super::ResourceState;
use crate::resource::{ResourceId, ResourceStore};
use crate::wiring::{Wire, WiringTable};

/// Point-in-time view of a runtime.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Version of the crate that produced the snapshot.
    pub engine_version: String,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
    /// One entry per installed resource, in install order.
    pub resources: Vec<ResourceSnapshot>,
}

/// One resource in a [`Snapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSnapshot {
    pub id: ResourceId,
    pub name: Option<String>,
    pub version: Option<Version>,
    pub state: ResourceState,
    /// Whether the wiring, if any, is still current.
    pub current: bool,
    /// Whether some other current wiring depends on this resource.
    pub in_use: bool,
    pub fragment: bool,
    /// Wires this resource requires from providers.
    pub required: Vec<WireSnapshot>,
    /// Wires this resource provides to requirers.
    pub provided: Vec<WireSnapshot>,
}

/// One wire, rendered with display names instead of raw handles.
#[derive(Debug, Clone, Serialize)]
pub struct WireSnapshot {
    pub namespace: String,
    pub provider: String,
    pub requirer: String,
}

impl Snapshot {
    pub(super) fn capture(store: &ResourceStore, table: &WiringTable) -> Snapshot {
        let resources = store
            .iter()
            .map(|(id, resource)| {
                let wiring = table.get(id);
                let describe = |wires: Vec<&Wire>| {
                    wires
                        .into_iter()
                        .map(|wire| WireSnapshot::describe(store, wire))
                        .collect()
                };
                ResourceSnapshot {
                    id,
                    name: resource.symbolic_name().map(str::to_string),
                    version: resource.version().cloned(),
                    state: if wiring.is_some() {
                        ResourceState::Resolved
                    } else {
                        ResourceState::Installed
                    },
                    current: table.is_current(id),
                    in_use: table.is_in_use(id),
                    fragment: resource.is_fragment(),
                    required: describe(wiring.map(|w| w.all_required().collect()).unwrap_or_default()),
                    provided: describe(wiring.map(|w| w.all_provided().collect()).unwrap_or_default()),
                }
            })
            .collect();
        Snapshot {
            engine_version: crate::VERSION.to_string(),
            taken_at: Utc::now(),
            resources,
        }
    }
}

impl WireSnapshot {
    fn describe(store: &ResourceStore, wire: &Wire) -> WireSnapshot {
        let namespace = store
            .capability(wire.capability)
            .map(|capability| capability.namespace.clone())
            .unwrap_or_default();
        WireSnapshot {
            namespace,
            provider: store.display_name(wire.provider),
            requirer: store.display_name(wire.requirer),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
