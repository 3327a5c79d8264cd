//! Wires and wirings: the output side of resolution.
//!
//! A [`Wire`] connects one requirement to one capability; a [`Wiring`] is
//! the per-resource aggregate of everything resolution established for it.
//! The [`WiringTable`] owns all committed wirings and handles teardown when
//! resources are refreshed or uninstalled.

mod table;
mod wiring;

use serde::{Deserialize, Serialize};

pub use table::{ResourceWires, WiringTable};
pub use wiring::Wiring;

use crate::resource::{CapabilityRef, RequirementRef, ResourceId};

/// A resolved connection between a requirement and a capability.
///
/// Immutable once created. Two wires are equal only when capability,
/// requirement, provider and requirer all agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Wire {
    /// The capability being provided.
    pub capability: CapabilityRef,
    /// The requirement being satisfied.
    pub requirement: RequirementRef,
    /// The resource declaring the capability.
    pub provider: ResourceId,
    /// The resource declaring the requirement.
    pub requirer: ResourceId,
}

impl Wire {
    /// Connect `requirement` to `capability`. Provider and requirer are the
    /// handle owners, which keeps the four fields consistent by
    /// construction.
    pub fn new(capability: CapabilityRef, requirement: RequirementRef) -> Wire {
        Wire {
            capability,
            requirement,
            provider: capability.owner,
            requirer: requirement.owner,
        }
    }

    /// Whether this wire touches `id` on either side.
    pub fn references(&self, id: ResourceId) -> bool {
        self.provider == id || self.requirer == id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
