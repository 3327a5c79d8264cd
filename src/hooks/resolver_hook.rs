//! The hook traits implementors supply.

use super::{HookError, Shrinkable};
use crate::resource::{CapabilityRef, RequirementRef, ResourceId, ResourceStore};

// ---------------------------------------------------------------------------
// HookContext
// ---------------------------------------------------------------------------

/// Read-only view handed to hooks so they can interpret the ids and handles
/// they are given.
pub struct HookContext<'a> {
    store: &'a ResourceStore,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(store: &'a ResourceStore) -> HookContext<'a> {
        HookContext { store }
    }

    /// The resource store of the runtime being resolved.
    pub fn store(&self) -> &ResourceStore {
        self.store
    }
}

// ---------------------------------------------------------------------------
// ResolverHook
// ---------------------------------------------------------------------------

/// Observes and intercepts one resolve call.
///
/// Instances come from a [`ResolverHookSource`] at the start of each resolve
/// and are dropped when it finishes. All methods have default no-op
/// implementations; implementors pick what they need.
///
/// A hook whose `begin` succeeds is *started* and is guaranteed exactly one
/// `end` call, whether the resolve succeeds, fails or is aborted by another
/// hook. Any method except `end` may return an error; that aborts the whole
/// resolve after the started hooks are unwound.
pub trait ResolverHook {
    /// Name used in logs and error reports.
    fn name(&self) -> &str {
        "resolver-hook"
    }

    /// Called once before the batch is resolved. A failure here means this
    /// hook never started: it gets no `end` call.
    fn begin(&mut self, _batch: &[ResourceId], _ctx: &HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }

    /// Offer the batch for shrinking. A removed resource is not resolved in
    /// this call and is reported as rejected.
    fn filter_resolvable(
        &mut self,
        _resources: &mut Shrinkable<'_, ResourceId>,
        _ctx: &HookContext<'_>,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// Offer the candidate capabilities of one requirement for shrinking,
    /// in the engine's preference order.
    fn filter_matches(
        &mut self,
        _requirement: RequirementRef,
        _candidates: &mut Shrinkable<'_, CapabilityRef>,
        _ctx: &HookContext<'_>,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// Offer the singleton collisions of `identity` for shrinking. The
    /// engine calls this symmetrically for both sides of a collision; a
    /// collision stands only if each side survives in the other's list.
    fn filter_singleton_collisions(
        &mut self,
        _identity: CapabilityRef,
        _collisions: &mut Shrinkable<'_, CapabilityRef>,
        _ctx: &HookContext<'_>,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// Called exactly once per started hook when the resolve finishes. An
    /// error here is logged, never propagated.
    fn end(&mut self) -> Result<(), HookError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ResolverHookSource
// ---------------------------------------------------------------------------

/// Supplies fresh hook instances for each resolve call.
///
/// The runtime asks every registered source once per batch, in registration
/// order; the returned hooks observe that batch only.
pub trait ResolverHookSource: Send + Sync + 'static {
    fn hooks_for(&self, batch: &[ResourceId]) -> Vec<Box<dyn ResolverHook>>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
