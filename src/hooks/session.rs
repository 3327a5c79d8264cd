//! Drives the hook lifecycle for one resolve call.

use log::warn;

use super::{HookContext, HookError, ResolverHook, ResolverHookSource, Shrinkable};
use crate::resource::{CapabilityRef, RequirementRef, ResourceId};

/// The started hooks of one resolve call.
///
/// [`HookSession::begin`] collects instances from the sources and runs
/// `begin` on each; from then on every started hook is owed exactly one
/// `end`, delivered by [`HookSession::end_all`]. The `Drop` impl is the
/// safety net for early returns, so an aborted resolve can simply propagate
/// its error and let the session unwind.
pub(crate) struct HookSession {
    hooks: Vec<Box<dyn ResolverHook>>,
    ended: bool,
}

impl HookSession {
    /// Collect hooks for `batch` and start them. A hook whose `begin` fails
    /// is not started; hooks started before it are unwound and the error is
    /// returned.
    pub(crate) fn begin(
        sources: &[Box<dyn ResolverHookSource>],
        batch: &[ResourceId],
        ctx: &HookContext<'_>,
    ) -> Result<HookSession, HookError> {
        let mut session = HookSession {
            hooks: Vec::new(),
            ended: false,
        };
        for source in sources {
            for mut hook in source.hooks_for(batch) {
                if let Err(err) = hook.begin(batch, ctx) {
                    warn!("{err}, aborting before start");
                    session.end_all();
                    return Err(err);
                }
                session.hooks.push(hook);
            }
        }
        Ok(session)
    }

    /// Offer the resolvable batch to every hook in turn.
    pub(crate) fn filter_resolvable(
        &mut self,
        resources: &mut Vec<ResourceId>,
        ctx: &HookContext<'_>,
    ) -> Result<(), HookError> {
        for hook in &mut self.hooks {
            hook.filter_resolvable(&mut Shrinkable::new(resources), ctx)?;
        }
        Ok(())
    }

    /// Offer one requirement's candidates to every hook in turn.
    pub(crate) fn filter_matches(
        &mut self,
        requirement: RequirementRef,
        candidates: &mut Vec<CapabilityRef>,
        ctx: &HookContext<'_>,
    ) -> Result<(), HookError> {
        for hook in &mut self.hooks {
            hook.filter_matches(requirement, &mut Shrinkable::new(candidates), ctx)?;
        }
        Ok(())
    }

    /// Offer one identity's singleton collisions to every hook in turn.
    pub(crate) fn filter_singleton_collisions(
        &mut self,
        identity: CapabilityRef,
        collisions: &mut Vec<CapabilityRef>,
        ctx: &HookContext<'_>,
    ) -> Result<(), HookError> {
        for hook in &mut self.hooks {
            hook.filter_singleton_collisions(identity, &mut Shrinkable::new(collisions), ctx)?;
        }
        Ok(())
    }

    /// Run `end` on every started hook, once. Errors from `end` are logged
    /// and swallowed; the resolve outcome is already decided by this point.
    pub(crate) fn end_all(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        for hook in &mut self.hooks {
            if let Err(err) = hook.end() {
                warn!("{err} while ending");
            }
        }
    }
}

impl Drop for HookSession {
    fn drop(&mut self) {
        self.end_all();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
