//! Resolution errors and the per-batch failure report.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::hooks::HookError;
use crate::resource::{RequirementRef, ResourceId};

// ---------------------------------------------------------------------------
// ResolveError
// ---------------------------------------------------------------------------

/// Errors raised by a resolution pass.
///
/// [`ResolveError::Unresolved`] is only produced when the caller asked for a
/// critical resolve; a normal pass reports the same information through
/// [`BatchOutcome`] instead.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A critical resolve left part of the batch unresolved.
    #[error("{0}")]
    Unresolved(UnresolvedReport),

    /// A resolver hook refused to begin or vetoed mid-pass.
    #[error(transparent)]
    HookAborted(#[from] HookError),

    /// A resolve was requested while another one is in flight.
    #[error("a resolution pass is already in progress")]
    ReentrantResolve,

    /// A dynamic lookup was requested for a resource that is not resolved.
    #[error("resource {0} is not resolved")]
    NotResolved(ResourceId),

    /// The batch named a resource the store does not hold.
    #[error("no such resource: {0}")]
    NoSuchResource(ResourceId),

    /// A dynamic lookup found no dynamic requirement covering the package.
    #[error("resource {resource} declares no dynamic requirement covering package '{package}'")]
    NoDynamicRequirement {
        /// The triggering resource.
        resource: ResourceId,
        /// The package name that was asked for.
        package: String,
    },
}

// ---------------------------------------------------------------------------
// Failure report
// ---------------------------------------------------------------------------

/// Why a resource was thrown out of the batch before requirement matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    /// A resolver hook removed it from the resolvable set.
    HookVeto,
    /// Another resolved singleton with the same name stood.
    SingletonCollision,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::HookVeto => write!(f, "vetoed by resolver hook"),
            RejectReason::SingletonCollision => write!(f, "singleton collision"),
        }
    }
}

/// A mandatory requirement the pass could not satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRequirement {
    /// The resource declaring the requirement.
    pub resource: ResourceId,
    /// Its display name, captured at failure time.
    pub resource_name: String,
    /// Handle to the declaration itself.
    pub requirement: RequirementRef,
    /// Namespace the requirement searches.
    pub namespace: String,
    /// Filter text, when the requirement carries one.
    pub filter: Option<String>,
}

impl fmt::Display for FailedRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: no provider for {}", self.resource_name, self.namespace)?;
        if let Some(filter) = &self.filter {
            write!(f, " matching {filter}")?;
        }
        Ok(())
    }
}

/// A resource rejected as a whole, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedResource {
    /// The rejected resource.
    pub resource: ResourceId,
    /// Its display name, captured at rejection time.
    pub resource_name: String,
    /// Why it went.
    pub reason: RejectReason,
}

/// Everything that kept parts of a batch from resolving.
///
/// Empty on a fully successful pass. The report accumulates across the whole
/// batch: one pass can carry several failed requirements from several
/// resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnresolvedReport {
    /// Mandatory requirements with no usable provider.
    pub requirements: Vec<FailedRequirement>,
    /// Resources rejected before matching started.
    pub resources: Vec<RejectedResource>,
}

impl UnresolvedReport {
    /// Whether the report carries nothing.
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty() && self.resources.is_empty()
    }
}

impl fmt::Display for UnresolvedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} unsatisfied requirement(s), {} rejected resource(s)",
            self.requirements.len(),
            self.resources.len()
        )?;
        for failed in &self.requirements {
            write!(f, "\n  {failed}")?;
        }
        for rejected in &self.resources {
            write!(f, "\n  {}: {}", rejected.resource_name, rejected.reason)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// BatchOutcome
// ---------------------------------------------------------------------------

/// What a resolution pass did to its batch.
///
/// Wirings for `resolved` members are already committed when the outcome is
/// returned; a partially satisfied batch keeps its successful members.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    /// Batch members that hold a committed wiring after the pass.
    pub resolved: Vec<ResourceId>,
    /// Batch members still without one.
    pub unresolved: Vec<ResourceId>,
    /// Resources whose wirings this pass created, in commit order.
    /// Providers pulled in transitively are listed too; members that
    /// already held a wiring are not.
    pub committed: Vec<ResourceId>,
    /// Why the unresolved members failed.
    pub report: UnresolvedReport,
}

impl BatchOutcome {
    /// Whether every batch member resolved.
    pub fn satisfied(&self) -> bool {
        self.unresolved.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display_lists_details() {
        let report = UnresolvedReport {
            requirements: vec![FailedRequirement {
                resource: ResourceId(4),
                resource_name: "app [4]".to_string(),
                requirement: RequirementRef::new(ResourceId(4), 1),
                namespace: "patchbay.package".to_string(),
                filter: Some("(pkg=util.text)".to_string()),
            }],
            resources: vec![RejectedResource {
                resource: ResourceId(7),
                resource_name: "dup [7]".to_string(),
                reason: RejectReason::SingletonCollision,
            }],
        };
        let text = report.to_string();
        assert!(text.starts_with("1 unsatisfied requirement(s), 1 rejected resource(s)"));
        assert!(text.contains("app [4]: no provider for patchbay.package matching (pkg=util.text)"));
        assert!(text.contains("dup [7]: singleton collision"));
    }

    #[test]
    fn test_empty_report() {
        let report = UnresolvedReport::default();
        assert!(report.is_empty());
        assert_eq!(
            report.to_string(),
            "0 unsatisfied requirement(s), 0 rejected resource(s)"
        );
    }

    #[test]
    fn test_outcome_satisfied() {
        let outcome = BatchOutcome {
            resolved: vec![ResourceId(1)],
            unresolved: vec![],
            committed: vec![ResourceId(1)],
            report: UnresolvedReport::default(),
        };
        assert!(outcome.satisfied());
    }
}
