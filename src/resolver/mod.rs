//! Dependency resolution.
//!
//! The resolver turns declared requirements into wires. A pass starts from
//! a batch of resources and works depth-first: candidates are fetched
//! through the registry's exact index where the filter allows it, ranked,
//! offered to resolver hooks, and the first usable provider is wired in
//! after resolving it first. Fragments attach to their hosts before the
//! host's own requirements are processed; singletons are checked against
//! every standing resource of the same name; `uses` constraints pin sibling
//! requirements to providers already chosen upstream.
//!
//! Nothing is visible outside the pass until it commits. An aborted pass
//! (a hook refusing to begin, or failing mid-flight) discards its tentative
//! solution entirely; a normally finished pass commits every resolved
//! resource even when some batch members failed, and reports those through
//! [`UnresolvedReport`].

mod candidates;
mod engine;
mod error;

pub use error::{
    BatchOutcome, FailedRequirement, RejectReason, RejectedResource, ResolveError,
    UnresolvedReport,
};

pub(crate) use engine::{resolve_batch, resolve_dynamic};
