//! Filter classification against the registry's exact index.
//!
//! Given a requirement's filter and its target namespace, the planner
//! decides how candidates will be fetched:
//!
//! - [`LookupPlan::Required`]: the filter is a single equality on the
//!   canonical attribute. The index bucket *is* the result; no residual
//!   filtering beyond mandatory-attribute checks.
//! - [`LookupPlan::Necessary`]: an equality on the canonical attribute
//!   narrows the search, but the full filter must still run over the
//!   bucket.
//! - [`LookupPlan::Insufficient`]: nothing narrows; scan the namespace and
//!   filter.
//!
//! This is purely an optimization. For any filter and registry state the
//! planned fetch plus residual filtering yields exactly what a full scan
//! plus filter would; the property tests in the resolver hold it to that.

use crate::filter::{Comparator, Filter, FilterNode};

/// How to fetch candidates for one requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupPlan<'f> {
    /// Exact index bucket, no residual filter.
    Required { key: &'f str },
    /// Exact index bucket, then the full filter.
    Necessary { key: &'f str },
    /// Namespace scan, then the full filter.
    Insufficient,
}

impl<'f> LookupPlan<'f> {
    /// The index key, when one is usable.
    pub fn key(&self) -> Option<&'f str> {
        match self {
            LookupPlan::Required { key } | LookupPlan::Necessary { key } => Some(key),
            LookupPlan::Insufficient => None,
        }
    }

    /// Whether the full filter must run over the fetched candidates.
    pub fn needs_residual_filter(&self) -> bool {
        !matches!(self, LookupPlan::Required { .. })
    }
}

/// Classify a filter for lookups in `namespace`. No filter means no
/// constraint at all, which is a scan.
pub fn classify<'f>(filter: Option<&'f Filter>, namespace: &str) -> LookupPlan<'f> {
    let Some(filter) = filter else {
        return LookupPlan::Insufficient;
    };
    let state = walk(filter.root(), namespace);
    match state.key {
        Some(key) if state.exact && state.leaves == 1 => LookupPlan::Required { key },
        Some(key) => LookupPlan::Necessary { key },
        None => LookupPlan::Insufficient,
    }
}

// Classification state for one subtree: a usable index key (if any),
// whether the subtree alone is exact (index bucket needs no residual
// filtering), and how many comparison leaves contribute. Conjunctions
// OR-combine the usefulness bits, disjunctions AND-combine them, negation
// clears them; more than one contributing leaf always forces residual
// filtering.
struct State<'f> {
    key: Option<&'f str>,
    exact: bool,
    leaves: usize,
}

fn walk<'f>(node: &'f FilterNode, namespace: &str) -> State<'f> {
    match node {
        FilterNode::Leaf(leaf) => {
            let indexable =
                leaf.attribute == namespace && leaf.comparator == Comparator::Equal;
            State {
                key: indexable.then_some(leaf.value.as_str()),
                exact: indexable,
                leaves: 1,
            }
        }
        FilterNode::And(kids) => {
            let mut key = None;
            let mut exact = false;
            let mut leaves = 0;
            for kid in kids {
                let kid_state = walk(kid, namespace);
                if key.is_none() {
                    key = kid_state.key;
                }
                exact |= kid_state.exact;
                leaves += kid_state.leaves;
            }
            State { key, exact, leaves }
        }
        FilterNode::Or(kids) => {
            let mut kids = kids.iter();
            let Some(first) = kids.next() else {
                return State {
                    key: None,
                    exact: false,
                    leaves: 0,
                };
            };
            let mut state = walk(first, namespace);
            for kid in kids {
                let kid_state = walk(kid, namespace);
                // A disjunction can only use the index when every branch
                // pins the same key; otherwise a bucket would miss matches
                // from the other branches.
                if state.key != kid_state.key {
                    state.key = None;
                }
                state.exact &= kid_state.exact;
                state.leaves += kid_state.leaves;
            }
            state
        }
        FilterNode::Not(kid) => {
            let inner = walk(kid, namespace);
            // A negated equality cannot become a positive index lookup.
            State {
                key: None,
                exact: false,
                leaves: inner.leaves,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;

    const NS: &str = "patchbay.package";

    fn plan(text: &str) -> LookupPlan<'_> {
        // Leaks are fine in tests; keeps the borrow of the parsed filter
        // alive for the assertion.
        let filter = Box::leak(Box::new(Filter::parse(text).unwrap()));
        classify(Some(filter), NS)
    }

    #[test]
    fn test_single_canonical_equality_is_required() {
        assert_eq!(
            plan("(patchbay.package=app.core.api)"),
            LookupPlan::Required { key: "app.core.api" }
        );
    }

    #[test]
    fn test_no_filter_is_insufficient() {
        assert_eq!(classify(None, NS), LookupPlan::Insufficient);
    }

    #[test]
    fn test_conjunction_degrades_to_necessary() {
        assert_eq!(
            plan("(&(patchbay.package=app.core.api)(version>=1.0.0))"),
            LookupPlan::Necessary { key: "app.core.api" }
        );
    }

    #[test]
    fn test_single_child_conjunction_stays_required() {
        assert_eq!(
            plan("(&(patchbay.package=app.core.api))"),
            LookupPlan::Required { key: "app.core.api" }
        );
    }

    #[test]
    fn test_non_canonical_equality_is_insufficient() {
        assert_eq!(plan("(version=1.0.0)"), LookupPlan::Insufficient);
        assert_eq!(plan("(other=app.core.api)"), LookupPlan::Insufficient);
    }

    #[test]
    fn test_ordering_and_substring_do_not_index() {
        assert_eq!(plan("(patchbay.package>=a)"), LookupPlan::Insufficient);
        assert_eq!(plan("(patchbay.package=app.*)"), LookupPlan::Insufficient);
        assert_eq!(plan("(patchbay.package=*)"), LookupPlan::Insufficient);
    }

    #[test]
    fn test_negation_is_insufficient() {
        assert_eq!(plan("(!(patchbay.package=app.core.api))"), LookupPlan::Insufficient);
        // Negation nested under a conjunction keeps the sibling's key but
        // forces residual filtering.
        assert_eq!(
            plan("(&(patchbay.package=app.core.api)(!(vendor=acme)))"),
            LookupPlan::Necessary { key: "app.core.api" }
        );
    }

    #[test]
    fn test_disjunction_same_key_is_necessary() {
        assert_eq!(
            plan("(|(patchbay.package=p)(patchbay.package=p))"),
            LookupPlan::Necessary { key: "p" }
        );
    }

    #[test]
    fn test_disjunction_different_keys_is_insufficient() {
        assert_eq!(
            plan("(|(patchbay.package=p)(patchbay.package=q))"),
            LookupPlan::Insufficient
        );
        assert_eq!(
            plan("(|(patchbay.package=p)(version>=1.0.0))"),
            LookupPlan::Insufficient
        );
    }

    #[test]
    fn test_nested_composition() {
        // The disjunction agrees on one key, the conjunction keeps it.
        assert_eq!(
            plan("(&(|(patchbay.package=p)(&(patchbay.package=p)(v>=2)))(x=1))"),
            LookupPlan::Necessary { key: "p" }
        );
        // A buried Not poisons only exactness, not the sibling key.
        assert_eq!(
            plan("(&(patchbay.package=p)(|(a=1)(!(b=2))))"),
            LookupPlan::Necessary { key: "p" }
        );
    }

    #[test]
    fn test_empty_conjunction_scans() {
        assert_eq!(plan("(&)"), LookupPlan::Insufficient);
    }
}
