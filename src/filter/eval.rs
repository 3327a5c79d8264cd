//! Filter evaluation against typed attribute maps.
//!
//! The textual operand of a comparison is coerced to the type of the
//! attribute it meets: comparing against a version attribute parses the
//! operand as a version, against an integer as an integer, and so on. A
//! failed coercion is a non-match, never an error. List-valued attributes
//! match when any element matches.

use std::cmp::Ordering;
use std::collections::HashMap;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use semver::Version;

use super::{Comparator, FilterLeaf, FilterNode};
use crate::resource::Value;

pub(crate) fn eval(node: &FilterNode, attrs: &IndexMap<String, Value>) -> bool {
    match node {
        FilterNode::And(kids) => kids.iter().all(|kid| eval(kid, attrs)),
        FilterNode::Or(kids) => kids.iter().any(|kid| eval(kid, attrs)),
        FilterNode::Not(kid) => !eval(kid, attrs),
        FilterNode::Leaf(leaf) => eval_leaf(leaf, attrs),
    }
}

fn eval_leaf(leaf: &FilterLeaf, attrs: &IndexMap<String, Value>) -> bool {
    let Some(value) = attrs.get(&leaf.attribute) else {
        return false;
    };
    match &leaf.comparator {
        Comparator::Present => true,
        Comparator::Equal => value_eq(value, &leaf.value),
        Comparator::GreaterEq => {
            value_cmp(value, &leaf.value).is_some_and(|ord| ord != Ordering::Less)
        }
        Comparator::LessEq => {
            value_cmp(value, &leaf.value).is_some_and(|ord| ord != Ordering::Greater)
        }
        Comparator::Substring(segments) => value_substring(value, segments),
    }
}

// ---------------------------------------------------------------------------
// Typed comparisons
// ---------------------------------------------------------------------------

fn value_eq(value: &Value, operand: &str) -> bool {
    match value {
        Value::Str(s) => s == operand,
        Value::Version(v) => Version::parse(operand.trim()).is_ok_and(|o| *v == o),
        Value::Int(i) => operand.trim().parse::<i64>().is_ok_and(|o| *i == o),
        Value::Bool(b) => operand.trim().parse::<bool>().is_ok_and(|o| *b == o),
        Value::StrList(items) => items.iter().any(|s| s == operand),
        Value::VersionList(items) => {
            Version::parse(operand.trim()).is_ok_and(|o| items.contains(&o))
        }
    }
}

/// Ordering of `value` relative to the operand; `None` when the operand
/// does not coerce or the value type has no ordering. For lists the best
/// (closest to `Equal`) element ordering wins, so `any element >= operand`
/// and `any element <= operand` both behave as expected.
fn value_cmp(value: &Value, operand: &str) -> Option<Ordering> {
    match value {
        Value::Str(s) => Some(s.as_str().cmp(operand)),
        Value::Version(v) => Version::parse(operand.trim()).ok().map(|o| v.cmp(&o)),
        Value::Int(i) => operand.trim().parse::<i64>().ok().map(|o| i.cmp(&o)),
        Value::Bool(_) => None,
        Value::StrList(items) => {
            let min = items.iter().min()?;
            let max = items.iter().max()?;
            if min.as_str() <= operand && operand <= max.as_str() {
                Some(Ordering::Equal)
            } else if max.as_str() < operand {
                Some(Ordering::Less)
            } else {
                Some(Ordering::Greater)
            }
        }
        Value::VersionList(items) => {
            let operand = Version::parse(operand.trim()).ok()?;
            let min = items.iter().min()?;
            let max = items.iter().max()?;
            if *min <= operand && operand <= *max {
                Some(Ordering::Equal)
            } else if *max < operand {
                Some(Ordering::Less)
            } else {
                Some(Ordering::Greater)
            }
        }
    }
}

fn value_substring(value: &Value, segments: &[String]) -> bool {
    match value {
        Value::Str(s) => substring_match(segments, s),
        Value::StrList(items) => items.iter().any(|s| substring_match(segments, s)),
        _ => false,
    }
}

// Compiled wildcard patterns, cached by pattern text. Filters are parsed
// once but evaluated many times per resolve.
static SUBSTRING_CACHE: Lazy<Mutex<HashMap<String, Regex>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn substring_match(segments: &[String], candidate: &str) -> bool {
    let pattern = {
        let escaped: Vec<String> = segments.iter().map(|s| regex::escape(s)).collect();
        format!("^{}$", escaped.join(".*"))
    };
    let mut cache = SUBSTRING_CACHE.lock();
    if let Some(re) = cache.get(&pattern) {
        return re.is_match(candidate);
    }
    match Regex::new(&pattern) {
        Ok(re) => {
            let matched = re.is_match(candidate);
            cache.insert(pattern, re);
            matched
        }
        Err(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
