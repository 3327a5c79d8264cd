//! LDAP-style attribute filters.
//!
//! Requirements select capabilities through a small filter language:
//! conjunction `(&(a=1)(b=2))`, disjunction `(|..)`, negation `(!..)`,
//! equality `(a=1)`, ordering `(a>=1)` / `(a<=1)`, presence `(a=*)` and
//! substring `(a=foo*bar)` comparisons. This is deliberately a subset; the
//! approximate-match operator and extensible matching rules are not part of
//! the language.
//!
//! A parsed [`Filter`] is immutable. Evaluation happens against a typed
//! attribute map (see [`crate::resource::Value`]); the structural accessors
//! ([`FilterNode::as_leaf`], [`FilterNode::children`]) exist for the query
//! planner, which inspects filters without evaluating them.

mod eval;
mod parse;

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

use crate::resource::Value;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error raised when a filter string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The input was empty or all whitespace.
    #[error("empty filter")]
    Empty,

    /// An unexpected character was found.
    #[error("unexpected character '{ch}' at position {pos}")]
    Unexpected { ch: char, pos: usize },

    /// The input ended before the filter was complete.
    #[error("unterminated filter expression")]
    Unterminated,

    /// A comparison had no attribute name before its operator.
    #[error("missing attribute name at position {pos}")]
    EmptyAttribute { pos: usize },

    /// Input remained after the closing parenthesis of the filter.
    #[error("trailing input after filter at position {pos}")]
    Trailing { pos: usize },
}

// ---------------------------------------------------------------------------
// Filter structure
// ---------------------------------------------------------------------------

/// Comparison operator of a filter leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparator {
    /// Exact, type-coerced equality.
    Equal,
    /// Greater-or-equal ordering.
    GreaterEq,
    /// Less-or-equal ordering.
    LessEq,
    /// Attribute presence (`(attr=*)`).
    Present,
    /// Wildcard match over string values. Carries the literal segments
    /// between wildcards; an empty segment at either end anchors nothing.
    Substring(Vec<String>),
}

/// A single attribute comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterLeaf {
    /// Attribute name, matched case-sensitively.
    pub attribute: String,
    /// Comparison operator.
    pub comparator: Comparator,
    /// Literal operand. Unescaped for `Equal`/`GreaterEq`/`LessEq`, `"*"`
    /// for `Present`, and the raw pattern text for `Substring`.
    pub value: String,
}

/// Boolean operator of a composite node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Not,
}

/// A node of the parsed filter tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterNode {
    /// All children must match. An empty conjunction matches everything.
    And(Vec<FilterNode>),
    /// At least one child must match. An empty disjunction matches nothing.
    Or(Vec<FilterNode>),
    /// The child must not match.
    Not(Box<FilterNode>),
    /// An attribute comparison.
    Leaf(FilterLeaf),
}

impl FilterNode {
    /// The comparison carried by this node, if it is a leaf.
    pub fn as_leaf(&self) -> Option<&FilterLeaf> {
        match self {
            FilterNode::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// The boolean operator of this node, if it is composite.
    pub fn operator(&self) -> Option<Operator> {
        match self {
            FilterNode::And(_) => Some(Operator::And),
            FilterNode::Or(_) => Some(Operator::Or),
            FilterNode::Not(_) => Some(Operator::Not),
            FilterNode::Leaf(_) => None,
        }
    }

    /// Child nodes of a composite node; empty for leaves.
    pub fn children(&self) -> &[FilterNode] {
        match self {
            FilterNode::And(kids) | FilterNode::Or(kids) => kids,
            FilterNode::Not(kid) => std::slice::from_ref(kid),
            FilterNode::Leaf(_) => &[],
        }
    }

    /// Number of comparison leaves in this subtree.
    pub fn leaf_count(&self) -> usize {
        match self {
            FilterNode::Leaf(_) => 1,
            _ => self.children().iter().map(FilterNode::leaf_count).sum(),
        }
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterNode::And(kids) => {
                write!(f, "(&")?;
                for kid in kids {
                    write!(f, "{kid}")?;
                }
                write!(f, ")")
            }
            FilterNode::Or(kids) => {
                write!(f, "(|")?;
                for kid in kids {
                    write!(f, "{kid}")?;
                }
                write!(f, ")")
            }
            FilterNode::Not(kid) => write!(f, "(!{kid})"),
            FilterNode::Leaf(leaf) => {
                let op = match leaf.comparator {
                    Comparator::Equal => "=",
                    Comparator::GreaterEq => ">=",
                    Comparator::LessEq => "<=",
                    Comparator::Present | Comparator::Substring(_) => "=",
                };
                match leaf.comparator {
                    Comparator::Present => write!(f, "({}=*)", leaf.attribute),
                    Comparator::Substring(_) => {
                        write!(f, "({}{}{})", leaf.attribute, op, leaf.value)
                    }
                    _ => write!(f, "({}{}{})", leaf.attribute, op, escape(&leaf.value)),
                }
            }
        }
    }
}

/// Escape the characters that are structural inside filter values.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '(' | ')' | '*' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// A parsed, immutable attribute filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    text: String,
    root: FilterNode,
}

impl Filter {
    /// Parse a filter expression.
    pub fn parse(text: &str) -> Result<Filter, FilterError> {
        parse::parse(text)
    }

    pub(crate) fn from_parts(text: String, root: FilterNode) -> Filter {
        Filter { text, root }
    }

    /// The original expression text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The root of the parsed tree.
    pub fn root(&self) -> &FilterNode {
        &self.root
    }

    /// Evaluate this filter against an attribute map.
    pub fn matches(&self, attrs: &IndexMap<String, Value>) -> bool {
        eval::eval(&self.root, attrs)
    }

    /// Whether the filter contains an equality comparison on `attribute`.
    ///
    /// Used for mandatory-attribute enforcement: a capability can demand
    /// that matching filters pin certain attributes with `=`.
    pub fn references_equality(&self, attribute: &str) -> bool {
        fn walk(node: &FilterNode, attribute: &str) -> bool {
            if let Some(leaf) = node.as_leaf() {
                return leaf.attribute == attribute
                    && matches!(leaf.comparator, Comparator::Equal);
            }
            node.children().iter().any(|kid| walk(kid, attribute))
        }
        walk(&self.root, attribute)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_accessors() {
        let filter = Filter::parse("(&(a=1)(!(b=2)))").unwrap();
        let root = filter.root();
        assert_eq!(root.operator(), Some(Operator::And));
        assert_eq!(root.children().len(), 2);
        assert!(root.as_leaf().is_none());

        let leaf = root.children()[0].as_leaf().unwrap();
        assert_eq!(leaf.attribute, "a");
        assert_eq!(leaf.comparator, Comparator::Equal);
        assert_eq!(leaf.value, "1");

        let not = &root.children()[1];
        assert_eq!(not.operator(), Some(Operator::Not));
        assert_eq!(not.children().len(), 1);
    }

    #[test]
    fn test_leaf_count() {
        let filter = Filter::parse("(|(a=1)(&(b=2)(c=3)))").unwrap();
        assert_eq!(filter.root().leaf_count(), 3);
    }

    #[test]
    fn test_references_equality() {
        let filter = Filter::parse("(&(pkg=core)(version>=1.0.0))").unwrap();
        assert!(filter.references_equality("pkg"));
        assert!(!filter.references_equality("version"));
        assert!(!filter.references_equality("absent"));
    }

    #[test]
    fn test_display_round_trip() {
        let text = "(&(a=1)(|(b>=2)(c=*)))";
        let filter = Filter::parse(text).unwrap();
        assert_eq!(filter.to_string(), text);
        assert_eq!(filter.root().to_string(), text);
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a(b)c*d\\e"), "a\\(b\\)c\\*d\\\\e");
    }
}
