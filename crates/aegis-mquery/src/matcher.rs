//! Aegis MQuery Matcher
//!
//! Evaluates compiled queries against a document. Besides pass/fail the
//! matcher reports, for every path that crossed an array, which elements
//! satisfied the query. Those element positions drive the positional `$`
//! operator of updates.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::ops;
use crate::path::{lookup, Lookup, Path};
use crate::query::{Clause, Matcher, Operator, Query};
use crate::types::Value;
use aegis_common::Result;
use indexmap::IndexMap;

// =============================================================================
// Matches
// =============================================================================

/// An array element selected by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Matched {
    pub index: usize,
    pub value: Value,
}

/// Matched array elements keyed by the path of their array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matches {
    entries: IndexMap<String, Vec<Matched>>,
}

impl Matches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elements matched under `prefix`, in match order.
    pub fn get(&self, prefix: &str) -> Option<&[Matched]> {
        self.entries.get(prefix).map(Vec::as_slice)
    }

    /// Array position of the first element matched under `prefix`.
    pub fn first_index(&self, prefix: &str) -> Option<usize> {
        self.get(prefix)?.first().map(|m| m.index)
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Matched>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a matched element; an element is kept once per position.
    pub fn record(&mut self, prefix: &str, index: usize, value: &Value) {
        let matched = self.entries.entry(prefix.to_string()).or_default();
        if !matched.iter().any(|m| m.index == index) {
            matched.push(Matched {
                index,
                value: value.clone(),
            });
        }
    }

    /// Fold another result set into this one.
    pub fn merge(&mut self, other: Matches) {
        for (prefix, matched) in other.entries {
            for m in matched {
                self.record(&prefix, m.index, &m.value);
            }
        }
    }

    /// The subset document `{prefix: [elements]}`.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(prefix, matched)| {
                    let values = matched.iter().map(|m| m.value.clone()).collect();
                    (prefix.clone(), Value::Array(values))
                })
                .collect(),
        )
    }
}

// =============================================================================
// Filter
// =============================================================================

/// Match `doc` against `query`. Returns `None` when any clause fails,
/// otherwise the matched array subsets.
pub fn filter(doc: &Value, query: &Query) -> Result<Option<Matches>> {
    let mut matches = Matches::new();
    for clause in &query.clauses {
        if !eval_clause(doc, clause, &mut matches)? {
            return Ok(None);
        }
    }
    Ok(Some(matches))
}

fn eval_clause(doc: &Value, clause: &Clause, matches: &mut Matches) -> Result<bool> {
    match clause {
        Clause::Field { path, matcher } => match_field(doc, path, matcher, matches),
        Clause::Value(matcher) => compare(matcher, Some(doc)),
        Clause::And(queries) => {
            let mut combined = Matches::new();
            for query in queries {
                match filter(doc, query)? {
                    Some(found) => combined.merge(found),
                    None => return Ok(false),
                }
            }
            matches.merge(combined);
            Ok(true)
        }
        Clause::Or(queries) => {
            let mut any = false;
            for query in queries {
                if let Some(found) = filter(doc, query)? {
                    matches.merge(found);
                    any = true;
                }
            }
            Ok(any)
        }
        Clause::Nor(queries) => {
            for query in queries {
                if filter(doc, query)?.is_some() {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

/// Resolve `path` segment by segment, branching into array elements when a
/// key segment meets an array.
fn match_field(doc: &Value, path: &Path, matcher: &Matcher, matches: &mut Matches) -> Result<bool> {
    let segments = path.segments();
    let mut current = doc;

    for (i, segment) in segments.iter().enumerate() {
        let is_last = i + 1 == segments.len();
        match lookup(current, segment) {
            Lookup::Found(child) => current = child,
            Lookup::Missing | Lookup::Scalar(_) if is_last => return compare(matcher, None),
            Lookup::Missing | Lookup::Scalar(_) => return Ok(false),
            Lookup::Array(items) => {
                let prefix = path.prefix(i);
                let suffix = Path::from_segments(segments[i..].to_vec());
                return match_elements(items, &prefix, &suffix, matcher, matches);
            }
        }
    }

    match current {
        Value::Array(items) => match_array(current, items, path, matcher, matches),
        value => compare(matcher, Some(value)),
    }
}

/// The path crossed an array: keep every sub-document whose remaining path
/// matches.
fn match_elements(
    items: &[Value],
    prefix: &Path,
    suffix: &Path,
    matcher: &Matcher,
    matches: &mut Matches,
) -> Result<bool> {
    let key = prefix.to_string();
    let mut found = false;

    for (index, element) in items.iter().enumerate() {
        if !element.is_object() {
            continue;
        }
        let mut nested = Matches::new();
        if match_field(element, suffix, matcher, &mut nested)? {
            matches.record(&key, index, element);
            found = true;
        }
    }

    Ok(found)
}

/// The path ends at an array: search its elements. Equality matchers fall
/// back to a comparison against the array itself.
fn match_array(
    array: &Value,
    items: &[Value],
    path: &Path,
    matcher: &Matcher,
    matches: &mut Matches,
) -> Result<bool> {
    if matcher.is_array_level() {
        return compare(matcher, Some(array));
    }

    let key = path.to_string();
    let mut found = false;

    for (index, element) in items.iter().enumerate() {
        if element.is_defined() && compare(matcher, Some(element))? {
            matches.record(&key, index, element);
            found = true;
        }
    }

    if found || !matcher.compares_whole_array() {
        return Ok(found);
    }
    compare(matcher, Some(array))
}

// =============================================================================
// Compare
// =============================================================================

/// Test a single value against a matcher.
pub fn compare(matcher: &Matcher, value: Option<&Value>) -> Result<bool> {
    match matcher {
        Matcher::Literal(expected) => Ok(ops::eq(expected, value)),
        Matcher::Regex(regex) => Ok(ops::regex(regex, value)),
        Matcher::Operators(operators) => {
            for op in operators {
                if !apply(op, value)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

fn apply(op: &Operator, value: Option<&Value>) -> Result<bool> {
    Ok(match op {
        Operator::Gt(operand) => ops::gt(operand, value),
        Operator::Gte(operand) => ops::gte(operand, value),
        Operator::Lt(operand) => ops::lt(operand, value),
        Operator::Lte(operand) => ops::lte(operand, value),
        Operator::Eq(operand) => ops::eq(operand, value),
        Operator::Ne(operand) => ops::ne(operand, value),
        Operator::In(operand) => ops::in_list(operand, value),
        Operator::Nin(operand) => ops::not_in_list(operand, value),
        Operator::Exists(expected) => ops::exists(&Value::Bool(*expected), value),
        Operator::Size(operand) => ops::size(operand, value),
        Operator::Regex(regex) => ops::regex(regex, value),
        Operator::Mod(operand) => ops::modulo(operand, value)?,
        Operator::All(operand) => ops::all(operand, value),
        Operator::ElemMatch(query) => match value {
            Some(value) => filter(value, query)?.is_some(),
            None => false,
        },
        Operator::And(matchers) => {
            for matcher in matchers {
                if !compare(matcher, value)? {
                    return Ok(false);
                }
            }
            true
        }
        Operator::Or(matchers) => {
            for matcher in matchers {
                if compare(matcher, value)? {
                    return Ok(true);
                }
            }
            false
        }
        Operator::Nor(matchers) => {
            for matcher in matchers {
                if compare(matcher, value)? {
                    return Ok(false);
                }
            }
            true
        }
        Operator::Invalid(_) => false,
    })
}

// =============================================================================
// Tests
// =============================================================================
