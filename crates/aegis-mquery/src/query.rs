//! Aegis MQuery Query
//!
//! Query language for document matching. A query document such as
//! `{ "pets.age": { "$gt": 3 }, "$or": [...] }` is compiled once into a
//! tree of clauses, matchers and operators, then evaluated by the matcher.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::ops;
use crate::path::Path;
use crate::types::{Map, Value};
use aegis_common::{AegisError, MQueryConfig, Result};
use regex::Regex;

// =============================================================================
// Query
// =============================================================================

/// A compiled query expression.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub clauses: Vec<Clause>,
}

impl Query {
    pub fn new() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    /// Compile a query document with default configuration.
    pub fn parse(query: &Value) -> Result<Self> {
        Self::parse_with(query, &MQueryConfig::default())
    }

    /// Compile a query document.
    pub fn parse_with(query: &Value, config: &MQueryConfig) -> Result<Self> {
        Compiler { config }.query(query)
    }

    /// A single-term query `{path: matcher}`.
    pub fn field(path: impl Into<Path>, matcher: Matcher) -> Self {
        Self {
            clauses: vec![Clause::Field {
                path: path.into(),
                matcher,
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Add a clause.
    pub fn with_clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }
}

// =============================================================================
// Clause
// =============================================================================

/// One top-level term of a query.
#[derive(Debug, Clone)]
pub enum Clause {
    Field { path: Path, matcher: Matcher },
    And(Vec<Query>),
    Or(Vec<Query>),
    Nor(Vec<Query>),
    /// Root-level operators applied to the datum itself.
    Value(Matcher),
}

// =============================================================================
// Matcher
// =============================================================================

/// Acceptance condition for a single value.
#[derive(Debug, Clone)]
pub enum Matcher {
    Literal(Value),
    Regex(Regex),
    Operators(Vec<Operator>),
}

impl Matcher {
    /// Matchers that describe an array as a whole rather than its elements.
    pub fn is_array_level(&self) -> bool {
        match self {
            Self::Operators(ops) => ops.iter().any(|op| {
                matches!(op, Operator::Size(_) | Operator::All(_) | Operator::Exists(_))
            }),
            _ => false,
        }
    }

    /// True for equality matchers, which may also compare against a
    /// terminal array as a whole when no element matched.
    pub fn compares_whole_array(&self) -> bool {
        match self {
            Self::Literal(_) => true,
            Self::Operators(ops) => {
                !ops.is_empty()
                    && ops
                        .iter()
                        .all(|op| matches!(op, Operator::Eq(_) | Operator::In(_)))
            }
            Self::Regex(_) => false,
        }
    }
}

impl From<Value> for Matcher {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<Regex> for Matcher {
    fn from(regex: Regex) -> Self {
        Self::Regex(regex)
    }
}

impl From<Operator> for Matcher {
    fn from(op: Operator) -> Self {
        Self::Operators(vec![op])
    }
}

// =============================================================================
// Operator
// =============================================================================

/// A `$`-prefixed comparison inside an operator object.
#[derive(Debug, Clone)]
pub enum Operator {
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    Eq(Value),
    Ne(Value),
    In(Value),
    Nin(Value),
    Exists(bool),
    Size(Value),
    Regex(Regex),
    Mod(Value),
    All(Value),
    ElemMatch(Query),
    And(Vec<Matcher>),
    Or(Vec<Matcher>),
    Nor(Vec<Matcher>),
    /// Unknown or malformed operator; never matches.
    Invalid(String),
}

// =============================================================================
// Compiler
// =============================================================================

struct Compiler<'a> {
    config: &'a MQueryConfig,
}

impl Compiler<'_> {
    fn query(&self, value: &Value) -> Result<Query> {
        let map = value
            .as_object()
            .ok_or_else(|| AegisError::InvalidQuery(format!("expected object, got {}", value.type_name())))?;

        let mut clauses = Vec::new();
        let mut root_ops = Map::new();

        for (key, operand) in map {
            match key.as_str() {
                "$and" => clauses.push(Clause::And(self.subqueries(key, operand)?)),
                "$or" => clauses.push(Clause::Or(self.subqueries(key, operand)?)),
                "$nor" => clauses.push(Clause::Nor(self.subqueries(key, operand)?)),
                op if op.starts_with('$') => {
                    root_ops.insert(key.clone(), operand.clone());
                }
                _ => clauses.push(Clause::Field {
                    path: Path::parse(key),
                    matcher: self.matcher(operand),
                }),
            }
        }

        if !root_ops.is_empty() {
            clauses.push(Clause::Value(Matcher::Operators(self.operators(&root_ops))));
        }

        Ok(Query { clauses })
    }

    fn subqueries(&self, name: &str, operand: &Value) -> Result<Vec<Query>> {
        let items = operand
            .as_array()
            .ok_or_else(|| AegisError::InvalidQuery(format!("{} expects an array", name)))?;
        items.iter().map(|item| self.query(item)).collect()
    }

    fn matcher(&self, value: &Value) -> Matcher {
        match value {
            Value::Object(map) if is_operator_object(map) => Matcher::Operators(self.operators(map)),
            other => Matcher::Literal(other.clone()),
        }
    }

    fn operators(&self, map: &Map) -> Vec<Operator> {
        let options = map.get("$options").and_then(Value::as_str).unwrap_or("");

        map.iter()
            .filter(|(name, _)| name.as_str() != "$options" || !map.contains_key("$regex"))
            .map(|(name, operand)| self.operator(name, operand, options))
            .collect()
    }

    fn operator(&self, name: &str, operand: &Value, options: &str) -> Operator {
        match name {
            "$gt" => Operator::Gt(operand.clone()),
            "$gte" => Operator::Gte(operand.clone()),
            "$lt" => Operator::Lt(operand.clone()),
            "$lte" => Operator::Lte(operand.clone()),
            "$eq" => Operator::Eq(operand.clone()),
            "$ne" => Operator::Ne(operand.clone()),
            "$in" => Operator::In(operand.clone()),
            "$nin" => Operator::Nin(operand.clone()),
            "$exists" => Operator::Exists(operand.is_truthy()),
            "$size" => Operator::Size(operand.clone()),
            "$mod" => Operator::Mod(operand.clone()),
            "$all" => Operator::All(operand.clone()),
            "$regex" => match operand.as_str() {
                Some(pattern) => {
                    match ops::compile_regex(pattern, options, self.config.regex_size_limit) {
                        Ok(regex) => Operator::Regex(regex),
                        Err(e) => invalid(name, &e.to_string()),
                    }
                }
                None => invalid(name, "pattern must be a string"),
            },
            "$elemMatch" => match self.query(operand) {
                Ok(query) => Operator::ElemMatch(query),
                Err(e) => invalid(name, &e.to_string()),
            },
            "$and" | "$or" | "$nor" => match operand.as_array() {
                Some(items) => {
                    let matchers = items.iter().map(|item| self.matcher(item)).collect();
                    match name {
                        "$and" => Operator::And(matchers),
                        "$or" => Operator::Or(matchers),
                        _ => Operator::Nor(matchers),
                    }
                }
                None => invalid(name, "expects an array"),
            },
            _ => invalid(name, "unknown operator"),
        }
    }
}

fn invalid(name: &str, reason: &str) -> Operator {
    tracing::debug!(operator = name, reason, "operator will never match");
    Operator::Invalid(format!("{}: {}", name, reason))
}

/// An object is an operator object when its first key is `$`-prefixed.
fn is_operator_object(map: &Map) -> bool {
    map.keys().next().is_some_and(|key| key.starts_with('$'))
}

// =============================================================================
// Query Builder
// =============================================================================

/// Builder for constructing queries programmatically.
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self {
            query: Query::new(),
        }
    }

    fn op(mut self, field: &str, op: Operator) -> Self {
        self.query.clauses.push(Clause::Field {
            path: Path::parse(field),
            matcher: Matcher::from(op),
        });
        self
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.query.clauses.push(Clause::Field {
            path: Path::parse(field),
            matcher: Matcher::Literal(value.into()),
        });
        self
    }

    pub fn ne(self, field: &str, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Ne(value.into()))
    }

    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Gt(value.into()))
    }

    pub fn gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Gte(value.into()))
    }

    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Lt(value.into()))
    }

    pub fn lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Lte(value.into()))
    }

    pub fn in_values(self, field: &str, values: Vec<Value>) -> Self {
        self.op(field, Operator::In(Value::Array(values)))
    }

    pub fn nin_values(self, field: &str, values: Vec<Value>) -> Self {
        self.op(field, Operator::Nin(Value::Array(values)))
    }

    pub fn exists(self, field: &str, exists: bool) -> Self {
        self.op(field, Operator::Exists(exists))
    }

    pub fn size(self, field: &str, len: usize) -> Self {
        self.op(field, Operator::Size(Value::from(len)))
    }

    pub fn all(self, field: &str, values: Vec<Value>) -> Self {
        self.op(field, Operator::All(Value::Array(values)))
    }

    pub fn modulo(self, field: &str, divisor: i64, remainder: i64) -> Self {
        self.op(
            field,
            Operator::Mod(Value::Array(vec![Value::Int(divisor), Value::Int(remainder)])),
        )
    }

    /// Match a compiled regular expression, as a literal regex matcher.
    pub fn regex(mut self, field: &str, regex: Regex) -> Self {
        self.query.clauses.push(Clause::Field {
            path: Path::parse(field),
            matcher: Matcher::Regex(regex),
        });
        self
    }

    pub fn elem_match(self, field: &str, query: Query) -> Self {
        self.op(field, Operator::ElemMatch(query))
    }

    pub fn and(mut self, queries: Vec<Query>) -> Self {
        self.query.clauses.push(Clause::And(queries));
        self
    }

    pub fn or(mut self, queries: Vec<Query>) -> Self {
        self.query.clauses.push(Clause::Or(queries));
        self
    }

    pub fn nor(mut self, queries: Vec<Query>) -> Self {
        self.query.clauses.push(Clause::Nor(queries));
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
