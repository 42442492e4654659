//! Aegis MQuery Compiled Filters
//!
//! A query compiled once and tested against many data. Data can be tested
//! one at a time or as a set, with the set result reported as the matching
//! subset, a per-element boolean mask or the matching positions.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::matcher;
use crate::query::Query;
use crate::types::Value;
use aegis_common::{MQueryConfig, Result};
use serde::{Deserialize, Serialize};

// =============================================================================
// Test Options
// =============================================================================

/// Whether the input is a single datum or a set of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    #[default]
    Set,
    Single,
}

/// Shape of a set result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestSpec {
    #[default]
    Subset,
    Boolean,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestOptions {
    #[serde(rename = "type")]
    pub kind: TestKind,
    pub spec: TestSpec,
}

impl TestOptions {
    pub fn single() -> Self {
        Self {
            kind: TestKind::Single,
            spec: TestSpec::Boolean,
        }
    }

    pub fn set(spec: TestSpec) -> Self {
        Self {
            kind: TestKind::Set,
            spec,
        }
    }
}

/// Result of [`Filter::test`].
#[derive(Debug, Clone, PartialEq)]
pub enum TestOutput {
    Single(bool),
    Subset(Vec<Value>),
    Boolean(Vec<bool>),
    Index(Vec<usize>),
}

impl TestOutput {
    /// Render the output as a document value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Single(matched) => Value::Bool(*matched),
            Self::Subset(items) => Value::Array(items.clone()),
            Self::Boolean(mask) => Value::Array(mask.iter().copied().map(Value::Bool).collect()),
            Self::Index(positions) => {
                Value::Array(positions.iter().copied().map(Value::from).collect())
            }
        }
    }
}

// =============================================================================
// Filter
// =============================================================================

/// A reusable compiled query.
#[derive(Debug, Clone)]
pub struct Filter {
    source: Value,
    query: Query,
}

impl Filter {
    /// Compile `query` with the default configuration.
    pub fn new(query: &Value) -> Result<Self> {
        Self::with_config(query, &MQueryConfig::default())
    }

    pub fn with_config(query: &Value, config: &MQueryConfig) -> Result<Self> {
        Ok(Self {
            source: query.clone(),
            query: Query::parse_with(query, config)?,
        })
    }

    /// The query document this filter was compiled from.
    pub fn source(&self) -> &Value {
        &self.source
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Test a single datum.
    pub fn matches(&self, datum: &Value) -> Result<bool> {
        Ok(matcher::filter(datum, &self.query)?.is_some())
    }

    /// Test `data` as described by `options`. In set mode a non-array
    /// datum is tested as a one-element set.
    pub fn test(&self, data: &Value, options: TestOptions) -> Result<TestOutput> {
        if options.kind == TestKind::Single {
            return Ok(TestOutput::Single(self.matches(data)?));
        }

        let items = match data {
            Value::Array(items) => items.as_slice(),
            other => std::slice::from_ref(other),
        };

        let mut mask = Vec::with_capacity(items.len());
        for item in items {
            mask.push(self.matches(item)?);
        }

        Ok(match options.spec {
            TestSpec::Boolean => TestOutput::Boolean(mask),
            TestSpec::Index => TestOutput::Index(
                mask.iter()
                    .enumerate()
                    .filter_map(|(i, matched)| matched.then_some(i))
                    .collect(),
            ),
            TestSpec::Subset => TestOutput::Subset(
                items
                    .iter()
                    .zip(&mask)
                    .filter(|(_, matched)| **matched)
                    .map(|(item, _)| item.clone())
                    .collect(),
            ),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
