//! Aegis MQuery - Document Query and Update Engine
//!
//! MongoDB-style matching and update modifiers for schema-less documents.
//! Queries select a document and the array elements it matched; updates
//! are validated against the untouched document and applied all-or-nothing,
//! producing a change log of what was actually modified.
//!
//! Key Features:
//! - Dotted/bracket path addressing over nested maps and arrays
//! - Comparison, membership, regex and logical query operators
//! - Compiled filters for testing sets of data
//! - Transactional `$set`, `$unset`, `$inc`, `$push`, `$pull`, `$rename` and friends
//! - Positional `$` updates driven by query matches
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod types;
pub mod path;
pub mod ops;
pub mod query;
pub mod matcher;
pub mod compiled;
pub mod modifiers;
pub mod engine;

pub use types::{Map, Value};
pub use path::{Path, Segment};
pub use query::{Clause, Matcher, Operator, Query, QueryBuilder};
pub use matcher::{Matched, Matches};
pub use compiled::{Filter, TestKind, TestOptions, TestOutput, TestSpec};
pub use modifiers::{Action, ChangeLogEntry, Modifier, Transaction, Update};
pub use engine::MQueryEngine;
pub use aegis_common::{AegisError, MQueryConfig, Result};

// =============================================================================
// Convenience Functions
// =============================================================================

/// Read the value at a dotted path.
pub fn get<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path::get(doc, &Path::parse(path))
}

/// Write `value` at a dotted path, creating intermediate containers.
pub fn set(doc: &mut Value, path: &str, value: impl Into<Value>) -> Result<()> {
    MQueryEngine::new().set(doc, path, value.into())
}

/// Match `doc` against a query document. `None` means no match.
pub fn filter(doc: &Value, query: &Value) -> Result<Option<Matches>> {
    MQueryEngine::new().filter(doc, query)
}

/// Compile a query document into a reusable filter.
pub fn create_filter(query: &Value) -> Result<Filter> {
    Filter::new(query)
}

/// Apply `update` to `doc` if it matches `query`, returning the change log.
pub fn query(doc: &mut Value, query: &Value, update: &Value) -> Result<Vec<ChangeLogEntry>> {
    MQueryEngine::new().query(doc, query, update)
}
