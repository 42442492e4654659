//! Aegis MQuery Engine
//!
//! Coordinates matching and transactional updates of a single document.
//! An update runs in three steps: the query selects the document (and the
//! array elements the positional `$` refers to), every modifier is
//! validated against the untouched document, and only then are the
//! resulting transactions committed.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::compiled::Filter;
use crate::matcher::{self, Matches};
use crate::modifiers::{check_growth, validate, ChangeLogEntry, Transaction, Update};
use crate::path::{self, Path, Segment};
use crate::query::Query;
use crate::types::Value;
use aegis_common::{AegisError, MQueryConfig, Result};

// =============================================================================
// MQuery Engine
// =============================================================================

/// Query and update engine over in-memory documents.
#[derive(Debug, Clone, Default)]
pub struct MQueryEngine {
    config: MQueryConfig,
}

impl MQueryEngine {
    /// Create a new engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(MQueryConfig::default())
    }

    /// Create a new engine with custom configuration.
    pub fn with_config(config: MQueryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MQueryConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Paths
    // -------------------------------------------------------------------------

    /// Read the value at a dotted path.
    pub fn get<'a>(&self, doc: &'a Value, path: &str) -> Option<&'a Value> {
        path::get(doc, &Path::parse(path))
    }

    /// Write `value` at a dotted path, creating intermediate containers.
    pub fn set(&self, doc: &mut Value, path: &str, value: Value) -> Result<()> {
        let path = Path::parse(path);
        check_growth(doc, &path, &self.config)?;
        path::set(doc, &path, value)
    }

    // -------------------------------------------------------------------------
    // Matching
    // -------------------------------------------------------------------------

    /// Compile a query document.
    pub fn compile_query(&self, query: &Value) -> Result<Query> {
        Query::parse_with(query, &self.config)
    }

    /// Match `doc` against a query document.
    pub fn filter(&self, doc: &Value, query: &Value) -> Result<Option<Matches>> {
        matcher::filter(doc, &self.compile_query(query)?)
    }

    /// Compile a reusable filter.
    pub fn create_filter(&self, query: &Value) -> Result<Filter> {
        Filter::with_config(query, &self.config)
    }

    // -------------------------------------------------------------------------
    // Updates
    // -------------------------------------------------------------------------

    /// Compile an update document.
    pub fn compile_update(&self, update: &Value) -> Result<Update> {
        Update::parse(update, &self.config)
    }

    /// Validate every modifier of `update` against `doc` without changing
    /// it. Any error rejects the whole update.
    pub fn prepare(&self, doc: &Value, matches: &Matches, update: &Update) -> Result<Vec<Transaction>> {
        let mut transactions = Vec::new();

        for operation in &update.operations {
            for (path, operand) in &operation.fields {
                let path = resolve_positional(path, matches)?;
                if let Some(tx) = validate(doc, operation.modifier, &path, operand, &self.config)? {
                    transactions.push(tx);
                } else {
                    tracing::debug!(op = %operation.modifier, key = %path, "modifier is a no-op");
                }
            }
        }

        Ok(transactions)
    }

    /// Apply a compiled update to `doc` if it matches `query`.
    ///
    /// Returns the change log; an empty log means nothing changed.
    pub fn apply(&self, doc: &mut Value, query: &Query, update: &Update) -> Result<Vec<ChangeLogEntry>> {
        let matches = if query.is_empty() {
            Matches::new()
        } else {
            match matcher::filter(doc, query)? {
                Some(matches) => matches,
                None => {
                    tracing::debug!("query did not match, document unchanged");
                    return Ok(Vec::new());
                }
            }
        };

        let transactions = self.prepare(doc, &matches, update)?;
        Ok(commit(doc, transactions))
    }

    /// Match `doc` against `query` and apply `update` transactionally.
    pub fn query(&self, doc: &mut Value, query: &Value, update: &Value) -> Result<Vec<ChangeLogEntry>> {
        let query = self.compile_query(query)?;
        let update = self.compile_update(update)?;
        self.apply(doc, &query, &update)
    }
}

/// Run validated transactions in order.
fn commit(doc: &mut Value, transactions: Vec<Transaction>) -> Vec<ChangeLogEntry> {
    transactions
        .into_iter()
        .filter_map(|tx| tx.commit(doc))
        .collect()
}

/// Replace the positional `$` segment with the first matched position of
/// the array it follows.
fn resolve_positional(path: &Path, matches: &Matches) -> Result<Path> {
    let at = match path.positional() {
        Some(at) => at,
        None => return Ok(path.clone()),
    };

    let prefix = path.prefix(at).to_string();
    let index = matches.first_index(&prefix).ok_or_else(|| {
        AegisError::InvalidPath(
            "The positional operator did not find the match needed from the query.".to_string(),
        )
    })?;

    Ok(path.with_segment(at, Segment::Index(index)))
}

// =============================================================================
// Tests
// =============================================================================
