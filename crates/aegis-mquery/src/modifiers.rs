//! Aegis MQuery Modifiers
//!
//! Update modifiers (`$set`, `$inc`, `$push`, ...) applied in two phases.
//! Validation inspects the untouched document and turns every
//! `(modifier, path, operand)` into a [`Transaction`] holding an explicit
//! [`Action`], or rejects the whole batch. Commit then runs the actions in
//! order and records one [`ChangeLogEntry`] per applied change.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::ops::{deep_equal, or_absent};
use crate::path::{
    self, assign, check_writable, resolve_parent, resolve_parent_mut, Parent, Path, Segment,
};
use crate::types::Value;
use aegis_common::{AegisError, MQueryConfig, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Modifier
// =============================================================================

/// Supported update modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    #[serde(rename = "$set")]
    Set,
    #[serde(rename = "$unset")]
    Unset,
    #[serde(rename = "$rename")]
    Rename,
    #[serde(rename = "$inc")]
    Inc,
    #[serde(rename = "$pop")]
    Pop,
    #[serde(rename = "$push")]
    Push,
    #[serde(rename = "$pushAll")]
    PushAll,
    #[serde(rename = "$pull")]
    Pull,
    #[serde(rename = "$pullAll")]
    PullAll,
    #[serde(rename = "$addToSet")]
    AddToSet,
}

impl Modifier {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "$set" => Self::Set,
            "$unset" => Self::Unset,
            "$rename" => Self::Rename,
            "$inc" => Self::Inc,
            "$pop" => Self::Pop,
            "$push" => Self::Push,
            "$pushAll" => Self::PushAll,
            "$pull" => Self::Pull,
            "$pullAll" => Self::PullAll,
            "$addToSet" => Self::AddToSet,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Set => "$set",
            Self::Unset => "$unset",
            Self::Rename => "$rename",
            Self::Inc => "$inc",
            Self::Pop => "$pop",
            Self::Push => "$push",
            Self::PushAll => "$pushAll",
            Self::Pull => "$pull",
            Self::PullAll => "$pullAll",
            Self::AddToSet => "$addToSet",
        }
    }

    /// Modifiers that may create containers along their path.
    pub fn writes_path(&self) -> bool {
        matches!(
            self,
            Self::Set | Self::Inc | Self::Push | Self::PushAll | Self::AddToSet
        )
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Update
// =============================================================================

/// One modifier with its `(path, operand)` pairs in declaration order.
#[derive(Debug, Clone)]
pub struct Operation {
    pub modifier: Modifier,
    pub fields: Vec<(Path, Value)>,
}

/// A compiled update document.
#[derive(Debug, Clone, Default)]
pub struct Update {
    pub operations: Vec<Operation>,
}

impl Update {
    /// Compile an update document such as `{ "$set": { "a.b": 1 } }`.
    pub fn parse(update: &Value, config: &MQueryConfig) -> Result<Self> {
        let map = update.as_object().ok_or_else(|| {
            AegisError::InvalidQuery(format!("update must be an object, got {}", update.type_name()))
        })?;

        let mut operations = Vec::with_capacity(map.len());
        for (name, fields) in map {
            let modifier = match Modifier::from_name(name) {
                Some(modifier) => modifier,
                None if config.strict_modifiers => {
                    return Err(AegisError::UnsupportedOperator(name.clone()));
                }
                None => {
                    tracing::debug!(modifier = %name, "skipping unknown modifier");
                    continue;
                }
            };

            let fields = fields.as_object().ok_or_else(|| {
                AegisError::InvalidQuery(format!(
                    "{} expects an object, got {}",
                    name,
                    fields.type_name()
                ))
            })?;

            operations.push(Operation {
                modifier,
                fields: fields
                    .iter()
                    .map(|(key, operand)| (Path::parse(key), operand.clone()))
                    .collect(),
            });
        }

        Ok(Self { operations })
    }

    pub fn is_empty(&self) -> bool {
        self.operations.iter().all(|op| op.fields.is_empty())
    }
}

// =============================================================================
// Action
// =============================================================================

/// A document mutation decided during validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Set { path: Path, value: Value },
    Unset { path: Path },
    Inc { path: Path, by: Value },
    Pop { path: Path, from_front: bool },
    /// Append `values`. `each` logs the pushed values as an array,
    /// `unique` skips values already present.
    Push {
        path: Path,
        values: Vec<Value>,
        each: bool,
        unique: bool,
    },
    Pull { path: Path, operands: Vec<Value> },
    /// Move a value. Without `deliver` the source is removed and the value
    /// dropped. `target` is the destination as written in the update.
    Rename {
        from: Path,
        to: Path,
        target: String,
        deliver: bool,
    },
}

impl Action {
    /// Apply the action, returning the value to log. `None` means the
    /// document no longer has the shape the action was validated against.
    fn execute(self, doc: &mut Value) -> Option<Value> {
        match self {
            Self::Set { path, value } => {
                let leaf = path.last()?;
                let parent = resolve_parent_mut(doc, &path, true)?;
                assign(parent, leaf, value.clone()).then_some(value)
            }
            Self::Unset { path } => path::remove(doc, &path),
            Self::Inc { path, by } => {
                let leaf = path.last()?;
                let parent = resolve_parent_mut(doc, &path, true)?;
                let result = match child(parent, leaf) {
                    Some(current) => add_numbers(current, &by)?,
                    None => by,
                };
                assign(parent, leaf, result.clone()).then_some(result)
            }
            Self::Pop { path, from_front } => {
                let items = path::get_mut(doc, &path)?.as_array_mut()?;
                if items.is_empty() {
                    return None;
                }
                if from_front {
                    Some(items.remove(0))
                } else {
                    items.pop()
                }
            }
            Self::Push {
                path,
                values,
                each,
                unique,
            } => {
                let leaf = path.last()?;
                let parent = resolve_parent_mut(doc, &path, true)?;
                if child(parent, leaf).is_none() && !assign(parent, leaf, Value::array()) {
                    return None;
                }
                let items = child_mut(parent, leaf)?.as_array_mut()?;

                let mut pushed = Vec::with_capacity(values.len());
                for value in values {
                    if unique && items.iter().any(|item| deep_equal(item, &value)) {
                        continue;
                    }
                    items.push(value.clone());
                    pushed.push(value);
                }

                if pushed.is_empty() {
                    None
                } else if each {
                    Some(Value::Array(pushed))
                } else {
                    pushed.into_iter().next()
                }
            }
            Self::Pull { path, operands } => {
                let items = path::get_mut(doc, &path)?.as_array_mut()?;
                let mut removed = Vec::new();
                let mut kept = Vec::with_capacity(items.len());
                for item in items.drain(..) {
                    if operands.iter().any(|operand| pull_matches(operand, &item)) {
                        removed.push(item);
                    } else {
                        kept.push(item);
                    }
                }
                *items = kept;
                (!removed.is_empty()).then_some(Value::Array(removed))
            }
            Self::Rename {
                from,
                to,
                target,
                deliver,
            } => {
                let value = path::remove(doc, &from)?;
                if deliver {
                    let delivered = to.last().is_some_and(|leaf| {
                        resolve_parent_mut(doc, &to, true)
                            .is_some_and(|parent| assign(parent, leaf, value))
                    });
                    if !delivered {
                        tracing::warn!(from = %from, to = %to, "rename target became invalid, value dropped");
                    }
                }
                Some(Value::String(target))
            }
        }
    }
}

fn child<'a>(parent: &'a Value, leaf: &Segment) -> Option<&'a Value> {
    match parent {
        Value::Object(map) => map.get(leaf.as_key().as_ref()),
        Value::Array(items) => items.get(leaf.index()?).filter(|v| v.is_defined()),
        _ => None,
    }
}

fn child_mut<'a>(parent: &'a mut Value, leaf: &Segment) -> Option<&'a mut Value> {
    match parent {
        Value::Object(map) => map.get_mut(leaf.as_key().as_ref()),
        Value::Array(items) => items.get_mut(leaf.index()?),
        _ => None,
    }
}

/// Sum of two numbers. Integer overflow falls back to floating point.
fn add_numbers(a: &Value, b: &Value) -> Option<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(
            x.checked_add(*y)
                .map(Value::Int)
                .unwrap_or(Value::Float(*x as f64 + *y as f64)),
        ),
        _ => Some(Value::Float(a.as_f64()? + b.as_f64()?)),
    }
}

/// `$pull` element test. A map operand selects map elements carrying all of
/// its key/value pairs, where a `null` value also selects elements lacking
/// the key; `{}` selects only empty maps.
fn pull_matches(operand: &Value, item: &Value) -> bool {
    match (operand, item) {
        (Value::Object(pattern), Value::Object(fields)) => {
            if pattern.is_empty() {
                fields.is_empty()
            } else {
                pattern
                    .iter()
                    .all(|(key, expected)| deep_equal(expected, or_absent(fields.get(key))))
            }
        }
        (Value::Object(_), _) => false,
        _ => deep_equal(operand, item),
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A validated change waiting to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    modifier: Modifier,
    key: String,
    action: Action,
}

impl Transaction {
    pub fn new(modifier: Modifier, key: impl Into<String>, action: Action) -> Self {
        Self {
            modifier,
            key: key.into(),
            action,
        }
    }

    pub fn modifier(&self) -> Modifier {
        self.modifier
    }

    /// Concrete path of the change (positional operators resolved).
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Apply the change. Consumes the transaction so it runs at most once.
    pub fn commit(self, doc: &mut Value) -> Option<ChangeLogEntry> {
        let Self {
            modifier,
            key,
            action,
        } = self;

        match action.execute(doc) {
            Some(value) => {
                tracing::trace!(op = %modifier, key = %key, "committed");
                Some(ChangeLogEntry {
                    op: modifier,
                    key,
                    value,
                })
            }
            None => {
                tracing::warn!(op = %modifier, key = %key, "document changed shape before commit, skipping");
                None
            }
        }
    }
}

/// A change applied to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub op: Modifier,
    pub key: String,
    pub value: Value,
}

// =============================================================================
// Validation
// =============================================================================

/// Validate one modifier against the unmodified document.
///
/// Returns `Ok(None)` when the modifier would not change anything.
pub fn validate(
    doc: &Value,
    modifier: Modifier,
    path: &Path,
    operand: &Value,
    config: &MQueryConfig,
) -> Result<Option<Transaction>> {
    if modifier.writes_path() {
        check_growth(doc, path, config)?;
    }

    let action = match modifier {
        Modifier::Set => validate_set(doc, path, operand)?,
        Modifier::Unset => validate_unset(doc, path),
        Modifier::Rename => validate_rename(doc, path, operand, config)?,
        Modifier::Inc => validate_inc(doc, path, operand)?,
        Modifier::Pop => validate_pop(doc, path, operand)?,
        Modifier::Push => validate_push(doc, path, vec![operand.clone()], false)?,
        Modifier::PushAll => {
            let values = operand.as_array().ok_or_else(array_operand_error)?;
            validate_push(doc, path, values.clone(), true)?
        }
        Modifier::AddToSet => validate_add_to_set(doc, path, operand)?,
        Modifier::Pull => validate_pull(doc, path, vec![operand.clone()])?,
        Modifier::PullAll => {
            let operands = operand.as_array().ok_or_else(array_operand_error)?;
            validate_pull(doc, path, operands.clone())?
        }
    };

    Ok(action.map(|action| Transaction::new(modifier, path.to_string(), action)))
}

/// Reject writes that would grow an array past `max_array_index`.
pub(crate) fn check_growth(doc: &Value, path: &Path, config: &MQueryConfig) -> Result<()> {
    match path::growth_index(doc, path) {
        Some(index) if index > config.max_array_index => Err(AegisError::InvalidPath(format!(
            "array index {} in {} exceeds limit {}",
            index, path, config.max_array_index
        ))),
        _ => Ok(()),
    }
}

fn array_operand_error() -> AegisError {
    AegisError::TypeMismatch("Modifier $pushAll/pullAll allowed for arrays only".to_string())
}

fn non_array_error(op: &str) -> AegisError {
    AegisError::TypeMismatch(format!("Cannot apply {} modifier to non-array", op))
}

fn validate_set(doc: &Value, path: &Path, operand: &Value) -> Result<Option<Action>> {
    let current = check_writable(doc, path, "$set")?;
    if current.is_some_and(|current| deep_equal(current, operand)) {
        return Ok(None);
    }
    Ok(Some(Action::Set {
        path: path.clone(),
        value: operand.clone(),
    }))
}

fn validate_unset(doc: &Value, path: &Path) -> Option<Action> {
    let leaf = path.last()?;
    let present = match resolve_parent(doc, path) {
        Parent::Object(map) => map.contains_key(leaf.as_key().as_ref()),
        Parent::Array(items) => leaf
            .index()
            .and_then(|index| items.get(index))
            .is_some_and(Value::is_defined),
        _ => false,
    };
    present.then(|| Action::Unset { path: path.clone() })
}

fn validate_rename(
    doc: &Value,
    from: &Path,
    operand: &Value,
    config: &MQueryConfig,
) -> Result<Option<Action>> {
    let target = operand
        .as_str()
        .ok_or_else(|| AegisError::TypeMismatch("$rename target must be a string".to_string()))?;
    let to = Path::parse(target);
    check_growth(doc, &to, config)?;

    if to == *from {
        return Err(AegisError::InvalidPath(
            "$rename source must differ from target".to_string(),
        ));
    }
    if to.is_ancestor_of(from) {
        return Err(AegisError::InvalidPath(
            "$rename target may not be a parent of source".to_string(),
        ));
    }
    if from.is_ancestor_of(&to) {
        return Err(AegisError::InvalidPath(
            "$rename source may not be a parent of target".to_string(),
        ));
    }

    let leaf = match from.last() {
        Some(leaf) => leaf,
        None => return Ok(None),
    };
    match resolve_parent(doc, from) {
        Parent::Object(map) if map.contains_key(leaf.as_key().as_ref()) => {}
        Parent::Object(_) | Parent::Missing => return Ok(None),
        _ => {
            return Err(AegisError::InvalidPath(
                "$rename source field invalid".to_string(),
            ))
        }
    }

    let deliver = check_writable(doc, &to, "$rename").is_ok();
    if !deliver {
        tracing::debug!(from = %from, to = %to, "rename target invalid, source will be dropped");
    }

    Ok(Some(Action::Rename {
        from: from.clone(),
        to,
        target: target.to_string(),
        deliver,
    }))
}

fn validate_inc(doc: &Value, path: &Path, operand: &Value) -> Result<Option<Action>> {
    if !operand.is_number() {
        return Err(AegisError::TypeMismatch(
            "Modifier $inc allowed for numbers only".to_string(),
        ));
    }
    if let Some(current) = check_writable(doc, path, "$inc")? {
        if !current.is_number() {
            return Err(AegisError::TypeMismatch(
                "Cannot apply $inc modifier to non-number".to_string(),
            ));
        }
    }
    Ok(Some(Action::Inc {
        path: path.clone(),
        by: operand.clone(),
    }))
}

/// Current array target of `$pop`/`$pull`. Missing targets and key
/// segments on array parents are silently ignored.
fn array_target<'a>(doc: &'a Value, path: &Path) -> Result<Option<&'a Value>> {
    let leaf = match path.last() {
        Some(leaf) => leaf,
        None => return Ok(None),
    };
    match resolve_parent(doc, path) {
        Parent::Object(map) => Ok(map.get(leaf.as_key().as_ref())),
        Parent::Array(items) => Ok(leaf
            .index()
            .and_then(|index| items.get(index))
            .filter(|v| v.is_defined())),
        Parent::Blocked { key, value } => Err(AegisError::TypeMismatch(format!(
            "LEFT_SUBFIELD only supports Object: {} not: {}",
            key,
            value.type_name()
        ))),
        Parent::Missing | Parent::ArrayField(_) => Ok(None),
    }
}

fn validate_pop(doc: &Value, path: &Path, operand: &Value) -> Result<Option<Action>> {
    let items = match array_target(doc, path)? {
        None => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(non_array_error("$pop")),
    };
    if items.is_empty() {
        return Ok(None);
    }
    Ok(Some(Action::Pop {
        path: path.clone(),
        from_front: operand.as_f64().is_some_and(|n| n < 0.0),
    }))
}

fn validate_push(doc: &Value, path: &Path, values: Vec<Value>, each: bool) -> Result<Option<Action>> {
    match check_writable(doc, path, "$push")? {
        Some(current) if !current.is_array() => return Err(non_array_error("$push/$pushAll")),
        _ => {}
    }
    if values.is_empty() {
        return Ok(None);
    }
    Ok(Some(Action::Push {
        path: path.clone(),
        values,
        each,
        unique: false,
    }))
}

fn validate_add_to_set(doc: &Value, path: &Path, operand: &Value) -> Result<Option<Action>> {
    let (candidates, each) = match operand.as_object().and_then(|map| map.get("$each")) {
        Some(Value::Array(values)) => (values.clone(), true),
        Some(_) => {
            return Err(AegisError::TypeMismatch(
                "Modifier $addToSet $each allowed for arrays only".to_string(),
            ))
        }
        None => (vec![operand.clone()], false),
    };

    let existing: &[Value] = match check_writable(doc, path, "$addToSet")? {
        Some(Value::Array(items)) => items.as_slice(),
        Some(_) => return Err(non_array_error("$addToSet")),
        None => &[],
    };

    let mut values: Vec<Value> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let present = existing.iter().chain(&values).any(|v| deep_equal(v, &candidate));
        if !present {
            values.push(candidate);
        }
    }

    if values.is_empty() {
        return Ok(None);
    }
    Ok(Some(Action::Push {
        path: path.clone(),
        values,
        each,
        unique: true,
    }))
}

fn validate_pull(doc: &Value, path: &Path, operands: Vec<Value>) -> Result<Option<Action>> {
    let items = match array_target(doc, path)? {
        None => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(non_array_error("$pull/$pullAll")),
    };
    let any = items
        .iter()
        .any(|item| operands.iter().any(|operand| pull_matches(operand, item)));
    if !any {
        return Ok(None);
    }
    Ok(Some(Action::Pull {
        path: path.clone(),
        operands,
    }))
}

// =============================================================================
// Tests
// =============================================================================
