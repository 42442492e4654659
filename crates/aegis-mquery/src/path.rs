//! Aegis MQuery Paths
//!
//! Dotted/bracket path parsing and resolution over mixed object/array
//! documents. Segments are tagged at parse time and resolved against the
//! runtime container: an index addresses an array position only when the
//! container is an array, otherwise it is the literal map key.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::types::{Map, Value};
use aegis_common::{AegisError, Result};
use std::borrow::Cow;
use std::fmt;

// =============================================================================
// Segment
// =============================================================================

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        if let Some(digits) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(index) = digits.parse() {
                    return Self::Index(index);
                }
            }
        }

        if is_canonical_index(raw) {
            if let Ok(index) = raw.parse() {
                return Self::Index(index);
            }
        }

        Self::Key(raw.to_string())
    }

    /// The segment as a map key.
    pub fn as_key(&self) -> Cow<'_, str> {
        match self {
            Self::Key(key) => Cow::Borrowed(key),
            Self::Index(index) => Cow::Owned(index.to_string()),
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Key(_) => None,
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }

    /// True for the positional `$` placeholder.
    pub fn is_positional(&self) -> bool {
        matches!(self, Self::Key(key) if key == "$")
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{}", index),
        }
    }
}

/// `"0"`, `"7"`, `"12"` but not `"01"` or `"+1"`.
fn is_canonical_index(raw: &str) -> bool {
    !raw.is_empty()
        && raw.bytes().all(|b| b.is_ascii_digit())
        && (raw == "0" || !raw.starts_with('0'))
}

// =============================================================================
// Path
// =============================================================================

/// A parsed document path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// Parse a dotted path. `a.b[2].c` and `a.b.2.c` are equivalent.
    pub fn parse(path: &str) -> Self {
        let normalized = path.replace('[', ".[");
        let segments = normalized
            .split('.')
            .filter(|part| !part.is_empty())
            .map(Segment::parse)
            .collect();
        Self { segments }
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Everything but the last segment.
    pub fn parent_segments(&self) -> &[Segment] {
        match self.segments.split_last() {
            Some((_, parents)) => parents,
            None => &[],
        }
    }

    /// The first `len` segments as a new path.
    pub fn prefix(&self, len: usize) -> Path {
        Path::from_segments(self.segments[..len.min(self.segments.len())].to_vec())
    }

    /// True if `self` is a strict prefix of `other`.
    pub fn is_ancestor_of(&self, other: &Path) -> bool {
        self.len() < other.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a.as_key() == b.as_key())
    }

    /// Position of the first positional `$` segment.
    pub fn positional(&self) -> Option<usize> {
        self.segments.iter().position(Segment::is_positional)
    }

    /// Copy of the path with segment `at` replaced.
    pub fn with_segment(&self, at: usize, segment: Segment) -> Path {
        let mut segments = self.segments.clone();
        if let Some(slot) = segments.get_mut(at) {
            *slot = segment;
        }
        Path { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

// =============================================================================
// Lookup
// =============================================================================

/// Outcome of stepping one segment into a value.
#[derive(Debug)]
pub enum Lookup<'a> {
    /// The child exists.
    Found(&'a Value),
    /// The container exists but has no such child.
    Missing,
    /// A key segment met an array.
    Array(&'a [Value]),
    /// The current value is not a container.
    Scalar(&'a Value),
}

/// Step into `current` by one segment.
pub fn lookup<'a>(current: &'a Value, segment: &Segment) -> Lookup<'a> {
    match current {
        Value::Object(map) => match map.get(segment.as_key().as_ref()) {
            Some(child) => Lookup::Found(child),
            None => Lookup::Missing,
        },
        Value::Array(items) => match segment {
            Segment::Index(index) => match items.get(*index) {
                Some(child) if child.is_defined() => Lookup::Found(child),
                _ => Lookup::Missing,
            },
            Segment::Key(_) => Lookup::Array(items),
        },
        other => Lookup::Scalar(other),
    }
}

// =============================================================================
// Parent Resolution
// =============================================================================

/// The container that holds the last segment of a path.
#[derive(Debug)]
pub enum Parent<'a> {
    Object(&'a Map),
    Array(&'a [Value]),
    /// An intermediate container does not exist yet.
    Missing,
    /// A non-container value sits where a container is needed.
    Blocked { key: String, value: &'a Value },
    /// A key segment addresses an intermediate array.
    ArrayField(String),
}

/// Read-only walk over all but the last segment of `path`.
pub fn resolve_parent<'a>(doc: &'a Value, path: &Path) -> Parent<'a> {
    let mut current = doc;
    let mut key = String::new();

    for segment in path.parent_segments() {
        match lookup(current, segment) {
            Lookup::Found(child) => {
                current = child;
                key = segment.to_string();
            }
            Lookup::Missing => return Parent::Missing,
            Lookup::Array(_) => return Parent::ArrayField(segment.to_string()),
            Lookup::Scalar(value) => return Parent::Blocked { key, value },
        }
    }

    match current {
        Value::Object(map) => Parent::Object(map),
        Value::Array(items) => Parent::Array(items),
        value => Parent::Blocked { key, value },
    }
}

/// Mutable walk to the parent of the last segment.
///
/// With `create`, missing intermediates are initialized as maps, or as arrays
/// when the following segment is an index. Arrays grow with holes.
pub fn resolve_parent_mut<'a>(doc: &'a mut Value, path: &Path, create: bool) -> Option<&'a mut Value> {
    let segments = path.segments();
    let mut current = doc;

    for (i, segment) in path.parent_segments().iter().enumerate() {
        let next_is_index = segments.get(i + 1).is_some_and(Segment::is_index);
        current = match current {
            Value::Object(map) => {
                let key = segment.as_key();
                if !map.contains_key(key.as_ref()) {
                    if !create {
                        return None;
                    }
                    map.insert(key.to_string(), empty_container(next_is_index));
                }
                map.get_mut(key.as_ref())?
            }
            Value::Array(items) => {
                let index = segment.index()?;
                let vacant = items.get(index).map_or(true, Value::is_absent);
                if vacant {
                    if !create {
                        return None;
                    }
                    grow(items, index);
                    items[index] = empty_container(next_is_index);
                }
                items.get_mut(index)?
            }
            _ => return None,
        };
    }

    Some(current)
}

fn empty_container(array: bool) -> Value {
    if array {
        Value::array()
    } else {
        Value::object()
    }
}

/// Extend `items` with holes so that `index` is addressable.
pub(crate) fn grow(items: &mut Vec<Value>, index: usize) {
    if items.len() <= index {
        items.resize(index + 1, Value::Absent);
    }
}

/// Write `value` under `segment` of a container. Returns false if the
/// container cannot hold that segment.
pub(crate) fn assign(parent: &mut Value, segment: &Segment, value: Value) -> bool {
    match parent {
        Value::Object(map) => {
            map.insert(segment.as_key().into_owned(), value);
            true
        }
        Value::Array(items) => match segment.index() {
            Some(index) => {
                grow(items, index);
                items[index] = value;
                true
            }
            None => false,
        },
        _ => false,
    }
}

/// Largest array position a write to `path` would have to create.
///
/// Index segments on existing maps are plain keys and never count; an index
/// counts when it lands past the end of an existing array or inside an
/// array the write would create.
pub fn growth_index(doc: &Value, path: &Path) -> Option<usize> {
    let mut current = Some(doc);
    let mut largest = None;

    for segment in path.segments() {
        current = match current {
            Some(Value::Object(map)) => map.get(segment.as_key().as_ref()),
            Some(Value::Array(items)) => {
                let index = match segment.index() {
                    Some(index) => index,
                    None => return largest,
                };
                if index >= items.len() {
                    largest = largest.max(Some(index));
                }
                items.get(index).filter(|v| v.is_defined())
            }
            Some(_) => return largest,
            None => {
                if let Some(index) = segment.index() {
                    largest = largest.max(Some(index));
                }
                None
            }
        };
    }

    largest
}

/// Check that `path` can be written by `op`, returning the value currently
/// stored there (if any).
pub(crate) fn check_writable<'a>(doc: &'a Value, path: &Path, op: &str) -> Result<Option<&'a Value>> {
    let leaf = path
        .last()
        .ok_or_else(|| AegisError::InvalidPath(format!("{} requires a non-empty path", op)))?;

    match resolve_parent(doc, path) {
        Parent::Object(map) => Ok(map.get(leaf.as_key().as_ref())),
        Parent::Array(items) => match leaf {
            Segment::Index(index) => Ok(items.get(*index).filter(|v| v.is_defined())),
            Segment::Key(key) => Err(array_field_error(key)),
        },
        Parent::Missing => Ok(None),
        Parent::Blocked { value, .. } => Err(AegisError::TypeMismatch(format!(
            "{} only supports object not {}",
            op,
            value.type_name()
        ))),
        Parent::ArrayField(key) => Err(array_field_error(&key)),
    }
}

pub(crate) fn array_field_error(key: &str) -> AegisError {
    AegisError::InvalidPath(format!(
        "can't append to array using string field name [{}]",
        key
    ))
}

// =============================================================================
// Get / Set / Remove
// =============================================================================

/// Value stored at `path`, if any.
pub fn get<'a>(doc: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.segments() {
        match lookup(current, segment) {
            Lookup::Found(child) => current = child,
            _ => return None,
        }
    }
    Some(current).filter(|v| v.is_defined())
}

/// Mutable value stored at `path`, if any.
pub fn get_mut<'a>(doc: &'a mut Value, path: &Path) -> Option<&'a mut Value> {
    let leaf = match path.last() {
        Some(leaf) => leaf,
        None => return Some(doc),
    };
    let parent = resolve_parent_mut(doc, path, false)?;
    let child = match parent {
        Value::Object(map) => map.get_mut(leaf.as_key().as_ref())?,
        Value::Array(items) => items.get_mut(leaf.index()?)?,
        _ => return None,
    };
    if child.is_absent() {
        None
    } else {
        Some(child)
    }
}

/// Store `value` at `path`, creating intermediate containers.
pub fn set(doc: &mut Value, path: &Path, value: Value) -> Result<()> {
    check_writable(doc, path, "set")?;
    let leaf = path
        .last()
        .ok_or_else(|| AegisError::InvalidPath("set requires a non-empty path".to_string()))?;

    let assigned = resolve_parent_mut(doc, path, true).is_some_and(|parent| assign(parent, leaf, value));
    if assigned {
        Ok(())
    } else {
        Err(AegisError::InvalidPath(format!("cannot set {}", path)))
    }
}

/// Remove the value at `path`. Array elements become holes so that the
/// positions of their siblings are preserved.
pub fn remove(doc: &mut Value, path: &Path) -> Option<Value> {
    let leaf = path.last()?;
    let parent = resolve_parent_mut(doc, path, false)?;
    match parent {
        Value::Object(map) => map.shift_remove(leaf.as_key().as_ref()),
        Value::Array(items) => {
            let slot = items.get_mut(leaf.index()?)?;
            let removed = std::mem::replace(slot, Value::Absent);
            removed.is_defined().then_some(removed)
        }
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================
