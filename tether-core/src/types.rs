//! Domain types shared by the scanner, reconciler, and applier.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Type-specific identifier correlating a local item with its remote counterpart.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SyncKey(pub String);

impl SyncKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SyncKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SyncKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SyncKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Local provenance
// ---------------------------------------------------------------------------

/// Half-open `[start, end)` range of 0-based line numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

impl LineSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where a scanned item came from. Only the local scanner sets this.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalRef {
    pub path: PathBuf,
    /// Present when the file holds more than one item.
    pub span: Option<LineSpan>,
}

impl LocalRef {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            span: None,
        }
    }

    pub fn block(path: impl Into<PathBuf>, span: LineSpan) -> Self {
        Self {
            path: path.into(),
            span: Some(span),
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical item
// ---------------------------------------------------------------------------

/// Field names holding inline content. An item with a [`LocalRef`] and none
/// of these is a path reference whose content lives on disk.
pub const CONTENT_FIELDS: &[&str] = &["script", "content"];

/// Normalized field-map representation of one configuration object,
/// independent of whether it was scanned locally or listed remotely.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(skip)]
    pub local: Option<LocalRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Item {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn with_local(mut self, local: LocalRef) -> Self {
        self.local = Some(local);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_owned(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Key under which the content-hash cache tracks this item.
    ///
    /// `path` for whole-file items, `path#L<start>-<end>` for blocks.
    pub fn cache_key(&self) -> Option<String> {
        let local = self.local.as_ref()?;
        let path = local.path.to_string_lossy();
        Some(match local.span {
            Some(span) => format!("{path}#L{}-{}", span.start, span.end),
            None => path.into_owned(),
        })
    }

    /// True when the item points at a local file instead of carrying content.
    pub fn is_path_ref(&self) -> bool {
        self.local.is_some() && !CONTENT_FIELDS.iter().any(|f| self.fields.contains_key(*f))
    }
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// Which side is the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Local files are pushed to the remote service.
    #[default]
    Up,
    /// Remote items are written to local files.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(format!("unknown direction '{other}'; expected: up, down")),
        }
    }
}

/// Per-type selection flags plus the `all` override.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub flags: BTreeMap<String, bool>,
    pub all: bool,
}

impl Selection {
    /// Select every registered type.
    pub fn all_types() -> Self {
        Self {
            flags: BTreeMap::new(),
            all: true,
        }
    }

    /// Select exactly the named types.
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            flags: names.into_iter().map(|n| (n.into(), true)).collect(),
            all: false,
        }
    }

    pub fn with(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.flags.insert(name.into(), enabled);
        self
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flags.get(name).copied()
    }
}

/// Everything the caller decides about one engine run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub selection: Selection,
    pub direction: Direction,
    pub delete: bool,
    pub dry_run: bool,
    pub match_pattern: Option<String>,
}

// ---------------------------------------------------------------------------
// Diff result
// ---------------------------------------------------------------------------

/// Classification of a key by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Add,
    Delete,
    Modify,
    Unchanged,
}

/// Four disjoint, ordered key sequences produced by reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub toadd: Vec<SyncKey>,
    pub todel: Vec<SyncKey>,
    pub tomod: Vec<SyncKey>,
    pub unchg: Vec<SyncKey>,
}

impl DiffResult {
    /// True when nothing needs to be added, deleted, or modified.
    pub fn is_empty(&self) -> bool {
        self.changes() == 0
    }

    /// Number of keys that require an action.
    pub fn changes(&self) -> usize {
        self.toadd.len() + self.todel.len() + self.tomod.len()
    }

    /// Number of keys across all four classifications.
    pub fn len(&self) -> usize {
        self.changes() + self.unchg.len()
    }

    pub fn classification(&self, key: &SyncKey) -> Option<Classification> {
        if self.toadd.contains(key) {
            Some(Classification::Add)
        } else if self.todel.contains(key) {
            Some(Classification::Delete)
        } else if self.tomod.contains(key) {
            Some(Classification::Modify)
        } else if self.unchg.contains(key) {
            Some(Classification::Unchanged)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
