//! Comparison strategies.
//!
//! Handlers pick one (or combine several) in [`crate::Syncable::compare`]:
//!
//! - [`fields_differ`]: equality over a named field subset
//! - [`script_differs`]: content hashing, through the [`HashCache`] for
//!   items whose content lives in a local file
//! - [`timestamp_differs`]: whole-second modification times

use chrono::{DateTime, Utc};

use tether_core::{Direction, Item};

use crate::cache::{hash_content, HashCache};
use crate::error::SyncError;
use crate::writer::read_text;

/// Fields a remote service owns. Never compared.
pub const VOLATILE_FIELDS: &[&str] = &["id", "updated_at", "created_at"];

/// State the comparators share for one type.
#[derive(Debug, Default)]
pub struct CompareContext {
    pub direction: Direction,
    pub cache: HashCache,
}

impl CompareContext {
    pub fn new(direction: Direction, cache: HashCache) -> Self {
        Self { direction, cache }
    }
}

/// True when any of `fields` differs between the two items.
///
/// A field absent on both sides is equal.
pub fn fields_differ(local: &Item, remote: &Item, fields: &[&str]) -> bool {
    fields
        .iter()
        .filter(|f| !VOLATILE_FIELDS.contains(*f))
        .any(|f| local.field(f) != remote.field(f))
}

/// Line endings unified, trailing whitespace dropped.
pub fn normalize_script(content: &str) -> String {
    content.replace("\r\n", "\n").trim_end().to_string()
}

/// Hash of an item's script content.
///
/// Inline content is hashed directly. A path reference is hashed through
/// the cache, so an unchanged file is not read.
pub fn script_hash(item: &Item, field: &str, cache: &mut HashCache) -> Result<String, SyncError> {
    if let Some(content) = item.str_field(field) {
        return Ok(hash_content(&normalize_script(content)));
    }
    match (item.local.as_ref(), item.cache_key()) {
        (Some(local), Some(key)) => cache.digest(&key, &local.path, |path| {
            Ok(normalize_script(&read_text(path)?))
        }),
        _ => Ok(hash_content("")),
    }
}

/// True when the script content of the two items differs after
/// normalization.
pub fn script_differs(
    local: &Item,
    remote: &Item,
    field: &str,
    ctx: &mut CompareContext,
) -> Result<bool, SyncError> {
    let local_hash = script_hash(local, field, &mut ctx.cache)?;
    let remote_hash = script_hash(remote, field, &mut ctx.cache)?;
    Ok(local_hash != remote_hash)
}

/// True when the source side is strictly newer than the target side.
///
/// Compared at whole-second granularity. A missing remote timestamp always
/// differs; a missing local one differs only on down-sync.
pub fn timestamp_differs(
    local: Option<DateTime<Utc>>,
    remote: Option<DateTime<Utc>>,
    direction: Direction,
) -> bool {
    let Some(remote) = remote else {
        return true;
    };
    let Some(local) = local else {
        return direction == Direction::Down;
    };
    let (local, remote) = (local.timestamp(), remote.timestamp());
    match direction {
        Direction::Up => local > remote,
        Direction::Down => remote > local,
    }
}
