//! Multi-item Lua files: blocks introduced by a header comment.
//!
//! ```lua
//! --#ENDPOINT GET /api/users
//! return db.users()
//!
//! --#ENDPOINT POST /api/users application/json
//! return db.insert(request.body)
//! ```
//!
//! A block runs from its header line up to the next header (or end of file).
//! Lines before the first header belong to no item and are preserved on
//! write-back.

use std::io::ErrorKind;
use std::path::Path;

use tether_core::{Item, LineSpan, LocalRef, SyncKey};

use crate::error::{invalid, SyncError};
use crate::scanner::{scan_files, ScanScope};
use crate::syncable::{require_str, MultiItemSource};
use crate::writer::{atomic_write, read_text, remove_file};

/// Header layout for one script type.
#[derive(Debug, Clone, Copy)]
pub struct HeaderBlocks {
    pub kind: &'static str,
    /// `--#ENDPOINT`, `--#EVENT`.
    pub marker: &'static str,
    /// Header words after the marker, in order. All are required.
    pub fields: &'static [&'static str],
    /// One optional trailing header word, with its default value.
    pub optional: Option<(&'static str, &'static str)>,
    /// Upper-case the first header word (HTTP methods).
    pub upper_first: bool,
}

impl HeaderBlocks {
    /// Header words of `line` if it is a header for this type.
    fn header_words<'l>(&self, line: &'l str) -> Option<Vec<&'l str>> {
        let rest = line.trim_start().strip_prefix(self.marker)?;
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        Some(rest.split_whitespace().collect())
    }

    fn is_header(&self, line: &str) -> bool {
        self.header_words(line).is_some()
    }

    /// Synckey: required header fields joined with a single space.
    ///
    /// Header words never contain whitespace, so the join is unambiguous.
    pub fn key(&self, item: &Item) -> Result<SyncKey, SyncError> {
        let mut parts = Vec::with_capacity(self.fields.len());
        for (idx, field) in self.fields.iter().enumerate() {
            let value = require_str(self.kind, item, *field)?;
            if idx == 0 && self.upper_first {
                parts.push(value.to_ascii_uppercase());
            } else {
                parts.push(value.to_string());
            }
        }
        Ok(SyncKey(parts.join(" ")))
    }

    /// Required header fields, for `--match`.
    pub fn match_fields(&self, item: &Item) -> Vec<String> {
        self.fields
            .iter()
            .map(|f| item.str_field(f).unwrap_or_default().to_string())
            .collect()
    }

    /// Fill in the optional header field's default when absent.
    pub fn with_defaults(&self, mut item: Item) -> Item {
        if let Some((field, default)) = self.optional {
            if item.str_field(field).map_or(true, str::is_empty) {
                item.set(field, default);
            }
        }
        if self.upper_first {
            if let Some(first) = self.fields.first() {
                if let Some(value) = item.str_field(first).map(str::to_ascii_uppercase) {
                    item.set(first, value);
                }
            }
        }
        item
    }
}

impl MultiItemSource for HeaderBlocks {
    fn split(&self, path: &Path, content: &str) -> Result<Vec<Item>, SyncError> {
        let lines: Vec<&str> = content.lines().collect();
        let starts: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| self.is_header(line))
            .map(|(idx, _)| idx)
            .collect();

        let mut items = Vec::with_capacity(starts.len());
        for (pos, &start) in starts.iter().enumerate() {
            let end = starts.get(pos + 1).copied().unwrap_or(lines.len());
            let words = self.header_words(lines[start]).unwrap_or_default();
            let max = self.fields.len() + usize::from(self.optional.is_some());
            if words.len() < self.fields.len() || words.len() > max {
                return Err(invalid(
                    path,
                    format!(
                        "line {}: expected '{} {}' header",
                        start + 1,
                        self.marker,
                        self.fields.join(" ")
                    ),
                ));
            }

            let mut item = Item::new();
            for (field, word) in self.fields.iter().zip(&words) {
                item.set(field, *word);
            }
            if let (Some((field, _)), Some(word)) = (self.optional, words.get(self.fields.len())) {
                item.set(field, *word);
            }
            let body = lines[start + 1..end].join("\n");
            item.set("script", body.trim_end());
            let item = self
                .with_defaults(item)
                .with_local(LocalRef::block(path, LineSpan::new(start, end)));
            items.push(item);
        }
        Ok(items)
    }

    fn render(&self, item: &Item) -> Result<String, SyncError> {
        let mut header = vec![self.marker.to_string()];
        for field in self.fields {
            header.push(require_str(self.kind, item, *field)?.to_string());
        }
        if let Some((field, default)) = self.optional {
            if let Some(value) = item.str_field(field).filter(|v| *v != default && !v.is_empty()) {
                header.push(value.to_string());
            }
        }
        let script = item.str_field("script").unwrap_or_default().trim_end();
        if script.is_empty() {
            return Ok(format!("{}\n", header.join(" ")));
        }
        Ok(format!("{}\n{script}\n", header.join(" ")))
    }
}

/// Every block in every file of `scope`.
///
/// A file that is not UTF-8 or has a malformed header is skipped with a
/// warning; the other files still count.
pub fn list_blocks(blocks: &HeaderBlocks, scope: &ScanScope) -> Result<Vec<Item>, SyncError> {
    let mut items = Vec::new();
    for path in scan_files(blocks.kind, scope)? {
        let content = match read_text(&path) {
            Ok(content) => content,
            Err(SyncError::Io { path, source }) if source.kind() == ErrorKind::InvalidData => {
                tracing::warn!("{}: skipping {}: {source}", blocks.kind, path.display());
                continue;
            }
            Err(e) => return Err(e),
        };
        match blocks.split(&path, &content) {
            Ok(found) => items.extend(found),
            Err(SyncError::Validation { path, message }) => {
                tracing::warn!("{}: skipping {}: {message}", blocks.kind, path.display());
            }
            Err(e) => return Err(e),
        }
    }
    Ok(items)
}

// ---------------------------------------------------------------------------
// Block write-back
// ---------------------------------------------------------------------------

/// Replace the block for `key` in `path`, or append it when absent.
///
/// `span` is where the block was when scanned; it is trusted only if the
/// block there still carries `key`.
pub fn write_block(
    blocks: &HeaderBlocks,
    path: &Path,
    key: &SyncKey,
    span: Option<LineSpan>,
    item: &Item,
) -> Result<(), SyncError> {
    let content = if path.exists() {
        read_text(path)?
    } else {
        String::new()
    };
    let rendered = blocks.render(item)?;
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    match locate(blocks, path, &content, key, span)? {
        Some(found) => {
            let mut replacement: Vec<String> = rendered.lines().map(str::to_string).collect();
            // Keep the blank separator line a following block relied on.
            if found.end < lines.len() {
                replacement.push(String::new());
            }
            lines.splice(found.start..found.end, replacement);
        }
        None => {
            while lines.last().is_some_and(|l| l.trim().is_empty()) {
                lines.pop();
            }
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.extend(rendered.lines().map(str::to_string));
        }
    }

    atomic_write(path, join_lines(&lines))
}

/// Remove the block for `key` from `path`. A file left with no blocks and
/// nothing but whitespace is deleted.
pub fn remove_block(
    blocks: &HeaderBlocks,
    path: &Path,
    key: &SyncKey,
    span: Option<LineSpan>,
    stop_at: &Path,
) -> Result<(), SyncError> {
    if !path.exists() {
        return Ok(());
    }
    let content = read_text(path)?;
    let Some(found) = locate(blocks, path, &content, key, span)? else {
        tracing::debug!("{} {key}: block already gone from {}", blocks.kind, path.display());
        return Ok(());
    };

    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    lines.drain(found.start..found.end);
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }

    if lines.iter().all(|l| l.trim().is_empty()) {
        return remove_file(path, stop_at);
    }
    atomic_write(path, join_lines(&lines))
}

fn locate(
    blocks: &HeaderBlocks,
    path: &Path,
    content: &str,
    key: &SyncKey,
    span: Option<LineSpan>,
) -> Result<Option<LineSpan>, SyncError> {
    let mut by_key = None;
    for item in blocks.split(path, content)? {
        if &blocks.key(&item)? != key {
            continue;
        }
        let found = item.local.and_then(|l| l.span);
        if span.is_some() && found == span {
            return Ok(found);
        }
        if by_key.is_none() {
            by_key = found;
        }
    }
    Ok(by_key)
}

fn join_lines(lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
