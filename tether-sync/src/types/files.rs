//! Static files: everything under `files/`, compared by modification time.
//!
//! Remote items carry the file as base64 `content` plus a MIME type. The
//! synckey is the root-relative path with a leading `/`.

use std::path::{Component, Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use filetime::FileTime;

use tether_core::{Item, LocalRef, SyncKey};

use crate::cache::file_mtime;
use crate::compare::{timestamp_differs, CompareContext};
use crate::error::{invalid, io_err, SyncError};
use crate::remote::{denormalize, FieldRenames};
use crate::scanner::{relative_slash_path, scan_files, ScanScope, ScopeDefaults};
use crate::syncable::{require_str, ApplyContext, Syncable};
use crate::writer::{atomic_write, remove_file};

const RENAMES: FieldRenames = &[("mime_type", "mimeType")];

#[derive(Debug, Default)]
pub struct StaticFiles;

/// MIME type by extension; unknown extensions are `application/octet-stream`.
pub fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Local path for a remote `/rel/path`, refusing anything that escapes the
/// scan root.
fn local_path(scope: &ScanScope, key: &str) -> Result<PathBuf, SyncError> {
    let relative = Path::new(key.trim_start_matches('/'));
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes || relative.as_os_str().is_empty() {
        return Err(invalid(
            &scope.root,
            format!("refusing to write remote file outside the files root: {key}"),
        ));
    }
    Ok(scope.root.join(relative))
}

impl Syncable for StaticFiles {
    fn name(&self) -> &'static str {
        "files"
    }

    fn renames(&self) -> FieldRenames {
        RENAMES
    }

    fn default_scope(&self) -> ScopeDefaults {
        ScopeDefaults {
            location: "files",
            include: &["*"],
            exclude: &[],
        }
    }

    fn synckey(&self, item: &Item) -> Result<SyncKey, SyncError> {
        let path = require_str(self.name(), item, "path")?;
        if path.starts_with('/') {
            Ok(SyncKey::from(path))
        } else {
            Ok(SyncKey(format!("/{path}")))
        }
    }

    fn match_fields(&self, item: &Item) -> Vec<String> {
        vec![item.str_field("path").unwrap_or_default().to_string()]
    }

    fn list_local(&self, scope: &ScanScope) -> Result<Vec<Item>, SyncError> {
        let mut items = Vec::new();
        for path in scan_files(self.name(), scope)? {
            let mut item = Item::new()
                .with_field("path", format!("/{}", relative_slash_path(&scope.root, &path)))
                .with_field("mime_type", mime_type(&path));
            item.updated_at = Some(file_mtime(&path)?);
            items.push(item.with_local(LocalRef::file(path)));
        }
        Ok(items)
    }

    fn compare(
        &self,
        local: &Item,
        remote: &Item,
        ctx: &mut CompareContext,
    ) -> Result<bool, SyncError> {
        Ok(timestamp_differs(
            local.updated_at,
            remote.updated_at,
            ctx.direction,
        ))
    }

    fn to_remote(&self, item: &Item) -> Result<Item, SyncError> {
        let mut out = denormalize(item, RENAMES);
        if let Some(local) = item.local.as_ref() {
            let bytes = std::fs::read(&local.path).map_err(|e| io_err(&local.path, e))?;
            out.set("content", STANDARD.encode(bytes));
        }
        Ok(out)
    }

    fn write_local(
        &self,
        item: &Item,
        existing: Option<&Item>,
        ctx: &mut ApplyContext,
    ) -> Result<(), SyncError> {
        let key = self.synckey(item)?;
        let path = match existing.and_then(|e| e.local.as_ref()) {
            Some(local) => local.path.clone(),
            None => local_path(ctx.scope, key.as_str())?,
        };
        let encoded = item.str_field("content").unwrap_or_default();
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| invalid(&path, format!("remote content is not base64: {e}")))?;
        atomic_write(&path, bytes)?;

        // Match the remote timestamp so the next run sees no difference.
        if let Some(updated_at) = item.updated_at {
            let mtime = FileTime::from_unix_time(
                updated_at.timestamp(),
                updated_at.timestamp_subsec_nanos(),
            );
            filetime::set_file_mtime(&path, mtime).map_err(|e| io_err(&path, e))?;
        }
        Ok(())
    }

    fn remove_local(&self, item: &Item, ctx: &mut ApplyContext) -> Result<(), SyncError> {
        match item.local.as_ref() {
            Some(local) => remove_file(&local.path, &ctx.scope.root),
            None => Ok(()),
        }
    }

    fn display_text(&self, item: &Item) -> Result<String, SyncError> {
        let bytes = match (item.str_field("content"), item.local.as_ref()) {
            (Some(encoded), _) => STANDARD.decode(encoded).unwrap_or_default(),
            (None, Some(local)) => std::fs::read(&local.path).map_err(|e| io_err(&local.path, e))?,
            (None, None) => Vec::new(),
        };
        match String::from_utf8(bytes) {
            Ok(text) => Ok(text),
            Err(e) => Ok(format!("<binary, {} bytes>\n", e.as_bytes().len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn keys_have_leading_slash() {
        let item = Item::new().with_field("path", "img/logo.png");
        assert_eq!(StaticFiles.synckey(&item).unwrap(), SyncKey::from("/img/logo.png"));
    }

    #[test]
    fn mime_types_by_extension() {
        assert_eq!(mime_type(Path::new("index.HTML")), "text/html");
        assert_eq!(mime_type(Path::new("blob")), "application/octet-stream");
    }

    #[test]
    fn remote_paths_cannot_escape_root() {
        let scope = ScanScope::new("/p/files", &["*"], &[]);
        assert!(local_path(&scope, "/../etc/passwd").is_err());
        assert!(local_path(&scope, "/").is_err());
        assert_eq!(
            local_path(&scope, "/css/site.css").unwrap(),
            PathBuf::from("/p/files/css/site.css")
        );
    }

    #[test]
    fn local_listing_carries_mtime_and_payload_is_base64() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("hello.txt"), "hi").unwrap();
        let scope = ScanScope::new(tmp.path(), &["*"], &[]);

        let items = StaticFiles.list_local(&scope).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].str_field("path"), Some("/hello.txt"));
        assert!(items[0].updated_at.is_some());

        let payload = StaticFiles.to_remote(&items[0]).unwrap();
        assert_eq!(payload.str_field("content"), Some("aGk="));
        assert_eq!(payload.str_field("mimeType"), Some("text/plain"));
        assert!(payload.updated_at.is_none());
    }
}
