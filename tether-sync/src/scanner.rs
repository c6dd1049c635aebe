//! Local scanner: finds the files a sync type owns.
//!
//! A scope is a root (directory or single file) plus include/exclude globs
//! matched against root-relative paths with `/` separators. Parsing files
//! into items is the handler's job; this module only decides which files
//! take part, in a deterministic order.

use std::path::{Path, PathBuf};

use glob::Pattern;
use walkdir::WalkDir;

use tether_core::TypeConfig;

use crate::error::{io_err, SyncError};

/// Built-in scan defaults for a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeDefaults {
    /// Relative to the project root.
    pub location: &'static str,
    pub include: &'static [&'static str],
    pub exclude: &'static [&'static str],
}

/// Resolved scan scope for one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanScope {
    pub root: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl ScanScope {
    pub fn new(root: impl Into<PathBuf>, include: &[&str], exclude: &[&str]) -> Self {
        Self {
            root: root.into(),
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Merge the type defaults with any `tether.yaml` overrides.
    pub fn resolve(project: &Path, defaults: ScopeDefaults, overrides: Option<&TypeConfig>) -> Self {
        let location = overrides
            .and_then(|o| o.location.clone())
            .unwrap_or_else(|| PathBuf::from(defaults.location));
        let include = overrides
            .and_then(|o| o.include.clone())
            .unwrap_or_else(|| defaults.include.iter().map(|s| s.to_string()).collect());
        let exclude = overrides
            .and_then(|o| o.exclude.clone())
            .unwrap_or_else(|| defaults.exclude.iter().map(|s| s.to_string()).collect());
        Self {
            root: project.join(location),
            include,
            exclude,
        }
    }

    /// Whether the scope root names a single file rather than a directory.
    ///
    /// Decided by the path itself when the root does not exist yet, so
    /// down-sync knows where to write.
    pub fn is_file_root(&self) -> bool {
        if self.root.exists() {
            return self.root.is_file();
        }
        self.root.extension().is_some()
    }
}

/// Files in `scope`, sorted by path.
///
/// A missing root is an empty project, not an error.
pub fn scan_files(kind: &str, scope: &ScanScope) -> Result<Vec<PathBuf>, SyncError> {
    let include = compile(&scope.include)?;
    let exclude = compile(&scope.exclude)?;

    let meta = match std::fs::metadata(&scope.root) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("{kind}: {} does not exist; skipping", scope.root.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(io_err(&scope.root, e)),
    };

    if meta.is_file() {
        let name = scope
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if selected(&name, &include, &exclude) {
            return Ok(vec![scope.root.clone()]);
        }
        return Ok(Vec::new());
    }

    if !meta.is_dir() {
        tracing::warn!(
            "{kind}: {} is not a regular file or directory; skipping",
            scope.root.display()
        );
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&scope.root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(&scope.root).to_path_buf();
            io_err(path, std::io::Error::other(e.to_string()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = relative_slash_path(&scope.root, entry.path());
        if selected(&relative, &include, &exclude) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// `path` relative to `root`, using `/` separators on every platform.
pub fn relative_slash_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn selected(relative: &str, include: &[Pattern], exclude: &[Pattern]) -> bool {
    let included = include.iter().any(|p| p.matches(relative));
    included && !exclude.iter().any(|p| p.matches(relative))
}

fn compile(globs: &[String]) -> Result<Vec<Pattern>, SyncError> {
    globs
        .iter()
        .map(|g| {
            Pattern::new(g).map_err(|e| SyncError::Pattern {
                pattern: g.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "-- lua").unwrap();
    }

    #[test]
    fn missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        let scope = ScanScope::new(tmp.path().join("routes"), &["*.lua"], &[]);
        assert!(scan_files("endpoints", &scope).unwrap().is_empty());
    }

    #[test]
    fn include_and_exclude_are_applied_to_relative_paths() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.lua");
        touch(tmp.path(), "a.lua");
        touch(tmp.path(), "nested/c.lua");
        touch(tmp.path(), "nested/c_test.lua");
        touch(tmp.path(), "notes.txt");

        let scope = ScanScope::new(tmp.path(), &["*.lua"], &["*_test.lua"]);
        let files: Vec<String> = scan_files("endpoints", &scope)
            .unwrap()
            .iter()
            .map(|p| relative_slash_path(tmp.path(), p))
            .collect();
        assert_eq!(files, ["a.lua", "b.lua", "nested/c.lua"]);
    }

    #[test]
    fn file_root_is_scanned_alone() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "specs/resources.yaml");
        let scope = ScanScope::new(
            tmp.path().join("specs/resources.yaml"),
            &["*.yaml", "*.yml"],
            &[],
        );
        let files = scan_files("resources", &scope).unwrap();
        assert_eq!(files, vec![tmp.path().join("specs/resources.yaml")]);
        assert!(scope.is_file_root());
    }

    #[test]
    fn missing_file_root_is_still_a_file_root() {
        let tmp = TempDir::new().unwrap();
        let scope = ScanScope::new(tmp.path().join("specs/rules.yaml"), &["*.yaml"], &[]);
        assert!(scope.is_file_root());
        assert!(scan_files("accessrules", &scope).unwrap().is_empty());
    }

    #[test]
    fn resolve_prefers_overrides() {
        let defaults = ScopeDefaults {
            location: "routes",
            include: &["*.lua"],
            exclude: &[],
        };
        let overrides = TypeConfig {
            location: Some(PathBuf::from("api")),
            include: None,
            exclude: Some(vec!["*_test.lua".into()]),
        };
        let scope = ScanScope::resolve(Path::new("/p"), defaults, Some(&overrides));
        assert_eq!(scope.root, PathBuf::from("/p/api"));
        assert_eq!(scope.include, ["*.lua"]);
        assert_eq!(scope.exclude, ["*_test.lua"]);
    }

    #[cfg(unix)]
    #[test]
    fn socket_root_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("routes");
        let _listener = std::os::unix::net::UnixListener::bind(&root).unwrap();

        let scope = ScanScope::new(&root, &["*.lua"], &[]);
        assert_eq!(scan_files("endpoints", &scope).unwrap(), Vec::<PathBuf>::new());
    }

    #[test]
    fn bad_glob_is_a_pattern_error() {
        let tmp = TempDir::new().unwrap();
        let scope = ScanScope::new(tmp.path(), &["[.lua"], &[]);
        assert!(matches!(
            scan_files("endpoints", &scope).unwrap_err(),
            SyncError::Pattern { .. }
        ));
    }
}
