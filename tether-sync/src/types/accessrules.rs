//! Access-control rules: a YAML list in `specs/rules.yaml`.
//!
//! ```yaml
//! - role: admin
//!   resource: /api/*
//!   permission: write
//! - role: viewer
//!   resource: /api/*
//!   permission: read
//! ```
//!
//! A rule is keyed by `role:resource`; only `permission` is compared.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use tether_core::{Item, LocalRef, SyncKey};

use crate::compare::{fields_differ, CompareContext};
use crate::error::{invalid, SyncError};
use crate::remote::FieldRenames;
use crate::scanner::{scan_files, ScanScope, ScopeDefaults};
use crate::syncable::{require_str, ApplyContext, Syncable};
use crate::writer::{atomic_write, read_text};

const RENAMES: FieldRenames = &[("permission", "access")];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Rule {
    role: String,
    resource: String,
    permission: String,
}

impl Rule {
    fn key(&self) -> String {
        format!("{}:{}", self.role, self.resource)
    }

    fn from_item(kind: &str, item: &Item) -> Result<Self, SyncError> {
        Ok(Self {
            role: require_str(kind, item, "role")?.to_string(),
            resource: require_str(kind, item, "resource")?.to_string(),
            permission: require_str(kind, item, "permission")?.to_string(),
        })
    }

    fn to_item(&self) -> Item {
        Item::new()
            .with_field("role", self.role.as_str())
            .with_field("resource", self.resource.as_str())
            .with_field("permission", self.permission.as_str())
    }
}

#[derive(Debug, Default)]
pub struct AccessRules;

fn rules_file(scope: &ScanScope) -> PathBuf {
    if scope.is_file_root() {
        scope.root.clone()
    } else {
        scope.root.join("rules.yaml")
    }
}

fn read_rules(path: &Path) -> Result<Vec<Rule>, SyncError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = read_text(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml::from_str(&content).map_err(|e| invalid(path, e.to_string()))
}

fn write_rules(path: &Path, rules: &[Rule]) -> Result<(), SyncError> {
    atomic_write(path, serde_yaml::to_string(rules)?)
}

impl Syncable for AccessRules {
    fn name(&self) -> &'static str {
        "accessrules"
    }

    fn renames(&self) -> FieldRenames {
        RENAMES
    }

    fn default_scope(&self) -> ScopeDefaults {
        ScopeDefaults {
            location: "specs/rules.yaml",
            include: &["*.yaml", "*.yml"],
            exclude: &[],
        }
    }

    fn synckey(&self, item: &Item) -> Result<SyncKey, SyncError> {
        let role = require_str(self.name(), item, "role")?;
        let resource = require_str(self.name(), item, "resource")?;
        Ok(SyncKey(format!("{role}:{resource}")))
    }

    fn match_fields(&self, item: &Item) -> Vec<String> {
        ["role", "resource"]
            .iter()
            .map(|f| item.str_field(f).unwrap_or_default().to_string())
            .collect()
    }

    fn list_local(&self, scope: &ScanScope) -> Result<Vec<Item>, SyncError> {
        let mut items = Vec::new();
        for path in scan_files(self.name(), scope)? {
            for rule in read_rules(&path)? {
                items.push(rule.to_item().with_local(LocalRef::file(&path)));
            }
        }
        Ok(items)
    }

    fn compare(
        &self,
        local: &Item,
        remote: &Item,
        _ctx: &mut CompareContext,
    ) -> Result<bool, SyncError> {
        Ok(fields_differ(local, remote, &["permission"]))
    }

    fn write_local(
        &self,
        item: &Item,
        existing: Option<&Item>,
        ctx: &mut ApplyContext,
    ) -> Result<(), SyncError> {
        let rule = Rule::from_item(self.name(), item)?;
        let path = existing
            .and_then(|e| e.local.as_ref())
            .map(|l| l.path.clone())
            .unwrap_or_else(|| rules_file(ctx.scope));
        let mut rules = read_rules(&path)?;
        match rules.iter_mut().find(|r| r.key() == rule.key()) {
            Some(slot) => *slot = rule,
            None => rules.push(rule),
        }
        write_rules(&path, &rules)
    }

    fn remove_local(&self, item: &Item, _ctx: &mut ApplyContext) -> Result<(), SyncError> {
        let Some(local) = item.local.as_ref() else {
            return Ok(());
        };
        let key = self.synckey(item)?;
        let mut rules = read_rules(&local.path)?;
        let before = rules.len();
        rules.retain(|r| r.key() != key.as_str());
        if rules.len() != before {
            write_rules(&local.path, &rules)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemote, RemoteService};
    use tempfile::TempDir;

    const RULES: &str = "\
- role: admin
  resource: /api/*
  permission: write
- role: viewer
  resource: /api/*
  permission: read
";

    #[test]
    fn parses_rules_in_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rules.yaml");
        std::fs::write(&path, RULES).unwrap();
        let scope = ScanScope::new(&path, &["*.yaml"], &[]);

        let items = AccessRules.list_local(&scope).unwrap();
        let keys: Vec<_> = items
            .iter()
            .map(|i| AccessRules.synckey(i).unwrap().to_string())
            .collect();
        assert_eq!(keys, ["admin:/api/*", "viewer:/api/*"]);
    }

    #[test]
    fn missing_permission_is_a_validation_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rules.yaml");
        std::fs::write(&path, "- role: admin\n  resource: /x\n").unwrap();
        let scope = ScanScope::new(&path, &["*.yaml"], &[]);
        assert!(matches!(
            AccessRules.list_local(&scope).unwrap_err(),
            SyncError::Validation { .. }
        ));
    }

    #[test]
    fn remote_access_field_maps_to_permission() {
        let mut remote = MemoryRemote::new();
        remote.insert(
            "accessrules",
            "admin:/x",
            Item::new()
                .with_field("role", "admin")
                .with_field("resource", "/x")
                .with_field("access", "write"),
        );
        let items = AccessRules.list_remote(&remote).unwrap();
        assert_eq!(items[0].str_field("permission"), Some("write"));

        let payload = AccessRules.to_remote(&items[0]).unwrap();
        assert_eq!(payload.str_field("access"), Some("write"));
        assert_eq!(remote.list("accessrules").unwrap().len(), 1);
    }
}
