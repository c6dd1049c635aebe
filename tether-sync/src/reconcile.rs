//! Reconciler: classifies keys into add / delete / modify / unchanged.
//!
//! Both sides are keyed in source order; classification order follows the
//! source side for adds, modifies and unchanged keys and the target side for
//! deletes, so the same inputs always produce the same [`DiffResult`].

use std::collections::HashMap;

use tether_core::{DiffResult, Direction, Item, SyncKey};

use crate::compare::CompareContext;
use crate::error::{Side, SyncError};
use crate::pattern::MatchPattern;
use crate::syncable::Syncable;

/// Caller choices for one reconciliation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions<'p> {
    pub direction: Direction,
    /// Compute `todel`. Off means no deletes, ever.
    pub delete: bool,
    pub pattern: Option<&'p MatchPattern>,
}

/// Items of one side keyed by synckey, in their original order.
pub(crate) struct KeyedItems<'a> {
    order: Vec<(SyncKey, &'a Item)>,
    index: HashMap<SyncKey, usize>,
}

impl<'a> KeyedItems<'a> {
    /// Key every item that passes `pattern`. Duplicate keys are an error.
    pub(crate) fn build(
        handler: &dyn Syncable,
        items: &'a [Item],
        side: Side,
        pattern: Option<&MatchPattern>,
    ) -> Result<Self, SyncError> {
        let mut order = Vec::with_capacity(items.len());
        let mut index = HashMap::with_capacity(items.len());
        for item in items {
            if let Some(pattern) = pattern {
                let fields = handler.match_fields(item);
                if !pattern.matches(&fields, handler.match_first_ignores_case()) {
                    continue;
                }
            }
            let key = handler.synckey(item)?;
            if index.contains_key(&key) {
                return Err(SyncError::DuplicateKey {
                    kind: handler.name().to_string(),
                    key,
                    side,
                });
            }
            index.insert(key.clone(), order.len());
            order.push((key, item));
        }
        Ok(Self { order, index })
    }

    pub(crate) fn get(&self, key: &SyncKey) -> Option<&'a Item> {
        self.index.get(key).map(|&idx| self.order[idx].1)
    }

    pub(crate) fn contains(&self, key: &SyncKey) -> bool {
        self.index.contains_key(key)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&SyncKey, &'a Item)> + '_ {
        self.order.iter().map(|(key, item)| (key, *item))
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }
}

/// Classify every key of `local` ∪ `remote` that passes the match pattern.
pub fn reconcile(
    handler: &dyn Syncable,
    local: &[Item],
    remote: &[Item],
    opts: &ReconcileOptions<'_>,
    ctx: &mut CompareContext,
) -> Result<DiffResult, SyncError> {
    let local = KeyedItems::build(handler, local, Side::Local, opts.pattern)?;
    let remote = KeyedItems::build(handler, remote, Side::Remote, opts.pattern)?;
    let (source, target) = match opts.direction {
        Direction::Up => (&local, &remote),
        Direction::Down => (&remote, &local),
    };

    let mut diff = DiffResult::default();
    for (key, item) in source.iter() {
        let Some(other) = target.get(key) else {
            diff.toadd.push(key.clone());
            continue;
        };
        let (l, r) = match opts.direction {
            Direction::Up => (item, other),
            Direction::Down => (other, item),
        };
        if handler.compare(l, r, ctx)? {
            diff.tomod.push(key.clone());
        } else {
            tracing::debug!("{} {key}: unchanged", handler.name());
            diff.unchg.push(key.clone());
        }
    }

    if opts.delete {
        diff.todel = target
            .iter()
            .filter(|(key, _)| !source.contains(key))
            .map(|(key, _)| key.clone())
            .collect();
    }

    tracing::debug!(
        "{}: {} local, {} remote -> +{} ~{} -{} ={}",
        handler.name(),
        local.len(),
        remote.len(),
        diff.toadd.len(),
        diff.tomod.len(),
        diff.todel.len(),
        diff.unchg.len()
    );
    Ok(diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::fields_differ;
    use crate::remote::RemoteService;
    use crate::scanner::{ScanScope, ScopeDefaults};
    use crate::syncable::ApplyContext;
    use tether_core::Classification;

    /// Minimal handler: keyed by `name`, compared on `value`.
    struct Named;

    impl Syncable for Named {
        fn name(&self) -> &'static str {
            "named"
        }
        fn default_scope(&self) -> ScopeDefaults {
            ScopeDefaults {
                location: ".",
                include: &["*"],
                exclude: &[],
            }
        }
        fn synckey(&self, item: &Item) -> Result<SyncKey, SyncError> {
            Ok(SyncKey::from(
                crate::syncable::require_str("named", item, "name")?,
            ))
        }
        fn match_fields(&self, item: &Item) -> Vec<String> {
            vec![item.str_field("name").unwrap_or_default().to_string()]
        }
        fn list_local(&self, _scope: &ScanScope) -> Result<Vec<Item>, SyncError> {
            Ok(Vec::new())
        }
        fn list_remote(
            &self,
            _remote: &dyn RemoteService,
        ) -> Result<Vec<Item>, crate::RemoteError> {
            Ok(Vec::new())
        }
        fn compare(
            &self,
            local: &Item,
            remote: &Item,
            _ctx: &mut CompareContext,
        ) -> Result<bool, SyncError> {
            Ok(fields_differ(local, remote, &["value"]))
        }
        fn write_local(
            &self,
            _item: &Item,
            _existing: Option<&Item>,
            _ctx: &mut ApplyContext,
        ) -> Result<(), SyncError> {
            Ok(())
        }
        fn remove_local(&self, _item: &Item, _ctx: &mut ApplyContext) -> Result<(), SyncError> {
            Ok(())
        }
    }

    fn item(name: &str, value: i64) -> Item {
        Item::new().with_field("name", name).with_field("value", value)
    }

    fn keys(keys: &[SyncKey]) -> Vec<&str> {
        keys.iter().map(SyncKey::as_str).collect()
    }

    #[test]
    fn up_classifies_in_source_order() {
        let local = vec![item("c", 1), item("a", 2), item("b", 3)];
        let remote = vec![item("b", 3), item("a", 9), item("z", 0)];
        let opts = ReconcileOptions {
            direction: Direction::Up,
            delete: true,
            pattern: None,
        };
        let diff =
            reconcile(&Named, &local, &remote, &opts, &mut CompareContext::default()).unwrap();
        assert_eq!(keys(&diff.toadd), ["c"]);
        assert_eq!(keys(&diff.tomod), ["a"]);
        assert_eq!(keys(&diff.unchg), ["b"]);
        assert_eq!(keys(&diff.todel), ["z"]);
    }

    #[test]
    fn down_swaps_source_and_target() {
        let local = vec![item("a", 1), item("only_local", 1)];
        let remote = vec![item("only_remote", 1), item("a", 1)];
        let opts = ReconcileOptions {
            direction: Direction::Down,
            delete: true,
            pattern: None,
        };
        let diff =
            reconcile(&Named, &local, &remote, &opts, &mut CompareContext::default()).unwrap();
        assert_eq!(keys(&diff.toadd), ["only_remote"]);
        assert_eq!(keys(&diff.todel), ["only_local"]);
        assert_eq!(diff.classification(&"a".into()), Some(Classification::Unchanged));
    }

    #[test]
    fn no_deletes_without_flag() {
        let opts = ReconcileOptions::default();
        let diff = reconcile(
            &Named,
            &[],
            &[item("x", 1)],
            &opts,
            &mut CompareContext::default(),
        )
        .unwrap();
        assert!(diff.todel.is_empty());
        assert!(diff.is_empty());
        assert_eq!(diff.len(), 0);
    }

    #[test]
    fn duplicate_key_fails_fast() {
        let local = vec![item("a", 1), item("a", 2)];
        let err = reconcile(
            &Named,
            &local,
            &[],
            &ReconcileOptions::default(),
            &mut CompareContext::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SyncError::DuplicateKey {
                side: Side::Local,
                ..
            }
        ));
    }

    #[test]
    fn pattern_excludes_from_every_classification() {
        let pattern = MatchPattern::parse("keep*").unwrap();
        let local = vec![item("keep_a", 1), item("drop_b", 1)];
        let remote = vec![item("drop_c", 1)];
        let opts = ReconcileOptions {
            direction: Direction::Up,
            delete: true,
            pattern: Some(&pattern),
        };
        let diff =
            reconcile(&Named, &local, &remote, &opts, &mut CompareContext::default()).unwrap();
        assert_eq!(keys(&diff.toadd), ["keep_a"]);
        assert_eq!(diff.len(), 1);
    }
}
