//! # tether-sync
//!
//! Reconciliation engine: scans local items, lists remote items, classifies
//! the differences and applies them in either direction.
//!
//! Call [`pipeline::run`] with a [`HandlerRegistry`] (usually
//! [`types::builtin_registry`]) and a [`RemoteService`] to sync a project,
//! or [`pipeline::plan`] to preview it.

pub mod apply;
pub mod cache;
pub mod compare;
pub mod diff;
pub mod error;
pub mod pattern;
pub mod pipeline;
pub mod reconcile;
pub mod remote;
pub mod scanner;
pub mod syncable;
pub mod types;
pub mod writer;

pub use apply::{apply, ActionKind, ApplyReport, ItemAction, Outcome};
pub use cache::{CacheEntry, HashCache};
pub use compare::CompareContext;
pub use diff::ItemDiff;
pub use error::{RemoteError, Side, SyncError};
pub use pattern::MatchPattern;
pub use pipeline::{plan, run, TypePlan, TypeSyncResult};
pub use reconcile::{reconcile, ReconcileOptions};
pub use remote::{MemoryRemote, RemoteService};
pub use scanner::{ScanScope, ScopeDefaults};
pub use syncable::{ApplyContext, Batch, BatchWriter, HandlerRegistry, MultiItemSource, Syncable};
