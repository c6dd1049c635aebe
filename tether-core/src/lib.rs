//! tether core library: canonical items, type registry, project config, errors.
//!
//! - [`types`]: synckeys, canonical items, invocation and diff records
//! - [`registry`]: [`TypeRegistry`]
//! - [`config`]: `tether.yaml` load / save
//! - [`error`]: [`ConfigError`], [`RegistryError`]

pub mod config;
pub mod error;
pub mod registry;
pub mod types;

pub use config::{ProjectConfig, RemoteConfig, TypeConfig};
pub use error::{ConfigError, RegistryError};
pub use registry::{RegistryEntry, TypeRegistry};
pub use types::{
    Classification, DiffResult, Direction, Invocation, Item, LineSpan, LocalRef, Selection,
    SyncKey,
};
