//! Shared types, error model, and configuration for AmendWatch.
//!
//! This crate is the foundation depended on by all other AmendWatch crates.
//! It provides:
//! - [`AmendWatchError`]: the unified error type
//! - Domain types ([`AmendmentRecord`], [`BillEntry`], [`Partition`], [`DigestBody`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, NotifyConfig, ReadFailurePolicy, ReconcileConfig, ResolverConfig, SourceConfig,
    StorageConfig, config_dir, config_file_path, expand_home, init_config, load_config,
    load_config_from, validate_config, with_env_overrides,
};
pub use error::{AmendWatchError, Result};
pub use types::{AmendmentRecord, BillEntry, DigestBody, Partition};
