//! AliasSync core library.
//!
//! This crate manages entity aliases on an identity backend: the HTTP client,
//! the per-mount lock registry, duplicate detection, and the create / read /
//! update / delete reconciliation of a local alias record against the
//! backend, plus configuration and the manifest/state files used by the CLI.

pub mod config;
pub mod diag;
pub mod errors;
pub mod identity;
pub mod locks;
pub mod state;
pub mod vault;

// Re-exports for convenience.
pub use config::AppConfig;
pub use diag::{Diagnostic, Diagnostics, Severity};
pub use identity::{AliasState, EntityAliasResource};
pub use locks::MutexRegistry;
pub use vault::{LogicalClient, VaultClient};
