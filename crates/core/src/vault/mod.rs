//! Identity backend access: the path-addressed client trait and its HTTP
//! implementation.

pub mod client;
pub mod logical;

pub use client::VaultClient;
pub use logical::{LogicalClient, Secret};
