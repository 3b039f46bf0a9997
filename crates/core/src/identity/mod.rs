//! Identity resources managed on the backend.
//!
//! Entity aliases bind an authentication mount's name for a principal to a
//! canonical entity. Within one mount an alias name must be unique; this is
//! checked client-side under a per-mount lock before each create.

pub mod alias;
pub mod entity;
pub mod resource;

pub use alias::{AliasData, AliasRequest, AliasState};
pub use entity::{find_aliases, AliasSummary, FindAliasParams, ReadRetryPolicy};
pub use resource::EntityAliasResource;
