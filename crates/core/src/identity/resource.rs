//! Lifecycle operations for entity aliases.
//!
//! [`EntityAliasResource`] creates, reads, updates and deletes aliases on
//! the backend and keeps an [`AliasState`] in step with it. Every operation
//! returns [`Diagnostics`] instead of an error.
//!
//! The backend does not enforce unique `(name, mount_accessor)` pairs, so
//! create checks for existing aliases first. The check is only meaningful
//! if no other mutation on the same mount runs between the check and the
//! write. All mutating operations therefore hold a per-mount lock from the
//! shared [`MutexRegistry`]. Reads take no lock.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::alias::{created_alias_id, AliasData, AliasRequest, AliasState};
use super::entity::{
    find_aliases, join_alias_id, read_entity, FindAliasParams, ReadRetryPolicy, ROOT_ALIAS_ID_PATH,
    ROOT_ALIAS_PATH,
};
use crate::diag::{Diagnostic, Diagnostics};
use crate::errors::AliasError;
use crate::locks::{LockKey, MutexRegistry};
use crate::vault::LogicalClient;

const DUPLICATE_DETAIL: &str = "In the case where this error occurred during the creation of more than one alias, \
it may be necessary to assign a unique alias name to each of affected resources and \
then rerun the apply. After a successful apply the desired original alias names can then be \
reassigned";

/// Reconciler for entity alias records.
pub struct EntityAliasResource {
    locks: Arc<MutexRegistry>,
    read_retry: ReadRetryPolicy,
}

impl EntityAliasResource {
    pub fn new(locks: Arc<MutexRegistry>) -> Self {
        Self {
            locks,
            read_retry: ReadRetryPolicy::default(),
        }
    }

    /// Override how the read-back after create retries not-found responses.
    pub fn with_read_retry(mut self, policy: ReadRetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }

    /// The lock serializing mutations of aliases on `mount_accessor`.
    pub fn lock_key(mount_accessor: &str) -> LockKey {
        LockKey::join(ROOT_ALIAS_ID_PATH, mount_accessor)
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    /// Create the alias described by `state`, then read it back.
    ///
    /// Fails without touching `state` if an alias with the same name already
    /// exists on the mount.
    pub async fn create(&self, client: &dyn LogicalClient, state: &mut AliasState) -> Diagnostics {
        let key = Self::lock_key(&state.mount_accessor);
        let lock = self.locks.acquire(&key).await;
        let created = self.create_locked(client, state).await;
        self.locks.release(lock);

        let id = match created {
            Ok(id) => id,
            Err(diag) => return diag.into(),
        };

        state.id = id;
        state.is_new = true;
        let diags = self.read(client, state).await;
        state.is_new = false;
        diags
    }

    async fn create_locked(
        &self,
        client: &dyn LogicalClient,
        state: &AliasState,
    ) -> Result<String, Diagnostic> {
        let name = state.name.as_str();
        let mount_accessor = state.mount_accessor.as_str();
        let body = AliasRequest::from(state).to_value();

        let params = FindAliasParams {
            name: name.to_string(),
            mount_accessor: mount_accessor.to_string(),
        };
        let duplicates = find_aliases(client, &params).await.map_err(|e| {
            Diagnostic::error(format!(
                "Failed to get entity aliases by mount accessor, err={}",
                e
            ))
        })?;

        if !duplicates.is_empty() {
            let ids: Vec<&str> = duplicates.iter().map(|a| a.id.as_str()).collect();
            warn!(name, mount_accessor, ids = ?ids, "entity alias already exists");
            return Err(Diagnostic::error(format!(
                "entity alias {:?} already exists for mount accessor {:?}, ids={:?}",
                name,
                mount_accessor,
                ids.join(",")
            ))
            .with_detail(DUPLICATE_DETAIL));
        }

        let resp = client
            .write(ROOT_ALIAS_PATH, &body)
            .await
            .map_err(|e| {
                Diagnostic::error(format!("error writing entity alias to {:?}: {}", name, e))
            })?;

        let resp = match resp {
            Some(resp) if resp.data.is_some() => resp,
            _ => {
                return Err(Diagnostic::error(format!(
                    "unexpected empty response during entity alias creation name={:?}",
                    name
                )))
            }
        };

        let id = created_alias_id(&resp).map_err(|e| {
            Diagnostic::error(format!(
                "unexpected response during entity alias creation name={:?}: {}",
                name, e
            ))
        })?;

        info!(name, mount_accessor, id = %id, "wrote entity alias");
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Update
    // -----------------------------------------------------------------------

    /// Re-send all declared fields for the existing alias, then read it back.
    ///
    /// No duplicate check is made: a rename onto an existing alias name is
    /// not prevented here.
    pub async fn update(&self, client: &dyn LogicalClient, state: &mut AliasState) -> Diagnostics {
        let id = state.id.clone();
        let key = Self::lock_key(&state.mount_accessor);

        {
            let _lock = self.locks.acquire(&key).await;
            debug!(id = %id, "updating entity alias");

            let body = AliasRequest::from(&*state).to_value();
            if let Err(e) = client.write(&join_alias_id(&id), &body).await {
                return Diagnostic::error(format!("error updating entity alias {:?}: {}", id, e))
                    .into();
            }
            debug!(id = %id, "updated entity alias");
        }

        self.read(client, state).await
    }

    // -----------------------------------------------------------------------
    // Read
    // -----------------------------------------------------------------------

    /// Refresh `state` from the backend.
    ///
    /// If the alias no longer exists, `state.id` is cleared and no
    /// diagnostic is produced.
    pub async fn read(&self, client: &dyn LogicalClient, state: &mut AliasState) -> Diagnostics {
        let id = state.id.clone();
        let path = join_alias_id(&id);

        debug!(id = %id, path = %path, "reading entity alias");
        let resp = match read_entity(client, &path, state.is_new, &self.read_retry).await {
            Ok(resp) => resp,
            Err(e) if e.is_not_found() => {
                warn!(id = %id, "entity alias not found, removing from state");
                state.id.clear();
                return Diagnostics::new();
            }
            Err(e) => {
                return Diagnostic::error(format!("error reading entity alias {:?}: {}", id, e))
                    .into()
            }
        };

        match AliasData::from_secret(&resp) {
            Ok(data) => {
                data.apply_to(state);
                Diagnostics::new()
            }
            Err(AliasError::MalformedField { field, detail }) => Diagnostic::error(format!(
                "error setting state key {:?} on entity alias {:?}: err={:?}",
                field, id, detail
            ))
            .into(),
            Err(e) => {
                Diagnostic::error(format!("error reading entity alias {:?}: {}", id, e)).into()
            }
        }
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    /// Remove the alias from the backend. On success `state.id` is cleared.
    pub async fn delete(&self, client: &dyn LogicalClient, state: &mut AliasState) -> Diagnostics {
        let key = Self::lock_key(&state.mount_accessor);
        let _lock = self.locks.acquire(&key).await;

        let base_msg = format!(
            "entity alias ID {:?} on mount_accessor {:?}",
            state.id, state.mount_accessor
        );
        info!("Deleting {}", base_msg);
        if let Err(e) = client.delete(&join_alias_id(&state.id)).await {
            return Diagnostic::error(format!("failed deleting {}, err={}", base_msg, e)).into();
        }
        info!("Successfully deleted {}", base_msg);

        state.id.clear();
        Diagnostics::new()
    }

    // -----------------------------------------------------------------------
    // Import
    // -----------------------------------------------------------------------

    /// Adopt an existing alias by ID and populate a fresh state from it.
    pub async fn import(&self, client: &dyn LogicalClient, id: &str) -> (AliasState, Diagnostics) {
        let mut state = AliasState::from_id(id);
        let mut diags = self.read(client, &mut state).await;
        if !diags.has_error() && !state.exists() {
            diags.push(Diagnostic::error(format!(
                "entity alias {:?} not found, cannot import",
                id
            )));
        }
        (state, diags)
    }
}
