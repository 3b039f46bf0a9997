//! In-memory identity backend shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use aliassync_core::errors::ApiError;
use aliassync_core::identity::entity::{ROOT_ALIAS_ID_PATH, ROOT_ALIAS_PATH};
use aliassync_core::vault::{LogicalClient, Secret};

/// Failure switches. Each stays on until cleared.
#[derive(Debug, Default, Clone)]
pub struct Failures {
    pub list: bool,
    pub write: bool,
    pub empty_write: bool,
    pub read: bool,
    pub malformed_read: bool,
    pub delete: bool,
    /// Answer this many reads with "not found" before serving the record.
    pub hidden_reads: u32,
}

#[derive(Default)]
struct Store {
    aliases: BTreeMap<String, Map<String, Value>>,
    next_id: u64,
    failures: Failures,
    write_calls: usize,
    read_calls: usize,
}

#[derive(Default)]
struct WriteTracker {
    in_flight: HashMap<String, usize>,
    max_in_flight: HashMap<String, usize>,
    total_in_flight: usize,
    max_total_in_flight: usize,
}

pub struct FakeBackend {
    store: Mutex<Store>,
    writes: Mutex<WriteTracker>,
    write_delay: Duration,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store {
                next_id: 1,
                ..Default::default()
            }),
            writes: Mutex::new(WriteTracker::default()),
            write_delay: Duration::ZERO,
        }
    }

    /// IDs are handed out as `alias-<n>` starting from `next_id`.
    pub fn with_next_id(self, next_id: u64) -> Self {
        self.store.lock().unwrap().next_id = next_id;
        self
    }

    /// Keep every write "in flight" for `delay`.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub fn set_failures(&self, failures: Failures) {
        self.store.lock().unwrap().failures = failures;
    }

    /// Insert an alias directly, bypassing the client API.
    pub fn seed(&self, name: &str, mount_accessor: &str, canonical_id: &str) -> String {
        let mut store = self.store.lock().unwrap();
        let id = format!("alias-{}", store.next_id);
        store.next_id += 1;
        store.aliases.insert(
            id.clone(),
            record(&id, name, mount_accessor, canonical_id, Value::Null),
        );
        id
    }

    /// Delete an alias behind the client's back.
    pub fn remove(&self, id: &str) {
        self.store.lock().unwrap().aliases.remove(id);
    }

    pub fn get(&self, id: &str) -> Option<Map<String, Value>> {
        self.store.lock().unwrap().aliases.get(id).cloned()
    }

    pub fn count(&self, name: &str, mount_accessor: &str) -> usize {
        self.store
            .lock()
            .unwrap()
            .aliases
            .values()
            .filter(|a| a["name"] == name && a["mount_accessor"] == mount_accessor)
            .count()
    }

    pub fn len(&self) -> usize {
        self.store.lock().unwrap().aliases.len()
    }

    pub fn write_calls(&self) -> usize {
        self.store.lock().unwrap().write_calls
    }

    pub fn read_calls(&self) -> usize {
        self.store.lock().unwrap().read_calls
    }

    /// Highest number of simultaneous writes seen for one mount.
    pub fn max_concurrent_writes(&self, mount_accessor: &str) -> usize {
        self.writes
            .lock()
            .unwrap()
            .max_in_flight
            .get(mount_accessor)
            .copied()
            .unwrap_or(0)
    }

    /// Highest number of simultaneous writes seen across all mounts.
    pub fn max_concurrent_writes_total(&self) -> usize {
        self.writes.lock().unwrap().max_total_in_flight
    }

    fn mount_for_write(&self, path: &str, data: &Value) -> String {
        if let Some(m) = data.get("mount_accessor").and_then(Value::as_str) {
            return m.to_string();
        }
        let id = path.rsplit('/').next().unwrap_or_default();
        self.get(id)
            .and_then(|a| a.get("mount_accessor").and_then(Value::as_str).map(String::from))
            .unwrap_or_default()
    }

    fn begin_write(&self, mount: &str) {
        let mut w = self.writes.lock().unwrap();
        let n = {
            let n = w.in_flight.entry(mount.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        let max = w.max_in_flight.entry(mount.to_string()).or_insert(0);
        *max = (*max).max(n);
        w.total_in_flight += 1;
        w.max_total_in_flight = w.max_total_in_flight.max(w.total_in_flight);
    }

    fn end_write(&self, mount: &str) {
        let mut w = self.writes.lock().unwrap();
        if let Some(n) = w.in_flight.get_mut(mount) {
            *n -= 1;
        }
        w.total_in_flight -= 1;
    }

    fn apply_write(&self, path: &str, data: &Value) -> Result<Option<Secret>, ApiError> {
        let mut store = self.store.lock().unwrap();
        store.write_calls += 1;
        if store.failures.write {
            return Err(api_error(500, path, "internal error"));
        }
        let body = data.as_object().cloned().unwrap_or_default();

        if path == ROOT_ALIAS_PATH {
            let id = format!("alias-{}", store.next_id);
            store.next_id += 1;
            let metadata = body.get("custom_metadata").cloned().unwrap_or(Value::Null);
            let rec = record(
                &id,
                body.get("name").and_then(Value::as_str).unwrap_or_default(),
                body.get("mount_accessor").and_then(Value::as_str).unwrap_or_default(),
                body.get("canonical_id").and_then(Value::as_str).unwrap_or_default(),
                metadata,
            );
            let canonical_id = rec["canonical_id"].clone();
            store.aliases.insert(id.clone(), rec);
            if store.failures.empty_write {
                return Ok(None);
            }
            return Ok(Some(secret(json!({"id": id, "canonical_id": canonical_id}))));
        }

        let id = alias_id(path)?;
        let existing = store
            .aliases
            .get_mut(&id)
            .ok_or_else(|| api_error(400, path, "invalid alias ID"))?;
        for (k, v) in body {
            existing.insert(k, v);
        }
        Ok(None)
    }
}

#[async_trait]
impl LogicalClient for FakeBackend {
    async fn read(&self, path: &str) -> Result<Option<Secret>, ApiError> {
        let mut store = self.store.lock().unwrap();
        store.read_calls += 1;
        if store.failures.read {
            return Err(api_error(503, path, "backend sealed"));
        }
        if store.failures.hidden_reads > 0 {
            store.failures.hidden_reads -= 1;
            return Err(ApiError::NotFound {
                path: path.to_string(),
            });
        }

        let id = alias_id(path)?;
        let mut data = store
            .aliases
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound {
                path: path.to_string(),
            })?;
        if store.failures.malformed_read {
            data.insert("mount_accessor".into(), json!(42));
        }
        Ok(Some(Secret::with_data(data)))
    }

    async fn list(&self, path: &str) -> Result<Option<Secret>, ApiError> {
        let store = self.store.lock().unwrap();
        if store.failures.list {
            return Err(api_error(500, path, "list failed"));
        }
        if path != ROOT_ALIAS_ID_PATH || store.aliases.is_empty() {
            return Ok(None);
        }

        let keys: Vec<Value> = store.aliases.keys().map(|k| json!(k)).collect();
        let key_info: Map<String, Value> = store
            .aliases
            .iter()
            .map(|(id, a)| {
                let mut info = a.clone();
                info.remove("id");
                (id.clone(), Value::Object(info))
            })
            .collect();
        Ok(Some(secret(json!({"keys": keys, "key_info": key_info}))))
    }

    async fn write(&self, path: &str, data: &Value) -> Result<Option<Secret>, ApiError> {
        let mount = self.mount_for_write(path, data);
        self.begin_write(&mount);
        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }
        let result = self.apply_write(path, data);
        self.end_write(&mount);
        result
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let mut store = self.store.lock().unwrap();
        if store.failures.delete {
            return Err(api_error(500, path, "delete failed"));
        }
        let id = alias_id(path)?;
        store.aliases.remove(&id);
        Ok(())
    }
}

fn record(
    id: &str,
    name: &str,
    mount_accessor: &str,
    canonical_id: &str,
    custom_metadata: Value,
) -> Map<String, Value> {
    match json!({
        "id": id,
        "name": name,
        "mount_accessor": mount_accessor,
        "mount_type": "ldap",
        "mount_path": "auth/ldap/",
        "canonical_id": canonical_id,
        "custom_metadata": custom_metadata,
        "local": false,
    }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn secret(data: Value) -> Secret {
    match data {
        Value::Object(map) => Secret::with_data(map),
        _ => unreachable!(),
    }
}

fn alias_id(path: &str) -> Result<String, ApiError> {
    path.strip_prefix(ROOT_ALIAS_ID_PATH)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|id| !id.is_empty())
        .map(String::from)
        .ok_or_else(|| api_error(405, path, "unsupported path"))
}

fn api_error(status: u16, path: &str, message: &str) -> ApiError {
    ApiError::Api {
        status,
        path: path.to_string(),
        errors: vec![message.to_string()],
    }
}
