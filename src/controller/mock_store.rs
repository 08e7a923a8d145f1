//! In-memory ResourceStore for unit testing
//!
//! Objects are kept as JSON keyed by (kind, namespace, name). Every write bumps a
//! resourceVersion counter and is recorded so tests can assert exactly how many
//! API writes a reconcile issued. Status conflicts and request failures can be
//! injected to exercise the retry paths.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kube::core::ErrorResponse;
use kube::ResourceExt;
use serde_json::Value;

use super::store::{ResourceStore, StoreObject};
use crate::error::{Error, Result};

type ObjectKey = (String, Option<String>, String);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOp {
    Create,
    Replace,
    ReplaceStatus,
    Delete,
}

/// One recorded write against the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Write {
    pub op: WriteOp,
    pub kind: String,
    pub name: String,
}

#[derive(Clone, Default)]
pub struct MockStore {
    objects: Arc<Mutex<HashMap<ObjectKey, Value>>>,
    writes: Arc<Mutex<Vec<Write>>>,
    pending_status_conflicts: Arc<Mutex<u32>>,
    failing_kinds: Arc<Mutex<HashSet<String>>>,
    next_version: Arc<Mutex<u64>>,
}

fn key<K: StoreObject>(namespace: Option<&str>, name: &str) -> ObjectKey {
    (
        K::kind(&()).to_string(),
        namespace.map(str::to_string),
        name.to_string(),
    )
}

fn server_error(kind: &str) -> Error {
    Error::KubeError(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("injected failure for {kind}"),
        reason: "InternalError".to_string(),
        code: 500,
    }))
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump_version(&self) -> String {
        let mut version = self.next_version.lock().unwrap();
        *version += 1;
        version.to_string()
    }

    fn record(&self, op: WriteOp, kind: &str, name: &str) {
        self.writes.lock().unwrap().push(Write {
            op,
            kind: kind.to_string(),
            name: name.to_string(),
        });
    }

    fn check_failure<K: StoreObject>(&self) -> Result<()> {
        let kind = K::kind(&()).to_string();
        if self.failing_kinds.lock().unwrap().contains(&kind) {
            return Err(server_error(&kind));
        }
        Ok(())
    }

    fn stamp(&self, value: &mut Value) -> String {
        let version = self.bump_version();
        value["metadata"]["resourceVersion"] = Value::String(version.clone());
        version
    }

    /// Seed an object without recording a write
    pub fn insert<K: StoreObject>(&self, obj: K) -> K {
        let mut value = serde_json::to_value(&obj).unwrap();
        if value["metadata"]["uid"].is_null() {
            value["metadata"]["uid"] = Value::String(format!("uid-{}", obj.name_any()));
        }
        self.stamp(&mut value);
        let stored: K = serde_json::from_value(value.clone()).unwrap();
        self.objects.lock().unwrap().insert(
            key::<K>(obj.namespace().as_deref(), &obj.name_any()),
            value,
        );
        stored
    }

    /// Current stored copy of an object
    pub fn stored<K: StoreObject>(&self, namespace: Option<&str>, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&key::<K>(namespace, name))
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn writes_of(&self, op: WriteOp) -> Vec<Write> {
        self.writes()
            .into_iter()
            .filter(|w| w.op == op)
            .collect()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }

    /// Make the next `n` status writes fail with a version conflict
    pub fn inject_status_conflicts(&self, n: u32) {
        *self.pending_status_conflicts.lock().unwrap() = n;
    }

    /// Make every request for kind `K` fail with a server error
    pub fn fail_requests_for<K: StoreObject>(&self) {
        self.failing_kinds
            .lock()
            .unwrap()
            .insert(K::kind(&()).to_string());
    }

    fn check_version<K: StoreObject>(&self, stored: &Value, obj: &K) -> Result<()> {
        let expected = obj.resource_version();
        let current = stored["metadata"]["resourceVersion"].as_str().map(str::to_string);
        match expected {
            Some(v) if Some(&v) != current.as_ref() => Err(Error::Conflict {
                kind: K::kind(&()).to_string(),
                name: obj.name_any(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ResourceStore for MockStore {
    async fn get<K: StoreObject>(&self, namespace: Option<&str>, name: &str) -> Result<K> {
        self.check_failure::<K>()?;
        self.stored::<K>(namespace, name).ok_or_else(|| Error::NotFound {
            kind: K::kind(&()).to_string(),
            name: name.to_string(),
        })
    }

    async fn list<K: StoreObject>(&self, namespace: Option<&str>) -> Result<Vec<K>> {
        self.check_failure::<K>()?;
        let kind = K::kind(&()).to_string();
        let objects = self.objects.lock().unwrap();
        let mut items: Vec<(&ObjectKey, &Value)> = objects
            .iter()
            .filter(|((k, ns, _), _)| {
                *k == kind && (namespace.is_none() || ns.as_deref() == namespace)
            })
            .collect();
        items.sort_by(|a, b| a.0.cmp(b.0));
        Ok(items
            .into_iter()
            .map(|(_, v)| serde_json::from_value(v.clone()).unwrap())
            .collect())
    }

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K> {
        self.check_failure::<K>()?;
        let name = obj.name_any();
        let object_key = key::<K>(obj.namespace().as_deref(), &name);
        if self.objects.lock().unwrap().contains_key(&object_key) {
            return Err(Error::Conflict {
                kind: K::kind(&()).to_string(),
                name,
            });
        }

        let mut value = serde_json::to_value(obj)?;
        value["metadata"]["uid"] = Value::String(format!("uid-{name}"));
        self.stamp(&mut value);
        let created: K = serde_json::from_value(value.clone())?;
        self.objects.lock().unwrap().insert(object_key, value);
        self.record(WriteOp::Create, K::kind(&()).as_ref(), &name);
        Ok(created)
    }

    async fn replace<K: StoreObject>(&self, obj: &K) -> Result<K> {
        self.check_failure::<K>()?;
        let name = obj.name_any();
        let object_key = key::<K>(obj.namespace().as_deref(), &name);
        let stored = self
            .objects
            .lock()
            .unwrap()
            .get(&object_key)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: K::kind(&()).to_string(),
                name: name.clone(),
            })?;
        self.check_version(&stored, obj)?;

        let mut value = serde_json::to_value(obj)?;
        if let Some(status) = stored.get("status") {
            value["status"] = status.clone();
        }
        self.stamp(&mut value);
        let updated: K = serde_json::from_value(value.clone())?;
        self.objects.lock().unwrap().insert(object_key, value);
        self.record(WriteOp::Replace, K::kind(&()).as_ref(), &name);
        Ok(updated)
    }

    async fn replace_status<K: StoreObject>(&self, obj: &K) -> Result<K> {
        self.check_failure::<K>()?;
        let name = obj.name_any();
        {
            let mut pending = self.pending_status_conflicts.lock().unwrap();
            if *pending > 0 {
                *pending -= 1;
                // Another writer got there first
                let object_key = key::<K>(obj.namespace().as_deref(), &name);
                if let Some(stored) = self.objects.lock().unwrap().get_mut(&object_key) {
                    self.stamp(stored);
                }
                return Err(Error::Conflict {
                    kind: K::kind(&()).to_string(),
                    name,
                });
            }
        }

        let object_key = key::<K>(obj.namespace().as_deref(), &name);
        let mut stored = self
            .objects
            .lock()
            .unwrap()
            .get(&object_key)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: K::kind(&()).to_string(),
                name: name.clone(),
            })?;
        self.check_version(&stored, obj)?;

        let value = serde_json::to_value(obj)?;
        stored["status"] = value.get("status").cloned().unwrap_or(Value::Null);
        self.stamp(&mut stored);
        let updated: K = serde_json::from_value(stored.clone())?;
        self.objects.lock().unwrap().insert(object_key, stored);
        self.record(WriteOp::ReplaceStatus, K::kind(&()).as_ref(), &name);
        Ok(updated)
    }

    async fn delete<K: StoreObject>(&self, namespace: Option<&str>, name: &str) -> Result<()> {
        self.check_failure::<K>()?;
        let removed = self
            .objects
            .lock()
            .unwrap()
            .remove(&key::<K>(namespace, name));
        match removed {
            Some(_) => {
                self.record(WriteOp::Delete, K::kind(&()).as_ref(), name);
                Ok(())
            }
            None => Err(Error::NotFound {
                kind: K::kind(&()).to_string(),
                name: name.to_string(),
            }),
        }
    }
}
