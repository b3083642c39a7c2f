//! In-memory object store for unit tests. Enforces resourceVersion checks
//! the way the API server does and records every read and write.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use kube::api::DynamicObject;
use serde_json::json;

use super::{ObjectStore, StoreError};
use crate::resources::{Kind, ObjectKey};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Create,
    Update,
    UpdateStatus,
    Delete,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<ObjectKey, DynamicObject>,
    version: u64,
    reads: usize,
    writes: Vec<(Op, ObjectKey)>,
}

impl Inner {
    fn bump(&mut self, obj: &mut DynamicObject) {
        self.version += 1;
        obj.metadata.resource_version = Some(self.version.to_string());
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

fn matches_selector(obj: &DynamicObject, selector: &str) -> bool {
    let labels = obj.metadata.labels.clone().unwrap_or_default();
    selector
        .split(',')
        .filter(|s| !s.is_empty())
        .all(|pair| match pair.split_once('=') {
            Some((k, v)) => labels.get(k).map(String::as_str) == Some(v),
            None => labels.contains_key(pair),
        })
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without counting it as a write.
    pub fn insert(&self, key: ObjectKey, mut obj: DynamicObject) {
        let mut inner = self.inner.lock().unwrap();
        if obj.metadata.uid.is_none() {
            obj.metadata.uid = Some(format!("uid-{}", key.name));
        }
        inner.bump(&mut obj);
        inner.objects.insert(key, obj);
    }

    /// Seed a typed resource, such as a root object.
    pub fn insert_typed<K: serde::Serialize>(&self, key: ObjectKey, obj: &K) {
        let value = serde_json::to_value(obj).expect("serializable resource");
        let obj: DynamicObject =
            serde_json::from_value(value).expect("resource shaped object");
        self.insert(key, obj);
    }

    pub fn object(&self, key: &ObjectKey) -> Option<DynamicObject> {
        self.inner.lock().unwrap().objects.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<ObjectKey> {
        self.inner.lock().unwrap().objects.keys().cloned().collect()
    }

    pub fn reads(&self) -> usize {
        self.inner.lock().unwrap().reads
    }

    pub fn writes(&self) -> Vec<(Op, ObjectKey)> {
        self.inner.lock().unwrap().writes.clone()
    }

    pub fn clear_log(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.reads = 0;
        inner.writes.clear();
    }

    /// Mutate a stored object as another actor would: the change bumps the
    /// resourceVersion but is not logged.
    pub fn modify(&self, key: &ObjectKey, f: impl FnOnce(&mut DynamicObject)) {
        let mut inner = self.inner.lock().unwrap();
        let mut obj = inner.objects.get(key).cloned().expect("object exists");
        f(&mut obj);
        inner.bump(&mut obj);
        inner.objects.insert(key.clone(), obj);
    }

    /// Report `ready` ready replicas on a stored Deployment.
    pub fn set_ready_replicas(&self, key: &ObjectKey, ready: i32) {
        self.modify(key, |obj| {
            obj.data["status"] = json!({
                "replicas": ready,
                "readyReplicas": ready,
            });
        });
    }

    /// Mark every stored Deployment fully ready.
    pub fn make_all_ready(&self) {
        let keys: Vec<_> = self
            .keys()
            .into_iter()
            .filter(|k| k.kind == Kind::Deployment)
            .collect();
        for key in keys {
            let desired = self
                .object(&key)
                .and_then(|o| o.data["spec"]["replicas"].as_i64())
                .unwrap_or(1) as i32;
            self.set_ready_replicas(&key, desired);
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<DynamicObject>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.reads += 1;
        Ok(inner.objects.get(key).cloned())
    }

    async fn create(
        &self,
        key: &ObjectKey,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.objects.contains_key(key) {
            return Err(StoreError::Conflict(key.clone()));
        }
        let mut obj = obj.clone();
        obj.metadata.uid = Some(format!("uid-{}", key.name));
        inner.bump(&mut obj);
        inner.writes.push((Op::Create, key.clone()));
        inner.objects.insert(key.clone(), obj.clone());
        Ok(obj)
    }

    async fn update(
        &self,
        key: &ObjectKey,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(current) = inner.objects.get(key) else {
            return Err(StoreError::NotFound(key.clone()));
        };
        if current.metadata.resource_version != obj.metadata.resource_version {
            return Err(StoreError::Conflict(key.clone()));
        }
        let status = current.data.get("status").cloned();
        let mut obj = obj.clone();
        match status {
            Some(s) => obj.data["status"] = s,
            None => {
                if let Some(map) = obj.data.as_object_mut() {
                    map.remove("status");
                }
            }
        }
        inner.bump(&mut obj);
        inner.writes.push((Op::Update, key.clone()));
        inner.objects.insert(key.clone(), obj.clone());
        Ok(obj)
    }

    async fn update_status(
        &self,
        key: &ObjectKey,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(current) = inner.objects.get(key) else {
            return Err(StoreError::NotFound(key.clone()));
        };
        if current.metadata.resource_version != obj.metadata.resource_version {
            return Err(StoreError::Conflict(key.clone()));
        }
        let mut next = current.clone();
        next.data["status"] = obj.data.get("status").cloned().unwrap_or_default();
        inner.bump(&mut next);
        inner.writes.push((Op::UpdateStatus, key.clone()));
        inner.objects.insert(key.clone(), next.clone());
        Ok(next)
    }

    async fn list(
        &self,
        kind: Kind,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.reads += 1;
        Ok(inner
            .objects
            .iter()
            .filter(|(k, o)| {
                k.kind == kind
                    && k.namespace == namespace
                    && matches_selector(o, label_selector)
            })
            .map(|(_, o)| o.clone())
            .collect())
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.objects.remove(key).is_some() {
            inner.writes.push((Op::Delete, key.clone()));
        }
        Ok(())
    }
}
