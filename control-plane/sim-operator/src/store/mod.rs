//! Object-store contract used by the reconcile engine and status aggregator.
//!
//! Every call is a single request/response against the API server. Nothing
//! here retries or imposes a deadline.

mod kube_store;
#[cfg(test)]
pub mod memory;

pub use kube_store::KubeStore;

use async_trait::async_trait;
use kube::api::DynamicObject;

#[cfg(test)]
use mockall::automock;

use crate::resources::{Kind, ObjectKey};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(ObjectKey),
    #[error("conflicting write to {0}")]
    Conflict(ObjectKey),
    #[error("api error on {key}: {message}")]
    Api { key: ObjectKey, message: String },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch by identity. A missing object is `Ok(None)`.
    async fn get(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<DynamicObject>, StoreError>;

    async fn create(
        &self,
        key: &ObjectKey,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    /// Replace the object. `obj` carries the resourceVersion it was read at,
    /// so a concurrent write surfaces as [`StoreError::Conflict`].
    async fn update(
        &self,
        key: &ObjectKey,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    /// Replace the status subresource, with the same version check as `update`.
    async fn update_status(
        &self,
        key: &ObjectKey,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    async fn list(
        &self,
        kind: Kind,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<DynamicObject>, StoreError>;

    /// Delete by identity. Deleting a missing object succeeds.
    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError>;
}
