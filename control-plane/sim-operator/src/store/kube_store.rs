use async_trait::async_trait;
use kube::Client;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams};
use tracing::trace;

use super::{ObjectStore, StoreError};
use crate::resources::{Kind, ObjectKey};

/// [`ObjectStore`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    field_manager: String,
}

impl KubeStore {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn api(&self, kind: Kind, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(
            self.client.clone(),
            namespace,
            &kind.api_resource(),
        )
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            dry_run: false,
            field_manager: Some(self.field_manager.clone()),
        }
    }
}

fn map_err(key: &ObjectKey, e: kube::Error) -> StoreError {
    match e {
        kube::Error::Api(ae) if ae.code == 404 => {
            StoreError::NotFound(key.clone())
        }
        kube::Error::Api(ae) if ae.code == 409 => {
            StoreError::Conflict(key.clone())
        }
        kube::Error::SerdeError(e) => StoreError::Serialization(e),
        other => StoreError::Api {
            key: key.clone(),
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<DynamicObject>, StoreError> {
        trace!(%key, "store get");
        self.api(key.kind, &key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(|e| map_err(key, e))
    }

    async fn create(
        &self,
        key: &ObjectKey,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        self.api(key.kind, &key.namespace)
            .create(&self.post_params(), obj)
            .await
            .map_err(|e| map_err(key, e))
    }

    async fn update(
        &self,
        key: &ObjectKey,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        self.api(key.kind, &key.namespace)
            .replace(&key.name, &self.post_params(), obj)
            .await
            .map_err(|e| map_err(key, e))
    }

    async fn update_status(
        &self,
        key: &ObjectKey,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let body = serde_json::to_vec(obj)?;
        self.api(key.kind, &key.namespace)
            .replace_status(&key.name, &self.post_params(), body)
            .await
            .map_err(|e| map_err(key, e))
    }

    async fn list(
        &self,
        kind: Kind,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let lp = ListParams::default().labels(label_selector);
        self.api(kind, namespace)
            .list(&lp)
            .await
            .map(|list| list.items)
            .map_err(|e| {
                map_err(&ObjectKey::new(kind, namespace, label_selector), e)
            })
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        match self
            .api(key.kind, &key.namespace)
            .delete(&key.name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(map_err(key, e)),
        }
    }
}
