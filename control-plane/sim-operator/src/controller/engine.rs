//! Idempotent apply of descriptor lists.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::ReconcileError;
use super::merge::{merge_existing, render};
use super::ownership::OwnershipTable;
use crate::resources::ObjectKey;
use crate::store::ObjectStore;
use crate::templates::ChildDescriptor;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
    Unchanged,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl ApplyReport {
    pub fn changed(&self) -> bool {
        self.created + self.updated > 0
    }

    fn count(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Created => self.created += 1,
            ApplyOutcome::Updated => self.updated += 1,
            ApplyOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

#[derive(Clone)]
pub struct ReconcileEngine {
    store: Arc<dyn ObjectStore>,
    ownership: OwnershipTable,
}

impl ReconcileEngine {
    pub fn new(store: Arc<dyn ObjectStore>, ownership: OwnershipTable) -> Self {
        Self { store, ownership }
    }

    /// Upsert one child. Creates it when missing; otherwise writes back only
    /// when the owned fields differ.
    pub async fn apply(
        &self,
        root: &ObjectKey,
        desc: &ChildDescriptor,
    ) -> Result<ApplyOutcome, ReconcileError> {
        let key = &desc.key;
        let outcome = match self.store.get(key).await? {
            None => {
                let obj = render(desc)?;
                self.store.create(key, &obj).await?;
                info!(%key, owned = desc.attachment.is_owned(), "created");
                ApplyOutcome::Created
            }
            Some(current) => match merge_existing(&current, desc)? {
                Some(next) => {
                    self.store.update(key, &next).await?;
                    info!(%key, "updated");
                    ApplyOutcome::Updated
                }
                None => {
                    debug!(%key, "unchanged");
                    ApplyOutcome::Unchanged
                }
            },
        };
        self.ownership
            .record(root, key.clone(), desc.attachment.is_owned())
            .await;
        Ok(outcome)
    }

    /// Apply descriptors in order. The first error aborts the pass; children
    /// applied before it stay applied.
    pub async fn apply_all(
        &self,
        root: &ObjectKey,
        descriptors: &[ChildDescriptor],
        token: &CancellationToken,
    ) -> Result<ApplyReport, ReconcileError> {
        let mut report = ApplyReport::default();
        for desc in descriptors {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(ReconcileError::Cancelled),
                res = self.apply(root, desc) => res?,
            };
            report.count(outcome);
        }
        Ok(report)
    }
}
