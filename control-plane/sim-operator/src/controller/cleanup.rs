//! Explicit cleanup of label-linked children. Owner references cannot cross
//! namespaces, so those children are deleted here behind a finalizer when
//! cross-namespace cleanup is enabled.

use std::collections::BTreeSet;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{info, instrument};

use super::ReconcileError;
use super::ownership::OwnershipTable;
use crate::capability::Capabilities;
use crate::resources::{Kind, ObjectKey};
use crate::store::ObjectStore;
use crate::templates::RootRef;

pub const FINALIZER: &str = "sim.llm-d.io/cross-namespace-cleanup";

/// Kinds that may be created outside the root namespace.
const LINKED_KINDS: [Kind; 10] = [
    Kind::ServiceAccount,
    Kind::Role,
    Kind::RoleBinding,
    Kind::ConfigMap,
    Kind::Deployment,
    Kind::Service,
    Kind::Gateway,
    Kind::HttpRoute,
    Kind::ReferenceGrant,
    Kind::DestinationRule,
];

/// Comma-separated namespaces the root has ever linked children into.
/// Survives restarts and spec edits that move a child elsewhere.
pub const LINKED_NAMESPACES: &str = "sim.llm-d.io/linked-namespaces";

fn has_finalizer(finalizers: Option<&Vec<String>>) -> bool {
    finalizers.is_some_and(|f| f.iter().any(|x| x == FINALIZER))
}

pub fn recorded_namespaces(meta: &ObjectMeta) -> BTreeSet<String> {
    meta.annotations
        .as_ref()
        .and_then(|a| a.get(LINKED_NAMESPACES))
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|ns| !ns.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Add the cleanup finalizer and fold `linked` into the recorded
/// namespaces. Writes only when either changes.
pub async fn ensure_finalizer(
    store: &dyn ObjectStore,
    root: &RootRef,
    linked: &BTreeSet<String>,
) -> Result<bool, ReconcileError> {
    let key = root.key();
    let Some(mut obj) = store.get(&key).await? else {
        return Ok(false);
    };
    let mut changed = false;
    if !has_finalizer(obj.metadata.finalizers.as_ref()) {
        info!(%key, "adding finalizer");
        obj.metadata
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(FINALIZER.to_string());
        changed = true;
    }

    let recorded = recorded_namespaces(&obj.metadata);
    if !linked.is_subset(&recorded) {
        let all: Vec<String> = recorded.union(linked).cloned().collect();
        info!(%key, namespaces = %all.join(","), "recording linked namespaces");
        obj.metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(LINKED_NAMESPACES.to_string(), all.join(","));
        changed = true;
    }

    if changed {
        store.update(&key, &obj).await?;
    }
    Ok(changed)
}

/// Forget the root's children, then release its finalizer. With a `scope`
/// (cleanup enabled) every linked child is deleted first: the ones this
/// process applied plus whatever the link labels select in the scope and
/// in the namespaces recorded on the root. Roots without the finalizer are
/// left alone.
#[instrument(skip_all, fields(root = %root.key()))]
pub async fn finalize(
    store: &dyn ObjectStore,
    ownership: &OwnershipTable,
    root: &RootRef,
    scope: Option<&BTreeSet<String>>,
    caps: &Capabilities,
) -> Result<usize, ReconcileError> {
    let key = root.key();
    let applied = ownership.cross_namespace(&key).await;
    ownership.forget(&key).await;

    let Some(mut obj) = store.get(&key).await? else {
        return Ok(0);
    };
    if !has_finalizer(obj.metadata.finalizers.as_ref()) {
        return Ok(0);
    }

    let mut doomed = BTreeSet::new();
    if let Some(scope) = scope {
        let mut namespaces = recorded_namespaces(&obj.metadata);
        namespaces.extend(scope.iter().cloned());
        namespaces.remove(&root.namespace);

        doomed.extend(
            applied
                .into_iter()
                .filter(|k| k.namespace != root.namespace && caps.supports(k.kind)),
        );
        let selector = root.link_selector();
        for ns in &namespaces {
            for kind in LINKED_KINDS.into_iter().filter(|k| caps.supports(*k)) {
                for child in store.list(kind, ns, &selector).await? {
                    let name = child.metadata.name.unwrap_or_default();
                    doomed.insert(ObjectKey::new(kind, ns.as_str(), name));
                }
            }
        }
        for child in &doomed {
            store.delete(child).await?;
            info!(%child, "deleted linked child");
        }
    }

    obj.metadata
        .finalizers
        .get_or_insert_with(Vec::new)
        .retain(|f| f != FINALIZER);
    if let Some(annotations) = obj.metadata.annotations.as_mut() {
        annotations.remove(LINKED_NAMESPACES);
    }
    store.update(&key, &obj).await?;
    info!(deleted = doomed.len(), "finalizer released");
    Ok(doomed.len())
}
