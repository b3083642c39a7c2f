#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use kube::api::DynamicObject;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use crate::capability::Capabilities;
    use crate::controller::test_support::root;
    use crate::controller::{
        ApplyOutcome, OwnershipTable, ReconcileEngine, ReconcileError,
    };
    use crate::crd::scheduler_install::SchedulerEppConfig;
    use crate::crd::{RootKind, SchedulerInstallSpec};
    use crate::defaults::default_scheduler_install;
    use crate::resources::{Kind, ObjectKey};
    use crate::store::memory::{MemoryStore, Op};
    use crate::store::{MockObjectStore, StoreError};
    use crate::templates::{ChildDescriptor, DesiredStateBuilder, RootRef};

    fn demo() -> (RootRef, Vec<ChildDescriptor>) {
        let spec = SchedulerInstallSpec {
            simulator_namespace: "sim".into(),
            epp: Some(SchedulerEppConfig {
                enabled: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        let r = root(RootKind::SchedulerInstall, "demo");
        let descs = default_scheduler_install("demo", "default", &spec)
            .build(&r, &Capabilities::all());
        (r, descs)
    }

    fn engine(store: Arc<MemoryStore>) -> (ReconcileEngine, OwnershipTable) {
        let ownership = OwnershipTable::new();
        (ReconcileEngine::new(store, ownership.clone()), ownership)
    }

    #[test_log::test(tokio::test)]
    async fn first_pass_creates_every_child_in_order() {
        let store = Arc::new(MemoryStore::new());
        let (engine, _) = engine(store.clone());
        let (r, descs) = demo();

        let report = engine
            .apply_all(&r.key(), &descs, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.created, descs.len());
        assert!(report.changed());

        let written: Vec<ObjectKey> =
            store.writes().into_iter().map(|(_, k)| k).collect();
        let expected: Vec<ObjectKey> = descs.iter().map(|d| d.key.clone()).collect();
        assert_eq!(written, expected);
        assert!(store.writes().iter().all(|(op, _)| *op == Op::Create));
    }

    #[tokio::test]
    async fn converged_pass_only_reads() {
        let store = Arc::new(MemoryStore::new());
        let (engine, _) = engine(store.clone());
        let (r, descs) = demo();
        let token = CancellationToken::new();

        engine.apply_all(&r.key(), &descs, &token).await.unwrap();
        store.make_all_ready();
        store.clear_log();

        let report = engine.apply_all(&r.key(), &descs, &token).await.unwrap();
        assert_eq!(report.unchanged, descs.len());
        assert!(!report.changed());
        assert!(store.writes().is_empty());
        assert_eq!(store.reads(), descs.len());
    }

    #[tokio::test]
    async fn drift_is_written_back_once() {
        let store = Arc::new(MemoryStore::new());
        let (engine, _) = engine(store.clone());
        let (r, descs) = demo();
        let workload = descs
            .iter()
            .find(|d| d.key.kind == Kind::Deployment)
            .unwrap();

        engine.apply(&r.key(), workload).await.unwrap();
        store.modify(&workload.key, |obj| obj.data["spec"]["replicas"] = json!(4));

        let outcome = engine.apply(&r.key(), workload).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Updated);
        let stored = store.object(&workload.key).unwrap();
        assert_eq!(stored.data["spec"]["replicas"], 1);

        let outcome = engine.apply(&r.key(), workload).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Unchanged);
    }

    #[tokio::test]
    async fn cross_namespace_children_are_linked_not_owned() {
        let store = Arc::new(MemoryStore::new());
        let (engine, ownership) = engine(store.clone());
        let (r, descs) = demo();

        engine
            .apply_all(&r.key(), &descs, &CancellationToken::new())
            .await
            .unwrap();

        let role = store
            .object(&ObjectKey::new(Kind::Role, "sim", "demo-epp"))
            .unwrap();
        assert!(role.metadata.owner_references.is_none());
        let labels = role.metadata.labels.unwrap();
        assert_eq!(labels["sim.llm-d.io/schedulerInstall"], "demo");
        assert_eq!(labels["sim.llm-d.io/schedulerNamespace"], "default");

        let sa = store
            .object(&ObjectKey::new(Kind::ServiceAccount, "default", "demo-epp"))
            .unwrap();
        assert_eq!(sa.metadata.owner_references.unwrap()[0].uid, "uid-demo");

        let mut linked = ownership.cross_namespace(&r.key()).await;
        linked.sort();
        assert_eq!(
            linked,
            vec![
                ObjectKey::new(Kind::Role, "sim", "demo-epp"),
                ObjectKey::new(Kind::RoleBinding, "sim", "demo-epp"),
                ObjectKey::new(Kind::Service, "sim", "demo-proxy"),
            ]
        );
        assert_eq!(ownership.children(&r.key()).await.len(), descs.len());
    }

    #[tokio::test]
    async fn foreign_fields_on_children_survive_a_pass() {
        let store = Arc::new(MemoryStore::new());
        let (engine, _) = engine(store.clone());
        let (r, descs) = demo();
        let token = CancellationToken::new();
        engine.apply_all(&r.key(), &descs, &token).await.unwrap();

        let svc = ObjectKey::new(Kind::Service, "sim", "demo-proxy");
        store.modify(&svc, |obj| {
            obj.metadata
                .annotations
                .get_or_insert_with(Default::default)
                .insert("owner".into(), "platform-team".into());
            obj.data["spec"]["clusterIP"] = json!("10.96.0.10");
        });
        store.clear_log();

        engine.apply_all(&r.key(), &descs, &token).await.unwrap();
        assert!(store.writes().is_empty());
        let stored = store.object(&svc).unwrap();
        assert_eq!(stored.metadata.annotations.unwrap()["owner"], "platform-team");
        assert_eq!(stored.data["spec"]["clusterIP"], "10.96.0.10");
    }

    #[tokio::test]
    async fn cancelled_pass_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let (engine, _) = engine(store.clone());
        let (r, descs) = demo();
        let token = CancellationToken::new();
        token.cancel();

        let err = engine.apply_all(&r.key(), &descs, &token).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Cancelled));
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn first_failure_aborts_the_remaining_children() {
        let (r, descs) = demo();
        let mut store = MockObjectStore::new();
        store.expect_get().times(2).returning(|_| Ok(None));
        let calls = AtomicUsize::new(0);
        store.expect_create().times(2).returning(
            move |key: &ObjectKey, obj: &DynamicObject| {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Ok(obj.clone());
                }
                Err(StoreError::Api {
                    key: key.clone(),
                    message: "forbidden".into(),
                })
            },
        );
        store.expect_update().never();

        let engine = ReconcileEngine::new(Arc::new(store), OwnershipTable::new());
        let err = engine
            .apply_all(&r.key(), &descs, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            ReconcileError::Store(StoreError::Api { key, .. }) => {
                assert_eq!(key, descs[1].key)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn create_race_surfaces_as_conflict() {
        let (r, descs) = demo();
        let mut store = MockObjectStore::new();
        store.expect_get().returning(|_| Ok(None));
        store
            .expect_create()
            .returning(|key: &ObjectKey, _| Err(StoreError::Conflict(key.clone())));

        let engine = ReconcileEngine::new(Arc::new(store), OwnershipTable::new());
        let err = engine.apply(&r.key(), &descs[0]).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Store(e) if e.is_conflict()));
    }
}
