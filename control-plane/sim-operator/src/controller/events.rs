use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::Client;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::warn;

use crate::crd::API_VERSION;
use crate::templates::RootRef;

pub const REASON_APPLIED: &str = "Applied";
pub const REASON_FAILED: &str = "ReconcileFailed";
pub const ACTION_RECONCILE: &str = "Reconcile";

/// Fire-and-forget event publishing; a failed publish never fails a pass.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(
        &self,
        root: &RootRef,
        type_: EventType,
        reason: &str,
        note: Option<String>,
    );
}

pub struct KubeEvents {
    recorder: Recorder,
}

impl KubeEvents {
    pub fn new(client: Client, controller: &str) -> Self {
        let reporter = Reporter {
            controller: controller.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

fn object_ref(root: &RootRef) -> ObjectReference {
    ObjectReference {
        api_version: Some(API_VERSION.to_string()),
        kind: Some(root.kind.kind().to_string()),
        name: Some(root.name.clone()),
        namespace: Some(root.namespace.clone()),
        uid: (!root.uid.is_empty()).then(|| root.uid.clone()),
        ..Default::default()
    }
}

#[async_trait]
impl EventSink for KubeEvents {
    async fn emit(
        &self,
        root: &RootRef,
        type_: EventType,
        reason: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.into(),
            note,
            action: ACTION_RECONCILE.into(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, &object_ref(root)).await
        {
            warn!(root = %root.key(), reason, error = %e, "failed to publish event");
        }
    }
}

/// Drops every event. Used when no cluster is attached.
pub struct NoopEvents;

#[async_trait]
impl EventSink for NoopEvents {
    async fn emit(
        &self,
        _root: &RootRef,
        _type_: EventType,
        _reason: &str,
        _note: Option<String>,
    ) {
    }
}
