//! Ready-condition aggregation and the read-latest-then-write status update.

use kube::api::DynamicObject;
use serde_json::Value;
use tracing::{debug, trace};

use super::ReconcileError;
use crate::crd::{Condition, ConditionStatus, READY_CONDITION, RootStatus};
use crate::resources::ObjectKey;
use crate::store::ObjectStore;

/// Observed replica counts of one tracked Deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Readiness {
    pub key: ObjectKey,
    /// `None` when the workload does not exist yet.
    pub desired: Option<i32>,
    pub replicas: i32,
    pub ready: i32,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.desired.is_some_and(|d| self.ready == d)
    }

    fn from_object(key: &ObjectKey, obj: Option<&DynamicObject>) -> Self {
        let int = |v: &Value| v.as_i64().map(|n| n as i32);
        match obj {
            None => Self {
                key: key.clone(),
                desired: None,
                replicas: 0,
                ready: 0,
            },
            Some(o) => Self {
                key: key.clone(),
                desired: Some(int(&o.data["spec"]["replicas"]).unwrap_or(1)),
                replicas: int(&o.data["status"]["replicas"]).unwrap_or(0),
                ready: int(&o.data["status"]["readyReplicas"]).unwrap_or(0),
            },
        }
    }
}

/// Read the current state of every tracked workload.
pub async fn observe_workloads(
    store: &dyn ObjectStore,
    keys: impl IntoIterator<Item = &ObjectKey>,
) -> Result<Vec<Readiness>, ReconcileError> {
    let mut out = Vec::new();
    for key in keys {
        let obj = store.get(key).await?;
        out.push(Readiness::from_object(key, obj.as_ref()));
    }
    Ok(out)
}

/// Outcome of aggregating workload readiness into one condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub ready: bool,
    pub reason: String,
    pub message: String,
}

/// Reason and message pairs used for each outcome of a root kind.
#[derive(Clone, Copy, Debug)]
pub struct ReadyText {
    pub ready_reason: &'static str,
    pub ready_message: &'static str,
    pub not_ready_reason: &'static str,
}

pub fn verdict(workloads: &[Readiness], text: ReadyText) -> Verdict {
    match workloads.iter().find(|w| !w.is_ready()) {
        None => Verdict {
            ready: true,
            reason: text.ready_reason.to_string(),
            message: text.ready_message.to_string(),
        },
        Some(w) => Verdict {
            ready: false,
            reason: text.not_ready_reason.to_string(),
            message: match w.desired {
                None => format!("waiting for {} to be created", w.key),
                Some(d) => format!(
                    "waiting for {}: {}/{} replicas ready",
                    w.key, w.ready, d
                ),
            },
        },
    }
}

/// Insert or replace the condition of the same type. The transition time
/// only moves when the status value flips.
pub fn upsert_condition(conditions: &mut Vec<Condition>, mut next: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == next.type_) {
        Some(existing) => {
            if existing.status == next.status {
                next.last_transition_time = existing.last_transition_time.clone();
            }
            *existing = next;
        }
        None => conditions.push(next),
    }
}

/// Outcome of [`write_status`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusWrite {
    Written,
    Unchanged,
    /// The root was deleted before the write.
    RootGone,
}

/// Read the latest stored root, fold `verdict` and `extra` into its status,
/// and write it back only when something other than timestamps changed.
/// A concurrent writer between the read and the write surfaces as a
/// conflict.
pub async fn write_status<S: RootStatus>(
    store: &dyn ObjectStore,
    root: &ObjectKey,
    generation: Option<i64>,
    verdict: &Verdict,
    now: &str,
    extra: impl FnOnce(&mut S),
) -> Result<StatusWrite, ReconcileError> {
    let Some(mut latest) = store.get(root).await? else {
        debug!(%root, "root gone before status write");
        return Ok(StatusWrite::RootGone);
    };
    let current: S = match latest.data.get("status") {
        Some(v) if !v.is_null() => serde_json::from_value(v.clone())?,
        _ => S::default(),
    };

    let mut next = current.clone();
    extra(&mut next);
    upsert_condition(
        next.conditions_mut(),
        Condition {
            type_: READY_CONDITION.to_string(),
            status: ConditionStatus::from(verdict.ready),
            reason: verdict.reason.clone(),
            message: verdict.message.clone(),
            last_transition_time: Some(now.to_string()),
            observed_generation: generation,
        },
    );

    if next == current {
        trace!(%root, "status unchanged; skipping write");
        return Ok(StatusWrite::Unchanged);
    }
    latest.data["status"] = serde_json::to_value(&next)?;
    store.update_status(root, &latest).await?;
    debug!(%root, ready = verdict.ready, reason = %verdict.reason, "status written");
    Ok(StatusWrite::Written)
}
