//! Per-root reconcile passes: default, validate, resolve capabilities, build,
//! apply, then aggregate status.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tracing::{info, instrument};

use super::cleanup;
use super::engine::ApplyReport;
use super::events::{REASON_APPLIED, REASON_FAILED};
use super::status::{
    ReadyText, Readiness, StatusWrite, observe_workloads, verdict, write_status,
};
use super::{ControllerContext, ReconcileError};
use crate::crd::scheduler_install::SchedulerInstallStatus;
use crate::crd::simulator_deployment::SimulatorDeploymentStatus;
use crate::crd::{
    RootKind, SchedulerInstall, SimulatorDeployment, SimulatorDeploymentSpec,
};
use crate::defaults::{
    default_scheduler_install, default_simulator_deployment,
    validate_scheduler_install, validate_simulator_deployment,
};
use crate::resources::{Kind, ObjectKey};
use crate::templates::manager::gateway_instances;
use crate::templates::simulator;
use crate::templates::traffic::service_host;
use crate::templates::{ChildDescriptor, DesiredStateBuilder, RootRef};

const SCHEDULER_TEXT: ReadyText = ReadyText {
    ready_reason: "Reconciled",
    ready_message: "SchedulerInstall resources are ready",
    not_ready_reason: "WorkloadsNotReady",
};

const SIMULATOR_TEXT: ReadyText = ReadyText {
    ready_reason: "DeploymentReady",
    ready_message: "Simulator deployment is ready",
    not_ready_reason: "DeploymentNotReady",
};

pub fn root_ref<K>(obj: &K, kind: RootKind) -> RootRef
where
    K: Resource<DynamicType = ()>,
{
    RootRef {
        kind,
        name: obj.name_any(),
        namespace: obj.namespace().unwrap_or_else(|| "default".to_string()),
        uid: obj.meta().uid.clone().unwrap_or_default(),
    }
}

fn is_deleting<K: Resource>(obj: &K) -> bool {
    obj.meta().deletion_timestamp.is_some()
}

struct Applied {
    report: ApplyReport,
    workloads: Vec<Readiness>,
}

async fn apply_and_observe(
    ctx: &ControllerContext,
    root: &RootRef,
    descriptors: &[ChildDescriptor],
) -> Result<Applied, ReconcileError> {
    let report = ctx
        .engine
        .apply_all(&root.key(), descriptors, &ctx.token)
        .await?;
    let tracked: Vec<&ObjectKey> = descriptors
        .iter()
        .filter(|d| d.tracked)
        .map(|d| &d.key)
        .collect();
    let workloads = observe_workloads(ctx.store.as_ref(), tracked).await?;
    Ok(Applied { report, workloads })
}

async fn finish(
    ctx: &ControllerContext,
    root: &RootRef,
    report: &ApplyReport,
    written: StatusWrite,
) -> Result<Action, ReconcileError> {
    if written == StatusWrite::RootGone {
        info!("root deleted during the pass; forgetting its children");
        ctx.ownership.forget(&root.key()).await;
        return Ok(Action::await_change());
    }
    info!(
        created = report.created,
        updated = report.updated,
        unchanged = report.unchanged,
        "pass complete"
    );
    if report.changed() {
        let note = format!(
            "{} created, {} updated",
            report.created, report.updated
        );
        ctx.events
            .emit(root, EventType::Normal, REASON_APPLIED, Some(note))
            .await;
    }
    Ok(Action::requeue(ctx.cfg.requeue_after()))
}

async fn publish_failure(
    ctx: &ControllerContext,
    root: &RootRef,
    res: Result<Action, ReconcileError>,
) -> Result<Action, ReconcileError> {
    if let Err(e) = &res {
        if !matches!(e, ReconcileError::Cancelled) {
            ctx.events
                .emit(root, EventType::Warning, REASON_FAILED, Some(e.to_string()))
                .await;
        }
    }
    res
}

/// Deletion path. Linked children are only removed when cleanup is enabled.
/// A leftover finalizer is released either way.
async fn finalize(
    ctx: &ControllerContext,
    root: &RootRef,
    namespaces: BTreeSet<String>,
) -> Result<Action, ReconcileError> {
    let scope = ctx
        .cfg
        .features
        .cross_namespace_cleanup
        .then_some(&namespaces);
    let caps = ctx.gate.resolve().await;
    cleanup::finalize(ctx.store.as_ref(), &ctx.ownership, root, scope, &caps)
        .await?;
    Ok(Action::await_change())
}

fn foreign_namespaces<'a>(
    root: &RootRef,
    candidates: impl IntoIterator<Item = &'a str>,
) -> BTreeSet<String> {
    candidates
        .into_iter()
        .filter(|ns| !ns.is_empty() && *ns != root.namespace)
        .map(str::to_string)
        .collect()
}

pub async fn reconcile_scheduler_install(
    obj: Arc<SchedulerInstall>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileError> {
    let root = root_ref(obj.as_ref(), RootKind::SchedulerInstall);
    let res = scheduler_install_pass(&obj, &root, &ctx).await;
    publish_failure(&ctx, &root, res).await
}

#[instrument(skip_all, fields(kind = "SchedulerInstall", ns = %root.namespace, name = %root.name))]
async fn scheduler_install_pass(
    obj: &SchedulerInstall,
    root: &RootRef,
    ctx: &ControllerContext,
) -> Result<Action, ReconcileError> {
    let spec = default_scheduler_install(&root.name, &root.namespace, &obj.spec);
    let linked = foreign_namespaces(
        root,
        [
            spec.scheduler_namespace.as_str(),
            spec.simulator_namespace.as_str(),
        ],
    );

    if is_deleting(obj) {
        info!("deletion requested");
        return finalize(ctx, root, linked).await;
    }
    validate_scheduler_install(&spec)?;
    if ctx.cfg.features.cross_namespace_cleanup && !linked.is_empty() {
        cleanup::ensure_finalizer(ctx.store.as_ref(), root, &linked).await?;
    }

    let caps = ctx.gate.resolve().await;
    let descriptors = spec.build(root, &caps);
    let applied = apply_and_observe(ctx, root, &descriptors).await?;

    let v = verdict(&applied.workloads, SCHEDULER_TEXT);
    let now = Utc::now().to_rfc3339();
    let written = write_status::<SchedulerInstallStatus>(
        ctx.store.as_ref(),
        &root.key(),
        obj.meta().generation,
        &v,
        &now,
        |_| {},
    )
    .await?;
    finish(ctx, root, &applied.report, written).await
}

pub async fn reconcile_simulator_deployment(
    obj: Arc<SimulatorDeployment>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileError> {
    let root = root_ref(obj.as_ref(), RootKind::SimulatorDeployment);
    let res = simulator_deployment_pass(&obj, &root, &ctx).await;
    publish_failure(&ctx, &root, res).await
}

/// Replica totals, endpoints and gateway URL of a simulator root.
pub fn simulator_summary(
    root: &RootRef,
    spec: &SimulatorDeploymentSpec,
    workloads: &[Readiness],
    status: &mut SimulatorDeploymentStatus,
) {
    let serving = simulator::workloads(root, spec);
    let observed = |name: &str| {
        workloads
            .iter()
            .find(|w| w.key.kind == Kind::Deployment && w.key.name == name)
    };
    status.replicas = serving
        .iter()
        .filter_map(|w| observed(&w.deployment_name))
        .map(|w| w.replicas)
        .sum();
    status.ready_replicas = serving
        .iter()
        .filter_map(|w| observed(&w.deployment_name))
        .map(|w| w.ready)
        .sum();
    status.endpoints = serving
        .iter()
        .map(|w| {
            format!(
                "http://{}:{}",
                service_host(&w.service_name, &root.namespace),
                w.port
            )
        })
        .collect();
    status.gateway_url = gateway_instances(root, spec)
        .first()
        .map(|(name, _, cfg)| {
            format!("http://{}:{}", service_host(name, &root.namespace), cfg.port)
        })
        .unwrap_or_default();
}

#[instrument(skip_all, fields(kind = "SimulatorDeployment", ns = %root.namespace, name = %root.name))]
async fn simulator_deployment_pass(
    obj: &SimulatorDeployment,
    root: &RootRef,
    ctx: &ControllerContext,
) -> Result<Action, ReconcileError> {
    if is_deleting(obj) {
        info!("deletion requested");
        return finalize(ctx, root, BTreeSet::new()).await;
    }
    let spec = default_simulator_deployment(&root.name, &obj.spec);
    validate_simulator_deployment(&spec)?;

    let caps = ctx.gate.resolve().await;
    let descriptors = spec.build(root, &caps);
    let applied = apply_and_observe(ctx, root, &descriptors).await?;

    let v = verdict(&applied.workloads, SIMULATOR_TEXT);
    let now = Utc::now().to_rfc3339();
    let written = write_status::<SimulatorDeploymentStatus>(
        ctx.store.as_ref(),
        &root.key(),
        obj.meta().generation,
        &v,
        &now,
        |status| simulator_summary(root, &spec, &applied.workloads, status),
    )
    .await?;
    finish(ctx, root, &applied.report, written).await
}
