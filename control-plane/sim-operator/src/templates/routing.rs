use super::descriptor::{ChildDescriptor, DesiredState, RootRef};
use super::workload::{APP_NAME_LABEL, string_map};
use crate::crd::scheduler_install::SchedulerInstallSpec;
use crate::defaults::BACKEND_INFERENCE_POOL;
use crate::resources::gateway_api::{
    BackendRef, GATEWAY_API_GROUP, HttpPathMatch, HttpRouteMatch,
    HttpRouteRule, HttpRouteSpec, HttpRouteTimeouts, ParentRef,
    ReferenceGrantFrom, ReferenceGrantSpec, ReferenceGrantTo,
};

pub const INFERENCE_POOL_GROUP: &str = "inference.networking.k8s.io";

fn backend(spec: &SchedulerInstallSpec) -> BackendRef {
    let routing = spec.routing.as_ref();
    let pool = routing
        .filter(|r| r.backend_type == BACKEND_INFERENCE_POOL)
        .and_then(|r| r.inference_pool.as_ref());
    match pool {
        Some(pool) => BackendRef {
            group: INFERENCE_POOL_GROUP.to_string(),
            kind: "InferencePool".to_string(),
            name: pool.name.clone(),
            namespace: Some(pool.namespace.clone()),
            port: (pool.port > 0).then_some(pool.port),
            weight: Some(1),
        },
        None => BackendRef {
            group: String::new(),
            kind: "Service".to_string(),
            name: spec.proxy_service.name.clone(),
            namespace: Some(spec.simulator_namespace.clone()),
            port: Some(spec.proxy_service.port),
            weight: Some(1),
        },
    }
}

/// Route from the parent gateway to the proxy service (or inference pool).
/// Callers only pass specs whose routing block is enabled.
pub fn http_route(
    root: &RootRef,
    spec: &SchedulerInstallSpec,
) -> Option<ChildDescriptor> {
    let routing = spec.routing.as_ref()?;
    let route = HttpRouteSpec {
        parent_refs: vec![ParentRef {
            group: GATEWAY_API_GROUP.to_string(),
            kind: "Gateway".to_string(),
            name: routing.parent_gateway.name.clone(),
            namespace: Some(routing.parent_gateway.namespace.clone()),
        }],
        rules: vec![HttpRouteRule {
            matches: vec![HttpRouteMatch {
                path: HttpPathMatch::prefix("/"),
            }],
            backend_refs: vec![backend(spec)],
            // inference requests stream for as long as they need
            timeouts: Some(HttpRouteTimeouts {
                backend_request: "0s".to_string(),
                request: "0s".to_string(),
            }),
        }],
    };
    Some(ChildDescriptor::new(
        root,
        &spec.scheduler_namespace,
        &routing.http_route_name,
        string_map(&[(APP_NAME_LABEL, root.name.as_str())]),
        DesiredState::HttpRoute(route),
    ))
}

/// Lets routes in the scheduler namespace reference backends in the
/// simulator namespace.
pub fn reference_grant(
    root: &RootRef,
    spec: &SchedulerInstallSpec,
) -> ChildDescriptor {
    ChildDescriptor::new(
        root,
        &spec.simulator_namespace,
        &super::names::reference_grant(&root.name),
        string_map(&[(APP_NAME_LABEL, root.name.as_str())]),
        DesiredState::ReferenceGrant(ReferenceGrantSpec {
            from: vec![ReferenceGrantFrom {
                group: GATEWAY_API_GROUP.to_string(),
                kind: "HTTPRoute".to_string(),
                namespace: spec.scheduler_namespace.clone(),
            }],
            to: vec![
                ReferenceGrantTo {
                    group: INFERENCE_POOL_GROUP.to_string(),
                    kind: "InferencePool".to_string(),
                },
                ReferenceGrantTo {
                    group: String::new(),
                    kind: "Service".to_string(),
                },
            ],
        }),
    )
}
