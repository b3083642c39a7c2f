use super::descriptor::{ChildDescriptor, DesiredState, RootRef};
use super::workload::{APP_NAME_LABEL, string_map};
use crate::crd::LoadBalancingConfig;
use crate::resources::istio::{
    ConnectionPoolSettings, DestinationRuleSpec, HttpSettings,
    LoadBalancerSettings, TrafficPolicy,
};

pub fn service_host(service: &str, namespace: &str) -> String {
    format!("{service}.{namespace}.svc.cluster.local")
}

/// Load-balancing policy for `service`, placed next to it.
pub fn destination_rule(
    root: &RootRef,
    namespace: &str,
    service: &str,
    lb: &LoadBalancingConfig,
) -> ChildDescriptor {
    let connection_pool = lb.connection_pool.as_ref().map(|p| {
        ConnectionPoolSettings {
            http: HttpSettings {
                http1_max_pending_requests: p.http1_max_pending_requests,
                max_requests_per_connection: p.max_requests_per_connection,
            },
        }
    });
    ChildDescriptor::new(
        root,
        namespace,
        &super::names::destination_rule(service),
        string_map(&[(APP_NAME_LABEL, root.name.as_str())]),
        DesiredState::DestinationRule(DestinationRuleSpec {
            host: service_host(service, namespace),
            traffic_policy: TrafficPolicy {
                load_balancer: LoadBalancerSettings {
                    simple: lb.algorithm.clone(),
                },
                connection_pool,
            },
        }),
    )
}
