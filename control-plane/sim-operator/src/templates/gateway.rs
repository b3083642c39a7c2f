//! Gateways: the scheduler's Gateway API object and the simulator's
//! self-hosted inference gateway deployments.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{ConfigMap, Container, VolumeMount};

use super::descriptor::{ChildDescriptor, DesiredState, RootRef};
use super::workload::{
    APP_NAME_LABEL, COMPONENT_LABEL, PodShape, Timing, config_map_volume,
    deployment, field_env, http_probe, service, service_port, string_map,
    tcp_port, value_env,
};
use crate::crd::scheduler_install::SchedulerGatewayConfig;
use crate::crd::simulator_deployment::GatewayInstanceConfig;
use crate::resources::gateway_api::{GatewayListener, GatewaySpec};

pub const ENVOY_ADMIN_PORT: i32 = 19000;
pub const ENVOY_LISTENER_PORT: i32 = 80;
pub const ENVOY_MONITORING_PORT: i32 = 9091;
pub const ISTIO_PROXY_PORT: i32 = 8080;
pub const ENVOY_CONFIG_KEY: &str = "envoy.yaml";

pub fn scheduler_gateway(
    root: &RootRef,
    namespace: &str,
    gw: &SchedulerGatewayConfig,
) -> ChildDescriptor {
    ChildDescriptor::new(
        root,
        namespace,
        &gw.name,
        string_map(&[(APP_NAME_LABEL, root.name.as_str())]),
        DesiredState::Gateway(GatewaySpec {
            gateway_class_name: gw.class_name.clone(),
            listeners: vec![GatewayListener {
                name: "default".to_string(),
                port: gw.listener_port,
                protocol: gw.listener_protocol.clone(),
            }],
        }),
    )
}

/// Static Envoy bootstrap forwarding every request to `upstream`.
pub fn envoy_config(upstream_host: &str, upstream_port: i32) -> String {
    format!(
        r#"admin:
  address:
    socket_address:
      address: 0.0.0.0
      port_value: {ENVOY_ADMIN_PORT}

static_resources:
  listeners:
  - name: listener_0
    address:
      socket_address:
        address: 0.0.0.0
        port_value: {ENVOY_LISTENER_PORT}
    filter_chains:
    - filters:
      - name: envoy.filters.network.http_connection_manager
        typed_config:
          "@type": type.googleapis.com/envoy.extensions.filters.network.http_connection_manager.v3.HttpConnectionManager
          stat_prefix: ingress_http
          route_config:
            name: local_route
            virtual_hosts:
            - name: backend
              domains: ["*"]
              routes:
              - match:
                  prefix: "/"
                route:
                  cluster: simulator_cluster
          http_filters:
          - name: envoy.filters.http.router
            typed_config:
              "@type": type.googleapis.com/envoy.extensions.filters.http.router.v3.Router

  clusters:
  - name: simulator_cluster
    connect_timeout: 5s
    type: STRICT_DNS
    lb_policy: ROUND_ROBIN
    load_assignment:
      cluster_name: simulator_cluster
      endpoints:
      - lb_endpoints:
        - endpoint:
            address:
              socket_address:
                address: {upstream_host}
                port_value: {upstream_port}
"#
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GatewayFlavor {
    /// kgateway's Envoy wrapper with a static bootstrap.
    Standard,
    /// Istio proxy running outside the mesh.
    Istio,
}

fn pod_env() -> Vec<k8s_openapi::api::core::v1::EnvVar> {
    vec![
        field_env("POD_NAME", "metadata.name"),
        field_env("POD_NAMESPACE", "metadata.namespace"),
    ]
}

fn container(flavor: GatewayFlavor, cfg: &GatewayInstanceConfig) -> Container {
    let base = Container {
        image: Some(cfg.image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        resources: cfg.resources.clone(),
        ..Default::default()
    };
    match flavor {
        GatewayFlavor::Istio => Container {
            name: "istio-proxy".to_string(),
            args: Some(vec!["proxy".to_string(), "sidecar".to_string()]),
            env: Some(pod_env()),
            ports: Some(vec![tcp_port("http", ISTIO_PROXY_PORT)]),
            ..base
        },
        GatewayFlavor::Standard => {
            let mut env = pod_env();
            env.push(value_env("ENVOY_UID", "0"));
            Container {
                name: "kgateway-proxy".to_string(),
                args: Some(
                    [
                        "--disable-hot-restart",
                        "--service-node",
                        "$(POD_NAME).$(POD_NAMESPACE)",
                        "--log-level",
                        "warn",
                        "--component-log-level",
                        "connection:warn,http:warn,upstream:warn",
                    ]
                    .map(String::from)
                    .to_vec(),
                ),
                env: Some(env),
                ports: Some(vec![
                    tcp_port("listener-80", ENVOY_LISTENER_PORT),
                    tcp_port("http-monitoring", ENVOY_MONITORING_PORT),
                ]),
                readiness_probe: Some(http_probe(
                    "/ready",
                    ENVOY_ADMIN_PORT,
                    Timing(5, 10, 1, 1, 3),
                )),
                startup_probe: Some(http_probe(
                    "/ready",
                    ENVOY_ADMIN_PORT,
                    Timing(0, 1, 2, 1, 60),
                )),
                volume_mounts: Some(vec![VolumeMount {
                    name: "envoy-config".to_string(),
                    mount_path: "/etc/envoy".to_string(),
                    read_only: Some(true),
                    ..Default::default()
                }]),
                ..base
            }
        }
    }
}

/// Config (standard only), Deployment and Service for one gateway instance.
/// `upstream` is the serving Service and port the gateway forwards to.
pub fn simulator_gateway(
    root: &RootRef,
    name: &str,
    flavor: GatewayFlavor,
    cfg: &GatewayInstanceConfig,
    upstream: (&str, i32),
) -> Vec<ChildDescriptor> {
    let mut labels = string_map(&[
        (COMPONENT_LABEL, "gateway"),
        (APP_NAME_LABEL, root.name.as_str()),
    ]);
    let mut annotations = BTreeMap::new();
    if flavor == GatewayFlavor::Istio {
        labels.insert("llm-d.ai/gateway-type".into(), "istio".into());
        annotations.insert("sidecar.istio.io/inject".into(), "false".into());
    }
    // distinguishes the two instances of one root
    labels.insert("app".into(), name.to_string());

    let mut out = Vec::with_capacity(3);
    let mut volumes = Vec::new();
    if flavor == GatewayFlavor::Standard {
        out.push(ChildDescriptor::new(
            root,
            &root.namespace,
            name,
            labels.clone(),
            DesiredState::ConfigMap(ConfigMap {
                data: Some(BTreeMap::from([(
                    ENVOY_CONFIG_KEY.to_string(),
                    envoy_config(upstream.0, upstream.1),
                )])),
                ..Default::default()
            }),
        ));
        volumes.push(config_map_volume("envoy-config", name));
    }

    out.push(
        ChildDescriptor::new(
            root,
            &root.namespace,
            name,
            labels.clone(),
            DesiredState::Deployment(deployment(
                cfg.replicas,
                PodShape {
                    selector: labels.clone(),
                    labels: labels.clone(),
                    annotations,
                    containers: vec![container(flavor, cfg)],
                    volumes,
                    ..Default::default()
                },
            )),
        )
        .tracked(),
    );

    let target = match flavor {
        GatewayFlavor::Standard => ENVOY_LISTENER_PORT,
        GatewayFlavor::Istio => ISTIO_PROXY_PORT,
    };
    out.push(ChildDescriptor::new(
        root,
        &root.namespace,
        name,
        labels.clone(),
        DesiredState::Service(service(
            "ClusterIP",
            labels,
            vec![service_port("http", cfg.port, target)],
        )),
    ));
    out
}
