#![allow(dead_code)]

use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use sim_operator::config::OperatorConfig;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// DNS-1123 safe numeric suffix for unique names
pub const DIGITS: [char; 10] =
    ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];
pub fn uniq(prefix: &str) -> String {
    format!("{prefix}-{}", nanoid::nanoid!(6, &DIGITS))
}

pub fn test_config(ns: &str) -> OperatorConfig {
    let mut cfg = OperatorConfig::default();
    cfg.watch_namespace = Some(ns.to_string());
    cfg.requeue_secs = 5;
    cfg.error_requeue_secs = 2;
    cfg
}

pub async fn wait_for_deployment(ns: &str, name: &str, client: Client) -> Deployment {
    let dep_api: Api<Deployment> = Api::namespaced(client, ns);
    for _ in 0..60 {
        if let Ok(Some(d)) = dep_api.get_opt(name).await {
            return d;
        }
        tokio::time::sleep(Duration::from_millis(1000)).await;
    }
    panic!("deployment {}/{} not found in time", ns, name);
}

/// Poll `name` until `check` accepts it or ~60s pass.
pub async fn wait_until<K>(
    api: &Api<K>,
    name: &str,
    check: impl Fn(&K) -> bool,
) -> K
where
    K: Resource + Clone + DeserializeOwned + std::fmt::Debug,
{
    let mut last = None;
    for _ in 0..60 {
        if let Ok(Some(obj)) = api.get_opt(name).await {
            if check(&obj) {
                return obj;
            }
            last = Some(obj);
        }
        tokio::time::sleep(Duration::from_millis(1000)).await;
    }
    panic!("{name} did not reach the expected state; last seen: {last:?}");
}

// RAII guard: stops the controllers and deletes the root.
pub struct ControllerGuard<K>
where
    K: Resource + Clone + DeserializeOwned + std::fmt::Debug + Send + 'static,
{
    api: Api<K>,
    name: String,
    token: CancellationToken,
    ctrl: Option<JoinHandle<()>>,
}

impl<K> ControllerGuard<K>
where
    K: Resource + Clone + DeserializeOwned + std::fmt::Debug + Send + 'static,
{
    pub fn new(api: Api<K>, name: &str) -> Self {
        Self {
            api,
            name: name.to_string(),
            token: CancellationToken::new(),
            ctrl: None,
        }
    }

    pub fn spawn_controllers(mut self, client: Client, cfg: OperatorConfig) -> Self {
        let token = self.token.clone();
        self.ctrl = Some(tokio::spawn(async move {
            let _ = sim_operator::controller::run_controllers(client, cfg, token).await;
        }));
        self
    }
}

impl<K> Drop for ControllerGuard<K>
where
    K: Resource + Clone + DeserializeOwned + std::fmt::Debug + Send + 'static,
{
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(ref handle) = self.ctrl {
            handle.abort();
        }
        let api = self.api.clone();
        let name = self.name.clone();
        let _ = tokio::spawn(async move {
            let _ = api.delete(&name, &Default::default()).await;
        });
    }
}
