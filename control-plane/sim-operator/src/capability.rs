//! Capability gate for optional resource kinds.
//!
//! Gateway API and Istio kinds are only usable when their CRDs are installed.
//! The gate asks an injected discovery collaborator and resolves the answer
//! into a plain [`Capabilities`] value before the builder runs, so building
//! stays free of I/O. [`CachedDiscovery`] keeps answers for a short TTL so a
//! steady stream of passes does not query the API server each time.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use kube::Client;
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

#[cfg(test)]
use mockall::automock;

use crate::resources::Kind;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait KindDiscovery: Send + Sync {
    /// Whether the API server serves `kind` at the version this operator writes.
    async fn is_served(&self, kind: Kind) -> bool;
}

/// Discovery backed by the API server's group/version resource lists.
pub struct KubeDiscovery {
    client: Client,
}

impl KubeDiscovery {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KindDiscovery for KubeDiscovery {
    async fn is_served(&self, kind: Kind) -> bool {
        let gvk = kind.gvk();
        match kube::discovery::oneshot::pinned_kind(&self.client, &gvk).await
        {
            Ok(_) => true,
            Err(kube::Error::Discovery(e)) => {
                debug!(%kind, error = %e, "kind not served");
                false
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                debug!(%kind, "api group/version not served");
                false
            }
            Err(e) => {
                // Unknown state: let the write surface the real error.
                warn!(%kind, error = %e, "discovery failed; assuming kind is served");
                true
            }
        }
    }
}

/// Remembers each answer of `inner` for `ttl`. A zero TTL disables caching.
pub struct CachedDiscovery {
    inner: Arc<dyn KindDiscovery>,
    ttl: Duration,
    answers: RwLock<HashMap<Kind, (bool, Instant)>>,
}

impl CachedDiscovery {
    pub fn new(inner: Arc<dyn KindDiscovery>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            answers: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl KindDiscovery for CachedDiscovery {
    async fn is_served(&self, kind: Kind) -> bool {
        let cached = self.answers.read().await.get(&kind).copied();
        if let Some((served, at)) = cached {
            if at.elapsed() < self.ttl {
                trace!(%kind, served, "discovery answer from cache");
                return served;
            }
        }
        let served = self.inner.is_served(kind).await;
        let mut w = self.answers.write().await;
        w.insert(kind, (served, Instant::now()));
        served
    }
}

#[derive(Clone, Default)]
pub struct CapabilityGate {
    discovery: Option<Arc<dyn KindDiscovery>>,
}

impl CapabilityGate {
    pub fn new(discovery: Arc<dyn KindDiscovery>) -> Self {
        Self {
            discovery: Some(discovery),
        }
    }

    /// A gate without discovery treats every kind as supported.
    pub fn fail_open() -> Self {
        Self { discovery: None }
    }

    pub async fn supported(&self, kind: Kind) -> bool {
        if !kind.is_optional() {
            return true;
        }
        match self.discovery.as_ref() {
            Some(d) => d.is_served(kind).await,
            None => true,
        }
    }

    /// Query every optional kind once.
    pub async fn resolve(&self) -> Capabilities {
        let mut missing = BTreeSet::new();
        for kind in Kind::OPTIONAL {
            if !self.supported(kind).await {
                missing.insert(kind);
            }
        }
        Capabilities { missing }
    }
}

/// Resolved capability answers handed to the desired-state builder.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    missing: BTreeSet<Kind>,
}

impl Capabilities {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn without(kinds: impl IntoIterator<Item = Kind>) -> Self {
        Self {
            missing: kinds.into_iter().collect(),
        }
    }

    pub fn supports(&self, kind: Kind) -> bool {
        !self.missing.contains(&kind)
    }

    pub fn missing(&self) -> impl Iterator<Item = Kind> + '_ {
        self.missing.iter().copied()
    }
}
