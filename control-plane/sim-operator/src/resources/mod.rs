//! Kinds this operator reads or writes, and typed bodies for the
//! third-party kinds that have no k8s-openapi representation.

pub mod gateway_api;
pub mod istio;

use kube::core::{ApiResource, GroupVersionKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    ServiceAccount,
    Role,
    RoleBinding,
    ConfigMap,
    Deployment,
    Service,
    Gateway,
    HttpRoute,
    ReferenceGrant,
    DestinationRule,
    SchedulerInstall,
    SimulatorDeployment,
}

impl Kind {
    /// Kinds that may be missing from a cluster and must pass the capability gate.
    pub const OPTIONAL: [Kind; 4] = [
        Kind::Gateway,
        Kind::HttpRoute,
        Kind::ReferenceGrant,
        Kind::DestinationRule,
    ];

    pub fn gvk(&self) -> GroupVersionKind {
        let (group, version, kind) = match self {
            Kind::ServiceAccount => ("", "v1", "ServiceAccount"),
            Kind::Role => ("rbac.authorization.k8s.io", "v1", "Role"),
            Kind::RoleBinding => {
                ("rbac.authorization.k8s.io", "v1", "RoleBinding")
            }
            Kind::ConfigMap => ("", "v1", "ConfigMap"),
            Kind::Deployment => ("apps", "v1", "Deployment"),
            Kind::Service => ("", "v1", "Service"),
            Kind::Gateway => ("gateway.networking.k8s.io", "v1", "Gateway"),
            Kind::HttpRoute => {
                ("gateway.networking.k8s.io", "v1", "HTTPRoute")
            }
            Kind::ReferenceGrant => {
                ("gateway.networking.k8s.io", "v1beta1", "ReferenceGrant")
            }
            Kind::DestinationRule => {
                ("networking.istio.io", "v1beta1", "DestinationRule")
            }
            Kind::SchedulerInstall => {
                (crate::crd::GROUP, crate::crd::VERSION, "SchedulerInstall")
            }
            Kind::SimulatorDeployment => (
                crate::crd::GROUP,
                crate::crd::VERSION,
                "SimulatorDeployment",
            ),
        };
        GroupVersionKind::gvk(group, version, kind)
    }

    pub fn plural(&self) -> &'static str {
        match self {
            Kind::ServiceAccount => "serviceaccounts",
            Kind::Role => "roles",
            Kind::RoleBinding => "rolebindings",
            Kind::ConfigMap => "configmaps",
            Kind::Deployment => "deployments",
            Kind::Service => "services",
            Kind::Gateway => "gateways",
            Kind::HttpRoute => "httproutes",
            Kind::ReferenceGrant => "referencegrants",
            Kind::DestinationRule => "destinationrules",
            Kind::SchedulerInstall => "schedulerinstalls",
            Kind::SimulatorDeployment => "simulatordeployments",
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk_with_plural(&self.gvk(), self.plural())
    }

    pub fn is_optional(&self) -> bool {
        Self::OPTIONAL.contains(self)
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.gvk().kind)
    }
}

/// Identity of one stored object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub kind: Kind,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(
        kind: Kind,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_resources_match_cluster_paths() {
        let ar = Kind::ReferenceGrant.api_resource();
        assert_eq!(ar.api_version, "gateway.networking.k8s.io/v1beta1");
        assert_eq!(ar.plural, "referencegrants");

        let ar = Kind::ServiceAccount.api_resource();
        assert_eq!(ar.api_version, "v1");
        assert_eq!(ar.group, "");

        let ar = Kind::SimulatorDeployment.api_resource();
        assert_eq!(ar.api_version, "sim.llm-d.io/v1alpha1");
        assert_eq!(ar.kind, "SimulatorDeployment");
    }

    #[test]
    fn only_extension_kinds_are_optional() {
        assert!(Kind::HttpRoute.is_optional());
        assert!(Kind::DestinationRule.is_optional());
        assert!(!Kind::Deployment.is_optional());
        assert!(!Kind::RoleBinding.is_optional());
    }
}
