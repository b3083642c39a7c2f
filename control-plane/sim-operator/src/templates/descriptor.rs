use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

use crate::crd::{API_VERSION, RootKind};
use crate::resources::gateway_api::{
    GatewaySpec, HttpRouteSpec, ReferenceGrantSpec,
};
use crate::resources::istio::DestinationRuleSpec;
use crate::resources::{Kind, ObjectKey};

/// Identity of the root a set of children is built for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootRef {
    pub kind: RootKind,
    pub name: String,
    pub namespace: String,
    pub uid: String,
}

impl RootRef {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(
            self.kind.resource_kind(),
            self.namespace.clone(),
            self.name.clone(),
        )
    }

    pub fn owner_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: API_VERSION.to_string(),
            kind: self.kind.kind().to_string(),
            name: self.name.clone(),
            uid: self.uid.clone(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }

    pub fn link_labels(&self) -> BTreeMap<String, String> {
        let (name_key, ns_key) = self.kind.link_label_keys();
        BTreeMap::from([
            (name_key.to_string(), self.name.clone()),
            (ns_key.to_string(), self.namespace.clone()),
        ])
    }

    /// Label selector matching every cross-namespace child of this root.
    pub fn link_selector(&self) -> String {
        self.link_labels()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Owner references cannot cross namespaces; anything outside the root
    /// namespace is linked by labels instead.
    pub fn attachment_for(&self, namespace: &str) -> Attachment {
        if namespace == self.namespace {
            Attachment::Owned(self.owner_reference())
        } else {
            Attachment::CrossNamespace(self.link_labels())
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Attachment {
    /// Same namespace: garbage collected with the root.
    Owned(OwnerReference),
    /// Other namespace: linked by labels only.
    CrossNamespace(BTreeMap<String, String>),
}

impl Attachment {
    pub fn is_owned(&self) -> bool {
        matches!(self, Attachment::Owned(_))
    }
}

/// Typed desired body of one child. Serialized only when it is written.
#[derive(Clone, Debug, PartialEq)]
pub enum DesiredState {
    ServiceAccount(ServiceAccount),
    Role(Role),
    RoleBinding(RoleBinding),
    ConfigMap(ConfigMap),
    Deployment(Deployment),
    Service(Service),
    Gateway(GatewaySpec),
    HttpRoute(HttpRouteSpec),
    ReferenceGrant(ReferenceGrantSpec),
    DestinationRule(DestinationRuleSpec),
}

impl DesiredState {
    pub fn kind(&self) -> Kind {
        match self {
            DesiredState::ServiceAccount(_) => Kind::ServiceAccount,
            DesiredState::Role(_) => Kind::Role,
            DesiredState::RoleBinding(_) => Kind::RoleBinding,
            DesiredState::ConfigMap(_) => Kind::ConfigMap,
            DesiredState::Deployment(_) => Kind::Deployment,
            DesiredState::Service(_) => Kind::Service,
            DesiredState::Gateway(_) => Kind::Gateway,
            DesiredState::HttpRoute(_) => Kind::HttpRoute,
            DesiredState::ReferenceGrant(_) => Kind::ReferenceGrant,
            DesiredState::DestinationRule(_) => Kind::DestinationRule,
        }
    }
}

/// One managed child: identity, lifecycle link and desired body.
#[derive(Clone, Debug, PartialEq)]
pub struct ChildDescriptor {
    pub key: ObjectKey,
    pub attachment: Attachment,
    /// Labels this operator owns on the child's metadata.
    pub labels: BTreeMap<String, String>,
    pub desired: DesiredState,
    /// Workloads whose readiness feeds the root's Ready condition.
    pub tracked: bool,
}

impl ChildDescriptor {
    pub fn new(
        root: &RootRef,
        namespace: &str,
        name: &str,
        labels: BTreeMap<String, String>,
        desired: DesiredState,
    ) -> Self {
        Self {
            key: ObjectKey::new(desired.kind(), namespace, name),
            attachment: root.attachment_for(namespace),
            labels,
            desired,
            tracked: false,
        }
    }

    pub fn tracked(mut self) -> Self {
        self.tracked = true;
        self
    }

    /// Operator-owned labels plus link labels for cross-namespace children.
    pub fn managed_labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.labels.clone();
        if let Attachment::CrossNamespace(link) = &self.attachment {
            labels.extend(link.clone());
        }
        labels
    }
}
