#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::capability::Capabilities;
    use crate::controller::merge::{merge_existing, merge_value, render};
    use crate::controller::test_support::root;
    use crate::crd::scheduler_install::{
        InferencePoolRef, SchedulerEppConfig, SchedulerRoutingConfig,
    };
    use crate::crd::{RootKind, SchedulerInstallSpec, SimulatorDeploymentSpec};
    use crate::defaults::{
        BACKEND_INFERENCE_POOL, default_scheduler_install,
        default_simulator_deployment,
    };
    use crate::resources::Kind;
    use crate::templates::{ChildDescriptor, DesiredState, DesiredStateBuilder};

    fn install_children() -> Vec<ChildDescriptor> {
        let spec = SchedulerInstallSpec {
            simulator_namespace: "sim".into(),
            epp: Some(SchedulerEppConfig {
                enabled: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        let r = root(RootKind::SchedulerInstall, "demo");
        default_scheduler_install("demo", "default", &spec)
            .build(&r, &Capabilities::all())
    }

    fn child(kind: Kind) -> ChildDescriptor {
        install_children()
            .into_iter()
            .find(|d| d.key.kind == kind && d.key.namespace == "default")
            .or_else(|| install_children().into_iter().find(|d| d.key.kind == kind))
            .unwrap()
    }

    #[test]
    fn owned_children_carry_an_owner_reference() {
        let obj = render(&child(Kind::Deployment)).unwrap();
        let owners = obj.metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "SchedulerInstall");
        assert_eq!(owners[0].uid, "uid-demo");
        assert_eq!(owners[0].controller, Some(true));
        assert_eq!(obj.metadata.namespace.as_deref(), Some("default"));
        assert_eq!(obj.data["spec"]["replicas"], 1);
    }

    #[test]
    fn cross_namespace_children_are_label_linked() {
        let obj = render(&child(Kind::Role)).unwrap();
        assert!(obj.metadata.owner_references.is_none());
        let labels = obj.metadata.labels.unwrap();
        assert_eq!(labels["sim.llm-d.io/schedulerInstall"], "demo");
        assert_eq!(labels["sim.llm-d.io/schedulerNamespace"], "default");
        assert_eq!(labels["app.kubernetes.io/name"], "demo");
        assert_eq!(obj.data["rules"][0]["verbs"], json!(["get", "list", "watch"]));
    }

    #[test]
    fn rendered_object_is_already_converged() {
        for desc in install_children() {
            let obj = render(&desc).unwrap();
            assert!(
                merge_existing(&obj, &desc).unwrap().is_none(),
                "{} should be converged",
                desc.key
            );
        }
    }

    #[test]
    fn server_filled_fields_do_not_cause_writes() {
        let desc = child(Kind::Deployment);
        let mut current = render(&desc).unwrap();
        current.metadata.resource_version = Some("7".into());
        current.data["spec"]["strategy"] = json!({"type": "RollingUpdate"});
        let container = &mut current.data["spec"]["template"]["spec"]["containers"][0];
        container["terminationMessagePath"] = json!("/dev/termination-log");
        container["ports"][0]["hostPort"] = json!(0);
        current.data["status"] = json!({"readyReplicas": 1});

        assert!(merge_existing(&current, &desc).unwrap().is_none());

        let svc = child(Kind::Service);
        let mut current = render(&svc).unwrap();
        current.data["spec"]["clusterIP"] = json!("10.0.0.12");
        current.data["spec"]["ports"][0]["nodePort"] = json!(31000);
        assert!(merge_existing(&current, &svc).unwrap().is_none());
    }

    #[test]
    fn drift_is_corrected_and_foreign_fields_survive() {
        let desc = child(Kind::Deployment);
        let mut current = render(&desc).unwrap();
        current.metadata.resource_version = Some("3".into());
        current.data["spec"]["replicas"] = json!(5);
        current
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert("team".into(), "serving".into());
        current.metadata.annotations = Some(
            [("deployment.kubernetes.io/revision".to_string(), "2".to_string())]
                .into(),
        );

        let next = merge_existing(&current, &desc).unwrap().unwrap();
        assert_eq!(next.data["spec"]["replicas"], 1);
        assert_eq!(next.metadata.resource_version.as_deref(), Some("3"));
        assert_eq!(next.metadata.labels.as_ref().unwrap()["team"], "serving");
        assert!(next.metadata.annotations.is_some());
    }

    #[test]
    fn deployment_selector_is_never_rewritten() {
        let desc = child(Kind::Deployment);
        let mut current = render(&desc).unwrap();
        current.data["spec"]["selector"] = json!({"matchLabels": {"app": "legacy"}});
        assert!(merge_existing(&current, &desc).unwrap().is_none());
    }

    #[test]
    fn service_selector_is_replaced_wholesale() {
        let desc = install_children()
            .into_iter()
            .find(|d| d.key.name == "demo-proxy")
            .unwrap();
        let mut current = render(&desc).unwrap();
        current.data["spec"]["selector"]["stale"] = json!("yes");
        let next = merge_existing(&current, &desc).unwrap().unwrap();
        assert!(next.data["spec"]["selector"].get("stale").is_none());
        assert_eq!(next.data["spec"]["selector"]["llm-d.ai/role"], "decode");
    }

    #[test]
    fn named_lists_merge_by_name_and_drop_unknown_entries() {
        let mut current = json!([
            {"name": "b", "value": "old", "extra": true},
            {"name": "stale", "value": "x"},
        ]);
        let desired = json!([{"name": "a", "value": "1"}, {"name": "b", "value": "2"}]);
        assert!(merge_value(&mut current, &desired));
        assert_eq!(
            current,
            json!([
                {"name": "a", "value": "1"},
                {"name": "b", "value": "2", "extra": true},
            ])
        );
        assert!(!merge_value(&mut current, &desired));
    }

    #[test]
    fn scalar_lists_are_replaced() {
        let mut current = json!({"args": ["--a", "--b"]});
        assert!(merge_value(&mut current, &json!({"args": ["--a"]})));
        assert_eq!(current, json!({"args": ["--a"]}));
    }

    fn decode_deployment(spec: &SimulatorDeploymentSpec) -> ChildDescriptor {
        let r = root(RootKind::SimulatorDeployment, "llm");
        default_simulator_deployment("llm", spec)
            .build(&r, &Capabilities::all())
            .into_iter()
            .find(|d| d.key.kind == Kind::Deployment && d.key.name == "ms-sim-llm-decode")
            .unwrap()
    }

    #[test]
    fn dropped_container_resources_are_cleared() {
        let with_limits = SimulatorDeploymentSpec {
            resources: Some(
                serde_json::from_value(json!({"limits": {"cpu": "2"}})).unwrap(),
            ),
            ..Default::default()
        };
        let mut current = render(&decode_deployment(&with_limits)).unwrap();
        let container = &mut current.data["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(container["resources"]["limits"]["cpu"], "2");
        container["terminationMessagePath"] = json!("/dev/termination-log");

        let desc = decode_deployment(&SimulatorDeploymentSpec::default());
        let next = merge_existing(&current, &desc).unwrap().unwrap();
        let container = &next.data["spec"]["template"]["spec"]["containers"][0];
        assert!(container.get("resources").is_none());
        assert_eq!(container["terminationMessagePath"], "/dev/termination-log");
        assert!(merge_existing(&next, &desc).unwrap().is_none());
    }

    #[test]
    fn narrowed_resources_replace_the_old_block() {
        let spec = |res: serde_json::Value| SimulatorDeploymentSpec {
            resources: Some(serde_json::from_value(res).unwrap()),
            ..Default::default()
        };
        let current = render(&decode_deployment(&spec(json!({
            "limits": {"cpu": "2", "memory": "1Gi"},
        }))))
        .unwrap();
        let desc = decode_deployment(&spec(json!({"limits": {"cpu": "1"}})));
        let next = merge_existing(&current, &desc).unwrap().unwrap();
        assert_eq!(
            next.data["spec"]["template"]["spec"]["containers"][0]["resources"],
            json!({"limits": {"cpu": "1"}})
        );
    }

    fn pool_route(port: i32) -> ChildDescriptor {
        let spec = SchedulerInstallSpec {
            simulator_namespace: "sim".into(),
            routing: Some(SchedulerRoutingConfig {
                enabled: true,
                backend_type: BACKEND_INFERENCE_POOL.into(),
                inference_pool: Some(InferencePoolRef {
                    port,
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let r = root(RootKind::SchedulerInstall, "demo");
        default_scheduler_install("demo", "default", &spec)
            .build(&r, &Capabilities::all())
            .into_iter()
            .find(|d| d.key.kind == Kind::HttpRoute)
            .unwrap()
    }

    #[test]
    fn unset_backend_port_is_removed_from_the_route() {
        let current = render(&pool_route(8000)).unwrap();
        let backend = &current.data["spec"]["rules"][0]["backendRefs"][0];
        assert_eq!(backend["port"], 8000);

        let next = merge_existing(&current, &pool_route(0)).unwrap().unwrap();
        let backend = &next.data["spec"]["rules"][0]["backendRefs"][0];
        assert!(backend.get("port").is_none());
        assert_eq!(backend["kind"], "InferencePool");
        assert_eq!(next.data["spec"]["rules"][0]["timeouts"]["request"], "0s");
    }

    #[test]
    fn pod_template_annotations_follow_the_desired_body() {
        let desc = child(Kind::Deployment);
        let mut annotated = desc.clone();
        if let DesiredState::Deployment(d) = &mut annotated.desired {
            let template = &mut d.spec.as_mut().unwrap().template;
            template.metadata.get_or_insert_with(Default::default).annotations =
                Some([("sim.llm-d.io/config-hash".to_string(), "abc".to_string())].into());
        }
        let current = render(&annotated).unwrap();
        assert_eq!(
            current.data["spec"]["template"]["metadata"]["annotations"]["sim.llm-d.io/config-hash"],
            "abc"
        );

        let next = merge_existing(&current, &desc).unwrap().unwrap();
        assert!(
            next.data["spec"]["template"]["metadata"]
                .get("annotations")
                .is_none()
        );
        assert!(next.data["spec"]["template"]["spec"].get("volumes").is_some());
    }
}
