use kube::core::CustomResourceExt;
use sim_operator::crd::{SchedulerInstall, SimulatorDeployment};

fn main() {
    let crds = [SchedulerInstall::crd(), SimulatorDeployment::crd()];
    let docs: Vec<String> = crds
        .iter()
        .map(|crd| serde_yaml::to_string(crd).expect("serialize CRD to YAML"))
        .collect();
    println!("{}", docs.join("---\n"));
}
