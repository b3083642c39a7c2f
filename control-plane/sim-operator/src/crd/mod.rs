pub mod common;
pub mod scheduler_install;
pub mod simulator_deployment;

pub use common::{
    Condition, ConditionStatus, ConnectionPoolConfig, LoadBalancingConfig,
    RootStatus, READY_CONDITION,
};
pub use scheduler_install::{SchedulerInstall, SchedulerInstallSpec};
pub use simulator_deployment::{SimulatorDeployment, SimulatorDeploymentSpec};

use crate::resources::Kind;

pub const GROUP: &str = "sim.llm-d.io";
pub const VERSION: &str = "v1alpha1";
pub const API_VERSION: &str = "sim.llm-d.io/v1alpha1";

/// The two root kinds this operator reconciles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RootKind {
    SchedulerInstall,
    SimulatorDeployment,
}

impl RootKind {
    pub fn kind(&self) -> &'static str {
        match self {
            RootKind::SchedulerInstall => "SchedulerInstall",
            RootKind::SimulatorDeployment => "SimulatorDeployment",
        }
    }

    pub fn resource_kind(&self) -> Kind {
        match self {
            RootKind::SchedulerInstall => Kind::SchedulerInstall,
            RootKind::SimulatorDeployment => Kind::SimulatorDeployment,
        }
    }

    /// Label keys linking a child to its root: (name key, namespace key).
    pub fn link_label_keys(&self) -> (&'static str, &'static str) {
        match self {
            RootKind::SchedulerInstall => (
                "sim.llm-d.io/schedulerInstall",
                "sim.llm-d.io/schedulerNamespace",
            ),
            RootKind::SimulatorDeployment => (
                "sim.llm-d.io/simulatorDeployment",
                "sim.llm-d.io/simulatorNamespace",
            ),
        }
    }
}

impl std::fmt::Display for RootKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}
