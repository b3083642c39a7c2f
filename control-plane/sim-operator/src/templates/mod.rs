//! Desired-state builders: pure functions from a defaulted spec to the
//! ordered list of children a root needs.

pub mod descriptor;
pub mod epp;
pub mod gateway;
pub mod manager;
pub mod names;
pub mod routing;
pub mod simulator;
pub mod traffic;
pub mod workload;

pub use descriptor::{Attachment, ChildDescriptor, DesiredState, RootRef};
pub use manager::DesiredStateBuilder;
