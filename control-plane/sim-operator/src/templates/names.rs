//! Child names. Every name is derived from the root name and a role suffix
//! so two roots of the same kind never share a child identity.

pub fn epp(root: &str) -> String {
    format!("{root}-epp")
}

pub fn epp_config(epp: &str) -> String {
    format!("{epp}-config")
}

pub fn proxy(root: &str) -> String {
    format!("{root}-proxy")
}

pub fn gateway(root: &str) -> String {
    format!("{root}-gateway")
}

pub fn http_route(root: &str) -> String {
    format!("{root}-route")
}

pub fn reference_grant(root: &str) -> String {
    format!("{root}-allow-httproute")
}

pub fn destination_rule(service: &str) -> String {
    format!("{service}-lb")
}

pub fn sim_epp(root: &str) -> String {
    format!("{root}-sim-epp")
}

pub fn sim_proxy(root: &str) -> String {
    format!("{root}-sim-proxy")
}

pub fn sim_gateway(root: &str) -> String {
    format!("{root}-sim-gateway")
}

pub fn sim_gateway_istio(root: &str) -> String {
    format!("{root}-sim-gateway-istio")
}

pub fn stage(root: &str, stage: &str) -> String {
    format!("ms-sim-{root}-{stage}")
}

/// The single decode deployment used when no stage is enabled.
pub fn legacy_decode(root: &str) -> String {
    stage(root, "decode")
}
