use crate::{role::NodeRole, steps::Step};

pub const NODE_PREPARATION: [Step; 11] = [
    Step::CheckDistribution,
    Step::DisableSwap,
    Step::RemoveConflictingPackages,
    Step::InstallPrerequisites,
    Step::InstallKubernetesBinaries,
    Step::ConfigureKernelAndSysctl,
    Step::ConfigureCriShim,
    Step::ConfigureKubeletRuntime,
    Step::ConfigureContainerdConfig,
    Step::InstallContainerd,
    Step::StartCoreServices,
];

pub const CONTROL_PLANE_SETUP: [Step; 7] = [
    Step::InitControlPlane,
    Step::InstallKubeconfig,
    Step::InstallCni,
    Step::WaitForNodesReady,
    Step::CheckVersions,
    Step::InstallMetricsServer,
    Step::WaitForPodsRunning,
];

pub const SINGLE_NODE_EXTRAS: [Step; 2] = [Step::RemoveControlPlaneTaint, Step::SmokeTest];

/// The ordered steps a role runs.
pub fn plan_for(role: NodeRole) -> Vec<Step> {
    match role {
        NodeRole::Worker => NODE_PREPARATION.to_vec(),
        NodeRole::ControlPlane => [&NODE_PREPARATION[..], &CONTROL_PLANE_SETUP[..]].concat(),
        NodeRole::SingleNode => [
            &NODE_PREPARATION[..],
            &CONTROL_PLANE_SETUP[..],
            &SINGLE_NODE_EXTRAS[..],
        ]
        .concat(),
    }
}
