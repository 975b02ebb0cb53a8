use log::warn;
use serde::Serialize;

use crate::{context::RunContext, error::StepError, host::Host};

mod cluster;
mod node;

pub use cluster::{parse_route_source, SMOKE_TEST_DEPLOYMENT};
pub use node::{comment_out_swap, CONFLICTING_PACKAGES, OS_EXPECTED_ID, OS_EXPECTED_VERSION};

/// A named unit of work. Every step can be re-run on a host where it
/// already succeeded without changing the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    CheckDistribution,
    DisableSwap,
    RemoveConflictingPackages,
    InstallPrerequisites,
    InstallKubernetesBinaries,
    ConfigureKernelAndSysctl,
    ConfigureCriShim,
    ConfigureKubeletRuntime,
    ConfigureContainerdConfig,
    InstallContainerd,
    StartCoreServices,
    InitControlPlane,
    InstallKubeconfig,
    InstallCni,
    WaitForNodesReady,
    CheckVersions,
    InstallMetricsServer,
    WaitForPodsRunning,
    RemoveControlPlaneTaint,
    SmokeTest,
}

impl Step {
    pub const fn name(self) -> &'static str {
        match self {
            Self::CheckDistribution => "check-distribution",
            Self::DisableSwap => "disable-swap",
            Self::RemoveConflictingPackages => "remove-conflicting-packages",
            Self::InstallPrerequisites => "install-prerequisites",
            Self::InstallKubernetesBinaries => "install-kubernetes-binaries",
            Self::ConfigureKernelAndSysctl => "configure-kernel-and-sysctl",
            Self::ConfigureCriShim => "configure-cri-shim",
            Self::ConfigureKubeletRuntime => "configure-kubelet-runtime",
            Self::ConfigureContainerdConfig => "configure-containerd-config",
            Self::InstallContainerd => "install-containerd",
            Self::StartCoreServices => "start-core-services",
            Self::InitControlPlane => "init-control-plane",
            Self::InstallKubeconfig => "install-kubeconfig",
            Self::InstallCni => "install-cni",
            Self::WaitForNodesReady => "wait-for-nodes-ready",
            Self::CheckVersions => "check-versions",
            Self::InstallMetricsServer => "install-metrics-server",
            Self::WaitForPodsRunning => "wait-for-pods-running",
            Self::RemoveControlPlaneTaint => "remove-control-plane-taint",
            Self::SmokeTest => "smoke-test",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::CheckDistribution => "Checking the host runs a supported Ubuntu release",
            Self::DisableSwap => "Disabling swap",
            Self::RemoveConflictingPackages => "Removing conflicting container packages",
            Self::InstallPrerequisites => "Installing apt prerequisites",
            Self::InstallKubernetesBinaries => "Installing kubelet, kubeadm and kubectl",
            Self::ConfigureKernelAndSysctl => "Loading kernel modules and applying sysctl settings",
            Self::ConfigureCriShim => "Pointing crictl at containerd",
            Self::ConfigureKubeletRuntime => "Pointing kubelet at containerd",
            Self::ConfigureContainerdConfig => "Writing the containerd configuration",
            Self::InstallContainerd => "Installing containerd",
            Self::StartCoreServices => "Starting containerd and enabling kubelet",
            Self::InitControlPlane => "Initializing the control plane",
            Self::InstallKubeconfig => "Installing the admin kubeconfig",
            Self::InstallCni => "Installing the CNI plugin",
            Self::WaitForNodesReady => "Waiting for nodes to become Ready",
            Self::CheckVersions => "Checking client and server versions",
            Self::InstallMetricsServer => "Installing metrics-server",
            Self::WaitForPodsRunning => "Waiting for pods to be Running",
            Self::RemoveControlPlaneTaint => "Allowing workloads on the control plane",
            Self::SmokeTest => "Running a smoke test deployment",
        }
    }

    pub async fn execute(self, context: &RunContext, host: &mut dyn Host) -> Result<(), StepError> {
        match self {
            Self::CheckDistribution => node::check_distribution(host).await,
            Self::DisableSwap => node::disable_swap(host).await,
            Self::RemoveConflictingPackages => node::remove_conflicting_packages(host).await,
            Self::InstallPrerequisites => node::install_prerequisites(host).await,
            Self::InstallKubernetesBinaries => {
                node::install_kubernetes_binaries(context, host).await
            }
            Self::ConfigureKernelAndSysctl => node::configure_kernel_and_sysctl(host).await,
            Self::ConfigureCriShim => node::configure_cri_shim(host).await,
            Self::ConfigureKubeletRuntime => node::configure_kubelet_runtime(host).await,
            Self::ConfigureContainerdConfig => node::configure_containerd_config(host).await,
            Self::InstallContainerd => node::install_containerd(context, host).await,
            Self::StartCoreServices => node::start_core_services(host).await,
            Self::InitControlPlane => cluster::init_control_plane(context, host).await,
            Self::InstallKubeconfig => cluster::install_kubeconfig(context, host).await,
            Self::InstallCni => cluster::install_cni(context, host).await,
            Self::WaitForNodesReady => cluster::wait_for_nodes_ready(host).await,
            Self::CheckVersions => cluster::check_versions(context, host).await,
            Self::InstallMetricsServer => cluster::install_metrics_server(context, host).await,
            Self::WaitForPodsRunning => cluster::wait_for_pods_running(host).await,
            Self::RemoveControlPlaneTaint => cluster::remove_control_plane_taint(host).await,
            Self::SmokeTest => cluster::smoke_test(host).await,
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Downgrades the failure of a fallible cleanup to a warning, on the console
/// and in the run log.
fn best_effort<T, E: std::fmt::Display>(
    host: &mut dyn Host,
    what: &str,
    result: Result<T, E>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            let message = format!("{what} failed, continuing anyway: {error}");

            warn!("{message}");

            if let Err(note_error) = host.note(&format!("# {message}")) {
                warn!("Couldn't record that in the run log! {note_error}");
            }

            None
        }
    }
}
