use std::net::IpAddr;

use ipnet::Ipv4Net;
use serde::Serialize;

use crate::{context::RunContext, error::StepError};

pub const KUBERNETES_APT_SOURCE_PATH: &str = "/etc/apt/sources.list.d/kubernetes.list";
pub const KUBERNETES_APT_KEYRING_PATH: &str = "/etc/apt/keyrings/kubernetes-apt-keyring.gpg";
pub const APT_KEYRINGS_DIR: &str = "/etc/apt/keyrings";
pub const MODULES_LOAD_PATH: &str = "/etc/modules-load.d/containerd.conf";
pub const SYSCTL_PATH: &str = "/etc/sysctl.d/99-kubernetes-cri.conf";
pub const CRICTL_CONFIG_PATH: &str = "/etc/crictl.yaml";
pub const KUBELET_DEFAULTS_PATH: &str = "/etc/default/kubelet";
pub const CONTAINERD_CONFIG_PATH: &str = "/etc/containerd/config.toml";
pub const KUBEADM_CONFIG_FILENAME: &str = "kubeadm-config.yaml";

pub const KERNEL_MODULES: [&str; 2] = ["overlay", "br_netfilter"];

pub const MODULES_LOAD: &str = include_str!("../assets/containerd.conf");
pub const SYSCTL: &str = include_str!("../assets/99-kubernetes-cri.conf");
pub const CRICTL_CONFIG: &str = include_str!("../assets/crictl.yaml");
pub const KUBELET_DEFAULTS: &str = include_str!("../assets/kubelet.env");
pub const CONTAINERD_CONFIG: &str = include_str!("../assets/containerd-config.toml");

const KUBEADM_API_VERSION: &str = "kubeadm.k8s.io/v1beta3";

pub fn kubernetes_apt_repository(context: &RunContext) -> String {
    format!(
        "https://pkgs.k8s.io/core:/stable:/{}/deb/",
        context.kubernetes_minor()
    )
}

pub fn kubernetes_apt_source(context: &RunContext) -> String {
    format!(
        "deb [signed-by={KUBERNETES_APT_KEYRING_PATH}] {} /\n",
        kubernetes_apt_repository(context)
    )
}

pub fn kubernetes_release_key_url(context: &RunContext) -> String {
    format!("{}Release.key", kubernetes_apt_repository(context))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClusterConfiguration {
    api_version: &'static str,
    kind: &'static str,
    kubernetes_version: String,
    control_plane_endpoint: String,
    networking: Networking,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Networking {
    pod_subnet: Ipv4Net,
}

pub fn kubeadm_config(context: &RunContext, host_ip: IpAddr) -> Result<String, StepError> {
    let endpoint = match host_ip {
        IpAddr::V4(ip) => format!("{ip}:{}", context.api_server_port),
        IpAddr::V6(ip) => format!("[{ip}]:{}", context.api_server_port),
    };

    let config = ClusterConfiguration {
        api_version: KUBEADM_API_VERSION,
        kind: "ClusterConfiguration",
        kubernetes_version: context.expected_server_version(),
        control_plane_endpoint: endpoint,
        networking: Networking {
            pod_subnet: context.pod_subnet,
        },
    };

    serde_yaml::to_string(&config).map_err(|e| StepError::Template(KUBEADM_CONFIG_FILENAME, e))
}
