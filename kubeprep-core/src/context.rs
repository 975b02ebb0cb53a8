use std::path::PathBuf;

use derive_builder::Builder;
use ipnet::Ipv4Net;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::role::NodeRole;

pub const DEFAULT_KUBERNETES_VERSION: &str = "1.31.1";
pub const DEFAULT_CONTAINERD_VERSION: &str = "1.7.*";
pub const DEFAULT_POD_SUBNET: &str = "192.168.0.0/16";
pub const DEFAULT_API_SERVER_PORT: u16 = 6443;
pub const DEFAULT_CNI_OPERATOR_MANIFEST: &str =
    "https://raw.githubusercontent.com/projectcalico/calico/v3.28.1/manifests/tigera-operator.yaml";
pub const DEFAULT_CNI_RESOURCES_MANIFEST: &str =
    "https://raw.githubusercontent.com/projectcalico/calico/v3.28.1/manifests/custom-resources.yaml";
pub const DEFAULT_METRICS_SERVER_MANIFEST: &str =
    "https://github.com/kubernetes-sigs/metrics-server/releases/latest/download/components.yaml";
pub const DEFAULT_SECONDARY_USER: &str = "ubuntu";

static KUBERNETES_VERSION_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)$").unwrap());

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("'{}' is not a valid kubernetes version! Expected MAJOR.MINOR.PATCH, e.g. 1.31.1", .0)]
    InvalidKubernetesVersion(String),
    #[error("API server port can't be 0!")]
    InvalidApiServerPort,
}

/// Everything a run needs to know, resolved once before the first step.
#[derive(Debug, Clone, Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct RunContext {
    #[builder(default)]
    pub role: NodeRole,
    #[builder(default = "DEFAULT_KUBERNETES_VERSION.to_owned()")]
    pub kubernetes_version: String,
    #[builder(default = "DEFAULT_CONTAINERD_VERSION.to_owned()")]
    pub containerd_version: String,
    #[builder(default = "DEFAULT_POD_SUBNET.parse().unwrap()")]
    pub pod_subnet: Ipv4Net,
    #[builder(default = "DEFAULT_API_SERVER_PORT")]
    pub api_server_port: u16,
    #[builder(default = "DEFAULT_CNI_OPERATOR_MANIFEST.to_owned()")]
    pub cni_operator_manifest: String,
    #[builder(default = "DEFAULT_CNI_RESOURCES_MANIFEST.to_owned()")]
    pub cni_resources_manifest: String,
    #[builder(default = "DEFAULT_METRICS_SERVER_MANIFEST.to_owned()")]
    pub metrics_server_manifest: String,
    #[builder(default = "DEFAULT_SECONDARY_USER.to_owned()")]
    pub secondary_user: String,
    #[builder(default = "PathBuf::from(\".\")")]
    pub work_dir: PathBuf,
    #[builder(default)]
    pub verbose: bool,
    pub log_path: PathBuf,
}

impl RunContextBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(version) = &self.kubernetes_version {
            if !KUBERNETES_VERSION_FORMAT.is_match(version) {
                return Err(ContextError::InvalidKubernetesVersion(version.clone()).to_string());
            }
        }

        if let Some(0) = self.api_server_port {
            return Err(ContextError::InvalidApiServerPort.to_string());
        }

        Ok(())
    }
}

impl RunContext {
    /// `v1.31` for `1.31.1`, used to pick the package repository.
    pub fn kubernetes_minor(&self) -> String {
        let mut parts = self.kubernetes_version.splitn(3, '.');
        let major = parts.next().unwrap_or_default();
        let minor = parts.next().unwrap_or_default();

        format!("v{major}.{minor}")
    }

    /// The `gitVersion` the API server is expected to report after init.
    pub fn expected_server_version(&self) -> String {
        format!("v{}", self.kubernetes_version)
    }

    /// Package version glob handed to apt, matching any revision of the release.
    pub fn kubernetes_package_version(&self) -> String {
        format!("{}-*", self.kubernetes_version)
    }

    pub fn bootstrap_config_path(&self) -> PathBuf {
        self.work_dir.join(crate::templates::KUBEADM_CONFIG_FILENAME)
    }
}
