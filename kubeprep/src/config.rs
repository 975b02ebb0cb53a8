use std::{
    fs::File,
    path::{Path, PathBuf},
};

use ipnet::Ipv4Net;
use log::debug;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionConfigError {
    #[error("Io error: {}", .0)]
    IoError(std::io::Error),
    #[error("Deserialization error: {}", .0)]
    DeserializationError(serde_yaml::Error),
}

/// Optional overrides read from `--config`. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ProvisionConfig {
    pub kubernetes_version: Option<String>,
    pub containerd_version: Option<String>,
    pub pod_subnet: Option<Ipv4Net>,
    pub api_server_port: Option<u16>,
    pub cni_operator_manifest: Option<String>,
    pub cni_resources_manifest: Option<String>,
    pub metrics_server_manifest: Option<String>,
    pub secondary_user: Option<String>,
    pub work_dir: Option<PathBuf>,
}

impl ProvisionConfig {
    pub fn load(path: &Path) -> Result<Self, ProvisionConfigError> {
        debug!("Used config path: {path:?}");

        let file = File::open(path).map_err(ProvisionConfigError::IoError)?;
        let config: Option<ProvisionConfig> =
            serde_yaml::from_reader(file).map_err(ProvisionConfigError::DeserializationError)?;

        Ok(config.unwrap_or_default())
    }

    pub fn load_optional(path: Option<&Path>) -> Result<Self, ProvisionConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::ProvisionConfig;

    #[test]
    fn loads_partial_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "kubernetesVersion: 1.30.4\npodSubnet: 10.244.0.0/16").unwrap();

        let config = ProvisionConfig::load(file.path()).unwrap();

        assert_eq!(config.kubernetes_version.as_deref(), Some("1.30.4"));
        assert_eq!(config.pod_subnet.unwrap().to_string(), "10.244.0.0/16");
        assert_eq!(config.secondary_user, None);
    }

    #[test]
    fn empty_file_means_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();

        let config = ProvisionConfig::load(file.path()).unwrap();

        assert!(config.kubernetes_version.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "kubernetesVersoin: 1.30.4").unwrap();

        assert!(ProvisionConfig::load(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(ProvisionConfig::load(std::path::Path::new("/nonexistent/kubeprep.yaml")).is_err());
    }
}
