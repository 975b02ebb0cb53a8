use std::{io, path::Path, process::ExitCode};

use anyhow::Context;
use kubeprep_core::{
    context::{RunContext, RunContextBuilder},
    error::ProvisionError,
    host::SystemHost,
    logsink::LogSink,
    provision::{provision_and_release, shutdown_signal},
};
use log::debug;

use crate::{cli::Cli, config::ProvisionConfig};

pub async fn run_provisioning(cli: &Cli) -> anyhow::Result<ExitCode> {
    let config = ProvisionConfig::load_optional(cli.config.as_deref())
        .context("Couldn't load the configuration file!")?;
    let sink = LogSink::open().map_err(ProvisionError::LogSink)?;
    let context = build_context(cli, config, sink.path())?;
    let mut host = SystemHost::new(sink.writer().map_err(ProvisionError::LogSink)?);

    debug!("{context:#?}");

    let result = provision_and_release(
        &context,
        &mut host,
        sink,
        shutdown_signal(),
        &mut io::stderr(),
    )
    .await;

    Ok(match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    })
}

/// Defaults, then the config file, then flags.
pub fn build_context(
    cli: &Cli,
    config: ProvisionConfig,
    log_path: &Path,
) -> anyhow::Result<RunContext> {
    let mut builder = RunContextBuilder::default();

    builder
        .role(cli.role())
        .verbose(cli.verbose_logging || cli.trace_logging)
        .log_path(log_path.to_owned());

    if let Some(version) = cli.kubernetes_version.clone().or(config.kubernetes_version) {
        builder.kubernetes_version(version);
    }

    if let Some(version) = cli.containerd_version.clone().or(config.containerd_version) {
        builder.containerd_version(version);
    }

    if let Some(subnet) = cli.pod_subnet.or(config.pod_subnet) {
        builder.pod_subnet(subnet);
    }

    if let Some(port) = cli.api_server_port.or(config.api_server_port) {
        builder.api_server_port(port);
    }

    if let Some(url) = cli.cni_operator_manifest.clone().or(config.cni_operator_manifest) {
        builder.cni_operator_manifest(url);
    }

    if let Some(url) = cli.cni_resources_manifest.clone().or(config.cni_resources_manifest) {
        builder.cni_resources_manifest(url);
    }

    if let Some(url) = cli
        .metrics_server_manifest
        .clone()
        .or(config.metrics_server_manifest)
    {
        builder.metrics_server_manifest(url);
    }

    if let Some(user) = cli.secondary_user.clone().or(config.secondary_user) {
        builder.secondary_user(user);
    }

    if let Some(dir) = cli.work_dir.clone().or(config.work_dir) {
        builder.work_dir(dir);
    }

    builder
        .build()
        .context("Invalid provisioning settings!")
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use clap::Parser;
    use kubeprep_core::role::NodeRole;

    use crate::{cli::Cli, config::ProvisionConfig};

    use super::build_context;

    #[test]
    fn defaults_apply_without_overrides() {
        let cli = Cli::try_parse_from(["kubeprep"]).unwrap();

        let context =
            build_context(&cli, ProvisionConfig::default(), Path::new("/tmp/run.log")).unwrap();

        assert_eq!(context.role, NodeRole::Worker);
        assert_eq!(context.kubernetes_version, "1.31.1");
        assert_eq!(context.log_path, PathBuf::from("/tmp/run.log"));
        assert!(!context.verbose);
    }

    #[test]
    fn flags_override_the_config_file() {
        let cli = Cli::try_parse_from([
            "kubeprep",
            "-s",
            "-v",
            "--kubernetes-version",
            "1.30.4",
        ])
        .unwrap();
        let config = ProvisionConfig {
            kubernetes_version: Some("1.29.8".to_owned()),
            secondary_user: Some("admin".to_owned()),
            ..Default::default()
        };

        let context = build_context(&cli, config, Path::new("/tmp/run.log")).unwrap();

        assert_eq!(context.role, NodeRole::SingleNode);
        assert_eq!(context.kubernetes_version, "1.30.4");
        assert_eq!(context.secondary_user, "admin");
        assert!(context.verbose);
    }

    #[test]
    fn invalid_version_is_rejected() {
        let cli = Cli::try_parse_from(["kubeprep", "--kubernetes-version", "latest"]).unwrap();

        assert!(build_context(&cli, ProvisionConfig::default(), Path::new("/tmp/run.log")).is_err());
    }
}
