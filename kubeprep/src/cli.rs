use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use ipnet::Ipv4Net;
use kubeprep_core::role::{resolve_role, NodeRole};

#[derive(Debug, Parser)]
#[command(version, about, disable_help_flag = true)]
pub struct Cli {
    /// set this node up as a control plane (kubeadm init, CNI, metrics-server)
    #[arg(short = 'c', long)]
    pub control_plane: bool,
    /// set up a single-node cluster: a control plane that also runs workloads (implies -c)
    #[arg(short = 's', long)]
    pub single_node: bool,
    /// enable verbose output and print the full run log at the end
    #[arg(short = 'v', long = "verbose")]
    pub verbose_logging: bool,
    /// enable trace output (more detailed than verbose, overrides it if present)
    #[arg(long = "trace")]
    pub trace_logging: bool,
    /// print help
    #[arg(short = 'h', long = "help", short_alias = '?', action = ArgAction::Help)]
    pub help: Option<bool>,
    /// YAML file overriding the built-in defaults (flags override the file)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// kubernetes version to install (MAJOR.MINOR.PATCH)
    #[arg(long)]
    pub kubernetes_version: Option<String>,
    /// containerd package version (apt version glob)
    #[arg(long)]
    pub containerd_version: Option<String>,
    /// pod network CIDR handed to kubeadm
    #[arg(long)]
    pub pod_subnet: Option<Ipv4Net>,
    /// port the API server listens on
    #[arg(long)]
    pub api_server_port: Option<u16>,
    /// CNI operator manifest URL
    #[arg(long)]
    pub cni_operator_manifest: Option<String>,
    /// CNI custom resources manifest URL
    #[arg(long)]
    pub cni_resources_manifest: Option<String>,
    /// metrics-server manifest URL
    #[arg(long)]
    pub metrics_server_manifest: Option<String>,
    /// additional account that receives a copy of the admin kubeconfig
    #[arg(long)]
    pub secondary_user: Option<String>,
    /// directory kubeadm-config.yaml is written to
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
    /// print the steps for the selected role and exit without changing anything
    #[arg(long)]
    pub list_steps: bool,
    /// output format used by --list-steps
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::TableWithHeaders)]
    pub output: OutputFormat,
}

impl Cli {
    pub fn get_log_level(&self) -> LogLevel {
        if self.trace_logging {
            return LogLevel::Trace;
        }

        if self.verbose_logging {
            return LogLevel::Verbose;
        }

        LogLevel::Normal
    }

    pub fn role(&self) -> NodeRole {
        resolve_role(self.control_plane, self.single_node)
    }
}

pub enum LogLevel {
    Normal,
    Verbose,
    Trace,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value()]
pub enum OutputFormat {
    #[value(name = "names")]
    Names,
    #[value(name = "table")]
    Table,
    #[value(name = "table-with-headers")]
    TableWithHeaders,
    #[value(name = "json")]
    Json,
    #[value(name = "json-pretty")]
    JsonPretty,
    #[value(name = "yaml")]
    Yaml,
}

#[cfg(test)]
mod tests {
    use clap::{error::ErrorKind, Parser};
    use kubeprep_core::role::NodeRole;

    use super::Cli;

    #[test]
    fn no_flags_mean_worker() {
        let cli = Cli::try_parse_from(["kubeprep"]).unwrap();

        assert_eq!(cli.role(), NodeRole::Worker);
        assert!(!cli.verbose_logging);
    }

    #[test]
    fn short_flags_select_the_role() {
        assert_eq!(
            Cli::try_parse_from(["kubeprep", "-c"]).unwrap().role(),
            NodeRole::ControlPlane
        );
        assert_eq!(
            Cli::try_parse_from(["kubeprep", "-s"]).unwrap().role(),
            NodeRole::SingleNode
        );
        assert_eq!(
            Cli::try_parse_from(["kubeprep", "-c", "-s", "-v"]).unwrap().role(),
            NodeRole::SingleNode
        );
    }

    #[test]
    fn question_mark_and_h_print_help() {
        for flag in ["-h", "-?", "--help"] {
            let error = Cli::try_parse_from(["kubeprep", flag]).unwrap_err();

            assert_eq!(error.kind(), ErrorKind::DisplayHelp, "{flag}");
        }
    }

    #[test]
    fn pod_subnet_must_be_a_cidr() {
        assert!(Cli::try_parse_from(["kubeprep", "--pod-subnet", "10.244.0.0/16"]).is_ok());
        assert!(Cli::try_parse_from(["kubeprep", "--pod-subnet", "bogus"]).is_err());
    }
}
