use std::{
    net::IpAddr,
    path::{Path, PathBuf},
};

use k8s_openapi::api::{apps::v1::Deployment, core::v1::Node};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    context::RunContext,
    error::StepError,
    host::{Host, Invocation, ADMIN_KUBECONFIG},
    kubectl::{has_control_plane_taint, node_name, parse_items, CONTROL_PLANE_TAINT},
    templates,
    version::{self, VersionReport},
    waiters::{
        wait_until_ready, NodesReady, PodsRunning, WaitOutcome, NODES_READY_TIMEOUT,
        PODS_RUNNING_TIMEOUT, POLL_INTERVAL,
    },
};

use super::best_effort;

pub const SMOKE_TEST_DEPLOYMENT: &str = "kubeprep-smoke";
const SMOKE_TEST_IMAGE: &str = "nginx:stable";
const SMOKE_TEST_ROLLOUT_TIMEOUT: &str = "--timeout=180s";

const ROUTE_PROBE_TARGET: &str = "1.1.1.1";
const CNI_CRD: &str = "crd/installations.operator.tigera.io";
const METRICS_SERVER_NAMESPACE: &str = "kube-system";
const METRICS_SERVER_DEPLOYMENT: &str = "metrics-server";
const KUBELET_INSECURE_TLS: &str = "--kubelet-insecure-tls";

static ROUTE_SOURCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bsrc\s+(\S+)").unwrap());

/// Picks the source address out of `ip route get` output.
pub fn parse_route_source(output: &str) -> Result<IpAddr, String> {
    let source = ROUTE_SOURCE
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| format!("no source address in '{}'", output.trim()))?;

    source
        .parse()
        .map_err(|_| format!("'{source}' is not an IP address"))
}

async fn detect_host_ip(host: &mut dyn Host) -> Result<IpAddr, StepError> {
    let output = host
        .run(&Invocation::new("ip").args(["-4", "route", "get", ROUTE_PROBE_TARGET]))
        .await?;

    parse_route_source(&output.stdout).map_err(|reason| {
        StepError::Precondition(format!(
            "Couldn't determine the primary IP address of this host: {reason}"
        ))
    })
}

pub async fn init_control_plane(context: &RunContext, host: &mut dyn Host) -> Result<(), StepError> {
    if host.exists(Path::new(ADMIN_KUBECONFIG)) {
        info!("{ADMIN_KUBECONFIG} already exists, the control plane is initialized");
        return Ok(());
    }

    let host_ip = detect_host_ip(host).await?;
    info!("Using {host_ip} as the control plane endpoint address");

    let config_path = context.bootstrap_config_path();
    let config = templates::kubeadm_config(context, host_ip)?;

    debug!("{config}");
    host.write_file(&config_path, &config)?;

    let config_arg = config_path.to_string_lossy().into_owned();
    host.run(&Invocation::new("kubeadm").args([
        "init",
        "--config",
        config_arg.as_str(),
        "--upload-certs",
    ]))
    .await?;

    Ok(())
}

fn kubeconfig_targets(context: &RunContext, host: &dyn Host) -> Vec<(PathBuf, Option<&'static str>)> {
    let own_home = host.home_dir().unwrap_or_else(|| PathBuf::from("/root"));
    let secondary_home = PathBuf::from("/home").join(&context.secondary_user);
    let mut targets = vec![(own_home.join(".kube/config"), None)];

    if secondary_home == own_home {
        return targets;
    }

    if host.exists(&secondary_home) {
        targets.push((secondary_home.join(".kube/config"), Some("secondary")));
    } else {
        warn!(
            "'{}' doesn't exist, skipping the kubeconfig for '{}'",
            secondary_home.display(),
            context.secondary_user
        );
    }

    targets
}

pub async fn install_kubeconfig(context: &RunContext, host: &mut dyn Host) -> Result<(), StepError> {
    let admin_config = host.read_file(Path::new(ADMIN_KUBECONFIG))?.ok_or_else(|| {
        StepError::Precondition(format!(
            "{ADMIN_KUBECONFIG} is missing, was the control plane initialized?"
        ))
    })?;

    for (target, secondary) in kubeconfig_targets(context, host) {
        info!("Writing kubeconfig to '{}'...", target.display());
        host.write_file(&target, &admin_config)?;

        if secondary.is_some() {
            let owner = format!("{0}:{0}", context.secondary_user);
            let kube_dir = target.parent().unwrap_or(target.as_path()).to_string_lossy().into_owned();
            let result = host
                .run(&Invocation::new("chown").args(["-R", owner.as_str(), kube_dir.as_str()]))
                .await;

            best_effort(host, &format!("Handing '{kube_dir}' over to {owner}"), result);
        }
    }

    Ok(())
}

pub async fn install_cni(context: &RunContext, host: &mut dyn Host) -> Result<(), StepError> {
    host.run(&Invocation::kubectl([
        "apply",
        "--server-side",
        "--force-conflicts",
        "-f",
        context.cni_operator_manifest.as_str(),
    ]))
    .await?;
    host.run(&Invocation::kubectl([
        "wait",
        "--for=condition=established",
        "--timeout=60s",
        CNI_CRD,
    ]))
    .await?;
    host.run(&Invocation::kubectl([
        "apply",
        "-f",
        context.cni_resources_manifest.as_str(),
    ]))
    .await?;

    Ok(())
}

pub async fn wait_for_nodes_ready(host: &mut dyn Host) -> Result<(), StepError> {
    match wait_until_ready(&mut NodesReady, host, POLL_INTERVAL, NODES_READY_TIMEOUT).await? {
        WaitOutcome::Ready { .. } => Ok(()),
        WaitOutcome::TimedOut { elapsed, pending } => Err(StepError::NotReady {
            what: "nodes to become Ready",
            waited_secs: elapsed.as_secs(),
            pending,
        }),
    }
}

pub async fn check_versions(context: &RunContext, host: &mut dyn Host) -> Result<(), StepError> {
    let invocation = Invocation::kubectl(["version", "-o", "json"]);
    let output = host.run(&invocation).await?;
    let report = VersionReport::from_json(&output.stdout)
        .map_err(|e| StepError::malformed(invocation.command_line(), e))?;
    let server = report.server_version.ok_or_else(|| {
        StepError::malformed(invocation.command_line(), "no server version reported")
    })?;

    version::check_versions(
        &report.client_version.git_version,
        &server.git_version,
        &context.expected_server_version(),
    )?;

    info!("Client and server both run {}", server.git_version);

    Ok(())
}

fn has_insecure_tls_flag(deployment: &Deployment) -> bool {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|s| s.containers.first())
        .and_then(|c| c.args.as_ref())
        .map(|args| args.iter().any(|a| a == KUBELET_INSECURE_TLS))
        .unwrap_or(false)
}

pub async fn install_metrics_server(
    context: &RunContext,
    host: &mut dyn Host,
) -> Result<(), StepError> {
    host.run(&Invocation::kubectl([
        "apply",
        "-f",
        context.metrics_server_manifest.as_str(),
    ]))
    .await?;

    let invocation = Invocation::kubectl([
        "-n",
        METRICS_SERVER_NAMESPACE,
        "get",
        "deployment",
        METRICS_SERVER_DEPLOYMENT,
        "-o",
        "json",
    ]);
    let output = host.run(&invocation).await?;
    let deployment: Deployment = serde_json::from_str(&output.stdout)
        .map_err(|e| StepError::malformed(invocation.command_line(), e))?;

    if has_insecure_tls_flag(&deployment) {
        debug!("metrics-server already skips kubelet certificate verification");
        return Ok(());
    }

    // kubeadm kubelets serve self-signed certificates
    let patch = serde_json::json!([{
        "op": "add",
        "path": "/spec/template/spec/containers/0/args/-",
        "value": KUBELET_INSECURE_TLS,
    }]);

    host.run(&Invocation::kubectl([
        "-n",
        METRICS_SERVER_NAMESPACE,
        "patch",
        "deployment",
        METRICS_SERVER_DEPLOYMENT,
        "--type=json",
        "-p",
        patch.to_string().as_str(),
    ]))
    .await?;

    Ok(())
}

pub async fn wait_for_pods_running(host: &mut dyn Host) -> Result<(), StepError> {
    let outcome =
        wait_until_ready(&mut PodsRunning, host, POLL_INTERVAL, PODS_RUNNING_TIMEOUT).await?;

    if let WaitOutcome::TimedOut { elapsed, pending } = outcome {
        warn!(
            "Some pods still aren't Running after {}s: {}",
            elapsed.as_secs(),
            pending.join(", ")
        );
        host.note(&format!("# pods not running: {}", pending.join(", ")))?;
    }

    Ok(())
}

pub async fn remove_control_plane_taint(host: &mut dyn Host) -> Result<(), StepError> {
    let invocation = Invocation::kubectl(["get", "nodes", "-o", "json"]);
    let output = host.run(&invocation).await?;
    let nodes = parse_items::<Node>(&output.stdout)
        .map_err(|e| StepError::malformed(invocation.command_line(), e))?;
    let tainted = nodes
        .iter()
        .filter(|n| has_control_plane_taint(n))
        .map(node_name)
        .collect::<Vec<_>>();

    if tainted.is_empty() {
        info!("No node carries the control-plane taint");
        return Ok(());
    }

    let taint_removal = format!("{CONTROL_PLANE_TAINT}-");

    for node in tainted {
        info!("Removing the control-plane taint from '{node}'...");
        host.run(&Invocation::kubectl([
            "taint",
            "nodes",
            node,
            taint_removal.as_str(),
        ]))
        .await?;
    }

    Ok(())
}

pub async fn smoke_test(host: &mut dyn Host) -> Result<(), StepError> {
    let image = format!("--image={SMOKE_TEST_IMAGE}");
    let rollout_target = format!("deployment/{SMOKE_TEST_DEPLOYMENT}");

    host.run(&Invocation::kubectl([
        "delete",
        "deployment",
        SMOKE_TEST_DEPLOYMENT,
        "--ignore-not-found",
    ]))
    .await?;
    host.run(&Invocation::kubectl([
        "create",
        "deployment",
        SMOKE_TEST_DEPLOYMENT,
        image.as_str(),
    ]))
    .await?;
    host.run(&Invocation::kubectl([
        "rollout",
        "status",
        rollout_target.as_str(),
        SMOKE_TEST_ROLLOUT_TIMEOUT,
    ]))
    .await?;
    host.run(&Invocation::kubectl([
        "delete",
        "deployment",
        SMOKE_TEST_DEPLOYMENT,
    ]))
    .await?;

    info!("Smoke test deployment rolled out and was cleaned up");

    Ok(())
}
