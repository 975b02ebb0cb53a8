use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use log::{debug, info};
use tokio::time::{interval_at, sleep_until, timeout_at, Instant, MissedTickBehavior};

use crate::{
    error::{HostError, StepError},
    host::{Host, Invocation},
    kubectl::{not_ready_nodes, not_running_pods, parse_items},
};

pub const POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const NODES_READY_TIMEOUT: Duration = Duration::from_secs(180);
pub const PODS_RUNNING_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready { elapsed: Duration, polls: u32 },
    TimedOut { elapsed: Duration, pending: Vec<String> },
}

impl WaitOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

#[async_trait(?Send)]
pub trait ReadinessProbe {
    /// What is being waited for, e.g. "nodes to become Ready".
    fn what(&self) -> &'static str;

    /// Resources that aren't there yet. Empty means the condition holds.
    async fn pending(&mut self, host: &mut dyn Host) -> Result<Vec<String>, StepError>;
}

/// Polls `probe` on a fixed `interval` cadence, starting right away, until it
/// reports nothing pending. An answer that doesn't arrive by `timeout` after
/// the first poll counts as timed out, however long the query itself takes.
pub async fn wait_until_ready(
    probe: &mut dyn ReadinessProbe,
    host: &mut dyn Host,
    interval: Duration,
    timeout: Duration,
) -> Result<WaitOutcome, StepError> {
    let started = Instant::now();
    let deadline = started + timeout;
    let mut ticks = interval_at(started, interval);
    let mut polls = 0;
    let mut pending = Vec::new();

    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Waiting up to {}s for {}...",
        timeout.as_secs(),
        probe.what()
    );

    loop {
        tokio::select! {
            _ = ticks.tick() => {}
            _ = sleep_until(deadline) => {}
        }

        polls += 1;
        let answer = timeout_at(deadline, probe.pending(host)).await;
        let elapsed = started.elapsed();

        match answer {
            Ok(result) => {
                let still_pending = result?;

                if still_pending.is_empty() && elapsed <= timeout {
                    debug!(
                        "Done waiting for {} after {}s ({polls} polls)",
                        probe.what(),
                        elapsed.as_secs()
                    );

                    return Ok(WaitOutcome::Ready { elapsed, polls });
                }

                if !still_pending.is_empty() {
                    pending = still_pending;
                }
            }
            Err(_) => debug!("No answer about {} before the deadline", probe.what()),
        }

        if elapsed >= timeout {
            if pending.is_empty() {
                pending.push(format!("<no answer about {} in time>", probe.what()));
            }

            return Ok(WaitOutcome::TimedOut { elapsed, pending });
        }

        debug!(
            "Still waiting for {} ({}s elapsed): {}",
            probe.what(),
            elapsed.as_secs(),
            pending.join(", ")
        );
    }
}

/// A failing kubectl query is reported as pending rather than fatal, the API
/// server is expected to flap while the control plane settles.
async fn query(host: &mut dyn Host, invocation: Invocation) -> Result<Option<String>, StepError> {
    match host.run(&invocation).await {
        Ok(output) => Ok(Some(output.stdout)),
        Err(HostError::CommandFailed { command, status }) => {
            debug!("'{command}' failed with {status}, retrying later");
            Ok(None)
        }
        Err(error) => Err(error.into()),
    }
}

pub struct NodesReady;

#[async_trait(?Send)]
impl ReadinessProbe for NodesReady {
    fn what(&self) -> &'static str {
        "nodes to become Ready"
    }

    async fn pending(&mut self, host: &mut dyn Host) -> Result<Vec<String>, StepError> {
        let invocation = Invocation::kubectl(["get", "nodes", "-o", "json"]);
        let command = invocation.command_line();

        let Some(json) = query(host, invocation).await? else {
            return Ok(vec!["API server (not answering yet)".to_owned()]);
        };
        let nodes = parse_items::<Node>(&json).map_err(|e| StepError::malformed(command, e))?;

        if nodes.is_empty() {
            return Ok(vec!["<no nodes registered yet>".to_owned()]);
        }

        Ok(not_ready_nodes(&nodes))
    }
}

pub struct PodsRunning;

#[async_trait(?Send)]
impl ReadinessProbe for PodsRunning {
    fn what(&self) -> &'static str {
        "all pods to be Running"
    }

    async fn pending(&mut self, host: &mut dyn Host) -> Result<Vec<String>, StepError> {
        let invocation = Invocation::kubectl(["get", "pods", "--all-namespaces", "-o", "json"]);
        let command = invocation.command_line();

        let Some(json) = query(host, invocation).await? else {
            return Ok(vec!["API server (not answering yet)".to_owned()]);
        };
        let pods = parse_items::<Pod>(&json).map_err(|e| StepError::malformed(command, e))?;

        if pods.is_empty() {
            return Ok(vec!["<no pods scheduled yet>".to_owned()]);
        }

        Ok(not_running_pods(&pods))
    }
}
