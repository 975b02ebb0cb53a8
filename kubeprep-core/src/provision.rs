use std::{future::Future, io::Write};

use log::{debug, info, warn};

use crate::{
    context::RunContext,
    error::ProvisionError,
    host::Host,
    logsink::LogSink,
    role::NodeRole,
    sequencer::{RunReport, Sequencer},
};

/// Runs the plan for `context.role`, giving up as soon as `interrupt`
/// resolves. Dropping the in-flight step kills whatever command it was
/// waiting on.
pub async fn provision(
    context: &RunContext,
    host: &mut dyn Host,
    interrupt: impl Future<Output = ()>,
) -> Result<RunReport, ProvisionError> {
    let mut sequencer = Sequencer::for_role(context.role);

    debug!(
        "Provisioning as {} with {} steps",
        context.role,
        sequencer.steps().len()
    );

    let finished = tokio::select! {
        biased;
        _ = interrupt => None,
        result = sequencer.run(context, host) => Some(result),
    };

    match finished {
        Some(result) => result,
        None => Err(match sequencer.current_step() {
            Some((index, step)) => ProvisionError::Interrupted {
                index,
                name: step.name(),
            },
            None => ProvisionError::InterruptedBeforeStart,
        }),
    }
}

/// Resolves on SIGINT, SIGTERM, SIGHUP or SIGQUIT. Any of them would
/// otherwise end the process without releasing the run log.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match termination_signal().await {
            Ok(name) => debug!("Received {name}"),
            Err(error) => {
                warn!("Couldn't listen for termination signals, only Ctrl-C will interrupt the run: {error}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(unix)]
async fn termination_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut quit = signal(SignalKind::quit())?;

    Ok(tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = hangup.recv() => "SIGHUP",
        _ = quit.recv() => "SIGQUIT",
    })
}

/// The text shown on stderr when a run fails: the error line followed by
/// the whole run log.
pub fn failure_report(error: &ProvisionError, sink: &mut LogSink) -> String {
    let log = match sink.dump() {
        Ok(log) => log,
        Err(dump_error) => format!("<couldn't read the run log: {dump_error}>\n"),
    };

    format!("{error}\n--- run log ---\n{log}--- end of run log ---")
}

pub fn log_summary(context: &RunContext, report: &RunReport) {
    info!(
        "Provisioned this host as a {} node in {}s ({} steps)",
        context.role,
        report.elapsed.as_secs(),
        report.completed.len()
    );

    if let NodeRole::Worker = context.role {
        info!("To join a cluster, run 'kubeadm token create --print-join-command' on a control plane node and execute its output here.");
    }
}

/// Runs the plan and releases the run log on every way out: success, a
/// failing step or an interrupt. Failures are written to `out` followed by
/// the whole log; a verbose successful run writes just the log.
pub async fn provision_and_release(
    context: &RunContext,
    host: &mut dyn Host,
    mut sink: LogSink,
    interrupt: impl Future<Output = ()>,
    out: &mut dyn Write,
) -> Result<RunReport, ProvisionError> {
    let result = provision(context, host, interrupt).await;

    let written = match &result {
        Ok(report) => {
            log_summary(context, report);

            if context.verbose {
                match sink.dump() {
                    Ok(log) => write!(out, "{log}"),
                    Err(error) => {
                        warn!("Couldn't read the run log! {error}");
                        Ok(())
                    }
                }
            } else {
                Ok(())
            }
        }
        Err(error) => writeln!(out, "{}", failure_report(error, &mut sink)),
    };

    if let Err(error) = written.and_then(|_| out.flush()) {
        warn!("Couldn't print the run report! {error}");
    }

    if let Err(error) = sink.close() {
        warn!(
            "Couldn't remove the run log at '{}'! {error}",
            sink.path().display()
        );
    }

    result
}
