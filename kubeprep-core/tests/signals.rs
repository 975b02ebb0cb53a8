#![cfg(unix)]

mod common;

use std::{process::Command, time::Duration};

use common::{context, FakeHost};
use kubeprep_core::{
    error::ProvisionError,
    host::CommandOutput,
    logsink::LogSink,
    provision::{provision_and_release, shutdown_signal},
    role::NodeRole,
};

fn send_to_self(signal: &str) {
    let status = Command::new("kill")
        .arg(format!("-{signal}"))
        .arg(std::process::id().to_string())
        .status()
        .unwrap();

    assert!(status.success(), "kill -{signal} failed");
}

// Signals reach the whole test process, so they all share one test.
#[tokio::test]
async fn every_termination_signal_interrupts_the_run_and_removes_the_log() {
    for signal in ["HUP", "INT", "QUIT", "TERM"] {
        let sink = LogSink::open().unwrap();
        let dir = sink.dir().unwrap().to_owned();
        let mut host = FakeHost::jammy();
        host.respond_after("apt-get update", Duration::from_secs(600), CommandOutput::ok(""));
        let mut out = Vec::new();
        let ctx = context(NodeRole::Worker);

        // the run is polled first, so the listeners exist before the signal is sent
        let (result, ()) = tokio::join!(
            provision_and_release(
                &ctx,
                &mut host,
                sink,
                shutdown_signal(),
                &mut out,
            ),
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                send_to_self(signal);
            },
        );

        assert!(
            matches!(result, Err(ProvisionError::Interrupted { .. })),
            "SIG{signal}: {result:?}"
        );
        assert!(!dir.exists(), "SIG{signal} left {} behind", dir.display());
    }
}
