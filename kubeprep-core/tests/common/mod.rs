#![allow(dead_code)]

use std::{
    collections::{BTreeMap, VecDeque},
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use kubeprep_core::{
    context::{RunContext, RunContextBuilder},
    error::HostError,
    host::{CommandOutput, Host, Invocation},
    role::NodeRole,
};

pub const JAMMY_OS_RELEASE: &str = r#"PRETTY_NAME="Ubuntu 22.04.4 LTS"
NAME="Ubuntu"
VERSION_ID="22.04"
VERSION_CODENAME=jammy
ID=ubuntu
ID_LIKE=debian
"#;

pub const FOCAL_OS_RELEASE: &str = r#"PRETTY_NAME="Ubuntu 20.04.6 LTS"
NAME="Ubuntu"
VERSION_ID="20.04"
ID=ubuntu
"#;

pub const FSTAB: &str = "UUID=abc / ext4 errors=remount-ro 0 1\n/swap.img none swap sw 0 0\n";

pub const READY_NODES: &str = r#"{"apiVersion": "v1", "kind": "List", "items": [
  {"apiVersion": "v1", "kind": "Node", "metadata": {"name": "cp-1"},
   "spec": {"taints": [{"key": "node-role.kubernetes.io/control-plane", "effect": "NoSchedule"}]},
   "status": {"conditions": [{"type": "Ready", "status": "True"}]}}
]}"#;

pub const UNTAINTED_NODES: &str = r#"{"apiVersion": "v1", "kind": "List", "items": [
  {"apiVersion": "v1", "kind": "Node", "metadata": {"name": "cp-1"},
   "status": {"conditions": [{"type": "Ready", "status": "True"}]}}
]}"#;

pub const NOT_READY_NODES: &str = r#"{"apiVersion": "v1", "kind": "List", "items": [
  {"apiVersion": "v1", "kind": "Node", "metadata": {"name": "cp-1"},
   "status": {"conditions": [{"type": "Ready", "status": "False"}]}}
]}"#;

pub const RUNNING_PODS: &str = r#"{"apiVersion": "v1", "kind": "List", "items": [
  {"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "etcd-cp-1", "namespace": "kube-system"}, "status": {"phase": "Running"}}
]}"#;

pub const PENDING_PODS: &str = r#"{"apiVersion": "v1", "kind": "List", "items": [
  {"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "coredns-1", "namespace": "kube-system"}, "status": {"phase": "Pending"}}
]}"#;

pub const METRICS_SERVER: &str = r#"{"apiVersion": "apps/v1", "kind": "Deployment",
  "metadata": {"name": "metrics-server", "namespace": "kube-system"},
  "spec": {"selector": {"matchLabels": {"k8s-app": "metrics-server"}},
    "template": {"spec": {"containers": [{"name": "metrics-server", "args": ["--secure-port=10250"]}]}}}}"#;

pub const ADMIN_CONF: &str = "apiVersion: v1\nkind: Config\nclusters: []\n";

pub fn version_json(client: &str, server: &str) -> String {
    format!(
        r#"{{"clientVersion": {{"gitVersion": "{client}"}}, "serverVersion": {{"gitVersion": "{server}"}}}}"#
    )
}

pub fn context(role: NodeRole) -> RunContext {
    RunContextBuilder::default()
        .role(role)
        .work_dir(PathBuf::from("/work"))
        .log_path(PathBuf::from("/tmp/kubeprep-test/run.log"))
        .build()
        .unwrap()
}

struct Scripted {
    prefix: String,
    outputs: VecDeque<CommandOutput>,
    delay: Duration,
}

/// In-memory host: files live in a map, commands answer from a script keyed
/// by command-line prefix. The most recently scripted prefix wins.
pub struct FakeHost {
    pub files: BTreeMap<PathBuf, String>,
    pub invocations: Vec<String>,
    pub notes: Vec<String>,
    pub home: Option<PathBuf>,
    script: Vec<Scripted>,
    side_effects: Vec<(String, PathBuf, String)>,
}

impl FakeHost {
    pub fn empty() -> Self {
        Self {
            files: BTreeMap::new(),
            invocations: Vec::new(),
            notes: Vec::new(),
            home: Some(PathBuf::from("/root")),
            script: Vec::new(),
            side_effects: Vec::new(),
        }
    }

    /// A fresh Ubuntu 22.04 machine where every cluster query succeeds.
    pub fn jammy() -> Self {
        let mut host = Self::empty();

        host.put_file("/etc/os-release", JAMMY_OS_RELEASE);
        host.put_file("/etc/fstab", FSTAB);
        host.put_file("/home/ubuntu", "");

        host.creates("kubeadm init", "/etc/kubernetes/admin.conf", ADMIN_CONF);
        host.respond("dpkg-query", CommandOutput::failed(1, "dpkg-query: no packages found"));
        host.respond(
            "ip -4 route get",
            CommandOutput::ok("1.1.1.1 via 10.0.0.1 dev eth0 src 10.0.0.12 uid 0\n    cache\n"),
        );
        host.respond("kubectl get nodes", CommandOutput::ok(READY_NODES));
        host.respond("kubectl get pods", CommandOutput::ok(RUNNING_PODS));
        host.respond(
            "kubectl version",
            CommandOutput::ok(version_json("v1.31.1", "v1.31.1")),
        );
        host.respond(
            "kubectl -n kube-system get deployment metrics-server",
            CommandOutput::ok(METRICS_SERVER),
        );

        host
    }

    pub fn put_file(&mut self, path: &str, contents: &str) {
        self.files.insert(PathBuf::from(path), contents.to_owned());
    }

    pub fn file(&self, path: &str) -> Option<&str> {
        self.files.get(Path::new(path)).map(String::as_str)
    }

    /// Running a command starting with `prefix` creates `path`.
    pub fn creates(&mut self, prefix: &str, path: &str, contents: &str) {
        self.side_effects
            .push((prefix.to_owned(), PathBuf::from(path), contents.to_owned()));
    }

    pub fn respond(&mut self, prefix: &str, output: CommandOutput) {
        self.respond_sequence(prefix, vec![output]);
    }

    /// Answers with each output in turn, repeating the last one forever.
    pub fn respond_sequence(&mut self, prefix: &str, outputs: Vec<CommandOutput>) {
        self.script.push(Scripted {
            prefix: prefix.to_owned(),
            outputs: outputs.into(),
            delay: Duration::ZERO,
        });
    }

    pub fn respond_after(&mut self, prefix: &str, delay: Duration, output: CommandOutput) {
        self.script.push(Scripted {
            prefix: prefix.to_owned(),
            outputs: VecDeque::from([output]),
            delay,
        });
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.invocations.iter().any(|i| i.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.invocations
            .iter()
            .filter(|i| i.starts_with(prefix))
            .count()
    }
}

#[async_trait(?Send)]
impl Host for FakeHost {
    async fn execute(&mut self, invocation: &Invocation) -> Result<CommandOutput, HostError> {
        let command_line = invocation.command_line();
        self.invocations.push(command_line.clone());

        for (prefix, path, contents) in &self.side_effects {
            if command_line.starts_with(prefix.as_str()) {
                self.files.insert(path.clone(), contents.clone());
            }
        }

        let Some(scripted) = self
            .script
            .iter_mut()
            .rev()
            .find(|s| command_line.starts_with(&s.prefix))
        else {
            return Ok(CommandOutput::ok(""));
        };

        let delay = scripted.delay;
        let output = if scripted.outputs.len() > 1 {
            scripted.outputs.pop_front().unwrap_or_default()
        } else {
            scripted.outputs.front().cloned().unwrap_or_default()
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        Ok(output)
    }

    fn read_file(&self, path: &Path) -> Result<Option<String>, HostError> {
        Ok(self.files.get(path).cloned())
    }

    fn write_file(&mut self, path: &Path, contents: &str) -> Result<(), HostError> {
        self.files.insert(path.to_owned(), contents.to_owned());
        Ok(())
    }

    fn remove_file(&mut self, path: &Path) -> Result<bool, HostError> {
        Ok(self.files.remove(path).is_some())
    }

    fn create_dir_all(&mut self, _path: &Path) -> Result<(), HostError> {
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home.clone()
    }

    fn note(&mut self, line: &str) -> Result<(), HostError> {
        self.notes.push(line.to_owned());
        Ok(())
    }
}
