pub mod context;
pub mod error;
pub mod host;
pub mod kubectl;
pub mod logsink;
pub mod os_release;
pub mod plan;
pub mod provision;
pub mod role;
pub mod sequencer;
pub mod steps;
pub mod templates;
pub mod version;
pub mod waiters;

pub const CLI_NAME: &str = "kubeprep";
