use std::process::ExitCode;

use clap::Parser;
use cli::LogLevel;
use commands::{list_steps::list_steps, provision::run_provisioning};
use env_logger::Target;
use log::{error, LevelFilter};

use crate::cli::Cli;

mod cli;
mod commands;
mod config;
mod output;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    configure_logging(&cli);

    let result = if cli.list_steps {
        list_steps(&cli)
    } else {
        run_provisioning(&cli).await
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

fn configure_logging(cli: &Cli) {
    let log_level = cli.get_log_level();
    let mut logger = env_logger::builder();

    logger
        .format_timestamp(None)
        .format_module_path(matches!(log_level, LogLevel::Trace))
        .format_target(false)
        .format_level(false)
        .target(Target::Stderr);

    let (module, level) = log_filter(&log_level);

    logger.filter(module, level).init();
}

/// Module paths match by prefix, so "kubeprep" covers kubeprep_core too.
fn log_filter(log_level: &LogLevel) -> (Option<&'static str>, LevelFilter) {
    match log_level {
        LogLevel::Normal => (Some("kubeprep"), LevelFilter::Info),
        LogLevel::Verbose => (Some("kubeprep"), LevelFilter::Debug),
        LogLevel::Trace => (None, LevelFilter::Debug),
    }
}

#[cfg(test)]
mod tests {
    use log::LevelFilter;

    use crate::cli::LogLevel;

    use super::log_filter;

    #[test]
    fn one_filter_covers_both_crates() {
        let (module, level) = log_filter(&LogLevel::Normal);

        assert_eq!(module, Some("kubeprep"));
        assert_eq!(level, LevelFilter::Info);
        assert!(module_path!().starts_with("kubeprep"));
        assert!("kubeprep_core::steps".starts_with(module.unwrap()));
    }

    #[test]
    fn verbose_and_trace_raise_the_level() {
        assert_eq!(
            log_filter(&LogLevel::Verbose),
            (Some("kubeprep"), LevelFilter::Debug)
        );
        assert_eq!(log_filter(&LogLevel::Trace), (None, LevelFilter::Debug));
    }
}
