use std::process::ExitCode;

use kubeprep_core::{plan::plan_for, steps::Step};
use kubeprep_macros::TableOutputRow;
use log::debug;
use serde::Serialize;

use crate::{cli::Cli, output::CliPrint};

pub fn list_steps(cli: &Cli) -> anyhow::Result<ExitCode> {
    let role = cli.role();
    debug!("Listing steps for the {role} role");

    let steps = plan_for(role)
        .into_iter()
        .enumerate()
        .map(|(index, step)| StepView::new(index, step))
        .collect::<Vec<_>>();

    steps.print(cli.output)?;

    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize, TableOutputRow)]
struct StepView {
    order: usize,
    #[name_column]
    name: &'static str,
    description: &'static str,
}

impl StepView {
    fn new(index: usize, step: Step) -> Self {
        Self {
            order: index + 1,
            name: step.name(),
            description: step.description(),
        }
    }
}
