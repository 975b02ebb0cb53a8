use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use log::{debug, info};
use tokio::time::Instant;

use crate::{
    context::RunContext,
    error::{ProvisionError, StepError},
    host::Host,
    plan::plan_for,
    role::NodeRole,
    steps::Step,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running(usize),
    Succeeded,
    Failed(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: Step,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub completed: Vec<StepRecord>,
    pub elapsed: Duration,
}

/// Runs a fixed list of steps in order, stopping at the first failure.
#[derive(Debug)]
pub struct Sequencer {
    steps: Vec<Step>,
    state: RunState,
}

impl Sequencer {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            state: RunState::NotStarted,
        }
    }

    pub fn for_role(role: NodeRole) -> Self {
        Self::new(plan_for(role))
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// The step that was running when the run stopped, if any.
    pub fn current_step(&self) -> Option<(usize, Step)> {
        match self.state {
            RunState::Running(index) | RunState::Failed(index) => {
                self.steps.get(index).map(|step| (index, *step))
            }
            _ => None,
        }
    }

    pub async fn run(
        &mut self,
        context: &RunContext,
        host: &mut dyn Host,
    ) -> Result<RunReport, ProvisionError> {
        let started = Instant::now();
        let total = self.steps.len();
        let mut completed = Vec::with_capacity(total);

        for index in 0..total {
            let step = self.steps[index];
            self.state = RunState::Running(index);

            info!("[{}/{total}] {}...", index + 1, step.description());

            let step_started = Instant::now();
            let result = match announce(host, step) {
                Ok(()) => step.execute(context, host).await,
                Err(error) => Err(error),
            };

            if let Err(source) = result {
                self.state = RunState::Failed(index);

                return Err(ProvisionError::StepFailed {
                    index,
                    name: step.name(),
                    source,
                });
            }

            let elapsed = step_started.elapsed();
            debug!("{step} finished in {}ms", elapsed.as_millis());
            completed.push(StepRecord { step, elapsed });
        }

        self.state = RunState::Succeeded;

        Ok(RunReport {
            completed,
            elapsed: started.elapsed(),
        })
    }
}

fn announce(host: &mut dyn Host, step: Step) -> Result<(), StepError> {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    host.note(&format!("==> [{now}] {} ({step})", step.description()))?;

    Ok(())
}
