//! Turns registered algorithms and tasks into the runs of an experiment.
//!
//! Every algorithm is paired with every task. Each pair goes through
//! [`assemble_run`], which resolves the algorithm's resources for that task
//! and applies its callbacks. A missing strict resource drops only that one
//! run; a missing non-strict resource is logged and the run keeps going.

use crate::algorithm::{apply_callbacks, AlgorithmConfig, AlgorithmSpec};
use crate::error::ConfigurationError;
use crate::resources::{resolve_resource, Resolution};
use crate::run::Run;
use crate::task::Task;
use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// A non-strict resource that was absent for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingResource {
    pub run_id: String,
    pub name: String,
    pub path: PathBuf,
}

/// A run left out because a strict resource was absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRun {
    pub run_id: String,
    pub reason: String,
}

#[derive(Debug)]
pub enum RunOutcome {
    Assembled {
        run: Run,
        missing: Vec<MissingResource>,
    },
    Aborted(SkippedRun),
}

/// Result of assembling a whole experiment.
#[derive(Debug, Default)]
pub struct Assembly {
    pub runs: Vec<Run>,
    pub missing: Vec<MissingResource>,
    pub skipped: Vec<SkippedRun>,
}

/// Builds the run for one (algorithm, task) pair.
///
/// Resources are resolved in declaration order and resolution stops at the
/// first missing strict resource. Callbacks only see runs whose resources
/// were all processed. Callback errors are returned unchanged.
pub fn assemble_run(experiment: &str, algo: &AlgorithmConfig, task: &Task) -> Result<RunOutcome> {
    let mut run = Run::new(experiment, algo, task);
    let mut missing = Vec::new();
    for spec in &algo.resource_specs {
        let entry = spec.normalize();
        match resolve_resource(&entry, task) {
            Resolution::Attached(res) => {
                run.add_resource(res.name, res.path, res.destination, true);
            }
            Resolution::WarnedMissing { name, path } => {
                warn!(
                    run = %run.id_string(),
                    resource = %name,
                    path = %path.display(),
                    "resource not found"
                );
                missing.push(MissingResource {
                    run_id: run.id_string(),
                    name,
                    path,
                });
            }
            Resolution::AbortRun { reason } => {
                return Ok(RunOutcome::Aborted(SkippedRun {
                    run_id: run.id_string(),
                    reason,
                }));
            }
        }
    }
    apply_callbacks(&algo.callbacks, &mut run)?;
    Ok(RunOutcome::Assembled { run, missing })
}

/// Algorithms and tasks of one experiment. Each experiment owns its own
/// registry; registration happens before [`Experiment::assemble_runs`].
#[derive(Debug, Default)]
pub struct Experiment {
    pub name: String,
    algorithms: Vec<AlgorithmConfig>,
    tasks: Vec<Task>,
}

impl Experiment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            algorithms: Vec::new(),
            tasks: Vec::new(),
        }
    }

    pub fn register_algorithm(&mut self, spec: AlgorithmSpec) -> Result<(), ConfigurationError> {
        if self.algorithms.iter().any(|a| a.name == spec.name) {
            return Err(ConfigurationError::DuplicateAlgorithm(spec.name));
        }
        let config = spec.into_config()?;
        debug!(
            algorithm = %config.name,
            rev = %config.revision.rev,
            resources = config.resource_specs.len(),
            callbacks = config.callbacks.len(),
            "registered algorithm"
        );
        self.algorithms.push(config);
        Ok(())
    }

    pub fn add_task(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub fn add_tasks(&mut self, tasks: impl IntoIterator<Item = Task>) {
        self.tasks.extend(tasks);
    }

    pub fn algorithms(&self) -> &[AlgorithmConfig] {
        &self.algorithms
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Assembles every algorithm against every task. Runs with a missing
    /// strict resource are left out without affecting any other run.
    pub fn assemble_runs(&self) -> Result<Assembly> {
        let mut assembly = Assembly::default();
        for algo in &self.algorithms {
            for task in &self.tasks {
                match assemble_run(&self.name, algo, task)? {
                    RunOutcome::Assembled { run, missing } => {
                        assembly.runs.push(run);
                        assembly.missing.extend(missing);
                    }
                    RunOutcome::Aborted(skipped) => {
                        debug!(run = %skipped.run_id, reason = %skipped.reason, "skipping run");
                        assembly.skipped.push(skipped);
                    }
                }
            }
        }
        info!(
            experiment = %self.name,
            runs = assembly.runs.len(),
            skipped = assembly.skipped.len(),
            missing_resources = assembly.missing.len(),
            "assembled runs"
        );
        Ok(assembly)
    }
}
