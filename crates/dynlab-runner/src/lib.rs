//! Assembly of planner benchmark runs.
//!
//! An [`Experiment`] holds registered algorithms (a planner revision plus
//! options, resource declarations and callbacks) and a list of tasks.
//! [`Experiment::assemble_runs`] crosses them into [`Run`]s, attaching the
//! per-task resources each algorithm asks for. Experiments can be described
//! in a YAML file ([`load_experiment`]) and the assembled runs written to disk
//! with [`stage_runs`].

pub mod algorithm;
pub mod config;
pub mod error;
pub mod experiment;
pub mod resources;
pub mod run;
pub mod staging;
pub mod task;

pub use algorithm::{
    apply_callbacks, merge_driver_options, AlgorithmConfig, AlgorithmSpec, RevisionRef,
    RunCallback, DEFAULT_DRIVER_OPTIONS,
};
pub use config::{load_experiment, parse_experiment};
pub use error::ConfigurationError;
pub use experiment::{assemble_run, Assembly, Experiment, MissingResource, RunOutcome, SkippedRun};
pub use resources::{resolve_resource, AttachedResource, Resolution, ResourceEntry, ResourceEntrySpec};
pub use run::{Run, RunResource};
pub use staging::{stage_runs, StagedRun};
pub use task::{discover_tasks, find_domain_file, parse_suite_entry, SuiteEntry, Task};
