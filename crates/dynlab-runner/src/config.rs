use crate::algorithm::{AlgorithmSpec, RevisionRef};
use crate::error::ConfigurationError;
use crate::experiment::Experiment;
use crate::resources::ResourceEntrySpec;
use crate::run::Run;
use crate::task::{discover_tasks, parse_suite_entry, Task};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExperimentFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    benchmarks_dir: Option<String>,
    #[serde(default)]
    suite: Vec<String>,
    #[serde(default)]
    tasks: Vec<TaskDef>,
    #[serde(default)]
    algorithms: Vec<AlgorithmDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TaskDef {
    domain_file: String,
    problem_file: String,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    problem: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AlgorithmDef {
    name: Value,
    repo: String,
    rev: String,
    #[serde(default)]
    component_options: Vec<String>,
    #[serde(default)]
    build_options: Option<Vec<String>>,
    #[serde(default)]
    driver_options: Option<Vec<String>>,
    #[serde(default)]
    resources: Vec<Value>,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

/// Loads an experiment file (YAML or JSON). Relative paths are taken from the
/// file's directory. Any configuration problem fails the whole load, so no
/// partially registered experiment is ever returned.
pub fn load_experiment(path: &Path) -> Result<Experiment> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read experiment file {}", path.display()))?;
    let exp_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let default_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("experiment")
        .to_string();
    parse_experiment(&raw, &exp_dir, &default_name)
}

pub fn parse_experiment(raw: &str, exp_dir: &Path, default_name: &str) -> Result<Experiment> {
    let yaml_value: serde_yaml::Value = serde_yaml::from_str(raw)
        .map_err(|e| ConfigurationError::Experiment(e.to_string()))?;
    let json_value: Value = serde_json::to_value(yaml_value)
        .map_err(|e| ConfigurationError::Experiment(e.to_string()))?;
    let file: ExperimentFile = serde_json::from_value(json_value)
        .map_err(|e| ConfigurationError::Experiment(e.to_string()))?;

    let mut experiment = Experiment::new(file.name.unwrap_or_else(|| default_name.to_string()));
    for def in file.algorithms {
        experiment.register_algorithm(algorithm_spec(def, exp_dir)?)?;
    }

    if !file.suite.is_empty() {
        let benchmarks_dir = file.benchmarks_dir.ok_or_else(|| {
            ConfigurationError::Experiment("suite requires benchmarks_dir".to_string())
        })?;
        let suite = file
            .suite
            .iter()
            .map(|s| parse_suite_entry(s))
            .collect::<Result<Vec<_>, _>>()?;
        experiment.add_tasks(discover_tasks(&exp_dir.join(benchmarks_dir), &suite)?);
    }
    for def in file.tasks {
        experiment.add_task(task_from_def(def, exp_dir));
    }
    Ok(experiment)
}

fn algorithm_spec(def: AlgorithmDef, exp_dir: &Path) -> Result<AlgorithmSpec, ConfigurationError> {
    let name = match &def.name {
        Value::String(name) => name.clone(),
        other => return Err(ConfigurationError::InvalidAlgorithmName(other.to_string())),
    };
    let mut spec = AlgorithmSpec::new(
        name,
        RevisionRef::new(exp_dir.join(&def.repo), def.rev),
        def.component_options,
    );
    if let Some(build_options) = def.build_options {
        spec = spec.build_options(build_options);
    }
    if let Some(driver_options) = def.driver_options {
        spec = spec.driver_options(driver_options);
    }
    for raw in &def.resources {
        spec = spec.resource(ResourceEntrySpec::from_value(raw)?);
    }
    if !def.properties.is_empty() {
        let properties = def.properties;
        spec = spec.callback(move |run: &mut Run| {
            for (key, value) in &properties {
                run.set_property(key.clone(), value.clone());
            }
            Ok(())
        });
    }
    if !def.env.is_empty() {
        let env = def.env;
        spec = spec.callback(move |run: &mut Run| {
            for (key, value) in &env {
                run.set_env(key.clone(), value.clone());
            }
            Ok(())
        });
    }
    Ok(spec)
}

fn task_from_def(def: TaskDef, exp_dir: &Path) -> Task {
    let domain_file = exp_dir.join(&def.domain_file);
    let problem_file = exp_dir.join(&def.problem_file);
    let domain = def.domain.unwrap_or_else(|| {
        problem_file
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string()
    });
    let problem = def.problem.unwrap_or_else(|| file_name_of(&problem_file));
    Task::new(domain, problem, domain_file, problem_file)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
