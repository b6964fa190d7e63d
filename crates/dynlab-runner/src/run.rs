use crate::algorithm::AlgorithmConfig;
use crate::task::Task;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A file a run needs, placed under `destination` when the run is staged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResource {
    pub source: PathBuf,
    pub destination: String,
    pub symlink: bool,
}

/// One (algorithm, task) unit of work.
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub experiment: String,
    pub algorithm: String,
    pub task: Task,
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub properties: BTreeMap<String, Value>,
    pub resources: BTreeMap<String, RunResource>,
}

impl Run {
    /// Builds a run without resources. The command is the driver options,
    /// the domain and problem inputs, then the component options.
    pub fn new(experiment: &str, algo: &AlgorithmConfig, task: &Task) -> Self {
        let mut command = algo.driver_options.clone();
        command.push(task.domain_file.to_string_lossy().to_string());
        command.push(task.problem_file.to_string_lossy().to_string());
        command.extend(algo.component_options.iter().cloned());

        let mut properties = BTreeMap::new();
        properties.insert("algorithm".to_string(), json!(algo.name));
        properties.insert("domain".to_string(), json!(task.domain));
        properties.insert("problem".to_string(), json!(task.problem));
        properties.insert("repo".to_string(), json!(algo.revision.repo.to_string_lossy()));
        properties.insert("rev".to_string(), json!(algo.revision.rev));
        properties.insert("build_options".to_string(), json!(algo.revision.build_options));
        properties.insert("driver_options".to_string(), json!(algo.driver_options));
        properties.insert("component_options".to_string(), json!(algo.component_options));

        Self {
            experiment: experiment.to_string(),
            algorithm: algo.name.clone(),
            task: task.clone(),
            command,
            env: BTreeMap::new(),
            properties,
            resources: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> [&str; 3] {
        [&self.algorithm, &self.task.domain, &self.task.problem]
    }

    pub fn id_string(&self) -> String {
        self.id().join(":")
    }

    /// Attaches `source` under `name`. A later attachment with the same name
    /// replaces the earlier one.
    pub fn add_resource(
        &mut self,
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        destination: impl Into<String>,
        symlink: bool,
    ) {
        self.resources.insert(
            name.into(),
            RunResource {
                source: source.into(),
                destination: destination.into(),
                symlink,
            },
        );
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    /// Properties as written next to a staged run.
    pub fn properties_json(&self) -> Value {
        let mut props: serde_json::Map<String, Value> = self
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        props.insert("id".to_string(), json!(self.id()));
        props.insert("experiment_name".to_string(), json!(self.experiment));
        props.insert("command".to_string(), json!(self.command));
        props.insert("env".to_string(), json!(self.env));
        let resources: serde_json::Map<String, Value> = self
            .resources
            .iter()
            .map(|(name, res)| {
                (
                    name.clone(),
                    json!({
                        "source": res.source.to_string_lossy(),
                        "destination": res.destination,
                        "symlink": res.symlink,
                    }),
                )
            })
            .collect();
        props.insert("resources".to_string(), Value::Object(resources));
        Value::Object(props)
    }
}
