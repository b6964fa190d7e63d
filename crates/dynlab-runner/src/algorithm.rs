use crate::error::ConfigurationError;
use crate::resources::{validate_destination, ResourceEntrySpec};
use crate::run::Run;
use anyhow::Result;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Driver options every algorithm starts with. A flag given by the caller
/// replaces the matching default together with its value.
pub const DEFAULT_DRIVER_OPTIONS: &[(&str, Option<&str>)] = &[
    ("--validate", None),
    ("--overall-time-limit", Some("30m")),
    ("--overall-memory-limit", Some("3584M")),
];

/// Mutates a freshly assembled run in place.
pub type RunCallback = Box<dyn Fn(&mut Run) -> Result<()>>;

/// Planner source at a given revision plus the options it is built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionRef {
    pub repo: PathBuf,
    pub rev: String,
    pub build_options: Vec<String>,
}

impl RevisionRef {
    pub fn new(repo: impl Into<PathBuf>, rev: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            rev: rev.into(),
            build_options: Vec::new(),
        }
    }
}

/// A registered algorithm. Immutable once stored in an experiment.
pub struct AlgorithmConfig {
    pub name: String,
    pub revision: RevisionRef,
    pub driver_options: Vec<String>,
    pub component_options: Vec<String>,
    pub resource_specs: Vec<ResourceEntrySpec>,
    pub callbacks: Vec<RunCallback>,
}

impl fmt::Debug for AlgorithmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmConfig")
            .field("name", &self.name)
            .field("revision", &self.revision)
            .field("driver_options", &self.driver_options)
            .field("component_options", &self.component_options)
            .field("resource_specs", &self.resource_specs)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// Everything a caller passes when registering an algorithm.
pub struct AlgorithmSpec {
    pub name: String,
    pub revision: RevisionRef,
    pub component_options: Vec<String>,
    pub build_options: Option<Vec<String>>,
    pub driver_options: Option<Vec<String>>,
    pub resource_specs: Vec<ResourceEntrySpec>,
    pub callbacks: Vec<RunCallback>,
}

impl AlgorithmSpec {
    pub fn new(
        name: impl Into<String>,
        revision: RevisionRef,
        component_options: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            revision,
            component_options,
            build_options: None,
            driver_options: None,
            resource_specs: Vec::new(),
            callbacks: Vec::new(),
        }
    }

    pub fn build_options(mut self, options: Vec<String>) -> Self {
        self.build_options = Some(options);
        self
    }

    pub fn driver_options(mut self, options: Vec<String>) -> Self {
        self.driver_options = Some(options);
        self
    }

    pub fn resource(mut self, spec: impl Into<ResourceEntrySpec>) -> Self {
        self.resource_specs.push(spec.into());
        self
    }

    pub fn callback(mut self, callback: impl Fn(&mut Run) -> Result<()> + 'static) -> Self {
        self.callbacks.push(Box::new(callback));
        self
    }

    /// Validates the spec and produces the stored configuration. Name
    /// uniqueness across an experiment is checked by the experiment.
    pub fn into_config(self) -> Result<AlgorithmConfig, ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::InvalidAlgorithmName(format!(
                "{:?}",
                self.name
            )));
        }
        let mut names = BTreeSet::new();
        let mut destinations = BTreeSet::new();
        for spec in &self.resource_specs {
            if !names.insert(spec.name()) {
                return Err(ConfigurationError::DuplicateResource {
                    algorithm: self.name.clone(),
                    name: spec.name().to_string(),
                });
            }
            let entry = spec.normalize();
            validate_destination(&entry.destination)?;
            if !destinations.insert(entry.destination.clone()) {
                return Err(ConfigurationError::DuplicateDestination {
                    algorithm: self.name.clone(),
                    destination: entry.destination,
                });
            }
        }
        let mut revision = self.revision;
        revision.build_options = self.build_options.unwrap_or_default();
        let driver_options = merge_driver_options(&self.driver_options.unwrap_or_default());
        Ok(AlgorithmConfig {
            name: self.name,
            revision,
            driver_options,
            component_options: self.component_options,
            resource_specs: self.resource_specs,
            callbacks: self.callbacks,
        })
    }
}

fn option_flag(option: &str) -> &str {
    option.split_once('=').map_or(option, |(flag, _)| flag)
}

/// Prepends every default whose flag the caller did not pass, then appends
/// the caller's options unchanged.
pub fn merge_driver_options(options: &[String]) -> Vec<String> {
    let given: BTreeSet<&str> = options
        .iter()
        .filter(|o| o.starts_with("--"))
        .map(|o| option_flag(o))
        .collect();
    let mut merged = Vec::new();
    for (flag, value) in DEFAULT_DRIVER_OPTIONS {
        if given.contains(flag) {
            continue;
        }
        merged.push(flag.to_string());
        if let Some(value) = value {
            merged.push(value.to_string());
        }
    }
    merged.extend(options.iter().cloned());
    merged
}

/// Runs each callback once, in declaration order. The first error is
/// returned as is and the remaining callbacks are not invoked.
pub fn apply_callbacks(callbacks: &[RunCallback], run: &mut Run) -> Result<()> {
    for callback in callbacks {
        callback(run)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn merge_prepends_all_defaults_when_none_given() {
        assert_eq!(
            merge_driver_options(&strings(&["--debug"])),
            strings(&[
                "--validate",
                "--overall-time-limit",
                "30m",
                "--overall-memory-limit",
                "3584M",
                "--debug"
            ])
        );
    }

    #[test]
    fn merge_lets_given_flag_suppress_its_default() {
        let merged = merge_driver_options(&strings(&[
            "--alias",
            "seq-saq-lama-2011",
            "--overall-time-limit",
            "5m",
        ]));
        assert_eq!(
            merged,
            strings(&[
                "--validate",
                "--overall-memory-limit",
                "3584M",
                "--alias",
                "seq-saq-lama-2011",
                "--overall-time-limit",
                "5m"
            ])
        );
        let merged = merge_driver_options(&strings(&["--overall-memory-limit=2G", "--validate"]));
        assert_eq!(
            merged,
            strings(&["--overall-time-limit", "30m", "--overall-memory-limit=2G", "--validate"])
        );
    }

    #[test]
    fn into_config_rejects_empty_name_and_duplicate_resources() {
        let err = AlgorithmSpec::new(" ", RevisionRef::new("repo", "tip"), vec![])
            .into_config()
            .expect_err("empty name");
        assert!(matches!(err, ConfigurationError::InvalidAlgorithmName(_)));

        let err = AlgorithmSpec::new("a", RevisionRef::new("repo", "tip"), vec![])
            .resource("graph")
            .resource(("graph", "other.bin"))
            .into_config()
            .expect_err("duplicate resource");
        assert!(matches!(err, ConfigurationError::DuplicateResource { .. }));
    }

    #[test]
    fn into_config_rejects_shared_destinations() {
        let err = AlgorithmSpec::new("a", RevisionRef::new("repo", "tip"), vec![])
            .resource(("x", "a.bin", false, "same"))
            .resource(("y", "b.bin", false, "same"))
            .into_config()
            .expect_err("shared destination");
        match err {
            ConfigurationError::DuplicateDestination { algorithm, destination } => {
                assert_eq!(algorithm, "a");
                assert_eq!(destination, "same");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // A defaulted destination collides with an explicit one as well.
        let err = AlgorithmSpec::new("a", RevisionRef::new("repo", "tip"), vec![])
            .resource("graph.bin")
            .resource(("other", "other.bin", true, "graph.bin"))
            .into_config()
            .expect_err("shared defaulted destination");
        assert!(matches!(err, ConfigurationError::DuplicateDestination { .. }));
    }

    #[test]
    fn into_config_rejects_destinations_leaving_the_run_dir() {
        for destination in ["../../../escaped.bin", "/tmp/escaped.bin", "sub/../../x", "."] {
            let err = AlgorithmSpec::new("a", RevisionRef::new("repo", "tip"), vec![])
                .resource(("x", "a.bin", true, destination))
                .into_config()
                .expect_err(destination);
            match err {
                ConfigurationError::ResourceField { field, .. } => {
                    assert_eq!(field, "destination_name", "{}", destination)
                }
                other => panic!("unexpected error for {}: {:?}", destination, other),
            }
        }
        // A defaulted destination is the source path and gets the same check.
        let err = AlgorithmSpec::new("a", RevisionRef::new("repo", "tip"), vec![])
            .resource(("x", "../shared/graph.bin", true))
            .into_config()
            .expect_err("defaulted destination follows the source");
        assert!(matches!(err, ConfigurationError::ResourceField { .. }));
        AlgorithmSpec::new("a", RevisionRef::new("repo", "tip"), vec![])
            .resource(("x", "../shared/graph.bin", true, "graph.bin"))
            .resource(("y", "sub/level", false))
            .into_config()
            .expect("nested and explicit destinations");
    }

    #[test]
    fn into_config_stores_build_options_on_revision() {
        let config = AlgorithmSpec::new("ff", RevisionRef::new("repo", "default"), vec![])
            .build_options(strings(&["release64"]))
            .into_config()
            .expect("config");
        assert_eq!(config.revision.build_options, strings(&["release64"]));
        assert_eq!(config.revision.rev, "default");
    }

    #[test]
    fn callbacks_run_in_order_and_stop_on_error() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let (c1, c2, c3) = (calls.clone(), calls.clone(), calls.clone());
        let config = AlgorithmSpec::new("a", RevisionRef::new("repo", "tip"), vec![])
            .callback(move |_| {
                c1.borrow_mut().push("cb1");
                Ok(())
            })
            .callback(move |_| {
                c2.borrow_mut().push("cb2");
                Err(anyhow!("boom"))
            })
            .callback(move |_| {
                c3.borrow_mut().push("cb3");
                Ok(())
            })
            .into_config()
            .expect("config");
        let task = Task::new("d", "p.pddl", "domain.pddl", "p.pddl");
        let mut run = Run::new("exp", &config, &task);
        let err = apply_callbacks(&config.callbacks, &mut run).expect_err("callback error");
        assert_eq!(err.to_string(), "boom");
        assert_eq!(*calls.borrow(), vec!["cb1", "cb2"]);
    }
}
