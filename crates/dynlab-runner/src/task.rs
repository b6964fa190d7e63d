use crate::error::ConfigurationError;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One planning problem: a problem file plus the domain file it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub domain: String,
    pub problem: String,
    pub domain_file: PathBuf,
    pub problem_file: PathBuf,
}

impl Task {
    pub fn new(
        domain: impl Into<String>,
        problem: impl Into<String>,
        domain_file: impl Into<PathBuf>,
        problem_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            domain: domain.into(),
            problem: problem.into(),
            domain_file: domain_file.into(),
            problem_file: problem_file.into(),
        }
    }

    /// Directory that resource paths are relative to.
    pub fn resource_dir(&self) -> &Path {
        match self.problem_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

/// A suite selector: either a whole domain or a single `domain:problem`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuiteEntry {
    Domain(String),
    Problem { domain: String, problem: String },
}

pub fn parse_suite_entry(raw: &str) -> Result<SuiteEntry, ConfigurationError> {
    let raw = raw.trim();
    match raw.split_once(':') {
        Some((domain, problem)) if !domain.is_empty() && !problem.is_empty() => {
            Ok(SuiteEntry::Problem {
                domain: domain.to_string(),
                problem: problem.to_string(),
            })
        }
        None if !raw.is_empty() => Ok(SuiteEntry::Domain(raw.to_string())),
        _ => Err(ConfigurationError::Experiment(format!(
            "invalid suite entry '{}': expected domain or domain:problem",
            raw
        ))),
    }
}

fn is_problem_file(name: &str) -> bool {
    !name.contains("domain") && (name.ends_with(".pddl") || name.ends_with(".sas"))
}

/// Lists problem files of a domain directory in name order.
fn domain_problems(domain_dir: &Path) -> Result<Vec<String>> {
    if !domain_dir.is_dir() {
        return Err(anyhow!("domain directory not found: {}", domain_dir.display()));
    }
    let mut problems = Vec::new();
    for entry in walkdir::WalkDir::new(domain_dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if is_problem_file(name) {
                problems.push(name.to_string());
            }
        }
    }
    problems.sort();
    Ok(problems)
}

pub fn find_domain_file(
    benchmarks_dir: &Path,
    domain: &str,
    problem: &str,
) -> Result<PathBuf, ConfigurationError> {
    let dir = benchmarks_dir.join(domain);
    let prefix: String = problem.chars().take(4).collect();
    let candidates = [
        "domain.pddl".to_string(),
        format!("{}domain.pddl", prefix),
        format!("domain_{}", problem),
        format!("domain-{}", problem),
    ];
    candidates
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| ConfigurationError::MissingDomainFile {
            domain: domain.to_string(),
            problem: problem.to_string(),
            dir,
        })
}

/// Expands suite selectors into tasks, keeping selector order.
pub fn discover_tasks(benchmarks_dir: &Path, suite: &[SuiteEntry]) -> Result<Vec<Task>> {
    let mut tasks = Vec::new();
    for entry in suite {
        let (domain, problems) = match entry {
            SuiteEntry::Domain(domain) => {
                (domain, domain_problems(&benchmarks_dir.join(domain))?)
            }
            SuiteEntry::Problem { domain, problem } => (domain, vec![problem.clone()]),
        };
        for problem in problems {
            let problem_file = benchmarks_dir.join(domain).join(&problem);
            if !problem_file.is_file() {
                return Err(anyhow!("problem file not found: {}", problem_file.display()));
            }
            let domain_file = find_domain_file(benchmarks_dir, domain, &problem)?;
            tasks.push(Task::new(domain.clone(), problem, domain_file, problem_file));
        }
    }
    Ok(tasks)
}
