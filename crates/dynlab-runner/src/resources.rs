//! Per-algorithm resource declarations and their resolution against a task.
//!
//! An algorithm may declare files that live next to each problem file
//! (precomputed graphs, level files, ...). Declarations come in an
//! abbreviated form with one to four fields; [`ResourceEntrySpec::normalize`]
//! expands them and [`resolve_resource`] looks them up for a concrete task.

use crate::error::ConfigurationError;
use crate::task::Task;
use serde::Serialize;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};

/// A resource declaration as written by the user.
///
/// Field order is `(name, source, strict, destination)`. `source` defaults to
/// `name`, `strict` to `false` and `destination` to `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceEntrySpec {
    Name(String),
    Source(String, String),
    Strict(String, String, bool),
    Full(String, String, bool, String),
}

/// Canonical form of a resource declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceEntry {
    pub name: String,
    pub source: String,
    pub strict: bool,
    pub destination: String,
}

impl ResourceEntrySpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name)
            | Self::Source(name, _)
            | Self::Strict(name, _, _)
            | Self::Full(name, _, _, _) => name,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Self::Name(_) => 1,
            Self::Source(..) => 2,
            Self::Strict(..) => 3,
            Self::Full(..) => 4,
        }
    }

    /// Every default is taken from the declared fields, never from a value
    /// that was itself defaulted.
    pub fn normalize(&self) -> ResourceEntry {
        let (name, source, strict, destination) = match self {
            Self::Name(name) => (name, name, false, name),
            Self::Source(name, source) => (name, source, false, source),
            Self::Strict(name, source, strict) => (name, source, *strict, source),
            Self::Full(name, source, strict, destination) => (name, source, *strict, destination),
        };
        ResourceEntry {
            name: name.clone(),
            source: source.clone(),
            strict,
            destination: destination.clone(),
        }
    }

    /// Parses a declaration from an experiment file. A bare string is the
    /// one-field form; otherwise a sequence of one to four items is expected.
    pub fn from_value(value: &Value) -> Result<Self, ConfigurationError> {
        let items = match value {
            Value::String(name) => return Ok(Self::Name(name.clone())),
            Value::Array(items) => items,
            other => {
                return Err(ConfigurationError::ResourceField {
                    field: "entry",
                    reason: format!("expected string or sequence, got {}", other),
                })
            }
        };
        match items.as_slice() {
            [name] => Ok(Self::Name(field_str(name, "resource_name")?)),
            [name, source] => Ok(Self::Source(
                field_str(name, "resource_name")?,
                field_str(source, "source_relative_path")?,
            )),
            [name, source, strict] => Ok(Self::Strict(
                field_str(name, "resource_name")?,
                field_str(source, "source_relative_path")?,
                field_bool(strict, "strict")?,
            )),
            [name, source, strict, destination] => Ok(Self::Full(
                field_str(name, "resource_name")?,
                field_str(source, "source_relative_path")?,
                field_bool(strict, "strict")?,
                field_str(destination, "destination_name")?,
            )),
            other => Err(ConfigurationError::ResourceArity(other.len())),
        }
    }
}

fn field_str(value: &Value, field: &'static str) -> Result<String, ConfigurationError> {
    match value.as_str() {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        Some(_) => Err(ConfigurationError::ResourceField {
            field,
            reason: "must not be empty".to_string(),
        }),
        None => Err(ConfigurationError::ResourceField {
            field,
            reason: format!("expected string, got {}", value),
        }),
    }
}

fn field_bool(value: &Value, field: &'static str) -> Result<bool, ConfigurationError> {
    value
        .as_bool()
        .ok_or_else(|| ConfigurationError::ResourceField {
            field,
            reason: format!("expected boolean, got {}", value),
        })
}

impl From<&str> for ResourceEntrySpec {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<(&str, &str)> for ResourceEntrySpec {
    fn from((name, source): (&str, &str)) -> Self {
        Self::Source(name.to_string(), source.to_string())
    }
}

impl From<(&str, &str, bool)> for ResourceEntrySpec {
    fn from((name, source, strict): (&str, &str, bool)) -> Self {
        Self::Strict(name.to_string(), source.to_string(), strict)
    }
}

impl From<(&str, &str, bool, &str)> for ResourceEntrySpec {
    fn from((name, source, strict, destination): (&str, &str, bool, &str)) -> Self {
        Self::Full(
            name.to_string(),
            source.to_string(),
            strict,
            destination.to_string(),
        )
    }
}

impl From<ResourceEntry> for ResourceEntrySpec {
    fn from(entry: ResourceEntry) -> Self {
        Self::Full(entry.name, entry.source, entry.strict, entry.destination)
    }
}

/// A destination names where the resource lands inside a run directory, so
/// it must be a relative path made of plain components only.
pub fn validate_destination(destination: &str) -> Result<(), ConfigurationError> {
    let path = Path::new(destination);
    let plain = path.components().count() > 0
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if plain {
        Ok(())
    } else {
        Err(ConfigurationError::ResourceField {
            field: "destination_name",
            reason: format!("'{}' must stay inside the run directory", destination),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachedResource {
    pub name: String,
    pub path: PathBuf,
    pub destination: String,
}

/// Outcome of looking up one resource for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Attached(AttachedResource),
    WarnedMissing { name: String, path: PathBuf },
    AbortRun { reason: String },
}

/// Resolves `entry` relative to the directory holding the task's problem
/// file. Only checks existence; nothing is created here.
pub fn resolve_resource(entry: &ResourceEntry, task: &Task) -> Resolution {
    let path = task.resource_dir().join(&entry.source);
    if path.exists() {
        Resolution::Attached(AttachedResource {
            name: entry.name.clone(),
            path,
            destination: entry.destination.clone(),
        })
    } else if entry.strict {
        Resolution::AbortRun {
            reason: format!("Missing {}", entry.name),
        }
    } else {
        Resolution::WarnedMissing {
            name: entry.name.clone(),
            path,
        }
    }
}
