use crate::resources::validate_destination;
use crate::run::Run;
use anyhow::{anyhow, Result};
use chrono::Utc;
use serde_json::json;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

const RUNS_PER_GROUP: usize = 100;

#[derive(Debug, Clone)]
pub struct StagedRun {
    pub run_id: String,
    pub run_dir: PathBuf,
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let ts = Utc::now().timestamp_micros();
    let pid = std::process::id();
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("tmpfile");
    let tmp = path.with_file_name(format!(".{}.tmp.{}.{}", name, pid, ts));
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Directory of the run with 1-based `index`, grouped 100 runs per parent:
/// `runs-00001-00100/00001`. Index 0 is treated as 1.
pub(crate) fn run_dir_for(out_dir: &Path, index: usize) -> PathBuf {
    let index = index.max(1);
    let min = ((index - 1) / RUNS_PER_GROUP) * RUNS_PER_GROUP + 1;
    let max = min + RUNS_PER_GROUP - 1;
    out_dir
        .join(format!("runs-{:05}-{:05}", min, max))
        .join(format!("{:05}", index))
}

fn link_resource(source: &Path, target: &Path, as_symlink: bool) -> Result<()> {
    if let Some(parent) = target.parent() {
        ensure_dir(parent)?;
    }
    #[cfg(unix)]
    {
        if as_symlink {
            symlink(source, target)?;
            return Ok(());
        }
    }
    #[cfg(not(unix))]
    let _ = as_symlink;
    fs::copy(source, target)?;
    Ok(())
}

fn write_run_dir(run: &Run, run_dir: &Path, staged_at: &str) -> Result<()> {
    for (name, resource) in &run.resources {
        let stage_err = |e: anyhow::Error| {
            anyhow!(
                "failed to stage resource {} for {}: {}",
                name,
                run.id_string(),
                e
            )
        };
        validate_destination(&resource.destination).map_err(|e| stage_err(e.into()))?;
        let target = run_dir.join(&resource.destination);
        link_resource(&resource.source, &target, resource.symlink).map_err(stage_err)?;
    }
    let mut props = run.properties_json();
    if let Some(map) = props.as_object_mut() {
        map.insert("run_dir".to_string(), json!(run_dir.to_string_lossy()));
        map.insert("staged_at".to_string(), json!(staged_at));
    }
    atomic_write_bytes(
        &run_dir.join("properties.json"),
        &serde_json::to_vec_pretty(&props)?,
    )
}

/// Writes one directory per run holding its resources (under their
/// destination names) and a `properties.json`. Runs are numbered in order,
/// starting at 1. Existing run directories are never overwritten, and a run
/// directory that fails halfway is removed again.
pub fn stage_runs(runs: &[Run], out_dir: &Path) -> Result<Vec<StagedRun>> {
    let staged_at = Utc::now().to_rfc3339();
    let mut staged = Vec::with_capacity(runs.len());
    for (i, run) in runs.iter().enumerate() {
        let run_dir = run_dir_for(out_dir, i + 1);
        if run_dir.exists() {
            return Err(anyhow!("run directory already exists: {}", run_dir.display()));
        }
        ensure_dir(&run_dir)?;
        if let Err(err) = write_run_dir(run, &run_dir, &staged_at) {
            let _ = fs::remove_dir_all(&run_dir);
            return Err(err);
        }
        tracing::debug!(run = %run.id_string(), dir = %run_dir.display(), "staged run");
        staged.push(StagedRun {
            run_id: run.id_string(),
            run_dir,
        });
    }
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{AlgorithmSpec, RevisionRef};
    use crate::task::Task;
    use serde_json::Value;

    #[test]
    fn run_dirs_are_grouped_by_hundred() {
        let out = Path::new("/exp");
        assert_eq!(run_dir_for(out, 1), out.join("runs-00001-00100/00001"));
        assert_eq!(run_dir_for(out, 100), out.join("runs-00001-00100/00100"));
        assert_eq!(run_dir_for(out, 101), out.join("runs-00101-00200/00101"));
        assert_eq!(run_dir_for(out, 0), out.join("runs-00001-00100/00001"));
    }

    fn gripper_run(root: &Path) -> (Run, PathBuf) {
        let task_dir = root.join("bench").join("gripper");
        ensure_dir(&task_dir).expect("task dir");
        for name in ["a.bin", "b.bin"] {
            fs::write(task_dir.join(name), name).expect("resource");
        }
        let task = Task::new(
            "gripper",
            "p01.pddl",
            task_dir.join("domain.pddl"),
            task_dir.join("p01.pddl"),
        );
        let algo = AlgorithmSpec::new("A", RevisionRef::new("repo", "tip"), vec![])
            .into_config()
            .expect("config");
        (Run::new("exp", &algo, &task), task_dir)
    }

    #[cfg(unix)]
    #[test]
    fn failed_stage_removes_run_dir_so_retry_succeeds() {
        let root = tempfile::tempdir().expect("tempdir");
        let (mut run, task_dir) = gripper_run(root.path());
        // Resources added by callbacks skip registration checks.
        run.add_resource("x", task_dir.join("a.bin"), "same", true);
        run.add_resource("y", task_dir.join("b.bin"), "same", true);

        let out = root.path().join("out");
        let err = stage_runs(&[run.clone()], &out).expect_err("shared destination");
        assert!(err.to_string().contains("failed to stage resource y"), "{}", err);
        assert!(!run_dir_for(&out, 1).exists(), "partial run dir left behind");

        run.resources.remove("y");
        let staged = stage_runs(&[run], &out).expect("retry");
        assert!(staged[0].run_dir.join("same").exists());
    }

    #[test]
    fn stage_refuses_destination_outside_run_dir() {
        let root = tempfile::tempdir().expect("tempdir");
        let (mut run, task_dir) = gripper_run(root.path());
        run.add_resource("x", task_dir.join("a.bin"), "../../../escaped.bin", true);

        let out = root.path().join("out");
        let err = stage_runs(&[run], &out).expect_err("escaping destination");
        assert!(err.to_string().contains("run directory"), "{}", err);
        assert!(!out.join("escaped.bin").exists());
        assert!(!root.path().join("escaped.bin").exists());
        assert!(!run_dir_for(&out, 1).exists());
    }

    #[cfg(unix)]
    #[test]
    fn stage_runs_links_resources_and_writes_properties() {
        let root = tempfile::tempdir().expect("tempdir");
        let task_dir = root.path().join("bench").join("gripper");
        ensure_dir(&task_dir).expect("task dir");
        fs::write(task_dir.join("graph.bin"), "graph").expect("resource");
        let task = Task::new(
            "gripper",
            "p01.pddl",
            task_dir.join("domain.pddl"),
            task_dir.join("p01.pddl"),
        );
        let algo = AlgorithmSpec::new("lmcut", RevisionRef::new("repo", "tip"), vec![])
            .into_config()
            .expect("config");
        let mut run = Run::new("exp", &algo, &task);
        run.add_resource("lmgraph", task_dir.join("graph.bin"), "lmgraph.bin", true);

        let out = root.path().join("out");
        let staged = stage_runs(&[run.clone()], &out).expect("stage");
        assert_eq!(staged.len(), 1);
        let run_dir = &staged[0].run_dir;
        let link = run_dir.join("lmgraph.bin");
        assert!(fs::symlink_metadata(&link).expect("link").file_type().is_symlink());
        assert_eq!(fs::read_link(&link).expect("target"), task_dir.join("graph.bin"));

        let props: Value =
            serde_json::from_slice(&fs::read(run_dir.join("properties.json")).expect("read"))
                .expect("json");
        assert_eq!(props["id"], json!(["lmcut", "gripper", "p01.pddl"]));
        assert_eq!(props["algorithm"], json!("lmcut"));
        assert!(props["staged_at"].is_string());

        let err = stage_runs(&[run], &out).expect_err("refuses existing dir");
        assert!(err.to_string().contains("already exists"), "{}", err);
    }
}
