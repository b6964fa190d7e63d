use anyhow::Result;
use clap::{Parser, Subcommand};
use dynlab_runner::{Assembly, ConfigurationError, Experiment, StagedRun};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "dynlab", version = "0.3.0", about = "Planner experiment run assembly")]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble runs and print a summary
    Assemble {
        experiment: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Assemble runs and write their directories
    Stage {
        experiment: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let json_mode = command_json_mode(&cli.command);
    match run_command(cli.command) {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                let code = if err.downcast_ref::<ConfigurationError>().is_some() {
                    "configuration_error"
                } else {
                    "command_failed"
                };
                emit_json(&json_error(code, err.to_string(), json!({})));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Assemble { experiment, json } => {
            let (exp, assembly) = assemble(&experiment)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "assemble",
                    "summary": assembly_to_json(&exp, &assembly),
                    "runs": assembly.runs.iter().map(|r| r.properties_json()).collect::<Vec<_>>(),
                })));
            }
            print_summary(&exp, &assembly);
        }
        Commands::Stage {
            experiment,
            out,
            json,
        } => {
            let (exp, assembly) = assemble(&experiment)?;
            let staged = dynlab_runner::stage_runs(&assembly.runs, &out)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "stage",
                    "summary": assembly_to_json(&exp, &assembly),
                    "out": out.display().to_string(),
                    "staged": staged.iter().map(staged_to_json).collect::<Vec<_>>(),
                })));
            }
            print_summary(&exp, &assembly);
            println!("staged: {} runs in {}", staged.len(), out.display());
        }
    }
    Ok(None)
}

fn assemble(path: &Path) -> Result<(Experiment, Assembly)> {
    let exp = dynlab_runner::load_experiment(path)?;
    let assembly = exp.assemble_runs()?;
    Ok((exp, assembly))
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\",\"details\":{{}}}}}}"
        ),
    }
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Assemble { json, .. } | Commands::Stage { json, .. } => *json,
    }
}

fn assembly_to_json(exp: &Experiment, assembly: &Assembly) -> Value {
    json!({
        "experiment": exp.name,
        "algorithms": exp.algorithms().iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
        "task_count": exp.tasks().len(),
        "run_count": assembly.runs.len(),
        "skipped": assembly.skipped,
        "missing_resources": assembly.missing,
    })
}

fn staged_to_json(staged: &StagedRun) -> Value {
    json!({
        "run_id": staged.run_id,
        "run_dir": staged.run_dir.display().to_string(),
    })
}

fn print_summary(exp: &Experiment, assembly: &Assembly) {
    println!("experiment: {}", exp.name);
    println!("algorithms: {}", exp.algorithms().len());
    println!("tasks: {}", exp.tasks().len());
    println!("runs: {}", assembly.runs.len());
    println!("skipped: {}", assembly.skipped.len());
    println!("missing_resources: {}", assembly.missing.len());
}
