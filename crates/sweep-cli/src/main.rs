use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use sweep_runner::footprints::{self, FootprintError};
use sweep_runner::layout::{self, BotCountRange};
use sweep_runner::{
    files, ChildOutput, LaunchOptions, OutputLayout, SweepDefinition, SweepPaths,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "rawsim-sweep",
    version,
    about = "Parameter sweeps and footprint reports for the RAWSim-O simulator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct SweepArgs {
    #[arg(long, value_delimiter = ',', default_value = "Sv5")]
    instances: Vec<String>,
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "10,20,30,40,50,60,70,80,90,100"
    )]
    bot_counts: Vec<u32>,
    #[arg(long, conflicts_with = "bot_counts")]
    no_bot_counts: bool,
    #[arg(long, value_delimiter = ',', default_value = "JOSi1000o500")]
    settings: Vec<String>,
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "HADODn,SEQUn,SAIn,SEQUn,SAIn,SEQUn,SAIn"
    )]
    controllers: Vec<String>,
    #[arg(long, default_value_t = 1)]
    iterations: usize,
    #[arg(long, default_value = "Material/Instances/SquareLayouts")]
    instance_dir: PathBuf,
    #[arg(long, default_value = "Material/configFiles")]
    setting_dir: PathBuf,
    #[arg(long, default_value = "Material/configFiles")]
    controller_dir: PathBuf,
    #[arg(long, default_value = "results")]
    experiment_dir: PathBuf,
    #[arg(long, default_value = "dotnet")]
    program: String,
    #[arg(long = "program-arg", default_values_t = vec!["run".to_string()])]
    program_args: Vec<String>,
    #[arg(long)]
    flat_output: bool,
}

impl SweepArgs {
    fn definition(&self) -> SweepDefinition {
        let mut program = vec![self.program.clone()];
        program.extend(self.program_args.iter().cloned());
        SweepDefinition {
            instances: self.instances.clone(),
            bot_counts: if self.no_bot_counts {
                Vec::new()
            } else {
                self.bot_counts.clone()
            },
            settings: self.settings.clone(),
            controllers: self.controllers.clone(),
            iterations: self.iterations,
            paths: SweepPaths {
                instance_dir: self.instance_dir.clone(),
                setting_dir: self.setting_dir.clone(),
                controller_dir: self.controller_dir.clone(),
                experiment_dir: self.experiment_dir.clone(),
                program,
            },
            layout: if self.flat_output {
                OutputLayout::Flat
            } else {
                OutputLayout::PerBaseInstance
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    Run {
        #[command(flatten)]
        sweep: SweepArgs,
        #[arg(long, default_value_t = 8)]
        parallel: usize,
        #[arg(long, default_value = "RAWSimO.CLI")]
        working_dir: PathBuf,
        #[arg(long)]
        inherit_output: bool,
        #[arg(long, default_value_t = 60)]
        poll_interval_secs: u64,
        #[arg(long, default_value_t = 1)]
        dispatch_delay_secs: u64,
        #[arg(long)]
        alert: bool,
        #[arg(long)]
        json: bool,
    },
    Plan {
        #[command(flatten)]
        sweep: SweepArgs,
        #[arg(long)]
        json: bool,
    },
    LayoutVariants {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        #[arg(long, default_value = "*.xlayo")]
        pattern: String,
        #[arg(long, default_value_t = 10)]
        from: u32,
        #[arg(long, default_value_t = 100)]
        to: u32,
        #[arg(long, default_value_t = 10)]
        step: u32,
        #[arg(long)]
        json: bool,
    },
    FixInstances {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        #[arg(long, default_value = footprints::FOOTPRINT_FILE_NAME)]
        pattern: String,
        #[arg(long)]
        json: bool,
    },
    Report {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        #[arg(long, default_value = footprints::FOOTPRINT_FILE_NAME)]
        pattern: String,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let json_mode = command_json_mode(&cli.command);
    let result = run_command(cli.command);
    match result {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                emit_json(&json_error("command_failed", err.to_string(), json!({})));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Run {
            sweep,
            parallel,
            working_dir,
            inherit_output,
            poll_interval_secs,
            dispatch_delay_secs,
            alert,
            json,
        } => {
            let definition = sweep.definition();
            let plan = sweep_runner::describe_sweep(&definition)?;
            let options = LaunchOptions {
                parallelism: parallel,
                poll_interval: Duration::from_secs(poll_interval_secs),
                dispatch_delay: Duration::from_secs(dispatch_delay_secs),
                working_dir: working_dir.clone(),
                output: if inherit_output {
                    ChildOutput::Inherit
                } else {
                    ChildOutput::Null
                },
            };
            let result = sweep_runner::run_sweep(&definition, options)?;
            if alert {
                sweep_runner::alert::ring_completion()?;
            }
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "run",
                    "plan": plan_to_json(&plan, false)?,
                    "parallel": parallel,
                    "working_dir": working_dir.display().to_string(),
                    "dispatched": result.dispatched,
                    "elapsed_secs": result.elapsed.as_secs(),
                })));
            }
            print_plan(&plan);
            println!("parallel: {}", parallel);
            println!("dispatched: {}/{}", result.dispatched, result.total_jobs);
            println!("elapsed_secs: {}", result.elapsed.as_secs());
            println!("done");
        }
        Commands::Plan { sweep, json } => {
            let plan = sweep_runner::describe_sweep(&sweep.definition())?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "plan",
                    "plan": plan_to_json(&plan, true)?,
                })));
            }
            print_plan(&plan);
            for (i, job) in plan.jobs.iter().enumerate() {
                println!(
                    "({}/{}) iteration {} {}: {}",
                    i + 1,
                    plan.total_jobs,
                    job.iteration,
                    job.triple,
                    job.args.join(" ")
                );
            }
        }
        Commands::LayoutVariants {
            root,
            pattern,
            from,
            to,
            step,
            json,
        } => {
            let range = BotCountRange { from, to, step };
            let selection = files::select_files(&root, &pattern)?;
            let mut written = Vec::new();
            for path in &selection.files {
                println_unless(json, format!("generating variants of: {}", path.display()));
                written.extend(layout::generate_variants(path, &range)?);
            }
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "layout-variants",
                    "sources": paths_to_json(&selection.files),
                    "written": paths_to_json(&written),
                })));
            }
            println!("written: {}", written.len());
        }
        Commands::FixInstances {
            root,
            pattern,
            json,
        } => {
            let selection = files::select_files(&root, &pattern)?;
            let mut fixed = Vec::new();
            let mut skipped = Vec::new();
            for path in &selection.files {
                println_unless(json, format!("fixing: {}", path.display()));
                match footprints::fix_instances(path) {
                    Ok(_) => fixed.push(path.clone()),
                    Err(err @ FootprintError::MissingColumns { .. }) => {
                        warn!("{}", err);
                        skipped.push(path.clone());
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "fix-instances",
                    "fixed": paths_to_json(&fixed),
                    "skipped": paths_to_json(&skipped),
                })));
            }
            println!("fixed: {}", fixed.len());
            println!("skipped: {}", skipped.len());
        }
        Commands::Report {
            root,
            pattern,
            json,
        } => {
            let selection = files::select_files(&root, &pattern)?;
            let mut averages = Vec::new();
            let mut skipped = Vec::new();
            let mut summary = Vec::new();
            for path in &selection.files {
                println_unless(json, format!("processing: {}", path.display()));
                match footprints::report_file(path) {
                    Ok(report) => {
                        averages.push(report.averages_path);
                        summary.extend(report.summary_rows);
                    }
                    Err(err @ FootprintError::MissingColumns { .. }) => {
                        warn!("{}", err);
                        skipped.push(path.clone());
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            if averages.is_empty() {
                return Err(anyhow!(
                    "no footprint file under {} could be aggregated",
                    selection.folder.display()
                ));
            }
            let summary_path = footprints::summary_path_for(&selection.folder);
            println_unless(json, "creating summary".to_string());
            footprints::write_summary(&summary_path, &summary)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "report",
                    "averages": paths_to_json(&averages),
                    "skipped": paths_to_json(&skipped),
                    "summary": summary_path.display().to_string(),
                    "summary_rows": serde_json::to_value(&summary)?,
                })));
            }
            println!("summary: {}", summary_path.display());
            println!("done");
        }
    }
    Ok(None)
}

fn println_unless(json: bool, line: String) {
    if !json {
        println!("{}", line);
    }
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
        Commands::Run { json, .. }
        | Commands::Plan { json, .. }
        | Commands::LayoutVariants { json, .. }
        | Commands::FixInstances { json, .. }
        | Commands::Report { json, .. } => *json,
    }
}

fn paths_to_json(paths: &[PathBuf]) -> Value {
    json!(paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>())
}

fn plan_to_json(plan: &sweep_runner::SweepSummary, with_jobs: bool) -> Result<Value> {
    let mut value = json!({
        "triples": plan.triples,
        "iterations": plan.iterations,
        "total_jobs": plan.total_jobs,
        "output_layout": plan.layout,
        "output_dirs": paths_to_json(&plan.output_dirs),
    });
    if with_jobs {
        if let Some(obj) = value.as_object_mut() {
            obj.insert("jobs".to_string(), serde_json::to_value(&plan.jobs)?);
        }
    }
    Ok(value)
}

fn print_plan(plan: &sweep_runner::SweepSummary) {
    println!("triples: {}", plan.triples);
    println!("iterations: {}", plan.iterations);
    println!("total_jobs: {}", plan.total_jobs);
    println!("output_layout: {}", plan.layout.as_str());
    for dir in &plan.output_dirs {
        println!("output_dir: {}", dir.display());
    }
}
