use anyhow::{anyhow, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub const INSTANCE_EXTENSION: &str = "xlayo";
pub const SETTING_EXTENSION: &str = "xsett";
pub const CONTROLLER_EXTENSION: &str = "xconf";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Triple {
    pub instance: String,
    pub setting: String,
    pub controller: String,
}

impl Triple {
    pub fn new(
        instance: impl Into<String>,
        setting: impl Into<String>,
        controller: impl Into<String>,
    ) -> Self {
        Self {
            instance: instance.into(),
            setting: setting.into(),
            controller: controller.into(),
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.instance, self.setting, self.controller)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    Flat,
    PerBaseInstance,
}

impl OutputLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputLayout::Flat => "flat",
            OutputLayout::PerBaseInstance => "per_base_instance",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SweepPaths {
    pub instance_dir: PathBuf,
    pub setting_dir: PathBuf,
    pub controller_dir: PathBuf,
    pub experiment_dir: PathBuf,
    pub program: Vec<String>,
}

impl Default for SweepPaths {
    fn default() -> Self {
        Self {
            instance_dir: PathBuf::from("Material/Instances/SquareLayouts"),
            setting_dir: PathBuf::from("Material/configFiles"),
            controller_dir: PathBuf::from("Material/configFiles"),
            experiment_dir: PathBuf::from("results"),
            program: vec!["dotnet".to_string(), "run".to_string()],
        }
    }
}

/// A single simulator invocation. The seed is not part of `args`; it is
/// appended when the job is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub iteration: usize,
    pub triple: Triple,
    pub args: Vec<String>,
    pub output_dir: PathBuf,
}

impl Job {
    pub fn command_with_seed(&self, seed: &str) -> Vec<String> {
        let mut command = self.args.clone();
        command.push(seed.to_string());
        command
    }
}

pub fn base_instance_name(name: &str) -> Option<&str> {
    let trimmed = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if trimmed.len() == name.len() {
        return None;
    }
    let base = trimmed.strip_suffix('r')?;
    if base.is_empty() {
        None
    } else {
        Some(base)
    }
}

pub fn expand_bot_counts(instances: &[String], bot_counts: &[u32]) -> Vec<String> {
    if bot_counts.is_empty() {
        return instances.to_vec();
    }
    let mut out = Vec::with_capacity(instances.len() * bot_counts.len());
    for instance in instances {
        for count in bot_counts {
            out.push(format!("{}r{}", instance, count));
        }
    }
    out
}

pub fn cartesian_triples(
    instances: &[String],
    settings: &[String],
    controllers: &[String],
) -> Vec<Triple> {
    let mut out = Vec::new();
    for instance in instances {
        for setting in settings {
            for controller in controllers {
                out.push(Triple::new(instance, setting, controller));
            }
        }
    }
    out
}

fn named_file(dir: &Path, name: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, extension))
}

pub fn output_dir_for(experiment_dir: &Path, instance: &str, layout: OutputLayout) -> PathBuf {
    match layout {
        OutputLayout::Flat => experiment_dir.to_path_buf(),
        OutputLayout::PerBaseInstance => {
            experiment_dir.join(base_instance_name(instance).unwrap_or(instance))
        }
    }
}

pub fn build_job_queue(
    iterations: usize,
    triples: &[Triple],
    paths: &SweepPaths,
    layout: OutputLayout,
) -> Result<Vec<Job>> {
    if paths.program.is_empty() {
        return Err(anyhow!("simulator program must not be empty"));
    }
    let mut jobs = Vec::with_capacity(iterations * triples.len());
    for iteration in 0..iterations {
        for triple in triples {
            let output_dir = output_dir_for(&paths.experiment_dir, &triple.instance, layout);
            let mut args = paths.program.clone();
            args.push(path_arg(&named_file(
                &paths.instance_dir,
                &triple.instance,
                INSTANCE_EXTENSION,
            )));
            args.push(path_arg(&named_file(
                &paths.setting_dir,
                &triple.setting,
                SETTING_EXTENSION,
            )));
            args.push(path_arg(&named_file(
                &paths.controller_dir,
                &triple.controller,
                CONTROLLER_EXTENSION,
            )));
            args.push(path_arg(&output_dir));
            jobs.push(Job {
                iteration,
                triple: triple.clone(),
                args,
                output_dir,
            });
        }
    }
    Ok(jobs)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
