pub mod alert;
pub mod files;
pub mod footprints;
pub mod job;
pub mod launcher;
pub mod layout;
pub mod seed;

pub use job::{Job, OutputLayout, SweepPaths, Triple};
pub use launcher::{ChildOutput, LaunchOptions, LaunchSummary, Launcher};

use anyhow::{anyhow, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SweepDefinition {
    pub instances: Vec<String>,
    pub bot_counts: Vec<u32>,
    pub settings: Vec<String>,
    pub controllers: Vec<String>,
    pub iterations: usize,
    pub paths: SweepPaths,
    pub layout: OutputLayout,
}

impl SweepDefinition {
    pub fn triples(&self) -> Vec<Triple> {
        let instances = job::expand_bot_counts(&self.instances, &self.bot_counts);
        job::cartesian_triples(&instances, &self.settings, &self.controllers)
    }

    pub fn jobs(&self) -> Result<Vec<Job>> {
        let triples = self.triples();
        if triples.is_empty() {
            return Err(anyhow!(
                "sweep is empty: instances, settings and controllers must each name at least one entry"
            ));
        }
        job::build_job_queue(self.iterations, &triples, &self.paths, self.layout)
    }
}

pub struct SweepSummary {
    pub triples: usize,
    pub iterations: usize,
    pub total_jobs: usize,
    pub layout: OutputLayout,
    pub output_dirs: Vec<PathBuf>,
    pub jobs: Vec<Job>,
}

pub fn describe_sweep(definition: &SweepDefinition) -> Result<SweepSummary> {
    let jobs = definition.jobs()?;
    let mut output_dirs: Vec<PathBuf> = Vec::new();
    for job in &jobs {
        if !output_dirs.contains(&job.output_dir) {
            output_dirs.push(job.output_dir.clone());
        }
    }
    Ok(SweepSummary {
        triples: definition.triples().len(),
        iterations: definition.iterations,
        total_jobs: jobs.len(),
        layout: definition.layout,
        output_dirs,
        jobs,
    })
}

pub fn run_sweep(definition: &SweepDefinition, options: LaunchOptions) -> Result<LaunchSummary> {
    let jobs = definition.jobs()?;
    Launcher::new(jobs, options)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn definition() -> SweepDefinition {
        SweepDefinition {
            instances: names(&["Sv5"]),
            bot_counts: vec![10, 20, 30],
            settings: names(&["JOSi1000o500"]),
            controllers: names(&["HADODn", "SEQUn"]),
            iterations: 2,
            paths: SweepPaths::default(),
            layout: OutputLayout::PerBaseInstance,
        }
    }

    #[test]
    fn describe_counts_iterations_times_triples() {
        let summary = describe_sweep(&definition()).expect("describe");
        assert_eq!(summary.triples, 6);
        assert_eq!(summary.total_jobs, 12);
        assert_eq!(summary.jobs.len(), 12);
        assert_eq!(
            summary.output_dirs,
            vec![SweepPaths::default().experiment_dir.join("Sv5")]
        );
    }

    #[test]
    fn empty_grid_is_rejected() {
        let mut def = definition();
        def.controllers.clear();
        assert!(def.jobs().is_err());
    }

    #[test]
    fn zero_iterations_yield_no_jobs() {
        let mut def = definition();
        def.iterations = 0;
        assert!(def.jobs().expect("jobs").is_empty());
    }
}
