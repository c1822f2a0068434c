use crate::job::Job;
use crate::seed::{seed_at, Clock};
use anyhow::{anyhow, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildOutput {
    Null,
    Inherit,
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub parallelism: usize,
    pub poll_interval: Duration,
    pub dispatch_delay: Duration,
    pub working_dir: PathBuf,
    pub output: ChildOutput,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            parallelism: 8,
            poll_interval: Duration::from_secs(60),
            dispatch_delay: Duration::from_secs(1),
            working_dir: PathBuf::from("RAWSimO.CLI"),
            output: ChildOutput::Null,
        }
    }
}

pub trait ChildProcess {
    fn has_exited(&mut self) -> Result<bool>;
}

impl ChildProcess for Child {
    fn has_exited(&mut self) -> Result<bool> {
        Ok(self.try_wait()?.is_some())
    }
}

pub trait Spawner {
    type Child: ChildProcess;

    fn spawn(
        &mut self,
        command: &[String],
        working_dir: &Path,
        output: ChildOutput,
    ) -> Result<Self::Child>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OsSpawner;

impl Spawner for OsSpawner {
    type Child = Child;

    fn spawn(
        &mut self,
        command: &[String],
        working_dir: &Path,
        output: ChildOutput,
    ) -> Result<Child> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("cannot spawn an empty command"))?;
        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.current_dir(working_dir);
        cmd.stdin(Stdio::null());
        match output {
            ChildOutput::Null => {
                cmd.stdout(Stdio::null());
                cmd.stderr(Stdio::inherit());
            }
            ChildOutput::Inherit => {
                cmd.stdout(Stdio::inherit());
                cmd.stderr(Stdio::inherit());
            }
        }
        cmd.spawn().map_err(|e| {
            anyhow!(
                "failed to spawn '{}' in {}: {}",
                program,
                working_dir.display(),
                e
            )
        })
    }
}

struct ActiveJob<C> {
    index: usize,
    seed: String,
    child: C,
}

pub struct LaunchSummary {
    pub total_jobs: usize,
    pub dispatched: usize,
    pub elapsed: Duration,
}

pub struct Launcher<S: Spawner = OsSpawner> {
    jobs: Vec<Job>,
    next: usize,
    active: Vec<ActiveJob<S::Child>>,
    options: LaunchOptions,
    spawner: S,
    clock: Clock,
}

impl Launcher<OsSpawner> {
    pub fn new(jobs: Vec<Job>, options: LaunchOptions) -> Result<Self> {
        Launcher::with_spawner(jobs, options, OsSpawner)
    }
}

impl<S: Spawner> Launcher<S> {
    pub fn with_spawner(jobs: Vec<Job>, options: LaunchOptions, spawner: S) -> Result<Self> {
        if options.parallelism == 0 {
            return Err(anyhow!("parallelism must be at least 1"));
        }
        Ok(Self {
            jobs,
            next: 0,
            active: Vec::new(),
            options,
            spawner,
            clock: Utc::now,
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn total_jobs(&self) -> usize {
        self.jobs.len()
    }

    pub fn dispatched(&self) -> usize {
        self.next
    }

    pub fn remaining(&self) -> usize {
        self.jobs.len() - self.next
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn active_indices(&self) -> Vec<usize> {
        self.active.iter().map(|a| a.index).collect()
    }

    pub fn is_finished(&self) -> bool {
        self.active.is_empty() && self.next == self.jobs.len()
    }

    pub fn dispatch_next(&mut self) -> Result<()> {
        let index = self.next;
        let job = self
            .jobs
            .get(index)
            .ok_or_else(|| anyhow!("no undispatched job remains"))?;
        let seed = seed_at((self.clock)());
        let command = job.command_with_seed(&seed);
        let child = self
            .spawner
            .spawn(&command, &self.options.working_dir, self.options.output)?;
        info!(
            position = index + 1,
            total = self.jobs.len(),
            iteration = job.iteration,
            seed = %seed,
            "({}/{}) started {}",
            index + 1,
            self.jobs.len(),
            job.triple
        );
        self.next += 1;
        self.active.push(ActiveJob { index, seed, child });
        Ok(())
    }

    pub fn reap(&mut self) -> Result<usize> {
        let mut reaped = 0;
        for i in (0..self.active.len()).rev() {
            if self.active[i].child.has_exited()? {
                let done = self.active.remove(i);
                debug!(
                    position = done.index + 1,
                    seed = %done.seed,
                    instance = %self.jobs[done.index].triple.instance,
                    "process exited"
                );
                reaped += 1;
            }
        }
        Ok(reaped)
    }

    pub fn reap_and_refill(&mut self) -> Result<()> {
        self.reap()?;
        while self.active.len() < self.options.parallelism && self.next < self.jobs.len() {
            thread::sleep(self.options.dispatch_delay);
            self.dispatch_next()?;
        }
        Ok(())
    }

    pub fn run(mut self) -> Result<LaunchSummary> {
        let started = Instant::now();
        info!(
            jobs = self.jobs.len(),
            parallelism = self.options.parallelism,
            "launching sweep"
        );
        self.reap_and_refill()?;
        while !self.active.is_empty() {
            thread::sleep(self.options.poll_interval);
            self.reap_and_refill()?;
        }
        let summary = LaunchSummary {
            total_jobs: self.jobs.len(),
            dispatched: self.next,
            elapsed: started.elapsed(),
        };
        info!(
            dispatched = summary.dispatched,
            elapsed_secs = summary.elapsed.as_secs(),
            "sweep finished"
        );
        Ok(summary)
    }
}
