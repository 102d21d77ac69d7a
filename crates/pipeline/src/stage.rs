//! External flow-routing steps and the runner that retries them
//!
//! A [`Stage`] is one opaque external step. [`StageRunner`] applies the same
//! policy to every stage: bounded retries with a fixed delay, first under a
//! parallel launcher (`srun`, `mpirun`) and then, once those attempts are
//! used up, without it.

use geofabric_core::{Error, Result};
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Launchers probed, in order, by [`Launcher::Auto`]
const LAUNCHERS: [&str; 2] = ["srun", "mpirun"];

/// How worker processes are started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launcher {
    /// First of `srun`, `mpirun` found on `PATH`
    Auto,
    Named(String),
    None,
}

impl Launcher {
    /// `auto`, `none` (or empty), otherwise the launcher program.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            v if v.eq_ignore_ascii_case("auto") => Launcher::Auto,
            v if v.is_empty() || v.eq_ignore_ascii_case("none") => Launcher::None,
            v => Launcher::Named(v.to_string()),
        }
    }

    /// The launcher program to use, if any.
    pub fn resolve(&self) -> Option<String> {
        match self {
            Launcher::Auto => LAUNCHERS
                .iter()
                .find(|name| find_on_path(name).is_some())
                .map(|name| name.to_string()),
            Launcher::Named(name) => Some(name.clone()),
            Launcher::None => None,
        }
    }
}

fn find_on_path(program: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Attempts per launcher mode and the pause between them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// What one attempt of a stage runs with
#[derive(Debug, Clone)]
pub struct StageContext {
    pub workers: usize,
    pub launcher: Option<String>,
    /// Directory searched for the stage program before `PATH`
    pub tool_dir: Option<PathBuf>,
}

/// Result of a successful attempt
#[derive(Debug, Clone, Default)]
pub struct StageOutputs {
    pub files: Vec<PathBuf>,
    pub stdout: String,
}

/// One external step
pub trait Stage {
    fn name(&self) -> &str;

    fn execute(&self, ctx: &StageContext) -> Result<StageOutputs>;

    /// Whether a successful run really produced its outputs.
    fn validate(&self, _outputs: &StageOutputs) -> bool {
        true
    }

    /// Non-retryable stages get one attempt per launcher mode.
    fn retryable(&self) -> bool {
        true
    }
}

/// An external program with arguments and the files it must produce
#[derive(Debug, Clone)]
pub struct CommandStage {
    name: String,
    program: String,
    args: Vec<OsString>,
    outputs: Vec<PathBuf>,
    retryable: bool,
}

impl CommandStage {
    /// A stage running `program`, named after it.
    pub fn new(program: &str) -> Self {
        Self {
            name: program.to_string(),
            program: program.to_string(),
            args: Vec::new(),
            outputs: Vec::new(),
            retryable: true,
        }
    }

    /// Flag followed by a value, e.g. `-thresh 100`.
    pub fn arg(mut self, flag: &str, value: impl AsRef<OsStr>) -> Self {
        self.args.push(flag.into());
        self.args.push(value.as_ref().to_os_string());
        self
    }

    /// Flag without value, e.g. `-nc`.
    pub fn switch(mut self, flag: &str) -> Self {
        self.args.push(flag.into());
        self
    }

    /// Flag followed by a path the stage must create.
    pub fn output(mut self, flag: &str, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.args.push(flag.into());
        self.args.push(path.clone().into_os_string());
        self.outputs.push(path);
        self
    }

    pub fn non_retryable(mut self) -> Self {
        self.retryable = false;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    fn program_path(&self, ctx: &StageContext) -> OsString {
        ctx.tool_dir
            .as_ref()
            .map(|dir| dir.join(&self.program))
            .filter(|p| p.is_file())
            .map(PathBuf::into_os_string)
            .unwrap_or_else(|| OsString::from(&self.program))
    }

    /// The full command line an attempt would run, for logging.
    pub fn command_line(&self, ctx: &StageContext) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(launcher) = &ctx.launcher {
            parts.extend([launcher.clone(), "-n".into(), ctx.workers.to_string()]);
        }
        parts.push(self.program_path(ctx).to_string_lossy().into_owned());
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}

impl Stage for CommandStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &StageContext) -> Result<StageOutputs> {
        let mut command = match &ctx.launcher {
            Some(launcher) => {
                let mut c = Command::new(launcher);
                c.arg("-n").arg(ctx.workers.to_string()).arg(self.program_path(ctx));
                c
            }
            None => Command::new(self.program_path(ctx)),
        };
        command.args(&self.args);

        info!("Running command: {}", self.command_line(ctx));
        let output = command.output()?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            return Err(Error::Other(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        debug!("Command output: {}", stdout.trim());
        Ok(StageOutputs {
            files: self.outputs.clone(),
            stdout,
        })
    }

    fn validate(&self, outputs: &StageOutputs) -> bool {
        outputs.files.iter().all(|p| p.exists())
    }

    fn retryable(&self) -> bool {
        self.retryable
    }
}

/// Runs stages under a retry policy with launcher fallback
#[derive(Debug, Clone)]
pub struct StageRunner {
    pub policy: RetryPolicy,
    pub launcher: Launcher,
    pub workers: usize,
    pub tool_dir: Option<PathBuf>,
}

impl StageRunner {
    pub fn new(policy: RetryPolicy, launcher: Launcher, workers: usize) -> Self {
        Self {
            policy,
            launcher,
            workers: workers.max(1),
            tool_dir: None,
        }
    }

    pub fn with_tool_dir(mut self, dir: Option<&Path>) -> Self {
        self.tool_dir = dir.map(Path::to_path_buf);
        self
    }

    /// Run one stage to success or [`Error::ExternalToolFailure`].
    pub fn run(&self, stage: &dyn Stage) -> Result<StageOutputs> {
        let per_mode = if stage.retryable() { self.policy.max_retries.max(1) } else { 1 };
        let mut launcher = self.launcher.resolve();
        let mut attempts = 0;
        let mut detail = String::new();

        loop {
            let ctx = StageContext {
                workers: self.workers,
                launcher: launcher.clone(),
                tool_dir: self.tool_dir.clone(),
            };
            for attempt in 1..=per_mode {
                attempts += 1;
                match stage.execute(&ctx) {
                    Ok(outputs) if stage.validate(&outputs) => {
                        info!("Completed step: {}", stage.name());
                        return Ok(outputs);
                    }
                    Ok(_) => detail = "declared outputs were not produced".into(),
                    Err(e) => detail = e.to_string(),
                }
                error!("Step {} failed (attempt {}): {}", stage.name(), attempt, detail);
                if attempt < per_mode {
                    info!("Retrying in {:.1} seconds...", self.policy.delay.as_secs_f64());
                    thread::sleep(self.policy.delay);
                }
            }
            match launcher.take() {
                Some(l) => warn!("Trying {} without {}...", stage.name(), l),
                None => break,
            }
        }

        Err(Error::ExternalToolFailure {
            stage: stage.name().to_string(),
            attempts,
            detail,
        })
    }

    /// Run stages in order, stopping at the first failure.
    pub fn run_all<S: Stage>(&self, stages: &[S]) -> Result<()> {
        for stage in stages {
            self.run(stage)?;
        }
        Ok(())
    }
}
