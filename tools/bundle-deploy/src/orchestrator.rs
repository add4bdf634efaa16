//! Sequencing of bundle steps against one target.
//!
//! Every step is one external command. The orchestrator decides which steps
//! run, in which order, and whether a failure is fatal: validate, deploy and
//! destroy failures halt the run, a failed database setup only warns.
//!
//! ```text
//! Idle -> Validating -> Validated -> Deploying -> Deployed
//!                   \-> ValidationFailed         \-> DeployFailed
//! Deployed -> SettingUpDatabase -> Ready | SetupFailed
//! Idle -> Destroying -> Destroyed | DestroyFailed
//! Idle -> Cancelled
//! ```

use std::fmt;

use tracing::{info, warn};

use crate::invoker::{CommandInvoker, CommandOutcome, Invocation, InvokeError};
use crate::target::{DeploymentTarget, TargetName};

/// Platform CLI program used when none is configured.
pub const DEFAULT_CLI: &str = "databricks";
/// Bundle job key that creates the records table.
pub const DEFAULT_SETUP_JOB: &str = "setup_database";
/// The only confirmation that allows a destroy.
pub const DESTROY_CONFIRMATION: &str = "yes";
/// Environment variable carrying the target workspace to the CLI.
pub const HOST_ENV: &str = "DATABRICKS_HOST";

/// Exit status for a run that succeeded, warned or was cancelled.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit status for a fatal step failure.
pub const EXIT_STEP_FAILED: u8 = 1;
/// Exit status for usage or configuration errors.
pub const EXIT_USAGE: u8 = 2;

/// Position of a run in the deployment state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentState {
    /// Nothing has run yet.
    Idle,
    /// `bundle validate` is running.
    Validating,
    /// Validation passed.
    Validated,
    /// Validation exited non-zero.
    ValidationFailed,
    /// `bundle deploy` is running.
    Deploying,
    /// The bundle is deployed.
    Deployed,
    /// Deployment exited non-zero.
    DeployFailed,
    /// The setup job is running.
    SettingUpDatabase,
    /// Deployed and the setup job succeeded.
    Ready,
    /// Deployed but the setup job failed.
    SetupFailed,
    /// `bundle destroy` is running.
    Destroying,
    /// The bundle is destroyed.
    Destroyed,
    /// Destroy exited non-zero.
    DestroyFailed,
    /// Destroy was not confirmed.
    Cancelled,
}

/// What the operator asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Validate only.
    Validate,
    /// Deploy, optionally validating first and running the setup job after.
    Deploy {
        /// Run `bundle validate` before deploying.
        validate: bool,
        /// Run the setup job after a successful deploy.
        setup_database: bool,
    },
    /// Tear down the target if `confirmation` is exactly `yes`.
    Destroy {
        /// Operator's answer to the confirmation prompt.
        confirmation: String,
    },
}

/// A fatal step failure.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// `<cli> --version` did not succeed.
    #[error("platform CLI `{cli}` is not usable ({outcome})")]
    CliUnavailable {
        /// Configured CLI program.
        cli: String,
        /// How the version check ended.
        outcome: CommandOutcome,
    },
    /// `bundle validate` exited non-zero.
    #[error("bundle validation failed for target {target} ({outcome})")]
    ValidationFailed {
        /// Target being validated.
        target: TargetName,
        /// How the command ended.
        outcome: CommandOutcome,
    },
    /// `bundle deploy` exited non-zero.
    #[error("bundle deploy failed for target {target} ({outcome})")]
    DeployFailed {
        /// Target being deployed.
        target: TargetName,
        /// How the command ended.
        outcome: CommandOutcome,
    },
    /// The setup job exited non-zero.
    #[error("setup job `{job}` failed for target {target} ({outcome})")]
    SetupFailed {
        /// Target the job ran against.
        target: TargetName,
        /// Bundle job key.
        job: String,
        /// How the command ended.
        outcome: CommandOutcome,
    },
    /// `bundle destroy` exited non-zero.
    #[error("bundle destroy failed for target {target} ({outcome})")]
    DestroyFailed {
        /// Target being destroyed.
        target: TargetName,
        /// How the command ended.
        outcome: CommandOutcome,
    },
    /// A command could not be started.
    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

/// Result of a destroy request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyOutcome {
    /// The bundle was destroyed.
    Destroyed,
    /// The confirmation was refused; nothing ran.
    Cancelled,
}

/// Trail of one run: the states visited, warnings, and any fatal error.
#[derive(Debug)]
pub struct RunReport {
    trail: Vec<DeploymentState>,
    warnings: Vec<String>,
    error: Option<StepError>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            trail: vec![DeploymentState::Idle],
            warnings: Vec::new(),
            error: None,
        }
    }

    fn enter(&mut self, state: DeploymentState) {
        self.trail.push(state);
    }

    fn fail(mut self, state: DeploymentState, error: StepError) -> Self {
        self.trail.push(state);
        self.error = Some(error);
        self
    }

    /// States visited, starting at [`DeploymentState::Idle`].
    pub fn trail(&self) -> &[DeploymentState] {
        &self.trail
    }

    /// Last state reached.
    pub fn final_state(&self) -> DeploymentState {
        self.trail
            .last()
            .copied()
            .unwrap_or(DeploymentState::Idle)
    }

    /// Non-fatal problems the operator should act on.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Fatal failure, if the run halted.
    pub fn error(&self) -> Option<&StepError> {
        self.error.as_ref()
    }

    /// Process exit status for this run.
    pub fn exit_code(&self) -> u8 {
        if self.error.is_some() {
            EXIT_STEP_FAILED
        } else {
            EXIT_SUCCESS
        }
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Bundle step runner for one platform CLI.
#[derive(Debug, Clone)]
pub struct Orchestrator<I> {
    invoker: I,
    cli: String,
    setup_job: String,
}

impl<I: CommandInvoker> Orchestrator<I> {
    /// Create an orchestrator using the default CLI and setup job.
    pub fn new(invoker: I) -> Self {
        Self {
            invoker,
            cli: DEFAULT_CLI.to_owned(),
            setup_job: DEFAULT_SETUP_JOB.to_owned(),
        }
    }

    /// Use a different CLI program.
    #[must_use]
    pub fn with_cli(mut self, cli: impl Into<String>) -> Self {
        self.cli = cli.into();
        self
    }

    /// Use a different setup job key.
    #[must_use]
    pub fn with_setup_job(mut self, job: impl Into<String>) -> Self {
        self.setup_job = job.into();
        self
    }

    /// The wrapped invoker.
    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    fn bundle(&self, target: &DeploymentTarget, verb: &[&str]) -> Invocation {
        Invocation::new(&self.cli)
            .arg("bundle")
            .args(verb.iter().copied())
            .arg("-t")
            .arg(target.name().as_str())
            .args(target.var_args())
            .env(HOST_ENV, target.host())
    }

    fn run_step(&self, invocation: &Invocation) -> Result<CommandOutcome, StepError> {
        info!(command = %invocation, "running");
        Ok(self.invoker.invoke(invocation)?)
    }

    /// Check that the CLI starts and answers `--version`.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::CliUnavailable`] on a non-zero exit and
    /// [`StepError::Invoke`] when the program is missing.
    pub fn preflight(&self) -> Result<(), StepError> {
        let outcome = self.run_step(&Invocation::new(&self.cli).arg("--version"))?;
        if outcome.succeeded() {
            Ok(())
        } else {
            Err(StepError::CliUnavailable {
                cli: self.cli.clone(),
                outcome,
            })
        }
    }

    /// Run `bundle validate` for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::ValidationFailed`] on a non-zero exit.
    pub fn validate(&self, target: &DeploymentTarget) -> Result<(), StepError> {
        let outcome = self.run_step(&self.bundle(target, &["validate"]))?;
        if outcome.succeeded() {
            Ok(())
        } else {
            Err(StepError::ValidationFailed {
                target: target.name(),
                outcome,
            })
        }
    }

    /// Run `bundle deploy` for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::DeployFailed`] on a non-zero exit.
    pub fn deploy(&self, target: &DeploymentTarget) -> Result<(), StepError> {
        let outcome = self.run_step(&self.bundle(target, &["deploy"]))?;
        if outcome.succeeded() {
            Ok(())
        } else {
            Err(StepError::DeployFailed {
                target: target.name(),
                outcome,
            })
        }
    }

    /// Run the setup job for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::SetupFailed`] on a non-zero exit.
    pub fn setup_database(&self, target: &DeploymentTarget) -> Result<(), StepError> {
        let outcome = self.run_step(&self.bundle(target, &["run", self.setup_job.as_str()]))?;
        if outcome.succeeded() {
            Ok(())
        } else {
            Err(StepError::SetupFailed {
                target: target.name(),
                job: self.setup_job.clone(),
                outcome,
            })
        }
    }

    /// Destroy `target` when `confirmation` is exactly `yes`.
    ///
    /// Any other confirmation returns [`DestroyOutcome::Cancelled`] without
    /// invoking the CLI.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::DestroyFailed`] on a non-zero exit.
    pub fn destroy(
        &self,
        target: &DeploymentTarget,
        confirmation: &str,
    ) -> Result<DestroyOutcome, StepError> {
        if confirmation != DESTROY_CONFIRMATION {
            info!(target = %target.name(), "destroy cancelled");
            return Ok(DestroyOutcome::Cancelled);
        }
        let outcome = self.run_step(&self.bundle(target, &["destroy", "--auto-approve"]))?;
        if outcome.succeeded() {
            Ok(DestroyOutcome::Destroyed)
        } else {
            Err(StepError::DestroyFailed {
                target: target.name(),
                outcome,
            })
        }
    }

    /// Carry out `action` against `target`, recording every state visited.
    pub fn run(&self, target: &DeploymentTarget, action: &Action) -> RunReport {
        let mut report = RunReport::new();

        if let Action::Destroy { confirmation } = action {
            if confirmation != DESTROY_CONFIRMATION {
                report.enter(DeploymentState::Cancelled);
                info!(target = %target.name(), "destroy cancelled");
                return report;
            }
        }

        if let Err(error) = self.preflight() {
            report.error = Some(error);
            return report;
        }

        match action {
            Action::Validate => self.run_validate(target, report),
            Action::Deploy {
                validate,
                setup_database,
            } => self.run_deploy(target, *validate, *setup_database, report),
            Action::Destroy { confirmation } => self.run_destroy(target, confirmation, report),
        }
    }

    fn run_validate(&self, target: &DeploymentTarget, mut report: RunReport) -> RunReport {
        report.enter(DeploymentState::Validating);
        match self.validate(target) {
            Ok(()) => {
                report.enter(DeploymentState::Validated);
                info!(target = %target.name(), "bundle valid");
                report
            }
            Err(error) => report.fail(DeploymentState::ValidationFailed, error),
        }
    }

    fn run_deploy(
        &self,
        target: &DeploymentTarget,
        validate: bool,
        setup_database: bool,
        report: RunReport,
    ) -> RunReport {
        let mut report = if validate {
            self.run_validate(target, report)
        } else {
            info!(target = %target.name(), "validation skipped");
            report
        };
        if report.error.is_some() {
            return report;
        }

        report.enter(DeploymentState::Deploying);
        if let Err(error) = self.deploy(target) {
            return report.fail(DeploymentState::DeployFailed, error);
        }
        report.enter(DeploymentState::Deployed);
        info!(target = %target.name(), "bundle deployed");

        if !setup_database {
            return report;
        }

        report.enter(DeploymentState::SettingUpDatabase);
        match self.setup_database(target) {
            Ok(()) => {
                report.enter(DeploymentState::Ready);
                info!(target = %target.name(), "database setup complete");
            }
            Err(error) => {
                warn!(
                    target = %target.name(),
                    error = %error,
                    "database setup failed; manual setup may be required"
                );
                report.enter(DeploymentState::SetupFailed);
                report.warnings.push(format!(
                    "{error}; the deployment succeeded but manual database setup may be required"
                ));
            }
        }
        report
    }

    fn run_destroy(
        &self,
        target: &DeploymentTarget,
        confirmation: &str,
        mut report: RunReport,
    ) -> RunReport {
        report.enter(DeploymentState::Destroying);
        match self.destroy(target, confirmation) {
            Ok(DestroyOutcome::Destroyed) => {
                report.enter(DeploymentState::Destroyed);
                info!(target = %target.name(), "bundle destroyed");
                report
            }
            Ok(DestroyOutcome::Cancelled) => {
                report.enter(DeploymentState::Cancelled);
                report
            }
            Err(error) => report.fail(DeploymentState::DestroyFailed, error),
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
