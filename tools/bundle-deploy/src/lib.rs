//! Deployment wrapper for the records bundle.
//!
//! The `deploy` binary validates, deploys, sets up and destroys one target by
//! invoking the platform CLI. This library holds the pieces it is built from:
//!
//! - [`target`] loads the per-environment host and variable overrides
//! - [`invoker`] runs external commands behind the [`CommandInvoker`] trait
//! - [`orchestrator`] sequences the steps and classifies failures
//! - [`cli`] defines the command-line surface

pub mod cli;
pub mod invoker;
pub mod orchestrator;
pub mod target;

pub use invoker::{CommandInvoker, CommandOutcome, Invocation, InvokeError, ProcessInvoker};
pub use orchestrator::{Action, DeploymentState, Orchestrator, RunReport, StepError};
pub use target::{DeploymentTarget, TargetName, Targets, TargetsError};
