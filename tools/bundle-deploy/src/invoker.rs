//! External process invocation behind a narrow trait.
//!
//! The orchestrator only builds [`Invocation`] values and reads back a
//! [`CommandOutcome`]; spawning lives in [`ProcessInvoker`].

use std::fmt;
use std::process::{Command, Stdio};

use tracing::debug;

/// One command line plus the extra environment it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl Invocation {
    /// Start an invocation of `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child only.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program to run.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments in order.
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Extra environment for the child.
    pub fn environment(&self) -> &[(String, String)] {
        &self.env
    }

    /// Look up an extra environment variable.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How a finished command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Exit status zero.
    Succeeded,
    /// Non-zero exit, or no code when killed by a signal.
    Failed {
        /// Exit code when one was reported.
        code: Option<i32>,
    },
}

impl CommandOutcome {
    /// Map a raw exit code to an outcome.
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => Self::Succeeded,
            code => Self::Failed { code },
        }
    }

    /// Whether the command exited zero.
    pub fn succeeded(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("exit code 0"),
            Self::Failed { code: Some(code) } => write!(f, "exit code {code}"),
            Self::Failed { code: None } => f.write_str("terminated by signal"),
        }
    }
}

/// The command could not be started at all.
#[derive(Debug, thiserror::Error)]
#[error("failed to start `{program}`: {source}")]
pub struct InvokeError {
    program: String,
    #[source]
    source: std::io::Error,
}

impl InvokeError {
    /// Wrap a spawn failure for `program`.
    pub fn new(program: impl Into<String>, source: std::io::Error) -> Self {
        Self {
            program: program.into(),
            source,
        }
    }

    /// Program that failed to start.
    pub fn program(&self) -> &str {
        &self.program
    }
}

/// Runs commands to completion.
pub trait CommandInvoker {
    /// Run `invocation` and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError`] when the process cannot be spawned.
    fn invoke(&self, invocation: &Invocation) -> Result<CommandOutcome, InvokeError>;
}

/// Spawns real child processes with inherited stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessInvoker;

impl CommandInvoker for ProcessInvoker {
    fn invoke(&self, invocation: &Invocation) -> Result<CommandOutcome, InvokeError> {
        debug!(command = %invocation, "spawning");
        let status = Command::new(invocation.program())
            .args(invocation.arguments())
            .envs(invocation.environment().iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .status()
            .map_err(|source| InvokeError::new(invocation.program(), source))?;
        Ok(CommandOutcome::from_code(status.code()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn renders_command_line_without_environment() {
        let invocation = Invocation::new("databricks")
            .args(["bundle", "validate"])
            .arg("-t")
            .arg("dev")
            .env("DATABRICKS_HOST", "https://dev");

        assert_eq!(invocation.to_string(), "databricks bundle validate -t dev");
        assert_eq!(invocation.env_var("DATABRICKS_HOST"), Some("https://dev"));
        assert_eq!(invocation.env_var("DATABRICKS_TOKEN"), None);
    }

    #[rstest]
    #[case(Some(0), CommandOutcome::Succeeded)]
    #[case(Some(2), CommandOutcome::Failed { code: Some(2) })]
    #[case(None, CommandOutcome::Failed { code: None })]
    fn maps_exit_codes(#[case] code: Option<i32>, #[case] expected: CommandOutcome) {
        assert_eq!(CommandOutcome::from_code(code), expected);
    }

    #[cfg(unix)]
    #[rstest]
    #[case("exit 0", CommandOutcome::Succeeded)]
    #[case("exit 3", CommandOutcome::Failed { code: Some(3) })]
    fn process_invoker_reports_exit_status(#[case] script: &str, #[case] expected: CommandOutcome) {
        let invocation = Invocation::new("sh").arg("-c").arg(script);

        let outcome = ProcessInvoker.invoke(&invocation).expect("sh runs");
        assert_eq!(outcome, expected);
    }

    #[cfg(unix)]
    #[rstest]
    fn process_invoker_passes_environment() {
        let invocation = Invocation::new("sh")
            .arg("-c")
            .arg("test \"$DATABRICKS_HOST\" = https://dev")
            .env("DATABRICKS_HOST", "https://dev");

        let outcome = ProcessInvoker.invoke(&invocation).expect("sh runs");
        assert!(outcome.succeeded());
    }

    #[rstest]
    fn missing_program_is_an_invoke_error() {
        let invocation = Invocation::new("definitely-not-a-real-cli-4f1c");

        let error = ProcessInvoker.invoke(&invocation).expect_err("spawn fails");
        assert_eq!(error.program(), "definitely-not-a-real-cli-4f1c");
    }
}
