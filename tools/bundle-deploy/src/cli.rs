//! Command-line surface of the `deploy` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::orchestrator::{Action, DEFAULT_CLI, DEFAULT_SETUP_JOB};
use crate::target::{DEFAULT_TARGETS_FILE, TargetName};

/// `deploy` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "deploy",
    about = "Validate, deploy, set up or destroy the records bundle for one target",
    version
)]
pub struct Cli {
    /// Environment to act on.
    #[arg(long, short = 't', value_enum)]
    pub target: TargetName,
    /// Run the setup job after a successful deploy.
    #[arg(long, conflicts_with_all = ["validate", "destroy"])]
    pub setup_database: bool,
    /// Validate the bundle and stop.
    #[arg(long, conflicts_with_all = ["destroy", "skip_validation"])]
    pub validate: bool,
    /// Deploy without validating first.
    #[arg(long, conflicts_with = "destroy")]
    pub skip_validation: bool,
    /// Destroy every resource of the target.
    #[arg(long)]
    pub destroy: bool,
    /// Destroy confirmation; prompts on stdin when omitted.
    #[arg(long, value_name = "token", requires = "destroy")]
    pub confirm: Option<String>,
    /// Targets file.
    #[arg(long, value_name = "path", default_value = DEFAULT_TARGETS_FILE)]
    pub targets_file: PathBuf,
    /// Platform CLI program.
    #[arg(long, value_name = "program", default_value = DEFAULT_CLI)]
    pub cli: String,
    /// Bundle job key run by `--setup-database`.
    #[arg(long, value_name = "key", default_value = DEFAULT_SETUP_JOB)]
    pub setup_job: String,
}

impl Cli {
    /// Action requested, with `confirmation` standing in for a missing
    /// `--confirm` on destroy.
    ///
    /// `confirmation` is only called for a destroy without `--confirm`.
    ///
    /// # Errors
    ///
    /// Propagates the error of `confirmation`.
    pub fn action<E>(
        &self,
        confirmation: impl FnOnce() -> Result<String, E>,
    ) -> Result<Action, E> {
        if self.destroy {
            let answer = match &self.confirm {
                Some(token) => token.clone(),
                None => confirmation()?,
            };
            return Ok(Action::Destroy {
                confirmation: answer,
            });
        }
        if self.validate {
            return Ok(Action::Validate);
        }
        Ok(Action::Deploy {
            validate: !self.skip_validation,
            setup_database: self.setup_database,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use clap::error::ErrorKind;
    use rstest::rstest;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("deploy").chain(args.iter().copied()))
    }

    fn no_prompt() -> Result<String, Infallible> {
        panic!("prompt must not be used")
    }

    #[rstest]
    #[case(&["--target", "dev"], Action::Deploy { validate: true, setup_database: false })]
    #[case(&["-t", "prod", "--setup-database"], Action::Deploy { validate: true, setup_database: true })]
    #[case(&["-t", "staging", "--skip-validation"], Action::Deploy { validate: false, setup_database: false })]
    #[case(&["-t", "dev", "--validate"], Action::Validate)]
    #[case(&["-t", "dev", "--destroy", "--confirm", "yes"], Action::Destroy { confirmation: "yes".to_owned() })]
    fn maps_flags_to_actions(#[case] args: &[&str], #[case] expected: Action) {
        let cli = parse(args).expect("valid arguments");

        assert_eq!(cli.action(no_prompt).expect("action"), expected);
    }

    #[rstest]
    fn destroy_without_confirm_prompts() {
        let cli = parse(&["-t", "dev", "--destroy"]).expect("valid arguments");

        let action = cli
            .action(|| Ok::<_, Infallible>("no".to_owned()))
            .expect("action");
        assert_eq!(
            action,
            Action::Destroy {
                confirmation: "no".to_owned()
            }
        );
    }

    #[rstest]
    fn defaults_name_the_standard_cli_and_files() {
        let cli = parse(&["-t", "dev"]).expect("valid arguments");

        assert_eq!(cli.target, TargetName::Dev);
        assert_eq!(cli.cli, DEFAULT_CLI);
        assert_eq!(cli.setup_job, DEFAULT_SETUP_JOB);
        assert_eq!(cli.targets_file, PathBuf::from(DEFAULT_TARGETS_FILE));
    }

    #[rstest]
    #[case::missing_target(&[], ErrorKind::MissingRequiredArgument)]
    #[case::unknown_target(&["-t", "qa"], ErrorKind::InvalidValue)]
    #[case::destroy_and_setup(&["-t", "dev", "--destroy", "--setup-database"], ErrorKind::ArgumentConflict)]
    #[case::validate_and_destroy(&["-t", "dev", "--validate", "--destroy"], ErrorKind::ArgumentConflict)]
    #[case::validate_and_skip(&["-t", "dev", "--validate", "--skip-validation"], ErrorKind::ArgumentConflict)]
    #[case::confirm_without_destroy(&["-t", "dev", "--confirm", "yes"], ErrorKind::MissingRequiredArgument)]
    fn rejects_invalid_combinations(#[case] args: &[&str], #[case] kind: ErrorKind) {
        let error = parse(args).expect_err("invalid arguments");

        assert_eq!(error.kind(), kind);
        assert_eq!(error.exit_code(), 2);
    }
}
