//! Sequencing tests driven by a recording invoker.

use std::cell::RefCell;
use std::collections::HashMap;

use rstest::{fixture, rstest};

use super::*;
use crate::target::TargetName;

/// Records every invocation and answers from a per-step script.
#[derive(Default)]
struct RecordingInvoker {
    calls: RefCell<Vec<Invocation>>,
    outcomes: HashMap<&'static str, CommandOutcome>,
    missing_program: bool,
}

impl RecordingInvoker {
    fn failing(step: &'static str, code: i32) -> Self {
        let mut invoker = Self::default();
        invoker
            .outcomes
            .insert(step, CommandOutcome::Failed { code: Some(code) });
        invoker
    }

    fn steps(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|call| step_of(call).to_owned())
            .collect()
    }
}

fn step_of(invocation: &Invocation) -> &str {
    match invocation.arguments() {
        [first, ..] if first == "--version" => "version",
        [bundle, verb, ..] if bundle == "bundle" => verb.as_str(),
        _ => "unknown",
    }
}

impl CommandInvoker for RecordingInvoker {
    fn invoke(&self, invocation: &Invocation) -> Result<CommandOutcome, InvokeError> {
        self.calls.borrow_mut().push(invocation.clone());
        if self.missing_program {
            return Err(InvokeError::new(
                invocation.program(),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
        Ok(self
            .outcomes
            .get(step_of(invocation))
            .copied()
            .unwrap_or(CommandOutcome::Succeeded))
    }
}

#[fixture]
fn dev() -> DeploymentTarget {
    DeploymentTarget::new(
        TargetName::Dev,
        "https://dev.cloud.example.com",
        [
            ("catalog_name".to_owned(), "dev_catalog".to_owned()),
            ("warehouse_id".to_owned(), "abc123".to_owned()),
        ],
    )
}

fn deploy(validate: bool, setup_database: bool) -> Action {
    Action::Deploy {
        validate,
        setup_database,
    }
}

#[rstest]
fn full_deploy_walks_every_state(dev: DeploymentTarget) {
    let orchestrator = Orchestrator::new(RecordingInvoker::default());

    let report = orchestrator.run(&dev, &deploy(true, true));

    assert_eq!(
        report.trail(),
        [
            DeploymentState::Idle,
            DeploymentState::Validating,
            DeploymentState::Validated,
            DeploymentState::Deploying,
            DeploymentState::Deployed,
            DeploymentState::SettingUpDatabase,
            DeploymentState::Ready,
        ]
    );
    assert_eq!(report.exit_code(), EXIT_SUCCESS);
    assert_eq!(
        orchestrator.invoker().steps(),
        ["version", "validate", "deploy", "run"]
    );
}

#[rstest]
fn bundle_commands_carry_target_overrides_and_host(dev: DeploymentTarget) {
    let orchestrator = Orchestrator::new(RecordingInvoker::default())
        .with_cli("/opt/databricks")
        .with_setup_job("create_table");

    let report = orchestrator.run(&dev, &deploy(false, true));
    assert!(report.error().is_none());

    let calls = orchestrator.invoker().calls.borrow();
    let run = calls.last().expect("setup job invoked");
    assert_eq!(run.program(), "/opt/databricks");
    assert_eq!(
        run.arguments(),
        [
            "bundle",
            "run",
            "create_table",
            "-t",
            "dev",
            "--var=catalog_name=dev_catalog",
            "--var=warehouse_id=abc123",
        ]
    );
    assert_eq!(run.env_var(HOST_ENV), Some("https://dev.cloud.example.com"));
}

#[rstest]
fn deploy_never_runs_after_failed_validation(dev: DeploymentTarget) {
    let orchestrator = Orchestrator::new(RecordingInvoker::failing("validate", 1));

    let report = orchestrator.run(&dev, &deploy(true, true));

    assert_eq!(report.final_state(), DeploymentState::ValidationFailed);
    assert!(matches!(
        report.error(),
        Some(StepError::ValidationFailed {
            target: TargetName::Dev,
            ..
        })
    ));
    assert_eq!(report.exit_code(), EXIT_STEP_FAILED);
    assert_eq!(orchestrator.invoker().steps(), ["version", "validate"]);
}

#[rstest]
fn skipped_validation_goes_straight_to_deploy(dev: DeploymentTarget) {
    let orchestrator = Orchestrator::new(RecordingInvoker::default());

    let report = orchestrator.run(&dev, &deploy(false, false));

    assert_eq!(
        report.trail(),
        [
            DeploymentState::Idle,
            DeploymentState::Deploying,
            DeploymentState::Deployed,
        ]
    );
    assert_eq!(orchestrator.invoker().steps(), ["version", "deploy"]);
}

#[rstest]
fn failed_deploy_skips_setup(dev: DeploymentTarget) {
    let orchestrator = Orchestrator::new(RecordingInvoker::failing("deploy", 4));

    let report = orchestrator.run(&dev, &deploy(true, true));

    assert_eq!(report.final_state(), DeploymentState::DeployFailed);
    assert_eq!(report.exit_code(), EXIT_STEP_FAILED);
    assert!(!orchestrator.invoker().steps().contains(&"run".to_owned()));
}

#[rstest]
fn failed_setup_is_a_warning(dev: DeploymentTarget) {
    let orchestrator = Orchestrator::new(RecordingInvoker::failing("run", 1));

    let report = orchestrator.run(&dev, &deploy(true, true));

    assert_eq!(report.final_state(), DeploymentState::SetupFailed);
    assert!(report.error().is_none());
    assert_eq!(report.exit_code(), EXIT_SUCCESS);
    let warning = report.warnings().first().expect("one warning");
    assert!(warning.contains("manual database setup may be required"));
    assert!(warning.contains("setup_database"));
}

#[rstest]
fn validate_only_stops_after_validation(dev: DeploymentTarget) {
    let orchestrator = Orchestrator::new(RecordingInvoker::default());

    let report = orchestrator.run(&dev, &Action::Validate);

    assert_eq!(report.final_state(), DeploymentState::Validated);
    assert_eq!(orchestrator.invoker().steps(), ["version", "validate"]);
}

#[rstest]
#[case::refused("no")]
#[case::empty("")]
#[case::capitalised("Yes")]
#[case::padded(" yes")]
fn unconfirmed_destroy_invokes_nothing(dev: DeploymentTarget, #[case] confirmation: &str) {
    let orchestrator = Orchestrator::new(RecordingInvoker::default());

    let report = orchestrator.run(
        &dev,
        &Action::Destroy {
            confirmation: confirmation.to_owned(),
        },
    );

    assert_eq!(report.final_state(), DeploymentState::Cancelled);
    assert_eq!(report.exit_code(), EXIT_SUCCESS);
    assert!(orchestrator.invoker().calls.borrow().is_empty());
}

#[rstest]
fn confirmed_destroy_auto_approves(dev: DeploymentTarget) {
    let orchestrator = Orchestrator::new(RecordingInvoker::default());

    let report = orchestrator.run(
        &dev,
        &Action::Destroy {
            confirmation: DESTROY_CONFIRMATION.to_owned(),
        },
    );

    assert_eq!(report.final_state(), DeploymentState::Destroyed);
    assert_eq!(report.exit_code(), EXIT_SUCCESS);
    let calls = orchestrator.invoker().calls.borrow();
    let destroy = calls.last().expect("destroy invoked");
    assert_eq!(
        destroy.arguments().get(..5),
        Some(
            [
                "bundle".to_owned(),
                "destroy".to_owned(),
                "--auto-approve".to_owned(),
                "-t".to_owned(),
                "dev".to_owned(),
            ]
            .as_slice()
        )
    );
}

#[rstest]
fn failed_destroy_is_fatal(dev: DeploymentTarget) {
    let orchestrator = Orchestrator::new(RecordingInvoker::failing("destroy", 1));

    let outcome = orchestrator.destroy(&dev, DESTROY_CONFIRMATION);

    assert!(matches!(outcome, Err(StepError::DestroyFailed { .. })));
}

#[rstest]
fn unusable_cli_halts_before_any_bundle_step(dev: DeploymentTarget) {
    let orchestrator = Orchestrator::new(RecordingInvoker::failing("version", 127));

    let report = orchestrator.run(&dev, &deploy(true, false));

    assert!(matches!(
        report.error(),
        Some(StepError::CliUnavailable { .. })
    ));
    assert_eq!(report.trail(), [DeploymentState::Idle]);
    assert_eq!(orchestrator.invoker().steps(), ["version"]);
}

#[rstest]
fn missing_cli_is_an_invoke_error(dev: DeploymentTarget) {
    let invoker = RecordingInvoker {
        missing_program: true,
        ..RecordingInvoker::default()
    };
    let orchestrator = Orchestrator::new(invoker);

    let report = orchestrator.run(&dev, &Action::Validate);

    assert!(matches!(report.error(), Some(StepError::Invoke(_))));
    assert_eq!(report.exit_code(), EXIT_STEP_FAILED);
}
