//! Whole-batch runs: the built-in catalogue against the in-process app, and
//! failure isolation with the reports written to disk.

use std::sync::Arc;
use std::time::Duration;

use manus_e2e::fixtures::Fixtures;
use manus_e2e::pages::LoginPage;
use manus_e2e::report::{self, FAILURE_REPORT_FILE, RUN_REPORT_FILE};
use manus_e2e::scenarios::{self, ScenarioFilter};
use manus_e2e::{
    DemoApp, DemoOptions, E2eError, Environment, EnvironmentProfile, RunContext, RunReport,
    RunnerConfig, Scenario, ScenarioRunner, ScenarioStatus, Session, Suite,
};

fn dev_session() -> Session {
    let profile = EnvironmentProfile::for_environment(Environment::Dev).with_timeout_ms(300);
    Session::new(Box::new(DemoApp::new(DemoOptions::default())), profile)
        .with_poll_interval(Duration::from_millis(5))
}

/// The shipped catalogue passes end to end; only the pipeline-only scenario is skipped.
#[tokio::test]
async fn catalogue_passes_against_demo_app() {
    let suites = scenarios::catalogue(Arc::new(Fixtures::builtin().unwrap()));
    let total: usize = suites.iter().map(|s| s.scenarios.len()).sum();
    let mut session = dev_session();
    let runner = ScenarioRunner::new(RunnerConfig::default());
    let mut ctx = RunContext::new();

    runner.run(&mut session, &suites, &mut ctx).await.unwrap();

    let failures: Vec<_> = ctx
        .failures()
        .map(|r| format!("{} - {}: {:?}", r.suite, r.title, r.error))
        .collect();
    assert!(failures.is_empty(), "unexpected failures: {failures:#?}");
    assert_eq!(ctx.results.len(), total);
    assert_eq!(ctx.count(ScenarioStatus::Skipped), 1);
    assert_eq!(ctx.count(ScenarioStatus::Passed), total - 1);
}

#[tokio::test]
async fn filtered_catalogue_runs_only_matching_scenarios() {
    let filter = ScenarioFilter {
        suite: Some("dashboard".into()),
        name: Some("delete".into()),
    };
    let suites = filter.apply(scenarios::catalogue(Arc::new(Fixtures::builtin().unwrap())));
    let mut session = dev_session();
    let mut ctx = RunContext::new();

    ScenarioRunner::new(RunnerConfig::default())
        .run(&mut session, &suites, &mut ctx)
        .await
        .unwrap();

    let titles: Vec<_> = ctx.results.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["deletes a single item", "bulk deletes selected items"]);
    assert!(!ctx.has_failures());
}

async fn open_login(session: &mut Session) -> Result<(), E2eError> {
    LoginPage::new(session).goto().await?;
    Ok(())
}

/// A failing scenario in the middle of a suite does not stop its neighbours,
/// and the reports agree with the recorded results.
#[tokio::test]
async fn failure_is_isolated_and_reported() {
    let suite = Suite::new("Isolation")
        .scenario(Scenario::new("opens login before", |s| Box::pin(open_login(s))))
        .scenario(Scenario::new("waits for a missing element", |s| {
            Box::pin(async move {
                let timeout = s.timeouts().short;
                s.wait_for_visible(&manus_e2e::locator::Locator::test_id("nope"), timeout)
                    .await?;
                Ok::<_, E2eError>(())
            })
        }))
        .scenario(Scenario::new("opens login after", |s| Box::pin(open_login(s))));
    let dir = tempfile::tempdir().unwrap();
    let mut session = dev_session();
    let runner = ScenarioRunner::new(RunnerConfig {
        screenshots_dir: Some(dir.path().join("screenshots")),
        ..Default::default()
    });
    let mut ctx = RunContext::new();

    runner.run(&mut session, &[suite], &mut ctx).await.unwrap();

    let statuses: Vec<_> = ctx.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![ScenarioStatus::Passed, ScenarioStatus::Failed, ScenarioStatus::Passed]
    );
    let failed = &ctx.results[1];
    assert_eq!(failed.error_kind.as_deref(), Some("TimeoutError"));
    assert!(failed.screenshot.as_ref().map(|p| p.exists()).unwrap_or(false));

    let profile = session.profile().clone();
    let (report, paths) = report::write_artifacts(&ctx, &profile, dir.path()).unwrap();
    assert_eq!(report.failures.len(), report.totals.failed);
    assert_eq!(report.totals.failed, ctx.count(ScenarioStatus::Failed));
    assert!(!report.is_success());
    assert_eq!(paths.run_report, dir.path().join(RUN_REPORT_FILE));

    let written: RunReport =
        serde_json::from_str(&std::fs::read_to_string(&paths.run_report).unwrap()).unwrap();
    assert_eq!(written.totals.total, 3);
    let failures = std::fs::read_to_string(dir.path().join(FAILURE_REPORT_FILE)).unwrap();
    assert!(failures.contains("Isolation - waits for a missing element"));
}
