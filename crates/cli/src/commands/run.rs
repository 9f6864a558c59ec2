//! Scenario execution

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, ValueEnum};
use tracing::{info, warn};

use manus_e2e::driver::Browser;
use manus_e2e::fixtures::Fixtures;
use manus_e2e::report;
use manus_e2e::scenarios::{catalogue, ScenarioFilter};
use manus_e2e::{
    AppServer, BrowserDriver, DemoApp, DemoOptions, EnvironmentProfile, HarnessConfig,
    RunContext, RunnerConfig, ScenarioRunner, Session, WebDriverSession,
};

use crate::output::{print_info, print_report, print_warning, OutputFormat};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum DriverKind {
    /// Real browser through a W3C WebDriver remote end
    #[default]
    Webdriver,
    /// In-process simulation of the application
    Demo,
}

#[derive(Args)]
pub struct RunArgs {
    /// Browser backend
    #[arg(long, default_value = "webdriver")]
    pub driver: DriverKind,

    /// WebDriver remote end URL
    #[arg(long, env = "WEBDRIVER_URL")]
    pub webdriver_url: Option<String>,

    /// Browser to request from the remote end
    #[arg(long)]
    pub browser: Option<Browser>,

    /// Application origin
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Only suites whose name contains this text
    #[arg(long)]
    pub suite: Option<String>,

    /// Only scenarios whose title contains this text
    #[arg(long)]
    pub name: Option<String>,

    /// Artifact directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Run in CI mode (headless, pipeline base path, CI retries)
    #[arg(long)]
    pub ci: bool,

    /// Force a headless browser
    #[arg(long)]
    pub headless: bool,

    /// Do not spawn the configured application server
    #[arg(long)]
    pub no_server: bool,
}

pub async fn execute(args: RunArgs, config: Option<&Path>, format: OutputFormat) -> anyhow::Result<bool> {
    let mut config = HarnessConfig::load_or_default(config)?;
    apply_overrides(&mut config, &args);

    let mut profile = super::resolve_profile(args.ci, args.base_url.clone());
    let filter = ScenarioFilter {
        suite: args.suite.clone(),
        name: args.name.clone(),
    };
    let fixtures = match &config.fixtures_dir {
        Some(dir) => Fixtures::load(dir)?,
        None => Fixtures::builtin()?,
    };
    let suites = filter.apply(catalogue(Arc::new(fixtures)));
    if suites.is_empty() {
        bail!("no scenarios match the given filters");
    }

    if config.artifacts.trash_assets_before_run {
        trash_assets(&config)?;
    }

    let server = match (&config.app_server, args.driver, args.no_server) {
        (Some(server_config), DriverKind::Webdriver, false) => {
            let server = AppServer::spawn(server_config)
                .await
                .context("application server did not start")?;
            profile.base_url = Some(server.base_url().to_string());
            Some(server)
        }
        _ => {
            profile.base_url = config.base_url_for(&profile);
            None
        }
    };

    if !EnvironmentProfile::install(profile.clone()) {
        warn!("Environment profile was already resolved; keeping the installed one");
    }
    profile.log_info();

    let driver = connect(&config, &profile, args.driver).await?;
    let mut session = Session::new(driver, profile.clone()).with_poll_interval(config.poll_interval());

    let runner = ScenarioRunner::new(RunnerConfig::from_harness(&config, &profile));
    let mut ctx = RunContext::new();
    let outcome = runner.run(&mut session, &suites, &mut ctx).await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close browser session");
    }
    drop(server);

    let reports_dir = config.artifacts.reports_dir();
    let (report, paths) = report::write_artifacts(&ctx, &profile, &reports_dir)
        .with_context(|| format!("cannot write reports to {}", reports_dir.display()))?;
    info!(
        passed = report.totals.passed,
        failed = report.totals.failed,
        skipped = report.totals.skipped,
        "Batch finished"
    );

    print_report(&report, format)?;
    if let OutputFormat::Table = format {
        print_info(&format!("Run report: {}", paths.run_report.display()));
        if !report.failures.is_empty() {
            print_warning(&format!("Failure report: {}", paths.failure_report.display()));
        }
        if let Some(metrics) = &paths.metrics {
            print_info(&format!("Metrics: {}", metrics.display()));
        }
    }

    outcome.context("harness step failed between suites")?;
    Ok(report.is_success())
}

fn apply_overrides(config: &mut HarnessConfig, args: &RunArgs) {
    if let Some(url) = &args.webdriver_url {
        config.webdriver.url = url.clone();
    }
    if let Some(browser) = args.browser {
        config.webdriver.browser = browser;
    }
    if let Some(output) = &args.output {
        config.artifacts.output_dir = output.clone();
    }
    if args.headless {
        config.webdriver.headless = true;
    }
}

async fn connect(
    config: &HarnessConfig,
    profile: &EnvironmentProfile,
    kind: DriverKind,
) -> anyhow::Result<Box<dyn BrowserDriver>> {
    match kind {
        DriverKind::Webdriver => {
            let webdriver = config.webdriver_config(profile);
            let url = webdriver.url.clone();
            let session = WebDriverSession::connect(webdriver)
                .await
                .with_context(|| format!("cannot open a WebDriver session at {}", url))?;
            Ok(Box::new(session))
        }
        DriverKind::Demo => {
            let mut options = DemoOptions::default();
            if let Some(origin) = &profile.base_url {
                options.origin = origin.trim_end_matches('/').to_string();
            }
            Ok(Box::new(DemoApp::new(options)))
        }
    }
}

/// Remove screenshots and frames from a previous run.
fn trash_assets(config: &HarnessConfig) -> anyhow::Result<()> {
    for dir in [config.artifacts.screenshots_dir(), config.artifacts.videos_dir()] {
        if dir.exists() {
            std::fs::remove_dir_all(&dir)
                .with_context(|| format!("cannot clear {}", dir.display()))?;
        }
    }
    Ok(())
}
