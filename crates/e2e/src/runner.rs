//! Scenario runner with batch fault isolation
//!
//! Scenarios run strictly in order against one [`Session`]. A failing
//! scenario (error, unexpected page exception or panic) is recorded in the
//! [`RunContext`] and the batch moves on; the runner is the only place
//! failures are caught.
//!
//! Browser storage is the one shared resource between scenarios. It is
//! cleared at suite boundaries and before any scenario whose title mentions
//! login or logout.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::HarnessConfig;
use crate::environment::EnvironmentProfile;
use crate::error::{E2eError, E2eResult};
use crate::primitives::{ActionOutcome, ActionRecord, Session};
use crate::telemetry::MetricsSnapshot;
use crate::visual;

/// Page exceptions that never fail a scenario.
pub const BENIGN_PAGE_ERRORS: [&str; 5] = [
    "Script error.",
    "Non-Error promise rejection captured",
    "Network request failed",
    "Loading chunk",
    "ChunkLoadError",
];

/// Primitive calls kept in a failure's trace.
const TRACE_DEPTH: usize = 10;

pub type ScenarioFuture<'s> = BoxFuture<'s, E2eResult<()>>;

type ScenarioBody = Box<dyn for<'s> Fn(&'s mut Session) -> ScenarioFuture<'s> + Send + Sync>;

/// A named, self-contained flow.
pub struct Scenario {
    pub title: String,
    /// Environment keys the scenario runs in; `"all"` matches every one.
    pub environments: Vec<String>,
    /// Signs in through local storage; scheduled after the suite's other
    /// scenarios so the seeded session cannot leak into them.
    pub uses_fast_login: bool,
    body: ScenarioBody,
}

impl Scenario {
    pub fn new<F>(title: impl Into<String>, body: F) -> Self
    where
        F: for<'s> Fn(&'s mut Session) -> ScenarioFuture<'s> + Send + Sync + 'static,
    {
        Self {
            title: title.into(),
            environments: vec!["all".to_string()],
            uses_fast_login: false,
            body: Box::new(body),
        }
    }

    pub fn only_in(mut self, environments: &[&str]) -> Self {
        self.environments = environments.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn with_fast_login(mut self) -> Self {
        self.uses_fast_login = true;
        self
    }

    /// Titles mentioning login or logout start from empty storage.
    pub fn needs_clean_storage(&self) -> bool {
        let title = self.title.to_lowercase();
        title.contains("login") || title.contains("logout")
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("title", &self.title)
            .field("environments", &self.environments)
            .field("uses_fast_login", &self.uses_fast_login)
            .finish_non_exhaustive()
    }
}

/// An ordered group of scenarios.
#[derive(Debug)]
pub struct Suite {
    pub name: String,
    pub scenarios: Vec<Scenario>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scenarios: Vec::new(),
        }
    }

    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }

    /// Declaration order, with fast-login scenarios moved to the end.
    pub fn execution_order(&self) -> impl Iterator<Item = &Scenario> {
        let (fast, regular): (Vec<&Scenario>, Vec<&Scenario>) =
            self.scenarios.iter().partition(|s| s.uses_fast_login);
        regular.into_iter().chain(fast)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    Passed,
    Failed,
    /// Not applicable to the current environment.
    Skipped,
}

/// Outcome of one scenario, as written to the run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub suite: String,
    pub title: String,
    pub status: ScenarioStatus,
    pub duration_ms: u64,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Last primitive calls before the failure, oldest first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
    /// Step frames of the last attempt (CI only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<PathBuf>,
}

impl ScenarioResult {
    fn skipped(suite: &str, title: &str) -> Self {
        Self {
            suite: suite.to_string(),
            title: title.to_string(),
            status: ScenarioStatus::Skipped,
            duration_ms: 0,
            attempts: 0,
            error: None,
            error_kind: None,
            stack: None,
            timestamp: Utc::now(),
            screenshot: None,
            video: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == ScenarioStatus::Failed
    }
}

/// Everything a batch accumulates. Read once at the end to build the report.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub results: Vec<ScenarioResult>,
    pub metrics: Vec<MetricsSnapshot>,
    /// Harness steps between scenarios that failed, e.g. a storage clear.
    pub harness_errors: Vec<String>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            results: Vec::new(),
            metrics: Vec::new(),
            harness_errors: Vec::new(),
        }
    }

    pub fn record(&mut self, result: ScenarioResult) {
        self.results.push(result);
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| r.is_failed())
    }

    pub fn count(&self, status: ScenarioStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Wall-clock duration, up to now while the batch is still running.
    pub fn duration_ms(&self) -> u64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }

    fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Extra attempts after a failure.
    pub retries: u32,
    /// Where failure screenshots go (None = no screenshots).
    pub screenshots_dir: Option<PathBuf>,
    /// Where step frames go (None = no frames).
    pub frames_dir: Option<PathBuf>,
    pub benign_errors: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            retries: 0,
            screenshots_dir: None,
            frames_dir: None,
            benign_errors: BENIGN_PAGE_ERRORS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl RunnerConfig {
    /// Retries follow the run mode; frames are only recorded in CI.
    pub fn from_harness(config: &HarnessConfig, profile: &EnvironmentProfile) -> Self {
        let artifacts = &config.artifacts;
        Self {
            retries: config.retries_for(profile),
            screenshots_dir: artifacts
                .screenshot_on_failure
                .then(|| artifacts.screenshots_dir()),
            frames_dir: (artifacts.video && profile.is_ci()).then(|| artifacts.videos_dir()),
            ..Default::default()
        }
    }

    fn is_benign(&self, message: &str) -> bool {
        self.benign_errors.iter().any(|b| message.contains(b.as_str()))
    }
}

pub struct ScenarioRunner {
    config: RunnerConfig,
}

impl ScenarioRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run every suite in order, recording into `ctx`.
    ///
    /// Storage is cleared when each suite starts and ends. Nothing aborts the
    /// batch: a failed clear is recorded in `ctx.harness_errors`, and after a
    /// failed start clear the suite's scenarios clear storage inside their own
    /// attempts until one passes. `ctx` is
    /// always finished; the first harness error is returned afterwards.
    pub async fn run(
        &self,
        session: &mut Session,
        suites: &[Suite],
        ctx: &mut RunContext,
    ) -> E2eResult<()> {
        let total: usize = suites.iter().map(|s| s.scenarios.len()).sum();
        info!(suites = suites.len(), scenarios = total, retries = self.config.retries, "Starting batch");

        let mut first_error = None;
        for suite in suites {
            info!(suite = %suite.name, "Running suite");
            let mut dirty = match self.clear_storage(session).await {
                Ok(()) => false,
                Err(e) => {
                    record_harness_error(ctx, &mut first_error, &suite.name, "start", e);
                    true
                }
            };
            for scenario in suite.execution_order() {
                let result = self
                    .run_scenario_with(session, &suite.name, scenario, dirty)
                    .await;
                if result.status == ScenarioStatus::Passed {
                    dirty = false;
                }
                let profile = session.profile().clone();
                let snapshot = session
                    .telemetry_mut()
                    .take_snapshot(&scenario.title, &profile);
                if !snapshot.durations.is_empty()
                    || !snapshot.memory.is_empty()
                    || !snapshot.page_loads.is_empty()
                    || !snapshot.slow_requests.is_empty()
                {
                    ctx.metrics.push(snapshot);
                }
                ctx.record(result);
            }
            if let Err(e) = self.clear_storage(session).await {
                record_harness_error(ctx, &mut first_error, &suite.name, "end", e);
            }
        }

        ctx.finish();

        info!(
            passed = ctx.count(ScenarioStatus::Passed),
            failed = ctx.count(ScenarioStatus::Failed),
            skipped = ctx.count(ScenarioStatus::Skipped),
            duration_ms = ctx.duration_ms(),
            "Batch finished"
        );
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run one scenario with retries. Never fails; the outcome is the result.
    pub async fn run_scenario(
        &self,
        session: &mut Session,
        suite: &str,
        scenario: &Scenario,
    ) -> ScenarioResult {
        self.run_scenario_with(session, suite, scenario, false).await
    }

    /// `clean_first` forces a storage clear at the start of every attempt.
    async fn run_scenario_with(
        &self,
        session: &mut Session,
        suite: &str,
        scenario: &Scenario,
        clean_first: bool,
    ) -> ScenarioResult {
        if !session.profile().should_run_in(&scenario.environments) {
            info!(suite, title = %scenario.title, "Skipped in this environment");
            return ScenarioResult::skipped(suite, &scenario.title);
        }

        let started = Instant::now();
        let max_attempts = self.config.retries + 1;
        let mut attempt = 0;
        let mut video = None;

        let failure = loop {
            attempt += 1;
            session.take_actions();
            if let Some(dir) = self.frames_dir_for(suite, &scenario.title, attempt) {
                if let Err(e) = session.start_frames(dir) {
                    warn!(error = %e, "Cannot record frames");
                }
            }

            let outcome = self.attempt(session, scenario, clean_first).await;

            if let Some(frames) = session.stop_frames() {
                if frames.frames() > 0 {
                    video = Some(frames.dir().to_path_buf());
                }
            }

            match outcome {
                Ok(()) => break None,
                Err(e) if attempt < max_attempts => {
                    warn!(title = %scenario.title, attempt, max_attempts, error = %e, "Scenario failed, retrying");
                }
                Err(e) => break Some(e),
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let mut result = ScenarioResult {
            suite: suite.to_string(),
            title: scenario.title.clone(),
            status: ScenarioStatus::Passed,
            duration_ms,
            attempts: attempt,
            error: None,
            error_kind: None,
            stack: None,
            timestamp: Utc::now(),
            screenshot: None,
            video,
        };

        match failure {
            None => info!(suite, title = %scenario.title, duration_ms, "✓ passed"),
            Some(e) => {
                error!(suite, title = %scenario.title, duration_ms, error = %e, "✗ failed");
                result.status = ScenarioStatus::Failed;
                result.error = Some(e.to_string());
                result.error_kind = Some(e.kind().to_string());
                result.stack = Some(format_trace(session.actions()));
                result.screenshot = self.failure_screenshot(session, &scenario.title).await;
            }
        }
        result
    }

    async fn attempt(
        &self,
        session: &mut Session,
        scenario: &Scenario,
        clean_first: bool,
    ) -> E2eResult<()> {
        if clean_first || scenario.needs_clean_storage() {
            self.clear_storage(session).await?;
        }
        session.reset_page().await?;

        let outcome = match AssertUnwindSafe((scenario.body)(session)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(E2eError::Panicked(panic_message(panic.as_ref()))),
        };

        let page_errors = self.unexpected_page_errors(session).await;
        outcome?;
        match page_errors.into_iter().next() {
            Some(message) => Err(E2eError::Application(message)),
            None => Ok(()),
        }
    }

    /// Drain page exceptions, logging benign ones.
    async fn unexpected_page_errors(&self, session: &mut Session) -> Vec<String> {
        let errors = match session.take_page_errors().await {
            Ok(errors) => errors,
            Err(e) => {
                debug!(error = %e, "Cannot read page errors");
                return Vec::new();
            }
        };
        errors
            .into_iter()
            .filter(|message| {
                let benign = self.config.is_benign(message);
                if benign {
                    debug!(%message, "Ignoring benign page error");
                }
                !benign
            })
            .collect()
    }

    /// Storage lives per origin, so the application is loaded first.
    async fn clear_storage(&self, session: &mut Session) -> E2eResult<()> {
        session.visit("/").await?;
        session.clear_storage().await?;
        session.reset_page().await
    }

    async fn failure_screenshot(&self, session: &mut Session, title: &str) -> Option<PathBuf> {
        let dir = self.config.screenshots_dir.as_ref()?;
        let name = visual::failure_screenshot_name(title);
        match visual::capture_redacted(session, dir, &name).await {
            Ok(artifact) => Some(artifact.path),
            Err(e) => {
                warn!(error = %e, "Failure screenshot not captured");
                None
            }
        }
    }

    fn frames_dir_for(&self, suite: &str, title: &str, attempt: u32) -> Option<PathBuf> {
        let root = self.config.frames_dir.as_ref()?;
        Some(
            root.join(visual::screenshot_name(suite))
                .join(visual::screenshot_name(title))
                .join(format!("attempt-{}", attempt)),
        )
    }
}

fn record_harness_error(
    ctx: &mut RunContext,
    first: &mut Option<E2eError>,
    suite: &str,
    boundary: &str,
    error: E2eError,
) {
    warn!(suite, boundary, error = %error, "Storage not cleared at suite boundary");
    ctx.harness_errors
        .push(format!("{}: storage not cleared at suite {}: {}", suite, boundary, error));
    first.get_or_insert(error);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn format_trace(actions: &[ActionRecord]) -> String {
    let skip = actions.len().saturating_sub(TRACE_DEPTH);
    actions[skip..]
        .iter()
        .map(|a| match &a.outcome {
            ActionOutcome::Ok => format!("at {} {} ({} ms)", a.operation, a.target, a.elapsed_ms),
            ActionOutcome::Failed(e) => {
                format!("at {} {} ({} ms) failed: {}", a.operation, a.target, a.elapsed_ms, e)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
