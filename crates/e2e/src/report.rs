//! Run reports
//!
//! A finished [`RunContext`] becomes three artifacts in the reports folder:
//! `run-report.json` (totals, per-suite stats, every result),
//! `test-failures.txt` (human-readable failure detail) and `metrics.json`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::environment::EnvironmentProfile;
use crate::error::E2eResult;
use crate::runner::{RunContext, ScenarioResult, ScenarioStatus};
use crate::telemetry;

pub const RUN_REPORT_FILE: &str = "run-report.json";
pub const FAILURE_REPORT_FILE: &str = "test-failures.txt";
pub const METRICS_FILE: &str = "metrics.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Percentage of executed scenarios that passed.
    pub success_rate: f64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteStats {
    pub name: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub success_rate: f64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSummary {
    pub code: String,
    pub name: String,
    pub ci: bool,
    pub base_url: Option<String>,
    pub base_path: String,
}

/// Structured report of one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub environment: EnvironmentSummary,
    pub totals: Totals,
    pub suites: Vec<SuiteStats>,
    pub results: Vec<ScenarioResult>,
    pub failures: Vec<ScenarioResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub harness_errors: Vec<String>,
}

/// Paths of the written artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub run_report: PathBuf,
    pub failure_report: PathBuf,
    pub metrics: Option<PathBuf>,
}

fn success_rate(passed: usize, failed: usize) -> f64 {
    let executed = passed + failed;
    if executed == 0 {
        100.0
    } else {
        passed as f64 / executed as f64 * 100.0
    }
}

impl RunReport {
    pub fn from_context(ctx: &RunContext, profile: &EnvironmentProfile) -> Self {
        let failures: Vec<ScenarioResult> = ctx.failures().cloned().collect();
        let passed = ctx.count(ScenarioStatus::Passed);

        // Suites keep the order they first appear in.
        let mut order: Vec<&str> = Vec::new();
        let mut stats: BTreeMap<&str, SuiteStats> = BTreeMap::new();
        for result in &ctx.results {
            let entry = stats.entry(result.suite.as_str()).or_insert_with(|| {
                order.push(result.suite.as_str());
                SuiteStats {
                    name: result.suite.clone(),
                    total: 0,
                    passed: 0,
                    failed: 0,
                    skipped: 0,
                    success_rate: 0.0,
                    duration_ms: 0,
                }
            });
            entry.total += 1;
            entry.duration_ms += result.duration_ms;
            match result.status {
                ScenarioStatus::Passed => entry.passed += 1,
                ScenarioStatus::Failed => entry.failed += 1,
                ScenarioStatus::Skipped => entry.skipped += 1,
            }
        }
        let suites = order
            .into_iter()
            .filter_map(|name| stats.remove(name))
            .map(|mut s| {
                s.success_rate = success_rate(s.passed, s.failed);
                s
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            started_at: ctx.started_at,
            environment: EnvironmentSummary {
                code: profile.code.clone(),
                name: profile.name.clone(),
                ci: profile.ci,
                base_url: profile.base_url.clone(),
                base_path: profile.base_path.clone(),
            },
            totals: Totals {
                total: ctx.results.len(),
                passed,
                failed: failures.len(),
                skipped: ctx.count(ScenarioStatus::Skipped),
                success_rate: success_rate(passed, failures.len()),
                duration_ms: ctx.duration_ms(),
            },
            suites,
            results: ctx.results.clone(),
            failures,
            harness_errors: ctx.harness_errors.clone(),
        }
    }

    /// The run passed iff no scenario and no harness step failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.harness_errors.is_empty()
    }

    /// Plain-text failure report.
    pub fn failure_report(&self) -> String {
        let mut out = String::new();
        let t = &self.totals;
        let _ = writeln!(out, "E2E RUN REPORT - FAILURES");
        let _ = writeln!(out, "=========================");
        let _ = writeln!(out, "Generated: {}", self.generated_at.to_rfc3339());
        let _ = writeln!(
            out,
            "Environment: {} ({})",
            self.environment.name, self.environment.code
        );
        let _ = writeln!(out, "Scenarios run: {}", t.total - t.skipped);
        let _ = writeln!(out, "Failed: {}", t.failed);
        let _ = writeln!(out, "Skipped: {}", t.skipped);
        let _ = writeln!(out, "Success rate: {:.1}%", t.success_rate);
        let _ = writeln!(out);

        if self.failures.is_empty() {
            let _ = writeln!(out, "ALL SCENARIOS PASSED");
        } else {
            let _ = writeln!(out, "FAILURES:");
            let _ = writeln!(out, "---------");
            let _ = writeln!(out);
            for (index, failure) in self.failures.iter().enumerate() {
                let _ = writeln!(out, "{}. {} - {}", index + 1, failure.suite, failure.title);
                let _ = writeln!(out, "   Kind: {}", failure.error_kind.as_deref().unwrap_or("-"));
                let _ = writeln!(out, "   Timestamp: {}", failure.timestamp.to_rfc3339());
                let _ = writeln!(out, "   Attempts: {}", failure.attempts);
                let _ = writeln!(out, "   Error: {}", failure.error.as_deref().unwrap_or("-"));
                if let Some(stack) = &failure.stack {
                    let _ = writeln!(out, "   Trace:");
                    for line in stack.lines() {
                        let _ = writeln!(out, "     {}", line);
                    }
                }
                if let Some(shot) = &failure.screenshot {
                    let _ = writeln!(out, "   Screenshot: {}", shot.display());
                }
                let _ = writeln!(out, "   {}", "-".repeat(78));
                let _ = writeln!(out);
            }
        }

        if !self.harness_errors.is_empty() {
            let _ = writeln!(out, "HARNESS ERRORS:");
            let _ = writeln!(out, "---------------");
            for message in &self.harness_errors {
                let _ = writeln!(out, "- {}", message);
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "PER SUITE:");
        let _ = writeln!(out, "----------");
        for suite in &self.suites {
            let _ = writeln!(out, "{}:", suite.name);
            let _ = writeln!(
                out,
                "  Total: {} | Passed: {} | Failed: {} | Skipped: {} | Rate: {:.1}%",
                suite.total, suite.passed, suite.failed, suite.skipped, suite.success_rate
            );
        }
        out
    }

    /// Write `run-report.json` and `test-failures.txt` into `dir`.
    pub fn write(&self, dir: &Path) -> E2eResult<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)?;
        let run_report = dir.join(RUN_REPORT_FILE);
        std::fs::write(&run_report, serde_json::to_string_pretty(self)?)?;
        let failure_report = dir.join(FAILURE_REPORT_FILE);
        std::fs::write(&failure_report, self.failure_report())?;
        info!(
            run_report = %run_report.display(),
            failure_report = %failure_report.display(),
            failed = self.totals.failed,
            "Reports written"
        );
        Ok((run_report, failure_report))
    }
}

/// Build and write every report artifact for a finished batch.
pub fn write_artifacts(
    ctx: &RunContext,
    profile: &EnvironmentProfile,
    dir: &Path,
) -> E2eResult<(RunReport, ReportPaths)> {
    let report = RunReport::from_context(ctx, profile);
    let (run_report, failure_report) = report.write(dir)?;
    let metrics = if ctx.metrics.is_empty() {
        None
    } else {
        let path = dir.join(METRICS_FILE);
        telemetry::save_metrics(&path, &ctx.metrics)?;
        Some(path)
    };
    Ok((
        report,
        ReportPaths {
            run_report,
            failure_report,
            metrics,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;

    fn result(suite: &str, title: &str, status: ScenarioStatus) -> ScenarioResult {
        ScenarioResult {
            suite: suite.into(),
            title: title.into(),
            status,
            duration_ms: 10,
            attempts: 1,
            error: (status == ScenarioStatus::Failed).then(|| "Assertion failed: boom".to_string()),
            error_kind: (status == ScenarioStatus::Failed)
                .then(|| "ValidationAssertionError".to_string()),
            stack: (status == ScenarioStatus::Failed).then(|| "at click #x (1 ms)".to_string()),
            timestamp: Utc::now(),
            screenshot: None,
            video: None,
        }
    }

    fn context() -> RunContext {
        let mut ctx = RunContext::new();
        ctx.record(result("Auth", "login", ScenarioStatus::Passed));
        ctx.record(result("Auth", "logout", ScenarioStatus::Failed));
        ctx.record(result("Dashboard", "add", ScenarioStatus::Passed));
        ctx.record(result("Dashboard", "hml only", ScenarioStatus::Skipped));
        ctx
    }

    #[test]
    fn totals_and_suites() {
        let profile = EnvironmentProfile::for_environment(Environment::Dev);
        let report = RunReport::from_context(&context(), &profile);

        assert_eq!(report.totals.total, 4);
        assert_eq!(report.totals.passed, 2);
        assert_eq!(report.totals.failed, 1);
        assert_eq!(report.totals.skipped, 1);
        assert_eq!(report.failures.len(), report.totals.failed);
        assert!((report.totals.success_rate - 66.666).abs() < 0.01);
        assert!(!report.is_success());

        let names: Vec<&str> = report.suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Auth", "Dashboard"]);
        assert_eq!(report.suites[0].failed, 1);
        assert_eq!(report.suites[1].success_rate, 100.0);
        assert_eq!(report.environment.code, "DEV");
    }

    #[test]
    fn failure_text_lists_each_failure() {
        let profile = EnvironmentProfile::for_environment(Environment::Dev);
        let text = RunReport::from_context(&context(), &profile).failure_report();
        assert!(text.contains("1. Auth - logout"));
        assert!(text.contains("Kind: ValidationAssertionError"));
        assert!(text.contains("at click #x"));
        assert!(text.contains("Success rate: 66.7%"));
    }

    #[test]
    fn empty_run_is_a_success() {
        let profile = EnvironmentProfile::for_environment(Environment::Dev);
        let report = RunReport::from_context(&RunContext::new(), &profile);
        assert!(report.is_success());
        assert_eq!(report.totals.success_rate, 100.0);
        assert!(report.failure_report().contains("ALL SCENARIOS PASSED"));
    }

    #[test]
    fn harness_errors_fail_an_otherwise_green_run() {
        let profile = EnvironmentProfile::for_environment(Environment::Dev);
        let mut ctx = RunContext::new();
        ctx.record(result("Auth", "login", ScenarioStatus::Passed));
        ctx.harness_errors
            .push("Auth: storage not cleared at suite end: Driver error: gone".into());
        let report = RunReport::from_context(&ctx, &profile);

        assert!(report.failures.is_empty());
        assert!(!report.is_success());
        let text = report.failure_report();
        assert!(text.contains("HARNESS ERRORS:"));
        assert!(text.contains("- Auth: storage not cleared at suite end"));
    }

    #[test]
    fn artifacts_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let profile = EnvironmentProfile::for_environment(Environment::Dev);
        let mut ctx = context();
        ctx.metrics.push(Default::default());
        let (report, paths) = write_artifacts(&ctx, &profile, dir.path()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.run_report).unwrap()).unwrap();
        assert_eq!(json["totals"]["failed"], 1);
        assert_eq!(json["failures"].as_array().unwrap().len(), 1);
        assert_eq!(json["results"][0]["status"], "passed");
        assert!(paths.failure_report.exists());
        assert!(paths.metrics.unwrap().exists());
        assert_eq!(report.totals.failed, 1);
    }
}
