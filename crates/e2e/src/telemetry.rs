//! Timers, memory and network sampling
//!
//! Telemetry is additive: it records what commands and primitives did but
//! never changes their outcome. Threshold checks log and report, they do not
//! fail a scenario.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::driver::{PageLoadTiming, ResourceTiming};
use crate::environment::EnvironmentProfile;
use crate::error::E2eResult;
use crate::primitives::Session;

/// Requests slower than this are reported.
pub const SLOW_REQUEST_MS: f64 = 1000.0;

/// Element waits slower than this are reported.
pub const SLOW_ELEMENT_MS: u64 = 3000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub operation: String,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySample {
    pub operation: String,
    pub memory_used_bytes: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLoadSample {
    pub page: String,
    pub dom_content_loaded_ms: f64,
    pub load_complete_ms: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowRequest {
    pub url: String,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowElement {
    pub target: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCheck {
    pub operation: String,
    pub duration_ms: u64,
    pub max_ms: u64,
    pub passed: bool,
}

/// Everything one scenario measured, as written to `metrics.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub test: String,
    pub environment: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub durations: Vec<PerformanceSample>,
    pub memory: Vec<MemorySample>,
    pub page_loads: Vec<PageLoadSample>,
    pub slow_requests: Vec<SlowRequest>,
    pub slow_elements: Vec<SlowElement>,
    pub threshold_checks: Vec<ThresholdCheck>,
}

/// Collects timings for the current scenario.
#[derive(Debug, Default)]
pub struct PerformanceMonitor {
    timers: HashMap<String, Instant>,
    metrics: MetricsSnapshot,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_timer(&mut self, operation: &str) {
        debug!(operation, "Timer started");
        self.timers.insert(operation.to_string(), Instant::now());
    }

    /// Stop a named timer and record its duration. Unknown timers are ignored.
    pub fn end_timer(&mut self, operation: &str) -> Option<Duration> {
        let started = self.timers.remove(operation)?;
        let elapsed = started.elapsed();
        self.record_duration(operation, elapsed);
        Some(elapsed)
    }

    /// Drop a running timer without recording it. Returns false if it was
    /// not running.
    pub fn cancel_timer(&mut self, operation: &str) -> bool {
        let cancelled = self.timers.remove(operation).is_some();
        if cancelled {
            debug!(operation, "Timer cancelled");
        }
        cancelled
    }

    pub fn is_timing(&self, operation: &str) -> bool {
        self.timers.contains_key(operation)
    }

    pub fn record_duration(&mut self, operation: &str, elapsed: Duration) {
        let duration_ms = elapsed.as_millis() as u64;
        info!(operation, duration_ms, "Operation timed");
        self.metrics.durations.push(PerformanceSample {
            operation: operation.to_string(),
            duration_ms,
            timestamp: Utc::now(),
        });
    }

    pub fn record_memory(&mut self, operation: &str, memory_used_bytes: u64) {
        info!(
            operation,
            memory_mb = memory_used_bytes as f64 / (1024.0 * 1024.0),
            "Memory sampled"
        );
        self.metrics.memory.push(MemorySample {
            operation: operation.to_string(),
            memory_used_bytes,
            timestamp: Utc::now(),
        });
    }

    pub fn record_page_load(&mut self, page: &str, timing: PageLoadTiming) {
        info!(
            page,
            dom_content_loaded_ms = timing.dom_content_loaded_ms,
            load_complete_ms = timing.load_complete_ms,
            "Page load measured"
        );
        self.metrics.page_loads.push(PageLoadSample {
            page: page.to_string(),
            dom_content_loaded_ms: timing.dom_content_loaded_ms,
            load_complete_ms: timing.load_complete_ms,
            timestamp: Utc::now(),
        });
    }

    /// Record requests slower than [`SLOW_REQUEST_MS`]; returns how many.
    pub fn record_resources(&mut self, timings: &[ResourceTiming]) -> usize {
        let slow: Vec<SlowRequest> = timings
            .iter()
            .filter(|t| t.duration_ms > SLOW_REQUEST_MS)
            .map(|t| SlowRequest {
                url: t.name.clone(),
                duration_ms: t.duration_ms,
            })
            .collect();
        for request in &slow {
            warn!(url = %request.url, duration_ms = request.duration_ms, "Slow request");
        }
        let count = slow.len();
        self.metrics.slow_requests.extend(slow);
        count
    }

    /// Record an element wait, flagging it when slower than [`SLOW_ELEMENT_MS`].
    pub fn record_element_wait(&mut self, target: &str, elapsed: Duration) -> bool {
        let duration_ms = elapsed.as_millis() as u64;
        if duration_ms <= SLOW_ELEMENT_MS {
            return false;
        }
        warn!(target, duration_ms, "Slow element");
        self.metrics.slow_elements.push(SlowElement {
            target: target.to_string(),
            duration_ms,
        });
        true
    }

    /// Compare the latest duration of `operation` against `max`. Report only.
    pub fn check_threshold(&mut self, operation: &str, max: Duration) -> Option<bool> {
        let sample = self
            .metrics
            .durations
            .iter()
            .rev()
            .find(|s| s.operation == operation)?;
        let max_ms = max.as_millis() as u64;
        let passed = sample.duration_ms <= max_ms;
        if passed {
            info!(operation, duration_ms = sample.duration_ms, max_ms, "Within threshold");
        } else {
            warn!(operation, duration_ms = sample.duration_ms, max_ms, "Threshold exceeded");
        }
        let check = ThresholdCheck {
            operation: operation.to_string(),
            duration_ms: sample.duration_ms,
            max_ms,
            passed,
        };
        self.metrics.threshold_checks.push(check);
        Some(passed)
    }

    pub fn durations(&self) -> &[PerformanceSample] {
        &self.metrics.durations
    }

    pub fn memory(&self) -> &[MemorySample] {
        &self.metrics.memory
    }

    pub fn is_empty(&self) -> bool {
        self.metrics == MetricsSnapshot::default()
    }

    /// Take everything recorded so far, leaving the monitor empty.
    pub fn take_snapshot(&mut self, test: &str, profile: &EnvironmentProfile) -> MetricsSnapshot {
        self.timers.clear();
        let mut snapshot = std::mem::take(&mut self.metrics);
        snapshot.test = test.to_string();
        snapshot.environment = profile.code.clone();
        snapshot.timestamp = Some(Utc::now());
        snapshot
    }
}

/// Append snapshots to the JSON array stored at `path`.
pub fn save_metrics(path: &Path, snapshots: &[MetricsSnapshot]) -> E2eResult<()> {
    let mut all: Vec<MetricsSnapshot> = if path.exists() {
        serde_json::from_str(&std::fs::read_to_string(path)?)?
    } else {
        Vec::new()
    };
    all.extend_from_slice(snapshots);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&all)?)?;
    info!("Metrics written to: {}", path.display());
    Ok(())
}

/// Sample navigation timing of the current page.
pub async fn measure_page_load(session: &mut Session, page: &str) -> E2eResult<()> {
    if let Some(timing) = session.driver_mut().page_load_timing().await? {
        session.telemetry_mut().record_page_load(page, timing);
    }
    Ok(())
}

/// Sample JS heap usage, when the browser exposes it.
pub async fn monitor_memory_usage(session: &mut Session, operation: &str) -> E2eResult<()> {
    match session.driver_mut().memory_used_bytes().await? {
        Some(bytes) => session.telemetry_mut().record_memory(operation, bytes),
        None => debug!(operation, "Memory API not available"),
    }
    Ok(())
}

/// Report slow requests from the resource timing buffer.
pub async fn monitor_network(session: &mut Session) -> E2eResult<usize> {
    let timings = session.driver_mut().resource_timings().await?;
    Ok(session.telemetry_mut().record_resources(&timings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timers_record_named_durations() {
        let mut monitor = PerformanceMonitor::new();
        monitor.start_timer("login_operation");
        assert!(monitor.end_timer("login_operation").is_some());
        assert!(monitor.end_timer("login_operation").is_none());
        assert_eq!(monitor.durations().len(), 1);
        assert_eq!(monitor.durations()[0].operation, "login_operation");
    }

    #[test]
    fn cancelled_timers_record_nothing() {
        let mut monitor = PerformanceMonitor::new();
        monitor.start_timer("add_item_operation");
        assert!(monitor.is_timing("add_item_operation"));
        assert!(monitor.cancel_timer("add_item_operation"));
        assert!(!monitor.is_timing("add_item_operation"));
        assert!(!monitor.cancel_timer("add_item_operation"));
        assert!(monitor.end_timer("add_item_operation").is_none());
        assert!(monitor.durations().is_empty());
    }

    #[test]
    fn slow_requests_are_flagged() {
        let mut monitor = PerformanceMonitor::new();
        let count = monitor.record_resources(&[
            ResourceTiming { name: "/app.js".into(), duration_ms: 80.0 },
            ResourceTiming { name: "/chunk.js".into(), duration_ms: 1200.0 },
        ]);
        assert_eq!(count, 1);
    }

    #[test]
    fn thresholds_only_report() {
        let mut monitor = PerformanceMonitor::new();
        monitor.record_duration("add_item_operation", Duration::from_millis(4000));
        assert_eq!(
            monitor.check_threshold("add_item_operation", Duration::from_secs(3)),
            Some(false)
        );
        assert_eq!(monitor.check_threshold("missing", Duration::from_secs(3)), None);
        assert!(!monitor.record_element_wait("x", Duration::from_millis(100)));
        assert!(monitor.record_element_wait("x", Duration::from_millis(3500)));
    }

    #[test]
    fn metrics_file_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let profile = EnvironmentProfile::for_environment(crate::environment::Environment::Dev);

        let mut monitor = PerformanceMonitor::new();
        monitor.record_memory("login", 1024);
        let first = monitor.take_snapshot("first", &profile);
        assert!(monitor.is_empty());
        save_metrics(&path, &[first]).unwrap();
        save_metrics(&path, &[MetricsSnapshot::default()]).unwrap();

        let saved: Vec<MetricsSnapshot> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].environment, "DEV");
        assert_eq!(saved[0].memory[0].memory_used_bytes, 1024);
    }
}
