//! Element interaction primitives
//!
//! [`Session`] is the only layer that touches the browser driver. Every
//! primitive blocks until its condition holds or its timeout elapses, then
//! emits one structured `tracing` event and appends one [`ActionRecord`],
//! whatever the outcome.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::driver::{BrowserDriver, ElementState, Rect};
use crate::environment::{EnvironmentProfile, Timeouts};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::telemetry::PerformanceMonitor;
use crate::visual::FrameRecorder;

/// Default interval between DOM probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

const LOADING_SELECTOR: &str = "[data-testid*=\"loading\"], [data-testid*=\"spinner\"]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "lowercase")]
pub enum ActionOutcome {
    Ok,
    Failed(String),
}

/// One primitive call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub operation: String,
    pub target: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: ActionOutcome,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOptions {
    /// Clear the field before typing.
    pub clear: bool,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self { clear: true }
    }
}

/// A DOM probe: `Some` ends the poll.
pub type Probe<T> =
    dyn for<'d> FnMut(&'d mut (dyn BrowserDriver + 'static)) -> BoxFuture<'d, E2eResult<Option<T>>> + Send;

/// A browser session bound to the run's environment profile.
pub struct Session {
    driver: Box<dyn BrowserDriver>,
    profile: EnvironmentProfile,
    poll_interval: Duration,
    actions: Vec<ActionRecord>,
    telemetry: PerformanceMonitor,
    frames: Option<FrameRecorder>,
}

impl Session {
    pub fn new(driver: Box<dyn BrowserDriver>, profile: EnvironmentProfile) -> Self {
        Self {
            driver,
            profile,
            poll_interval: DEFAULT_POLL_INTERVAL,
            actions: Vec::new(),
            telemetry: PerformanceMonitor::new(),
            frames: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn profile(&self) -> &EnvironmentProfile {
        &self.profile
    }

    pub fn timeouts(&self) -> Timeouts {
        self.profile.timeouts()
    }

    pub fn driver_mut(&mut self) -> &mut (dyn BrowserDriver + 'static) {
        self.driver.as_mut()
    }

    pub fn telemetry(&self) -> &PerformanceMonitor {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut PerformanceMonitor {
        &mut self.telemetry
    }

    /// Audit trail of every primitive call so far.
    pub fn actions(&self) -> &[ActionRecord] {
        &self.actions
    }

    pub fn take_actions(&mut self) -> Vec<ActionRecord> {
        std::mem::take(&mut self.actions)
    }

    /// Start writing a frame after every state-changing primitive.
    pub fn start_frames(&mut self, dir: impl Into<PathBuf>) -> E2eResult<()> {
        self.frames = Some(FrameRecorder::new(dir)?);
        Ok(())
    }

    pub fn stop_frames(&mut self) -> Option<FrameRecorder> {
        self.frames.take()
    }

    fn record<T>(&mut self, operation: &str, target: &str, started: Instant, result: &E2eResult<T>) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let outcome = match result {
            Ok(_) => {
                debug!(operation, target, outcome = "ok", elapsed_ms, "primitive");
                ActionOutcome::Ok
            }
            Err(e) => {
                warn!(operation, target, outcome = "failed", elapsed_ms, error = %e, "primitive");
                ActionOutcome::Failed(e.to_string())
            }
        };
        self.actions.push(ActionRecord {
            operation: operation.to_string(),
            target: target.to_string(),
            timestamp: Utc::now(),
            outcome,
            elapsed_ms,
        });
    }

    async fn capture_frame(&mut self, action: &str) {
        if self.frames.is_none() {
            return;
        }
        let png = match self.driver.screenshot_png().await {
            Ok(png) => png,
            Err(e) => {
                warn!(action, error = %e, "Frame capture failed");
                return;
            }
        };
        if let Some(frames) = self.frames.as_mut() {
            if let Err(e) = frames.record(&png, action) {
                warn!(action, error = %e, "Frame write failed");
            }
        }
    }

    /// Probe until `probe` yields a value or `timeout` elapses.
    ///
    /// The probe runs at least once, even with a zero timeout.
    pub async fn poll_until<T>(
        &mut self,
        target: &str,
        timeout: Duration,
        probe: &mut Probe<T>,
    ) -> E2eResult<T> {
        let started = Instant::now();
        loop {
            if let Some(value) = probe(self.driver.as_mut()).await? {
                return Ok(value);
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(E2eError::timeout(target, elapsed.as_millis() as u64));
            }
            sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }

    async fn find_visible(&mut self, locator: &Locator, timeout: Duration) -> E2eResult<ElementState> {
        let query = locator.clone();
        self.poll_until(&locator.to_string(), timeout, &mut move |d| {
            let query = query.clone();
            Box::pin(async move { Ok(d.find_all(&query).await?.into_iter().find(|e| e.visible)) })
        })
        .await
    }

    async fn visible_now(&mut self, locator: &Locator) -> E2eResult<Vec<ElementState>> {
        Ok(self
            .driver
            .find_all(locator)
            .await?
            .into_iter()
            .filter(|e| e.visible)
            .collect())
    }

    /// Wait until at least one element matching `locator` is visible.
    pub async fn wait_for_visible(&mut self, locator: &Locator, timeout: Duration) -> E2eResult<ElementState> {
        let started = Instant::now();
        let result = self.find_visible(locator, timeout).await;
        self.record("wait_for_visible", &locator.to_string(), started, &result);
        result
    }

    /// Wait until no element matching `locator` is visible.
    pub async fn wait_for_absent(&mut self, locator: &Locator, timeout: Duration) -> E2eResult<()> {
        let started = Instant::now();
        let query = locator.clone();
        let target = format!("absence of {}", locator);
        let result = self
            .poll_until(&target, timeout, &mut move |d| {
                let query = query.clone();
                Box::pin(async move {
                    let visible = d.find_all(&query).await?.into_iter().any(|e| e.visible);
                    Ok(if visible { None } else { Some(()) })
                })
            })
            .await;
        self.record("wait_for_absent", &locator.to_string(), started, &result);
        result
    }

    /// Wait for the element, then click it.
    pub async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        let started = Instant::now();
        let timeout = self.timeouts().medium;
        let result = match self.find_visible(locator, timeout).await {
            Ok(element) => self.driver.click(&element.id, false).await,
            Err(e) => Err(e),
        };
        self.record("click", &locator.to_string(), started, &result);
        if result.is_ok() {
            self.capture_frame(&format!("click {}", locator)).await;
        }
        result
    }

    /// Click an element already located, optionally skipping actionability
    /// checks.
    pub async fn click_element(&mut self, element: &ElementState, force: bool) -> E2eResult<()> {
        let started = Instant::now();
        let result = self.driver.click(&element.id, force).await;
        let operation = if force { "click_forced" } else { "click" };
        let target = if element.text.is_empty() {
            element.id.clone()
        } else {
            element.text.clone()
        };
        self.record(operation, &target, started, &result);
        if result.is_ok() {
            self.capture_frame(&format!("{} {}", operation, target)).await;
        }
        result
    }

    /// Type into a field, clearing it first unless told otherwise.
    pub async fn fill(&mut self, locator: &Locator, value: &str, options: FillOptions) -> E2eResult<()> {
        let started = Instant::now();
        let timeout = self.timeouts().medium;
        let result: E2eResult<()> = async {
            let element = self.find_visible(locator, timeout).await?;
            if options.clear {
                self.driver.clear(&element.id).await?;
            }
            if !value.is_empty() {
                self.driver.type_text(&element.id, value).await?;
            }
            Ok(())
        }
        .await;
        self.record("fill", &locator.to_string(), started, &result);
        if result.is_ok() {
            self.capture_frame(&format!("fill {}", locator)).await;
        }
        result
    }

    /// Open a select trigger and pick the option labelled `option`.
    pub async fn select_option(&mut self, trigger: &Locator, option: &str) -> E2eResult<()> {
        let started = Instant::now();
        let timeout = self.timeouts().medium;
        let result: E2eResult<()> = async {
            let element = self.find_visible(trigger, timeout).await?;
            self.driver.click(&element.id, false).await?;
            let choice = match self.find_visible(&Locator::option(option), timeout).await {
                Ok(choice) => choice,
                Err(E2eError::Timeout { elapsed_ms, .. }) => {
                    return Err(E2eError::OptionNotFound {
                        target: trigger.to_string(),
                        option: option.to_string(),
                        elapsed_ms,
                    })
                }
                Err(e) => return Err(e),
            };
            self.driver.click(&choice.id, false).await
        }
        .await;
        self.record("select_option", &format!("{} -> {}", trigger, option), started, &result);
        if result.is_ok() {
            self.capture_frame(&format!("select {}", option)).await;
        }
        result
    }

    /// Navigate to an application path, prefixed with the base URL and base
    /// path.
    pub async fn visit(&mut self, path: &str) -> E2eResult<()> {
        let started = Instant::now();
        let url = format!(
            "{}{}",
            self.profile.base_url.as_deref().unwrap_or_default(),
            self.profile.build_url(path)
        );
        let result = self.driver.navigate(&url).await;
        self.record("visit", &url, started, &result);
        if result.is_ok() {
            self.capture_frame(&format!("visit {}", path)).await;
        }
        result
    }

    /// Unload the application so the next visit is a fresh document.
    pub async fn reset_page(&mut self) -> E2eResult<()> {
        let started = Instant::now();
        let result = self.driver.navigate("about:blank").await;
        self.record("reset_page", "about:blank", started, &result);
        result
    }

    pub async fn location(&mut self) -> E2eResult<String> {
        self.driver.current_url().await
    }

    /// Fragment of the current URL including `#`, or empty.
    pub async fn location_hash(&mut self) -> E2eResult<String> {
        let url = self.driver.current_url().await?;
        Ok(url.find('#').map(|i| url[i..].to_string()).unwrap_or_default())
    }

    /// Wait until the route fragment contains `path`.
    pub async fn should_be_at_path(&mut self, path: &str, timeout: Duration) -> E2eResult<()> {
        let started = Instant::now();
        let expected = path.to_string();
        let result = self
            .poll_until(&format!("route {}", path), timeout, &mut move |d| {
                let expected = expected.clone();
                Box::pin(async move {
                    let url = d.current_url().await?;
                    let hash = url.find('#').map(|i| &url[i..]).unwrap_or_default();
                    Ok(hash.contains(expected.as_str()).then_some(()))
                })
            })
            .await;
        self.record("should_be_at_path", path, started, &result);
        result
    }

    /// Assert the route fragment keeps containing `path` for `duration`.
    pub async fn should_stay_at_path(&mut self, path: &str, duration: Duration) -> E2eResult<()> {
        let started = Instant::now();
        let result = loop {
            let hash = match self.location_hash().await {
                Ok(hash) => hash,
                Err(e) => break Err(e),
            };
            if !hash.contains(path) {
                break Err(E2eError::ValidationAssertion(format!(
                    "expected to stay at {} but navigated to {}",
                    path, hash
                )));
            }
            let elapsed = started.elapsed();
            if elapsed >= duration {
                break Ok(());
            }
            sleep(self.poll_interval.min(duration - elapsed)).await;
        };
        self.record("should_stay_at_path", path, started, &result);
        result
    }

    pub async fn should_contain_text(&mut self, text: &str, timeout: Duration) -> E2eResult<()> {
        self.wait_for_visible(&Locator::text(text), timeout).await.map(|_| ())
    }

    /// Wait until a visible element matching `locator` contains `text`.
    pub async fn should_contain_within(
        &mut self,
        locator: &Locator,
        text: &str,
        timeout: Duration,
    ) -> E2eResult<()> {
        let started = Instant::now();
        let query = locator.clone();
        let needle = text.to_string();
        let result = self
            .poll_until(&format!("{} containing \"{}\"", locator, text), timeout, &mut move |d| {
                let query = query.clone();
                let needle = needle.clone();
                Box::pin(async move {
                    let found = d
                        .find_all(&query)
                        .await?
                        .into_iter()
                        .any(|e| e.visible && e.text.contains(needle.as_str()));
                    Ok(found.then_some(()))
                })
            })
            .await;
        self.record("should_contain", &format!("{} ~ {}", locator, text), started, &result);
        result
    }

    /// Wait until no visible element matching `locator` contains `text`.
    pub async fn should_not_contain_within(
        &mut self,
        locator: &Locator,
        text: &str,
        timeout: Duration,
    ) -> E2eResult<()> {
        let started = Instant::now();
        let query = locator.clone();
        let needle = text.to_string();
        let result = self
            .poll_until(&format!("{} without \"{}\"", locator, text), timeout, &mut move |d| {
                let query = query.clone();
                let needle = needle.clone();
                Box::pin(async move {
                    let found = d
                        .find_all(&query)
                        .await?
                        .into_iter()
                        .any(|e| e.visible && e.text.contains(needle.as_str()));
                    Ok((!found).then_some(()))
                })
            })
            .await;
        self.record("should_not_contain", &format!("{} ~ {}", locator, text), started, &result);
        result
    }

    /// Number of matching elements visible right now.
    pub async fn count(&mut self, locator: &Locator) -> E2eResult<usize> {
        let started = Instant::now();
        let result = self.visible_now(locator).await.map(|v| v.len());
        self.record("count", &locator.to_string(), started, &result);
        result
    }

    /// Texts of matching elements visible right now.
    pub async fn visible_texts(&mut self, locator: &Locator) -> E2eResult<Vec<String>> {
        Ok(self
            .visible_now(locator)
            .await?
            .into_iter()
            .map(|e| e.text)
            .filter(|t| !t.is_empty())
            .collect())
    }

    pub async fn if_exists(&mut self, locator: &Locator) -> E2eResult<bool> {
        Ok(!self.visible_now(locator).await?.is_empty())
    }

    pub async fn attribute(&mut self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        let started = Instant::now();
        let timeout = self.timeouts().medium;
        let result: E2eResult<Option<String>> = async {
            let element = self.find_visible(locator, timeout).await?;
            self.driver.attribute(&element.id, name).await
        }
        .await;
        self.record("attribute", &format!("{}@{}", locator, name), started, &result);
        result
    }

    /// Wait until the element's attribute equals `expected`.
    pub async fn should_have_attribute(
        &mut self,
        locator: &Locator,
        name: &str,
        expected: &str,
        timeout: Duration,
    ) -> E2eResult<()> {
        let started = Instant::now();
        let query = locator.clone();
        let attr = name.to_string();
        let want = expected.to_string();
        let result = self
            .poll_until(&format!("{}@{}", locator, name), timeout, &mut move |d| {
                let query = query.clone();
                let attr = attr.clone();
                let want = want.clone();
                Box::pin(async move {
                    let Some(element) = d.find_all(&query).await?.into_iter().find(|e| e.visible) else {
                        return Ok(None);
                    };
                    let value = d.attribute(&element.id, &attr).await?;
                    Ok((value.as_deref() == Some(want.as_str())).then_some(()))
                })
            })
            .await
            .map_err(|e| match e {
                E2eError::Timeout { .. } => E2eError::ValidationAssertion(format!(
                    "{} should have {}=\"{}\"",
                    locator, name, expected
                )),
                other => other,
            });
        self.record("should_have_attribute", &format!("{}@{}", locator, name), started, &result);
        result
    }

    /// Wait for loading indicators to disappear.
    pub async fn wait_for_loading(&mut self) -> E2eResult<()> {
        let spinner = Locator::css(LOADING_SELECTOR);
        if self.if_exists(&spinner).await? {
            let timeout = self.timeouts().long;
            self.wait_for_absent(&spinner, timeout).await?;
        }
        Ok(())
    }

    /// Bounds of every visible element matching `locator`.
    pub async fn regions_of(&mut self, locator: &Locator) -> E2eResult<Vec<Rect>> {
        let mut regions = Vec::new();
        for element in self.visible_now(locator).await? {
            regions.push(self.driver.element_rect(&element.id).await?);
        }
        Ok(regions)
    }

    pub async fn screenshot_png(&mut self) -> E2eResult<Vec<u8>> {
        let started = Instant::now();
        let result = self.driver.screenshot_png().await;
        self.record("screenshot", "viewport", started, &result);
        result
    }

    pub async fn set_viewport(&mut self, width: u32, height: u32) -> E2eResult<()> {
        let started = Instant::now();
        let result = self.driver.set_viewport(width, height).await;
        self.record("set_viewport", &format!("{}x{}", width, height), started, &result);
        result
    }

    pub async fn clear_storage(&mut self) -> E2eResult<()> {
        let started = Instant::now();
        let result = self.driver.clear_storage().await;
        self.record("clear_storage", "localStorage+cookies", started, &result);
        result
    }

    pub async fn set_local_storage(&mut self, key: &str, value: &str) -> E2eResult<()> {
        let started = Instant::now();
        let result = self.driver.set_local_storage(key, value).await;
        self.record("set_local_storage", key, started, &result);
        result
    }

    pub async fn take_page_errors(&mut self) -> E2eResult<Vec<String>> {
        self.driver.take_page_errors().await
    }

    /// Smart wait: sleeps for the profile-scaled duration.
    pub async fn smart_wait(&mut self, base: Duration) {
        let wait = self.profile.smart_wait(base);
        debug!(wait_ms = wait.as_millis() as u64, environment = %self.profile.environment, "Smart wait");
        sleep(wait).await;
    }

    pub async fn close(&mut self) -> E2eResult<()> {
        self.driver.close().await
    }
}
