//! Harness configuration
//!
//! Loaded from a YAML file; every field has a default so an empty file (or no
//! file at all) yields a working local setup. Command-line flags override
//! individual values after loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::driver::{Browser, WebDriverConfig};
use crate::environment::{EnvironmentProfile, RunMode};
use crate::error::{E2eError, E2eResult};
use crate::server::AppServerConfig;

/// Top-level harness configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Application origin. Overrides the environment's default.
    pub base_url: Option<String>,

    /// Viewport for interactive runs. CI runs use the profile's viewport.
    pub viewport: ViewportConfig,

    /// Artifact output
    pub artifacts: ArtifactConfig,

    /// Scenario retries per run mode
    pub retries: RetryConfig,

    /// Third-party hosts blocked in CI (analytics, ads, trackers)
    pub block_hosts: Vec<String>,

    /// WebDriver remote end
    pub webdriver: WebDriverSettings,

    /// Application server to spawn before the run (None = already running)
    pub app_server: Option<AppServerConfig>,

    /// Interval between DOM polls, in milliseconds
    pub poll_interval_ms: u64,

    /// Directory holding `users.json` (None = built-in fixtures)
    pub fixtures_dir: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            viewport: ViewportConfig::default(),
            artifacts: ArtifactConfig::default(),
            retries: RetryConfig::default(),
            block_hosts: default_block_hosts(),
            webdriver: WebDriverSettings::default(),
            app_server: None,
            poll_interval_ms: 100,
            fixtures_dir: None,
        }
    }
}

fn default_block_hosts() -> Vec<String> {
    [
        "*googlesyndication.com",
        "*google-analytics.com",
        "*googletagmanager.com",
        "*hotjar.com",
        "*mixpanel.com",
        "*segment.com",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Where and what the harness writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Root of every artifact below
    pub output_dir: PathBuf,

    /// Failure screenshots, relative to `output_dir`
    pub screenshots_folder: PathBuf,

    /// Step frames recorded in CI, relative to `output_dir`
    pub videos_folder: PathBuf,

    /// Run report, failure report and metrics, relative to `output_dir`
    pub reports_folder: PathBuf,

    /// Record step frames in CI mode
    pub video: bool,

    /// Capture a redacted screenshot when a scenario fails
    pub screenshot_on_failure: bool,

    /// Remove previous screenshots and frames before the run
    pub trash_assets_before_run: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("e2e-results"),
            screenshots_folder: PathBuf::from("screenshots"),
            videos_folder: PathBuf::from("videos"),
            reports_folder: PathBuf::from("reports"),
            video: true,
            screenshot_on_failure: true,
            trash_assets_before_run: true,
        }
    }
}

impl ArtifactConfig {
    pub fn screenshots_dir(&self) -> PathBuf {
        self.output_dir.join(&self.screenshots_folder)
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.output_dir.join(&self.videos_folder)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.output_dir.join(&self.reports_folder)
    }
}

/// Extra attempts for a failed scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Headless (CI) runs
    pub run_mode: u32,

    /// Interactive runs
    pub open_mode: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            run_mode: 2,
            open_mode: 0,
        }
    }
}

impl RetryConfig {
    pub fn for_mode(&self, mode: RunMode) -> u32 {
        match mode {
            RunMode::Ci => self.run_mode,
            RunMode::Interactive => self.open_mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverSettings {
    /// Remote end URL (chromedriver defaults to port 9515)
    pub url: String,

    pub browser: Browser,

    /// Force headless. CI runs are always headless.
    pub headless: bool,

    /// Per-request timeout, in seconds
    pub request_timeout_secs: u64,
}

impl Default for WebDriverSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:9515".to_string(),
            browser: Browser::Chrome,
            headless: false,
            request_timeout_secs: 60,
        }
    }
}

impl HarnessConfig {
    /// Load from a YAML file.
    pub fn load(path: &Path) -> E2eResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            E2eError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&raw)
            .map_err(|e| E2eError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load `path` if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> E2eResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn parse(yaml: &str) -> E2eResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: HarnessConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        debug!(?config, "Harness configuration loaded");
        Ok(config)
    }

    fn validate(&self) -> E2eResult<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(E2eError::Config("viewport must be non-empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(E2eError::Config("poll_interval_ms must be positive".into()));
        }
        if self.webdriver.url.trim().is_empty() {
            return Err(E2eError::Config("webdriver.url must be set".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Scenario retries for the profile's run mode.
    pub fn retries_for(&self, profile: &EnvironmentProfile) -> u32 {
        self.retries.for_mode(profile.run_mode())
    }

    /// Viewport for the run: the configured one locally, the profile's in CI.
    pub fn viewport_for(&self, profile: &EnvironmentProfile) -> (u32, u32) {
        if profile.is_ci() {
            profile.viewport()
        } else {
            (self.viewport.width, self.viewport.height)
        }
    }

    /// Base URL, preferring an explicit configuration over the profile's.
    pub fn base_url_for(&self, profile: &EnvironmentProfile) -> Option<String> {
        self.base_url.clone().or_else(|| profile.base_url.clone())
    }

    /// WebDriver session settings for a run under `profile`.
    pub fn webdriver_config(&self, profile: &EnvironmentProfile) -> WebDriverConfig {
        WebDriverConfig {
            url: self.webdriver.url.clone(),
            browser: self.webdriver.browser,
            headless: self.webdriver.headless || profile.is_ci(),
            viewport: self.viewport_for(profile),
            blocked_hosts: if profile.is_ci() {
                self.block_hosts.clone()
            } else {
                Vec::new()
            },
            base_url: self.base_url_for(profile),
            request_timeout: Duration::from_secs(self.webdriver.request_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = HarnessConfig::parse("").unwrap();
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.retries, RetryConfig { run_mode: 2, open_mode: 0 });
        assert_eq!(config.block_hosts.len(), 6);
        assert_eq!(config.artifacts.screenshots_dir(), PathBuf::from("e2e-results/screenshots"));
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = r#"
base_url: http://localhost:5173
retries:
  run_mode: 3
webdriver:
  browser: firefox
app_server:
  command: npm
  args: [run, dev]
  base_url: http://localhost:5173
"#;
        let config = HarnessConfig::parse(yaml).unwrap();
        assert_eq!(config.retries.run_mode, 3);
        assert_eq!(config.retries.open_mode, 0);
        assert_eq!(config.webdriver.browser, Browser::Firefox);
        assert_eq!(config.webdriver.url, "http://localhost:9515");
        let server = config.app_server.unwrap();
        assert_eq!(server.args, vec!["run", "dev"]);
        assert_eq!(server.health_path, "/");
        assert_eq!(config.viewport, ViewportConfig::default());
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let err = HarnessConfig::parse("viewport: { width: 0 }").unwrap_err();
        assert!(matches!(err, E2eError::Config(_)));
        let err = HarnessConfig::parse("retries: nope").unwrap_err();
        assert!(matches!(err, E2eError::Yaml(_)));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = HarnessConfig::load(Path::new("/nonexistent/harness.yaml")).unwrap_err();
        assert!(matches!(err, E2eError::Config(_)));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.yaml");
        std::fs::write(&path, "poll_interval_ms: 50\n").unwrap();
        let config = HarnessConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
    }

    #[test]
    fn ci_blocks_hosts_and_runs_headless() {
        let config = HarnessConfig::default();
        let ci = EnvironmentProfile::for_environment(Environment::Ci);
        let local = EnvironmentProfile::for_environment(Environment::Dev);

        let wd = config.webdriver_config(&ci);
        assert!(wd.headless);
        assert_eq!(wd.blocked_hosts.len(), 6);
        assert_eq!(wd.viewport, (1920, 1080));
        assert_eq!(config.retries_for(&ci), 2);

        let wd = config.webdriver_config(&local);
        assert!(!wd.headless);
        assert!(wd.blocked_hosts.is_empty());
        assert_eq!(wd.viewport, (1280, 720));
        assert_eq!(wd.base_url.as_deref(), Some("http://localhost:5173"));
        assert_eq!(config.retries_for(&local), 0);
    }
}
