//! Environment resolution
//!
//! A run is configured by exactly one [`EnvironmentProfile`]. It is resolved
//! from a handful of process signals (`CI`, `ENVIRONMENT`, `NODE_ENV`,
//! `BASE_URL`) and every timeout, retry and base-path decision downstream
//! derives from it.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Base path the application is served under in the pipeline.
pub const CI_BASE_PATH: &str = "/pipelineManus";

/// Origin used when `BASE_URL` is unset: the dev server locally, the
/// preview server in the pipeline.
pub const LOCAL_BASE_URL: &str = "http://localhost:5173";
pub const CI_BASE_URL: &str = "http://localhost:4173";

/// Deployment environment the suite runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Preview,
    Ci,
    Tst,
    Hml,
    Prd,
}

impl Environment {
    pub const ALL: [Environment; 6] = [
        Environment::Dev,
        Environment::Preview,
        Environment::Ci,
        Environment::Tst,
        Environment::Hml,
        Environment::Prd,
    ];

    /// Lowercase key used in env vars and scenario filters.
    pub fn key(self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Preview => "preview",
            Environment::Ci => "ci",
            Environment::Tst => "tst",
            Environment::Hml => "hml",
            Environment::Prd => "prd",
        }
    }

    /// Human name, as the harness logs it.
    pub fn name(self) -> &'static str {
        match self {
            Environment::Dev => "Desenvolvimento",
            Environment::Preview => "Preview",
            Environment::Ci => "CI/CD",
            Environment::Tst => "Teste",
            Environment::Hml => "Homologação",
            Environment::Prd => "Produção",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Environment::Dev => "DEV",
            Environment::Preview => "PREV",
            Environment::Ci => "CI",
            Environment::Tst => "TST",
            Environment::Hml => "HML",
            Environment::Prd => "PRD",
        }
    }

    /// Name the application shows in its environment badge.
    ///
    /// Preview and CI builds are served from localhost, which the
    /// application reports as development.
    pub fn display_name(self) -> &'static str {
        match self {
            Environment::Dev | Environment::Preview | Environment::Ci => "Desenvolvimento",
            Environment::Tst => "Teste",
            Environment::Hml => "Homologação",
            Environment::Prd => "Produção",
        }
    }

    /// Code shown next to [`display_name`](Self::display_name).
    pub fn display_code(self) -> &'static str {
        match self {
            Environment::Dev | Environment::Preview | Environment::Ci => "DEV",
            Environment::Tst => "TST",
            Environment::Hml => "HML",
            Environment::Prd => "PRD",
        }
    }

    pub fn timeout_ms(self) -> u64 {
        match self {
            Environment::Dev => 10_000,
            Environment::Preview => 15_000,
            Environment::Ci => 30_000,
            Environment::Tst => 20_000,
            Environment::Hml => 15_000,
            Environment::Prd => 25_000,
        }
    }

    pub fn retry_budget(self) -> u32 {
        match self {
            Environment::Dev => 1,
            Environment::Preview | Environment::Tst | Environment::Hml => 2,
            Environment::Ci | Environment::Prd => 3,
        }
    }

    /// Parse an environment key. Anything but the six keys, including
    /// `NODE_ENV` values such as `production`, falls back to dev.
    pub fn from_name(name: &str) -> Environment {
        name.parse().unwrap_or(Environment::Dev)
    }

    fn from_base_url(url: &str) -> Option<Environment> {
        if url.contains("localhost:5173") {
            Some(Environment::Dev)
        } else if url.contains("localhost:4173") {
            Some(Environment::Preview)
        } else if url.contains("tst.") {
            Some(Environment::Tst)
        } else if url.contains("hml.") {
            Some(Environment::Hml)
        } else if url.contains("prd.") {
            Some(Environment::Prd)
        } else {
            None
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "preview" => Ok(Environment::Preview),
            "ci" => Ok(Environment::Ci),
            "tst" => Ok(Environment::Tst),
            "hml" => Ok(Environment::Hml),
            "prd" => Ok(Environment::Prd),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// Raw process signals the resolver consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentSignals {
    pub ci: bool,
    pub environment: Option<String>,
    pub node_env: Option<String>,
    pub base_url: Option<String>,
}

impl EnvironmentSignals {
    /// Read `CI`, `ENVIRONMENT`, `NODE_ENV` and `BASE_URL` from the process.
    pub fn from_env() -> Self {
        let var = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            ci: var("CI").map(|v| is_truthy(&v)).unwrap_or(false),
            environment: var("ENVIRONMENT"),
            node_env: var("NODE_ENV"),
            base_url: var("BASE_URL"),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(value.to_lowercase().as_str(), "0" | "false" | "no" | "off")
}

/// Whether the run is interactive (local) or headless in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Interactive,
    Ci,
}

/// Timeout tiers derived from the profile's base timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub short: Duration,
    pub medium: Duration,
    pub long: Duration,
    pub extra_long: Duration,
}

impl Timeouts {
    pub fn from_base_ms(base: u64) -> Self {
        Self {
            short: Duration::from_millis(base * 3 / 10),
            medium: Duration::from_millis(base),
            long: Duration::from_millis(base * 2),
            extra_long: Duration::from_millis(base * 3),
        }
    }
}

/// Resolved execution context for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    pub environment: Environment,
    pub name: String,
    pub code: String,
    pub timeout_ms: u64,
    pub retry_budget: u32,
    pub base_path: String,
    pub base_url: Option<String>,
    pub ci: bool,
}

static CURRENT: OnceCell<EnvironmentProfile> = OnceCell::new();

/// Resolve a profile from signals.
///
/// Precedence: CI signal, then `ENVIRONMENT`/`NODE_ENV`, then the base URL
/// heuristic, then dev.
pub fn resolve(signals: &EnvironmentSignals) -> EnvironmentProfile {
    let environment = if signals.ci {
        Environment::Ci
    } else if let Some(name) = signals.environment.as_deref().or(signals.node_env.as_deref()) {
        Environment::from_name(name)
    } else {
        signals
            .base_url
            .as_deref()
            .and_then(Environment::from_base_url)
            .unwrap_or(Environment::Dev)
    };

    let fallback_url = if signals.ci { CI_BASE_URL } else { LOCAL_BASE_URL };
    let base_url = Some(
        signals
            .base_url
            .clone()
            .unwrap_or_else(|| fallback_url.to_string()),
    );

    EnvironmentProfile {
        environment,
        name: environment.name().to_string(),
        code: environment.code().to_string(),
        timeout_ms: environment.timeout_ms(),
        retry_budget: environment.retry_budget(),
        base_path: if signals.ci {
            CI_BASE_PATH.to_string()
        } else {
            String::new()
        },
        base_url,
        ci: signals.ci,
    }
}

impl EnvironmentProfile {
    /// Profile of the current process, resolved once and cached for the run.
    pub fn current() -> &'static EnvironmentProfile {
        CURRENT.get_or_init(|| {
            let profile = resolve(&EnvironmentSignals::from_env());
            profile.log_info();
            profile
        })
    }

    /// Pin the run's profile before first use. Returns false if one was
    /// already resolved.
    pub fn install(profile: EnvironmentProfile) -> bool {
        CURRENT.set(profile).is_ok()
    }

    pub fn for_environment(environment: Environment) -> Self {
        resolve(&EnvironmentSignals {
            ci: environment == Environment::Ci,
            environment: Some(environment.key().to_string()),
            ..Default::default()
        })
    }

    /// Override the base timeout, keeping everything else.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts::from_base_ms(self.timeout_ms)
    }

    pub fn is_ci(&self) -> bool {
        self.ci
    }

    pub fn run_mode(&self) -> RunMode {
        if self.ci {
            RunMode::Ci
        } else {
            RunMode::Interactive
        }
    }

    /// Prefix an application path with the base path.
    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_path, path)
    }

    /// Pipelines get twice the wait.
    pub fn smart_wait(&self, base: Duration) -> Duration {
        if self.ci {
            base * 2
        } else {
            base
        }
    }

    /// `"all"` matches every environment.
    pub fn should_run_in<S: AsRef<str>>(&self, environments: &[S]) -> bool {
        environments.iter().any(|e| {
            let e = e.as_ref();
            e == "all" || e.eq_ignore_ascii_case(self.environment.key())
        })
    }

    pub fn viewport(&self) -> (u32, u32) {
        if self.ci {
            (1920, 1080)
        } else {
            (1280, 720)
        }
    }

    pub fn log_info(&self) {
        let t = self.timeouts();
        info!(
            environment = %self.environment,
            ci = self.ci,
            base_path = %self.base_path,
            base_url = self.base_url.as_deref().unwrap_or("-"),
            short_ms = t.short.as_millis() as u64,
            medium_ms = t.medium.as_millis() as u64,
            long_ms = t.long.as_millis() as u64,
            "Environment resolved"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn signals(ci: bool, env: Option<&str>, node: Option<&str>, url: Option<&str>) -> EnvironmentSignals {
        EnvironmentSignals {
            ci,
            environment: env.map(String::from),
            node_env: node.map(String::from),
            base_url: url.map(String::from),
        }
    }

    #[test_case(signals(true, Some("prd"), None, None) => Environment::Ci; "ci signal wins")]
    #[test_case(signals(false, Some("HML"), Some("prd"), None) => Environment::Hml; "environment before node env")]
    #[test_case(signals(false, None, Some("tst"), Some("http://localhost:5173")) => Environment::Tst; "node env before url")]
    #[test_case(signals(false, None, None, Some("http://localhost:4173")) => Environment::Preview; "preview port")]
    #[test_case(signals(false, None, None, Some("https://hml.manus.example")) => Environment::Hml; "hml host")]
    #[test_case(signals(false, None, None, Some("https://prd.manus.example")) => Environment::Prd; "prd host")]
    #[test_case(signals(false, Some("staging"), None, None) => Environment::Dev; "unknown falls back to dev")]
    #[test_case(signals(false, None, Some("test"), None) => Environment::Dev; "node env test is not tst")]
    #[test_case(signals(false, None, Some("production"), None) => Environment::Dev; "node env production is not prd")]
    #[test_case(signals(false, Some("development"), None, None) => Environment::Dev; "development is dev by fallback")]
    #[test_case(signals(false, None, None, None) => Environment::Dev; "no signals")]
    fn resolves_environment(s: EnvironmentSignals) -> Environment {
        resolve(&s).environment
    }

    #[test_case(signals(false, None, Some("production"), None) => "http://localhost:5173"; "local fallback")]
    #[test_case(signals(false, Some("hml"), None, None) => "http://localhost:5173"; "named env without url")]
    #[test_case(signals(true, None, None, None) => "http://localhost:4173"; "ci fallback")]
    #[test_case(signals(true, None, None, Some("http://app:8080")) => "http://app:8080"; "explicit url wins")]
    fn resolves_base_url(s: EnvironmentSignals) -> String {
        resolve(&s).base_url.unwrap_or_default()
    }

    #[test]
    fn only_the_six_keys_parse() {
        for key in ["dev", "preview", "ci", "tst", "hml", "PRD"] {
            assert!(key.parse::<Environment>().is_ok(), "{}", key);
        }
        for alias in ["development", "test", "production"] {
            assert!(alias.parse::<Environment>().is_err(), "{}", alias);
        }
    }

    #[test]
    fn ci_profile_uses_pipeline_base_path() {
        let profile = resolve(&signals(true, None, None, None));
        assert_eq!(profile.base_path, CI_BASE_PATH);
        assert_eq!(profile.timeout_ms, 30_000);
        assert_eq!(profile.retry_budget, 3);
        assert_eq!(profile.base_url.as_deref(), Some("http://localhost:4173"));
        assert_eq!(profile.build_url("/#/login"), "/pipelineManus/#/login");
        assert_eq!(profile.viewport(), (1920, 1080));
    }

    #[test]
    fn local_profile_is_valid() {
        let profile = resolve(&signals(false, None, None, None));
        assert_eq!(profile.base_path, "");
        assert_eq!(profile.code, "DEV");
        assert!(profile.timeout_ms > 0);
        assert!(profile.retry_budget >= 1);
        assert_eq!(profile.smart_wait(Duration::from_millis(1000)), Duration::from_millis(1000));
    }

    #[test]
    fn every_profile_is_valid() {
        for env in Environment::ALL {
            let profile = EnvironmentProfile::for_environment(env);
            assert!(profile.timeout_ms > 0);
            assert!(profile.retry_budget >= 1);
            assert_eq!(profile.base_path.is_empty(), env != Environment::Ci);
        }
    }

    #[test]
    fn timeout_tiers_scale_from_base() {
        let t = Timeouts::from_base_ms(10_000);
        assert_eq!(t.short, Duration::from_millis(3_000));
        assert_eq!(t.medium, Duration::from_millis(10_000));
        assert_eq!(t.long, Duration::from_millis(20_000));
        assert_eq!(t.extra_long, Duration::from_millis(30_000));
    }

    #[test]
    fn run_filter_accepts_all_and_current() {
        let profile = EnvironmentProfile::for_environment(Environment::Hml);
        assert!(profile.should_run_in(&["all"]));
        assert!(profile.should_run_in(&["dev", "hml"]));
        assert!(!profile.should_run_in(&["ci"]));
    }
}
