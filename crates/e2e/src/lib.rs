//! Manus E2E Test Harness
//!
//! This crate drives the Manus web application through a real browser (or an
//! in-process simulation of it) and verifies its user-facing flows:
//! - Resolves one environment profile per run (timeouts, retries, base path)
//! - Wraps every DOM interaction in a polled, logged primitive
//! - Models the login, registration and dashboard pages as page objects
//! - Runs ordered scenario suites with per-scenario fault isolation
//! - Writes a JSON run report, a failure report, metrics and redacted screenshots
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  ScenarioRunner (runner.rs)                 │
//! │    ├── Suite { name, scenarios: [Scenario] }                │
//! │    ├── RunContext { results, metrics }                      │
//! │    └── report::write_artifacts() -> run-report.json, ...    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  commands          login, fast_login, logout (state machine)│
//! │                    add_multiple_items, retry_on_environment │
//! ├─────────────────────────────────────────────────────────────┤
//! │  pages             LoginPage, RegisterPage, DashboardPage   │
//! │                    actions return &mut Self for chaining    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  primitives        Session: wait_for_visible, click, fill,  │
//! │                    select_option, should_be_at_path, ...    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  driver            BrowserDriver                            │
//! │                      ├── WebDriverSession (W3C, reqwest)    │
//! │                      └── DemoApp (in-process simulation)    │
//! └─────────────────────────────────────────────────────────────┘
//!   environment: EnvironmentProfile feeds every layer's timeouts
//! ```

pub mod commands;
pub mod config;
pub mod data;
pub mod driver;
pub mod environment;
pub mod error;
pub mod fixtures;
pub mod locator;
pub mod pages;
pub mod primitives;
pub mod report;
pub mod runner;
pub mod scenarios;
pub mod server;
pub mod telemetry;
pub mod visual;

pub use config::HarnessConfig;
pub use driver::{BrowserDriver, DemoApp, DemoOptions, WebDriverSession};
pub use environment::{Environment, EnvironmentProfile, RunMode};
pub use error::{E2eError, E2eResult};
pub use primitives::Session;
pub use report::RunReport;
pub use runner::{RunContext, RunnerConfig, Scenario, ScenarioResult, ScenarioRunner, ScenarioStatus, Suite};
pub use server::{AppServer, AppServerConfig};
