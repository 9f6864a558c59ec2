//! Reusable multi-step flows built on the page abstractions
//!
//! Each command owns its success criteria. Commands never swallow a failure;
//! only [`retry_on_environment`] re-runs an operation, and only on timeouts.

mod logout;

use std::path::Path;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use serde_json::json;
use tracing::{info, warn};

pub use logout::{candidates as logout_candidates, logout, LogoutOutcome, LogoutState, CI_ROUTE_POLL};

use crate::data;
use crate::driver::ElementState;
use crate::environment::Environment;
use crate::error::E2eResult;
use crate::fixtures::Fixtures;
use crate::locator::Locator;
use crate::pages::{DashboardPage, ItemData, LoginPage};
use crate::primitives::Session;
use crate::telemetry;
use crate::visual::{self, ScreenshotArtifact};

/// Token written by [`fast_login`].
pub const FAST_LOGIN_TOKEN: &str = "test-token";

/// Log in through the form and wait for the dashboard.
pub async fn login(session: &mut Session, email: &str, password: &str) -> E2eResult<()> {
    session.telemetry_mut().start_timer("login_operation");
    let submitted = submit_login(session, email, password).await;
    stop_timer(session, "login_operation", submitted.is_ok());
    submitted?;
    telemetry::measure_page_load(session, "dashboard").await
}

async fn submit_login(session: &mut Session, email: &str, password: &str) -> E2eResult<()> {
    LoginPage::new(session).goto().await?.login(email, password).await?;
    Ok(())
}

/// End a command's timer, recording it only when the command succeeded.
fn stop_timer(session: &mut Session, operation: &str, succeeded: bool) {
    let telemetry = session.telemetry_mut();
    if succeeded {
        telemetry.end_timer(operation);
    } else {
        telemetry.cancel_timer(operation);
    }
}

/// Sign in by seeding local storage, skipping the form, then open the
/// dashboard on a fresh document so the application reads the session.
pub async fn fast_login(session: &mut Session) -> E2eResult<()> {
    session.visit("/").await?;
    session
        .set_local_storage("authToken", FAST_LOGIN_TOKEN)
        .await?;
    let user = json!({ "id": 1, "name": "Usuário Teste", "email": "teste@email.com" });
    session.set_local_storage("user", &user.to_string()).await?;
    session.reset_page().await?;
    DashboardPage::new(session).goto().await?;
    info!("Fast login via local storage");
    Ok(())
}

/// Log in as a named fixture user, e.g. `validUser`.
pub async fn login_with_fixture(
    session: &mut Session,
    fixtures: &Fixtures,
    user_type: &str,
) -> E2eResult<()> {
    let user = fixtures.user(user_type)?;
    LoginPage::new(session)
        .goto()
        .await?
        .login(&user.email, &user.password)
        .await?;
    Ok(())
}

pub async fn add_item(session: &mut Session, item: &ItemData) -> E2eResult<()> {
    session.telemetry_mut().start_timer("add_item_operation");
    let added = DashboardPage::new(session).add_item(item).await.map(|_| ());
    stop_timer(session, "add_item_operation", added.is_ok());
    added
}

/// Add `count` generated items named `<base> 1..=count`.
pub async fn add_multiple_items(
    session: &mut Session,
    count: usize,
    base: &str,
) -> E2eResult<Vec<ItemData>> {
    let items = data::multiple_items(count, base);
    let mut page = DashboardPage::new(session);
    for (index, item) in items.iter().enumerate() {
        info!(current = index + 1, total = count, name = %item.name, "Bulk add");
        page.add_item(item).await?;
    }
    Ok(items)
}

pub async fn item_should_exist(session: &mut Session, name: &str) -> E2eResult<()> {
    DashboardPage::new(session).should_item_exist(name).await?;
    Ok(())
}

pub async fn item_should_not_exist(session: &mut Session, name: &str) -> E2eResult<()> {
    DashboardPage::new(session).should_item_not_exist(name).await?;
    Ok(())
}

pub async fn check_environment(session: &mut Session, expected: Environment) -> E2eResult<()> {
    DashboardPage::new(session)
        .should_show_environment(expected)
        .await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupOptions {
    /// Sign in with [`fast_login`] before the scenario body.
    pub require_auth: bool,
    /// Sample network timings and memory after setup.
    pub monitor_performance: bool,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            require_auth: true,
            monitor_performance: false,
        }
    }
}

/// Common scenario preamble: viewport, optional sign-in, optional sampling.
pub async fn setup_test(session: &mut Session, test_name: &str, options: SetupOptions) -> E2eResult<()> {
    info!(test = test_name, ?options, "Setting up scenario");
    let (width, height) = session.profile().viewport();
    session.set_viewport(width, height).await?;
    if options.require_auth {
        fast_login(session).await?;
    }
    if options.monitor_performance {
        telemetry::monitor_network(session).await?;
        telemetry::monitor_memory_usage(session, test_name).await?;
    }
    Ok(())
}

/// Run `operation` up to `max_attempts` times (the profile's retry budget by
/// default), waiting `1s * attempt` between tries. Only timeouts are retried.
pub async fn retry_on_environment<T, F>(
    session: &mut Session,
    max_attempts: Option<u32>,
    mut operation: F,
) -> E2eResult<T>
where
    F: FnMut(&mut Session) -> BoxFuture<'_, E2eResult<T>>,
{
    let attempts = max_attempts.unwrap_or(session.profile().retry_budget).max(1);
    let mut attempt = 1;
    loop {
        let result = operation(session).await;
        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!(attempt, attempts, error = %e, "Retrying");
                session
                    .smart_wait(Duration::from_millis(1000 * attempt as u64))
                    .await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Redacted viewport screenshot, timed.
pub async fn smart_screenshot(
    session: &mut Session,
    dir: &Path,
    name: &str,
) -> E2eResult<ScreenshotArtifact> {
    let started = Instant::now();
    let artifact = visual::capture_redacted(session, dir, name).await?;
    session
        .telemetry_mut()
        .record_duration(&format!("screenshot:{}", name), started.elapsed());
    Ok(artifact)
}

/// Wait for an element and time the wait. Waits slower than
/// [`telemetry::SLOW_ELEMENT_MS`] are flagged as slow elements.
pub async fn wait_for_element_smart(
    session: &mut Session,
    locator: &Locator,
    max_wait: Duration,
) -> E2eResult<ElementState> {
    let started = Instant::now();
    let element = session.wait_for_visible(locator, max_wait).await?;
    let elapsed = started.elapsed();
    let target = locator.to_string();
    let telemetry = session.telemetry_mut();
    telemetry.record_duration(&format!("element_wait:{}", target), elapsed);
    telemetry.record_element_wait(&target, elapsed);
    Ok(element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DemoApp;
    use crate::environment::EnvironmentProfile;
    use crate::error::E2eError;

    fn session() -> Session {
        let profile = EnvironmentProfile::for_environment(Environment::Dev).with_timeout_ms(300);
        Session::new(Box::new(DemoApp::default()), profile).with_poll_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn login_is_timed() {
        let mut s = session();
        login(&mut s, "teste@email.com", "123456").await.unwrap();
        let ops: Vec<&str> = s
            .telemetry()
            .durations()
            .iter()
            .map(|d| d.operation.as_str())
            .collect();
        assert_eq!(ops, vec!["login_operation"]);
    }

    #[tokio::test]
    async fn failed_login_leaves_no_timer_running() {
        let mut s = session();
        // Passwords under six characters keep the form on screen.
        assert!(login(&mut s, "teste@email.com", "12345").await.is_err());
        assert!(!s.telemetry().is_timing("login_operation"));
        assert!(s.telemetry().durations().is_empty());
    }

    #[tokio::test]
    async fn failed_add_item_leaves_no_timer_running() {
        let mut s = session();
        LoginPage::new(&mut s).goto().await.unwrap();
        assert!(add_item(&mut s, &ItemData::named("x")).await.is_err());
        assert!(!s.telemetry().is_timing("add_item_operation"));
        assert!(s.telemetry().durations().is_empty());
    }

    #[tokio::test]
    async fn smart_waits_are_timed_and_plain_waits_are_not() {
        let mut s = session();
        LoginPage::new(&mut s).goto().await.unwrap();
        let email = crate::pages::LoginElement::EmailInput.locator();
        s.wait_for_visible(&email, Duration::from_millis(100)).await.unwrap();
        assert!(s.telemetry().durations().is_empty());

        wait_for_element_smart(&mut s, &email, Duration::from_millis(100))
            .await
            .unwrap();
        let ops: Vec<&str> = s
            .telemetry()
            .durations()
            .iter()
            .map(|d| d.operation.as_str())
            .collect();
        assert_eq!(ops, vec![format!("element_wait:{}", email).as_str()]);

        let missing = Locator::test_id("nope");
        assert!(wait_for_element_smart(&mut s, &missing, Duration::from_millis(20))
            .await
            .is_err());
        assert_eq!(s.telemetry().durations().len(), 1);
    }

    #[tokio::test]
    async fn fast_login_skips_the_form() {
        let mut s = session();
        fast_login(&mut s).await.unwrap();
        assert_eq!(s.location_hash().await.unwrap(), "#/dashboard");
        assert!(s.actions().iter().all(|a| a.target != "[data-testid=\"login-button\"]"));
        DashboardPage::new(&mut s)
            .should_show_user_info("Usuário Teste")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_fixture_user_is_a_fixture_error() {
        let mut s = session();
        let err = login_with_fixture(&mut s, &Fixtures::builtin().unwrap(), "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::Fixture(_)));
    }

    #[tokio::test]
    async fn bulk_add_grows_the_list() {
        let mut s = session();
        setup_test(&mut s, "bulk", SetupOptions { require_auth: true, monitor_performance: true })
            .await
            .unwrap();
        let items = add_multiple_items(&mut s, 2, "Lote").await.unwrap();
        assert_eq!(items.len(), 2);
        item_should_exist(&mut s, "Lote 2").await.unwrap();
        DashboardPage::new(&mut s).should_have_items_count(5).await.unwrap();
        assert_eq!(s.telemetry().memory().len(), 1);
    }

    #[tokio::test]
    async fn retries_only_timeouts() {
        let mut s = session();
        let mut calls = 0;
        let value = retry_on_environment(&mut s, Some(2), |_| {
            calls += 1;
            let n = calls;
            Box::pin(async move {
                if n == 1 {
                    Err(E2eError::Timeout { target: "x".into(), elapsed_ms: 1 })
                } else {
                    Ok(n)
                }
            })
        })
        .await
        .unwrap();
        assert_eq!(value, 2);

        let mut calls = 0;
        let err = retry_on_environment(&mut s, Some(3), |_| {
            calls += 1;
            Box::pin(async { Err::<(), _>(E2eError::ValidationAssertion("no".into())) })
        })
        .await
        .unwrap_err();
        assert!(matches!(err, E2eError::ValidationAssertion(_)));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn screenshots_redact_password_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session();
        LoginPage::new(&mut s).goto().await.unwrap();
        let shot = smart_screenshot(&mut s, dir.path(), "login page").await.unwrap();
        assert_eq!(shot.redacted_regions, 1);
        assert!(shot.path.ends_with("login_page.png"));
        assert!(s.telemetry().durations().iter().any(|d| d.operation == "screenshot:login page"));
    }
}
