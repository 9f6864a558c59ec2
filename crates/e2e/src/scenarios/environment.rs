use tracing::info;

use crate::commands;
use crate::environment::CI_BASE_PATH;
use crate::error::{E2eError, E2eResult};
use crate::pages::{DashboardElement, DashboardPage, LoginPage, DEFAULT_EMAIL, DEFAULT_PASSWORD};
use crate::primitives::Session;
use crate::runner::{Scenario, Suite};

pub(super) fn suite() -> Suite {
    Suite::new("Environment")
        .scenario(Scenario::new("badge shows the environment before sign-in", |s| {
            Box::pin(badge_before_sign_in(s))
        }))
        .scenario(Scenario::new("environment persists after login", |s| {
            Box::pin(badge_after_login(s))
        }))
        .scenario(Scenario::new("primary actions use the environment theme", |s| {
            Box::pin(themed_actions(s))
        }))
        .scenario(Scenario::new("resolved profile is consistent", |s| {
            Box::pin(profile_is_consistent(s))
        }))
        .scenario(
            Scenario::new("pipeline serves under its base path", |s| {
                Box::pin(pipeline_base_path(s))
            })
            .only_in(&["ci"]),
        )
}

async fn badge_before_sign_in(session: &mut Session) -> E2eResult<()> {
    let environment = session.profile().environment;
    LoginPage::new(session).goto().await?;
    commands::check_environment(session, environment).await?;
    let timeout = session.timeouts().medium;
    session
        .should_contain_text(&format!("({})", environment.display_code()), timeout)
        .await
}

async fn badge_after_login(session: &mut Session) -> E2eResult<()> {
    let environment = session.profile().environment;
    commands::login(session, DEFAULT_EMAIL, DEFAULT_PASSWORD).await?;
    commands::check_environment(session, environment).await
}

async fn themed_actions(session: &mut Session) -> E2eResult<()> {
    commands::login(session, DEFAULT_EMAIL, DEFAULT_PASSWORD).await?;
    let mut dashboard = DashboardPage::new(session);
    dashboard.open_add_item_modal().await?;
    let timeout = dashboard.session().timeouts().medium;
    dashboard
        .session()
        .wait_for_visible(&DashboardElement::AddSubmitButton.locator(), timeout)
        .await?;
    dashboard.close_add_item_modal().await?;
    Ok(())
}

async fn profile_is_consistent(session: &mut Session) -> E2eResult<()> {
    let profile = session.profile().clone();
    profile.log_info();
    if profile.timeout_ms == 0 || profile.retry_budget == 0 {
        return Err(E2eError::ValidationAssertion(format!(
            "profile {} has timeout {} ms and retry budget {}",
            profile.code, profile.timeout_ms, profile.retry_budget
        )));
    }
    if profile.is_ci() != (profile.base_path == CI_BASE_PATH) {
        return Err(E2eError::ValidationAssertion(format!(
            "base path '{}' does not match run mode",
            profile.base_path
        )));
    }
    LoginPage::new(session).goto().await?;
    commands::check_environment(session, profile.environment).await
}

async fn pipeline_base_path(session: &mut Session) -> E2eResult<()> {
    LoginPage::new(session).goto().await?;
    let location = session.location().await?;
    info!(%location, "Pipeline location");
    if location.contains(CI_BASE_PATH) {
        Ok(())
    } else {
        Err(E2eError::ValidationAssertion(format!(
            "expected {} in {}",
            CI_BASE_PATH, location
        )))
    }
}
