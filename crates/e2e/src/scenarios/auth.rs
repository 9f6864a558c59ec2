use std::sync::Arc;
use std::time::Duration;

use crate::commands;
use crate::error::{E2eError, E2eResult};
use crate::fixtures::Fixtures;
use crate::pages::{DashboardPage, LoginElement, LoginPage};
use crate::primitives::Session;
use crate::runner::{Scenario, Suite};

/// Form login must finish within this budget.
const LOGIN_BUDGET: Duration = Duration::from_secs(5);

pub(super) fn suite(fixtures: Arc<Fixtures>) -> Suite {
    Suite::new("Authentication")
        .scenario(Scenario::new("redirects anonymous visitors to login", |s| {
            Box::pin(redirects_to_login(s))
        }))
        .scenario(Scenario::new("login page shows every element", |s| {
            Box::pin(login_page_elements(s))
        }))
        .scenario(Scenario::new("login with valid credentials", |s| {
            Box::pin(valid_login(s))
        }))
        .scenario(Scenario::new("login with invalid credentials stays on login", |s| {
            Box::pin(invalid_login(s))
        }))
        .scenario(Scenario::new("login page links to registration", |s| {
            Box::pin(go_to_register(s))
        }))
        .scenario(Scenario::new("login toggles password visibility", |s| {
            Box::pin(toggle_password(s))
        }))
        .scenario(Scenario::new("login with the validUser fixture", move |s| {
            Box::pin(fixture_login(s, Arc::clone(&fixtures)))
        }))
        .scenario(Scenario::new("logout returns to the login page", |s| {
            Box::pin(logout(s))
        }))
        .scenario(Scenario::new("login completes within the time budget", |s| {
            Box::pin(login_within_budget(s))
        }))
        .scenario(
            Scenario::new("dashboard opens with a seeded session", |s| {
                Box::pin(seeded_session(s))
            })
            .with_fast_login(),
        )
}

async fn redirects_to_login(session: &mut Session) -> E2eResult<()> {
    session.visit("/").await?;
    let timeout = session.timeouts().medium;
    session.should_be_at_path("/login", timeout).await?;
    session
        .wait_for_visible(&LoginElement::Title.locator(), timeout)
        .await?;
    Ok(())
}

async fn login_page_elements(session: &mut Session) -> E2eResult<()> {
    LoginPage::new(session).goto().await?.should_have_all_elements().await?;
    Ok(())
}

async fn valid_login(session: &mut Session) -> E2eResult<()> {
    LoginPage::new(session).goto().await?.login_with_defaults().await?;
    DashboardPage::new(session).should_show_user_info("teste").await?;
    Ok(())
}

async fn invalid_login(session: &mut Session) -> E2eResult<()> {
    LoginPage::new(session)
        .goto()
        .await?
        .login_with_invalid_data(Some("email-invalido"), Some("123"))
        .await?
        .should_remain_on_login()
        .await?;
    Ok(())
}

async fn go_to_register(session: &mut Session) -> E2eResult<()> {
    LoginPage::new(session).goto().await?.go_to_register().await?;
    Ok(())
}

async fn toggle_password(session: &mut Session) -> E2eResult<()> {
    LoginPage::new(session)
        .goto()
        .await?
        .password_should_be_hidden()
        .await?
        .toggle_password_visibility()
        .await?
        .password_should_be_visible()
        .await?
        .toggle_password_visibility()
        .await?
        .password_should_be_hidden()
        .await?;
    Ok(())
}

async fn fixture_login(session: &mut Session, fixtures: Arc<Fixtures>) -> E2eResult<()> {
    commands::login_with_fixture(session, &fixtures, "validUser").await
}

async fn logout(session: &mut Session) -> E2eResult<()> {
    LoginPage::new(session).goto().await?.login_with_defaults().await?;
    commands::logout(session).await?;
    Ok(())
}

async fn login_within_budget(session: &mut Session) -> E2eResult<()> {
    commands::login(session, "teste@email.com", "123456").await?;
    match session
        .telemetry_mut()
        .check_threshold("login_operation", LOGIN_BUDGET)
    {
        Some(false) => Err(E2eError::ValidationAssertion(format!(
            "login took longer than {} ms",
            LOGIN_BUDGET.as_millis()
        ))),
        _ => Ok(()),
    }
}

async fn seeded_session(session: &mut Session) -> E2eResult<()> {
    commands::fast_login(session).await?;
    DashboardPage::new(session)
        .should_show_user_info("Usuário Teste")
        .await?;
    Ok(())
}
