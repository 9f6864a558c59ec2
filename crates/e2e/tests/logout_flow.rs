//! Logout state machine against the in-process app.
//!
//! Each test signs in through the login form, strips the dashboard down to a
//! single kind of logout control and checks which candidate the state machine
//! settles on.

use std::time::Duration;

use manus_e2e::commands::{self, LogoutState};
use manus_e2e::driver::LogoutControl;
use manus_e2e::locator::Locator;
use manus_e2e::pages::{DEFAULT_EMAIL, DEFAULT_PASSWORD};
use manus_e2e::{DemoApp, DemoOptions, E2eError, Environment, EnvironmentProfile, Session};

fn signed_out_session(control: LogoutControl, profile: EnvironmentProfile) -> Session {
    let app = DemoApp::new(DemoOptions {
        logout_control: control,
        ..Default::default()
    });
    Session::new(Box::new(app), profile).with_poll_interval(Duration::from_millis(5))
}

fn dev_profile() -> EnvironmentProfile {
    EnvironmentProfile::for_environment(Environment::Dev).with_timeout_ms(300)
}

async fn confirmed_via(control: LogoutControl, expected: Locator) {
    let mut session = signed_out_session(control, dev_profile());
    commands::login(&mut session, DEFAULT_EMAIL, DEFAULT_PASSWORD)
        .await
        .unwrap();

    let outcome = commands::logout(&mut session).await.unwrap();

    assert_eq!(outcome.matched, expected);
    assert_eq!(
        outcome.transitions,
        vec![
            LogoutState::SearchingLogoutControl,
            LogoutState::Clicked {
                via: expected.to_string()
            },
            LogoutState::AwaitingRedirect,
            LogoutState::Confirmed,
        ]
    );
    session
        .should_be_at_path("/login", Duration::ZERO)
        .await
        .unwrap();
}

/// The dedicated test id wins when it is present.
#[tokio::test]
async fn logout_via_primary_control() {
    confirmed_via(LogoutControl::Primary, Locator::test_id("logout-button")).await;
}

#[tokio::test]
async fn logout_via_logout_text_button() {
    confirmed_via(LogoutControl::TextLogout, Locator::button("Logout")).await;
}

/// A dashboard that only renders a plain "Sair" button still signs out.
#[tokio::test]
async fn logout_via_sair_text_button() {
    confirmed_via(LogoutControl::TextSair, Locator::button("Sair")).await;
}

/// In CI the redirect is polled on the location hash under the pipeline base path.
#[tokio::test]
async fn logout_confirms_in_pipeline_mode() {
    let profile = EnvironmentProfile::for_environment(Environment::Ci)
        .with_timeout_ms(300)
        .with_base_url("http://localhost:5173");
    assert!(profile.is_ci());
    let mut session = signed_out_session(LogoutControl::Primary, profile);
    commands::login(&mut session, DEFAULT_EMAIL, DEFAULT_PASSWORD)
        .await
        .unwrap();

    let outcome = commands::logout(&mut session).await.unwrap();

    assert_eq!(outcome.transitions.last(), Some(&LogoutState::Confirmed));
    assert!(session.location().await.unwrap().contains("/pipelineManus"));
}

/// Without any control the failure lists every candidate and the buttons on screen.
#[tokio::test]
async fn logout_without_control_reports_candidates() {
    let mut session = signed_out_session(LogoutControl::Missing, dev_profile());
    commands::login(&mut session, DEFAULT_EMAIL, DEFAULT_PASSWORD)
        .await
        .unwrap();

    let err = commands::logout(&mut session).await.unwrap_err();

    match err {
        E2eError::ElementNotFound {
            tried,
            visible_buttons,
        } => {
            assert_eq!(tried.len(), 3);
            assert_eq!(tried[0], Locator::test_id("logout-button").to_string());
            assert!(visible_buttons.iter().any(|b| b.contains("Adicionar Item")));
        }
        other => panic!("expected ElementNotFound, got {other:?}"),
    }
    session
        .should_be_at_path("/dashboard", Duration::ZERO)
        .await
        .unwrap();
}
