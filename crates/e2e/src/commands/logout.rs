//! Logout with fallback selectors
//!
//! ```text
//! SearchingLogoutControl ──found──▶ Clicked ──▶ AwaitingRedirect ──▶ Confirmed
//!          │
//!          └──none──▶ Failed (tried candidates + visible buttons)
//! ```
//!
//! Candidates are probed in order, sharing the short timeout. The redirect
//! wait differs by run mode: interactive runs make one route assertion with
//! the medium timeout, CI runs poll the route every 500 ms up to the long
//! timeout.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::driver::ElementState;
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::pages::LoginElement;
use crate::primitives::Session;

/// Route poll interval in CI mode.
pub const CI_ROUTE_POLL: Duration = Duration::from_millis(500);

const LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LogoutState {
    SearchingLogoutControl,
    Clicked { via: String },
    AwaitingRedirect,
    Confirmed,
    Failed {
        tried: Vec<String>,
        visible_buttons: Vec<String>,
    },
}

impl LogoutState {
    fn name(&self) -> &'static str {
        match self {
            LogoutState::SearchingLogoutControl => "searching_logout_control",
            LogoutState::Clicked { .. } => "clicked",
            LogoutState::AwaitingRedirect => "awaiting_redirect",
            LogoutState::Confirmed => "confirmed",
            LogoutState::Failed { .. } => "failed",
        }
    }
}

/// A confirmed logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutOutcome {
    /// The candidate that was clicked.
    pub matched: Locator,
    /// Every state visited, starting with `SearchingLogoutControl`.
    pub transitions: Vec<LogoutState>,
}

/// Logout controls in probe order.
pub fn candidates() -> [Locator; 3] {
    [
        Locator::test_id("logout-button"),
        Locator::button("Logout"),
        Locator::button("Sair"),
    ]
}

/// Sign out from the dashboard and wait for the login page.
pub async fn logout(session: &mut Session) -> E2eResult<LogoutOutcome> {
    let mut state = LogoutState::SearchingLogoutControl;
    let mut transitions = vec![state.clone()];
    let mut matched = None;

    loop {
        let next = match &state {
            LogoutState::SearchingLogoutControl => match find_control(session).await? {
                Some((locator, element)) => {
                    session.click_element(&element, true).await?;
                    let via = locator.to_string();
                    matched = Some(locator);
                    LogoutState::Clicked { via }
                }
                None => LogoutState::Failed {
                    tried: candidates().iter().map(ToString::to_string).collect(),
                    visible_buttons: session.visible_texts(&Locator::css("button")).await?,
                },
            },
            LogoutState::Clicked { .. } => LogoutState::AwaitingRedirect,
            LogoutState::AwaitingRedirect => {
                await_redirect(session).await?;
                confirm(session).await?;
                LogoutState::Confirmed
            }
            LogoutState::Confirmed => {
                let matched = matched.ok_or_else(|| {
                    E2eError::Driver("logout confirmed without a clicked control".into())
                })?;
                info!(via = %matched, "Logout confirmed");
                return Ok(LogoutOutcome {
                    matched,
                    transitions,
                });
            }
            LogoutState::Failed {
                tried,
                visible_buttons,
            } => {
                warn!(?visible_buttons, "No logout control found");
                return Err(E2eError::ElementNotFound {
                    tried: tried.clone(),
                    visible_buttons: visible_buttons.clone(),
                });
            }
        };
        debug!(from = state.name(), to = next.name(), "Logout transition");
        transitions.push(next.clone());
        state = next;
    }
}

async fn find_control(session: &mut Session) -> E2eResult<Option<(Locator, ElementState)>> {
    let all = candidates();
    let slice = session.timeouts().short / all.len() as u32;
    for candidate in all {
        match session.wait_for_visible(&candidate, slice).await {
            Ok(element) => return Ok(Some((candidate, element))),
            Err(E2eError::Timeout { .. }) => debug!(candidate = %candidate, "Logout candidate absent"),
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

async fn await_redirect(session: &mut Session) -> E2eResult<()> {
    let timeouts = session.timeouts();
    if !session.profile().is_ci() {
        return session.should_be_at_path(LOGIN_ROUTE, timeouts.medium).await;
    }

    let started = Instant::now();
    loop {
        let hash = session.location_hash().await?;
        if hash.contains(LOGIN_ROUTE) {
            debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Redirect observed");
            return Ok(());
        }
        let elapsed = started.elapsed();
        if elapsed >= timeouts.long {
            return Err(E2eError::Timeout {
                target: format!("route {}", LOGIN_ROUTE),
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }
        sleep(CI_ROUTE_POLL.min(timeouts.long - elapsed)).await;
    }
}

/// Route is the login route and the login page has rendered.
async fn confirm(session: &mut Session) -> E2eResult<()> {
    let hash = session.location_hash().await?;
    if !hash.starts_with("#/login") {
        return Err(E2eError::ValidationAssertion(format!(
            "expected route #/login after logout, found {}",
            hash
        )));
    }
    let timeout = session.timeouts().medium;
    session
        .wait_for_visible(&LoginElement::Title.locator(), timeout)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_keep_probe_order() {
        let names: Vec<String> = candidates().iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec!["[data-testid=\"logout-button\"]", "button \"Logout\"", "button \"Sair\""]
        );
    }

    #[test]
    fn states_serialize_with_tag() {
        let json = serde_json::to_value(LogoutState::Clicked { via: "x".into() }).unwrap();
        assert_eq!(json["state"], "clicked");
        assert_eq!(json["via"], "x");
    }
}
