//! Page abstractions
//!
//! A page wraps `&mut Session` and nothing else. Each page names its elements
//! in one enum whose `locator()` is the single place selectors live; actions
//! return `&mut Self` so calls chain with `?`.

mod dashboard;
mod login;
mod register;

use std::time::Duration;

pub use dashboard::{Category, DashboardElement, DashboardPage, ItemData, ItemUpdate, Priority};
pub use login::{LoginElement, LoginPage, DEFAULT_EMAIL, DEFAULT_PASSWORD};
pub use register::{RegisterData, RegisterElement, RegisterPage, DEPARTMENTS};

use crate::error::E2eResult;
use crate::locator::Locator;
use crate::primitives::Session;

/// Wait until every locator is visible, in order.
pub(crate) async fn wait_for_all(
    session: &mut Session,
    locators: &[Locator],
    timeout: Duration,
) -> E2eResult<()> {
    for locator in locators {
        session.wait_for_visible(locator, timeout).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DemoApp;
    use crate::environment::{Environment, EnvironmentProfile};

    fn assert_send<T: Send>(_: T) {}

    /// Scenario bodies are boxed as `Send` futures, so every page wait must be too.
    #[test]
    fn page_waits_are_send() {
        let profile = EnvironmentProfile::for_environment(Environment::Dev);
        let mut s = Session::new(Box::new(DemoApp::default()), profile);
        assert_send(LoginPage::wait_until_loaded(&mut s));
        assert_send(RegisterPage::wait_until_loaded(&mut s));
        assert_send(DashboardPage::wait_until_loaded(&mut s));
        assert_send(LoginPage::new(&mut s).should_have_all_elements());
        assert_send(wait_for_all(&mut s, &[LoginElement::Title.locator()], Duration::ZERO));
    }
}
