//! Login page

use tracing::info;

use super::{wait_for_all, DashboardElement, RegisterPage};
use crate::error::E2eResult;
use crate::locator::Locator;
use crate::primitives::{FillOptions, Session};

pub const DEFAULT_EMAIL: &str = "teste@email.com";
pub const DEFAULT_PASSWORD: &str = "123456";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginElement {
    Title,
    EmailInput,
    PasswordInput,
    TogglePassword,
    LoginButton,
    RegisterLink,
    ForgotPasswordLink,
    EmailError,
    PasswordError,
}

impl LoginElement {
    /// Elements whose presence means the page is rendered.
    pub const IDENTIFYING: [LoginElement; 4] = [
        LoginElement::Title,
        LoginElement::EmailInput,
        LoginElement::PasswordInput,
        LoginElement::LoginButton,
    ];

    /// Elements always rendered, regardless of form state.
    pub const STRUCTURAL: [LoginElement; 6] = [
        LoginElement::EmailInput,
        LoginElement::PasswordInput,
        LoginElement::TogglePassword,
        LoginElement::LoginButton,
        LoginElement::RegisterLink,
        LoginElement::ForgotPasswordLink,
    ];

    pub fn locator(self) -> Locator {
        match self {
            LoginElement::Title => Locator::text_in("h3", "Entrar"),
            LoginElement::EmailInput => Locator::test_id("email-input"),
            LoginElement::PasswordInput => Locator::test_id("password-input"),
            LoginElement::TogglePassword => Locator::test_id("toggle-password"),
            LoginElement::LoginButton => Locator::test_id("login-button"),
            LoginElement::RegisterLink => Locator::test_id("register-link"),
            LoginElement::ForgotPasswordLink => Locator::test_id("forgot-password-link"),
            LoginElement::EmailError => Locator::test_id("email-error"),
            LoginElement::PasswordError => Locator::test_id("password-error"),
        }
    }
}

pub struct LoginPage<'s> {
    session: &'s mut Session,
}

impl<'s> LoginPage<'s> {
    pub const PATH: &'static str = "/#/login";

    pub fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    pub fn session(&mut self) -> &mut Session {
        &mut *self.session
    }

    /// Wait for the page's identifying elements on `session`.
    pub async fn wait_until_loaded(session: &mut Session) -> E2eResult<()> {
        let timeout = session.timeouts().medium;
        wait_for_all(
            session,
            &LoginElement::IDENTIFYING.iter().map(|e| e.locator()).collect::<Vec<_>>(),
            timeout,
        )
        .await
    }

    pub async fn goto(&mut self) -> E2eResult<&mut Self> {
        self.session.visit(Self::PATH).await?;
        self.wait_for_page_load().await
    }

    pub async fn wait_for_page_load(&mut self) -> E2eResult<&mut Self> {
        Self::wait_until_loaded(self.session).await?;
        Ok(self)
    }

    pub async fn fill_email(&mut self, email: &str) -> E2eResult<&mut Self> {
        self.session
            .fill(&LoginElement::EmailInput.locator(), email, FillOptions::default())
            .await?;
        Ok(self)
    }

    pub async fn fill_password(&mut self, password: &str) -> E2eResult<&mut Self> {
        self.session
            .fill(&LoginElement::PasswordInput.locator(), password, FillOptions::default())
            .await?;
        Ok(self)
    }

    pub async fn click_login(&mut self) -> E2eResult<&mut Self> {
        self.session.click(&LoginElement::LoginButton.locator()).await?;
        Ok(self)
    }

    /// Fill the form, submit, and wait for the dashboard.
    pub async fn login(&mut self, email: &str, password: &str) -> E2eResult<&mut Self> {
        info!(email, "Logging in");
        self.fill_email(email)
            .await?
            .fill_password(password)
            .await?
            .click_login()
            .await?
            .wait_for_login_success()
            .await
    }

    pub async fn login_with_defaults(&mut self) -> E2eResult<&mut Self> {
        self.login(DEFAULT_EMAIL, DEFAULT_PASSWORD).await
    }

    pub async fn wait_for_login_success(&mut self) -> E2eResult<&mut Self> {
        let timeout = self.session.timeouts().long;
        self.session.should_be_at_path("/dashboard", timeout).await?;
        self.session
            .wait_for_visible(&DashboardElement::Title.locator(), timeout)
            .await?;
        Ok(self)
    }

    pub async fn toggle_password_visibility(&mut self) -> E2eResult<&mut Self> {
        self.session.click(&LoginElement::TogglePassword.locator()).await?;
        Ok(self)
    }

    pub async fn password_should_be_hidden(&mut self) -> E2eResult<&mut Self> {
        self.password_type_should_be("password").await
    }

    pub async fn password_should_be_visible(&mut self) -> E2eResult<&mut Self> {
        self.password_type_should_be("text").await
    }

    async fn password_type_should_be(&mut self, kind: &str) -> E2eResult<&mut Self> {
        let timeout = self.session.timeouts().short;
        self.session
            .should_have_attribute(&LoginElement::PasswordInput.locator(), "type", kind, timeout)
            .await?;
        Ok(self)
    }

    pub async fn go_to_register(&mut self) -> E2eResult<&mut Self> {
        self.session.click(&LoginElement::RegisterLink.locator()).await?;
        let timeout = self.session.timeouts().medium;
        self.session.should_be_at_path("/register", timeout).await?;
        RegisterPage::wait_until_loaded(self.session).await?;
        Ok(self)
    }

    pub async fn should_have_email_error(&mut self) -> E2eResult<&mut Self> {
        self.wait_for(LoginElement::EmailError).await
    }

    pub async fn should_have_password_error(&mut self) -> E2eResult<&mut Self> {
        self.wait_for(LoginElement::PasswordError).await
    }

    async fn wait_for(&mut self, element: LoginElement) -> E2eResult<&mut Self> {
        let timeout = self.session.timeouts().medium;
        self.session.wait_for_visible(&element.locator(), timeout).await?;
        Ok(self)
    }

    /// Submit credentials the form must reject, without waiting for success.
    pub async fn login_with_invalid_data(
        &mut self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> E2eResult<&mut Self> {
        self.fill_email(email.unwrap_or("invalid@email"))
            .await?
            .fill_password(password.unwrap_or("123"))
            .await?
            .click_login()
            .await
    }

    /// The route must still be `#/login` after the short timeout.
    pub async fn should_remain_on_login(&mut self) -> E2eResult<&mut Self> {
        let duration = self.session.timeouts().short;
        self.session.should_stay_at_path("/login", duration).await?;
        Ok(self)
    }

    pub async fn should_have_all_elements(&mut self) -> E2eResult<&mut Self> {
        let timeout = self.session.timeouts().medium;
        wait_for_all(
            self.session,
            &LoginElement::STRUCTURAL.iter().map(|e| e.locator()).collect::<Vec<_>>(),
            timeout,
        )
        .await?;
        Ok(self)
    }

    pub async fn clear_all_fields(&mut self) -> E2eResult<&mut Self> {
        self.fill_email("").await?.fill_password("").await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::driver::DemoApp;
    use crate::environment::{Environment, EnvironmentProfile};
    use crate::error::E2eError;

    fn session() -> Session {
        let profile = EnvironmentProfile::for_environment(Environment::Dev).with_timeout_ms(300);
        Session::new(Box::new(DemoApp::default()), profile).with_poll_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn valid_login_lands_on_dashboard() {
        let mut s = session();
        LoginPage::new(&mut s).goto().await.unwrap().login_with_defaults().await.unwrap();
        s.should_be_at_path("/dashboard", Duration::ZERO).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_login_shows_both_errors() {
        let mut s = session();
        let mut page = LoginPage::new(&mut s);
        page.goto()
            .await
            .unwrap()
            .login_with_invalid_data(None, None)
            .await
            .unwrap()
            .should_have_email_error()
            .await
            .unwrap()
            .should_have_password_error()
            .await
            .unwrap()
            .should_remain_on_login()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn password_toggle_flips_input_type() {
        let mut s = session();
        let mut page = LoginPage::new(&mut s);
        page.goto().await.unwrap();
        page.password_should_be_hidden().await.unwrap();
        page.toggle_password_visibility().await.unwrap();
        page.password_should_be_visible().await.unwrap();
        let err = page.password_should_be_hidden().await.err().unwrap();
        assert!(matches!(err, E2eError::ValidationAssertion(_)));
    }

    #[tokio::test]
    async fn goto_twice_is_harmless() {
        let mut s = session();
        let mut page = LoginPage::new(&mut s);
        page.goto().await.unwrap().goto().await.unwrap();
        page.should_have_all_elements().await.unwrap();
    }

    #[tokio::test]
    async fn register_link_waits_for_register_page() {
        let mut s = session();
        LoginPage::new(&mut s).goto().await.unwrap().go_to_register().await.unwrap();
        assert_eq!(s.location_hash().await.unwrap(), "#/register");
    }
}
