//! Registration page

use tracing::info;

use super::{wait_for_all, LoginPage};
use crate::data;
use crate::error::E2eResult;
use crate::locator::Locator;
use crate::primitives::{FillOptions, Session};

/// Departments the form offers, in display order.
pub const DEPARTMENTS: [&str; 6] = [
    "Tecnologia da Informação",
    "Recursos Humanos",
    "Financeiro",
    "Marketing",
    "Vendas",
    "Operações",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterElement {
    Title,
    NameInput,
    EmailInput,
    PhoneInput,
    DepartmentSelect,
    PasswordInput,
    ConfirmPasswordInput,
    TogglePassword,
    ToggleConfirmPassword,
    AcceptTermsCheckbox,
    NewsletterCheckbox,
    TermsLink,
    PrivacyLink,
    RegisterButton,
    LoginLink,
    NameError,
    EmailError,
    PhoneError,
    DepartmentError,
    PasswordError,
    ConfirmPasswordError,
    AcceptTermsError,
}

impl RegisterElement {
    pub const IDENTIFYING: [RegisterElement; 3] = [
        RegisterElement::Title,
        RegisterElement::NameInput,
        RegisterElement::RegisterButton,
    ];

    pub const STRUCTURAL: [RegisterElement; 10] = [
        RegisterElement::NameInput,
        RegisterElement::EmailInput,
        RegisterElement::PhoneInput,
        RegisterElement::DepartmentSelect,
        RegisterElement::PasswordInput,
        RegisterElement::ConfirmPasswordInput,
        RegisterElement::AcceptTermsCheckbox,
        RegisterElement::NewsletterCheckbox,
        RegisterElement::RegisterButton,
        RegisterElement::LoginLink,
    ];

    pub fn locator(self) -> Locator {
        let id = match self {
            RegisterElement::Title => return Locator::text_in("h3", "Criar Conta"),
            RegisterElement::NameInput => "name-input",
            RegisterElement::EmailInput => "email-input",
            RegisterElement::PhoneInput => "phone-input",
            RegisterElement::DepartmentSelect => "department-select",
            RegisterElement::PasswordInput => "password-input",
            RegisterElement::ConfirmPasswordInput => "confirm-password-input",
            RegisterElement::TogglePassword => "toggle-password",
            RegisterElement::ToggleConfirmPassword => "toggle-confirm-password",
            RegisterElement::AcceptTermsCheckbox => "accept-terms-checkbox",
            RegisterElement::NewsletterCheckbox => "newsletter-checkbox",
            RegisterElement::TermsLink => "terms-link",
            RegisterElement::PrivacyLink => "privacy-link",
            RegisterElement::RegisterButton => "register-button",
            RegisterElement::LoginLink => "login-link",
            RegisterElement::NameError => "name-error",
            RegisterElement::EmailError => "email-error",
            RegisterElement::PhoneError => "phone-error",
            RegisterElement::DepartmentError => "department-error",
            RegisterElement::PasswordError => "password-error",
            RegisterElement::ConfirmPasswordError => "confirm-password-error",
            RegisterElement::AcceptTermsError => "accept-terms-error",
        };
        Locator::test_id(id)
    }
}

/// Form values for a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterData {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub department: String,
    pub password: String,
    pub confirm_password: String,
    pub newsletter: bool,
}

impl Default for RegisterData {
    /// A valid registration with a unique email.
    fn default() -> Self {
        Self {
            name: "João Silva".to_string(),
            email: data::unique_email("joao"),
            phone: "11999999999".to_string(),
            department: DEPARTMENTS[0].to_string(),
            password: "123456".to_string(),
            confirm_password: "123456".to_string(),
            newsletter: false,
        }
    }
}

pub struct RegisterPage<'s> {
    session: &'s mut Session,
}

impl<'s> RegisterPage<'s> {
    pub const PATH: &'static str = "/#/register";

    pub fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    pub fn session(&mut self) -> &mut Session {
        &mut *self.session
    }

    pub async fn wait_until_loaded(session: &mut Session) -> E2eResult<()> {
        let timeout = session.timeouts().medium;
        wait_for_all(
            session,
            &RegisterElement::IDENTIFYING.iter().map(|e| e.locator()).collect::<Vec<_>>(),
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

    async fn fill(&mut self, element: RegisterElement, value: &str) -> E2eResult<&mut Self> {
        self.session
            .fill(&element.locator(), value, FillOptions::default())
            .await?;
        Ok(self)
    }

    async fn click(&mut self, element: RegisterElement) -> E2eResult<&mut Self> {
        self.session.click(&element.locator()).await?;
        Ok(self)
    }

    async fn wait_for(&mut self, element: RegisterElement) -> E2eResult<&mut Self> {
        let timeout = self.session.timeouts().medium;
        self.session.wait_for_visible(&element.locator(), timeout).await?;
        Ok(self)
    }

    pub async fn fill_name(&mut self, name: &str) -> E2eResult<&mut Self> {
        self.fill(RegisterElement::NameInput, name).await
    }

    pub async fn fill_email(&mut self, email: &str) -> E2eResult<&mut Self> {
        self.fill(RegisterElement::EmailInput, email).await
    }

    pub async fn fill_phone(&mut self, phone: &str) -> E2eResult<&mut Self> {
        self.fill(RegisterElement::PhoneInput, phone).await
    }

    pub async fn select_department(&mut self, department: &str) -> E2eResult<&mut Self> {
        self.session
            .select_option(&RegisterElement::DepartmentSelect.locator(), department)
            .await?;
        Ok(self)
    }

    pub async fn fill_password(&mut self, password: &str) -> E2eResult<&mut Self> {
        self.fill(RegisterElement::PasswordInput, password).await
    }

    pub async fn fill_confirm_password(&mut self, password: &str) -> E2eResult<&mut Self> {
        self.fill(RegisterElement::ConfirmPasswordInput, password).await
    }

    pub async fn accept_terms(&mut self) -> E2eResult<&mut Self> {
        self.click(RegisterElement::AcceptTermsCheckbox).await
    }

    pub async fn accept_newsletter(&mut self) -> E2eResult<&mut Self> {
        self.click(RegisterElement::NewsletterCheckbox).await
    }

    pub async fn click_register(&mut self) -> E2eResult<&mut Self> {
        self.click(RegisterElement::RegisterButton).await
    }

    /// Fill every field, accept the terms, submit, and wait for the dashboard.
    pub async fn register(&mut self, data: &RegisterData) -> E2eResult<&mut Self> {
        info!(email = %data.email, "Registering user");
        self.fill_name(&data.name)
            .await?
            .fill_email(&data.email)
            .await?
            .fill_phone(&data.phone)
            .await?
            .select_department(&data.department)
            .await?
            .fill_password(&data.password)
            .await?
            .fill_confirm_password(&data.confirm_password)
            .await?
            .accept_terms()
            .await?;
        if data.newsletter {
            self.accept_newsletter().await?;
        }
        self.click_register().await?.wait_for_register_success().await
    }

    pub async fn wait_for_register_success(&mut self) -> E2eResult<&mut Self> {
        let timeout = self.session.timeouts().long;
        self.session.should_be_at_path("/dashboard", timeout).await?;
        self.session
            .wait_for_visible(&Locator::text_in("h1", "Dashboard"), timeout)
            .await?;
        Ok(self)
    }

    pub async fn toggle_password_visibility(&mut self) -> E2eResult<&mut Self> {
        self.click(RegisterElement::TogglePassword).await
    }

    pub async fn toggle_confirm_password_visibility(&mut self) -> E2eResult<&mut Self> {
        self.click(RegisterElement::ToggleConfirmPassword).await
    }

    pub async fn passwords_should_be_hidden(&mut self) -> E2eResult<&mut Self> {
        self.password_types_should_be("password").await
    }

    pub async fn passwords_should_be_visible(&mut self) -> E2eResult<&mut Self> {
        self.password_types_should_be("text").await
    }

    async fn password_types_should_be(&mut self, kind: &str) -> E2eResult<&mut Self> {
        let timeout = self.session.timeouts().short;
        for element in [
            RegisterElement::PasswordInput,
            RegisterElement::ConfirmPasswordInput,
        ] {
            self.session
                .should_have_attribute(&element.locator(), "type", kind, timeout)
                .await?;
        }
        Ok(self)
    }

    pub async fn go_to_login(&mut self) -> E2eResult<&mut Self> {
        self.click(RegisterElement::LoginLink).await?;
        let timeout = self.session.timeouts().medium;
        self.session.should_be_at_path("/login", timeout).await?;
        LoginPage::wait_until_loaded(self.session).await?;
        Ok(self)
    }

    pub async fn should_have_name_error(&mut self) -> E2eResult<&mut Self> {
        self.wait_for(RegisterElement::NameError).await
    }

    pub async fn should_have_email_error(&mut self) -> E2eResult<&mut Self> {
        self.wait_for(RegisterElement::EmailError).await
    }

    pub async fn should_have_phone_error(&mut self) -> E2eResult<&mut Self> {
        self.wait_for(RegisterElement::PhoneError).await
    }

    pub async fn should_have_department_error(&mut self) -> E2eResult<&mut Self> {
        self.wait_for(RegisterElement::DepartmentError).await
    }

    pub async fn should_have_password_error(&mut self) -> E2eResult<&mut Self> {
        self.wait_for(RegisterElement::PasswordError).await
    }

    pub async fn should_have_confirm_password_error(&mut self) -> E2eResult<&mut Self> {
        self.wait_for(RegisterElement::ConfirmPasswordError).await
    }

    pub async fn should_have_terms_error(&mut self) -> E2eResult<&mut Self> {
        self.wait_for(RegisterElement::AcceptTermsError).await
    }

    pub async fn should_have_password_mismatch_error(&mut self) -> E2eResult<&mut Self> {
        let timeout = self.session.timeouts().medium;
        self.session
            .should_contain_within(
                &RegisterElement::ConfirmPasswordError.locator(),
                "Senhas não coincidem",
                timeout,
            )
            .await?;
        Ok(self)
    }

    /// Submit the form as it stands, without waiting for success.
    pub async fn register_with_invalid_data(&mut self) -> E2eResult<&mut Self> {
        self.click_register().await
    }

    pub async fn fill_mismatched_passwords(&mut self) -> E2eResult<&mut Self> {
        self.fill_password("123456")
            .await?
            .fill_confirm_password("654321")
            .await
    }

    pub async fn should_have_all_elements(&mut self) -> E2eResult<&mut Self> {
        let timeout = self.session.timeouts().medium;
        wait_for_all(
            self.session,
            &RegisterElement::STRUCTURAL.iter().map(|e| e.locator()).collect::<Vec<_>>(),
            timeout,
        )
        .await?;
        Ok(self)
    }

    pub async fn should_have_terms_and_privacy_links(&mut self) -> E2eResult<&mut Self> {
        self.wait_for(RegisterElement::TermsLink)
            .await?
            .wait_for(RegisterElement::PrivacyLink)
            .await
    }

    pub async fn clear_all_fields(&mut self) -> E2eResult<&mut Self> {
        for element in [
            RegisterElement::NameInput,
            RegisterElement::EmailInput,
            RegisterElement::PhoneInput,
            RegisterElement::PasswordInput,
            RegisterElement::ConfirmPasswordInput,
        ] {
            self.fill(element, "").await?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::driver::DemoApp;
    use crate::environment::{Environment, EnvironmentProfile};

    fn session() -> Session {
        let profile = EnvironmentProfile::for_environment(Environment::Dev).with_timeout_ms(300);
        Session::new(Box::new(DemoApp::default()), profile).with_poll_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn complete_registration_signs_in() {
        let mut s = session();
        let data = RegisterData {
            newsletter: true,
            ..Default::default()
        };
        RegisterPage::new(&mut s).goto().await.unwrap().register(&data).await.unwrap();
        assert_eq!(s.location_hash().await.unwrap(), "#/dashboard");
    }

    #[tokio::test]
    async fn empty_submit_flags_every_field() {
        let mut s = session();
        let mut page = RegisterPage::new(&mut s);
        page.goto().await.unwrap().register_with_invalid_data().await.unwrap();
        page.should_have_name_error()
            .await
            .unwrap()
            .should_have_email_error()
            .await
            .unwrap()
            .should_have_phone_error()
            .await
            .unwrap()
            .should_have_department_error()
            .await
            .unwrap()
            .should_have_password_error()
            .await
            .unwrap()
            .should_have_confirm_password_error()
            .await
            .unwrap()
            .should_have_terms_error()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn mismatched_passwords_are_reported() {
        let mut s = session();
        let mut page = RegisterPage::new(&mut s);
        page.goto()
            .await
            .unwrap()
            .fill_mismatched_passwords()
            .await
            .unwrap()
            .click_register()
            .await
            .unwrap()
            .should_have_password_mismatch_error()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn both_password_fields_toggle() {
        let mut s = session();
        let mut page = RegisterPage::new(&mut s);
        page.goto().await.unwrap().passwords_should_be_hidden().await.unwrap();
        page.toggle_password_visibility()
            .await
            .unwrap()
            .toggle_confirm_password_visibility()
            .await
            .unwrap()
            .passwords_should_be_visible()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn page_lists_every_control() {
        let mut s = session();
        let mut page = RegisterPage::new(&mut s);
        page.goto()
            .await
            .unwrap()
            .should_have_all_elements()
            .await
            .unwrap()
            .should_have_terms_and_privacy_links()
            .await
            .unwrap()
            .go_to_login()
            .await
            .unwrap();
        assert_eq!(s.location_hash().await.unwrap(), "#/login");
    }
}
