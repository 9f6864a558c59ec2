use crate::data;
use crate::error::E2eResult;
use crate::pages::RegisterPage;
use crate::primitives::Session;
use crate::runner::{Scenario, Suite};

pub(super) fn suite() -> Suite {
    Suite::new("Registration")
        .scenario(Scenario::new("registration form shows every field", |s| {
            Box::pin(form_elements(s))
        }))
        .scenario(Scenario::new("registers a generated user", |s| {
            Box::pin(register_generated_user(s))
        }))
        .scenario(Scenario::new("empty submit flags required fields", |s| {
            Box::pin(required_fields(s))
        }))
        .scenario(Scenario::new("rejects mismatched password confirmation", |s| {
            Box::pin(password_mismatch(s))
        }))
        .scenario(Scenario::new("registration links back to login", |s| {
            Box::pin(back_to_login(s))
        }))
        .scenario(Scenario::new("toggles both password fields", |s| {
            Box::pin(toggle_passwords(s))
        }))
        .scenario(Scenario::new("shows terms and privacy links", |s| {
            Box::pin(terms_links(s))
        }))
}

async fn form_elements(session: &mut Session) -> E2eResult<()> {
    RegisterPage::new(session).goto().await?.should_have_all_elements().await?;
    Ok(())
}

async fn register_generated_user(session: &mut Session) -> E2eResult<()> {
    let user = data::user_data();
    RegisterPage::new(session).goto().await?.register(&user).await?;
    Ok(())
}

async fn required_fields(session: &mut Session) -> E2eResult<()> {
    RegisterPage::new(session)
        .goto()
        .await?
        .register_with_invalid_data()
        .await?
        .should_have_name_error()
        .await?
        .should_have_email_error()
        .await?
        .should_have_phone_error()
        .await?
        .should_have_department_error()
        .await?
        .should_have_password_error()
        .await?
        .should_have_terms_error()
        .await?;
    Ok(())
}

async fn password_mismatch(session: &mut Session) -> E2eResult<()> {
    RegisterPage::new(session)
        .goto()
        .await?
        .fill_mismatched_passwords()
        .await?
        .click_register()
        .await?
        .should_have_password_mismatch_error()
        .await?;
    Ok(())
}

async fn back_to_login(session: &mut Session) -> E2eResult<()> {
    RegisterPage::new(session).goto().await?.go_to_login().await?;
    Ok(())
}

async fn toggle_passwords(session: &mut Session) -> E2eResult<()> {
    RegisterPage::new(session)
        .goto()
        .await?
        .passwords_should_be_hidden()
        .await?
        .toggle_password_visibility()
        .await?
        .toggle_confirm_password_visibility()
        .await?
        .passwords_should_be_visible()
        .await?;
    Ok(())
}

async fn terms_links(session: &mut Session) -> E2eResult<()> {
    RegisterPage::new(session)
        .goto()
        .await?
        .should_have_terms_and_privacy_links()
        .await?;
    Ok(())
}
