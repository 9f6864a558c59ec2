//! End-to-end user flows against the in-process app.
//!
//! These drive the page objects exactly as the scenario catalogue does and
//! assert on the resulting route and list state. A render lag is used where
//! the flow must survive the list or route updating a few polls late.

use std::time::Duration;

use manus_e2e::commands;
use manus_e2e::driver::LogoutControl;
use manus_e2e::pages::{DashboardPage, ItemData, LoginPage, RegisterPage};
use manus_e2e::{data, DemoApp, DemoOptions, Environment, EnvironmentProfile, Session};

fn session_with(options: DemoOptions) -> Session {
    let profile = EnvironmentProfile::for_environment(Environment::Dev).with_timeout_ms(300);
    Session::new(Box::new(DemoApp::new(options)), profile)
        .with_poll_interval(Duration::from_millis(5))
}

fn session() -> Session {
    session_with(DemoOptions::default())
}

fn lagging_session() -> Session {
    session_with(DemoOptions {
        render_lag: 3,
        ..Default::default()
    })
}

#[tokio::test]
async fn valid_login_lands_on_dashboard() {
    let mut s = session();
    LoginPage::new(&mut s)
        .goto()
        .await
        .unwrap()
        .login("teste@email.com", "123456")
        .await
        .unwrap();

    assert!(s.location_hash().await.unwrap().contains("#/dashboard"));
    DashboardPage::new(&mut s)
        .should_show_user_info("teste")
        .await
        .unwrap();
}

#[tokio::test]
async fn invalid_login_stays_on_login() {
    let mut s = session();
    LoginPage::new(&mut s)
        .goto()
        .await
        .unwrap()
        .login_with_invalid_data(Some("email-invalido"), Some("123"))
        .await
        .unwrap()
        .should_remain_on_login()
        .await
        .unwrap();

    assert!(s.location_hash().await.unwrap().contains("#/login"));
}

#[tokio::test]
async fn adding_an_item_grows_the_list() {
    let mut s = lagging_session();
    commands::login(&mut s, "teste@email.com", "123456").await.unwrap();

    let mut dashboard = DashboardPage::new(&mut s);
    assert_eq!(dashboard.item_count().await.unwrap(), 3);

    let item = ItemData::named("Item de Teste E2E");
    dashboard
        .add_item(&item)
        .await
        .unwrap()
        .should_have_items_count(4)
        .await
        .unwrap()
        .should_item_exist("Item de Teste E2E")
        .await
        .unwrap();
}

#[tokio::test]
async fn bulk_delete_removes_selected_items() {
    let mut s = lagging_session();
    commands::login(&mut s, "teste@email.com", "123456").await.unwrap();

    DashboardPage::new(&mut s)
        .select_item(1)
        .await
        .unwrap()
        .select_item(2)
        .await
        .unwrap()
        .should_show_bulk_delete_button(2)
        .await
        .unwrap()
        .delete_bulk_items()
        .await
        .unwrap()
        .should_have_items_count(1)
        .await
        .unwrap()
        .should_item_exist("Item de Exemplo 3")
        .await
        .unwrap();
}

/// Only a plain "Sair" button is rendered; logout still reaches the login page.
#[tokio::test]
async fn logout_through_text_only_control() {
    let mut s = session_with(DemoOptions {
        logout_control: LogoutControl::TextSair,
        ..Default::default()
    });
    commands::login(&mut s, "teste@email.com", "123456").await.unwrap();

    let outcome = commands::logout(&mut s).await.unwrap();

    assert_eq!(
        outcome.transitions.last(),
        Some(&commands::LogoutState::Confirmed)
    );
    LoginPage::wait_until_loaded(&mut s).await.unwrap();
}

/// Every route-changing page action returns only once the new route is current.
#[tokio::test]
async fn route_changes_are_settled_when_actions_return() {
    let mut s = lagging_session();

    LoginPage::new(&mut s).goto().await.unwrap();
    s.should_be_at_path("/login", Duration::ZERO).await.unwrap();

    LoginPage::new(&mut s).go_to_register().await.unwrap();
    s.should_be_at_path("/register", Duration::ZERO).await.unwrap();

    RegisterPage::new(&mut s).go_to_login().await.unwrap();
    s.should_be_at_path("/login", Duration::ZERO).await.unwrap();

    LoginPage::new(&mut s).login_with_defaults().await.unwrap();
    s.should_be_at_path("/dashboard", Duration::ZERO).await.unwrap();

    DashboardPage::new(&mut s).logout().await.unwrap();
    s.should_be_at_path("/login", Duration::ZERO).await.unwrap();
}

#[tokio::test]
async fn goto_twice_is_the_same_as_once() {
    let mut s = session();
    let mut login = LoginPage::new(&mut s);
    login.goto().await.unwrap();
    let first = login.session().location().await.unwrap();
    login.goto().await.unwrap().should_have_all_elements().await.unwrap();
    let second = login.session().location().await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn registration_with_generated_data_signs_in() {
    let mut s = session();
    let user = data::user_data();
    RegisterPage::new(&mut s)
        .goto()
        .await
        .unwrap()
        .register(&user)
        .await
        .unwrap();

    s.should_be_at_path("/dashboard", Duration::ZERO).await.unwrap();
}

/// A seeded session survives a reload of the dashboard.
#[tokio::test]
async fn fast_login_restores_the_seeded_user() {
    let mut s = session();
    commands::fast_login(&mut s).await.unwrap();

    DashboardPage::new(&mut s)
        .goto()
        .await
        .unwrap()
        .should_show_user_info("Usuário Teste")
        .await
        .unwrap()
        .should_have_items_count(3)
        .await
        .unwrap();
}
