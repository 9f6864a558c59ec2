use crate::commands::{self, SetupOptions};
use crate::error::E2eResult;
use crate::pages::{DashboardElement, DashboardPage, ItemData, ItemUpdate, Priority, DEFAULT_EMAIL, DEFAULT_PASSWORD};
use crate::primitives::Session;
use crate::runner::{Scenario, Suite};

pub(super) fn suite() -> Suite {
    Suite::new("Dashboard")
        .scenario(Scenario::new("lists the initial items", |s| {
            Box::pin(initial_items(s))
        }))
        .scenario(Scenario::new("adds a new item", |s| Box::pin(add_item(s))))
        .scenario(Scenario::new("cancels adding an item", |s| {
            Box::pin(cancel_add(s))
        }))
        .scenario(Scenario::new("searches items by name", |s| Box::pin(search(s))))
        .scenario(Scenario::new("filters items by priority", |s| {
            Box::pin(filter_priority(s))
        }))
        .scenario(Scenario::new("selects items individually", |s| {
            Box::pin(select_items(s))
        }))
        .scenario(Scenario::new("selects every item at once", |s| {
            Box::pin(select_all(s))
        }))
        .scenario(Scenario::new("edits an item", |s| Box::pin(edit_item(s))))
        .scenario(Scenario::new("deletes a single item", |s| {
            Box::pin(delete_item(s))
        }))
        .scenario(Scenario::new("bulk deletes selected items", |s| {
            Box::pin(bulk_delete(s))
        }))
        .scenario(Scenario::new("toggles item completion", |s| {
            Box::pin(toggle_complete(s))
        }))
        .scenario(Scenario::new("logout from the dashboard", |s| {
            Box::pin(logout(s))
        }))
        .scenario(Scenario::new("shows the signed-in user", |s| {
            Box::pin(user_info(s))
        }))
        .scenario(
            Scenario::new("adds items in bulk", |s| Box::pin(add_in_bulk(s))).with_fast_login(),
        )
}

async fn signed_in(session: &mut Session) -> E2eResult<DashboardPage<'_>> {
    commands::login(session, DEFAULT_EMAIL, DEFAULT_PASSWORD).await?;
    Ok(DashboardPage::new(session))
}

async fn initial_items(session: &mut Session) -> E2eResult<()> {
    signed_in(session)
        .await?
        .should_have_all_main_elements()
        .await?
        .should_have_initial_items()
        .await?;
    Ok(())
}

async fn add_item(session: &mut Session) -> E2eResult<()> {
    let item = ItemData::default();
    signed_in(session)
        .await?
        .add_item(&item)
        .await?
        .should_have_items_count(4)
        .await?;
    Ok(())
}

async fn cancel_add(session: &mut Session) -> E2eResult<()> {
    signed_in(session)
        .await?
        .open_add_item_modal()
        .await?
        .close_add_item_modal()
        .await?
        .should_have_items_count(3)
        .await?;
    Ok(())
}

async fn search(session: &mut Session) -> E2eResult<()> {
    signed_in(session)
        .await?
        .search_for_item("Exemplo 1")
        .await?
        .should_item_exist("Item de Exemplo 1")
        .await?
        .should_item_not_exist("Item de Exemplo 2")
        .await?
        .should_item_not_exist("Item de Exemplo 3")
        .await?;
    Ok(())
}

/// The initial items carry no priority, so any priority filter empties the list.
async fn filter_priority(session: &mut Session) -> E2eResult<()> {
    signed_in(session)
        .await?
        .filter_by_priority(Some(Priority::High))
        .await?
        .should_show_no_items_message()
        .await?
        .filter_by_priority(None)
        .await?
        .should_have_items_count(3)
        .await?;
    Ok(())
}

async fn select_items(session: &mut Session) -> E2eResult<()> {
    signed_in(session)
        .await?
        .select_item(1)
        .await?
        .select_item(2)
        .await?
        .should_show_bulk_delete_button(2)
        .await?;
    Ok(())
}

async fn select_all(session: &mut Session) -> E2eResult<()> {
    signed_in(session)
        .await?
        .select_all_items()
        .await?
        .should_show_bulk_delete_button(3)
        .await?;
    Ok(())
}

async fn edit_item(session: &mut Session) -> E2eResult<()> {
    let update = ItemUpdate {
        name: Some("Item Editado".to_string()),
        description: Some("Descrição editada".to_string()),
        priority: Some(Priority::Medium),
        ..Default::default()
    };
    signed_in(session)
        .await?
        .edit_item(1, &update)
        .await?
        .should_item_not_exist("Item de Exemplo 1")
        .await?;
    Ok(())
}

async fn delete_item(session: &mut Session) -> E2eResult<()> {
    signed_in(session)
        .await?
        .delete_item(1)
        .await?
        .should_item_not_exist("Item de Exemplo 1")
        .await?
        .should_have_items_count(2)
        .await?;
    Ok(())
}

async fn bulk_delete(session: &mut Session) -> E2eResult<()> {
    signed_in(session)
        .await?
        .select_item(1)
        .await?
        .select_item(2)
        .await?
        .delete_bulk_items()
        .await?
        .should_have_items_count(1)
        .await?;
    Ok(())
}

async fn toggle_complete(session: &mut Session) -> E2eResult<()> {
    signed_in(session).await?.toggle_item_complete(1).await?;
    let timeout = session.timeouts().medium;
    session
        .should_have_attribute(
            &DashboardElement::ToggleComplete(1).locator(),
            "aria-pressed",
            "true",
            timeout,
        )
        .await
}

async fn logout(session: &mut Session) -> E2eResult<()> {
    signed_in(session).await?.logout().await?;
    Ok(())
}

async fn user_info(session: &mut Session) -> E2eResult<()> {
    let environment = session.profile().environment;
    signed_in(session)
        .await?
        .should_show_user_info("teste")
        .await?
        .should_show_environment(environment)
        .await?;
    Ok(())
}

async fn add_in_bulk(session: &mut Session) -> E2eResult<()> {
    let options = SetupOptions {
        require_auth: true,
        monitor_performance: true,
    };
    commands::setup_test(session, "adds items in bulk", options).await?;
    commands::add_multiple_items(session, 2, "Lote").await?;
    commands::item_should_exist(session, "Lote 1").await?;
    commands::item_should_exist(session, "Lote 2").await?;
    DashboardPage::new(session).should_have_items_count(5).await?;
    Ok(())
}
