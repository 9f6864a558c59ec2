//! Dashboard page: the item list and its CRUD controls

use std::fmt;
use std::time::Duration;

use tracing::{debug, info};

use super::{wait_for_all, LoginPage};
use crate::environment::Environment;
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::primitives::{FillOptions, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Baixa",
            Priority::Medium => "Média",
            Priority::High => "Alta",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Geral,
    Trabalho,
    Pessoal,
    Projeto,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Geral,
        Category::Trabalho,
        Category::Pessoal,
        Category::Projeto,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Geral => "Geral",
            Category::Trabalho => "Trabalho",
            Category::Pessoal => "Pessoal",
            Category::Projeto => "Projeto",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Values for the add-item form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemData {
    pub name: String,
    pub description: String,
    pub priority: Priority,
    pub category: Category,
}

impl Default for ItemData {
    fn default() -> Self {
        Self {
            name: "Novo Item de Teste".to_string(),
            description: "Descrição do novo item de teste".to_string(),
            priority: Priority::High,
            category: Category::Trabalho,
        }
    }
}

impl ItemData {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Fields to change when editing; `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardElement {
    Title,
    LogoutButton,
    ItemsTable,
    ItemsCount,
    /// The `Itens (N)` label showing exactly `N`.
    ItemsCountOf(usize),
    NoItemsMessage,
    AddItemButton,
    SearchInput,
    PriorityFilter,
    BulkDeleteButton,
    SelectAllCheckbox,
    AddItemModal,
    AddNameInput,
    AddDescriptionInput,
    AddPrioritySelect,
    AddCategorySelect,
    AddSubmitButton,
    AddCancelButton,
    EditItemModal,
    EditNameInput,
    EditDescriptionInput,
    EditPrioritySelect,
    EditCategorySelect,
    EditSubmitButton,
    EditCancelButton,
    ItemRow(u32),
    SelectItem(u32),
    ToggleComplete(u32),
    ItemActions(u32),
    EditItem(u32),
    DeleteItem(u32),
}

impl DashboardElement {
    pub const IDENTIFYING: [DashboardElement; 2] =
        [DashboardElement::Title, DashboardElement::ItemsTable];

    pub const STRUCTURAL: [DashboardElement; 6] = [
        DashboardElement::Title,
        DashboardElement::AddItemButton,
        DashboardElement::SearchInput,
        DashboardElement::PriorityFilter,
        DashboardElement::ItemsTable,
        DashboardElement::SelectAllCheckbox,
    ];

    pub fn locator(self) -> Locator {
        use DashboardElement::*;
        match self {
            Title => Locator::text_in("h1", "Dashboard"),
            ItemsCount => Locator::text("Itens ("),
            ItemsCountOf(n) => Locator::text(format!("Itens ({})", n)),
            NoItemsMessage => Locator::text("Nenhum item encontrado"),
            LogoutButton => Locator::test_id("logout-button"),
            ItemsTable => Locator::test_id("items-table"),
            AddItemButton => Locator::test_id("add-item-button"),
            SearchInput => Locator::test_id("search-input"),
            PriorityFilter => Locator::test_id("priority-filter"),
            BulkDeleteButton => Locator::test_id("bulk-delete-button"),
            SelectAllCheckbox => Locator::test_id("select-all-checkbox"),
            AddItemModal => Locator::test_id("add-item-modal"),
            AddNameInput => Locator::test_id("add-name-input"),
            AddDescriptionInput => Locator::test_id("add-description-input"),
            AddPrioritySelect => Locator::test_id("add-priority-select"),
            AddCategorySelect => Locator::test_id("add-category-select"),
            AddSubmitButton => Locator::test_id("add-submit-button"),
            AddCancelButton => Locator::test_id("add-cancel-button"),
            EditItemModal => Locator::test_id("edit-item-modal"),
            EditNameInput => Locator::test_id("edit-name-input"),
            EditDescriptionInput => Locator::test_id("edit-description-input"),
            EditPrioritySelect => Locator::test_id("edit-priority-select"),
            EditCategorySelect => Locator::test_id("edit-category-select"),
            EditSubmitButton => Locator::test_id("edit-submit-button"),
            EditCancelButton => Locator::test_id("edit-cancel-button"),
            ItemRow(id) => Locator::test_id(format!("item-row-{}", id)),
            SelectItem(id) => Locator::test_id(format!("select-item-{}", id)),
            ToggleComplete(id) => Locator::test_id(format!("toggle-complete-{}", id)),
            ItemActions(id) => Locator::test_id(format!("item-actions-{}", id)),
            EditItem(id) => Locator::test_id(format!("edit-item-{}", id)),
            DeleteItem(id) => Locator::test_id(format!("delete-item-{}", id)),
        }
    }
}

/// Parse the number out of a label such as `Itens (3)` or `Excluir (2)`.
pub(crate) fn parenthesized_count(text: &str) -> Option<usize> {
    let open = text.rfind('(')?;
    let close = open + text[open..].find(')')?;
    text[open + 1..close].trim().parse().ok()
}

pub struct DashboardPage<'s> {
    session: &'s mut Session,
}

impl<'s> DashboardPage<'s> {
    pub const PATH: &'static str = "/#/dashboard";

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
            &DashboardElement::IDENTIFYING.iter().map(|e| e.locator()).collect::<Vec<_>>(),
            timeout,
        )
        .await?;
        session.wait_for_loading().await
    }

    /// Open the dashboard. The session must already be signed in.
    pub async fn goto(&mut self) -> E2eResult<&mut Self> {
        self.session.visit(Self::PATH).await?;
        self.wait_for_page_load().await
    }

    pub async fn wait_for_page_load(&mut self) -> E2eResult<&mut Self> {
        Self::wait_until_loaded(self.session).await?;
        debug!("Dashboard loaded");
        Ok(self)
    }

    async fn click(&mut self, element: DashboardElement) -> E2eResult<&mut Self> {
        self.session.click(&element.locator()).await?;
        Ok(self)
    }

    async fn wait_for(&mut self, element: DashboardElement) -> E2eResult<&mut Self> {
        let timeout = self.session.timeouts().medium;
        self.session.wait_for_visible(&element.locator(), timeout).await?;
        Ok(self)
    }

    async fn wait_gone(&mut self, element: DashboardElement) -> E2eResult<&mut Self> {
        let timeout = self.session.timeouts().medium;
        self.session.wait_for_absent(&element.locator(), timeout).await?;
        Ok(self)
    }

    async fn contains_text(&mut self, text: &str) -> E2eResult<&mut Self> {
        let timeout = self.session.timeouts().medium;
        self.session.should_contain_text(text, timeout).await?;
        Ok(self)
    }

    pub async fn should_have_initial_items(&mut self) -> E2eResult<&mut Self> {
        self.contains_text("Dashboard").await?.should_have_items_count(3).await?;
        for n in 1..=3 {
            self.should_item_exist(&format!("Item de Exemplo {}", n)).await?;
        }
        Ok(self)
    }

    /// Rendered item count, read from the `Itens (N)` label.
    pub async fn item_count(&mut self) -> E2eResult<usize> {
        let timeout = self.session.timeouts().medium;
        let label = self
            .session
            .wait_for_visible(&DashboardElement::ItemsCount.locator(), timeout)
            .await?;
        parenthesized_count(&label.text).ok_or_else(|| {
            E2eError::ValidationAssertion(format!("unreadable item count label: {}", label.text))
        })
    }

    /// Wait until the rendered count equals `expected`.
    pub async fn expect_item_count(&mut self, expected: usize) -> E2eResult<&mut Self> {
        let timeout = self.session.timeouts().medium;
        let label = DashboardElement::ItemsCountOf(expected).locator();
        match self.session.wait_for_visible(&label, timeout).await {
            Ok(_) => Ok(self),
            Err(E2eError::Timeout { .. }) => {
                let actual = self.item_count().await?;
                Err(E2eError::ValidationAssertion(format!(
                    "expected {} items, found {}",
                    expected, actual
                )))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn open_add_item_modal(&mut self) -> E2eResult<&mut Self> {
        self.click(DashboardElement::AddItemButton)
            .await?
            .wait_for(DashboardElement::AddItemModal)
            .await
    }

    pub async fn close_add_item_modal(&mut self) -> E2eResult<&mut Self> {
        self.click(DashboardElement::AddCancelButton)
            .await?
            .wait_gone(DashboardElement::AddItemModal)
            .await
    }

    pub async fn fill_add_item_form(&mut self, item: &ItemData) -> E2eResult<&mut Self> {
        debug!(name = %item.name, "Filling add-item form");
        let fill = FillOptions::default();
        self.session
            .fill(&DashboardElement::AddNameInput.locator(), &item.name, fill)
            .await?;
        self.session
            .fill(&DashboardElement::AddDescriptionInput.locator(), &item.description, fill)
            .await?;
        self.session
            .select_option(&DashboardElement::AddPrioritySelect.locator(), item.priority.label())
            .await?;
        self.session
            .select_option(&DashboardElement::AddCategorySelect.locator(), item.category.label())
            .await?;
        Ok(self)
    }

    pub async fn submit_add_item(&mut self) -> E2eResult<&mut Self> {
        self.click(DashboardElement::AddSubmitButton)
            .await?
            .wait_gone(DashboardElement::AddItemModal)
            .await
    }

    /// Add an item and verify the list grew by one.
    pub async fn add_item(&mut self, item: &ItemData) -> E2eResult<&mut Self> {
        info!(name = %item.name, "Adding item");
        let before = self.item_count().await?;
        self.open_add_item_modal()
            .await?
            .fill_add_item_form(item)
            .await?
            .submit_add_item()
            .await?
            .expect_item_count(before + 1)
            .await?
            .should_item_exist(&item.name)
            .await
    }

    pub async fn should_item_exist(&mut self, name: &str) -> E2eResult<&mut Self> {
        let timeout = self.session.timeouts().medium;
        self.session
            .should_contain_within(&DashboardElement::ItemsTable.locator(), name, timeout)
            .await?;
        Ok(self)
    }

    pub async fn should_item_not_exist(&mut self, name: &str) -> E2eResult<&mut Self> {
        let timeout = self.session.timeouts().medium;
        self.session
            .should_not_contain_within(&DashboardElement::ItemsTable.locator(), name, timeout)
            .await?;
        Ok(self)
    }

    pub async fn search_for_item(&mut self, term: &str) -> E2eResult<&mut Self> {
        debug!(term, "Searching items");
        self.session
            .fill(&DashboardElement::SearchInput.locator(), term, FillOptions::default())
            .await?;
        Ok(self)
    }

    /// Filter the list by priority; `None` shows every priority.
    pub async fn filter_by_priority(&mut self, priority: Option<Priority>) -> E2eResult<&mut Self> {
        let label = priority.map(Priority::label).unwrap_or("Todas");
        debug!(priority = label, "Filtering items");
        self.session
            .select_option(&DashboardElement::PriorityFilter.locator(), label)
            .await?;
        Ok(self)
    }

    pub async fn select_item(&mut self, id: u32) -> E2eResult<&mut Self> {
        self.click(DashboardElement::SelectItem(id)).await
    }

    pub async fn select_all_items(&mut self) -> E2eResult<&mut Self> {
        self.click(DashboardElement::SelectAllCheckbox).await
    }

    pub async fn open_item_actions(&mut self, id: u32) -> E2eResult<&mut Self> {
        self.click(DashboardElement::ItemActions(id)).await
    }

    /// Edit an item in place; the list size must not change.
    pub async fn edit_item(&mut self, id: u32, update: &ItemUpdate) -> E2eResult<&mut Self> {
        info!(id, "Editing item");
        let before = self.item_count().await?;
        self.open_item_actions(id)
            .await?
            .click(DashboardElement::EditItem(id))
            .await?
            .wait_for(DashboardElement::EditItemModal)
            .await?;

        let fill = FillOptions { clear: true };
        if let Some(name) = &update.name {
            self.session
                .fill(&DashboardElement::EditNameInput.locator(), name, fill)
                .await?;
        }
        if let Some(description) = &update.description {
            self.session
                .fill(&DashboardElement::EditDescriptionInput.locator(), description, fill)
                .await?;
        }
        if let Some(priority) = update.priority {
            self.session
                .select_option(&DashboardElement::EditPrioritySelect.locator(), priority.label())
                .await?;
        }
        if let Some(category) = update.category {
            self.session
                .select_option(&DashboardElement::EditCategorySelect.locator(), category.label())
                .await?;
        }

        self.click(DashboardElement::EditSubmitButton)
            .await?
            .wait_gone(DashboardElement::EditItemModal)
            .await?
            .expect_item_count(before)
            .await?;
        if let Some(name) = &update.name {
            self.should_item_exist(name).await?;
        }
        Ok(self)
    }

    /// Delete one item and verify the list shrank by one.
    pub async fn delete_item(&mut self, id: u32) -> E2eResult<&mut Self> {
        info!(id, "Deleting item");
        let before = self.item_count().await?;
        self.open_item_actions(id)
            .await?
            .click(DashboardElement::DeleteItem(id))
            .await?
            .expect_item_count(before.saturating_sub(1))
            .await
    }

    /// Delete every selected item and verify the list shrank by that many.
    pub async fn delete_bulk_items(&mut self) -> E2eResult<&mut Self> {
        let timeout = self.session.timeouts().medium;
        let button = self
            .session
            .wait_for_visible(&DashboardElement::BulkDeleteButton.locator(), timeout)
            .await?;
        let selected = parenthesized_count(&button.text).ok_or_else(|| {
            E2eError::ValidationAssertion(format!("unreadable bulk delete label: {}", button.text))
        })?;
        info!(selected, "Deleting selected items");
        let before = self.item_count().await?;
        self.click(DashboardElement::BulkDeleteButton)
            .await?
            .expect_item_count(before.saturating_sub(selected))
            .await
    }

    pub async fn toggle_item_complete(&mut self, id: u32) -> E2eResult<&mut Self> {
        debug!(id, "Toggling item completion");
        self.click(DashboardElement::ToggleComplete(id)).await
    }

    /// Click the primary logout button and wait for the login page.
    ///
    /// Layouts without the primary button need
    /// [`crate::commands::logout()`], which tries the text fallbacks.
    pub async fn logout(&mut self) -> E2eResult<&mut Self> {
        self.click(DashboardElement::LogoutButton).await?;
        let timeout = self.session.timeouts().medium;
        self.session.should_be_at_path("/login", timeout).await?;
        LoginPage::wait_until_loaded(self.session).await?;
        Ok(self)
    }

    pub async fn should_show_environment(&mut self, environment: Environment) -> E2eResult<&mut Self> {
        self.contains_text(&format!("Ambiente: {}", environment.display_name()))
            .await
    }

    pub async fn should_show_user_info(&mut self, username: &str) -> E2eResult<&mut Self> {
        self.contains_text(username).await
    }

    pub async fn should_have_items_count(&mut self, count: usize) -> E2eResult<&mut Self> {
        self.wait_for(DashboardElement::ItemsCountOf(count)).await
    }

    pub async fn should_show_no_items_message(&mut self) -> E2eResult<&mut Self> {
        self.wait_for(DashboardElement::NoItemsMessage).await
    }

    pub async fn should_show_bulk_delete_button(&mut self, count: usize) -> E2eResult<&mut Self> {
        let timeout = self.session.timeouts().medium;
        self.session
            .should_contain_within(
                &DashboardElement::BulkDeleteButton.locator(),
                &format!("({})", count),
                timeout,
            )
            .await?;
        Ok(self)
    }

    pub async fn wait_for_table_update(&mut self) -> E2eResult<&mut Self> {
        self.session.wait_for_loading().await?;
        self.session.smart_wait(Duration::from_millis(500)).await;
        Ok(self)
    }

    pub async fn should_have_all_main_elements(&mut self) -> E2eResult<&mut Self> {
        let timeout = self.session.timeouts().medium;
        wait_for_all(
            self.session,
            &DashboardElement::STRUCTURAL.iter().map(|e| e.locator()).collect::<Vec<_>>(),
            timeout,
        )
        .await?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DemoApp, DemoOptions};
    use crate::environment::EnvironmentProfile;
    use crate::pages::LoginPage;

    async fn signed_in(render_lag: u32) -> Session {
        let profile = EnvironmentProfile::for_environment(Environment::Dev).with_timeout_ms(300);
        let app = DemoApp::new(DemoOptions {
            render_lag,
            ..Default::default()
        });
        let mut s = Session::new(Box::new(app), profile).with_poll_interval(Duration::from_millis(5));
        LoginPage::new(&mut s).goto().await.unwrap().login_with_defaults().await.unwrap();
        s
    }

    #[test]
    fn count_label_locators() {
        assert_eq!(
            DashboardElement::ItemsCountOf(3).locator(),
            Locator::text("Itens (3)")
        );
        assert_eq!(DashboardElement::Title.locator(), Locator::text_in("h1", "Dashboard"));
    }

    #[test]
    fn counts_are_read_from_labels() {
        assert_eq!(parenthesized_count("Itens (3)"), Some(3));
        assert_eq!(parenthesized_count("Excluir (12)"), Some(12));
        assert_eq!(parenthesized_count("Itens"), None);
    }

    #[tokio::test]
    async fn add_item_waits_out_render_lag() {
        let mut s = signed_in(3).await;
        let mut page = DashboardPage::new(&mut s);
        page.should_have_initial_items().await.unwrap();
        page.add_item(&ItemData::named("Relatório mensal")).await.unwrap();
        assert_eq!(page.item_count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn edit_keeps_count_and_renames() {
        let mut s = signed_in(0).await;
        let update = ItemUpdate {
            name: Some("Item Editado".into()),
            priority: Some(Priority::Low),
            ..Default::default()
        };
        DashboardPage::new(&mut s)
            .edit_item(1, &update)
            .await
            .unwrap()
            .should_item_not_exist("Item de Exemplo 1")
            .await
            .unwrap()
            .should_have_items_count(3)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_and_bulk_delete_shrink_the_list() {
        let mut s = signed_in(1).await;
        let mut page = DashboardPage::new(&mut s);
        page.delete_item(3).await.unwrap();
        page.select_all_items()
            .await
            .unwrap()
            .should_show_bulk_delete_button(2)
            .await
            .unwrap()
            .delete_bulk_items()
            .await
            .unwrap()
            .should_show_no_items_message()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn priority_filter_can_empty_the_list() {
        let mut s = signed_in(0).await;
        DashboardPage::new(&mut s)
            .filter_by_priority(Some(Priority::High))
            .await
            .unwrap()
            .should_have_items_count(0)
            .await
            .unwrap()
            .filter_by_priority(None)
            .await
            .unwrap()
            .should_have_items_count(3)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn environment_badge_and_user() {
        let mut s = signed_in(0).await;
        DashboardPage::new(&mut s)
            .should_have_all_main_elements()
            .await
            .unwrap()
            .should_show_environment(Environment::Dev)
            .await
            .unwrap()
            .should_show_user_info("teste")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wrong_count_is_an_assertion_failure() {
        let mut s = signed_in(0).await;
        let err = DashboardPage::new(&mut s).expect_item_count(7).await.err().unwrap();
        assert!(matches!(err, E2eError::ValidationAssertion(m) if m.contains("found 3")));
    }
}
