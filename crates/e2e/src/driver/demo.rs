//! In-process simulation of the application under test
//!
//! `DemoApp` renders the same DOM contract the real application exposes
//! (test ids, texts, fragment routes, validation messages) without a browser.
//! State changes that the real application applies asynchronously (route
//! transitions after submit, table re-renders) become visible after
//! `render_lag` observations, so callers must poll just as they would
//! against a browser.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, Rgba, RgbaImage};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{BrowserDriver, ElementState, PageLoadTiming, Rect, ResourceTiming};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

const ROW_HEIGHT: f64 = 24.0;

/// Which logout control the dashboard renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogoutControl {
    /// `[data-testid="logout-button"]` labelled "Sair".
    #[default]
    Primary,
    /// A plain button labelled "Logout".
    TextLogout,
    /// A plain button labelled "Sair".
    TextSair,
    /// No logout control at all.
    Missing,
}

/// Knobs for the simulation.
#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub origin: String,
    /// Observations before a route change or list update becomes visible.
    pub render_lag: u32,
    pub logout_control: LogoutControl,
    /// Uncaught exceptions the page reports after its first load.
    pub page_errors: Vec<String>,
    pub resource_timings: Vec<ResourceTiming>,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            origin: "http://localhost:5173".to_string(),
            render_lag: 0,
            logout_control: LogoutControl::Primary,
            page_errors: Vec::new(),
            resource_timings: Vec::new(),
        }
    }
}

/// An item in the dashboard list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoItem {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Login,
    Register,
    Dashboard,
}

impl Route {
    fn fragment(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Dashboard => "/dashboard",
        }
    }
}

#[derive(Debug, Clone)]
struct User {
    name: String,
}

#[derive(Debug, Clone)]
struct Node {
    id: String,
    tag: &'static str,
    test_id: Option<String>,
    text: String,
    role: Option<&'static str>,
    attrs: Vec<(&'static str, String)>,
}

impl Node {
    fn new(tag: &'static str, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: format!("{}:{}", tag, text),
            tag,
            test_id: None,
            text,
            role: None,
            attrs: Vec::new(),
        }
    }

    fn tid(tag: &'static str, test_id: impl Into<String>, text: impl Into<String>) -> Self {
        let test_id = test_id.into();
        Self {
            id: test_id.clone(),
            tag,
            test_id: Some(test_id),
            text: text.into(),
            role: None,
            attrs: Vec::new(),
        }
    }

    fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attrs.push((name, value.into()));
        self
    }

    fn role(mut self, role: &'static str) -> Self {
        self.role = Some(role);
        self
    }

    fn get_attr(&self, name: &str) -> Option<String> {
        if name == "data-testid" {
            return self.test_id.clone();
        }
        if name == "role" {
            return self.role.map(str::to_string);
        }
        self.attrs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.clone())
    }
}

/// The simulated single-page application.
pub struct DemoApp {
    options: DemoOptions,
    pending_page_errors: Vec<String>,
    loaded: bool,
    document: String,
    route: Route,
    pending_route: Option<(Route, u32)>,
    user: Option<User>,
    local_storage: BTreeMap<String, String>,
    items: Vec<DemoItem>,
    rendered: Vec<DemoItem>,
    render_countdown: u32,
    next_id: u32,
    fields: HashMap<String, String>,
    checked: BTreeSet<String>,
    selects: HashMap<String, String>,
    open_select: Option<String>,
    password_visible: bool,
    confirm_visible: bool,
    errors: BTreeMap<&'static str, &'static str>,
    modal_errors: Vec<&'static str>,
    selected: BTreeSet<u32>,
    add_open: bool,
    editing: Option<u32>,
    actions_open: Option<u32>,
    page_errors: Vec<String>,
    viewport: (u32, u32),
}

impl DemoApp {
    pub fn new(options: DemoOptions) -> Self {
        let pending_page_errors = options.page_errors.clone();
        Self {
            options,
            pending_page_errors,
            loaded: false,
            document: "/".to_string(),
            route: Route::Login,
            pending_route: None,
            user: None,
            local_storage: BTreeMap::new(),
            items: initial_items(),
            rendered: initial_items(),
            render_countdown: 0,
            next_id: 4,
            fields: HashMap::new(),
            checked: BTreeSet::new(),
            selects: HashMap::new(),
            open_select: None,
            password_visible: false,
            confirm_visible: false,
            errors: BTreeMap::new(),
            modal_errors: Vec::new(),
            selected: BTreeSet::new(),
            add_open: false,
            editing: None,
            actions_open: None,
            page_errors: Vec::new(),
            viewport: (640, 360),
        }
    }

    /// Items as the application currently holds them (not as rendered).
    pub fn items(&self) -> &[DemoItem] {
        &self.items
    }

    pub fn local_storage(&self) -> &BTreeMap<String, String> {
        &self.local_storage
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Environment badge the application derives from its own location.
    fn environment_badge(&self) -> (&'static str, &'static str) {
        let doc = self.document.as_str();
        if doc.contains("/dev") {
            ("Desenvolvimento", "DEV")
        } else if doc.contains("/tst") {
            ("Teste", "TST")
        } else if doc.contains("/hml") {
            ("Homologação", "HML")
        } else if doc.contains("/prd") {
            ("Produção", "PRD")
        } else if self.options.origin.contains("://localhost") || self.options.origin.contains("://127.0.0.1") {
            ("Desenvolvimento", "DEV")
        } else {
            ("Produção", "PRD")
        }
    }

    fn observe(&mut self) {
        if let Some((route, remaining)) = self.pending_route.as_mut() {
            if *remaining == 0 {
                let route = *route;
                self.pending_route = None;
                self.enter(route);
            } else {
                *remaining -= 1;
            }
        }
        if self.render_countdown == 0 {
            self.rendered = self.items.clone();
        } else {
            self.render_countdown -= 1;
        }
    }

    fn guard(&self, route: Route) -> Route {
        match (route, self.user.is_some()) {
            (Route::Dashboard, false) => Route::Login,
            (Route::Login | Route::Register, true) => Route::Dashboard,
            (route, _) => route,
        }
    }

    fn enter(&mut self, route: Route) {
        let route = self.guard(route);
        if route != self.route {
            self.fields.clear();
            self.checked.clear();
            self.selects.clear();
            self.errors.clear();
            self.modal_errors.clear();
            self.open_select = None;
            self.password_visible = false;
            self.confirm_visible = false;
            self.add_open = false;
            self.editing = None;
            self.actions_open = None;
            self.selected.clear();
        }
        self.route = route;
    }

    fn go(&mut self, route: Route) {
        self.pending_route = Some((route, self.options.render_lag));
    }

    fn items_changed(&mut self) {
        self.render_countdown = self.options.render_lag;
    }

    fn load_document(&mut self, document: String) {
        self.loaded = true;
        self.document = document;
        self.pending_route = None;
        self.items = initial_items();
        self.rendered = initial_items();
        self.render_countdown = 0;
        self.next_id = 4;
        self.user = self
            .local_storage
            .get("authToken")
            .map(|_| {
                let name = self
                    .local_storage
                    .get("user")
                    .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
                    .and_then(|v| v["name"].as_str().map(str::to_string))
                    .unwrap_or_else(|| "Usuário".to_string());
                User { name }
            });
        self.page_errors.append(&mut self.pending_page_errors);
        // Force a full state reset on the next enter().
        self.route = Route::Register;
        self.enter(Route::Login);
        debug!(document = %self.document, signed_in = self.user.is_some(), "Demo document loaded");
    }

    fn route_for_fragment(&self, fragment: &str) -> Route {
        match fragment.trim_end_matches('/') {
            "/login" => Route::Login,
            "/register" => Route::Register,
            "/dashboard" => Route::Dashboard,
            _ if self.user.is_some() => Route::Dashboard,
            _ => Route::Login,
        }
    }

    fn field(&self, id: &str) -> String {
        self.fields.get(id).cloned().unwrap_or_default()
    }

    fn filtered(&self) -> Vec<&DemoItem> {
        let search = self.field("search-input").to_lowercase();
        let priority = self
            .selects
            .get("priority-filter")
            .map(String::as_str)
            .unwrap_or("all");
        self.rendered
            .iter()
            .filter(|item| {
                let matches_search = item.name.to_lowercase().contains(&search)
                    || item.description.to_lowercase().contains(&search);
                let matches_priority =
                    priority == "all" || item.priority.as_deref() == Some(priority);
                matches_search && matches_priority
            })
            .collect()
    }

    fn render(&self) -> Vec<Node> {
        if !self.loaded {
            return Vec::new();
        }
        let (env_name, env_code) = self.environment_badge();
        let mut nodes = vec![Node::new("div", format!("🚀 Ambiente: {} ({})", env_name, env_code))];
        match self.route {
            Route::Login => self.render_login(&mut nodes),
            Route::Register => self.render_register(&mut nodes),
            Route::Dashboard => self.render_dashboard(&mut nodes, env_name),
        }
        nodes
    }

    fn render_password(&self, nodes: &mut Vec<Node>, id: &'static str, toggle: &'static str, visible: bool) {
        nodes.push(
            Node::tid("input", id, "")
                .attr("type", if visible { "text" } else { "password" })
                .attr("value", self.field(id))
                .attr("data-sensitive", "true"),
        );
        nodes.push(Node::tid("button", toggle, ""));
    }

    fn render_errors(&self, nodes: &mut Vec<Node>) {
        for (id, message) in &self.errors {
            nodes.push(Node::tid("p", *id, *message));
        }
    }

    fn render_login(&self, nodes: &mut Vec<Node>) {
        nodes.push(Node::new("h3", "Entrar"));
        nodes.push(Node::new("p", "Entre com suas credenciais para acessar o sistema"));
        nodes.push(
            Node::tid("input", "email-input", "")
                .attr("type", "email")
                .attr("value", self.field("email-input")),
        );
        self.render_password(nodes, "password-input", "toggle-password", self.password_visible);
        self.render_errors(nodes);
        nodes.push(Node::tid("button", "login-button", "Entrar").attr("type", "submit"));
        nodes.push(Node::tid("a", "register-link", "Cadastre-se").attr("href", "#/register"));
        nodes.push(Node::tid("a", "forgot-password-link", "Esqueceu sua senha?"));
    }

    fn render_register(&self, nodes: &mut Vec<Node>) {
        nodes.push(Node::new("h3", "Criar Conta"));
        for id in ["name-input", "email-input", "phone-input"] {
            nodes.push(Node::tid("input", id, "").attr("value", self.field(id)));
        }
        self.render_select(nodes, "department-select", "Selecione seu departamento");
        self.render_password(nodes, "password-input", "toggle-password", self.password_visible);
        self.render_password(
            nodes,
            "confirm-password-input",
            "toggle-confirm-password",
            self.confirm_visible,
        );
        for id in ["accept-terms-checkbox", "newsletter-checkbox"] {
            nodes.push(
                Node::tid("button", id, "")
                    .role("checkbox")
                    .attr("data-state", checkbox_state(self.checked.contains(id))),
            );
        }
        nodes.push(Node::tid("a", "terms-link", "termos de uso").attr("href", "#"));
        nodes.push(Node::tid("a", "privacy-link", "política de privacidade").attr("href", "#"));
        self.render_errors(nodes);
        nodes.push(Node::tid("button", "register-button", "Criar Conta").attr("type", "submit"));
        nodes.push(Node::tid("a", "login-link", "Entrar").attr("href", "#/login"));
    }

    fn render_select(&self, nodes: &mut Vec<Node>, trigger: &'static str, placeholder: &str) {
        let options = select_options(trigger);
        let label = self
            .selects
            .get(trigger)
            .and_then(|v| options.iter().find(|(value, _)| value == v))
            .map(|(_, label)| *label)
            .unwrap_or(placeholder);
        nodes.push(Node::tid("button", trigger, label).role("combobox"));
        if self.open_select.as_deref() == Some(trigger) {
            for (value, label) in options {
                let mut node = Node::new("div", *label).role("option");
                node.id = format!("option:{}:{}", trigger, value);
                nodes.push(node);
            }
        }
    }

    fn render_dashboard(&self, nodes: &mut Vec<Node>, env_name: &str) {
        let filtered = self.filtered();

        nodes.push(Node::new("h1", "Dashboard"));
        nodes.push(Node::new("span", env_name).attr("data-slot", "badge"));
        if let Some(user) = &self.user {
            nodes.push(Node::new("span", user.name.clone()));
        }
        match self.options.logout_control {
            LogoutControl::Primary => nodes.push(Node::tid("button", "logout-button", "Sair")),
            LogoutControl::TextLogout => nodes.push(Node::new("button", "Logout")),
            LogoutControl::TextSair => nodes.push(Node::new("button", "Sair")),
            LogoutControl::Missing => {}
        }
        nodes.push(
            Node::tid("input", "search-input", "")
                .attr("placeholder", "Buscar itens...")
                .attr("value", self.field("search-input")),
        );
        self.render_select(nodes, "priority-filter", "Todas");
        if !self.selected.is_empty() {
            nodes.push(Node::tid(
                "button",
                "bulk-delete-button",
                format!("Excluir ({})", self.selected.len()),
            ));
        }
        nodes.push(Node::tid("button", "add-item-button", "Adicionar Item"));

        nodes.push(Node::new("div", format!("Itens ({})", filtered.len())));

        let table_text: Vec<String> = filtered.iter().map(|i| row_text(i)).collect();
        let table_text = if filtered.is_empty() {
            "Nenhum item encontrado".to_string()
        } else {
            table_text.join(" ")
        };
        nodes.push(Node::tid("table", "items-table", table_text));
        let all_selected = !filtered.is_empty() && self.selected.len() == filtered.len();
        nodes.push(
            Node::tid("button", "select-all-checkbox", "")
                .role("checkbox")
                .attr("data-state", checkbox_state(all_selected)),
        );

        for item in &filtered {
            nodes.push(Node::tid("tr", format!("item-row-{}", item.id), row_text(item)));
            nodes.push(
                Node::tid("button", format!("select-item-{}", item.id), "")
                    .role("checkbox")
                    .attr("data-state", checkbox_state(self.selected.contains(&item.id))),
            );
            nodes.push(
                Node::tid("button", format!("toggle-complete-{}", item.id), "")
                    .attr("aria-pressed", item.completed.to_string()),
            );
            nodes.push(Node::tid("button", format!("item-actions-{}", item.id), ""));
            if self.actions_open == Some(item.id) {
                nodes.push(Node::tid("div", format!("edit-item-{}", item.id), "Editar").role("menuitem"));
                nodes.push(Node::tid("div", format!("delete-item-{}", item.id), "Excluir").role("menuitem"));
            }
        }
        if filtered.is_empty() {
            nodes.push(Node::new("td", "Nenhum item encontrado"));
        }

        if self.add_open {
            self.render_item_modal(nodes, "add", "Adicionar Novo Item", "Adicionar");
        }
        if self.editing.is_some() {
            self.render_item_modal(nodes, "edit", "Editar Item", "Salvar");
        }
    }

    fn render_item_modal(&self, nodes: &mut Vec<Node>, prefix: &str, title: &str, submit: &str) {
        nodes.push(Node::tid("div", format!("{}-item-modal", prefix), title).role("dialog"));
        for field in ["name", "description"] {
            let id = format!("{}-{}-input", prefix, field);
            let value = self.field(&id);
            nodes.push(Node::tid("input", id, "").attr("value", value));
        }
        let (priority, category) = if prefix == "add" {
            ("add-priority-select", "add-category-select")
        } else {
            ("edit-priority-select", "edit-category-select")
        };
        self.render_select(nodes, priority, "Selecione");
        self.render_select(nodes, category, "Selecione");
        for message in &self.modal_errors {
            nodes.push(Node::new("p", *message));
        }
        nodes.push(Node::tid("button", format!("{}-cancel-button", prefix), "Cancelar"));
        nodes.push(Node::tid("button", format!("{}-submit-button", prefix), submit));
    }

    fn find_node(&self, id: &str) -> E2eResult<Node> {
        self.render()
            .into_iter()
            .find(|n| n.id == id)
            .ok_or_else(|| E2eError::WebDriver {
                error: "stale element reference".to_string(),
                message: format!("element {} is no longer attached to the DOM", id),
            })
    }

    fn handle_click(&mut self, id: &str) {
        if let Some(rest) = id.strip_prefix("option:") {
            if let Some((trigger, value)) = rest.split_once(':') {
                self.selects.insert(trigger.to_string(), value.to_string());
            }
            self.open_select = None;
            return;
        }
        if select_options(id).is_empty() {
            self.open_select = None;
        }

        match id {
            "toggle-password" => self.password_visible = !self.password_visible,
            "toggle-confirm-password" => self.confirm_visible = !self.confirm_visible,
            "login-button" => self.submit_login(),
            "register-button" => self.submit_register(),
            "register-link" => self.go(Route::Register),
            "login-link" => self.go(Route::Login),
            "accept-terms-checkbox" | "newsletter-checkbox" => {
                if !self.checked.remove(id) {
                    self.checked.insert(id.to_string());
                }
            }
            "logout-button" | "button:Logout" | "button:Sair" => {
                self.user = None;
                self.go(Route::Login);
            }
            "add-item-button" => {
                self.add_open = true;
                self.modal_errors.clear();
            }
            "add-cancel-button" => self.close_modals(),
            "edit-cancel-button" => self.close_modals(),
            "add-submit-button" => self.submit_item(None),
            "edit-submit-button" => {
                if let Some(id) = self.editing {
                    self.submit_item(Some(id));
                }
            }
            "select-all-checkbox" => {
                let ids: Vec<u32> = self.filtered().iter().map(|i| i.id).collect();
                if !ids.is_empty() && self.selected.len() == ids.len() {
                    self.selected.clear();
                } else {
                    self.selected = ids.into_iter().collect();
                }
            }
            "bulk-delete-button" => {
                let selected = std::mem::take(&mut self.selected);
                self.items.retain(|i| !selected.contains(&i.id));
                self.items_changed();
            }
            trigger if !select_options(trigger).is_empty() => {
                self.open_select = match self.open_select.as_deref() {
                    Some(open) if open == trigger => None,
                    _ => Some(trigger.to_string()),
                };
            }
            other => self.handle_item_click(other),
        }
    }

    fn handle_item_click(&mut self, id: &str) {
        let parse = |prefix: &str| id.strip_prefix(prefix).and_then(|n| n.parse::<u32>().ok());
        if let Some(item_id) = parse("select-item-") {
            if !self.selected.remove(&item_id) {
                self.selected.insert(item_id);
            }
        } else if let Some(item_id) = parse("toggle-complete-") {
            if let Some(item) = self.items.iter_mut().find(|i| i.id == item_id) {
                item.completed = !item.completed;
            }
            self.items_changed();
        } else if let Some(item_id) = parse("item-actions-") {
            self.actions_open = if self.actions_open == Some(item_id) {
                None
            } else {
                Some(item_id)
            };
        } else if let Some(item_id) = parse("edit-item-") {
            self.actions_open = None;
            if let Some(item) = self.items.iter().find(|i| i.id == item_id).cloned() {
                self.fields.insert("edit-name-input".into(), item.name);
                self.fields.insert("edit-description-input".into(), item.description);
                self.selects.insert(
                    "edit-priority-select".into(),
                    item.priority.unwrap_or_else(|| "medium".into()),
                );
                self.selects.insert(
                    "edit-category-select".into(),
                    item.category.unwrap_or_else(|| "geral".into()),
                );
                self.modal_errors.clear();
                self.editing = Some(item_id);
            }
        } else if let Some(item_id) = parse("delete-item-") {
            self.actions_open = None;
            self.items.retain(|i| i.id != item_id);
            self.selected.remove(&item_id);
            self.items_changed();
        } else {
            debug!(element = id, "Click has no handler");
        }
    }

    fn close_modals(&mut self) {
        self.add_open = false;
        self.editing = None;
        self.modal_errors.clear();
        for prefix in ["add", "edit"] {
            self.fields.remove(&format!("{}-name-input", prefix));
            self.fields.remove(&format!("{}-description-input", prefix));
            self.selects.remove(&format!("{}-priority-select", prefix));
            self.selects.remove(&format!("{}-category-select", prefix));
        }
    }

    fn submit_login(&mut self) {
        self.errors.clear();
        let email = self.field("email-input");
        let password = self.field("password-input");
        if !EMAIL.is_match(&email) {
            self.errors.insert("email-error", "Email inválido");
        }
        if password.chars().count() < 6 {
            self.errors
                .insert("password-error", "Senha deve ter pelo menos 6 caracteres");
        }
        if self.errors.is_empty() {
            let name = email.split('@').next().unwrap_or_default().to_string();
            self.user = Some(User { name });
            self.go(Route::Dashboard);
        }
    }

    fn submit_register(&mut self) {
        self.errors.clear();
        let name = self.field("name-input");
        let email = self.field("email-input");
        let phone = self.field("phone-input");
        let password = self.field("password-input");
        let confirm = self.field("confirm-password-input");

        if name.chars().count() < 2 {
            self.errors
                .insert("name-error", "Nome deve ter pelo menos 2 caracteres");
        }
        if !EMAIL.is_match(&email) {
            self.errors.insert("email-error", "Email inválido");
        }
        if phone.chars().count() < 10 {
            self.errors
                .insert("phone-error", "Telefone deve ter pelo menos 10 dígitos");
        }
        if !self.selects.contains_key("department-select") {
            self.errors
                .insert("department-error", "Departamento é obrigatório");
        }
        if password.chars().count() < 6 {
            self.errors
                .insert("password-error", "Senha deve ter pelo menos 6 caracteres");
        }
        if confirm.chars().count() < 6 {
            self.errors.insert(
                "confirm-password-error",
                "Confirmação de senha é obrigatória",
            );
        } else if password != confirm {
            self.errors
                .insert("confirm-password-error", "Senhas não coincidem");
        }
        if !self.checked.contains("accept-terms-checkbox") {
            self.errors
                .insert("accept-terms-error", "Você deve aceitar os termos");
        }
        if self.errors.is_empty() {
            self.user = Some(User { name });
            self.go(Route::Dashboard);
        }
    }

    fn submit_item(&mut self, editing: Option<u32>) {
        let prefix = if editing.is_some() { "edit" } else { "add" };
        let name = self.field(&format!("{}-name-input", prefix));
        let description = self.field(&format!("{}-description-input", prefix));
        let priority = self.selects.get(&format!("{}-priority-select", prefix)).cloned();
        let category = self.selects.get(&format!("{}-category-select", prefix)).cloned();

        self.modal_errors.clear();
        if name.is_empty() {
            self.modal_errors.push("Nome é obrigatório");
        } else if name.chars().count() > 100 {
            self.modal_errors.push("Nome muito longo");
        }
        if description.is_empty() {
            self.modal_errors.push("Descrição é obrigatória");
        } else if description.chars().count() > 500 {
            self.modal_errors.push("Descrição muito longa");
        }
        if priority.is_none() {
            self.modal_errors.push("Prioridade é obrigatória");
        }
        if category.is_none() {
            self.modal_errors.push("Categoria é obrigatória");
        }
        if !self.modal_errors.is_empty() {
            return;
        }

        match editing {
            Some(id) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
                    item.name = name;
                    item.description = description;
                    item.priority = priority;
                    item.category = category;
                }
            }
            None => {
                self.items.push(DemoItem {
                    id: self.next_id,
                    name,
                    description,
                    priority,
                    category,
                    completed: false,
                });
                self.next_id += 1;
            }
        }
        self.items_changed();
        self.close_modals();
    }

    fn matches(&self, node: &Node, locator: &Locator) -> bool {
        match locator {
            Locator::TestId(id) => node.test_id.as_deref() == Some(id.as_str()),
            Locator::Css(selector) => css_matches(node, selector),
            Locator::Text { scope: None, text } => node.text.contains(text.as_str()),
            Locator::Text {
                scope: Some(scope),
                text,
            } => css_matches(node, scope) && node.text.contains(text.as_str()),
            Locator::ButtonText(text) => node.tag == "button" && node.text.contains(text.as_str()),
            Locator::Option(label) => node.role == Some("option") && node.text.contains(label.as_str()),
        }
    }

    fn rect_of(&self, id: &str) -> E2eResult<Rect> {
        let nodes = self.render();
        let index = nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| E2eError::Driver(format!("no such element: {}", id)))?;
        Ok(Rect {
            x: 16.0,
            y: 8.0 + index as f64 * ROW_HEIGHT,
            width: (self.viewport.0 as f64 - 32.0).min(400.0),
            height: ROW_HEIGHT - 4.0,
        })
    }

    fn paint(&self) -> E2eResult<Vec<u8>> {
        let (width, height) = self.viewport;
        let mut img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        for (index, node) in self.render().iter().enumerate() {
            let shade = if node.tag == "button" { 200 } else { 230 };
            let top = 8 + index as u32 * ROW_HEIGHT as u32;
            for y in top..(top + ROW_HEIGHT as u32 - 4).min(height) {
                for x in 16..(16 + 400).min(width) {
                    img.put_pixel(x, y, Rgba([shade, shade, shade, 255]));
                }
            }
        }
        let mut png = Vec::new();
        PngEncoder::new(&mut png).write_image(img.as_raw(), width, height, ColorType::Rgba8)?;
        Ok(png)
    }
}

impl Default for DemoApp {
    fn default() -> Self {
        Self::new(DemoOptions::default())
    }
}

fn initial_items() -> Vec<DemoItem> {
    (1..=3)
        .map(|n| DemoItem {
            id: n,
            name: format!("Item de Exemplo {}", n),
            description: format!(
                "Descrição do {} item",
                ["primeiro", "segundo", "terceiro"][(n - 1) as usize]
            ),
            priority: None,
            category: None,
            completed: n == 2,
        })
        .collect()
}

fn row_text(item: &DemoItem) -> String {
    let priority = match item.priority.as_deref() {
        Some("high") => "Alta",
        Some("medium") => "Média",
        Some("low") => "Baixa",
        _ => "Não definida",
    };
    format!(
        "{} {} {} {}",
        item.name,
        item.description,
        priority,
        item.category.as_deref().unwrap_or("Geral")
    )
}

fn checkbox_state(checked: bool) -> &'static str {
    if checked {
        "checked"
    } else {
        "unchecked"
    }
}

fn select_options(trigger: &str) -> &'static [(&'static str, &'static str)] {
    match trigger {
        "department-select" => &[
            ("ti", "Tecnologia da Informação"),
            ("rh", "Recursos Humanos"),
            ("financeiro", "Financeiro"),
            ("marketing", "Marketing"),
            ("vendas", "Vendas"),
            ("operacoes", "Operações"),
        ],
        "priority-filter" => &[
            ("all", "Todas"),
            ("high", "Alta"),
            ("medium", "Média"),
            ("low", "Baixa"),
        ],
        "add-priority-select" | "edit-priority-select" => {
            &[("low", "Baixa"), ("medium", "Média"), ("high", "Alta")]
        }
        "add-category-select" | "edit-category-select" => &[
            ("geral", "Geral"),
            ("trabalho", "Trabalho"),
            ("pessoal", "Pessoal"),
            ("projeto", "Projeto"),
        ],
        _ => &[],
    }
}

/// The small CSS subset the harness itself writes: tag names,
/// `[data-testid="x"]`, `[data-testid*="x"]`, `[attr]` and comma lists.
fn css_matches(node: &Node, selector: &str) -> bool {
    selector.split(',').map(str::trim).any(|part| {
        if let Some(inner) = part.strip_prefix('[').and_then(|p| p.strip_suffix(']')) {
            if let Some((name, value)) = inner.split_once("*=") {
                let value = value.trim_matches('"');
                return node.get_attr(name).map(|v| v.contains(value)).unwrap_or(false);
            }
            if let Some((name, value)) = inner.split_once('=') {
                let value = value.trim_matches('"');
                return node.get_attr(name).as_deref() == Some(value);
            }
            return node.get_attr(inner).is_some();
        }
        part == node.tag
    })
}

#[async_trait]
impl BrowserDriver for DemoApp {
    async fn navigate(&mut self, url: &str) -> E2eResult<()> {
        if url.starts_with("about:") {
            self.loaded = false;
            return Ok(());
        }
        let relative = match url.strip_prefix(self.options.origin.as_str()) {
            Some(rest) => rest,
            None if url.contains("://") => {
                return Err(E2eError::WebDriver {
                    error: "unknown error".to_string(),
                    message: format!("net::ERR_NAME_NOT_RESOLVED at {}", url),
                })
            }
            None => url,
        };
        let (document, fragment) = relative.split_once('#').unwrap_or((relative, ""));
        let document = if document.is_empty() { "/" } else { document }.to_string();

        if !self.loaded || document != self.document {
            self.load_document(document);
        }
        let route = self.route_for_fragment(fragment);
        self.pending_route = None;
        self.enter(route);
        Ok(())
    }

    async fn current_url(&mut self) -> E2eResult<String> {
        self.observe();
        if !self.loaded {
            return Ok("about:blank".to_string());
        }
        Ok(format!(
            "{}{}#{}",
            self.options.origin,
            self.document,
            self.route.fragment()
        ))
    }

    async fn find_all(&mut self, locator: &Locator) -> E2eResult<Vec<ElementState>> {
        self.observe();
        Ok(self
            .render()
            .into_iter()
            .filter(|n| self.matches(n, locator))
            .map(|n| ElementState {
                id: n.id,
                tag: n.tag.to_string(),
                text: n.text,
                visible: true,
            })
            .collect())
    }

    async fn click(&mut self, element: &str, _force: bool) -> E2eResult<()> {
        self.find_node(element)?;
        self.handle_click(element);
        Ok(())
    }

    async fn clear(&mut self, element: &str) -> E2eResult<()> {
        let node = self.find_node(element)?;
        if node.tag != "input" {
            return Err(E2eError::WebDriver {
                error: "invalid element state".to_string(),
                message: format!("{} is not editable", element),
            });
        }
        self.fields.insert(element.to_string(), String::new());
        Ok(())
    }

    async fn type_text(&mut self, element: &str, text: &str) -> E2eResult<()> {
        let node = self.find_node(element)?;
        if node.tag != "input" {
            return Err(E2eError::WebDriver {
                error: "element not interactable".to_string(),
                message: format!("{} does not accept text", element),
            });
        }
        self.fields
            .entry(element.to_string())
            .or_default()
            .push_str(text);
        Ok(())
    }

    async fn attribute(&mut self, element: &str, name: &str) -> E2eResult<Option<String>> {
        Ok(self.find_node(element)?.get_attr(name))
    }

    async fn element_rect(&mut self, element: &str) -> E2eResult<Rect> {
        self.rect_of(element)
    }

    async fn screenshot_png(&mut self) -> E2eResult<Vec<u8>> {
        self.paint()
    }

    async fn set_viewport(&mut self, width: u32, height: u32) -> E2eResult<()> {
        self.viewport = (width.max(1), height.max(1));
        Ok(())
    }

    async fn clear_storage(&mut self) -> E2eResult<()> {
        self.local_storage.clear();
        Ok(())
    }

    async fn set_local_storage(&mut self, key: &str, value: &str) -> E2eResult<()> {
        if !self.loaded {
            return Err(E2eError::WebDriver {
                error: "javascript error".to_string(),
                message: "localStorage is not available on about:blank".to_string(),
            });
        }
        self.local_storage.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn take_page_errors(&mut self) -> E2eResult<Vec<String>> {
        Ok(std::mem::take(&mut self.page_errors))
    }

    async fn memory_used_bytes(&mut self) -> E2eResult<Option<u64>> {
        Ok(Some(8 * 1024 * 1024 + self.items.len() as u64 * 1024))
    }

    async fn resource_timings(&mut self) -> E2eResult<Vec<ResourceTiming>> {
        Ok(self.options.resource_timings.clone())
    }

    async fn page_load_timing(&mut self) -> E2eResult<Option<PageLoadTiming>> {
        if !self.loaded {
            return Ok(None);
        }
        Ok(Some(PageLoadTiming {
            dom_content_loaded_ms: 120.0,
            load_complete_ms: 250.0,
        }))
    }

    async fn close(&mut self) -> E2eResult<()> {
        self.loaded = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn texts(app: &mut DemoApp, locator: Locator) -> Vec<String> {
        app.find_all(&locator)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.text)
            .collect()
    }

    #[tokio::test]
    async fn root_redirects_to_login_when_signed_out() {
        let mut app = DemoApp::default();
        app.navigate("/").await.unwrap();
        assert_eq!(app.current_url().await.unwrap(), "http://localhost:5173/#/login");

        app.navigate("/#/dashboard").await.unwrap();
        assert!(app.current_url().await.unwrap().ends_with("#/login"));
    }

    #[tokio::test]
    async fn seeded_storage_restores_session_on_load() {
        let mut app = DemoApp::default();
        app.navigate("/#/login").await.unwrap();
        app.set_local_storage("authToken", "fake-jwt-token").await.unwrap();
        app.set_local_storage("user", r#"{"name":"Usuário Teste"}"#)
            .await
            .unwrap();
        // Same document, so no reload and no session yet.
        app.navigate("/#/dashboard").await.unwrap();
        assert!(app.current_url().await.unwrap().ends_with("#/login"));

        app.navigate("about:blank").await.unwrap();
        app.navigate("/#/dashboard").await.unwrap();
        assert!(app.current_url().await.unwrap().ends_with("#/dashboard"));
        assert_eq!(texts(&mut app, Locator::text("Usuário Teste")).await.len(), 1);
    }

    #[tokio::test]
    async fn route_changes_wait_for_render_lag() {
        let mut app = DemoApp::new(DemoOptions {
            render_lag: 2,
            ..Default::default()
        });
        app.navigate("/#/login").await.unwrap();
        app.handle_click("register-link");
        assert!(app.current_url().await.unwrap().ends_with("#/login"));
        assert!(app.current_url().await.unwrap().ends_with("#/login"));
        assert!(app.current_url().await.unwrap().ends_with("#/register"));
    }

    #[tokio::test]
    async fn filter_without_matches_shows_empty_message() {
        let mut app = DemoApp::default();
        app.navigate("/").await.unwrap();
        app.user = Some(User { name: "qa".into() });
        app.navigate("/#/dashboard").await.unwrap();
        app.handle_click("priority-filter");
        app.handle_click("option:priority-filter:high");
        assert_eq!(
            texts(&mut app, Locator::text("Itens (")).await,
            vec!["Itens (0)".to_string()]
        );
        assert!(!texts(&mut app, Locator::text("Nenhum item encontrado")).await.is_empty());
    }

    #[test]
    fn css_subset() {
        let node = Node::tid("input", "password-input", "").attr("data-sensitive", "true");
        assert!(css_matches(&node, "[data-sensitive]"));
        assert!(css_matches(&node, "[data-testid*=\"password\"]"));
        assert!(css_matches(&node, "button, input"));
        assert!(!css_matches(&node, "[data-testid=\"email-input\"]"));
    }

    #[tokio::test]
    async fn screenshot_is_png_of_viewport() {
        let mut app = DemoApp::default();
        app.navigate("/").await.unwrap();
        app.set_viewport(320, 200).await.unwrap();
        let png = app.screenshot_png().await.unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (320, 200));
    }
}
