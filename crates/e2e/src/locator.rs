//! Selector strategies

use std::fmt;

/// How an element is found on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// `[data-testid="..."]`
    TestId(String),
    /// Raw CSS selector.
    Css(String),
    /// Any element whose text contains `text`. With a `scope` (a test id
    /// selector or a tag name) only that element's own text is matched.
    Text { scope: Option<String>, text: String },
    /// A `<button>` whose text contains the given label.
    ButtonText(String),
    /// A listbox option with the given label.
    Option(String),
}

/// W3C WebDriver location strategy and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    pub using: &'static str,
    pub value: String,
}

impl Locator {
    pub fn test_id(id: impl Into<String>) -> Self {
        Locator::TestId(id.into())
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Locator::Text {
            scope: None,
            text: text.into(),
        }
    }

    pub fn text_in(scope: impl Into<String>, text: impl Into<String>) -> Self {
        Locator::Text {
            scope: Some(scope.into()),
            text: text.into(),
        }
    }

    pub fn button(text: impl Into<String>) -> Self {
        Locator::ButtonText(text.into())
    }

    pub fn option(label: impl Into<String>) -> Self {
        Locator::Option(label.into())
    }

    /// Strategy for the WebDriver `/elements` endpoint.
    pub fn strategy(&self) -> Strategy {
        match self {
            Locator::TestId(id) => Strategy {
                using: "css selector",
                value: format!("[data-testid=\"{}\"]", id),
            },
            Locator::Css(selector) => Strategy {
                using: "css selector",
                value: selector.clone(),
            },
            Locator::Text { scope: None, text } => Strategy {
                using: "xpath",
                value: format!(
                    "//body//*[contains(normalize-space(.), {})][not(*[contains(normalize-space(.), {})])]",
                    xpath_literal(text),
                    xpath_literal(text)
                ),
            },
            Locator::Text {
                scope: Some(scope),
                text,
            } => Strategy {
                using: "xpath",
                value: format!(
                    "{}[contains(normalize-space(.), {})]",
                    scope_to_xpath(scope),
                    xpath_literal(text)
                ),
            },
            Locator::ButtonText(text) => Strategy {
                using: "xpath",
                value: format!("//button[contains(normalize-space(.), {})]", xpath_literal(text)),
            },
            Locator::Option(label) => Strategy {
                using: "xpath",
                value: format!(
                    "//*[@role='option'][contains(normalize-space(.), {})]",
                    xpath_literal(label)
                ),
            },
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::TestId(id) => write!(f, "[data-testid=\"{}\"]", id),
            Locator::Css(selector) => write!(f, "{}", selector),
            Locator::Text { scope: None, text } => write!(f, "text \"{}\"", text),
            Locator::Text {
                scope: Some(scope),
                text,
            } => write!(f, "{} text \"{}\"", scope, text),
            Locator::ButtonText(text) => write!(f, "button \"{}\"", text),
            Locator::Option(label) => write!(f, "option \"{}\"", label),
        }
    }
}

/// Quote a string as an XPath 1.0 literal. Strings holding both quote kinds
/// are split with `concat()`.
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{}'", s)
    } else if !s.contains('"') {
        format!("\"{}\"", s)
    } else {
        let parts: Vec<String> = s.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

// Scopes are written as test ids or plain tag names.
fn scope_to_xpath(scope: &str) -> String {
    match scope
        .strip_prefix("[data-testid=\"")
        .and_then(|rest| rest.strip_suffix("\"]"))
    {
        Some(id) => format!("//*[@data-testid={}]", xpath_literal(id)),
        None => format!("//{}", scope),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_maps_to_css() {
        let s = Locator::test_id("logout-button").strategy();
        assert_eq!(s.using, "css selector");
        assert_eq!(s.value, "[data-testid=\"logout-button\"]");
    }

    #[test]
    fn xpath_literal_handles_both_quotes() {
        assert_eq!(xpath_literal("Sair"), "'Sair'");
        assert_eq!(xpath_literal("it's"), "\"it's\"");
        assert_eq!(xpath_literal("a'b\"c"), "concat('a', \"'\", 'b\"c')");
    }

    #[test]
    fn scoped_text_uses_scope() {
        let s = Locator::text_in("[data-testid=\"items-table\"]", "Item").strategy();
        assert!(s.value.starts_with("//*[@data-testid='items-table'][contains"));
        let s = Locator::text_in("h1", "Dashboard").strategy();
        assert_eq!(s.value, "//h1[contains(normalize-space(.), 'Dashboard')]");
    }
}
