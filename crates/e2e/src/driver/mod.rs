//! Browser driver abstraction
//!
//! [`BrowserDriver`] is the only seam between the harness and a browser. The
//! interaction primitives are its sole caller; pages and commands never see
//! it. Two backends ship with the crate:
//!
//! - [`WebDriverSession`]: a W3C WebDriver session (chromedriver/geckodriver)
//! - [`DemoApp`]: an in-process simulation of the application's DOM contract,
//!   used for offline self-checks and the harness's own tests

pub mod demo;
pub mod webdriver;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;
use crate::locator::Locator;

pub use demo::{DemoApp, DemoOptions, LogoutControl};
pub use webdriver::{WebDriverConfig, WebDriverSession};

/// Snapshot of a located element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementState {
    /// Backend handle, valid until the next navigation.
    pub id: String,
    pub tag: String,
    pub text: String,
    pub visible: bool,
}

/// Element bounds in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One entry of the page's resource timing buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceTiming {
    pub name: String,
    pub duration_ms: f64,
}

/// Navigation timing of the current document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageLoadTiming {
    pub dom_content_loaded_ms: f64,
    pub load_complete_ms: f64,
}

/// Supported browsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chrome,
    Firefox,
}

impl FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chrome" | "chromium" | "electron" => Ok(Browser::Chrome),
            "firefox" => Ok(Browser::Firefox),
            other => Err(format!("unsupported browser: {}", other)),
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Browser::Chrome => write!(f, "chrome"),
            Browser::Firefox => write!(f, "firefox"),
        }
    }
}

/// Browser backend.
///
/// Element ids returned by [`find_all`](BrowserDriver::find_all) are only
/// valid until the next navigation.
#[async_trait]
pub trait BrowserDriver: Send {
    /// Load a URL. Paths without a scheme are resolved against the current
    /// origin.
    async fn navigate(&mut self, url: &str) -> E2eResult<()>;

    async fn current_url(&mut self) -> E2eResult<String>;

    /// All elements matching the locator, visible or not.
    async fn find_all(&mut self, locator: &Locator) -> E2eResult<Vec<ElementState>>;

    /// Click an element. `force` skips actionability checks.
    async fn click(&mut self, element: &str, force: bool) -> E2eResult<()>;

    async fn clear(&mut self, element: &str) -> E2eResult<()>;

    async fn type_text(&mut self, element: &str, text: &str) -> E2eResult<()>;

    async fn attribute(&mut self, element: &str, name: &str) -> E2eResult<Option<String>>;

    async fn element_rect(&mut self, element: &str) -> E2eResult<Rect>;

    /// PNG of the current viewport.
    async fn screenshot_png(&mut self) -> E2eResult<Vec<u8>>;

    async fn set_viewport(&mut self, width: u32, height: u32) -> E2eResult<()>;

    /// Clear local storage, session storage and cookies.
    async fn clear_storage(&mut self) -> E2eResult<()>;

    async fn set_local_storage(&mut self, key: &str, value: &str) -> E2eResult<()>;

    /// Uncaught page exceptions since the last call.
    async fn take_page_errors(&mut self) -> E2eResult<Vec<String>>;

    /// JS heap usage, when the browser exposes it.
    async fn memory_used_bytes(&mut self) -> E2eResult<Option<u64>>;

    async fn resource_timings(&mut self) -> E2eResult<Vec<ResourceTiming>>;

    async fn page_load_timing(&mut self) -> E2eResult<Option<PageLoadTiming>>;

    async fn close(&mut self) -> E2eResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_names_parse() {
        assert_eq!("Chromium".parse::<Browser>(), Ok(Browser::Chrome));
        assert_eq!("firefox".parse::<Browser>(), Ok(Browser::Firefox));
        assert!("webkit".parse::<Browser>().is_err());
    }
}
