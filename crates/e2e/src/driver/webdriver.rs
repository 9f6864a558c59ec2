//! W3C WebDriver backend over plain HTTP

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{Browser, BrowserDriver, ElementState, PageLoadTiming, Rect, ResourceTiming};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

/// Key of a web element reference in the W3C protocol.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const INSTALL_ERROR_HOOK: &str = r#"
if (!window.__e2eHooked) {
  window.__e2eHooked = true;
  window.__e2eErrors = [];
  window.addEventListener('error', function (e) { window.__e2eErrors.push(String(e.message)); });
  window.addEventListener('unhandledrejection', function (e) {
    var r = e.reason;
    window.__e2eErrors.push(r && r.message ? String(r.message) : String(r));
  });
}
"#;

const TAKE_ERRORS: &str =
    "var e = window.__e2eErrors || []; window.__e2eErrors = []; return e;";

const MEMORY: &str =
    "return (performance.memory && performance.memory.usedJSHeapSize) || null;";

const RESOURCES: &str = r#"
return performance.getEntriesByType('resource').map(function (r) {
  return { name: r.name, duration_ms: r.duration };
});
"#;

const NAVIGATION: &str = r#"
var t = performance.timing;
if (!t || !t.navigationStart) { return null; }
return {
  dom_content_loaded_ms: Math.max(0, t.domContentLoadedEventEnd - t.navigationStart),
  load_complete_ms: Math.max(0, t.loadEventEnd - t.navigationStart)
};
"#;

/// Settings for a WebDriver session.
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    /// Remote end, e.g. `http://localhost:9515` for chromedriver.
    pub url: String,
    pub browser: Browser,
    pub headless: bool,
    pub viewport: (u32, u32),
    /// Third-party hosts to block (analytics, fonts).
    pub blocked_hosts: Vec<String>,
    /// Origin used to resolve relative navigation targets.
    pub base_url: Option<String>,
    pub request_timeout: Duration,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9515".to_string(),
            browser: Browser::Chrome,
            headless: true,
            viewport: (1280, 720),
            blocked_hosts: Vec::new(),
            base_url: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// An open WebDriver session.
pub struct WebDriverSession {
    client: reqwest::Client,
    endpoint: String,
    base_url: Option<String>,
    closed: bool,
}

impl WebDriverSession {
    /// Open a new browser session.
    pub async fn connect(config: WebDriverConfig) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        info!(url = %config.url, browser = %config.browser, headless = config.headless, "Opening WebDriver session");

        let response = client
            .post(format!("{}/session", config.url.trim_end_matches('/')))
            .json(&json!({ "capabilities": { "alwaysMatch": capabilities(&config) } }))
            .send()
            .await?;
        let value = unwrap_response(response).await?;

        let session_id = value["sessionId"]
            .as_str()
            .ok_or_else(|| E2eError::Driver("new session response has no sessionId".into()))?;

        debug!("WebDriver session {}", session_id);

        let mut session = Self {
            client,
            endpoint: format!("{}/session/{}", config.url.trim_end_matches('/'), session_id),
            base_url: config.base_url.clone(),
            closed: false,
        };
        session
            .set_viewport(config.viewport.0, config.viewport.1)
            .await?;
        Ok(session)
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> E2eResult<Value> {
        let url = format!("{}{}", self.endpoint, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        unwrap_response(request.send().await?).await
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> E2eResult<Value> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    async fn element_state(&self, id: String) -> E2eResult<ElementState> {
        let displayed = self
            .command(Method::GET, &format!("/element/{}/displayed", id), None)
            .await?;
        let text = self
            .command(Method::GET, &format!("/element/{}/text", id), None)
            .await?;
        let tag = self
            .command(Method::GET, &format!("/element/{}/name", id), None)
            .await?;
        Ok(ElementState {
            tag: tag.as_str().unwrap_or_default().to_lowercase(),
            text: text.as_str().unwrap_or_default().trim().to_string(),
            visible: displayed.as_bool().unwrap_or(false),
            id,
        })
    }

    fn resolve_url(&self, url: &str) -> String {
        if url.contains("://") || url.starts_with("about:") {
            return url.to_string();
        }
        match &self.base_url {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), url),
            None => url.to_string(),
        }
    }
}

fn element_ref(id: &str) -> Value {
    json!({ ELEMENT_KEY: id })
}

fn capabilities(config: &WebDriverConfig) -> Value {
    let (width, height) = config.viewport;
    match config.browser {
        Browser::Chrome => {
            let mut args = vec![
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
                format!("--window-size={},{}", width, height),
            ];
            if config.headless {
                args.push("--headless=new".to_string());
                args.push("--disable-gpu".to_string());
            }
            if !config.blocked_hosts.is_empty() {
                let rules: Vec<String> = config
                    .blocked_hosts
                    .iter()
                    .map(|h| format!("MAP {} ~NOTFOUND", h))
                    .collect();
                args.push(format!("--host-resolver-rules={}", rules.join(", ")));
            }
            json!({ "browserName": "chrome", "goog:chromeOptions": { "args": args } })
        }
        Browser::Firefox => {
            let mut args = vec![format!("--width={}", width), format!("--height={}", height)];
            if config.headless {
                args.push("--headless".to_string());
            }
            if !config.blocked_hosts.is_empty() {
                warn!("Host blocking is only applied for chrome sessions");
            }
            json!({ "browserName": "firefox", "moz:firefoxOptions": { "args": args } })
        }
    }
}

async fn unwrap_response(response: reqwest::Response) -> E2eResult<Value> {
    let status = response.status();
    let mut body: Value = response.json().await?;
    let value = body["value"].take();
    if status.is_success() {
        return Ok(value);
    }
    Err(E2eError::WebDriver {
        error: value["error"].as_str().unwrap_or("unknown error").to_string(),
        message: value["message"].as_str().unwrap_or_default().to_string(),
    })
}

#[async_trait]
impl BrowserDriver for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> E2eResult<()> {
        let url = self.resolve_url(url);
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        if !url.starts_with("about:") {
            self.execute(INSTALL_ERROR_HOOK, vec![]).await?;
        }
        Ok(())
    }

    async fn current_url(&mut self) -> E2eResult<String> {
        let value = self.command(Method::GET, "/url", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn find_all(&mut self, locator: &Locator) -> E2eResult<Vec<ElementState>> {
        let strategy = locator.strategy();
        let value = self
            .command(
                Method::POST,
                "/elements",
                Some(json!({ "using": strategy.using, "value": strategy.value })),
            )
            .await?;

        let ids: Vec<String> = value
            .as_array()
            .map(|refs| {
                refs.iter()
                    .filter_map(|r| r[ELEMENT_KEY].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let mut elements = Vec::with_capacity(ids.len());
        for id in ids {
            match self.element_state(id).await {
                Ok(state) => elements.push(state),
                // The DOM can re-render between the query and the probe.
                Err(E2eError::WebDriver { error, .. }) if error == "stale element reference" => {}
                Err(e) => return Err(e),
            }
        }
        Ok(elements)
    }

    async fn click(&mut self, element: &str, force: bool) -> E2eResult<()> {
        if force {
            self.execute("arguments[0].click();", vec![element_ref(element)])
                .await?;
        } else {
            self.command(Method::POST, &format!("/element/{}/click", element), Some(json!({})))
                .await?;
        }
        Ok(())
    }

    async fn clear(&mut self, element: &str) -> E2eResult<()> {
        self.command(Method::POST, &format!("/element/{}/clear", element), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn type_text(&mut self, element: &str, text: &str) -> E2eResult<()> {
        self.command(
            Method::POST,
            &format!("/element/{}/value", element),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn attribute(&mut self, element: &str, name: &str) -> E2eResult<Option<String>> {
        let value = self
            .command(
                Method::GET,
                &format!("/element/{}/attribute/{}", element, name),
                None,
            )
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn element_rect(&mut self, element: &str) -> E2eResult<Rect> {
        let value = self
            .command(Method::GET, &format!("/element/{}/rect", element), None)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn screenshot_png(&mut self) -> E2eResult<Vec<u8>> {
        let value = self.command(Method::GET, "/screenshot", None).await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| E2eError::Driver("screenshot response is not a string".into()))?;
        Ok(base64::engine::general_purpose::STANDARD.decode(encoded)?)
    }

    async fn set_viewport(&mut self, width: u32, height: u32) -> E2eResult<()> {
        self.command(
            Method::POST,
            "/window/rect",
            Some(json!({ "width": width, "height": height })),
        )
        .await?;
        Ok(())
    }

    async fn clear_storage(&mut self) -> E2eResult<()> {
        self.command(Method::DELETE, "/cookie", None).await?;
        // Storage is per origin; about:blank has none to clear.
        let url = self.current_url().await?;
        if url.starts_with("http") {
            self.execute(
                "try { localStorage.clear(); sessionStorage.clear(); } catch (e) {}",
                vec![],
            )
            .await?;
        }
        Ok(())
    }

    async fn set_local_storage(&mut self, key: &str, value: &str) -> E2eResult<()> {
        self.execute(
            "localStorage.setItem(arguments[0], arguments[1]);",
            vec![json!(key), json!(value)],
        )
        .await?;
        Ok(())
    }

    async fn take_page_errors(&mut self) -> E2eResult<Vec<String>> {
        let value = self.execute(TAKE_ERRORS, vec![]).await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    async fn memory_used_bytes(&mut self) -> E2eResult<Option<u64>> {
        let value = self.execute(MEMORY, vec![]).await?;
        Ok(value.as_u64())
    }

    async fn resource_timings(&mut self) -> E2eResult<Vec<ResourceTiming>> {
        let value = self.execute(RESOURCES, vec![]).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn page_load_timing(&mut self) -> E2eResult<Option<PageLoadTiming>> {
        let value = self.execute(NAVIGATION, vec![]).await?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    async fn close(&mut self) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }
        self.command(Method::DELETE, "", None).await?;
        self.closed = true;
        info!("WebDriver session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_capabilities_block_hosts() {
        let config = WebDriverConfig {
            blocked_hosts: vec!["www.google-analytics.com".into(), "fonts.googleapis.com".into()],
            ..Default::default()
        };
        let caps = capabilities(&config);
        let args: Vec<String> = serde_json::from_value(caps["goog:chromeOptions"]["args"].clone()).unwrap();
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.iter().any(|a| a
            == "--host-resolver-rules=MAP www.google-analytics.com ~NOTFOUND, MAP fonts.googleapis.com ~NOTFOUND"));
    }

    #[test]
    fn firefox_capabilities_carry_viewport() {
        let config = WebDriverConfig {
            browser: Browser::Firefox,
            headless: false,
            viewport: (1920, 1080),
            ..Default::default()
        };
        let caps = capabilities(&config);
        assert_eq!(caps["browserName"], "firefox");
        assert_eq!(caps["moz:firefoxOptions"]["args"][0], "--width=1920");
    }
}
