use crate::core::config::BrowserConfig;
use crate::core::DriverTrait;
use crate::errors::{AutomationError, Result};
use crate::types::{ElementInfo, Locator};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// [`DriverTrait`] over a single headless_chrome tab.
pub struct ChromeDriver {
    // keeps the browser process alive for as long as the tab is in use
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeDriver {
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let window_size_arg = format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        );
        let user_agent_arg = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
        ];
        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }
        if config.disable_images {
            args.push(OsStr::new("--blink-settings=imagesEnabled=false"));
        }
        for arg in &config.args {
            args.push(OsStr::new(arg));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .args(args)
            .build()
            .map_err(|e| AutomationError::LaunchFailed(e.to_string()))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| AutomationError::LaunchFailed(e.to_string()))?;
        let tab = browser.new_tab()?;
        tab.set_default_timeout(Duration::from_millis(config.timeout_ms));

        info!(headless = config.headless, "Chrome launched");
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    fn element(&self, locator: &Locator) -> Result<Element<'_>> {
        let found = match locator {
            Locator::Css(css) => self.tab.find_element(css),
            Locator::Id(id) => self.tab.find_element(&format!("#{}", id)),
            Locator::XPath(xpath) => self.tab.find_element_by_xpath(xpath),
        };
        found.map_err(|e| {
            debug!(%locator, error = %e, "Element lookup failed");
            AutomationError::ElementNotFound(locator.to_string())
        })
    }

    /// Run a function body against the located element, returning its JSON result.
    async fn eval_on(&self, locator: &Locator, body: &str) -> Result<Value> {
        let script = format!(
            r#"(function() {{
                const el = {};
                if (!el) return JSON.stringify({{ missing: true }});
                return JSON.stringify({{ value: (function() {{ {} }}).call(el) }});
            }})()"#,
            resolve_expression(locator),
            body
        );
        let raw = self.execute_script(&script).await?;
        let payload: Value = match raw.as_str() {
            Some(text) => serde_json::from_str(text)?,
            None => {
                return Err(AutomationError::JavaScriptFailed(format!(
                    "unexpected response for {}",
                    locator
                )))
            }
        };
        if payload.get("missing").and_then(Value::as_bool) == Some(true) {
            return Err(AutomationError::ElementNotFound(locator.to_string()));
        }
        Ok(payload.get("value").cloned().unwrap_or(Value::Null))
    }
}

/// JavaScript expression evaluating to the element or `null`.
fn resolve_expression(locator: &Locator) -> String {
    let quote = |s: &str| serde_json::to_string(s).unwrap_or_else(|_| "''".to_string());
    match locator {
        Locator::Css(css) => format!("document.querySelector({})", quote(css)),
        Locator::Id(id) => format!("document.getElementById({})", quote(id)),
        Locator::XPath(xpath) => format!(
            "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            quote(xpath)
        ),
    }
}

/// Map a raw Chrome failure on an interaction onto the failure taxonomy.
fn classify_interaction_error(locator: &Locator, err: impl std::fmt::Display) -> AutomationError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    let context = format!("{}: {}", locator, message);
    if lower.contains("no node") || lower.contains("detached") || lower.contains("stale") {
        AutomationError::StaleElement(context)
    } else if lower.contains("box model")
        || lower.contains("not visible")
        || lower.contains("intercept")
        || lower.contains("not interactable")
    {
        AutomationError::NotInteractable(context)
    } else {
        AutomationError::ChromeError(context)
    }
}

const ELEMENT_INFO_BODY: &str = r#"
    const rect = this.getBoundingClientRect();
    const attributes = {};
    for (const attr of this.attributes) { attributes[attr.name] = attr.value; }
    return {
        tag_name: this.tagName.toLowerCase(),
        element_id: this.id || null,
        class_name: (typeof this.className === 'string' && this.className) || null,
        text_content: (this.innerText || this.textContent || '').trim() || null,
        attributes: attributes,
        rect: { x: rect.x, y: rect.y, width: rect.width, height: rect.height }
    };
"#;

#[async_trait]
impl DriverTrait for ChromeDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| AutomationError::NavigationFailed(e.to_string()))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| AutomationError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    async fn find_element(&self, locator: &Locator) -> Result<ElementInfo> {
        let value = self.eval_on(locator, ELEMENT_INFO_BODY).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementInfo>> {
        let collect = match locator {
            Locator::XPath(xpath) => format!(
                r#"(function() {{
                    const snap = document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
                    const out = [];
                    for (let i = 0; i < snap.snapshotLength; i++) out.push(snap.snapshotItem(i));
                    return out;
                }})()"#,
                serde_json::to_string(xpath)?
            ),
            other => format!(
                "Array.from(document.querySelectorAll({}))",
                serde_json::to_string(&other.as_css().unwrap_or_default())?
            ),
        };
        let script = format!(
            r#"JSON.stringify({}.map(function(el) {{ return (function() {{ {} }}).call(el); }}))"#,
            collect, ELEMENT_INFO_BODY
        );
        let raw = self.execute_script(&script).await?;
        match raw.as_str() {
            Some(text) => Ok(serde_json::from_str(text)?),
            None => Ok(Vec::new()),
        }
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        self.element(locator)?
            .click()
            .map_err(|e| classify_interaction_error(locator, e))?;
        Ok(())
    }

    async fn click_via_script(&self, locator: &Locator) -> Result<()> {
        self.eval_on(locator, "this.click(); return true;").await?;
        Ok(())
    }

    async fn clear(&self, locator: &Locator) -> Result<()> {
        self.eval_on(
            locator,
            "this.value = ''; this.dispatchEvent(new Event('input', { bubbles: true })); return true;",
        )
        .await?;
        Ok(())
    }

    async fn type_text(&self, locator: &Locator, text: &str) -> Result<()> {
        let element = self.element(locator)?;
        element
            .click()
            .map_err(|e| classify_interaction_error(locator, e))?;
        element
            .type_into(text)
            .map_err(|e| classify_interaction_error(locator, e))?;
        Ok(())
    }

    async fn text(&self, locator: &Locator) -> Result<String> {
        let value = self
            .eval_on(locator, "return (this.innerText || this.textContent || '').trim();")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        let body = format!("return this.getAttribute({});", serde_json::to_string(name)?);
        let value = self.eval_on(locator, &body).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn is_displayed(&self, locator: &Locator) -> Result<bool> {
        let value = self
            .eval_on(
                locator,
                r#"const style = window.getComputedStyle(this);
                   const rect = this.getBoundingClientRect();
                   return style.display !== 'none' && style.visibility !== 'hidden'
                       && rect.width > 0 && rect.height > 0;"#,
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_enabled(&self, locator: &Locator) -> Result<bool> {
        let value = self
            .eval_on(locator, "return !this.disabled && this.getAttribute('aria-disabled') !== 'true';")
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn execute_script(&self, script: &str) -> Result<Value> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| AutomationError::JavaScriptFailed(e.to_string()))?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    async fn title(&self) -> Result<String> {
        let result = self.execute_script("document.title").await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    async fn take_screenshot(&self) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| AutomationError::ScreenshotFailed(e.to_string()))
    }
}
