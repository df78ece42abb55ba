//! Browser driver seam.
//!
//! Every tool and the step callback go through [`BrowserDriver`], so the
//! session handle is injected explicitly instead of living in a global, and
//! tests can substitute a scripted driver.

use async_trait::async_trait;
use eoka::{Browser, Page, StealthConfig};

use crate::Result;

/// Tall portrait viewport so each screenshot captures more of the page.
pub const VIEWPORT_WIDTH: u32 = 1000;
pub const VIEWPORT_HEIGHT: u32 = 1350;

/// Scroll destinations understood by the `scroll` tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTarget {
    Up,
    Down,
    Top,
    Bottom,
}

/// The browser operations the agent needs, one level above raw CDP.
///
/// Text-match indices are zero-based here; the tool layer translates from
/// the model's 1-based occurrence numbers.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Count elements whose direct text content contains `text`.
    async fn text_match_count(&self, text: &str) -> Result<usize>;

    /// Scroll the `index`-th text match into view.
    async fn focus_text_match(&self, text: &str, index: usize) -> Result<()>;

    /// Go back one entry in browser history.
    async fn back(&self) -> Result<()>;

    /// Press a keyboard key (e.g. "Escape", "Enter").
    async fn press_key(&self, key: &str) -> Result<()>;

    /// Capture the current page as PNG bytes.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// The page's current address.
    async fn current_url(&self) -> Result<String>;

    /// Navigate to a URL.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Click the first clickable element whose text contains `text`.
    /// Returns `false` if nothing matched.
    async fn click_text(&self, text: &str) -> Result<bool>;

    /// Scroll the page.
    async fn scroll(&self, target: ScrollTarget) -> Result<()>;

    /// Fixed delay in milliseconds.
    async fn wait(&self, ms: u64);
}

const MATCH_COUNT_JS: &str = r#"(() => {
    const needle = __NEEDLE__;
    let count = 0;
    const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_ELEMENT, null);
    while (walker.nextNode()) {
        const el = walker.currentNode;
        for (const node of el.childNodes) {
            if (node.nodeType === Node.TEXT_NODE && node.textContent.includes(needle)) {
                count++;
                break;
            }
        }
    }
    return String(count);
})()"#;

const FOCUS_MATCH_JS: &str = r#"(() => {
    const needle = __NEEDLE__;
    const target = __INDEX__;
    let seen = 0;
    const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_ELEMENT, null);
    while (walker.nextNode()) {
        const el = walker.currentNode;
        for (const node of el.childNodes) {
            if (node.nodeType === Node.TEXT_NODE && node.textContent.includes(needle)) {
                if (seen === target) {
                    el.scrollIntoView(true);
                    return true;
                }
                seen++;
                break;
            }
        }
    }
    return false;
})()"#;

/// Find a clickable element by text content and return a CSS selector for it.
const CLICKABLE_BY_TEXT_JS: &str = r#"(() => {
    const text = __NEEDLE__.toLowerCase();
    const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_ELEMENT, null);
    while (walker.nextNode()) {
        const el = walker.currentNode;
        if (!el.matches('a, button, input, select, [role="button"], [onclick]')) continue;
        if (!(el.textContent || '').trim().toLowerCase().includes(text)) continue;
        if (el.id) return '#' + CSS.escape(el.id);
        const path = [];
        let node = el;
        while (node && node !== document.body) {
            let selector = node.tagName.toLowerCase();
            if (node.id) {
                path.unshift('#' + CSS.escape(node.id));
                break;
            }
            const siblings = Array.from(node.parentNode?.children || []);
            if (siblings.length > 1) {
                selector += ':nth-child(' + (siblings.indexOf(node) + 1) + ')';
            }
            path.unshift(selector);
            node = node.parentNode;
        }
        return path.join(' > ');
    }
    return '';
})()"#;

/// Production driver backed by an eoka [`Page`].
pub struct EokaDriver {
    page: Page,
}

impl EokaDriver {
    /// Wrap an existing page.
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Launch a browser with the agent viewport and open a blank page.
    /// The [`Browser`] is returned alongside so the caller can close it.
    pub async fn launch(headless: bool) -> Result<(Browser, Self)> {
        let stealth = StealthConfig {
            headless,
            viewport_width: VIEWPORT_WIDTH,
            viewport_height: VIEWPORT_HEIGHT,
            ..Default::default()
        };
        let browser = Browser::launch_with_config(stealth).await?;
        let page = browser.new_page("about:blank").await?;
        Ok((browser, Self::new(page)))
    }

    /// The underlying page, for callers that need raw access.
    pub fn page(&self) -> &Page {
        &self.page
    }

    fn needle_js(template: &str, text: &str) -> String {
        // serde_json gives us a correctly quoted JS string literal
        template.replace("__NEEDLE__", &serde_json::to_string(text).unwrap_or_default())
    }
}

#[async_trait]
impl BrowserDriver for EokaDriver {
    async fn text_match_count(&self, text: &str) -> Result<usize> {
        let js = Self::needle_js(MATCH_COUNT_JS, text);
        let raw: String = self.page.evaluate(&js).await?;
        raw.parse().map_err(|_| {
            eoka::Error::CdpSimple(format!("match count parse error: {raw:?}")).into()
        })
    }

    async fn focus_text_match(&self, text: &str, index: usize) -> Result<()> {
        let js = Self::needle_js(FOCUS_MATCH_JS, text).replace("__INDEX__", &index.to_string());
        let focused: bool = self.page.evaluate(&js).await?;
        if !focused {
            return Err(eoka::Error::ElementNotFound(format!(
                "text match [{index}] for \"{text}\""
            ))
            .into());
        }
        Ok(())
    }

    async fn back(&self) -> Result<()> {
        self.page.back().await?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.page.human().press_key(key).await?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(self.page.screenshot().await?)
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.page.url().await?)
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.page.goto(url).await?;
        Ok(())
    }

    async fn click_text(&self, text: &str) -> Result<bool> {
        let js = Self::needle_js(CLICKABLE_BY_TEXT_JS, text);
        let selector: String = self.page.evaluate(&js).await?;
        if selector.is_empty() {
            return Ok(false);
        }
        self.page.click(&selector).await?;
        Ok(true)
    }

    async fn scroll(&self, target: ScrollTarget) -> Result<()> {
        let js = match target {
            ScrollTarget::Up => "window.scrollBy(0, -window.innerHeight * 0.8)",
            ScrollTarget::Down => "window.scrollBy(0, window.innerHeight * 0.8)",
            ScrollTarget::Top => "window.scrollTo(0, 0)",
            ScrollTarget::Bottom => "window.scrollTo(0, document.body.scrollHeight)",
        };
        self.page.execute(js).await?;
        Ok(())
    }

    async fn wait(&self, ms: u64) {
        self.page.wait(ms).await;
    }
}
