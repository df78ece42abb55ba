//! Browser tools exposed to the model.
//!
//! Each tool takes simple arguments, performs one browser action through the
//! injected driver, and returns a human-readable status string the agent
//! loop records as the step's observation.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::driver::{BrowserDriver, ScrollTarget};
use crate::{Error, Result};

/// Delay after navigation so the page has content before the next step.
const NAV_SETTLE_MS: u64 = 1500;
/// Delay after a click so handlers have fired before the screenshot.
const CLICK_SETTLE_MS: u64 = 300;

/// The tool surface, bound to a browser driver.
pub struct Tools<D: BrowserDriver> {
    driver: Arc<D>,
}

impl<D: BrowserDriver> Tools<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self { driver }
    }

    /// Search the page for `text`, like Ctrl+F, and scroll the
    /// `nth_result`-th occurrence (1-based) into view.
    pub async fn search_item_ctrl_f(&self, text: &str, nth_result: usize) -> Result<String> {
        let count = self.driver.text_match_count(text).await?;
        if nth_result == 0 || nth_result > count {
            return Err(Error::MatchNotFound {
                requested: nth_result,
                found: count,
            });
        }
        self.driver.focus_text_match(text, nth_result - 1).await?;
        Ok(format!(
            "Found {count} matches for '{text}'. Focused on element {nth_result} of {count}"
        ))
    }

    /// Go back to the previous page.
    pub async fn go_back(&self) -> Result<String> {
        self.driver.back().await?;
        Ok("Navigated back.".into())
    }

    /// Press Escape to dismiss a modal or pop-up. Has no effect on cookie
    /// consent banners.
    pub async fn close_popups(&self) -> Result<String> {
        self.driver.press_key("Escape").await?;
        Ok("Pressed Escape.".into())
    }

    /// Open a URL and report where we landed.
    pub async fn navigate(&self, url: &str) -> Result<String> {
        self.driver.goto(url).await?;
        self.driver.wait(NAV_SETTLE_MS).await;
        let landed = self.driver.current_url().await?;
        Ok(format!("Navigated to: {landed}"))
    }

    /// Click the first clickable element whose visible text contains `text`.
    pub async fn click(&self, text: &str) -> Result<String> {
        if !self.driver.click_text(text).await? {
            return Err(Error::Tool(format!(
                "no clickable element containing \"{text}\""
            )));
        }
        self.driver.wait(CLICK_SETTLE_MS).await;
        Ok(format!("Clicked \"{text}\""))
    }

    /// Scroll the page: up, down, top, or bottom.
    pub async fn scroll(&self, target: &str) -> Result<String> {
        let dest = match target {
            "up" => ScrollTarget::Up,
            "down" => ScrollTarget::Down,
            "top" => ScrollTarget::Top,
            "bottom" => ScrollTarget::Bottom,
            other => {
                return Err(Error::Tool(format!(
                    "scroll target must be up/down/top/bottom, got \"{other}\""
                )))
            }
        };
        self.driver.scroll(dest).await?;
        Ok(format!("Scrolled {target}"))
    }

    /// Dispatch a model tool call by name. `done` is handled by the agent
    /// loop and never reaches this function.
    pub async fn execute(&self, name: &str, input: &Value) -> Result<String> {
        match name {
            "search_item_ctrl_f" => {
                let text = input["text"].as_str().unwrap_or("");
                let nth = input["nth_result"].as_u64().unwrap_or(1) as usize;
                self.search_item_ctrl_f(text, nth).await
            }
            "go_back" => self.go_back().await,
            "close_popups" => self.close_popups().await,
            "navigate" => self.navigate(input["url"].as_str().unwrap_or("about:blank")).await,
            "click" => self.click(input["text"].as_str().unwrap_or("")).await,
            "scroll" => self.scroll(input["target"].as_str().unwrap_or("down")).await,
            other => Err(Error::Tool(format!("Unknown tool: {other}"))),
        }
    }
}

/// Tool schemas in OpenAI function format, sent with every model call.
pub fn tool_definitions() -> Value {
    json!([
        {
            "type": "function",
            "function": {
                "name": "navigate",
                "description": "Open a URL in the browser.",
                "parameters": {
                    "type": "object",
                    "properties": { "url": { "type": "string", "description": "URL to open" } },
                    "required": ["url"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "search_item_ctrl_f",
                "description": "Searches for text on the current page, like Ctrl+F, and scrolls to the nth occurrence.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "text": { "type": "string", "description": "The text to search for" },
                        "nth_result": { "type": "integer", "description": "Which occurrence to jump to (default: 1)" }
                    },
                    "required": ["text"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "click",
                "description": "Click the first link or button whose visible text contains the given text.",
                "parameters": {
                    "type": "object",
                    "properties": { "text": { "type": "string", "description": "Visible text of the element" } },
                    "required": ["text"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "scroll",
                "description": "Scroll the page. Target: 'up', 'down', 'top', or 'bottom'.",
                "parameters": {
                    "type": "object",
                    "properties": { "target": { "type": "string", "description": "up, down, top, or bottom" } },
                    "required": ["target"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "go_back",
                "description": "Goes back to the previous page.",
                "parameters": { "type": "object", "properties": {} }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "close_popups",
                "description": "Closes any visible modal or pop-up on the page by pressing Escape. Use this to dismiss pop-up windows! This will not work on cookie consent banners.",
                "parameters": { "type": "object", "properties": {} }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "done",
                "description": "Signal that the task is complete and report the answer.",
                "parameters": {
                    "type": "object",
                    "properties": { "summary": { "type": "string", "description": "The final answer or a short summary" } },
                    "required": ["summary"]
                }
            }
        }
    ])
}
