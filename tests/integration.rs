//! Tool and callback tests against a scripted driver.
//!
//! No Chrome required: the mock records every call so the tests can assert
//! exactly which browser operations each tool performs.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::DynamicImage;
use serde_json::json;

use webpilot::observer::save_screenshot;
use webpilot::{ActionStep, AgentMemory, BrowserDriver, Error, ScrollTarget, Tools};

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::new_rgba8(width, height);
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[derive(Default)]
struct MockDriver {
    match_count: usize,
    url: String,
    png: Vec<u8>,
    click_hit: bool,
    focused: Mutex<Vec<(String, usize)>>,
    backs: AtomicUsize,
    keys: Mutex<Vec<String>>,
    gotos: Mutex<Vec<String>>,
    clicks: Mutex<Vec<String>>,
    scrolls: Mutex<Vec<ScrollTarget>>,
}

impl MockDriver {
    fn new(match_count: usize) -> Self {
        Self {
            match_count,
            url: "https://example.com/cart".into(),
            png: png_bytes(4, 3),
            click_hit: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn text_match_count(&self, _text: &str) -> webpilot::Result<usize> {
        Ok(self.match_count)
    }

    async fn focus_text_match(&self, text: &str, index: usize) -> webpilot::Result<()> {
        self.focused.lock().unwrap().push((text.to_string(), index));
        Ok(())
    }

    async fn back(&self) -> webpilot::Result<()> {
        self.backs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn press_key(&self, key: &str) -> webpilot::Result<()> {
        self.keys.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn screenshot(&self) -> webpilot::Result<Vec<u8>> {
        Ok(self.png.clone())
    }

    async fn current_url(&self) -> webpilot::Result<String> {
        Ok(self.url.clone())
    }

    async fn goto(&self, url: &str) -> webpilot::Result<()> {
        self.gotos.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn click_text(&self, text: &str) -> webpilot::Result<bool> {
        self.clicks.lock().unwrap().push(text.to_string());
        Ok(self.click_hit)
    }

    async fn scroll(&self, target: ScrollTarget) -> webpilot::Result<()> {
        self.scrolls.lock().unwrap().push(target);
        Ok(())
    }

    async fn wait(&self, _ms: u64) {}
}

// ---------------------------------------------------------------------------
// search_item_ctrl_f
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_finder_focuses_requested_occurrence() {
    let driver = Arc::new(MockDriver::new(3));
    let tools = Tools::new(driver.clone());

    let result = tools.search_item_ctrl_f("X", 2).await.unwrap();
    assert!(result.contains("Found 3 matches for 'X'."), "got: {result}");
    assert!(result.contains("Focused on element 2 of 3"), "got: {result}");

    // scroll happened exactly once, on the second match (0-based index 1)
    let focused = driver.focused.lock().unwrap();
    assert_eq!(*focused, vec![("X".to_string(), 1)]);
}

#[tokio::test]
async fn test_finder_reports_counts_when_occurrence_missing() {
    let driver = Arc::new(MockDriver::new(2));
    let tools = Tools::new(driver.clone());

    let err = tools.search_item_ctrl_f("checkout", 5).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Match number 5 not found (only 2 matches found)"
    );
    assert!(driver.focused.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_finder_rejects_occurrence_zero() {
    let driver = Arc::new(MockDriver::new(3));
    let tools = Tools::new(driver.clone());

    assert!(tools.search_item_ctrl_f("X", 0).await.is_err());
    assert!(driver.focused.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_finder_dispatch_defaults_to_first_occurrence() {
    let driver = Arc::new(MockDriver::new(4));
    let tools = Tools::new(driver.clone());

    let result = tools
        .execute("search_item_ctrl_f", &json!({ "text": "Login" }))
        .await
        .unwrap();
    assert!(result.contains("Focused on element 1 of 4"), "got: {result}");

    let focused = driver.focused.lock().unwrap();
    assert_eq!(*focused, vec![("Login".to_string(), 0)]);
}

// ---------------------------------------------------------------------------
// go_back / close_popups
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_go_back_invokes_history_once() {
    let driver = Arc::new(MockDriver::new(0));
    let tools = Tools::new(driver.clone());

    tools.go_back().await.unwrap();
    assert_eq!(driver.backs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_close_popups_sends_single_escape() {
    let driver = Arc::new(MockDriver::new(0));
    let tools = Tools::new(driver.clone());

    tools.close_popups().await.unwrap();
    assert_eq!(*driver.keys.lock().unwrap(), vec!["Escape".to_string()]);
}

// ---------------------------------------------------------------------------
// navigate / click / scroll / dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_navigate_reports_landed_url() {
    let driver = Arc::new(MockDriver::new(0));
    let tools = Tools::new(driver.clone());

    let result = tools.navigate("https://example.com").await.unwrap();
    assert_eq!(result, "Navigated to: https://example.com/cart");
    assert_eq!(
        *driver.gotos.lock().unwrap(),
        vec!["https://example.com".to_string()]
    );
}

#[tokio::test]
async fn test_click_miss_is_a_tool_error() {
    let mut driver = MockDriver::new(0);
    driver.click_hit = false;
    let tools = Tools::new(Arc::new(driver));

    let err = tools.click("Sign in").await.unwrap_err();
    assert!(matches!(err, Error::Tool(_)));
    assert!(err.to_string().contains("no clickable element"));
}

#[tokio::test]
async fn test_scroll_dispatch() {
    let driver = Arc::new(MockDriver::new(0));
    let tools = Tools::new(driver.clone());

    tools
        .execute("scroll", &json!({ "target": "bottom" }))
        .await
        .unwrap();
    assert_eq!(*driver.scrolls.lock().unwrap(), vec![ScrollTarget::Bottom]);

    assert!(tools.scroll("sideways").await.is_err());
}

#[tokio::test]
async fn test_dispatch_rejects_unknown_tool() {
    let tools = Tools::new(Arc::new(MockDriver::new(0)));

    let err = tools.execute("teleport", &json!({})).await.unwrap_err();
    assert!(err.to_string().contains("Unknown tool: teleport"));
}

// ---------------------------------------------------------------------------
// screenshot step callback
// ---------------------------------------------------------------------------

fn step_with_image(step_number: usize) -> ActionStep {
    let mut step = ActionStep::new(step_number);
    step.observations_images = Some(vec![DynamicImage::new_rgba8(2, 2)]);
    step
}

#[tokio::test]
async fn test_callback_prunes_old_steps_and_attaches_current() {
    let driver = MockDriver::new(0);
    let mut memory = AgentMemory::new();
    memory.push_task("buy milk");
    for n in 1..=3 {
        memory.push_action(step_with_image(n));
    }
    memory.push_action(ActionStep::new(4));

    save_screenshot(&driver, &mut memory).await.unwrap();

    let steps: Vec<&ActionStep> = memory.action_steps().collect();
    // steps at least two behind the current one lose their screenshots
    assert!(steps[0].observations_images.is_none());
    assert!(steps[1].observations_images.is_none());
    // the immediately preceding step keeps its screenshot
    assert!(steps[2].observations_images.is_some());

    // current step gets exactly one fresh capture, at the captured size
    let images = steps[3].observations_images.as_ref().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!((images[0].width(), images[0].height()), (4, 3));

    let observations = steps[3].observations.as_deref().unwrap();
    assert!(
        observations.ends_with("Current url: https://example.com/cart"),
        "got: {observations}"
    );
}

#[tokio::test]
async fn test_callback_appends_url_after_tool_result() {
    let driver = MockDriver::new(0);
    let mut memory = AgentMemory::new();
    let mut step = ActionStep::new(1);
    step.append_observation("Clicked \"Add to cart\"");
    memory.push_action(step);

    save_screenshot(&driver, &mut memory).await.unwrap();

    let step = memory.action_steps().next().unwrap();
    assert_eq!(
        step.observations.as_deref(),
        Some("Clicked \"Add to cart\"\nCurrent url: https://example.com/cart")
    );
}

#[tokio::test]
async fn test_callback_creates_observations_when_absent() {
    let driver = MockDriver::new(0);
    let mut memory = AgentMemory::new();
    memory.push_action(ActionStep::new(1));

    save_screenshot(&driver, &mut memory).await.unwrap();

    let step = memory.action_steps().next().unwrap();
    assert_eq!(
        step.observations.as_deref(),
        Some("Current url: https://example.com/cart")
    );
    assert!(step.observations_images.is_some());
}

#[tokio::test]
async fn test_callback_on_empty_memory_is_a_noop() {
    let driver = MockDriver::new(0);
    let mut memory = AgentMemory::new();
    memory.push_task("just a task, no steps yet");

    save_screenshot(&driver, &mut memory).await.unwrap();
    assert!(memory.action_steps().next().is_none());
}
