//! Post-step screenshot capture.
//!
//! Runs after every loop iteration: lets the page settle, drops screenshots
//! from older steps, attaches a fresh capture to the current step, and
//! records the page's address in the step's observations.

use tracing::info;

use crate::driver::BrowserDriver;
use crate::memory::AgentMemory;
use crate::Result;

/// How long to let the page settle before capturing.
const SETTLE_MS: u64 = 1000;

/// How many recent steps keep their screenshots. Anything older is text-only
/// context for the model.
const KEEP_IMAGE_STEPS: usize = 2;

/// Capture the page for the most recent action step.
///
/// The driver is passed in explicitly; there is no process-wide session to
/// look up, so a missing session cannot fail halfway through.
pub async fn save_screenshot<D: BrowserDriver>(
    driver: &D,
    memory: &mut AgentMemory,
) -> Result<()> {
    driver.wait(SETTLE_MS).await;

    let Some(current) = memory.current_step_number() else {
        return Ok(());
    };

    if let Some(cutoff) = current.checked_sub(KEEP_IMAGE_STEPS) {
        memory.prune_images_through(cutoff);
    }

    let png = driver.screenshot().await?;
    let image = image::load_from_memory(&png)?;
    info!(
        "captured a browser screenshot: {}x{} pixels",
        image.width(),
        image.height()
    );

    let url = driver.current_url().await?;
    if let Some(step) = memory.current_action_mut() {
        step.observations_images = Some(vec![image]);
        step.append_observation(&format!("Current url: {url}"));
    }

    Ok(())
}
