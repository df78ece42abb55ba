//! The plan → act → observe loop.
//!
//! Each step: rebuild the conversation from memory, ask the model for a
//! tool call, run it, record the result, then let the screenshot callback
//! attach the current page state. Tool failures are observations, not
//! aborts; the model sees the error and picks a different move.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::driver::BrowserDriver;
use crate::memory::{ActionStep, AgentMemory, MemoryStep};
use crate::model::{self, ChatModel, DEFAULT_MODEL};
use crate::observer;
use crate::tools::{self, Tools};
use crate::Result;

const SYSTEM_PROMPT: &str = r#"You are a web browsing agent. You control a real browser. After every step you receive a screenshot of the current page and its URL. Use them to decide what to do next.

TOOLS:
- navigate: open a URL
- search_item_ctrl_f: find text on the page, like Ctrl+F, and scroll to the nth occurrence
- click: click a link or button by its visible text
- scroll: scroll up/down/top/bottom
- go_back: go back to the previous page
- close_popups: press Escape to dismiss modal pop-ups (does not work on cookie banners)
- done: finish and report the answer

RULES:
- Call exactly one tool per step.
- If a pop-up is blocking the page, call close_popups before anything else.
- If a tool fails, read the error and retry with different arguments.
- When the task is complete, call done with a short answer."#;

/// Agent settings. Defaults mirror the usual interactive run: the hosted
/// Qwen vision model and a 20-step ceiling.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model_id: String,
    pub max_steps: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL.into(),
            max_steps: 20,
        }
    }
}

/// Drives one task to completion against a browser.
pub struct WebAgent<D: BrowserDriver> {
    driver: Arc<D>,
    tools: Tools<D>,
    model: ChatModel,
    memory: AgentMemory,
    max_steps: usize,
}

impl<D: BrowserDriver> WebAgent<D> {
    pub fn new(driver: Arc<D>, model: ChatModel, config: AgentConfig) -> Self {
        Self {
            tools: Tools::new(driver.clone()),
            driver,
            model,
            memory: AgentMemory::new(),
            max_steps: config.max_steps,
        }
    }

    /// The step history, mainly for inspection in tests.
    pub fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    /// Run the loop until the model calls `done` or the step ceiling hits.
    pub async fn run(&mut self, task: &str) -> Result<String> {
        info!("task: {task}");
        self.memory.push_task(task);

        let tool_defs = tools::tool_definitions();

        for step_number in 1..=self.max_steps {
            debug!("step {step_number}/{}", self.max_steps);

            let messages = self.build_messages()?;
            let output = self.model.chat(&messages, &tool_defs).await?;

            let mut step = ActionStep::new(step_number);
            step.model_text = output.text.clone();
            if let Some(text) = &output.text {
                info!("model: {text}");
            }

            let mut finished = None;
            match output.tool_call {
                Some(call) => {
                    info!("tool: {}({})", call.name, call.arguments);
                    step.tool_name = Some(call.name.clone());
                    step.tool_input = Some(call.arguments.clone());

                    if call.name == "done" {
                        finished = Some(
                            call.arguments["summary"]
                                .as_str()
                                .unwrap_or("(no summary)")
                                .to_string(),
                        );
                    } else {
                        match self.tools.execute(&call.name, &call.arguments).await {
                            Ok(result) => {
                                debug!("=> {result}");
                                step.append_observation(&result);
                            }
                            Err(e) => {
                                warn!("tool {} failed: {e}", call.name);
                                step.append_observation(&format!("Error: {e}"));
                            }
                        }
                    }
                }
                None => {
                    step.append_observation(
                        "No tool was called. Call a tool, or done to finish.",
                    );
                }
            }

            self.memory.push_action(step);
            observer::save_screenshot(self.driver.as_ref(), &mut self.memory).await?;

            if let Some(summary) = finished {
                info!("done: {summary}");
                return Ok(summary);
            }
        }

        warn!("reached max steps ({}) without done", self.max_steps);
        Ok("Reached the maximum number of steps without finishing the task.".into())
    }

    /// Rebuild the conversation from memory. Older steps contribute text
    /// only; pruning keeps screenshots on just the two most recent steps.
    fn build_messages(&self) -> Result<Vec<Value>> {
        let mut messages = vec![json!({ "role": "system", "content": SYSTEM_PROMPT })];

        for step in self.memory.steps() {
            match step {
                MemoryStep::Task(t) => {
                    messages.push(json!({ "role": "user", "content": t.task }));
                }
                MemoryStep::Action(a) => {
                    let mut assistant = a.model_text.clone().unwrap_or_default();
                    if let Some(name) = &a.tool_name {
                        if !assistant.is_empty() {
                            assistant.push('\n');
                        }
                        let args = a
                            .tool_input
                            .as_ref()
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "{}".into());
                        assistant.push_str(&format!("Calling tool: {name}({args})"));
                    }
                    if !assistant.is_empty() {
                        messages.push(json!({ "role": "assistant", "content": assistant }));
                    }

                    let observations = a.observations.as_deref().unwrap_or("(no observations)");
                    let mut content = vec![json!({
                        "type": "text",
                        "text": format!("Observation (step {}):\n{}", a.step_number, observations)
                    })];
                    if let Some(images) = &a.observations_images {
                        for image in images {
                            content.push(model::image_block(image)?);
                        }
                    }
                    messages.push(json!({ "role": "user", "content": content }));
                }
            }
        }

        Ok(messages)
    }
}
