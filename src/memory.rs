//! Step memory for the agent loop.
//!
//! Each loop iteration is recorded as a step. Steps are a tagged enum
//! rather than a dynamic list: only action steps carry observation text and
//! screenshots, and the step callback mutates nothing else.

use image::DynamicImage;
use serde_json::Value;

/// One recorded entry in the agent's memory.
#[derive(Debug, Clone)]
pub enum MemoryStep {
    /// The task the user gave the agent, recorded once at the start.
    Task(TaskStep),
    /// One iteration of the plan → act → observe loop.
    Action(ActionStep),
}

#[derive(Debug, Clone)]
pub struct TaskStep {
    pub task: String,
}

/// Recorded state of one loop iteration.
///
/// `observations` and `observations_images` start empty; the tool result and
/// the step callback fill them in after the action runs.
#[derive(Debug, Clone)]
pub struct ActionStep {
    /// 1-based step counter.
    pub step_number: usize,
    /// Free text the model emitted alongside its tool call.
    pub model_text: Option<String>,
    /// Name of the tool the model called, if any.
    pub tool_name: Option<String>,
    /// Arguments the model passed to the tool.
    pub tool_input: Option<Value>,
    /// Tool results and the current-URL line, newline separated.
    pub observations: Option<String>,
    /// Screenshots attached by the step callback. Pruned on older steps so
    /// only the two most recent steps stay visual context.
    pub observations_images: Option<Vec<DynamicImage>>,
}

impl ActionStep {
    pub fn new(step_number: usize) -> Self {
        Self {
            step_number,
            model_text: None,
            tool_name: None,
            tool_input: None,
            observations: None,
            observations_images: None,
        }
    }

    /// Append a line to the observations, creating them if absent.
    pub fn append_observation(&mut self, line: &str) {
        self.observations = Some(match self.observations.take() {
            None => line.to_string(),
            Some(prev) => format!("{prev}\n{line}"),
        });
    }
}

/// The agent's full step history.
#[derive(Debug, Default)]
pub struct AgentMemory {
    steps: Vec<MemoryStep>,
}

impl AgentMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_task(&mut self, task: impl Into<String>) {
        self.steps.push(MemoryStep::Task(TaskStep { task: task.into() }));
    }

    pub fn push_action(&mut self, step: ActionStep) {
        self.steps.push(MemoryStep::Action(step));
    }

    pub fn steps(&self) -> &[MemoryStep] {
        &self.steps
    }

    /// Step number of the most recent action step.
    pub fn current_step_number(&self) -> Option<usize> {
        self.action_steps().last().map(|s| s.step_number)
    }

    /// The most recent action step, for the callback to fill in.
    pub fn current_action_mut(&mut self) -> Option<&mut ActionStep> {
        self.steps.iter_mut().rev().find_map(|step| match step {
            MemoryStep::Action(a) => Some(a),
            _ => None,
        })
    }

    pub fn action_steps(&self) -> impl Iterator<Item = &ActionStep> {
        self.steps.iter().filter_map(|step| match step {
            MemoryStep::Action(a) => Some(a),
            _ => None,
        })
    }

    /// Drop screenshots from every action step numbered `cutoff` or below.
    pub fn prune_images_through(&mut self, cutoff: usize) {
        for step in self.steps.iter_mut() {
            if let MemoryStep::Action(a) = step {
                if a.step_number <= cutoff {
                    a.observations_images = None;
                }
            }
        }
    }
}
