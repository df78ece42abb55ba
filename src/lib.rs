//! # webpilot
//!
//! A vision-model browser agent. The model sees a screenshot of the page
//! after every step, reasons about the task, and calls browser tools turn
//! by turn until it is done.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use webpilot::{AgentConfig, ChatModel, EokaDriver, WebAgent};
//!
//! # #[tokio::main]
//! # async fn main() -> webpilot::Result<()> {
//! let config = AgentConfig::default();
//! let model = ChatModel::from_env(&config.model_id)?;
//! let (browser, driver) = EokaDriver::launch(false).await?;
//!
//! let mut agent = WebAgent::new(Arc::new(driver), model, config);
//! let answer = agent.run("Find the pricing page and read the cheapest tier").await?;
//! println!("{answer}");
//!
//! browser.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod driver;
pub mod memory;
pub mod model;
pub mod observer;
pub mod tools;

pub use agent::{AgentConfig, WebAgent};
pub use driver::{BrowserDriver, EokaDriver, ScrollTarget};
pub use memory::{ActionStep, AgentMemory, MemoryStep, TaskStep};
pub use model::{ChatModel, ModelOutput, ToolCall};
pub use tools::Tools;

/// Result type for webpilot operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving the browser or the model.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested text occurrence does not exist on the page. The agent
    /// loop feeds the message back to the model so it can retry with
    /// different arguments.
    #[error("Match number {requested} not found (only {found} matches found)")]
    MatchNotFound { requested: usize, found: usize },

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("model error: {0}")]
    Model(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tool error: {0}")]
    Tool(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_not_found_message() {
        let err = Error::MatchNotFound {
            requested: 5,
            found: 2,
        };
        assert_eq!(
            err.to_string(),
            "Match number 5 not found (only 2 matches found)"
        );
    }

    #[test]
    fn test_tool_error_message() {
        let err = Error::Tool("Unknown tool: fly".into());
        assert_eq!(err.to_string(), "tool error: Unknown tool: fly");
    }
}
