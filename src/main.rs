use clap::Parser;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use webpilot::{AgentConfig, ChatModel, EokaDriver, WebAgent};

#[derive(Parser)]
#[command(name = "webpilot")]
#[command(about = "Vision-model browser agent")]
#[command(version)]
struct Cli {
    /// Task for the agent, e.g. "open wikipedia.org and find the article on Rust"
    task: Vec<String>,

    /// Model id on the inference endpoint
    #[arg(long, default_value = webpilot::model::DEFAULT_MODEL)]
    model: String,

    /// Maximum agent steps before forced termination
    #[arg(long, default_value_t = 20)]
    max_steps: usize,

    /// Run the browser headless (default is a visible window)
    #[arg(long)]
    headless: bool,

    /// Verbose output (-v for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> webpilot::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let task = cli.task.join(" ");
    if task.is_empty() {
        eprintln!("Usage: webpilot [--model MODEL] [--max-steps N] [--headless] <task>");
        std::process::exit(1);
    }

    let config = AgentConfig {
        model_id: cli.model,
        max_steps: cli.max_steps,
    };
    let model = ChatModel::from_env(&config.model_id)?;

    let (browser, driver) = EokaDriver::launch(cli.headless).await?;

    let mut agent = WebAgent::new(Arc::new(driver), model, config);
    let answer = agent.run(&task).await;

    browser.close().await?;

    println!("\n{}", answer?);
    Ok(())
}
