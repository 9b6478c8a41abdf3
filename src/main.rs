use anyhow::{Result, anyhow};
use clap::Parser;

mod api;
mod app;
mod config;
mod handler;
mod tui;
mod ui;

use api::AgentClient;
use app::App;
use config::{Config, DEFAULT_SERVER_URL};

#[derive(Parser)]
#[command(name = "pocket")]
#[command(about = "Terminal chat client for the Pocket AI agent server")]
struct Cli {
    /// Agent server URL (overrides the configured one)
    #[arg(short, long)]
    server: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|_| Config::new());
    let server_url = cli
        .server
        .or_else(|| config.server_url.clone())
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

    let mut app = App::new(config, AgentClient::new(&server_url));

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = run(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, events: &mut tui::EventHandler, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::render(app, frame))?;

        if app.should_quit {
            return Ok(());
        }

        let Some(event) = events.next().await else {
            return Ok(());
        };
        handler::handle_event(app, event)?;

        settle_agent_request(app).await;
        app.poll_code_results();
    }
}

/// Join the agent task once it finishes. Every outcome, including a panicked
/// task, settles the exchange and frees the waiting flag.
async fn settle_agent_request(app: &mut App) {
    if !app.agent_task_finished() {
        return;
    }

    if let Some(task) = app.agent_task.take() {
        let outcome = match task.await {
            Ok(result) => result,
            Err(e) => Err(anyhow!("request task failed: {e}")),
        };
        app.finish_agent_request(outcome);
    }
}
