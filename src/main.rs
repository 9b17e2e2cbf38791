mod cli;
mod config;
mod dispatch;
mod events;
mod logging;
mod service;
mod session;
mod tools;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{AppConfig, CliOverrides};
use crate::dispatch::ConsoleHandler;
use crate::service::{AgentService, AgentsClient};
use crate::session::{AgentSession, AgentSpec};
use crate::tools::user_functions;

const DEFAULT_PROMPT: &str =
    "Hello, send an email with the datetime and weather information in New York? Also let me know the details";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "arelay",
    version,
    about = "Stream a hosted agent run and answer its function calls locally"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Agent service base URL (overrides AGENTS_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Project connection string: <host>;<subscription>;<resource group>;<project>
    #[arg(long, global = true)]
    connection_string: Option<String>,

    /// Bearer token (set via env AGENTS_API_TOKEN recommended)
    #[arg(long, global = true)]
    api_token: Option<String>,

    /// Model deployment name
    #[arg(long, global = true)]
    model: Option<String>,

    /// Log level (error,warn,info,debug,trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Create an agent, stream one run for a prompt, then delete the agent
    Run {
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Print the tool definitions advertised to the agent
    Tools,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            endpoint: self.endpoint.clone(),
            connection_string: self.connection_string.clone(),
            api_token: self.api_token.clone(),
            model: self.model.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    logging::init_logging(
        &config::log_level(cli.log_level.clone()),
        cli.log_format == LogFormat::Json,
    )?;

    match cli.command.clone().unwrap_or(Command::Run { prompt: None }) {
        Command::Tools => {
            let registry = user_functions::default_registry()?;
            crate::cli::print_tool_defs(&mut io::stdout(), &registry)
        }
        Command::Run { prompt } => {
            let cfg = AppConfig::from_cli(cli.overrides())?;
            info!(endpoint = %cfg.endpoint, model = %cfg.model, "app config");
            run_agent(cfg, prompt.as_deref().unwrap_or(DEFAULT_PROMPT)).await
        }
    }
}

async fn run_agent(cfg: AppConfig, prompt: &str) -> Result<()> {
    let token = cfg
        .api_token
        .clone()
        .context("no api token: set --api-token or AGENTS_API_TOKEN")?;
    let client = AgentsClient::new(cfg.endpoint.clone(), token)?.with_service_config(cfg.service.clone());
    let service: Arc<dyn AgentService> = Arc::new(client);

    let session = AgentSession::create(
        service,
        AgentSpec {
            model: cfg.model.clone(),
            name: cfg.agent_name.clone(),
            instructions: cfg.instructions.clone(),
        },
        user_functions::default_registry()?,
    )
    .await
    .context("create agent")?
    .with_tool_timeout(Duration::from_millis(cfg.service.tool_timeout_ms));
    println!("Created agent, ID: {}", session.agent_id());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; abandoning run");
                cancel.cancel();
            }
        });
    }

    let mut thread_id = None;
    let result: Result<()> = async {
        let thread = session.create_thread().await.context("create thread")?;
        println!("Created thread, thread ID {}", thread.id);
        thread_id = Some(thread.id.clone());

        let message = session
            .post_message(&thread.id, prompt)
            .await
            .context("create message")?;
        println!("Created message, message ID {}", message.id);

        session
            .run(&thread.id, ConsoleHandler::stdout(), cancel)
            .await
            .context("agent run")?;
        Ok(())
    }
    .await;

    // The agent is removed whether or not the run succeeded.
    match session.delete().await {
        Ok(_) => println!("Deleted agent"),
        Err(e) => error!(err = %e, "failed to delete agent"),
    }

    if let Some(thread_id) = thread_id {
        match session.list_messages(&thread_id).await {
            Ok(messages) => crate::cli::print_messages(&mut io::stdout(), &messages)?,
            Err(e) => warn!(err = %e, "failed to list messages"),
        }
    }

    result
}
