mod cli;
mod dashboard;
mod routes;
mod state;
mod telemetry;

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use sondeo::pipeline::NoopProgress;
use sondeo::{
    llm, load_or_default, CollectorRegistry, Config, LogBroadcaster, PipelineConfig,
    PipelineOrchestrator, ResultAggregator, RunRequest, RunSupervisor, Stage,
};

use cli::{Cli, Command};
use state::AppState;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    telemetry::init(cli.json)?;

    let mut config = load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;
    config.apply_env().context("Invalid environment override")?;

    match cli.command {
        Command::Run { args, items } => run(&config, &args, items).await,
        Command::Serve { addr } => serve(&config, &addr).await.map(|_| ExitCode::SUCCESS),
        Command::Aggregate { dir } => {
            let dir = dir.unwrap_or_else(|| config.data_layout().results_dir);
            let interpreter = llm::from_config(&config.llm)?;
            let report = ResultAggregator::new(dir).aggregate(interpreter.as_ref()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn orchestrator(config: &Config) -> Arc<PipelineOrchestrator> {
    Arc::new(PipelineOrchestrator::new(
        Arc::new(PipelineConfig::from_config(config)),
        Arc::new(CollectorRegistry::from_config(config)),
    ))
}

async fn run(config: &Config, args: &[String], items: Option<u32>) -> Result<ExitCode> {
    let mut request = match cli::topic_from_args(args) {
        Some(topic) => RunRequest::from_topic_list(&topic),
        None => {
            if !io::stdin().is_terminal() {
                bail!("No topic given and stdin is not a terminal");
            }
            cli::prompt_request(
                &mut io::stdin().lock(),
                &mut io::stdout(),
                config.items_per_topic,
                config.default_topic.as_deref(),
            )?
        }
    };
    if let Some(items) = items {
        request = request.with_items(items);
    }

    let state = orchestrator(config).run(request, &NoopProgress).await;
    println!("{}", state.summary());

    if state.stage == Stage::Done {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn serve(config: &Config, addr: &str) -> Result<()> {
    let interpreter = llm::from_config(&config.llm)?;
    if config.llm.enabled && config.llm.api_key.is_none() {
        warn!("No LLM API key set, interpretations will report an error");
    }

    let state = Arc::new(AppState {
        supervisor: RunSupervisor::new(orchestrator(config), LogBroadcaster::default()),
        aggregator: ResultAggregator::new(config.data_layout().results_dir),
        interpreter,
    });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Dashboard listening on http://{}", addr);
    axum::serve(listener, routes::router(state)).await?;
    Ok(())
}
