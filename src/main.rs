mod cli;
mod comfy;
mod compose;
mod config;
mod error;
mod history;
mod news;
mod orchestrator;
mod schedule;
mod selector;
mod state_machine;
mod summary;
mod ui;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cli::{Cli, Command};
use comfy::RenderJobClient;
use compose::CompositionPipeline;
use config::AppConfig;
use error::CycleError;
use news::RssHeadlineSource;
use orchestrator::{CycleOrchestrator, CycleSettings};
use schedule::Scheduler;
use selector::HeadlineSelector;
use summary::KeywordSummarizer;
use ui::RenderProgress;

type Orchestrator = CycleOrchestrator<RssHeadlineSource, KeywordSummarizer, RenderJobClient>;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_orchestrator(config: &AppConfig) -> Result<Orchestrator> {
    let renderer = RenderJobClient::new(&config.render).context("failed to set up render client")?;
    let pipeline =
        CompositionPipeline::new(&config.composition).context("failed to prepare output directory")?;
    let source = RssHeadlineSource::new(&config.news, config.render.request_timeout());
    let selector = HeadlineSelector::new(
        &config.scheduler.priority_keywords,
        config.scheduler.styles.clone(),
        config.scheduler.fallback,
    );

    Ok(CycleOrchestrator::new(
        source,
        KeywordSummarizer,
        renderer,
        pipeline,
        selector,
        CycleSettings::from_config(config),
    ))
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    config.validate().context("invalid configuration")?;

    let orchestrator = build_orchestrator(&config)?;

    match cli.command {
        Command::Run => {
            let scheduler = Scheduler::new(config.scheduler.trigger()?, config.scheduler.run_immediately);
            scheduler.run(&orchestrator, shutdown_signal()).await;

            let status = orchestrator.status().await;
            info!(
                cycles = status.cycles_completed,
                generated = status.total_generated,
                "stopped"
            );
        }

        Command::Once => {
            let progress = RenderProgress::start("Running generation cycle");
            match orchestrator.run_cycle().await {
                Ok(report) => progress.print_report(&report),
                Err(CycleError::FetchEmpty) => progress.warn("No headlines available from any source"),
                Err(e) => {
                    progress.warn(&e.to_string());
                    return Err(e.into());
                }
            }
            ui::print_status(&orchestrator.status().await);
        }

        Command::Generate { headline, style } => {
            let headline = match headline {
                Some(h) if !h.trim().is_empty() => h,
                Some(_) => bail!("headline must not be empty"),
                None => orchestrator.first_headline().await?,
            };

            let progress = RenderProgress::start(&format!("Generating: {headline}"));
            match orchestrator.generate_one(&headline, style.map(Into::into)).await {
                Ok(record) => progress.succeeded(&record.artifact_path),
                Err(failure) => {
                    progress.failed(&failure);
                    bail!("{} stage failed: {}", failure.stage, failure.message);
                }
            }
        }
    }

    Ok(())
}
