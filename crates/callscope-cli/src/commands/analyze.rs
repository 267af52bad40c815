//! Tree building and scoring commands.

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

use callscope_core::scoring::paths_from_core_paths;
use callscope_core::{Analyzer, GraphQueryService, InMemoryQueryService};
use callscope_graph::Neo4jQueryService;

use super::{build_graph, connect, load_git_context};
use crate::config::CallscopeConfig;
use crate::output;

#[derive(Subcommand)]
pub enum AnalyzeCommands {
    /// Build call trees and summarize them
    Trees(FactsArgs),

    /// Print graph statistics
    Stats(FactsArgs),

    /// Score every core path for intent and risk
    Score(ScoreArgs),
}

#[derive(Args)]
pub struct FactsArgs {
    /// Graph facts JSON
    #[arg(long)]
    pub facts: PathBuf,
}

#[derive(Args)]
pub struct ScoreArgs {
    /// Graph facts JSON
    #[arg(long)]
    pub facts: PathBuf,

    /// Change context JSON
    #[arg(long)]
    pub git: Option<PathBuf>,

    /// Where structural queries are answered
    #[arg(long, value_enum, default_value_t = Backend::Memory)]
    pub backend: Backend,

    /// Show only the highest-intent paths
    #[arg(long)]
    pub top: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// The graph built from the facts document
    Memory,
    /// A Neo4j database loaded with `graph load`
    Neo4j,
}

pub async fn execute(cmd: AnalyzeCommands, config: &CallscopeConfig, json: bool) -> Result<()> {
    match cmd {
        AnalyzeCommands::Trees(args) => cmd_trees(args, config, json),
        AnalyzeCommands::Stats(args) => cmd_stats(args, config, json),
        AnalyzeCommands::Score(args) => cmd_score(args, config, json).await,
    }
}

fn cmd_trees(args: FactsArgs, config: &CallscopeConfig, json: bool) -> Result<()> {
    let graph = build_graph(&args.facts, config)?;
    if json {
        println!("{}", serde_json::to_string_pretty(graph.trees())?);
    } else {
        output::print_trees(&graph);
    }
    Ok(())
}

fn cmd_stats(args: FactsArgs, config: &CallscopeConfig, json: bool) -> Result<()> {
    let graph = build_graph(&args.facts, config)?;
    let stats = graph.statistics();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        output::print_statistics(graph.project(), &stats);
    }
    Ok(())
}

async fn cmd_score(args: ScoreArgs, config: &CallscopeConfig, json: bool) -> Result<()> {
    let graph = build_graph(&args.facts, config)?;
    let git = load_git_context(args.git.as_deref())?;
    let paths = paths_from_core_paths(&graph);

    let max_hops = config.analysis.max_path_hops;
    let service: Arc<dyn GraphQueryService> = match args.backend {
        Backend::Memory => {
            Arc::new(InMemoryQueryService::new(Arc::new(graph)).with_max_hops(max_hops))
        }
        Backend::Neo4j => {
            let client = connect(config).await?;
            Arc::new(Neo4jQueryService::new(client).with_max_hops(max_hops))
        }
    };

    let analyzer = Analyzer::from_config(service, &config.analysis);
    let mut scored = analyzer.score_paths(paths, &git).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&scored)?);
        return Ok(());
    }

    scored.sort_by(|a, b| {
        b.intent
            .score
            .total_cmp(&a.intent.score)
            .then(b.risk.score.total_cmp(&a.risk.score))
    });
    if let Some(top) = args.top {
        scored.truncate(top);
    }
    output::print_scores(&scored);
    Ok(())
}
