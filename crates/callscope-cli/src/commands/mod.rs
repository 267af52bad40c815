//! CLI command definitions and handlers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use callscope_core::{CallTreeBuilder, GitChangeContext, GraphFacts, KnowledgeGraph};
use callscope_graph::GraphClient;

use crate::config::CallscopeConfig;

pub mod analyze;
pub mod graph;
pub mod query;

/// Callscope - intent and risk scoring of call paths
#[derive(Parser)]
#[command(name = "callscope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to project directory (defaults to current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export to and load into Neo4j
    #[command(subcommand)]
    Graph(graph::GraphCommands),

    /// Build call trees and score call paths
    #[command(subcommand)]
    Analyze(analyze::AnalyzeCommands),

    /// Run one structural query
    #[command(subcommand)]
    Query(query::QueryCommands),
}

impl Cli {
    /// Whether stdout carries output another program will parse.
    pub fn machine_output(&self) -> bool {
        self.json
            || matches!(
                self.command,
                Commands::Graph(graph::GraphCommands::Export { out: None, .. })
            )
    }

    pub async fn execute(self) -> Result<()> {
        let project_dir = match self.project {
            Some(dir) => dir,
            None => std::env::current_dir().context("Failed to resolve current directory")?,
        };
        let config = CallscopeConfig::load(&project_dir)?;

        match self.command {
            Commands::Graph(cmd) => graph::execute(cmd, &config).await,
            Commands::Analyze(cmd) => analyze::execute(cmd, &config, self.json).await,
            Commands::Query(cmd) => query::execute(cmd, &config, self.json).await,
        }
    }
}

/// Read a facts document, ingest it and build call trees.
pub(crate) fn build_graph(facts_path: &Path, config: &CallscopeConfig) -> Result<KnowledgeGraph> {
    let raw = std::fs::read_to_string(facts_path)
        .with_context(|| format!("Failed to read facts from {}", facts_path.display()))?;
    let facts: GraphFacts = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid facts document {}", facts_path.display()))?;

    let (mut graph, report) = KnowledgeGraph::from_facts(facts, config.analysis.strict_ingest)?;
    for rejected in &report.rejected {
        warn!(reason = %rejected, "Rejected fact");
    }

    let build = CallTreeBuilder::new(config.analysis.max_depth).build(&mut graph)?;
    graph
        .ensure_valid()
        .with_context(|| format!("Knowledge graph for {} is inconsistent", facts_path.display()))?;
    info!(
        project = graph.project(),
        classes = report.classes,
        methods = report.methods,
        trees = build.trees,
        "Graph ready"
    );
    Ok(graph)
}

/// Read a change context. An unparsable document counts as no changes.
pub(crate) fn load_git_context(path: Option<&Path>) -> Result<GitChangeContext> {
    let Some(path) = path else {
        return Ok(GitChangeContext::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read change context from {}", path.display()))?;
    match serde_json::from_str(&raw) {
        Ok(context) => Ok(context),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring malformed change context");
            Ok(GitChangeContext::default())
        }
    }
}

pub(crate) async fn connect(config: &CallscopeConfig) -> Result<GraphClient> {
    GraphClient::connect(&config.graph)
        .await
        .with_context(|| format!("Failed to connect to Neo4j at {}", config.graph.uri))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("callscope-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_malformed_change_context_is_empty() {
        let path = temp_file("bad-changes.json", "{ not json");
        let context = load_git_context(Some(&path)).unwrap();
        assert!(context.is_empty());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_change_context_file_is_an_error() {
        let missing = std::env::temp_dir().join("callscope-does-not-exist.json");
        assert!(load_git_context(Some(&missing)).is_err());
        assert!(load_git_context(None).unwrap().is_empty());
    }

    #[test]
    fn test_build_graph_from_demo_facts() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/shop-facts.json");
        let graph = build_graph(&path, &CallscopeConfig::default()).unwrap();
        assert_eq!(graph.project(), "shop");
        assert_eq!(graph.trees().len(), 2);
    }

    #[test]
    fn test_export_to_stdout_is_machine_output() {
        let cli = Cli::parse_from(["callscope", "graph", "export", "--facts", "f.json"]);
        assert!(cli.machine_output());
        let cli = Cli::parse_from([
            "callscope", "graph", "export", "--facts", "f.json", "--out", "g.cypher",
        ]);
        assert!(!cli.machine_output());
        let cli = Cli::parse_from(["callscope", "analyze", "score", "--facts", "f.json", "--json"]);
        assert!(cli.machine_output());
    }
}
