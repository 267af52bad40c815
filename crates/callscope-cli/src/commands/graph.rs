//! Neo4j export and load commands.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use callscope_graph::{load_script, CypherExporter};

use super::{build_graph, connect};
use crate::config::CallscopeConfig;

#[derive(Subcommand)]
pub enum GraphCommands {
    /// Write a Cypher bulk-load script for a facts document
    Export {
        /// Graph facts JSON
        #[arg(long)]
        facts: PathBuf,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Export a facts document and run the script against Neo4j
    Load {
        /// Graph facts JSON
        #[arg(long)]
        facts: PathBuf,
    },

    /// Show node and relationship counts in Neo4j
    Status,
}

pub async fn execute(cmd: GraphCommands, config: &CallscopeConfig) -> Result<()> {
    match cmd {
        GraphCommands::Export { facts, out } => cmd_export(facts, out, config),
        GraphCommands::Load { facts } => cmd_load(facts, config).await,
        GraphCommands::Status => cmd_status(config).await,
    }
}

fn cmd_export(facts: PathBuf, out: Option<PathBuf>, config: &CallscopeConfig) -> Result<()> {
    let graph = build_graph(&facts, config)?;
    let script = CypherExporter::default().export(&graph, Utc::now());
    let text = script.render();

    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(&path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} Wrote {} ({} classes, {} methods, {} calls)",
                "✓".green().bold(),
                path.display().to_string().cyan(),
                script.class_rows(),
                script.method_rows(),
                script.call_rows()
            );
        }
        None => print!("{}", text),
    }
    Ok(())
}

async fn cmd_load(facts: PathBuf, config: &CallscopeConfig) -> Result<()> {
    let graph = build_graph(&facts, config)?;
    let script = CypherExporter::default().export(&graph, Utc::now());

    println!("{}", "Loading into Knowledge Graph...".bold());
    let client = connect(config).await?;
    let result = load_script(&client, &script).await?;

    println!("\n{}", "Load complete:".green().bold());
    println!("  Statements: {}", result.statements);
    println!("  Classes:    {}", result.class_rows);
    println!("  Methods:    {}", result.method_rows);
    println!("  Calls:      {}", result.call_rows);
    Ok(())
}

async fn cmd_status(config: &CallscopeConfig) -> Result<()> {
    let client = connect(config).await?;
    let counts = client.get_counts().await?;

    println!("{}", "Knowledge Graph Status".bold());
    println!("{}", "─".repeat(40));
    println!("  URI:           {}", config.graph.uri.dimmed());
    println!("  Nodes:         {}", counts.nodes.to_string().cyan());
    println!("  Relationships: {}", counts.relationships.to_string().cyan());
    println!("  Classes:       {}", counts.classes.to_string().cyan());
    println!("  Methods:       {}", counts.methods.to_string().cyan());
    println!("  Calls:         {}", counts.calls.to_string().cyan());
    println!("{}", "─".repeat(40));
    Ok(())
}
