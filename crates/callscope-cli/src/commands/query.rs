//! One-off structural queries.
//!
//! With `--facts` the query runs against the graph built from that document;
//! otherwise it goes to Neo4j.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use callscope_core::{GraphQueryService, InMemoryQueryService};
use callscope_graph::Neo4jQueryService;

use super::{build_graph, connect};
use crate::config::CallscopeConfig;
use crate::output;

#[derive(Args)]
pub struct SourceArgs {
    /// Answer from this graph facts JSON instead of Neo4j
    #[arg(long)]
    pub facts: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum QueryCommands {
    /// Direct callers of a method
    Callers {
        /// Class name (qualified or simple)
        class: String,
        method: String,
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Direct callees of a method
    Callees {
        /// Class name (qualified or simple)
        class: String,
        method: String,
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Layer, ancestry and dependencies of a class
    Architecture {
        /// Class name (qualified or simple)
        class: String,
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Shortest call path between two methods
    Chain {
        source_class: String,
        source_method: String,
        target_class: String,
        target_method: String,
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Callers and callees within two hops
    Blast {
        /// Class name (qualified or simple)
        class: String,
        method: String,
        #[command(flatten)]
        source: SourceArgs,
    },
}

impl QueryCommands {
    fn source(&self) -> &SourceArgs {
        match self {
            Self::Callers { source, .. }
            | Self::Callees { source, .. }
            | Self::Architecture { source, .. }
            | Self::Chain { source, .. }
            | Self::Blast { source, .. } => source,
        }
    }
}

async fn open_service(
    source: &SourceArgs,
    config: &CallscopeConfig,
) -> Result<Arc<dyn GraphQueryService>> {
    let max_hops = config.analysis.max_path_hops;
    let service: Arc<dyn GraphQueryService> = match &source.facts {
        Some(facts) => {
            let graph = Arc::new(build_graph(facts, config)?);
            Arc::new(InMemoryQueryService::new(graph).with_max_hops(max_hops))
        }
        None => Arc::new(Neo4jQueryService::new(connect(config).await?).with_max_hops(max_hops)),
    };
    Ok(service)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn execute(cmd: QueryCommands, config: &CallscopeConfig, json: bool) -> Result<()> {
    let service = open_service(cmd.source(), config).await?;

    match cmd {
        QueryCommands::Callers { class, method, .. } => {
            let calls = service.query_method_callers(&class, &method).await?;
            if json {
                return print_json(&calls);
            }
            output::print_method_calls("Callers", &class, &method, &calls);
        }
        QueryCommands::Callees { class, method, .. } => {
            let calls = service.query_method_callees(&class, &method).await?;
            if json {
                return print_json(&calls);
            }
            output::print_method_calls("Callees", &class, &method, &calls);
        }
        QueryCommands::Architecture { class, .. } => {
            let arch = service.query_class_architecture(&class).await?;
            if json {
                return print_json(&arch);
            }
            output::print_architecture(&arch);
        }
        QueryCommands::Chain {
            source_class,
            source_method,
            target_class,
            target_method,
            ..
        } => {
            let chain = service
                .query_call_path_chain(&source_class, &source_method, &target_class, &target_method)
                .await?;
            if json {
                return print_json(&chain);
            }
            output::print_chain(&chain);
        }
        QueryCommands::Blast { class, method, .. } => {
            let blast = service.query_blast_radius(&class, &method).await?;
            if json {
                return print_json(&blast);
            }
            output::print_blast_radius(&class, &method, &blast);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_source() -> SourceArgs {
        let demos = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos");
        SourceArgs {
            facts: Some(demos.join("shop-facts.json")),
        }
    }

    #[tokio::test]
    async fn test_chain_uses_configured_hop_bound() {
        let mut config = CallscopeConfig::default();
        let service = open_service(&demo_source(), &config).await.unwrap();
        let chain = service
            .query_call_path_chain("OrderController", "placeOrder", "OrderRepository", "save")
            .await
            .unwrap();
        assert!(chain.found);
        assert_eq!(chain.hops, 2);

        config.analysis.max_path_hops = 1;
        let service = open_service(&demo_source(), &config).await.unwrap();
        let chain = service
            .query_call_path_chain("OrderController", "placeOrder", "OrderRepository", "save")
            .await
            .unwrap();
        assert!(!chain.found);
    }
}
