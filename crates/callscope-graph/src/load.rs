//! Runs an export script against Neo4j.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::export::ExportScript;
use crate::GraphClient;

/// Result of a load operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadResult {
    pub statements: usize,
    pub class_rows: usize,
    pub method_rows: usize,
    pub call_rows: usize,
}

/// Execute every statement of the script, in order.
///
/// The script starts by deleting all nodes, so a failed load leaves a partial
/// graph behind; re-running the load restores it.
pub async fn load_script(client: &GraphClient, script: &ExportScript) -> Result<LoadResult> {
    info!(project = %script.project, "Loading call graph into Neo4j");

    let statements = script.statements();
    let total = statements.len();
    for (i, statement) in statements.iter().enumerate() {
        let head = statement.lines().next().unwrap_or_default();
        debug!(step = i + 1, total, statement = head, "Executing statement");
        client
            .execute_raw(statement)
            .await
            .with_context(|| format!("Statement {}/{} failed: {}", i + 1, total, head))?;
    }

    let result = LoadResult {
        statements: total,
        class_rows: script.class_rows(),
        method_rows: script.method_rows(),
        call_rows: script.call_rows(),
    };

    info!(
        statements = result.statements,
        classes = result.class_rows,
        methods = result.method_rows,
        calls = result.call_rows,
        "Load complete"
    );
    Ok(result)
}
