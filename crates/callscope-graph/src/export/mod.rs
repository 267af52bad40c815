//! Cypher bulk-load script generation.
//!
//! The script recreates the graph from scratch: reset, schema, node batches,
//! containment, calls, then type hierarchy. Entities are emitted in the order
//! the graph holds them, one row per line, so two exports of the same graph
//! differ only in the `// Generated:` line.

pub mod escape;

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write as _;

use callscope_core::graph::model::{
    CallEdge, ClassBlock, InterfaceImplementationMapping, MethodNode,
};
use callscope_core::KnowledgeGraph;

use crate::schema::{CONSTRAINT_STATEMENTS, INDEX_STATEMENTS};
use escape::MapLiteral;

pub const RESET_STATEMENT: &str = "MATCH (n) DETACH DELETE n";
pub const CLASS_BATCH_SIZE: usize = 50;
pub const METHOD_BATCH_SIZE: usize = 50;
pub const CALL_BATCH_SIZE: usize = 100;

const CLASS_MERGE: &str = "MERGE (c:Class {id: row.id})\nSET c += row";
const METHOD_MERGE: &str = "MERGE (m:Method {id: row.id})\nSET m += row";
const CALL_MERGE: &str = "MATCH (a:Method {id: row.fromId}), (b:Method {id: row.toId})\n\
MERGE (a)-[r:CALLS {id: row.id}]->(b)\n\
SET r.callType = row.callType, r.confidence = row.confidence, r.lineNumber = row.lineNumber, \
r.crossCount = row.crossCount, r.treeIds = row.treeIds";
const IMPLEMENTED_BY_MERGE: &str = "MATCH (i:Method {id: row.interfaceId}), \
(m:Method {id: row.implementationId})\n\
MERGE (i)-[:IMPLEMENTED_BY]->(m)";

const CONTAINS_STATEMENT: &str = "MATCH (c:Class), (m:Method)\n\
WHERE c.id = m.classId\n\
MERGE (c)-[:CONTAINS]->(m)";
const EXTENDS_STATEMENT: &str = "MATCH (c:Class) WHERE c.superClass IS NOT NULL\n\
MATCH (p:Class) WHERE p.id <> c.id AND (p.name = c.superClass OR p.simpleName = c.superClass)\n\
MERGE (c)-[:EXTENDS]->(p)";
const IMPLEMENTS_STATEMENT: &str = "MATCH (c:Class) WHERE size(c.interfaces) > 0\n\
UNWIND c.interfaces AS iface\n\
MATCH (i:Class) WHERE i.name = iface OR i.simpleName = iface\n\
MERGE (c)-[:IMPLEMENTS]->(i)";

const STATS_QUERIES: &[&str] = &[
    "MATCH (c:Class) RETURN c.layer AS layer, count(*) AS classes ORDER BY classes DESC",
    "MATCH (c:Class) RETURN c.businessDomain AS domain, count(*) AS classes ORDER BY classes DESC",
    "MATCH ()-[r:CALLS]->() RETURN r.callType AS callType, count(*) AS calls ORDER BY calls DESC",
    "MATCH (m:Method) WHERE m.crossCount > 1 \
     RETURN m.id, m.crossCount ORDER BY m.crossCount DESC LIMIT 20",
];

/// One `UNWIND [...] AS row` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub rows: Vec<String>,
    pub body: &'static str,
}

impl Batch {
    fn render(&self) -> String {
        let mut out = String::from("UNWIND [\n");
        for (i, row) in self.rows.iter().enumerate() {
            out.push_str("  ");
            out.push_str(row);
            if i + 1 < self.rows.len() {
                out.push(',');
            }
            out.push('\n');
        }
        out.push_str("] AS row\n");
        out.push_str(self.body);
        out
    }
}

/// A generated script, kept in sections until rendered.
#[derive(Debug, Clone)]
pub struct ExportScript {
    pub project: String,
    pub generated_at: DateTime<Utc>,
    pub class_batches: Vec<Batch>,
    pub method_batches: Vec<Batch>,
    /// Present when the graph has at least one method.
    pub containment: Option<&'static str>,
    pub call_batches: Vec<Batch>,
    pub implemented_by_batches: Vec<Batch>,
    /// EXTENDS and IMPLEMENTS statements; empty for a graph without classes.
    pub hierarchy: Vec<&'static str>,
}

impl ExportScript {
    fn rows(batches: &[Batch]) -> usize {
        batches.iter().map(|b| b.rows.len()).sum()
    }

    pub fn class_rows(&self) -> usize {
        Self::rows(&self.class_batches)
    }

    pub fn method_rows(&self) -> usize {
        Self::rows(&self.method_batches)
    }

    pub fn call_rows(&self) -> usize {
        Self::rows(&self.call_batches)
    }

    /// Executable statements in load order, without trailing semicolons.
    pub fn statements(&self) -> Vec<String> {
        let mut statements = vec![RESET_STATEMENT.to_string()];
        statements.extend(INDEX_STATEMENTS.iter().map(|s| s.to_string()));
        statements.extend(CONSTRAINT_STATEMENTS.iter().map(|s| s.to_string()));
        statements.extend(self.class_batches.iter().map(Batch::render));
        statements.extend(self.method_batches.iter().map(Batch::render));
        statements.extend(self.containment.map(str::to_string));
        statements.extend(self.call_batches.iter().map(Batch::render));
        statements.extend(self.hierarchy.iter().map(|s| s.to_string()));
        statements.extend(self.implemented_by_batches.iter().map(Batch::render));
        statements
    }

    /// The full script text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "// Callscope call graph export");
        let _ = writeln!(out, "// Project: {}", self.project);
        let _ = writeln!(
            out,
            "// Generated: {}",
            self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        let _ = writeln!(
            out,
            "// Classes: {}, Methods: {}, Calls: {}",
            self.class_rows(),
            self.method_rows(),
            self.call_rows()
        );

        section(&mut out, "Reset", [RESET_STATEMENT.to_string()]);
        section(&mut out, "Indexes", INDEX_STATEMENTS.iter().map(|s| s.to_string()));
        section(&mut out, "Constraints", CONSTRAINT_STATEMENTS.iter().map(|s| s.to_string()));
        section(&mut out, "Class nodes", self.class_batches.iter().map(Batch::render));
        section(&mut out, "Method nodes", self.method_batches.iter().map(Batch::render));
        section(&mut out, "Containment", self.containment.map(str::to_string));
        section(&mut out, "Call edges", self.call_batches.iter().map(Batch::render));
        section(
            &mut out,
            "Type hierarchy",
            self.hierarchy
                .iter()
                .map(|s| s.to_string())
                .chain(self.implemented_by_batches.iter().map(Batch::render)),
        );

        let _ = writeln!(out, "\n// Statistics");
        for query in STATS_QUERIES {
            let _ = writeln!(out, "// {};", query);
        }
        out
    }
}

/// Write a titled block of statements; empty blocks are omitted.
fn section(out: &mut String, title: &str, statements: impl IntoIterator<Item = String>) {
    let mut statements = statements.into_iter().peekable();
    if statements.peek().is_none() {
        return;
    }
    let _ = writeln!(out, "\n// {}", title);
    for statement in statements {
        let _ = writeln!(out, "{};", statement);
    }
}

/// Serializes a knowledge graph into a Cypher bulk-load script.
#[derive(Debug, Clone, Copy)]
pub struct CypherExporter {
    pub class_batch_size: usize,
    pub method_batch_size: usize,
    pub call_batch_size: usize,
}

impl Default for CypherExporter {
    fn default() -> Self {
        Self {
            class_batch_size: CLASS_BATCH_SIZE,
            method_batch_size: METHOD_BATCH_SIZE,
            call_batch_size: CALL_BATCH_SIZE,
        }
    }
}

impl CypherExporter {
    pub fn export(&self, graph: &KnowledgeGraph, generated_at: DateTime<Utc>) -> ExportScript {
        let classes = graph.classes();
        let methods = graph.methods();
        let edges = graph.edges();
        let mappings = graph.implementations();

        let script = ExportScript {
            project: graph.project().to_string(),
            generated_at,
            class_batches: batches(
                classes.iter().map(class_row),
                self.class_batch_size,
                CLASS_MERGE,
            ),
            method_batches: batches(
                methods.iter().map(method_row),
                self.method_batch_size,
                METHOD_MERGE,
            ),
            containment: (!methods.is_empty()).then_some(CONTAINS_STATEMENT),
            call_batches: batches(edges.iter().map(call_row), self.call_batch_size, CALL_MERGE),
            implemented_by_batches: batches(
                mappings.iter().map(implementation_row),
                self.call_batch_size,
                IMPLEMENTED_BY_MERGE,
            ),
            hierarchy: if classes.is_empty() {
                Vec::new()
            } else {
                vec![EXTENDS_STATEMENT, IMPLEMENTS_STATEMENT]
            },
        };

        tracing::debug!(
            classes = script.class_rows(),
            methods = script.method_rows(),
            calls = script.call_rows(),
            "Exported graph to Cypher"
        );
        script
    }
}

fn batches(rows: impl Iterator<Item = String>, size: usize, body: &'static str) -> Vec<Batch> {
    let rows: Vec<String> = rows.collect();
    rows.chunks(size.max(1))
        .map(|chunk| Batch {
            rows: chunk.to_vec(),
            body,
        })
        .collect()
}

fn class_row(class: &ClassBlock) -> String {
    MapLiteral::new()
        .str("id", &class.id)
        .str("name", &class.name)
        .str("simpleName", &class.simple_name)
        .str("package", &class.package)
        .str("layer", class.layer.as_str())
        .str("businessDomain", class.business_domain.as_str())
        .opt_str("superClass", class.super_class.as_deref())
        .list("interfaces", &class.interfaces)
        .list("annotations", &class.annotations)
        .bool("isAbstract", class.is_abstract)
        .bool("isInterface", class.is_interface)
        .int("methodCount", class.method_count as i64)
        .opt_str("filePath", class.file_path.as_deref())
        .int("crossCount", class.cross_count as i64)
        .float("weight", class.weight)
        .render()
}

fn method_row(method: &MethodNode) -> String {
    MapLiteral::new()
        .str("id", &method.id)
        .str("classId", &method.class_id)
        .str("name", &method.name)
        .str("signature", &method.signature)
        .str("returnType", &method.return_type)
        .list("parameters", &method.parameters)
        .list("modifiers", &method.modifiers)
        .list("annotations", &method.annotations)
        .bool("isConstructor", method.is_constructor)
        .int("crossCount", method.cross_count as i64)
        .float("weight", method.weight)
        .bool("isRootNode", method.is_root_node)
        .int("depth", method.depth as i64)
        .list("treeIds", &method.tree_ids)
        .render()
}

fn call_row(edge: &CallEdge) -> String {
    MapLiteral::new()
        .str("id", &edge.id)
        .str("fromId", &edge.from_method_id)
        .str("toId", &edge.to_method_id)
        .str("callType", edge.call_type.as_str())
        .float("confidence", edge.confidence)
        .opt_int("lineNumber", edge.line_number.map(i64::from))
        .int("crossCount", edge.cross_count as i64)
        .list("treeIds", &edge.tree_ids)
        .render()
}

fn implementation_row(mapping: &InterfaceImplementationMapping) -> String {
    MapLiteral::new()
        .str("interfaceId", &mapping.interface_method_id)
        .str("implementationId", &mapping.implementation_method_id)
        .render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use callscope_core::graph::model::{Layer, MethodNode};
    use callscope_core::CallTreeBuilder;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).single().unwrap()
    }

    fn order_graph() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new("shop");
        graph.add_class(ClassBlock::new(
            "c-ctl",
            "com.shop.web.OrderController",
            Layer::Controller,
        ));
        graph.add_class(ClassBlock::new("c-svc", "com.shop.service.OrderService", Layer::Service));
        let place = MethodNode::new("m-place", "c-ctl", "placeOrder");
        let create = MethodNode::new("m-create", "c-svc", "createOrder");
        graph.add_method(place.clone()).unwrap();
        graph.add_method(create.clone()).unwrap();
        graph.add_edge(CallEdge::new(&place, &create)).unwrap();
        CallTreeBuilder::default().build(&mut graph).unwrap();
        graph
    }

    fn wide_graph(classes: usize, methods_per_class: usize) -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new("wide");
        let mut previous: Option<MethodNode> = None;
        for c in 0..classes {
            let class_id = format!("c{c:03}");
            graph.add_class(ClassBlock::new(&class_id, format!("w.Class{c}"), Layer::Service));
            for m in 0..methods_per_class {
                let method =
                    MethodNode::new(format!("{class_id}-m{m:02}"), &class_id, format!("run{m}"));
                graph.add_method(method.clone()).unwrap();
                if let Some(prev) = &previous {
                    graph.add_edge(CallEdge::new(prev, &method)).unwrap();
                }
                previous = Some(method);
            }
        }
        graph
    }

    fn position(text: &str, needle: &str) -> usize {
        text.find(needle).unwrap_or_else(|| panic!("missing {needle}"))
    }

    #[test]
    fn test_section_order() {
        let text = CypherExporter::default().export(&order_graph(), at(9)).render();
        let order = [
            "// Generated: 2026-03-01T09:00:00Z",
            "MATCH (n) DETACH DELETE n;",
            "CREATE INDEX class_name",
            "CREATE CONSTRAINT class_id",
            "MERGE (c:Class {id: row.id})",
            "MERGE (m:Method {id: row.id})",
            "MERGE (c)-[:CONTAINS]->(m);",
            "MERGE (a)-[r:CALLS {id: row.id}]->(b)",
            "MERGE (c)-[:EXTENDS]->(p);",
            "MERGE (c)-[:IMPLEMENTS]->(i);",
            "// Statistics",
        ];
        let positions: Vec<usize> = order.iter().map(|n| position(&text, n)).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
    }

    #[test]
    fn test_rows_carry_tree_annotations() {
        let text = CypherExporter::default().export(&order_graph(), at(9)).render();
        assert!(text.contains(r#"  {id: "m-place", classId: "c-ctl", name: "placeOrder""#));
        assert!(text.contains(r#"isRootNode: true, depth: 0, treeIds: ["tree:m-place"]}"#));
        assert!(text.contains(concat!(
            r#"{id: "m-place->m-create", fromId: "m-place", toId: "m-create", "#,
            r#"callType: "DIRECT", confidence: 1.0"#,
        )));
    }

    #[test]
    fn test_rows_keep_graph_order() {
        let mut graph = KnowledgeGraph::new("order");
        graph.add_class(ClassBlock::new("c-b", "x.Beta", Layer::Service));
        graph.add_class(ClassBlock::new("c-a", "x.Alpha", Layer::Service));
        let late = MethodNode::new("m-z", "c-b", "zeta");
        let early = MethodNode::new("m-a", "c-a", "alpha");
        graph.add_method(late.clone()).unwrap();
        graph.add_method(early.clone()).unwrap();
        graph.add_edge(CallEdge::new(&late, &early)).unwrap();
        graph.add_edge(CallEdge::new(&early, &late)).unwrap();
        // Re-adding keeps the original slot.
        graph.add_class(ClassBlock::new("c-b", "x.Beta", Layer::Service));

        let script = CypherExporter::default().export(&graph, at(9));
        let ids = |batches: &[Batch]| -> Vec<String> {
            batches
                .iter()
                .flat_map(|b| &b.rows)
                .map(|row| row.split('"').nth(1).unwrap_or_default().to_string())
                .collect()
        };
        assert_eq!(ids(&script.class_batches), vec!["c-b", "c-a"]);
        assert_eq!(ids(&script.method_batches), vec!["m-z", "m-a"]);
        assert_eq!(ids(&script.call_batches), vec!["m-z->m-a", "m-a->m-z"]);
    }

    #[test]
    fn test_batch_sizes() {
        let script = CypherExporter::default().export(&wide_graph(120, 2), at(9));
        let class_rows: Vec<usize> = script.class_batches.iter().map(|b| b.rows.len()).collect();
        assert_eq!(class_rows, vec![50, 50, 20]);
        assert_eq!(script.method_batches.len(), 5);
        assert_eq!(script.call_rows(), 239);
        assert_eq!(script.call_batches.len(), 3);
        assert_eq!(script.call_batches[2].rows.len(), 39);
    }

    #[test]
    fn test_one_row_per_line() {
        let graph = wide_graph(7, 3);
        let text = CypherExporter::default().export(&graph, at(9)).render();
        let row_lines = |prefix: &str| text.lines().filter(|l| l.starts_with(prefix)).count();
        let entities = graph.classes().len() + graph.methods().len() + graph.edges().len();
        assert_eq!(row_lines("  {id: \"c"), entities);
        assert_eq!(text.lines().filter(|l| l.contains("simpleName:")).count(), 7);
    }

    #[test]
    fn test_reexport_differs_only_in_timestamp() {
        let graph = order_graph();
        let exporter = CypherExporter::default();
        let first = exporter.export(&graph, at(9)).render();
        let second = exporter.export(&graph, at(17)).render();

        let diff: Vec<(&str, &str)> = first
            .lines()
            .zip(second.lines())
            .filter(|(a, b)| a != b)
            .collect();
        assert_eq!(diff.len(), 1);
        assert!(diff[0].0.starts_with("// Generated:"));
        assert_eq!(first.lines().count(), second.lines().count());
    }

    #[test]
    fn test_empty_graph_script() {
        let script = CypherExporter::default().export(&KnowledgeGraph::new("empty"), at(9));
        let text = script.render();
        assert!(text.contains("MATCH (n) DETACH DELETE n;"));
        assert!(text.contains("CREATE CONSTRAINT method_id"));
        assert!(!text.contains("UNWIND"));
        assert!(!text.contains("CONTAINS"));
        assert_eq!(
            script.statements().len(),
            1 + INDEX_STATEMENTS.len() + CONSTRAINT_STATEMENTS.len()
        );
    }

    #[test]
    fn test_hostile_names_are_escaped() {
        let mut graph = KnowledgeGraph::new("q");
        let mut class = ClassBlock::new("c'1", r#"x.Weird"Name\Class"#, Layer::Util);
        class.annotations = vec![r#"@Value("${a}")"#.to_string()];
        graph.add_class(class);
        let text = CypherExporter::default().export(&graph, at(9)).render();
        assert!(text.contains(r#"{id: "c\'1", name: "x.Weird\"Name\\Class""#));
        assert!(text.contains(r#"annotations: ["@Value(\"${a}\")"]"#));
    }

    #[test]
    fn test_statements_have_no_terminators() {
        let script = CypherExporter::default().export(&order_graph(), at(9));
        assert!(script.statements().iter().all(|s| !s.trim_end().ends_with(';')));
        assert_eq!(script.statements()[0], RESET_STATEMENT);
    }
}
