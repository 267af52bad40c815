//! Terminal output formatting.

use colored::{ColoredString, Colorize};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use callscope_core::graph::stats::GraphStatistics;
use callscope_core::query::model::{
    BlastRadius, CallPathChain, ClassArchitecture, MethodCalls, MethodKey,
};
use callscope_core::{KnowledgeGraph, ScoredCallPath};

/// Get terminal width, defaulting to 100.
fn term_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(100)
}

/// Pad a plain string to a given visual width (right-padded).
fn pad_right(s: &str, width: usize) -> String {
    let visual = UnicodeWidthStr::width(s);
    if visual >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - visual))
    }
}

/// Truncate a string respecting visual width, keeping the tail.
///
/// Call paths end in the method that matters, so the head is dropped.
fn truncate_left(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    if max_width <= 2 {
        return ".".repeat(max_width);
    }
    let mut kept = Vec::new();
    let mut current_width = 0;
    for ch in s.chars().rev() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if current_width + ch_width > max_width - 2 {
            break;
        }
        kept.push(ch);
        current_width += ch_width;
    }
    let tail: String = kept.into_iter().rev().collect();
    format!("..{}", tail)
}

/// Drop the package from a qualified class name.
fn simple(class_name: &str) -> &str {
    class_name.rsplit('.').next().unwrap_or(class_name)
}

fn short_key(key: &MethodKey) -> String {
    format!("{}.{}", simple(&key.class_name), key.method_name)
}

fn score_colored(score: f64) -> ColoredString {
    let text = format!("{:>6.2}", score);
    if score >= 70.0 {
        text.red().bold()
    } else if score >= 40.0 {
        text.yellow()
    } else {
        text.green()
    }
}

/// Print call trees, largest first.
pub fn print_trees(graph: &KnowledgeGraph) {
    let mut trees: Vec<_> = graph.trees().iter().collect();
    if trees.is_empty() {
        println!("{}", "No entry points found.".dimmed());
        return;
    }
    trees.sort_by(|a, b| b.node_count.cmp(&a.node_count).then(a.name.cmp(&b.name)));

    println!("{:<40} {:>6} {:>6} {:>6} {:>6}", "TREE", "DEPTH", "NODES", "CROSS", "PATHS");
    println!("{}", "─".repeat(68));
    for tree in &trees {
        let name = pad_right(&truncate_left(&tree.name, 40), 40);
        let marker = if tree.depth_limited { " ↻".yellow() } else { "".normal() };
        println!(
            "{} {:>6} {:>6} {:>6} {:>6}{}",
            name.cyan(),
            tree.depth,
            tree.node_count,
            tree.cross_node_count,
            tree.path_count,
            marker
        );
    }
    println!();
    println!(
        "{} tree(s), {} core path(s)",
        trees.len().to_string().bold(),
        graph.core_paths().len().to_string().bold()
    );
    if trees.iter().any(|t| t.depth_limited) {
        println!("{}", "↻ traversal stopped at a cycle or the depth cap".dimmed());
    }
}

pub fn print_statistics(project: &str, stats: &GraphStatistics) {
    println!("{} {}", "Graph statistics".bold(), format!("({})", project).dimmed());
    println!("{}", "─".repeat(40));
    println!("  Classes:           {}", stats.class_count.to_string().cyan());
    println!("  Methods:           {}", stats.method_count.to_string().cyan());
    println!("  Calls:             {}", stats.edge_count.to_string().cyan());
    println!("  Call trees:        {}", stats.tree_count.to_string().cyan());
    println!("  Core paths:        {}", stats.core_path_count.to_string().cyan());
    println!("  Cross nodes:       {}", stats.cross_node_count.to_string().cyan());
    println!("  Methods per class: {:.2}", stats.avg_methods_per_class);
    println!("  Avg tree depth:    {:.2}", stats.avg_tree_depth);

    println!("\n{}", "Layers".bold());
    for (layer, count) in &stats.layer_distribution {
        println!("  {} {}", pad_right(layer.as_str(), 12), count);
    }
    println!("\n{}", "Call types".bold());
    for (call_type, count) in &stats.call_type_distribution {
        println!("  {} {}", pad_right(call_type.as_str(), 18), count);
    }
    println!("\n{}", "Business domains".bold());
    for (domain, count) in &stats.domain_distribution {
        println!("  {} {}", pad_right(domain.as_str(), 12), count);
    }
}

/// Print scored paths as a table.
pub fn print_scores(scored: &[ScoredCallPath]) {
    if scored.is_empty() {
        println!("{}", "No call paths to score.".dimmed());
        return;
    }

    let path_width = term_width().saturating_sub(18).max(20);
    println!("{:>6} {:>6}   {}", "INTENT", "RISK", "PATH");
    println!("{}", "─".repeat((path_width + 16).min(120)));

    for result in scored {
        let rendered: Vec<String> = result.path.steps.iter().map(short_key).collect();
        let path = truncate_left(&rendered.join(" → "), path_width);
        let flag = if result.is_degraded() { "!".yellow().bold() } else { " ".normal() };
        println!(
            "{} {} {} {}",
            score_colored(result.intent.score),
            score_colored(result.risk.score),
            flag,
            path
        );
    }

    let degraded = scored.iter().filter(|s| s.is_degraded()).count();
    println!();
    println!("{} path(s) scored", scored.len().to_string().bold());
    if degraded > 0 {
        println!(
            "{} {} path(s) scored with failed queries; their sub-scores are incomplete",
            "!".yellow().bold(),
            degraded
        );
    }
}

pub fn print_method_calls(title: &str, class: &str, method: &str, calls: &MethodCalls) {
    println!("{} {}.{}", format!("{} of", title).bold(), simple(class).cyan(), method.yellow());
    println!("{}", "─".repeat(50));

    if calls.calls.is_empty() {
        println!("{}", "None found.".dimmed());
        return;
    }
    for site in &calls.calls {
        println!(
            "  {} {} [{}] ×{}",
            "→".dimmed(),
            format!("{}.{}", simple(&site.class_name), site.method_name),
            site.layer.as_str().dimmed(),
            site.call_count
        );
    }
    println!();
    let layers: Vec<String> = calls
        .layer_distribution
        .iter()
        .map(|(layer, count)| format!("{} {}", layer.as_str(), count))
        .collect();
    println!("{} call(s) total; {}", calls.total_count.to_string().bold(), layers.join(", "));
}

pub fn print_architecture(arch: &ClassArchitecture) {
    if !arch.found {
        println!("{} {}", "Class not found:".red(), arch.class_name);
        return;
    }

    let mut kind = Vec::new();
    if arch.is_interface {
        kind.push("interface");
    }
    if arch.is_abstract {
        kind.push("abstract");
    }
    let kind = if kind.is_empty() { String::new() } else { format!(" ({})", kind.join(", ")) };

    println!("{}{}", arch.class_name.cyan().bold(), kind.dimmed());
    println!("  Layer:        {}", arch.layer.as_str().yellow());
    if !arch.parent_types.is_empty() {
        println!("  Extends:      {}", arch.parent_types.join(" → "));
    }
    if !arch.interfaces.is_empty() {
        println!("  Implements:   {}", arch.interfaces.join(", "));
    }
    println!("  Dependencies: {}", arch.dependencies.len());
    for dependency in &arch.dependencies {
        println!("    {} {}", "•".dimmed(), dependency);
    }
}

pub fn print_chain(chain: &CallPathChain) {
    if !chain.found {
        println!("{}", "No call path within the hop limit.".dimmed());
        return;
    }

    for (i, step) in chain.steps.iter().enumerate() {
        if i > 0 {
            let call_type = chain.edge_types.get(i - 1).map(|t| t.as_str()).unwrap_or("DIRECT");
            println!("    {} {}", "│".dimmed(), call_type.dimmed());
        }
        println!(
            "  {} {}.{} [{}]",
            "●".cyan(),
            simple(&step.class_name),
            step.method_name,
            step.layer.as_str().dimmed()
        );
    }
    println!();
    println!("{} hop(s)", chain.hops.to_string().bold());
    if chain.has_layer_violation {
        println!("{}", "Layer violation on this path".red().bold());
    }
}

pub fn print_blast_radius(class: &str, method: &str, blast: &BlastRadius) {
    println!("{} {}.{}", "Blast radius of".bold(), simple(class).cyan(), method.yellow());
    println!("{}", "─".repeat(50));

    let groups = [
        ("Direct callers", &blast.direct_callers),
        ("Indirect callers", &blast.indirect_callers),
        ("Direct callees", &blast.direct_callees),
        ("Indirect callees", &blast.indirect_callees),
    ];
    for (label, keys) in groups {
        println!("{} ({}):", label.bold(), keys.len());
        for key in keys {
            println!("  {} {}", "•".dimmed(), short_key(key));
        }
    }

    let layers: Vec<&str> = blast.layers_touched.iter().map(|l| l.as_str()).collect();
    println!();
    println!("  Layers touched: {}", layers.join(", "));
    println!("  Classes:        {}", blast.total_classes);
    println!("  Influence:      {}", blast.influence().to_string().bold());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_left_keeps_tail() {
        assert_eq!(truncate_left("OrderController.placeOrder", 40), "OrderController.placeOrder");
        assert_eq!(truncate_left("a → b → c", 5), "..→ c");
        assert_eq!(truncate_left("abcdef", 2), "..");
    }

    #[test]
    fn test_pad_right_uses_visual_width() {
        assert_eq!(pad_right("ab", 4), "ab  ");
        assert_eq!(pad_right("→", 3), "→  ");
        assert_eq!(pad_right("abcdef", 3), "abcdef");
    }

    #[test]
    fn test_simple_name() {
        assert_eq!(simple("com.shop.web.OrderController"), "OrderController");
        assert_eq!(simple("Plain"), "Plain");
    }
}
