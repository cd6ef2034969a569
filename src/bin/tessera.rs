//! Tessera CLI: query a content relationship graph database.
//!
//! Usage:
//!   tessera stats [--db path]
//!   tessera rank [--top n]
//!   tessera related <id> [--depth n] [--limit n] [--rel type]...
//!   tessera path <source> <target> [--max-depth n] [--all]
//!   tessera export [--format node-link|cytoscape] [--node id]... [--out file]
//!   tessera timeline <id> [--window-hours n] [--related]
//!   tessera cache-stats | clear-cache [--older-than-hours n]

use chrono::{DateTime, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tessera::query::{DEFAULT_EXPORT_NODES, TimelineEntry};
use tessera::similarity::summarize;
use tessera::{
    ContentGraph, ExportFormat, GraphTraversal, OpenStore, PageRankConfig, SimilarityCache, SqliteStore,
    TesseraConfig,
};
use tracing::Level;

#[derive(Parser)]
#[command(name = "tessera", version, about = "Content relationship graph")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Node and edge counts by type
    Stats,
    /// Most central content by PageRank
    Rank {
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Content related to a node, scored by strength and distance
    Related {
        id: String,
        #[arg(long, default_value_t = 2)]
        depth: usize,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Only follow these relationship types
        #[arg(long = "rel")]
        relationships: Vec<String>,
    },
    /// Shortest path (or all simple paths) between two nodes
    Path {
        source: String,
        target: String,
        #[arg(long, default_value_t = 5)]
        max_depth: usize,
        /// List every simple path instead of the shortest
        #[arg(long)]
        all: bool,
        #[arg(long, default_value_t = 10)]
        max_paths: usize,
    },
    /// Export a subgraph as JSON for visualization
    Export {
        #[arg(long, default_value = "node-link")]
        format: ExportFormat,
        /// Content ids to include (default: top nodes by PageRank)
        #[arg(long = "node")]
        nodes: Vec<String>,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Temporal neighbourhood of a node
    Timeline {
        id: String,
        #[arg(long = "window-hours", value_parser = parse_hours)]
        window: Option<TimeDelta>,
        /// Also list related content
        #[arg(long)]
        related: bool,
    },
    /// Similarity cache statistics
    CacheStats,
    /// Remove cached similarity scores
    ClearCache {
        /// Only remove entries older than this many hours
        #[arg(long = "older-than-hours", value_parser = parse_hours)]
        older_than: Option<TimeDelta>,
    },
}

/// Non-negative hour count that fits chrono's duration range
fn parse_hours(s: &str) -> Result<TimeDelta, String> {
    let hours: i64 = s.parse().map_err(|e| format!("invalid hour count '{}': {}", s, e))?;
    if hours < 0 {
        return Err(format!("hour count must not be negative, got {}", hours));
    }
    TimeDelta::try_hours(hours).ok_or_else(|| format!("hour count {} is out of range", hours))
}

/// Get the default database path (~/.local/share/tessera/tessera.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let tessera_dir = data_dir.join("tessera");
    std::fs::create_dir_all(&tessera_dir).ok();
    tessera_dir.join("tessera.db")
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<TesseraConfig, String> {
    match path {
        Some(path) => TesseraConfig::load(&path).map_err(|e| format!("Failed to load {}: {}", path.display(), e)),
        None => Ok(TesseraConfig::default()),
    }
}

fn open_store(db: Option<PathBuf>, config: &TesseraConfig) -> Result<Arc<SqliteStore>, String> {
    let db_path = db
        .or_else(|| config.database.clone())
        .unwrap_or_else(default_db_path);
    let store = SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    Ok(Arc::new(store))
}

fn print_json(value: &impl serde::Serialize) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_stats(store: Arc<SqliteStore>) -> i32 {
    let graph = ContentGraph::new(store.clone(), store);
    let stats = match graph.graph_stats() {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    println!("Nodes: {}", stats.node_count);
    for (content_type, count) in &stats.nodes_by_type {
        println!("  {:<24} {:>7}", content_type, count);
    }
    println!("Edges: {}", stats.edge_count);
    for (relationship, count) in &stats.edges_by_relationship {
        println!("  {:<24} {:>7}", relationship, count);
    }
    0
}

fn cmd_rank(traversal: &GraphTraversal, top: usize) -> i32 {
    match traversal.pagerank(&PageRankConfig::default()) {
        Ok(result) => {
            if result.scores.is_empty() {
                println!("Graph is empty.");
                return 0;
            }
            if !result.converged {
                eprintln!("Warning: PageRank did not converge after {} iterations", result.iterations);
            }
            println!("{:<48}  {:>10}", "CONTENT", "PAGERANK");
            println!("{}", "-".repeat(60));
            for (content_id, score) in result.top(top) {
                println!("{:<48}  {:>10.6}", content_id, score);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_related(traversal: &GraphTraversal, id: &str, depth: usize, limit: usize, relationships: &[String]) -> i32 {
    let filter: Vec<&str> = relationships.iter().map(String::as_str).collect();
    let filter = (!filter.is_empty()).then_some(filter.as_slice());
    match traversal.find_related_content(id, filter, depth, limit) {
        Ok(items) if items.is_empty() => {
            println!("No related content for '{}'.", id);
            0
        }
        Ok(items) => {
            println!("{:<40}  {:>5}  {:>7}  {}", "CONTENT", "DEPTH", "SCORE", "VIA");
            println!("{}", "-".repeat(72));
            for item in items {
                println!(
                    "{:<40}  {:>5}  {:>7.4}  {}",
                    item.content_id,
                    item.depth,
                    item.score,
                    item.relationship.as_deref().unwrap_or("-")
                );
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_path(store: Arc<SqliteStore>, source: &str, target: &str, max_depth: usize, all: bool, max_paths: usize) -> i32 {
    if all {
        let traversal = GraphTraversal::new(store);
        return match traversal.find_all_paths(source, target, max_paths, max_depth) {
            Ok(paths) if paths.is_empty() => {
                println!("No path from '{}' to '{}'.", source, target);
                1
            }
            Ok(paths) => {
                for found in paths {
                    println!("[{} hops, avg {:.3}] {}", found.length, found.avg_strength, found.path.join(" -> "));
                }
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        };
    }

    let graph = ContentGraph::new(store.clone(), store);
    match graph.find_shortest_path(source, target, max_depth) {
        Ok(Some(path)) => {
            println!("{}", path.join(" -> "));
            0
        }
        Ok(None) => {
            println!("No path from '{}' to '{}' within {} hops.", source, target, max_depth);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_export(traversal: &GraphTraversal, format: ExportFormat, nodes: &[String], out: Option<PathBuf>) -> i32 {
    let selection = (!nodes.is_empty()).then_some(nodes);
    let value = match traversal.export_for_visualization(selection, format) {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let Some(path) = out else {
        return print_json(&value);
    };
    let text = match serde_json::to_string_pretty(&value) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match std::fs::write(&path, text) {
        Ok(()) => {
            let count = value["nodes"]
                .as_array()
                .or_else(|| value["elements"]["nodes"].as_array())
                .map_or(0, Vec::len);
            if nodes.is_empty() {
                println!("Wrote top {} nodes ({} exported) to {}", DEFAULT_EXPORT_NODES, count, path.display());
            } else {
                println!("Wrote {} nodes to {}", count, path.display());
            }
            0
        }
        Err(e) => {
            eprintln!("Error: cannot write '{}': {}", path.display(), e);
            1
        }
    }
}

fn print_entries(heading: &str, entries: &[TimelineEntry]) {
    if entries.is_empty() {
        return;
    }
    println!("{}:", heading);
    for entry in entries {
        println!("  {}  {:<40}  {}", entry.event_time, entry.content_id, entry.relationship);
    }
}

fn cmd_timeline(traversal: &GraphTraversal, id: &str, window: Option<TimeDelta>, related: bool) -> i32 {
    match traversal.get_timeline_context(id, window, related) {
        Ok(Some(context)) => {
            println!("{} @ {}", context.content_id, context.event_time);
            print_entries("Before", &context.before);
            print_entries("Concurrent", &context.concurrent);
            print_entries("After", &context.after);
            if !context.related.is_empty() {
                println!("Related:");
                for item in &context.related {
                    println!("  {:<40}  {:.4}", item.content_id, item.score);
                }
            }
            0
        }
        Ok(None) => {
            eprintln!("Error: content '{}' not found", id);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_cache_stats(store: &SqliteStore, threshold: f32) -> i32 {
    match store.similarity_scores() {
        Ok(scores) => match summarize(scores, threshold) {
            Some(distribution) => print_json(&distribution),
            None => {
                println!("Similarity cache is empty.");
                0
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_clear_cache(store: &SqliteStore, older_than: Option<TimeDelta>) -> i32 {
    // An age reaching past the calendar keeps everything
    let cutoff = older_than.map(|age| Utc::now().checked_sub_signed(age).unwrap_or(DateTime::<Utc>::MIN_UTC));
    match store.clear_similarities(cutoff) {
        Ok(removed) => {
            println!("Removed {} cached similarity entries", removed);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let store = match open_store(cli.db, &config) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let traversal = GraphTraversal::new(store.clone());

    let code = match cli.command {
        Commands::Stats => cmd_stats(store),
        Commands::Rank { top } => cmd_rank(&traversal, top),
        Commands::Related {
            id,
            depth,
            limit,
            relationships,
        } => cmd_related(&traversal, &id, depth, limit, &relationships),
        Commands::Path {
            source,
            target,
            max_depth,
            all,
            max_paths,
        } => cmd_path(store, &source, &target, max_depth, all, max_paths),
        Commands::Export { format, nodes, out } => cmd_export(&traversal, format, &nodes, out),
        Commands::Timeline {
            id,
            window,
            related,
        } => cmd_timeline(&traversal, &id, window, related),
        Commands::CacheStats => cmd_cache_stats(&store, config.similarity.threshold),
        Commands::ClearCache { older_than } => cmd_clear_cache(&store, older_than),
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hours_out_of_range_are_usage_errors() {
        assert_eq!(parse_hours("6"), Ok(TimeDelta::hours(6)));
        assert!(parse_hours("-1").is_err());
        assert!(parse_hours("9223372036854775807").is_err());
        assert!(parse_hours("soon").is_err());
    }

    #[test]
    fn clear_cache_rejects_huge_age_at_parse_time() {
        let result = Cli::try_parse_from(["tessera", "clear-cache", "--older-than-hours", "9223372036854775807"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from(["tessera", "timeline", "m1", "--window-hours", "48"]).unwrap();
        assert!(matches!(cli.command, Commands::Timeline { window: Some(w), .. } if w == TimeDelta::hours(48)));
    }
}
