//! Codearc CLI: call-graph analysis and change-impact queries.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use codearc_core::config::AnalysisConfig;
use codearc_core::output::{default_output_path, write_output};
use codearc_core::pipeline::{AnalysisSummary, ProgressCallback};
use codearc_core::session::AnalysisSession;

#[derive(Parser)]
#[command(
    name = "codearc",
    about = "Codearc - Map function calls, clusters and change impact in a codebase"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse a source tree and write the clustered call graph as JSON
    Analyze {
        /// Root directory to analyse
        path: PathBuf,

        /// Source language (java, python, rust, go, typescript, javascript)
        #[arg(short, long, default_value = "java")]
        language: String,

        /// Output JSON file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Louvain resolution parameter
        #[arg(long, default_value = "1.0")]
        resolution: f64,

        /// Largest cluster before it is split
        #[arg(long, default_value = "50")]
        max_cluster_size: usize,

        /// Additional directory or file names to exclude
        #[arg(long)]
        exclude: Vec<String>,

        /// Show phase timings and warnings
        #[arg(long)]
        verbose: bool,

        /// Suppress all output except errors
        #[arg(long)]
        quiet: bool,
    },

    /// Show which functions are affected by a change to one function
    Impact {
        /// Root directory to analyse
        path: PathBuf,

        /// Node id, e.g. `src/Orders.java::Orders.place()`
        #[arg(short, long)]
        node: String,

        /// Source language
        #[arg(short, long, default_value = "java")]
        language: String,

        /// File holding the new code for the node
        #[arg(long)]
        code_file: Option<PathBuf>,

        /// Follow callers transitively up to this many hops
        #[arg(long, default_value = "1")]
        depth: usize,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            path,
            language,
            output,
            resolution,
            max_cluster_size,
            exclude,
            verbose,
            quiet,
        } => {
            let output_path = output.unwrap_or_else(|| default_output_path(&path));
            let config = AnalysisConfig {
                root: path,
                language,
                resolution,
                max_cluster_size,
                exclude_patterns: exclude,
                verbose,
                quiet,
                ..Default::default()
            };
            run_analyze(config, &output_path);
        }
        Commands::Impact {
            path,
            node,
            language,
            code_file,
            depth,
            json,
        } => run_impact(AnalysisConfig::new(path, &language), &node, code_file, depth, json),
    }
}

fn fail(context: &str, e: impl std::fmt::Display) -> ! {
    eprintln!("{} {context}: {e}", style("error:").red().bold());
    process::exit(1);
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message("Initialising...");
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Run the pipeline, with a spinner unless `quiet`.
fn analyse(session: &AnalysisSession, config: AnalysisConfig, quiet: bool) -> AnalysisSummary {
    if quiet {
        return session
            .begin_analysis(config)
            .unwrap_or_else(|e| fail("analysis failed", e));
    }

    let pb = spinner();
    let progress: ProgressCallback = {
        let pb = pb.clone();
        Box::new(move |_name, label| {
            pb.set_message(label.to_string());
        })
    };
    let result = session.begin_analysis_with_progress(config, Some(progress));
    pb.finish_and_clear();
    result.unwrap_or_else(|e| fail("analysis failed", e))
}

fn root_name(root: &Path) -> String {
    root.canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| root.display().to_string())
}

fn run_analyze(config: AnalysisConfig, output_path: &Path) {
    let quiet = config.quiet;
    let verbose = config.verbose;
    let name = root_name(&config.root);

    let session = AnalysisSession::new();
    let summary = analyse(&session, config, quiet);

    let Some(report) = session.report() else {
        fail("analysis failed", "no snapshot was published")
    };
    if let Err(e) = write_output(&report, output_path) {
        fail("writing output", e);
    }
    if quiet {
        return;
    }

    println!(
        "\n{}  Codearc Analysis: {}",
        style("✓").green().bold(),
        style(name).bold()
    );
    println!("  {:<14} {}", "Files:", summary.file_count);
    println!("  {:<14} {}", "Functions:", summary.node_count);
    println!("  {:<14} {}", "Calls:", summary.edge_count);
    println!("  {:<14} {}", "Clusters:", summary.cluster_count);
    println!("  {:<14} {}", "Warnings:", summary.warnings.len());
    println!("  {:<14} {:.1}ms", "Duration:", summary.duration_ms);

    if verbose {
        println!("\n  Phase Timings:");
        for (phase, secs) in &summary.phase_timings {
            println!("    {:<14} {:.1}ms", phase, secs * 1000.0);
        }
        if !summary.warnings.is_empty() {
            println!("\n  Warnings:");
            for warning in &summary.warnings {
                println!("    {}", style(warning).yellow());
            }
        }
    }

    println!(
        "\n  {} {}",
        style("Output written to:").green(),
        output_path.display()
    );
}

fn run_impact(config: AnalysisConfig, node: &str, code_file: Option<PathBuf>, depth: usize, json: bool) {
    let session = AnalysisSession::new();
    analyse(&session, config, json);

    let callers = match code_file {
        Some(path) => {
            let code = std::fs::read_to_string(&path)
                .unwrap_or_else(|e| fail(&format!("reading {}", path.display()), e));
            session
                .update_code(node, &code)
                .map(|r| r.affected_nodes)
                .unwrap_or_else(|e| fail("update failed", e))
        }
        None => session
            .predecessors(node)
            .unwrap_or_else(|e| fail("lookup failed", e)),
    };
    let radius = if depth > 1 {
        Some(
            session
                .impact_radius(node, depth)
                .unwrap_or_else(|e| fail("lookup failed", e)),
        )
    } else {
        None
    };

    if json {
        let value = serde_json::json!({
            "node": node,
            "affected_nodes": callers,
            "impact_radius": radius,
        });
        match serde_json::to_string_pretty(&value) {
            Ok(text) => println!("{text}"),
            Err(e) => fail("serialising result", e),
        }
        return;
    }

    println!("\n{}  Impact of {}", style("✓").green().bold(), style(node).bold());
    println!("  {:<14} {}", "Direct callers:", callers.len());
    for caller in &callers {
        println!("    {caller}");
    }
    if let Some(radius) = radius {
        println!("\n  Within {depth} hops: {}", radius.len());
        for (id, hops) in &radius {
            println!("    {:<3} {id}", hops);
        }
    }
}
