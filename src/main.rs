use anyhow::{Context, Result};
use ariadne::closure::ClosureRequest;
use ariadne::config;
use ariadne::pipeline::ImportPipeline;
use ariadne::stats::FilterStats;
use ariadne::titles;
use ariadne::window::WindowLimits;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use rustc_hash::FxHashSet;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "ariadne")]
#[command(about = "Filter Wikipedia dumps down to a category-scoped page list")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the filtered page list for a set of root categories
    Filter(FilterArgs),
    /// Build and persist the relation trees without computing a closure
    BuildTree(BuildTreeArgs),
}

#[derive(Args)]
struct FilterArgs {
    /// Path to the Wikipedia dump file (.xml, .xml.gz or .xml.bz2)
    #[arg(short, long)]
    input: String,

    /// Output file for the page list (one name per line, sorted)
    #[arg(short, long)]
    output: String,

    /// Category recursion depth (0 = just the roots' direct members)
    #[arg(long, default_value_t = config::DEFAULT_RECURSION_DEPTH)]
    recursion_depth: u32,

    /// Maximum revisions to retain per page (-1 = all)
    #[arg(long, default_value_t = -1)]
    max_revisions: i64,

    /// Maximum revision timestamp in ISO 8601; newer revisions are dropped
    #[arg(long)]
    max_time: Option<String>,

    /// File with explicitly allowed page names, one per line
    #[arg(long)]
    allow_list: Option<String>,

    /// Include the root categories themselves in the page list
    #[arg(long)]
    include_root_categories: bool,

    /// Force rebuild of the persisted relation trees
    #[arg(long)]
    no_cache: bool,

    /// Root category names (with or without the Category: prefix)
    #[arg(required = true)]
    root_categories: Vec<String>,
}

#[derive(Args)]
struct BuildTreeArgs {
    /// Path to the Wikipedia dump file (.xml, .xml.gz or .xml.bz2)
    #[arg(short, long)]
    input: String,

    /// Maximum revisions to retain per page (-1 = all)
    #[arg(long, default_value_t = -1)]
    max_revisions: i64,

    /// Maximum revision timestamp in ISO 8601; newer revisions are dropped
    #[arg(long)]
    max_time: Option<String>,

    /// Force rebuild of the persisted relation trees
    #[arg(long)]
    no_cache: bool,
}

fn parse_max_time(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match raw {
        None => Ok(None),
        Some(s) => {
            let parsed = DateTime::parse_from_rfc3339(s)
                .with_context(|| format!("no date in ISO8601: {}", s))?;
            Ok(Some(parsed.with_timezone(&Utc)))
        }
    }
}

/// Default allow pages plus the caller's allow-list file, all normalized.
fn load_allow_list(path: Option<&str>) -> Result<FxHashSet<String>> {
    let mut allowed: FxHashSet<String> = config::DEFAULT_ALLOW_PAGES
        .iter()
        .map(|p| titles::normalize(p))
        .collect();
    if let Some(path) = path {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read allow-list file: {}", path))?;
        for line in content.lines() {
            let line = line.trim();
            if !line.is_empty() {
                allowed.insert(titles::normalize(line));
            }
        }
    }
    Ok(allowed)
}

fn run_filter(args: FilterArgs) -> Result<()> {
    let max_time = parse_max_time(args.max_time.as_deref())?;
    let limits = WindowLimits::from_args(args.max_revisions, max_time);
    let allowed_pages = load_allow_list(args.allow_list.as_deref())?;

    let root_categories: Vec<String> = args
        .root_categories
        .iter()
        .filter(|c| !c.trim().is_empty())
        .map(|c| titles::with_namespace(config::CATEGORY_NAMESPACE, c))
        .collect();
    info!(roots = ?root_categories, "Filtering by categories");

    let request = ClosureRequest {
        root_categories,
        allowed_pages,
        recursion_depth: args.recursion_depth,
        include_roots: args.include_root_categories,
    };

    let stats = FilterStats::new();
    let mut pipeline = ImportPipeline::new(limits, args.no_cache, &stats);

    let start = Instant::now();
    let pages = pipeline.page_list(&args.input, &request)?;
    let duration = start.elapsed();

    let sorted: BTreeSet<&String> = pages.iter().collect();
    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create page list file: {}", args.output))?;
    let mut writer = BufWriter::new(file);
    for page in &sorted {
        writeln!(writer, "{}", page)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write page list file: {}", args.output))?;

    println!();
    println!("=== Summary ===");
    println!("Total time:         {:.2}s", duration.as_secs_f64());
    println!();
    println!("Pages scanned:      {}", stats.pages());
    println!("Redirects:          {}", stats.redirects());
    println!("Revisions kept:     {}", stats.revisions_kept());
    println!("Revisions dropped:  {}", stats.revisions_dropped());
    println!("Template edges:     {}", stats.template_edges());
    println!("Inclusion edges:    {}", stats.include_edges());
    println!("Reference edges:    {}", stats.reference_edges());
    println!("Bad restrictions:   {}", stats.malformed_restrictions());
    println!();
    println!("Pages selected:     {}", sorted.len());

    Ok(())
}

fn run_build_tree(args: BuildTreeArgs) -> Result<()> {
    let max_time = parse_max_time(args.max_time.as_deref())?;
    let limits = WindowLimits::from_args(args.max_revisions, max_time);

    let stats = FilterStats::new();
    let mut pipeline = ImportPipeline::new(limits, args.no_cache, &stats);

    let start = Instant::now();
    let trees = pipeline.trees(&args.input)?;
    let duration = start.elapsed();

    println!();
    println!("=== Summary ===");
    println!("Total time:         {:.2}s", duration.as_secs_f64());
    println!();
    println!("Pages in trees:     {}", trees.references.node_count());
    println!("Template edges:     {}", trees.templates.edge_count());
    println!("Inclusion edges:    {}", trees.includes.edge_count());
    println!("Reference edges:    {}", trees.references.edge_count());

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Filter(args) => run_filter(args),
        Commands::BuildTree(args) => run_build_tree(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
