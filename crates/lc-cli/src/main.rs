//! LinkCleaner CLI
//!
//! CLI tool for unwrapping URLs and checking target tables.

use std::fs;
use std::time::Instant;

use clap::{Parser, Subcommand};

use lc_core::{DomainScope, Rewriter, TargetTable};

#[derive(Parser)]
#[command(name = "lc-cli")]
#[command(about = "LinkCleaner URL unwrapper and target table tools")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Unwrap URLs as they would be rewritten on a page
    Clean {
        /// Host name of the page the links appear on
        #[arg(long, default_value = "")]
        host: String,

        /// Target table JSON file (defaults to the built-in table)
        #[arg(short, long)]
        targets: Option<String>,

        /// URLs to unwrap
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// List targets
    Targets {
        /// Target table JSON file (defaults to the built-in table)
        #[arg(short, long)]
        targets: Option<String>,
    },

    /// Validate a target table file
    Validate {
        /// Target table JSON file
        #[arg(short, long)]
        targets: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Commands::Clean { host, targets, urls } => cmd_clean(&host, targets.as_deref(), &urls),
        Commands::Targets { targets } => cmd_targets(targets.as_deref()),
        Commands::Validate { targets } => cmd_validate(&targets),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_table(path: Option<&str>) -> Result<TargetTable, String> {
    let path = match path {
        Some(path) => path,
        None => return Ok(TargetTable::builtin()),
    };

    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    TargetTable::from_json(&content)
        .map_err(|e| format!("Invalid target table '{}': {}", path, e))
}

fn cmd_clean(host: &str, targets: Option<&str>, urls: &[String]) -> Result<(), String> {
    let table = load_table(targets)?;
    let rewriter = Rewriter::new(&table, host);
    let mut failures = 0usize;

    for url in urls {
        match rewriter.clean(url) {
            Ok(cleaned) => {
                log::debug!("{} layer(s) removed from {}", cleaned.layers, url);
                println!("{}", cleaned.url);
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {}", url, e);
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} of {} URLs could not be unwrapped", failures, urls.len()));
    }
    Ok(())
}

fn cmd_targets(targets: Option<&str>) -> Result<(), String> {
    let table = load_table(targets)?;

    for (index, target) in table.iter().enumerate() {
        let scope = match target.scope() {
            DomainScope::Any => "*".to_string(),
            DomainScope::Hosts(hosts) => hosts.join(","),
        };
        println!(
            "  [{}] {:<24} {}  start={} [{}] end={} [{}]{}",
            index,
            scope,
            target.wrapper().as_str(),
            target.start_delimiter().as_str(),
            target.start_index(),
            target.end_delimiter().as_str(),
            target.end_index(),
            if target.requires_decoding() { " decode" } else { "" },
        );
    }

    Ok(())
}

fn cmd_validate(path: &str) -> Result<(), String> {
    let start = Instant::now();
    let table = load_table(Some(path))?;

    println!("Target table '{}' is valid", path);
    println!("  Targets:     {}", table.len());
    println!("  Global:      {}", table.iter().filter(|t| t.scope() == &DomainScope::Any).count());
    println!("  Time:        {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);

    Ok(())
}
