// Copyright 2026 Periscope Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use periscope_runtime::query::engine::{EngineConfig, QueryEngine};
use periscope_runtime::query::model::Query;
use periscope_runtime::query::result::QueryResult;
use periscope_runtime::redfish::cache::CachedTransport;
use periscope_runtime::redfish::transport::{HttpTransport, Transport};
use periscope_runtime::redfish::RedfishService;
use periscope_runtime::time::SystemClock;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "periscope",
    about = "Periscope — declarative platform telemetry over Redfish",
    version,
    after_help = "Run 'periscope <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute query files against a Redfish service
    Run {
        /// Base URL of the service (e.g. "https://10.0.0.7")
        #[arg(long)]
        service: String,
        /// Query files in JSON wire form
        #[arg(required = true)]
        queries: Vec<PathBuf>,
        /// Execute only these query ids (repeatable; default: all)
        #[arg(long = "id")]
        ids: Vec<String>,
        /// Response cache TTL in seconds (0 disables caching)
        #[arg(long, default_value = "30")]
        cache_ttl: i64,
        /// Per-request timeout in milliseconds
        #[arg(long, default_value = "10000")]
        timeout: u64,
        /// Stamp each record with the matched resource's URI
        #[arg(long)]
        annotate_location: bool,
    },
    /// Fetch a single resource and print its JSON body
    Get {
        /// Base URL of the service
        #[arg(long)]
        service: String,
        /// Service-relative URI (e.g. "/redfish/v1/Chassis")
        path: String,
        /// Per-request timeout in milliseconds
        #[arg(long, default_value = "10000")]
        timeout: u64,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let result = match &cli.command {
        Commands::Run {
            service,
            queries,
            ids,
            cache_ttl,
            timeout,
            annotate_location,
        } => run(
            service,
            queries,
            ids,
            *cache_ttl,
            *timeout,
            *annotate_location,
            cli.json,
        ),
        Commands::Get {
            service,
            path,
            timeout,
        } => get(service, path, *timeout),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "periscope", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error.
    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }
    result
}

fn load_queries(files: &[PathBuf]) -> Result<Vec<Query>> {
    let mut queries = Vec::with_capacity(files.len());
    for file in files {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read query file {}", file.display()))?;
        let query = Query::from_json(&text)
            .with_context(|| format!("failed to parse query file {}", file.display()))?;
        queries.push(query);
    }
    Ok(queries)
}

fn run(
    service_url: &str,
    query_files: &[PathBuf],
    ids: &[String],
    cache_ttl: i64,
    timeout_ms: u64,
    annotate_location: bool,
    json: bool,
) -> Result<()> {
    let queries = load_queries(query_files)?;
    let clock = Arc::new(SystemClock);

    let http = HttpTransport::new(service_url, timeout_ms)
        .with_context(|| format!("failed to set up transport for {service_url}"))?;
    let service = if cache_ttl > 0 {
        RedfishService::new(CachedTransport::new(
            http,
            clock.clone(),
            ChronoDuration::seconds(cache_ttl),
        ))
    } else {
        RedfishService::new(http)
    };

    let engine = QueryEngine::new(
        queries,
        service,
        clock,
        EngineConfig { annotate_location },
    );

    let results = if ids.is_empty() {
        engine.execute_all()
    } else {
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        engine.execute(&ids)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for result in &results {
            print_result(result);
        }
    }
    Ok(())
}

fn print_result(result: &QueryResult) {
    println!("Query {}:", result.query_ids.join(", "));
    if result.records_by_subquery_id.is_empty() {
        println!("  (no subqueries)");
        return;
    }
    for (subquery_id, set) in &result.records_by_subquery_id {
        println!("  {} — {} record(s)", subquery_id, set.records.len());
        for record in &set.records {
            let fields: Vec<String> = record
                .iter()
                .map(|(key, value)| {
                    format!(
                        "{key}={}",
                        serde_json::to_string(value).unwrap_or_else(|_| "?".to_string())
                    )
                })
                .collect();
            println!("    {}", fields.join("  "));
        }
    }
}

fn get(service_url: &str, path: &str, timeout_ms: u64) -> Result<()> {
    let transport = HttpTransport::new(service_url, timeout_ms)
        .with_context(|| format!("failed to set up transport for {service_url}"))?;
    let response = transport.get(path)?;
    if !response.is_success() {
        anyhow::bail!("service answered {} for {path}", response.code);
    }
    match response.body.as_json() {
        Some(body) => println!("{}", serde_json::to_string_pretty(body)?),
        None => anyhow::bail!("resource at {path} is not JSON"),
    }
    Ok(())
}
