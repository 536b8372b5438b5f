//! dork-search CLI - parallel proxied search runner.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use dork_search::{Coordinator, DorkConfig, ProxySource, RunResult};

/// dork-search - run niche search queries through a rotating proxy pool
#[derive(Parser)]
#[command(name = "dork-search")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every query for a niche and print the leads
    Run(RunArgs),

    /// Print the queries generated for a niche
    Queries {
        /// Niche term
        niche: String,

        /// JSON configuration file supplying custom templates
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Parser)]
struct RunArgs {
    /// Niche term substituted into the query templates
    niche: String,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short, long)]
    workers: Option<i64>,

    /// Proxies (comma-separated), e.g. 10.0.0.1:8080,socks5://10.0.0.2:1080
    #[arg(short, long, value_delimiter = ',')]
    proxies: Option<Vec<String>>,

    /// Fetch the proxy list from this endpoint instead
    #[arg(long)]
    proxy_endpoint: Option<String>,

    /// Consecutive failures before a proxy is quarantined
    #[arg(long)]
    failure_threshold: Option<u32>,

    /// Quarantine cooldown in seconds
    #[arg(long)]
    cooldown: Option<u64>,

    /// Proxy list refresh interval in seconds (0 = never)
    #[arg(long)]
    refresh: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// One lead per line
    Compact,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Queries { niche, config } => list_queries(&niche, config.as_deref()),
    }
}

fn list_queries(niche: &str, config: Option<&Path>) -> Result<()> {
    let config = match config {
        Some(path) => DorkConfig::from_file(path)?,
        None => DorkConfig::default(),
    };
    for query in config.query_generator()?.generate(niche)? {
        println!("{}", query.text);
    }
    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    let config = build_config(&args)?;
    config.validate()?;

    let coordinator = Coordinator::from_config(&config).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, finishing in-flight requests...");
            on_interrupt.cancel();
        }
    });

    let run = coordinator
        .execute_with_cancellation(&args.niche, config.workers, cancel)
        .await?;

    print_run(&args, &run)
}

fn build_config(args: &RunArgs) -> Result<DorkConfig> {
    let mut config = match &args.config {
        Some(path) => DorkConfig::from_file(path)?,
        None => DorkConfig::default(),
    };

    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(proxies) = &args.proxies {
        config.proxy.source = ProxySource::StaticList;
        config.proxy.proxies = proxies.clone();
    }
    if let Some(endpoint) = &args.proxy_endpoint {
        config.proxy.source = ProxySource::RemoteEndpoint;
        config.proxy.endpoint = Some(endpoint.clone());
    }
    if let Some(threshold) = args.failure_threshold {
        config.proxy.failure_threshold = threshold;
    }
    if let Some(cooldown) = args.cooldown {
        config.proxy.cooldown_seconds = cooldown;
    }
    if let Some(refresh) = args.refresh {
        config.proxy.refresh_interval_seconds = refresh;
    }
    if let Some(timeout) = args.timeout {
        config.request.timeout_seconds = timeout;
    }

    Ok(config)
}

fn print_run(args: &RunArgs, run: &RunResult) -> Result<()> {
    match args.format {
        OutputFormat::Text => {
            println!(
                "\nResults for \"{}\" ({} of {} queries succeeded in {}ms{}):\n",
                args.niche,
                run.succeeded,
                run.planned,
                run.duration_ms,
                if run.cancelled { ", cancelled" } else { "" }
            );

            for result in run.results() {
                let status = if result.success { "ok" } else { "failed" };
                println!("[{}] {}", status, result.query.text);
                if let Some(error) = &result.error {
                    println!("   Error: {}", error);
                }
                for lead in result.leads() {
                    println!("   - {}", lead.title);
                    println!("     {}", lead.url);
                }
                println!();
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(run)?);
        }
        OutputFormat::Compact => {
            for lead in run.leads() {
                println!("{}\t{}\t{}", lead.domain, lead.title, lead.url);
            }
        }
    }

    Ok(())
}
