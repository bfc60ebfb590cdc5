use anyhow::Result;
use clap::{Parser, Subcommand};
use indexer::ingest::{build_until, collect_html_files};
use query_core::persist::{load_index, save_index, IndexPaths};
use query_core::QueryEngine;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query a boolean/phrase web index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from an HTML file or a directory of HTML files
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long, default_value = "./index")]
        output: String,
        /// Number of worker threads, each building its own partition
        #[arg(long, default_value_t = 4)]
        workers: usize,
    },
    /// Run one query against a saved index and print the matching URLs
    Query {
        /// Index directory
        #[arg(long, default_value = "./index")]
        index: String,
        /// Query expression, e.g. `"i am forced" & !mistress`
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, workers } => build_index(&input, &output, workers).await,
        Commands::Query { index, query } => run_query(&index, &query),
    }
}

async fn build_index(input: &str, output: &str, workers: usize) -> Result<()> {
    let files = collect_html_files(Path::new(input))?;
    tracing::info!(files = files.len(), workers, "indexing");
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let (index, cancelled) = build_until(files, workers, ctrl_c).await?;
    save_index(&IndexPaths::new(output), &index)?;
    tracing::info!(output, cancelled, "index build complete");
    Ok(())
}

fn run_query(index_dir: &str, query: &str) -> Result<()> {
    let index = load_index(&IndexPaths::new(index_dir))?;
    let engine = QueryEngine::from_index(&index);
    let pages = engine.query_pages(query)?;
    for page in &pages {
        println!("{}", page.url());
    }
    tracing::info!(query, hits = pages.len(), "query complete");
    Ok(())
}
