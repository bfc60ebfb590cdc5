mod robots;

use anyhow::{anyhow, Result};
use clap::Parser;
use indexer::ingest::index_page;
use indexer::markup::{self, Extracted};
use query_core::persist::{save_index, IndexPaths};
use query_core::{Page, WebIndex};
use reqwest::{header, Client, Url};
use robots::{allowed, robots_delay, RobotsCache};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing_subscriber::{fmt, EnvFilter};

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Crawl html pages from seed URLs or files and save a boolean/phrase index")]
struct Cli {
    /// Seed URLs or local file paths
    urls: Vec<String>,
    /// Path to a file with more seeds (one per line)
    #[arg(long)]
    seeds: Option<String>,
    /// Output index directory
    #[arg(long, default_value = "./index")]
    output: String,
    /// Maximum number of pages to index
    #[arg(long, default_value_t = 100_000)]
    max_docs: usize,
    /// Maximum pages to crawl per remote host (politeness)
    #[arg(long, default_value_t = 1_000)]
    max_per_host: usize,
    /// Concurrency (number of in-flight fetches)
    #[arg(long, default_value_t = 16)]
    concurrency: usize,
    /// Request timeout seconds
    #[arg(long, default_value_t = 12)]
    timeout_secs: u64,
    /// User-Agent string to use for robots.txt and crawling
    #[arg(long, default_value = "webquery-bot/0.1 (+https://example.com/bot)")]
    user_agent: String,
    /// Only follow links that stay on the host of the page they were found on
    #[arg(long)]
    same_host_only: bool,
}

#[derive(Default)]
struct Seen { pages: HashSet<String>, per_host: HashMap<String, usize> }

struct Fetched {
    url: Url,
    extracted: Extracted,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();

    let client = Client::builder()
        .user_agent(args.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()?;

    // Load seeds
    let mut raw_seeds = args.urls.clone();
    if let Some(path) = &args.seeds {
        for line in BufReader::new(File::open(path)?).lines() {
            let s = line?.trim().to_string();
            if s.is_empty() || s.starts_with('#') { continue; }
            raw_seeds.push(s);
        }
    }
    let mut frontier: VecDeque<Url> = VecDeque::new();
    for seed in &raw_seeds {
        match seed_url(seed) {
            Ok(u) => frontier.push_back(u),
            Err(err) => tracing::warn!(seed = %seed, %err, "seed is malformed and will be ignored"),
        }
    }
    if frontier.is_empty() { return Err(anyhow!("no valid seeds")); }
    tracing::info!(
        seeds = frontier.len(),
        max_docs = args.max_docs,
        concurrency = args.concurrency,
        same_host_only = args.same_host_only,
        output = %args.output,
        "crawl starting"
    );

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, saving what has been indexed so far");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let robots_cache = RobotsCache::default();
    let mut seen = Seen::default();
    let mut index = WebIndex::new();
    let mut inflight: JoinSet<Option<Fetched>> = JoinSet::new();
    let mut indexed = 0usize;

    while indexed < args.max_docs && !cancel.load(Ordering::Relaxed) {
        // Fill workers
        while inflight.len() < args.concurrency && indexed + inflight.len() < args.max_docs {
            let Some(url) = frontier.pop_front() else { break };
            if !seen.pages.insert(Page::from_url(&url).key()) { continue; }
            if let Some(h) = url.host_str() {
                let cnt = seen.per_host.entry(h.to_string()).or_insert(0);
                if *cnt >= args.max_per_host { continue; }
                *cnt += 1;
            }

            let client_c = client.clone();
            let robots_c = robots_cache.clone();
            let ua = args.user_agent.clone();
            inflight.spawn(async move {
                match fetch(&client_c, &robots_c, &url, &ua).await {
                    Ok(Some(html)) => {
                        let extracted = markup::extract(&html, &url);
                        Some(Fetched { url, extracted })
                    }
                    Ok(None) => None,
                    Err(err) => {
                        tracing::warn!(%url, %err, "fetch failed");
                        None
                    }
                }
            });
        }

        let Some(joined) = inflight.join_next().await else { break };
        let fetched = match joined {
            Ok(Some(f)) => f,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(%err, "fetch task died");
                continue;
            }
        };

        // Only this loop touches the index, so ingestion is serialized.
        let words = index_page(&mut index, &Page::from_url(&fetched.url), &fetched.extracted.blocks);
        // A page without words never joins the index.
        if words > 0 { indexed += 1; }
        tracing::debug!(url = %fetched.url, words, links = fetched.extracted.links.len(), "indexed page");

        for link in fetched.extracted.links {
            if !should_follow(&fetched.url, &link, args.same_host_only) {
                tracing::debug!(from = %fetched.url, %link, "link not followed");
                continue;
            }
            if !seen.pages.contains(&Page::from_url(&link).key()) {
                frontier.push_back(link);
            }
        }
        if words > 0 && indexed % 100 == 0 {
            tracing::info!(indexed, visited = seen.pages.len(), frontier = frontier.len(), "progress");
        }
    }
    inflight.abort_all();

    save_index(&IndexPaths::new(&args.output), &index)?;
    tracing::info!(
        indexed,
        pages = index.num_pages(),
        visited = seen.pages.len(),
        frontier = frontier.len(),
        output = %args.output,
        "crawl finished"
    );
    Ok(())
}

/// A seed is either an absolute URL or a path to a local file.
fn seed_url(seed: &str) -> Result<Url> {
    if let Ok(url) = Url::parse(seed) {
        return Ok(url);
    }
    let path = std::fs::canonicalize(Path::new(seed))?;
    Url::from_file_path(&path).map_err(|_| anyhow!("cannot express {} as a file url", path.display()))
}

/// Whether a link found on `from` may be queued. Local files are reachable only
/// from other local files.
fn should_follow(from: &Url, link: &Url, same_host_only: bool) -> bool {
    if link.scheme() == "file" && from.scheme() != "file" {
        return false;
    }
    !same_host_only || link.host_str() == from.host_str()
}

/// Returns the page body, or `None` when the page should be skipped.
async fn fetch(client: &Client, robots: &RobotsCache, url: &Url, ua: &str) -> Result<Option<String>> {
    match url.scheme() {
        "file" => {
            let path = url.to_file_path().map_err(|_| anyhow!("{url} is not a local path"))?;
            let bytes = tokio::fs::read(&path).await?;
            Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
        }
        "http" | "https" => {
            if !allowed(client, robots, url, ua).await.unwrap_or(false) {
                tracing::debug!(%url, "disallowed by robots.txt");
                return Ok(None);
            }
            if let Some(delay) = robots_delay(robots, url) { sleep(Duration::from_millis(delay)).await; }

            let resp = client.get(url.clone()).send().await?;
            if !resp.status().is_success() { return Ok(None); }
            if let Some(ct) = resp.headers().get(header::CONTENT_TYPE) {
                if let Ok(v) = ct.to_str() { if !v.starts_with("text/html") { return Ok(None); } }
            }
            let bytes = resp.bytes().await?;
            if bytes.len() > MAX_BODY_BYTES { return Ok(None); }
            Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
        }
        other => {
            tracing::debug!(scheme = other, %url, "unsupported scheme");
            Ok(None)
        }
    }
}
