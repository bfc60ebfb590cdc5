use crate::markup;
use anyhow::{anyhow, Result};
use query_core::{Page, WebIndex};
use std::collections::HashSet;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use url::Url;
use walkdir::WalkDir;

/// A local HTML file and the page it is indexed as.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub url: Url,
    pub page: Page,
}

impl SourceFile {
    pub fn new(path: &Path) -> Result<Self> {
        let path = fs::canonicalize(path)?;
        let url = Url::from_file_path(&path).map_err(|_| anyhow!("cannot express {} as a file url", path.display()))?;
        let page = Page::from_url(&url);
        Ok(Self { path, url, page })
    }
}

/// Feeds the text blocks of one page into `index`, returning the number of words added.
pub fn index_page(index: &mut WebIndex, page: &Page, blocks: &[Vec<String>]) -> usize {
    let mut added = 0;
    for block in blocks {
        let mut prev = "";
        for word in block {
            index.add(word, prev, page);
            prev = word.as_str();
            added += 1;
        }
    }
    added
}

/// Every `.html`/`.htm` file under `input` (or `input` itself), one per distinct page.
pub fn collect_html_files(input: &Path) -> Result<Vec<SourceFile>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext.to_lowercase().as_str(), "html" | "htm") {
                        paths.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        paths.push(input.to_path_buf());
    } else {
        return Err(anyhow!("input {} does not exist", input.display()));
    }

    let mut seen = HashSet::new();
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = SourceFile::new(&path)?;
        if seen.insert(file.page.key()) {
            files.push(file);
        } else {
            tracing::warn!(path = %path.display(), "skipping file with a duplicate page path");
        }
    }
    Ok(files)
}

/// Indexes `files` on `workers` threads. Each worker builds a private index over
/// its own slice of files; the partitions are merged once every worker is done.
/// `cancel` is checked between documents.
pub fn build_partitioned(files: &[SourceFile], workers: usize, cancel: &AtomicBool) -> Result<WebIndex> {
    let chunk = files.len().div_ceil(workers.max(1)).max(1);
    let partitions: Vec<Result<WebIndex>> = thread::scope(|scope| {
        let handles: Vec<_> = files
            .chunks(chunk)
            .map(|part| scope.spawn(move || build_partition(part, cancel)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().map_err(|_| anyhow!("indexing worker panicked")))
            .collect()
    });

    let mut index = WebIndex::new();
    for partition in partitions {
        index.merge(partition?)?;
    }
    tracing::info!(num_pages = index.num_pages(), num_terms = index.num_terms(), "partitions merged");
    Ok(index)
}

/// Runs [`build_partitioned`] off the async runtime and raises its cancellation
/// flag once `shutdown` resolves. Returns the index built so far and whether the
/// build was cut short.
pub async fn build_until<F>(files: Vec<SourceFile>, workers: usize, shutdown: F) -> Result<(WebIndex, bool)>
where
    F: Future<Output = ()>,
{
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    let mut build = tokio::task::spawn_blocking(move || build_partitioned(&files, workers, &flag));
    tokio::pin!(shutdown);

    let joined = tokio::select! {
        biased;
        () = &mut shutdown => {
            tracing::warn!("interrupted, keeping what has been indexed so far");
            cancel.store(true, Ordering::Relaxed);
            build.await
        }
        joined = &mut build => joined,
    };
    let index = joined.map_err(|err| anyhow!("indexing task failed: {err}"))??;
    Ok((index, cancel.load(Ordering::Relaxed)))
}

fn build_partition(files: &[SourceFile], cancel: &AtomicBool) -> WebIndex {
    let mut index = WebIndex::new();
    for file in files {
        if cancel.load(Ordering::Relaxed) {
            tracing::warn!("indexing cancelled");
            break;
        }
        let bytes = match fs::read(&file.path) {
            Ok(b) => b,
            Err(err) => {
                tracing::warn!(path = %file.path.display(), %err, "skipping unreadable file");
                continue;
            }
        };
        let extracted = markup::extract(&String::from_utf8_lossy(&bytes), &file.url);
        let words = index_page(&mut index, &file.page, &extracted.blocks);
        tracing::debug!(url = %file.url, words, "indexed page");
    }
    index
}
