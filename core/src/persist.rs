use crate::{DocId, Page, TermId, WebIndex};
use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Highest on-disk layout version this build can read.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_pages: u32,
    pub num_terms: u32,
    pub created_at: String,
    pub version: u32,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn pages(&self) -> PathBuf { self.root.join("pages.bin") }
    fn dictionary(&self) -> PathBuf { self.root.join("dictionary.bin") }
    fn postings(&self) -> PathBuf { self.root.join("postings.bin") }
    fn sequences(&self) -> PathBuf { self.root.join("sequences.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

/// Writes every part of `index` under `paths.root`.
pub fn save_index(paths: &IndexPaths, index: &WebIndex) -> Result<()> {
    create_dir_all(&paths.root)?;
    write_bin(&paths.pages(), &index.pages())?;
    write_bin(&paths.dictionary(), &index.words())?;
    write_bin(&paths.postings(), &index.sorted_postings())?;
    write_bin(&paths.sequences(), &index.sequences())?;
    let meta = MetaFile {
        num_pages: index.num_pages() as u32,
        num_terms: index.num_terms() as u32,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        version: FORMAT_VERSION,
    };
    save_meta(paths, &meta)?;
    tracing::info!(root = %paths.root.display(), num_pages = meta.num_pages, num_terms = meta.num_terms, "index saved");
    Ok(())
}

/// Reads an index written by [`save_index`].
pub fn load_index(paths: &IndexPaths) -> Result<WebIndex> {
    let meta = load_meta(paths)?;
    if meta.version > FORMAT_VERSION {
        bail!("index format version {} is newer than supported version {}", meta.version, FORMAT_VERSION);
    }
    let pages: Vec<Page> = read_bin(&paths.pages())?;
    let words: Vec<String> = read_bin(&paths.dictionary())?;
    let postings: Vec<Vec<DocId>> = read_bin(&paths.postings())?;
    let sequences: Vec<Vec<TermId>> = read_bin(&paths.sequences())?;
    if pages.len() != meta.num_pages as usize || words.len() != meta.num_terms as usize {
        bail!(
            "meta.json expects {} pages and {} words, found {} and {}",
            meta.num_pages,
            meta.num_terms,
            pages.len(),
            words.len()
        );
    }
    let index = WebIndex::from_parts(pages, words, postings, sequences)
        .with_context(|| format!("corrupt index at {}", paths.root.display()))?;
    tracing::info!(root = %paths.root.display(), num_pages = index.num_pages(), num_terms = index.num_terms(), "index loaded");
    Ok(index)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let path = paths.meta();
    let mut f = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

fn write_bin<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut f = File::create(path)?;
    let bytes = bincode::serialize(value)?;
    f.write_all(&bytes)?;
    Ok(())
}

fn read_bin<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let value = bincode::deserialize(&buf).with_context(|| format!("decoding {}", path.display()))?;
    Ok(value)
}
