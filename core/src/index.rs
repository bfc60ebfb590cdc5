use crate::{DocId, IndexError, Page, PageSet, TermId};
use anyhow::{bail, Result};
use std::collections::HashMap;

/// Joins the words of a phrase term, e.g. `i+am+forced`. Never valid in raw query text.
pub const PHRASE_SEPARATOR: char = '+';

/// Marks the start of a new text block inside a word sequence. No interned word gets this id.
pub const BOUNDARY: TermId = TermId::MAX;

/// Word -> pages map plus the ordered word sequence of every page.
///
/// Pages and words are interned: a page is addressed by its [`DocId`] (its
/// position in `pages`), a word by its [`TermId`]. The index only grows.
#[derive(Debug, Default, Clone)]
pub struct WebIndex {
    pages: Vec<Page>,
    page_ids: HashMap<String, DocId>,
    dictionary: HashMap<String, TermId>,
    words: Vec<String>,
    postings: Vec<PageSet>,
    sequences: Vec<Vec<TermId>>,
}

impl WebIndex {
    pub fn new() -> Self { Self::default() }

    /// Records that `word` occurs on `page` right after `prev`. An empty `prev`
    /// starts a new text block.
    ///
    /// `prev` must equal the last word added for `page`; anything else is a bug
    /// in the caller and trips a debug assertion.
    pub fn add(&mut self, word: &str, prev: &str, page: &Page) {
        let word = word.to_lowercase();
        let prev = prev.to_lowercase();
        let term = self.intern(&word);
        let key = page.key();

        let doc = match self.page_ids.get(&key) {
            Some(&doc) => {
                if prev.is_empty() {
                    self.sequences[doc as usize].push(BOUNDARY);
                } else {
                    debug_assert!(
                        self.last_word(doc) == Some(prev.as_str()),
                        "continuation '{}' does not follow last word {:?} on {}",
                        prev,
                        self.last_word(doc),
                        page.url()
                    );
                }
                self.sequences[doc as usize].push(term);
                doc
            }
            None => {
                let doc = self.pages.len() as DocId;
                self.page_ids.insert(key, doc);
                self.pages.push(page.clone());
                self.sequences.push(vec![term]);
                doc
            }
        };
        self.postings[term as usize].insert(doc);
    }

    /// Pages containing `word`, or with a leading `!`, every page that does not.
    pub fn pages_for_term(&self, word: &str) -> PageSet {
        let word = word.to_lowercase();
        match word.strip_prefix('!') {
            Some(stripped) => match self.postings_for(stripped) {
                Some(found) => self.doc_ids().filter(|doc| !found.contains(doc)).collect(),
                None => self.all_pages(),
            },
            None => self.postings_for(&word).cloned().unwrap_or_default(),
        }
    }

    /// Like [`pages_for_term`](Self::pages_for_term), restricted to `domain`.
    pub fn pages_for_term_in(&self, word: &str, domain: &PageSet) -> PageSet {
        let word = word.to_lowercase();
        match word.strip_prefix('!') {
            Some(stripped) => match self.postings_for(stripped) {
                Some(found) => domain.iter().filter(|doc| !found.contains(doc)).copied().collect(),
                None => domain.clone(),
            },
            None => match self.postings_for(&word) {
                Some(found) => intersect(found, domain),
                None => PageSet::new(),
            },
        }
    }

    /// Pages of `domain` where `words` occur as one contiguous run (or, when
    /// `negate` is set, pages of `domain` where they do not).
    ///
    /// If no page holds every word, the phrase is absent everywhere and the
    /// answer is `domain` when negated, empty otherwise.
    pub fn pages_for_phrase<S: AsRef<str>>(&self, words: &[S], domain: &PageSet, negate: bool) -> PageSet {
        let mut ids = Vec::with_capacity(words.len());
        let mut candidates: Option<PageSet> = None;
        for word in words {
            let word = word.as_ref().to_lowercase();
            let Some(&term) = self.dictionary.get(&word) else {
                return absent(domain, negate);
            };
            ids.push(term);
            let found = &self.postings[term as usize];
            candidates = Some(match candidates {
                None => found.clone(),
                Some(current) => intersect(&current, found),
            });
        }

        let candidates = candidates.unwrap_or_default();
        if candidates.is_empty() {
            return absent(domain, negate);
        }

        let matches: PageSet = candidates
            .into_iter()
            .filter(|doc| domain.contains(doc))
            .filter(|&doc| self.contains_run(doc, &ids))
            .collect();
        if negate {
            domain.iter().filter(|doc| !matches.contains(doc)).copied().collect()
        } else {
            matches
        }
    }

    pub fn all_pages(&self) -> PageSet { self.doc_ids().collect() }

    pub fn page(&self, doc: DocId) -> Option<&Page> { self.pages.get(doc as usize) }

    pub fn page_id(&self, page: &Page) -> Option<DocId> { self.page_ids.get(&page.key()).copied() }

    pub fn pages(&self) -> &[Page] { &self.pages }

    pub fn num_pages(&self) -> usize { self.pages.len() }

    pub fn num_terms(&self) -> usize { self.words.len() }

    pub fn is_empty(&self) -> bool { self.pages.is_empty() }

    pub fn term_id(&self, word: &str) -> Option<TermId> { self.dictionary.get(&word.to_lowercase()).copied() }

    pub fn word(&self, term: TermId) -> Option<&str> { self.words.get(term as usize).map(String::as_str) }

    /// Interned word sequence of a page, [`BOUNDARY`] included.
    pub fn sequence(&self, doc: DocId) -> Option<&[TermId]> { self.sequences.get(doc as usize).map(Vec::as_slice) }

    /// Every indexed word with the pages containing it.
    pub fn terms(&self) -> impl Iterator<Item = (&str, &PageSet)> {
        self.words.iter().map(String::as_str).zip(self.postings.iter())
    }

    /// Folds a partition built from other pages into this index.
    pub fn merge(&mut self, other: WebIndex) -> Result<(), IndexError> {
        if let Some(dup) = other.pages.iter().find(|p| self.page_ids.contains_key(&p.key())) {
            return Err(IndexError::DuplicatePage(dup.url().to_string()));
        }

        let remap: Vec<TermId> = other.words.iter().map(|w| self.intern(w)).collect();
        let offset = self.pages.len() as DocId;
        for (page, sequence) in other.pages.into_iter().zip(other.sequences) {
            let doc = self.pages.len() as DocId;
            self.page_ids.insert(page.key(), doc);
            self.pages.push(page);
            self.sequences.push(
                sequence
                    .into_iter()
                    .map(|t| if t == BOUNDARY { BOUNDARY } else { remap[t as usize] })
                    .collect(),
            );
        }
        for (term, docs) in other.postings.into_iter().enumerate() {
            self.postings[remap[term] as usize].extend(docs.into_iter().map(|doc| doc + offset));
        }
        Ok(())
    }

    /// Rebuilds an index from its persisted parts, rejecting anything inconsistent.
    pub(crate) fn from_parts(
        pages: Vec<Page>,
        words: Vec<String>,
        postings: Vec<Vec<DocId>>,
        sequences: Vec<Vec<TermId>>,
    ) -> Result<Self> {
        if postings.len() != words.len() {
            bail!("{} posting lists for {} words", postings.len(), words.len());
        }
        if sequences.len() != pages.len() {
            bail!("{} word sequences for {} pages", sequences.len(), pages.len());
        }

        let mut page_ids = HashMap::with_capacity(pages.len());
        for (doc, page) in pages.iter().enumerate() {
            if page_ids.insert(page.key(), doc as DocId).is_some() {
                bail!("duplicate page {}", page.url());
            }
        }
        let mut dictionary = HashMap::with_capacity(words.len());
        for (term, word) in words.iter().enumerate() {
            if dictionary.insert(word.clone(), term as TermId).is_some() {
                bail!("duplicate word '{word}'");
            }
        }

        let num_pages = pages.len();
        let postings = postings
            .into_iter()
            .map(|docs| {
                if let Some(bad) = docs.iter().find(|&&doc| doc as usize >= num_pages) {
                    bail!("posting references unknown page {bad}");
                }
                Ok(docs.into_iter().collect::<PageSet>())
            })
            .collect::<Result<Vec<_>>>()?;
        for sequence in &sequences {
            if let Some(bad) = sequence.iter().find(|&&t| t != BOUNDARY && t as usize >= words.len()) {
                bail!("word sequence references unknown word {bad}");
            }
        }

        Ok(Self { pages, page_ids, dictionary, words, postings, sequences })
    }

    pub(crate) fn words(&self) -> &[String] { &self.words }

    pub(crate) fn sorted_postings(&self) -> Vec<Vec<DocId>> {
        self.postings
            .iter()
            .map(|docs| {
                let mut docs: Vec<DocId> = docs.iter().copied().collect();
                docs.sort_unstable();
                docs
            })
            .collect()
    }

    pub(crate) fn sequences(&self) -> &[Vec<TermId>] { &self.sequences }

    fn intern(&mut self, word: &str) -> TermId {
        if let Some(&term) = self.dictionary.get(word) {
            return term;
        }
        let term = self.words.len() as TermId;
        self.dictionary.insert(word.to_string(), term);
        self.words.push(word.to_string());
        self.postings.push(PageSet::new());
        term
    }

    fn postings_for(&self, word: &str) -> Option<&PageSet> {
        self.dictionary.get(word).map(|&term| &self.postings[term as usize])
    }

    fn last_word(&self, doc: DocId) -> Option<&str> {
        self.sequences[doc as usize].last().and_then(|&t| self.word(t))
    }

    fn contains_run(&self, doc: DocId, ids: &[TermId]) -> bool {
        self.sequences[doc as usize].windows(ids.len()).any(|window| window == ids)
    }

    fn doc_ids(&self) -> impl Iterator<Item = DocId> { 0..self.pages.len() as DocId }
}

/// A token is a word when, after one optional leading `!`, every
/// `+`-separated piece is non-empty and made of letters (any script) and apostrophes.
pub fn is_word(token: &str) -> bool {
    let token = token.strip_prefix('!').unwrap_or(token);
    token
        .split(PHRASE_SEPARATOR)
        .all(|piece| !piece.is_empty() && piece.chars().all(|c| c.is_alphabetic() || c == '\''))
}

fn intersect(a: &PageSet, b: &PageSet) -> PageSet {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.iter().filter(|doc| large.contains(doc)).copied().collect()
}

fn absent(domain: &PageSet, negate: bool) -> PageSet {
    if negate { domain.clone() } else { PageSet::new() }
}
