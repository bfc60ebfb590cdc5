pub mod compiler;
pub mod eval;

use crate::{is_word, Page, PageSet, QueryError, WebIndex, PHRASE_SEPARATOR};
use std::fmt;

/// A word or a phrase, optionally negated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    text: String,
    words: Vec<String>,
    negated: bool,
}

impl Term {
    /// Parses a normalized token such as `hello`, `!hello` or `!i+am+forced`.
    pub fn parse(token: &str) -> Option<Self> {
        if !is_word(token) {
            return None;
        }
        let negated = token.starts_with('!');
        let body = token.strip_prefix('!').unwrap_or(token);
        let words = body.split(PHRASE_SEPARATOR).map(str::to_string).collect();
        Some(Self { text: token.to_string(), words, negated })
    }

    pub fn words(&self) -> &[String] { &self.words }
    pub fn negated(&self) -> bool { self.negated }
    pub fn is_phrase(&self) -> bool { self.words.len() > 1 }
    pub fn as_str(&self) -> &str { &self.text }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.text) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Term(Term),
    And,
    Or,
    Open,
    Close,
}

impl Token {
    pub fn is_operator(&self) -> bool { matches!(self, Token::And | Token::Or) }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Term(term) => fmt::Display::fmt(term, f),
            Token::And => f.write_str("&"),
            Token::Or => f.write_str("|"),
            Token::Open => f.write_str("("),
            Token::Close => f.write_str(")"),
        }
    }
}

/// Answers boolean and phrase queries against a frozen [`WebIndex`].
///
/// The engine only borrows the index, so any number of engines can query the
/// same index from different threads.
#[derive(Clone, Copy)]
pub struct QueryEngine<'a> {
    index: &'a WebIndex,
}

impl<'a> QueryEngine<'a> {
    pub fn from_index(index: &'a WebIndex) -> Self { Self { index } }

    /// Postfix program for `query`.
    pub fn compile(&self, query: &str) -> Result<Vec<Token>, QueryError> { Ok(compiler::compile(query)?) }

    /// Ids of every page satisfying `query`.
    pub fn query(&self, query: &str) -> Result<PageSet, QueryError> {
        let postfix = self.compile(query)?;
        let found = eval::evaluate(self.index, &postfix)?;
        tracing::debug!(query, hits = found.len(), "query evaluated");
        Ok(found)
    }

    /// Like [`query`](Self::query) but resolved to pages, ordered by URL.
    pub fn query_pages(&self, query: &str) -> Result<Vec<&'a Page>, QueryError> {
        let mut pages: Vec<&'a Page> = self.query(query)?.into_iter().filter_map(|doc| self.index.page(doc)).collect();
        pages.sort_by(|a, b| a.url().cmp(b.url()));
        Ok(pages)
    }

    pub fn index(&self) -> &'a WebIndex { self.index }
}
