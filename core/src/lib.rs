pub mod error;
pub mod index;
pub mod page;
pub mod persist;
pub mod query;

use std::collections::HashSet;

pub use error::{EvalError, IndexError, QueryError, SyntaxError};
pub use index::{is_word, WebIndex, BOUNDARY, PHRASE_SEPARATOR};
pub use page::Page;
pub use query::{QueryEngine, Term, Token};

pub type TermId = u32;
pub type DocId = u32;

/// Unordered set of matching pages, keyed by their id in the owning index.
pub type PageSet = HashSet<DocId>;
