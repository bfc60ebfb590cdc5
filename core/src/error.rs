use thiserror::Error;

/// Malformed query text, detected before any lookup happens.
///
/// `offset` counts characters of the raw query. Every `position` counts tokens
/// of the normalized query, i.e. after spacing, phrase folding and attaching
/// `!` to the token it negates, so `!"a b" c` has `c` at token 1.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("query is empty")]
    Empty,

    #[error("reserved character '{character}' at offset {offset}")]
    ReservedCharacter { character: char, offset: usize },

    #[error("unclosed '\"' at token {position}")]
    UnbalancedQuotes { position: usize },

    #[error("empty phrase at token {position}")]
    EmptyPhrase { position: usize },

    #[error("invalid term '{token}' at token {position}")]
    InvalidTerm { token: String, position: usize },

    #[error("unmatched ')' at token {position}")]
    UnmatchedClose { position: usize },

    #[error("'(' at token {position} is never closed ({depth} open at end of query)")]
    UnclosedParen { position: usize, depth: usize },

    #[error("'{token}' cannot follow '{previous}' at token {position}")]
    IllegalAdjacency { previous: String, token: String, position: usize },
}

/// A postfix program that does not reduce to a single result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("operator '{operator}' missing operand at token {position}")]
    MissingOperand { operator: String, position: usize },

    #[error("terms did not reduce to one result ({remaining} left)")]
    Unreduced { remaining: usize },

    #[error("unexpected '{token}' in postfix program at token {position}")]
    UnexpectedToken { token: String, position: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),
}

impl QueryError {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Syntax(_) => "syntax",
            QueryError::Eval(_) => "evaluation",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("page '{0}' is present in both partitions")]
    DuplicatePage(String),
}
