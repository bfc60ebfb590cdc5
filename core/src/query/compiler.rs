//! Turns query text into a postfix program.
//!
//! Stages run in order and each fails fast: case folding, reserved character
//! check, token spacing, phrase folding, negation fix-up, validation, implicit
//! AND insertion and finally Shunting-Yard.

use super::{Term, Token};
use crate::{SyntaxError, PHRASE_SEPARATOR};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref OPERATORS: Regex = Regex::new(r#"([()&|"])"#).expect("valid regex");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid regex");
    static ref NEGATION: Regex = Regex::new(r"!\s+").expect("valid regex");
}

const QUOTE: &str = "\"";

/// Compiles `query` into postfix order.
pub fn compile(query: &str) -> Result<Vec<Token>, SyntaxError> {
    if let Some(offset) = query.chars().position(|c| c == PHRASE_SEPARATOR) {
        return Err(SyntaxError::ReservedCharacter { character: PHRASE_SEPARATOR, offset });
    }
    let query = query.to_lowercase();
    let spaced = space_tokens(&query);
    if spaced.is_empty() {
        return Err(SyntaxError::Empty);
    }
    let folded = fold_phrases(&spaced)?;
    let tokens = validate(&fix_negation(&folded))?;
    let postfix = to_postfix(insert_implicit_and(tokens));
    tracing::debug!(query = %query, postfix = %render(&postfix), "compiled query");
    Ok(postfix)
}

/// Surrounds `( ) & | "` with spaces, collapses whitespace runs and trims.
pub fn space_tokens(query: &str) -> String {
    let padded = OPERATORS.replace_all(query, " $1 ");
    WHITESPACE.replace_all(&padded, " ").trim().to_string()
}

/// Replaces every quoted run of words with one `+`-joined token.
pub fn fold_phrases(spaced: &str) -> Result<String, SyntaxError> {
    let separator = PHRASE_SEPARATOR.to_string();
    let mut out: Vec<String> = Vec::new();
    let mut phrase: Option<(usize, Vec<&str>)> = None;
    for token in spaced.split(' ').filter(|t| !t.is_empty()) {
        phrase = match (phrase, token == QUOTE) {
            (None, true) => Some((normalized_len(&out), Vec::new())),
            (None, false) => {
                out.push(token.to_string());
                None
            }
            (Some((start, words)), true) => {
                if words.is_empty() {
                    return Err(SyntaxError::EmptyPhrase { position: start });
                }
                out.push(words.join(separator.as_str()));
                None
            }
            (Some((start, mut words)), false) => {
                words.push(token);
                Some((start, words))
            }
        };
    }
    if let Some((position, _)) = phrase {
        return Err(SyntaxError::UnbalancedQuotes { position });
    }
    Ok(out.join(" "))
}

/// Number of tokens `folded` leaves once every trailing `!` joins the token after it.
fn normalized_len(folded: &[String]) -> usize { folded.iter().filter(|t| !t.ends_with('!')).count() }

/// Attaches a `!` to the token after it, so `! word` reads as `!word`.
pub fn fix_negation(query: &str) -> String { NEGATION.replace_all(query, "!").into_owned() }

/// Checks every token, parenthesis nesting and operator adjacency.
pub fn validate(query: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    for (position, raw) in query.split(' ').filter(|t| !t.is_empty()).enumerate() {
        let token = Token::parse(raw)
            .ok_or_else(|| SyntaxError::InvalidTerm { token: raw.to_string(), position })?;

        if let Some(previous) = tokens.last() {
            let illegal = match previous {
                Token::Open => token.is_operator(),
                Token::And | Token::Or => token.is_operator() || token == Token::Close,
                _ => false,
            };
            if illegal {
                return Err(SyntaxError::IllegalAdjacency {
                    previous: previous.to_string(),
                    token: token.to_string(),
                    position,
                });
            }
        }

        match token {
            Token::Open => open.push(position),
            Token::Close => {
                open.pop().ok_or(SyntaxError::UnmatchedClose { position })?;
            }
            _ => {}
        }
        tokens.push(token);
    }

    if tokens.is_empty() {
        return Err(SyntaxError::Empty);
    }
    if let Some(&position) = open.last() {
        return Err(SyntaxError::UnclosedParen { position, depth: open.len() });
    }
    Ok(tokens)
}

/// Inserts `&` between adjacent operands, never right after `(` or right before `)`.
pub fn insert_implicit_and(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len() * 2);
    for token in tokens {
        if let Some(previous) = out.last() {
            let joins = !previous.is_operator()
                && !token.is_operator()
                && *previous != Token::Open
                && token != Token::Close;
            if joins {
                out.push(Token::And);
            }
        }
        out.push(token);
    }
    out
}

/// Shunting-Yard. `&` binds tighter than `|`, both associate left, and a `|`
/// flushes every pending operator down to the enclosing `(`.
pub fn to_postfix(tokens: Vec<Token>) -> Vec<Token> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut operators: Vec<Token> = Vec::new();
    for token in tokens {
        match token {
            Token::Term(_) => output.push(token),
            Token::Open => operators.push(token),
            Token::Close => {
                while let Some(op) = operators.pop() {
                    if op == Token::Open {
                        break;
                    }
                    output.push(op);
                }
            }
            Token::And | Token::Or => {
                while let Some(top) = operators.last() {
                    let pops = *top != Token::Open && (token == Token::Or || *top == Token::And);
                    if !pops {
                        break;
                    }
                    output.extend(operators.pop());
                }
                operators.push(token);
            }
        }
    }
    while let Some(op) = operators.pop() {
        output.push(op);
    }
    output
}

/// Space-separated rendering of a token stream.
pub fn render(tokens: &[Token]) -> String {
    tokens.iter().map(Token::to_string).collect::<Vec<_>>().join(" ")
}

impl Token {
    /// Classifies a single already-spaced token; `None` if it is neither an
    /// operator, a parenthesis nor a valid term.
    pub fn parse(raw: &str) -> Option<Token> {
        match raw {
            "(" => Some(Token::Open),
            ")" => Some(Token::Close),
            "&" => Some(Token::And),
            "|" => Some(Token::Or),
            _ => Term::parse(raw).map(Token::Term),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(query: &str) -> Vec<Token> {
        query.split(' ').map(|t| Token::parse(t).unwrap()).collect()
    }

    fn postfix(query: &str) -> String { render(&compile(query).unwrap()) }

    #[test]
    fn spacing() {
        assert_eq!(space_tokens("((hello))"), "( ( hello ) )");
        assert_eq!(space_tokens("\"hello my\""), "\" hello my \"");
        assert_eq!(space_tokens("( hello & goodbye) "), "( hello & goodbye )");
        assert_eq!(space_tokens("a\t\n|b"), "a | b");
    }

    #[test]
    fn phrase_folding() {
        assert_eq!(fold_phrases("\" hello my \"").unwrap(), "hello+my");
        assert_eq!(fold_phrases("\" i am the king \"").unwrap(), "i+am+the+king");
        assert_eq!(fold_phrases("test \" yes you are \" now").unwrap(), "test yes+you+are now");
        assert_eq!(fold_phrases("\" solo \"").unwrap(), "solo");
        assert_eq!(fold_phrases("a \" b").unwrap_err(), SyntaxError::UnbalancedQuotes { position: 1 });
        assert_eq!(fold_phrases("a \" \" b").unwrap_err(), SyntaxError::EmptyPhrase { position: 1 });
    }

    #[test]
    fn negation_fix_up() {
        assert_eq!(fix_negation("! hello"), "!hello");
        assert_eq!(fix_negation("a & !   b+c"), "a & !b+c");
        assert_eq!(fix_negation("( ! )"), "( !)");
    }

    #[test]
    fn implicit_and() {
        assert_eq!(render(&insert_implicit_and(tokens("hello goodbye"))), "hello & goodbye");
        assert_eq!(render(&insert_implicit_and(tokens("hello goodbye hello"))), "hello & goodbye & hello");
        assert_eq!(
            render(&insert_implicit_and(tokens("( hello ( goodbye | hello bye ) )"))),
            "( hello & ( goodbye | hello & bye ) )"
        );
        assert_eq!(render(&insert_implicit_and(tokens("( a ) ( b )"))), "( a ) & ( b )");
    }

    #[test]
    fn shunting_yard_precedence() {
        assert_eq!(
            render(&to_postfix(tokens("( ( !hello | goodbye & hello ) & cya )"))),
            "!hello goodbye hello & | cya &"
        );
        assert_eq!(
            render(&to_postfix(tokens("( hello & goodbye | foo & ( foo & bar ) )"))),
            "hello goodbye & foo foo bar & & |"
        );
        assert_eq!(
            render(&to_postfix(insert_implicit_and(tokens("( testing the waters | ( am & i ) | oh my )")))),
            "testing the & waters & am i & | oh my & |"
        );
        assert_eq!(render(&to_postfix(insert_implicit_and(tokens("a b c d e")))), "a b & c & d & e &");
    }

    #[test]
    fn full_pipeline() {
        assert_eq!(postfix("(\"hello my name is\" & my | (!no & yes))"), "hello+my+name+is my & !no yes & |");
        assert_eq!(postfix("(hello & (\"yes sir\") | !no)"), "hello yes+sir & !no |");
        assert_eq!(postfix("\"bob dylan\" ( big boy | toy ) & \"named troy\""), "bob+dylan big boy & toy | & named+troy &");
        assert_eq!(postfix("test \"quan what does\""), "test quan+what+does &");
        assert_eq!(postfix("! \"I am Forced\""), "!i+am+forced");
        assert_eq!(postfix("Ζ Θ Ι ΚΛ"), "ζ θ & ι & κλ &");
    }

    #[test]
    fn rejects_reserved_separator() {
        assert_eq!(compile("hello+world").unwrap_err(), SyntaxError::ReservedCharacter { character: '+', offset: 5 });
        assert_eq!(
            compile("Ünïcode a+b").unwrap_err(),
            SyntaxError::ReservedCharacter { character: '+', offset: 9 }
        );
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(compile("").unwrap_err(), SyntaxError::Empty);
        assert_eq!(compile("   \t ").unwrap_err(), SyntaxError::Empty);
    }

    #[test]
    fn rejects_invalid_terms() {
        assert!(matches!(compile("lfhgkljaflkgjl9f8difj3"), Err(SyntaxError::InvalidTerm { .. })));
        assert!(matches!(compile("!!and"), Err(SyntaxError::InvalidTerm { .. })));
        assert!(matches!(compile("( ! )"), Err(SyntaxError::InvalidTerm { .. })));
        assert!(matches!(compile("!"), Err(SyntaxError::InvalidTerm { .. })));
        assert!(matches!(compile("kdf ksdfj \"()\" kjdf"), Err(SyntaxError::InvalidTerm { .. })));
        assert!(matches!(compile("< nice & cool"), Err(SyntaxError::InvalidTerm { .. })));
        assert!(matches!(
            compile("our lives | coulda ( \" been so ) \" but momma had to \" it all up wow\""),
            Err(SyntaxError::InvalidTerm { .. })
        ));
        assert_eq!(
            compile("hello w0rld").unwrap_err(),
            SyntaxError::InvalidTerm { token: "w0rld".into(), position: 1 }
        );
    }

    #[test]
    fn rejects_unbalanced_parentheses() {
        assert_eq!(
            compile("( hello & goodbye").unwrap_err(),
            SyntaxError::UnclosedParen { position: 0, depth: 1 }
        );
        assert_eq!(
            compile("( ( nice & cool )").unwrap_err(),
            SyntaxError::UnclosedParen { position: 0, depth: 1 }
        );
        assert_eq!(
            compile("a ( b ( c ( d ) ").unwrap_err(),
            SyntaxError::UnclosedParen { position: 3, depth: 2 }
        );
        assert_eq!(compile(") hello (").unwrap_err(), SyntaxError::UnmatchedClose { position: 0 });
    }

    #[test]
    fn rejects_illegal_adjacency() {
        assert_eq!(
            compile("a & | b").unwrap_err(),
            SyntaxError::IllegalAdjacency { previous: "&".into(), token: "|".into(), position: 2 }
        );
        assert!(matches!(compile("a && b"), Err(SyntaxError::IllegalAdjacency { .. })));
        assert!(matches!(compile("( | a )"), Err(SyntaxError::IllegalAdjacency { .. })));
        assert!(matches!(compile("a hello & goodbye | goodbye ( or hello &)"), Err(SyntaxError::IllegalAdjacency { .. })));
    }

    #[test]
    fn rejects_bad_quotes() {
        assert!(matches!(compile("kdf ksdfj (\") kjdf"), Err(SyntaxError::UnbalancedQuotes { position: 3 })));
        assert!(matches!(compile("kdf ksdfj (\"\") kjdf"), Err(SyntaxError::EmptyPhrase { .. })));
    }

    #[test]
    fn positions_count_normalized_tokens() {
        assert_eq!(
            compile("! \"a b\" c w0rld").unwrap_err(),
            SyntaxError::InvalidTerm { token: "w0rld".into(), position: 2 }
        );
        assert_eq!(compile("! \"a b\" c \" d").unwrap_err(), SyntaxError::UnbalancedQuotes { position: 2 });
        assert_eq!(compile("! x ! \"\" y").unwrap_err(), SyntaxError::EmptyPhrase { position: 1 });
        assert_eq!(
            compile("! x ! \"a\" )").unwrap_err(),
            SyntaxError::UnmatchedClose { position: 2 }
        );
    }

    #[test]
    fn trailing_operator_compiles_but_cannot_reduce() {
        assert_eq!(postfix("kjdfkj &"), "kjdfkj &");
    }
}
