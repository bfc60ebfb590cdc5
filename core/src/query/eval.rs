use super::{Term, Token};
use crate::{EvalError, PageSet, WebIndex};

/// A stack slot: a term not looked up yet, or an already resolved page set.
enum Operand<'t> {
    Term(&'t Term),
    Pages(PageSet),
}

/// Runs a postfix program against `index`.
///
/// Bare terms stay unresolved until an operator needs them, so `a & b` looks
/// `b` up only inside the pages that matched `a`.
pub fn evaluate(index: &WebIndex, postfix: &[Token]) -> Result<PageSet, EvalError> {
    let mut stack: Vec<Operand<'_>> = Vec::with_capacity(postfix.len());
    for (position, token) in postfix.iter().enumerate() {
        match token {
            Token::Term(term) => stack.push(Operand::Term(term)),
            Token::And | Token::Or => {
                let (Some(right), Some(left)) = (stack.pop(), stack.pop()) else {
                    return Err(EvalError::MissingOperand { operator: token.to_string(), position });
                };
                let pages = match token {
                    Token::And => and(index, left, right),
                    _ => or(index, left, right),
                };
                stack.push(Operand::Pages(pages));
            }
            Token::Open | Token::Close => {
                return Err(EvalError::UnexpectedToken { token: token.to_string(), position });
            }
        }
    }

    let remaining = stack.len();
    match (stack.pop(), remaining) {
        (Some(Operand::Term(term)), 1) => Ok(resolve(index, term, None)),
        (Some(Operand::Pages(pages)), 1) => Ok(pages),
        _ => Err(EvalError::Unreduced { remaining }),
    }
}

fn resolve(index: &WebIndex, term: &Term, domain: Option<&PageSet>) -> PageSet {
    match (term.is_phrase(), domain) {
        (true, Some(domain)) => index.pages_for_phrase(term.words(), domain, term.negated()),
        (true, None) => index.pages_for_phrase(term.words(), &index.all_pages(), term.negated()),
        (false, Some(domain)) => index.pages_for_term_in(term.as_str(), domain),
        (false, None) => index.pages_for_term(term.as_str()),
    }
}

fn and(index: &WebIndex, left: Operand<'_>, right: Operand<'_>) -> PageSet {
    match (left, right) {
        (Operand::Term(first), Operand::Term(second)) => {
            let domain = resolve(index, first, None);
            resolve(index, second, Some(&domain))
        }
        (Operand::Pages(pages), Operand::Term(term)) | (Operand::Term(term), Operand::Pages(pages)) => {
            resolve(index, term, Some(&pages))
        }
        (Operand::Pages(mut left), Operand::Pages(right)) => {
            left.retain(|doc| right.contains(doc));
            left
        }
    }
}

fn or(index: &WebIndex, left: Operand<'_>, right: Operand<'_>) -> PageSet {
    match (left, right) {
        (Operand::Term(first), Operand::Term(second)) => {
            union(resolve(index, first, None), resolve(index, second, None))
        }
        (Operand::Pages(pages), Operand::Term(term)) | (Operand::Term(term), Operand::Pages(pages)) => {
            union(pages, resolve(index, term, None))
        }
        (Operand::Pages(left), Operand::Pages(right)) => union(left, right),
    }
}

fn union(mut a: PageSet, mut b: PageSet) -> PageSet {
    if a.len() < b.len() {
        std::mem::swap(&mut a, &mut b);
    }
    a.extend(b);
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::compiler::compile;
    use crate::{DocId, Page};

    fn corpus() -> WebIndex {
        let mut index = WebIndex::new();
        let docs = [
            ("a.html", "the quick brown fox"),
            ("b.html", "the lazy brown dog"),
            ("c.html", "quick thinking saves the day"),
        ];
        for (path, text) in docs {
            let page = Page::parse(&format!("file:///site/{path}")).unwrap();
            let mut prev = "";
            for word in text.split(' ') {
                index.add(word, prev, &page);
                prev = word;
            }
        }
        index
    }

    fn run(index: &WebIndex, query: &str) -> Result<PageSet, EvalError> {
        evaluate(index, &compile(query).unwrap())
    }

    fn set(ids: &[DocId]) -> PageSet { ids.iter().copied().collect() }

    #[test]
    fn single_terms() {
        let index = corpus();
        assert_eq!(run(&index, "brown").unwrap(), set(&[0, 1]));
        assert_eq!(run(&index, "!brown").unwrap(), set(&[2]));
        assert_eq!(run(&index, "\"brown fox\"").unwrap(), set(&[0]));
        assert_eq!(run(&index, "!\"brown fox\"").unwrap(), set(&[1, 2]));
    }

    #[test]
    fn conjunctions() {
        let index = corpus();
        assert_eq!(run(&index, "quick brown").unwrap(), set(&[0]));
        assert_eq!(run(&index, "quick & !fox").unwrap(), set(&[2]));
        assert_eq!(run(&index, "(the | dog) & (quick | lazy)").unwrap(), set(&[0, 1, 2]));
        assert_eq!(run(&index, "(brown | day) & (quick | dog) & the").unwrap(), set(&[0, 1, 2]));
        assert_eq!(run(&index, "(brown & dog) & (lazy | fox)").unwrap(), set(&[1]));
        assert_eq!(run(&index, "the \"quick brown\"").unwrap(), set(&[0]));
    }

    #[test]
    fn disjunctions() {
        let index = corpus();
        assert_eq!(run(&index, "fox | dog").unwrap(), set(&[0, 1]));
        assert_eq!(run(&index, "(fox & quick) | day").unwrap(), set(&[0, 2]));
        assert_eq!(run(&index, "day | (fox & quick)").unwrap(), set(&[0, 2]));
        assert_eq!(run(&index, "(fox & quick) | (dog & lazy)").unwrap(), set(&[0, 1]));
        assert_eq!(run(&index, "unicorn | \"lazy brown\"").unwrap(), set(&[1]));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let index = corpus();
        assert_eq!(run(&index, "fox | dog & lazy").unwrap(), set(&[0, 1]));
        assert_eq!(run(&index, "day | quick & brown").unwrap(), set(&[0, 2]));
    }

    #[test]
    fn missing_operand() {
        let index = corpus();
        assert_eq!(
            run(&index, "fox &").unwrap_err(),
            EvalError::MissingOperand { operator: "&".into(), position: 1 }
        );
        assert!(matches!(run(&index, "| fox"), Err(EvalError::MissingOperand { .. })));
    }

    #[test]
    fn empty_program_does_not_reduce() {
        let index = corpus();
        assert_eq!(run(&index, "( )").unwrap_err(), EvalError::Unreduced { remaining: 0 });
        let two = vec![Token::parse("fox").unwrap(), Token::parse("dog").unwrap()];
        assert_eq!(evaluate(&index, &two).unwrap_err(), EvalError::Unreduced { remaining: 2 });
    }

    #[test]
    fn parentheses_are_not_postfix() {
        let index = corpus();
        let program = vec![Token::Open, Token::parse("fox").unwrap()];
        assert_eq!(
            evaluate(&index, &program).unwrap_err(),
            EvalError::UnexpectedToken { token: "(".into(), position: 0 }
        );
    }
}
