use scraper::{Html, Node, Selector};
use url::Url;

/// Words and outgoing links pulled from one HTML page.
#[derive(Debug, Default)]
pub struct Extracted {
    /// One entry per text node, words in reading order.
    pub blocks: Vec<Vec<String>>,
    pub links: Vec<Url>,
}

/// Extracts the text blocks of `html` and every `<a href>` pointing at an html page.
pub fn extract(html: &str, base: &Url) -> Extracted {
    let doc = Html::parse_document(html);

    let mut blocks = Vec::new();
    for node in doc.tree.root().descendants() {
        let Node::Text(text) = node.value() else { continue };
        let ignored = node
            .ancestors()
            .filter_map(|a| a.value().as_element())
            .any(|e| matches!(e.name(), "script" | "style"));
        if ignored {
            continue;
        }
        let block = words(text);
        if !block.is_empty() {
            blocks.push(block);
        }
    }

    let anchors = Selector::parse("a[href]").expect("valid selector");
    let mut links = Vec::new();
    for a in doc.select(&anchors) {
        let Some(href) = a.value().attr("href") else { continue };
        if !href.trim().to_lowercase().ends_with("html") {
            continue;
        }
        if let Ok(mut url) = base.join(href.trim()) {
            url.set_fragment(None);
            links.push(url);
        }
    }

    Extracted { blocks, links }
}

/// Lowercased words of a text run. Letters and apostrophes are kept,
/// whitespace separates words, everything else is dropped.
pub fn words(text: &str) -> Vec<String> {
    let cleaned: String = text
        .chars()
        .filter_map(|c| match c {
            c if c.is_alphabetic() || c == '\'' => Some(c),
            c if c.is_whitespace() => Some(' '),
            _ => None,
        })
        .collect();
    cleaned.split_whitespace().map(str::to_lowercase).collect()
}
