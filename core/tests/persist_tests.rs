use query_core::persist::{load_index, load_meta, save_index, save_meta, IndexPaths, FORMAT_VERSION};
use query_core::{Page, QueryEngine, WebIndex};
use tempfile::tempdir;

fn sample() -> WebIndex {
    let mut index = WebIndex::new();
    let docs = [
        ("a.html", vec!["to be or not to be", "that is the question"]),
        ("b.html", vec!["whether tis nobler", "to suffer"]),
        ("c.html", vec!["the question is not", "to be"]),
    ];
    for (path, blocks) in docs {
        let page = Page::parse(&format!("https://example.org/{path}")).unwrap();
        for block in blocks {
            let mut prev = "";
            for word in block.split(' ') {
                index.add(word, prev, &page);
                prev = word;
            }
        }
    }
    index
}

#[test]
fn round_trip_preserves_query_results() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let original = sample();
    save_index(&paths, &original).unwrap();
    let loaded = load_index(&paths).unwrap();

    assert_eq!(loaded.num_pages(), original.num_pages());
    assert_eq!(loaded.num_terms(), original.num_terms());
    assert_eq!(loaded.pages(), original.pages());
    for doc in original.all_pages() {
        assert_eq!(loaded.sequence(doc), original.sequence(doc));
    }

    let queries = [
        "to be",
        "\"to be\"",
        "!\"to be\"",
        "question & !whether",
        "(nobler | question) & \"is not\"",
        "\"question to\"",
        "suffer | that the",
        "missing | !missing",
    ];
    let before = QueryEngine::from_index(&original);
    let after = QueryEngine::from_index(&loaded);
    for query in queries {
        assert_eq!(before.query(query).unwrap(), after.query(query).unwrap(), "{query}");
    }
}

#[test]
fn meta_describes_the_index() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    save_index(&paths, &sample()).unwrap();
    let meta = load_meta(&paths).unwrap();
    assert_eq!(meta.num_pages, 3);
    assert_eq!(meta.version, FORMAT_VERSION);
    assert!(!meta.created_at.is_empty());
}

#[test]
fn rejects_newer_format() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    save_index(&paths, &sample()).unwrap();
    let mut meta = load_meta(&paths).unwrap();
    meta.version = FORMAT_VERSION + 1;
    save_meta(&paths, &meta).unwrap();
    assert!(load_index(&paths).is_err());
}

#[test]
fn rejects_mismatched_meta() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    save_index(&paths, &sample()).unwrap();
    let mut meta = load_meta(&paths).unwrap();
    meta.num_pages += 1;
    save_meta(&paths, &meta).unwrap();
    assert!(load_index(&paths).is_err());
}

#[test]
fn missing_directory_is_an_error() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path().join("nowhere"));
    assert!(load_index(&paths).is_err());
}
