use docrag_core::chunker::chunk;
use docrag_core::traits::TextIndexer;
use docrag_core::types::{Document, DocumentFormat, IndexRecord, WriteBatch};
use docrag_text::TantivyKeywordIndex;

fn records(source: &str, text: &str, order: u64) -> Vec<IndexRecord> {
    let doc = Document::new(source, source, text, DocumentFormat::Text);
    chunk(&doc, 1000, 200).unwrap().into_iter().map(|c| IndexRecord::new(c, Vec::new(), &doc, order)).collect()
}

fn ids(index: &TantivyKeywordIndex, q: &str) -> Vec<String> {
    index.search(q, 10).unwrap().into_iter().map(|h| h.id).collect()
}

#[test]
fn ranks_by_bm25_and_ignores_query_syntax() {
    let index = TantivyKeywordIndex::new_in_ram().unwrap();
    let mut batch = records("fire.txt", "fire starting with a ferro rod: fire, tinder, fire lay", 0);
    batch.extend(records("water.txt", "water filtration keeps you safe near a fire", 1));
    batch.extend(records("shelter.txt", "build a lean-to shelter", 2));
    index.apply(&WriteBatch::upsert(batch)).unwrap();
    assert_eq!(index.len().unwrap(), 3);

    let hits = index.search("fire", 10).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits[0].id.starts_with("fire-"));
    assert!(hits[0].score > hits[1].score);

    // Characters that a query parser would treat as syntax are just separators here.
    assert_eq!(ids(&index, "shelter AND (lean-to) \"unbalanced"), ids(&index, "shelter lean to"));
}

#[test]
fn upserting_the_same_chunk_replaces_it() {
    let index = TantivyKeywordIndex::new_in_ram().unwrap();
    index.apply(&WriteBatch::upsert(records("a.txt", "the quick brown fox", 0))).unwrap();
    index.apply(&WriteBatch::upsert(records("a.txt", "the lazy red fox", 0))).unwrap();
    assert_eq!(index.len().unwrap(), 1);
    assert!(ids(&index, "brown").is_empty());
    assert_eq!(ids(&index, "lazy").len(), 1);
}

#[test]
fn supersede_drops_stale_chunks_and_clear_empties() {
    let index = TantivyKeywordIndex::new_in_ram().unwrap();
    let long = "alpha ".repeat(400);
    index.apply(&WriteBatch::upsert(records("a.txt", &long, 0))).unwrap();
    index.apply(&WriteBatch::upsert(records("b.txt", "beta", 1))).unwrap();
    assert!(index.len().unwrap() > 2);

    index.apply(&WriteBatch::supersede(records("a.txt", "gamma", 0))).unwrap();
    assert_eq!(index.len().unwrap(), 2);
    assert!(ids(&index, "alpha").is_empty());
    assert_eq!(ids(&index, "beta").len(), 1);

    index.apply(&WriteBatch::clear()).unwrap();
    assert_eq!(index.len().unwrap(), 0);
}

#[test]
fn on_disk_index_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("keyword");
    {
        let index = TantivyKeywordIndex::open_or_create(&dir).unwrap();
        index.apply(&WriteBatch::upsert(records("a.txt", "persistent tinder notes", 0))).unwrap();
    }
    let reopened = TantivyKeywordIndex::open_or_create(&dir).unwrap();
    assert_eq!(reopened.len().unwrap(), 1);
    assert_eq!(ids(&reopened, "tinder").len(), 1);
}
