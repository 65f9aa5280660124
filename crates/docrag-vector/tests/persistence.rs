use docrag_core::chunker::chunk;
use docrag_core::traits::VectorIndexer;
use docrag_core::types::{Document, DocumentFormat, IndexRecord, SearchFilter, WriteBatch};
use docrag_vector::VectorIndex;

fn records(source: &str, text: &str, order: u64, embedding: &[f32]) -> Vec<IndexRecord> {
    let doc = Document::new(source, source, text, DocumentFormat::Markdown);
    chunk(&doc, 20, 5).unwrap().into_iter().map(|c| IndexRecord::new(c, embedding.to_vec(), &doc, order)).collect()
}

fn apply(index: &VectorIndex, batch: WriteBatch) {
    let staged = index.stage(&batch).unwrap();
    index.commit(staged).unwrap();
}

#[test]
fn committed_records_survive_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("vectors");
    let written = {
        let index = VectorIndex::open(&dir).unwrap();
        apply(&index, WriteBatch::upsert(records("guide.md", "a guide that spans a few chunks of text", 0, &[0.0, 1.0])));
        index.records()
    };
    assert!(dir.join("records.json").exists());

    let reopened = VectorIndex::open(&dir).unwrap();
    let read: Vec<IndexRecord> = reopened.records().iter().map(|r| r.as_ref().clone()).collect();
    let expected: Vec<IndexRecord> = written.iter().map(|r| r.as_ref().clone()).collect();
    assert_eq!(read, expected);
    assert_eq!(reopened.dimension(), Some(2));
    assert_eq!(reopened.next_document_order(), 1);
}

#[test]
fn staged_but_uncommitted_writes_leave_the_file_alone() {
    let tmp = tempfile::tempdir().unwrap();
    let index = VectorIndex::open(tmp.path()).unwrap();
    apply(&index, WriteBatch::upsert(records("a.txt", "first", 0, &[1.0, 0.0])));
    let before = std::fs::read(tmp.path().join("records.json")).unwrap();

    let staged = index.stage(&WriteBatch::clear()).unwrap();
    drop(staged);
    assert_eq!(std::fs::read(tmp.path().join("records.json")).unwrap(), before);
    assert_eq!(VectorIndex::open(tmp.path()).unwrap().len(), 1);
}

#[test]
fn filter_and_supersede() {
    let index = VectorIndex::in_memory();
    let a = records("a.txt", "alpha alpha alpha alpha alpha alpha", 0, &[1.0, 0.0]);
    let a_doc = a[0].doc_id().to_string();
    apply(&index, WriteBatch::upsert(a));
    apply(&index, WriteBatch::upsert(records("b.txt", "beta", 1, &[0.0, 1.0])));

    let only_a = index.search_vec(&[0.0, 1.0], 10, &SearchFilter::documents([a_doc.clone()])).unwrap();
    assert!(!only_a.is_empty());
    assert!(only_a.iter().all(|h| h.record.doc_id() == a_doc));

    apply(&index, WriteBatch::supersede(records("a.txt", "short", 0, &[1.0, 0.0])));
    assert_eq!(index.len(), 2);
    assert_eq!(index.document_count(), 2);

    let err = index.search_vec(&[1.0, 0.0, 0.0], 3, &SearchFilter::default()).unwrap_err();
    assert!(matches!(err, docrag_core::Error::DimensionMismatch { expected: 2, actual: 3 }));
}
