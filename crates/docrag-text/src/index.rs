//! docrag-text
//!
//! Tantivy BM25 index over chunk text. Holds chunk ids and their owning
//! document ids only; records themselves live in the vector side.
use std::path::Path;
use std::sync::Mutex;

use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::tokenizer::TokenStream;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, warn};

use docrag_core::traits::TextIndexer;
use docrag_core::types::{SearchHit, SourceKind, WriteBatch};
use docrag_core::{Error, Result};

use crate::tantivy_utils::{build_schema, register_tokenizer, DOC_ID_FIELD, ID_FIELD, TEXT_FIELD};

const WRITER_HEAP_BYTES: usize = 50_000_000;

pub struct TantivyKeywordIndex {
	index: Index,
	reader: IndexReader,
	writer: Mutex<IndexWriter>,
	id_field: Field,
	doc_id_field: Field,
	text_field: Field,
}

impl TantivyKeywordIndex {
	/// Index held entirely in memory.
	pub fn new_in_ram() -> Result<Self> {
		Self::from_index(Index::create_in_ram(build_schema()))
	}

	/// Opens the index in `dir`, creating it (and the directory) when missing.
	pub fn open_or_create(dir: &Path) -> Result<Self> {
		std::fs::create_dir_all(dir)?;
		let directory = MmapDirectory::open(dir).map_err(Error::index_unavailable)?;
		let index = Index::open_or_create(directory, build_schema()).map_err(Error::index_unavailable)?;
		Self::from_index(index)
	}

	fn from_index(index: Index) -> Result<Self> {
		register_tokenizer(&index);
		let schema = index.schema();
		let field = |name: &str| schema.get_field(name).map_err(Error::index_unavailable);
		let (id_field, doc_id_field, text_field) = (field(ID_FIELD)?, field(DOC_ID_FIELD)?, field(TEXT_FIELD)?);
		let writer: IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP_BYTES).map_err(Error::index_unavailable)?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(Error::index_unavailable)?;
		Ok(Self { index, reader, writer: Mutex::new(writer), id_field, doc_id_field, text_field })
	}

	fn stage(&self, writer: &IndexWriter, batch: &WriteBatch) -> tantivy::Result<()> {
		if batch.clear {
			writer.delete_all_documents()?;
		}
		for doc_id in &batch.remove_documents {
			writer.delete_term(Term::from_field_text(self.doc_id_field, doc_id));
		}
		for record in &batch.upserts {
			writer.delete_term(Term::from_field_text(self.id_field, record.id()));
			writer.add_document(doc!(
				self.id_field => record.id().to_string(),
				self.doc_id_field => record.doc_id().to_string(),
				self.text_field => record.chunk.text.clone(),
			))?;
		}
		Ok(())
	}

	/// Analyzed, de-duplicated query terms; stop words and punctuation drop out.
	fn query_terms(&self, query: &str) -> Result<Vec<String>> {
		let mut analyzer = self.index.tokenizer_for_field(self.text_field).map_err(Error::index_unavailable)?;
		let mut stream = analyzer.token_stream(query);
		let mut terms: Vec<String> = Vec::new();
		while stream.advance() {
			let text = &stream.token().text;
			if !terms.iter().any(|t| t == text) {
				terms.push(text.clone());
			}
		}
		Ok(terms)
	}
}

impl TextIndexer for TantivyKeywordIndex {
	fn apply(&self, batch: &WriteBatch) -> Result<()> {
		if batch.is_empty() {
			return Ok(());
		}
		let mut writer = self.writer.lock().map_err(|_| Error::index_unavailable("keyword writer lock poisoned"))?;
		let outcome = match self.stage(&writer, batch) {
			Ok(()) => writer.commit().map(|_| ()),
			Err(e) => Err(e),
		};
		if let Err(e) = outcome {
			warn!(error = %e, "keyword index write failed; rolling back");
			if let Err(rollback) = writer.rollback() {
				warn!(error = %rollback, "keyword index rollback failed");
			}
			return Err(Error::index_unavailable(e));
		}
		self.reader.reload().map_err(Error::index_unavailable)?;
		debug!(upserts = batch.upserts.len(), removed_documents = batch.remove_documents.len(), clear = batch.clear, "keyword index committed");
		Ok(())
	}

	fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
		if k == 0 {
			return Ok(Vec::new());
		}
		let terms = self.query_terms(query)?;
		if terms.is_empty() {
			return Ok(Vec::new());
		}
		let clauses: Vec<(Occur, Box<dyn Query>)> = terms
			.iter()
			.map(|t| {
				let q: Box<dyn Query> = Box::new(TermQuery::new(Term::from_field_text(self.text_field, t), IndexRecordOption::WithFreqs));
				(Occur::Should, q)
			})
			.collect();
		let query = BooleanQuery::new(clauses);
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(k)).map_err(Error::index_unavailable)?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr).map_err(Error::index_unavailable)?;
			if let Some(id) = doc.get_first(self.id_field).and_then(|v| v.as_str()) {
				hits.push(SearchHit { id: id.to_string(), score, source: SourceKind::Text });
			}
		}
		Ok(hits)
	}

	fn len(&self) -> Result<usize> {
		Ok(usize::try_from(self.reader.searcher().num_docs()).unwrap_or(usize::MAX))
	}
}
