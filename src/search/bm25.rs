use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::*;
use tantivy::{doc, Index, IndexWriter, ReloadPolicy, Term};

use crate::models::{Metadata, RetrievedDocument};
use crate::search::filter::matches_filters;
use crate::search::KeywordSearch;

const WRITER_HEAP_BYTES: usize = 50_000_000;
/// Smallest page read per round when post-filtering hits.
const FILTER_PAGE_MIN: usize = 64;

/// BM25 search index built on tantivy.
///
/// Cheap to clone; clones share the same on-disk index.
#[derive(Clone)]
pub struct Bm25Index {
    index: Index,
    // Field handles
    f_id: Field,
    f_content: Field,
    f_metadata: Field,
    /// tantivy allows one writer per index at a time
    write_lock: Arc<Mutex<()>>,
}

impl Bm25Index {
    /// Create or open a BM25 index at the given directory.
    pub fn open_or_create(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;

        let mut schema_builder = Schema::builder();
        let f_id = schema_builder.add_text_field("id", STRING | STORED);
        let f_content = schema_builder.add_text_field("content", TEXT | STORED);
        let f_metadata = schema_builder.add_text_field("metadata", STORED);
        let schema = schema_builder.build();

        let index = if index_dir.join("meta.json").exists() {
            Index::open_in_dir(index_dir).context("Failed to open existing tantivy index")?
        } else {
            Index::create_in_dir(index_dir, schema).context("Failed to create tantivy index")?
        };

        Ok(Self {
            index,
            f_id,
            f_content,
            f_metadata,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Index a batch of documents, replacing any existing document with the same id.
    pub fn index_documents(&self, docs: &[RetrievedDocument]) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut writer: IndexWriter = self
            .index
            .writer(WRITER_HEAP_BYTES)
            .context("Failed to create index writer")?;

        for d in docs {
            writer.delete_term(Term::from_field_text(self.f_id, &d.id));
            writer.add_document(doc!(
                self.f_id => d.id.clone(),
                self.f_content => d.content.clone(),
                self.f_metadata => serde_json::to_string(&d.metadata)?,
            ))?;
        }

        writer.commit().context("Failed to commit index")?;
        Ok(())
    }

    /// Delete a document by id.
    pub fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut writer: IndexWriter = self
            .index
            .writer(WRITER_HEAP_BYTES)
            .context("Failed to create index writer")?;

        writer.delete_term(Term::from_field_text(self.f_id, id));
        writer.commit().context("Failed to commit delete")?;
        Ok(())
    }

    /// Number of live documents.
    pub fn doc_count(&self) -> Result<u64> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to create reader")?;
        Ok(reader.searcher().num_docs())
    }

    /// Search the index and return scored hits.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        filters: Option<&Metadata>,
    ) -> Result<Vec<RetrievedDocument>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to create reader")?;

        let searcher = reader.searcher();

        let query_parser = QueryParser::for_index(&self.index, vec![self.f_content]);
        // Free text may contain query syntax; keep whatever parses
        let (query, errors) = query_parser.parse_query_lenient(query_str);
        if !errors.is_empty() {
            tracing::debug!("Keyword query '{query_str}' parsed with {} errors", errors.len());
        }

        let page_size = if filters.is_some() {
            limit.saturating_mul(2).max(FILTER_PAGE_MIN)
        } else {
            limit
        };

        let mut hits = Vec::new();
        let mut offset = 0;

        // Filtered searches page through the ranking until enough hits match
        loop {
            let top_docs = searcher
                .search(&*query, &TopDocs::with_limit(page_size).and_offset(offset))
                .context("Search failed")?;
            let page_len = top_docs.len();

            for (score, doc_address) in top_docs {
                let doc: TantivyDocument = searcher
                    .doc(doc_address)
                    .context("Failed to retrieve document")?;

                let metadata: Metadata = doc
                    .get_first(self.f_metadata)
                    .and_then(|v| v.as_str())
                    .and_then(|s| serde_json::from_str(s).ok())
                    .unwrap_or_default();

                if !matches_filters(&metadata, filters) {
                    continue;
                }

                let id = doc
                    .get_first(self.f_id)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();

                let content = doc
                    .get_first(self.f_content)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();

                hits.push(RetrievedDocument {
                    id,
                    content,
                    metadata,
                    score: Some(score),
                });

                if hits.len() >= limit {
                    return Ok(hits);
                }
            }

            if filters.is_none() || page_len < page_size {
                break;
            }
            offset += page_size;
        }

        Ok(hits)
    }
}

#[async_trait]
impl KeywordSearch for Bm25Index {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        filters: Option<&Metadata>,
    ) -> Result<Vec<RetrievedDocument>> {
        let index = self.clone();
        let query = query.to_string();
        let filters = filters.cloned();
        tokio::task::spawn_blocking(move || Bm25Index::search(&index, &query, top_k, filters.as_ref()))
            .await
            .context("BM25 search task failed")?
    }
}
