use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::models::{Metadata, RetrievedDocument};
use crate::search::filter::matches_filters;
use crate::search::SemanticSearch;

/// A stored vector entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    id: String,
    content: String,
    #[serde(default)]
    metadata: Metadata,
    embedding: Vec<f32>,
}

/// In-memory vector store with disk persistence and cosine similarity search.
///
/// Cheap to clone; clones share the same entries and backing file.
#[derive(Clone)]
pub struct VectorStore {
    entries: Arc<RwLock<Vec<VectorEntry>>>,
    persist_path: PathBuf,
    /// 0 = unlimited
    max_entries: usize,
}

/// What an `add_documents` call displaced, so it can be undone.
#[derive(Debug)]
pub struct VectorUndo {
    added: Vec<String>,
    replaced: Vec<VectorEntry>,
}

impl VectorStore {
    pub fn open_or_create(vector_dir: &Path) -> Result<Self> {
        Self::open_or_create_with_limit(vector_dir, 0)
    }

    pub fn open_or_create_with_limit(vector_dir: &Path, max_entries: usize) -> Result<Self> {
        std::fs::create_dir_all(vector_dir)?;
        let persist_path = vector_dir.join("vectors.json");

        let entries = if persist_path.exists() {
            let data = std::fs::read_to_string(&persist_path)
                .context("Failed to read vector store")?;
            match serde_json::from_str(&data) {
                Ok(entries) => entries,
                Err(e) => {
                    // Keep the unreadable file so the next persist cannot overwrite it
                    let corrupt_path = persist_path.with_extension("json.corrupt");
                    std::fs::rename(&persist_path, &corrupt_path)
                        .context("Failed to move aside unreadable vector store")?;
                    tracing::warn!(
                        "Vector store at {} is unreadable ({e}), moved to {} and starting empty",
                        persist_path.display(),
                        corrupt_path.display()
                    );
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            entries: Arc::new(RwLock::new(entries)),
            persist_path,
            max_entries,
        })
    }

    /// Insert or replace documents. `embeddings` must be parallel with `docs`.
    ///
    /// When an id repeats within the batch, the last occurrence wins.
    pub fn add_documents(
        &self,
        docs: &[RetrievedDocument],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<VectorUndo> {
        anyhow::ensure!(
            docs.len() == embeddings.len(),
            "Got {} embeddings for {} documents",
            embeddings.len(),
            docs.len()
        );

        let mut batch: Vec<VectorEntry> = Vec::with_capacity(docs.len());
        for (doc, embedding) in docs.iter().zip(embeddings) {
            let entry = VectorEntry {
                id: doc.id.clone(),
                content: doc.content.clone(),
                metadata: doc.metadata.clone(),
                embedding,
            };
            match batch.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry,
                None => batch.push(entry),
            }
        }
        let ids: HashSet<&str> = batch.iter().map(|e| e.id.as_str()).collect();

        let mut entries = self.entries.write();
        let replaced_count = entries.iter().filter(|e| ids.contains(e.id.as_str())).count();

        if self.max_entries > 0 && entries.len() - replaced_count + batch.len() > self.max_entries {
            anyhow::bail!(
                "Vector store limit reached ({} entries, max {})",
                entries.len(),
                self.max_entries
            );
        }

        let (replaced, mut kept): (Vec<_>, Vec<_>) = entries
            .drain(..)
            .partition(|e| ids.contains(e.id.as_str()));
        let added = batch.iter().map(|e| e.id.clone()).collect();
        kept.extend(batch);
        *entries = kept;

        self.persist(&entries)?;
        Ok(VectorUndo { added, replaced })
    }

    /// Revert an earlier `add_documents`, restoring any entries it replaced.
    pub fn undo(&self, undo: VectorUndo) -> Result<()> {
        let mut entries = self.entries.write();
        let added: HashSet<&str> = undo.added.iter().map(String::as_str).collect();
        entries.retain(|e| !added.contains(e.id.as_str()));
        entries.extend(undo.replaced);
        self.persist(&entries)
    }

    /// Delete a document by id. Returns whether anything was removed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if removed {
            self.persist(&entries)?;
        }
        Ok(removed)
    }

    fn persist(&self, entries: &[VectorEntry]) -> Result<()> {
        let data = serde_json::to_string(entries)?;
        let tmp_path = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data).context("Failed to write vector store")?;
        std::fs::rename(&tmp_path, &self.persist_path).context("Failed to replace vector store")?;
        Ok(())
    }

    /// Search by cosine similarity against a query embedding.
    pub fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filters: Option<&Metadata>,
    ) -> Vec<RetrievedDocument> {
        let entries = self.entries.read();

        let mut scored: Vec<(f32, &VectorEntry)> = entries
            .iter()
            .filter(|e| matches_filters(&e.metadata, filters))
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), e))
            .collect();

        // Sort descending by score
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, e)| RetrievedDocument {
                id: e.id.clone(),
                content: e.content.clone(),
                metadata: e.metadata.clone(),
                score: Some(score),
            })
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }
}

#[async_trait]
impl SemanticSearch for VectorStore {
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filters: Option<&Metadata>,
    ) -> Result<Vec<RetrievedDocument>> {
        let store = self.clone();
        let query_vector = query_vector.to_vec();
        let filters = filters.cloned();
        tokio::task::spawn_blocking(move || {
            VectorStore::search(&store, &query_vector, top_k, filters.as_ref())
        })
        .await
        .context("Vector search task failed")
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, lang: &str) -> RetrievedDocument {
        let mut metadata = Metadata::new();
        metadata.insert("lang".into(), json!(lang));
        RetrievedDocument {
            id: id.to_string(),
            content: format!("{id} body"),
            metadata,
            score: None,
        }
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_mismatched_or_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_add_replaces_existing_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        store
            .add_documents(&[doc("a", "rust")], vec![vec![1.0, 0.0]])
            .unwrap();
        store
            .add_documents(&[doc("a", "go")], vec![vec![0.0, 1.0]])
            .unwrap();

        assert_eq!(store.entry_count(), 1);
        let hits = store.search(&[0.0, 1.0], 5, None);
        assert_eq!(hits[0].metadata["lang"], "go");
    }

    #[test]
    fn test_mismatched_embeddings_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        assert!(store.add_documents(&[doc("a", "rust")], vec![]).is_err());
    }

    #[test]
    fn test_limit_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create_with_limit(dir.path(), 1).unwrap();
        store
            .add_documents(&[doc("a", "rust")], vec![vec![1.0]])
            .unwrap();
        assert!(store
            .add_documents(&[doc("b", "rust")], vec![vec![1.0]])
            .is_err());
        // Replacing an existing id stays within the limit
        assert!(store
            .add_documents(&[doc("a", "go")], vec![vec![1.0]])
            .is_ok());
    }

    #[test]
    fn test_search_applies_filters() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        store
            .add_documents(
                &[doc("r", "rust"), doc("p", "python")],
                vec![vec![1.0, 0.0], vec![1.0, 0.1]],
            )
            .unwrap();

        let mut filters = Metadata::new();
        filters.insert("lang".into(), json!("python"));
        let hits = store.search(&[1.0, 0.0], 10, Some(&filters));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "p");
    }

    #[test]
    fn test_duplicate_ids_in_batch_keep_last() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        store
            .add_documents(&[doc("x", "rust"), doc("x", "go")], vec![vec![1.0, 0.0], vec![0.0, 1.0]])
            .unwrap();

        assert_eq!(store.entry_count(), 1);
        let hits = store.search(&[0.0, 1.0], 5, None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata["lang"], "go");
    }

    #[test]
    fn test_undo_restores_replaced_and_removes_added() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        store
            .add_documents(&[doc("a", "rust")], vec![vec![1.0, 0.0]])
            .unwrap();

        let undo = store
            .add_documents(&[doc("a", "go"), doc("b", "go")], vec![vec![0.0, 1.0], vec![0.0, 1.0]])
            .unwrap();
        assert_eq!(store.entry_count(), 2);

        store.undo(undo).unwrap();
        assert_eq!(store.entry_count(), 1);
        let hits = store.search(&[1.0, 0.0], 5, None);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[0].metadata["lang"], "rust");

        // The undo is persisted too
        let reopened = VectorStore::open_or_create(dir.path()).unwrap();
        assert_eq!(reopened.entry_count(), 1);
    }

    #[test]
    fn test_unreadable_file_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vectors.json"), "{not json").unwrap();

        let store = VectorStore::open_or_create(dir.path()).unwrap();
        assert_eq!(store.entry_count(), 0);
        store
            .add_documents(&[doc("a", "rust")], vec![vec![1.0]])
            .unwrap();

        let kept = std::fs::read_to_string(dir.path().join("vectors.json.corrupt")).unwrap();
        assert_eq!(kept, "{not json");
    }

    #[tokio::test]
    async fn test_trait_search_applies_filters() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        store
            .add_documents(
                &[doc("r", "rust"), doc("p", "python")],
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .unwrap();

        let mut filters = Metadata::new();
        filters.insert("lang".into(), json!("rust"));
        let hits = SemanticSearch::search(&store, &[0.0, 1.0], 5, Some(&filters))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "r");
    }

    #[test]
    fn test_persisted_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = VectorStore::open_or_create(dir.path()).unwrap();
            store
                .add_documents(&[doc("a", "rust")], vec![vec![1.0, 0.0]])
                .unwrap();
        }
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        assert_eq!(store.entry_count(), 1);
        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert_eq!(store.entry_count(), 0);
    }
}
