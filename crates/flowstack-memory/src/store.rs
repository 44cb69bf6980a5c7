use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use futures::future::BoxFuture;
use rusqlite::{params, Connection};
use tracing::debug;
use uuid::Uuid;

use flowstack_core::error::{FlowError, Result};
use flowstack_core::traits::VectorSearch;
use flowstack_core::{Metadata, ScoredPassage, SearchScope};

use crate::embeddings::cosine_similarity;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS passages (
        id TEXT PRIMARY KEY,
        collection TEXT NOT NULL,
        content TEXT NOT NULL,
        metadata TEXT NOT NULL,
        embedding BLOB NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_passages_collection ON passages(collection);";

/// SQLite-backed vector store. Each knowledge-base scope is one collection;
/// search is a brute-force cosine scan over that collection.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

fn db_err(e: impl std::fmt::Display) -> FlowError {
    FlowError::Database(e.to_string())
}

impl SqliteVectorStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| FlowError::Database(format!("Failed to create db directory: {}", e)))?;
        }

        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "Vector store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Store passages with their embeddings; returns the new passage ids.
    pub fn add_passages(
        &self,
        scope: &SearchScope,
        texts: &[String],
        embeddings: &[Vec<f32>],
        metadatas: Option<&[Metadata]>,
    ) -> Result<Vec<String>> {
        if texts.len() != embeddings.len() {
            return Err(FlowError::VectorStore(format!(
                "{} texts but {} embeddings",
                texts.len(),
                embeddings.len()
            )));
        }
        if let Some(m) = metadatas {
            if m.len() != texts.len() {
                return Err(FlowError::VectorStore(format!(
                    "{} texts but {} metadata entries",
                    texts.len(),
                    m.len()
                )));
            }
        }

        let collection = scope.name();
        let created_at = Utc::now().to_rfc3339();
        let mut conn = self.conn.lock().map_err(db_err)?;
        let tx = conn.transaction().map_err(db_err)?;
        let mut ids = Vec::with_capacity(texts.len());

        for (i, (text, embedding)) in texts.iter().zip(embeddings).enumerate() {
            let id = Uuid::new_v4().to_string();
            let metadata = match metadatas {
                Some(m) => serde_json::to_string(&m[i])?,
                None => "{}".to_string(),
            };
            tx.execute(
                "INSERT INTO passages (id, collection, content, metadata, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, collection, text, metadata, encode(embedding), created_at],
            )
            .map_err(db_err)?;
            ids.push(id);
        }

        tx.commit().map_err(db_err)?;
        debug!(collection = %collection, added = ids.len(), "Passages stored");
        Ok(ids)
    }

    /// Rank a scope's passages by cosine similarity, best first.
    ///
    /// With a filter, only passages whose metadata contains every filter
    /// key with an equal value are considered.
    pub fn search_scope(
        &self,
        scope: &SearchScope,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&Metadata>,
    ) -> Result<Vec<ScoredPassage>> {
        let conn = self.conn.lock().map_err(db_err)?;
        let mut stmt = conn
            .prepare("SELECT content, metadata, embedding FROM passages WHERE collection = ?1")
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![scope.name()], |row| {
                let content: String = row.get(0)?;
                let metadata: String = row.get(1)?;
                let blob: Vec<u8> = row.get(2)?;
                Ok((content, metadata, blob))
            })
            .map_err(db_err)?;

        let mut scored = Vec::new();
        for row in rows {
            let (content, metadata, blob) = row.map_err(db_err)?;
            let metadata: Metadata = serde_json::from_str(&metadata).unwrap_or_default();
            if let Some(filter) = filter {
                if !filter.iter().all(|(k, v)| metadata.get(k) == Some(v)) {
                    continue;
                }
            }
            scored.push(ScoredPassage {
                text: content,
                score: cosine_similarity(query_vector, &decode(&blob)),
                metadata,
            });
        }

        // Sort by similarity descending
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Remove every passage in a scope; returns how many were removed.
    pub fn delete_collection(&self, scope: &SearchScope) -> Result<usize> {
        let conn = self.conn.lock().map_err(db_err)?;
        conn.execute(
            "DELETE FROM passages WHERE collection = ?1",
            params![scope.name()],
        )
        .map_err(db_err)
    }

    pub fn count(&self, scope: &SearchScope) -> Result<usize> {
        let conn = self.conn.lock().map_err(db_err)?;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM passages WHERE collection = ?1",
                params![scope.name()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(n as usize)
    }
}

impl VectorSearch for SqliteVectorStore {
    fn search(
        &self,
        scope: &SearchScope,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&Metadata>,
    ) -> BoxFuture<'_, Result<Vec<ScoredPassage>>> {
        let scope = scope.clone();
        let query_vector = query_vector.to_vec();
        let filter = filter.cloned();
        Box::pin(async move { self.search_scope(&scope, &query_vector, top_k, filter.as_ref()) })
    }
}

fn encode(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Split a document into passages at blank lines, dropping empty ones.
pub fn split_passages(text: &str) -> Vec<String> {
    let mut passages = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                passages.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        passages.push(current.join("\n"));
    }
    passages
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> SearchScope {
        SearchScope::new("documents", "kb")
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn meta(value: serde_json::Value) -> Metadata {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Metadata::new(),
        }
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store
            .add_passages(
                &scope(),
                &texts(&["east", "north", "north-east"]),
                &[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
                None,
            )
            .unwrap();

        let hits = store.search(&scope(), &[0.0, 1.0], 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "north");
        assert_eq!(hits[1].text, "north-east");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_scopes_are_isolated() {
        let store = SqliteVectorStore::in_memory().unwrap();
        let other = SearchScope::new("documents", "other");
        store
            .add_passages(&scope(), &texts(&["mine"]), &[vec![1.0]], None)
            .unwrap();
        store
            .add_passages(&other, &texts(&["theirs"]), &[vec![1.0]], None)
            .unwrap();

        let hits = store.search_scope(&other, &[1.0], 5, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "theirs");
        assert_eq!(store.count(&scope()).unwrap(), 1);
    }

    #[test]
    fn test_metadata_filter() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store
            .add_passages(
                &scope(),
                &texts(&["a", "b"]),
                &[vec![1.0], vec![1.0]],
                Some(&[
                    meta(json!({"source": "faq.md", "lang": "en"})),
                    meta(json!({"source": "notes.md", "lang": "en"})),
                ]),
            )
            .unwrap();

        let filter = meta(json!({"source": "notes.md"}));
        let hits = store.search_scope(&scope(), &[1.0], 5, Some(&filter)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "b");
        assert_eq!(hits[0].metadata.get("lang"), Some(&json!("en")));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let store = SqliteVectorStore::in_memory().unwrap();
        let err = store
            .add_passages(&scope(), &texts(&["a", "b"]), &[vec![1.0]], None)
            .unwrap_err();
        assert!(matches!(err, FlowError::VectorStore(_)));
        assert_eq!(store.count(&scope()).unwrap(), 0);
    }

    #[test]
    fn test_delete_collection() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store
            .add_passages(&scope(), &texts(&["a", "b"]), &[vec![1.0], vec![0.5]], None)
            .unwrap();
        assert_eq!(store.delete_collection(&scope()).unwrap(), 2);
        assert_eq!(store.count(&scope()).unwrap(), 0);
        assert!(store.search_scope(&scope(), &[1.0], 5, None).unwrap().is_empty());
    }

    #[test]
    fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vectors.db");
        {
            let store = SqliteVectorStore::open(&path).unwrap();
            store
                .add_passages(&scope(), &texts(&["kept"]), &[vec![1.0, 2.0]], None)
                .unwrap();
        }
        let reopened = SqliteVectorStore::open(&path).unwrap();
        assert_eq!(reopened.count(&scope()).unwrap(), 1);
    }

    #[test]
    fn test_split_passages() {
        let doc = "First line\nstill first\n\n  \nSecond\n\n\nThird  \n";
        assert_eq!(
            split_passages(doc),
            vec!["First line\nstill first", "Second", "Third"]
        );
        assert!(split_passages("\n\n   \n").is_empty());
    }
}
