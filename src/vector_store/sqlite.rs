//! SQLite-based vector store implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity.
//! Rows carry a `collection` column so several collections can share one file.

use super::{cosine_similarity, rank, Document, IndexedSource, MetadataFilter, SearchResult, VectorStore};
use crate::chunking::Chunk;
use crate::error::{HandbookError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        collection TEXT NOT NULL,
        content TEXT NOT NULL,
        source_file TEXT NOT NULL,
        file_path TEXT NOT NULL,
        category TEXT NOT NULL,
        page_number INTEGER,
        chunk_index INTEGER NOT NULL,
        chunk_length INTEGER NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
    CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(collection, source_file);
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    collection: String,
}

impl SqliteVectorStore {
    /// Open (or create) a store at `path`, scoped to `collection`.
    #[instrument(skip_all)]
    pub fn new(path: &Path, collection: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?} (collection {})", path, collection);

        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory(collection: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| HandbookError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
        let id_str: String = row.get(0)?;
        let embedding_bytes: Vec<u8> = row.get(8)?;
        let indexed_at_str: String = row.get(9)?;
        let chunk_index: i64 = row.get(6)?;
        let chunk_length: i64 = row.get(7)?;

        Ok(Document {
            id: uuid::Uuid::parse_str(&id_str).unwrap_or_default(),
            chunk: Chunk {
                text: row.get(1)?,
                source_file: row.get(2)?,
                file_path: row.get(3)?,
                category: row.get(4)?,
                page_number: row.get(5)?,
                chunk_index: chunk_index as usize,
                chunk_length: chunk_length as usize,
            },
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: parse_timestamp(&indexed_at_str),
        })
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, docs), fields(count = docs.len()))]
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for doc in docs {
            let chunk = &doc.chunk;
            tx.execute(
                r#"
                INSERT OR REPLACE INTO documents
                (id, collection, content, source_file, file_path, category, page_number,
                 chunk_index, chunk_length, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    doc.id.to_string(),
                    self.collection,
                    chunk.text,
                    chunk.source_file,
                    chunk.file_path,
                    chunk.category,
                    chunk.page_number,
                    chunk.chunk_index as i64,
                    chunk.chunk_length as i64,
                    Self::embedding_to_bytes(&doc.embedding),
                    doc.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        info!("Batch upserted {} documents into {}", docs.len(), self.collection);
        Ok(docs.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, content, source_file, file_path, category, page_number,
                   chunk_index, chunk_length, embedding, indexed_at
            FROM documents
            WHERE collection = ?1
              AND (?2 IS NULL OR source_file = ?2)
              AND (?3 IS NULL OR category = ?3)
            ORDER BY rowid
            "#,
        )?;

        let source = filter.and_then(|f| f.source_file.as_deref());
        let category = filter.and_then(|f| f.category.as_deref());

        let docs = stmt.query_map(params![self.collection, source, category], Self::row_to_document)?;

        let results: Vec<SearchResult> = docs
            .filter_map(|doc_result| doc_result.ok())
            .map(|doc| {
                let score = cosine_similarity(query_embedding, &doc.embedding);
                SearchResult { document: doc, score }
            })
            .collect();

        let results = rank(results, limit);
        debug!("Found {} matching documents", results.len());
        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![self.collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    #[instrument(skip(self))]
    async fn delete_collection(&self) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM documents WHERE collection = ?1",
            params![self.collection],
        )?;
        info!("Deleted {} documents from collection {}", deleted, self.collection);
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn delete_by_source(&self, source_file: &str) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND source_file = ?2",
            params![self.collection, source_file],
        )?;
        info!("Deleted {} documents for {}", deleted, source_file);
        Ok(deleted)
    }

    async fn is_source_indexed(&self, source_file: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1 AND source_file = ?2",
            params![self.collection, source_file],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    #[instrument(skip(self))]
    async fn list_sources(&self) -> Result<Vec<IndexedSource>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT source_file, MIN(category), COUNT(*) as chunk_count,
                   MAX(page_number), MAX(indexed_at)
            FROM documents
            WHERE collection = ?1
            GROUP BY source_file
            ORDER BY source_file
            "#,
        )?;

        let sources = stmt.query_map(params![self.collection], |row| {
            let indexed_at_str: String = row.get(4)?;
            Ok(IndexedSource {
                source_file: row.get(0)?,
                category: row.get(1)?,
                chunk_count: row.get(2)?,
                page_count: row.get(3)?,
                indexed_at: parse_timestamp(&indexed_at_str),
            })
        })?;

        Ok(sources.filter_map(|s| s.ok()).collect())
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }
}
