use async_trait::async_trait;
use once_cell::sync::Lazy;
use rampup_core::{Error, EvidenceSnippet, Result};
use regex::Regex;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::{DocumentIndex, IndexFilters};

/// Precompiled FTS5 special-character regex, shared across calls.
static FTS_SPECIAL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[*"():^{}]"#).expect("FTS special chars regex is valid"));

const EXCERPT_MAX_CHARS: usize = 400;

/// A document registered in the index.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
}

/// SQLite-backed document index with FTS5 full-text search.
#[derive(Clone)]
pub struct SqliteIndex {
    inner: Arc<Mutex<Connection>>,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl SqliteIndex {
    /// Open (or create) the index database at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("Failed to create db directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| Error::Storage(format!("Failed to open index db: {}", e)))?;

        // WAL improves concurrent read behavior
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();

        let index = Self {
            inner: Arc::new(Mutex::new(conn)),
            db_path: db_path.to_path_buf(),
        };
        index.init_schema()?;
        Ok(index)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT 'general',
                ingested_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_category ON documents(category);

            CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
                title,
                content,
                category,
                content='documents',
                content_rowid='rowid'
            );

            -- Triggers to keep FTS in sync
            CREATE TRIGGER IF NOT EXISTS documents_ai AFTER INSERT ON documents BEGIN
                INSERT INTO documents_fts(rowid, title, content, category)
                VALUES (new.rowid, new.title, new.content, new.category);
            END;

            CREATE TRIGGER IF NOT EXISTS documents_ad AFTER DELETE ON documents BEGIN
                INSERT INTO documents_fts(documents_fts, rowid, title, content, category)
                VALUES ('delete', old.rowid, old.title, old.content, old.category);
            END;

            CREATE TRIGGER IF NOT EXISTS documents_au AFTER UPDATE ON documents BEGIN
                INSERT INTO documents_fts(documents_fts, rowid, title, content, category)
                VALUES ('delete', old.rowid, old.title, old.content, old.category);
                INSERT INTO documents_fts(rowid, title, content, category)
                VALUES (new.rowid, new.title, new.content, new.category);
            END;
            ",
        )
        .map_err(|e| Error::Storage(format!("Failed to init index schema: {}", e)))?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.inner
            .lock()
            .map_err(|e| Error::Storage(format!("Lock error: {}", e)))
    }

    /// Insert or replace a document. Keying by id lets re-ingestion of the
    /// same source update in place.
    pub fn upsert(&self, doc: &Document) -> Result<()> {
        let conn = self.lock()?;
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO documents (id, title, content, category, ingested_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                category = excluded.category,
                ingested_at = excluded.ingested_at",
            params![doc.id, doc.title, doc.content, doc.category, now],
        )
        .map_err(|e| Error::Storage(format!("Failed to upsert document: {}", e)))?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(|e| Error::Storage(format!("Failed to count documents: {}", e)))?;
        Ok(count as usize)
    }

    /// Ingest every .md/.txt file under `dir` (recursively). The document id
    /// is the path relative to `dir`, so re-running updates in place.
    pub fn ingest_dir(&self, dir: &Path, category: &str) -> Result<usize> {
        let mut ingested = 0;
        let mut stack = vec![dir.to_path_buf()];

        while let Some(current) = stack.pop() {
            let entries = std::fs::read_dir(&current)?;
            for entry in entries {
                let path = entry?.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                let ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_lowercase();
                if !matches!(ext.as_str(), "md" | "txt") {
                    continue;
                }

                let content = match std::fs::read_to_string(&path) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                        continue;
                    }
                };
                let id = path
                    .strip_prefix(dir)
                    .unwrap_or(&path)
                    .display()
                    .to_string();
                let title = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("untitled")
                    .replace(['-', '_'], " ");

                self.upsert(&Document {
                    id,
                    title,
                    content,
                    category: category.to_string(),
                })?;
                ingested += 1;
            }
        }

        info!(count = ingested, dir = %dir.display(), "Ingested documents");
        Ok(ingested)
    }

    /// Escape user text into an FTS5 OR-query over its tokens.
    fn build_fts_query(query: &str) -> String {
        let cleaned = FTS_SPECIAL_CHARS.replace_all(query, " ");
        cleaned
            .split_whitespace()
            .map(|token| format!("\"{}\"", token))
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    /// Map a BM25 rank (negative, more negative = better) into (0, 1),
    /// monotone in match quality. Comparable within one call only.
    fn normalize_rank(rank: f64) -> f64 {
        let strength = rank.abs();
        strength / (1.0 + strength)
    }

    fn excerpt(content: &str) -> String {
        if content.chars().count() <= EXCERPT_MAX_CHARS {
            return content.trim().to_string();
        }
        let cut: String = content.chars().take(EXCERPT_MAX_CHARS).collect();
        format!("{}...", cut.trim_end())
    }

    fn search(&self, query: &str, top_k: usize, filters: &IndexFilters) -> Result<Vec<EvidenceSnippet>> {
        let fts_query = Self::build_fts_query(query);
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock().map_err(|e| {
            Error::RetrievalUnavailable(format!("index lock failed: {}", e))
        })?;

        // Secondary ordering on id keeps identical queries deterministic
        // when ranks tie.
        let sql = "
            SELECT d.id, d.title, d.content, documents_fts.rank
            FROM documents_fts
            JOIN documents d ON d.rowid = documents_fts.rowid
            WHERE documents_fts MATCH ?1
              AND (?2 IS NULL OR d.category = ?2)
            ORDER BY documents_fts.rank, d.id
            LIMIT ?3";

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| Error::RetrievalUnavailable(format!("query prepare failed: {}", e)))?;

        let now_ms = chrono::Utc::now().timestamp_millis();
        let rows = stmt
            .query_map(
                params![fts_query, filters.category, top_k as i64],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, f64>(3)?,
                    ))
                },
            )
            .map_err(|e| Error::RetrievalUnavailable(format!("query failed: {}", e)))?;

        let mut snippets = Vec::new();
        for row in rows {
            let (id, title, content, rank) =
                row.map_err(|e| Error::RetrievalUnavailable(format!("row read failed: {}", e)))?;
            snippets.push(EvidenceSnippet {
                source_id: id,
                title,
                excerpt: Self::excerpt(&content),
                score: Self::normalize_rank(rank),
                retrieved_at_ms: now_ms,
            });
        }

        debug!(query = %query, results = snippets.len(), "Retrieved evidence");
        Ok(snippets)
    }
}

#[async_trait]
impl DocumentIndex for SqliteIndex {
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filters: &IndexFilters,
    ) -> Result<Vec<EvidenceSnippet>> {
        self.search(query, top_k, filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_index() -> (SqliteIndex, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let index = SqliteIndex::open(&dir.path().join("documents.db")).unwrap();
        index
            .upsert(&Document {
                id: "it/vpn-access.md".to_string(),
                title: "VPN access".to_string(),
                content: "To request VPN access, open a ticket with IT and attach manager approval."
                    .to_string(),
                category: "policies".to_string(),
            })
            .unwrap();
        index
            .upsert(&Document {
                id: "eng/dev-setup.md".to_string(),
                title: "Development setup".to_string(),
                content: "Install the toolchain, clone the monorepo, and run the bootstrap script."
                    .to_string(),
                category: "technical".to_string(),
            })
            .unwrap();
        (index, dir)
    }

    #[tokio::test]
    async fn test_retrieve_ranked() {
        let (index, _dir) = test_index();
        let results = index
            .retrieve("how do I get VPN access", 3, &IndexFilters::default())
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].source_id, "it/vpn-access.md");
        for snippet in &results {
            assert!(snippet.score > 0.0 && snippet.score < 1.0);
        }
        // Relevance-descending
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_retrieve_deterministic() {
        let (index, _dir) = test_index();
        let a = index
            .retrieve("setup toolchain", 5, &IndexFilters::default())
            .await
            .unwrap();
        let b = index
            .retrieve("setup toolchain", 5, &IndexFilters::default())
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_category_filter() {
        let (index, _dir) = test_index();
        let results = index
            .retrieve("vpn toolchain", 5, &IndexFilters::category("technical"))
            .await
            .unwrap();
        assert!(results.iter().all(|s| s.source_id.starts_with("eng/")));
    }

    #[tokio::test]
    async fn test_empty_query() {
        let (index, _dir) = test_index();
        let results = index
            .retrieve("   ", 5, &IndexFilters::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_upsert_replaces() {
        let (index, _dir) = test_index();
        index
            .upsert(&Document {
                id: "it/vpn-access.md".to_string(),
                title: "VPN access".to_string(),
                content: "Updated VPN policy.".to_string(),
                category: "policies".to_string(),
            })
            .unwrap();
        assert_eq!(index.count().unwrap(), 2);
    }

    #[test]
    fn test_ingest_dir() {
        let dir = tempfile::tempdir().unwrap();
        let content_dir = dir.path().join("content");
        std::fs::create_dir_all(content_dir.join("it")).unwrap();
        std::fs::write(
            content_dir.join("it").join("badge-policy.md"),
            "Badges are issued by security on day one.",
        )
        .unwrap();
        std::fs::write(content_dir.join("ignored.pdf"), "binary").unwrap();

        let index = SqliteIndex::open(&dir.path().join("documents.db")).unwrap();
        let count = index.ingest_dir(&content_dir, "policies").unwrap();
        assert_eq!(count, 1);
        assert_eq!(index.count().unwrap(), 1);
    }

    #[test]
    fn test_fts_query_sanitized() {
        let q = SqliteIndex::build_fts_query("what's \"this\" (thing)*");
        assert!(!q.contains('('));
        assert!(!q.contains('*'));
        assert!(q.contains(" OR "));
    }
}
