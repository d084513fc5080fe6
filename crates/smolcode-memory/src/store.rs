use std::path::PathBuf;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::debug;

use crate::db;
use crate::error::{MemoryError, Result};
use crate::types::Memory;

/// FTS5 reserved operator words. A term equal to one of these (any case)
/// must be quoted or it changes the query's meaning.
const FTS_OPERATORS: [&str; 3] = ["AND", "OR", "NOT"];

/// Store for facts with full-text search.
///
/// Holds its connection for the process lifetime, wrapped in a `Mutex` —
/// the store is shared between the agent's memory tools and the CLI
/// subcommands.
pub struct MemoryStore {
    db: Mutex<Connection>,
}

impl MemoryStore {
    /// Open (creating directories and schema as needed) the store at the
    /// given database file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let conn = Connection::open(&path)?;
        db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Insert a fact or replace the content of an existing one (upsert by
    /// id). The FTS index follows via triggers.
    pub fn add(&self, id: &str, content: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(MemoryError::InvalidInput {
                field: "id",
                reason: "must not be empty".to_string(),
            });
        }
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO memories (id, content) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET content = excluded.content",
            rusqlite::params![id, content],
        )?;
        debug!(id, "memory stored");
        Ok(())
    }

    /// Fetch a fact by id.
    pub fn get(&self, id: &str) -> Result<Memory> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT docid, id, content FROM memories WHERE id = ?1",
            rusqlite::params![id],
            row_to_memory,
        ) {
            Ok(m) => Ok(m),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(MemoryError::NotFound {
                id: id.to_string(),
            }),
            Err(e) => Err(MemoryError::Database(e)),
        }
    }

    /// Delete a fact by id.
    pub fn forget(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "DELETE FROM memories WHERE id = ?1",
            rusqlite::params![id],
        )?;
        if rows_changed == 0 {
            return Err(MemoryError::NotFound {
                id: id.to_string(),
            });
        }
        debug!(id, "memory forgotten");
        Ok(())
    }

    /// Full-text search in relevance-rank order.
    ///
    /// Runs in two steps — matching docids first, then a row lookup per
    /// docid — so the FTS rank ordering never meets the join planner.
    pub fn search(&self, query: &str) -> Result<Vec<Memory>> {
        let shaped = shape_query(query);
        if shaped.is_empty() {
            return Ok(Vec::new());
        }

        let db = self.db.lock().unwrap();
        let docids: Vec<i64> = {
            let mut stmt =
                db.prepare("SELECT rowid FROM memories_fts WHERE memories_fts MATCH ?1 ORDER BY rank")?;
            let rows = stmt.query_map(rusqlite::params![shaped], |row| row.get(0))?;
            rows.filter_map(|r| r.ok()).collect()
        };

        let mut stmt = db.prepare("SELECT docid, id, content FROM memories WHERE docid = ?1")?;
        let mut results = Vec::with_capacity(docids.len());
        for docid in docids {
            match stmt.query_row(rusqlite::params![docid], row_to_memory) {
                Ok(m) => results.push(m),
                Err(rusqlite::Error::QueryReturnedNoRows) => continue,
                Err(e) => return Err(MemoryError::Database(e)),
            }
        }
        Ok(results)
    }

    /// Every stored fact, in allocation order.
    pub fn list(&self) -> Result<Vec<Memory>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT docid, id, content FROM memories ORDER BY docid ASC")?;
        let rows = stmt.query_map([], row_to_memory)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    Ok(Memory {
        doc_id: row.get(0)?,
        id: row.get(1)?,
        content: row.get(2)?,
    })
}

/// Rewrite a free-form query into an FTS5 expression that cannot raise a
/// parser error. Each whitespace-separated term passes through as a
/// bareword when it is purely `[A-Za-z0-9_]` and not an operator word;
/// anything else becomes a quoted phrase with embedded quotes doubled.
/// Terms joined by spaces match with implicit AND.
fn shape_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| {
            if is_bareword(term) {
                term.to_string()
            } else {
                format!("\"{}\"", term.replace('"', "\"\""))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_bareword(term: &str) -> bool {
    !term.is_empty()
        && term
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        && !FTS_OPERATORS
            .iter()
            .any(|op| term.eq_ignore_ascii_case(op))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_passes_barewords_through() {
        assert_eq!(shape_query("rust sqlite"), "rust sqlite");
    }

    #[test]
    fn shape_quotes_paths_and_operators() {
        assert_eq!(shape_query("path/to/doc.txt"), "\"path/to/doc.txt\"");
        assert_eq!(shape_query("AND"), "\"AND\"");
        assert_eq!(shape_query("not"), "\"not\"");
        assert_eq!(shape_query("foo-bar"), "\"foo-bar\"");
    }

    #[test]
    fn shape_doubles_embedded_quotes() {
        assert_eq!(shape_query("say \"hi\""), "say \"\"\"hi\"\"\"");
    }

    #[test]
    fn upsert_is_idempotent_and_get_returns_latest() {
        let store = MemoryStore::open_in_memory().unwrap();
        store.add("lang", "Go").unwrap();
        store.add("lang", "Go").unwrap();
        assert_eq!(store.get("lang").unwrap().content, "Go");
        assert_eq!(store.list().unwrap().len(), 1);

        store.add("lang", "Rust").unwrap();
        assert_eq!(store.get("lang").unwrap().content, "Rust");
    }

    #[test]
    fn forget_then_get_is_not_found() {
        let store = MemoryStore::open_in_memory().unwrap();
        store.add("lang", "Go").unwrap();
        store.forget("lang").unwrap();
        assert!(matches!(
            store.get("lang"),
            Err(MemoryError::NotFound { .. })
        ));
        assert!(matches!(
            store.forget("lang"),
            Err(MemoryError::NotFound { .. })
        ));
    }

    #[test]
    fn empty_id_is_rejected() {
        let store = MemoryStore::open_in_memory().unwrap();
        assert!(matches!(
            store.add("  ", "content"),
            Err(MemoryError::InvalidInput { field: "id", .. })
        ));
    }

    #[test]
    fn search_finds_path_phrase() {
        let store = MemoryStore::open_in_memory().unwrap();
        store.add("doc", "file at path/to/doc.txt").unwrap();
        store.add("other", "unrelated note").unwrap();

        let hits = store.search("path/to/doc.txt").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "doc");

        assert!(store.search("missing").unwrap().is_empty());
    }

    #[test]
    fn search_never_raises_parser_errors() {
        let store = MemoryStore::open_in_memory().unwrap();
        store.add("a", "alpha beta").unwrap();
        for q in [
            "*", "\"", "(((", "a AND b", "don't", "semi;colon", "-dash", "", "   ",
        ] {
            store.search(q).unwrap_or_else(|e| panic!("query {q:?} failed: {e}"));
        }
    }

    #[test]
    fn update_reindexes_fts() {
        let store = MemoryStore::open_in_memory().unwrap();
        store.add("fact", "original wording").unwrap();
        store.add("fact", "replacement phrasing").unwrap();

        assert!(store.search("original").unwrap().is_empty());
        assert_eq!(store.search("replacement").unwrap().len(), 1);
    }

    #[test]
    fn search_ranks_by_relevance() {
        let store = MemoryStore::open_in_memory().unwrap();
        store.add("sparse", "rust appears once here").unwrap();
        store.add("dense", "rust rust rust rust").unwrap();

        let hits = store.search("rust").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "dense");
    }
}
