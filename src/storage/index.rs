//! SQLite full-text search index
//!
//! The index sits in `.curriculum/.cache/index.db` and mirrors the current
//! dataset: subject titles and descriptions, topic names and descriptions,
//! outcome texts and skill-bit labels. It records a blake3 fingerprint of
//! the dataset it was built from and is rebuilt when the fingerprint no
//! longer matches.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use thiserror::Error;

use crate::domain::{Dataset, EntityKind};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to fingerprint dataset: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// One search match
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub kind: EntityKind,
    pub id: String,
    pub title: String,
    pub snippet: String,
}

pub struct SearchIndex {
    db_path: PathBuf,
    conn: Connection,
}

fn kind_key(kind: EntityKind) -> &'static str {
    kind.prefix()
}

fn kind_from_key(key: &str) -> EntityKind {
    match key {
        "subject" => EntityKind::Subject,
        "topic" => EntityKind::Topic,
        "skill" => EntityKind::SkillBit,
        _ => EntityKind::LearningOutcome,
    }
}

/// Turns free text into an FTS5 query matching every word
fn fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| format!("\"{}\"", word.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

impl SearchIndex {
    /// Schema version - bump when schema changes to force rebuild
    const SCHEMA_VERSION: i32 = 1;

    const RESULT_LIMIT: i64 = 50;

    /// Creates or opens the index database
    pub fn open(db_path: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let mut index = Self {
            db_path: db_path.to_path_buf(),
            conn,
        };
        index.ensure_schema()?;

        Ok(index)
    }

    fn ensure_schema(&mut self) -> Result<(), IndexError> {
        if self.schema_version()? != Self::SCHEMA_VERSION {
            self.create_schema()?;
        }
        Ok(())
    }

    fn schema_version(&self) -> Result<i32, IndexError> {
        let version: Option<i32> = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .optional()?;
        Ok(version.unwrap_or(0))
    }

    fn create_schema(&mut self) -> Result<(), IndexError> {
        self.conn.execute_batch(
            "
            DROP TABLE IF EXISTS entries_fts;
            DROP TABLE IF EXISTS entries;
            DROP TABLE IF EXISTS cache_meta;

            CREATE TABLE entries (
                kind TEXT NOT NULL,
                id TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT,
                PRIMARY KEY (kind, id)
            );

            CREATE TABLE cache_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE VIRTUAL TABLE entries_fts USING fts5(
                id,
                title,
                body,
                content='entries',
                content_rowid='rowid'
            );

            CREATE TRIGGER entries_ai AFTER INSERT ON entries BEGIN
                INSERT INTO entries_fts(rowid, id, title, body)
                VALUES (NEW.rowid, NEW.id, NEW.title, NEW.body);
            END;

            CREATE TRIGGER entries_ad AFTER DELETE ON entries BEGIN
                INSERT INTO entries_fts(entries_fts, rowid, id, title, body)
                VALUES ('delete', OLD.rowid, OLD.id, OLD.title, OLD.body);
            END;
            ",
        )?;

        self.conn
            .execute_batch(&format!("PRAGMA user_version = {}", Self::SCHEMA_VERSION))?;

        Ok(())
    }

    /// Content hash of a dataset
    pub fn fingerprint(dataset: &Dataset) -> Result<String, IndexError> {
        let bytes = serde_json::to_vec(dataset)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    fn stored_fingerprint(&self) -> Result<Option<String>, IndexError> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM cache_meta WHERE key = 'fingerprint'",
                [],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Returns true if the index was built from a different dataset
    pub fn is_stale(&self, dataset: &Dataset) -> Result<bool, IndexError> {
        Ok(self.stored_fingerprint()?.as_deref() != Some(Self::fingerprint(dataset)?.as_str()))
    }

    /// Replaces the index content with `dataset`
    pub fn rebuild(&mut self, dataset: &Dataset) -> Result<(), IndexError> {
        let fingerprint = Self::fingerprint(dataset)?;
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM entries", [])?;

        {
            let mut stmt =
                tx.prepare("INSERT INTO entries (kind, id, title, body) VALUES (?1, ?2, ?3, ?4)")?;

            for subject in dataset.subjects() {
                stmt.execute(params![
                    kind_key(EntityKind::Subject),
                    subject.id.as_str(),
                    subject.title,
                    subject.description
                ])?;
            }

            for topic in dataset.topics() {
                let body = [topic.name_localized.as_deref(), topic.description.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join("\n");
                stmt.execute(params![
                    kind_key(EntityKind::Topic),
                    topic.id.as_str(),
                    topic.name,
                    body
                ])?;
            }

            for outcome in dataset.outcomes() {
                stmt.execute(params![
                    kind_key(EntityKind::LearningOutcome),
                    outcome.id.as_str(),
                    outcome.text,
                    outcome.text_localized
                ])?;
            }

            for bit in dataset.skill_bits() {
                stmt.execute(params![
                    kind_key(EntityKind::SkillBit),
                    bit.id.as_str(),
                    bit.label,
                    Option::<String>::None
                ])?;
            }
        }

        tx.execute(
            "INSERT OR REPLACE INTO cache_meta (key, value) VALUES ('fingerprint', ?1)",
            params![fingerprint],
        )?;
        tx.commit()?;

        let counts = dataset.counts();
        tracing::debug!(
            subjects = counts.subjects,
            topics = counts.topics,
            outcomes = counts.learning_outcomes,
            skill_bits = counts.skill_bits,
            "Rebuilt search index"
        );

        Ok(())
    }

    /// Full-text search; every word of `query` must match
    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>, IndexError> {
        let fts = fts_query(query);
        if fts.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            "SELECT e.kind, e.id, e.title, snippet(entries_fts, -1, '[', ']', '...', 16)
             FROM entries_fts JOIN entries e ON e.rowid = entries_fts.rowid
             WHERE entries_fts MATCH ?1
             ORDER BY rank LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![fts, Self::RESULT_LIMIT], |row| {
            let kind: String = row.get(0)?;
            Ok(SearchHit {
                kind: kind_from_key(&kind),
                id: row.get(1)?,
                title: row.get(2)?,
                snippet: row.get(3)?,
            })
        })?;

        let mut hits = Vec::new();
        for row in rows {
            hits.push(row?);
        }
        Ok(hits)
    }

    /// Returns the path to the index database
    pub fn path(&self) -> &Path {
        &self.db_path
    }
}
