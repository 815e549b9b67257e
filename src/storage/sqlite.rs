//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordStore trait.

use crate::record::{Record, Tag};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordStore, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus, StoredQuote};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str =
    "id, started_at, finished_at, config_hash, status, record_count, abort_reason";

const QUOTE_COLUMNS: &str =
    "id, text, author, author_url, external_reference_url, first_seen_run, last_seen_run";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn load_tags(&self, quote_id: i64) -> StorageResult<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.name, t.url FROM quote_tags qt
             JOIN tags t ON t.id = qt.tag_id
             WHERE qt.quote_id = ?1
             ORDER BY qt.position",
        )?;

        let tags = stmt
            .query_map(params![quote_id], |row| {
                Ok(Tag {
                    name: row.get(0)?,
                    url: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tags)
    }

    fn load_quotes(&self, filter: &str, run_id: Option<i64>) -> StorageResult<Vec<StoredQuote>> {
        let query = format!("SELECT {} FROM quotes {} ORDER BY id", QUOTE_COLUMNS, filter);
        let mut stmt = self.conn.prepare(&query)?;

        let rows = match run_id {
            Some(id) => stmt.query_map(params![id], quote_from_row)?,
            None => stmt.query_map([], quote_from_row)?,
        };

        let mut quotes = rows.collect::<Result<Vec<_>, _>>()?;
        for quote in &mut quotes {
            quote.record.tags = self.load_tags(quote.id)?;
        }

        Ok(quotes)
    }

    fn count(&self, table: &str) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
        record_count: row.get::<_, i64>(5)? as u64,
        abort_reason: row.get(6)?,
    })
}

fn quote_from_row(row: &Row<'_>) -> rusqlite::Result<StoredQuote> {
    Ok(StoredQuote {
        id: row.get(0)?,
        record: Record {
            text: row.get(1)?,
            author: row.get(2)?,
            author_url: row.get(3)?,
            external_reference_url: row.get(4)?,
            tags: Vec::new(),
        },
        first_seen_run: row.get(5)?,
        last_seen_run: row.get(6)?,
    })
}

/// Inserts a tag or refreshes its URL on any connection or transaction
fn upsert_tag_on(conn: &Connection, tag: &Tag) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO tags (name, url) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET url = excluded.url",
        params![tag.name, tag.url],
    )?;

    conn.query_row(
        "SELECT id FROM tags WHERE name = ?1",
        params![tag.name],
        |row| row.get(0),
    )
}

impl RecordStore for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        record_count: usize,
        abort_reason: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, record_count = ?3, abort_reason = ?4
             WHERE id = ?5",
            params![
                status.to_db_string(),
                now,
                record_count as i64,
                abort_reason,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let query = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&query, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let query = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&query, [], run_from_row).optional()?;
        Ok(run)
    }

    // ===== Records =====

    fn upsert_tag(&mut self, tag: &Tag) -> StorageResult<i64> {
        Ok(upsert_tag_on(&self.conn, tag)?)
    }

    fn save_record(&mut self, record: &Record, run_id: i64) -> StorageResult<i64> {
        record
            .validate()
            .map_err(|e| StorageError::ConstraintViolation(e.to_string()))?;

        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO quotes (text, author, author_url, external_reference_url,
                                 first_seen_run, last_seen_run)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(text, author) DO UPDATE SET
                 author_url = excluded.author_url,
                 external_reference_url = excluded.external_reference_url,
                 last_seen_run = excluded.last_seen_run",
            params![
                record.text,
                record.author,
                record.author_url,
                record.external_reference_url,
                run_id
            ],
        )?;

        let quote_id: i64 = tx.query_row(
            "SELECT id FROM quotes WHERE text = ?1 AND author = ?2",
            params![record.text, record.author],
            |row| row.get(0),
        )?;

        tx.execute(
            "DELETE FROM quote_tags WHERE quote_id = ?1",
            params![quote_id],
        )?;

        for (position, tag) in record.tags.iter().enumerate() {
            let tag_id = upsert_tag_on(&tx, tag)?;
            tx.execute(
                "INSERT OR IGNORE INTO quote_tags (quote_id, tag_id, position) VALUES (?1, ?2, ?3)",
                params![quote_id, tag_id, position as i64],
            )?;
        }

        tx.commit()?;
        Ok(quote_id)
    }

    fn list_records(&self) -> StorageResult<Vec<StoredQuote>> {
        self.load_quotes("", None)
    }

    fn list_records_for_run(&self, run_id: i64) -> StorageResult<Vec<StoredQuote>> {
        self.load_quotes("WHERE last_seen_run = ?1", Some(run_id))
    }

    // ===== Statistics =====

    fn count_records(&self) -> StorageResult<u64> {
        self.count("quotes")
    }

    fn count_tags(&self) -> StorageResult<u64> {
        self.count("tags")
    }

    fn count_runs(&self) -> StorageResult<u64> {
        self.count("runs")
    }

    fn top_tags(&self, limit: usize) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.name, COUNT(qt.quote_id) AS uses
             FROM tags t JOIN quote_tags qt ON qt.tag_id = t.id
             GROUP BY t.id
             ORDER BY uses DESC, t.name
             LIMIT ?1",
        )?;

        let tags = stmt
            .query_map(params![limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tags)
    }

    fn author_breakdown(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT author, COUNT(*) AS quotes FROM quotes
             GROUP BY author
             ORDER BY quotes DESC, author",
        )?;

        let authors = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(authors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str) -> Tag {
        Tag {
            name: name.to_string(),
            url: format!("https://quotes.toscrape.com/tag/{}/", name),
        }
    }

    fn record(text: &str, author: &str, tags: &[&str]) -> Record {
        Record {
            text: text.to_string(),
            author: author.to_string(),
            author_url: format!("https://quotes.toscrape.com/author/{}", author),
            external_reference_url: None,
            tags: tags.iter().map(|name| tag(name)).collect(),
        }
    }

    #[test]
    fn test_create_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("test_hash").unwrap();
        assert!(run_id > 0);

        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.config_hash, "test_hash");
        assert!(run.finished_at.is_none());
    }

    #[test]
    fn test_finish_run_records_outcome() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("h").unwrap();

        storage
            .finish_run(run_id, RunStatus::Partial, 10, Some("fetch of /page/2/ failed"))
            .unwrap();

        let run = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(run.id, run_id);
        assert_eq!(run.status, RunStatus::Partial);
        assert_eq!(run.record_count, 10);
        assert_eq!(run.abort_reason.as_deref(), Some("fetch of /page/2/ failed"));
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_finish_unknown_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.finish_run(42, RunStatus::Completed, 0, None),
            Err(StorageError::RunNotFound(42))
        ));
        assert!(matches!(
            storage.get_run(42),
            Err(StorageError::RunNotFound(42))
        ));
    }

    #[test]
    fn test_upsert_tag_is_idempotent() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();

        let first = storage.upsert_tag(&tag("love")).unwrap();
        let second = storage.upsert_tag(&tag("love")).unwrap();

        assert_eq!(first, second);
        assert_eq!(storage.count_tags().unwrap(), 1);
    }

    #[test]
    fn test_save_record_roundtrip_keeps_tag_order() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("h").unwrap();
        let saved = record("Be yourself.", "Oscar Wilde", &["life", "attributed", "be-yourself"]);

        storage.save_record(&saved, run_id).unwrap();

        let stored = storage.list_records().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].record, saved);
        assert_eq!(stored[0].first_seen_run, run_id);
    }

    #[test]
    fn test_repeated_runs_do_not_duplicate() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let first_run = storage.create_run("h").unwrap();
        let quote = record("Be yourself.", "Oscar Wilde", &["life"]);

        let id1 = storage.save_record(&quote, first_run).unwrap();
        let second_run = storage.create_run("h").unwrap();
        let id2 = storage.save_record(&quote, second_run).unwrap();

        assert_eq!(id1, id2);
        assert_eq!(storage.count_records().unwrap(), 1);
        assert_eq!(storage.count_tags().unwrap(), 1);

        let stored = &storage.list_records().unwrap()[0];
        assert_eq!(stored.first_seen_run, first_run);
        assert_eq!(stored.last_seen_run, second_run);
        assert_eq!(storage.list_records_for_run(first_run).unwrap().len(), 0);
        assert_eq!(storage.list_records_for_run(second_run).unwrap().len(), 1);
    }

    #[test]
    fn test_tag_saved_before_record_is_reused() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("h").unwrap();

        let tag_id = storage.upsert_tag(&tag("humor")).unwrap();
        storage
            .save_record(&record("Night.", "Steve Martin", &["humor"]), run_id)
            .unwrap();

        assert_eq!(storage.count_tags().unwrap(), 1);
        assert_eq!(storage.upsert_tag(&tag("humor")).unwrap(), tag_id);
    }

    #[test]
    fn test_updated_tags_replace_old_links() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("h").unwrap();

        storage
            .save_record(&record("Q", "A", &["one", "two"]), run_id)
            .unwrap();
        storage.save_record(&record("Q", "A", &["two"]), run_id).unwrap();

        let stored = storage.list_records().unwrap();
        assert_eq!(stored[0].record.tag_names(), vec!["two"]);
    }

    #[test]
    fn test_invalid_record_is_rejected() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("h").unwrap();

        let result = storage.save_record(&record("", "A", &[]), run_id);
        assert!(matches!(result, Err(StorageError::ConstraintViolation(_))));
        assert_eq!(storage.count_records().unwrap(), 0);
    }

    #[test]
    fn test_statistics() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("h").unwrap();

        storage.save_record(&record("Q1", "Einstein", &["life", "science"]), run_id).unwrap();
        storage.save_record(&record("Q2", "Einstein", &["life"]), run_id).unwrap();
        storage.save_record(&record("Q3", "Austen", &["love"]), run_id).unwrap();

        assert_eq!(storage.count_runs().unwrap(), 1);
        assert_eq!(storage.count_records().unwrap(), 3);
        assert_eq!(storage.top_tags(1).unwrap(), vec![("life".to_string(), 2)]);
        assert_eq!(
            storage.author_breakdown().unwrap(),
            vec![("Einstein".to_string(), 2), ("Austen".to_string(), 1)]
        );
    }

    #[test]
    fn test_reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quotes.db");

        {
            let mut storage = SqliteStorage::new(&path).unwrap();
            let run_id = storage.create_run("h").unwrap();
            storage.save_record(&record("Q", "A", &[]), run_id).unwrap();
        }

        let storage = SqliteStorage::new(&path).unwrap();
        assert_eq!(storage.count_records().unwrap(), 1);
    }
}
