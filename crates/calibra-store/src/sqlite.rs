//! SQLite-backed card store.
//!
//! One row per catalog id; regeneration overwrites the generated fields in
//! place so posting history and `created_at` are preserved.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::schema::{SCHEMA_SQL, UPSERT_CARD_SQL};
use crate::types::StoreStats;
use calibra_core::{Card, Error, MediaType, NewCard, Result};

/// SQLite store for calibration cards.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create the SQLite store.
    ///
    /// `db_dir` is the directory (e.g., `data/db/`). The file will be `db_dir/calibra.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("calibra.db");

        let conn = Self::create_connection(&db_path)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        info!(
            "SqliteStore initialized: {} cards, path={}",
            store.count_cards()?,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    // ---------------------------------------------------------------
    // Card writes
    // ---------------------------------------------------------------

    /// Insert or overwrite the card for `card.external_id`. Returns the stored row.
    pub fn upsert_card(&self, card: &NewCard) -> Result<Card> {
        let genres_json = serde_json::to_string(&card.genres)?;
        let comparisons_json = serde_json::to_string(&card.comparisons)?;
        let now = now_millis();

        let conn = self.conn.lock();
        conn.prepare_cached(UPSERT_CARD_SQL)
            .map_err(|e| Error::Database(e.to_string()))?
            .execute(params![
                card.external_id,
                card.title,
                card.year,
                card.media_type.as_str(),
                card.poster_ref,
                genres_json,
                card.slug,
                card.body_text,
                card.calibration_sentence,
                comparisons_json,
                card.provider,
                now,
            ])
            .map_err(|e| Error::Database(e.to_string()))?;

        debug!("Upserted card external_id={} slug={}", card.external_id, card.slug);

        Self::query_card(&conn, "external_id = ?1", params![card.external_id])?
            .ok_or_else(|| Error::Internal(format!("card {} vanished after upsert", card.external_id)))
    }

    /// Replace only the calibration sentence. `None` clears it.
    pub fn set_calibration_sentence(&self, card_id: i64, sentence: Option<&str>) -> Result<Option<Card>> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE cards SET calibration_sentence = ?1, updated_at = ?2 WHERE id = ?3",
                params![sentence, now_millis(), card_id],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        if count == 0 {
            return Ok(None);
        }
        Self::query_card(&conn, "id = ?1", params![card_id])
    }

    /// Record that a posting job published the card on `channel`.
    pub fn record_posting(&self, card_id: i64, channel: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let exists: Option<i64> = conn
            .query_row("SELECT id FROM cards WHERE id = ?1", params![card_id], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        if exists.is_none() {
            return Ok(false);
        }
        conn.execute(
            "INSERT INTO card_postings (card_id, channel, posted_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(card_id, channel) DO UPDATE SET posted_at = excluded.posted_at",
            params![card_id, channel, now_millis()],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(true)
    }

    // ---------------------------------------------------------------
    // Card reads
    // ---------------------------------------------------------------

    /// Cache gate lookup.
    pub fn get_by_external_id(&self, external_id: &str) -> Result<Option<Card>> {
        let conn = self.conn.lock();
        Self::query_card(&conn, "external_id = ?1", params![external_id])
    }

    pub fn get_by_slug(&self, slug: &str) -> Result<Option<Card>> {
        let conn = self.conn.lock();
        Self::query_card(&conn, "slug = ?1 ORDER BY updated_at DESC LIMIT 1", params![slug])
    }

    pub fn get_by_id(&self, card_id: i64) -> Result<Option<Card>> {
        let conn = self.conn.lock();
        Self::query_card(&conn, "id = ?1", params![card_id])
    }

    /// Most recently created cards first. Returns (cards, total_count).
    pub fn list_cards(&self, page: usize, page_size: usize) -> Result<(Vec<Card>, i64)> {
        let limit = i64::try_from(page_size)
            .map_err(|_| Error::InvalidRequest(format!("page size {} is out of range", page_size)))?;
        let offset = page
            .saturating_sub(1)
            .checked_mul(page_size)
            .and_then(|o| i64::try_from(o).ok())
            .ok_or_else(|| Error::InvalidRequest(format!("page {} is out of range", page)))?;
        let total = self.count_cards()?;

        let conn = self.conn.lock();
        let ids: Vec<i64> = {
            let mut stmt = conn
                .prepare_cached("SELECT id FROM cards ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2")
                .map_err(|e| Error::Database(e.to_string()))?;
            let rows = stmt
                .query_map(params![limit, offset], |row| row.get(0))
                .map_err(|e| Error::Database(e.to_string()))?;
            rows.filter_map(|r| r.ok()).collect()
        };

        let mut cards = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(card) = Self::query_card(&conn, "id = ?1", params![id])? {
                cards.push(card);
            }
        }
        Ok((cards, total))
    }

    pub fn count_cards(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub fn get_stats(&self) -> Result<StoreStats> {
        let total_cards = self.count_cards()?;

        let conn = self.conn.lock();
        let cards_with_sentence: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM cards WHERE calibration_sentence IS NOT NULL",
                [],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let total_postings: i64 = conn
            .query_row("SELECT COUNT(*) FROM card_postings", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        drop(conn);

        let db_size = std::fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0);

        Ok(StoreStats {
            total_cards,
            cards_with_sentence,
            total_postings,
            db_path: self.db_path.to_string_lossy().to_string(),
            db_size_mb: db_size as f64 / (1024.0 * 1024.0),
        })
    }

    // ---------------------------------------------------------------
    // Row Mapping Helpers
    // ---------------------------------------------------------------

    fn query_card(
        conn: &Connection,
        predicate: &str,
        params: impl rusqlite::Params,
    ) -> Result<Option<Card>> {
        let sql = format!("SELECT * FROM cards WHERE {}", predicate);
        let card = conn
            .prepare_cached(&sql)
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params, |row| Ok(Self::row_to_card(row)))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        match card {
            Some(mut card) => {
                card.last_posted_at = Self::postings_for(conn, card.id)?;
                Ok(Some(card))
            }
            None => Ok(None),
        }
    }

    fn postings_for(conn: &Connection, card_id: i64) -> Result<BTreeMap<String, i64>> {
        let mut stmt = conn
            .prepare_cached("SELECT channel, posted_at FROM card_postings WHERE card_id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![card_id], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn row_to_card(row: &rusqlite::Row<'_>) -> Card {
        let media_type: String = row.get("media_type").unwrap_or_default();
        Card {
            id: row.get("id").unwrap_or(0),
            external_id: row.get("external_id").unwrap_or_default(),
            title: row.get("title").unwrap_or_default(),
            year: row.get("year").ok().flatten(),
            media_type: MediaType::parse(&media_type).unwrap_or(MediaType::Film),
            poster_ref: row.get("poster_ref").ok().flatten(),
            genres: row
                .get::<_, String>("genres_json")
                .ok()
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            slug: row.get("slug").unwrap_or_default(),
            body_text: row.get("body_text").unwrap_or_default(),
            calibration_sentence: row.get("calibration_sentence").ok().flatten(),
            comparisons: row
                .get::<_, String>("comparisons_json")
                .ok()
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            provider: row.get("provider").unwrap_or_default(),
            created_at: row.get("created_at").unwrap_or(0),
            updated_at: row.get("updated_at").unwrap_or(0),
            last_posted_at: BTreeMap::new(),
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
