//! Database schema SQL.

/// Cards keyed by catalog id, plus per-channel posting marks.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS cards (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    year INTEGER,
    media_type TEXT NOT NULL,
    poster_ref TEXT,
    genres_json TEXT NOT NULL DEFAULT '[]',
    slug TEXT NOT NULL,
    body_text TEXT NOT NULL,
    calibration_sentence TEXT,
    comparisons_json TEXT NOT NULL DEFAULT '[]',
    provider TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cards_slug ON cards(slug);
CREATE INDEX IF NOT EXISTS idx_cards_created ON cards(created_at);

CREATE TABLE IF NOT EXISTS card_postings (
    card_id INTEGER NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
    channel TEXT NOT NULL,
    posted_at INTEGER NOT NULL,
    PRIMARY KEY (card_id, channel)
);
"#;

/// Upsert keyed on `external_id`. `created_at` and postings survive regeneration.
pub const UPSERT_CARD_SQL: &str = r#"
INSERT INTO cards (
    external_id, title, year, media_type, poster_ref, genres_json, slug,
    body_text, calibration_sentence, comparisons_json, provider, created_at, updated_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
ON CONFLICT(external_id) DO UPDATE SET
    title = excluded.title,
    year = excluded.year,
    media_type = excluded.media_type,
    poster_ref = excluded.poster_ref,
    genres_json = excluded.genres_json,
    slug = excluded.slug,
    body_text = excluded.body_text,
    calibration_sentence = excluded.calibration_sentence,
    comparisons_json = excluded.comparisons_json,
    provider = excluded.provider,
    updated_at = excluded.updated_at
"#;
