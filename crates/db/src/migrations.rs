// crates/db/src/migrations.rs
//! Inline schema migrations, applied in order and tracked by version in the
//! `_migrations` table. Append-only: never edit a shipped migration.

pub const MIGRATIONS: &[&str] = &[
    // 1: raw catalog rows (the source table shape used by tests and the
    // seeding helper; production reads may point at another table)
    r#"CREATE TABLE IF NOT EXISTS nomenclature_raw (
        id INTEGER PRIMARY KEY,
        reference TEXT NOT NULL,
        code TEXT NOT NULL DEFAULT '',
        name TEXT NOT NULL
    )"#,
    // 2: canonical normalized rows
    r#"CREATE TABLE IF NOT EXISTS normalized_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_reference TEXT NOT NULL,
        source_name TEXT NOT NULL,
        code TEXT NOT NULL DEFAULT '',
        normalized_name TEXT NOT NULL,
        normalized_reference TEXT NOT NULL,
        category TEXT NOT NULL,
        merged_count INTEGER NOT NULL DEFAULT 1,
        ai_confidence REAL NOT NULL DEFAULT 0,
        ai_reasoning TEXT NOT NULL DEFAULT '',
        processing_level TEXT NOT NULL DEFAULT 'basic',
        kpved_code TEXT NOT NULL DEFAULT '',
        kpved_name TEXT NOT NULL DEFAULT '',
        kpved_confidence REAL NOT NULL DEFAULT 0,
        quality_score REAL NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )"#,
    // 3: dedup lookups hit this constantly
    "CREATE INDEX IF NOT EXISTS idx_normalized_name ON normalized_items(normalized_name)",
    // 4: extracted attributes, committed in the same transaction as their
    // items
    r#"CREATE TABLE IF NOT EXISTS item_attributes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_code TEXT NOT NULL,
        attr_key TEXT NOT NULL,
        attr_value TEXT NOT NULL,
        attr_unit TEXT
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_attributes_item_code ON item_attributes(item_code)",
    // 6: classifier tree
    r#"CREATE TABLE IF NOT EXISTS kpved_classifier (
        code TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        parent_code TEXT,
        level TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_kpved_parent ON kpved_classifier(parent_code)",
];
