use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            color TEXT NOT NULL,
            icon TEXT,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            date TEXT NOT NULL,
            end_date TEXT,
            description TEXT,
            location TEXT,
            people TEXT NOT NULL DEFAULT '',
            category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
            is_important INTEGER NOT NULL DEFAULT 0,
            emotional_valence INTEGER,
            is_current INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_events_date ON events(date);
        CREATE INDEX IF NOT EXISTS idx_events_category ON events(category_id);

        CREATE TRIGGER IF NOT EXISTS events_touch_updated
        AFTER UPDATE OF title, date, end_date, description, location, people,
                        category_id, is_important, emotional_valence, is_current
        ON events
        BEGIN
            UPDATE events SET updated_at = strftime('%s', 'now') WHERE id = new.id;
        END;
        "#,
    )
    .context("applying schema migrations")?;
    Ok(())
}
