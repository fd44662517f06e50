use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rusqlite::config::DbConfig;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use time::{Date, OffsetDateTime};

use crate::config::{ConfigPaths, StorageOptions};
use crate::model::{self, Category, CategoryColor, LifeEvent, MAX_VALENCE, MIN_VALENCE};

mod schema;

const PEOPLE_DELIMITER: &str = "|:|";

const EVENT_COLUMNS: &str = "id, title, date, end_date, description, location, people, \
     category_id, is_important, emotional_valence, is_current, created_at, updated_at";

/// Everything needed to create or update an event. The caller owns form
/// parsing; by the time a draft reaches storage its dates are real `Date`s.
#[derive(Debug, Clone, Default)]
pub struct EventDraft {
    pub title: String,
    pub date: Option<Date>,
    pub end_date: Option<Date>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub people: Vec<String>,
    pub category_id: Option<i64>,
    pub is_important: bool,
    pub emotional_valence: Option<i8>,
    pub is_current: bool,
}

impl EventDraft {
    fn validated(&self) -> Result<(String, Date)> {
        let title = self.title.trim();
        if title.is_empty() {
            bail!("event title cannot be empty");
        }
        let Some(date) = self.date else {
            bail!("event date is required");
        };
        if let Some(valence) = self.emotional_valence {
            if !(MIN_VALENCE..=MAX_VALENCE).contains(&valence) {
                bail!("emotional valence {valence} outside [{MIN_VALENCE}, {MAX_VALENCE}]");
            }
        }
        Ok((title.to_string(), date))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDeleteOutcome {
    pub name: String,
    /// Events left without a category by this delete.
    pub detached: usize,
}

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, color, icon, created_at
                 FROM categories
                 ORDER BY created_at ASC, id ASC",
            )?;
            let categories = stmt
                .query_map([], category_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("fetching categories")?;
            Ok(categories)
        })
    }

    pub fn category_by_id(&self, category_id: i64) -> Result<Option<Category>> {
        self.with_connection(|conn| {
            let category = conn
                .query_row(
                    "SELECT id, name, color, icon, created_at FROM categories WHERE id = ?1",
                    params![category_id],
                    category_from_row,
                )
                .optional()?;
            Ok(category)
        })
    }

    pub fn category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let wanted = name.trim();
        if wanted.is_empty() {
            return Ok(None);
        }
        self.with_connection(|conn| {
            let category = conn
                .query_row(
                    "SELECT id, name, color, icon, created_at
                     FROM categories
                     WHERE name = ?1 COLLATE NOCASE",
                    params![wanted],
                    category_from_row,
                )
                .optional()?;
            Ok(category)
        })
    }

    pub fn create_category(
        &self,
        name: &str,
        color: CategoryColor,
        icon: Option<&str>,
    ) -> Result<i64> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            bail!("category name cannot be empty");
        }
        self.with_connection(|conn| {
            let now = OffsetDateTime::now_utc().unix_timestamp();
            conn.execute(
                "INSERT INTO categories (name, color, icon, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![trimmed, color.to_string(), icon, now],
            )
            .context("inserting category")?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn rename_category(&self, category_id: i64, name: &str) -> Result<()> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            bail!("category name cannot be empty");
        }
        self.with_connection(|conn| {
            let updated = conn.execute(
                "UPDATE categories SET name = ?1 WHERE id = ?2",
                params![trimmed, category_id],
            )?;
            if updated == 0 {
                bail!("category {category_id} not found");
            }
            Ok(())
        })
    }

    pub fn recolor_category(&self, category_id: i64, color: CategoryColor) -> Result<()> {
        self.with_connection(|conn| {
            let updated = conn.execute(
                "UPDATE categories SET color = ?1 WHERE id = ?2",
                params![color.to_string(), category_id],
            )?;
            if updated == 0 {
                bail!("category {category_id} not found");
            }
            Ok(())
        })
    }

    pub fn update_category(&self, category_id: i64, name: &str, color: CategoryColor) -> Result<()> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            bail!("category name cannot be empty");
        }
        self.with_connection(|conn| {
            let updated = conn.execute(
                "UPDATE categories SET name = ?1, color = ?2 WHERE id = ?3",
                params![trimmed, color.to_string(), category_id],
            )?;
            if updated == 0 {
                bail!("category {category_id} not found");
            }
            Ok(())
        })
    }

    /// Deletes a category and detaches its events in the same transaction.
    /// Events are never deleted here; they become uncategorized and drop
    /// out of positional views until reassigned.
    pub fn delete_category(&self, category_id: i64) -> Result<CategoryDeleteOutcome> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let name: String = tx
            .query_row(
                "SELECT name FROM categories WHERE id = ?1",
                params![category_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| anyhow::anyhow!("category {category_id} not found"))?;

        let detached = tx.execute(
            "UPDATE events SET category_id = NULL WHERE category_id = ?1",
            params![category_id],
        )?;
        tx.execute("DELETE FROM categories WHERE id = ?1", params![category_id])?;
        tx.commit()?;
        Ok(CategoryDeleteOutcome { name, detached })
    }

    pub fn fetch_events(&self) -> Result<Vec<LifeEvent>> {
        self.with_connection(|conn| {
            let sql = format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY date DESC, id DESC");
            let mut stmt = conn.prepare(&sql)?;
            let events = stmt
                .query_map([], event_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("fetching events")?;
            Ok(events)
        })
    }

    pub fn fetch_events_for_category(&self, category_id: i64) -> Result<Vec<LifeEvent>> {
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT {EVENT_COLUMNS} FROM events
                 WHERE category_id = ?1
                 ORDER BY date DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let events = stmt
                .query_map([category_id], event_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("fetching events for category")?;
            Ok(events)
        })
    }

    pub fn fetch_event_by_id(&self, event_id: i64) -> Result<Option<LifeEvent>> {
        self.with_connection(|conn| {
            let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
            let event = conn
                .query_row(&sql, params![event_id], event_from_row)
                .optional()?;
            Ok(event)
        })
    }

    pub fn create_event(&self, draft: &EventDraft) -> Result<i64> {
        let (title, date) = draft.validated()?;
        self.with_connection(|conn| {
            self.ensure_category_exists(conn, draft.category_id)?;
            let now = OffsetDateTime::now_utc().unix_timestamp();
            conn.execute(
                "INSERT INTO events (title, date, end_date, description, location, people,
                                     category_id, is_important, emotional_valence, is_current,
                                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                params![
                    title,
                    model::format_date(date),
                    draft.end_date.map(model::format_date),
                    draft.description.as_deref(),
                    draft.location.as_deref(),
                    join_people(&draft.people),
                    draft.category_id,
                    draft.is_important,
                    draft.emotional_valence.map(i64::from),
                    draft.is_current,
                    now,
                ],
            )
            .context("inserting event")?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn update_event(&self, event_id: i64, draft: &EventDraft) -> Result<()> {
        let (title, date) = draft.validated()?;
        self.with_connection(|conn| {
            self.ensure_category_exists(conn, draft.category_id)?;
            let updated = conn
                .execute(
                    "UPDATE events
                     SET title = ?1, date = ?2, end_date = ?3, description = ?4, location = ?5,
                         people = ?6, category_id = ?7, is_important = ?8,
                         emotional_valence = ?9, is_current = ?10
                     WHERE id = ?11",
                    params![
                        title,
                        model::format_date(date),
                        draft.end_date.map(model::format_date),
                        draft.description.as_deref(),
                        draft.location.as_deref(),
                        join_people(&draft.people),
                        draft.category_id,
                        draft.is_important,
                        draft.emotional_valence.map(i64::from),
                        draft.is_current,
                        event_id,
                    ],
                )
                .context("updating event")?;
            if updated == 0 {
                bail!("event {event_id} not found");
            }
            Ok(())
        })
    }

    pub fn delete_event(&self, event_id: i64) -> Result<()> {
        self.with_connection(|conn| {
            let deleted = conn.execute("DELETE FROM events WHERE id = ?1", params![event_id])?;
            if deleted == 0 {
                bail!("event {event_id} not found");
            }
            Ok(())
        })
    }

    pub fn set_event_important(&self, event_id: i64, important: bool) -> Result<()> {
        self.with_connection(|conn| {
            let updated = conn.execute(
                "UPDATE events SET is_important = ?1 WHERE id = ?2",
                params![important, event_id],
            )?;
            if updated == 0 {
                bail!("event {event_id} not found");
            }
            Ok(())
        })
    }

    fn ensure_category_exists(&self, conn: &Connection, category_id: Option<i64>) -> Result<()> {
        let Some(category_id) = category_id else {
            return Ok(());
        };
        let exists = conn
            .query_row(
                "SELECT 1 FROM categories WHERE id = ?1",
                params![category_id],
                |_row| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            bail!("category {category_id} not found");
        }
        Ok(())
    }
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    let color_raw: String = row.get(2)?;
    let color = color_raw.parse::<CategoryColor>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(err))
    })?;
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        color,
        icon: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<LifeEvent> {
    let people_raw: String = row.get(6)?;
    Ok(LifeEvent {
        id: row.get(0)?,
        title: row.get(1)?,
        date: date_column(row, 2)?,
        end_date: optional_date_column(row, 3)?,
        description: row.get(4)?,
        location: row.get(5)?,
        people: parse_people(&people_raw),
        category_id: row.get(7)?,
        is_important: row.get(8)?,
        emotional_valence: row
            .get::<_, Option<i64>>(9)?
            .map(|valence| valence as i8),
        is_current: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

// Stored dates are validated on the way in, so a parse failure here means
// the database was edited out from under us. Fail loudly instead of
// letting a bogus date reach the layout engine.
fn date_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Date> {
    let raw: String = row.get(index)?;
    date_column_value(&raw, index)
}

fn optional_date_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<Date>> {
    let raw: Option<String> = row.get(index)?;
    match raw {
        Some(raw) if !raw.is_empty() => date_column_value(&raw, index).map(Some),
        _ => Ok(None),
    }
}

fn date_column_value(raw: &str, index: usize) -> rusqlite::Result<Date> {
    model::parse_date(raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err)))
}

fn join_people(people: &[String]) -> String {
    people
        .iter()
        .map(|person| person.trim())
        .filter(|person| !person.is_empty())
        .collect::<Vec<_>>()
        .join(PEOPLE_DELIMITER)
}

fn parse_people(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(PEOPLE_DELIMITER)
        .filter(|person| !person.is_empty())
        .map(|person| person.to_string())
        .collect()
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<StorageHandle> {
    let db_path = &storage.database_path;
    let db_path = if db_path.as_os_str().is_empty() {
        &paths.database_path
    } else {
        db_path
    };
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    Ok(StorageHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.set_db_config(DbConfig::SQLITE_DBCONFIG_ENABLE_FKEY, true)
        .context("enabling foreign keys")?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use time::macros::date;

    fn temp_paths(root: &TempDir) -> ConfigPaths {
        let base = root.path();
        let config_dir = base.join("config");
        let data_dir = base.join("data");
        let state_dir = base.join("state");
        ConfigPaths {
            config_dir: config_dir.clone(),
            config_file: config_dir.join("config.toml"),
            data_dir: data_dir.clone(),
            database_path: data_dir.join("lifetrace.db"),
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    fn init_storage() -> anyhow::Result<(TempDir, StorageHandle)> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        let mut options = StorageOptions::default();
        options.database_path = paths.database_path.clone();
        let storage = init(&paths, &options)?;
        Ok((temp, storage))
    }

    fn draft(title: &str, date: Date, category_id: Option<i64>) -> EventDraft {
        EventDraft {
            title: title.to_string(),
            date: Some(date),
            category_id,
            ..EventDraft::default()
        }
    }

    #[test]
    fn event_round_trips_every_optional_field() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let category_id = storage.create_category("Travel", CategoryColor::Emerald, Some("globe"))?;

        let full = EventDraft {
            title: "Roadtrip across Norway".into(),
            date: Some(date!(2018 - 07 - 02)),
            end_date: Some(date!(2018 - 07 - 21)),
            description: Some("Three weeks on the road.".into()),
            location: Some("Norway".into()),
            people: vec!["Julie".into(), "Marc".into()],
            category_id: Some(category_id),
            is_important: true,
            emotional_valence: Some(4),
            is_current: false,
        };
        let event_id = storage.create_event(&full)?;

        let fetched = storage
            .fetch_event_by_id(event_id)?
            .expect("event present");
        assert_eq!(fetched.title, "Roadtrip across Norway");
        assert_eq!(fetched.date, date!(2018 - 07 - 02));
        assert_eq!(fetched.end_date, Some(date!(2018 - 07 - 21)));
        assert_eq!(fetched.description.as_deref(), Some("Three weeks on the road."));
        assert_eq!(fetched.location.as_deref(), Some("Norway"));
        assert_eq!(fetched.people, vec!["Julie".to_string(), "Marc".to_string()]);
        assert_eq!(fetched.category_id, Some(category_id));
        assert!(fetched.is_important);
        assert_eq!(fetched.emotional_valence, Some(4));
        assert!(!fetched.is_current);
        Ok(())
    }

    #[test]
    fn sparse_event_round_trips_as_none() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let category_id = storage.create_category("Life", CategoryColor::Indigo, None)?;
        let event_id =
            storage.create_event(&draft("Moved out", date!(2010 - 09 - 01), Some(category_id)))?;

        let fetched = storage
            .fetch_event_by_id(event_id)?
            .expect("event present");
        assert_eq!(fetched.end_date, None);
        assert_eq!(fetched.description, None);
        assert_eq!(fetched.location, None);
        assert!(fetched.people.is_empty());
        assert_eq!(fetched.emotional_valence, None);
        Ok(())
    }

    #[test]
    fn deleting_category_detaches_but_keeps_events() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let category_id = storage.create_category("Work", CategoryColor::Amber, None)?;
        for (index, day) in [date!(2015 - 01 - 05), date!(2016 - 02 - 06), date!(2017 - 03 - 07)]
            .into_iter()
            .enumerate()
        {
            storage.create_event(&draft(&format!("job {index}"), day, Some(category_id)))?;
        }

        let outcome = storage.delete_category(category_id)?;
        assert_eq!(outcome.name, "Work");
        assert_eq!(outcome.detached, 3);

        let events = storage.fetch_events()?;
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|event| event.category_id.is_none()));
        assert!(storage.category_by_id(category_id)?.is_none());
        Ok(())
    }

    #[test]
    fn events_come_back_newest_first() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let category_id = storage.create_category("Life", CategoryColor::Blue, None)?;
        storage.create_event(&draft("old", date!(2001 - 01 - 01), Some(category_id)))?;
        storage.create_event(&draft("new", date!(2021 - 01 - 01), Some(category_id)))?;
        storage.create_event(&draft("mid", date!(2011 - 01 - 01), Some(category_id)))?;

        let titles: Vec<String> = storage
            .fetch_events()?
            .into_iter()
            .map(|event| event.title)
            .collect();
        assert_eq!(titles, vec!["new", "mid", "old"]);
        Ok(())
    }

    #[test]
    fn blank_titles_and_names_are_rejected() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        assert!(storage
            .create_category("   ", CategoryColor::Rose, None)
            .is_err());

        let category_id = storage.create_category("Life", CategoryColor::Rose, None)?;
        let mut bad = draft("  ", date!(2020 - 01 - 01), Some(category_id));
        assert!(storage.create_event(&bad).is_err());
        bad.title = "ok".into();
        bad.date = None;
        assert!(storage.create_event(&bad).is_err());
        Ok(())
    }

    #[test]
    fn valence_outside_range_is_rejected() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let category_id = storage.create_category("Life", CategoryColor::Cyan, None)?;
        let mut bad = draft("spike", date!(2020 - 01 - 01), Some(category_id));
        bad.emotional_valence = Some(7);
        assert!(storage.create_event(&bad).is_err());
        bad.emotional_valence = Some(-5);
        assert!(storage.create_event(&bad).is_ok());
        Ok(())
    }

    #[test]
    fn event_with_unknown_category_is_rejected() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        assert!(storage
            .create_event(&draft("orphan", date!(2020 - 01 - 01), Some(99)))
            .is_err());
        Ok(())
    }

    #[test]
    fn category_lookup_by_name_ignores_case() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let category_id = storage.create_category("Voyages", CategoryColor::Emerald, None)?;
        let found = storage.category_by_name("voyages")?.expect("category");
        assert_eq!(found.id, category_id);
        assert!(storage.category_by_name("unknown")?.is_none());
        Ok(())
    }

    #[test]
    fn importance_toggle_persists() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let category_id = storage.create_category("Life", CategoryColor::Indigo, None)?;
        let event_id =
            storage.create_event(&draft("turning point", date!(2019 - 05 - 01), Some(category_id)))?;

        storage.set_event_important(event_id, true)?;
        assert!(storage
            .fetch_event_by_id(event_id)?
            .expect("event present")
            .is_important);

        storage.set_event_important(event_id, false)?;
        assert!(!storage
            .fetch_event_by_id(event_id)?
            .expect("event present")
            .is_important);
        Ok(())
    }

    #[test]
    fn update_event_replaces_fields_and_checks_existence() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let category_id = storage.create_category("Life", CategoryColor::Indigo, None)?;
        let other_id = storage.create_category("Work", CategoryColor::Amber, None)?;
        let event_id =
            storage.create_event(&draft("first job", date!(2012 - 03 - 01), Some(category_id)))?;

        let mut updated = draft("first real job", date!(2012 - 04 - 01), Some(other_id));
        updated.location = Some("Lyon".into());
        storage.update_event(event_id, &updated)?;

        let fetched = storage
            .fetch_event_by_id(event_id)?
            .expect("event present");
        assert_eq!(fetched.title, "first real job");
        assert_eq!(fetched.date, date!(2012 - 04 - 01));
        assert_eq!(fetched.category_id, Some(other_id));
        assert_eq!(fetched.location.as_deref(), Some("Lyon"));

        assert!(storage.update_event(4242, &updated).is_err());
        Ok(())
    }
}
