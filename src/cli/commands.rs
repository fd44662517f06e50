use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use time::OffsetDateTime;

use crate::app::App;
use crate::config::AppConfig;
use crate::model::{self, Category, CategoryColor, LifeEvent};
use crate::storage::{EventDraft, StorageHandle};

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Title of the souvenir (prompted if omitted)
    #[arg()]
    pub title: Option<String>,
    /// Date of the souvenir, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub date: Option<String>,
    /// Optional end date, YYYY-MM-DD
    #[arg(long)]
    pub end_date: Option<String>,
    /// Category name (case-insensitive)
    #[arg(long)]
    pub category: String,
    /// Provide the description inline. If omitted, reads from stdin.
    #[arg(long)]
    pub description: Option<String>,
    /// Where it happened
    #[arg(long)]
    pub location: Option<String>,
    /// Comma-separated list of people involved
    #[arg(long)]
    pub people: Option<String>,
    /// Flag the souvenir as a super-souvenir
    #[arg(long)]
    pub important: bool,
    /// Emotional valence in [-5, 5]
    #[arg(long, allow_hyphen_values = true)]
    pub valence: Option<i8>,
    /// Mark the souvenir as still ongoing
    #[arg(long)]
    pub current: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Only souvenirs from this category (case-insensitive)
    #[arg(long)]
    pub category: Option<String>,
    /// Only souvenirs from this calendar year
    #[arg(long)]
    pub year: Option<i32>,
    /// Limit the number of souvenirs printed
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategoryCommand {
    /// Create a category
    Add(CategoryAddArgs),
    /// List categories with their souvenir counts
    List,
    /// Rename a category
    Rename(CategoryRenameArgs),
    /// Change a category's color
    Recolor(CategoryRecolorArgs),
    /// Delete a category; its souvenirs stay, uncategorized
    Delete(CategoryDeleteArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CategoryAddArgs {
    /// Category name
    pub name: String,
    /// Palette color (rose, emerald, blue, amber, cyan, indigo)
    #[arg(long, default_value = "indigo")]
    pub color: CategoryColor,
    /// Optional icon name (heart, briefcase, globe, ...)
    #[arg(long)]
    pub icon: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryRenameArgs {
    /// Current category name
    pub name: String,
    /// New name
    pub new_name: String,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryRecolorArgs {
    /// Category name
    pub name: String,
    /// New palette color
    pub color: CategoryColor,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryDeleteArgs {
    /// Category name
    pub name: String,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryArgs {
    #[command(subcommand)]
    pub command: CategoryCommand,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Write the JSON dump here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub fn run_tui(app: &mut App) -> Result<()> {
    app.run()
}

pub fn add_event(_config: Arc<AppConfig>, storage: StorageHandle, args: AddArgs) -> Result<()> {
    let mut title = match args.title {
        Some(t) => t,
        None => prompt("Title")?,
    };
    title = title.trim().to_owned();
    if title.is_empty() {
        bail!("souvenir title cannot be empty");
    }

    let category = resolve_category(&storage, &args.category)?;
    let date = match args.date.as_deref() {
        Some(raw) => model::parse_date(raw)
            .with_context(|| format!("'{raw}' is not a valid date (expected YYYY-MM-DD)"))?,
        None => OffsetDateTime::now_utc().date(),
    };
    let end_date = args
        .end_date
        .as_deref()
        .map(|raw| {
            model::parse_date(raw)
                .with_context(|| format!("'{raw}' is not a valid end date (expected YYYY-MM-DD)"))
        })
        .transpose()?;
    let description = match args.description {
        Some(description) => Some(description),
        None => read_stdin()?.filter(|text| !text.trim().is_empty()),
    };
    let people = args
        .people
        .as_deref()
        .map(split_people)
        .unwrap_or_default();

    let draft = EventDraft {
        title,
        date: Some(date),
        end_date,
        description,
        location: args.location,
        people,
        category_id: Some(category.id),
        is_important: args.important,
        emotional_valence: args.valence,
        is_current: args.current,
    };
    let event_id = storage.create_event(&draft).context("creating souvenir")?;
    println!(
        "Added souvenir #{event_id} '{}' on {} in '{}'{}",
        draft.title,
        model::format_date(date),
        category.name,
        if args.important { " (super-souvenir)" } else { "" }
    );
    Ok(())
}

pub fn list_events(_config: Arc<AppConfig>, storage: StorageHandle, args: ListArgs) -> Result<()> {
    let output = run_list(&storage, &args)?;
    print!("{output}");
    Ok(())
}

fn run_list(storage: &StorageHandle, args: &ListArgs) -> Result<String> {
    let categories = storage.list_categories()?;
    let names: HashMap<i64, &str> = categories
        .iter()
        .map(|category| (category.id, category.name.as_str()))
        .collect();

    let events = match args.category.as_deref() {
        Some(name) => {
            let category = resolve_category_in(&categories, name)?;
            storage.fetch_events_for_category(category.id)?
        }
        None => storage.fetch_events()?,
    };

    let mut out = String::new();
    let mut printed = 0usize;
    for event in events {
        if let Some(year) = args.year {
            if event.year() != year {
                continue;
            }
        }
        if printed == args.limit {
            break;
        }
        let _ = writeln!(&mut out, "{}", format_event_line(&event, &names));
        printed += 1;
    }
    if printed == 0 {
        out.push_str("No souvenirs found.\n");
    }
    Ok(out)
}

fn format_event_line(event: &LifeEvent, names: &HashMap<i64, &str>) -> String {
    let mut line = format!(
        "#{:<4} {}  {}",
        event.id,
        model::format_date(event.date),
        event.title
    );
    if event.is_important {
        line.push_str("  [★]");
    }
    let category = event
        .category_id
        .and_then(|id| names.get(&id).copied())
        .unwrap_or("uncategorized");
    let _ = write!(&mut line, "  ({category})");
    if let Some(location) = &event.location {
        let _ = write!(&mut line, "  @{location}");
    }
    line
}

pub fn handle_category_command(
    _config: Arc<AppConfig>,
    storage: StorageHandle,
    args: CategoryArgs,
) -> Result<()> {
    match args.command {
        CategoryCommand::Add(args) => category_add(&storage, args),
        CategoryCommand::List => category_list(&storage),
        CategoryCommand::Rename(args) => category_rename(&storage, args),
        CategoryCommand::Recolor(args) => category_recolor(&storage, args),
        CategoryCommand::Delete(args) => category_delete(&storage, args),
    }
}

fn category_add(storage: &StorageHandle, args: CategoryAddArgs) -> Result<()> {
    let name = args.name.trim();
    if name.is_empty() {
        bail!("category name cannot be empty");
    }
    if storage.category_by_name(name)?.is_some() {
        bail!("category '{name}' already exists");
    }
    let category_id = storage
        .create_category(name, args.color, args.icon.as_deref())
        .context("creating category")?;
    println!("Created category #{category_id} '{name}' ({})", args.color);
    Ok(())
}

fn category_list(storage: &StorageHandle) -> Result<()> {
    let categories = storage.list_categories()?;
    if categories.is_empty() {
        println!("No categories yet. Create one with `lifetrace category add <name>`.");
        return Ok(());
    }
    let events = storage.fetch_events()?;
    for category in categories {
        let count = events
            .iter()
            .filter(|event| event.category_id == Some(category.id))
            .count();
        println!(
            "#{:<4} {:<24} {:<8} {} souvenir{}",
            category.id,
            category.name,
            category.color.to_string(),
            count,
            if count == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

fn category_rename(storage: &StorageHandle, args: CategoryRenameArgs) -> Result<()> {
    let new_name = args.new_name.trim();
    if new_name.is_empty() {
        bail!("new category name cannot be empty");
    }
    let category = resolve_category(storage, &args.name)?;
    storage
        .rename_category(category.id, new_name)
        .with_context(|| format!("renaming category '{}'", category.name))?;
    println!("Renamed category '{}' to '{new_name}'", category.name);
    Ok(())
}

fn category_recolor(storage: &StorageHandle, args: CategoryRecolorArgs) -> Result<()> {
    let category = resolve_category(storage, &args.name)?;
    storage
        .recolor_category(category.id, args.color)
        .with_context(|| format!("recoloring category '{}'", category.name))?;
    println!("Category '{}' is now {}", category.name, args.color);
    Ok(())
}

fn category_delete(storage: &StorageHandle, args: CategoryDeleteArgs) -> Result<()> {
    let category = resolve_category(storage, &args.name)?;
    let outcome = storage
        .delete_category(category.id)
        .with_context(|| format!("deleting category '{}'", category.name))?;
    println!(
        "Deleted category '{}' ({} souvenir{} left uncategorized)",
        outcome.name,
        outcome.detached,
        if outcome.detached == 1 { "" } else { "s" }
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct ExportDump {
    categories: Vec<ExportCategory>,
    events: Vec<ExportEvent>,
}

#[derive(Debug, Serialize)]
struct ExportCategory {
    id: i64,
    name: String,
    color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExportEvent {
    id: i64,
    date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_date: Option<String>,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    people: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category_id: Option<i64>,
    is_important: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    emotional_valence: Option<i8>,
    is_current: bool,
}

pub fn export_data(_config: Arc<AppConfig>, storage: StorageHandle, args: ExportArgs) -> Result<()> {
    let json = build_export(&storage)?;
    match args.output {
        Some(path) => {
            fs::write(&path, json.as_bytes())
                .with_context(|| format!("writing export to {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn build_export(storage: &StorageHandle) -> Result<String> {
    let categories = storage
        .list_categories()?
        .into_iter()
        .map(|category| ExportCategory {
            id: category.id,
            name: category.name,
            color: category.color.to_string(),
            icon: category.icon,
        })
        .collect();
    let events = storage
        .fetch_events()?
        .into_iter()
        .map(|event| ExportEvent {
            id: event.id,
            date: model::format_date(event.date),
            end_date: event.end_date.map(model::format_date),
            title: event.title,
            description: event.description,
            location: event.location,
            people: event.people,
            category_id: event.category_id,
            is_important: event.is_important,
            emotional_valence: event.emotional_valence,
            is_current: event.is_current,
        })
        .collect();
    let dump = ExportDump { categories, events };
    serde_json::to_string_pretty(&dump).context("serialising export")
}

fn resolve_category(storage: &StorageHandle, name: &str) -> Result<Category> {
    let categories = storage.list_categories()?;
    resolve_category_in(&categories, name).map(Clone::clone)
}

fn resolve_category_in<'a>(categories: &'a [Category], name: &str) -> Result<&'a Category> {
    let wanted = name.trim();
    if wanted.is_empty() {
        bail!("category name cannot be empty");
    }
    match categories
        .iter()
        .find(|category| category.name.eq_ignore_ascii_case(wanted))
    {
        Some(category) => Ok(category),
        None => {
            if categories.is_empty() {
                bail!("no categories exist yet; create one with `lifetrace category add <name>`");
            }
            let known = categories
                .iter()
                .map(|category| category.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            bail!("category '{wanted}' not found (known: {known})");
        }
    }
}

fn split_people(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|person| !person.is_empty())
        .map(str::to_string)
        .collect()
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigPaths, StorageOptions};
    use crate::storage;
    use tempfile::TempDir;
    use time::macros::date;

    type TestResult<T = ()> = Result<T>;

    fn setup_storage() -> TestResult<(TempDir, StorageHandle)> {
        let temp = TempDir::new().context("creating temp dir")?;
        let root = temp.path();
        let paths = ConfigPaths {
            config_dir: root.join("config"),
            config_file: root.join("config/config.toml"),
            data_dir: root.join("data"),
            database_path: root.join("data/lifetrace.db"),
            state_dir: root.join("state"),
            log_dir: root.join("state/logs"),
        };
        let mut storage_opts = StorageOptions::default();
        storage_opts.database_path = paths.database_path.clone();

        let handle = storage::init(&paths, &storage_opts)?;
        Ok((temp, handle))
    }

    fn seeded_event(storage: &StorageHandle, category_id: i64, title: &str, day: time::Date) {
        let draft = EventDraft {
            title: title.into(),
            date: Some(day),
            category_id: Some(category_id),
            ..EventDraft::default()
        };
        storage.create_event(&draft).expect("event created");
    }

    #[test]
    fn list_filters_by_category_and_year() -> TestResult {
        let (_temp, storage) = setup_storage()?;
        let travel = storage.create_category("Travel", CategoryColor::Emerald, None)?;
        let work = storage.create_category("Work", CategoryColor::Amber, None)?;
        seeded_event(&storage, travel, "Lisbonne", date!(2019 - 04 - 10));
        seeded_event(&storage, travel, "Kyoto", date!(2023 - 10 - 02));
        seeded_event(&storage, work, "Premier CDI", date!(2019 - 09 - 01));

        let output = run_list(
            &storage,
            &ListArgs {
                category: Some("travel".into()),
                year: None,
                limit: 50,
            },
        )?;
        assert!(output.contains("Lisbonne"));
        assert!(output.contains("Kyoto"));
        assert!(!output.contains("Premier CDI"));

        let output = run_list(
            &storage,
            &ListArgs {
                category: None,
                year: Some(2019),
                limit: 50,
            },
        )?;
        assert!(output.contains("Lisbonne"));
        assert!(output.contains("Premier CDI"));
        assert!(!output.contains("Kyoto"));
        Ok(())
    }

    #[test]
    fn list_marks_importance_and_dangling_categories() -> TestResult {
        let (_temp, storage) = setup_storage()?;
        let travel = storage.create_category("Travel", CategoryColor::Emerald, None)?;
        let draft = EventDraft {
            title: "Tour du monde".into(),
            date: Some(date!(2020 - 01 - 15)),
            category_id: Some(travel),
            is_important: true,
            ..EventDraft::default()
        };
        storage.create_event(&draft)?;
        storage.delete_category(travel)?;

        let output = run_list(
            &storage,
            &ListArgs {
                category: None,
                year: None,
                limit: 50,
            },
        )?;
        assert!(output.contains("[★]"));
        assert!(output.contains("(uncategorized)"));
        Ok(())
    }

    #[test]
    fn category_commands_round_trip() -> TestResult {
        let (_temp, storage) = setup_storage()?;
        category_add(
            &storage,
            CategoryAddArgs {
                name: "Voyages".into(),
                color: CategoryColor::Emerald,
                icon: Some("globe".into()),
            },
        )?;
        assert!(storage.category_by_name("Voyages")?.is_some());

        // Duplicate names are refused up front.
        assert!(category_add(
            &storage,
            CategoryAddArgs {
                name: "voyages".into(),
                color: CategoryColor::Rose,
                icon: None,
            },
        )
        .is_err());

        category_rename(
            &storage,
            CategoryRenameArgs {
                name: "voyages".into(),
                new_name: "Travel".into(),
            },
        )?;
        let renamed = storage.category_by_name("Travel")?.expect("renamed");
        assert_eq!(renamed.color, CategoryColor::Emerald);

        category_recolor(
            &storage,
            CategoryRecolorArgs {
                name: "Travel".into(),
                color: CategoryColor::Cyan,
            },
        )?;
        let recolored = storage.category_by_name("Travel")?.expect("recolored");
        assert_eq!(recolored.color, CategoryColor::Cyan);

        seeded_event(&storage, recolored.id, "Kyoto", date!(2023 - 10 - 02));
        category_delete(
            &storage,
            CategoryDeleteArgs {
                name: "Travel".into(),
            },
        )?;
        assert!(storage.category_by_name("Travel")?.is_none());
        let events = storage.fetch_events()?;
        assert_eq!(events.len(), 1);
        assert!(events[0].category_id.is_none());
        Ok(())
    }

    #[test]
    fn unknown_category_error_lists_known_names() -> TestResult {
        let (_temp, storage) = setup_storage()?;
        storage.create_category("Travel", CategoryColor::Emerald, None)?;
        storage.create_category("Work", CategoryColor::Amber, None)?;

        let err = resolve_category(&storage, "Love").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Travel"));
        assert!(message.contains("Work"));
        Ok(())
    }

    #[test]
    fn export_round_trips_through_json() -> TestResult {
        let (_temp, storage) = setup_storage()?;
        let travel = storage.create_category("Travel", CategoryColor::Emerald, Some("globe"))?;
        let draft = EventDraft {
            title: "Kyoto".into(),
            date: Some(date!(2023 - 10 - 02)),
            end_date: Some(date!(2023 - 10 - 16)),
            people: vec!["Julie".into()],
            category_id: Some(travel),
            emotional_valence: Some(5),
            ..EventDraft::default()
        };
        storage.create_event(&draft)?;

        let json = build_export(&storage)?;
        let parsed: serde_json::Value = serde_json::from_str(&json)?;
        assert_eq!(parsed["categories"][0]["name"], "Travel");
        assert_eq!(parsed["categories"][0]["color"], "emerald");
        assert_eq!(parsed["events"][0]["date"], "2023-10-02");
        assert_eq!(parsed["events"][0]["end_date"], "2023-10-16");
        assert_eq!(parsed["events"][0]["people"][0], "Julie");
        assert_eq!(parsed["events"][0]["emotional_valence"], 5);
        Ok(())
    }

    #[test]
    fn people_split_trims_and_drops_empties() {
        assert_eq!(
            split_people("Julie, Marc , ,"),
            vec!["Julie".to_string(), "Marc".to_string()]
        );
        assert!(split_people("  ").is_empty());
    }
}
