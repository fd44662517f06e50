use std::collections::HashSet;

use anyhow::Result;
use strum::IntoEnumIterator;
use time::Date;
use unicode_segmentation::UnicodeSegmentation;

use crate::model::{self, Category, CategoryColor, LifeEvent};
use crate::storage::{EventDraft, StorageHandle};
use crate::timeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// Ruler plus one column per category, zoomable.
    Columns,
    /// 25-year serpentine bands.
    Global,
}

/// Which events the column view is scoped to, mirroring the original's
/// "all events" and "single category" routes. Columns always show every
/// category; the scope only narrows the plotted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryScope {
    All,
    One(i64),
}

/// Single-line input buffer with grapheme-aware backspace.
#[derive(Debug, Clone)]
pub struct FieldBuffer {
    value: String,
    limit: usize,
}

impl FieldBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            value: String::new(),
            limit,
        }
    }

    pub fn with_value(limit: usize, value: impl Into<String>) -> Self {
        let mut buffer = Self::new(limit);
        buffer.value = value.into();
        buffer
    }

    pub fn push(&mut self, ch: char) {
        if self.value.len() < self.limit {
            self.value.push(ch);
        }
    }

    pub fn pop(&mut self) {
        if let Some((idx, _)) = self.value.grapheme_indices(true).last() {
            self.value.truncate(idx);
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn trimmed(&self) -> &str {
        self.value.trim()
    }

    pub fn is_blank(&self) -> bool {
        self.trimmed().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Date,
    EndDate,
    Category,
    Description,
    Location,
    People,
    Valence,
    Important,
    Current,
}

impl FormField {
    const ORDER: [FormField; 10] = [
        FormField::Title,
        FormField::Date,
        FormField::EndDate,
        FormField::Category,
        FormField::Description,
        FormField::Location,
        FormField::People,
        FormField::Valence,
        FormField::Important,
        FormField::Current,
    ];

    pub fn next(self) -> Self {
        let index = Self::ORDER.iter().position(|field| *field == self).unwrap_or(0);
        Self::ORDER[(index + 1) % Self::ORDER.len()]
    }

    pub fn prev(self) -> Self {
        let index = Self::ORDER.iter().position(|field| *field == self).unwrap_or(0);
        Self::ORDER[(index + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }

    pub fn is_text(self) -> bool {
        matches!(
            self,
            FormField::Title
                | FormField::Date
                | FormField::EndDate
                | FormField::Description
                | FormField::Location
                | FormField::People
        )
    }
}

#[derive(Debug, Clone)]
pub struct EventFormOverlay {
    pub editing: Option<i64>,
    pub title: FieldBuffer,
    pub date: FieldBuffer,
    pub end_date: FieldBuffer,
    pub description: FieldBuffer,
    pub location: FieldBuffer,
    pub people: FieldBuffer,
    /// Index into the live category list.
    pub category_choice: usize,
    pub valence: i8,
    pub is_important: bool,
    pub is_current: bool,
    pub focus: FormField,
    pub error: Option<String>,
    /// Latch against re-entrant submits while one is being applied.
    pub submitting: bool,
}

impl EventFormOverlay {
    fn blank(today: Date) -> Self {
        Self {
            editing: None,
            title: FieldBuffer::new(120),
            date: FieldBuffer::with_value(10, model::format_date(today)),
            end_date: FieldBuffer::new(10),
            description: FieldBuffer::new(2000),
            location: FieldBuffer::new(120),
            people: FieldBuffer::new(240),
            category_choice: 0,
            valence: 0,
            is_important: false,
            is_current: false,
            focus: FormField::Title,
            error: None,
            submitting: false,
        }
    }

    fn from_event(event: &LifeEvent, categories: &[Category]) -> Self {
        let category_choice = event
            .category_id
            .and_then(|id| categories.iter().position(|category| category.id == id))
            .unwrap_or(0);
        Self {
            editing: Some(event.id),
            title: FieldBuffer::with_value(120, event.title.clone()),
            date: FieldBuffer::with_value(10, model::format_date(event.date)),
            end_date: FieldBuffer::with_value(
                10,
                event.end_date.map(model::format_date).unwrap_or_default(),
            ),
            description: FieldBuffer::with_value(
                2000,
                event.description.clone().unwrap_or_default(),
            ),
            location: FieldBuffer::with_value(120, event.location.clone().unwrap_or_default()),
            people: FieldBuffer::with_value(240, event.people.join(", ")),
            category_choice,
            valence: event.emotional_valence.unwrap_or(0),
            is_important: event.is_important,
            is_current: event.is_current,
            focus: FormField::Title,
            error: None,
            submitting: false,
        }
    }

    pub fn focused_buffer_mut(&mut self) -> Option<&mut FieldBuffer> {
        match self.focus {
            FormField::Title => Some(&mut self.title),
            FormField::Date => Some(&mut self.date),
            FormField::EndDate => Some(&mut self.end_date),
            FormField::Description => Some(&mut self.description),
            FormField::Location => Some(&mut self.location),
            FormField::People => Some(&mut self.people),
            _ => None,
        }
    }

    /// Validates the form and turns it into a storage draft. Required
    /// fields are title, date, and category; everything else collapses
    /// blank input to `None`.
    pub fn to_draft(&self, categories: &[Category]) -> std::result::Result<EventDraft, String> {
        if self.title.is_blank() {
            return Err("title is required".into());
        }
        let date = model::parse_date(self.date.trimmed())
            .map_err(|_| format!("'{}' is not a valid date (YYYY-MM-DD)", self.date.trimmed()))?;
        let end_date = if self.end_date.is_blank() {
            None
        } else {
            Some(model::parse_date(self.end_date.trimmed()).map_err(|_| {
                format!(
                    "'{}' is not a valid end date (YYYY-MM-DD)",
                    self.end_date.trimmed()
                )
            })?)
        };
        let category = categories
            .get(self.category_choice)
            .ok_or_else(|| "pick a category".to_string())?;

        let people = self
            .people
            .trimmed()
            .split(',')
            .map(str::trim)
            .filter(|person| !person.is_empty())
            .map(str::to_string)
            .collect();

        Ok(EventDraft {
            title: self.title.trimmed().to_string(),
            date: Some(date),
            end_date,
            description: optional(self.description.trimmed()),
            location: optional(self.location.trimmed()),
            people,
            category_id: Some(category.id),
            is_important: self.is_important,
            emotional_valence: (self.valence != 0).then_some(self.valence),
            is_current: self.is_current,
        })
    }
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerInput {
    Add,
    Edit { category_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerMode {
    Browse,
    Input(ManagerInput),
    ConfirmDelete { category_id: i64, name: String },
}

#[derive(Debug, Clone)]
pub struct CategoryManagerOverlay {
    pub selected: usize,
    pub mode: ManagerMode,
    pub input: FieldBuffer,
    /// Index into the palette order.
    pub color_choice: usize,
    pub status: Option<String>,
}

impl CategoryManagerOverlay {
    fn new() -> Self {
        Self {
            selected: 0,
            mode: ManagerMode::Browse,
            input: FieldBuffer::new(64),
            color_choice: palette_index(CategoryColor::default()),
            status: None,
        }
    }

    pub fn chosen_color(&self) -> CategoryColor {
        palette()
            .get(self.color_choice)
            .copied()
            .unwrap_or_default()
    }

    pub fn cycle_color(&mut self, forward: bool) {
        let len = palette().len();
        self.color_choice = if forward {
            (self.color_choice + 1) % len
        } else {
            (self.color_choice + len - 1) % len
        };
    }
}

pub fn palette() -> Vec<CategoryColor> {
    CategoryColor::iter().collect()
}

fn palette_index(color: CategoryColor) -> usize {
    palette()
        .iter()
        .position(|candidate| *candidate == color)
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct ConfirmDeleteEventOverlay {
    pub event_id: i64,
    pub title: String,
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    EventForm(EventFormOverlay),
    CategoryManager(CategoryManagerOverlay),
    ConfirmDeleteEvent(ConfirmDeleteEventOverlay),
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub view: ViewMode,
    pub scope: CategoryScope,
    pub events: Vec<LifeEvent>,
    pub categories: Vec<Category>,
    pub pixels_per_year: u32,
    pub band_years: i32,
    pub selected: usize,
    /// Global-view filter: category ids currently checked.
    pub filter: HashSet<i64>,
    pub status_message: Option<String>,
    pub overlay: Option<OverlayState>,
}

impl AppState {
    pub fn load(storage: &StorageHandle, pixels_per_year: u32, band_years: i32) -> Result<Self> {
        let mut state = Self {
            view: ViewMode::Columns,
            scope: CategoryScope::All,
            events: Vec::new(),
            categories: Vec::new(),
            pixels_per_year: timeline::clamp_zoom(pixels_per_year),
            band_years,
            selected: 0,
            filter: HashSet::new(),
            status_message: None,
            overlay: None,
        };
        state.refresh(storage)?;
        Ok(state)
    }

    pub fn refresh(&mut self, storage: &StorageHandle) -> Result<()> {
        self.categories = storage.list_categories()?;
        self.events = storage.fetch_events()?;
        if let CategoryScope::One(id) = self.scope {
            if !self.categories.iter().any(|category| category.id == id) {
                self.scope = CategoryScope::All;
            }
        }
        self.reseed_filter();
        self.normalize_selection();
        Ok(())
    }

    /// Drops deleted categories from the filter and, when nothing is
    /// checked anymore, re-selects everything (the default state).
    fn reseed_filter(&mut self) {
        let live = timeline::live_category_ids(&self.categories);
        self.filter.retain(|id| live.contains(id));
        if self.filter.is_empty() {
            self.filter = live;
        }
    }

    /// Events the current view lists, oldest first. The column view scopes
    /// by category; the global view applies the checkbox filter. Both
    /// exclude events whose category no longer exists.
    pub fn visible_events(&self) -> Vec<&LifeEvent> {
        let live = timeline::live_category_ids(&self.categories);
        let mut visible: Vec<&LifeEvent> = self
            .events
            .iter()
            .filter(|event| timeline::is_visible(event, &live))
            .filter(|event| match self.view {
                ViewMode::Columns => match self.scope {
                    CategoryScope::All => true,
                    CategoryScope::One(id) => event.category_id == Some(id),
                },
                ViewMode::Global => event
                    .category_id
                    .map(|id| self.filter.contains(&id))
                    .unwrap_or(false),
            })
            .collect();
        visible.sort_by_key(|event| (event.date, event.id));
        visible
    }

    /// Owned copy of the events the column view plots (scope applied,
    /// liveness left to the layout).
    pub fn scoped_events(&self) -> Vec<LifeEvent> {
        self.events
            .iter()
            .filter(|event| match self.scope {
                CategoryScope::All => true,
                CategoryScope::One(id) => event.category_id == Some(id),
            })
            .cloned()
            .collect()
    }

    pub fn selected_event(&self) -> Option<&LifeEvent> {
        self.visible_events().get(self.selected).copied()
    }

    pub fn select_event_by_id(&mut self, event_id: i64) {
        if let Some(index) = self
            .visible_events()
            .iter()
            .position(|event| event.id == event_id)
        {
            self.selected = index;
        } else {
            self.normalize_selection();
        }
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.visible_events().len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        let current = self.selected as isize;
        let next = (current + delta).clamp(0, len as isize - 1);
        self.selected = next as usize;
    }

    pub fn normalize_selection(&mut self) {
        let len = self.visible_events().len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    pub fn zoom_in(&mut self) -> u32 {
        self.pixels_per_year = timeline::clamp_zoom(self.pixels_per_year.saturating_mul(5) / 4);
        self.pixels_per_year
    }

    pub fn zoom_out(&mut self) -> u32 {
        self.pixels_per_year = timeline::clamp_zoom(self.pixels_per_year.saturating_mul(4) / 5);
        self.pixels_per_year
    }

    pub fn toggle_view(&mut self) {
        self.view = match self.view {
            ViewMode::Columns => ViewMode::Global,
            ViewMode::Global => ViewMode::Columns,
        };
        self.normalize_selection();
    }

    pub fn cycle_scope(&mut self, forward: bool) {
        if self.categories.is_empty() {
            self.scope = CategoryScope::All;
            return;
        }
        let positions: Vec<CategoryScope> = std::iter::once(CategoryScope::All)
            .chain(
                self.categories
                    .iter()
                    .map(|category| CategoryScope::One(category.id)),
            )
            .collect();
        let current = positions
            .iter()
            .position(|scope| *scope == self.scope)
            .unwrap_or(0);
        let len = positions.len();
        let next = if forward {
            (current + 1) % len
        } else {
            (current + len - 1) % len
        };
        self.scope = positions[next];
        self.normalize_selection();
    }

    pub fn scope_label(&self) -> String {
        match self.scope {
            CategoryScope::All => "All".to_string(),
            CategoryScope::One(id) => self
                .categories
                .iter()
                .find(|category| category.id == id)
                .map(|category| category.name.clone())
                .unwrap_or_else(|| "All".to_string()),
        }
    }

    /// Flips the Nth category in or out of the global filter. Pure set
    /// membership, no layout side effects.
    pub fn toggle_filter_slot(&mut self, slot: usize) -> Option<(String, bool)> {
        let category = self.categories.get(slot)?;
        let id = category.id;
        let name = category.name.clone();
        let now_selected = if self.filter.contains(&id) {
            self.filter.remove(&id);
            false
        } else {
            self.filter.insert(id);
            true
        };
        self.normalize_selection();
        Some((name, now_selected))
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn open_add_form(&mut self, today: Date) {
        let mut form = EventFormOverlay::blank(today);
        // Pre-select the scoped category, like adding from a category page.
        if let CategoryScope::One(id) = self.scope {
            if let Some(index) = self
                .categories
                .iter()
                .position(|category| category.id == id)
            {
                form.category_choice = index;
            }
        }
        self.overlay = Some(OverlayState::EventForm(form));
    }

    pub fn open_edit_form(&mut self) {
        if let Some(event) = self.selected_event() {
            let form = EventFormOverlay::from_event(event, &self.categories);
            self.overlay = Some(OverlayState::EventForm(form));
        }
    }

    pub fn open_category_manager(&mut self) {
        self.overlay = Some(OverlayState::CategoryManager(CategoryManagerOverlay::new()));
    }

    pub fn open_confirm_delete_event(&mut self) {
        if let Some(event) = self.selected_event() {
            self.overlay = Some(OverlayState::ConfirmDeleteEvent(ConfirmDeleteEventOverlay {
                event_id: event.id,
                title: event.title.clone(),
            }));
        }
    }

    pub fn event_form(&self) -> Option<&EventFormOverlay> {
        match self.overlay() {
            Some(OverlayState::EventForm(form)) => Some(form),
            _ => None,
        }
    }

    pub fn event_form_mut(&mut self) -> Option<&mut EventFormOverlay> {
        match self.overlay.as_mut() {
            Some(OverlayState::EventForm(form)) => Some(form),
            _ => None,
        }
    }

    pub fn category_manager(&self) -> Option<&CategoryManagerOverlay> {
        match self.overlay() {
            Some(OverlayState::CategoryManager(manager)) => Some(manager),
            _ => None,
        }
    }

    pub fn category_manager_mut(&mut self) -> Option<&mut CategoryManagerOverlay> {
        match self.overlay.as_mut() {
            Some(OverlayState::CategoryManager(manager)) => Some(manager),
            _ => None,
        }
    }

    pub fn confirm_delete_event(&self) -> Option<&ConfirmDeleteEventOverlay> {
        match self.overlay() {
            Some(OverlayState::ConfirmDeleteEvent(confirm)) => Some(confirm),
            _ => None,
        }
    }

    pub fn manager_move_selection(&mut self, delta: isize) {
        let len = self.categories.len();
        if let Some(manager) = self.category_manager_mut() {
            if len == 0 {
                manager.selected = 0;
                return;
            }
            let next = (manager.selected as isize + delta).clamp(0, len as isize - 1);
            manager.selected = next as usize;
            manager.status = None;
        }
    }

    pub fn manager_selected_category(&self) -> Option<&Category> {
        let manager = self.category_manager()?;
        self.categories.get(manager.selected)
    }

    pub fn form_adjust_valence(&mut self, delta: i8) {
        if let Some(form) = self.event_form_mut() {
            form.valence = model::clamp_valence(form.valence.saturating_add(delta));
        }
    }

    pub fn form_cycle_category(&mut self, forward: bool) {
        let len = self.categories.len();
        if len == 0 {
            return;
        }
        if let Some(form) = self.event_form_mut() {
            form.category_choice = if forward {
                (form.category_choice + 1) % len
            } else {
                (form.category_choice + len - 1) % len
            };
        }
    }
}
