use std::io::Stdout;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use time::OffsetDateTime;

use crate::config::themes::Theme;
use crate::config::AppConfig;
use crate::storage::StorageHandle;
use crate::ui;

mod actions;
pub mod state;

pub use state::{
    AppState, CategoryScope, EventFormOverlay, FormField, ManagerInput, ManagerMode, OverlayState,
    ViewMode,
};

use actions::ActionDispatcher;

enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    ToggleView,
    ScopeForward,
    ScopeBack,
    ZoomIn,
    ZoomOut,
    AddEvent,
    EditEvent,
    DeleteEvent,
    ToggleImportant,
    ManageCategories,
    Refresh,
    ToggleFilter(usize),
}

pub struct App {
    pub config: Arc<AppConfig>,
    pub storage: StorageHandle,
    state: AppState,
    theme: Theme,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: Arc<AppConfig>, storage: StorageHandle) -> Result<Self> {
        let state = AppState::load(
            &storage,
            config.timeline.pixels_per_year,
            config.timeline.band_years,
        )
        .context("loading events and categories for initial state")?;
        let theme = Theme::for_name(&config.theme);
        Ok(Self {
            config,
            storage,
            state,
            theme,
            should_quit: false,
            tick_rate: Duration::from_millis(250),
        })
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal
                .draw(|frame| {
                    ui::draw_app(frame, &self.state, &self.theme, self.config.preview_lines);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            if event::poll(self.tick_rate).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(_, _) => {
                        // no-op: next draw adapts to the new size
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_overlay_key(key) {
            return;
        }

        let action = match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Quit)
            }
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Char('g') => Some(Action::ToggleView),
            KeyCode::Tab => Some(Action::ScopeForward),
            KeyCode::BackTab => Some(Action::ScopeBack),
            KeyCode::Char('+') | KeyCode::Char('=') => Some(Action::ZoomIn),
            KeyCode::Char('-') => Some(Action::ZoomOut),
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Refresh)
            }
            KeyCode::Char('a') if plain(key) => Some(Action::AddEvent),
            KeyCode::Char('e') if plain(key) => Some(Action::EditEvent),
            KeyCode::Char('d') if plain(key) => Some(Action::DeleteEvent),
            KeyCode::Char('i') if plain(key) => Some(Action::ToggleImportant),
            KeyCode::Char('c') if plain(key) => Some(Action::ManageCategories),
            KeyCode::Char(digit @ '1'..='9') if plain(key) => {
                Some(Action::ToggleFilter(digit as usize - '1' as usize))
            }
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::SelectNext => self.state.move_selection(1),
            Action::SelectPrevious => self.state.move_selection(-1),
            Action::ToggleView => {
                self.state.toggle_view();
                let label = match self.state.view {
                    ViewMode::Columns => "Timeline view",
                    ViewMode::Global => "Global view: 1-9 toggle category filters",
                };
                self.state.set_status_message(Some(label));
            }
            Action::ScopeForward => self.cycle_scope(true),
            Action::ScopeBack => self.cycle_scope(false),
            Action::ZoomIn => {
                let zoom = self.state.zoom_in();
                self.state
                    .set_status_message(Some(format!("Zoom: {zoom} px/year")));
            }
            Action::ZoomOut => {
                let zoom = self.state.zoom_out();
                self.state
                    .set_status_message(Some(format!("Zoom: {zoom} px/year")));
            }
            Action::AddEvent => self.handle_add_event(),
            Action::EditEvent => self.handle_edit_event(),
            Action::DeleteEvent => self.handle_delete_event(),
            Action::ToggleImportant => self.handle_toggle_important(),
            Action::ManageCategories => {
                self.state.open_category_manager();
                self.state.set_status_message(Some(
                    "Categories: j/k move • a add • e edit • x delete • Esc close",
                ));
            }
            Action::Refresh => {
                if let Err(err) = self.state.refresh(&self.storage) {
                    tracing::error!(?err, "failed to refresh from storage");
                    self.state.set_status_message(Some("Refresh failed"));
                } else {
                    self.state.set_status_message(Some("Refreshed"));
                }
            }
            Action::ToggleFilter(slot) => {
                if self.state.view != ViewMode::Global {
                    return;
                }
                match self.state.toggle_filter_slot(slot) {
                    Some((name, true)) => {
                        self.state
                            .set_status_message(Some(format!("Showing '{name}'")));
                    }
                    Some((name, false)) => {
                        self.state
                            .set_status_message(Some(format!("Hiding '{name}'")));
                    }
                    None => {}
                }
            }
        }
    }

    fn cycle_scope(&mut self, forward: bool) {
        if self.state.view != ViewMode::Columns {
            return;
        }
        self.state.cycle_scope(forward);
        self.state
            .set_status_message(Some(format!("Scope: {}", self.state.scope_label())));
    }

    fn handle_add_event(&mut self) {
        if self.state.overlay().is_some() {
            return;
        }
        if self.state.categories.is_empty() {
            self.state
                .set_status_message(Some("Create a category first (press c)"));
            return;
        }
        let today = OffsetDateTime::now_utc().date();
        self.state.open_add_form(today);
        self.state.set_status_message(Some(
            "New souvenir: Tab next field • Enter save • Esc cancel",
        ));
    }

    fn handle_edit_event(&mut self) {
        if self.state.overlay().is_some() {
            return;
        }
        if self.state.selected_event().is_none() {
            self.state.set_status_message(Some("No souvenir selected"));
            return;
        }
        self.state.open_edit_form();
        self.state.set_status_message(Some(
            "Edit souvenir: Tab next field • Enter save • Esc cancel",
        ));
    }

    fn handle_delete_event(&mut self) {
        if self.state.overlay().is_some() {
            return;
        }
        if self.state.selected_event().is_none() {
            self.state.set_status_message(Some("No souvenir selected"));
            return;
        }
        self.state.open_confirm_delete_event();
        self.state
            .set_status_message(Some("Delete souvenir: Enter confirm • Esc cancel"));
    }

    fn handle_toggle_important(&mut self) {
        let Some((event_id, important)) = self
            .state
            .selected_event()
            .map(|event| (event.id, !event.is_important))
        else {
            self.state.set_status_message(Some("No souvenir selected"));
            return;
        };
        let dispatcher = ActionDispatcher::new(&self.storage);
        if let Err(err) = dispatcher.toggle_important(event_id, important) {
            tracing::error!(?err, event_id, "failed to toggle importance");
            self.state
                .set_status_message(Some("Failed to update souvenir"));
            return;
        }
        if let Err(err) = self.state.refresh(&self.storage) {
            tracing::error!(?err, "failed to refresh after importance toggle");
            self.state.set_status_message(Some("Could not refresh"));
        } else {
            self.state.select_event_by_id(event_id);
            let message = if important {
                "Marked as super-souvenir"
            } else {
                "Back to a regular souvenir"
            };
            self.state.set_status_message(Some(message));
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        match self.state.overlay() {
            Some(OverlayState::EventForm(_)) => {
                self.handle_form_key(key);
                true
            }
            Some(OverlayState::CategoryManager(_)) => {
                self.handle_manager_key(key);
                true
            }
            Some(OverlayState::ConfirmDeleteEvent(_)) => {
                match key.code {
                    KeyCode::Esc | KeyCode::Char('n') => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Delete canceled"));
                    }
                    KeyCode::Enter | KeyCode::Char('y') => {
                        self.submit_delete_event();
                    }
                    _ => {}
                }
                true
            }
            None => false,
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let Some(focus) = self.state.event_form().map(|form| form.focus) else {
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.state.close_overlay();
                self.state.set_status_message(Some("Canceled"));
            }
            KeyCode::Enter => self.submit_event_form(),
            KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.submit_event_form();
            }
            KeyCode::Tab | KeyCode::Down => {
                if let Some(form) = self.state.event_form_mut() {
                    form.focus = form.focus.next();
                    form.error = None;
                }
            }
            KeyCode::BackTab | KeyCode::Up => {
                if let Some(form) = self.state.event_form_mut() {
                    form.focus = form.focus.prev();
                    form.error = None;
                }
            }
            KeyCode::Left => match focus {
                FormField::Category => self.state.form_cycle_category(false),
                FormField::Valence => self.state.form_adjust_valence(-1),
                _ => {}
            },
            KeyCode::Right => match focus {
                FormField::Category => self.state.form_cycle_category(true),
                FormField::Valence => self.state.form_adjust_valence(1),
                _ => {}
            },
            KeyCode::Char(' ') if matches!(focus, FormField::Important | FormField::Current) => {
                if let Some(form) = self.state.event_form_mut() {
                    match focus {
                        FormField::Important => form.is_important = !form.is_important,
                        FormField::Current => form.is_current = !form.is_current,
                        _ => {}
                    }
                }
            }
            KeyCode::Backspace => {
                if let Some(form) = self.state.event_form_mut() {
                    if let Some(buffer) = form.focused_buffer_mut() {
                        buffer.pop();
                        form.error = None;
                    }
                }
            }
            KeyCode::Char(ch) if plain(key) && focus.is_text() => {
                if let Some(form) = self.state.event_form_mut() {
                    if let Some(buffer) = form.focused_buffer_mut() {
                        buffer.push(ch);
                        form.error = None;
                    }
                }
            }
            _ => {}
        }
    }

    fn submit_event_form(&mut self) {
        let Some(form) = self.state.event_form() else {
            return;
        };
        if form.submitting {
            return;
        }
        let editing = form.editing;
        let draft = match form.to_draft(&self.state.categories) {
            Ok(draft) => draft,
            Err(message) => {
                if let Some(form) = self.state.event_form_mut() {
                    form.error = Some(message);
                }
                return;
            }
        };

        if let Some(form) = self.state.event_form_mut() {
            form.submitting = true;
        }
        let dispatcher = ActionDispatcher::new(&self.storage);
        let result = match editing {
            Some(event_id) => dispatcher.update_event(event_id, &draft).map(|_| event_id),
            None => dispatcher.create_event(&draft),
        };
        match result {
            Ok(event_id) => {
                self.state.close_overlay();
                if let Err(err) = self.state.refresh(&self.storage) {
                    tracing::error!(?err, "failed to refresh after saving souvenir");
                    self.state
                        .set_status_message(Some("Saved, refresh failed"));
                } else {
                    self.state.select_event_by_id(event_id);
                    let message = if editing.is_some() {
                        "Souvenir updated"
                    } else {
                        "Souvenir added"
                    };
                    self.state.set_status_message(Some(message));
                }
            }
            Err(err) => {
                tracing::error!(?err, "failed to save souvenir");
                if let Some(form) = self.state.event_form_mut() {
                    form.submitting = false;
                    form.error = Some("failed to save; see logs".into());
                }
            }
        }
    }

    fn submit_delete_event(&mut self) {
        let Some(event_id) = self
            .state
            .confirm_delete_event()
            .map(|confirm| confirm.event_id)
        else {
            return;
        };
        let dispatcher = ActionDispatcher::new(&self.storage);
        match dispatcher.delete_event(event_id) {
            Ok(()) => {
                self.state.close_overlay();
                if let Err(err) = self.state.refresh(&self.storage) {
                    tracing::error!(?err, "failed to refresh after delete");
                    self.state
                        .set_status_message(Some("Deleted, refresh failed"));
                } else {
                    self.state.set_status_message(Some("Souvenir deleted"));
                }
            }
            Err(err) => {
                tracing::error!(?err, event_id, "failed to delete souvenir");
                self.state
                    .set_status_message(Some("Failed to delete souvenir"));
            }
        }
    }

    fn handle_manager_key(&mut self, key: KeyEvent) {
        let mode = self
            .state
            .category_manager()
            .map(|manager| manager.mode.clone())
            .unwrap_or(ManagerMode::Browse);
        match mode {
            ManagerMode::Browse => match key.code {
                KeyCode::Esc => {
                    self.state.close_overlay();
                    self.state.set_status_message(None::<String>);
                }
                KeyCode::Char('j') | KeyCode::Down => self.state.manager_move_selection(1),
                KeyCode::Char('k') | KeyCode::Up => self.state.manager_move_selection(-1),
                KeyCode::Char('a') if plain(key) => {
                    if let Some(manager) = self.state.category_manager_mut() {
                        manager.mode = ManagerMode::Input(ManagerInput::Add);
                        manager.input = state::FieldBuffer::new(64);
                        manager.status =
                            Some("New category: type name, ←/→ color, Enter to add".into());
                    }
                }
                KeyCode::Char('e') | KeyCode::Char('r') if plain(key) => {
                    let Some((category_id, name, color)) = self
                        .state
                        .manager_selected_category()
                        .map(|category| (category.id, category.name.clone(), category.color))
                    else {
                        return;
                    };
                    if let Some(manager) = self.state.category_manager_mut() {
                        manager.mode = ManagerMode::Input(ManagerInput::Edit { category_id });
                        manager.input = state::FieldBuffer::with_value(64, name);
                        manager.color_choice = state::palette()
                            .iter()
                            .position(|candidate| *candidate == color)
                            .unwrap_or(0);
                        manager.status =
                            Some("Edit category: rename, ←/→ color, Enter to save".into());
                    }
                }
                KeyCode::Char('x') | KeyCode::Char('d') if plain(key) => {
                    let Some((category_id, name)) = self
                        .state
                        .manager_selected_category()
                        .map(|category| (category.id, category.name.clone()))
                    else {
                        return;
                    };
                    if let Some(manager) = self.state.category_manager_mut() {
                        manager.status = Some(format!(
                            "Delete '{name}'? Its souvenirs keep existing without a category. y/n"
                        ));
                        manager.mode = ManagerMode::ConfirmDelete { category_id, name };
                    }
                }
                _ => {}
            },
            ManagerMode::Input(input) => match key.code {
                KeyCode::Esc => {
                    if let Some(manager) = self.state.category_manager_mut() {
                        manager.mode = ManagerMode::Browse;
                        manager.status = None;
                    }
                }
                KeyCode::Enter => self.submit_category_input(input),
                KeyCode::Left => {
                    if let Some(manager) = self.state.category_manager_mut() {
                        manager.cycle_color(false);
                    }
                }
                KeyCode::Right => {
                    if let Some(manager) = self.state.category_manager_mut() {
                        manager.cycle_color(true);
                    }
                }
                KeyCode::Backspace => {
                    if let Some(manager) = self.state.category_manager_mut() {
                        manager.input.pop();
                    }
                }
                KeyCode::Char(ch) if plain(key) => {
                    if let Some(manager) = self.state.category_manager_mut() {
                        manager.input.push(ch);
                    }
                }
                _ => {}
            },
            ManagerMode::ConfirmDelete { category_id, .. } => match key.code {
                KeyCode::Esc | KeyCode::Char('n') => {
                    if let Some(manager) = self.state.category_manager_mut() {
                        manager.mode = ManagerMode::Browse;
                        manager.status = None;
                    }
                }
                KeyCode::Enter | KeyCode::Char('y') => {
                    self.submit_category_delete(category_id);
                }
                _ => {}
            },
        }
    }

    fn submit_category_input(&mut self, input: ManagerInput) {
        let Some((name, color)) = self
            .state
            .category_manager()
            .map(|manager| (manager.input.trimmed().to_string(), manager.chosen_color()))
        else {
            return;
        };
        if name.is_empty() {
            if let Some(manager) = self.state.category_manager_mut() {
                manager.status = Some("Category name cannot be empty".into());
            }
            return;
        }

        let dispatcher = ActionDispatcher::new(&self.storage);
        let result = match input {
            ManagerInput::Add => dispatcher.create_category(&name, color).map(|_| ()),
            ManagerInput::Edit { category_id } => {
                dispatcher.update_category(category_id, &name, color)
            }
        };
        match result {
            Ok(()) => {
                if let Err(err) = self.state.refresh(&self.storage) {
                    tracing::error!(?err, "failed to refresh after category change");
                }
                if let Some(manager) = self.state.category_manager_mut() {
                    manager.mode = ManagerMode::Browse;
                    manager.status = Some(format!("Saved category '{name}'"));
                }
            }
            Err(err) => {
                tracing::error!(?err, "failed to save category");
                if let Some(manager) = self.state.category_manager_mut() {
                    manager.status = Some("Failed to save category".into());
                }
            }
        }
    }

    fn submit_category_delete(&mut self, category_id: i64) {
        let dispatcher = ActionDispatcher::new(&self.storage);
        match dispatcher.delete_category(category_id) {
            Ok(outcome) => {
                if let Err(err) = self.state.refresh(&self.storage) {
                    tracing::error!(?err, "failed to refresh after category delete");
                }
                if let Some(manager) = self.state.category_manager_mut() {
                    manager.mode = ManagerMode::Browse;
                    manager.selected = 0;
                    manager.status = Some(format!(
                        "Deleted '{}' ({} souvenir{} detached)",
                        outcome.name,
                        outcome.detached,
                        if outcome.detached == 1 { "" } else { "s" }
                    ));
                }
            }
            Err(err) => {
                tracing::error!(?err, category_id, "failed to delete category");
                if let Some(manager) = self.state.category_manager_mut() {
                    manager.mode = ManagerMode::Browse;
                    manager.status = Some("Failed to delete category".into());
                }
            }
        }
    }
}

fn plain(key: KeyEvent) -> bool {
    !key.modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("restoring screen state")?;
    Ok(())
}
