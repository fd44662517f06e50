use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;
use strum::IntoEnumIterator;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::state::{
    AppState, EventFormOverlay, FormField, ManagerInput, ManagerMode, OverlayState, ViewMode,
};
use crate::config::themes::{category_accent, Theme};
use crate::model::{self, Category, CategoryColor, LifeEvent};
use crate::timeline::bands::{self, GlobalView, MarkerTier};
use crate::timeline::linear::{self, LinearView};

/// Pixels of layout space per terminal row. At the default 100 px/year
/// zoom one year spans four rows.
const ROW_PIXELS: f64 = 25.0;
const RULER_WIDTH: u16 = 8;

pub fn draw_app(frame: &mut Frame, state: &AppState, theme: &Theme, preview_lines: u16) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(6),
            Constraint::Length(preview_lines + 4),
            Constraint::Length(4),
        ])
        .split(frame.size());

    match state.view {
        ViewMode::Columns => draw_columns(frame, vertical[0], state, theme),
        ViewMode::Global => draw_global(frame, vertical[0], state, theme),
    }
    draw_detail(frame, vertical[1], state, theme, preview_lines);

    let footer = Paragraph::new(build_status_lines(state, theme)).style(Style::default());
    frame.render_widget(footer, vertical[2]);

    render_overlay(frame, state, theme);
}

fn draw_columns(frame: &mut Frame, area: Rect, state: &AppState, theme: &Theme) {
    let scoped = state.scoped_events();
    let layout = linear::build(&scoped, &state.categories, state.pixels_per_year);

    match layout {
        LinearView::NoCategories => {
            empty_state(
                frame,
                area,
                theme,
                "Create a category to start tracing your life.",
                "Press `c` to open the category manager.",
            );
        }
        LinearView::NoEvents => {
            empty_state(
                frame,
                area,
                theme,
                "No souvenirs yet.",
                "Press `a` to add your first one and start tracing your life.",
            );
        }
        LinearView::Ready(layout) => {
            let block = Block::default()
                .title(format!("Timeline — {}", state.scope_label()))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.faint));
            let inner = block.inner(area);
            frame.render_widget(block, area);
            if inner.height < 3 || inner.width <= RULER_WIDTH {
                return;
            }

            let header = Rect::new(inner.x, inner.y, inner.width, 1);
            let canvas = Rect::new(inner.x, inner.y + 1, inner.width, inner.height - 1);
            let column_count = state.categories.len().max(1);
            let column_width = (inner.width - RULER_WIDTH) / column_count as u16;
            if column_width == 0 {
                return;
            }

            let buf = frame.buffer_mut();
            buf.set_string(
                header.x + 1,
                header.y,
                "YEAR",
                Style::default().fg(theme.dim).add_modifier(Modifier::BOLD),
            );
            for (index, category) in state.categories.iter().enumerate() {
                let x = header.x + RULER_WIDTH + index as u16 * column_width;
                let label = truncate(&category.name.to_uppercase(), column_width.saturating_sub(1));
                buf.set_string(
                    x + 1,
                    header.y,
                    label,
                    Style::default()
                        .fg(category_accent(category.color))
                        .add_modifier(Modifier::BOLD),
                );
            }

            // Keep the selection vertically centered; everything else
            // scrolls around it.
            let selected_id = state.selected_event().map(|event| event.id);
            let selected_offset = selected_id
                .and_then(|id| {
                    layout
                        .events
                        .iter()
                        .find(|placed| placed.event.id == id)
                        .map(|placed| placed.offset)
                })
                .unwrap_or(0.0);
            let viewport_px = f64::from(canvas.height) * ROW_PIXELS;
            let scroll_px = (selected_offset - viewport_px / 2.0).max(0.0);

            for tick in &layout.years {
                let Some(row) = offset_to_row(tick.offset, scroll_px, canvas.height) else {
                    continue;
                };
                let y = canvas.y + row;
                let label = format!("{:>6}", tick.year);
                buf.set_string(canvas.x + 1, y, label, Style::default().fg(theme.dim));
                for x in (canvas.x + RULER_WIDTH)..canvas.right() {
                    buf.set_string(x, y, "┈", Style::default().fg(theme.faint));
                }
            }

            // Selected marker drawn last so it wins cell overlaps.
            let mut placed: Vec<_> = layout.events.iter().collect();
            placed.sort_by_key(|placed| Some(placed.event.id) == selected_id);
            for item in placed {
                let Some(row) = offset_to_row(item.offset, scroll_px, canvas.height) else {
                    continue;
                };
                let x = canvas.x + RULER_WIDTH + item.column as u16 * column_width;
                let y = canvas.y + row;
                let accent = item
                    .event
                    .category_id
                    .and_then(|id| state.categories.iter().find(|category| category.id == id))
                    .map(|category| category_accent(category.color))
                    .unwrap_or(theme.dim);
                let marker = if item.event.is_important { "★" } else { "●" };
                let label = truncate(
                    &format!("{marker} {}", item.event.title),
                    column_width.saturating_sub(1),
                );
                let style = if Some(item.event.id) == selected_id {
                    Style::default()
                        .bg(theme.highlight_bg)
                        .fg(theme.highlight_fg)
                        .add_modifier(Modifier::BOLD)
                } else if item.event.is_important {
                    Style::default().fg(accent).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(accent)
                };
                buf.set_string(x + 1, y, label, style);
            }
        }
    }
}

fn draw_global(frame: &mut Frame, area: Rect, state: &AppState, theme: &Theme) {
    let layout = bands::build(
        &state.events,
        &state.categories,
        &state.filter,
        state.band_years,
    );
    let layout = match layout {
        GlobalView::Empty => {
            empty_state(
                frame,
                area,
                theme,
                "Add souvenirs to see the global view.",
                "Every 25 years of your life becomes one row.",
            );
            return;
        }
        GlobalView::Ready(layout) => layout,
    };

    let block = Block::default()
        .title("Global timeline")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.faint));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height < 6 || inner.width < 20 {
        return;
    }

    let chips = filter_chips(state, theme);
    frame.render_widget(
        Paragraph::new(chips),
        Rect::new(inner.x + 1, inner.y, inner.width.saturating_sub(2), 1),
    );

    let selected_id = state.selected_event().map(|event| event.id);
    let band_height: u16 = 4;
    let usable = Rect::new(
        inner.x + 1,
        inner.y + 2,
        inner.width.saturating_sub(2),
        inner.height.saturating_sub(2),
    );

    // Scroll whole bands so the selected event's band stays on screen.
    let visible_bands = (usable.height / band_height).max(1) as usize;
    let selected_band = selected_id
        .and_then(|id| {
            layout.bands.iter().position(|band| {
                band.events.iter().any(|band_event| band_event.event.id == id)
            })
        })
        .unwrap_or(0);
    let first_band = selected_band.saturating_sub(visible_bands.saturating_sub(1));

    let buf = frame.buffer_mut();
    for (slot, band) in layout
        .bands
        .iter()
        .skip(first_band)
        .take(visible_bands)
        .enumerate()
    {
        let top = usable.y + slot as u16 * band_height;
        let axis_y = top + 1;
        let label_y = top + 2;

        for x in usable.x..usable.right() {
            buf.set_string(x, axis_y, "─", Style::default().fg(theme.faint));
        }

        for marker in &band.markers {
            let x = usable.x + percent_to_x(marker.percent, usable.width);
            match marker.tier {
                MarkerTier::Edge => {
                    buf.set_string(
                        x,
                        axis_y,
                        "┿",
                        Style::default().fg(theme.dim).add_modifier(Modifier::BOLD),
                    );
                    let label = marker.year.to_string();
                    let label_x = x.saturating_sub(label.len() as u16 / 2).max(usable.x);
                    buf.set_string(
                        label_x,
                        label_y,
                        label,
                        Style::default().fg(theme.dim).add_modifier(Modifier::BOLD),
                    );
                }
                MarkerTier::FiveYear => {
                    buf.set_string(x, axis_y, "┼", Style::default().fg(theme.dim));
                    let label = marker.year.to_string();
                    let label_x = x.saturating_sub(label.len() as u16 / 2).max(usable.x);
                    buf.set_string(label_x, label_y, label, Style::default().fg(theme.faint));
                }
                MarkerTier::Year => {}
            }
        }

        // Decorative connector towards the next band, on the flow side.
        if band.index + 1 < layout.bands.len() {
            let (corner_x, corners) = if band.is_reverse {
                (usable.x, ["╭", "╰"])
            } else {
                (usable.right().saturating_sub(1), ["╮", "╯"])
            };
            buf.set_string(corner_x, axis_y + 1, corners[0], Style::default().fg(theme.faint));
            buf.set_string(corner_x, axis_y + 2, corners[1], Style::default().fg(theme.faint));
        }

        for band_event in &band.events {
            let x = usable.x + percent_to_x(band_event.percent, usable.width);
            let accent = band_event
                .event
                .category_id
                .and_then(|id| state.categories.iter().find(|category| category.id == id))
                .map(|category| category_accent(category.color))
                .unwrap_or(theme.dim);
            let selected = Some(band_event.event.id) == selected_id;
            let style = if selected {
                Style::default()
                    .bg(theme.highlight_bg)
                    .fg(theme.highlight_fg)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(accent).add_modifier(Modifier::BOLD)
            };
            if band_event.event.is_important {
                // Super-souvenirs get a tall mark and their title above the axis.
                buf.set_string(x, axis_y, "█", style);
                let title = truncate(&band_event.event.title, 24);
                let title_x = x
                    .saturating_sub(title.chars().count() as u16 / 2)
                    .clamp(usable.x, usable.right().saturating_sub(1));
                buf.set_string(title_x, top, title, Style::default().fg(accent));
            } else {
                buf.set_string(x, axis_y, "●", style);
            }
        }
    }
}

fn filter_chips(state: &AppState, theme: &Theme) -> Line<'static> {
    let mut spans = vec![Span::styled(
        "Filter: ",
        Style::default().fg(theme.dim).add_modifier(Modifier::BOLD),
    )];
    for (index, category) in state.categories.iter().enumerate().take(9) {
        let selected = state.filter.contains(&category.id);
        let mark = if selected { "✓" } else { " " };
        let style = if selected {
            Style::default().fg(category_accent(category.color))
        } else {
            Style::default().fg(theme.faint)
        };
        spans.push(Span::styled(
            format!("[{}{} {}] ", index + 1, mark, category.name),
            style,
        ));
    }
    Line::from(spans)
}

fn draw_detail(frame: &mut Frame, area: Rect, state: &AppState, theme: &Theme, preview_lines: u16) {
    let block = Block::default()
        .title("Souvenir")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.faint));

    let text = match state.selected_event() {
        Some(event) => detail_lines(event, &state.categories, theme, preview_lines),
        None => Text::from(Span::styled(
            "Select a souvenir with j/k.",
            Style::default().fg(theme.dim),
        )),
    };
    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn detail_lines(
    event: &LifeEvent,
    categories: &[Category],
    theme: &Theme,
    preview_lines: u16,
) -> Text<'static> {
    let category = event
        .category_id
        .and_then(|id| categories.iter().find(|category| category.id == id));
    let accent = category
        .map(|category| category_accent(category.color))
        .unwrap_or(theme.dim);

    let mut header = Vec::new();
    if event.is_important {
        header.push(Span::styled(
            "★ ",
            Style::default().fg(accent).add_modifier(Modifier::BOLD),
        ));
    }
    header.push(Span::styled(
        event.title.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    ));
    header.push(Span::raw("  "));
    match category {
        Some(category) => header.push(Span::styled(
            format!(
                "{} {}",
                model::icon_glyph(category.icon.as_deref()),
                category.name.to_uppercase()
            ),
            Style::default().fg(accent),
        )),
        None => header.push(Span::styled(
            "UNCATEGORIZED",
            Style::default().fg(theme.faint).add_modifier(Modifier::ITALIC),
        )),
    }

    let mut date_spans = vec![Span::styled(
        model::format_date_short(event.date),
        Style::default().fg(theme.dim),
    )];
    if let Some(end) = event.end_date {
        date_spans.push(Span::styled(
            format!(" → {}", model::format_date_short(end)),
            Style::default().fg(theme.dim),
        ));
    }
    if event.is_current {
        date_spans.push(Span::styled(
            "  (ongoing)",
            Style::default().fg(theme.accent).add_modifier(Modifier::ITALIC),
        ));
    }
    if let Some(valence) = event.emotional_valence {
        let style = if valence > 0 {
            Style::default().fg(ratatui::style::Color::Green)
        } else {
            Style::default().fg(theme.danger)
        };
        date_spans.push(Span::raw("  "));
        date_spans.push(Span::styled(format_valence(valence), style));
    }

    let mut lines = vec![Line::from(header), Line::from(date_spans)];

    let mut meta = Vec::new();
    if let Some(location) = &event.location {
        meta.push(Span::styled(
            format!("Location: {location}  "),
            Style::default().fg(theme.dim),
        ));
    }
    if !event.people.is_empty() {
        meta.push(Span::styled(
            format!("With: {}", event.people.join(", ")),
            Style::default().fg(theme.dim),
        ));
    }
    if !meta.is_empty() {
        lines.push(Line::from(meta));
    }

    if let Some(description) = &event.description {
        for line in description.lines().take(preview_lines as usize) {
            lines.push(Line::from(line.to_string()));
        }
    }

    Text::from(lines)
}

pub(crate) fn format_valence(valence: i8) -> String {
    if valence > 0 {
        format!("+{valence}")
    } else {
        valence.to_string()
    }
}

fn build_status_lines(state: &AppState, theme: &Theme) -> Text<'static> {
    let visible = state.visible_events();
    let total = visible.len();
    let position = if total == 0 {
        "0/0".to_string()
    } else {
        format!("{}/{}", state.selected + 1, total)
    };
    let view = match state.view {
        ViewMode::Columns => "Timeline",
        ViewMode::Global => "Global",
    };

    let mut spans = vec![
        Span::raw(format!("Souvenirs: {total} ")),
        Span::raw(" | Selected: "),
        Span::styled(position, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" | View: "),
        Span::styled(view, Style::default().add_modifier(Modifier::BOLD)),
    ];

    match state.view {
        ViewMode::Columns => {
            spans.push(Span::raw(" | Scope: "));
            spans.push(Span::styled(
                state.scope_label(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::raw(format!(
                " | Zoom: {} px/yr",
                state.pixels_per_year
            )));
        }
        ViewMode::Global => {
            spans.push(Span::raw(format!(
                " | Filter: {}/{}",
                state.filter.len(),
                state.categories.len()
            )));
        }
    }

    if let Some(message) = &state.status_message {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            message.clone(),
            Style::default().fg(theme.accent),
        ));
    }

    let mut lines = Vec::with_capacity(3);
    lines.push(Line::from(spans));
    lines.push(Line::from(Span::styled(
        "Keys: j/k move • g global view • Tab scope • +/- zoom • a add • e edit • i star",
        Style::default().fg(theme.faint),
    )));
    lines.push(Line::from(Span::styled(
        "      d delete • c categories • 1-9 filters • Ctrl-r refresh • q quit",
        Style::default().fg(theme.faint),
    )));
    Text::from(lines)
}

fn empty_state(frame: &mut Frame, area: Rect, theme: &Theme, headline: &str, hint: &str) {
    let card = centered_rect(60, 40, area);
    let paragraph = Paragraph::new(vec![
        Line::from(Span::styled(
            headline.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            hint.to_string(),
            Style::default().fg(theme.dim),
        )),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.faint)),
    )
    .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, card);
}

fn render_overlay(frame: &mut Frame, state: &AppState, theme: &Theme) {
    match state.overlay() {
        Some(OverlayState::EventForm(form)) => render_event_form(frame, state, form, theme),
        Some(OverlayState::CategoryManager(_)) => render_category_manager(frame, state, theme),
        Some(OverlayState::ConfirmDeleteEvent(confirm)) => {
            let area = centered_rect(60, 30, frame.size());
            frame.render_widget(Clear, area);
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    "Delete souvenir",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(format!(
                    "Permanently delete '{}'? This cannot be undone.",
                    confirm.title
                )),
                Line::from(""),
                Line::from(Span::styled(
                    "Enter to confirm • Esc to cancel",
                    Style::default().fg(theme.dim),
                )),
            ])
            .block(
                Block::default()
                    .title("Confirm Delete")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(theme.danger)),
            )
            .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        None => {}
    }
}

fn render_event_form(frame: &mut Frame, state: &AppState, form: &EventFormOverlay, theme: &Theme) {
    let area = centered_rect(70, 80, frame.size());
    frame.render_widget(Clear, area);

    let title = if form.editing.is_some() {
        "Edit souvenir"
    } else {
        "New souvenir"
    };

    let category_label = state
        .categories
        .get(form.category_choice)
        .map(|category| category.name.clone())
        .unwrap_or_else(|| "—".to_string());
    let valence_label = if form.valence == 0 {
        "—".to_string()
    } else {
        format_valence(form.valence)
    };

    let mut lines = Vec::new();
    lines.push(form_text_line("Title", form.title.value(), form.focus == FormField::Title, theme));
    lines.push(form_text_line("Date", form.date.value(), form.focus == FormField::Date, theme));
    lines.push(form_text_line(
        "End date",
        form.end_date.value(),
        form.focus == FormField::EndDate,
        theme,
    ));
    lines.push(form_choice_line(
        "Category",
        &category_label,
        form.focus == FormField::Category,
        theme,
    ));
    lines.push(form_text_line(
        "Description",
        form.description.value(),
        form.focus == FormField::Description,
        theme,
    ));
    lines.push(form_text_line(
        "Location",
        form.location.value(),
        form.focus == FormField::Location,
        theme,
    ));
    lines.push(form_text_line(
        "People",
        form.people.value(),
        form.focus == FormField::People,
        theme,
    ));
    lines.push(form_choice_line(
        "Valence",
        &valence_label,
        form.focus == FormField::Valence,
        theme,
    ));
    lines.push(form_toggle_line(
        "Super-souvenir",
        form.is_important,
        form.focus == FormField::Important,
        theme,
    ));
    lines.push(form_toggle_line(
        "Ongoing",
        form.is_current,
        form.focus == FormField::Current,
        theme,
    ));
    lines.push(Line::from(""));
    if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(
            format!("! {error}"),
            Style::default().fg(theme.danger),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "Tab next field • ←/→ adjust • space toggle • Enter save • Esc cancel",
            Style::default().fg(theme.dim),
        )));
    }

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.accent)),
    );
    frame.render_widget(paragraph, area);
}

fn form_text_line(label: &str, value: &str, focused: bool, theme: &Theme) -> Line<'static> {
    let mut display = value.to_string();
    if focused {
        display.push('▌');
    }
    Line::from(vec![
        Span::styled(format!("{label:>13}: "), label_style(focused, theme)),
        Span::raw(display),
    ])
}

fn form_choice_line(label: &str, value: &str, focused: bool, theme: &Theme) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:>13}: "), label_style(focused, theme)),
        Span::styled(
            format!("◀ {value} ▶"),
            if focused {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            },
        ),
    ])
}

fn form_toggle_line(label: &str, on: bool, focused: bool, theme: &Theme) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:>13}: "), label_style(focused, theme)),
        Span::raw(if on { "[x]" } else { "[ ]" }),
    ])
}

fn label_style(focused: bool, theme: &Theme) -> Style {
    if focused {
        Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.dim)
    }
}

fn render_category_manager(frame: &mut Frame, state: &AppState, theme: &Theme) {
    let Some(manager) = state.category_manager() else {
        return;
    };
    let area = centered_rect(60, 70, frame.size());
    frame.render_widget(Clear, area);

    let mut lines = Vec::new();
    lines.push(Line::from(Span::styled(
        "Categories",
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(Span::styled(
        "j/k move • a add • e edit • x delete • Esc close",
        Style::default().fg(theme.dim),
    )));
    lines.push(Line::from(""));

    if state.categories.is_empty() {
        lines.push(Line::from(Span::styled(
            "No categories yet. Press `a` to create one.",
            Style::default().fg(theme.dim),
        )));
    }
    for (index, category) in state.categories.iter().enumerate() {
        let marker = if index == manager.selected { "▸ " } else { "  " };
        let count = state
            .events
            .iter()
            .filter(|event| event.category_id == Some(category.id))
            .count();
        let style = if index == manager.selected {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::styled(marker.to_string(), Style::default().fg(theme.accent)),
            Span::styled("⬤ ", Style::default().fg(category_accent(category.color))),
            Span::styled(category.name.clone(), style),
            Span::styled(
                format!(
                    "  ({count} souvenir{})",
                    if count == 1 { "" } else { "s" }
                ),
                Style::default().fg(theme.faint),
            ),
        ]));
    }
    lines.push(Line::from(""));

    match &manager.mode {
        ManagerMode::Input(input) => {
            let heading = match input {
                ManagerInput::Add => "New category".to_string(),
                ManagerInput::Edit { .. } => "Edit category".to_string(),
            };
            lines.push(Line::from(Span::styled(
                heading,
                Style::default().fg(theme.accent),
            )));
            let mut name = manager.input.value().to_string();
            name.push('▌');
            lines.push(Line::from(name));

            let mut swatches = vec![Span::styled(
                "Color: ",
                Style::default().fg(theme.dim),
            )];
            for color in CategoryColor::iter() {
                let chosen = color == manager.chosen_color();
                let swatch = if chosen {
                    format!("[{color}] ")
                } else {
                    format!(" {color}  ")
                };
                let mut style = Style::default().fg(category_accent(color));
                if chosen {
                    style = style.add_modifier(Modifier::BOLD);
                }
                swatches.push(Span::styled(swatch, style));
            }
            lines.push(Line::from(swatches));
        }
        ManagerMode::ConfirmDelete { name, .. } => {
            lines.push(Line::from(Span::styled(
                format!("Delete '{name}'? y to confirm, n to cancel."),
                Style::default().fg(theme.danger),
            )));
        }
        ManagerMode::Browse => {}
    }

    if let Some(status) = &manager.status {
        lines.push(Line::from(Span::styled(
            status.clone(),
            Style::default().fg(theme.accent),
        )));
    }

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title("Category Manager")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.accent)),
    );
    frame.render_widget(paragraph, area);
}

/// Maps a layout pixel offset onto a canvas row, or `None` when it falls
/// outside the viewport.
fn offset_to_row(offset_px: f64, scroll_px: f64, rows: u16) -> Option<u16> {
    let relative = offset_px - scroll_px;
    if relative < 0.0 {
        return None;
    }
    let row = (relative / ROW_PIXELS).floor();
    if row >= f64::from(rows) {
        None
    } else {
        Some(row as u16)
    }
}

/// Maps a band percentage onto a column within `width` cells.
fn percent_to_x(percent: f64, width: u16) -> u16 {
    if width == 0 {
        return 0;
    }
    let last = f64::from(width - 1);
    (percent / 100.0 * last).round().clamp(0.0, last) as u16
}

/// Cuts `text` to `max_width` terminal cells, ellipsis included.
fn truncate(text: &str, max_width: u16) -> String {
    let max = max_width as usize;
    if UnicodeWidthStr::width(text) <= max {
        return text.to_string();
    }
    let budget = max.saturating_sub(1);
    let mut used = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let glyph = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + glyph > budget {
            break;
        }
        used += glyph;
        out.push(ch);
    }
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_map_onto_rows_inside_the_viewport() {
        assert_eq!(offset_to_row(0.0, 0.0, 10), Some(0));
        assert_eq!(offset_to_row(ROW_PIXELS, 0.0, 10), Some(1));
        assert_eq!(offset_to_row(ROW_PIXELS * 9.5, 0.0, 10), Some(9));
        assert_eq!(offset_to_row(ROW_PIXELS * 10.0, 0.0, 10), None);
        assert_eq!(offset_to_row(50.0, 100.0, 10), None);
        assert_eq!(offset_to_row(150.0, 100.0, 10), Some(2));
    }

    #[test]
    fn percents_span_the_full_axis_width() {
        assert_eq!(percent_to_x(0.0, 80), 0);
        assert_eq!(percent_to_x(100.0, 80), 79);
        assert_eq!(percent_to_x(50.0, 81), 40);
        assert_eq!(percent_to_x(50.0, 0), 0);
    }

    #[test]
    fn truncation_keeps_width_and_marks_the_cut() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long title", 8), "a very …");
    }

    #[test]
    fn valence_renders_with_explicit_sign() {
        assert_eq!(format_valence(4), "+4");
        assert_eq!(format_valence(-3), "-3");
    }
}
