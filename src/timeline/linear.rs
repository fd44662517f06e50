use indexmap::IndexMap;
use time::Date;

use crate::model::{Category, LifeEvent};

use super::{is_visible, live_category_ids, TOP_PADDING};

/// Per-category column view, one deterministic vertical offset per event.
///
/// The two empty variants are states the view renders explicitly; a range
/// is never computed over an empty set.
#[derive(Debug)]
pub enum LinearView<'a> {
    NoCategories,
    NoEvents,
    Ready(LinearLayout<'a>),
}

#[derive(Debug)]
pub struct LinearLayout<'a> {
    pub min_year: i32,
    pub years: Vec<YearTick>,
    /// Category id -> column index, in store insertion order. Column 0 is
    /// the first category column; the ruler sits to its left.
    pub columns: IndexMap<i64, usize>,
    pub events: Vec<PlacedEvent<'a>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearTick {
    pub year: i32,
    pub offset: f64,
}

#[derive(Debug)]
pub struct PlacedEvent<'a> {
    pub event: &'a LifeEvent,
    pub column: usize,
    pub offset: f64,
}

/// Lays the event set out on category columns. `events` is the slice the
/// view is scoped to (all events, or one category's); `categories` is the
/// full live list and always defines the columns.
pub fn build<'a>(
    events: &'a [LifeEvent],
    categories: &'a [Category],
    pixels_per_year: u32,
) -> LinearView<'a> {
    if categories.is_empty() {
        return LinearView::NoCategories;
    }

    let live = live_category_ids(categories);
    let mut visible: Vec<&LifeEvent> = events
        .iter()
        .filter(|event| is_visible(event, &live))
        .collect();
    if visible.is_empty() {
        return LinearView::NoEvents;
    }
    visible.sort_by_key(|event| (event.date, event.id));

    let first_year = visible.iter().map(|event| event.year()).min().unwrap_or(0);
    let last_year = visible.iter().map(|event| event.year()).max().unwrap_or(0);

    // One padding year before the earliest event, two after the latest, so
    // the ruler breathes on both ends.
    let min_year = first_year - 1;
    let zoom = f64::from(pixels_per_year);
    let years = (min_year..=last_year + 2)
        .map(|year| YearTick {
            year,
            offset: TOP_PADDING + f64::from(year - min_year) * zoom,
        })
        .collect();

    let columns: IndexMap<i64, usize> = categories
        .iter()
        .enumerate()
        .map(|(index, category)| (category.id, index))
        .collect();

    let events = visible
        .into_iter()
        .filter_map(|event| {
            let column = event.category_id.and_then(|id| columns.get(&id).copied())?;
            Some(PlacedEvent {
                event,
                column,
                offset: event_offset(event.date, min_year, pixels_per_year),
            })
        })
        .collect();

    LinearView::Ready(LinearLayout {
        min_year,
        years,
        columns,
        events,
    })
}

/// Pixel offset for a date: padding plus elapsed days scaled at
/// `pixels_per_year` per 365 days, measured from Jan 1 of `min_year`.
pub fn event_offset(date: Date, min_year: i32, pixels_per_year: u32) -> f64 {
    let origin = jan_first(min_year);
    let elapsed_days = f64::from(date.to_julian_day() - origin.to_julian_day());
    TOP_PADDING + elapsed_days / 365.0 * f64::from(pixels_per_year)
}

fn jan_first(year: i32) -> Date {
    // Input dates are validated at ingestion; the clamp only guards the
    // ±9999 representable range of `time` for the synthetic padding year.
    Date::from_ordinal_date(year.clamp(-9998, 9998), 1).unwrap_or(Date::MIN)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use time::macros::date;

    use super::*;
    use crate::timeline::testutil::{category, event};

    fn approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn no_categories_yields_explicit_state() {
        let events = vec![event(1, date!(2020 - 06 - 15), Some(1))];
        assert_matches!(build(&events, &[], 100), LinearView::NoCategories);
    }

    #[test]
    fn no_visible_events_yields_explicit_state() {
        let categories = vec![category(1, "Travel")];
        assert_matches!(build(&[], &categories, 100), LinearView::NoEvents);

        // Only a dangling event: still the empty state, not a range panic.
        let dangling = vec![event(1, date!(2020 - 06 - 15), Some(42))];
        assert_matches!(build(&dangling, &categories, 100), LinearView::NoEvents);
    }

    #[test]
    fn single_event_offset_matches_exact_arithmetic() {
        let categories = vec![category(1, "Travel")];
        let events = vec![event(1, date!(2020 - 06 - 15), Some(1))];
        let layout = match build(&events, &categories, 100) {
            LinearView::Ready(layout) => layout,
            other => panic!("expected layout, got {other:?}"),
        };

        assert_eq!(layout.min_year, 2019);
        // 365 days of 2019 plus 166 days into the 2020 leap year.
        approx(layout.events[0].offset, 50.0 + 531.0 / 365.0 * 100.0);
    }

    #[test]
    fn ruler_years_pad_one_before_and_two_after() {
        let categories = vec![category(1, "Travel")];
        let events = vec![
            event(1, date!(2005 - 03 - 01), Some(1)),
            event(2, date!(2008 - 11 - 30), Some(1)),
        ];
        let layout = match build(&events, &categories, 100) {
            LinearView::Ready(layout) => layout,
            other => panic!("expected layout, got {other:?}"),
        };

        let years: Vec<i32> = layout.years.iter().map(|tick| tick.year).collect();
        assert_eq!(years, (2004..=2010).collect::<Vec<_>>());
        approx(layout.years[0].offset, 50.0);
        approx(layout.years[1].offset, 150.0);
    }

    #[test]
    fn offsets_are_monotonic_in_date() {
        let categories = vec![category(1, "Travel"), category(2, "Work")];
        let events = vec![
            event(1, date!(2001 - 05 - 05), Some(2)),
            event(2, date!(1999 - 01 - 01), Some(1)),
            event(3, date!(2010 - 12 - 31), Some(1)),
            event(4, date!(2001 - 05 - 05), Some(1)),
        ];
        let layout = match build(&events, &categories, 700) {
            LinearView::Ready(layout) => layout,
            other => panic!("expected layout, got {other:?}"),
        };

        for pair in layout.events.windows(2) {
            assert!(pair[0].event.date <= pair[1].event.date);
            assert!(pair[0].offset <= pair[1].offset + 1e-9);
        }
        // Same-date events share an offset; stacking is the view's concern.
        let same_day: Vec<f64> = layout
            .events
            .iter()
            .filter(|placed| placed.event.date == date!(2001 - 05 - 05))
            .map(|placed| placed.offset)
            .collect();
        assert_eq!(same_day.len(), 2);
        approx(same_day[0], same_day[1]);
    }

    #[test]
    fn offset_deltas_scale_with_zoom() {
        let a = date!(2003 - 02 - 10);
        let b = date!(2007 - 09 - 23);
        let delta_small = event_offset(b, 2002, 100) - event_offset(a, 2002, 100);
        let delta_large = event_offset(b, 2002, 400) - event_offset(a, 2002, 400);
        approx(delta_large / delta_small, 4.0);
    }

    #[test]
    fn columns_follow_category_insertion_order() {
        let categories = vec![category(7, "Travel"), category(3, "Work"), category(9, "Love")];
        let events = vec![event(1, date!(2020 - 01 - 01), Some(3))];
        let layout = match build(&events, &categories, 100) {
            LinearView::Ready(layout) => layout,
            other => panic!("expected layout, got {other:?}"),
        };

        assert_eq!(layout.columns.get(&7), Some(&0));
        assert_eq!(layout.columns.get(&3), Some(&1));
        assert_eq!(layout.columns.get(&9), Some(&2));
        assert_eq!(layout.events[0].column, 1);
    }
}
