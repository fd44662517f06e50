use std::collections::HashSet;

use crate::model::{Category, LifeEvent};

pub mod bands;
pub mod linear;

/// Vertical padding above the first ruler year, in pixels.
pub const TOP_PADDING: f64 = 50.0;

/// Width of a global-view band, in years.
pub const BAND_YEARS: i32 = 25;

pub const MIN_PIXELS_PER_YEAR: u32 = 100;
pub const MAX_PIXELS_PER_YEAR: u32 = 4000;

pub fn clamp_zoom(pixels_per_year: u32) -> u32 {
    pixels_per_year.clamp(MIN_PIXELS_PER_YEAR, MAX_PIXELS_PER_YEAR)
}

/// Ids of the categories that currently exist. Events referencing anything
/// else are treated as uncategorized by every positional view.
pub fn live_category_ids(categories: &[Category]) -> HashSet<i64> {
    categories.iter().map(|category| category.id).collect()
}

pub fn is_visible(event: &LifeEvent, live: &HashSet<i64>) -> bool {
    event
        .category_id
        .map(|id| live.contains(&id))
        .unwrap_or(false)
}

#[cfg(test)]
pub(crate) mod testutil {
    use time::Date;

    use crate::model::{Category, CategoryColor, LifeEvent};

    pub fn category(id: i64, name: &str) -> Category {
        Category {
            id,
            name: name.to_string(),
            color: CategoryColor::Indigo,
            icon: None,
            created_at: id,
        }
    }

    pub fn event(id: i64, date: Date, category_id: Option<i64>) -> LifeEvent {
        LifeEvent {
            id,
            date,
            end_date: None,
            title: format!("event {id}"),
            description: None,
            location: None,
            people: Vec::new(),
            category_id,
            is_important: false,
            emotional_valence: None,
            is_current: false,
            created_at: 0,
            updated_at: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testutil::{category, event};
    use time::macros::date;

    #[test]
    fn zoom_clamps_to_bounds() {
        assert_eq!(clamp_zoom(10), MIN_PIXELS_PER_YEAR);
        assert_eq!(clamp_zoom(100_000), MAX_PIXELS_PER_YEAR);
        assert_eq!(clamp_zoom(250), 250);
    }

    #[test]
    fn dangling_and_uncategorized_events_are_not_visible() {
        let categories = vec![category(1, "Travel")];
        let live = live_category_ids(&categories);
        assert!(is_visible(&event(1, date!(2020 - 01 - 01), Some(1)), &live));
        assert!(!is_visible(&event(2, date!(2020 - 01 - 01), Some(99)), &live));
        assert!(!is_visible(&event(3, date!(2020 - 01 - 01), None), &live));
    }
}
