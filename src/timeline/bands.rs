use std::collections::HashSet;

use time::Date;

use crate::model::{Category, LifeEvent};

use super::{is_visible, live_category_ids};

/// Global view: the full date range folded into fixed-width year bands,
/// alternating flow direction so each row continues where the last ended.
#[derive(Debug)]
pub enum GlobalView<'a> {
    Empty,
    Ready(GlobalLayout<'a>),
}

#[derive(Debug)]
pub struct GlobalLayout<'a> {
    pub bands: Vec<Band<'a>>,
}

#[derive(Debug)]
pub struct Band<'a> {
    pub index: usize,
    pub start_year: i32,
    /// Exclusive.
    pub end_year: i32,
    pub is_reverse: bool,
    pub markers: Vec<YearMarker>,
    pub events: Vec<BandEvent<'a>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearMarker {
    pub year: i32,
    /// Display position within the band, already flipped on reversed rows.
    pub percent: f64,
    pub tier: MarkerTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerTier {
    Edge,
    FiveYear,
    Year,
}

#[derive(Debug)]
pub struct BandEvent<'a> {
    pub event: &'a LifeEvent,
    pub percent: f64,
}

/// Partitions the full event range into `band_years`-wide rows and places
/// the selected events inside them. Bands are computed over the whole set
/// so toggling filters never reshuffles the rows; the filter only decides
/// which events land on them.
pub fn build<'a>(
    events: &'a [LifeEvent],
    categories: &[Category],
    selected: &HashSet<i64>,
    band_years: i32,
) -> GlobalView<'a> {
    let live = live_category_ids(categories);
    if !events.iter().any(|event| is_visible(event, &live)) {
        return GlobalView::Empty;
    }

    let start_year = events.iter().map(LifeEvent::year).min().unwrap_or(0);
    let last_year = events.iter().map(LifeEvent::year).max().unwrap_or(0);
    let span = (last_year + 1) - start_year;
    let row_count = ((span + band_years - 1) / band_years).max(1) as usize;

    let bands = (0..row_count)
        .map(|index| {
            let band_start = start_year + index as i32 * band_years;
            let band_end = start_year + (index as i32 + 1) * band_years;
            let is_reverse = index % 2 != 0;

            let mut placed: Vec<BandEvent<'a>> = events
                .iter()
                .filter(|event| {
                    let year = event.year();
                    year >= band_start && year < band_end
                })
                .filter(|event| match event.category_id {
                    Some(id) => live.contains(&id) && selected.contains(&id),
                    None => false,
                })
                .map(|event| BandEvent {
                    event,
                    percent: position_percent(event.date, band_start, is_reverse, band_years),
                })
                .collect();
            placed.sort_by_key(|band_event| (band_event.event.date, band_event.event.id));

            Band {
                index,
                start_year: band_start,
                end_year: band_end,
                is_reverse,
                markers: year_markers(band_start, is_reverse, band_years),
                events: placed,
            }
        })
        .collect();

    GlobalView::Ready(GlobalLayout { bands })
}

/// Horizontal position of a date inside its band, as a percentage of the
/// band width. Reversed rows flip the axis. The clamp only absorbs
/// floating-point error at the exact band edges; membership is decided by
/// year bucketing, never here.
pub fn position_percent(date: Date, band_start_year: i32, is_reverse: bool, band_years: i32) -> f64 {
    let relative = precise_year(date) - f64::from(band_start_year);
    let mut percent = relative * (100.0 / f64::from(band_years));
    if is_reverse {
        percent = 100.0 - percent;
    }
    percent.clamp(0.0, 100.0)
}

/// Fractional year with exact sub-year placement: Jan 1 is `year.0`, and
/// the fraction accounts for the actual length of that specific year.
pub fn precise_year(date: Date) -> f64 {
    let days_in_year = f64::from(time::util::days_in_year(date.year()));
    f64::from(date.year()) + f64::from(date.ordinal() - 1) / days_in_year
}

fn year_markers(band_start: i32, is_reverse: bool, band_years: i32) -> Vec<YearMarker> {
    (0..=band_years)
        .map(|step| {
            let raw = f64::from(step) / f64::from(band_years) * 100.0;
            let percent = if is_reverse { 100.0 - raw } else { raw };
            let tier = if step == 0 || step == band_years {
                MarkerTier::Edge
            } else if step % 5 == 0 {
                MarkerTier::FiveYear
            } else {
                MarkerTier::Year
            };
            YearMarker {
                year: band_start + step,
                percent,
                tier,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use time::macros::date;

    use super::*;
    use crate::timeline::testutil::{category, event};
    use crate::timeline::BAND_YEARS;

    fn approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn all_selected(categories: &[crate::model::Category]) -> HashSet<i64> {
        categories.iter().map(|category| category.id).collect()
    }

    #[test]
    fn no_visible_events_yields_empty_view() {
        let categories = vec![category(1, "Travel")];
        let selected = all_selected(&categories);
        assert_matches!(
            build(&[], &categories, &selected, BAND_YEARS),
            GlobalView::Empty
        );

        let dangling = vec![event(1, date!(2020 - 01 - 01), None)];
        assert_matches!(
            build(&dangling, &categories, &selected, BAND_YEARS),
            GlobalView::Empty
        );
    }

    #[test]
    fn thirty_one_year_span_partitions_into_two_bands() {
        let categories = vec![category(1, "Travel")];
        let selected = all_selected(&categories);
        let events = vec![
            event(1, date!(2000 - 07 - 01), Some(1)),
            event(2, date!(2030 - 02 - 01), Some(1)),
        ];
        let layout = match build(&events, &categories, &selected, BAND_YEARS) {
            GlobalView::Ready(layout) => layout,
            other => panic!("expected layout, got {other:?}"),
        };

        assert_eq!(layout.bands.len(), 2);
        assert_eq!(layout.bands[0].start_year, 2000);
        assert_eq!(layout.bands[0].end_year, 2025);
        assert!(!layout.bands[0].is_reverse);
        assert_eq!(layout.bands[1].start_year, 2025);
        assert_eq!(layout.bands[1].end_year, 2050);
        assert!(layout.bands[1].is_reverse);

        assert_eq!(layout.bands[0].events.len(), 1);
        assert_eq!(layout.bands[0].events[0].event.id, 1);
        assert_eq!(layout.bands[1].events.len(), 1);
        assert_eq!(layout.bands[1].events[0].event.id, 2);
    }

    #[test]
    fn band_count_is_minimal_for_the_span() {
        let categories = vec![category(1, "Travel")];
        let selected = all_selected(&categories);
        for (first, last) in [(2000, 2000), (2000, 2024), (2000, 2025), (1950, 2049)] {
            let events = vec![
                event(1, Date::from_ordinal_date(first, 1).unwrap(), Some(1)),
                event(2, Date::from_ordinal_date(last, 1).unwrap(), Some(1)),
            ];
            let layout = match build(&events, &categories, &selected, BAND_YEARS) {
                GlobalView::Ready(layout) => layout,
                other => panic!("expected layout, got {other:?}"),
            };
            let span = (last + 1) - first;
            let rows = layout.bands.len() as i32;
            assert!(rows * BAND_YEARS >= span, "{first}..{last}");
            assert!((rows - 1) * BAND_YEARS < span, "{first}..{last}");
        }
    }

    #[test]
    fn serpentine_endpoints_invert_on_reversed_rows() {
        approx(position_percent(date!(2000 - 01 - 01), 2000, false, 25), 0.0);
        approx(
            position_percent(date!(2025 - 01 - 01), 2000, false, 25),
            100.0
        );
        approx(
            position_percent(date!(2000 - 01 - 01), 2000, true, 25),
            100.0
        );
        approx(position_percent(date!(2025 - 01 - 01), 2000, true, 25), 0.0);
    }

    #[test]
    fn in_band_ordering_matches_flow_direction() {
        let early = position_percent(date!(2005 - 06 - 01), 2000, false, 25);
        let late = position_percent(date!(2020 - 06 - 01), 2000, false, 25);
        assert!(early < late);

        let early_rev = position_percent(date!(2005 - 06 - 01), 2000, true, 25);
        let late_rev = position_percent(date!(2020 - 06 - 01), 2000, true, 25);
        assert!(early_rev > late_rev);
    }

    #[test]
    fn precise_year_is_leap_aware() {
        // Mid-year in a leap year: 166 days elapsed out of 366.
        approx(
            precise_year(date!(2020 - 06 - 15)),
            2020.0 + 166.0 / 366.0
        );
        approx(precise_year(date!(2021 - 01 - 01)), 2021.0);
        approx(
            precise_year(date!(2021 - 12 - 31)),
            2021.0 + 364.0 / 365.0
        );
    }

    #[test]
    fn filter_decides_membership_but_not_band_shape() {
        let categories = vec![category(1, "Travel"), category(2, "Work")];
        let events = vec![
            event(1, date!(2000 - 07 - 01), Some(1)),
            event(2, date!(2030 - 02 - 01), Some(2)),
        ];

        let mut selected: HashSet<i64> = [1].into_iter().collect();
        let layout = match build(&events, &categories, &selected, BAND_YEARS) {
            GlobalView::Ready(layout) => layout,
            other => panic!("expected layout, got {other:?}"),
        };
        // Both bands still exist even though only band 0 has a selected event.
        assert_eq!(layout.bands.len(), 2);
        assert_eq!(layout.bands[0].events.len(), 1);
        assert!(layout.bands[1].events.is_empty());

        selected.insert(2);
        let layout = match build(&events, &categories, &selected, BAND_YEARS) {
            GlobalView::Ready(layout) => layout,
            other => panic!("expected layout, got {other:?}"),
        };
        assert_eq!(layout.bands[1].events.len(), 1);
    }

    #[test]
    fn year_markers_flip_with_the_row_and_tier_correctly() {
        let forward = year_markers(2000, false, 25);
        assert_eq!(forward.len(), 26);
        assert_eq!(forward[0].year, 2000);
        approx(forward[0].percent, 0.0);
        assert_eq!(forward[0].tier, MarkerTier::Edge);
        assert_eq!(forward[5].tier, MarkerTier::FiveYear);
        assert_eq!(forward[3].tier, MarkerTier::Year);
        assert_eq!(forward[25].tier, MarkerTier::Edge);
        approx(forward[25].percent, 100.0);

        let reversed = year_markers(2000, true, 25);
        approx(reversed[0].percent, 100.0);
        approx(reversed[25].percent, 0.0);
    }
}
