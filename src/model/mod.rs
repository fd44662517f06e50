use once_cell::sync::Lazy;
use strum::{Display, EnumIter, IntoEnumIterator};
use thiserror::Error;
use time::format_description::{self, FormatItem};
use time::Date;

pub const MIN_VALENCE: i8 = -5;
pub const MAX_VALENCE: i8 = 5;

const ISO_DATE_FORMAT: &str = "[year]-[month]-[day]";

static DATE_FORMAT: Lazy<Vec<FormatItem<'static>>> = Lazy::new(|| {
    format_description::parse(ISO_DATE_FORMAT).expect("valid date format description")
});

/// Closed palette for category accents. The store persists the lowercase
/// name; anything outside this set is rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum CategoryColor {
    Rose,
    Emerald,
    Blue,
    Amber,
    Cyan,
    Indigo,
}

impl Default for CategoryColor {
    fn default() -> Self {
        CategoryColor::Indigo
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown category color '{input}' (expected one of: {expected})")]
pub struct UnknownColorError {
    pub input: String,
    pub expected: String,
}

impl std::str::FromStr for CategoryColor {
    type Err = UnknownColorError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().to_lowercase();
        for color in CategoryColor::iter() {
            if color.to_string() == wanted {
                return Ok(color);
            }
        }
        Err(UnknownColorError {
            input: raw.trim().to_string(),
            expected: CategoryColor::iter()
                .map(|color| color.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub color: CategoryColor,
    pub icon: Option<String>,
    pub created_at: i64,
}

/// A recorded souvenir. `category_id` is `None` once the owning category
/// has been deleted; such events stay out of every positional view until
/// reassigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifeEvent {
    pub id: i64,
    pub date: Date,
    pub end_date: Option<Date>,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub people: Vec<String>,
    pub category_id: Option<i64>,
    pub is_important: bool,
    pub emotional_valence: Option<i8>,
    pub is_current: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl LifeEvent {
    pub fn year(&self) -> i32 {
        self.date.year()
    }
}

pub fn parse_date(input: &str) -> Result<Date, time::error::Parse> {
    Date::parse(input.trim(), &*DATE_FORMAT)
}

pub fn format_date(date: Date) -> String {
    date.format(&*DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

const FR_MONTHS: [&str; 12] = [
    "janv.", "févr.", "mars", "avr.", "mai", "juin", "juil.", "août", "sept.", "oct.", "nov.",
    "déc.",
];

/// Short display format matching the embedded locale, e.g. `15 juin 2020`.
pub fn format_date_short(date: Date) -> String {
    let month = FR_MONTHS[usize::from(u8::from(date.month())) - 1];
    format!("{} {} {}", date.day(), month, date.year())
}

pub fn clamp_valence(value: i8) -> i8 {
    value.clamp(MIN_VALENCE, MAX_VALENCE)
}

const ICON_GLYPHS: [(&str, &str); 15] = [
    ("heart", "♥"),
    ("briefcase", "🗄"),
    ("globe", "🌐"),
    ("home", "⌂"),
    ("graduation", "🎓"),
    ("dumbbell", "🏋"),
    ("music", "♪"),
    ("camera", "📷"),
    ("star", "★"),
    ("users", "👥"),
    ("leaf", "🍃"),
    ("car", "🚗"),
    ("lightbulb", "💡"),
    ("palette", "🎨"),
    ("coffee", "☕"),
];

/// Glyph for a category icon name; unknown or missing names fall back to
/// the heart, same as the source palette.
pub fn icon_glyph(name: Option<&str>) -> &'static str {
    let Some(name) = name else {
        return "♥";
    };
    ICON_GLYPHS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, glyph)| *glyph)
        .unwrap_or("♥")
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn color_parses_case_insensitively() {
        assert_eq!("Rose".parse::<CategoryColor>(), Ok(CategoryColor::Rose));
        assert_eq!(" emerald ".parse(), Ok(CategoryColor::Emerald));
    }

    #[test]
    fn color_rejects_names_outside_palette() {
        let err = "violet".parse::<CategoryColor>().unwrap_err();
        assert_eq!(err.input, "violet");
        assert!(err.expected.contains("indigo"));
    }

    #[test]
    fn color_display_round_trips() {
        use strum::IntoEnumIterator;
        for color in CategoryColor::iter() {
            assert_eq!(color.to_string().parse::<CategoryColor>(), Ok(color));
        }
    }

    #[test]
    fn dates_parse_and_format_as_iso() {
        let parsed = parse_date("2020-06-15").expect("date");
        assert_eq!(parsed, date!(2020 - 06 - 15));
        assert_eq!(format_date(parsed), "2020-06-15");
    }

    #[test]
    fn malformed_dates_are_rejected() {
        assert!(parse_date("15/06/2020").is_err());
        assert!(parse_date("someday").is_err());
    }

    #[test]
    fn short_format_uses_embedded_locale() {
        assert_eq!(format_date_short(date!(2020 - 06 - 15)), "15 juin 2020");
        assert_eq!(format_date_short(date!(1999 - 01 - 02)), "2 janv. 1999");
    }

    #[test]
    fn valence_clamps_to_range() {
        assert_eq!(clamp_valence(9), MAX_VALENCE);
        assert_eq!(clamp_valence(-9), MIN_VALENCE);
        assert_eq!(clamp_valence(3), 3);
    }

    #[test]
    fn icon_glyph_falls_back_to_heart() {
        assert_eq!(icon_glyph(Some("camera")), "📷");
        assert_eq!(icon_glyph(Some("spaceship")), "♥");
        assert_eq!(icon_glyph(None), "♥");
    }
}
