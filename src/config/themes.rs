use std::collections::HashSet;

use ratatui::style::Color;
use serde::{Deserialize, Serialize};

use crate::model::CategoryColor;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, std::hash::Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeName {
    Dark,
    Light,
    HighContrast,
}

impl Default for ThemeName {
    fn default() -> Self {
        ThemeName::Dark
    }
}

#[derive(Debug, Clone)]
pub struct ThemeRegistry {
    names: HashSet<ThemeName>,
}

impl ThemeRegistry {
    pub fn contains(&self, theme: &ThemeName) -> bool {
        self.names.contains(theme)
    }

    pub fn all(&self) -> impl Iterator<Item = &ThemeName> {
        self.names.iter()
    }
}

impl Default for ThemeRegistry {
    fn default() -> Self {
        let names = [ThemeName::Dark, ThemeName::Light, ThemeName::HighContrast]
            .into_iter()
            .collect();
        Self { names }
    }
}

/// Terminal chrome colors for a theme. Category accents come from the
/// closed palette below, not from here.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub accent: Color,
    pub dim: Color,
    pub faint: Color,
    pub danger: Color,
    pub highlight_bg: Color,
    pub highlight_fg: Color,
}

impl Theme {
    pub fn for_name(name: &ThemeName) -> Self {
        match name {
            ThemeName::Dark => Theme {
                accent: Color::Cyan,
                dim: Color::Gray,
                faint: Color::DarkGray,
                danger: Color::Red,
                highlight_bg: Color::Blue,
                highlight_fg: Color::Black,
            },
            ThemeName::Light => Theme {
                accent: Color::Blue,
                dim: Color::DarkGray,
                faint: Color::Gray,
                danger: Color::Red,
                highlight_bg: Color::Cyan,
                highlight_fg: Color::Black,
            },
            ThemeName::HighContrast => Theme {
                accent: Color::White,
                dim: Color::White,
                faint: Color::Gray,
                danger: Color::LightRed,
                highlight_bg: Color::White,
                highlight_fg: Color::Black,
            },
        }
    }
}

/// Terminal color for a category accent. The palette is a closed enum so
/// this lookup stays exhaustive under the compiler's eye.
pub fn category_accent(color: CategoryColor) -> Color {
    match color {
        CategoryColor::Rose => Color::LightMagenta,
        CategoryColor::Emerald => Color::Green,
        CategoryColor::Blue => Color::Blue,
        CategoryColor::Amber => Color::Yellow,
        CategoryColor::Cyan => Color::Cyan,
        CategoryColor::Indigo => Color::LightBlue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn registry_knows_every_theme() {
        let registry = ThemeRegistry::default();
        assert!(registry.contains(&ThemeName::Dark));
        assert!(registry.contains(&ThemeName::Light));
        assert!(registry.contains(&ThemeName::HighContrast));
        assert_eq!(registry.all().count(), 3);
    }

    #[test]
    fn every_palette_color_has_a_distinct_accent() {
        let accents: Vec<Color> = CategoryColor::iter().map(category_accent).collect();
        let mut deduped = accents.clone();
        deduped.sort_by_key(|color| format!("{color:?}"));
        deduped.dedup();
        assert_eq!(accents.len(), deduped.len());
    }
}
