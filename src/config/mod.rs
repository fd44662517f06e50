use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::config::themes::{ThemeName, ThemeRegistry};
use crate::timeline;

pub mod themes;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "LifeTracer";
const APP_NAME: &str = "lifetrace";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(&self.paths)?;
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths)?;
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub state_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("LIFETRACE_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("LIFETRACE_DATA").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let database_path = data_root.join("lifetrace.db");

        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_root.join("state"));
        let log_dir = state_dir.join("logs");

        Ok(Self {
            config_dir,
            config_file,
            data_dir: data_root,
            database_path,
            state_dir,
            log_dir,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.state_dir,
            &self.log_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub theme: ThemeName,
    /// Lines of description shown on the detail card.
    pub preview_lines: u16,
    pub timeline: TimelineOptions,
    pub storage: StorageOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            theme: ThemeName::Dark,
            preview_lines: 3,
            timeline: TimelineOptions::default(),
            storage: StorageOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.storage
            .resolve(paths)
            .context("resolving storage paths")?;
        if !ThemeRegistry::default().contains(&self.theme) {
            tracing::warn!(?self.theme, "unknown theme in config, falling back to Dark");
            self.theme = ThemeName::Dark;
        }
        self.timeline.normalize();
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineOptions {
    /// Starting zoom for the per-category view, in pixels per year.
    pub pixels_per_year: u32,
    /// Width of a global-view band, in years.
    pub band_years: i32,
}

impl Default for TimelineOptions {
    fn default() -> Self {
        Self {
            pixels_per_year: 100,
            band_years: timeline::BAND_YEARS,
        }
    }
}

impl TimelineOptions {
    fn normalize(&mut self) {
        let clamped = timeline::clamp_zoom(self.pixels_per_year);
        if clamped != self.pixels_per_year {
            tracing::warn!(
                configured = self.pixels_per_year,
                clamped,
                "pixels_per_year outside supported range"
            );
            self.pixels_per_year = clamped;
        }
        if self.band_years <= 0 {
            tracing::warn!(
                configured = self.band_years,
                "band_years must be positive, using default"
            );
            self.band_years = timeline::BAND_YEARS;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub database_path: PathBuf,
    pub wal_autocheckpoint: u32,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
            wal_autocheckpoint: 1000,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            self.database_path = paths.database_path.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_options_clamp_out_of_range_zoom() {
        let mut options = TimelineOptions {
            pixels_per_year: 9,
            band_years: 25,
        };
        options.normalize();
        assert_eq!(options.pixels_per_year, timeline::MIN_PIXELS_PER_YEAR);

        options.pixels_per_year = 1_000_000;
        options.normalize();
        assert_eq!(options.pixels_per_year, timeline::MAX_PIXELS_PER_YEAR);
    }

    #[test]
    fn timeline_options_reject_nonpositive_band_width() {
        let mut options = TimelineOptions {
            pixels_per_year: 100,
            band_years: 0,
        };
        options.normalize();
        assert_eq!(options.band_years, timeline::BAND_YEARS);
    }
}
