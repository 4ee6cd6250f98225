use std::path::PathBuf;

use serde::Deserialize;

pub const MAX_RECENT_EXPENSES: usize = 100;

/// Application settings read from Rocket's figment (`Rocket.toml`, `ROCKET_*`).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// How many of the month's expenses the dashboard lists when the
    /// request does not say.
    #[serde(default = "default_recent_expenses")]
    pub recent_expenses: usize,
    /// TrueType font embedded into PDF reports. It must have a glyph for the
    /// currency symbol; the builtin Helvetica used without one does not.
    #[serde(default = "default_pdf_font")]
    pub pdf_font: Option<PathBuf>,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data").join("budget.sqlite")
}

fn default_recent_expenses() -> usize {
    10
}

fn default_pdf_font() -> Option<PathBuf> {
    Some(PathBuf::from("fonts").join("DejaVuSans.ttf"))
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: default_database_path(),
            recent_expenses: default_recent_expenses(),
            pdf_font: default_pdf_font(),
        }
    }
}

impl AppConfig {
    /// Resolves the `recent` query parameter, falling back to the configured
    /// default for missing or malformed values.
    pub fn recent_limit(&self, requested: Option<&str>) -> usize {
        requested
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(self.recent_expenses)
            .clamp(1, MAX_RECENT_EXPENSES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_limit_falls_back_and_clamps() {
        let config = AppConfig::default();
        assert_eq!(config.recent_limit(None), 10);
        assert_eq!(config.recent_limit(Some("abc")), 10);
        assert_eq!(config.recent_limit(Some("3")), 3);
        assert_eq!(config.recent_limit(Some("0")), 1);
        assert_eq!(config.recent_limit(Some("5000")), MAX_RECENT_EXPENSES);
    }

    #[test]
    fn missing_keys_use_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.database_path, PathBuf::from("data").join("budget.sqlite"));
        assert_eq!(config.recent_expenses, 10);
        assert_eq!(config.pdf_font, Some(PathBuf::from("fonts").join("DejaVuSans.ttf")));
    }
}
