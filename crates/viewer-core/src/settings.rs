//! Tunables for tolerant citation matching.
//!
//! Settings can be built in code, deserialized from a stored settings file, or overridden
//! from the environment.

use serde::{Deserialize, Serialize};

pub const ENV_THRESHOLD: &str = "BUTTERPAPER_MATCH_THRESHOLD";
pub const ENV_LENGTH_BAND: &str = "BUTTERPAPER_MATCH_LENGTH_BAND";
pub const ENV_MAX_QUERY: &str = "BUTTERPAPER_MATCH_MAX_QUERY";
pub const ENV_CASE_INSENSITIVE: &str = "BUTTERPAPER_MATCH_CASE_INSENSITIVE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    /// Minimum score (1 - edit distance / longer length) a tolerant match must reach.
    pub similarity_threshold: f32,
    /// Allowed deviation of a candidate window's length, as a fraction of the query length.
    pub length_band: f32,
    /// Floor for the absolute length deviation.
    pub min_length_delta: usize,
    /// Longer normalized queries are matched exactly only.
    pub max_fuzzy_query_chars: usize,
    /// Shorter normalized queries are matched exactly only.
    pub min_query_chars: usize,
    pub case_insensitive: bool,
    /// NFKC-fold ligatures and other compatibility characters.
    pub fold_compatibility: bool,
    /// Treat `-` followed by a line break between letters as a hyphenation artifact.
    pub join_line_break_hyphens: bool,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.75,
            length_band: 0.25,
            min_length_delta: 2,
            max_fuzzy_query_chars: 1024,
            min_query_chars: 2,
            case_insensitive: true,
            fold_compatibility: true,
            join_line_break_hyphens: true,
        }
    }
}

impl MatchSettings {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_length_band(mut self, band: f32) -> Self {
        self.length_band = band.max(0.0);
        self
    }

    pub fn with_max_fuzzy_query_chars(mut self, chars: usize) -> Self {
        self.max_fuzzy_query_chars = chars;
        self
    }

    pub fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    pub fn with_compatibility_folding(mut self, fold: bool) -> Self {
        self.fold_compatibility = fold;
        self
    }

    pub fn with_hyphen_joining(mut self, join: bool) -> Self {
        self.join_line_break_hyphens = join;
        self
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::default().apply_env()
    }

    /// Applies any `BUTTERPAPER_MATCH_*` variables on top of `self`.
    pub fn apply_env(mut self) -> Result<Self, SettingsError> {
        if let Ok(value) = std::env::var(ENV_THRESHOLD) {
            let threshold: f32 = parse_env(ENV_THRESHOLD, &value)?;
            if !(0.0..=1.0).contains(&threshold) {
                return Err(SettingsError::InvalidValue(ENV_THRESHOLD.to_owned()));
            }
            self.similarity_threshold = threshold;
        }

        if let Ok(value) = std::env::var(ENV_LENGTH_BAND) {
            let band: f32 = parse_env(ENV_LENGTH_BAND, &value)?;
            if band < 0.0 || !band.is_finite() {
                return Err(SettingsError::InvalidValue(ENV_LENGTH_BAND.to_owned()));
            }
            self.length_band = band;
        }

        if let Ok(value) = std::env::var(ENV_MAX_QUERY) {
            self.max_fuzzy_query_chars = parse_env(ENV_MAX_QUERY, &value)?;
        }

        if let Ok(value) = std::env::var(ENV_CASE_INSENSITIVE) {
            self.case_insensitive = match value.trim() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(SettingsError::InvalidValue(ENV_CASE_INSENSITIVE.to_owned())),
            };
        }

        Ok(self)
    }

    /// Absolute window length deviation allowed for a query of `query_len` chars.
    pub fn length_delta(&self, query_len: usize) -> usize {
        let scaled = (query_len as f32 * self.length_band).ceil() as usize;
        scaled.max(self.min_length_delta)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, SettingsError> {
    value.trim().parse().map_err(|_| SettingsError::InvalidValue(name.to_owned()))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid value for {0}")]
    InvalidValue(String),
}
