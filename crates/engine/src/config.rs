//! Search settings loaded from environment variables.

use std::env;

use anyhow::{Context, Result};

/// Unit used for distance search and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    Miles,
    #[default]
    Km,
}

impl DistanceUnit {
    /// Mean earth radius in this unit, used by the haversine expression.
    pub fn earth_radius(self) -> f64 {
        match self {
            DistanceUnit::Miles => 3959.0,
            DistanceUnit::Km => 6371.0,
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "miles" | "mi" => Ok(DistanceUnit::Miles),
            "km" | "kilometers" => Ok(DistanceUnit::Km),
            other => anyhow::bail!("unknown distance unit '{other}' (expected miles or km)"),
        }
    }
}

/// Unit used to display distances that round to zero in the search unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NearUnit {
    Feet,
    #[default]
    Meters,
}

impl NearUnit {
    fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "feet" | "ft" => Ok(NearUnit::Feet),
            "meters" | "m" => Ok(NearUnit::Meters),
            other => anyhow::bail!("unknown near unit '{other}' (expected feet or meters)"),
        }
    }
}

/// Engine-wide search settings.
///
/// Loaded once at startup; treated as immutable afterwards.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Unit for geo radius filtering and distance display.
    pub distance_unit: DistanceUnit,

    /// Unit used when a distance rounds to zero in `distance_unit`.
    pub near_unit: NearUnit,

    /// Default near-me radius applied when a request supplies none.
    pub default_radius: f64,

    /// Keywords with at most this many characters are ignored by
    /// relevance scoring. Zero disables the filter.
    pub word_limit: usize,

    /// When set, malformed numeric/date search input is rejected instead
    /// of being dropped.
    pub strict: bool,

    /// MySQL connection URL for the query executor.
    pub database_url: Option<String>,

    /// Maximum database connections in the executor pool.
    pub database_max_connections: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            distance_unit: DistanceUnit::default(),
            near_unit: NearUnit::default(),
            default_radius: 40.0,
            word_limit: 0,
            strict: false,
            database_url: None,
            database_max_connections: 10,
        }
    }
}

impl SearchSettings {
    /// Load settings from environment variables, reading a `.env` file
    /// first when one is present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let distance_unit = match env::var("SEARCH_DISTANCE_UNIT") {
            Ok(value) => DistanceUnit::parse(&value)?,
            Err(_) => DistanceUnit::default(),
        };

        let near_unit = match env::var("SEARCH_NEAR_UNIT") {
            Ok(value) => NearUnit::parse(&value)?,
            Err(_) => NearUnit::default(),
        };

        let default_radius = env::var("SEARCH_DEFAULT_RADIUS")
            .unwrap_or_else(|_| "40".to_string())
            .parse()
            .context("SEARCH_DEFAULT_RADIUS must be a number")?;

        let word_limit = env::var("SEARCH_WORD_LIMIT")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .context("SEARCH_WORD_LIMIT must be a non-negative integer")?;

        let strict = env::var("SEARCH_STRICT_INPUT")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let database_url = env::var("DATABASE_URL").ok();

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        Ok(Self {
            distance_unit,
            near_unit,
            default_radius,
            word_limit,
            strict,
            database_url,
            database_max_connections,
        })
    }

    /// Effective near-me radius for a request-supplied value.
    ///
    /// Falls back to the configured default, which itself falls back to 40
    /// distance units when unset or non-positive.
    pub fn effective_radius(&self, requested: Option<f64>) -> f64 {
        let radius = match requested {
            Some(r) if r > 0.0 => r,
            _ => self.default_radius,
        };
        if radius > 0.0 { radius } else { 40.0 }
    }

    /// Render a raw distance for display, switching to the near unit when
    /// the value rounds to zero in the search unit.
    pub fn render_distance(&self, raw: f64) -> String {
        let rounded = (raw * 100.0).round() / 100.0;

        if rounded == 0.0 {
            let (multiply, unit) = match self.near_unit {
                NearUnit::Feet => (
                    if self.distance_unit == DistanceUnit::Miles {
                        5280.0
                    } else {
                        3280.84
                    },
                    "feet",
                ),
                NearUnit::Meters => (
                    if self.distance_unit == DistanceUnit::Miles {
                        1609.34
                    } else {
                        1000.0
                    },
                    "meters",
                ),
            };
            format!("{} {unit}", (raw * multiply).round())
        } else {
            let unit = match self.distance_unit {
                DistanceUnit::Miles => "miles",
                DistanceUnit::Km => "km",
            };
            format!("{rounded} {unit}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_radius_fallbacks() {
        let settings = SearchSettings::default();
        assert_eq!(settings.effective_radius(Some(10.0)), 10.0);
        assert_eq!(settings.effective_radius(Some(0.0)), 40.0);
        assert_eq!(settings.effective_radius(None), 40.0);

        let zero_default = SearchSettings {
            default_radius: 0.0,
            ..SearchSettings::default()
        };
        assert_eq!(zero_default.effective_radius(None), 40.0);
    }

    #[test]
    fn earth_radius_per_unit() {
        assert_eq!(DistanceUnit::Miles.earth_radius(), 3959.0);
        assert_eq!(DistanceUnit::Km.earth_radius(), 6371.0);
    }

    #[test]
    fn render_distance_normal() {
        let settings = SearchSettings {
            distance_unit: DistanceUnit::Km,
            ..SearchSettings::default()
        };
        assert_eq!(settings.render_distance(3.456), "3.46 km");
    }

    #[test]
    fn render_distance_near_zero_switches_unit() {
        let settings = SearchSettings {
            distance_unit: DistanceUnit::Km,
            near_unit: NearUnit::Meters,
            ..SearchSettings::default()
        };
        assert_eq!(settings.render_distance(0.0012), "1 meters");

        let imperial = SearchSettings {
            distance_unit: DistanceUnit::Miles,
            near_unit: NearUnit::Feet,
            ..SearchSettings::default()
        };
        assert_eq!(imperial.render_distance(0.001), "5 feet");
    }

    #[test]
    fn unit_parsing() {
        assert_eq!(DistanceUnit::parse("MILES").ok(), Some(DistanceUnit::Miles));
        assert_eq!(DistanceUnit::parse("km").ok(), Some(DistanceUnit::Km));
        assert!(DistanceUnit::parse("leagues").is_err());
        assert_eq!(NearUnit::parse("ft").ok(), Some(NearUnit::Feet));
    }
}
