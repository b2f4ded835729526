// Static configuration: dataset windows, variable definitions, overlay
// modes, and the suitability class intervals. These are data, not behavior;
// they are built once at startup and only ever read through the keyed
// lookup helpers below.
use once_cell::sync::Lazy;

use crate::error::{AppError, Result};

/// One selectable dataset window: a label plus the CSV it resolves to.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub key: &'static str,
    pub label: &'static str,
    pub file_name: &'static str,
    pub description: &'static str,
}

pub static DATASETS: Lazy<Vec<Dataset>> = Lazy::new(|| {
    vec![
        Dataset {
            key: "full",
            label: "2018-2024 (Full History)",
            file_name: "weekly_spatial_full_history.csv",
            description: "All available historical data. Best for long-term patterns.",
        },
        Dataset {
            key: "last4y",
            label: "2021-2024 (Last 4 Years)",
            file_name: "weekly_spatial_last4y.csv",
            description: "Recent multi-year view. Balances recency and stability.",
        },
        Dataset {
            key: "2024",
            label: "2024 Only",
            file_name: "weekly_spatial_2024.csv",
            description: "Single-year view. Best for short-term planning and validation.",
        },
    ]
});

pub const DEFAULT_DATASET_KEY: &str = "full";

/// Overlay modes the heatmap preview understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    None,
    Value,
    Rank,
    Winner,
}

impl Overlay {
    pub fn key(self) -> &'static str {
        match self {
            Overlay::None => "none",
            Overlay::Value => "value",
            Overlay::Rank => "rank",
            Overlay::Winner => "winner",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Overlay::None),
            "value" => Ok(Overlay::Value),
            "rank" => Ok(Overlay::Rank),
            "winner" => Ok(Overlay::Winner),
            other => Err(AppError::config(
                "overlay",
                other,
                ["none", "value", "rank", "winner"],
            )),
        }
    }
}

/// One plottable variable: which measure column it reads, how it is
/// labelled, its display range, and which overlays make sense for it.
#[derive(Debug, Clone)]
pub struct Variable {
    pub key: &'static str,
    pub column: &'static str,
    /// Name for the dense-rank column `rank_by_week` writes, when the
    /// variable is rankable at all.
    pub rank_column: Option<&'static str>,
    pub label: &'static str,
    pub unit: Option<&'static str>,
    pub decimals: usize,
    pub vmin: f64,
    pub vmax: f64,
    pub allow_value_overlay: bool,
    pub allow_rank_overlay: bool,
    pub allow_winner_strip: bool,
    pub default_overlay: Overlay,
}

impl Variable {
    /// Overlay choices permitted for this variable, in menu order.
    pub fn allowed_overlays(&self) -> Vec<Overlay> {
        let mut out = vec![Overlay::None];
        if self.allow_value_overlay {
            out.push(Overlay::Value);
        }
        if self.allow_rank_overlay {
            out.push(Overlay::Rank);
        }
        if self.allow_winner_strip {
            out.push(Overlay::Winner);
        }
        out
    }

    /// The configured default, demoted to `none` if the flags exclude it.
    pub fn effective_default_overlay(&self) -> Overlay {
        let allowed = self.allowed_overlays();
        if allowed.contains(&self.default_overlay) {
            self.default_overlay
        } else {
            Overlay::None
        }
    }
}

pub static VARIABLES: Lazy<Vec<Variable>> = Lazy::new(|| {
    vec![
        Variable {
            key: "suitability",
            column: "pct_viability",
            rank_column: Some("suitability_rank"),
            label: "Overall Suitability",
            unit: None,
            decimals: 2,
            vmin: 0.0,
            vmax: 1.0,
            allow_value_overlay: false,
            allow_rank_overlay: true,
            allow_winner_strip: true,
            default_overlay: Overlay::Winner,
        },
        Variable {
            key: "suitability_temp",
            column: "pct_t2m_08_18",
            rank_column: Some("suitability_temp_rank"),
            label: "Temperature Suitability",
            unit: None,
            decimals: 2,
            vmin: 0.0,
            vmax: 1.0,
            allow_value_overlay: false,
            allow_rank_overlay: true,
            allow_winner_strip: true,
            default_overlay: Overlay::Rank,
        },
        Variable {
            key: "suitability_humidity",
            column: "pct_rh_08_18",
            rank_column: Some("suitability_rh_rank"),
            label: "Humidity Suitability",
            unit: None,
            decimals: 2,
            vmin: 0.0,
            vmax: 1.0,
            allow_value_overlay: false,
            allow_rank_overlay: true,
            allow_winner_strip: true,
            default_overlay: Overlay::Rank,
        },
        Variable {
            key: "suitability_wind",
            column: "pct_wind_max",
            rank_column: Some("suitability_wind_rank"),
            label: "Wind Suitability",
            unit: None,
            decimals: 2,
            vmin: 0.0,
            vmax: 1.0,
            allow_value_overlay: false,
            allow_rank_overlay: true,
            allow_winner_strip: true,
            default_overlay: Overlay::Rank,
        },
        Variable {
            key: "temperature_mean",
            column: "t2m_mean_08_18",
            rank_column: None,
            label: "Mean Temperature",
            unit: Some("degC"),
            decimals: 1,
            vmin: 0.0,
            vmax: 35.0,
            allow_value_overlay: true,
            allow_rank_overlay: false,
            allow_winner_strip: false,
            default_overlay: Overlay::Value,
        },
        Variable {
            key: "temperature_absmin",
            column: "t2m_absmin_08_18",
            rank_column: None,
            label: "Absolute Minimum Temperature",
            unit: Some("degC"),
            decimals: 1,
            vmin: -30.0,
            vmax: 20.0,
            allow_value_overlay: true,
            allow_rank_overlay: false,
            allow_winner_strip: false,
            default_overlay: Overlay::Value,
        },
        Variable {
            key: "temperature_absmax",
            column: "t2m_absmax_08_18",
            rank_column: None,
            label: "Absolute Maximum Temperature",
            unit: Some("degC"),
            decimals: 1,
            vmin: 20.0,
            vmax: 45.0,
            allow_value_overlay: true,
            allow_rank_overlay: false,
            allow_winner_strip: false,
            default_overlay: Overlay::Value,
        },
        Variable {
            key: "humidity_mean",
            column: "rh_mean_08_18",
            rank_column: None,
            label: "Mean Humidity",
            unit: Some("%"),
            decimals: 0,
            vmin: 40.0,
            vmax: 100.0,
            allow_value_overlay: true,
            allow_rank_overlay: false,
            allow_winner_strip: false,
            default_overlay: Overlay::Value,
        },
        Variable {
            key: "humidity_absmax",
            column: "rh_absmax_08_18",
            rank_column: None,
            label: "Maximum Humidity",
            unit: Some("%"),
            decimals: 0,
            vmin: 60.0,
            vmax: 100.0,
            allow_value_overlay: true,
            allow_rank_overlay: false,
            allow_winner_strip: false,
            default_overlay: Overlay::Value,
        },
        Variable {
            key: "wind_mean",
            column: "wind_mean",
            rank_column: None,
            label: "Mean Wind Speed",
            unit: Some("m/s"),
            decimals: 1,
            vmin: 0.0,
            vmax: 12.0,
            allow_value_overlay: true,
            allow_rank_overlay: false,
            allow_winner_strip: false,
            default_overlay: Overlay::Value,
        },
        Variable {
            key: "wind_absmax",
            column: "wind_absmax",
            rank_column: None,
            label: "Maximum Wind Speed",
            unit: Some("m/s"),
            decimals: 1,
            vmin: 0.0,
            vmax: 25.0,
            allow_value_overlay: true,
            allow_rank_overlay: false,
            allow_winner_strip: false,
            default_overlay: Overlay::Value,
        },
    ]
});

pub const DEFAULT_VARIABLE_KEY: &str = "suitability";

/// Half-open `[min, max)` suitability band with its map styling.
#[derive(Debug, Clone)]
pub struct SuitabilityClass {
    pub min: f64,
    pub max: f64,
    pub label: &'static str,
    pub color: &'static str,
    pub marker_size: u32,
}

// The top bound sits just above 1.0 so an exact 1.0 still classifies while
// every interval stays half-open.
pub static SUITABILITY_CLASSES: Lazy<Vec<SuitabilityClass>> = Lazy::new(|| {
    vec![
        SuitabilityClass {
            min: 0.0,
            max: 0.25,
            label: "Poor",
            color: "#d73027",
            marker_size: 6,
        },
        SuitabilityClass {
            min: 0.25,
            max: 0.50,
            label: "Marginal",
            color: "#fdae61",
            marker_size: 8,
        },
        SuitabilityClass {
            min: 0.50,
            max: 0.75,
            label: "Good",
            color: "#a6d96a",
            marker_size: 11,
        },
        SuitabilityClass {
            min: 0.75,
            max: 1.01,
            label: "Excellent",
            color: "#1a9850",
            marker_size: 14,
        },
    ]
});

pub fn dataset(key: &str) -> Result<&'static Dataset> {
    DATASETS.iter().find(|d| d.key == key).ok_or_else(|| {
        AppError::config("dataset window", key, DATASETS.iter().map(|d| d.key))
    })
}

pub fn variable(key: &str) -> Result<&'static Variable> {
    VARIABLES.iter().find(|v| v.key == key).ok_or_else(|| {
        AppError::config("variable", key, VARIABLES.iter().map(|v| v.key))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn known_keys_resolve() {
        assert_eq!(dataset("full").unwrap().file_name, "weekly_spatial_full_history.csv");
        assert_eq!(variable("suitability").unwrap().column, "pct_viability");
        assert!(dataset(DEFAULT_DATASET_KEY).is_ok());
        assert!(variable(DEFAULT_VARIABLE_KEY).is_ok());
    }

    #[test]
    fn unknown_dataset_lists_accepted_keys() {
        match dataset("last9y") {
            Err(AppError::Config { value, accepted, .. }) => {
                assert_eq!(value, "last9y");
                assert!(accepted.contains("full"));
                assert!(accepted.contains("2024"));
            }
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn unknown_variable_is_config_error() {
        assert!(matches!(variable("rainfall"), Err(AppError::Config { .. })));
    }

    #[test]
    fn registry_covers_the_worst_case_variables() {
        // The absolute min/max variables are value-overlay-only and carry
        // their own display ranges.
        for (key, column, vmin, vmax) in [
            ("temperature_absmin", "t2m_absmin_08_18", -30.0, 20.0),
            ("temperature_absmax", "t2m_absmax_08_18", 20.0, 45.0),
            ("humidity_absmax", "rh_absmax_08_18", 60.0, 100.0),
            ("wind_absmax", "wind_absmax", 0.0, 25.0),
        ] {
            let var = variable(key).unwrap();
            assert_eq!(var.column, column);
            assert_eq!(var.vmin, vmin);
            assert_eq!(var.vmax, vmax);
            assert!(var.allow_value_overlay);
            assert!(!var.allow_rank_overlay);
            assert!(!var.allow_winner_strip);
            assert_eq!(var.rank_column, None);
            assert_eq!(var.effective_default_overlay(), Overlay::Value);
        }
        assert_eq!(VARIABLES.len(), 11);
    }

    #[test]
    fn overlay_parse_round_trips() {
        for key in ["none", "value", "rank", "winner"] {
            assert_eq!(Overlay::parse(key).unwrap().key(), key);
        }
        assert!(matches!(Overlay::parse("sparkline"), Err(AppError::Config { .. })));
    }

    #[test]
    fn default_overlays_are_always_permitted() {
        for var in VARIABLES.iter() {
            let allowed = var.allowed_overlays();
            assert!(allowed.contains(&var.effective_default_overlay()), "{}", var.key);
        }
    }

    #[test]
    fn class_intervals_are_ordered_and_contiguous() {
        let classes = &*SUITABILITY_CLASSES;
        for pair in classes.windows(2) {
            assert!(pair[0].max <= pair[1].min + 1e-12);
        }
        assert!(classes.first().unwrap().min == 0.0);
        assert!(classes.last().unwrap().max > 1.0);
    }
}
