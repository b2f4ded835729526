use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::{AppError, Result};

/// One row of the authoritative site dimension table.
#[derive(Debug, Clone)]
pub struct Site {
    pub site_id: String,
    pub site_name: String,
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// One long-format observation: a single site/week fact carrying every
/// numeric measure column the source file provided. Site metadata is always
/// the joined dimension-table copy, never the CSV's own columns.
#[derive(Debug, Clone)]
pub struct Observation {
    pub site_id: String,
    pub site_name: String,
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
    pub week_bin: i32,
    /// Parsed numeric measures keyed by normalized column name. A missing
    /// or unparseable cell is simply absent.
    pub measures: BTreeMap<String, f64>,
}

impl Observation {
    pub fn measure(&self, column: &str) -> Option<f64> {
        self.measures.get(column).copied()
    }
}

/// The validated long table the pipeline operates on.
///
/// `measure_columns` is the set of numeric columns declared by the file
/// header; schema checks consult it so that a column that exists but is
/// empty for every row is still "present".
#[derive(Debug, Clone, Default)]
pub struct WeeklyTable {
    pub rows: Vec<Observation>,
    pub measure_columns: BTreeSet<String>,
}

impl WeeklyTable {
    pub fn require_column(&self, column: &str) -> Result<()> {
        if self.measure_columns.contains(column) {
            Ok(())
        } else {
            Err(AppError::schema("weekly table", column))
        }
    }

    /// Distinct site names, ascending.
    pub fn site_names(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.rows.iter().map(|r| r.site_name.as_str()).collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Distinct week bins, ascending.
    pub fn week_bins(&self) -> Vec<i32> {
        let set: BTreeSet<i32> = self.rows.iter().map(|r| r.week_bin).collect();
        set.into_iter().collect()
    }
}

/// Dense site × week grid. Rows are site names (ascending), columns are
/// week bins (ascending); both axes cover every label present in the source
/// table even when a whole row or column is missing.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteWeekGrid<T> {
    sites: Vec<String>,
    weeks: Vec<i32>,
    cells: Vec<Option<T>>,
}

/// The value matrix the heatmap renders.
pub type Matrix = SiteWeekGrid<f64>;

/// Per-week ranks; same shape as the matrix it was derived from.
pub type RankMatrix = SiteWeekGrid<u32>;

impl<T: Copy> SiteWeekGrid<T> {
    pub fn new(sites: Vec<String>, weeks: Vec<i32>) -> Self {
        let cells = vec![None; sites.len() * weeks.len()];
        SiteWeekGrid {
            sites,
            weeks,
            cells,
        }
    }

    pub fn sites(&self) -> &[String] {
        &self.sites
    }

    pub fn weeks(&self) -> &[i32] {
        &self.weeks
    }

    pub fn n_rows(&self) -> usize {
        self.sites.len()
    }

    pub fn n_cols(&self) -> usize {
        self.weeks.len()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        self.cells[row * self.weeks.len() + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: Option<T>) {
        self.cells[row * self.weeks.len() + col] = value;
    }

    /// One column, top to bottom, missing cells included.
    pub fn column(&self, col: usize) -> Vec<Option<T>> {
        (0..self.sites.len()).map(|r| self.get(r, col)).collect()
    }

    /// Flatten back to (site, week, value) triples, dropping missing cells.
    pub fn flatten(&self) -> Vec<(String, i32, T)> {
        let mut out = Vec::new();
        for (r, site) in self.sites.iter().enumerate() {
            for (c, week) in self.weeks.iter().enumerate() {
                if let Some(v) = self.get(r, c) {
                    out.push((site.clone(), *week, v));
                }
            }
        }
        out
    }
}

/// Per-site mean over a week subset; `mean` is `None` when no row in the
/// selection carried a value for the site.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteSummary {
    pub site_name: String,
    pub mean: Option<f64>,
    pub weeks: usize,
}

/// Supported de-duplicating aggregations for `aggregate_site_week`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Mean,
    Median,
    Max,
    Min,
}

impl Aggregate {
    pub const ACCEPTED: [&'static str; 4] = ["mean", "median", "max", "min"];

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(Aggregate::Mean),
            "median" => Ok(Aggregate::Median),
            "max" => Ok(Aggregate::Max),
            "min" => Ok(Aggregate::Min),
            other => Err(AppError::config("aggregation", other, Self::ACCEPTED)),
        }
    }
}

/// One classified site for the single-week map view.
#[derive(Debug, Clone, Serialize)]
pub struct MapPoint {
    pub site: String,
    pub state: String,
    pub lat: f64,
    pub lon: f64,
    pub value: f64,
    pub label: &'static str,
    pub color: &'static str,
    pub size: u32,
}

/// Headline numbers written next to the prioritisation export.
#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub total_sites: usize,
    pub total_weeks: usize,
    pub sites_with_values: usize,
    pub best_site: Option<String>,
    pub best_mean: Option<f64>,
}
