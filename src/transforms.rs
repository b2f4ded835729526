// Pure data transformations only.
//
// - Filter rows by week subset
// - Collapse duplicate (site, week) pairs across years
// - Build site x week matrices
// - Normalize values per week
// - Rank sites per week (min tie-break on matrices, dense on the long table)
// - Mean value per site for planning / prioritisation
// - Map a scalar to a suitability class
//
// No visualization logic, no thresholds beyond the class table handed in,
// no I/O. Every function is a pure function of its inputs.
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::config::SuitabilityClass;
use crate::error::{AppError, Result};
use crate::types::{Aggregate, Matrix, RankMatrix, SiteSummary, WeeklyTable};
use crate::util::{mean, median, stddev};

/// Restrict a table to a subset of weeks. `None` keeps every row.
pub fn filter_weeks(table: &WeeklyTable, weeks: Option<&BTreeSet<i32>>) -> WeeklyTable {
    let Some(weeks) = weeks else {
        return table.clone();
    };
    WeeklyTable {
        rows: table
            .rows
            .iter()
            .filter(|r| weeks.contains(&r.week_bin))
            .cloned()
            .collect(),
        measure_columns: table.measure_columns.clone(),
    }
}

/// Collapse duplicate (site, week) pairs for one measure, e.g. when a
/// multi-year file carries one row per year for the same week bin. The
/// output table holds a single row per pair and only `value_col` as its
/// measure, so it is safe to feed into `build_matrix`.
pub fn aggregate_site_week(
    table: &WeeklyTable,
    value_col: &str,
    agg: Aggregate,
) -> Result<WeeklyTable> {
    table.require_column(value_col)?;

    // Group while remembering the first row of each pair for the site
    // metadata carried on the output row.
    let mut order: Vec<(String, i32)> = Vec::new();
    let mut groups: BTreeMap<(String, i32), (usize, Vec<f64>)> = BTreeMap::new();
    for (idx, row) in table.rows.iter().enumerate() {
        let key = (row.site_name.clone(), row.week_bin);
        let entry = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (idx, Vec::new())
        });
        if let Some(v) = row.measure(value_col) {
            entry.1.push(v);
        }
    }

    let mut rows = Vec::with_capacity(order.len());
    for key in order {
        let (first_idx, values) = &groups[&key];
        let aggregated = match agg {
            Aggregate::Mean => mean(values),
            Aggregate::Median => median(values.clone()),
            Aggregate::Max => values.iter().copied().reduce(f64::max),
            Aggregate::Min => values.iter().copied().reduce(f64::min),
        };
        let mut row = table.rows[*first_idx].clone();
        row.measures.clear();
        if let Some(v) = aggregated {
            row.measures.insert(value_col.to_string(), v);
        }
        rows.push(row);
    }

    Ok(WeeklyTable {
        rows,
        measure_columns: BTreeSet::from([value_col.to_string()]),
    })
}

/// Build a site x week matrix WITHOUT dropping sparse sites or weeks.
///
/// The row and column label sets are computed from the whole table before
/// pivoting, so a site (or week) whose `value_col` is missing everywhere
/// still appears as an entirely-missing row (or column).
///
/// A repeated (site, week) pair is an error: the pivot never averages or
/// overwrites. De-duplicate first with [`aggregate_site_week`].
pub fn build_matrix(table: &WeeklyTable, value_col: &str) -> Result<Matrix> {
    table.require_column(value_col)?;

    let sites = table.site_names();
    let weeks = table.week_bins();
    let site_index: BTreeMap<&str, usize> = sites
        .iter()
        .enumerate()
        .map(|(i, s)| (s.as_str(), i))
        .collect();
    let week_index: BTreeMap<i32, usize> = weeks.iter().enumerate().map(|(i, w)| (*w, i)).collect();

    let mut matrix = Matrix::new(sites.clone(), weeks);
    let mut seen: HashSet<(usize, usize)> = HashSet::with_capacity(table.rows.len());
    for row in &table.rows {
        let r = site_index[row.site_name.as_str()];
        let c = week_index[&row.week_bin];
        if !seen.insert((r, c)) {
            return Err(AppError::DuplicateKey {
                site: row.site_name.clone(),
                week: row.week_bin,
            });
        }
        matrix.set(r, c, row.measure(value_col));
    }
    Ok(matrix)
}

/// Normalize values column-wise (per week).
///
/// Methods:
/// - `minmax` : scale to [0, 1]; a constant column has no range, so every
///   cell of that column comes back missing instead of dividing by zero.
/// - `zscore` : standard score using the sample deviation (ddof = 1);
///   columns with fewer than two values or zero deviation come back missing.
pub fn normalize_per_week(matrix: &Matrix, method: &str) -> Result<Matrix> {
    match method {
        "minmax" => Ok(normalize_with(matrix, |values| {
            let min = values.iter().copied().reduce(f64::min)?;
            let max = values.iter().copied().reduce(f64::max)?;
            if max == min {
                None
            } else {
                Some(move |v: f64| (v - min) / (max - min))
            }
        })),
        "zscore" => Ok(normalize_with(matrix, |values| {
            let m = mean(values)?;
            let sd = stddev(values)?;
            if sd == 0.0 {
                None
            } else {
                Some(move |v: f64| (v - m) / sd)
            }
        })),
        other => Err(AppError::config(
            "normalization method",
            other,
            ["minmax", "zscore"],
        )),
    }
}

/// Apply a per-column transform built from that column's present values.
/// A column whose transform cannot be built (degenerate input) becomes
/// entirely missing.
fn normalize_with<F, G>(matrix: &Matrix, make_transform: F) -> Matrix
where
    F: Fn(&[f64]) -> Option<G>,
    G: Fn(f64) -> f64,
{
    let mut out = Matrix::new(matrix.sites().to_vec(), matrix.weeks().to_vec());
    for c in 0..matrix.n_cols() {
        let present: Vec<f64> = matrix.column(c).into_iter().flatten().collect();
        let Some(transform) = make_transform(&present) else {
            continue;
        };
        for r in 0..matrix.n_rows() {
            out.set(r, c, matrix.get(r, c).map(&transform));
        }
    }
    out
}

/// Rank sites per week with the "min" tie-break: equal values share a rank
/// equal to 1 + the count of strictly better values in the column, so a
/// two-way tie for first is followed by rank 3, not 2.
///
/// `ascending = false` means the largest value gets rank 1 (best first).
/// Missing cells stay missing and consume no rank.
pub fn rank_per_week(matrix: &Matrix, ascending: bool) -> RankMatrix {
    let mut out = RankMatrix::new(matrix.sites().to_vec(), matrix.weeks().to_vec());
    for c in 0..matrix.n_cols() {
        let column = matrix.column(c);
        for r in 0..matrix.n_rows() {
            let Some(v) = column[r] else {
                continue;
            };
            let better = column
                .iter()
                .flatten()
                .filter(|&&other| if ascending { other < v } else { other > v })
                .count() as u32;
            out.set(r, c, Some(better + 1));
        }
    }
    out
}

/// Dense-rank sites per week directly on the long table, writing the result
/// into a new integer-valued measure column named `rank_col`. Consecutive
/// ranks, no gap after a tie. Rows with a missing `value_col` get no rank.
pub fn rank_by_week(
    table: &mut WeeklyTable,
    value_col: &str,
    rank_col: &str,
    ascending: bool,
) -> Result<()> {
    table.require_column(value_col)?;

    // Distinct values per week define the dense rank order.
    let mut by_week: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for row in &table.rows {
        if let Some(v) = row.measure(value_col) {
            by_week.entry(row.week_bin).or_default().push(v);
        }
    }
    let mut rank_of: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for (week, mut values) in by_week {
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        values.dedup();
        if !ascending {
            values.reverse();
        }
        rank_of.insert(week, values);
    }

    for row in &mut table.rows {
        let Some(v) = row.measure(value_col) else {
            continue;
        };
        let distinct = &rank_of[&row.week_bin];
        if let Some(pos) = distinct.iter().position(|&d| d == v) {
            row.measures.insert(rank_col.to_string(), (pos + 1) as f64);
        }
    }
    table.measure_columns.insert(rank_col.to_string());
    Ok(())
}

/// Mean value per site across the selected weeks, best first.
///
/// Intended for prioritisation questions like "which 20 sites are best
/// overall?". Missing values are ignored by the mean; `weeks` counts only
/// rows that actually contributed. Ordering is descending by mean with ties
/// broken by site name ascending; sites whose selection carried no values
/// at all keep `mean = None` and sort last rather than disappearing.
pub fn mean_per_site(
    table: &WeeklyTable,
    value_col: &str,
    weeks: Option<&BTreeSet<i32>>,
) -> Result<Vec<SiteSummary>> {
    table.require_column(value_col)?;

    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for row in &table.rows {
        if let Some(weeks) = weeks {
            if !weeks.contains(&row.week_bin) {
                continue;
            }
        }
        let entry = groups.entry(row.site_name.clone()).or_default();
        if let Some(v) = row.measure(value_col) {
            entry.push(v);
        }
    }

    let mut summaries: Vec<SiteSummary> = groups
        .into_iter()
        .map(|(site_name, values)| SiteSummary {
            mean: mean(&values),
            weeks: values.len(),
            site_name,
        })
        .collect();

    summaries.sort_by(|a, b| match (a.mean, b.mean) {
        (Some(x), Some(y)) => y
            .partial_cmp(&x)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.site_name.cmp(&b.site_name)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.site_name.cmp(&b.site_name),
    });
    Ok(summaries)
}

/// Map a scalar to its suitability class.
///
/// Missing values and values `<= 0` are the explicit "not viable" sentinel
/// and never classify. Otherwise the first `[min, max)` interval containing
/// the value wins; a value outside every interval returns `None` rather
/// than failing.
pub fn classify(value: Option<f64>, classes: &[SuitabilityClass]) -> Option<&SuitabilityClass> {
    let v = value?;
    if v <= 0.0 {
        return None;
    }
    classes.iter().find(|c| c.min <= v && v < c.max)
}
