// Export and console-preview layer: CSV/JSON writers plus text renderings
// of the matrix and summary outputs. This is a consumer of the pipeline;
// it never reshapes data itself.
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::config::{Overlay, Variable};
use crate::error::Result;
use crate::types::{Matrix, RankMatrix, SiteSummary};
use crate::util::format_number;

pub fn write_csv<T: Serialize>(path: &str, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Export a matrix as CSV: one row per site, one column per week bin,
/// missing cells left empty.
pub fn write_matrix_csv(path: &str, matrix: &Matrix, decimals: usize) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    let mut header = vec!["site_name".to_string()];
    header.extend(matrix.weeks().iter().map(|w| format!("week_{}", w)));
    wtr.write_record(&header)?;
    for (r, site) in matrix.sites().iter().enumerate() {
        let mut record = vec![site.clone()];
        for c in 0..matrix.n_cols() {
            record.push(match matrix.get(r, c) {
                Some(v) => format!("{:.*}", decimals, v),
                None => String::new(),
            });
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Intensity glyph for a cell, scaled against the variable's display range
/// rather than the observed extremes so color ranges never extrapolate.
fn glyph(value: f64, var: &Variable) -> char {
    const RAMP: [char; 5] = ['.', ':', '+', '#', '@'];
    let span = var.vmax - var.vmin;
    if span <= 0.0 {
        return RAMP[0];
    }
    let t = ((value - var.vmin) / span).clamp(0.0, 1.0);
    let idx = ((t * RAMP.len() as f64) as usize).min(RAMP.len() - 1);
    RAMP[idx]
}

/// Render the heatmap as a markdown table, one cell per (site, week).
///
/// - `Overlay::None`   : intensity glyph only.
/// - `Overlay::Value`  : the raw value at the variable's precision.
/// - `Overlay::Rank`   : the per-week rank from `ranks` (dense, 1 = best).
/// - `Overlay::Winner` : glyph, with rank-1 cells marked `*`.
///
/// Missing cells render empty; in rank mode "missing" means missing from
/// the rank matrix, so ranks survive even when the displayed matrix is a
/// normalized one whose column degenerated to all-missing.
pub fn render_heatmap(
    matrix: &Matrix,
    var: &Variable,
    overlay: Overlay,
    ranks: Option<&RankMatrix>,
) -> String {
    let mut builder = Builder::default();
    let mut header = vec!["Site".to_string()];
    header.extend(matrix.weeks().iter().map(|w| format!("W{}", w)));
    builder.push_record(header);

    for (r, site) in matrix.sites().iter().enumerate() {
        let mut record = vec![site.clone()];
        for c in 0..matrix.n_cols() {
            let cell = match (matrix.get(r, c), overlay) {
                // Ranks are keyed on the rank matrix, not the displayed
                // one: a normalized column that degenerated to missing
                // still has well-defined raw ranks worth showing.
                (_, Overlay::Rank) => match ranks.and_then(|rm| rm.get(r, c)) {
                    Some(rank) => rank.to_string(),
                    None => String::new(),
                },
                (None, _) => String::new(),
                (Some(v), Overlay::None) => glyph(v, var).to_string(),
                (Some(v), Overlay::Value) => format!("{:.*}", var.decimals, v),
                (Some(v), Overlay::Winner) => {
                    let won = ranks.and_then(|rm| rm.get(r, c)) == Some(1);
                    if won {
                        format!("{}*", glyph(v, var))
                    } else {
                        glyph(v, var).to_string()
                    }
                }
            };
            record.push(cell);
        }
        builder.push_record(record);
    }

    builder.build().with(Style::markdown()).to_string()
}

/// One prioritisation row, formatted for both the console preview and the
/// CSV export.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct SiteSummaryRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "SiteName")]
    #[tabled(rename = "SiteName")]
    pub site_name: String,
    #[serde(rename = "MeanValue")]
    #[tabled(rename = "MeanValue")]
    pub mean: String,
    #[serde(rename = "WeeksCounted")]
    #[tabled(rename = "WeeksCounted")]
    pub weeks: usize,
}

pub fn summary_rows(summaries: &[SiteSummary], decimals: usize) -> Vec<SiteSummaryRow> {
    summaries
        .iter()
        .enumerate()
        .map(|(idx, s)| SiteSummaryRow {
            rank: idx + 1,
            site_name: s.site_name.clone(),
            mean: match s.mean {
                Some(m) => format_number(m, decimals),
                None => "N/A".to_string(),
            },
            weeks: s.weeks,
        })
        .collect()
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::transforms::rank_per_week;
    use crate::types::Matrix;

    fn sample_matrix() -> Matrix {
        let mut m = Matrix::new(vec!["Alpha".to_string(), "Bravo".to_string()], vec![1, 2]);
        m.set(0, 0, Some(0.9));
        m.set(0, 1, Some(0.2));
        m.set(1, 0, Some(0.4));
        // (1, 1) stays missing
        m
    }

    #[test]
    fn value_overlay_prints_numbers_and_leaves_missing_blank() {
        let var = config::variable("suitability").unwrap();
        let m = sample_matrix();
        let text = render_heatmap(&m, var, Overlay::Value, None);
        assert!(text.contains("0.90"));
        assert!(text.contains("W1"));
        assert!(text.contains("Alpha"));
    }

    #[test]
    fn winner_overlay_marks_rank_one_cells() {
        let var = config::variable("suitability").unwrap();
        let m = sample_matrix();
        let ranks = rank_per_week(&m, false);
        let text = render_heatmap(&m, var, Overlay::Winner, Some(&ranks));
        // Alpha wins both weeks it appears in; its 0.9 cell is top-band.
        assert!(text.contains("@*"));
    }

    #[test]
    fn rank_overlay_survives_a_degenerate_normalized_column() {
        use crate::transforms::{build_matrix, normalize_per_week};
        use crate::types::{Observation, WeeklyTable};
        use std::collections::{BTreeMap, BTreeSet};

        let obs = |site: &str, week: i32, value: f64| Observation {
            site_id: site.to_string(),
            site_name: site.to_string(),
            state: "MT".to_string(),
            latitude: 46.6,
            longitude: -112.0,
            week_bin: week,
            measures: BTreeMap::from([("pct_viability".to_string(), value)]),
        };
        // Week 1 is constant, so min-max normalization empties its column;
        // the raw ranks still exist and must still render.
        let table = WeeklyTable {
            rows: vec![
                obs("Alpha", 1, 0.5),
                obs("Bravo", 1, 0.5),
                obs("Alpha", 2, 0.9),
                obs("Bravo", 2, 0.3),
            ],
            measure_columns: BTreeSet::from(["pct_viability".to_string()]),
        };
        let raw = build_matrix(&table, "pct_viability").unwrap();
        let shown = normalize_per_week(&raw, "minmax").unwrap();
        assert_eq!(shown.get(0, 0), None);

        let ranks = rank_per_week(&raw, false);
        let var = config::variable("suitability").unwrap();
        let text = render_heatmap(&shown, var, Overlay::Rank, Some(&ranks));
        let week1_cells: Vec<&str> = text
            .lines()
            .filter(|l| l.contains("Alpha") || l.contains("Bravo"))
            .map(|l| l.split('|').nth(2).unwrap().trim())
            .collect();
        assert_eq!(week1_cells, ["1", "1"]);
    }

    #[test]
    fn summary_rows_number_from_one_and_mark_empty_means() {
        let summaries = vec![
            SiteSummary {
                site_name: "Alpha".to_string(),
                mean: Some(0.75),
                weeks: 10,
            },
            SiteSummary {
                site_name: "Bravo".to_string(),
                mean: None,
                weeks: 0,
            },
        ];
        let rows = summary_rows(&summaries, 2);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].mean, "0.75");
        assert_eq!(rows[1].rank, 2);
        assert_eq!(rows[1].mean, "N/A");
    }

    #[test]
    fn matrix_csv_has_week_columns() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("matrix.csv");
        write_matrix_csv(path.to_str().unwrap(), &sample_matrix(), 2).unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        let mut lines = body.lines();
        assert_eq!(lines.next().unwrap(), "site_name,week_1,week_2");
        assert_eq!(lines.next().unwrap(), "Alpha,0.90,0.20");
        assert_eq!(lines.next().unwrap(), "Bravo,0.40,");
    }
}
