// CSV ingestion. Responsible only for:
// - loading the site dimension table and the weekly observation files,
// - normalizing column names,
// - joining authoritative site metadata onto observation rows.
//
// No reshaping, no thresholds, no suitability rules. The pipeline in
// `transforms` trusts the table this module hands over.
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;

use crate::config;
use crate::error::{AppError, Result};
use crate::types::{Observation, Site, WeeklyTable};
use crate::util::{normalize_header, parse_f64_safe, parse_i32_safe};

/// Columns that are identity or site metadata, never measures. Any site
/// metadata found on an observation row is discarded here and replaced by
/// the dimension-table join.
const RESERVED_COLUMNS: [&str; 8] = [
    "site_id",
    "site_name",
    "state",
    "latitude",
    "longitude",
    "lat",
    "long",
    "week_bin",
];

/// Diagnostics for one observation-file load, printed by the menu.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub parse_errors: usize,
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    if !path.exists() {
        return Err(AppError::MissingFile(path.to_path_buf()));
    }
    Ok(ReaderBuilder::new().flexible(true).from_path(path)?)
}

/// Normalized headers for a reader, in file order.
fn read_headers(rdr: &mut csv::Reader<std::fs::File>) -> Result<Vec<String>> {
    Ok(rdr.headers()?.iter().map(normalize_header).collect())
}

fn field<'a>(record: &'a csv::StringRecord, headers: &[String], name: &str) -> Option<&'a str> {
    headers.iter().position(|h| h == name).and_then(|i| record.get(i))
}

/// Load `sites_fixed.csv`, the authoritative site dimension table, keyed
/// by `site_id`.
pub fn load_sites(data_dir: &Path) -> Result<BTreeMap<String, Site>> {
    let path = data_dir.join("dimensions").join("sites_fixed.csv");
    let mut rdr = open_reader(&path)?;
    let headers = read_headers(&mut rdr)?;

    for required in ["site_id", "site_name", "state", "latitude", "longitude"] {
        if !headers.iter().any(|h| h == required) {
            return Err(AppError::schema("sites_fixed.csv", required));
        }
    }

    let mut sites = BTreeMap::new();
    for record in rdr.records() {
        let record = record?;
        let Some(site_id) = field(&record, &headers, "site_id").map(str::trim) else {
            continue;
        };
        if site_id.is_empty() {
            continue;
        }
        let site = Site {
            site_id: site_id.to_string(),
            site_name: field(&record, &headers, "site_name")
                .unwrap_or_default()
                .trim()
                .to_string(),
            state: field(&record, &headers, "state")
                .unwrap_or_default()
                .trim()
                .to_string(),
            latitude: parse_f64_safe(field(&record, &headers, "latitude")).unwrap_or(f64::NAN),
            longitude: parse_f64_safe(field(&record, &headers, "longitude")).unwrap_or(f64::NAN),
        };
        sites.insert(site.site_id.clone(), site);
    }
    Ok(sites)
}

/// Load one weekly observation file and join site metadata.
///
/// - Headers are normalized; `week_index` is accepted as a legacy name for
///   `week_bin`.
/// - Every non-reserved column becomes an optional numeric measure.
/// - Rows missing `site_id` or a parseable `week_bin` are skipped and
///   counted in the report.
/// - A `site_id` with no match in the dimension table fails the whole load;
///   denormalized site columns on the observation file are never trusted.
pub fn load_with_sites(data_dir: &Path, window: &str) -> Result<(WeeklyTable, LoadReport)> {
    let dataset = config::dataset(window)?;
    let sites = load_sites(data_dir)?;

    let path: PathBuf = data_dir.join("derived").join(dataset.file_name);
    let mut rdr = open_reader(&path)?;
    let mut headers = read_headers(&mut rdr)?;
    for h in &mut headers {
        if h == "week_index" {
            *h = "week_bin".to_string();
        }
    }

    for required in ["site_id", "week_bin"] {
        if !headers.iter().any(|h| h == required) {
            return Err(AppError::schema(dataset.file_name, required));
        }
    }

    let measure_columns: BTreeSet<String> = headers
        .iter()
        .filter(|h| !RESERVED_COLUMNS.contains(&h.as_str()))
        .cloned()
        .collect();

    let mut rows = Vec::new();
    let mut total_rows = 0usize;
    let mut parse_errors = 0usize;
    let mut unmapped: BTreeSet<String> = BTreeSet::new();

    for record in rdr.records() {
        total_rows += 1;
        let record = match record {
            Ok(r) => r,
            Err(_) => {
                parse_errors += 1;
                continue;
            }
        };

        let site_id = match field(&record, &headers, "site_id").map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                parse_errors += 1;
                continue;
            }
        };
        let week_bin = match parse_i32_safe(field(&record, &headers, "week_bin")) {
            Some(w) => w,
            None => {
                parse_errors += 1;
                continue;
            }
        };

        let Some(site) = sites.get(&site_id) else {
            unmapped.insert(site_id);
            continue;
        };

        let mut measures = BTreeMap::new();
        for (i, header) in headers.iter().enumerate() {
            if RESERVED_COLUMNS.contains(&header.as_str()) {
                continue;
            }
            if let Some(v) = parse_f64_safe(record.get(i)) {
                measures.insert(header.clone(), v);
            }
        }

        rows.push(Observation {
            site_id: site.site_id.clone(),
            site_name: site.site_name.clone(),
            state: site.state.clone(),
            latitude: site.latitude,
            longitude: site.longitude,
            week_bin,
            measures,
        });
    }

    if !unmapped.is_empty() {
        return Err(AppError::UnmappedSites(unmapped.into_iter().collect()));
    }

    let report = LoadReport {
        total_rows,
        kept_rows: rows.len(),
        parse_errors,
    };
    Ok((
        WeeklyTable {
            rows,
            measure_columns,
        },
        report,
    ))
}
