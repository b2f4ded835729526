// Entry point and high-level CLI flow.
//
// The menu mirrors the dashboard's control surface:
// - Option [1] loads a dataset window (cached per window key).
// - Option [2] renders the site x week heatmap with an overlay.
// - Option [3] ranks sites by mean value and exports the top N.
// - Option [4] classifies one week's sites and exports map points.
mod config;
mod error;
mod loader;
mod output;
mod transforms;
mod types;
mod util;

use std::collections::{BTreeSet, HashMap};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use config::{Overlay, Variable};
use error::Result;
use types::{Matrix, MapPoint, RankMatrix, SummaryStats, WeeklyTable};

// In-memory app state: each dataset window is loaded once and reused for
// every report generated in the same run. The window count is small and
// fixed, so there is no eviction.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        tables: HashMap::new(),
        active_window: None,
    })
});

struct AppState {
    tables: HashMap<String, WeeklyTable>,
    active_window: Option<String>,
}

const DATA_DIR: &str = "data";

/// Read a single line of input after printing a prompt. Empty input falls
/// back to `default`.
fn prompt(label: &str, default: &str) -> String {
    if default.is_empty() {
        print!("{}: ", label);
    } else {
        print!("{} [{}]: ", label, default);
    }
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    let trimmed = buf.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

fn read_choice() -> String {
    prompt("Enter choice", "")
}

/// Handle option [1]: load one dataset window into the cache and make it
/// the active window.
fn handle_load() {
    println!("Available dataset windows:");
    for d in config::DATASETS.iter() {
        println!("  {:7} {} - {}", d.key, d.label, d.description);
    }
    let window = prompt("Window", config::DEFAULT_DATASET_KEY);

    let mut state = APP_STATE.lock().unwrap();
    if state.tables.contains_key(&window) {
        println!("Window '{}' already loaded; reusing cached table.\n", window);
        state.active_window = Some(window);
        return;
    }

    match loader::load_with_sites(Path::new(DATA_DIR), &window) {
        Ok((table, report)) => {
            println!(
                "Processing dataset... ({} rows read, {} kept)",
                util::format_int(report.total_rows as i64),
                util::format_int(report.kept_rows as i64)
            );
            if report.parse_errors > 0 {
                println!(
                    "Note: {} rows skipped due to parse/validation errors.",
                    util::format_int(report.parse_errors as i64)
                );
            }
            println!(
                "Sites: {}, weeks: {}\n",
                util::format_int(table.site_names().len() as i64),
                util::format_int(table.week_bins().len() as i64)
            );
            state.tables.insert(window.clone(), table);
            state.active_window = Some(window);
        }
        Err(e) => {
            eprintln!("Failed to load dataset: {}\n", e);
        }
    }
}

/// The active window's table, cloned out of the cache.
fn active_table() -> Option<(String, WeeklyTable)> {
    let state = APP_STATE.lock().unwrap();
    let window = state.active_window.clone()?;
    let table = state.tables.get(&window).cloned()?;
    Some((window, table))
}

fn prompt_variable() -> Result<&'static Variable> {
    println!("Available variables:");
    for v in config::VARIABLES.iter() {
        println!("  {:20} {}", v.key, v.label);
    }
    config::variable(&prompt("Variable", config::DEFAULT_VARIABLE_KEY))
}

fn prompt_overlay(var: &Variable) -> Result<Overlay> {
    let allowed: Vec<&str> = var.allowed_overlays().iter().map(|o| o.key()).collect();
    println!("Overlays for {}: {}", var.key, allowed.join(", "));
    let choice = Overlay::parse(&prompt("Overlay", var.effective_default_overlay().key()))?;
    if !var.allowed_overlays().contains(&choice) {
        println!(
            "Overlay '{}' not available for {}; using 'none'.",
            choice.key(),
            var.key
        );
        return Ok(Overlay::None);
    }
    Ok(choice)
}

/// Optional "min max" week range; blank keeps every week.
fn prompt_week_subset(table: &WeeklyTable) -> Option<BTreeSet<i32>> {
    let weeks = table.week_bins();
    let (lo, hi) = (weeks.first()?, weeks.last()?);
    let raw = prompt(&format!("Week range 'min max' ({}-{}, blank = all)", lo, hi), "");
    if raw.is_empty() {
        return None;
    }
    let mut parts = raw.split_whitespace();
    let a = util::parse_i32_safe(parts.next())?;
    let b = util::parse_i32_safe(parts.next())?;
    Some((a.min(b)..=a.max(b)).collect())
}

/// Dense ranks come out of the long table as an integer-valued measure
/// column; fold that back into the grid form the renderer takes.
fn to_rank_matrix(dense: &Matrix) -> RankMatrix {
    let mut out = RankMatrix::new(dense.sites().to_vec(), dense.weeks().to_vec());
    for r in 0..dense.n_rows() {
        for c in 0..dense.n_cols() {
            out.set(r, c, dense.get(r, c).map(|v| v as u32));
        }
    }
    out
}

/// Handle option [2]: heatmap report for one variable/overlay.
fn handle_heatmap(window: &str, table: &WeeklyTable) -> Result<()> {
    let var = prompt_variable()?;
    let overlay = prompt_overlay(var)?;
    let weeks = prompt_week_subset(table);
    let agg = prompt("Collapse duplicate site/week pairs (none/mean/median/max/min)", "none");
    let method = prompt("Normalize per week (none/minmax/zscore)", "none");

    let table = &transforms::filter_weeks(table, weeks.as_ref());
    let table = &if agg == "none" {
        table.clone()
    } else {
        transforms::aggregate_site_week(table, var.column, types::Aggregate::parse(&agg)?)?
    };

    let raw = transforms::build_matrix(table, var.column)?;
    let shown = if method == "none" {
        raw.clone()
    } else {
        transforms::normalize_per_week(&raw, &method)?
    };

    let ranks = match overlay {
        Overlay::Rank => {
            // The rank overlay displays dense per-week ranks (1 = best),
            // computed on the long table the way the export files name them.
            let rank_col = var.rank_column.unwrap_or("week_rank");
            let mut ranked = table.clone();
            transforms::rank_by_week(&mut ranked, var.column, rank_col, false)?;
            Some(to_rank_matrix(&transforms::build_matrix(&ranked, rank_col)?))
        }
        Overlay::Winner => Some(transforms::rank_per_week(&raw, false)),
        Overlay::None | Overlay::Value => None,
    };

    println!(
        "\n{} - {} ({} overlay)\n",
        var.label,
        config::dataset(window)?.label,
        overlay.key()
    );
    println!("{}\n", output::render_heatmap(&shown, var, overlay, ranks.as_ref()));

    let file = format!("heatmap_{}_{}.csv", var.key, window);
    output::write_matrix_csv(&file, &shown, var.decimals)?;
    println!("(Full matrix exported to {})\n", file);
    Ok(())
}

/// Handle option [3]: site prioritisation over a week subset.
fn handle_prioritisation(window: &str, table: &WeeklyTable) -> Result<()> {
    let var = prompt_variable()?;
    let weeks = prompt_week_subset(table);
    let top_n: usize = prompt("Show top N sites", "20").parse().unwrap_or(20);

    let summaries = transforms::mean_per_site(table, var.column, weeks.as_ref())?;
    let rows = output::summary_rows(&summaries[..summaries.len().min(top_n)], 3);

    println!("\nTop sites by mean {} ({})\n", var.label, config::dataset(window)?.label);
    output::preview_table_rows(&rows, top_n);

    let file = format!("top_sites_{}_{}.csv", var.key, window);
    output::write_csv(&file, &rows)?;
    println!("(Full table exported to {})", file);

    let stats = SummaryStats {
        total_sites: table.site_names().len(),
        total_weeks: table.week_bins().len(),
        sites_with_values: summaries.iter().filter(|s| s.mean.is_some()).count(),
        best_site: summaries
            .iter()
            .find(|s| s.mean.is_some())
            .map(|s| s.site_name.clone()),
        best_mean: summaries.iter().find_map(|s| s.mean),
    };
    output::write_json("summary.json", &stats)?;
    println!("(Summary stats exported to summary.json)\n");
    Ok(())
}

/// Handle option [4]: classify one week's sites for the map view.
fn handle_map_export(window: &str, table: &WeeklyTable) -> Result<()> {
    let var = prompt_variable()?;
    let weeks = table.week_bins();
    let default_week = weeks.first().map(|w| w.to_string()).unwrap_or_default();
    let week = util::parse_i32_safe(Some(&prompt("Week", &default_week))).unwrap_or(0);

    table.require_column(var.column)?;
    let mut points: Vec<MapPoint> = Vec::new();
    for row in table.rows.iter().filter(|r| r.week_bin == week) {
        let value = row.measure(var.column);
        // Zero, negative, missing, and out-of-range values carry no class
        // and are left off the map.
        let Some(class) = transforms::classify(value, &config::SUITABILITY_CLASSES) else {
            continue;
        };
        points.push(MapPoint {
            site: row.site_name.clone(),
            state: row.state.clone(),
            lat: row.latitude,
            lon: row.longitude,
            value: value.unwrap_or_default(),
            label: class.label,
            color: class.color,
            size: class.marker_size,
        });
    }

    let file = format!("map_points_{}_week_{}.json", var.key, week);
    output::write_json(&file, &points)?;
    println!(
        "\n{} - Week {} ({}): {} classified sites exported to {}\n",
        var.label,
        week,
        config::dataset(window)?.label,
        util::format_int(points.len() as i64),
        file
    );
    Ok(())
}

fn require_loaded() -> Option<(String, WeeklyTable)> {
    let loaded = active_table();
    if loaded.is_none() {
        println!("Error: No dataset loaded. Please load one first (option 1).\n");
    }
    loaded
}

fn main() {
    loop {
        println!("Site Suitability Explorer");
        println!("[1] Load dataset");
        println!("[2] Heatmap report");
        println!("[3] Site prioritisation");
        println!("[4] Map export (single week)");
        println!("[5] Exit\n");
        match read_choice().as_str() {
            "1" => handle_load(),
            "2" => {
                if let Some((window, table)) = require_loaded() {
                    if let Err(e) = handle_heatmap(&window, &table) {
                        eprintln!("Heatmap report failed: {}\n", e);
                    }
                }
            }
            "3" => {
                if let Some((window, table)) = require_loaded() {
                    if let Err(e) = handle_prioritisation(&window, &table) {
                        eprintln!("Prioritisation failed: {}\n", e);
                    }
                }
            }
            "4" => {
                if let Some((window, table)) = require_loaded() {
                    if let Err(e) = handle_map_export(&window, &table) {
                        eprintln!("Map export failed: {}\n", e);
                    }
                }
            }
            "5" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 1-5.\n"),
        }
    }
}
