// Error types shared by the loader, config lookups, and the pipeline.
//
// Every failure here is fatal to the current request: the caller surfaces
// the message and returns to the menu. Nothing is retried and nothing is
// silently defaulted.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// A required column is absent from an input table.
    #[error("column '{column}' not found in {table}")]
    Schema { table: String, column: String },

    /// The long-to-wide pivot saw the same (site, week) pair twice.
    /// The pivot refuses to pick one or average them.
    #[error("duplicate observation for site '{site}', week {week}")]
    DuplicateKey { site: String, week: i32 },

    /// An unrecognized key into one of the static config tables.
    #[error("unknown {kind} '{value}' (choose from: {accepted})")]
    Config {
        kind: &'static str,
        value: String,
        accepted: String,
    },

    #[error("missing file: {0}")]
    MissingFile(PathBuf),

    /// Observation rows whose site_id has no match in the site dimension
    /// table. Denormalized site columns are never trusted as a fallback.
    #[error("site_id values not present in the site table: {0:?}")]
    UnmappedSites(Vec<String>),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn schema(table: &str, column: &str) -> Self {
        AppError::Schema {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    /// Builds a `Config` error with the accepted values joined for display.
    pub fn config<I, S>(kind: &'static str, value: &str, accepted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let accepted: Vec<String> = accepted
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        AppError::Config {
            kind,
            value: value.to_string(),
            accepted: accepted.join(", "),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_value_and_accepted_set() {
        let e = AppError::config("window", "last9y", ["full", "last4y", "2024"]);
        let msg = e.to_string();
        assert!(msg.contains("last9y"));
        assert!(msg.contains("full, last4y, 2024"));
    }

    #[test]
    fn schema_error_names_table_and_column() {
        let msg = AppError::schema("weekly table", "pct_viability").to_string();
        assert!(msg.contains("pct_viability"));
        assert!(msg.contains("weekly table"));
    }
}
