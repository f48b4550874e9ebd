//! JSON snapshot of a run's collected updates.
//!
//! # Output Structure
//!
//! One file per run, named after the run date:
//! ```text
//! json_output_dir/
//! ├── cloud_updates_week_2024-06-07.json
//! └── cloud_updates_week_2024-06-14.json
//! ```
//!
//! The file holds the bare item array, pretty-printed, in collection order.

use crate::models::Aggregator;
use chrono::NaiveDate;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Path of the snapshot for a run on `today`.
pub fn digest_path(json_output_dir: &str, today: NaiveDate) -> PathBuf {
    PathBuf::from(json_output_dir).join(format!("cloud_updates_week_{today}.json"))
}

/// Write every collected item to `{json_output_dir}/cloud_updates_week_{today}.json`.
///
/// Creates the directory when missing and returns the written path.
#[instrument(level = "info", skip_all, fields(%json_output_dir, %today))]
pub async fn write_digest(
    aggregator: &Aggregator,
    json_output_dir: &str,
    today: NaiveDate,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(aggregator)?;

    if let Err(e) = fs::create_dir_all(json_output_dir).await {
        error!(%json_output_dir, error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = digest_path(json_output_dir, today);
    fs::write(&path, json).await?;
    info!(path = %path.display(), items = aggregator.len(), "Wrote JSON digest");

    Ok(path)
}
