use chrono::{DateTime, Utc};
use serde::Serialize;

/// A data row that was skipped while loading a file.
#[derive(Clone, Debug, Serialize)]
pub struct RowError {
    pub file: String,
    /// 1-based data row position (the header row doesn't count).
    pub row: u64,
    pub reason: String,
}

/// A whole file that couldn't be loaded.
#[derive(Clone, Debug, Serialize)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

/// A (stop, threshold) pair the isochrone engine couldn't answer for.
#[derive(Clone, Debug, Serialize)]
pub struct IsochroneFailure {
    pub route: String,
    pub stop_number: u32,
    pub stop_name: String,
    pub threshold_min: u32,
    pub reason: String,
}

/// User-facing feedback for one generation run. Every skipped row, skipped
/// file and failed isochrone request is enumerated here, nothing is
/// dropped silently.
#[derive(Clone, Debug, Serialize)]
pub struct GenerationReport {
    pub generated_at: DateTime<Utc>,
    pub stops_loaded: usize,
    pub polygons_generated: usize,
    pub skipped_files: Vec<SkippedFile>,
    pub row_errors: Vec<RowError>,
    pub isochrone_failures: Vec<IsochroneFailure>,
}

impl Default for GenerationReport {
    fn default() -> Self {
        GenerationReport {
            generated_at: Utc::now(),
            stops_loaded: 0,
            polygons_generated: 0,
            skipped_files: vec![],
            row_errors: vec![],
            isochrone_failures: vec![],
        }
    }
}

impl GenerationReport {
    pub fn has_problems(&self) -> bool {
        !self.skipped_files.is_empty()
            || !self.row_errors.is_empty()
            || !self.isochrone_failures.is_empty()
    }
}
