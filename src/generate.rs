//! Responsible for one generation run: load, request, compose, export
//!
//! A single linear pass per user action. Row- and pair-level problems are
//! recovered locally and enumerated in the report; only "nothing loaded at
//! all" and export failures abort the run.

use anyhow::bail;
use chrono::Utc;
use itertools::Itertools;
use tracing::{info, warn};

use crate::isochrone::{IsochroneEngine, request_isochrones};
use crate::loader::{UploadedFile, load_route_files};
use crate::map::MapDocument;
use crate::map::html::export_html;
use crate::model::{GenerationReport, IsochroneRequestParams};

pub struct GenerationOutput {
    pub map_html: String,
    pub report: GenerationReport,
}

#[tracing::instrument(err, skip(engine, files), fields(files = files.len()))]
pub async fn generate_map<E: IsochroneEngine>(
    engine: &E,
    files: &[UploadedFile],
    params: IsochroneRequestParams,
) -> anyhow::Result<GenerationOutput> {
    if files.is_empty() {
        bail!("no files uploaded");
    }

    let outcome = load_route_files(files);
    if outcome.routes.is_empty() {
        bail!(
            "no valid routes uploaded: {}",
            outcome
                .skipped_files
                .iter()
                .map(|f| f.reason.as_str())
                .join("; ")
        );
    }

    let stops_loaded = outcome.routes.iter().map(|r| r.stops.len()).sum();

    let (results, failures) = request_isochrones(engine, &outcome.routes, &params).await;

    let report = GenerationReport {
        generated_at: Utc::now(),
        stops_loaded,
        polygons_generated: results.len(),
        skipped_files: outcome.skipped_files,
        row_errors: outcome.row_errors,
        isochrone_failures: failures,
    };

    if report.has_problems() {
        warn!(
            "run finished with problems: {} skipped files, {} bad rows, {} failed pairs",
            report.skipped_files.len(),
            report.row_errors.len(),
            report.isochrone_failures.len()
        );
    }

    let doc = MapDocument::assemble(&outcome.routes, results, &params)?;
    let map_html = export_html(&doc, &report)?;

    info!(
        "generated map with {} stops and {} polygons",
        report.stops_loaded, report.polygons_generated
    );

    Ok(GenerationOutput { map_html, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isochrone::tests::{FailingEngine, SquareEngine};
    use crate::model::LatLon;

    fn upload(name: &str, content: &str) -> UploadedFile {
        UploadedFile {
            name: name.to_string(),
            bytes: content.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn two_stops_two_thresholds_make_four_polygons() -> anyhow::Result<()> {
        let files = [upload(
            "line_4.csv",
            "lat,lon,name\n40.0,-73.0,A\n40.01,-73.01,B\n",
        )];
        let params = IsochroneRequestParams::new(1.39, vec![5, 10]);

        let output = generate_map(&SquareEngine, &files, params).await?;

        assert_eq!(output.report.stops_loaded, 2);
        assert_eq!(output.report.polygons_generated, 4);
        assert!(!output.report.has_problems());
        assert!(output.map_html.contains("leaflet"));

        Ok(())
    }

    #[tokio::test]
    async fn bad_row_is_reported_and_map_still_generated() -> anyhow::Result<()> {
        let files = [upload("line_4.csv", "lat,lon,name\n40.0,-73.0,A\n40.01,,B\n")];

        let output = generate_map(&SquareEngine, &files, IsochroneRequestParams::default()).await?;

        assert_eq!(output.report.stops_loaded, 1);
        assert_eq!(output.report.row_errors.len(), 1);
        assert!(output.map_html.contains("missing lon"));

        Ok(())
    }

    #[tokio::test]
    async fn engine_failure_still_exports_with_remaining_polygons() -> anyhow::Result<()> {
        let files = [upload(
            "line_4.csv",
            "lat,lon,name\n40.0,-73.0,A\n40.01,-73.01,B\n",
        )];
        let engine = FailingEngine {
            fail_at: LatLon::new(40.01, -73.01),
            fail_threshold_min: 10,
        };
        let params = IsochroneRequestParams::new(1.33, vec![5, 10]);

        let output = generate_map(&engine, &files, params).await?;

        assert_eq!(output.report.polygons_generated, 3);
        assert_eq!(output.report.isochrone_failures.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn all_files_invalid_aborts_the_run() {
        let files = [upload("bad.csv", "x,y\n1,2\n")];

        let result = generate_map(&SquareEngine, &files, IsochroneRequestParams::default()).await;

        let err = result.err().expect("run should abort");
        assert!(err.to_string().contains("no valid routes uploaded"));
    }

    #[tokio::test]
    async fn no_files_aborts_the_run() {
        let result = generate_map(&SquareEngine, &[], IsochroneRequestParams::default()).await;
        assert!(result.is_err());
    }
}
