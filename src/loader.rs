//! Responsible for turning uploaded file blobs into [`RouteFile`]s
//!
//! One file = one route, upload order preserved. Bad rows are skipped and
//! reported, a file only fails as a whole when it has no usable
//! coordinate columns at all.

use std::path::Path;

use tracing::{error, info};

use crate::model::{LatLon, RouteFile, RowError, SkippedFile, Stop};

/// One file blob as received from the multipart upload.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub routes: Vec<RouteFile>,
    pub skipped_files: Vec<SkippedFile>,
    pub row_errors: Vec<RowError>,
}

#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("{file}: only CSV files are supported")]
    UnsupportedFormat { file: String },

    #[error("{file}: must contain 'lat' and 'lon' columns")]
    MissingCoordinateColumns { file: String },

    #[error("{file}: couldn't be read as CSV: {source}")]
    Unreadable { file: String, source: csv::Error },

    #[error("{file}: contains no loadable rows")]
    Empty { file: String },
}

/// Parses every uploaded file into a route. A file that can't be loaded is
/// skipped and reported, the remaining files still go through.
#[tracing::instrument(skip(files))]
pub fn load_route_files(files: &[UploadedFile]) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();

    for file in files {
        let route_id = outcome.routes.len();

        match parse_route_file(route_id, file) {
            Ok((route, mut row_errors)) => {
                outcome.row_errors.append(&mut row_errors);

                if route.stops.is_empty() {
                    let reason = FormatError::Empty {
                        file: file.name.clone(),
                    }
                    .to_string();
                    error!("skipping {}: {reason}", file.name);
                    outcome.skipped_files.push(SkippedFile {
                        file: file.name.clone(),
                        reason,
                    });
                } else {
                    info!("loaded {} stops from {}", route.stops.len(), file.name);
                    outcome.routes.push(route);
                }
            }
            Err(e) => {
                error!("skipping {}: {e}", file.name);
                outcome.skipped_files.push(SkippedFile {
                    file: file.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    outcome
}

fn parse_route_file(
    route_id: usize,
    file: &UploadedFile,
) -> Result<(RouteFile, Vec<RowError>), FormatError> {
    let lower_name = file.name.to_lowercase();
    if lower_name.ends_with(".xlsx") || lower_name.ends_with(".xls") {
        return Err(FormatError::UnsupportedFormat {
            file: file.name.clone(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file.bytes.as_slice());

    let headers = reader
        .headers()
        .map_err(|source| FormatError::Unreadable {
            file: file.name.clone(),
            source,
        })?
        .clone();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
    };

    let (lat_col, lon_col) = match (column("lat"), column("lon")) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => {
            return Err(FormatError::MissingCoordinateColumns {
                file: file.name.clone(),
            })
        }
    };
    let name_col = column("name");
    let stop_number_col = column("stop_number");
    let address_col = column("address");

    let mut stops = vec![];
    let mut row_errors = vec![];

    for (i, record) in reader.records().enumerate() {
        // 1-based data row position, the header row doesn't count
        let row = i as u64 + 1;

        let record = match record {
            Ok(record) => record,
            Err(e) => {
                row_errors.push(RowError {
                    file: file.name.clone(),
                    row,
                    reason: format!("unparsable row: {e}"),
                });
                continue;
            }
        };

        let lat = match parse_coordinate(&record, lat_col, "lat") {
            Ok(lat) => lat,
            Err(reason) => {
                row_errors.push(RowError {
                    file: file.name.clone(),
                    row,
                    reason,
                });
                continue;
            }
        };
        let lon = match parse_coordinate(&record, lon_col, "lon") {
            Ok(lon) => lon,
            Err(reason) => {
                row_errors.push(RowError {
                    file: file.name.clone(),
                    row,
                    reason,
                });
                continue;
            }
        };

        let name = name_col
            .and_then(|c| record.get(c))
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
            .unwrap_or_else(|| format!("Stop {row}"));

        // stop_number is optional, an unparsable one falls back to the row position
        let stop_number = stop_number_col
            .and_then(|c| record.get(c))
            .and_then(|v| v.parse().ok())
            .unwrap_or(row as u32);

        let address = address_col
            .and_then(|c| record.get(c))
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string());

        stops.push(Stop {
            route_id,
            stop_number,
            name,
            address,
            location: LatLon::new(lat, lon),
        });
    }

    let route = RouteFile {
        route_id,
        name: file_stem(&file.name),
        stops,
    };

    Ok((route, row_errors))
}

fn parse_coordinate(
    record: &csv::StringRecord,
    column: usize,
    what: &str,
) -> Result<f64, String> {
    let value = record.get(column).unwrap_or("");
    if value.is_empty() {
        return Err(format!("missing {what}"));
    }

    value
        .parse()
        .map_err(|_| format!("non-numeric {what} '{value}'"))
}

fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}
