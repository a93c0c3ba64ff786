use serde::Serialize;

use super::geometry::LatLon;

/// A single point of interest belonging to one route. Immutable once loaded.
#[derive(Clone, Debug, Serialize)]
pub struct Stop {
    /// Index of the uploaded file this stop came from.
    pub route_id: usize,
    /// Taken from the `stop_number` column when present, otherwise the
    /// 1-based row position within the file.
    pub stop_number: u32,
    pub name: String,
    pub address: Option<String>,
    pub location: LatLon,
}
