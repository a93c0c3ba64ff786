use serde::Serialize;

use super::stop::Stop;

/// One uploaded file, parsed. All stops share `route_id`.
///
/// Routes are identified by upload position rather than by name, so two
/// files with the same stem stay distinct routes.
#[derive(Clone, Debug, Serialize)]
pub struct RouteFile {
    pub route_id: usize,
    /// File stem of the uploaded file.
    pub name: String,
    pub stops: Vec<Stop>,
}
