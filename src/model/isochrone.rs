use itertools::Itertools;
use serde::Serialize;

use super::geometry::Ring;

/// ~5 km/h
pub const DEFAULT_WALKING_SPEED_MPS: f64 = 1.33;
pub const DEFAULT_THRESHOLDS_MIN: [u32; 2] = [5, 10];

/// Parameters shared by every isochrone request of a single generation run.
#[derive(Clone, Debug, Serialize)]
pub struct IsochroneRequestParams {
    pub walking_speed_mps: f64,
    /// Minutes, deduplicated and sorted ascending.
    pub thresholds_min: Vec<u32>,
}

impl IsochroneRequestParams {
    /// Falls back to the defaults when no thresholds were selected.
    pub fn new(walking_speed_mps: f64, thresholds_min: Vec<u32>) -> Self {
        let mut thresholds_min = thresholds_min.into_iter().unique().collect_vec();
        thresholds_min.sort_unstable();

        if thresholds_min.is_empty() {
            thresholds_min = DEFAULT_THRESHOLDS_MIN.to_vec();
        }

        IsochroneRequestParams {
            walking_speed_mps,
            thresholds_min,
        }
    }
}

impl Default for IsochroneRequestParams {
    fn default() -> Self {
        IsochroneRequestParams::new(DEFAULT_WALKING_SPEED_MPS, vec![])
    }
}

/// One reachable-area polygon, produced once per (stop, threshold) pair.
#[derive(Clone, Debug, Serialize)]
pub struct IsochroneResult {
    pub route_id: usize,
    pub stop_number: u32,
    pub stop_name: String,
    pub threshold_min: u32,
    pub ring: Ring,
}
