//! Responsible for fanning isochrone requests out to the engine
//!
//! The polygon computation itself lives behind [`IsochroneEngine`]; this
//! module only issues one request per (stop, threshold) pair, keeps the
//! association back to the originating stop and route, and records
//! per-pair failures without aborting the batch.

use std::backtrace::Backtrace;
use std::future::Future;

use tracing::{Instrument, error, info, info_span};

use crate::model::{
    IsochroneFailure, IsochroneRequestParams, IsochroneResult, LatLon, Ring, RouteFile,
};

pub mod http_engine;

/// The external reachable-area computation: given a point, a walking speed
/// and a duration, return the polygon of the area reachable in that time.
pub trait IsochroneEngine {
    fn walk_isochrone(
        &self,
        origin: LatLon,
        walking_speed_mps: f64,
        threshold_min: u32,
    ) -> impl Future<Output = Result<Ring, EngineError>> + Send;
}

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("error reaching the isochrone engine \n{} \n{}", source, backtrace)]
    HttpRequest {
        #[from]
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    #[error("error parsing the engine response: {} \n{} \n{}", message, body, backtrace)]
    Parsing {
        message: String,
        body: String,
        backtrace: Backtrace,
    },

    #[error("location is unreachable on the walking network")]
    Unreachable,

    #[error("the engine rejected the request: {message}")]
    Rejected { message: String },

    #[error("the engine returned a degenerate polygon with {vertices} vertices")]
    DegeneratePolygon { vertices: usize },
}

/// Requests one polygon per (stop, threshold) pair, sequentially.
///
/// A failed pair yields no polygon and is recorded for the user-facing
/// report, the remaining pairs still go through.
pub async fn request_isochrones<E: IsochroneEngine>(
    engine: &E,
    routes: &[RouteFile],
    params: &IsochroneRequestParams,
) -> (Vec<IsochroneResult>, Vec<IsochroneFailure>) {
    let mut results = vec![];
    let mut failures = vec![];

    for route in routes {
        for stop in &route.stops {
            for &threshold_min in &params.thresholds_min {
                let request = engine
                    .walk_isochrone(stop.location, params.walking_speed_mps, threshold_min)
                    .instrument(info_span!(
                        "isochrone request",
                        route = %route.name,
                        stop = stop.stop_number,
                        threshold_min,
                    ));

                match request.await {
                    Ok(ring) => results.push(IsochroneResult {
                        route_id: route.route_id,
                        stop_number: stop.stop_number,
                        stop_name: stop.name.clone(),
                        threshold_min,
                        ring,
                    }),
                    Err(e) => {
                        error!(
                            "isochrone failed for stop {} ({}) at {} min: {e}",
                            stop.name, route.name, threshold_min
                        );
                        failures.push(IsochroneFailure {
                            route: route.name.clone(),
                            stop_number: stop.stop_number,
                            stop_name: stop.name.clone(),
                            threshold_min,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    info!(
        "got {} polygons, {} failed pairs",
        results.len(),
        failures.len()
    );

    (results, failures)
}
