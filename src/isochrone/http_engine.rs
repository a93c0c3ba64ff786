//! Responsible for talking to a Valhalla-style isochrone HTTP service
//!
//! One request per (point, threshold): pedestrian costing with the
//! configured walking speed, a single contour, polygon output. The
//! response is a GeoJSON feature collection; the outer ring of the first
//! polygon is the isochrone.

use std::backtrace::Backtrace;
use std::future::Future;

use geojson::{GeoJson, Geometry};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{Instrument, info_span};

use super::{EngineError, IsochroneEngine};
use crate::model::{LatLon, Ring};

// Valhalla error codes for points the walking network can't serve
const UNREACHABLE_ERROR_CODES: [u64; 3] = [170, 171, 442];

pub struct HttpIsochroneEngine {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIsochroneEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        HttpIsochroneEngine {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

impl IsochroneEngine for HttpIsochroneEngine {
    fn walk_isochrone(
        &self,
        origin: LatLon,
        walking_speed_mps: f64,
        threshold_min: u32,
    ) -> impl Future<Output = Result<Ring, EngineError>> + Send {
        async move {
            let body = serde_json::json!({
                "locations": [{"lat": origin.lat, "lon": origin.lon}],
                "costing": "pedestrian",
                "costing_options": {
                    // Valhalla wants km/h
                    "pedestrian": {"walking_speed": walking_speed_mps * 3.6}
                },
                "contours": [{"time": threshold_min}],
                "polygons": true,
            })
            .to_string();

            let response = self
                .client
                .post(format!("{}/isochrone", self.base_url))
                .header(CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .instrument(info_span!("Requesting isochrone"))
                .await?;

            let status = response.status();
            let content = response
                .text()
                .instrument(info_span!("Reading body of response"))
                .await?;

            if !status.is_success() {
                return Err(engine_rejection(status, content));
            }

            parse_isochrone_response(&content)
        }
    }
}

#[derive(Debug, Deserialize)]
struct EngineErrorBody {
    error_code: Option<u64>,
    error: Option<String>,
}

fn engine_rejection(status: reqwest::StatusCode, body: String) -> EngineError {
    if let Ok(parsed) = serde_json::from_str::<EngineErrorBody>(&body) {
        if parsed
            .error_code
            .is_some_and(|code| UNREACHABLE_ERROR_CODES.contains(&code))
        {
            return EngineError::Unreachable;
        }
        if let Some(message) = parsed.error {
            return EngineError::Rejected { message };
        }
    }

    EngineError::Rejected {
        message: format!("HTTP {status}: {body}"),
    }
}

fn parse_isochrone_response(body: &str) -> Result<Ring, EngineError> {
    let geo_json: GeoJson = body.parse().map_err(|e| EngineError::Parsing {
        message: format!("invalid GeoJSON: {e}"),
        body: body.to_string(),
        backtrace: Backtrace::capture(),
    })?;

    let geometries: Vec<Geometry> = match geo_json {
        GeoJson::FeatureCollection(v) => v.features.into_iter().filter_map(|f| f.geometry).collect(),
        GeoJson::Feature(v) => v.geometry.into_iter().collect(),
        GeoJson::Geometry(v) => vec![v],
    };

    for geometry in geometries {
        let outer_ring = match geometry.value {
            geojson::Value::Polygon(rings) => rings.into_iter().next(),
            geojson::Value::MultiPolygon(polygons) => {
                polygons.into_iter().next().and_then(|p| p.into_iter().next())
            }
            _ => continue,
        };

        let Some(outer_ring) = outer_ring else {
            continue;
        };

        let vertex_count = outer_ring.len();
        let mut vertices = Vec::with_capacity(vertex_count);
        for position in outer_ring {
            if position.len() < 2 {
                return Err(EngineError::Parsing {
                    message: "position with fewer than 2 coordinates".to_string(),
                    body: body.to_string(),
                    backtrace: Backtrace::capture(),
                });
            }
            // GeoJSON positions are [lon, lat]
            vertices.push(LatLon::new(position[1], position[0]));
        }

        return Ring::new(vertices).map_err(|_| EngineError::DegeneratePolygon {
            vertices: vertex_count,
        });
    }

    Err(EngineError::Parsing {
        message: "no polygon in engine response".to_string(),
        body: body.to_string(),
        backtrace: Backtrace::capture(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_contour_feature_collection() -> Result<(), EngineError> {
        let body = r##"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"contour": 5, "color": "#bf4040", "metric": "time"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [-73.001, 40.002],
                        [-72.999, 40.001],
                        [-73.000, 39.998],
                        [-73.002, 40.000],
                        [-73.001, 40.002]
                    ]]
                }
            }]
        }"##;

        let ring = parse_isochrone_response(body)?;

        assert_eq!(ring.vertices().first(), ring.vertices().last());
        assert_eq!(ring.distinct_vertices(), 4);
        // [lon, lat] order got flipped into lat/lon
        assert_eq!(ring.vertices()[0], LatLon::new(40.002, -73.001));

        Ok(())
    }

    #[test]
    fn multipolygon_uses_the_first_outer_ring() -> Result<(), EngineError> {
        let body = r##"{
            "type": "Feature",
            "properties": {"contour": 10},
            "geometry": {
                "type": "MultiPolygon",
                "coordinates": [
                    [[[-73.0, 40.0], [-72.9, 40.0], [-72.9, 40.1], [-73.0, 40.0]]],
                    [[[-70.0, 42.0], [-69.9, 42.0], [-69.9, 42.1], [-70.0, 42.0]]]
                ]
            }
        }"##;

        let ring = parse_isochrone_response(body)?;
        assert_eq!(ring.vertices()[0], LatLon::new(40.0, -73.0));

        Ok(())
    }

    #[test]
    fn degenerate_polygon_is_rejected() {
        let body = r##"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-73.0, 40.0], [-73.0, 40.0], [-73.0, 40.0]]]
                }
            }]
        }"##;

        match parse_isochrone_response(body) {
            Err(EngineError::DegeneratePolygon { vertices }) => assert_eq!(vertices, 3),
            other => panic!("expected DegeneratePolygon, got {other:?}"),
        }
    }

    #[test]
    fn response_without_polygons_is_a_parse_error() {
        let body = r##"{"type": "FeatureCollection", "features": []}"##;

        match parse_isochrone_response(body) {
            Err(EngineError::Parsing { message, .. }) => {
                assert!(message.contains("no polygon"))
            }
            other => panic!("expected Parsing, got {other:?}"),
        }
    }

    #[test]
    fn garbage_body_is_a_parse_error() {
        assert!(matches!(
            parse_isochrone_response("<html>504</html>"),
            Err(EngineError::Parsing { .. })
        ));
    }

    #[test]
    fn unreachable_error_codes_map_to_unreachable() {
        let rejection = engine_rejection(
            reqwest::StatusCode::BAD_REQUEST,
            r##"{"error_code": 442, "error": "No path could be found for input", "status_code": 400}"##.to_string(),
        );
        assert!(matches!(rejection, EngineError::Unreachable));
    }

    #[test]
    fn other_engine_errors_keep_their_message() {
        let rejection = engine_rejection(
            reqwest::StatusCode::BAD_REQUEST,
            r##"{"error_code": 154, "error": "Path distance exceeds the max distance limit", "status_code": 400}"##.to_string(),
        );
        match rejection {
            EngineError::Rejected { message } => {
                assert!(message.contains("max distance limit"))
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn non_json_rejection_reports_status_and_body() {
        let rejection = engine_rejection(
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            "upstream down".to_string(),
        );
        match rejection {
            EngineError::Rejected { message } => {
                assert!(message.contains("503"));
                assert!(message.contains("upstream down"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }
}
