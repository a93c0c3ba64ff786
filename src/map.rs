//! Responsible for assembling routes, stops and isochrones into one
//! layered map document
//!
//! The document is pure data; `html` turns it into the downloadable
//! artifact. Layers default to visible and toggling a layer only flips
//! its flag, the geometry underneath never changes.

use anyhow::Context;
use serde::Serialize;

use crate::model::{IsochroneRequestParams, IsochroneResult, LatLon, RouteFile, Stop};

pub mod html;

pub const DEFAULT_ZOOM: u32 = 13;

// Original styling: the smallest threshold stands out, the rest share one color
pub const SMALLEST_THRESHOLD_COLOR: &str = "#fff700";
pub const OTHER_THRESHOLD_COLOR: &str = "#1f77b4";

/// One route's polyline plus its stop markers, toggleable as a unit.
#[derive(Clone, Debug, Serialize)]
pub struct RouteLayer {
    pub route_id: usize,
    pub name: String,
    pub visible: bool,
    /// Stop locations in file order, drawn as the route polyline.
    pub polyline: Vec<LatLon>,
    pub stops: Vec<Stop>,
}

/// All isochrone polygons of one duration, toggleable as a unit.
#[derive(Clone, Debug, Serialize)]
pub struct ThresholdLayer {
    pub minutes: u32,
    pub color: String,
    pub visible: bool,
}

/// Aggregate of one generation run, discarded after export.
#[derive(Clone, Debug, Serialize)]
pub struct MapDocument {
    pub center: LatLon,
    pub zoom: u32,
    pub routes: Vec<RouteLayer>,
    pub thresholds: Vec<ThresholdLayer>,
    pub isochrones: Vec<IsochroneResult>,
}

impl MapDocument {
    /// Centered on the first stop of the first route.
    pub fn assemble(
        routes: &[RouteFile],
        isochrones: Vec<IsochroneResult>,
        params: &IsochroneRequestParams,
    ) -> anyhow::Result<Self> {
        let center = routes
            .first()
            .and_then(|r| r.stops.first())
            .map(|s| s.location)
            .context("can't assemble a map out of zero routes")?;

        let route_layers = routes
            .iter()
            .map(|route| RouteLayer {
                route_id: route.route_id,
                name: route.name.clone(),
                visible: true,
                polyline: route.stops.iter().map(|s| s.location).collect(),
                stops: route.stops.clone(),
            })
            .collect();

        let smallest = params.thresholds_min.iter().copied().min();
        let threshold_layers = params
            .thresholds_min
            .iter()
            .map(|&minutes| ThresholdLayer {
                minutes,
                color: if Some(minutes) == smallest {
                    SMALLEST_THRESHOLD_COLOR.to_string()
                } else {
                    OTHER_THRESHOLD_COLOR.to_string()
                },
                visible: true,
            })
            .collect();

        Ok(MapDocument {
            center,
            zoom: DEFAULT_ZOOM,
            routes: route_layers,
            thresholds: threshold_layers,
            isochrones,
        })
    }

    pub fn set_route_visible(&mut self, route_id: usize, visible: bool) {
        for route in &mut self.routes {
            if route.route_id == route_id {
                route.visible = visible;
            }
        }
    }

    pub fn set_threshold_visible(&mut self, minutes: u32, visible: bool) {
        for threshold in &mut self.thresholds {
            if threshold.minutes == minutes {
                threshold.visible = visible;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isochrone::tests::{SquareEngine, two_stop_route};
    use crate::isochrone::request_isochrones;

    async fn assembled() -> MapDocument {
        let routes = two_stop_route();
        let params = IsochroneRequestParams::new(1.33, vec![5, 10]);
        let (results, _) = request_isochrones(&SquareEngine, &routes, &params).await;
        MapDocument::assemble(&routes, results, &params).unwrap()
    }

    #[tokio::test]
    async fn one_polyline_per_route_and_colors_per_threshold() {
        let doc = assembled().await;

        assert_eq!(doc.center, LatLon::new(40.0, -73.0));
        assert_eq!(doc.zoom, DEFAULT_ZOOM);

        assert_eq!(doc.routes.len(), 1);
        assert_eq!(doc.routes[0].polyline.len(), 2);
        assert_eq!(doc.routes[0].stops.len(), 2);

        assert_eq!(doc.thresholds.len(), 2);
        assert_eq!(doc.thresholds[0].color, SMALLEST_THRESHOLD_COLOR);
        assert_eq!(doc.thresholds[1].color, OTHER_THRESHOLD_COLOR);

        assert_eq!(doc.isochrones.len(), 4);
    }

    #[tokio::test]
    async fn layers_default_to_visible() {
        let doc = assembled().await;

        assert!(doc.routes.iter().all(|r| r.visible));
        assert!(doc.thresholds.iter().all(|t| t.visible));
    }

    #[tokio::test]
    async fn toggling_visibility_never_touches_geometry() {
        let mut doc = assembled().await;
        let before = serde_json::to_string(&doc.isochrones).unwrap();
        let polyline_before = doc.routes[0].polyline.clone();

        doc.set_threshold_visible(5, false);
        doc.set_threshold_visible(5, true);
        doc.set_route_visible(0, false);
        doc.set_route_visible(0, true);

        assert!(doc.routes[0].visible);
        assert!(doc.thresholds[0].visible);
        assert_eq!(serde_json::to_string(&doc.isochrones).unwrap(), before);
        assert_eq!(doc.routes[0].polyline, polyline_before);
    }
}
