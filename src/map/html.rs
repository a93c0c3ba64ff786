//! Responsible for exporting a [`MapDocument`] as one self-contained HTML file
//!
//! All geometry and the generation report are embedded as inline JSON;
//! Leaflet comes from pinned CDN URLs so the file opens straight from
//! disk without a server.

use crate::model::GenerationReport;

use super::MapDocument;

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("error serializing map geometry \n{source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

pub fn export_html(doc: &MapDocument, report: &GenerationReport) -> Result<String, ExportError> {
    let data = serde_json::to_string(&serde_json::json!({
        "map": doc,
        "report": report,
    }))?;

    // user-supplied strings must not be able to close the inline <script>
    let data = data.replace("</", "<\\/");

    Ok(TEMPLATE.replace("__MAP_DATA__", &data))
}

const TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Isochrone Map</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>
html, body, #map { height: 100%; margin: 0; }
.legend, .report {
    background: white;
    padding: 10px;
    border-radius: 6px;
    box-shadow: 0 0 6px rgba(0,0,0,.4);
    max-width: 320px;
    max-height: 300px;
    overflow-y: auto;
    font: 13px/1.4 sans-serif;
}
.legend .swatch { padding: 5px 15px; display: inline-block; }
.report ul { margin: 4px 0; padding-left: 18px; }
</style>
</head>
<body>
<div id="map"></div>
<script>
const DATA = __MAP_DATA__;

const doc = DATA.map;
const report = DATA.report;

const map = L.map('map').setView([doc.center.lat, doc.center.lon], doc.zoom);
L.tileLayer('https://tile.openstreetmap.org/{z}/{x}/{y}.png', {
    maxZoom: 19,
    attribution: '&copy; OpenStreetMap contributors'
}).addTo(map);

function esc(s) {
    return String(s).replace(/[&<>"']/g, function (c) {
        return {'&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;'}[c];
    });
}

const colorOf = {};
doc.thresholds.forEach(function (t) { colorOf[t.minutes] = t.color; });

const enabledRoutes = new Set();
const enabledThresholds = new Set();
const overlays = {};

// Isochrone polygons grouped per (route, threshold). A group is on the map
// only while both its route layer and its threshold layer are enabled.
const pairGroups = {};
doc.isochrones.forEach(function (iso) {
    const key = iso.route_id + ':' + iso.threshold_min;
    if (!pairGroups[key]) { pairGroups[key] = L.layerGroup(); }
    const color = colorOf[iso.threshold_min];
    L.polygon(iso.ring.map(function (p) { return [p.lat, p.lon]; }), {
        color: color, fillColor: color, weight: 2, fillOpacity: 0.4
    }).bindPopup('<b>' + esc(iso.stop_name) + '</b><br>' + iso.threshold_min + ' min walk')
      .addTo(pairGroups[key]);
});

function syncIsochrones() {
    Object.keys(pairGroups).forEach(function (key) {
        const parts = key.split(':');
        const on = enabledRoutes.has(Number(parts[0])) && enabledThresholds.has(Number(parts[1]));
        if (on) { pairGroups[key].addTo(map); } else { map.removeLayer(pairGroups[key]); }
    });
}

doc.routes.forEach(function (route) {
    const routeGroup = L.layerGroup([
        L.polyline(route.polyline.map(function (p) { return [p.lat, p.lon]; }), { weight: 3 })
    ]);
    routeGroup._routeId = route.route_id;
    overlays['Route: ' + esc(route.name)] = routeGroup;

    const markers = L.layerGroup(route.stops.map(function (stop) {
        return L.marker([stop.location.lat, stop.location.lon]).bindPopup(
            '<b>Stop ' + stop.stop_number + '</b><br>' + esc(stop.name)
            + (stop.address ? '<br>' + esc(stop.address) : '')
        );
    }));
    overlays['Stops: ' + esc(route.name)] = markers;

    if (route.visible) {
        routeGroup.addTo(map);
        markers.addTo(map);
        enabledRoutes.add(route.route_id);
    }
});

doc.thresholds.forEach(function (t) {
    const proxy = L.layerGroup();
    proxy._thresholdMin = t.minutes;
    overlays['Walk ' + t.minutes + ' min'] = proxy;
    if (t.visible) {
        proxy.addTo(map);
        enabledThresholds.add(t.minutes);
    }
});

syncIsochrones();

function onOverlayToggle(e) {
    const on = e.type === 'overlayadd';
    if (e.layer._thresholdMin !== undefined) {
        if (on) { enabledThresholds.add(e.layer._thresholdMin); }
        else { enabledThresholds.delete(e.layer._thresholdMin); }
        syncIsochrones();
    } else if (e.layer._routeId !== undefined) {
        if (on) { enabledRoutes.add(e.layer._routeId); }
        else { enabledRoutes.delete(e.layer._routeId); }
        syncIsochrones();
    }
}
map.on('overlayadd', onOverlayToggle);
map.on('overlayremove', onOverlayToggle);

L.control.layers(null, overlays, { collapsed: false }).addTo(map);

const legend = L.control({ position: 'bottomleft' });
legend.onAdd = function () {
    const div = L.DomUtil.create('div', 'legend');
    let rows = '<b>Isochrone Walk Time</b><br>';
    doc.thresholds.forEach(function (t) {
        rows += '<span class="swatch" style="background:' + t.color + '"></span> '
            + t.minutes + ' min<br>';
    });
    div.innerHTML = rows;
    return div;
};
legend.addTo(map);

const problemCount = report.skipped_files.length + report.row_errors.length
    + report.isochrone_failures.length;
if (problemCount > 0) {
    const panel = L.control({ position: 'topright' });
    panel.onAdd = function () {
        const div = L.DomUtil.create('div', 'report');
        let body = '<b>Generation report</b><br>'
            + report.stops_loaded + ' stops, ' + report.polygons_generated
            + ' polygons, ' + problemCount + ' problems<ul>';
        report.skipped_files.forEach(function (f) {
            body += '<li>' + esc(f.reason) + '</li>';
        });
        report.row_errors.forEach(function (r) {
            body += '<li>' + esc(r.file) + ' row ' + r.row + ': ' + esc(r.reason) + '</li>';
        });
        report.isochrone_failures.forEach(function (f) {
            body += '<li>' + esc(f.stop_name) + ' (' + esc(f.route) + ') at '
                + f.threshold_min + ' min: ' + esc(f.reason) + '</li>';
        });
        div.innerHTML = body + '</ul>';
        return div;
    };
    panel.addTo(map);
}
</script>
</body>
</html>
"##;
