use anyhow::bail;
use serde::{Deserialize, Serialize};

/// A WGS84 coordinate.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        LatLon { lat, lon }
    }
}

/// A closed polygon ring: the first vertex equals the last one and there
/// are at least 3 distinct vertices.
///
/// Can only be built through [`Ring::new`], which closes an open ring and
/// rejects degenerate input, so downstream code never has to re-check.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Ring(Vec<LatLon>);

impl Ring {
    pub fn new(mut vertices: Vec<LatLon>) -> anyhow::Result<Self> {
        if let (Some(first), Some(last)) = (vertices.first(), vertices.last()) {
            if first != last {
                let first = *first;
                vertices.push(first);
            }
        }

        let distinct = count_distinct(&vertices);
        if distinct < 3 {
            bail!("degenerate ring with {distinct} distinct vertices");
        }

        Ok(Ring(vertices))
    }

    pub fn vertices(&self) -> &[LatLon] {
        &self.0
    }

    pub fn distinct_vertices(&self) -> usize {
        count_distinct(&self.0)
    }
}

fn count_distinct(vertices: &[LatLon]) -> usize {
    let mut distinct: Vec<LatLon> = vec![];
    for v in vertices {
        if !distinct.contains(v) {
            distinct.push(*v);
        }
    }
    distinct.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_ring_gets_closed() -> anyhow::Result<()> {
        let ring = Ring::new(vec![
            LatLon::new(40.0, -73.0),
            LatLon::new(40.1, -73.0),
            LatLon::new(40.1, -73.1),
        ])?;

        assert_eq!(ring.vertices().first(), ring.vertices().last());
        assert_eq!(ring.vertices().len(), 4);
        assert_eq!(ring.distinct_vertices(), 3);

        Ok(())
    }

    #[test]
    fn already_closed_ring_is_untouched() -> anyhow::Result<()> {
        let vertices = vec![
            LatLon::new(40.0, -73.0),
            LatLon::new(40.1, -73.0),
            LatLon::new(40.1, -73.1),
            LatLon::new(40.0, -73.0),
        ];

        let ring = Ring::new(vertices.clone())?;
        assert_eq!(ring.vertices(), vertices.as_slice());

        Ok(())
    }

    #[test]
    fn degenerate_rings_are_rejected() {
        assert!(Ring::new(vec![]).is_err());
        assert!(Ring::new(vec![LatLon::new(40.0, -73.0)]).is_err());
        assert!(Ring::new(vec![LatLon::new(40.0, -73.0), LatLon::new(40.1, -73.0)]).is_err());
        // 3 vertices but only 2 distinct ones
        assert!(Ring::new(vec![
            LatLon::new(40.0, -73.0),
            LatLon::new(40.1, -73.0),
            LatLon::new(40.0, -73.0),
        ])
        .is_err());
    }
}
