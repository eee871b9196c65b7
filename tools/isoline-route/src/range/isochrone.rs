//! Isochrone results and GeoJSON output

use std::f64::consts::PI;

use geo::{Coord, GeodesicArea, Polygon};
use serde_json::{json, Value};

use crate::params::{Attribute, RangeType, SearchParameters, Units};

/// Polygon reachable within one threshold
#[derive(Debug, Clone)]
pub struct Isochrone {
    polygon: Polygon<f64>,
    threshold: f64,
    max_radius: f64,
    area: Option<f64>,
    reach_factor: Option<f64>,
}

impl Isochrone {
    pub fn new(polygon: Polygon<f64>, threshold: f64, max_radius: f64) -> Self {
        Self {
            polygon,
            threshold,
            max_radius,
            area: None,
            reach_factor: None,
        }
    }

    /// Fill in the attributes the request asks for
    pub fn with_attributes(mut self, params: &SearchParameters) -> Self {
        if !params.has_attribute(Attribute::Area) && !params.has_attribute(Attribute::ReachFactor) {
            return self;
        }

        let area_m2 = self.polygon.geodesic_area_unsigned();
        if params.has_attribute(Attribute::Area) {
            self.area = Some(params.area_units().area_from_m2(area_m2));
        }
        if params.has_attribute(Attribute::ReachFactor) && self.max_radius > 0.0 {
            let disc = PI * self.max_radius * self.max_radius;
            self.reach_factor = Some((area_m2 / disc).min(1.0));
        }
        self
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Range value this polygon was built for
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Reach distance of the threshold in metres
    pub fn max_radius(&self) -> f64 {
        self.max_radius
    }

    /// Area in the requested area units
    pub fn area(&self) -> Option<f64> {
        self.area
    }

    /// Area relative to the disc of radius `max_radius`
    pub fn reach_factor(&self) -> Option<f64> {
        self.reach_factor
    }

    fn ring(&self) -> Vec<[f64; 2]> {
        self.polygon.exterior().coords().map(|c| [c.x, c.y]).collect()
    }
}

/// Isochrones for one location, ordered by ascending threshold
#[derive(Debug, Clone)]
pub struct IsochroneMap {
    group_index: usize,
    center: Coord<f64>,
    range_type: RangeType,
    area_units: Units,
    isochrones: Vec<Isochrone>,
}

impl IsochroneMap {
    pub fn new(params: &SearchParameters) -> Self {
        Self {
            group_index: 0,
            center: params.location(),
            range_type: params.range_type(),
            area_units: params.area_units(),
            isochrones: Vec::new(),
        }
    }

    /// Position of the location within a batch request
    pub fn with_group_index(mut self, group_index: usize) -> Self {
        self.group_index = group_index;
        self
    }

    pub(crate) fn push(&mut self, isochrone: Isochrone) {
        self.isochrones.push(isochrone);
    }

    pub fn group_index(&self) -> usize {
        self.group_index
    }

    pub fn center(&self) -> Coord<f64> {
        self.center
    }

    pub fn isochrones(&self) -> &[Isochrone] {
        &self.isochrones
    }

    pub fn len(&self) -> usize {
        self.isochrones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.isochrones.is_empty()
    }

    /// GeoJSON features, one per isochrone
    pub fn features(&self) -> Vec<Value> {
        self.isochrones
            .iter()
            .map(|iso| {
                let mut properties = json!({
                    "group_index": self.group_index,
                    "value": iso.threshold,
                    "range_type": self.range_type,
                    "center": [self.center.x, self.center.y],
                });
                if let Some(area) = iso.area {
                    properties["area"] = json!(area);
                    properties["area_units"] = json!(self.area_units);
                }
                if let Some(reach_factor) = iso.reach_factor {
                    properties["reachfactor"] = json!(reach_factor);
                }
                json!({
                    "type": "Feature",
                    "properties": properties,
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [iso.ring()],
                    },
                })
            })
            .collect()
    }
}

/// FeatureCollection over any number of maps
pub fn feature_collection(maps: &[IsochroneMap]) -> Value {
    let features: Vec<Value> = maps.iter().flat_map(IsochroneMap::features).collect();
    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::RoutingProfile;
    use geo::LineString;

    /// Roughly 1.1 km x 0.73 km box at latitude 49
    fn box_polygon() -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (8.0, 49.0),
                (8.01, 49.0),
                (8.01, 49.01),
                (8.0, 49.01),
                (8.0, 49.0),
            ]),
            vec![],
        )
    }

    fn params(attributes: &[Attribute], units: Units) -> SearchParameters {
        SearchParameters::new(
            Coord { x: 8.005, y: 49.005 },
            &[300.0],
            RangeType::Time,
            Units::Meters,
            RoutingProfile::DrivingCar,
        )
        .unwrap()
        .with_attributes(attributes)
        .with_area_units(units)
    }

    #[test]
    fn test_attributes_only_when_requested() {
        let iso = Isochrone::new(box_polygon(), 300.0, 1000.0)
            .with_attributes(&params(&[], Units::Meters));
        assert!(iso.area().is_none());
        assert!(iso.reach_factor().is_none());
    }

    #[test]
    fn test_area_units() {
        let p = params(&[Attribute::Area], Units::Meters);
        let m2 = Isochrone::new(box_polygon(), 300.0, 1000.0).with_attributes(&p).area().unwrap();
        // 0.01 deg lat ~ 1112 m, 0.01 deg lon at 49N ~ 730 m
        assert!(m2 > 750_000.0 && m2 < 850_000.0, "area {m2}");

        let p = params(&[Attribute::Area], Units::Kilometers);
        let km2 = Isochrone::new(box_polygon(), 300.0, 1000.0).with_attributes(&p).area().unwrap();
        assert!((km2 - m2 / 1e6).abs() < 1e-9);
    }

    #[test]
    fn test_reach_factor_bounded() {
        let p = params(&[Attribute::ReachFactor], Units::Meters);

        let wide = Isochrone::new(box_polygon(), 300.0, 1000.0).with_attributes(&p);
        let rf = wide.reach_factor().unwrap();
        assert!(rf > 0.2 && rf < 0.3, "reachfactor {rf}");

        // polygon larger than its disc is clamped
        let tight = Isochrone::new(box_polygon(), 300.0, 100.0).with_attributes(&p);
        assert_eq!(tight.reach_factor(), Some(1.0));
    }

    #[test]
    fn test_geojson_feature() {
        let p = params(&[Attribute::Area, Attribute::ReachFactor], Units::Kilometers);
        let mut map = IsochroneMap::new(&p).with_group_index(2);
        map.push(Isochrone::new(box_polygon(), 300.0, 1000.0).with_attributes(&p));

        let collection = feature_collection(&[map]);
        let feature = &collection["features"][0];
        assert_eq!(collection["type"], "FeatureCollection");
        assert_eq!(feature["geometry"]["type"], "Polygon");
        assert_eq!(feature["geometry"]["coordinates"][0].as_array().unwrap().len(), 5);
        assert_eq!(feature["properties"]["group_index"], 2);
        assert_eq!(feature["properties"]["value"], 300.0);
        assert_eq!(feature["properties"]["range_type"], "time");
        assert_eq!(feature["properties"]["area_units"], "km");
        assert!(feature["properties"]["reachfactor"].is_number());
    }
}
