//! Isochrone search parameters
//!
//! Request-layer helpers normalise what a caller asks for (unsorted ranges,
//! kilometres, an interval) into the ascending, metre- or second-based
//! [`SearchParameters`] the builder consumes.

use crate::profiles::RoutingProfile;
use geo::Coord;
use isoline_common::{Error, Result};
use serde::Serialize;
use std::str::FromStr;

/// What the range values measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeType {
    /// Seconds
    Time,
    /// Metres
    Distance,
}

impl FromStr for RangeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "time" => Ok(RangeType::Time),
            "distance" => Ok(RangeType::Distance),
            _ => Err(Error::UnknownRangeType(s.to_string())),
        }
    }
}

/// Whether the location is where travel starts or ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    /// Forward search: places reachable from the location
    #[default]
    Start,
    /// Backward search: places that can reach the location
    Destination,
}

impl FromStr for LocationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(LocationType::Start),
            "destination" => Ok(LocationType::Destination),
            _ => Err(Error::UnknownLocationType(s.to_string())),
        }
    }
}

/// Length units for distance ranges and area output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Units {
    #[default]
    #[serde(rename = "m")]
    Meters,
    #[serde(rename = "km")]
    Kilometers,
    #[serde(rename = "mi")]
    Miles,
}

impl Units {
    /// Metres per unit
    pub fn in_meters(&self) -> f64 {
        match self {
            Units::Meters => 1.0,
            Units::Kilometers => 1000.0,
            Units::Miles => 1609.344,
        }
    }

    /// Convert an area in square metres to square units
    pub fn area_from_m2(&self, area_m2: f64) -> f64 {
        let f = self.in_meters();
        area_m2 / (f * f)
    }
}

impl FromStr for Units {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "m" => Ok(Units::Meters),
            "km" => Ok(Units::Kilometers),
            "mi" => Ok(Units::Miles),
            _ => Err(Error::UnknownUnits(s.to_string())),
        }
    }
}

/// Derived attributes an isochrone may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    Area,
    ReachFactor,
}

impl FromStr for Attribute {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "area" => Ok(Attribute::Area),
            "reachfactor" => Ok(Attribute::ReachFactor),
            _ => Err(Error::UnknownAttribute(s.to_string())),
        }
    }
}

/// Largest number of ranges an interval request may expand to
pub const MAX_INTERVALS: usize = 10;

/// One isochrone request for a single location
#[derive(Debug, Clone)]
pub struct SearchParameters {
    location: Coord<f64>,
    ranges: Vec<f64>,
    range_type: RangeType,
    profile: RoutingProfile,
    location_type: LocationType,
    attributes: Vec<Attribute>,
    area_units: Units,
    smoothing_factor: Option<f64>,
}

impl SearchParameters {
    /// Create parameters for a location
    ///
    /// `ranges` are in seconds for time and in `units` for distance. They are
    /// sorted and de-duplicated; distance ranges are converted to metres.
    pub fn new(
        location: Coord<f64>,
        ranges: &[f64],
        range_type: RangeType,
        units: Units,
        profile: RoutingProfile,
    ) -> Result<Self> {
        if !(location.x.abs() <= 180.0 && location.y.abs() <= 90.0) {
            return Err(Error::InvalidLocation(format!(
                "({}, {}) is not a lon/lat coordinate",
                location.x, location.y
            )));
        }
        if ranges.is_empty() {
            return Err(Error::InvalidRanges("at least one range is required".into()));
        }
        if let Some(bad) = ranges.iter().find(|r| !r.is_finite() || **r <= 0.0) {
            return Err(Error::InvalidRanges(format!(
                "range values must be positive, got {bad}"
            )));
        }

        let factor = match range_type {
            RangeType::Time => 1.0,
            RangeType::Distance => units.in_meters(),
        };
        let mut ranges: Vec<f64> = ranges.iter().map(|r| r * factor).collect();
        ranges.sort_by(f64::total_cmp);
        ranges.dedup();

        Ok(Self {
            location,
            ranges,
            range_type,
            profile,
            location_type: LocationType::Start,
            attributes: Vec::new(),
            area_units: Units::Meters,
            smoothing_factor: None,
        })
    }

    /// Create parameters from a maximum range split into equal intervals
    ///
    /// `max_range = 600, interval = 200` yields `[200, 400, 600]`. A final
    /// partial interval ends at `max_range`. At most [`MAX_INTERVALS`]
    /// ranges are produced.
    pub fn from_interval(
        location: Coord<f64>,
        max_range: f64,
        interval: f64,
        range_type: RangeType,
        units: Units,
        profile: RoutingProfile,
    ) -> Result<Self> {
        if !(max_range > 0.0 && max_range.is_finite()) {
            return Err(Error::InvalidRanges(format!(
                "range must be positive and finite, got {max_range}"
            )));
        }
        if !(interval > 0.0 && interval.is_finite()) {
            return Err(Error::InvalidRanges(format!(
                "interval must be positive, got {interval}"
            )));
        }

        // tolerance keeps 0.8 / 0.1 at 8 steps rather than 9
        let steps = (max_range / interval - 1e-9).ceil().max(1.0);
        if steps > MAX_INTERVALS as f64 {
            return Err(Error::InvalidRanges(format!(
                "{steps} intervals requested, at most {MAX_INTERVALS} allowed"
            )));
        }

        let ranges: Vec<f64> = (1..steps as usize)
            .map(|k| k as f64 * interval)
            .filter(|&value| value < max_range)
            .chain(std::iter::once(max_range))
            .collect();

        Self::new(location, &ranges, range_type, units, profile)
    }

    pub fn with_location_type(mut self, location_type: LocationType) -> Self {
        self.location_type = location_type;
        self
    }

    pub fn with_attributes(mut self, attributes: &[Attribute]) -> Self {
        self.attributes.clear();
        for attribute in attributes {
            if !self.attributes.contains(attribute) {
                self.attributes.push(*attribute);
            }
        }
        self
    }

    pub fn with_area_units(mut self, units: Units) -> Self {
        self.area_units = units;
        self
    }

    /// Set the smoothing factor (0 = most detailed, 100 = smoothest)
    pub fn with_smoothing_factor(mut self, smoothing: f64) -> Result<Self> {
        if !(0.0..=100.0).contains(&smoothing) {
            return Err(Error::InvalidSmoothing(smoothing));
        }
        self.smoothing_factor = Some(smoothing);
        Ok(self)
    }

    pub fn location(&self) -> Coord<f64> {
        self.location
    }

    /// Ascending thresholds, seconds or metres
    pub fn ranges(&self) -> &[f64] {
        &self.ranges
    }

    pub fn max_range(&self) -> f64 {
        self.ranges.last().copied().unwrap_or(0.0)
    }

    pub fn range_type(&self) -> RangeType {
        self.range_type
    }

    pub fn profile(&self) -> RoutingProfile {
        self.profile
    }

    pub fn location_type(&self) -> LocationType {
        self.location_type
    }

    pub fn has_attribute(&self, attribute: Attribute) -> bool {
        self.attributes.contains(&attribute)
    }

    pub fn area_units(&self) -> Units {
        self.area_units
    }

    pub fn smoothing_factor(&self) -> Option<f64> {
        self.smoothing_factor
    }

    /// Reach distance in metres for a threshold at the given speed
    pub fn reach_distance(&self, threshold: f64, max_speed_kmh: f64) -> f64 {
        match self.range_type {
            RangeType::Time => threshold * max_speed_kmh / 3.6,
            RangeType::Distance => threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEIDELBERG: Coord<f64> = Coord { x: 8.681495, y: 49.41461 };

    #[test]
    fn test_ranges_sorted_and_deduplicated() {
        let params = SearchParameters::new(
            HEIDELBERG,
            &[600.0, 400.0, 300.0, 400.0],
            RangeType::Time,
            Units::Meters,
            RoutingProfile::DrivingCar,
        )
        .unwrap();
        assert_eq!(params.ranges(), &[300.0, 400.0, 600.0]);
        assert_eq!(params.max_range(), 600.0);
    }

    #[test]
    fn test_distance_units_converted() {
        let params = SearchParameters::new(
            HEIDELBERG,
            &[1.5],
            RangeType::Distance,
            Units::Kilometers,
            RoutingProfile::FootWalking,
        )
        .unwrap();
        assert_eq!(params.ranges(), &[1500.0]);

        // units only apply to distance ranges
        let params = SearchParameters::new(
            HEIDELBERG,
            &[1800.0],
            RangeType::Time,
            Units::Miles,
            RoutingProfile::FootWalking,
        )
        .unwrap();
        assert_eq!(params.ranges(), &[1800.0]);
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        for ranges in [&[][..], &[0.0][..], &[-5.0][..], &[f64::NAN][..]] {
            let result = SearchParameters::new(
                HEIDELBERG,
                ranges,
                RangeType::Time,
                Units::Meters,
                RoutingProfile::DrivingCar,
            );
            assert!(matches!(result, Err(Error::InvalidRanges(_))), "{ranges:?}");
        }
    }

    #[test]
    fn test_invalid_location_rejected() {
        let result = SearchParameters::new(
            Coord { x: 200.0, y: 49.0 },
            &[300.0],
            RangeType::Time,
            Units::Meters,
            RoutingProfile::DrivingCar,
        );
        assert!(matches!(result, Err(Error::InvalidLocation(_))));
    }

    #[test]
    fn test_interval_expansion() {
        let params = SearchParameters::from_interval(
            HEIDELBERG,
            600.0,
            200.0,
            RangeType::Time,
            Units::Meters,
            RoutingProfile::DrivingCar,
        )
        .unwrap();
        assert_eq!(params.ranges(), &[200.0, 400.0, 600.0]);

        let params = SearchParameters::from_interval(
            HEIDELBERG,
            500.0,
            200.0,
            RangeType::Time,
            Units::Meters,
            RoutingProfile::DrivingCar,
        )
        .unwrap();
        assert_eq!(params.ranges(), &[200.0, 400.0, 500.0]);
    }

    #[test]
    fn test_interval_steps_do_not_drift() {
        let params = SearchParameters::from_interval(
            HEIDELBERG,
            0.8,
            0.1,
            RangeType::Distance,
            Units::Kilometers,
            RoutingProfile::DrivingCar,
        )
        .unwrap();
        let ranges = params.ranges();

        assert_eq!(ranges.len(), 8);
        assert_eq!(ranges.last().copied(), Some(800.0));
        for pair in ranges.windows(2) {
            assert!(pair[1] - pair[0] > 99.0, "near-duplicate steps: {ranges:?}");
        }
    }

    #[test]
    fn test_interval_limits() {
        let expand = |max_range: f64, interval: f64| {
            SearchParameters::from_interval(
                HEIDELBERG,
                max_range,
                interval,
                RangeType::Time,
                Units::Meters,
                RoutingProfile::DrivingCar,
            )
        };

        assert!(matches!(expand(f64::INFINITY, 60.0), Err(Error::InvalidRanges(_))));
        assert!(matches!(expand(f64::NAN, 60.0), Err(Error::InvalidRanges(_))));
        assert!(matches!(expand(-600.0, 60.0), Err(Error::InvalidRanges(_))));
        assert!(matches!(expand(600.0, 0.0), Err(Error::InvalidRanges(_))));
        assert!(matches!(expand(1e8, 1.0), Err(Error::InvalidRanges(_))));
        assert!(matches!(expand(1800.0, 100.0), Err(Error::InvalidRanges(_))));

        assert_eq!(expand(1000.0, 100.0).unwrap().ranges().len(), MAX_INTERVALS);
        // interval larger than the range gives the range alone
        assert_eq!(expand(300.0, 500.0).unwrap().ranges(), &[300.0]);
    }

    #[test]
    fn test_unknown_units() {
        assert!(matches!("yd".parse::<Units>(), Err(Error::UnknownUnits(_))));
        assert_eq!("mi".parse::<Units>().unwrap(), Units::Miles);
    }

    #[test]
    fn test_attributes_and_smoothing() {
        let params = SearchParameters::new(
            HEIDELBERG,
            &[400.0],
            RangeType::Time,
            Units::Meters,
            RoutingProfile::DrivingCar,
        )
        .unwrap()
        .with_attributes(&["area".parse().unwrap(), "reachfactor".parse().unwrap()])
        .with_smoothing_factor(25.0)
        .unwrap();

        assert!(params.has_attribute(Attribute::Area));
        assert!(params.has_attribute(Attribute::ReachFactor));
        assert_eq!(params.smoothing_factor(), Some(25.0));

        assert!(matches!(
            "total_pop".parse::<Attribute>(),
            Err(Error::UnknownAttribute(_))
        ));
        assert!(matches!(
            params.clone().with_smoothing_factor(101.0),
            Err(Error::InvalidSmoothing(_))
        ));
    }

    #[test]
    fn test_reach_distance() {
        let time = SearchParameters::new(
            HEIDELBERG,
            &[360.0],
            RangeType::Time,
            Units::Meters,
            RoutingProfile::DrivingCar,
        )
        .unwrap();
        assert!((time.reach_distance(360.0, 36.0) - 3600.0).abs() < 1e-9);

        let distance = SearchParameters::new(
            HEIDELBERG,
            &[2.0],
            RangeType::Distance,
            Units::Kilometers,
            RoutingProfile::DrivingCar,
        )
        .unwrap();
        assert_eq!(distance.reach_distance(2000.0, 36.0), 2000.0);
    }

    #[test]
    fn test_area_units() {
        assert!((Units::Kilometers.area_from_m2(2_500_000.0) - 2.5).abs() < 1e-12);
        assert_eq!(Units::Meters.area_from_m2(42.0), 42.0);
    }
}
