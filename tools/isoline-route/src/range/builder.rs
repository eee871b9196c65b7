//! Isochrone map assembly
//!
//! One search tree per location; every requested range is cut from that
//! tree in ascending order. The boundary ring of each accepted polygon
//! seeds the next range so that larger isochrones grow outwards from the
//! smaller ones.

use std::sync::Arc;
use std::time::Instant;

use geo::{Coord, GeodesicArea, Polygon};
use isoline_common::{Error, Result};
use rayon::prelude::*;

use super::concave_hull::{build_hull, ConcaveHullConfig, GeoConcaveHull, HullStrategy};
use super::dead_end::DeadEnds;
use super::isochrone::{Isochrone, IsochroneMap};
use super::sampler::{BoundarySampler, SamplingConfig, ThresholdStep};
use crate::params::SearchParameters;
use crate::search::{RouteSearchContext, SearchTree, TreeFinder};

/// Builds isochrone maps from search trees with the concave balls method
pub struct IsochroneMapBuilder {
    context: Option<RouteSearchContext>,
    finder: Arc<dyn TreeFinder>,
    hull: Arc<dyn HullStrategy>,
    sampling: SamplingConfig,
    hull_config: ConcaveHullConfig,
}

impl IsochroneMapBuilder {
    pub fn new(finder: Arc<dyn TreeFinder>) -> Self {
        Self {
            context: None,
            finder,
            hull: Arc::new(GeoConcaveHull),
            sampling: SamplingConfig::default(),
            hull_config: ConcaveHullConfig::default(),
        }
    }

    pub fn with_hull_strategy(mut self, hull: Arc<dyn HullStrategy>) -> Self {
        self.hull = hull;
        self
    }

    pub fn with_sampling_config(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_hull_config(mut self, hull_config: ConcaveHullConfig) -> Self {
        self.hull_config = hull_config;
        self
    }

    /// Bind the graph and profile used by later computations
    pub fn initialize(&mut self, context: RouteSearchContext) {
        self.context = Some(context);
    }

    pub fn context(&self) -> Option<&RouteSearchContext> {
        self.context.as_ref()
    }

    /// Search from the location and build one isochrone per range
    pub fn compute(&self, params: &SearchParameters) -> Result<IsochroneMap> {
        let context = self.context.as_ref().ok_or(Error::MissingSearchContext)?;
        let tree = self.finder.find(context, params)?;
        self.compute_from_tree(context, params, &tree)
    }

    /// Build isochrones from an existing search tree
    pub fn compute_from_tree(
        &self,
        context: &RouteSearchContext,
        params: &SearchParameters,
        tree: &SearchTree,
    ) -> Result<IsochroneMap> {
        let mut map = IsochroneMap::new(params);
        if tree.is_empty() {
            tracing::debug!(
                lon = params.location().x,
                lat = params.location().y,
                "empty search tree, no isochrones"
            );
            return Ok(map);
        }

        let start = Instant::now();
        let dead_ends = DeadEnds::classify(tree);
        let sampler = BoundarySampler::new(
            context.graph(),
            tree,
            &dead_ends,
            params.location(),
            &self.sampling,
        );
        let hull_config = match params.smoothing_factor() {
            Some(smoothing) => ConcaveHullConfig {
                simplify_tolerance: self.hull_config.simplify_tolerance,
                ..ConcaveHullConfig::for_smoothing(smoothing)
            },
            None => self.hull_config,
        };

        tracing::debug!(
            entries = tree.len(),
            dead_ends = dead_ends.count(),
            ranges = params.ranges().len(),
            "building isochrones"
        );

        let mut seeds: Vec<Coord<f64>> = Vec::new();
        let mut previous = 0.0;
        let mut accepted: Option<(Polygon<f64>, f64)> = None;

        for &threshold in params.ranges() {
            let range_start = Instant::now();
            let reach_distance = params.reach_distance(threshold, context.max_speed_kmh());
            let step = ThresholdStep {
                threshold,
                previous,
                reach_distance,
            };
            previous = threshold;

            let (cloud, sample_stats) = sampler.sample(step, &seeds);
            let sample_us = range_start.elapsed().as_micros() as u64;

            match build_hull(cloud.points(), self.hull.as_ref(), &hull_config) {
                Ok((polygon, hull_stats)) => {
                    // a larger range never yields a smaller area
                    let mut area_m2 = polygon.geodesic_area_unsigned();
                    let polygon = match &accepted {
                        Some((last, last_area)) if area_m2 < *last_area => {
                            tracing::debug!(
                                threshold,
                                area_m2,
                                previous_area_m2 = *last_area,
                                "hull shrank, keeping previous polygon"
                            );
                            area_m2 = *last_area;
                            last.clone()
                        }
                        _ => polygon,
                    };
                    tracing::debug!(
                        threshold,
                        points = cloud.len(),
                        rejected = sample_stats.points_rejected,
                        crossing = sample_stats.edges_crossing,
                        hull_vertices = hull_stats.final_vertices,
                        sample_us,
                        hull_us = hull_stats.total_time_us,
                        "isochrone built"
                    );
                    seeds = polygon.exterior().0.clone();
                    accepted = Some((polygon.clone(), area_m2));
                    let isochrone =
                        Isochrone::new(polygon, threshold, reach_distance).with_attributes(params);
                    map.push(isochrone);
                }
                Err(rejection) => {
                    tracing::debug!(
                        threshold,
                        points = cloud.len(),
                        reason = %rejection,
                        "skipping range"
                    );
                }
            }
        }

        tracing::debug!(
            isochrones = map.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "isochrone map finished"
        );

        Ok(map)
    }

    /// Compute maps for many locations in parallel
    ///
    /// Results keep the order of `requests`; each map's group index is its
    /// position in the batch.
    pub fn compute_batch(&self, requests: &[SearchParameters]) -> Vec<Result<IsochroneMap>> {
        requests
            .par_iter()
            .enumerate()
            .map(|(idx, params)| self.compute(params).map(|map| map.with_group_index(idx)))
            .collect()
    }
}

impl std::fmt::Debug for IsochroneMapBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsochroneMapBuilder")
            .field("context", &self.context)
            .field("sampling", &self.sampling)
            .field("hull_config", &self.hull_config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GridSpec, RoadNetwork};
    use crate::params::{Attribute, RangeType, Units};
    use crate::profiles::RoutingProfile;
    use crate::search::DijkstraTreeFinder;
    use geo::{Area, Geometry, LineString, MultiPolygon};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn grid() -> Arc<RoadNetwork> {
        Arc::new(RoadNetwork::grid(&GridSpec {
            origin: Coord { x: 8.0, y: 49.0 },
            rows: 21,
            cols: 21,
            spacing_deg: 0.002,
            speed_kmh: 30.0,
        }))
    }

    fn builder(network: Arc<RoadNetwork>) -> IsochroneMapBuilder {
        let finder = Arc::new(DijkstraTreeFinder::new(network.clone()));
        let mut builder = IsochroneMapBuilder::new(finder);
        builder.initialize(RouteSearchContext::new(network, RoutingProfile::CyclingRegular));
        builder
    }

    fn params(ranges: &[f64]) -> SearchParameters {
        SearchParameters::new(
            Coord { x: 8.02, y: 49.02 },
            ranges,
            RangeType::Time,
            Units::Meters,
            RoutingProfile::CyclingRegular,
        )
        .unwrap()
    }

    struct NoHull;

    impl HullStrategy for NoHull {
        fn hull(&self, _: &[Coord<f64>], _: f64) -> Geometry<f64> {
            Geometry::MultiPolygon(MultiPolygon::new(vec![]))
        }
    }

    /// Returns squares that shrink with every call
    struct ShrinkingHull {
        calls: AtomicUsize,
    }

    impl HullStrategy for ShrinkingHull {
        fn hull(&self, _: &[Coord<f64>], _: f64) -> Geometry<f64> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let half = 0.01 / (call + 1) as f64;
            let (x, y) = (8.02, 49.02);
            Geometry::Polygon(Polygon::new(
                LineString::from(vec![
                    (x - half, y - half),
                    (x + half, y - half),
                    (x + half, y + half),
                    (x - half, y + half),
                    (x - half, y - half),
                ]),
                vec![],
            ))
        }
    }

    #[test]
    fn test_compute_requires_context() {
        let network = grid();
        let builder = IsochroneMapBuilder::new(Arc::new(DijkstraTreeFinder::new(network)));
        let err = builder.compute(&params(&[120.0])).unwrap_err();
        assert!(matches!(err, Error::MissingSearchContext));
    }

    #[test]
    fn test_ranges_grow_outwards() {
        let builder = builder(grid());
        let map = builder.compute(&params(&[240.0, 120.0])).unwrap();

        assert_eq!(map.len(), 2);
        let thresholds: Vec<f64> = map.isochrones().iter().map(|i| i.threshold()).collect();
        assert_eq!(thresholds, vec![120.0, 240.0]);
        let inner = map.isochrones()[0].polygon().unsigned_area();
        let outer = map.isochrones()[1].polygon().unsigned_area();
        assert!(outer > inner);
    }

    #[test]
    fn test_area_never_shrinks_between_ranges() {
        let hull = Arc::new(ShrinkingHull {
            calls: AtomicUsize::new(0),
        });
        let builder = builder(grid()).with_hull_strategy(hull.clone());
        let params = params(&[60.0, 120.0, 240.0]).with_attributes(&[Attribute::Area]);
        let map = builder.compute(&params).unwrap();

        assert_eq!(hull.calls.load(Ordering::SeqCst), 3);
        assert_eq!(map.len(), 3);
        let areas: Vec<f64> = map.isochrones().iter().map(|i| i.area().unwrap()).collect();
        for pair in areas.windows(2) {
            assert!(pair[1] >= pair[0], "areas shrank: {areas:?}");
        }
        let first = map.isochrones()[0].polygon();
        assert_eq!(map.isochrones()[2].polygon(), first);
    }

    #[test]
    fn test_rejected_hulls_are_skipped() {
        let builder = builder(grid()).with_hull_strategy(Arc::new(NoHull));
        let map = builder.compute(&params(&[120.0, 240.0])).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_empty_tree_gives_empty_map() {
        let network = grid();
        let builder = builder(network.clone());
        let context = RouteSearchContext::new(network, RoutingProfile::CyclingRegular);
        let map = builder
            .compute_from_tree(&context, &params(&[120.0]), &SearchTree::empty())
            .unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_batch_keeps_order() {
        let builder = builder(grid());
        let far_away = SearchParameters::new(
            Coord { x: 10.0, y: 50.0 },
            &[120.0],
            RangeType::Time,
            Units::Meters,
            RoutingProfile::CyclingRegular,
        )
        .unwrap();
        let results = builder.compute_batch(&[params(&[120.0]), far_away]);

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        let second = results[1].as_ref().unwrap();
        assert_eq!(first.group_index(), 0);
        assert_eq!(first.len(), 1);
        assert_eq!(second.group_index(), 1);
        assert!(second.is_empty());
    }
}
