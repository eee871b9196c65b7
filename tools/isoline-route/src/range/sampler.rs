//! Boundary point sampling
//!
//! Walks the search tree once per threshold and turns tree edges into a
//! point cloud for the hull:
//! - edges entirely inside the threshold contribute their far node, or
//!   their full geometry when close to the threshold or long
//! - edges crossing the threshold contribute buffered points up to the
//!   interpolated cut
//! - edges below the previous threshold are already covered by the seeds

use std::path::Path;

use geo::Coord;
use isoline_common::Result;
use serde::{Deserialize, Serialize};

use super::dead_end::DeadEnds;
use super::dedup::{BoundaryPointSet, DedupRadius};
use super::interpolate::{buffer_points, locate_cut};
use crate::geo::plane_distance;
use crate::graph::{FetchMode, RoadGraph};
use crate::search::{SearchTree, TreeEntry};

/// Dedup radius for edges within a fraction of the reach distance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceBand {
    /// Upper bound as a fraction of the reach distance (exclusive)
    pub max_fraction: f64,
    pub radius: DedupRadius,
}

/// Sampling constants, all distances in degrees unless noted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Perpendicular offset of buffer points
    pub buffer_size: f64,
    /// Edges longer than this (metres) are sampled with buffer points
    pub long_edge_m: f64,
    /// Contained edges above this share of the threshold use full geometry
    pub detailed_zone_factor: f64,
    /// Edges above this share of the threshold use the near-threshold radius
    pub near_threshold_factor: f64,
    /// Edges below this share of the threshold use the distance bands
    pub inner_zone_factor: f64,
    /// Half the reach distance below this (metres) selects the compact radius
    pub compact_reach_m: f64,
    pub default_radius: DedupRadius,
    pub compact_default_radius: DedupRadius,
    pub near_threshold_radius: DedupRadius,
    /// Checked in order, first match wins
    pub distance_bands: Vec<DistanceBand>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            buffer_size: 0.0018,
            long_edge_m: 300.0,
            detailed_zone_factor: 0.85,
            near_threshold_factor: 0.95,
            inner_zone_factor: 0.8,
            compact_reach_m: 20_000.0,
            default_radius: DedupRadius::new(0.0005, 0.0045, 0.0045),
            compact_default_radius: DedupRadius::new(0.0005, 0.002, 0.002),
            near_threshold_radius: DedupRadius::new(0.0004, 0.003, 0.003),
            distance_bands: vec![
                DistanceBand {
                    max_fraction: 0.3,
                    radius: DedupRadius::new(0.001, 0.0015, 0.0015),
                },
                DistanceBand {
                    max_fraction: 0.6,
                    radius: DedupRadius::new(0.0007, 0.007, 0.007),
                },
                DistanceBand {
                    max_fraction: 0.7,
                    radius: DedupRadius::new(0.0005, 0.005, 0.005),
                },
            ],
        }
    }
}

impl SamplingConfig {
    /// Load overrides from a JSON file; missing fields keep their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let config = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(config)
    }

    /// Radius used when no zone rule applies
    pub fn base_radius(&self, reach_distance: f64) -> DedupRadius {
        if reach_distance * 0.5 < self.compact_reach_m {
            self.compact_default_radius
        } else {
            self.default_radius
        }
    }
}

/// Counters for one sampling pass
#[derive(Debug, Default, Clone, Copy)]
pub struct SampleStats {
    pub edges_visited: usize,
    pub edges_below_previous: usize,
    pub edges_contained: usize,
    pub edges_crossing: usize,
    pub dead_ends: usize,
    pub points_rejected: usize,
}

/// Threshold window for one sampling pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdStep {
    pub threshold: f64,
    /// Previous threshold, 0 for the first range
    pub previous: f64,
    /// Reach distance of `threshold` in metres
    pub reach_distance: f64,
}

/// Read-only sampler over one search tree
///
/// Holds no per-threshold state, so the same sampler serves every range
/// of a query.
pub struct BoundarySampler<'a> {
    graph: &'a dyn RoadGraph,
    tree: &'a SearchTree,
    dead_ends: &'a DeadEnds,
    origin: Coord<f64>,
    config: &'a SamplingConfig,
}

impl<'a> BoundarySampler<'a> {
    pub fn new(
        graph: &'a dyn RoadGraph,
        tree: &'a SearchTree,
        dead_ends: &'a DeadEnds,
        origin: Coord<f64>,
        config: &'a SamplingConfig,
    ) -> Self {
        Self {
            graph,
            tree,
            dead_ends,
            origin,
            config,
        }
    }

    /// Sample the point cloud for one threshold, starting from `seeds`
    pub fn sample(
        &self,
        step: ThresholdStep,
        seeds: &[Coord<f64>],
    ) -> (BoundaryPointSet, SampleStats) {
        let mut points = BoundaryPointSet::with_seeds(seeds);
        let mut stats = SampleStats::default();
        let base_radius = self.config.base_radius(step.reach_distance);
        let node_count = self.graph.node_count();
        let mut scratch = Vec::new();

        for (idx, entry) in self.tree.entries().iter().enumerate() {
            if entry.node as usize >= node_count {
                continue;
            }
            let Some(edge) = entry.original_edge else {
                continue;
            };
            let Some(parent) = self.tree.parent(entry) else {
                continue;
            };
            stats.edges_visited += 1;

            let max_cost = entry.cost;
            let min_cost = parent.cost;
            if max_cost < step.previous {
                stats.edges_below_previous += 1;
                continue;
            }

            let dead_end = self.dead_ends.is_dead_end(idx);
            let radius = if dead_end {
                stats.dead_ends += 1;
                base_radius
            } else {
                self.radius_for(entry, step, base_radius)
            };

            if max_cost <= step.threshold {
                stats.edges_contained += 1;
                self.sample_contained(
                    entry,
                    edge,
                    dead_end,
                    step,
                    &radius,
                    &mut points,
                    &mut stats,
                    &mut scratch,
                );
            } else if min_cost < step.threshold {
                stats.edges_crossing += 1;
                self.sample_crossing(
                    entry,
                    edge,
                    min_cost,
                    step,
                    &radius,
                    &mut points,
                    &mut stats,
                    &mut scratch,
                );
            }
        }

        (points, stats)
    }

    /// Dedup radius by cost zone and distance from the origin
    fn radius_for(&self, entry: &TreeEntry, step: ThresholdStep, base: DedupRadius) -> DedupRadius {
        let cost = entry.cost;
        if cost > step.threshold * self.config.near_threshold_factor {
            return self.config.near_threshold_radius;
        }
        if cost < step.threshold * self.config.inner_zone_factor {
            let Some(coord) = self.graph.node_coord(entry.node) else {
                return base;
            };
            let dist = plane_distance(self.origin, coord);
            if let Some(band) = self
                .config
                .distance_bands
                .iter()
                .find(|band| dist < step.reach_distance * band.max_fraction)
            {
                return band.radius;
            }
        }
        base
    }

    #[allow(clippy::too_many_arguments)]
    fn sample_contained(
        &self,
        entry: &TreeEntry,
        edge: u32,
        dead_end: bool,
        step: ThresholdStep,
        radius: &DedupRadius,
        points: &mut BoundaryPointSet,
        stats: &mut SampleStats,
        scratch: &mut Vec<Coord<f64>>,
    ) {
        let node_point = self.graph.node_coord(entry.node);
        if dead_end {
            if let Some(p) = node_point {
                add_checked(points, p, radius, stats);
            }
            return;
        }

        let edge_length = self.graph.edge_distance(edge).unwrap_or(0.0);
        let long_edge = edge_length > self.config.long_edge_m;
        let detailed = entry.cost >= step.threshold * self.config.detailed_zone_factor;

        if !(detailed || long_edge) {
            if let Some(p) = node_point {
                add_checked(points, p, radius, stats);
            }
            return;
        }

        let Some(geometry) = self.graph.edge_geometry(edge, entry.node, FetchMode::All) else {
            return;
        };

        if long_edge {
            let pairs = geometry.len().saturating_sub(1);
            for (i, pair) in geometry.windows(2).enumerate() {
                scratch.clear();
                let last = i + 1 == pairs;
                buffer_points(pair[0], pair[1], last, self.config.buffer_size, scratch);
                for &p in scratch.iter() {
                    add_checked(points, p, radius, stats);
                }
            }
        } else {
            for &p in &geometry {
                add_checked(points, p, radius, stats);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn sample_crossing(
        &self,
        entry: &TreeEntry,
        edge: u32,
        min_cost: f64,
        step: ThresholdStep,
        radius: &DedupRadius,
        points: &mut BoundaryPointSet,
        stats: &mut SampleStats,
        scratch: &mut Vec<Coord<f64>>,
    ) {
        let Some(geometry) = self.graph.edge_geometry(edge, entry.node, FetchMode::All) else {
            return;
        };
        let edge_length = self.graph.edge_distance(edge).unwrap_or(0.0);
        let Some(cut) = locate_cut(&geometry, edge_length, min_cost, entry.cost, step.threshold)
        else {
            return;
        };

        for pair in geometry[..=cut.segment].windows(2) {
            scratch.clear();
            buffer_points(pair[0], pair[1], false, self.config.buffer_size, scratch);
            for &p in scratch.iter() {
                add_checked(points, p, radius, stats);
            }
        }

        // The cut segment is always kept, even next to existing points
        scratch.clear();
        let cut_start = geometry[cut.segment];
        buffer_points(cut_start, cut.coord, true, self.config.buffer_size, scratch);
        for &p in scratch.iter() {
            points.insert(p, radius);
        }
    }
}

fn add_checked(
    points: &mut BoundaryPointSet,
    p: Coord<f64>,
    radius: &DedupRadius,
    stats: &mut SampleStats,
) {
    if !points.add(p, radius) {
        stats.points_rejected += 1;
    }
}
