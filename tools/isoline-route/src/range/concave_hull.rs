//! Concave hull polygon generation
//!
//! Turns the sampled boundary cloud of one threshold into a single simple
//! polygon. The hull algorithm sits behind [`HullStrategy`]; its raw output
//! is normalised here and anything that is not one non-degenerate polygon
//! is rejected.

use std::time::Instant;

use geo::{Area, ConcaveHull, Coord, Geometry, MultiPoint, Polygon, Simplify};

/// Configuration for concave hull polygon generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConcaveHullConfig {
    /// Concavity parameter (larger = more convex, smaller = more detailed)
    /// Typical range: 1.0 - 5.0
    pub concavity: f64,

    /// Simplification tolerance in degrees (0 = no simplification)
    /// 0.0001 degrees ≈ 11m at equator
    pub simplify_tolerance: f64,
}

impl Default for ConcaveHullConfig {
    fn default() -> Self {
        Self {
            concavity: 2.0,
            simplify_tolerance: 0.0,
        }
    }
}

impl ConcaveHullConfig {
    /// Concavity for a user smoothing factor in `0..=100`
    ///
    /// 0 follows the road network closely, 100 is close to convex.
    pub fn for_smoothing(smoothing: f64) -> Self {
        Self {
            concavity: 1.0 + 4.0 * smoothing.clamp(0.0, 100.0) / 100.0,
            ..Self::default()
        }
    }
}

/// Statistics from concave hull generation
#[derive(Debug, Default, Clone)]
pub struct ConcaveHullStats {
    pub input_points: usize,
    pub distinct_points: usize,
    pub hull_vertices: usize,
    pub final_vertices: usize,
    pub hull_time_us: u64,
    pub total_time_us: u64,
}

/// Why a hull did not produce a usable polygon
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HullRejection {
    #[error("only {0} distinct points, need at least 3")]
    TooFewPoints(usize),

    #[error("hull is empty")]
    Empty,

    #[error("hull is degenerate")]
    Degenerate,

    #[error("hull has {0} parts")]
    MultiPart(usize),
}

/// Point cloud to area geometry
///
/// Implementations may return any geometry; the caller normalises it.
pub trait HullStrategy: Send + Sync {
    fn hull(&self, points: &[Coord<f64>], concavity: f64) -> Geometry<f64>;
}

/// Concave hull from the `geo` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoConcaveHull;

impl HullStrategy for GeoConcaveHull {
    fn hull(&self, points: &[Coord<f64>], concavity: f64) -> Geometry<f64> {
        let multi_point: MultiPoint<f64> = points.iter().copied().collect();
        Geometry::Polygon(multi_point.concave_hull(concavity))
    }
}

/// Reduce a hull result to a single polygon
///
/// Single-part multi geometries are unwrapped; everything else that is not
/// exactly one polygon is rejected.
pub fn normalize_hull(geometry: Geometry<f64>) -> Result<Polygon<f64>, HullRejection> {
    match geometry {
        Geometry::Polygon(polygon) => Ok(polygon),
        Geometry::MultiPolygon(multi) => match multi.0.len() {
            0 => Err(HullRejection::Empty),
            1 => multi.0.into_iter().next().ok_or(HullRejection::Empty),
            n => Err(HullRejection::MultiPart(n)),
        },
        Geometry::GeometryCollection(collection) => match collection.0.len() {
            0 => Err(HullRejection::Empty),
            1 => match collection.0.into_iter().next() {
                Some(inner) => normalize_hull(inner),
                None => Err(HullRejection::Empty),
            },
            n => Err(HullRejection::MultiPart(n)),
        },
        _ => Err(HullRejection::Degenerate),
    }
}

fn distinct_count(points: &[Coord<f64>]) -> usize {
    let mut keys: Vec<(u64, u64)> = points.iter().map(|p| (p.x.to_bits(), p.y.to_bits())).collect();
    keys.sort_unstable();
    keys.dedup();
    keys.len()
}

/// Build the polygon for one threshold from its point cloud
pub fn build_hull(
    points: &[Coord<f64>],
    strategy: &dyn HullStrategy,
    config: &ConcaveHullConfig,
) -> Result<(Polygon<f64>, ConcaveHullStats), HullRejection> {
    let total_start = Instant::now();
    let mut stats = ConcaveHullStats {
        input_points: points.len(),
        distinct_points: distinct_count(points),
        ..Default::default()
    };

    if stats.distinct_points < 3 {
        return Err(HullRejection::TooFewPoints(stats.distinct_points));
    }

    let hull_start = Instant::now();
    let hull = normalize_hull(strategy.hull(points, config.concavity))?;
    stats.hull_vertices = hull.exterior().0.len();
    stats.hull_time_us = hull_start.elapsed().as_micros() as u64;

    let final_hull = if config.simplify_tolerance > 0.0 {
        hull.simplify(&config.simplify_tolerance)
    } else {
        hull
    };

    // closed ring of a triangle has 4 coordinates
    if final_hull.exterior().0.len() < 4 || final_hull.unsigned_area() <= 0.0 {
        return Err(HullRejection::Degenerate);
    }

    stats.final_vertices = final_hull.exterior().0.len();
    stats.total_time_us = total_start.elapsed().as_micros() as u64;

    Ok((final_hull, stats))
}
