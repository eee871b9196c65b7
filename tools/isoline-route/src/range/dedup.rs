//! Spatial deduplication of boundary points
//!
//! Keeps the point cloud close to uniform density regardless of how dense
//! the road network is. A point is only kept when no indexed point lies
//! within the current [`DedupRadius`].

use geo::Coord;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

/// Neighbourhood used to reject near-duplicate points, in degrees
///
/// A neighbour must lie within `threshold` of the query, and its box of
/// half-size `point_width` (fixed when it was inserted) must intersect the
/// query box of half-size `search_width`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DedupRadius {
    pub search_width: f64,
    pub threshold: f64,
    pub point_width: f64,
}

impl DedupRadius {
    pub const fn new(search_width: f64, threshold: f64, point_width: f64) -> Self {
        Self {
            search_width,
            threshold,
            point_width,
        }
    }
}

/// Indexed point with the half-width it was inserted with
#[derive(Clone, Copy, Debug, PartialEq)]
struct IndexedPoint {
    coords: [f64; 2], // [lon, lat]
    point_width: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.coords)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.coords[0] - point[0];
        let dy = self.coords[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Working point cloud for one threshold
///
/// Seed points carried over from the previous threshold are part of the
/// cloud but are not indexed, so new samples are never rejected because of
/// them.
#[derive(Debug, Default)]
pub struct BoundaryPointSet {
    points: Vec<Coord<f64>>,
    tree: RTree<IndexedPoint>,
}

impl BoundaryPointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a cloud from the previous threshold's boundary
    pub fn with_seeds(seeds: &[Coord<f64>]) -> Self {
        Self {
            points: seeds.to_vec(),
            tree: RTree::new(),
        }
    }

    /// Whether an indexed point lies within `radius` of `p`
    pub fn has_neighbour(&self, p: Coord<f64>, radius: &DedupRadius) -> bool {
        let max_d2 = radius.threshold * radius.threshold;
        self.tree
            .locate_within_distance([p.x, p.y], max_d2)
            .any(|item| {
                let reach = radius.search_width + item.point_width;
                let [x, y] = item.coords;
                (x - p.x).abs() <= reach
                    && (y - p.y).abs() <= reach
                    && item.distance_2(&[p.x, p.y]) < max_d2
            })
    }

    /// Add a point unless it has a neighbour; returns whether it was added
    pub fn add(&mut self, p: Coord<f64>, radius: &DedupRadius) -> bool {
        if self.has_neighbour(p, radius) {
            return false;
        }
        self.insert(p, radius);
        true
    }

    /// Add a point without the neighbour check
    pub fn insert(&mut self, p: Coord<f64>, radius: &DedupRadius) {
        self.tree.insert(IndexedPoint {
            coords: [p.x, p.y],
            point_width: radius.point_width,
        });
        self.points.push(p);
    }

    pub fn points(&self) -> &[Coord<f64>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of points registered for neighbour queries
    pub fn indexed_len(&self) -> usize {
        self.tree.size()
    }
}
