//! Isochrone construction from search trees
//!
//! Concave balls method: sample a point cloud along the tree edges that
//! reach each threshold, wrap it in a concave hull, and carry the hull's
//! ring forward to the next threshold.

pub mod builder;
pub mod concave_hull;
pub mod dead_end;
pub mod dedup;
pub mod interpolate;
pub mod isochrone;
pub mod sampler;

pub use builder::IsochroneMapBuilder;
pub use concave_hull::{
    ConcaveHullConfig, ConcaveHullStats, GeoConcaveHull, HullRejection, HullStrategy,
};
pub use dead_end::DeadEnds;
pub use dedup::{BoundaryPointSet, DedupRadius};
pub use isochrone::{feature_collection, Isochrone, IsochroneMap};
pub use sampler::{BoundarySampler, DistanceBand, SampleStats, SamplingConfig, ThresholdStep};
