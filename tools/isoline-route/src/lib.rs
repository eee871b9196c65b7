pub mod geo;
pub mod graph;
pub mod params;
pub mod profiles;
pub mod range;
pub mod search;

pub use graph::{FetchMode, GridSpec, RoadEdge, RoadGraph, RoadNetwork};
pub use params::{Attribute, LocationType, RangeType, SearchParameters, Units};
pub use profiles::RoutingProfile;
pub use range::{feature_collection, IsochroneMap, IsochroneMapBuilder, SamplingConfig};
pub use search::{DijkstraTreeFinder, RouteSearchContext, SearchTree, TreeEntry, TreeFinder};
