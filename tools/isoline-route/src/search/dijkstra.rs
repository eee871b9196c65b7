//! Bounded Dijkstra over the in-memory road network
//!
//! Settles every node whose cost is within the largest requested range and
//! records, without expanding, the first node beyond it on each branch.
//! Destination queries run the same search over reversed edge access.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use isoline_common::Result;

use super::{RouteSearchContext, SearchTree, TreeEntry, TreeFinder};
use crate::graph::{RoadEdge, RoadGraph, RoadNetwork};
use crate::params::{LocationType, RangeType, SearchParameters};

/// Default maximum distance between the query location and its snapped node
pub const DEFAULT_SNAP_RADIUS_M: f64 = 350.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct QueueItem {
    cost: f64,
    node: u32,
}

impl Eq for QueueItem {}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; node id breaks ties deterministically
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Query statistics
#[derive(Debug, Default)]
pub struct SearchStats {
    pub pq_pushes: usize,
    pub pq_pops: usize,
    pub relaxations: usize,
}

/// Reference [`TreeFinder`] over a [`RoadNetwork`]
pub struct DijkstraTreeFinder {
    network: Arc<RoadNetwork>,
    snap_radius_m: f64,
}

impl DijkstraTreeFinder {
    pub fn new(network: Arc<RoadNetwork>) -> Self {
        Self {
            network,
            snap_radius_m: DEFAULT_SNAP_RADIUS_M,
        }
    }

    pub fn with_snap_radius(mut self, snap_radius_m: f64) -> Self {
        self.snap_radius_m = snap_radius_m;
        self
    }

    /// Edge weight for the query's range type
    fn weight(edge: &RoadEdge, range_type: RangeType, max_speed_kmh: f64) -> f64 {
        match range_type {
            RangeType::Distance => edge.distance_m,
            RangeType::Time => edge.travel_time_s(max_speed_kmh),
        }
    }

    /// Run the bounded search from an already snapped node
    pub fn search(
        &self,
        origin: u32,
        limit: f64,
        range_type: RangeType,
        reverse: bool,
        max_speed_kmh: f64,
    ) -> (SearchTree, SearchStats) {
        let mut stats = SearchStats::default();
        let n_nodes = self.network.node_count();

        if origin as usize >= n_nodes {
            return (SearchTree::empty(), stats);
        }

        let mut dist = vec![f64::INFINITY; n_nodes];
        let mut entry_of: Vec<Option<usize>> = vec![None; n_nodes];
        let mut entries = vec![TreeEntry::root(origin)];
        let mut pq = BinaryHeap::new();

        dist[origin as usize] = 0.0;
        entry_of[origin as usize] = Some(0);
        pq.push(QueueItem {
            cost: 0.0,
            node: origin,
        });
        stats.pq_pushes += 1;

        while let Some(QueueItem { cost: d, node: u }) = pq.pop() {
            stats.pq_pops += 1;

            // Skip if we already found a shorter path
            if d > dist[u as usize] {
                continue;
            }

            // Nodes past the limit stay in the tree but are not expanded
            if d > limit {
                continue;
            }

            let Some(parent) = entry_of[u as usize] else {
                continue;
            };

            for (edge_id, v) in self.network.neighbours(u, reverse) {
                let Some(edge) = self.network.edge(edge_id) else {
                    continue;
                };
                let new_dist = d + Self::weight(edge, range_type, max_speed_kmh);
                stats.relaxations += 1;

                if new_dist < dist[v as usize] {
                    dist[v as usize] = new_dist;
                    let entry = TreeEntry {
                        node: v,
                        edge: Some(edge_id),
                        original_edge: Some(edge_id),
                        cost: new_dist,
                        parent: Some(parent),
                    };
                    match entry_of[v as usize] {
                        Some(idx) => entries[idx] = entry,
                        None => {
                            entries.push(entry);
                            entry_of[v as usize] = Some(entries.len() - 1);
                        }
                    }

                    if new_dist <= limit {
                        pq.push(QueueItem {
                            cost: new_dist,
                            node: v,
                        });
                        stats.pq_pushes += 1;
                    }
                }
            }
        }

        match SearchTree::from_entries(entries, 0) {
            Ok(tree) => (tree, stats),
            Err(e) => {
                tracing::warn!(error = %e, "discarding malformed search tree");
                (SearchTree::empty(), stats)
            }
        }
    }
}

impl TreeFinder for DijkstraTreeFinder {
    fn find(&self, context: &RouteSearchContext, params: &SearchParameters) -> Result<SearchTree> {
        let start = std::time::Instant::now();

        let Some(origin) = self.network.snap(params.location(), self.snap_radius_m) else {
            tracing::debug!(
                lon = params.location().x,
                lat = params.location().y,
                radius_m = self.snap_radius_m,
                "location could not be snapped to the network"
            );
            return Ok(SearchTree::empty());
        };

        let reverse = params.location_type() == LocationType::Destination;
        let (tree, stats) = self.search(
            origin,
            params.max_range(),
            params.range_type(),
            reverse,
            context.max_speed_kmh(),
        );

        tracing::debug!(
            origin,
            entries = tree.len(),
            max_cost = tree.max_cost(),
            pq_pops = stats.pq_pops,
            relaxations = stats.relaxations,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "cost tree search finished"
        );

        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GridSpec;
    use crate::params::Units;
    use crate::profiles::RoutingProfile;
    use geo::Coord;

    /// 0 --100m-- 1 --100m-- 2, oneway 1 -> 2
    fn line_network() -> Arc<RoadNetwork> {
        let nodes = vec![
            Coord { x: 8.0, y: 49.0 },
            Coord { x: 8.001, y: 49.0 },
            Coord { x: 8.002, y: 49.0 },
        ];
        let edge = |base, adj, backward| RoadEdge {
            base,
            adj,
            distance_m: 100.0,
            pillars: vec![],
            speed_kmh: 36.0,
            forward: true,
            backward,
        };
        let edges = vec![edge(0, 1, true), edge(1, 2, false)];
        Arc::new(RoadNetwork::new(nodes, edges).unwrap())
    }

    #[test]
    fn test_bounded_search_keeps_first_node_past_limit() {
        let finder = DijkstraTreeFinder::new(line_network());
        // 10 s per edge at 36 km/h; limit 15 s settles node 1 and records node 2
        let (tree, _) = finder.search(0, 15.0, RangeType::Time, false, 140.0);

        assert_eq!(tree.len(), 3);
        let far = tree.get(tree.find_node(2).unwrap()).unwrap();
        assert!((far.cost - 20.0).abs() < 1e-9);
        assert_eq!(far.original_edge, Some(1));
        assert_eq!(tree.parent(far).unwrap().node, 1);
    }

    #[test]
    fn test_limit_stops_expansion() {
        let finder = DijkstraTreeFinder::new(line_network());
        let (tree, _) = finder.search(0, 5.0, RangeType::Time, false, 140.0);
        // node 1 is past the limit and not expanded, so node 2 is absent
        assert_eq!(tree.len(), 2);
        assert!(tree.find_node(2).is_none());
    }

    #[test]
    fn test_backward_search_respects_oneway() {
        let finder = DijkstraTreeFinder::new(line_network());

        // 1 -> 2 is allowed, so both 1 and 0 can reach node 2
        let (tree, _) = finder.search(2, 100.0, RangeType::Time, true, 140.0);
        assert_eq!(tree.len(), 3);

        // forward from 2 is blocked by the oneway
        let (tree, _) = finder.search(2, 100.0, RangeType::Time, false, 140.0);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_speed_capped_by_profile() {
        let finder = DijkstraTreeFinder::new(line_network());
        let (tree, _) = finder.search(0, 100.0, RangeType::Time, false, 18.0);
        let node1 = tree.get(tree.find_node(1).unwrap()).unwrap();
        // 100 m at 18 km/h = 20 s
        assert!((node1.cost - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_weights() {
        let finder = DijkstraTreeFinder::new(line_network());
        let (tree, _) = finder.search(0, 1000.0, RangeType::Distance, false, 140.0);
        let node2 = tree.get(tree.find_node(2).unwrap()).unwrap();
        assert!((node2.cost - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_snap_radius_limits_location() {
        let network = line_network();
        let context = RouteSearchContext::new(network.clone(), RoutingProfile::DrivingCar);
        // about 220 m north of node 0
        let params = SearchParameters::new(
            Coord { x: 8.0, y: 49.002 },
            &[60.0],
            RangeType::Time,
            Units::Meters,
            RoutingProfile::DrivingCar,
        )
        .unwrap();

        let tree = DijkstraTreeFinder::new(network.clone()).find(&context, &params).unwrap();
        assert_eq!(tree.root().unwrap().node, 0);

        let strict = DijkstraTreeFinder::new(network).with_snap_radius(100.0);
        assert!(strict.find(&context, &params).unwrap().is_empty());
    }

    #[test]
    fn test_grid_costs_are_manhattan() {
        let network = Arc::new(RoadNetwork::grid(&GridSpec {
            origin: Coord { x: 8.0, y: 49.0 },
            rows: 5,
            cols: 5,
            spacing_deg: 0.001,
            speed_kmh: 50.0,
        }));
        let finder = DijkstraTreeFinder::new(network);
        let (tree, stats) = finder.search(12, f64::INFINITY, RangeType::Distance, false, 140.0);

        assert_eq!(tree.len(), 25);
        assert!(stats.pq_pops >= 25);
        let root = tree.root().unwrap();
        assert_eq!(root.node, 12);
        assert!(root.original_edge.is_none());
        assert!(tree.entries().iter().all(|e| e.cost >= 0.0));
    }
}
