//! Road graph accessor contract and an in-memory road network
//!
//! The isochrone core only reads the graph through [`RoadGraph`]. The
//! [`RoadNetwork`] here is the reference storage used by the CLI and tests:
//! nodes with WGS84 coordinates, undirected edges with pillar geometry,
//! per-direction access and a speed.

use crate::geo::{build_node_index, nearest_node_within, plane_distance, polyline_length};
use geo::Coord;
use isoline_common::{Error, Result};
use rstar::{primitives::GeomWithData, RTree};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Which parts of an edge polyline to return
///
/// Tower nodes are the edge endpoints, pillars the shape points between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Pillars only
    PillarOnly,
    /// Base tower plus pillars
    BaseAndPillar,
    /// Pillars plus adjacent tower
    PillarAndAdj,
    /// Full polyline, both towers included
    All,
}

/// Read-only view of a routable graph
pub trait RoadGraph: Send + Sync {
    /// Number of nodes; valid ids are `0..node_count()`
    fn node_count(&self) -> usize;

    /// Coordinate of a node as (lon, lat)
    fn node_coord(&self, node: u32) -> Option<Coord<f64>>;

    /// Physical length of an edge in metres
    fn edge_distance(&self, edge: u32) -> Option<f64>;

    /// Edge polyline oriented so that it ends at `adj_node`
    ///
    /// Returns `None` if the edge does not exist or does not touch `adj_node`.
    fn edge_geometry(&self, edge: u32, adj_node: u32, mode: FetchMode) -> Option<Vec<Coord<f64>>>;
}

/// An undirected road segment between two tower nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadEdge {
    pub base: u32,
    pub adj: u32,
    /// Length in metres; computed from geometry when zero
    #[serde(default)]
    pub distance_m: f64,
    /// Shape points between `base` and `adj` as [lon, lat]
    #[serde(default)]
    pub pillars: Vec<[f64; 2]>,
    pub speed_kmh: f64,
    /// Travel allowed from `base` to `adj`
    #[serde(default = "default_access")]
    pub forward: bool,
    /// Travel allowed from `adj` to `base`
    #[serde(default = "default_access")]
    pub backward: bool,
}

fn default_access() -> bool {
    true
}

impl RoadEdge {
    /// Seconds needed to traverse the edge, speed capped at `max_speed_kmh`
    pub fn travel_time_s(&self, max_speed_kmh: f64) -> f64 {
        self.distance_m / (self.speed_kmh.min(max_speed_kmh) / 3.6)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct NetworkFile {
    nodes: Vec<[f64; 2]>,
    edges: Vec<RoadEdge>,
}

/// Parameters of a synthetic square grid network
#[derive(Debug, Clone)]
pub struct GridSpec {
    /// South-west corner (lon, lat)
    pub origin: Coord<f64>,
    pub rows: usize,
    pub cols: usize,
    /// Node spacing in degrees, both axes
    pub spacing_deg: f64,
    pub speed_kmh: f64,
}

/// In-memory road network
#[derive(Debug)]
pub struct RoadNetwork {
    nodes: Vec<Coord<f64>>,
    edges: Vec<RoadEdge>,
    /// Edge ids incident to each node
    adjacency: Vec<Vec<u32>>,
    spatial_index: RTree<GeomWithData<[f64; 2], u32>>,
}

impl RoadNetwork {
    /// Build a network, validating node references and filling missing lengths
    pub fn new(nodes: Vec<Coord<f64>>, mut edges: Vec<RoadEdge>) -> Result<Self> {
        let n_nodes = nodes.len();
        let mut adjacency = vec![Vec::new(); n_nodes];

        for (edge_id, edge) in edges.iter_mut().enumerate() {
            if edge.base as usize >= n_nodes || edge.adj as usize >= n_nodes {
                return Err(Error::InvalidGraph(format!(
                    "edge {edge_id} references node outside 0..{n_nodes}"
                )));
            }
            if !(edge.speed_kmh > 0.0) {
                return Err(Error::InvalidGraph(format!(
                    "edge {edge_id} has non-positive speed {}",
                    edge.speed_kmh
                )));
            }
            if edge.distance_m <= 0.0 {
                let mut shape = Vec::with_capacity(edge.pillars.len() + 2);
                shape.push(nodes[edge.base as usize]);
                shape.extend(edge.pillars.iter().map(|&[x, y]| Coord { x, y }));
                shape.push(nodes[edge.adj as usize]);
                edge.distance_m = polyline_length(&shape);
            }

            adjacency[edge.base as usize].push(edge_id as u32);
            if edge.adj != edge.base {
                adjacency[edge.adj as usize].push(edge_id as u32);
            }
        }

        let spatial_index = build_node_index(&nodes);

        tracing::debug!(
            nodes = n_nodes,
            edges = edges.len(),
            "built road network"
        );

        Ok(Self {
            nodes,
            edges,
            adjacency,
            spatial_index,
        })
    }

    /// Synthetic grid with horizontal and vertical two-way streets
    ///
    /// Node ids are row-major (`row * cols + col`). Every edge carries one
    /// pillar at its midpoint.
    pub fn grid(spec: &GridSpec) -> Self {
        let mut nodes = Vec::with_capacity(spec.rows * spec.cols);
        for row in 0..spec.rows {
            for col in 0..spec.cols {
                nodes.push(Coord {
                    x: spec.origin.x + col as f64 * spec.spacing_deg,
                    y: spec.origin.y + row as f64 * spec.spacing_deg,
                });
            }
        }

        let mut edges = Vec::new();
        let mut connect = |a: usize, b: usize| {
            let (pa, pb) = (nodes[a], nodes[b]);
            edges.push(RoadEdge {
                base: a as u32,
                adj: b as u32,
                distance_m: plane_distance(pa, pb),
                pillars: vec![[(pa.x + pb.x) / 2.0, (pa.y + pb.y) / 2.0]],
                speed_kmh: spec.speed_kmh,
                forward: true,
                backward: true,
            });
        };

        for row in 0..spec.rows {
            for col in 0..spec.cols {
                let id = row * spec.cols + col;
                if col + 1 < spec.cols {
                    connect(id, id + 1);
                }
                if row + 1 < spec.rows {
                    connect(id, id + spec.cols);
                }
            }
        }

        let adjacency = {
            let mut adjacency = vec![Vec::new(); nodes.len()];
            for (edge_id, edge) in edges.iter().enumerate() {
                adjacency[edge.base as usize].push(edge_id as u32);
                adjacency[edge.adj as usize].push(edge_id as u32);
            }
            adjacency
        };
        let spatial_index = build_node_index(&nodes);

        Self {
            nodes,
            edges,
            adjacency,
            spatial_index,
        }
    }

    /// Load a network from its JSON representation
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let file: NetworkFile = serde_json::from_reader(reader)
            .map_err(|e| Error::InvalidGraph(format!("failed to parse network JSON: {e}")))?;

        let nodes = file
            .nodes
            .into_iter()
            .map(|[x, y]| Coord { x, y })
            .collect();
        Self::new(nodes, file.edges)
    }

    /// Write the network as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = NetworkFile {
            nodes: self.nodes.iter().map(|c| [c.x, c.y]).collect(),
            edges: self.edges.clone(),
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &file)
            .map_err(|e| Error::InvalidGraph(format!("failed to write network JSON: {e}")))?;
        Ok(())
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge(&self, edge: u32) -> Option<&RoadEdge> {
        self.edges.get(edge as usize)
    }

    /// Edges leaving `node` that may be traversed in the given direction
    ///
    /// With `reverse` set, an edge qualifies when travel *towards* `node` is
    /// allowed, which is what a backward (destination) search expands.
    /// Yields `(edge_id, other_node)`.
    pub fn neighbours(&self, node: u32, reverse: bool) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.adjacency
            .get(node as usize)
            .into_iter()
            .flatten()
            .filter_map(move |&edge_id| {
                let edge = &self.edges[edge_id as usize];
                let (other, leaving_base) = if edge.base == node {
                    (edge.adj, true)
                } else {
                    (edge.base, false)
                };
                let allowed = match (leaving_base, reverse) {
                    (true, false) | (false, true) => edge.forward,
                    (false, false) | (true, true) => edge.backward,
                };
                allowed.then_some((edge_id, other))
            })
    }

    /// Snap a coordinate to the nearest node within `max_distance_m`
    pub fn snap(&self, coord: Coord<f64>, max_distance_m: f64) -> Option<u32> {
        nearest_node_within(coord, &self.spatial_index, max_distance_m)
    }
}

impl RoadGraph for RoadNetwork {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node_coord(&self, node: u32) -> Option<Coord<f64>> {
        self.nodes.get(node as usize).copied()
    }

    fn edge_distance(&self, edge: u32) -> Option<f64> {
        self.edges.get(edge as usize).map(|e| e.distance_m)
    }

    fn edge_geometry(&self, edge: u32, adj_node: u32, mode: FetchMode) -> Option<Vec<Coord<f64>>> {
        let e = self.edges.get(edge as usize)?;
        let reversed = if e.adj == adj_node {
            false
        } else if e.base == adj_node {
            true
        } else {
            return None;
        };

        let (base_node, adj) = if reversed { (e.adj, e.base) } else { (e.base, e.adj) };
        let mut points = Vec::with_capacity(e.pillars.len() + 2);

        if matches!(mode, FetchMode::BaseAndPillar | FetchMode::All) {
            points.push(self.nodes[base_node as usize]);
        }
        if reversed {
            points.extend(e.pillars.iter().rev().map(|&[x, y]| Coord { x, y }));
        } else {
            points.extend(e.pillars.iter().map(|&[x, y]| Coord { x, y }));
        }
        if matches!(mode, FetchMode::PillarAndAdj | FetchMode::All) {
            points.push(self.nodes[adj as usize]);
        }

        Some(points)
    }
}
