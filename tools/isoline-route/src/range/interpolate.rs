//! Threshold interpolation along edge geometry
//!
//! Cost grows linearly with distance along an edge, from the parent's cost
//! at its first vertex to the node's cost at the last. Edges that cross a
//! threshold are cut at the point where that linear cost reaches it.

use geo::Coord;

use crate::geo::plane_distance;

/// Where a threshold crosses a polyline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutPoint {
    /// Index of the segment `[segment, segment + 1]` holding the cut
    pub segment: usize,
    /// Position of the cut along that segment, in `[0, 1]`
    pub fraction: f64,
    pub coord: Coord<f64>,
}

/// Locate the cut of `threshold` on a polyline whose cost runs from
/// `min_cost` to `max_cost` over `edge_length` metres
///
/// Returns `None` for polylines with fewer than two vertices. When the
/// accumulated cost never reaches the threshold (geometry shorter than the
/// stored edge length) the last vertex is the cut.
pub fn locate_cut(
    polyline: &[Coord<f64>],
    edge_length: f64,
    min_cost: f64,
    max_cost: f64,
    threshold: f64,
) -> Option<CutPoint> {
    if polyline.len() < 2 {
        return None;
    }
    if edge_length <= 0.0 {
        return Some(CutPoint {
            segment: 0,
            fraction: 0.0,
            coord: polyline[0],
        });
    }

    let cost_per_meter = (max_cost - min_cost) / edge_length;
    let mut walked = 0.0;

    for (i, pair) in polyline.windows(2).enumerate() {
        let (p0, p1) = (pair[0], pair[1]);
        let cost_start = min_cost + walked * cost_per_meter;
        walked += plane_distance(p0, p1);
        let cost_end = min_cost + walked * cost_per_meter;

        if cost_end >= threshold {
            let pair_cost = cost_end - cost_start;
            let fraction = if pair_cost > 0.0 {
                ((threshold - cost_start) / pair_cost).clamp(0.0, 1.0)
            } else {
                1.0
            };
            return Some(CutPoint {
                segment: i,
                fraction,
                coord: Coord {
                    x: p0.x + fraction * (p1.x - p0.x),
                    y: p0.y + fraction * (p1.y - p0.y),
                },
            });
        }
    }

    Some(CutPoint {
        segment: polyline.len() - 2,
        fraction: 1.0,
        coord: polyline[polyline.len() - 1],
    })
}

/// Point pairs flanking a segment at `buffer_size` degrees on either side
///
/// Emits a pair at the start, at the midpoint when the segment is longer
/// than twice the buffer, and at the end when `add_last` is set. A
/// zero-length segment yields its start point.
pub fn buffer_points(
    p0: Coord<f64>,
    p1: Coord<f64>,
    add_last: bool,
    buffer_size: f64,
    out: &mut Vec<Coord<f64>>,
) {
    let dx = p0.x - p1.x;
    let dy = p0.y - p1.y;
    let norm = (dx * dx + dy * dy).sqrt();

    if norm == 0.0 {
        out.push(p0);
        return;
    }

    let scale = buffer_size / norm;
    let offset = Coord {
        x: -dy * scale,
        y: dx * scale,
    };

    out.push(p0 + offset);
    out.push(p0 - offset);
    if norm > 2.0 * buffer_size {
        let mid = Coord {
            x: (p0.x + p1.x) / 2.0,
            y: (p0.y + p1.y) / 2.0,
        };
        out.push(mid + offset);
        out.push(mid - offset);
    }
    if add_last {
        out.push(p1 + offset);
        out.push(p1 - offset);
    }
}
