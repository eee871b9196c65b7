use geo::Coord;
use rstar::{primitives::GeomWithData, RTree};

/// Mean earth radius in metres
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Distance in metres on an equirectangular plane projection
pub fn plane_distance(from: Coord<f64>, to: Coord<f64>) -> f64 {
    let d_lat = (to.y - from.y).to_radians();
    let d_lon = (to.x - from.x).to_radians();
    let tmp = ((from.y + to.y) / 2.0).to_radians().cos() * d_lon;
    EARTH_RADIUS_M * (d_lat * d_lat + tmp * tmp).sqrt()
}

/// Length of a polyline in metres
pub fn polyline_length(points: &[Coord<f64>]) -> f64 {
    points
        .windows(2)
        .map(|pair| plane_distance(pair[0], pair[1]))
        .sum()
}

/// Build an R-tree of node coordinates for snapping
pub fn build_node_index(coords: &[Coord<f64>]) -> RTree<GeomWithData<[f64; 2], u32>> {
    let points: Vec<GeomWithData<[f64; 2], u32>> = coords
        .iter()
        .enumerate()
        .map(|(id, c)| GeomWithData::new([c.x, c.y], id as u32)) // [lon, lat], node id
        .collect();
    RTree::bulk_load(points)
}

/// Nearest node within `max_distance_m` of `target`, if any
pub fn nearest_node_within(
    target: Coord<f64>,
    rtree: &RTree<GeomWithData<[f64; 2], u32>>,
    max_distance_m: f64,
) -> Option<u32> {
    rtree
        .nearest_neighbor(&[target.x, target.y])
        .filter(|point| {
            let [lon, lat] = *point.geom();
            plane_distance(target, Coord { x: lon, y: lat }) <= max_distance_m
        })
        .map(|point| point.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_distance_one_degree_latitude() {
        let d = plane_distance(Coord { x: 8.0, y: 49.0 }, Coord { x: 8.0, y: 50.0 });
        // 1° of latitude ≈ 111.2 km
        assert!((d - 111_195.0).abs() < 50.0, "got {d}");
    }

    #[test]
    fn test_plane_distance_symmetric() {
        let a = Coord { x: 8.68, y: 49.41 };
        let b = Coord { x: 8.70, y: 49.42 };
        assert!((plane_distance(a, b) - plane_distance(b, a)).abs() < 1e-9);
        assert_eq!(plane_distance(a, a), 0.0);
    }

    #[test]
    fn test_polyline_length() {
        let a = Coord { x: 8.0, y: 49.0 };
        let b = Coord { x: 8.0, y: 49.001 };
        let c = Coord { x: 8.0, y: 49.002 };
        let total = polyline_length(&[a, b, c]);
        assert!((total - plane_distance(a, c)).abs() < 1e-6);
        assert_eq!(polyline_length(&[a]), 0.0);
    }

    #[test]
    fn test_nearest_node_within() {
        let coords = vec![
            Coord { x: 8.0, y: 49.0 },
            Coord { x: 8.01, y: 49.0 },
        ];
        let tree = build_node_index(&coords);

        assert_eq!(
            nearest_node_within(Coord { x: 8.009, y: 49.0 }, &tree, 500.0),
            Some(1)
        );
        // ~7 km away from both nodes
        assert_eq!(nearest_node_within(Coord { x: 8.1, y: 49.0 }, &tree, 500.0), None);
    }
}
