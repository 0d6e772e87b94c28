//! Spatial index for snapping request coordinates to graph nodes.
//!
//! Built once at graph load; queries arrive as coordinates, not node ids.
//! Nearest-neighbor search runs in degree space, which is fine at city
//! scale; the caller re-checks the winner against the snap limit with a
//! proper haversine distance.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use super::{Node, NodeId};

/// Point with node id for the R-tree.
#[derive(Clone, Copy, Debug, PartialEq)]
struct IndexedPoint {
    coords: [f64; 2], // [lon, lat]
    node: NodeId,
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

    fn contains_point(&self, point: &[f64; 2]) -> bool {
        self.coords == *point
    }
}

#[derive(Debug)]
pub struct SpatialIndex {
    tree: RTree<IndexedPoint>,
}

impl SpatialIndex {
    pub fn build(nodes: &[Node]) -> Self {
        let points = nodes
            .iter()
            .enumerate()
            .map(|(id, node)| IndexedPoint {
                coords: [node.lon, node.lat],
                node: id as NodeId,
            })
            .collect();
        Self {
            tree: RTree::bulk_load(points),
        }
    }

    /// Nearest node to the given coordinate, if the index is non-empty.
    pub fn nearest(&self, lon: f64, lat: f64) -> Option<NodeId> {
        self.tree.nearest_neighbor(&[lon, lat]).map(|p| p.node)
    }
}
