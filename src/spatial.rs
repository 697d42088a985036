//! Nearest-node lookup over the catalog.
//!
//! Nodes are projected to 3-D Cartesian points (see [`to_cartesian`]) and
//! bulk-loaded into an R-tree, so a plain Euclidean nearest-neighbor query
//! stands in for a great-circle one.

use rstar::primitives::GeomWithData;
use rstar::{PointDistance, RTree};

use crate::catalog::{NodeCatalog, NodeId};
use crate::geo::to_cartesian;

type IndexedNode = GeomWithData<[f64; 3], NodeId>;

#[derive(Debug)]
pub struct SpatialIndex {
    tree: RTree<IndexedNode>,
}

impl SpatialIndex {
    pub fn build(catalog: &NodeCatalog) -> Self {
        let points: Vec<IndexedNode> = catalog
            .iter()
            .map(|node| GeomWithData::new(to_cartesian(node.lat, node.lng), node.id))
            .collect();

        Self {
            tree: RTree::bulk_load(points),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Nearest node within `radius_m` meters of the given coordinate.
    pub fn nearest(&self, lat: f64, lng: f64, radius_m: f64) -> Option<NodeId> {
        self.nearest_point(&to_cartesian(lat, lng), radius_m)
    }

    /// Nearest node within `radius_m` of an already projected point.
    ///
    /// The bound is inclusive, so a radius of zero still matches a point
    /// sitting exactly on a node.
    pub fn nearest_point(&self, point: &[f64; 3], radius_m: f64) -> Option<NodeId> {
        if radius_m.is_nan() || radius_m < 0.0 {
            return None;
        }
        let candidate = self.tree.nearest_neighbor(point)?;
        (candidate.distance_2(point) <= radius_m * radius_m).then_some(candidate.data)
    }
}
