//! The immutable table of canonical stop nodes.
//!
//! The catalog is produced upstream by clustering raw stop coordinates. Each
//! cluster appears once per member stop, so rows are grouped by id and the
//! first row for an id is kept.

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::geo::haversine_m;

pub type NodeId = i64;

/// A canonical stop location.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub lat: f64,
    pub lng: f64,
    pub name: String,
}

/// One row of the upstream clustering table.
#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(rename = "cluster_label", alias = "id")]
    id: NodeId,
    #[serde(rename = "centroid_lat", alias = "lat")]
    lat: f64,
    #[serde(rename = "centroid_lng", alias = "lng")]
    lng: f64,
    #[serde(rename = "Name", alias = "name", default)]
    name: Option<String>,
}

/// Node attributes as written to `nodes.json`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct NodeMeta {
    pub lat: f64,
    pub lng: f64,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct NodeCatalog {
    nodes: BTreeMap<NodeId, Node>,
}

impl NodeCatalog {
    /// Builds a catalog from nodes, keeping the first occurrence of each id.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for node in nodes {
            if !node.lat.is_finite() || !node.lng.is_finite() {
                return Err(PipelineError::Catalog(format!(
                    "node {} has non-finite coordinates",
                    node.id
                )));
            }
            map.entry(node.id).or_insert(node);
        }

        if map.is_empty() {
            return Err(PipelineError::Catalog("catalog contains no nodes".into()));
        }

        Ok(Self { nodes: map })
    }

    /// Parses the clustering CSV table.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Catalog`] on any malformed row or when no
    /// nodes are present.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut nodes = Vec::new();
        let mut rows = 0usize;

        for result in rdr.deserialize() {
            let row: CatalogRow =
                result.map_err(|e| PipelineError::Catalog(format!("bad catalog row: {e}")))?;
            rows += 1;
            nodes.push(Node {
                id: row.id,
                lat: row.lat,
                lng: row.lng,
                name: row.name.unwrap_or_default(),
            });
        }

        let catalog = Self::from_nodes(nodes)?;
        debug!(rows, nodes = catalog.len(), "Node catalog parsed");
        Ok(catalog)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates nodes in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Great-circle distance between two catalog nodes, if both exist.
    pub fn distance_m(&self, from: NodeId, to: NodeId) -> Option<f64> {
        let a = self.get(from)?;
        let b = self.get(to)?;
        Some(haversine_m(a.lat, a.lng, b.lat, b.lng))
    }

    /// The `nodes` artifact: id to attributes. Integer keys serialize as
    /// JSON strings.
    pub fn meta(&self) -> BTreeMap<NodeId, NodeMeta> {
        self.nodes
            .values()
            .map(|n| {
                (
                    n.id,
                    NodeMeta {
                        lat: n.lat,
                        lng: n.lng,
                        name: n.name.clone(),
                    },
                )
            })
            .collect()
    }
}
