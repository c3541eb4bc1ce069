//! Asset graph data structure

use crate::asset::{AssetKey, AssetNode};
use crate::partitions::PartitionsDefinition;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Directed graph of asset nodes, edges pointing from upstream to downstream
///
/// The graph is validated on construction: keys are unique, every dependency
/// refers to a node in the graph, partitions definitions are well formed,
/// and there are no cycles.
#[derive(Debug, Clone)]
pub struct AssetGraph {
    graph: DiGraph<AssetKey, ()>,
    key_to_index: HashMap<AssetKey, NodeIndex>,
    nodes: BTreeMap<AssetKey, AssetNode>,
}

impl AssetGraph {
    /// Create an empty asset graph
    pub fn empty() -> Self {
        Self {
            graph: DiGraph::new(),
            key_to_index: HashMap::new(),
            nodes: BTreeMap::new(),
        }
    }

    /// Build and validate an asset graph from its nodes
    pub fn new(nodes: impl IntoIterator<Item = AssetNode>) -> crate::Result<Self> {
        let mut asset_graph = Self::empty();

        for node in nodes {
            if asset_graph.nodes.contains_key(&node.key) {
                return Err(crate::Error::DuplicateAsset(node.key));
            }
            if let Some(def) = &node.partitions_def {
                def.validate()?;
            }
            let idx = asset_graph.graph.add_node(node.key.clone());
            asset_graph.key_to_index.insert(node.key.clone(), idx);
            asset_graph.nodes.insert(node.key.clone(), node);
        }

        for node in asset_graph.nodes.values() {
            let to_idx = asset_graph.key_to_index[&node.key];
            for upstream in &node.dependencies {
                let from_idx = asset_graph.key_to_index.get(upstream).ok_or_else(|| {
                    crate::Error::UnknownDependency {
                        asset: node.key.clone(),
                        upstream: upstream.clone(),
                    }
                })?;
                asset_graph.graph.add_edge(*from_idx, to_idx, ());
            }
        }

        if petgraph::algo::is_cyclic_directed(&asset_graph.graph) {
            return Err(crate::Error::CircularDependency);
        }

        Ok(asset_graph)
    }

    /// All asset keys in the graph
    pub fn all_asset_keys(&self) -> BTreeSet<AssetKey> {
        self.nodes.keys().cloned().collect()
    }

    /// Look up an asset node
    pub fn get(&self, key: &AssetKey) -> Option<&AssetNode> {
        self.nodes.get(key)
    }

    /// Check if an asset exists
    pub fn contains(&self, key: &AssetKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Partitions definition of an asset, if it exists and is partitioned
    pub fn partitions_def(&self, key: &AssetKey) -> Option<&PartitionsDefinition> {
        self.nodes.get(key).and_then(|n| n.partitions_def.as_ref())
    }

    /// Whether an asset exists and is partitioned
    pub fn is_partitioned(&self, key: &AssetKey) -> bool {
        self.partitions_def(key).is_some()
    }

    /// Keys from `keys` that are not in the graph, in input order
    pub fn missing_keys<'a>(&self, keys: impl IntoIterator<Item = &'a AssetKey>) -> Vec<AssetKey> {
        keys.into_iter()
            .filter(|k| !self.contains(k))
            .cloned()
            .collect()
    }

    /// Direct upstream dependencies of an asset
    pub fn upstream(&self, key: &AssetKey) -> Vec<&AssetKey> {
        self.neighbors(key, petgraph::Direction::Incoming)
    }

    /// Direct downstream dependents of an asset
    pub fn downstream(&self, key: &AssetKey) -> Vec<&AssetKey> {
        self.neighbors(key, petgraph::Direction::Outgoing)
    }

    /// Asset keys ordered so every asset comes after its upstream dependencies
    pub fn toposort(&self) -> Vec<&AssetKey> {
        // Construction rejects cycles, so toposort cannot fail here.
        petgraph::algo::toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|idx| &self.graph[idx]).collect())
            .unwrap_or_default()
    }

    /// Total number of assets
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no assets
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn neighbors(&self, key: &AssetKey, direction: petgraph::Direction) -> Vec<&AssetKey> {
        match self.key_to_index.get(key) {
            Some(&idx) => {
                let mut keys: Vec<&AssetKey> = self
                    .graph
                    .neighbors_directed(idx, direction)
                    .map(|n| &self.graph[n])
                    .collect();
                keys.sort();
                keys
            }
            None => Vec::new(),
        }
    }
}

impl Default for AssetGraph {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letters() -> PartitionsDefinition {
        PartitionsDefinition::static_keys(["a", "b", "c"]).unwrap()
    }

    fn chain() -> AssetGraph {
        AssetGraph::new(vec![
            AssetNode::builder("asset1").partitions_def(letters()).build(),
            AssetNode::builder("asset2")
                .depends_on(AssetKey::new("asset1"))
                .build(),
            AssetNode::builder("asset3")
                .depends_on(AssetKey::new("asset2"))
                .depends_on(AssetKey::new("asset1"))
                .build(),
        ])
        .unwrap()
    }

    #[test]
    fn test_empty_graph() {
        let graph = AssetGraph::empty();
        assert!(graph.is_empty());
        assert!(graph.all_asset_keys().is_empty());
    }

    #[test]
    fn test_all_asset_keys() {
        let graph = chain();
        assert_eq!(graph.len(), 3);
        let keys: Vec<String> = graph.all_asset_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["asset1", "asset2", "asset3"]);
    }

    #[test]
    fn test_partitioned_lookup() {
        let graph = chain();
        assert!(graph.is_partitioned(&AssetKey::new("asset1")));
        assert!(!graph.is_partitioned(&AssetKey::new("asset2")));
        assert!(!graph.is_partitioned(&AssetKey::new("missing")));
        assert_eq!(graph.partitions_def(&AssetKey::new("asset1")), Some(&letters()));
    }

    #[test]
    fn test_upstream_and_downstream() {
        let graph = chain();
        let asset1 = AssetKey::new("asset1");
        let asset3 = AssetKey::new("asset3");

        assert_eq!(
            graph.downstream(&asset1),
            vec![&AssetKey::new("asset2"), &asset3]
        );
        assert_eq!(
            graph.upstream(&asset3),
            vec![&asset1, &AssetKey::new("asset2")]
        );
        assert!(graph.upstream(&AssetKey::new("missing")).is_empty());
    }

    #[test]
    fn test_toposort_orders_upstream_first() {
        let graph = chain();
        let order: Vec<String> = graph.toposort().iter().map(|k| k.to_string()).collect();
        assert_eq!(order, vec!["asset1", "asset2", "asset3"]);
    }

    #[test]
    fn test_rejects_duplicate_keys() {
        let result = AssetGraph::new(vec![
            AssetNode::new(AssetKey::new("dup")),
            AssetNode::new(AssetKey::new("dup")),
        ]);
        assert!(matches!(result, Err(crate::Error::DuplicateAsset(_))));
    }

    #[test]
    fn test_rejects_dangling_dependency() {
        let result = AssetGraph::new(vec![AssetNode::builder("child")
            .depends_on(AssetKey::new("ghost"))
            .build()]);
        assert!(matches!(
            result,
            Err(crate::Error::UnknownDependency { .. })
        ));
    }

    #[test]
    fn test_rejects_cycles() {
        let result = AssetGraph::new(vec![
            AssetNode::builder("x").depends_on(AssetKey::new("y")).build(),
            AssetNode::builder("y").depends_on(AssetKey::new("x")).build(),
        ]);
        assert!(matches!(result, Err(crate::Error::CircularDependency)));
    }

    #[test]
    fn test_missing_keys_preserves_input_order() {
        let graph = chain();
        let requested = vec![
            AssetKey::new("zeta"),
            AssetKey::new("asset1"),
            AssetKey::new("alpha"),
        ];
        assert_eq!(
            graph.missing_keys(&requested),
            vec![AssetKey::new("zeta"), AssetKey::new("alpha")]
        );
    }
}
