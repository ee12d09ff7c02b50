// mascot_core/src/planning/tree.rs

use num_traits::Zero;

use crate::types::Location;

// Type aliases for clarity
pub type NodeId = usize;
pub type Cost = f64;

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub location: Location,
    /// Cumulative cost from the root.
    pub cost: Cost,
    /// Index of the parent in the arena; `None` only for the root.
    pub parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl TreeNode {
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Parent-indexed arena. Nodes are never removed, so a `NodeId` stays valid
/// for the lifetime of the tree; rewiring only swaps the parent index.
#[derive(Debug, Clone)]
pub struct PlanningTree {
    nodes: Vec<TreeNode>,
}

impl PlanningTree {
    pub const ROOT: NodeId = 0;

    pub fn with_root(location: Location) -> Self {
        Self {
            nodes: vec![TreeNode {
                location,
                cost: Cost::zero(),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    /// Node closest to `location` (linear scan).
    pub fn nearest(&self, location: &Location) -> NodeId {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (i, nalgebra::distance_squared(&n.location, location)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
            .unwrap_or(Self::ROOT)
    }

    /// All nodes within `radius` of `location`.
    pub fn near(&self, location: &Location, radius: f64) -> Vec<NodeId> {
        let r2 = radius * radius;
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| nalgebra::distance_squared(&n.location, location) <= r2)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn insert(&mut self, location: Location, parent: NodeId, cost: Cost) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(TreeNode {
            location,
            cost,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    /// Re-parents `node` under `new_parent` with the (lower) cost `new_cost`
    /// and pushes the saving down to every descendant.
    pub fn reparent(&mut self, node: NodeId, new_parent: NodeId, new_cost: Cost) {
        if let Some(old_parent) = self.nodes[node].parent {
            self.nodes[old_parent].children.retain(|&c| c != node);
        }
        self.nodes[node].parent = Some(new_parent);
        self.nodes[new_parent].children.push(node);

        let delta = new_cost - self.nodes[node].cost;
        self.nodes[node].cost = new_cost;
        let mut stack = self.nodes[node].children.clone();
        while let Some(child) = stack.pop() {
            self.nodes[child].cost += delta;
            stack.extend_from_slice(&self.nodes[child].children);
        }
    }

    /// Node ids from the root down to `id`, inclusive.
    pub fn lineage(&self, id: NodeId) -> Vec<NodeId> {
        let mut lineage = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            lineage.push(node);
            current = self.nodes[node].parent;
        }
        lineage.reverse(); // Reverse to get root -> node order
        lineage
    }

    /// Locations from the root down to `id`, inclusive.
    pub fn path_to(&self, id: NodeId) -> Vec<Location> {
        self.lineage(id)
            .into_iter()
            .map(|n| self.nodes[n].location)
            .collect()
    }
}
