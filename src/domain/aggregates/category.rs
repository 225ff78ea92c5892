//! Category Aggregate
//!
//! Categories form a tree through `parent_id`. [`CategoryTree`] is an arena keyed
//! by id: one pass indexes every node, a second links children to parents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    /// Key/value template applied to products created in this category.
    pub default_metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct NewCategory {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub default_metadata: Option<Value>,
}

/// Replaces name and parent; metadata is kept when absent.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CategoryUpdate {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub default_metadata: Option<Value>,
}

#[derive(Clone, Debug)]
struct Node {
    category: Category,
    children: Vec<Uuid>,
}

#[derive(Clone, Debug, Default)]
pub struct CategoryTree {
    nodes: HashMap<Uuid, Node>,
    roots: Vec<Uuid>,
}

/// Serialized form of a subtree.
#[derive(Clone, Debug, Serialize)]
pub struct NestedCategory {
    #[serde(flatten)]
    pub category: Category,
    pub subcategories: Vec<NestedCategory>,
}

impl CategoryTree {
    /// Input order is kept for siblings. A node whose parent is missing becomes a root.
    pub fn build(categories: Vec<Category>) -> Self {
        let order: Vec<Uuid> = categories.iter().map(|c| c.id).collect();
        let mut nodes: HashMap<Uuid, Node> = categories
            .into_iter()
            .map(|c| (c.id, Node { category: c, children: Vec::new() }))
            .collect();

        let mut roots = Vec::new();
        for id in order {
            let parent = nodes[&id].category.parent_id.filter(|p| nodes.contains_key(p));
            match parent {
                Some(p) => {
                    if let Some(node) = nodes.get_mut(&p) {
                        node.children.push(id);
                    }
                }
                None => roots.push(id),
            }
        }
        Self { nodes, roots }
    }

    pub fn get(&self, id: Uuid) -> Option<&Category> {
        self.nodes.get(&id).map(|n| &n.category)
    }

    pub fn children(&self, id: Uuid) -> &[Uuid] {
        self.nodes.get(&id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Ids below `id`, excluding `id` itself.
    pub fn descendants(&self, id: Uuid) -> HashSet<Uuid> {
        let mut seen = HashSet::new();
        let mut stack: Vec<Uuid> = self.children(id).to_vec();
        while let Some(next) = stack.pop() {
            if next != id && seen.insert(next) {
                stack.extend_from_slice(self.children(next));
            }
        }
        seen
    }

    /// Whether re-parenting `id` under `parent` would close a loop.
    pub fn would_cycle(&self, id: Uuid, parent: Uuid) -> bool {
        parent == id || self.descendants(id).contains(&parent)
    }

    /// Nodes caught in a parent cycle are unreachable from any root and omitted.
    pub fn nested(&self) -> Vec<NestedCategory> {
        let mut visited = HashSet::new();
        self.roots.iter().filter_map(|id| self.nest(*id, &mut visited)).collect()
    }

    fn nest(&self, id: Uuid, visited: &mut HashSet<Uuid>) -> Option<NestedCategory> {
        if !visited.insert(id) {
            return None;
        }
        let node = self.nodes.get(&id)?;
        let subcategories = node.children.iter().filter_map(|c| self.nest(*c, visited)).collect();
        Some(NestedCategory { category: node.category.clone(), subcategories })
    }
}
