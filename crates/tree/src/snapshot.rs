//! Serializable point-in-time views of a progress tree.

use crate::node::ProgressNode;
use chrono::{DateTime, Utc};
use loadgauge_core::NodeId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A snapshot of a progress tree at a point in time.
///
/// Captures the values as read, so composite entries carry their
/// aggregate. This is a view for display or inspection; it holds no
/// references back into the live tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,

    /// The captured root and its descendants
    pub root: NodeSnapshot,
}

/// One captured node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// The node's identifier
    pub id: NodeId,

    /// The node's weight within its parent
    pub weight: f64,

    /// The reported completion value at capture time
    pub amount_loaded: f64,

    /// Captured children, in insertion order
    pub children: Vec<NodeSnapshot>,
}

impl ProgressSnapshot {
    /// Capture `root` and everything below it.
    pub fn capture(root: &Arc<ProgressNode>) -> Self {
        Self {
            timestamp: Utc::now(),
            root: NodeSnapshot::capture(root),
        }
    }
}

impl NodeSnapshot {
    fn capture(node: &Arc<ProgressNode>) -> Self {
        Self {
            id: node.id(),
            weight: node.weight(),
            amount_loaded: node.amount_loaded(),
            children: node.children().iter().map(NodeSnapshot::capture).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadgauge_core::TickScheduler;

    #[test]
    fn capture_walks_the_whole_tree() {
        let tick: Arc<TickScheduler> = Arc::new(TickScheduler::new());
        let root = ProgressNode::new(tick);
        let a = root.create_child(Some(2.0)).unwrap();
        let b = root.create_child(Some(8.0)).unwrap();
        let c = b.create_child(None).unwrap();

        a.set_amount_loaded(1.0);
        c.set_amount_loaded(0.5);

        let snapshot = ProgressSnapshot::capture(&root);

        assert_eq!(snapshot.root.id, root.id());
        assert_eq!(snapshot.root.children.len(), 2);
        assert_eq!(snapshot.root.children[0].weight, 2.0);
        assert_eq!(snapshot.root.children[0].amount_loaded, 1.0);
        assert_eq!(snapshot.root.children[1].children.len(), 1);
        assert_eq!(snapshot.root.children[1].amount_loaded, 0.5);
        // 1.0 * 0.2 + 0.5 * 0.8
        assert_eq!(snapshot.root.amount_loaded, 0.6);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let tick: Arc<TickScheduler> = Arc::new(TickScheduler::new());
        let root = ProgressNode::new(tick);
        let child = root.create_child(None).unwrap();
        child.set_amount_loaded(0.25);

        let snapshot = ProgressSnapshot::capture(&root);
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["root"]["amount_loaded"], 0.25);
        assert_eq!(json["root"]["children"][0]["weight"], 1.0);
        assert!(json["timestamp"].is_string());

        let parsed: ProgressSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.root.children.len(), 1);
    }
}
