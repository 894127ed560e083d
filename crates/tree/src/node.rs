//! Weighted progress nodes.
//!
//! A node starts as a leaf holding a directly-set completion fraction.
//! The first `add_child` turns it into a composite for the rest of its
//! life: from then on its reported value is the weighted average of its
//! children, recomputed on every read, and its own notifications are
//! coalesced to one per burst of child updates.

use loadgauge_core::{Emitter, Fraction, NodeId, Scheduler, SubscriptionId, Weight};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// Leaf-or-composite state of a node.
///
/// The split makes "a composite node never reads a stored leaf value"
/// structural: the leaf fraction does not exist once children do.
enum Role {
    /// No children yet; holds the directly-set fraction.
    Leaf {
        amount_loaded: Fraction,
    },
    /// Has (or once had) children; the reported value is always derived.
    Composite {
        children: Vec<Arc<ProgressNode>>,
        /// Sum of the weight of every child ever added. Never decremented,
        /// so removed children keep their share of the denominator.
        total_child_weight: f64,
        /// Our subscription on each child, keyed by child id for removal.
        child_subscriptions: HashMap<NodeId, SubscriptionId>,
    },
}

struct Inner {
    weight: Weight,
    role: Role,
    /// True while a coalescing window is open, i.e. an aggregate
    /// notification has been deferred but has not fired yet.
    pending: bool,
}

/// One node of a weighted progress tree.
///
/// Handles are shared: constructors return `Arc<ProgressNode>`, and a
/// parent holds strong references to its children. Invalid writes are
/// dropped silently, leaving prior state unchanged; nothing in here
/// panics or returns an error.
///
/// Adding the same node under two parents, or making a node its own
/// descendant, is unsupported and not detected; a cycle will recurse
/// forever on read.
pub struct ProgressNode {
    id: NodeId,
    scheduler: Arc<dyn Scheduler>,
    subscribers: Emitter<f64>,
    inner: Mutex<Inner>,
}

impl ProgressNode {
    /// Create a detached leaf node with the default weight of 1.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Arc<Self> {
        Self::build(scheduler, Weight::default())
    }

    /// Create a detached leaf node. An invalid `weight` (non-finite or
    /// not positive) falls back to the default of 1.
    pub fn with_weight(scheduler: Arc<dyn Scheduler>, weight: f64) -> Arc<Self> {
        let weight = Weight::new(weight).unwrap_or_else(|err| {
            trace!(%err, "ignoring invalid construction weight");
            Weight::default()
        });
        Self::build(scheduler, weight)
    }

    fn build(scheduler: Arc<dyn Scheduler>, weight: Weight) -> Arc<Self> {
        Arc::new(Self {
            id: NodeId::new(),
            scheduler,
            subscribers: Emitter::new(),
            inner: Mutex::new(Inner {
                weight,
                role: Role::Leaf {
                    amount_loaded: Fraction::ZERO,
                },
                pending: false,
            }),
        })
    }

    /// This node's identifier.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// This node's relative weight within its parent.
    pub fn weight(&self) -> f64 {
        self.lock().weight.get()
    }

    /// Change the weight. Only finite values > 0 are accepted; anything
    /// else leaves the weight unchanged. Changing the weight of a node
    /// that is already a child does not revisit the parent's accumulated
    /// child-weight total.
    pub fn set_weight(&self, weight: f64) {
        match Weight::new(weight) {
            Ok(weight) => self.lock().weight = weight,
            Err(err) => trace!(node = %self.id, %err, "dropping invalid weight"),
        }
    }

    /// Reported completion in [0, 1].
    ///
    /// Leaves return the stored fraction. Composites return the weighted
    /// average of their children's reported values over the accumulated
    /// child-weight total, rounded to three decimals; the walk recurses
    /// through composite children, so the result is always current.
    pub fn amount_loaded(&self) -> f64 {
        let (children, total) = {
            let inner = self.lock();
            match &inner.role {
                Role::Leaf { amount_loaded } => return amount_loaded.get(),
                Role::Composite {
                    children,
                    total_child_weight,
                    ..
                } => (children.clone(), *total_child_weight),
            }
        };

        // An emptied composite, or one whose total never accumulated,
        // reports 0 rather than propagating 0/0.
        if total <= 0.0 {
            return 0.0;
        }

        let sum: f64 = children
            .iter()
            .map(|child| child.amount_loaded() * (child.weight() / total))
            .sum();
        (sum * 1000.0).round() / 1000.0
    }

    /// Set the leaf completion value, clamped to [0, 1].
    ///
    /// No-op on a composite node (a derived value cannot be assigned) and
    /// for NaN. Subscribers are notified synchronously, and only when the
    /// clamped value actually differs from the stored one.
    pub fn set_amount_loaded(&self, value: f64) {
        let changed = {
            let mut inner = self.lock();
            match &mut inner.role {
                Role::Composite { .. } => {
                    trace!(node = %self.id, "ignoring set_amount_loaded on composite node");
                    None
                }
                Role::Leaf { amount_loaded } => match Fraction::clamped(value) {
                    Ok(clamped) if clamped != *amount_loaded => {
                        *amount_loaded = clamped;
                        Some(clamped.get())
                    }
                    Ok(_) => None,
                    Err(err) => {
                        trace!(node = %self.id, %err, "dropping invalid amount_loaded");
                        None
                    }
                },
            }
        };

        if let Some(value) = changed {
            self.subscribers.emit(&value);
        }
    }

    /// Append `child`, fold its weight into the accumulated total, and
    /// subscribe to its value changes so they roll up into this node's
    /// aggregate. A child already present (same id) is not added twice.
    pub fn add_child(self: &Arc<Self>, child: &Arc<ProgressNode>) {
        if self.find_child_by_id(child.id).is_some() {
            trace!(parent = %self.id, child = %child.id, "child already present");
            return;
        }

        let parent = Arc::downgrade(self);
        let subscription = child.subscribe(move |_| {
            if let Some(parent) = parent.upgrade() {
                parent.invalidate();
            }
        });
        let child_weight = child.weight();

        let mut inner = self.lock();
        match &mut inner.role {
            role @ Role::Leaf { .. } => {
                // First child: the stored leaf value is gone for good.
                *role = Role::Composite {
                    children: vec![Arc::clone(child)],
                    total_child_weight: child_weight,
                    child_subscriptions: HashMap::from([(child.id, subscription)]),
                };
            }
            Role::Composite {
                children,
                total_child_weight,
                child_subscriptions,
            } => {
                children.push(Arc::clone(child));
                *total_child_weight += child_weight;
                child_subscriptions.insert(child.id, subscription);
            }
        }
        drop(inner);

        debug!(parent = %self.id, child = %child.id, weight = child_weight, "child added");
    }

    /// Create a node with the given weight and add it as a child,
    /// returning the new node.
    ///
    /// `Some(NaN)` is the "provided but not a number" rejection and
    /// yields `None`; any other invalid weight falls back to the default
    /// of 1, as in [`ProgressNode::with_weight`].
    pub fn create_child(self: &Arc<Self>, weight: Option<f64>) -> Option<Arc<ProgressNode>> {
        if matches!(weight, Some(w) if w.is_nan()) {
            trace!(parent = %self.id, "rejecting create_child with NaN weight");
            return None;
        }

        let child = match weight {
            Some(weight) => ProgressNode::with_weight(Arc::clone(&self.scheduler), weight),
            None => ProgressNode::new(Arc::clone(&self.scheduler)),
        };
        self.add_child(&child);
        Some(child)
    }

    /// True iff `candidate` is one of the current children (by handle
    /// identity, not id).
    pub fn has_child(&self, candidate: &Arc<ProgressNode>) -> bool {
        match &self.lock().role {
            Role::Leaf { .. } => false,
            Role::Composite { children, .. } => {
                children.iter().any(|child| Arc::ptr_eq(child, candidate))
            }
        }
    }

    /// True iff this node currently has at least one child.
    pub fn has_children(&self) -> bool {
        matches!(&self.lock().role, Role::Composite { children, .. } if !children.is_empty())
    }

    /// Look up a current child by id.
    pub fn find_child_by_id(&self, id: NodeId) -> Option<Arc<ProgressNode>> {
        match &self.lock().role {
            Role::Leaf { .. } => None,
            Role::Composite { children, .. } => {
                children.iter().find(|child| child.id == id).cloned()
            }
        }
    }

    /// The current children, in insertion order.
    pub fn children(&self) -> Vec<Arc<ProgressNode>> {
        match &self.lock().role {
            Role::Leaf { .. } => Vec::new(),
            Role::Composite { children, .. } => children.clone(),
        }
    }

    /// Remove `child`. See [`ProgressNode::remove_child_by_id`].
    pub fn remove_child(&self, child: &Arc<ProgressNode>) -> bool {
        self.remove_child_by_id(child.id)
    }

    /// Detach the child with the given id and unsubscribe from it, so its
    /// later mutations no longer reach this node. Returns false if no
    /// such child exists.
    ///
    /// The accumulated child-weight total keeps the removed child's
    /// contribution; remaining children still average against it.
    pub fn remove_child_by_id(&self, id: NodeId) -> bool {
        let removed = {
            let mut inner = self.lock();
            match &mut inner.role {
                Role::Leaf { .. } => None,
                Role::Composite {
                    children,
                    child_subscriptions,
                    ..
                } => children.iter().position(|child| child.id == id).map(|index| {
                    let child = children.remove(index);
                    let subscription = child_subscriptions.remove(&id);
                    (child, subscription)
                }),
            }
        };

        match removed {
            Some((child, subscription)) => {
                if let Some(subscription) = subscription {
                    child.unsubscribe(subscription);
                }
                debug!(parent = %self.id, child = %id, "child removed");
                true
            }
            None => false,
        }
    }

    /// Detach every current child and unsubscribe from each. Like
    /// removal, this does not touch the accumulated child-weight total,
    /// and the node stays a composite.
    pub fn clear_children(&self) {
        let detached: Vec<_> = {
            let mut inner = self.lock();
            match &mut inner.role {
                Role::Leaf { .. } => Vec::new(),
                Role::Composite {
                    children,
                    child_subscriptions,
                    ..
                } => children
                    .drain(..)
                    .map(|child| {
                        let subscription = child_subscriptions.remove(&child.id);
                        (child, subscription)
                    })
                    .collect(),
            }
        };

        for (child, subscription) in detached {
            if let Some(subscription) = subscription {
                child.unsubscribe(subscription);
            }
        }
    }

    /// Subscribe to value-change notifications, receiving the new value.
    ///
    /// A leaf notifies synchronously on mutation. A composite notifies at
    /// most once per burst, with the aggregate computed when the deferred
    /// flush fires.
    pub fn subscribe(&self, handler: impl Fn(f64) + Send + Sync + 'static) -> SubscriptionId {
        self.subscribers.on(move |value: &f64| handler(*value))
    }

    /// Drop a subscription. Returns false if it was not found.
    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        self.subscribers.off(subscription)
    }

    /// Bridge notifications into a tokio watch channel seeded with the
    /// current value. Receivers observe the latest value per burst. The
    /// backing subscription lives as long as the node.
    pub fn watch(self: &Arc<Self>) -> tokio::sync::watch::Receiver<f64> {
        let (tx, rx) = tokio::sync::watch::channel(self.amount_loaded());
        self.subscribe(move |value| {
            // Receivers may all be gone; that just ends the bridge.
            let _ = tx.send(value);
        });
        rx
    }

    /// Open a coalescing window unless one is already open. Called on
    /// every child change; the deferred flush absorbs the whole burst.
    fn invalidate(self: &Arc<Self>) {
        {
            let mut inner = self.lock();
            if inner.pending {
                return;
            }
            inner.pending = true;
        }

        trace!(node = %self.id, "aggregate notification deferred");
        let node = Arc::downgrade(self);
        self.scheduler.defer(Box::new(move || {
            if let Some(node) = node.upgrade() {
                node.flush();
            }
        }));
    }

    /// Close the window, compute the aggregate once, and notify.
    fn flush(self: &Arc<Self>) {
        self.lock().pending = false;
        let value = self.amount_loaded();
        debug!(node = %self.id, value, "aggregate notification");
        self.subscribers.emit(&value);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ProgressNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        let children = match &inner.role {
            Role::Leaf { .. } => 0,
            Role::Composite { children, .. } => children.len(),
        };
        f.debug_struct("ProgressNode")
            .field("id", &self.id)
            .field("weight", &inner.weight.get())
            .field("children", &children)
            .field("pending", &inner.pending)
            .finish()
    }
}
