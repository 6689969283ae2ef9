//! Hooks into the scene that owns a markups node.

use std::{cell::RefCell, fmt, rc::Rc};

use glam::DAffine3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::MarkupsEvent;

/// Stable identity of a markups node within its scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Services a node borrows from its scene.
///
/// All methods take `&self`; implementations that need to record calls keep
/// their own interior mutability. A node without a scene behaves as if placed
/// under the identity transform.
pub trait SceneContext {
    /// Current local-to-world transform of `node`, `None` for identity.
    fn local_to_world(&self, node: NodeId) -> Option<DAffine3>;

    /// Scene-wide unique control point id. Returning `None` lets the node fall
    /// back to its own numbering.
    fn unique_control_point_id(&self, _prefix: &str) -> Option<String> {
        None
    }

    /// Called once per mutation, before the matching event is dispatched.
    fn node_modified(&self, _node: NodeId) {}

    /// Receives every event after the node's own observers.
    fn dispatch_event(&self, _event: &MarkupsEvent) {}
}

/// Scene binding shared between a node and the curve outputs it hands out,
/// so re-binding the node is seen by every holder.
#[derive(Clone, Default)]
pub(crate) struct SceneSlot(Rc<RefCell<Option<Rc<dyn SceneContext>>>>);

impl SceneSlot {
    pub(crate) fn get(&self) -> Option<Rc<dyn SceneContext>> {
        self.0.borrow().clone()
    }

    pub(crate) fn set(&self, scene: Option<Rc<dyn SceneContext>>) {
        *self.0.borrow_mut() = scene;
    }

    pub(crate) fn local_to_world(&self, node: NodeId) -> Option<DAffine3> {
        self.get().and_then(|scene| scene.local_to_world(node))
    }
}
