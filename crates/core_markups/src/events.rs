//! Change notifications emitted by markups nodes.

use serde::{Deserialize, Serialize};

use crate::{MarkupsNode, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkupsEventKind {
    /// Node-level property changed (name, topology, limits) or bulk reload.
    Modified,
    LockModified,
    LabelFormatModified,
    PointAdded,
    /// Carries the index the point had before removal.
    PointRemoved,
    AllPointsRemoved,
    PointModified,
    PointStartInteraction,
    PointEndInteraction,
    PointClicked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    None,
    Index(usize),
    /// The whole list was replaced at once.
    BulkReplace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupsEvent {
    pub node: NodeId,
    pub kind: MarkupsEventKind,
    pub payload: EventPayload,
}

impl MarkupsEvent {
    pub fn new(node: NodeId, kind: MarkupsEventKind, payload: EventPayload) -> Self {
        Self {
            node,
            kind,
            payload,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self.payload {
            EventPayload::Index(index) => Some(index),
            _ => None,
        }
    }
}

/// Handle returned by [`MarkupsNode::add_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub type Observer = Box<dyn FnMut(&MarkupsNode, &MarkupsEvent)>;

/// Observers in registration order.
#[derive(Default)]
pub(crate) struct ObserverList {
    next_id: u64,
    entries: Vec<(ObserverId, Observer)>,
}

impl ObserverList {
    pub(crate) fn add(&mut self, observer: Observer) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, observer));
        id
    }

    pub(crate) fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn notify(&mut self, node: &MarkupsNode, event: &MarkupsEvent) {
        for (_, observer) in &mut self.entries {
            observer(node, event);
        }
    }
}
