use curve_api::CurveKind;
use serde::{Deserialize, Serialize};

use crate::{ControlPoint, EventPayload, MarkupsEventKind, MarkupsNode, MarkupsResult};

/// Everything needed to restore a markups list. This is also the on-disk
/// JSON layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupsSnapshot {
    pub name: String,
    pub locked: bool,
    pub label_format: String,
    pub curve_kind: CurveKind,
    pub curve_closed: bool,
    pub points_per_segment: u32,
    pub required_number_of_control_points: usize,
    pub maximum_number_of_control_points: usize,
    pub last_used_control_point_number: u64,
    pub control_points: Vec<ControlPoint>,
}

impl Default for MarkupsSnapshot {
    fn default() -> Self {
        Self {
            name: String::new(),
            locked: false,
            label_format: settings::DEFAULT_LABEL_FORMAT.to_string(),
            curve_kind: CurveKind::default(),
            curve_closed: false,
            points_per_segment: curve_api::CurveSampling::default().points_per_segment,
            required_number_of_control_points: 0,
            maximum_number_of_control_points: 0,
            last_used_control_point_number: 0,
            control_points: Vec::new(),
        }
    }
}

impl MarkupsSnapshot {
    pub fn to_json(&self) -> MarkupsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> MarkupsResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Write access for storage code restoring a saved list.
///
/// Unlike the regular node API it can set ids verbatim. Id clashes still fail
/// and leave the node unchanged.
pub struct TrustedLoader<'a> {
    node: &'a mut MarkupsNode,
}

impl<'a> TrustedLoader<'a> {
    pub(crate) fn new(node: &'a mut MarkupsNode) -> Self {
        Self { node }
    }

    pub fn set_raw_id(&mut self, index: usize, id: impl Into<String>) -> MarkupsResult<()> {
        self.node.store_mut().set_raw_id(index, id)?;
        self.node
            .notify(MarkupsEventKind::PointModified, EventPayload::Index(index));
        Ok(())
    }

    /// Swaps in a complete list, emitting a single bulk-replace event.
    pub fn replace_control_points(&mut self, points: Vec<ControlPoint>) -> MarkupsResult<()> {
        self.node.replace_points_silently(points)?;
        self.node
            .notify(MarkupsEventKind::Modified, EventPayload::BulkReplace);
        Ok(())
    }
}
