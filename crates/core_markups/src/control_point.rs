use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};
use transforms::{matrix_to_axis_angle, AxisAngle};

/// A single placed point of a markups list.
///
/// Position and orientation are expressed in the owning node's local frame.
/// The orientation columns are the point's x, y and z axes; the z axis doubles
/// as the point normal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPoint {
    /// Unique within the owning list. Empty means "assign one on insertion".
    pub id: String,
    pub label: String,
    pub description: String,
    pub position: DVec3,
    pub orientation: DMat3,
    /// Node this point was placed on, if any.
    pub associated_node_id: Option<String>,
    pub selected: bool,
    pub locked: bool,
    pub visible: bool,
}

impl Default for ControlPoint {
    fn default() -> Self {
        Self {
            id: String::new(),
            label: String::new(),
            description: String::new(),
            position: DVec3::ZERO,
            orientation: DMat3::IDENTITY,
            associated_node_id: None,
            selected: true,
            locked: false,
            visible: true,
        }
    }
}

impl ControlPoint {
    pub fn new(position: DVec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_orientation(mut self, orientation: DMat3) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn normal(&self) -> DVec3 {
        self.orientation.z_axis
    }

    pub fn axis_angle(&self) -> AxisAngle {
        matrix_to_axis_angle(&self.orientation)
    }

    /// Orientation as nine values, x axis first.
    pub fn orientation_array(&self) -> [f64; 9] {
        self.orientation.to_cols_array()
    }

    pub fn set_orientation_array(&mut self, values: &[f64; 9]) {
        self.orientation = DMat3::from_cols_array(values);
    }
}
