use glam::DAffine3;
use serde::{Deserialize, Serialize};
use settings::DisplaySettings;
use transforms::Bounds;

use crate::NodeId;

/// Behaviour shared by everything that can be drawn in a view.
pub trait Displayable {
    /// Bounds in the node's own frame, `None` when there is nothing to show.
    fn bounds_local(&self) -> Option<Bounds>;

    /// Bounds after the scene transform, `None` when there is nothing to show.
    fn bounds_world(&self) -> Option<Bounds>;

    /// Bakes `transform` into the stored geometry.
    fn apply_transform(&mut self, transform: &DAffine3);

    fn create_default_display(&self) -> MarkupsDisplay;
}

/// Display properties for one markups node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkupsDisplay {
    pub node: NodeId,
    pub visible: bool,
    pub show_curve: bool,
    pub glyph_scale: f64,
    pub text_scale: f64,
    pub selected_color: [f32; 3],
    pub unselected_color: [f32; 3],
    pub line_thickness: f64,
    pub opacity: f64,
}

impl MarkupsDisplay {
    pub fn from_settings(node: NodeId, settings: &DisplaySettings) -> Self {
        Self {
            node,
            visible: true,
            show_curve: true,
            glyph_scale: settings.glyph_scale,
            text_scale: settings.text_scale,
            selected_color: settings.selected_color,
            unselected_color: settings.unselected_color,
            line_thickness: settings.line_thickness,
            opacity: settings.opacity,
        }
    }
}
