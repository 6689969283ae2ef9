//! Markups control-point model.
//!
//! A [`MarkupsNode`] owns an ordered list of uniquely identified control points,
//! derives a curve from them on demand, maps everything between its local frame
//! and world space, and reports each change to its observers with a typed,
//! point-scoped event.

mod control_point;
pub mod curve;
mod display;
pub mod events;
mod loader;
mod node;
pub mod scene;
mod store;

use thiserror::Error;

pub use control_point::ControlPoint;
pub use curve::{CurveSubsystem, CurveWorldOutput};
pub use display::{Displayable, MarkupsDisplay};
pub use events::{EventPayload, MarkupsEvent, MarkupsEventKind, ObserverId};
pub use loader::{MarkupsSnapshot, TrustedLoader};
pub use node::MarkupsNode;
pub use scene::{NodeId, SceneContext};
pub use store::{expand_label_format, ControlPointStore};

pub use curve_api::{CurveKind, CurvePoly, CurveSampling};
pub use transforms::{AxisAngle, Bounds, CoordinateTransformPipeline};

pub type MarkupsResult<T> = std::result::Result<T, MarkupsError>;

/// Errors surfaced by control point and node operations. All of them are
/// recoverable: the model is left exactly as it was before the failed call.
#[derive(Debug, Error)]
pub enum MarkupsError {
    #[error("control point index {index} is out of range (list has {len} points)")]
    InvalidIndex { index: usize, len: usize },
    #[error("no control point with id `{0}`")]
    NotFound(String),
    #[error("control point id `{0}` is already in use")]
    DuplicateId(String),
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
    #[error("curve generation failed: {0}")]
    Curve(#[from] curve_api::CurveError),
    #[error("transform failed: {0}")]
    Transform(#[from] transforms::TransformError),
    #[error("markups serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
