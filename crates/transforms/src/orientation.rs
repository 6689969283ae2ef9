//! Conversions between orientation matrices and angle/axis form.
//!
//! Orientation matrices store the local x, y and z axis directions as their
//! columns, so `matrix.z_axis` is the control point normal.

use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

/// Below this sine the rotation is treated as the identity (or a half turn).
const SINE_EPSILON: f64 = 1e-12;
/// Within this many radians of a half turn the axis is read from the symmetric part.
const HALF_TURN_WINDOW: f64 = 1e-3;

/// Rotation expressed as an angle in degrees about an axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisAngle {
    pub angle_degrees: f64,
    pub axis: DVec3,
}

impl AxisAngle {
    pub const IDENTITY: Self = Self {
        angle_degrees: 0.0,
        axis: DVec3::Z,
    };

    pub fn new(angle_degrees: f64, axis: DVec3) -> Self {
        Self {
            angle_degrees,
            axis,
        }
    }

    /// Reads the `[w, x, y, z]` layout: angle in degrees followed by the axis.
    pub fn from_wxyz(wxyz: [f64; 4]) -> Self {
        Self::new(wxyz[0], DVec3::new(wxyz[1], wxyz[2], wxyz[3]))
    }

    pub fn to_wxyz(&self) -> [f64; 4] {
        [self.angle_degrees, self.axis.x, self.axis.y, self.axis.z]
    }

    pub fn to_matrix(&self) -> DMat3 {
        axis_angle_to_matrix(self)
    }
}

impl Default for AxisAngle {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Extracts angle (degrees, in `[0, 180]`) and unit axis from a rotation matrix.
///
/// The identity yields [`AxisAngle::IDENTITY`]. Near a half turn the sine term
/// vanishes, so the axis is recovered from the symmetric part of the matrix and
/// its sign is taken from whatever antisymmetric residue remains.
pub fn matrix_to_axis_angle(matrix: &DMat3) -> AxisAngle {
    let m = matrix;
    // Twice the sine times the axis, read off the antisymmetric part.
    let skew = DVec3::new(
        m.y_axis.z - m.z_axis.y,
        m.z_axis.x - m.x_axis.z,
        m.x_axis.y - m.y_axis.x,
    );
    let trace = m.x_axis.x + m.y_axis.y + m.z_axis.z;
    let sine = 0.5 * skew.length();
    let cosine = (0.5 * (trace - 1.0)).clamp(-1.0, 1.0);
    let angle = sine.atan2(cosine);

    if sine < SINE_EPSILON && cosine > 0.0 {
        return AxisAngle::IDENTITY;
    }

    if std::f64::consts::PI - angle > HALF_TURN_WINDOW {
        return AxisAngle::new(angle.to_degrees(), skew / (2.0 * sine));
    }

    // aa^T = (S - cos I) / (1 - cos), where S is the symmetric part.
    let one_minus_cos = 1.0 - cosine;
    let diagonal = DVec3::new(m.x_axis.x, m.y_axis.y, m.z_axis.z);
    let squares = ((diagonal - DVec3::splat(cosine)) / one_minus_cos).max(DVec3::ZERO);
    let symmetric = |row: usize, col: usize| 0.5 * (m.col(col)[row] + m.col(row)[col]);

    let pivot = if squares.x >= squares.y && squares.x >= squares.z {
        0
    } else if squares.y >= squares.z {
        1
    } else {
        2
    };
    let pivot_value = squares[pivot].sqrt();
    let mut axis = DVec3::ZERO;
    for i in 0..3 {
        axis[i] = if i == pivot {
            pivot_value
        } else {
            symmetric(i, pivot) / (one_minus_cos * pivot_value)
        };
    }
    let mut axis = axis.normalize_or(DVec3::Z);
    if axis.dot(skew) < 0.0 {
        axis = -axis;
    }
    AxisAngle::new(angle.to_degrees(), axis)
}

/// Rodrigues rotation; the axis is normalized here and a zero axis gives the identity.
pub fn axis_angle_to_matrix(orientation: &AxisAngle) -> DMat3 {
    let length = orientation.axis.length();
    if length < SINE_EPSILON || !length.is_finite() {
        return DMat3::IDENTITY;
    }
    DMat3::from_axis_angle(
        orientation.axis / length,
        orientation.angle_degrees.to_radians(),
    )
}

/// Gram-Schmidt on the x and y columns; z is rebuilt from their cross product.
/// Degenerate input falls back to the identity.
pub fn orthonormalize(matrix: &DMat3) -> DMat3 {
    let x = matrix.x_axis.normalize_or_zero();
    if x == DVec3::ZERO {
        return DMat3::IDENTITY;
    }
    let y = (matrix.y_axis - x * x.dot(matrix.y_axis)).normalize_or_zero();
    let y = if y == DVec3::ZERO {
        x.any_orthonormal_vector()
    } else {
        y
    };
    DMat3::from_cols(x, y, x.cross(y))
}
