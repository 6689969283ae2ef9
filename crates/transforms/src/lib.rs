//! Geometry helpers shared by the markups crates: axis-aligned bounds,
//! orientation conversions and the local/world coordinate pipeline.

mod orientation;
mod pipeline;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use orientation::{axis_angle_to_matrix, matrix_to_axis_angle, orthonormalize, AxisAngle};
pub use pipeline::CoordinateTransformPipeline;

/// Convenience alias for fallible transform operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Determinant magnitude below which a linear part is treated as singular.
pub const SINGULAR_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("transform linear part is singular (determinant {0:e})")]
    Singular(f64),
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: DVec3,
    pub max: DVec3,
}

impl Bounds {
    pub fn from_point(point: DVec3) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// Smallest box containing every point, `None` when the iterator is empty.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = DVec3>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self::from_point(first);
        for point in iter {
            bounds.include_point(point);
        }
        Some(bounds)
    }

    pub fn include_point(&mut self, point: DVec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    pub fn contains(&self, point: DVec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// All eight corners, ordered by the x/y/z bit pattern of the index.
    pub fn corners(&self) -> [DVec3; 8] {
        let mut corners = [DVec3::ZERO; 8];
        for (index, corner) in corners.iter_mut().enumerate() {
            *corner = DVec3::new(
                if index & 1 == 0 { self.min.x } else { self.max.x },
                if index & 2 == 0 { self.min.y } else { self.max.y },
                if index & 4 == 0 { self.min.z } else { self.max.z },
            );
        }
        corners
    }

    /// Flat `[xmin, xmax, ymin, ymax, zmin, zmax]` layout used by viewport fitting.
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.min.x, self.max.x, self.min.y, self.max.y, self.min.z, self.max.z,
        ]
    }

    pub fn from_array(bounds: [f64; 6]) -> Self {
        Self {
            min: DVec3::new(bounds[0], bounds[2], bounds[4]),
            max: DVec3::new(bounds[1], bounds[3], bounds[5]),
        }
    }
}
