use glam::DVec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience alias for fallible curve operations.
pub type CurveResult<T> = Result<T, CurveError>;

/// Interpolation schemes available to markups curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CurveKind {
    /// Straight segments between consecutive control points.
    #[default]
    Linear,
    /// Uniform Catmull-Rom spline through every control point.
    CatmullRom,
}

impl CurveKind {
    pub const ALL: [CurveKind; 2] = [CurveKind::Linear, CurveKind::CatmullRom];

    pub const fn label(&self) -> &'static str {
        match self {
            CurveKind::Linear => "Linear",
            CurveKind::CatmullRom => "Catmull-Rom spline",
        }
    }
}

/// Upper bound accepted for [`CurveSampling::points_per_segment`].
pub const MAX_POINTS_PER_SEGMENT: u32 = 1024;

/// Upper bound on the number of points a single generated curve may hold.
pub const MAX_CURVE_SAMPLES: usize = 1 << 24;

/// Parameters controlling how densely a curve is sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSampling {
    /// Generated points per control-polygon segment, the segment end excluded.
    pub points_per_segment: u32,
}

impl Default for CurveSampling {
    fn default() -> Self {
        Self {
            points_per_segment: 10,
        }
    }
}

/// Point set plus polyline topology, used both for the control polygon fed to a
/// generator and for the curve it produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurvePoly {
    pub points: Vec<DVec3>,
    /// Polyline connectivity. A closed curve repeats its first index at the end.
    pub polyline: Vec<u32>,
    /// Position of each point along the control polygon: segment index plus fraction.
    pub parameters: Vec<f64>,
    pub closed: bool,
}

impl CurvePoly {
    pub fn empty(closed: bool) -> Self {
        Self {
            closed,
            ..Self::default()
        }
    }

    /// Control polygon: one point per control point, consecutive points connected.
    pub fn from_control_points(points: &[DVec3], closed: bool) -> Self {
        Self {
            points: points.to_vec(),
            polyline: polyline_indices(points.len(), closed),
            parameters: (0..points.len()).map(|index| index as f64).collect(),
            closed,
        }
    }

    /// Builds a poly from sampled points, deriving the polyline from `closed`.
    pub fn from_samples(points: Vec<DVec3>, parameters: Vec<f64>, closed: bool) -> Self {
        debug_assert_eq!(points.len(), parameters.len());
        let polyline = polyline_indices(points.len(), closed);
        Self {
            points,
            polyline,
            parameters,
            closed,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Line segments in polyline order.
    pub fn segments(&self) -> impl Iterator<Item = (DVec3, DVec3)> + '_ {
        self.polyline
            .windows(2)
            .map(|pair| (self.points[pair[0] as usize], self.points[pair[1] as usize]))
    }

    pub fn length(&self) -> f64 {
        self.segments().map(|(a, b)| a.distance(b)).sum()
    }

    /// Same topology and parameters with every point mapped through `map`.
    pub fn map_points(&self, map: impl Fn(DVec3) -> DVec3) -> CurvePoly {
        CurvePoly {
            points: self.points.iter().map(|point| map(*point)).collect(),
            polyline: self.polyline.clone(),
            parameters: self.parameters.clone(),
            closed: self.closed,
        }
    }

    /// Control point whose segment contains the given generated point.
    ///
    /// `None` when fewer than two control points exist or the index is out of range.
    pub fn control_point_index(&self, curve_index: usize, control_point_count: usize) -> Option<usize> {
        if control_point_count < 2 {
            return None;
        }
        let parameter = *self.parameters.get(curve_index)?;
        let segment = parameter.max(0.0).floor() as usize;
        if self.closed {
            Some(segment % control_point_count)
        } else {
            Some(segment.min(control_point_count - 1))
        }
    }
}

/// Consecutive indices `0..count`, closed by repeating `0` when requested and
/// at least two points exist.
pub fn polyline_indices(count: usize, closed: bool) -> Vec<u32> {
    let mut indices: Vec<u32> = (0..count as u32).collect();
    if closed && count >= 2 {
        indices.push(0);
    }
    indices
}

/// Trait implemented by every curve interpolation strategy.
pub trait CurveGenerator: Send {
    /// Human-friendly identifier for logging purposes.
    fn name(&self) -> &str;

    fn kind(&self) -> CurveKind;

    /// Turns a control polygon into a curve.
    ///
    /// The output passes through or near every input point in order and keeps
    /// the input's open/closed topology. Fewer than two input points produce an
    /// empty curve.
    fn generate(&self, input: &CurvePoly, sampling: &CurveSampling) -> CurveResult<CurvePoly>;
}

/// Standardized error type for curve generation.
#[derive(Debug, Error)]
pub enum CurveError {
    #[error("invalid curve sampling: {0}")]
    InvalidSampling(String),
    #[error("curve kind unsupported: {0}")]
    Unsupported(String),
    #[error("invalid curve input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_polyline_connects_consecutive_points() {
        assert_eq!(polyline_indices(3, false), vec![0, 1, 2]);
        assert_eq!(polyline_indices(3, true), vec![0, 1, 2, 0]);
    }

    #[test]
    fn two_point_closed_polyline_doubles_the_segment() {
        let poly = CurvePoly::from_control_points(&[DVec3::ZERO, DVec3::X], true);
        assert_eq!(poly.polyline, vec![0, 1, 0]);
        assert_eq!(poly.segments().count(), 2);
        assert_eq!(poly.length(), 2.0);
    }

    #[test]
    fn single_point_has_no_segments() {
        let poly = CurvePoly::from_control_points(&[DVec3::ONE], true);
        assert_eq!(poly.polyline, vec![0]);
        assert_eq!(poly.segments().count(), 0);
    }

    #[test]
    fn control_point_index_follows_parameters() {
        let poly = CurvePoly::from_samples(
            vec![DVec3::ZERO; 5],
            vec![0.0, 0.5, 1.0, 1.5, 2.0],
            false,
        );
        assert_eq!(poly.control_point_index(1, 3), Some(0));
        assert_eq!(poly.control_point_index(2, 3), Some(1));
        assert_eq!(poly.control_point_index(4, 3), Some(2));
        assert_eq!(poly.control_point_index(5, 3), None);
        assert_eq!(poly.control_point_index(0, 1), None);
    }

    #[test]
    fn closed_parameters_wrap_to_first_point() {
        let poly = CurvePoly::from_samples(vec![DVec3::ZERO; 3], vec![0.0, 1.0, 2.5], true);
        assert_eq!(poly.control_point_index(2, 2), Some(0));
    }
}
