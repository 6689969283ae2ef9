use curve_api::{CurveGenerator, CurveKind, CurvePoly, CurveResult, CurveSampling};
use tracing::debug;

use crate::sample_segments;

/// Straight segments between consecutive control points, subdivided evenly.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearCurveGenerator;

impl LinearCurveGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl CurveGenerator for LinearCurveGenerator {
    fn name(&self) -> &str {
        "linear"
    }

    fn kind(&self) -> CurveKind {
        CurveKind::Linear
    }

    fn generate(&self, input: &CurvePoly, sampling: &CurveSampling) -> CurveResult<CurvePoly> {
        let points = &input.points;
        let count = points.len();
        let curve = sample_segments(input, sampling, |segment, t| {
            points[segment].lerp(points[(segment + 1) % count], t)
        })?;
        debug!(
            "linear curve: {} control points -> {} samples",
            count,
            curve.len()
        );
        Ok(curve)
    }
}
