use curve_api::{CurveGenerator, CurveKind, CurvePoly, CurveResult, CurveSampling};
use glam::DVec3;
use tracing::debug;

use crate::sample_segments;

/// Point on a uniform Catmull-Rom segment running from `p1` (t = 0) to `p2` (t = 1).
pub fn catmull_rom_point(p0: DVec3, p1: DVec3, p2: DVec3, p3: DVec3, t: f64) -> DVec3 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

/// Interpolating spline through every control point.
///
/// Open curves mirror phantom points past both ends so the curve starts and
/// ends on the first and last control point; closed curves wrap around.
#[derive(Debug, Default, Clone, Copy)]
pub struct CatmullRomCurveGenerator;

impl CatmullRomCurveGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl CurveGenerator for CatmullRomCurveGenerator {
    fn name(&self) -> &str {
        "catmull-rom"
    }

    fn kind(&self) -> CurveKind {
        CurveKind::CatmullRom
    }

    fn generate(&self, input: &CurvePoly, sampling: &CurveSampling) -> CurveResult<CurvePoly> {
        let points = &input.points;
        let count = points.len();
        let closed = input.closed;

        let curve = sample_segments(input, sampling, |segment, t| {
            let p1 = points[segment];
            let p2 = points[(segment + 1) % count];
            let p0 = if segment > 0 {
                points[segment - 1]
            } else if closed {
                points[count - 1]
            } else {
                2.0 * points[0] - points[1]
            };
            let p3 = if segment + 2 < count || closed {
                points[(segment + 2) % count]
            } else {
                2.0 * points[count - 1] - points[count - 2]
            };
            catmull_rom_point(p0, p1, p2, p3, t)
        })?;
        debug!(
            "catmull-rom curve: {} control points -> {} samples",
            count,
            curve.len()
        );
        Ok(curve)
    }
}
