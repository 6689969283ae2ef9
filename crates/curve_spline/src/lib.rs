//! Curve generators for markups: piecewise linear and Catmull-Rom.

mod catmull_rom;
mod linear;

use curve_api::{
    CurveError, CurveGenerator, CurveKind, CurvePoly, CurveResult, CurveSampling,
    MAX_CURVE_SAMPLES, MAX_POINTS_PER_SEGMENT,
};
use glam::DVec3;

pub use catmull_rom::{catmull_rom_point, CatmullRomCurveGenerator};
pub use linear::LinearCurveGenerator;

/// Returns the generator implementing `kind`.
pub fn generator_for(kind: CurveKind) -> Box<dyn CurveGenerator> {
    match kind {
        CurveKind::Linear => Box::new(LinearCurveGenerator::new()),
        CurveKind::CatmullRom => Box::new(CatmullRomCurveGenerator::new()),
    }
}

fn steps_per_segment(sampling: &CurveSampling) -> CurveResult<usize> {
    if sampling.points_per_segment == 0 {
        return Err(CurveError::InvalidSampling(
            "points_per_segment must be at least 1".to_string(),
        ));
    }
    if sampling.points_per_segment > MAX_POINTS_PER_SEGMENT {
        return Err(CurveError::InvalidSampling(format!(
            "points_per_segment {} exceeds the limit of {MAX_POINTS_PER_SEGMENT}",
            sampling.points_per_segment
        )));
    }
    Ok(sampling.points_per_segment as usize)
}

/// Walks every control-polygon segment (including the closing one) and samples
/// `evaluate(segment, t)` for `t` in `[0, 1)`. Open curves end on their last
/// control point.
fn sample_segments(
    input: &CurvePoly,
    sampling: &CurveSampling,
    evaluate: impl Fn(usize, f64) -> DVec3,
) -> CurveResult<CurvePoly> {
    let steps = steps_per_segment(sampling)?;
    let count = input.points.len();
    if count < 2 {
        return Ok(CurvePoly::empty(input.closed));
    }

    let segment_count = if input.closed { count } else { count - 1 };
    let capacity = segment_count
        .checked_mul(steps)
        .and_then(|samples| samples.checked_add(1))
        .filter(|samples| *samples <= MAX_CURVE_SAMPLES)
        .ok_or_else(|| {
            CurveError::InvalidSampling(format!(
                "{segment_count} segments at {steps} points each exceed {MAX_CURVE_SAMPLES} samples"
            ))
        })?;
    let mut points = Vec::with_capacity(capacity);
    let mut parameters = Vec::with_capacity(capacity);

    for segment in 0..segment_count {
        for step in 0..steps {
            let t = step as f64 / steps as f64;
            points.push(evaluate(segment, t));
            parameters.push(segment as f64 + t);
        }
    }

    if !input.closed {
        points.push(input.points[count - 1]);
        parameters.push((count - 1) as f64);
    }

    Ok(CurvePoly::from_samples(points, parameters, input.closed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sampling_is_rejected() {
        let input = CurvePoly::from_control_points(&[DVec3::ZERO, DVec3::X], false);
        let sampling = CurveSampling {
            points_per_segment: 0,
        };
        for kind in CurveKind::ALL {
            let result = generator_for(kind).generate(&input, &sampling);
            assert!(matches!(result, Err(CurveError::InvalidSampling(_))));
        }
    }

    #[test]
    fn oversized_sampling_is_rejected() {
        let input = CurvePoly::from_control_points(&[DVec3::ZERO, DVec3::X, DVec3::Y], false);
        for kind in CurveKind::ALL {
            let generator = generator_for(kind);
            let at_limit = CurveSampling {
                points_per_segment: MAX_POINTS_PER_SEGMENT,
            };
            let curve = generator.generate(&input, &at_limit).unwrap();
            assert_eq!(curve.len(), 2 * MAX_POINTS_PER_SEGMENT as usize + 1);

            for points_per_segment in [MAX_POINTS_PER_SEGMENT + 1, u32::MAX] {
                let sampling = CurveSampling { points_per_segment };
                let result = generator.generate(&input, &sampling);
                assert!(matches!(result, Err(CurveError::InvalidSampling(_))), "{kind:?}");
            }
        }
    }

    #[test]
    fn total_sample_count_is_capped() {
        let segments = MAX_CURVE_SAMPLES / MAX_POINTS_PER_SEGMENT as usize + 1;
        let control: Vec<DVec3> = (0..=segments).map(|i| DVec3::X * i as f64).collect();
        let input = CurvePoly::from_control_points(&control, false);
        let sampling = CurveSampling {
            points_per_segment: MAX_POINTS_PER_SEGMENT,
        };
        let result = generator_for(CurveKind::Linear).generate(&input, &sampling);
        assert!(matches!(result, Err(CurveError::InvalidSampling(_))));
    }

    #[test]
    fn too_few_points_give_empty_curve() {
        for kind in CurveKind::ALL {
            let generator = generator_for(kind);
            assert_eq!(generator.kind(), kind);
            for count in 0..2 {
                let input = CurvePoly::from_control_points(&vec![DVec3::ONE; count], true);
                let curve = generator
                    .generate(&input, &CurveSampling::default())
                    .unwrap();
                assert!(curve.is_empty());
                assert!(curve.closed);
            }
        }
    }

    #[test]
    fn curves_pass_through_control_points_in_order() {
        let control = [
            DVec3::ZERO,
            DVec3::new(1.0, 2.0, 0.0),
            DVec3::new(3.0, 1.0, 1.0),
            DVec3::new(4.0, -1.0, 2.0),
        ];
        let sampling = CurveSampling {
            points_per_segment: 4,
        };
        for kind in CurveKind::ALL {
            for closed in [false, true] {
                let input = CurvePoly::from_control_points(&control, closed);
                let curve = generator_for(kind).generate(&input, &sampling).unwrap();
                for (index, point) in control.iter().enumerate() {
                    let sample = &curve.points[index * 4];
                    assert!(sample.abs_diff_eq(*point, 1e-12), "{kind:?} closed={closed}");
                    assert_eq!(curve.parameters[index * 4], index as f64);
                }
                let expected = if closed { 16 } else { 13 };
                assert_eq!(curve.len(), expected);
                assert_eq!(curve.polyline.first(), Some(&0));
                assert_eq!(curve.polyline.last(), Some(if closed { &0 } else { &12 }));
            }
        }
    }
}
