//! Local/world mapping driven by the owning node's current placement.

use glam::{DAffine3, DMat3, DVec3};

use crate::{Bounds, TransformError, TransformResult, SINGULAR_EPSILON};

/// Maps geometry between a node's local frame and world space.
///
/// Built fresh from the scene's transform for every query so that placement
/// changes are always picked up. Without a transform the pipeline is the
/// identity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoordinateTransformPipeline {
    local_to_world: Option<DAffine3>,
}

impl CoordinateTransformPipeline {
    pub const IDENTITY: Self = Self {
        local_to_world: None,
    };

    pub fn new(local_to_world: Option<DAffine3>) -> Self {
        Self { local_to_world }
    }

    pub fn from_affine(local_to_world: DAffine3) -> Self {
        Self::new(Some(local_to_world))
    }

    pub fn is_identity(&self) -> bool {
        self.local_to_world
            .map_or(true, |transform| transform == DAffine3::IDENTITY)
    }

    pub fn local_to_world(&self) -> DAffine3 {
        self.local_to_world.unwrap_or(DAffine3::IDENTITY)
    }

    fn linear(&self) -> DMat3 {
        self.local_to_world().matrix3
    }

    fn inverse_linear(&self) -> TransformResult<DMat3> {
        let linear = self.linear();
        let determinant = linear.determinant();
        if determinant.abs() < SINGULAR_EPSILON || !determinant.is_finite() {
            return Err(TransformError::Singular(determinant));
        }
        Ok(linear.inverse())
    }

    pub fn world_to_local(&self) -> TransformResult<DAffine3> {
        let inverse_linear = self.inverse_linear()?;
        let translation = -(inverse_linear * self.local_to_world().translation);
        Ok(DAffine3::from_mat3_translation(inverse_linear, translation))
    }

    pub fn position_to_world(&self, local: DVec3) -> DVec3 {
        match self.local_to_world {
            Some(transform) => transform.transform_point3(local),
            None => local,
        }
    }

    pub fn world_to_position(&self, world: DVec3) -> TransformResult<DVec3> {
        match self.local_to_world {
            Some(_) => Ok(self.world_to_local()?.transform_point3(world)),
            None => Ok(world),
        }
    }

    pub fn points_to_world(&self, points: &[DVec3]) -> Vec<DVec3> {
        points
            .iter()
            .map(|point| self.position_to_world(*point))
            .collect()
    }

    /// Applies the linear part only; translation does not affect directions.
    pub fn vector_to_world(&self, local: DVec3) -> DVec3 {
        self.linear() * local
    }

    /// Applies the linear part only. The result is not re-orthonormalized, so a
    /// scaling transform yields scaled axes.
    pub fn orientation_to_world(&self, orientation: DMat3) -> DMat3 {
        self.linear() * orientation
    }

    pub fn orientation_to_local(&self, orientation_world: DMat3) -> TransformResult<DMat3> {
        Ok(self.inverse_linear()? * orientation_world)
    }

    /// Normals follow the inverse transpose of the linear part, which keeps them
    /// perpendicular to transformed surfaces under non-uniform scaling.
    pub fn normal_to_world(&self, local: DVec3) -> TransformResult<DVec3> {
        if self.local_to_world.is_none() {
            return Ok(local.normalize_or_zero());
        }
        let normal_matrix = self.inverse_linear()?.transpose();
        Ok((normal_matrix * local).normalize_or_zero())
    }

    /// Re-derives an axis-aligned box from all eight transformed corners.
    pub fn bounds_to_world(&self, local: &Bounds) -> Bounds {
        if self.local_to_world.is_none() {
            return *local;
        }
        let corners = local.corners();
        let mut world = Bounds::from_point(self.position_to_world(corners[0]));
        for corner in &corners[1..] {
            world.include_point(self.position_to_world(*corner));
        }
        world
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn placed() -> CoordinateTransformPipeline {
        CoordinateTransformPipeline::from_affine(DAffine3::from_scale_rotation_translation(
            DVec3::new(2.0, 1.0, 0.5),
            glam::DQuat::from_rotation_z(0.7),
            DVec3::new(10.0, -3.0, 4.0),
        ))
    }

    #[test]
    fn missing_transform_is_identity() {
        let pipeline = CoordinateTransformPipeline::IDENTITY;
        let p = DVec3::new(1.0, 2.0, 3.0);
        assert!(pipeline.is_identity());
        assert_eq!(pipeline.position_to_world(p), p);
        assert_eq!(pipeline.world_to_position(p).unwrap(), p);
        assert_eq!(pipeline.orientation_to_world(DMat3::IDENTITY), DMat3::IDENTITY);
    }

    #[test]
    fn world_local_round_trip() {
        let mut rng = StdRng::seed_from_u64(42);
        let pipeline = placed();
        for _ in 0..200 {
            let local = DVec3::new(
                rng.gen_range(-100.0..100.0),
                rng.gen_range(-100.0..100.0),
                rng.gen_range(-100.0..100.0),
            );
            let back = pipeline
                .world_to_position(pipeline.position_to_world(local))
                .unwrap();
            assert!(back.abs_diff_eq(local, 1e-9));
        }
    }

    #[test]
    fn orientation_ignores_translation() {
        let pipeline = CoordinateTransformPipeline::from_affine(DAffine3::from_translation(
            DVec3::new(5.0, 5.0, 5.0),
        ));
        assert_eq!(pipeline.orientation_to_world(DMat3::IDENTITY), DMat3::IDENTITY);
        assert_eq!(pipeline.vector_to_world(DVec3::X), DVec3::X);
    }

    #[test]
    fn normals_use_inverse_transpose() {
        // A plane tilted 45 degrees, squashed along x.
        let pipeline =
            CoordinateTransformPipeline::from_affine(DAffine3::from_scale(DVec3::new(2.0, 1.0, 1.0)));
        let tangent = DVec3::new(1.0, -1.0, 0.0);
        let normal = DVec3::new(1.0, 1.0, 0.0).normalize();
        let world_tangent = pipeline.vector_to_world(tangent);
        let world_normal = pipeline.normal_to_world(normal).unwrap();
        assert_abs_diff_eq!(world_tangent.dot(world_normal), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(world_normal.length(), 1.0, epsilon = 1e-12);
        // A plain vector transform would no longer be perpendicular.
        assert!(world_tangent.dot(pipeline.vector_to_world(normal)).abs() > 0.1);
    }

    #[test]
    fn singular_transform_reports_error() {
        let pipeline =
            CoordinateTransformPipeline::from_affine(DAffine3::from_scale(DVec3::new(1.0, 0.0, 1.0)));
        assert!(matches!(
            pipeline.world_to_position(DVec3::ONE),
            Err(TransformError::Singular(_))
        ));
        assert!(pipeline.normal_to_world(DVec3::Z).is_err());
    }

    #[test]
    fn rotated_bounds_grow_to_fit_corners() {
        let pipeline = CoordinateTransformPipeline::from_affine(DAffine3::from_rotation_z(
            std::f64::consts::FRAC_PI_4,
        ));
        let local = Bounds {
            min: DVec3::new(-1.0, -1.0, 0.0),
            max: DVec3::new(1.0, 1.0, 0.0),
        };
        let world = pipeline.bounds_to_world(&local);
        let half_diagonal = 2f64.sqrt();
        assert_abs_diff_eq!(world.max.x, half_diagonal, epsilon = 1e-12);
        assert_abs_diff_eq!(world.min.y, -half_diagonal, epsilon = 1e-12);
        // Mapping only min/max would give a degenerate box on the y axis.
        let naive = Bounds::from_points([
            pipeline.position_to_world(local.min),
            pipeline.position_to_world(local.max),
        ])
        .unwrap();
        assert!(naive.size().x < world.size().x);
    }
}
