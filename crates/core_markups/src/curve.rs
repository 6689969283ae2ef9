//! Lazily generated curve through a node's control points.

use std::{cell::RefCell, rc::Rc};

use curve_api::{CurveGenerator, CurveKind, CurvePoly, CurveResult, CurveSampling};
use glam::DVec3;
use tracing::{debug, warn};
use transforms::CoordinateTransformPipeline;

use crate::{scene::SceneSlot, MarkupsError, MarkupsResult, NodeId};

struct CurveState {
    input: Vec<DVec3>,
    closed: bool,
    generator: Box<dyn CurveGenerator>,
    sampling: CurveSampling,
    /// Bumped whenever anything feeding the generator changes.
    version: u64,
    cached: Option<(u64, Rc<CurvePoly>)>,
}

impl CurveState {
    fn invalidate(&mut self) {
        self.version += 1;
    }

    fn cached(&self) -> Option<Rc<CurvePoly>> {
        match &self.cached {
            Some((version, curve)) if *version == self.version => Some(Rc::clone(curve)),
            _ => None,
        }
    }

    fn store(&mut self, curve: CurvePoly) -> Rc<CurvePoly> {
        debug!(
            "regenerated {} curve: {} control points -> {} samples",
            self.generator.name(),
            self.input.len(),
            curve.len()
        );
        let curve = Rc::new(curve);
        self.cached = Some((self.version, Rc::clone(&curve)));
        curve
    }

    fn generate(&self) -> CurveResult<CurvePoly> {
        let input = CurvePoly::from_control_points(&self.input, self.closed);
        self.generator.generate(&input, &self.sampling)
    }

    /// Cached curve, regenerated when stale. A failing generator yields an
    /// empty curve.
    fn current(&mut self) -> Rc<CurvePoly> {
        if let Some(curve) = self.cached() {
            return curve;
        }
        let curve = self.generate().unwrap_or_else(|err| {
            warn!("{} curve generation failed: {}", self.generator.name(), err);
            CurvePoly::empty(self.closed)
        });
        self.store(curve)
    }

    fn checked(&mut self) -> MarkupsResult<Rc<CurvePoly>> {
        if self.input.len() < 2 {
            return Err(MarkupsError::DegenerateGeometry(format!(
                "a curve needs at least two control points, got {}",
                self.input.len()
            )));
        }
        if let Some(curve) = self.cached() {
            return Ok(curve);
        }
        let curve = self.generate()?;
        Ok(self.store(curve))
    }
}

/// Mirrors the node's control point positions and derives the curve from them.
///
/// The local curve is generated on first read after a change and reused until
/// the next change. World output is never cached; it is mapped through the
/// scene's current transform on every read.
pub struct CurveSubsystem {
    shared: Rc<RefCell<CurveState>>,
}

impl CurveSubsystem {
    pub fn new(generator: Box<dyn CurveGenerator>, sampling: CurveSampling, closed: bool) -> Self {
        Self {
            shared: Rc::new(RefCell::new(CurveState {
                input: Vec::new(),
                closed,
                generator,
                sampling,
                version: 0,
                cached: None,
            })),
        }
    }

    pub fn with_kind(kind: CurveKind, sampling: CurveSampling, closed: bool) -> Self {
        Self::new(curve_spline::generator_for(kind), sampling, closed)
    }

    pub fn version(&self) -> u64 {
        self.shared.borrow().version
    }

    /// True when the next read has to run the generator.
    pub fn is_stale(&self) -> bool {
        let state = self.shared.borrow();
        !matches!(&state.cached, Some((version, _)) if *version == state.version)
    }

    pub fn closed(&self) -> bool {
        self.shared.borrow().closed
    }

    /// Returns whether the topology actually changed.
    pub fn set_closed(&self, closed: bool) -> bool {
        let mut state = self.shared.borrow_mut();
        if state.closed == closed {
            return false;
        }
        state.closed = closed;
        state.invalidate();
        true
    }

    pub fn kind(&self) -> CurveKind {
        self.shared.borrow().generator.kind()
    }

    pub fn set_generator(&self, generator: Box<dyn CurveGenerator>) {
        let mut state = self.shared.borrow_mut();
        state.generator = generator;
        state.invalidate();
    }

    pub fn sampling(&self) -> CurveSampling {
        self.shared.borrow().sampling.clone()
    }

    pub fn set_sampling(&self, sampling: CurveSampling) {
        let mut state = self.shared.borrow_mut();
        if state.sampling != sampling {
            state.sampling = sampling;
            state.invalidate();
        }
    }

    pub fn input_points(&self) -> Vec<DVec3> {
        self.shared.borrow().input.clone()
    }

    pub(crate) fn insert_point(&self, index: usize, position: DVec3) {
        let mut state = self.shared.borrow_mut();
        state.input.insert(index, position);
        state.invalidate();
    }

    pub(crate) fn remove_point(&self, index: usize) {
        let mut state = self.shared.borrow_mut();
        state.input.remove(index);
        state.invalidate();
    }

    pub(crate) fn set_point(&self, index: usize, position: DVec3) {
        let mut state = self.shared.borrow_mut();
        state.input[index] = position;
        state.invalidate();
    }

    pub(crate) fn swap_points(&self, first: usize, second: usize) {
        let mut state = self.shared.borrow_mut();
        state.input.swap(first, second);
        state.invalidate();
    }

    pub(crate) fn set_points(&self, points: Vec<DVec3>) {
        let mut state = self.shared.borrow_mut();
        state.input = points;
        state.invalidate();
    }

    /// Curve in the node's local frame. Repeated reads without an intervening
    /// change return the same allocation.
    pub fn curve(&self) -> Rc<CurvePoly> {
        self.shared.borrow_mut().current()
    }

    /// Like [`curve`](Self::curve) but reports why no curve exists instead of
    /// returning an empty one.
    pub fn try_curve(&self) -> MarkupsResult<Rc<CurvePoly>> {
        self.shared.borrow_mut().checked()
    }

    pub fn curve_world(&self, pipeline: &CoordinateTransformPipeline) -> CurvePoly {
        world_curve(&self.curve(), pipeline)
    }

    /// Read-only handle that follows this curve and whatever scene `scene`
    /// holds at read time.
    pub(crate) fn world_output(&self, node: NodeId, scene: SceneSlot) -> CurveWorldOutput {
        CurveWorldOutput {
            shared: Rc::clone(&self.shared),
            node,
            scene,
        }
    }
}

fn world_curve(local: &CurvePoly, pipeline: &CoordinateTransformPipeline) -> CurvePoly {
    if pipeline.is_identity() {
        return local.clone();
    }
    local.map_points(|point| pipeline.position_to_world(point))
}

/// World-space curve output that downstream consumers can hold on to.
///
/// Each read sees the node's latest control points and the scene's current
/// transform for the node.
#[derive(Clone)]
pub struct CurveWorldOutput {
    shared: Rc<RefCell<CurveState>>,
    node: NodeId,
    scene: SceneSlot,
}

impl CurveWorldOutput {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn version(&self) -> u64 {
        self.shared.borrow().version
    }

    pub fn curve_world(&self) -> CurvePoly {
        let pipeline = CoordinateTransformPipeline::new(self.scene.local_to_world(self.node));
        let local = self.shared.borrow_mut().current();
        world_curve(&local, &pipeline)
    }

    pub fn points_world(&self) -> Vec<DVec3> {
        self.curve_world().points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DAffine3;

    fn linear() -> CurveSubsystem {
        CurveSubsystem::with_kind(
            CurveKind::Linear,
            CurveSampling {
                points_per_segment: 2,
            },
            false,
        )
    }

    #[test]
    fn reads_without_changes_reuse_the_curve() {
        let curve = linear();
        curve.set_points(vec![DVec3::ZERO, DVec3::X, DVec3::Y]);
        assert!(curve.is_stale());
        let first = curve.curve();
        assert!(!curve.is_stale());
        let second = curve.curve();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn every_input_change_invalidates() {
        let curve = linear();
        curve.set_points(vec![DVec3::ZERO, DVec3::X]);
        let mut previous = curve.curve();
        let changes: [&dyn Fn(&CurveSubsystem); 5] = [
            &|c: &CurveSubsystem| c.insert_point(1, DVec3::Y),
            &|c: &CurveSubsystem| c.set_point(0, DVec3::Z),
            &|c: &CurveSubsystem| c.swap_points(0, 1),
            &|c: &CurveSubsystem| {
                c.set_closed(true);
            },
            &|c: &CurveSubsystem| c.remove_point(2),
        ];
        for change in changes {
            let version = curve.version();
            change(&curve);
            assert!(curve.version() > version);
            let next = curve.curve();
            assert!(!Rc::ptr_eq(&previous, &next));
            previous = next;
        }
    }

    #[test]
    fn unchanged_topology_keeps_cache() {
        let curve = linear();
        curve.set_points(vec![DVec3::ZERO, DVec3::X]);
        let first = curve.curve();
        assert!(!curve.set_closed(false));
        curve.set_sampling(curve.sampling());
        assert!(Rc::ptr_eq(&first, &curve.curve()));
    }

    #[test]
    fn switching_generator_regenerates() {
        let curve = linear();
        curve.set_points(vec![DVec3::ZERO, DVec3::X, DVec3::new(2.0, 1.0, 0.0)]);
        let linear_mid = curve.curve().points[3];
        curve.set_generator(curve_spline::generator_for(CurveKind::CatmullRom));
        assert_eq!(curve.kind(), CurveKind::CatmullRom);
        assert_ne!(curve.curve().points[3], linear_mid);
    }

    #[test]
    fn invalid_sampling_yields_empty_curve() {
        let curve = linear();
        curve.set_points(vec![DVec3::ZERO, DVec3::X]);
        curve.set_sampling(CurveSampling {
            points_per_segment: 0,
        });
        assert!(curve.curve().is_empty());
    }

    #[test]
    fn checked_curve_reports_failures() {
        let curve = linear();
        curve.set_points(vec![DVec3::ZERO]);
        assert!(matches!(
            curve.try_curve(),
            Err(MarkupsError::DegenerateGeometry(_))
        ));
        curve.insert_point(1, DVec3::X);
        let generated = curve.try_curve().unwrap();
        assert!(Rc::ptr_eq(&generated, &curve.curve()));
        curve.set_sampling(CurveSampling {
            points_per_segment: 0,
        });
        assert!(matches!(curve.try_curve(), Err(MarkupsError::Curve(_))));
    }

    #[test]
    fn world_curve_follows_pipeline() {
        let curve = linear();
        curve.set_points(vec![DVec3::ZERO, DVec3::X]);
        let shift = DVec3::new(0.0, 0.0, 5.0);
        let pipeline = CoordinateTransformPipeline::from_affine(DAffine3::from_translation(shift));
        let world = curve.curve_world(&pipeline);
        for (local, world) in curve.curve().points.iter().zip(&world.points) {
            assert_eq!(*local + shift, *world);
        }
    }
}
