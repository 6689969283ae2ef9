use std::{cell::Cell, fmt, rc::Rc};

use curve_api::{CurveKind, CurvePoly, CurveSampling};
use glam::{DAffine3, DMat3, DVec3};
use settings::{DisplaySettings, MarkupsSettings};
use tracing::{debug, warn};
use transforms::{axis_angle_to_matrix, orthonormalize, AxisAngle, Bounds, CoordinateTransformPipeline};

use crate::{
    events::ObserverList, scene::SceneSlot, ControlPoint, ControlPointStore, CurveSubsystem,
    CurveWorldOutput, Displayable, EventPayload, MarkupsDisplay, MarkupsEvent, MarkupsEventKind,
    MarkupsResult, MarkupsSnapshot, NodeId, ObserverId, SceneContext, TrustedLoader,
};

/// An ordered list of control points plus the curve through them.
///
/// Every successful mutation marks the node modified and emits exactly one
/// event per affected point (or one list-level event). Failed calls change
/// nothing and emit nothing.
pub struct MarkupsNode {
    id: NodeId,
    name: String,
    store: ControlPointStore,
    curve: CurveSubsystem,
    locked: bool,
    label_format: String,
    required_number_of_control_points: usize,
    maximum_number_of_control_points: usize,
    /// Bumped on every control point position change.
    geometry_version: u64,
    explicit_center: Option<(u64, DVec3)>,
    mean_center: Cell<Option<(u64, DVec3)>>,
    display_defaults: DisplaySettings,
    scene: SceneSlot,
    observers: ObserverList,
    modified_time: u64,
    read_write_time: u64,
}

impl MarkupsNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_settings(name, &MarkupsSettings::default())
    }

    pub fn from_settings(name: impl Into<String>, settings: &MarkupsSettings) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            store: ControlPointStore::new(),
            curve: CurveSubsystem::with_kind(
                settings.curve.kind,
                settings.curve.sampling(),
                settings.curve.closed,
            ),
            locked: false,
            label_format: settings.labels.format.clone(),
            required_number_of_control_points: settings.placement.required_control_points,
            maximum_number_of_control_points: settings.placement.maximum_control_points,
            geometry_version: 0,
            explicit_center: None,
            mean_center: Cell::new(None),
            display_defaults: settings.display.clone(),
            scene: SceneSlot::default(),
            observers: ObserverList::default(),
            modified_time: 0,
            read_write_time: 0,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.name != name {
            self.name = name;
            self.notify(MarkupsEventKind::Modified, EventPayload::None);
        }
    }

    pub fn scene(&self) -> Option<Rc<dyn SceneContext>> {
        self.scene.get()
    }

    /// Re-binds the node. Curve outputs handed out earlier follow the new scene.
    pub fn set_scene(&mut self, scene: Option<Rc<dyn SceneContext>>) {
        self.scene.set(scene);
    }

    /// Local/world mapping for the node's current placement in the scene.
    pub fn pipeline(&self) -> CoordinateTransformPipeline {
        CoordinateTransformPipeline::new(self.scene.local_to_world(self.id))
    }

    // === Observers and change tracking ===

    /// Registers `observer`; observers run in registration order.
    pub fn add_observer<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(&MarkupsNode, &MarkupsEvent) + 'static,
    {
        self.observers.add(Box::new(observer))
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    fn emit(&mut self, kind: MarkupsEventKind, payload: EventPayload) {
        let event = MarkupsEvent::new(self.id, kind, payload);
        debug!("markups `{}`: {:?} {:?}", self.name, kind, payload);
        let mut observers = std::mem::take(&mut self.observers);
        observers.notify(self, &event);
        self.observers = observers;
        if let Some(scene) = self.scene.get() {
            scene.dispatch_event(&event);
        }
    }

    /// Marks the node modified, then emits the event.
    pub(crate) fn notify(&mut self, kind: MarkupsEventKind, payload: EventPayload) {
        self.modified_time += 1;
        if let Some(scene) = self.scene.get() {
            scene.node_modified(self.id);
        }
        self.emit(kind, payload);
    }

    pub fn modified_time(&self) -> u64 {
        self.modified_time
    }

    /// True when the node changed after the last [`mark_read_written`](Self::mark_read_written).
    pub fn modified_since_read(&self) -> bool {
        self.modified_time > self.read_write_time
    }

    pub fn mark_read_written(&mut self) {
        self.read_write_time = self.modified_time;
    }

    // === List access ===

    pub fn store(&self) -> &ControlPointStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut ControlPointStore {
        &mut self.store
    }

    pub fn number_of_control_points(&self) -> usize {
        self.store.len()
    }

    pub fn control_points(&self) -> &[ControlPoint] {
        self.store.as_slice()
    }

    pub fn control_point(&self, index: usize) -> MarkupsResult<&ControlPoint> {
        self.store.get(index)
    }

    pub fn control_point_exists(&self, index: usize) -> bool {
        self.store.contains_index(index)
    }

    pub fn control_point_index_by_id(&self, id: &str) -> MarkupsResult<usize> {
        self.store.find_index_by_id(id)
    }

    pub fn control_point_by_id(&self, id: &str) -> MarkupsResult<&ControlPoint> {
        self.store.find_by_id(id)
    }

    pub fn last_used_control_point_number(&self) -> u64 {
        self.store.last_used_control_point_number()
    }

    // === Adding and removing ===

    /// Appends `point`. An empty id is generated, an empty label is derived
    /// from the label format.
    pub fn add_control_point(&mut self, point: ControlPoint) -> MarkupsResult<usize> {
        self.insert_control_point(point, isize::MAX)
    }

    /// Inserts `point` before `target_index`; out-of-range targets are clamped.
    pub fn insert_control_point(
        &mut self,
        mut point: ControlPoint,
        target_index: isize,
    ) -> MarkupsResult<usize> {
        if point.label.is_empty() {
            point.label = self.store.generate_label(&self.label_format, &self.name);
        }
        let position = point.position;
        let scene = self.scene.get();
        let prefix = self.id.to_string();
        let index = self.store.insert_with(point, target_index, || {
            scene
                .as_ref()
                .and_then(|scene| scene.unique_control_point_id(&prefix))
        })?;
        self.curve.insert_point(index, position);
        self.geometry_version += 1;
        self.notify(MarkupsEventKind::PointAdded, EventPayload::Index(index));
        Ok(index)
    }

    pub fn add_control_point_at(&mut self, position: DVec3, label: Option<&str>) -> MarkupsResult<usize> {
        let mut point = ControlPoint::new(position);
        if let Some(label) = label {
            point.label = label.to_owned();
        }
        self.add_control_point(point)
    }

    pub fn add_control_point_world(
        &mut self,
        position_world: DVec3,
        label: Option<&str>,
    ) -> MarkupsResult<usize> {
        let position = self.pipeline().world_to_position(position_world)?;
        self.add_control_point_at(position, label)
    }

    /// Adds `count` points at `position`, returning the index of the last one.
    /// `None` when `count` is zero or an insertion failed.
    pub fn add_n_control_points(
        &mut self,
        count: usize,
        label: Option<&str>,
        position: DVec3,
    ) -> Option<usize> {
        let mut last = None;
        for _ in 0..count {
            match self.add_control_point_at(position, label) {
                Ok(index) => last = Some(index),
                Err(err) => {
                    warn!("adding control points to `{}` stopped: {}", self.name, err);
                    return None;
                }
            }
        }
        last
    }

    /// Removes the point at `index`. The emitted event carries that index.
    pub fn remove_nth_control_point(&mut self, index: usize) -> MarkupsResult<ControlPoint> {
        let removed = self.store.remove(index)?;
        self.curve.remove_point(index);
        self.geometry_version += 1;
        self.notify(MarkupsEventKind::PointRemoved, EventPayload::Index(index));
        Ok(removed)
    }

    /// Clears the list with a single event and restarts label numbering.
    pub fn remove_all_control_points(&mut self) {
        self.store.remove_all();
        self.curve.set_points(Vec::new());
        self.geometry_version += 1;
        self.notify(MarkupsEventKind::AllPointsRemoved, EventPayload::None);
    }

    pub fn swap_control_points(&mut self, first: usize, second: usize) -> MarkupsResult<()> {
        self.store.swap(first, second)?;
        self.curve.swap_points(first, second);
        self.geometry_version += 1;
        self.notify(MarkupsEventKind::PointModified, EventPayload::Index(first));
        self.notify(MarkupsEventKind::PointModified, EventPayload::Index(second));
        Ok(())
    }

    /// Applies `update` to one point. Emits only when `update` reports a change.
    fn update_point(
        &mut self,
        index: usize,
        update: impl FnOnce(&mut ControlPoint) -> bool,
    ) -> MarkupsResult<()> {
        let point = self.store.get_mut(index)?;
        let old_position = point.position;
        if !update(&mut *point) {
            return Ok(());
        }
        let position = point.position;
        if position != old_position {
            self.curve.set_point(index, position);
            self.geometry_version += 1;
        }
        self.notify(MarkupsEventKind::PointModified, EventPayload::Index(index));
        Ok(())
    }

    // === Positions ===

    /// Local position, `DVec3::ZERO` for an invalid index.
    pub fn nth_control_point_position(&self, index: usize) -> DVec3 {
        self.store
            .get(index)
            .map(|point| point.position)
            .unwrap_or(DVec3::ZERO)
    }

    pub fn nth_control_point_position_world(&self, index: usize) -> DVec3 {
        self.pipeline()
            .position_to_world(self.nth_control_point_position(index))
    }

    pub fn control_point_positions(&self) -> Vec<DVec3> {
        self.store.positions()
    }

    pub fn control_point_positions_world(&self) -> Vec<DVec3> {
        self.pipeline().points_to_world(&self.store.positions())
    }

    pub fn set_nth_control_point_position(&mut self, index: usize, position: DVec3) -> MarkupsResult<()> {
        self.update_point(index, |point| replace(&mut point.position, position))
    }

    pub fn set_nth_control_point_position_world(
        &mut self,
        index: usize,
        position_world: DVec3,
    ) -> MarkupsResult<()> {
        let position = self.pipeline().world_to_position(position_world)?;
        self.set_nth_control_point_position(index, position)
    }

    /// Sets position, orientation and the associated node in one step, as
    /// interactive placement does. Emits a single event.
    pub fn set_nth_control_point_position_orientation_world(
        &mut self,
        index: usize,
        position_world: DVec3,
        orientation_world: DMat3,
        associated_node_id: Option<&str>,
    ) -> MarkupsResult<()> {
        let pipeline = self.pipeline();
        let position = pipeline.world_to_position(position_world)?;
        let orientation = orthonormalize(&pipeline.orientation_to_local(orientation_world)?);
        let associated = associated_node_id.map(str::to_owned);
        self.update_point(index, |point| {
            let moved = replace(&mut point.position, position);
            let turned = replace(&mut point.orientation, orientation);
            let attached = replace(&mut point.associated_node_id, associated);
            moved || turned || attached
        })
    }

    // === Orientation ===

    /// Local orientation, identity for an invalid index.
    pub fn nth_control_point_orientation_matrix(&self, index: usize) -> DMat3 {
        self.store
            .get(index)
            .map(|point| point.orientation)
            .unwrap_or(DMat3::IDENTITY)
    }

    pub fn set_nth_control_point_orientation_matrix(
        &mut self,
        index: usize,
        orientation: DMat3,
    ) -> MarkupsResult<()> {
        self.update_point(index, |point| replace(&mut point.orientation, orientation))
    }

    pub fn nth_control_point_orientation_matrix_world(&self, index: usize) -> DMat3 {
        self.pipeline()
            .orientation_to_world(self.nth_control_point_orientation_matrix(index))
    }

    /// The stored orientation is re-orthonormalized after mapping to local.
    pub fn set_nth_control_point_orientation_matrix_world(
        &mut self,
        index: usize,
        orientation_world: DMat3,
    ) -> MarkupsResult<()> {
        let local = self.pipeline().orientation_to_local(orientation_world)?;
        self.set_nth_control_point_orientation_matrix(index, orthonormalize(&local))
    }

    pub fn nth_control_point_orientation(&self, index: usize) -> AxisAngle {
        self.store
            .get(index)
            .map(|point| point.axis_angle())
            .unwrap_or_default()
    }

    pub fn set_nth_control_point_orientation(
        &mut self,
        index: usize,
        orientation: &AxisAngle,
    ) -> MarkupsResult<()> {
        self.set_nth_control_point_orientation_matrix(index, axis_angle_to_matrix(orientation))
    }

    /// Z axis of the local orientation, `DVec3::Z` for an invalid index.
    pub fn nth_control_point_normal(&self, index: usize) -> DVec3 {
        self.nth_control_point_orientation_matrix(index).z_axis
    }

    pub fn nth_control_point_normal_world(&self, index: usize) -> DVec3 {
        let pipeline = self.pipeline();
        let normal = self.nth_control_point_normal(index);
        pipeline.normal_to_world(normal).unwrap_or_else(|err| {
            warn!("singular transform for normal of control point {}: {}", index, err);
            pipeline.vector_to_world(normal).normalize_or_zero()
        })
    }

    // === Per-point attributes ===

    pub fn nth_control_point_id(&self, index: usize) -> String {
        self.store
            .get(index)
            .map(|point| point.id.clone())
            .unwrap_or_default()
    }

    pub fn reset_nth_control_point_id(&mut self, index: usize) -> MarkupsResult<String> {
        let id = self.store.reset_id(index)?;
        self.notify(MarkupsEventKind::PointModified, EventPayload::Index(index));
        Ok(id)
    }

    pub fn nth_control_point_label(&self, index: usize) -> String {
        self.store
            .get(index)
            .map(|point| point.label.clone())
            .unwrap_or_default()
    }

    pub fn set_nth_control_point_label(&mut self, index: usize, label: impl Into<String>) -> MarkupsResult<()> {
        let label = label.into();
        self.update_point(index, |point| replace(&mut point.label, label))
    }

    pub fn nth_control_point_description(&self, index: usize) -> String {
        self.store
            .get(index)
            .map(|point| point.description.clone())
            .unwrap_or_default()
    }

    pub fn set_nth_control_point_description(
        &mut self,
        index: usize,
        description: impl Into<String>,
    ) -> MarkupsResult<()> {
        let description = description.into();
        self.update_point(index, |point| replace(&mut point.description, description))
    }

    pub fn nth_control_point_associated_node_id(&self, index: usize) -> Option<String> {
        self.store
            .get(index)
            .ok()
            .and_then(|point| point.associated_node_id.clone())
    }

    pub fn set_nth_control_point_associated_node_id(
        &mut self,
        index: usize,
        node_id: Option<String>,
    ) -> MarkupsResult<()> {
        self.update_point(index, |point| replace(&mut point.associated_node_id, node_id))
    }

    pub fn nth_control_point_selected(&self, index: usize) -> bool {
        self.store.get(index).map(|point| point.selected).unwrap_or(false)
    }

    pub fn set_nth_control_point_selected(&mut self, index: usize, selected: bool) -> MarkupsResult<()> {
        self.update_point(index, |point| replace(&mut point.selected, selected))
    }

    pub fn nth_control_point_visible(&self, index: usize) -> bool {
        self.store.get(index).map(|point| point.visible).unwrap_or(false)
    }

    pub fn set_nth_control_point_visible(&mut self, index: usize, visible: bool) -> MarkupsResult<()> {
        self.update_point(index, |point| replace(&mut point.visible, visible))
    }

    /// Effective lock: a locked list locks every point regardless of its own
    /// flag. The stored per-point flag is available through [`store`](Self::store).
    pub fn nth_control_point_locked(&self, index: usize) -> bool {
        let own = self.store.get(index).map(|point| point.locked).unwrap_or(false);
        self.locked || own
    }

    pub fn set_nth_control_point_locked(&mut self, index: usize, locked: bool) -> MarkupsResult<()> {
        self.update_point(index, |point| replace(&mut point.locked, locked))
    }

    // === List properties ===

    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn set_locked(&mut self, locked: bool) {
        if replace(&mut self.locked, locked) {
            self.notify(MarkupsEventKind::LockModified, EventPayload::None);
        }
    }

    pub fn label_format(&self) -> &str {
        &self.label_format
    }

    pub fn set_label_format(&mut self, format: impl Into<String>) {
        if replace(&mut self.label_format, format.into()) {
            self.notify(MarkupsEventKind::LabelFormatModified, EventPayload::None);
        }
    }

    /// Bakes the current list name into the label format so later renames do
    /// not affect new labels. Returns whether the format changed.
    pub fn replace_list_name_in_label_format(&mut self) -> bool {
        if !self.label_format.contains("%N") {
            return false;
        }
        let format = self.label_format.replace("%N", &self.name);
        self.set_label_format(format);
        true
    }

    pub fn required_number_of_control_points(&self) -> usize {
        self.required_number_of_control_points
    }

    pub fn set_required_number_of_control_points(&mut self, count: usize) {
        if replace(&mut self.required_number_of_control_points, count) {
            self.notify(MarkupsEventKind::Modified, EventPayload::None);
        }
    }

    /// 0 means unlimited.
    pub fn maximum_number_of_control_points(&self) -> usize {
        self.maximum_number_of_control_points
    }

    pub fn set_maximum_number_of_control_points(&mut self, count: usize) {
        if replace(&mut self.maximum_number_of_control_points, count) {
            self.notify(MarkupsEventKind::Modified, EventPayload::None);
        }
    }

    /// Advisory: the list holds at least the required number of points.
    /// Lists without a requirement are never complete on their own.
    pub fn is_placement_complete(&self) -> bool {
        self.required_number_of_control_points > 0
            && self.store.len() >= self.required_number_of_control_points
    }

    /// Advisory: another point fits under the maximum. Adding is never refused.
    pub fn can_place_control_point(&self) -> bool {
        self.maximum_number_of_control_points == 0
            || self.store.len() < self.maximum_number_of_control_points
    }

    // === Interaction ===

    pub fn start_control_point_interaction(&mut self, index: usize) -> MarkupsResult<()> {
        self.store.get(index)?;
        self.emit(MarkupsEventKind::PointStartInteraction, EventPayload::Index(index));
        Ok(())
    }

    pub fn end_control_point_interaction(&mut self, index: usize) -> MarkupsResult<()> {
        self.store.get(index)?;
        self.emit(MarkupsEventKind::PointEndInteraction, EventPayload::Index(index));
        Ok(())
    }

    pub fn click_control_point(&mut self, index: usize) -> MarkupsResult<()> {
        self.store.get(index)?;
        self.emit(MarkupsEventKind::PointClicked, EventPayload::Index(index));
        Ok(())
    }

    // === Curve ===

    pub fn curve(&self) -> &CurveSubsystem {
        &self.curve
    }

    pub fn curve_closed(&self) -> bool {
        self.curve.closed()
    }

    pub fn set_curve_closed(&mut self, closed: bool) {
        if self.curve.set_closed(closed) {
            self.notify(MarkupsEventKind::Modified, EventPayload::None);
        }
    }

    pub fn curve_kind(&self) -> CurveKind {
        self.curve.kind()
    }

    pub fn set_curve_kind(&mut self, kind: CurveKind) {
        if self.curve.kind() != kind {
            self.curve.set_generator(curve_spline::generator_for(kind));
            self.notify(MarkupsEventKind::Modified, EventPayload::None);
        }
    }

    pub fn curve_sampling(&self) -> CurveSampling {
        self.curve.sampling()
    }

    pub fn set_curve_sampling(&mut self, sampling: CurveSampling) {
        if self.curve.sampling() != sampling {
            self.curve.set_sampling(sampling);
            self.notify(MarkupsEventKind::Modified, EventPayload::None);
        }
    }

    /// Curve in the local frame, regenerated only after a change.
    pub fn curve_poly(&self) -> Rc<CurvePoly> {
        self.curve.curve()
    }

    /// Fails with the reason when no curve can be generated.
    pub fn try_curve_poly(&self) -> MarkupsResult<Rc<CurvePoly>> {
        self.curve.try_curve()
    }

    pub fn curve_poly_world(&self) -> CurvePoly {
        self.curve.curve_world(&self.pipeline())
    }

    pub fn curve_points_world(&self) -> Vec<DVec3> {
        self.curve_poly_world().points
    }

    pub fn curve_length_world(&self) -> f64 {
        self.curve_poly_world().length()
    }

    /// Live handle on the world curve for downstream consumers.
    pub fn curve_world_output(&self) -> CurveWorldOutput {
        self.curve.world_output(self.id, self.scene.clone())
    }

    /// Control point whose segment contains generated point `curve_index`.
    pub fn control_point_index_for_curve_index(&self, curve_index: usize) -> Option<usize> {
        self.curve_poly()
            .control_point_index(curve_index, self.store.len())
    }

    // === Center and bounds ===

    /// Explicit center when one was set since the last geometry change,
    /// otherwise the mean of the control points (origin for an empty list).
    pub fn center_position(&self) -> DVec3 {
        if let Some((version, center)) = self.explicit_center {
            if version == self.geometry_version {
                return center;
            }
        }
        if let Some((version, center)) = self.mean_center.get() {
            if version == self.geometry_version {
                return center;
            }
        }
        let center = if self.store.is_empty() {
            DVec3::ZERO
        } else {
            self.store.iter().map(|point| point.position).sum::<DVec3>() / self.store.len() as f64
        };
        self.mean_center.set(Some((self.geometry_version, center)));
        center
    }

    pub fn center_position_world(&self) -> DVec3 {
        self.pipeline().position_to_world(self.center_position())
    }

    pub fn set_center_position(&mut self, center: DVec3) {
        self.explicit_center = Some((self.geometry_version, center));
        self.notify(MarkupsEventKind::Modified, EventPayload::None);
    }

    pub fn set_center_position_world(&mut self, center_world: DVec3) -> MarkupsResult<()> {
        let center = self.pipeline().world_to_position(center_world)?;
        self.set_center_position(center);
        Ok(())
    }

    pub fn bounds_local(&self) -> Option<Bounds> {
        let curve = self.curve_poly();
        Bounds::from_points(
            self.store
                .iter()
                .map(|point| point.position)
                .chain(curve.points.iter().copied()),
        )
    }

    /// Tight box around the transformed control points and world curve.
    pub fn bounds_world(&self) -> Option<Bounds> {
        let pipeline = self.pipeline();
        let curve = self.curve.curve_world(&pipeline);
        Bounds::from_points(
            pipeline
                .points_to_world(&self.store.positions())
                .into_iter()
                .chain(curve.points),
        )
    }

    /// Moves every point through `transform`. Orientations are rotated by its
    /// linear part and re-orthonormalized.
    pub fn apply_transform(&mut self, transform: &DAffine3) {
        if self.store.is_empty() {
            return;
        }
        for point in self.store.iter_mut() {
            point.position = transform.transform_point3(point.position);
            point.orientation = orthonormalize(&(transform.matrix3 * point.orientation));
        }
        self.curve.set_points(self.store.positions());
        self.geometry_version += 1;
        for index in 0..self.store.len() {
            self.notify(MarkupsEventKind::PointModified, EventPayload::Index(index));
        }
    }

    // === Persistence ===

    pub fn snapshot(&self) -> MarkupsSnapshot {
        MarkupsSnapshot {
            name: self.name.clone(),
            locked: self.locked,
            label_format: self.label_format.clone(),
            curve_kind: self.curve.kind(),
            curve_closed: self.curve.closed(),
            points_per_segment: self.curve.sampling().points_per_segment,
            required_number_of_control_points: self.required_number_of_control_points,
            maximum_number_of_control_points: self.maximum_number_of_control_points,
            last_used_control_point_number: self.store.last_used_control_point_number(),
            control_points: self.store.as_slice().to_vec(),
        }
    }

    /// Restores `snapshot` with a single bulk-replace event. Duplicate ids
    /// fail the whole load.
    pub fn load_snapshot(&mut self, snapshot: MarkupsSnapshot) -> MarkupsResult<()> {
        self.replace_points_silently(snapshot.control_points)?;
        let restored = snapshot
            .last_used_control_point_number
            .max(self.store.last_used_control_point_number());
        self.store.set_last_used_control_point_number(restored);
        self.name = snapshot.name;
        self.locked = snapshot.locked;
        self.label_format = snapshot.label_format;
        if self.curve.kind() != snapshot.curve_kind {
            self.curve
                .set_generator(curve_spline::generator_for(snapshot.curve_kind));
        }
        self.curve.set_closed(snapshot.curve_closed);
        self.curve.set_sampling(CurveSampling {
            points_per_segment: snapshot.points_per_segment,
        });
        self.required_number_of_control_points = snapshot.required_number_of_control_points;
        self.maximum_number_of_control_points = snapshot.maximum_number_of_control_points;
        self.notify(MarkupsEventKind::Modified, EventPayload::BulkReplace);
        Ok(())
    }

    pub fn to_json(&self) -> MarkupsResult<String> {
        self.snapshot().to_json()
    }

    pub fn load_json(&mut self, text: &str) -> MarkupsResult<()> {
        let snapshot = MarkupsSnapshot::from_json(text)?;
        self.load_snapshot(snapshot)
    }

    /// Takes over the other list's points and settings, keeping this node's
    /// name and identity.
    pub fn copy_content_from(&mut self, other: &MarkupsNode) -> MarkupsResult<()> {
        let mut snapshot = other.snapshot();
        snapshot.name = self.name.clone();
        self.load_snapshot(snapshot)
    }

    pub fn trusted_loader(&mut self) -> TrustedLoader<'_> {
        TrustedLoader::new(self)
    }

    pub(crate) fn replace_points_silently(&mut self, points: Vec<ControlPoint>) -> MarkupsResult<()> {
        self.store.replace_all(points)?;
        self.curve.set_points(self.store.positions());
        self.geometry_version += 1;
        Ok(())
    }
}

impl Displayable for MarkupsNode {
    fn bounds_local(&self) -> Option<Bounds> {
        MarkupsNode::bounds_local(self)
    }

    fn bounds_world(&self) -> Option<Bounds> {
        MarkupsNode::bounds_world(self)
    }

    fn apply_transform(&mut self, transform: &DAffine3) {
        MarkupsNode::apply_transform(self, transform)
    }

    fn create_default_display(&self) -> MarkupsDisplay {
        MarkupsDisplay::from_settings(self.id, &self.display_defaults)
    }
}

impl fmt::Debug for MarkupsNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkupsNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("control_points", &self.store.len())
            .field("locked", &self.locked)
            .field("curve_kind", &self.curve.kind())
            .field("closed", &self.curve.closed())
            .finish()
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::cell::RefCell;

    fn recorder(node: &mut MarkupsNode) -> Rc<RefCell<Vec<(MarkupsEventKind, EventPayload)>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        node.add_observer(move |_, event| sink.borrow_mut().push((event.kind, event.payload)));
        events
    }

    fn triangle() -> MarkupsNode {
        let mut node = MarkupsNode::new("T");
        node.add_control_point_at(DVec3::ZERO, None).unwrap();
        node.add_control_point_at(DVec3::new(3.0, 0.0, 0.0), None).unwrap();
        node.add_control_point_at(DVec3::new(0.0, 3.0, 0.0), None).unwrap();
        node
    }

    #[test]
    fn new_points_get_ids_and_labels() {
        let node = triangle();
        let labels: Vec<_> = node.control_points().iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["T-0", "T-1", "T-2"]);
        assert_eq!(node.nth_control_point_id(0), "1");
        assert_eq!(node.control_point_index_by_id("3").unwrap(), 2);
    }

    #[test]
    fn unchanged_values_do_not_notify() {
        let mut node = triangle();
        let events = recorder(&mut node);
        node.set_nth_control_point_position(1, DVec3::new(3.0, 0.0, 0.0)).unwrap();
        node.set_nth_control_point_selected(1, true).unwrap();
        node.set_locked(false);
        node.set_curve_closed(false);
        assert!(events.borrow().is_empty());

        node.set_nth_control_point_selected(1, false).unwrap();
        assert_eq!(
            *events.borrow(),
            [(MarkupsEventKind::PointModified, EventPayload::Index(1))]
        );
    }

    #[test]
    fn invalid_index_changes_nothing() {
        let mut node = triangle();
        let events = recorder(&mut node);
        let modified = node.modified_time();
        assert!(node.set_nth_control_point_position(3, DVec3::ONE).is_err());
        assert!(node.remove_nth_control_point(9).is_err());
        assert!(node.click_control_point(3).is_err());
        assert_eq!(node.nth_control_point_position(3), DVec3::ZERO);
        assert_eq!(node.nth_control_point_orientation_matrix(3), DMat3::IDENTITY);
        assert_eq!(node.nth_control_point_label(3), "");
        assert!(events.borrow().is_empty());
        assert_eq!(node.modified_time(), modified);
        assert_eq!(node.number_of_control_points(), 3);
    }

    #[test]
    fn center_falls_back_to_mean_after_geometry_changes() {
        let mut node = triangle();
        assert_abs_diff_eq!(node.center_position().x, 1.0, epsilon = 1e-12);
        node.set_center_position(DVec3::new(7.0, 7.0, 7.0));
        assert_eq!(node.center_position(), DVec3::new(7.0, 7.0, 7.0));
        node.set_nth_control_point_description(0, "apex").unwrap();
        assert_eq!(node.center_position(), DVec3::new(7.0, 7.0, 7.0));
        node.set_nth_control_point_position(0, DVec3::new(0.0, 0.0, 3.0)).unwrap();
        assert_eq!(node.center_position(), DVec3::new(1.0, 1.0, 1.0));
        assert_eq!(MarkupsNode::new("empty").center_position(), DVec3::ZERO);
    }

    #[test]
    fn bounds_cover_points_and_curve() {
        let mut node = triangle();
        assert!(MarkupsNode::new("empty").bounds_local().is_none());
        let bounds = node.bounds_local().unwrap();
        assert_eq!(bounds.min, DVec3::ZERO);
        assert_eq!(bounds.max, DVec3::new(3.0, 3.0, 0.0));

        node.apply_transform(&DAffine3::from_translation(DVec3::new(1.0, 0.0, 0.0)));
        let shifted = node.bounds_local().unwrap();
        assert_eq!(shifted.min, DVec3::new(1.0, 0.0, 0.0));
        assert_eq!(node.nth_control_point_position(2), DVec3::new(1.0, 3.0, 0.0));
    }

    #[test]
    fn apply_transform_rotates_orientations() {
        let mut node = triangle();
        let events = recorder(&mut node);
        node.apply_transform(&DAffine3::from_rotation_z(std::f64::consts::FRAC_PI_2));
        let x_axis = node.nth_control_point_orientation_matrix(0).x_axis;
        assert!(x_axis.abs_diff_eq(DVec3::Y, 1e-12));
        let position = node.nth_control_point_position(1);
        assert!(position.abs_diff_eq(DVec3::new(0.0, 3.0, 0.0), 1e-12));
        assert_eq!(events.borrow().len(), 3);
    }

    #[test]
    fn apply_transform_on_empty_list_is_a_no_op() {
        let mut node = MarkupsNode::new("E");
        node.mark_read_written();
        let curve_version = node.curve().version();
        let events = recorder(&mut node);
        node.apply_transform(&DAffine3::from_translation(DVec3::X));
        assert!(events.borrow().is_empty());
        assert!(!node.modified_since_read());
        assert_eq!(node.curve().version(), curve_version);
        assert_eq!(node.center_position(), DVec3::ZERO);
    }

    #[test]
    fn interaction_events_do_not_mark_modified() {
        let mut node = triangle();
        let events = recorder(&mut node);
        node.mark_read_written();
        node.start_control_point_interaction(1).unwrap();
        node.end_control_point_interaction(1).unwrap();
        node.click_control_point(1).unwrap();
        assert!(!node.modified_since_read());
        let kinds: Vec<_> = events.borrow().iter().map(|(kind, _)| *kind).collect();
        assert_eq!(
            kinds,
            [
                MarkupsEventKind::PointStartInteraction,
                MarkupsEventKind::PointEndInteraction,
                MarkupsEventKind::PointClicked
            ]
        );
    }

    #[test]
    fn modified_since_read_tracks_changes() {
        let mut node = triangle();
        assert!(node.modified_since_read());
        node.mark_read_written();
        assert!(!node.modified_since_read());
        node.set_name("renamed");
        assert!(node.modified_since_read());
    }

    #[test]
    fn replace_list_name_bakes_the_name() {
        let mut node = MarkupsNode::new("F");
        assert!(node.replace_list_name_in_label_format());
        assert_eq!(node.label_format(), "F-%d");
        assert!(!node.replace_list_name_in_label_format());
        node.set_name("G");
        node.add_control_point_at(DVec3::ZERO, None).unwrap();
        assert_eq!(node.nth_control_point_label(0), "F-0");
    }

    #[test]
    fn placement_limits_are_advisory() {
        let mut node = MarkupsNode::new("L");
        node.set_maximum_number_of_control_points(1);
        node.set_required_number_of_control_points(1);
        assert!(!node.is_placement_complete());
        assert!(node.can_place_control_point());
        node.add_control_point_at(DVec3::ZERO, None).unwrap();
        assert!(node.is_placement_complete());
        assert!(!node.can_place_control_point());
        node.add_control_point_at(DVec3::ONE, None).unwrap();
        assert_eq!(node.number_of_control_points(), 2);
    }

    #[test]
    fn add_n_control_points_returns_last_index() {
        let mut node = MarkupsNode::new("N");
        assert_eq!(node.add_n_control_points(0, None, DVec3::ZERO), None);
        assert_eq!(node.add_n_control_points(4, Some("same"), DVec3::ONE), Some(3));
        assert!(node.control_points().iter().all(|p| p.label == "same"));
    }

    #[test]
    fn orientation_accessors_agree() {
        let mut node = triangle();
        let turn = AxisAngle::new(90.0, DVec3::X);
        node.set_nth_control_point_orientation(0, &turn).unwrap();
        let back = node.nth_control_point_orientation(0);
        assert_abs_diff_eq!(back.angle_degrees, 90.0, epsilon = 1e-9);
        assert!(back.axis.abs_diff_eq(DVec3::X, 1e-9));
        assert!(node.nth_control_point_normal(0).abs_diff_eq(-DVec3::Y, 1e-12));
        assert_eq!(node.nth_control_point_normal(5), DVec3::Z);
    }

    #[test]
    fn default_display_uses_configured_defaults() {
        let mut settings = MarkupsSettings::default();
        settings.display.glyph_scale = 5.5;
        let node = MarkupsNode::from_settings("D", &settings);
        let display = node.create_default_display();
        assert_eq!(display.node, node.id());
        assert_eq!(display.glyph_scale, 5.5);
        assert!(display.visible);
    }

    #[test]
    fn settings_seed_curve_and_labels() {
        let mut settings = MarkupsSettings::default();
        settings.labels.format = "P%d".to_string();
        settings.curve.kind = CurveKind::CatmullRom;
        settings.curve.closed = true;
        let mut node = MarkupsNode::from_settings("S", &settings);
        node.add_control_point_at(DVec3::ZERO, None).unwrap();
        assert_eq!(node.nth_control_point_label(0), "P0");
        assert_eq!(node.curve_kind(), CurveKind::CatmullRom);
        assert!(node.curve_closed());
    }
}
