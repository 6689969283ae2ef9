use std::collections::HashSet;

use tracing::warn;

use crate::{ControlPoint, MarkupsError, MarkupsResult};

/// Ordered, id-unique list of control points.
///
/// Owns id and label generation. The store never notifies anyone; the owning
/// node turns successful mutations into events.
#[derive(Debug, Clone, Default)]
pub struct ControlPointStore {
    points: Vec<ControlPoint>,
    /// Largest numeric id ever handed out or loaded. Never lowered, so an id
    /// that was issued once is never issued again.
    id_floor: u64,
    /// Bumped on every insertion, reset when the list is cleared.
    last_used_control_point_number: u64,
}

impl ControlPointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ControlPoint> + '_ {
        self.points.iter()
    }

    pub fn as_slice(&self) -> &[ControlPoint] {
        &self.points
    }

    pub fn positions(&self) -> Vec<glam::DVec3> {
        self.points.iter().map(|point| point.position).collect()
    }

    pub fn last_used_control_point_number(&self) -> u64 {
        self.last_used_control_point_number
    }

    pub fn contains_index(&self, index: usize) -> bool {
        index < self.points.len()
    }

    pub fn get(&self, index: usize) -> MarkupsResult<&ControlPoint> {
        self.check_index(index)?;
        Ok(&self.points[index])
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ControlPoint> + '_ {
        self.points.iter_mut()
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> MarkupsResult<&mut ControlPoint> {
        self.check_index(index)?;
        Ok(&mut self.points[index])
    }

    fn check_index(&self, index: usize) -> MarkupsResult<()> {
        if index < self.points.len() {
            return Ok(());
        }
        warn!(
            "control point index {} out of range, list has {} points",
            index,
            self.points.len()
        );
        Err(MarkupsError::InvalidIndex {
            index,
            len: self.points.len(),
        })
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.points.iter().any(|point| point.id == id)
    }

    pub fn find_index_by_id(&self, id: &str) -> MarkupsResult<usize> {
        self.points
            .iter()
            .position(|point| point.id == id)
            .ok_or_else(|| MarkupsError::NotFound(id.to_owned()))
    }

    pub fn find_by_id(&self, id: &str) -> MarkupsResult<&ControlPoint> {
        let index = self.find_index_by_id(id)?;
        Ok(&self.points[index])
    }

    /// Appends `point`, returning its index.
    pub fn push(&mut self, point: ControlPoint) -> MarkupsResult<usize> {
        self.insert(point, isize::MAX)
    }

    /// Inserts at `target_index`, clamped into `0..=len`. Negative targets
    /// insert at the front, targets past the end append.
    pub fn insert(&mut self, point: ControlPoint, target_index: isize) -> MarkupsResult<usize> {
        self.insert_with(point, target_index, || None)
    }

    /// Like [`insert`](Self::insert), asking `external_id` first when the point
    /// needs an id. External ids that collide with a live point are ignored.
    pub fn insert_with(
        &mut self,
        mut point: ControlPoint,
        target_index: isize,
        external_id: impl FnOnce() -> Option<String>,
    ) -> MarkupsResult<usize> {
        if point.id.is_empty() {
            point.id = self.generate_unique_id_with(external_id);
        } else if self.contains_id(&point.id) {
            warn!("refusing to insert control point with duplicate id `{}`", point.id);
            return Err(MarkupsError::DuplicateId(point.id));
        } else {
            self.note_id(&point.id);
        }

        let index = if target_index < 0 {
            0
        } else {
            (target_index as usize).min(self.points.len())
        };
        self.points.insert(index, point);
        self.last_used_control_point_number += 1;
        Ok(index)
    }

    pub fn remove(&mut self, index: usize) -> MarkupsResult<ControlPoint> {
        self.check_index(index)?;
        Ok(self.points.remove(index))
    }

    /// Drops every point and restarts label numbering. Id numbering continues.
    pub fn remove_all(&mut self) {
        self.points.clear();
        self.last_used_control_point_number = 0;
    }

    pub fn swap(&mut self, first: usize, second: usize) -> MarkupsResult<()> {
        self.check_index(first)?;
        self.check_index(second)?;
        self.points.swap(first, second);
        Ok(())
    }

    /// Returns an id that was never issued before and is not in use.
    pub fn generate_unique_id(&mut self) -> String {
        self.generate_unique_id_with(|| None)
    }

    fn generate_unique_id_with(&mut self, external_id: impl FnOnce() -> Option<String>) -> String {
        if let Some(candidate) = external_id() {
            if !candidate.is_empty() && !self.contains_id(&candidate) {
                self.note_id(&candidate);
                return candidate;
            }
            warn!("scene id `{}` already in use, falling back to local numbering", candidate);
        }
        loop {
            self.id_floor += 1;
            let candidate = self.id_floor.to_string();
            if !self.contains_id(&candidate) {
                return candidate;
            }
        }
    }

    /// Keeps local numbering clear of numeric ids that came from elsewhere.
    fn note_id(&mut self, id: &str) {
        if let Ok(number) = id.parse::<u64>() {
            self.id_floor = self.id_floor.max(number);
        }
    }

    /// Gives the point at `index` a freshly generated id.
    pub fn reset_id(&mut self, index: usize) -> MarkupsResult<String> {
        self.check_index(index)?;
        let id = self.generate_unique_id();
        self.points[index].id = id.clone();
        Ok(id)
    }

    /// Overwrites the id at `index` verbatim. Used when restoring saved lists.
    pub fn set_raw_id(&mut self, index: usize, id: impl Into<String>) -> MarkupsResult<()> {
        self.check_index(index)?;
        let id = id.into();
        let taken = self
            .points
            .iter()
            .enumerate()
            .any(|(other, point)| other != index && point.id == id);
        if taken {
            warn!("refusing to assign duplicate id `{}` to control point {}", id, index);
            return Err(MarkupsError::DuplicateId(id));
        }
        self.note_id(&id);
        self.points[index].id = id;
        Ok(())
    }

    /// Replaces the whole list in one step. Points without an id get one.
    ///
    /// Fails without touching the store when two points share an id.
    pub fn replace_all(&mut self, points: Vec<ControlPoint>) -> MarkupsResult<()> {
        let mut seen = HashSet::new();
        for point in &points {
            if !point.id.is_empty() && !seen.insert(point.id.as_str()) {
                warn!("saved list repeats control point id `{}`", point.id);
                return Err(MarkupsError::DuplicateId(point.id.clone()));
            }
        }

        self.points = points;
        let loaded: Vec<String> = self.points.iter().map(|point| point.id.clone()).collect();
        for id in &loaded {
            self.note_id(id);
        }
        for index in 0..self.points.len() {
            if self.points[index].id.is_empty() {
                self.points[index].id = self.generate_unique_id();
            }
        }
        self.last_used_control_point_number = self.points.len() as u64;
        Ok(())
    }

    pub(crate) fn set_last_used_control_point_number(&mut self, number: u64) {
        self.last_used_control_point_number = number;
    }

    /// Smallest-numbered label from `format` that no live point carries.
    ///
    /// Formats without a number conversion always expand to the same label.
    pub fn generate_label(&self, format: &str, list_name: &str) -> String {
        let first = expand_label_format(format, list_name, 0);
        if first == expand_label_format(format, list_name, 1) {
            return first;
        }
        let used: HashSet<&str> = self.points.iter().map(|point| point.label.as_str()).collect();
        (0u64..)
            .map(|number| expand_label_format(format, list_name, number))
            .find(|label| !used.contains(label.as_str()))
            .unwrap_or_default()
    }
}

/// Expands a label template.
///
/// `%N` becomes the list name and `%d` the point number, which takes the
/// printf width and zero flag (`%3d`, `%03d`). `%%` is a literal percent sign.
/// Any other `%` sequence is copied through unchanged.
pub fn expand_label_format(format: &str, list_name: &str, number: u64) -> String {
    let mut label = String::with_capacity(format.len() + list_name.len());
    let mut rest = format;
    while let Some(start) = rest.find('%') {
        label.push_str(&rest[..start]);
        let directive = &rest[start + 1..];
        if let Some(after) = directive.strip_prefix('N') {
            label.push_str(list_name);
            rest = after;
            continue;
        }
        if let Some(after) = directive.strip_prefix('%') {
            label.push('%');
            rest = after;
            continue;
        }
        let zero_pad = directive.starts_with('0');
        let digits = directive
            .bytes()
            .take_while(|byte| byte.is_ascii_digit())
            .count();
        match directive[digits..].strip_prefix('d') {
            Some(after) => {
                let width = directive[..digits].parse::<usize>().unwrap_or(0);
                if zero_pad {
                    label.push_str(&format!("{number:0width$}"));
                } else {
                    label.push_str(&format!("{number:width$}"));
                }
                rest = after;
            }
            None => {
                label.push('%');
                rest = directive;
            }
        }
    }
    label.push_str(rest);
    label
}
