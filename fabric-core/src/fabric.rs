//! Table operations on one instance.
//!
//! A [`FabricMut`] is the explicit context for an instance: it borrows that
//! instance's block mutably and the shared terrain and configuration
//! immutably. Two instances can never be touched through one context.

use glam::Vec3;
use tracing::debug;

use crate::{
    arena::{Capacities, Tables},
    config::PhysicsConfig,
    error::{FabricError, Result, Table},
    tables::{FabricState, Face, Interval, Joint, Laterality, Role},
    terrain::TerrainMask,
    types::{FaceIndex, IntervalIndex, JointIndex, JointTag, STATE_COUNT, StateIndex},
};

/// How far a vertex normal leans toward its own vertex.
const NORMAL_LEAN: f32 = 0.7;

pub struct FabricMut<'a> {
    pub(crate) tables: Tables<'a>,
    pub(crate) terrain: &'a TerrainMask,
    pub(crate) config: &'a PhysicsConfig,
    capacities: Capacities,
}

/// Would `extra` more creations fit in a table currently holding `count`?
#[inline]
pub(crate) fn has_room(count: u16, extra: u16, capacity: u16) -> bool {
    (count as u32) + (extra as u32) < capacity as u32
}

#[inline]
fn check_index(index: u16, count: u16, what: &str) {
    assert!(index < count, "{what} index {index} out of range (count {count})");
}

impl<'a> FabricMut<'a> {
    pub(crate) fn new(
        tables: Tables<'a>,
        terrain: &'a TerrainMask,
        config: &'a PhysicsConfig,
        capacities: Capacities,
    ) -> Self {
        Self {
            tables,
            terrain,
            config,
            capacities,
        }
    }

    #[inline]
    pub fn config(&self) -> &PhysicsConfig {
        self.config
    }

    #[inline]
    pub fn capacities(&self) -> Capacities {
        self.capacities
    }

    #[inline]
    pub fn state(&self) -> &FabricState {
        self.tables.state
    }

    #[inline]
    pub fn age(&self) -> u32 {
        self.tables.state.age
    }

    #[inline]
    pub fn joint_count(&self) -> u16 {
        self.tables.state.joint_count
    }

    #[inline]
    pub fn interval_count(&self) -> u16 {
        self.tables.state.interval_count
    }

    #[inline]
    pub fn face_count(&self) -> u16 {
        self.tables.state.face_count
    }

    /// Midpoint of all joints as of the last `iterate`.
    #[inline]
    pub fn midpoint(&self) -> Vec3 {
        self.tables.state.midpoint
    }

    /// True while the settle countdown after a change is still running.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.tables.state.busy_countdown > 0
    }

    pub(crate) fn make_busy(&mut self) {
        let countdown = self.config.busy_countdown as u32;
        let state = &mut *self.tables.state;
        state.busy_countdown = state.busy_countdown.max(countdown);
    }

    // Joints ==================================================================

    /// Hands out the next unused creation tag.
    pub fn next_joint_tag(&mut self) -> JointTag {
        let state = &mut *self.tables.state;
        let tag = state.joint_tag_count;
        state.joint_tag_count = tag.wrapping_add(1);
        tag
    }

    pub fn create_joint(
        &mut self,
        tag: JointTag,
        laterality: Laterality,
        location: Vec3,
    ) -> Result<JointIndex> {
        let count = self.joint_count();
        if !has_room(count, 1, self.capacities.joints) {
            return Err(FabricError::full(Table::Joints, self.capacities.joints));
        }
        let index = count as usize;
        self.tables.locations[index] = location;
        self.tables.joints[index] = Joint::new(tag, laterality, self.config.ambient_mass);
        self.tables.state.joint_count = count + 1;
        Ok(count)
    }

    pub fn joint(&self, index: JointIndex) -> &Joint {
        check_index(index, self.joint_count(), "joint");
        &self.tables.joints[index as usize]
    }

    pub fn joint_tag(&self, index: JointIndex) -> JointTag {
        self.joint(index).tag
    }

    pub fn joint_laterality(&self, index: JointIndex) -> Laterality {
        self.joint(index).laterality()
    }

    pub fn location(&self, index: JointIndex) -> Vec3 {
        check_index(index, self.joint_count(), "joint");
        self.tables.locations[index as usize]
    }

    pub fn locations(&self) -> &[Vec3] {
        &self.tables.locations[..self.joint_count() as usize]
    }

    /// Moves the structure so the x/z midpoint of its joints is at the origin.
    pub fn centralize(&mut self) {
        let count = self.joint_count() as usize;
        if count == 0 {
            return;
        }
        let locations = &mut self.tables.locations[..count];
        let sum: Vec3 = locations.iter().copied().sum();
        let shift = Vec3::new(sum.x, 0.0, sum.z) / count as f32;
        for location in locations {
            *location -= shift;
        }
    }

    /// Lifts or lowers the structure so its lowest joint sits one joint
    /// radius above `altitude`.
    ///
    /// ### Returns
    /// The vertical distance moved.
    pub fn set_altitude(&mut self, altitude: f32) -> f32 {
        let count = self.joint_count() as usize;
        if count == 0 {
            return 0.0;
        }
        let target = altitude + self.config.joint_radius;
        let locations = &mut self.tables.locations[..count];
        let low = locations.iter().map(|l| l.y).fold(f32::INFINITY, f32::min);
        let lift = target - low;
        for location in locations {
            location.y += lift;
        }
        for face in 0..self.face_count() {
            self.output_face_geometry(face);
        }
        lift
    }

    pub(crate) fn update_midpoint(&mut self) {
        let count = self.joint_count() as usize;
        let state = &mut *self.tables.state;
        state.midpoint = if count == 0 {
            Vec3::ZERO
        } else {
            self.tables.locations[..count].iter().copied().sum::<Vec3>() / count as f32
        };
    }

    // Intervals ===============================================================

    /// Appends a settled interval.
    ///
    /// ### Panics
    /// Panics if `alpha == omega` or either is not a live joint.
    pub fn create_interval(
        &mut self,
        alpha: JointIndex,
        omega: JointIndex,
        role: Role,
        rest_length: f32,
        elastic_factor: f32,
    ) -> Result<IntervalIndex> {
        assert_ne!(alpha, omega, "interval must join two distinct joints");
        check_index(alpha, self.joint_count(), "alpha joint");
        check_index(omega, self.joint_count(), "omega joint");
        let count = self.interval_count();
        if !has_room(count, 1, self.capacities.intervals) {
            return Err(FabricError::full(Table::Intervals, self.capacities.intervals));
        }
        let mut interval = Interval::new(alpha, omega, role, rest_length, elastic_factor);
        let span = self.tables.locations[omega as usize] - self.tables.locations[alpha as usize];
        interval.length = span.length();
        interval.unit = span.normalize_or_zero();
        if rest_length > 0.0 {
            interval.strain = (interval.length - rest_length) / rest_length;
        }
        self.tables.intervals[count as usize] = interval;
        self.tables.state.interval_count = count + 1;
        self.make_busy();
        Ok(count)
    }

    pub fn interval(&self, index: IntervalIndex) -> &Interval {
        check_index(index, self.interval_count(), "interval");
        &self.tables.intervals[index as usize]
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.tables.intervals[..self.interval_count() as usize]
    }

    /// Removes an interval, shifting every later one down a slot.
    pub fn remove_interval(&mut self, index: IntervalIndex) {
        let count = self.interval_count();
        check_index(index, count, "interval");
        let (index, count) = (index as usize, count as usize);
        self.tables.intervals.copy_within(index + 1..count, index);
        self.tables.line_locations.copy_within((index + 1) * 2..count * 2, index * 2);
        self.tables.line_colors.copy_within((index + 1) * 2..count * 2, index * 2);
        self.tables.state.interval_count -= 1;
    }

    /// Interval joining two joints, in either direction.
    pub fn find_interval(&self, a: JointIndex, b: JointIndex) -> Option<IntervalIndex> {
        self.intervals()
            .iter()
            .position(|interval| interval.joins(a, b))
            .map(|i| i as IntervalIndex)
    }

    /// Another interval whose end joints carry the same creation tags.
    pub fn find_opposite_interval(&self, index: IntervalIndex) -> Option<IntervalIndex> {
        let interval = self.interval(index);
        let alpha = self.joint_tag(interval.alpha);
        let omega = self.joint_tag(interval.omega);
        self.intervals()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index as usize)
            .find(|(_, other)| {
                let a = self.joint_tag(other.alpha);
                let o = self.joint_tag(other.omega);
                (a == alpha && o == omega) || (a == omega && o == alpha)
            })
            .map(|(i, _)| i as IntervalIndex)
    }

    /// Moves an interval's rest length to `rest_length` over `countdown` ticks,
    /// starting from where it is now. The target is also stored for the
    /// current structural state.
    pub fn change_rest_length(&mut self, index: IntervalIndex, rest_length: f32, countdown: u16) {
        check_index(index, self.interval_count(), "interval");
        let current = self.tables.state.current_state as usize;
        let interval = &mut self.tables.intervals[index as usize];
        interval.state_lengths[current] = rest_length;
        interval.retarget(rest_length, countdown);
        self.make_busy();
    }

    /// Scales the current target rest length.
    pub fn multiply_rest_length(&mut self, index: IntervalIndex, factor: f32, countdown: u16) {
        let rest_length = self.interval(index).rest_length * factor;
        self.change_rest_length(index, rest_length, countdown);
    }

    /// Scales the rest length of every bar touching `joint`, or of every
    /// other interval touching it when `bar` is false.
    ///
    /// ### Returns
    /// How many intervals were scaled.
    pub fn multiply_joint_rest_lengths(
        &mut self,
        joint: JointIndex,
        bar: bool,
        factor: f32,
        countdown: u16,
    ) -> usize {
        check_index(joint, self.joint_count(), "joint");
        self.multiply_touching(|interval| interval.touches(joint), bar, factor, countdown)
    }

    /// Like [`multiply_joint_rest_lengths`](Self::multiply_joint_rest_lengths)
    /// for all three joints of a face. An interval touching two of them,
    /// such as a face edge, is scaled once.
    pub fn multiply_face_rest_lengths(
        &mut self,
        face: FaceIndex,
        bar: bool,
        factor: f32,
        countdown: u16,
    ) -> usize {
        let joints = self.face_joints(face);
        self.multiply_touching(
            |interval| joints.iter().any(|&joint| interval.touches(joint)),
            bar,
            factor,
            countdown,
        )
    }

    fn multiply_touching(
        &mut self,
        touching: impl Fn(&Interval) -> bool,
        bar: bool,
        factor: f32,
        countdown: u16,
    ) -> usize {
        let chosen: Vec<IntervalIndex> = self
            .intervals()
            .iter()
            .enumerate()
            .filter(|(_, interval)| touching(interval) && interval.role().pushes() == bar)
            .map(|(index, _)| index as IntervalIndex)
            .collect();
        for &index in &chosen {
            self.multiply_rest_length(index, factor, countdown);
        }
        chosen.len()
    }

    /// Target rest length an interval adopts in structural state `state`.
    pub fn set_state_length(&mut self, index: IntervalIndex, state: StateIndex, length: f32) {
        check_index(index, self.interval_count(), "interval");
        assert!((state as usize) < STATE_COUNT, "state {state} out of range");
        self.tables.intervals[index as usize].state_lengths[state as usize] = length;
    }

    /// Requests a structural state; intervals move there once the
    /// instance has settled.
    pub fn set_next_state(&mut self, state: StateIndex) {
        assert!((state as usize) < STATE_COUNT, "state {state} out of range");
        self.tables.state.next_state = state;
    }

    pub fn current_state(&self) -> StateIndex {
        self.tables.state.current_state
    }

    // Faces ===================================================================

    /// Appends a face and writes its geometry.
    ///
    /// ### Panics
    /// Panics if the joints repeat, are not live, or are not pairwise
    /// connected by intervals.
    pub fn create_face(&mut self, joints: [JointIndex; 3]) -> Result<FaceIndex> {
        let [j0, j1, j2] = joints;
        assert!(
            j0 != j1 && j1 != j2 && j2 != j0,
            "face joints must be distinct, got {joints:?}"
        );
        for joint in joints {
            check_index(joint, self.joint_count(), "face joint");
        }
        for (a, b) in [(j0, j1), (j1, j2), (j2, j0)] {
            assert!(
                self.find_interval(a, b).is_some(),
                "face edge {a}-{b} has no interval"
            );
        }
        let count = self.face_count();
        if !has_room(count, 1, self.capacities.faces) {
            return Err(FabricError::full(Table::Faces, self.capacities.faces));
        }
        self.tables.faces[count as usize] = Face::new(joints);
        self.tables.state.face_count = count + 1;
        self.output_face_geometry(count);
        Ok(count)
    }

    pub fn face_joints(&self, index: FaceIndex) -> [JointIndex; 3] {
        check_index(index, self.face_count(), "face");
        self.tables.faces[index as usize].joints
    }

    pub fn faces(&self) -> &[Face] {
        &self.tables.faces[..self.face_count() as usize]
    }

    /// Removes a face, shifting every later one down a slot.
    pub fn remove_face(&mut self, index: FaceIndex) {
        let count = self.face_count();
        check_index(index, count, "face");
        let (index, count) = (index as usize, count as usize);
        self.tables.faces.copy_within(index + 1..count, index);
        self.tables.face_midpoints.copy_within(index + 1..count, index);
        self.tables.face_normals.copy_within((index + 1) * 3..count * 3, index * 3);
        self.tables.face_locations.copy_within((index + 1) * 3..count * 3, index * 3);
        self.tables.state.face_count -= 1;
        debug!(face = index, remaining = count - 1, "face removed");
    }

    fn face_tags(&self, index: FaceIndex) -> [JointTag; 3] {
        self.face_joints(index).map(|joint| self.joint_tag(joint))
    }

    /// Another face built on joints with the same three creation tags.
    pub fn find_opposite_face(&self, index: FaceIndex) -> Option<FaceIndex> {
        let mut tags = self.face_tags(index);
        tags.sort_unstable();
        (0..self.face_count())
            .filter(|&other| other != index)
            .find(|&other| {
                let mut other_tags = self.face_tags(other);
                other_tags.sort_unstable();
                other_tags == tags
            })
    }

    /// First non-middle laterality among the face's joints.
    pub fn face_laterality(&self, index: FaceIndex) -> Laterality {
        self.face_joints(index)
            .into_iter()
            .map(|joint| self.joint_laterality(joint))
            .find(|&laterality| laterality != Laterality::Middle)
            .unwrap_or(Laterality::Middle)
    }

    /// Mean target rest length of the three edge intervals.
    pub fn face_average_span(&self, index: FaceIndex) -> f32 {
        let [j0, j1, j2] = self.face_joints(index);
        let total: f32 = [(j0, j1), (j1, j2), (j2, j0)]
            .into_iter()
            .filter_map(|(a, b)| self.find_interval(a, b))
            .map(|interval| self.interval(interval).rest_length)
            .sum();
        total / 3.0
    }

    /// Unit normal of the face's plane, following its vertex winding.
    pub fn face_normal(&self, index: FaceIndex) -> Vec3 {
        let [l0, l1, l2] = self.face_joints(index).map(|joint| self.location(joint));
        (l1 - l0).cross(l2 - l0).normalize_or_zero()
    }

    pub fn face_midpoint(&self, index: FaceIndex) -> Vec3 {
        check_index(index, self.face_count(), "face");
        self.tables.face_midpoints[index as usize]
    }

    /// Writes vertex locations, midpoint and vertex normals for one face.
    ///
    /// Each vertex normal is the plane normal leaned toward its vertex,
    /// which gives a rounded look when shaded.
    pub(crate) fn output_face_geometry(&mut self, index: FaceIndex) {
        let face = index as usize;
        let joints = self.tables.faces[face].joints;
        let locations = joints.map(|joint| self.tables.locations[joint as usize]);
        let midpoint = (locations[0] + locations[1] + locations[2]) / 3.0;
        let normal = (locations[1] - locations[0])
            .cross(locations[2] - locations[0])
            .normalize_or_zero();
        self.tables.face_midpoints[face] = midpoint;
        for (corner, location) in locations.into_iter().enumerate() {
            let lean = (location - midpoint).normalize_or_zero();
            self.tables.face_locations[face * 3 + corner] = location;
            self.tables.face_normals[face * 3 + corner] =
                (normal + lean * NORMAL_LEAN).normalize_or_zero();
        }
    }
}
