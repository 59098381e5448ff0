//! Growing a fabric by unfolding faces.
//!
//! Unfolding replaces one face with three. A new apex joint is placed just
//! off the chosen vertex along the face normal, bars run from the other two
//! vertices to it at their natural length, and a growing bar from the
//! chosen vertex stretches out to the face's average span over
//! `growth_countdown` ticks. A face's mirror twin, if it has one, unfolds
//! the same way with the same apex tag.
//!
//! Face removal shifts indices, so anything that remembers a face across an
//! unfold keeps a [`FaceSnapshot`] and calls [`FaceSnapshot::fresh`] to
//! find it again.

use glam::Vec3;
use tracing::{debug, warn};

use crate::{
    error::{FabricError, Result, Table},
    fabric::{FabricMut, has_room},
    genetics::{Die, GeneReader},
    tables::{Laterality, Role},
    types::{FaceIndex, IntervalIndex, JointIndex, JointTag},
};

/// Vertex a derived face always unfolds from.
pub const CANONICAL_JOINT: usize = 2;

/// Which of the unfolded faces a straight run carries on from.
pub const FACE_AHEAD: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSnapshot {
    /// Position of this joint within the face, 0 to 2.
    pub number: usize,
    pub index: JointIndex,
    pub tag: JointTag,
    pub laterality: Laterality,
    pub location: Vec3,
}

/// A face as it was when captured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceSnapshot {
    pub index: FaceIndex,
    pub joints: [JointSnapshot; 3],
    /// Set on faces produced by an unfold.
    pub derived: bool,
}

impl FaceSnapshot {
    fn matches(&self, fabric: &FabricMut<'_>, index: FaceIndex) -> bool {
        let joints = fabric.face_joints(index);
        self.joints.iter().all(|snap| {
            let joint = joints[snap.number];
            fabric.joint_tag(joint) == snap.tag && fabric.joint_laterality(joint) == snap.laterality
        })
    }

    /// Re-locates this face after removals may have shifted it down.
    ///
    /// Walks backward from the remembered index, comparing each vertex's
    /// creation tag and laterality.
    ///
    /// ### Returns
    /// A new snapshot at the face's current index, or
    /// [`FabricError::FaceNotFound`] if the face is gone.
    pub fn fresh(&self, fabric: &FabricMut<'_>) -> Result<FaceSnapshot> {
        let count = fabric.face_count();
        let not_found = || FabricError::FaceNotFound {
            joints: self.joints.map(|joint| joint.index),
        };
        if count == 0 {
            return Err(not_found());
        }
        let start = self.index.min(count - 1);
        (0..=start)
            .rev()
            .find(|&index| self.matches(fabric, index))
            .map(|index| FaceSnapshot {
                derived: self.derived,
                ..fabric.face_snapshot(index)
            })
            .ok_or_else(not_found)
    }
}

/// An interval remembered by the tags and lateralities of its ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalSnapshot {
    pub index: IntervalIndex,
    pub ends: [(JointTag, Laterality); 2],
}

impl IntervalSnapshot {
    fn ends_of(fabric: &FabricMut<'_>, index: IntervalIndex) -> [(JointTag, Laterality); 2] {
        let interval = fabric.interval(index);
        [interval.alpha, interval.omega].map(|j| (fabric.joint_tag(j), fabric.joint_laterality(j)))
    }

    pub fn capture(fabric: &FabricMut<'_>, index: IntervalIndex) -> Self {
        Self {
            index,
            ends: Self::ends_of(fabric, index),
        }
    }

    /// Same backward walk as [`FaceSnapshot::fresh`]. `None` if the
    /// interval has been removed.
    pub fn fresh(&self, fabric: &FabricMut<'_>) -> Option<IntervalSnapshot> {
        let count = fabric.interval_count();
        if count == 0 {
            return None;
        }
        (0..=self.index.min(count - 1))
            .rev()
            .find(|&index| Self::ends_of(fabric, index) == self.ends)
            .map(|index| IntervalSnapshot { index, ..*self })
    }
}

impl FabricMut<'_> {
    pub fn face_snapshot(&self, index: FaceIndex) -> FaceSnapshot {
        let joints = self.face_joints(index);
        FaceSnapshot {
            index,
            joints: [0, 1, 2].map(|number| {
                let joint = joints[number];
                JointSnapshot {
                    number,
                    index: joint,
                    tag: self.joint_tag(joint),
                    laterality: self.joint_laterality(joint),
                    location: self.location(joint),
                }
            }),
            derived: false,
        }
    }

    /// Checks every table has room for `sides` unfolds before any is done.
    fn check_unfold_room(&self, sides: u16) -> Result<()> {
        let caps = self.capacities();
        // Each side adds three faces before removing one.
        let needs = [
            (Table::Joints, self.joint_count(), sides, caps.joints),
            (Table::Intervals, self.interval_count(), sides * 3, caps.intervals),
            (Table::Faces, self.face_count(), sides * 2 + 1, caps.faces),
        ];
        match needs
            .into_iter()
            .find(|&(_, count, extra, capacity)| !has_room(count, extra, capacity))
        {
            Some((table, _, _, capacity)) => Err(FabricError::full(table, capacity)),
            None => Ok(()),
        }
    }

    /// Unfolds a face, and its mirror twin if it has one.
    ///
    /// The face's joints are ordered youngest first by creation tag and
    /// `joint_number` picks the vertex the apex grows from. The arena does
    /// not know which faces came from an unfold, so callers keep the rule
    /// that those unfold from [`CANONICAL_JOINT`], as [`Embryology`] does.
    ///
    /// ### Returns
    /// Snapshots of the new faces at their current indices: the three from
    /// this face, then the three from its twin. On a capacity error
    /// nothing has been changed.
    ///
    /// ### Panics
    /// Panics if `face` is not live or `joint_number > 2`.
    pub fn unfold(&mut self, face: FaceIndex, joint_number: usize) -> Result<Vec<FaceSnapshot>> {
        assert!(joint_number < 3, "face joint number {joint_number} out of range");
        let primary = self.face_snapshot(face);
        let twin = self
            .find_opposite_face(face)
            .map(|index| self.face_snapshot(index));
        let mirrored = twin.is_some();
        self.check_unfold_room(if mirrored { 2 } else { 1 })?;

        let apex_tag = self.next_joint_tag();
        let mut created = self.unfold_face(&primary, joint_number, apex_tag)?;
        if let Some(twin) = twin {
            let twin = twin.fresh(self)?;
            created.extend(self.unfold_face(&twin, joint_number, apex_tag)?);
        }
        debug!(
            face,
            joint_number,
            apex_tag,
            mirrored,
            faces = self.face_count(),
            "face unfolded"
        );
        created.iter().map(|snapshot| snapshot.fresh(self)).collect()
    }

    fn unfold_face(
        &mut self,
        face: &FaceSnapshot,
        joint_number: usize,
        apex_tag: JointTag,
    ) -> Result<Vec<FaceSnapshot>> {
        let mut youngest_first = face.joints;
        youngest_first.sort_by(|a, b| b.tag.cmp(&a.tag));
        let chosen = youngest_first[joint_number];

        let span = self.face_average_span(face.index);
        let normal = self.face_normal(face.index);
        let apex_location = chosen.location + normal * (span * self.config().apex_offset);
        let laterality = self.face_laterality(face.index);
        let apex = self.create_joint(apex_tag, laterality, apex_location)?;

        for joint in youngest_first.iter().filter(|j| j.number != chosen.number) {
            let length = (apex_location - joint.location).length();
            self.create_interval(joint.index, apex, Role::Bar, length, 1.0)?;
        }
        let start = (apex_location - chosen.location).length();
        let growing = self.create_interval(chosen.index, apex, Role::Bar, start, 1.0)?;
        let countdown = self.config().growth_countdown;
        self.change_rest_length(growing, span, countdown);

        let [j0, j1, j2] = face.joints.map(|joint| joint.index);
        let mut created = Vec::with_capacity(3);
        for joint in &youngest_first {
            let joints = match joint.number {
                0 => [j1, j2, apex],
                1 => [j2, j0, apex],
                _ => [j0, j1, apex],
            };
            created.push(self.create_face(joints)?);
        }
        self.remove_face(face.index);

        // The new faces sat above the removed one.
        Ok(created
            .into_iter()
            .map(|index| FaceSnapshot {
                derived: true,
                ..self.face_snapshot(index - 1)
            })
            .collect())
    }
}

/// Grows a fabric from a gene, a few faces at a time.
///
/// Starts from face 0, and depending on the gene also faces 2 and 4. Each
/// [`step`](Embryology::step) reads how far every growing face goes:
/// short runs unfold once from a gene-chosen vertex and carry on from a
/// gene-chosen new face, longer runs unfold repeatedly from the canonical
/// vertex and carry on from the face ahead.
pub struct Embryology<'a, R> {
    reader: GeneReader<'a, R>,
    growing: Vec<FaceSnapshot>,
}

impl<'a, R: FnMut() -> Die> Embryology<'a, R> {
    pub fn new(fabric: &FabricMut<'_>, mut reader: GeneReader<'a, R>) -> Self {
        let mut starts = vec![0];
        if reader.choose_from(3) != 0 {
            starts.push(2);
            if reader.choose_from(3) == 0 {
                starts.push(4);
            }
        }
        let growing = starts
            .into_iter()
            .filter(|&face| face < fabric.face_count())
            .map(|face| fabric.face_snapshot(face))
            .collect();
        Self { reader, growing }
    }

    pub fn growing_faces(&self) -> &[FaceSnapshot] {
        &self.growing
    }

    /// True once every growing face has stopped.
    pub fn is_finished(&self) -> bool {
        self.growing.is_empty()
    }

    /// ### Returns
    /// `true` if any face was created.
    pub fn step(&mut self, fabric: &mut FabricMut<'_>) -> bool {
        let mut grew = false;
        let mut stopped = Vec::new();
        for slot in 0..self.growing.len() {
            let run = 1 + self.reader.choose_from(5);
            if run < 3 {
                let face = self.growing[slot];
                let joint = if face.derived {
                    CANONICAL_JOINT
                } else {
                    self.reader.choose_from(3) as usize
                };
                let unfolded = face.fresh(fabric).and_then(|f| fabric.unfold(f.index, joint));
                let next = self.reader.choose_from(2) as usize;
                match unfolded {
                    Ok(faces) => {
                        self.growing[slot] = faces[next];
                        grew = true;
                    }
                    Err(err) => {
                        warn!(%err, slot, "growth stopped");
                        stopped.push(slot);
                    }
                }
            } else {
                for _ in 0..run {
                    let unfolded = self.growing[slot]
                        .fresh(fabric)
                        .and_then(|f| fabric.unfold(f.index, CANONICAL_JOINT));
                    match unfolded {
                        Ok(faces) => {
                            self.growing[slot] = faces[FACE_AHEAD];
                            grew = true;
                        }
                        Err(err) => {
                            warn!(%err, slot, "growth stopped");
                            stopped.push(slot);
                            break;
                        }
                    }
                }
            }
        }
        for slot in stopped.into_iter().rev() {
            self.growing.remove(slot);
        }
        grew
    }
}
