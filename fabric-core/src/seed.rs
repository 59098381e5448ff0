//! Starting shapes for growth.
//!
//! Every seed interval is a bar at its natural length, so a fresh seed
//! holds no elastic energy.

use std::f32::consts::TAU;

use glam::Vec3;

use crate::{
    error::Result,
    fabric::FabricMut,
    tables::{Laterality, Role},
    types::{IntervalIndex, JointIndex},
};

fn natural_bar(fabric: &mut FabricMut<'_>, alpha: JointIndex, omega: JointIndex) -> Result<IntervalIndex> {
    let length = (fabric.location(omega) - fabric.location(alpha)).length();
    fabric.create_interval(alpha, omega, Role::Bar, length, 1.0)
}

fn middle_joint(fabric: &mut FabricMut<'_>, location: Vec3) -> Result<JointIndex> {
    let tag = fabric.next_joint_tag();
    fabric.create_joint(tag, Laterality::Middle, location)
}

/// Four joints, six bars and four outward-wound faces.
pub fn tetrahedron(fabric: &mut FabricMut<'_>) -> Result<()> {
    let corners = [
        Vec3::new(1.0, -1.0, 1.0),
        Vec3::new(-1.0, 1.0, 1.0),
        Vec3::new(-1.0, -1.0, -1.0),
        Vec3::new(1.0, 1.0, -1.0),
    ];
    let mut joints = [0; 4];
    for (joint, corner) in joints.iter_mut().zip(corners) {
        *joint = middle_joint(fabric, corner)?;
    }
    for (a, b) in [(0, 1), (1, 2), (2, 3), (2, 0), (0, 3), (3, 1)] {
        natural_bar(fabric, joints[a], joints[b])?;
    }
    for [a, b, c] in [[0, 1, 2], [1, 3, 2], [1, 0, 3], [2, 3, 0]] {
        fabric.create_face([joints[a], joints[b], joints[c]])?;
    }
    Ok(())
}

/// A ring of middle joints in the x/y plane with a left and a right joint
/// on either side of it along z.
///
/// The left and right joints share one creation tag, so every left face
/// has a right twin. Faces alternate left, right: left faces sit at even
/// indices.
///
/// ### Panics
/// Panics if `corners < 3`.
pub fn bilateral(fabric: &mut FabricMut<'_>, corners: u16, radius: f32) -> Result<()> {
    assert!(corners >= 3, "a bilateral seed needs at least 3 corners, got {corners}");
    let ring = (0..corners)
        .map(|walk| {
            let angle = TAU * walk as f32 / corners as f32;
            let location = Vec3::new(radius * angle.sin(), radius * angle.cos(), 0.0);
            middle_joint(fabric, location)
        })
        .collect::<Result<Vec<_>>>()?;

    let pair = fabric.next_joint_tag();
    let left = fabric.create_joint(pair, Laterality::Left, Vec3::new(0.0, 0.0, -radius))?;
    let right = fabric.create_joint(pair, Laterality::Right, Vec3::new(0.0, 0.0, radius))?;

    natural_bar(fabric, left, right)?;
    for (walk, &joint) in ring.iter().enumerate() {
        let next = ring[(walk + 1) % ring.len()];
        natural_bar(fabric, joint, next)?;
        natural_bar(fabric, joint, left)?;
        natural_bar(fabric, joint, right)?;
    }
    for (walk, &joint) in ring.iter().enumerate() {
        let next = ring[(walk + 1) % ring.len()];
        fabric.create_face([left, joint, next])?;
        fabric.create_face([right, next, joint])?;
    }
    Ok(())
}
