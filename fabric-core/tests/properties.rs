//! Property-based tests using proptest.
//!
//! Invariants that must hold for all inputs:
//! - Countdowns land exactly on their target
//! - Unfolding adds one joint and two faces per side
//! - Mirror lookup is symmetric
//! - Tables refuse the capacity-th entry
//! - Dice choices are deterministic and in range
//! - Growing fabrics stay finite however they are unfolded
//! - Cloned instances match, then evolve independently

use fabric_core::{
    arena::{Arena, Buffer, Capacities},
    config::PhysicsConfig,
    error::index_or_sentinel,
    fabric::FabricMut,
    genetics::{Die, Gene, GeneReader},
    seed,
    tables::{Interval, Laterality, LifePhase, Role},
    types::ERROR_SENTINEL,
};
use glam::Vec3;
use proptest::prelude::*;

fn roomy(instances: u16, config: PhysicsConfig) -> Arena {
    Arena::new(
        Capacities {
            joints: 64,
            intervals: 128,
            faces: 64,
            instances,
        },
        config,
    )
}

fn faces_are_distinct(fabric: &FabricMut<'_>) -> bool {
    fabric
        .faces()
        .iter()
        .all(|face| {
            let [a, b, c] = face.joints;
            a != b && b != c && c != a
        })
}

prop_compose! {
    fn arb_die()(face in 1u8..=6) -> Die {
        Die::new(face).unwrap()
    }
}

// ============================================================
// Countdown Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_countdown_snaps_to_target(
        start in 0.1f32..10.0,
        target in 0.1f32..10.0,
        ticks in 1u16..500,
    ) {
        let mut interval = Interval::new(0, 1, Role::Cable, start, 1.0);
        interval.retarget(target, ticks);

        for remaining in (0..ticks).rev() {
            let moving = interval.count_down();
            prop_assert_eq!(moving, remaining > 0);
            let effective = interval.effective_rest_length();
            prop_assert!(effective >= start.min(target) - 1e-4);
            prop_assert!(effective <= start.max(target) + 1e-4);
        }
        prop_assert_eq!(interval.effective_rest_length(), target);
        prop_assert!(interval.span().is_idle());
    }
}

// ============================================================
// Growth Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_unfold_adds_one_joint_and_two_faces(
        picks in prop::collection::vec((any::<u16>(), 0usize..3), 1..8),
    ) {
        let mut arena = roomy(1, PhysicsConfig::default());
        let mut fabric = arena.fabric_mut();
        seed::tetrahedron(&mut fabric).unwrap();

        for (pick, joint_number) in picks {
            let joints = fabric.joint_count();
            let faces = fabric.face_count();
            let face = pick % faces;

            let created = fabric.unfold(face, joint_number).unwrap();

            prop_assert_eq!(created.len(), 3);
            prop_assert_eq!(fabric.joint_count(), joints + 1);
            prop_assert_eq!(fabric.face_count(), faces + 2);
            prop_assert!(faces_are_distinct(&fabric));
        }
    }

    #[test]
    fn prop_growing_fabric_stays_finite(
        picks in prop::collection::vec((any::<u16>(), 0usize..3), 1..20),
        rounds in 1u16..30,
    ) {
        let mut arena = roomy(1, PhysicsConfig::default());
        let mut fabric = arena.fabric_mut();
        seed::tetrahedron(&mut fabric).unwrap();

        for (pick, joint_number) in picks {
            let face = pick % fabric.face_count();
            if fabric.unfold(face, joint_number).is_err() {
                break;
            }
        }
        for _ in 0..rounds {
            fabric.iterate(20);
        }

        for location in fabric.locations() {
            prop_assert!(location.is_finite(), "joint went to {}", location);
        }
    }

    #[test]
    fn prop_opposite_faces_are_symmetric(
        corners in 3u16..7,
        picks in prop::collection::vec((any::<u16>(), 0usize..3), 0..5),
    ) {
        let mut arena = roomy(1, PhysicsConfig::default());
        let mut fabric = arena.fabric_mut();
        seed::bilateral(&mut fabric, corners, 1.0).unwrap();

        for (pick, joint_number) in picks {
            let face = pick % fabric.face_count();
            fabric.unfold(face, joint_number).unwrap();
        }

        prop_assert!(faces_are_distinct(&fabric));
        for face in 0..fabric.face_count() {
            if let Some(twin) = fabric.find_opposite_face(face) {
                prop_assert_eq!(fabric.find_opposite_face(twin), Some(face));
            }
        }
    }
}

// ============================================================
// Capacity Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    #[test]
    fn prop_capacity_th_create_is_refused(capacity in 2u16..40) {
        let mut arena = Arena::new(
            Capacities { joints: capacity, intervals: 4, faces: 4, instances: 1 },
            PhysicsConfig::default(),
        );
        let mut fabric = arena.fabric_mut();

        for expected in 0..capacity - 1 {
            let tag = fabric.next_joint_tag();
            let index = fabric.create_joint(tag, Laterality::Middle, Vec3::ZERO);
            prop_assert_eq!(index_or_sentinel(index), expected);
        }
        let tag = fabric.next_joint_tag();
        let refused = fabric.create_joint(tag, Laterality::Middle, Vec3::ZERO);
        prop_assert!(refused.as_ref().is_err_and(|err| err.is_capacity()));
        prop_assert_eq!(index_or_sentinel(refused), ERROR_SENTINEL);
        prop_assert_eq!(fabric.joint_count(), capacity - 1);
    }
}

// ============================================================
// Dice Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_choices_are_deterministic(
        dice in prop::collection::vec(arb_die(), 0..12),
        max_choice in 1u32..5000,
    ) {
        let mut gene = Gene::from_dice(dice);
        let first = GeneReader::new(&mut gene, || Die::ONE).choose_from(max_choice);
        let length = gene.len();
        let second = GeneReader::new(&mut gene, || -> Die { panic!("prefix should be long enough") })
            .choose_from(max_choice);

        prop_assert!(first < max_choice);
        prop_assert_eq!(first, second);
        prop_assert_eq!(gene.len(), length);
    }
}

// ============================================================
// Instance Properties
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_tetrahedron_at_rest_stays_put(altitude in -3.0f32..3.0) {
        let mut arena = roomy(1, PhysicsConfig::weightless());
        let mut fabric = arena.fabric_mut();
        seed::tetrahedron(&mut fabric).unwrap();
        fabric.set_life_phase(LifePhase::Pretenst, 0.0);
        fabric.set_altitude(altitude);
        let before = fabric.locations().to_vec();

        fabric.iterate(1);

        for (now, then) in fabric.locations().iter().zip(&before) {
            prop_assert!(now.distance(*then) < 1e-4, "{} drifted from {}", now, then);
        }
    }

    #[test]
    fn prop_clones_match_then_diverge(before in 0u16..40, after in 1u16..30) {
        let mut arena = roomy(2, PhysicsConfig::default());
        {
            let mut fabric = arena.instance_mut(0).unwrap();
            seed::tetrahedron(&mut fabric).unwrap();
            fabric.unfold(0, 0).unwrap();
            fabric.iterate(before);
        }

        arena.clone_instance(0, 1).unwrap();
        prop_assert_eq!(arena.state(0).unwrap(), arena.state(1).unwrap());
        prop_assert_eq!(
            arena.buffer(0, Buffer::JointLocations).unwrap(),
            arena.buffer(1, Buffer::JointLocations).unwrap()
        );

        let source = arena.instance_words(0).unwrap().to_vec();
        arena.instance_mut(1).unwrap().iterate(after);
        prop_assert_eq!(arena.instance_words(0).unwrap(), source.as_slice());
        prop_assert_eq!(arena.state(1).unwrap().age, arena.state(0).unwrap().age + after as u32);

        let copy = arena.instance_words(1).unwrap().to_vec();
        arena.instance_mut(0).unwrap().iterate(after);
        prop_assert_eq!(arena.instance_words(1).unwrap(), copy.as_slice());
    }
}
