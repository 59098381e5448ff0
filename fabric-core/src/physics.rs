//! Per-tick physics for one instance.
//!
//! Every tick runs three phases in a fixed order:
//! 1. [`elastic_phase`]: every interval measures itself and pushes or pulls
//!    on its two joints, and hands each joint a share of its mass and
//!    stiffness.
//! 2. [`joint_phase`]: every joint moves. How depends on the instance's
//!    [`LifePhase`]: growing and slack fabrics relax along their forces with
//!    a step bounded by stiffness, annealing and pretenst fabrics feel
//!    gravity and drag for their altitude and terrain and integrate
//!    `force / mass`.
//! 3. [`bookkeeping_phase`]: accumulators reset, interval countdowns
//!    advance, and the instance's busy countdown runs once intervals have
//!    arrived.
//!
//! All elastic forces are gathered before any joint moves, so no joint sees
//! a half-integrated neighbour.

use glam::Vec3;
use tracing::{debug, trace};

use crate::{
    config::Coloring,
    fabric::FabricMut,
    tables::{FabricState, LifePhase, Role},
};

const SLACK_COLOR: Vec3 = Vec3::new(0.0, 1.0, 0.0);
const HOT_COLOR: Vec3 = Vec3::new(1.0, 0.2, 0.0);
const COLD_COLOR: Vec3 = Vec3::new(0.0, 0.5, 1.0);
const ATTENUATED_COLOR: Vec3 = Vec3::new(0.1, 0.1, 0.1);

/// Strain extremes over the current intervals, bars and cables apart.
///
/// Bar strain is negated so that compression reads as positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrainLimits {
    pub min_bar: f32,
    pub max_bar: f32,
    pub min_cable: f32,
    pub max_cable: f32,
}

impl Default for StrainLimits {
    fn default() -> Self {
        Self {
            min_bar: 1.0,
            max_bar: -1.0,
            min_cable: 1.0,
            max_cable: -1.0,
        }
    }
}

/// Strain as shown to the viewer: compression positive for bars.
#[inline]
fn display_strain(role: Role, strain: f32) -> f32 {
    if role.pushes() { -strain } else { strain }
}

/// Gathers elastic forces, masses and stiffness from every interval.
///
/// For each interval:
///
/// 1. Recomputes the current length and unit vector from joint locations.
/// 2. Takes the effective rest length from its span state. Bars are
///    lengthened by the instance's pretension once annealing starts, ramped
///    in by the annealing factor.
/// 3. Computes `stress = (length - rest) * elastic_factor * global`. While
///    growing or slack, `global` is `initial_bar_elastic` for bars and
///    `initial_cable_elastic` for everything else, pushing or pulling.
///    Later it is `push_elastic` for bars and `pull_elastic` for stretched
///    pull-only intervals. Slack pull-only intervals give nothing then, and
///    neither do stretched ones while a pretenst fabric is busy unless
///    `pull_while_busy` is set.
/// 4. Adds `unit * stress / 2` to alpha and subtracts it from omega.
/// 5. Adds half of its mass to each end: `rest^3 * bar_mass_factor` for
///    bars, `length * cable_mass_factor` otherwise. Each end also gets half
///    of `elastic_factor * global` as stiffness.
pub fn elastic_phase(fabric: &mut FabricMut<'_>) {
    let cfg = fabric.config;
    let phase = fabric.life_phase();
    let settling = phase == LifePhase::Pretenst && fabric.is_busy();
    let pretenst = match phase {
        LifePhase::Annealing => fabric.state().pretenst * fabric.annealing_factor(),
        LifePhase::Pretenst => fabric.state().pretenst,
        LifePhase::Growing | LifePhase::Slack => 0.0,
    };
    let t = &mut fabric.tables;
    let count = t.state.interval_count as usize;

    for interval in &mut t.intervals[..count] {
        let alpha = interval.alpha as usize;
        let omega = interval.omega as usize;
        let span = t.locations[omega] - t.locations[alpha];
        let length = span.length();
        interval.length = length;
        interval.unit = span.normalize_or_zero();

        let role = interval.role();
        let mut rest = interval.effective_rest_length();
        if role.pushes() {
            rest *= 1.0 + pretenst;
        }
        let displacement = length - rest;
        interval.strain = if rest > 0.0 { displacement / rest } else { 0.0 };

        let global = if !phase.is_weighted() {
            if role.pushes() {
                cfg.initial_bar_elastic
            } else {
                cfg.initial_cable_elastic
            }
        } else if role.pushes() {
            cfg.push_elastic
        } else if displacement <= 0.0 || (settling && !cfg.pull_while_busy) {
            0.0
        } else {
            cfg.pull_elastic
        };
        let stiffness = interval.elastic_factor * global;
        let half = interval.unit * (displacement * stiffness / 2.0);
        t.joints[alpha].force += half;
        t.joints[omega].force -= half;

        let mass = if role.pushes() {
            rest * rest * rest * cfg.bar_mass_factor
        } else {
            length * cfg.cable_mass_factor
        };
        for end in [alpha, omega] {
            t.joints[end].mass += mass / 2.0;
            t.joints[end].stiffness += stiffness / 2.0;
        }
    }
}

/// Moves every joint, the way its life phase calls for.
pub fn joint_phase(fabric: &mut FabricMut<'_>) {
    if fabric.life_phase().is_weighted() {
        integrate_joints(fabric);
    } else {
        relax_joints(fabric);
    }
}

/// Overdamped relaxation for growing and slack fabrics.
///
/// A joint keeps no momentum and feels no gravity, drag or terrain. Its
/// step is `force * growth_relaxation / stiffness`, at most one joint
/// radius long. Dividing by the gathered stiffness keeps the step stable
/// however short and stiff the intervals around a joint are.
fn relax_joints(fabric: &mut FabricMut<'_>) {
    let cfg = fabric.config;
    let t = &mut fabric.tables;
    let count = t.state.joint_count as usize;

    for (joint, location) in t.joints[..count]
        .iter_mut()
        .zip(t.locations[..count].iter_mut())
    {
        joint.velocity = if joint.stiffness > 0.0 {
            (joint.force * (cfg.growth_relaxation / joint.stiffness))
                .clamp_length_max(cfg.joint_radius)
        } else {
            Vec3::ZERO
        };
        joint.force = Vec3::ZERO;
        joint.pull = Vec3::ZERO;
        *location += joint.velocity;
    }
}

/// Applies environment and integrates every joint of a weighted fabric.
///
/// Above the surface band (`altitude > joint_radius`) joints feel
/// `gravity_above` and `drag_above`. Below it they feel the land or water
/// values. Inside the band the two blend linearly by
/// `above = (altitude + r) / 2r`, and on land a falling joint's velocity is
/// scaled by `above` so it comes to rest at the bottom of the band. Deeper
/// down, a falling joint on land stops dead.
///
/// While annealing, `gravity_above` is scaled by the annealing factor.
/// While a pretenst fabric is busy, `gravity_above` is off and every drag
/// is multiplied by `busy_drag_factor`.
///
/// Then `velocity += pull`, drag is applied, `velocity += force / mass`,
/// the accumulators are cleared and `location += velocity`. A joint never
/// counts as lighter than its gathered stiffness, which keeps the explicit
/// step stable around short stiff bars.
fn integrate_joints(fabric: &mut FabricMut<'_>) {
    let cfg = fabric.config;
    let terrain = fabric.terrain;
    let (gravity_above, drag_scale) = match fabric.life_phase() {
        LifePhase::Annealing => (cfg.gravity_above * fabric.annealing_factor(), 1.0),
        _ if fabric.is_busy() => (0.0, cfg.busy_drag_factor),
        _ => (cfg.gravity_above, 1.0),
    };
    let radius = cfg.joint_radius;
    let t = &mut fabric.tables;
    let count = t.state.joint_count as usize;

    for (joint, location) in t.joints[..count]
        .iter_mut()
        .zip(t.locations[..count].iter_mut())
    {
        let altitude = location.y;
        let (gravity, drag) = if altitude > radius {
            (gravity_above, cfg.drag_above)
        } else {
            let land = terrain.under(*location).is_land();
            let (gravity_below, drag_below) = if land {
                (cfg.antigravity_below, cfg.drag_below)
            } else {
                (cfg.antigravity_below_water, cfg.drag_below_water)
            };
            let falling = joint.velocity.y < 0.0;
            if altitude > -radius {
                let above = (altitude + radius) / (radius * 2.0);
                let below = 1.0 - above;
                if falling && land {
                    joint.velocity *= above;
                }
                (
                    gravity_above * above + gravity_below * below,
                    cfg.drag_above * above + drag_below * below,
                )
            } else if falling && land {
                joint.velocity = Vec3::ZERO;
                (0.0, drag_below)
            } else {
                (gravity_below, drag_below)
            }
        };

        joint.pull.y -= gravity;
        joint.velocity += joint.pull;
        joint.velocity *= 1.0 - (drag * drag_scale).min(1.0);
        let mass = joint.mass.max(joint.stiffness);
        if mass > 0.0 {
            joint.velocity += joint.force / mass;
        }
        joint.force = Vec3::ZERO;
        joint.pull = Vec3::ZERO;
        *location += joint.velocity;
    }
}

/// Resets masses and stiffness, and advances countdowns.
///
/// ### Returns
/// `true` if any interval is still interpolating after this tick.
pub fn bookkeeping_phase(fabric: &mut FabricMut<'_>) -> bool {
    let ambient = fabric.config.ambient_mass;
    let t = &mut fabric.tables;
    for joint in &mut t.joints[..t.state.joint_count as usize] {
        joint.mass = ambient;
        joint.stiffness = 0.0;
    }

    let mut interpolating = false;
    for interval in &mut t.intervals[..t.state.interval_count as usize] {
        interpolating |= interval.count_down();
    }

    if !interpolating && t.state.busy_countdown > 0 {
        t.state.busy_countdown -= 1;
    }
    interpolating
}

/// One full physics step.
pub fn tick(fabric: &mut FabricMut<'_>) -> bool {
    elastic_phase(fabric);
    joint_phase(fabric);
    bookkeeping_phase(fabric)
}

impl FabricMut<'_> {
    #[inline]
    pub fn life_phase(&self) -> LifePhase {
        self.tables.state.life_phase()
    }

    /// How far annealing has come, from 0 when it starts to 1 once the
    /// annealing countdown has run out.
    pub fn annealing_factor(&self) -> f32 {
        let total = self.config.annealing_countdown as f32;
        if total <= 0.0 {
            return 1.0;
        }
        ((total - self.tables.state.busy_countdown as f32) / total).clamp(0.0, 1.0)
    }

    /// Moves the instance into a life phase.
    ///
    /// - [`LifePhase::Growing`] starts the instance over, empty.
    /// - [`LifePhase::Slack`] makes every interval's current length its
    ///   rest length, for the current structural state too.
    /// - [`LifePhase::Annealing`] starts the annealing countdown, over which
    ///   gravity and `pretenst` ramp in.
    /// - [`LifePhase::Pretenst`] applies both in full.
    ///
    /// `pretenst` is the fraction bars grow by once annealing starts.
    pub fn set_life_phase(&mut self, phase: LifePhase, pretenst: f32) -> LifePhase {
        match phase {
            LifePhase::Growing => *self.tables.state = FabricState::default(),
            LifePhase::Slack => {
                let current = self.tables.state.current_state as usize;
                let t = &mut self.tables;
                for interval in &mut t.intervals[..t.state.interval_count as usize] {
                    let length = (t.locations[interval.omega as usize]
                        - t.locations[interval.alpha as usize])
                        .length();
                    interval.retarget(length, 0);
                    interval.state_lengths[current] = length;
                    interval.length = length;
                    interval.strain = 0.0;
                }
            }
            LifePhase::Annealing => {
                self.tables.state.busy_countdown = self.config.annealing_countdown as u32;
            }
            LifePhase::Pretenst => {}
        }
        let state = &mut *self.tables.state;
        state.life_phase = phase.code();
        state.pretenst = pretenst;
        debug!(?phase, pretenst, "life phase");
        phase
    }

    /// True if any interval is mid-transition or the busy countdown runs.
    pub fn is_unsettled(&self) -> bool {
        self.is_busy() || self.intervals().iter().any(|i| !i.span().is_idle())
    }

    /// Moves to the requested structural state once settled.
    fn advance_state(&mut self) {
        let state = *self.state();
        if state.next_state == state.current_state || self.is_unsettled() {
            return;
        }
        let next = state.next_state;
        let countdown = self.config.state_countdown;
        let t = &mut self.tables;
        t.state.previous_state = state.current_state;
        t.state.current_state = next;
        let mut moving = 0;
        for interval in &mut t.intervals[..state.interval_count as usize] {
            let target = interval.state_lengths[next as usize];
            if target != interval.rest_length {
                interval.retarget(target, countdown);
                moving += 1;
            }
        }
        debug!(
            from = state.current_state,
            to = next,
            moving,
            "structural state change"
        );
        if moving > 0 {
            self.make_busy();
        }
    }

    /// Runs `ticks` physics steps, then refreshes everything renderers read.
    ///
    /// A pending structural state is entered first if the instance has
    /// settled. After stepping, the age advances by `ticks` and line, face
    /// and midpoint outputs are rewritten.
    ///
    /// While growing or slack, an unsettled fabric is then stood back on
    /// the surface: its lowest joint ends two joint radii up.
    ///
    /// ### Returns
    /// `true` while the instance is still unsettled, meaning the geometry
    /// should not yet be trusted as final.
    pub fn iterate(&mut self, ticks: u16) -> bool {
        self.advance_state();
        for _ in 0..ticks {
            tick(self);
        }
        let state = &mut *self.tables.state;
        state.age = state.age.wrapping_add(ticks as u32);
        if !self.life_phase().is_weighted() && self.is_unsettled() {
            self.set_altitude(self.config.joint_radius);
        }

        self.output_line_geometry();
        for face in 0..self.face_count() {
            self.output_face_geometry(face);
        }
        self.update_midpoint();

        let unsettled = self.is_unsettled();
        trace!(ticks, age = self.age(), unsettled, "iterated");
        unsettled
    }

    pub fn strain_limits(&self) -> StrainLimits {
        let mut limits = StrainLimits::default();
        for interval in self.intervals() {
            let role = interval.role();
            let strain = display_strain(role, interval.strain);
            let (lo, hi) = if role.pushes() {
                (&mut limits.min_bar, &mut limits.max_bar)
            } else {
                (&mut limits.min_cable, &mut limits.max_cable)
            };
            *lo = lo.min(strain);
            *hi = hi.max(strain);
        }
        limits
    }

    /// Writes line endpoints and colours for every interval.
    pub(crate) fn output_line_geometry(&mut self) {
        let limits = self.strain_limits();
        let coloring = self.config.coloring;
        let slack_threshold = self.config.slack_threshold;
        let t = &mut self.tables;
        let count = t.state.interval_count as usize;

        for (i, interval) in t.intervals[..count].iter().enumerate() {
            t.line_locations[i * 2] = t.locations[interval.alpha as usize];
            t.line_locations[i * 2 + 1] = t.locations[interval.omega as usize];

            let role = interval.role();
            let bar = role.pushes();
            let strain = display_strain(role, interval.strain);
            let color = match coloring {
                Coloring::Role if strain < slack_threshold => SLACK_COLOR,
                Coloring::Role if bar => HOT_COLOR,
                Coloring::Role => COLD_COLOR,
                Coloring::BarStrain if !bar => ATTENUATED_COLOR,
                Coloring::CableStrain if bar => ATTENUATED_COLOR,
                Coloring::BarStrain | Coloring::CableStrain => {
                    let (min, max) = if bar {
                        (limits.min_bar, limits.max_bar)
                    } else {
                        (limits.min_cable, limits.max_cable)
                    };
                    let temperature = if max - min > f32::EPSILON {
                        (strain - min) / (max - min)
                    } else {
                        0.5
                    };
                    COLD_COLOR.lerp(HOT_COLOR, temperature)
                }
            };
            t.line_colors[i * 2] = color;
            t.line_colors[i * 2 + 1] = color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        arena::{Arena, Buffer, Capacities},
        config::PhysicsConfig,
        tables::{Laterality, SpanState},
        types::JointIndex,
    };
    use glam::Vec2;

    fn arena(config: PhysicsConfig) -> Arena {
        Arena::new(
            Capacities {
                joints: 8,
                intervals: 8,
                faces: 4,
                instances: 2,
            },
            config,
        )
    }

    fn joint(fabric: &mut FabricMut<'_>, at: Vec3) -> JointIndex {
        let tag = fabric.next_joint_tag();
        fabric.create_joint(tag, Laterality::Middle, at).unwrap()
    }

    #[test]
    fn stretched_bar_pulls_its_ends_together() {
        let mut arena = arena(PhysicsConfig::weightless());
        let mut fabric = arena.fabric_mut();
        fabric.set_life_phase(LifePhase::Pretenst, 0.0);
        let a = joint(&mut fabric, Vec3::new(0.0, 5.0, 0.0));
        let b = joint(&mut fabric, Vec3::new(2.0, 5.0, 0.0));
        fabric.create_interval(a, b, Role::Bar, 1.0, 1.0).unwrap();

        elastic_phase(&mut fabric);

        let push = fabric.config().push_elastic;
        // stress = (2 - 1) * 1 * push, half to each end along +x.
        assert_eq!(fabric.joint(a).force, Vec3::new(push / 2.0, 0.0, 0.0));
        assert_eq!(fabric.joint(b).force, Vec3::new(-push / 2.0, 0.0, 0.0));
        assert_eq!(fabric.interval(0).length, 2.0);
        assert_eq!(fabric.interval(0).strain, 1.0);
        // rest^3 * factor, halved, on top of ambient.
        let ambient = fabric.config().ambient_mass;
        assert_eq!(fabric.joint(a).mass, ambient + 0.5);
    }

    #[test]
    fn slack_cable_gives_no_force() {
        let mut arena = arena(PhysicsConfig::weightless());
        let mut fabric = arena.fabric_mut();
        fabric.set_life_phase(LifePhase::Pretenst, 0.0);
        let a = joint(&mut fabric, Vec3::new(0.0, 5.0, 0.0));
        let b = joint(&mut fabric, Vec3::new(1.0, 5.0, 0.0));
        fabric.create_interval(a, b, Role::Cable, 3.0, 1.0).unwrap();

        elastic_phase(&mut fabric);

        assert_eq!(fabric.joint(a).force, Vec3::ZERO);
        assert_eq!(fabric.joint(b).force, Vec3::ZERO);
        assert!(fabric.interval(0).strain < 0.0);
    }

    #[test]
    fn busy_cable_can_be_told_not_to_pull() {
        let mut config = PhysicsConfig::weightless();
        config.pull_while_busy = false;
        let mut arena = arena(config);
        let mut fabric = arena.fabric_mut();
        fabric.set_life_phase(LifePhase::Pretenst, 0.0);
        let a = joint(&mut fabric, Vec3::new(0.0, 5.0, 0.0));
        let b = joint(&mut fabric, Vec3::new(4.0, 5.0, 0.0));
        fabric.create_interval(a, b, Role::Cable, 1.0, 1.0).unwrap();
        assert!(fabric.is_busy());

        elastic_phase(&mut fabric);
        assert_eq!(fabric.joint(a).force, Vec3::ZERO);

        fabric.tables.state.busy_countdown = 0;
        elastic_phase(&mut fabric);
        assert!(fabric.joint(a).force.x > 0.0);
    }

    #[test]
    fn gravity_pulls_high_joints_when_settled() {
        let mut arena = arena(PhysicsConfig::default());
        let mut fabric = arena.fabric_mut();
        fabric.set_life_phase(LifePhase::Pretenst, 0.0);
        let a = joint(&mut fabric, Vec3::new(0.0, 10.0, 0.0));

        joint_phase(&mut fabric);

        let gravity = fabric.config().gravity_above;
        let drag = fabric.config().drag_above;
        assert_eq!(fabric.joint(a).velocity.y, -gravity * (1.0 - drag));
        assert!(fabric.location(a).y < 10.0);
        assert_eq!(fabric.joint(a).pull, Vec3::ZERO);
    }

    #[test]
    fn gravity_is_off_while_busy() {
        let mut arena = arena(PhysicsConfig::default());
        let mut fabric = arena.fabric_mut();
        fabric.set_life_phase(LifePhase::Pretenst, 0.0);
        let a = joint(&mut fabric, Vec3::new(0.0, 10.0, 0.0));
        fabric.make_busy();

        joint_phase(&mut fabric);
        assert_eq!(fabric.location(a), Vec3::new(0.0, 10.0, 0.0));
    }

    #[test]
    fn land_stops_a_falling_joint_below_the_band() {
        let mut arena = arena(PhysicsConfig::default());
        let mut fabric = arena.fabric_mut();
        fabric.set_life_phase(LifePhase::Pretenst, 0.0);
        let a = joint(&mut fabric, Vec3::new(0.0, -1.0, 0.0));
        fabric.tables.joints[a as usize].velocity = Vec3::new(0.3, -0.5, 0.0);

        joint_phase(&mut fabric);
        assert_eq!(fabric.joint(a).velocity, Vec3::ZERO);
        assert_eq!(fabric.location(a), Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn surface_band_blends_linearly() {
        let mut config = PhysicsConfig::default();
        config.gravity_above = 0.0;
        config.antigravity_below = -0.02;
        config.drag_above = 0.0;
        config.drag_below = 0.0;
        let mut arena = arena(config);
        let mut fabric = arena.fabric_mut();
        fabric.set_life_phase(LifePhase::Pretenst, 0.0);
        // Exactly mid-band: half the below value.
        let a = joint(&mut fabric, Vec3::new(0.0, 0.0, 0.0));

        joint_phase(&mut fabric);
        assert!((fabric.joint(a).velocity.y - 0.01).abs() < 1e-7);
    }

    #[test]
    fn bookkeeping_resets_mass_and_runs_busy_after_intervals() {
        let mut config = PhysicsConfig::weightless();
        config.busy_countdown = 3;
        let mut arena = arena(config);
        let mut fabric = arena.fabric_mut();
        let a = joint(&mut fabric, Vec3::new(0.0, 5.0, 0.0));
        let b = joint(&mut fabric, Vec3::new(1.0, 5.0, 0.0));
        let i = fabric.create_interval(a, b, Role::Bar, 1.0, 1.0).unwrap();
        fabric.change_rest_length(i, 1.5, 2);
        fabric.tables.joints[a as usize].mass = 9.0;

        assert!(bookkeeping_phase(&mut fabric));
        assert_eq!(fabric.joint(a).mass, fabric.config().ambient_mass);
        // Busy holds while the interval is still moving.
        assert_eq!(fabric.state().busy_countdown, 3);

        assert!(!bookkeeping_phase(&mut fabric));
        assert_eq!(fabric.interval(i).effective_rest_length(), 1.5);
        assert_eq!(fabric.state().busy_countdown, 2);
    }

    #[test]
    fn iterate_settles_and_reports_it() {
        let mut config = PhysicsConfig::weightless();
        config.busy_countdown = 5;
        let mut arena = arena(config);
        let mut fabric = arena.fabric_mut();
        let a = joint(&mut fabric, Vec3::new(0.0, 5.0, 0.0));
        let b = joint(&mut fabric, Vec3::new(1.0, 5.0, 0.0));
        let i = fabric.create_interval(a, b, Role::Bar, 1.0, 1.0).unwrap();
        fabric.change_rest_length(i, 1.2, 4);

        assert!(fabric.iterate(3));
        assert_eq!(fabric.age(), 3);
        // Busy starts counting on the tick the interval arrives: 4 + 5 - 1.
        assert!(fabric.iterate(4));
        assert!(!fabric.iterate(1));
        assert_eq!(fabric.age(), 8);
        assert_eq!(fabric.interval(i).rest_length, 1.2);
    }

    #[test]
    fn structural_state_change_waits_for_settling() {
        let mut config = PhysicsConfig::weightless();
        config.busy_countdown = 2;
        config.state_countdown = 4;
        let mut arena = arena(config);
        let mut fabric = arena.fabric_mut();
        let a = joint(&mut fabric, Vec3::new(0.0, 5.0, 0.0));
        let b = joint(&mut fabric, Vec3::new(1.0, 5.0, 0.0));
        let i = fabric.create_interval(a, b, Role::Bar, 1.0, 1.0).unwrap();
        fabric.set_state_length(i, 1, 2.0);
        fabric.set_next_state(1);

        // Still busy from creation: no switch yet.
        fabric.iterate(1);
        assert_eq!(fabric.current_state(), 0);
        fabric.iterate(1);
        assert!(!fabric.is_unsettled());

        fabric.iterate(0);
        assert_eq!(fabric.current_state(), 1);
        assert_eq!(fabric.state().previous_state, 0);
        assert_eq!(
            fabric.interval(i).span(),
            SpanState::Interpolating {
                from: 1.0,
                to: 2.0,
                remaining: 4,
                total: 4
            }
        );
    }

    #[test]
    fn line_buffers_follow_joints_and_role_colors() {
        let mut arena = arena(PhysicsConfig::weightless());
        {
            let mut fabric = arena.fabric_mut();
            fabric.set_life_phase(LifePhase::Pretenst, 0.0);
            let a = joint(&mut fabric, Vec3::new(0.0, 5.0, 0.0));
            let b = joint(&mut fabric, Vec3::new(1.0, 5.0, 0.0));
            let c = joint(&mut fabric, Vec3::new(0.0, 5.0, 3.0));
            fabric.create_interval(a, b, Role::Bar, 2.0, 1.0).unwrap();
            fabric.create_interval(a, c, Role::Cable, 1.0, 1.0).unwrap();
            fabric.iterate(0);
        }

        let lines = arena.buffer(0, Buffer::LineLocations).unwrap();
        assert_eq!(&lines[..6], &[0.0, 5.0, 0.0, 1.0, 5.0, 0.0]);

        let colors = arena.buffer(0, Buffer::LineColors).unwrap();
        // Compressed bar is hot, stretched cable is cold.
        assert_eq!(&colors[..3], HOT_COLOR.to_array().as_slice());
        assert_eq!(&colors[6..9], COLD_COLOR.to_array().as_slice());
    }

    #[test]
    fn strain_limits_split_bars_and_cables() {
        let mut arena = arena(PhysicsConfig::weightless());
        let mut fabric = arena.fabric_mut();
        let a = joint(&mut fabric, Vec3::new(0.0, 5.0, 0.0));
        let b = joint(&mut fabric, Vec3::new(1.0, 5.0, 0.0));
        let c = joint(&mut fabric, Vec3::new(0.0, 5.0, 2.0));
        fabric.create_interval(a, b, Role::Bar, 2.0, 1.0).unwrap();
        fabric.create_interval(a, c, Role::Cable, 1.0, 1.0).unwrap();
        elastic_phase(&mut fabric);

        let limits = fabric.strain_limits();
        // Bar at half its rest length: strain -0.5, shown as 0.5.
        assert_eq!(limits.min_bar, 0.5);
        assert_eq!(limits.max_bar, 0.5);
        assert_eq!(limits.max_cable, 1.0);
    }

    #[test]
    fn water_lets_a_falling_joint_sink_where_land_stops_it() {
        let mut arena = arena(PhysicsConfig::default());
        // Spots along x: the first half water, the rest land.
        let spots: Vec<Vec2> = (0..127).map(|i| Vec2::new(i as f32, 0.0)).collect();
        let bits = format!("{}{}", "0".repeat(63), "1".repeat(64));
        arena.load_terrain(&spots, &bits).unwrap();

        let mut fabric = arena.fabric_mut();
        fabric.set_life_phase(LifePhase::Pretenst, 0.0);
        let wet = joint(&mut fabric, Vec3::new(10.0, -1.0, 0.0));
        let dry = joint(&mut fabric, Vec3::new(100.0, -1.0, 0.0));
        for falling in [wet, dry] {
            fabric.tables.joints[falling as usize].velocity = Vec3::new(0.0, -0.5, 0.0);
        }

        joint_phase(&mut fabric);

        let cfg = fabric.config().clone();
        let expected = (-0.5 - cfg.antigravity_below_water) * (1.0 - cfg.drag_below_water);
        assert!((fabric.joint(wet).velocity.y - expected).abs() < 1e-6);
        assert!(fabric.location(wet).y < -1.4);

        assert_eq!(fabric.joint(dry).velocity, Vec3::ZERO);
        assert_eq!(fabric.location(dry), Vec3::new(100.0, -1.0, 0.0));
    }

    #[test]
    fn water_band_neither_damps_nor_stops_a_falling_joint() {
        let mut config = PhysicsConfig::weightless();
        config.drag_above = 0.0;
        config.drag_below_water = 0.0;
        let mut arena = arena(config);
        let spots: Vec<Vec2> = (0..127).map(|i| Vec2::new(i as f32, 0.0)).collect();
        arena.load_terrain(&spots, &"0".repeat(127)).unwrap();

        let mut fabric = arena.fabric_mut();
        fabric.set_life_phase(LifePhase::Pretenst, 0.0);
        let a = joint(&mut fabric, Vec3::new(3.0, 0.0, 0.0));
        fabric.tables.joints[a as usize].velocity = Vec3::new(0.0, -0.05, 0.0);

        joint_phase(&mut fabric);
        // Mid-band over land this would have been halved.
        assert_eq!(fabric.joint(a).velocity.y, -0.05);
        assert_eq!(fabric.location(a).y, -0.05);
    }

    #[test]
    fn growing_bar_relaxes_without_overshoot() {
        let mut arena = arena(PhysicsConfig::default());
        let mut fabric = arena.fabric_mut();
        let a = joint(&mut fabric, Vec3::new(0.0, 5.0, 0.0));
        let b = joint(&mut fabric, Vec3::new(2.0, 5.0, 0.0));
        fabric.create_interval(a, b, Role::Bar, 1.0, 1.0).unwrap();
        assert_eq!(fabric.life_phase(), LifePhase::Growing);

        tick(&mut fabric);
        // The step is capped at one joint radius per end.
        let radius = fabric.config().joint_radius;
        assert!((fabric.location(a).x - radius).abs() < 1e-6);
        assert!((fabric.location(b).x - (2.0 - radius)).abs() < 1e-6);
        // No momentum is kept, and gravity plays no part.
        assert_eq!(fabric.location(a).y, 5.0);

        let mut previous = 2.0;
        for _ in 0..30 {
            tick(&mut fabric);
            let length = fabric.location(a).distance(fabric.location(b));
            assert!(length <= previous + 1e-6 && length >= 1.0 - 1e-5);
            previous = length;
        }
        assert!((previous - 1.0).abs() < 1e-5);
    }

    #[test]
    fn very_stiff_short_bar_stays_bounded_in_every_phase() {
        for phase in [LifePhase::Growing, LifePhase::Pretenst] {
            let mut arena = arena(PhysicsConfig::weightless());
            let mut fabric = arena.fabric_mut();
            fabric.set_life_phase(phase, 0.0);
            let a = joint(&mut fabric, Vec3::new(0.0, 5.0, 0.0));
            let b = joint(&mut fabric, Vec3::new(0.01, 5.0, 0.0));
            fabric.create_interval(a, b, Role::Bar, 0.05, 500.0).unwrap();

            for _ in 0..2000 {
                tick(&mut fabric);
            }
            let length = fabric.location(a).distance(fabric.location(b));
            assert!(length.is_finite(), "{phase:?} diverged");
            assert!(length < 0.2, "{phase:?} flew apart to {length}");
        }
    }

    #[test]
    fn growing_resets_the_instance() {
        let mut arena = arena(PhysicsConfig::default());
        let mut fabric = arena.fabric_mut();
        let a = joint(&mut fabric, Vec3::ZERO);
        let b = joint(&mut fabric, Vec3::X);
        fabric.create_interval(a, b, Role::Bar, 1.0, 1.0).unwrap();
        fabric.set_life_phase(LifePhase::Pretenst, 0.3);
        fabric.iterate(2);

        assert_eq!(fabric.set_life_phase(LifePhase::Growing, 0.0), LifePhase::Growing);

        assert_eq!(fabric.joint_count(), 0);
        assert_eq!(fabric.interval_count(), 0);
        assert_eq!(fabric.age(), 0);
        assert!(!fabric.is_busy());
        assert_eq!(fabric.state().pretenst, 0.0);
        assert_eq!(fabric.life_phase(), LifePhase::Growing);
    }

    #[test]
    fn slack_takes_current_lengths_as_rest() {
        let mut arena = arena(PhysicsConfig::weightless());
        let mut fabric = arena.fabric_mut();
        let a = joint(&mut fabric, Vec3::new(0.0, 5.0, 0.0));
        let b = joint(&mut fabric, Vec3::new(2.0, 5.0, 0.0));
        let i = fabric.create_interval(a, b, Role::Cable, 1.0, 1.0).unwrap();
        fabric.change_rest_length(i, 3.0, 50);

        fabric.set_life_phase(LifePhase::Slack, 0.0);

        let interval = fabric.interval(i);
        assert_eq!(interval.span(), SpanState::Idle { length: 2.0 });
        assert_eq!(interval.state_lengths[0], 2.0);
        elastic_phase(&mut fabric);
        assert_eq!(fabric.joint(a).force, Vec3::ZERO);
        assert_eq!(fabric.interval(i).strain, 0.0);
    }

    #[test]
    fn annealing_ramps_gravity_and_pretension_in() {
        let mut config = PhysicsConfig::default();
        config.annealing_countdown = 100;
        config.drag_above = 0.0;
        let mut arena = arena(config);
        let mut fabric = arena.fabric_mut();
        let a = joint(&mut fabric, Vec3::new(0.0, 5.0, 0.0));
        let b = joint(&mut fabric, Vec3::new(1.0, 5.0, 0.0));
        fabric.create_interval(a, b, Role::Bar, 1.0, 1.0).unwrap();

        fabric.set_life_phase(LifePhase::Annealing, 0.2);
        assert_eq!(fabric.state().busy_countdown, 100);
        assert_eq!(fabric.annealing_factor(), 0.0);

        // Nothing yet: no gravity and no pretension at the start.
        elastic_phase(&mut fabric);
        assert_eq!(fabric.joint(a).force, Vec3::ZERO);
        joint_phase(&mut fabric);
        assert_eq!(fabric.joint(a).velocity, Vec3::ZERO);
        bookkeeping_phase(&mut fabric);
        assert_eq!(fabric.state().busy_countdown, 99);

        // Half way: the bar wants 1.1 and gravity is halved.
        fabric.tables.state.busy_countdown = 50;
        assert_eq!(fabric.annealing_factor(), 0.5);
        elastic_phase(&mut fabric);
        assert!((fabric.interval(0).strain - (1.0 - 1.1) / 1.1).abs() < 1e-6);
        // Compressed, so the bar pushes alpha toward -x.
        assert!(fabric.joint(a).force.x < 0.0);
        let gravity = fabric.config().gravity_above;
        fabric.tables.joints[a as usize].force = Vec3::ZERO;
        fabric.tables.joints[b as usize].force = Vec3::ZERO;
        joint_phase(&mut fabric);
        assert!((fabric.joint(a).velocity.y + gravity * 0.5).abs() < 1e-9);
    }

    #[test]
    fn pretenst_lengthens_bars_only() {
        let mut arena = arena(PhysicsConfig::weightless());
        let mut fabric = arena.fabric_mut();
        let a = joint(&mut fabric, Vec3::new(0.0, 5.0, 0.0));
        let b = joint(&mut fabric, Vec3::new(1.0, 5.0, 0.0));
        let c = joint(&mut fabric, Vec3::new(0.0, 5.0, 1.0));
        let bar = fabric.create_interval(a, b, Role::Bar, 1.0, 1.0).unwrap();
        let cable = fabric.create_interval(a, c, Role::Cable, 1.0, 1.0).unwrap();

        fabric.set_life_phase(LifePhase::Pretenst, 0.1);
        elastic_phase(&mut fabric);

        assert!((fabric.interval(bar).strain - (1.0 - 1.1) / 1.1).abs() < 1e-6);
        assert_eq!(fabric.interval(cable).strain, 0.0);
        assert!(fabric.joint(b).force.x > 0.0);
        assert_eq!(fabric.joint(c).force, Vec3::ZERO);
    }
}
