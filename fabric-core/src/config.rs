//! Physics tuning shared by every instance in an arena.
//!
//! Loaded from TOML with [`PhysicsConfig::from_toml_str`], or adjusted one
//! value at a time with [`PhysicsConfig::set_feature`].

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tuning constants shared by every instance in an arena.
///
/// Gravity-like terms are subtracted from a joint's vertical velocity each
/// tick, so the negative `antigravity_*` defaults lift joints that sink
/// below the surface. Drag terms are fractions of velocity removed per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity_above: f32,
    pub drag_above: f32,
    pub antigravity_below: f32,
    pub drag_below: f32,
    pub antigravity_below_water: f32,
    pub drag_below_water: f32,
    pub push_elastic: f32,
    pub pull_elastic: f32,
    /// Bar elasticity while growing or slack.
    pub initial_bar_elastic: f32,
    /// Elasticity of every other role while growing or slack. These push
    /// as well as pull.
    pub initial_cable_elastic: f32,
    /// Fraction of the stiffness-bounded step a growing joint takes per
    /// tick. Must stay below 1 for the relaxation to converge.
    pub growth_relaxation: f32,
    /// Half-thickness of the surface band that gravity and drag blend across.
    pub joint_radius: f32,
    pub ambient_mass: f32,
    pub bar_mass_factor: f32,
    pub cable_mass_factor: f32,
    /// Strain below which a line is coloured as slack.
    pub slack_threshold: f32,
    /// Ticks an instance stays busy after its topology or rest lengths change.
    pub busy_countdown: u16,
    /// Drag multiplier applied while busy. Gravity is suppressed then.
    pub busy_drag_factor: f32,
    /// Whether cables pull while the instance is busy.
    pub pull_while_busy: bool,
    /// Ticks over which annealing ramps gravity and pretension up.
    pub annealing_countdown: u16,
    /// Ticks a grown interval takes to reach its full span.
    pub growth_countdown: u16,
    /// Ticks intervals take to move between structural states.
    pub state_countdown: u16,
    /// Apex distance from the face, as a fraction of the face's average span.
    pub apex_offset: f32,
    pub coloring: Coloring,
}

/// How interval lines are coloured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coloring {
    /// Slack lines green, bars hot, cables cold.
    #[default]
    Role,
    /// Bars shaded by relative strain, cables dimmed.
    BarStrain,
    /// Cables shaded by relative strain, bars dimmed.
    CableStrain,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity_above: 0.000005,
            drag_above: 0.0001,
            antigravity_below: -0.03,
            drag_below: 0.6,
            antigravity_below_water: -0.00001,
            drag_below_water: 0.001,
            push_elastic: 1.2,
            pull_elastic: 0.3,
            initial_bar_elastic: 1.2,
            initial_cable_elastic: 0.3,
            growth_relaxation: 0.5,
            joint_radius: 0.1,
            ambient_mass: 0.1,
            bar_mass_factor: 1.0,
            cable_mass_factor: 0.01,
            slack_threshold: 0.0001,
            busy_countdown: 300,
            busy_drag_factor: 10.0,
            pull_while_busy: true,
            annealing_countdown: 50000,
            growth_countdown: 300,
            state_countdown: 300,
            apex_offset: 0.1,
            coloring: Coloring::Role,
        }
    }
}

/// A single tunable constant, for adjusting physics at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhysicsFeature {
    GravityAbove,
    DragAbove,
    AntigravityBelow,
    DragBelow,
    AntigravityBelowWater,
    DragBelowWater,
    PushElastic,
    PullElastic,
    BusyCountdown,
    AnnealingCountdown,
    BusyDragFactor,
}

impl PhysicsConfig {
    /// Parses a configuration from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// A configuration with every gravity term zeroed.
    pub fn weightless() -> Self {
        Self {
            gravity_above: 0.0,
            antigravity_below: 0.0,
            antigravity_below_water: 0.0,
            ..Self::default()
        }
    }

    /// Sets one feature and returns the value actually stored.
    ///
    /// Countdowns are rounded and clamped into `u16`.
    pub fn set_feature(&mut self, feature: PhysicsFeature, value: f32) -> f32 {
        let countdown = |value: f32| value.round().clamp(0.0, u16::MAX as f32) as u16;
        let slot = match feature {
            PhysicsFeature::GravityAbove => &mut self.gravity_above,
            PhysicsFeature::DragAbove => &mut self.drag_above,
            PhysicsFeature::AntigravityBelow => &mut self.antigravity_below,
            PhysicsFeature::DragBelow => &mut self.drag_below,
            PhysicsFeature::AntigravityBelowWater => &mut self.antigravity_below_water,
            PhysicsFeature::DragBelowWater => &mut self.drag_below_water,
            PhysicsFeature::PushElastic => &mut self.push_elastic,
            PhysicsFeature::PullElastic => &mut self.pull_elastic,
            PhysicsFeature::BusyDragFactor => &mut self.busy_drag_factor,
            PhysicsFeature::BusyCountdown => {
                self.busy_countdown = countdown(value);
                return self.busy_countdown as f32;
            }
            PhysicsFeature::AnnealingCountdown => {
                self.annealing_countdown = countdown(value);
                return self.annealing_countdown as f32;
            }
        };
        *slot = value;
        value
    }
}
