//! Plain-old-data records stored in the arena.
//!
//! Every record is `#[repr(C)]` with explicit padding so the arena can hand
//! out typed views over its words with [`bytemuck`], and so that cloning an
//! instance is a flat word copy.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::types::{JointIndex, JointTag, STATE_COUNT, StateIndex};

/// What an interval is for. Only [`Role::Bar`] can push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Role {
    Cable = 0,
    Bar = 1,
    Triangle = 2,
    Ring = 3,
    Cross = 4,
    BowMid = 5,
    BowEndLow = 6,
    BowEndHigh = 7,
}

const PHI: f32 = 1.618_034;

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Cable,
        Role::Bar,
        Role::Triangle,
        Role::Ring,
        Role::Cross,
        Role::BowMid,
        Role::BowEndLow,
        Role::BowEndHigh,
    ];

    /// Decodes a stored role byte.
    ///
    /// ### Panics
    /// Panics on a byte no role encodes to, which means the arena is corrupt.
    pub fn from_code(code: u8) -> Self {
        match Self::ALL.get(code as usize) {
            Some(role) => *role,
            None => panic!("corrupt interval role code {code}"),
        }
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn pushes(self) -> bool {
        self == Role::Bar
    }

    /// Conventional rest length for an interval of this role.
    pub fn default_length(self) -> f32 {
        match self {
            Role::Bar => 2.0 * PHI,
            Role::Cable | Role::Triangle => 2.0,
            Role::Ring => 1.74,
            Role::Cross => 1.82,
            Role::BowMid => 0.852,
            Role::BowEndLow => 1.38,
            Role::BowEndHigh => 1.571,
        }
    }
}

/// Where an instance is in its life. Growing and slack fabrics relax
/// without mass or gravity; annealing and pretenst ones carry weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum LifePhase {
    #[default]
    Growing = 0,
    Slack = 1,
    Annealing = 2,
    Pretenst = 3,
}

impl LifePhase {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => LifePhase::Growing,
            1 => LifePhase::Slack,
            2 => LifePhase::Annealing,
            3 => LifePhase::Pretenst,
            _ => panic!("corrupt life phase code {code}"),
        }
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// True in the phases integrated with mass, gravity and drag.
    #[inline]
    pub fn is_weighted(self) -> bool {
        matches!(self, LifePhase::Annealing | LifePhase::Pretenst)
    }
}

/// Which side of the mirror plane a joint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Laterality {
    #[default]
    Middle = 0,
    Right = 1,
    Left = 2,
}

impl Laterality {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Laterality::Middle,
            1 => Laterality::Right,
            2 => Laterality::Left,
            _ => panic!("corrupt laterality code {code}"),
        }
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn opposite(self) -> Self {
        match self {
            Laterality::Middle => Laterality::Middle,
            Laterality::Right => Laterality::Left,
            Laterality::Left => Laterality::Right,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Joint {
    pub velocity: Vec3,
    pub force: Vec3,
    /// Environmental pull (gravity and the like) gathered this tick.
    pub pull: Vec3,
    /// Mass gathered this tick; reset to ambient after integration.
    pub mass: f32,
    /// Elastic stiffness gathered this tick. Bounds the relaxed step of a
    /// growing or slack fabric.
    pub stiffness: f32,
    pub tag: JointTag,
    pub laterality: u8,
    pub _pad: u8,
}

impl Joint {
    pub fn new(tag: JointTag, laterality: Laterality, ambient_mass: f32) -> Self {
        Self {
            mass: ambient_mass,
            tag,
            laterality: laterality.code(),
            ..Self::zeroed()
        }
    }

    #[inline]
    pub fn laterality(&self) -> Laterality {
        Laterality::from_code(self.laterality)
    }
}

/// Where an interval's rest length is in its transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpanState {
    Idle {
        length: f32,
    },
    Interpolating {
        from: f32,
        to: f32,
        remaining: u16,
        total: u16,
    },
}

impl SpanState {
    /// The rest length the elastic pass works against right now.
    pub fn effective(&self) -> f32 {
        match *self {
            SpanState::Idle { length } => length,
            SpanState::Interpolating {
                from,
                to,
                remaining,
                total,
            } => {
                let progress = (total - remaining) as f32 / total as f32;
                from * (1.0 - progress) + to * progress
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SpanState::Idle { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Interval {
    pub unit: Vec3,
    pub length: f32,
    pub elastic_factor: f32,
    pub strain: f32,
    /// Rest length the current transition started from.
    pub base_length: f32,
    /// Rest length the current transition is heading to.
    pub rest_length: f32,
    /// Target rest length per structural state.
    pub state_lengths: [f32; STATE_COUNT],
    pub alpha: JointIndex,
    pub omega: JointIndex,
    pub countdown: u16,
    pub countdown_total: u16,
    pub role: u8,
    pub _pad: [u8; 3],
}

impl Interval {
    pub fn new(
        alpha: JointIndex,
        omega: JointIndex,
        role: Role,
        rest_length: f32,
        elastic_factor: f32,
    ) -> Self {
        Self {
            unit: Vec3::ZERO,
            length: rest_length,
            elastic_factor,
            strain: 0.0,
            base_length: rest_length,
            rest_length,
            state_lengths: [rest_length; STATE_COUNT],
            alpha,
            omega,
            countdown: 0,
            countdown_total: 0,
            role: role.code(),
            _pad: [0; 3],
        }
    }

    #[inline]
    pub fn role(&self) -> Role {
        Role::from_code(self.role)
    }

    pub fn span(&self) -> SpanState {
        if self.countdown == 0 {
            SpanState::Idle {
                length: self.rest_length,
            }
        } else {
            SpanState::Interpolating {
                from: self.base_length,
                to: self.rest_length,
                remaining: self.countdown,
                total: self.countdown_total,
            }
        }
    }

    #[inline]
    pub fn effective_rest_length(&self) -> f32 {
        self.span().effective()
    }

    /// Starts moving from the current effective length to `target`.
    ///
    /// A zero `ticks` jumps straight to `target`.
    pub fn retarget(&mut self, target: f32, ticks: u16) {
        self.base_length = self.effective_rest_length();
        self.rest_length = target;
        self.countdown = ticks;
        self.countdown_total = ticks;
        if ticks == 0 {
            self.base_length = target;
        }
    }

    /// Counts one tick down. On reaching zero the base snaps to the target.
    ///
    /// ### Returns
    /// `true` while the interval is still interpolating after this tick.
    pub fn count_down(&mut self) -> bool {
        if self.countdown == 0 {
            return false;
        }
        self.countdown -= 1;
        if self.countdown == 0 {
            self.base_length = self.rest_length;
            self.countdown_total = 0;
            return false;
        }
        true
    }

    #[inline]
    pub fn touches(&self, joint: JointIndex) -> bool {
        self.alpha == joint || self.omega == joint
    }

    #[inline]
    pub fn joins(&self, a: JointIndex, b: JointIndex) -> bool {
        (self.alpha == a && self.omega == b) || (self.alpha == b && self.omega == a)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Face {
    pub joints: [JointIndex; 3],
    pub _pad: u16,
}

impl Face {
    pub fn new(joints: [JointIndex; 3]) -> Self {
        Self { joints, _pad: 0 }
    }
}

/// Per-instance scalars. Lives at the end of the instance block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct FabricState {
    pub midpoint: Vec3,
    pub age: u32,
    pub busy_countdown: u32,
    /// Extra bar length, as a fraction, once pretensing starts.
    pub pretenst: f32,
    pub joint_count: u16,
    pub interval_count: u16,
    pub face_count: u16,
    pub joint_tag_count: u16,
    pub previous_state: StateIndex,
    pub current_state: StateIndex,
    pub next_state: StateIndex,
    pub life_phase: u8,
}

impl FabricState {
    #[inline]
    pub fn life_phase(&self) -> LifePhase {
        LifePhase::from_code(self.life_phase)
    }
}
