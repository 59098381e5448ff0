//! Fixed-capacity tensegrity simulation kernel.
//!
//! Many fabric instances share one flat arena. Each instance holds joints
//! joined by intervals (bars that push, cables that only pull) and
//! triangular faces that growth unfolds into more structure.
//!
//! Main components:
//! - [`arena`] - memory layout, instance selection and cloning.
//! - [`tables`] - the plain records stored in each instance block.
//! - [`fabric`] - [`FabricMut`], the context for table operations.
//! - [`physics`] - the per-tick phases and the life phases around them.
//! - [`growth`] - face unfolding, snapshots and the embryology driver.
//! - [`genetics`] - dice genes and the readers that make choices from them.
//! - [`terrain`] - the shared land/water mask.
//! - [`seed`] - starting shapes.
//! - [`config`] - physics tuning constants.
//! - [`error`] - recoverable errors.
//! - [`types`] - shared index aliases and constants.

pub mod arena;
pub mod config;
pub mod error;
pub mod fabric;
pub mod genetics;
pub mod growth;
pub mod physics;
pub mod seed;
pub mod tables;
pub mod terrain;
pub mod types;

pub use arena::{Arena, Buffer, Capacities, Layout};
pub use config::{Coloring, PhysicsConfig, PhysicsFeature};
pub use error::{FabricError, Result};
pub use fabric::FabricMut;
pub use growth::{Embryology, FaceSnapshot, IntervalSnapshot};
pub use tables::{Laterality, LifePhase, Role};
