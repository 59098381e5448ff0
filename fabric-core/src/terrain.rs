//! Shared terrain mask at the front of the arena.
//!
//! The mask is a fixed set of spots on the ground plane, each land or
//! water. A joint's terrain is decided by the spot nearest its `(x, z)`.
//! The last of the [`SPOT_SLOTS`] slots is never searched; finding no spot
//! at all yields [`Terrain::None`].

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::error::{FabricError, Result};

/// Slots reserved in the arena prefix.
pub const SPOT_SLOTS: usize = 128;

/// Spots a mask actually carries.
pub const SPOT_COUNT: usize = SPOT_SLOTS - 1;

/// Spots farther than this (squared) are never considered nearest.
const SEARCH_QUADRANCE: f32 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terrain {
    Land,
    Water,
    None,
}

impl Terrain {
    /// Land stops downward motion; everything else is treated as water.
    #[inline]
    pub fn is_land(self) -> bool {
        self == Terrain::Land
    }
}

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct TerrainMask {
    pub spots: [Vec2; SPOT_SLOTS],
    pub bits: [u8; SPOT_SLOTS],
    /// Non-zero once a mask has been loaded.
    pub loaded: u32,
}

impl TerrainMask {
    /// Validates and builds a mask.
    ///
    /// `bits` holds one `'0'` (water) or `'1'` (land) per spot.
    pub fn from_spots(spots: &[Vec2], bits: &str) -> Result<Self> {
        if spots.len() != SPOT_COUNT {
            return Err(FabricError::terrain(format!(
                "expected {SPOT_COUNT} spot centers, got {}",
                spots.len()
            )));
        }
        let count = bits.chars().count();
        if count != SPOT_COUNT {
            return Err(FabricError::terrain(format!(
                "expected {SPOT_COUNT} bits, got {count}"
            )));
        }

        let mut mask = Self::zeroed();
        mask.spots[..SPOT_COUNT].copy_from_slice(spots);
        for (i, c) in bits.chars().enumerate() {
            mask.bits[i] = match c {
                '0' => 0,
                '1' => 1,
                other => {
                    return Err(FabricError::terrain(format!(
                        "bit {i} is {other:?}, expected '0' or '1'"
                    )));
                }
            };
        }
        mask.loaded = 1;
        Ok(mask)
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded != 0
    }

    fn nearest_spot(&self, x: f32, z: f32) -> Option<usize> {
        let here = Vec2::new(x, z);
        let mut best = None;
        let mut best_q = SEARCH_QUADRANCE;
        for (i, spot) in self.spots[..SPOT_COUNT].iter().enumerate() {
            let q = spot.distance_squared(here);
            if q < best_q {
                best_q = q;
                best = Some(i);
            }
        }
        best
    }

    /// Terrain below a location. Without a loaded mask everything is land.
    pub fn under(&self, location: Vec3) -> Terrain {
        if !self.is_loaded() {
            return Terrain::Land;
        }
        match self.nearest_spot(location.x, location.z) {
            Some(i) if self.bits[i] != 0 => Terrain::Land,
            Some(_) => Terrain::Water,
            None => Terrain::None,
        }
    }
}
