//! One flat region shared by many fabric instances.
//!
//! The region is a terrain mask prefix followed by `instances` equally
//! sized blocks. Every offset is derived from the [`Capacities`] alone, so
//! the [`Layout`] doubles as the contract for code reading the buffers
//! directly.
//!
//! ```text
//! | terrain | instance 0 | instance 1 | ... |
//!
//! instance block:
//! | joint locations | joints | intervals | faces | face midpoints
//! | face normals | face locations | line locations | line colors | state |
//! ```

use std::mem::size_of;

use bytemuck::Pod;
use glam::{Vec2, Vec3};
use tracing::{debug, info};

use crate::{
    config::PhysicsConfig,
    error::{FabricError, Result},
    fabric::FabricMut,
    tables::{FabricState, Face, Interval, Joint},
    terrain::TerrainMask,
    types::InstanceIndex,
};

const WORD: usize = size_of::<u32>();

/// Table capacities and instance count an arena is laid out for.
///
/// A table with capacity `n` holds at most `n - 1` live entries: creating
/// into the last slot reports the table as full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacities {
    pub joints: u16,
    pub intervals: u16,
    pub faces: u16,
    pub instances: u16,
}

impl Default for Capacities {
    fn default() -> Self {
        Self {
            joints: 512,
            intervals: 1024,
            faces: 256,
            instances: 32,
        }
    }
}

/// Byte range of one field, relative to the start of its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    pub offset: usize,
    pub bytes: usize,
}

impl Region {
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.bytes
    }

    #[inline]
    fn words(&self) -> usize {
        self.bytes / WORD
    }
}

/// Read-only float views exposed to renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Buffer {
    /// One `xyz` per joint.
    JointLocations,
    /// One `xyz` per face.
    FaceMidpoints,
    /// Three `xyz` per face, one per vertex.
    FaceNormals,
    /// Three `xyz` per face, one per vertex.
    FaceLocations,
    /// Two `xyz` per interval, alpha then omega.
    LineLocations,
    /// Two `rgb` per interval.
    LineColors,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub capacities: Capacities,
    /// Absolute region of the shared terrain mask.
    pub terrain: Region,
    pub joint_locations: Region,
    pub joints: Region,
    pub intervals: Region,
    pub faces: Region,
    pub face_midpoints: Region,
    pub face_normals: Region,
    pub face_locations: Region,
    pub line_locations: Region,
    pub line_colors: Region,
    pub state: Region,
    instance_bytes: usize,
}

impl Layout {
    /// Derives every offset from the capacities.
    ///
    /// ### Panics
    /// Panics if `capacities.instances` is zero.
    pub fn new(capacities: Capacities) -> Self {
        assert!(capacities.instances > 0, "an arena needs at least one instance");
        let joints = capacities.joints as usize;
        let intervals = capacities.intervals as usize;
        let faces = capacities.faces as usize;

        let mut cursor = 0;
        let mut next = |bytes: usize| {
            let region = Region {
                offset: cursor,
                bytes,
            };
            cursor += bytes;
            region
        };

        let joint_locations = next(joints * size_of::<Vec3>());
        let joint_records = next(joints * size_of::<Joint>());
        let interval_records = next(intervals * size_of::<Interval>());
        let face_records = next(faces * size_of::<Face>());
        let face_midpoints = next(faces * size_of::<Vec3>());
        let face_normals = next(faces * 3 * size_of::<Vec3>());
        let face_locations = next(faces * 3 * size_of::<Vec3>());
        let line_locations = next(intervals * 2 * size_of::<Vec3>());
        let line_colors = next(intervals * 2 * size_of::<Vec3>());
        let state = next(size_of::<FabricState>());
        let instance_bytes = state.end();

        Self {
            capacities,
            terrain: Region {
                offset: 0,
                bytes: size_of::<TerrainMask>(),
            },
            joint_locations,
            joints: joint_records,
            intervals: interval_records,
            faces: face_records,
            face_midpoints,
            face_normals,
            face_locations,
            line_locations,
            line_colors,
            state,
            instance_bytes,
        }
    }

    #[inline]
    pub fn instance_bytes(&self) -> usize {
        self.instance_bytes
    }

    /// Absolute byte offset of an instance block.
    #[inline]
    pub fn instance_offset(&self, index: InstanceIndex) -> usize {
        self.terrain.bytes + index as usize * self.instance_bytes
    }

    /// Bytes a backing buffer must hold.
    #[inline]
    pub fn total_bytes(&self) -> usize {
        self.instance_offset(self.capacities.instances)
    }

    fn region(&self, buffer: Buffer) -> Region {
        match buffer {
            Buffer::JointLocations => self.joint_locations,
            Buffer::FaceMidpoints => self.face_midpoints,
            Buffer::FaceNormals => self.face_normals,
            Buffer::FaceLocations => self.face_locations,
            Buffer::LineLocations => self.line_locations,
            Buffer::LineColors => self.line_colors,
        }
    }
}

/// Typed mutable views over one instance block.
pub(crate) struct Tables<'a> {
    pub locations: &'a mut [Vec3],
    pub joints: &'a mut [Joint],
    pub intervals: &'a mut [Interval],
    pub faces: &'a mut [Face],
    pub face_midpoints: &'a mut [Vec3],
    pub face_normals: &'a mut [Vec3],
    pub face_locations: &'a mut [Vec3],
    pub line_locations: &'a mut [Vec3],
    pub line_colors: &'a mut [Vec3],
    pub state: &'a mut FabricState,
}

/// Splits the next `region` off the front of `rest` as a typed slice.
fn take<'a, T: Pod>(rest: &mut &'a mut [u32], region: Region) -> &'a mut [T] {
    let (head, tail) = std::mem::take(rest).split_at_mut(region.words());
    *rest = tail;
    bytemuck::cast_slice_mut(head)
}

impl<'a> Tables<'a> {
    fn split(block: &'a mut [u32], layout: &Layout) -> Self {
        let mut rest = block;
        let locations = take(&mut rest, layout.joint_locations);
        let joints = take(&mut rest, layout.joints);
        let intervals = take(&mut rest, layout.intervals);
        let faces = take(&mut rest, layout.faces);
        let face_midpoints = take(&mut rest, layout.face_midpoints);
        let face_normals = take(&mut rest, layout.face_normals);
        let face_locations = take(&mut rest, layout.face_locations);
        let line_locations = take(&mut rest, layout.line_locations);
        let line_colors = take(&mut rest, layout.line_colors);
        let state = &mut take::<FabricState>(&mut rest, layout.state)[0];
        Self {
            locations,
            joints,
            intervals,
            faces,
            face_midpoints,
            face_normals,
            face_locations,
            line_locations,
            line_colors,
            state,
        }
    }
}

/// Owns the backing words, the physics configuration, and the cursor
/// naming the current instance.
pub struct Arena {
    layout: Layout,
    config: PhysicsConfig,
    words: Vec<u32>,
    current: InstanceIndex,
}

impl Arena {
    pub fn new(capacities: Capacities, config: PhysicsConfig) -> Self {
        let layout = Layout::new(capacities);
        let words = vec![0; layout.total_bytes() / WORD];
        info!(
            total_bytes = layout.total_bytes(),
            instance_bytes = layout.instance_bytes(),
            instances = capacities.instances,
            "fabric arena allocated"
        );
        Self {
            layout,
            config,
            words,
            current: 0,
        }
    }

    /// Builds an arena over a caller-provided buffer, which is cleared.
    pub fn with_buffer(
        capacities: Capacities,
        config: PhysicsConfig,
        mut words: Vec<u32>,
    ) -> Result<Self> {
        let layout = Layout::new(capacities);
        let needed = layout.total_bytes();
        let provided = words.len() * WORD;
        if provided < needed {
            return Err(FabricError::BufferTooSmall { needed, provided });
        }
        words.fill(0);
        debug!(needed, provided, "fabric arena adopted caller buffer");
        Ok(Self {
            layout,
            config,
            words,
            current: 0,
        })
    }

    /// Hands the backing words back.
    pub fn into_words(self) -> Vec<u32> {
        self.words
    }

    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[inline]
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    #[inline]
    pub fn config_mut(&mut self) -> &mut PhysicsConfig {
        &mut self.config
    }

    fn check_instance(&self, index: InstanceIndex) -> Result<()> {
        let count = self.layout.capacities.instances;
        if index >= count {
            return Err(FabricError::InstanceOutOfRange { index, count });
        }
        Ok(())
    }

    fn block_range(&self, index: InstanceIndex) -> std::ops::Range<usize> {
        let start = self.layout.instance_offset(index) / WORD;
        start..start + self.layout.instance_bytes() / WORD
    }

    /// Moves the cursor. Later [`Arena::fabric_mut`] calls address this instance.
    pub fn set_instance(&mut self, index: InstanceIndex) -> Result<()> {
        self.check_instance(index)?;
        self.current = index;
        Ok(())
    }

    #[inline]
    pub fn current_instance(&self) -> InstanceIndex {
        self.current
    }

    /// Context for the instance under the cursor.
    pub fn fabric_mut(&mut self) -> FabricMut<'_> {
        self.view(self.current)
    }

    /// Context for a specific instance, leaving the cursor alone.
    pub fn instance_mut(&mut self, index: InstanceIndex) -> Result<FabricMut<'_>> {
        self.check_instance(index)?;
        Ok(self.view(index))
    }

    fn view(&mut self, index: InstanceIndex) -> FabricMut<'_> {
        let range = self.block_range(index);
        let terrain_words = self.layout.terrain.words();
        let (prefix, instances) = self.words.split_at_mut(terrain_words);
        let terrain = &bytemuck::cast_slice::<u32, TerrainMask>(prefix)[0];
        let offset = range.start - terrain_words;
        let block = &mut instances[offset..offset + range.len()];
        FabricMut::new(
            Tables::split(block, &self.layout),
            terrain,
            &self.config,
            self.layout.capacities,
        )
    }

    /// Copies one instance block over another, word for word.
    ///
    /// Counts, ages, busy state and in-flight countdowns all come along.
    pub fn clone_instance(&mut self, from: InstanceIndex, to: InstanceIndex) -> Result<()> {
        self.check_instance(from)?;
        self.check_instance(to)?;
        if from != to {
            let source = self.block_range(from);
            let target = self.block_range(to).start;
            self.words.copy_within(source, target);
        }
        info!(from, to, "fabric instance cloned");
        Ok(())
    }

    /// Clears an instance so its slot can be reused.
    pub fn reset_instance(&mut self, index: InstanceIndex) -> Result<()> {
        self.check_instance(index)?;
        let range = self.block_range(index);
        self.words[range].fill(0);
        debug!(index, "fabric instance reset");
        Ok(())
    }

    /// Installs the shared terrain mask. Input is validated before anything
    /// is written.
    pub fn load_terrain(&mut self, spots: &[Vec2], bits: &str) -> Result<()> {
        let mask = TerrainMask::from_spots(spots, bits)?;
        let terrain_words = self.layout.terrain.words();
        self.words[..terrain_words].copy_from_slice(bytemuck::cast_slice(&[mask]));
        info!(spots = spots.len(), "terrain mask loaded");
        Ok(())
    }

    pub fn terrain(&self) -> &TerrainMask {
        let terrain_words = self.layout.terrain.words();
        &bytemuck::cast_slice::<u32, TerrainMask>(&self.words[..terrain_words])[0]
    }

    fn block(&self, index: InstanceIndex) -> Result<&[u32]> {
        self.check_instance(index)?;
        Ok(&self.words[self.block_range(index)])
    }

    /// Snapshot of an instance's scalar state.
    pub fn state(&self, index: InstanceIndex) -> Result<FabricState> {
        let block = self.block(index)?;
        let region = self.layout.state;
        let words = &block[region.offset / WORD..region.end() / WORD];
        Ok(bytemuck::cast_slice::<u32, FabricState>(words)[0])
    }

    /// Raw words of an instance block.
    pub fn instance_words(&self, index: InstanceIndex) -> Result<&[u32]> {
        self.block(index)
    }

    /// Live part of one float buffer of an instance.
    pub fn buffer(&self, index: InstanceIndex, buffer: Buffer) -> Result<&[f32]> {
        let state = self.state(index)?;
        let floats = match buffer {
            Buffer::JointLocations => state.joint_count as usize * 3,
            Buffer::FaceMidpoints => state.face_count as usize * 3,
            Buffer::FaceNormals | Buffer::FaceLocations => state.face_count as usize * 9,
            Buffer::LineLocations | Buffer::LineColors => state.interval_count as usize * 6,
        };
        let region = self.layout.region(buffer);
        let block = self.block(index)?;
        let start = region.offset / WORD;
        Ok(bytemuck::cast_slice(&block[start..start + floats]))
    }
}
