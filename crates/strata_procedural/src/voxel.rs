//! # Voxel Data Model
//!
//! Sparse voxel storage. A chunk is a column of `chunk_size × chunk_size`
//! world columns with unbounded height, so voxels are kept in a map keyed by
//! world coordinate instead of a dense grid: absence is air.
//!
//! ## Layout
//!
//! [`Voxel`] is a 20-byte `Pod` record so whole chunks can be cast straight
//! into storage buffers. [`ChunkBuffers`] is the struct-of-arrays form that
//! crosses the worker boundary.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::error::{ProceduralError, ProceduralResult};
use crate::material::{Material, Rgb, TOMBSTONE_ID};

/// Chunk coordinate (identifies a chunk in the world grid).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    /// X coordinate (in chunks, not blocks).
    pub x: i32,
    /// Z coordinate (in chunks, not blocks).
    pub z: i32,
}

impl ChunkKey {
    /// Creates a new chunk key.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing a world column.
    #[inline]
    #[must_use]
    pub const fn from_world(world_x: i32, world_z: i32, chunk_size: u32) -> Self {
        Self {
            x: world_x.div_euclid(chunk_size as i32),
            z: world_z.div_euclid(chunk_size as i32),
        }
    }

    /// World coordinates of the chunk's origin column (minimum corner).
    #[inline]
    #[must_use]
    pub const fn origin(self, chunk_size: u32) -> (i32, i32) {
        (self.x * chunk_size as i32, self.z * chunk_size as i32)
    }

    /// Returns true if the world column lies inside this chunk.
    #[inline]
    #[must_use]
    pub const fn contains(self, world_x: i32, world_z: i32, chunk_size: u32) -> bool {
        let key = Self::from_world(world_x, world_z, chunk_size);
        key.x == self.x && key.z == self.z
    }
}

impl std::fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{}]", self.x, self.z)
    }
}

/// Integer world coordinate of a voxel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoxelPos {
    /// World X.
    pub x: i32,
    /// World Y (up).
    pub y: i32,
    /// World Z.
    pub z: i32,
}

impl VoxelPos {
    /// Creates a position.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns the position offset by a delta.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// A single voxel.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Voxel {
    /// World X.
    pub x: i32,
    /// World Y.
    pub y: i32,
    /// World Z.
    pub z: i32,
    /// Surface colour.
    pub color: Rgb,
    /// Material id (see [`Material`]).
    pub material: u8,
    /// Bit flags ([`Voxel::FLAG_PLAYER_PLACED`]).
    pub flags: u8,
    reserved: [u8; 2],
}

impl Voxel {
    /// Set when a player (not the generator) put this voxel here.
    pub const FLAG_PLAYER_PLACED: u8 = 1;

    /// Size of one record in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Creates a voxel.
    #[inline]
    #[must_use]
    pub const fn new(pos: VoxelPos, material: Material, color: Rgb, player_placed: bool) -> Self {
        Self {
            x: pos.x,
            y: pos.y,
            z: pos.z,
            color,
            material: material as u8,
            flags: if player_placed { Self::FLAG_PLAYER_PLACED } else { 0 },
            reserved: [0; 2],
        }
    }

    /// Creates a generated voxel with the material's default colour.
    #[inline]
    #[must_use]
    pub const fn generated(pos: VoxelPos, material: Material) -> Self {
        Self::new(pos, material, material.default_color(), false)
    }

    /// A removal marker for the modification overlay.
    #[inline]
    #[must_use]
    pub const fn tombstone(pos: VoxelPos) -> Self {
        Self {
            x: pos.x,
            y: pos.y,
            z: pos.z,
            color: Rgb(0),
            material: TOMBSTONE_ID,
            flags: Self::FLAG_PLAYER_PLACED,
            reserved: [0; 2],
        }
    }

    /// Returns true for a removal marker.
    #[inline]
    #[must_use]
    pub const fn is_tombstone(&self) -> bool {
        self.material == TOMBSTONE_ID
    }

    /// World position.
    #[inline]
    #[must_use]
    pub const fn pos(&self) -> VoxelPos {
        VoxelPos::new(self.x, self.y, self.z)
    }

    /// Decoded material, `None` for ids outside the table.
    #[inline]
    #[must_use]
    pub const fn material(&self) -> Option<Material> {
        Material::from_id(self.material)
    }

    /// Returns true if a player placed this voxel.
    #[inline]
    #[must_use]
    pub const fn is_player_placed(&self) -> bool {
        self.flags & Self::FLAG_PLAYER_PLACED != 0
    }
}

/// The world-model seam used by column and feature placement.
///
/// `add_block` overwrites whatever was at the coordinate; `get_block` is the
/// read side used for ground detection.
pub trait BlockSink {
    /// Places one voxel, replacing any prior voxel at that coordinate.
    /// `color = None` uses the material's default colour.
    fn add_block(
        &mut self,
        x: i32,
        y: i32,
        z: i32,
        material: Material,
        player_placed: bool,
        color: Option<Rgb>,
    );

    /// Reads the voxel at a coordinate, `None` for air.
    fn get_block(&self, x: i32, y: i32, z: i32) -> Option<Voxel>;

    /// Removes the voxel at a coordinate, returning it.
    fn remove_block(&mut self, x: i32, y: i32, z: i32) -> Option<Voxel>;

    /// Highest non-water voxel in a column, scanning down from `from_y` to
    /// `to_y` inclusive.
    fn ground_height(&self, x: i32, z: i32, from_y: i32, to_y: i32) -> Option<i32> {
        (to_y..=from_y).rev().find(|&y| {
            self.get_block(x, y, z)
                .is_some_and(|v| v.material() != Some(Material::Water))
        })
    }
}

/// Sparse set of voxels with at most one voxel per coordinate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoxelSet {
    voxels: HashMap<VoxelPos, Voxel>,
}

impl VoxelSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty set with room for `capacity` voxels.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            voxels: HashMap::with_capacity(capacity),
        }
    }

    /// Number of voxels.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    /// Returns true if the set holds no voxels.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Inserts a voxel, returning the one it replaced.
    pub fn insert(&mut self, voxel: Voxel) -> Option<Voxel> {
        self.voxels.insert(voxel.pos(), voxel)
    }

    /// Removes the voxel at a position.
    pub fn remove(&mut self, pos: VoxelPos) -> Option<Voxel> {
        self.voxels.remove(&pos)
    }

    /// Voxel at a position.
    #[inline]
    #[must_use]
    pub fn get(&self, pos: VoxelPos) -> Option<&Voxel> {
        self.voxels.get(&pos)
    }

    /// Returns true if a voxel occupies the position.
    #[inline]
    #[must_use]
    pub fn contains(&self, pos: VoxelPos) -> bool {
        self.voxels.contains_key(&pos)
    }

    /// Iterates voxels in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Voxel> {
        self.voxels.values()
    }

    /// Voxels sorted by (y, z, x), stable across runs.
    #[must_use]
    pub fn sorted(&self) -> Vec<Voxel> {
        let mut voxels: Vec<Voxel> = self.voxels.values().copied().collect();
        voxels.sort_unstable_by_key(|v| (v.y, v.z, v.x));
        voxels
    }

    /// Inclusive bounding box `(min, max)`, `None` when empty.
    #[must_use]
    pub fn bounds(&self) -> Option<(VoxelPos, VoxelPos)> {
        let mut iter = self.voxels.keys();
        let first = *iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), p| {
            (
                VoxelPos::new(lo.x.min(p.x), lo.y.min(p.y), lo.z.min(p.z)),
                VoxelPos::new(hi.x.max(p.x), hi.y.max(p.y), hi.z.max(p.z)),
            )
        }))
    }

    /// Converts to the struct-of-arrays form, sorted for determinism.
    #[must_use]
    pub fn to_buffers(&self) -> ChunkBuffers {
        let sorted = self.sorted();
        let mut buffers = ChunkBuffers::with_capacity(sorted.len());
        for v in &sorted {
            buffers.positions.extend_from_slice(&[v.x, v.y, v.z]);
            buffers.materials.push(v.material);
            buffers.colors.push(v.color.0);
            buffers.flags.push(v.flags);
        }
        buffers
    }

    /// Rebuilds a set from buffers.
    ///
    /// Voxels with ids outside the material table are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`ProceduralError::MalformedBuffers`] if the arrays disagree in
    /// length.
    pub fn from_buffers(buffers: &ChunkBuffers) -> ProceduralResult<Self> {
        let count = buffers.len();
        if buffers.positions.len() != count * 3
            || buffers.colors.len() != count
            || buffers.flags.len() != count
        {
            return Err(ProceduralError::MalformedBuffers(format!(
                "{} positions, {} materials, {} colors, {} flags",
                buffers.positions.len(),
                count,
                buffers.colors.len(),
                buffers.flags.len()
            )));
        }

        let mut set = Self::with_capacity(count);
        for i in 0..count {
            let pos = VoxelPos::new(
                buffers.positions[i * 3],
                buffers.positions[i * 3 + 1],
                buffers.positions[i * 3 + 2],
            );
            let Some(material) = Material::from_id(buffers.materials[i]) else {
                tracing::warn!(id = buffers.materials[i], ?pos, "unknown material id dropped");
                continue;
            };
            let mut voxel = Voxel::new(pos, material, Rgb(buffers.colors[i]), false);
            voxel.flags = buffers.flags[i];
            set.insert(voxel);
        }
        Ok(set)
    }
}

impl BlockSink for VoxelSet {
    fn add_block(
        &mut self,
        x: i32,
        y: i32,
        z: i32,
        material: Material,
        player_placed: bool,
        color: Option<Rgb>,
    ) {
        let color = color.unwrap_or_else(|| material.default_color());
        self.insert(Voxel::new(VoxelPos::new(x, y, z), material, color, player_placed));
    }

    fn get_block(&self, x: i32, y: i32, z: i32) -> Option<Voxel> {
        self.get(VoxelPos::new(x, y, z)).copied()
    }

    fn remove_block(&mut self, x: i32, y: i32, z: i32) -> Option<Voxel> {
        self.remove(VoxelPos::new(x, y, z))
    }
}

impl FromIterator<Voxel> for VoxelSet {
    fn from_iter<I: IntoIterator<Item = Voxel>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl Extend<Voxel> for VoxelSet {
    fn extend<I: IntoIterator<Item = Voxel>>(&mut self, iter: I) {
        for voxel in iter {
            self.insert(voxel);
        }
    }
}

/// Struct-of-arrays voxel buffers, moved (not copied) across threads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkBuffers {
    /// `x, y, z` triples.
    pub positions: Vec<i32>,
    /// Material ids.
    pub materials: Vec<u8>,
    /// Packed `0xRRGGBB` colours.
    pub colors: Vec<u32>,
    /// Voxel flags.
    pub flags: Vec<u8>,
}

impl ChunkBuffers {
    /// Empty buffers with room for `count` voxels.
    #[must_use]
    pub fn with_capacity(count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(count * 3),
            materials: Vec::with_capacity(count),
            colors: Vec::with_capacity(count),
            flags: Vec::with_capacity(count),
        }
    }

    /// Number of voxels described.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Returns true if no voxels are described.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
