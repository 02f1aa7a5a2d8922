//! Greedy meshing for sparse voxel sets.
//!
//! Reduces polygon count by merging adjacent faces with the same material
//! and colour.
//!
//! ## Algorithm
//!
//! 1. For each direction (±X, ±Y, ±Z):
//! 2. Sweep through slices perpendicular to its axis across the voxel bounds
//! 3. Build a 2D mask of faces whose voxel is solid and whose neighbour in
//!    the direction is empty
//! 4. Greedily merge adjacent mask cells with equal material and colour
//! 5. Output merged quads

use std::time::Instant;

use strata_procedural::{Rgb, VoxelPos, VoxelSet};

use crate::buffers::MeshBuffers;

/// One of the six axis-aligned face directions.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// +X
    PosX = 0,
    /// -X
    NegX = 1,
    /// +Y (up)
    PosY = 2,
    /// -Y
    NegY = 3,
    /// +Z
    PosZ = 4,
    /// -Z
    NegZ = 5,
}

impl Direction {
    /// All six directions.
    pub const ALL: [Self; 6] = [
        Self::PosX,
        Self::NegX,
        Self::PosY,
        Self::NegY,
        Self::PosZ,
        Self::NegZ,
    ];

    /// Axis index: 0 = X, 1 = Y, 2 = Z.
    #[inline]
    #[must_use]
    pub const fn axis(self) -> usize {
        (self as usize) / 2
    }

    /// Returns true for +X, +Y, +Z.
    #[inline]
    #[must_use]
    pub const fn is_positive(self) -> bool {
        (self as u8) % 2 == 0
    }

    /// Unit step toward the neighbour this face looks at.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> [i32; 3] {
        match self {
            Self::PosX => [1, 0, 0],
            Self::NegX => [-1, 0, 0],
            Self::PosY => [0, 1, 0],
            Self::NegY => [0, -1, 0],
            Self::PosZ => [0, 0, 1],
            Self::NegZ => [0, 0, -1],
        }
    }

    /// Face normal.
    #[inline]
    #[must_use]
    pub fn normal(self) -> [f32; 3] {
        self.offset().map(|c| c as f32)
    }

    /// The in-plane axes `(u, v)`, ordered so that `u × v` points along the
    /// positive axis.
    #[inline]
    #[must_use]
    pub const fn plane_axes(self) -> (usize, usize) {
        let axis = self.axis();
        ((axis + 1) % 3, (axis + 2) % 3)
    }
}

/// A merged rectangle of faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshQuad {
    /// Minimum corner on the face plane, in world units.
    pub origin: [i32; 3],
    /// Extent along the direction's `u` axis, in voxels.
    pub width: u32,
    /// Extent along the direction's `v` axis, in voxels.
    pub height: u32,
    /// Facing.
    pub direction: Direction,
    /// Material id of the merged faces.
    pub material: u8,
    /// Colour of the merged faces.
    pub color: Rgb,
}

impl MeshQuad {
    /// Corners in front-facing (counter-clockwise seen from the normal)
    /// order, each with its `(u, v)` texture coordinate.
    #[must_use]
    pub fn corners(&self) -> [([f32; 3], [f32; 2]); 4] {
        let (u_axis, v_axis) = self.direction.plane_axes();
        let (w, h) = (self.width as f32, self.height as f32);

        let corner = |du: f32, dv: f32| {
            let mut p = self.origin.map(|c| c as f32);
            p[u_axis] += du;
            p[v_axis] += dv;
            (p, [du, dv])
        };
        let ccw = [
            corner(0.0, 0.0),
            corner(w, 0.0),
            corner(w, h),
            corner(0.0, h),
        ];

        if self.direction.is_positive() {
            ccw
        } else {
            [ccw[0], ccw[3], ccw[2], ccw[1]]
        }
    }

    /// Number of voxel faces merged into this quad.
    #[inline]
    #[must_use]
    pub const fn area(&self) -> u32 {
        self.width * self.height
    }
}

/// Mask cell: what a visible face looks like.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FaceKey {
    material: u8,
    color: Rgb,
}

/// Greedy meshing engine. Keeps its working mask between calls.
#[derive(Debug, Default)]
pub struct GreedyMesher {
    mask: Vec<Option<FaceKey>>,
}

impl GreedyMesher {
    /// Creates a mesher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merged quads for all six directions.
    pub fn mesh(&mut self, voxels: &VoxelSet) -> Vec<MeshQuad> {
        let start = Instant::now();
        let mut quads = Vec::new();
        for direction in Direction::ALL {
            quads.extend(self.quads(voxels, direction));
        }

        let elapsed = start.elapsed();
        tracing::trace!(
            voxels = voxels.len(),
            quads = quads.len(),
            micros = elapsed.as_micros() as u64,
            "mesh built"
        );
        if elapsed.as_millis() > 10 {
            tracing::debug!(ms = elapsed.as_millis() as u64, voxels = voxels.len(), "slow mesh");
        }
        quads
    }

    /// Meshes a chunk straight into vertex streams.
    #[must_use]
    pub fn mesh_buffers(&mut self, voxels: &VoxelSet) -> MeshBuffers {
        MeshBuffers::from_quads(&self.mesh(voxels))
    }

    /// Merged quads for one direction.
    pub fn quads(&mut self, voxels: &VoxelSet, direction: Direction) -> Vec<MeshQuad> {
        let mut output = Vec::new();
        let Some((lo, hi)) = voxels.bounds() else {
            return output;
        };
        let (lo, hi) = ([lo.x, lo.y, lo.z], [hi.x, hi.y, hi.z]);

        let axis = direction.axis();
        let (u_axis, v_axis) = direction.plane_axes();
        let nu = (hi[u_axis] - lo[u_axis] + 1) as usize;
        let nv = (hi[v_axis] - lo[v_axis] + 1) as usize;
        let step = direction.offset();

        for d in lo[axis]..=hi[axis] {
            self.build_mask(voxels, direction, d, lo, nu, nv, step);
            self.greedy_extract(direction, d, lo, nu, nv, &mut output);
        }
        output
    }

    /// Marks every visible face in slice `d`.
    #[allow(clippy::too_many_arguments)]
    fn build_mask(
        &mut self,
        voxels: &VoxelSet,
        direction: Direction,
        d: i32,
        lo: [i32; 3],
        nu: usize,
        nv: usize,
        step: [i32; 3],
    ) {
        let axis = direction.axis();
        let (u_axis, v_axis) = direction.plane_axes();

        self.mask.clear();
        self.mask.resize(nu * nv, None);

        for v in 0..nv {
            for u in 0..nu {
                let mut pos = [0i32; 3];
                pos[axis] = d;
                pos[u_axis] = lo[u_axis] + u as i32;
                pos[v_axis] = lo[v_axis] + v as i32;

                let Some(voxel) = voxels.get(VoxelPos::new(pos[0], pos[1], pos[2])) else {
                    continue;
                };
                let neighbour = VoxelPos::new(pos[0] + step[0], pos[1] + step[1], pos[2] + step[2]);
                if voxels.contains(neighbour) {
                    continue;
                }
                self.mask[v * nu + u] = Some(FaceKey {
                    material: voxel.material,
                    color: voxel.color,
                });
            }
        }
    }

    /// Greedily extracts quads from the mask.
    fn greedy_extract(
        &mut self,
        direction: Direction,
        d: i32,
        lo: [i32; 3],
        nu: usize,
        nv: usize,
        output: &mut Vec<MeshQuad>,
    ) {
        let axis = direction.axis();
        let (u_axis, v_axis) = direction.plane_axes();
        let plane = if direction.is_positive() { d + 1 } else { d };

        for v in 0..nv {
            let mut u = 0;
            while u < nu {
                let Some(face) = self.mask[v * nu + u] else {
                    u += 1;
                    continue;
                };

                // Find width - extend along u while the face matches
                let mut width = 1;
                while u + width < nu && self.mask[v * nu + u + width] == Some(face) {
                    width += 1;
                }

                // Find height - extend rows whose whole run matches
                let mut height = 1;
                'height: while v + height < nv {
                    for du in 0..width {
                        if self.mask[(v + height) * nu + u + du] != Some(face) {
                            break 'height;
                        }
                    }
                    height += 1;
                }

                let mut origin = [0i32; 3];
                origin[axis] = plane;
                origin[u_axis] = lo[u_axis] + u as i32;
                origin[v_axis] = lo[v_axis] + v as i32;
                output.push(MeshQuad {
                    origin,
                    width: width as u32,
                    height: height as u32,
                    direction,
                    material: face.material,
                    color: face.color,
                });

                // Clear used cells from mask
                for dv in 0..height {
                    for du in 0..width {
                        self.mask[(v + dv) * nu + u + du] = None;
                    }
                }

                u += width;
            }
        }
    }
}
