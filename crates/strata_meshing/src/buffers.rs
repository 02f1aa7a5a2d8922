//! # Mesh Buffers
//!
//! Flat, non-indexed vertex streams: two triangles (six vertices) per quad.
//! Every attribute array has one entry per vertex.

use crate::greedy_mesh::MeshQuad;

/// Corner order of the two triangles of a quad.
const TRIANGLE_CORNERS: [usize; 6] = [0, 1, 2, 0, 2, 3];

/// Vertex streams for one chunk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffers {
    /// Vertex positions in world units.
    pub positions: Vec<[f32; 3]>,
    /// Face normal of each vertex.
    pub normals: Vec<[f32; 3]>,
    /// Voxel colour, normalized to 0-1.
    pub colors: Vec<[f32; 3]>,
    /// Texture coordinates in voxel units, so textures tile across a quad.
    pub uvs: Vec<[f32; 2]>,
}

impl MeshBuffers {
    /// Vertices emitted per quad.
    pub const VERTICES_PER_QUAD: usize = 6;

    /// Builds the streams for a set of quads.
    #[must_use]
    pub fn from_quads(quads: &[MeshQuad]) -> Self {
        let count = quads.len() * Self::VERTICES_PER_QUAD;
        let mut buffers = Self {
            positions: Vec::with_capacity(count),
            normals: Vec::with_capacity(count),
            colors: Vec::with_capacity(count),
            uvs: Vec::with_capacity(count),
        };

        for quad in quads {
            let corners = quad.corners();
            let normal = quad.direction.normal();
            let color = quad.color.to_unit();
            for index in TRIANGLE_CORNERS {
                let (position, uv) = corners[index];
                buffers.positions.push(position);
                buffers.normals.push(normal);
                buffers.colors.push(color);
                buffers.uvs.push(uv);
            }
        }
        buffers
    }

    /// Number of vertices.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of quads.
    #[inline]
    #[must_use]
    pub fn quad_count(&self) -> usize {
        self.positions.len() / Self::VERTICES_PER_QUAD
    }

    /// Returns true if there is nothing to draw.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Position stream as raw bytes for upload.
    #[must_use]
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Normal stream as raw bytes for upload.
    #[must_use]
    pub fn normal_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }

    /// Colour stream as raw bytes for upload.
    #[must_use]
    pub fn color_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }

    /// UV stream as raw bytes for upload.
    #[must_use]
    pub fn uv_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.uvs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::greedy_mesh::{Direction, GreedyMesher};
    use strata_procedural::{Material, Rgb, Voxel, VoxelPos, VoxelSet};

    #[test]
    fn test_slab_vertex_count() {
        let mut set = VoxelSet::new();
        for z in 0..3 {
            for x in 0..3 {
                set.insert(Voxel::generated(VoxelPos::new(x, 0, z), Material::Stone));
            }
        }

        let mut mesher = GreedyMesher::new();
        let mut quads = mesher.quads(&set, Direction::PosY);
        quads.extend(mesher.quads(&set, Direction::NegY));
        let buffers = MeshBuffers::from_quads(&quads);

        assert_eq!(buffers.quad_count(), 2);
        assert_eq!(buffers.vertex_count(), 12);
        assert_eq!(buffers.uvs.len(), 12);
    }

    #[test]
    fn test_attributes_follow_the_voxel() {
        let color = Rgb::new(255, 0, 51);
        let set = VoxelSet::from_iter([Voxel::new(VoxelPos::new(0, 0, 0), Material::Wood, color, true)]);
        let buffers = MeshBuffers::from_quads(&GreedyMesher::new().mesh(&set));

        assert_eq!(buffers.vertex_count(), 36);
        assert!(buffers.colors.iter().all(|c| *c == [1.0, 0.0, 0.2]));
        for (i, normal) in buffers.normals.iter().enumerate() {
            let quad = i / MeshBuffers::VERTICES_PER_QUAD;
            assert_eq!(*normal, Direction::ALL[quad].normal());
        }
        assert_eq!(buffers.position_bytes().len(), 36 * 12);
        assert_eq!(buffers.uv_bytes().len(), 36 * 8);
    }

    #[test]
    fn test_uvs_span_the_quad() {
        let mut set = VoxelSet::new();
        for x in 0..4 {
            set.insert(Voxel::generated(VoxelPos::new(x, 0, 0), Material::Sand));
        }
        let quads = GreedyMesher::new().quads(&set, Direction::PosY);
        assert_eq!(quads.len(), 1);

        let buffers = MeshBuffers::from_quads(&quads);
        let max_u = buffers.uvs.iter().map(|uv| uv[0]).fold(0.0f32, f32::max);
        let max_v = buffers.uvs.iter().map(|uv| uv[1]).fold(0.0f32, f32::max);
        assert_eq!((max_u, max_v), (quads[0].width as f32, quads[0].height as f32));
        assert_eq!(quads[0].area(), 4);
    }

    #[test]
    fn test_mesh_buffers_in_one_call() {
        let mut set = VoxelSet::new();
        for z in 0..5 {
            for x in 0..5 {
                set.insert(Voxel::generated(VoxelPos::new(x, 3, z), Material::Grass));
            }
        }

        let mut mesher = GreedyMesher::new();
        let buffers = mesher.mesh_buffers(&set);
        assert_eq!(buffers.quad_count(), 6);
        assert_eq!(buffers.vertex_count(), 36);
        assert_eq!(buffers, MeshBuffers::from_quads(&mesher.mesh(&set)));
        assert!(mesher.mesh_buffers(&VoxelSet::new()).is_empty());
    }

    #[test]
    fn test_empty_buffers() {
        let buffers = MeshBuffers::from_quads(&[]);
        assert!(buffers.is_empty());
        assert_eq!(buffers.quad_count(), 0);
    }
}
