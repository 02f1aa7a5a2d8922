//! # Chunk Generation
//!
//! A chunk is `chunk_size × chunk_size` columns. Generation runs two passes:
//!
//! 1. terrain: one [`ColumnStack`] per column, written into a [`VoxelSet`]
//! 2. features: vegetation and rocks on top of the finished terrain
//!
//! Terrain is a pure function of seed, settings and coordinates. The feature
//! pass carries spacing memory and guarantee counters across chunks, so it
//! depends on the order chunks are generated in; [`ChunkGenerator::clear_cache`]
//! resets that state.

use parking_lot::Mutex;

use crate::column::{ColumnBuilder, ColumnStack};
use crate::config::GenerationSettings;
use crate::error::ProceduralResult;
use crate::features::FeaturePlacer;
use crate::voxel::{ChunkKey, VoxelSet};

/// Chunk generator using procedural noise.
pub struct ChunkGenerator {
    settings: GenerationSettings,
    columns: ColumnBuilder,
    /// Feature state shared by every caller of [`Self::generate`].
    features: Mutex<FeaturePlacer>,
}

impl ChunkGenerator {
    /// Creates a generator after validating the settings.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ProceduralError::InvalidSettings`] for unusable settings.
    pub fn new(settings: GenerationSettings) -> ProceduralResult<Self> {
        settings.validate()?;
        let seed = settings.world_seed();
        Ok(Self {
            columns: ColumnBuilder::new(
                seed,
                settings.noise.clone(),
                settings.biome.clone(),
                settings.terrain.clone(),
            ),
            features: Mutex::new(FeaturePlacer::new(seed, settings.features.clone())),
            settings,
        })
    }

    /// Returns the settings this generator was built with.
    #[inline]
    #[must_use]
    pub const fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Returns the column builder.
    #[inline]
    #[must_use]
    pub const fn columns(&self) -> &ColumnBuilder {
        &self.columns
    }

    /// Generates the chunk at `key` with the configured chunk size.
    #[must_use]
    pub fn generate(&self, key: ChunkKey) -> VoxelSet {
        self.generate_sized(key, self.settings.chunk_size)
    }

    /// Generates the chunk at `key` with an explicit footprint.
    #[must_use]
    pub fn generate_sized(&self, key: ChunkKey, chunk_size: u32) -> VoxelSet {
        let stacks = self.terrain_columns(key, chunk_size);

        let mut voxels = VoxelSet::with_capacity(stacks.iter().map(|s| s.voxels.len()).sum());
        for stack in &stacks {
            stack.emit_into(&mut voxels);
        }

        let features = self
            .features
            .lock()
            .place_chunk(key, chunk_size, &stacks, &mut voxels);

        tracing::trace!(%key, voxels = voxels.len(), features, "chunk generated");
        voxels
    }

    /// Builds every column of a chunk, row by row.
    #[must_use]
    pub fn terrain_columns(&self, key: ChunkKey, chunk_size: u32) -> Vec<ColumnStack> {
        let (origin_x, origin_z) = key.origin(chunk_size);
        let size = chunk_size as i32;
        let mut stacks = Vec::with_capacity((chunk_size * chunk_size) as usize);
        for local_z in 0..size {
            for local_x in 0..size {
                stacks.push(
                    self.columns
                        .build_column(origin_x + local_x, origin_z + local_z),
                );
            }
        }
        stacks
    }

    /// A flat chunk of emergency columns, used when generation itself fails.
    #[must_use]
    pub fn emergency_chunk(&self, key: ChunkKey, chunk_size: u32) -> VoxelSet {
        let (origin_x, origin_z) = key.origin(chunk_size);
        let size = chunk_size as i32;
        let mut voxels = VoxelSet::new();
        for local_z in 0..size {
            for local_x in 0..size {
                ColumnStack::emergency(
                    origin_x + local_x,
                    origin_z + local_z,
                    &self.settings.terrain,
                    &self.settings.biome,
                )
                .emit_into(&mut voxels);
            }
        }
        voxels
    }

    /// Resets feature memory, guarantee counters and the descriptor cache.
    pub fn clear_cache(&self) {
        self.features.lock().clear();
        self.columns.classifier().clear_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use crate::voxel::BlockSink;

    fn generator(seed: u64) -> ChunkGenerator {
        ChunkGenerator::new(GenerationSettings::with_seed(seed)).unwrap()
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut settings = GenerationSettings::default();
        settings.chunk_size = 0;
        assert!(ChunkGenerator::new(settings).is_err());
    }

    #[test]
    fn test_every_column_has_ground() {
        let generator = generator(42);
        let key = ChunkKey::new(3, -2);
        let voxels = generator.generate(key);
        let (ox, oz) = key.origin(8);
        let floor = generator.settings().terrain.min_ground_floor;

        for z in oz..oz + 8 {
            for x in ox..ox + 8 {
                let ground = voxels.ground_height(x, z, 128, -8);
                assert!(ground.is_some_and(|g| g >= floor), "no ground at ({x}, {z})");
            }
        }
    }

    #[test]
    fn test_voxels_stay_in_footprint() {
        let generator = generator(9);
        let key = ChunkKey::new(-1, 4);
        let voxels = generator.generate(key);
        assert!(voxels.iter().all(|v| key.contains(v.x, v.z, 8)));
        assert!(voxels.iter().any(|v| v.material() == Some(Material::Bedrock)));
    }

    #[test]
    fn test_same_order_same_chunks() {
        let a = generator(77);
        let b = generator(77);
        for x in 0..4 {
            let key = ChunkKey::new(x, 1);
            assert_eq!(a.generate(key), b.generate(key));
        }
    }

    #[test]
    fn test_clear_cache_restores_fresh_state() {
        let fresh = generator(5);
        let reused = generator(5);
        for x in 0..6 {
            let _ = reused.generate(ChunkKey::new(x, 0));
        }
        reused.clear_cache();

        let key = ChunkKey::new(10, 10);
        assert_eq!(reused.generate(key), fresh.generate(key));
    }

    #[test]
    fn test_emergency_chunk_is_flat_and_solid() {
        let generator = generator(3);
        let key = ChunkKey::new(-2, 1);
        let voxels = generator.emergency_chunk(key, 8);
        let (ox, oz) = key.origin(8);
        let top = generator.settings().terrain.emergency_height;

        for z in oz..oz + 8 {
            for x in ox..ox + 8 {
                assert_eq!(voxels.ground_height(x, z, 128, -8), Some(top));
            }
        }
        assert!(voxels.iter().all(|v| key.contains(v.x, v.z, 8)));
        assert!(voxels.iter().any(|v| v.material() == Some(Material::Bedrock)));
    }

    #[test]
    fn test_explicit_chunk_size() {
        let generator = generator(1);
        let stacks = generator.terrain_columns(ChunkKey::new(0, 0), 4);
        assert_eq!(stacks.len(), 16);
        let voxels = generator.generate_sized(ChunkKey::new(0, 0), 4);
        assert!(voxels.iter().all(|v| (0..4).contains(&v.x) && (0..4).contains(&v.z)));
    }
}
