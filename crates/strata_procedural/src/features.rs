//! # Feature Placement
//!
//! Trees, cacti, boulders and shrubs, placed after the terrain columns of a
//! chunk exist. Three rules decide placement:
//!
//! - **Density**: each column rolls against `base_chance × vegetation_density`
//!   with a ChaCha RNG seeded from `(seed, x, z)`.
//! - **Spacing**: a candidate is rejected if a remembered feature lies within
//!   `spacing_radius`. The memory is bounded and pruned periodically.
//! - **Guarantee**: a biome that goes `guarantee_interval` chunks without a
//!   feature gets one forced in the next chunk it dominates.
//!
//! Features only ever write through [`BlockSink`] and are clipped to the
//! chunk footprint.

use std::collections::{HashMap, VecDeque};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::biome::BiomeKind;
use crate::column::ColumnStack;
use crate::config::FeatureConfig;
use crate::material::Material;
use crate::noise::WorldSeed;
use crate::voxel::{BlockSink, ChunkKey};

/// Kinds of placeable feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    /// Broadleaf tree.
    OakTree,
    /// Conifer.
    PineTree,
    /// Desert cactus.
    Cactus,
    /// Small rock pile.
    Boulder,
    /// Single leaf bush.
    Shrub,
}

impl FeatureKind {
    /// Feature kinds a biome may carry.
    #[must_use]
    pub const fn for_biome(kind: BiomeKind) -> &'static [Self] {
        match kind {
            BiomeKind::Tundra => &[Self::Boulder],
            BiomeKind::Taiga | BiomeKind::Alpine => &[Self::PineTree, Self::Boulder],
            BiomeKind::Plains | BiomeKind::Savanna => &[Self::Shrub, Self::OakTree],
            BiomeKind::Forest | BiomeKind::Swamp | BiomeKind::LushForest => {
                &[Self::OakTree, Self::Shrub]
            }
            BiomeKind::Desert => &[Self::Cactus, Self::Boulder],
        }
    }

    /// Voxels relative to the ground voxel: `(dx, dy, dz, material)`.
    fn shape(self) -> Vec<(i32, i32, i32, Material)> {
        let mut voxels = Vec::new();
        match self {
            Self::OakTree => {
                for dy in 1..=4 {
                    voxels.push((0, dy, 0, Material::Wood));
                }
                for dy in 4..=5 {
                    for dx in -1..=1 {
                        for dz in -1..=1 {
                            if (dx, dz) != (0, 0) || dy == 5 {
                                voxels.push((dx, dy, dz, Material::Leaves));
                            }
                        }
                    }
                }
                voxels.push((0, 6, 0, Material::Leaves));
            }
            Self::PineTree => {
                for dy in 1..=5 {
                    voxels.push((0, dy, 0, Material::Wood));
                }
                for dy in [3, 5] {
                    for (dx, dz) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                        voxels.push((dx, dy, dz, Material::Leaves));
                    }
                }
                voxels.push((0, 6, 0, Material::Leaves));
                voxels.push((0, 7, 0, Material::Leaves));
            }
            Self::Cactus => {
                for dy in 1..=3 {
                    voxels.push((0, dy, 0, Material::Cactus));
                }
            }
            Self::Boulder => {
                voxels.push((0, 1, 0, Material::Stone));
                voxels.push((1, 1, 0, Material::Gravel));
                voxels.push((0, 1, 1, Material::Stone));
                voxels.push((0, 2, 0, Material::Stone));
            }
            Self::Shrub => voxels.push((0, 1, 0, Material::Leaves)),
        }
        voxels
    }
}

/// Bounded memory of recent feature positions.
#[derive(Debug)]
pub struct PlacementMemory {
    positions: VecDeque<(i32, i32)>,
    capacity: usize,
    prune_interval: u32,
    prune_distance: i32,
    since_prune: u32,
}

impl PlacementMemory {
    /// Creates an empty memory.
    #[must_use]
    pub fn new(config: &FeatureConfig) -> Self {
        Self {
            positions: VecDeque::with_capacity(config.memory_capacity),
            capacity: config.memory_capacity.max(1),
            prune_interval: config.prune_interval.max(1),
            prune_distance: config.prune_distance,
            since_prune: 0,
        }
    }

    /// Number of remembered positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Returns true if no remembered feature lies within `radius` (Chebyshev).
    #[must_use]
    pub fn is_clear(&self, x: i32, z: i32, radius: i32) -> bool {
        !self
            .positions
            .iter()
            .any(|&(px, pz)| (px - x).abs() <= radius && (pz - z).abs() <= radius)
    }

    /// Remembers a placement. `center` is the current chunk centre, used to
    /// decide what pruning drops.
    pub fn record(&mut self, x: i32, z: i32, center: (i32, i32)) {
        if self.positions.len() >= self.capacity {
            self.positions.pop_front();
        }
        self.positions.push_back((x, z));

        self.since_prune += 1;
        if self.since_prune >= self.prune_interval {
            self.since_prune = 0;
            let limit = self.prune_distance;
            self.positions.retain(|&(px, pz)| {
                (px - center.0).abs() <= limit && (pz - center.1).abs() <= limit
            });
        }
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.since_prune = 0;
    }
}

/// Places features for successive chunks.
#[derive(Debug)]
pub struct FeaturePlacer {
    seed: WorldSeed,
    config: FeatureConfig,
    memory: PlacementMemory,
    dry_chunks: HashMap<BiomeKind, u32>,
}

impl FeaturePlacer {
    /// Creates a placer.
    #[must_use]
    pub fn new(seed: WorldSeed, config: FeatureConfig) -> Self {
        Self {
            seed: seed.derive(0xFEA7),
            memory: PlacementMemory::new(&config),
            config,
            dry_chunks: HashMap::new(),
        }
    }

    /// Remembered feature positions.
    #[must_use]
    pub const fn memory(&self) -> &PlacementMemory {
        &self.memory
    }

    /// Consecutive feature-less chunks recorded for a biome.
    #[must_use]
    pub fn dry_streak(&self, kind: BiomeKind) -> u32 {
        self.dry_chunks.get(&kind).copied().unwrap_or(0)
    }

    /// Resets spacing memory and guarantee counters.
    pub fn clear(&mut self) {
        self.memory.clear();
        self.dry_chunks.clear();
    }

    /// Places features for one chunk's columns; returns how many were placed.
    pub fn place_chunk<S: BlockSink + ?Sized>(
        &mut self,
        key: ChunkKey,
        chunk_size: u32,
        columns: &[ColumnStack],
        sink: &mut S,
    ) -> usize {
        let size = chunk_size as i32;
        let (ox, oz) = key.origin(chunk_size);
        let center = (ox + size / 2, oz + size / 2);
        let mut placed = 0;

        for column in columns {
            let kinds = FeatureKind::for_biome(column.biome.kind);
            if kinds.is_empty() || !Self::eligible(column, sink) {
                continue;
            }
            let mut rng = self.column_rng(column.world_x, column.world_z);
            let chance = self.config.base_chance * column.biome.vegetation_density;
            if rng.gen::<f64>() >= chance {
                continue;
            }
            if !self
                .memory
                .is_clear(column.world_x, column.world_z, self.config.spacing_radius)
            {
                continue;
            }
            let kind = kinds[rng.gen_range(0..kinds.len())];
            self.place(kind, column, key, chunk_size, sink);
            self.memory.record(column.world_x, column.world_z, center);
            placed += 1;
        }

        let Some(dominant) = dominant_biome(columns) else {
            return placed;
        };
        if placed > 0 {
            self.dry_chunks.insert(dominant, 0);
            return placed;
        }

        let streak = self.dry_chunks.entry(dominant).or_insert(0);
        if *streak < self.config.guarantee_interval {
            *streak += 1;
            return placed;
        }
        *streak = 0;

        let forced = columns
            .iter()
            .filter(|c| c.biome.kind == dominant && Self::eligible(c, sink))
            .find(|c| {
                self.memory
                    .is_clear(c.world_x, c.world_z, self.config.spacing_radius)
            });
        if let Some(column) = forced {
            let kinds = FeatureKind::for_biome(dominant);
            let mut rng = self.column_rng(column.world_x, column.world_z);
            let kind = kinds[rng.gen_range(0..kinds.len())];
            self.place(kind, column, key, chunk_size, sink);
            self.memory.record(column.world_x, column.world_z, center);
            tracing::trace!(%key, biome = dominant.name(), ?kind, "guaranteed feature placed");
            placed += 1;
        }
        placed
    }

    fn column_rng(&self, x: i32, z: i32) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed.hash2(i64::from(x), i64::from(z)))
    }

    /// Dry ground: solid top voxel with no water above it.
    fn eligible<S: BlockSink + ?Sized>(column: &ColumnStack, sink: &S) -> bool {
        column.water_level.is_none()
            && sink
                .get_block(column.world_x, column.surface_height, column.world_z)
                .is_some_and(|v| v.material() != Some(Material::Water))
    }

    fn place<S: BlockSink + ?Sized>(
        &self,
        kind: FeatureKind,
        column: &ColumnStack,
        key: ChunkKey,
        chunk_size: u32,
        sink: &mut S,
    ) {
        let ground = sink
            .ground_height(
                column.world_x,
                column.world_z,
                column.surface_height,
                column.surface_height - 8,
            )
            .unwrap_or(column.surface_height);

        for (dx, dy, dz, material) in kind.shape() {
            let (x, z) = (column.world_x + dx, column.world_z + dz);
            if key.contains(x, z, chunk_size) {
                sink.add_block(x, ground + dy, z, material, false, None);
            }
        }
    }
}

/// Most common biome among the columns; ties go to the lower id.
fn dominant_biome(columns: &[ColumnStack]) -> Option<BiomeKind> {
    let mut counts = [0usize; BiomeKind::ALL.len()];
    for column in columns {
        counts[column.biome.kind as usize] += 1;
    }
    BiomeKind::ALL
        .into_iter()
        .zip(counts)
        .filter(|&(_, n)| n > 0)
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(kind, _)| kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biome::{BiomeTemplate, RegionGenerator};
    use crate::material::Rgb;
    use crate::voxel::VoxelSet;

    fn flat_chunk(kind: BiomeKind, key: ChunkKey, size: u32, sink: &mut VoxelSet) -> Vec<ColumnStack> {
        let template: &BiomeTemplate = kind.template();
        let (ox, oz) = key.origin(size);
        let mut columns = Vec::new();
        for z in oz..oz + size as i32 {
            for x in ox..ox + size as i32 {
                sink.add_block(x, 10, z, Material::Grass, false, Some(Rgb(1)));
                columns.push(ColumnStack {
                    world_x: x,
                    world_z: z,
                    surface_height: 10,
                    water_level: None,
                    biome: template.descriptor(RegionGenerator::Rolling),
                    voxels: Vec::new(),
                });
            }
        }
        columns
    }

    fn config() -> FeatureConfig {
        FeatureConfig::default()
    }

    #[test]
    fn test_memory_spacing() {
        let mut memory = PlacementMemory::new(&config());
        memory.record(0, 0, (0, 0));
        assert!(!memory.is_clear(2, -3, 3));
        assert!(memory.is_clear(4, 0, 3));
    }

    #[test]
    fn test_memory_is_bounded_and_pruned() {
        let mut cfg = config();
        cfg.memory_capacity = 4;
        cfg.prune_interval = 1000;
        let mut memory = PlacementMemory::new(&cfg);
        for i in 0..10 {
            memory.record(i * 10, 0, (0, 0));
        }
        assert_eq!(memory.len(), 4);
        // Oldest entries went first.
        assert!(memory.is_clear(0, 0, 1));
        assert!(!memory.is_clear(90, 0, 1));

        let mut cfg = config();
        cfg.prune_interval = 2;
        cfg.prune_distance = 50;
        let mut memory = PlacementMemory::new(&cfg);
        memory.record(1000, 1000, (0, 0));
        memory.record(5, 5, (0, 0));
        assert_eq!(memory.len(), 1);
        assert!(!memory.is_clear(5, 5, 0));
    }

    #[test]
    fn test_placement_respects_spacing() {
        let mut cfg = config();
        cfg.base_chance = 1.0;
        let mut placer = FeaturePlacer::new(WorldSeed::new(3), cfg.clone());
        let key = ChunkKey::new(0, 0);
        let mut set = VoxelSet::new();
        let columns = flat_chunk(BiomeKind::LushForest, key, 16, &mut set);

        let placed = placer.place_chunk(key, 16, &columns, &mut set);
        assert!(placed > 0);

        // Trunks and shrubs both start one above the ground.
        let bases: Vec<(i32, i32)> = columns
            .iter()
            .map(|c| (c.world_x, c.world_z))
            .filter(|&(x, z)| set.get_block(x, 11, z).is_some())
            .collect();
        assert_eq!(bases.len(), placed);
        for (i, a) in bases.iter().enumerate() {
            for b in &bases[i + 1..] {
                let gap = (a.0 - b.0).abs().max((a.1 - b.1).abs());
                assert!(gap > cfg.spacing_radius, "{a:?} and {b:?} too close");
            }
        }
        assert_eq!(placer.memory().len(), placed);
    }

    #[test]
    fn test_features_clipped_to_chunk() {
        let mut cfg = config();
        cfg.base_chance = 1.0;
        cfg.spacing_radius = 0;
        let mut placer = FeaturePlacer::new(WorldSeed::new(11), cfg);
        let key = ChunkKey::new(2, -1);
        let mut set = VoxelSet::new();
        let columns = flat_chunk(BiomeKind::Forest, key, 8, &mut set);

        placer.place_chunk(key, 8, &columns, &mut set);
        assert!(set.iter().all(|v| key.contains(v.x, v.z, 8)));
    }

    #[test]
    fn test_guarantee_counter_forces_feature() {
        let mut cfg = config();
        cfg.base_chance = 0.0;
        cfg.guarantee_interval = 2;
        let mut placer = FeaturePlacer::new(WorldSeed::new(5), cfg);

        let mut placements = Vec::new();
        for cx in 0..6 {
            let key = ChunkKey::new(cx, 0);
            let mut set = VoxelSet::new();
            let columns = flat_chunk(BiomeKind::Desert, key, 8, &mut set);
            placements.push(placer.place_chunk(key, 8, &columns, &mut set));
        }
        assert_eq!(placements, vec![0, 0, 1, 0, 0, 1]);
        assert_eq!(placer.dry_streak(BiomeKind::Desert), 0);
    }

    #[test]
    fn test_underwater_columns_skipped() {
        let mut cfg = config();
        cfg.base_chance = 1.0;
        cfg.guarantee_interval = 1;
        let mut placer = FeaturePlacer::new(WorldSeed::new(5), cfg);
        let key = ChunkKey::new(0, 0);
        let mut set = VoxelSet::new();
        let mut columns = flat_chunk(BiomeKind::Forest, key, 4, &mut set);
        for column in &mut columns {
            column.water_level = Some(20);
        }

        assert_eq!(placer.place_chunk(key, 4, &columns, &mut set), 0);
        assert_eq!(set.len(), 16);
    }

    #[test]
    fn test_clear_resets_state() {
        let mut cfg = config();
        cfg.base_chance = 0.0;
        let mut placer = FeaturePlacer::new(WorldSeed::new(5), cfg);
        let key = ChunkKey::new(0, 0);
        let mut set = VoxelSet::new();
        let columns = flat_chunk(BiomeKind::Plains, key, 8, &mut set);
        placer.place_chunk(key, 8, &columns, &mut set);
        assert_eq!(placer.dry_streak(BiomeKind::Plains), 1);

        placer.clear();
        assert_eq!(placer.dry_streak(BiomeKind::Plains), 0);
        assert!(placer.memory().is_empty());
    }

    #[test]
    fn test_dominant_biome_tie_breaks_low() {
        let mut set = VoxelSet::new();
        let mut columns = flat_chunk(BiomeKind::Swamp, ChunkKey::new(0, 0), 2, &mut set);
        columns.extend(flat_chunk(BiomeKind::Taiga, ChunkKey::new(5, 5), 2, &mut set));
        assert_eq!(dominant_biome(&columns), Some(BiomeKind::Taiga));
        assert_eq!(dominant_biome(&[]), None);
    }
}
