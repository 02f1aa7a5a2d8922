//! # Column Builder
//!
//! Turns one `(x, z)` world column into an ordered voxel stack:
//!
//! 1. classify the biome
//! 2. scale elevation noise into the biome's height range
//! 3. add the rare super-feature peak (smoothstep above a noise threshold)
//! 4. clamp to `[0, max_height]`
//! 5. emit bedrock three below the natural surface, sub-surface layers, and
//!    the surface voxel (snow in cold biomes at or above the snowline)
//! 6. raise columns below the minimum ground floor with filler voxels
//!
//! Water fills from the surface up to sea level. Any failure while computing
//! a column yields the emergency flat column instead.

use crate::biome::{BiomeClassifier, BiomeDescriptor, RegionGenerator};
use crate::config::{BiomeConfig, NoiseConfig, TerrainConfig};
use crate::error::{ProceduralError, ProceduralResult};
use crate::material::{Material, Rgb};
use crate::noise::{NoiseField, WorldSeed};
use crate::voxel::BlockSink;

/// Depth of the bedrock voxel below the natural surface.
pub const BEDROCK_DEPTH: i32 = 3;

/// Largest micro-detail brightness shift applied to surface colours.
const MICRO_SHADE: f64 = 12.0;

/// One voxel of a column stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnVoxel {
    /// World Y.
    pub y: i32,
    /// Material.
    pub material: Material,
    /// Colour.
    pub color: Rgb,
}

/// A built column, voxels ordered bottom-up.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnStack {
    /// World X.
    pub world_x: i32,
    /// World Z.
    pub world_z: i32,
    /// Y of the top solid voxel.
    pub surface_height: i32,
    /// Top of the water fill, if the surface lies below sea level.
    pub water_level: Option<i32>,
    /// The biome the column was built for.
    pub biome: BiomeDescriptor,
    /// Ordered voxels.
    pub voxels: Vec<ColumnVoxel>,
}

impl ColumnStack {
    /// Flat fallback column at `terrain.emergency_height`.
    #[must_use]
    pub fn emergency(world_x: i32, world_z: i32, terrain: &TerrainConfig, band: &BiomeConfig) -> Self {
        let top = terrain.emergency_height;
        let voxels = (top - BEDROCK_DEPTH..=top)
            .map(|y| {
                let material = if y == top - BEDROCK_DEPTH {
                    Material::Bedrock
                } else if y == top {
                    Material::Grass
                } else {
                    Material::Dirt
                };
                ColumnVoxel {
                    y,
                    material,
                    color: material.default_color(),
                }
            })
            .collect();

        Self {
            world_x,
            world_z,
            surface_height: top,
            water_level: None,
            biome: BiomeDescriptor::safe_default(band, RegionGenerator::Rolling),
            voxels,
        }
    }

    /// Lowest emitted Y (the bedrock voxel).
    #[must_use]
    pub fn floor(&self) -> Option<i32> {
        self.voxels.first().map(|v| v.y)
    }

    /// Writes every voxel into the world model.
    pub fn emit_into<S: BlockSink + ?Sized>(&self, sink: &mut S) {
        for voxel in &self.voxels {
            sink.add_block(
                self.world_x,
                voxel.y,
                self.world_z,
                voxel.material,
                false,
                Some(voxel.color),
            );
        }
    }
}

/// Builds column stacks for one seed.
pub struct ColumnBuilder {
    classifier: BiomeClassifier,
    elevation_noise: NoiseField,
    super_noise: NoiseField,
    detail_noise: NoiseField,
    noise: NoiseConfig,
    terrain: TerrainConfig,
}

impl ColumnBuilder {
    /// Creates a builder.
    #[must_use]
    pub fn new(seed: WorldSeed, noise: NoiseConfig, biome: BiomeConfig, terrain: TerrainConfig) -> Self {
        Self {
            classifier: BiomeClassifier::new(seed, noise.clone(), biome),
            elevation_noise: NoiseField::new(seed.derive(100)),
            super_noise: NoiseField::new(seed.derive(101)),
            detail_noise: NoiseField::new(seed.derive(102)),
            noise,
            terrain,
        }
    }

    /// Returns the biome classifier.
    #[inline]
    #[must_use]
    pub const fn classifier(&self) -> &BiomeClassifier {
        &self.classifier
    }

    /// Returns the terrain settings.
    #[inline]
    #[must_use]
    pub const fn terrain(&self) -> &TerrainConfig {
        &self.terrain
    }

    /// Builds a column, falling back to the emergency column on failure.
    #[must_use]
    pub fn build_column(&self, world_x: i32, world_z: i32) -> ColumnStack {
        match self.try_build_column(world_x, world_z) {
            Ok(stack) => stack,
            Err(err) => {
                tracing::error!(%err, world_x, world_z, "using emergency flat column");
                ColumnStack::emergency(world_x, world_z, &self.terrain, self.classifier.config())
            }
        }
    }

    /// Builds a column.
    ///
    /// # Errors
    ///
    /// Returns [`ProceduralError::TerrainGenerationFailure`] if the surface
    /// height is not a number.
    pub fn try_build_column(&self, world_x: i32, world_z: i32) -> ProceduralResult<ColumnStack> {
        let biome = self.classifier.classify(world_x, world_z);
        let raw = self.raw_height(world_x, world_z, &biome);
        if !raw.is_finite() {
            return Err(ProceduralError::TerrainGenerationFailure {
                x: world_x,
                z: world_z,
                reason: format!("surface height {raw} is not finite"),
            });
        }
        Ok(self.stack(world_x, world_z, biome, raw))
    }

    /// Surface height before clamping: datum + biome range + super-feature.
    fn raw_height(&self, world_x: i32, world_z: i32, biome: &BiomeDescriptor) -> f64 {
        let (fx, fz) = (f64::from(world_x), f64::from(world_z));
        let elevation = self.elevation_noise.sample_unit(fx, fz, &self.noise.elevation);
        let mut height = f64::from(self.terrain.ground_datum)
            + biome.min_height
            + (biome.max_height - biome.min_height) * elevation;

        let signal = self.super_noise.sample_unit(fx, fz, &self.noise.super_feature);
        let threshold = self.terrain.super_feature_threshold;
        if signal > threshold {
            let t = ((signal - threshold) / (1.0 - threshold)).clamp(0.0, 1.0);
            height += smoothstep(t) * self.terrain.super_peak_height;
        }
        height
    }

    fn stack(&self, world_x: i32, world_z: i32, biome: BiomeDescriptor, raw: f64) -> ColumnStack {
        let terrain = &self.terrain;
        let natural = (raw.round() as i32).clamp(0, terrain.max_height);
        let top = natural.max(terrain.min_ground_floor);
        let floor = natural - BEDROCK_DEPTH;

        let surface = if biome.snow_capable && top >= terrain.snowline {
            Material::Snow
        } else {
            biome.surface
        };
        let surface_color = if surface == Material::Snow {
            Material::Snow.default_color()
        } else {
            self.surface_color(world_x, world_z, &biome, top)
        };
        let sub_color = biome.sub_surface.default_color();

        let mut voxels = Vec::with_capacity((terrain.sea_level.max(top) - floor + 1) as usize);
        for y in floor..=top {
            let (material, color) = if y == floor {
                (Material::Bedrock, Material::Bedrock.default_color())
            } else if y == top {
                (surface, surface_color)
            } else {
                (biome.sub_surface, sub_color)
            };
            voxels.push(ColumnVoxel { y, material, color });
        }

        let water_level = (top < terrain.sea_level).then_some(terrain.sea_level);
        for y in top + 1..=terrain.sea_level {
            voxels.push(ColumnVoxel {
                y,
                material: Material::Water,
                color: Material::Water.default_color(),
            });
        }

        ColumnStack {
            world_x,
            world_z,
            surface_height: top,
            water_level,
            biome,
            voxels,
        }
    }

    /// Height-interpolated biome colour with micro-detail jitter.
    fn surface_color(&self, world_x: i32, world_z: i32, biome: &BiomeDescriptor, top: i32) -> Rgb {
        let relative = f64::from(top - self.terrain.ground_datum);
        let t = (relative - biome.min_height) / (biome.max_height - biome.min_height);
        let (low, high) = biome.height_color_range;
        let detail = self.detail_noise.sample(
            f64::from(world_x),
            f64::from(world_z),
            &self.noise.micro_detail,
        );
        low.lerp(high, t).shade((detail * MICRO_SHADE).round() as i16)
    }
}

#[inline]
fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}
