//! # Biome Classification
//!
//! Determines terrain type from noise values.
//!
//! Uses a climate model based on:
//! - Temperature (latitude gradient plus a noise channel)
//! - Moisture (the primary biome noise channel)
//!
//! The climate pair picks a [`BiomeKind`] from a 3×3 table, a variant noise
//! sample picks one of the biome's [`VariantTransform`]s, and the region's
//! generator adds its relief. Every step builds a new descriptor and passes
//! it through [`BiomeDescriptor::validated`]; a descriptor that fails is
//! replaced by [`BiomeDescriptor::safe_default`].
//!
//! ## Regions
//!
//! The world is cut into square regions, each assigned a [`RegionGenerator`]
//! from the seed. Near a region edge the descriptor is blended with the one
//! the neighbouring region's generator would produce, so generator changes
//! never show up as a seam.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::config::{BiomeConfig, NoiseConfig};
use crate::error::{ProceduralError, ProceduralResult};
use crate::material::{Material, Rgb};
use crate::noise::{CellularNoise, NoiseField, SimplexNoise, WorldSeed};

/// Columns remembered by the descriptor cache before it is flushed.
const DESCRIPTOR_CACHE_CAPACITY: usize = 4096;

/// Biome types in the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum BiomeKind {
    /// Cold and dry: frozen flats.
    Tundra = 0,
    /// Cold, medium moisture: conifer forest.
    Taiga = 1,
    /// Cold and wet: high rocky ground.
    Alpine = 2,
    /// Temperate and dry: grassland.
    Plains = 3,
    /// Temperate, medium moisture: broadleaf forest.
    Forest = 4,
    /// Temperate and wet: wetland.
    Swamp = 5,
    /// Hot and dry: sand.
    Desert = 6,
    /// Hot, medium moisture: dry grassland.
    Savanna = 7,
    /// Hot and wet: dense jungle.
    LushForest = 8,
}

impl BiomeKind {
    /// Every biome, in id order.
    pub const ALL: [Self; 9] = [
        Self::Tundra,
        Self::Taiga,
        Self::Alpine,
        Self::Plains,
        Self::Forest,
        Self::Swamp,
        Self::Desert,
        Self::Savanna,
        Self::LushForest,
    ];

    /// Decision table over the climate bands.
    #[must_use]
    pub const fn from_climate(temperature: TemperatureBand, moisture: MoistureBand) -> Self {
        use MoistureBand::{Dry, Medium, Wet};
        use TemperatureBand::{Cold, Hot, Temperate};
        match (temperature, moisture) {
            (Cold, Dry) => Self::Tundra,
            (Cold, Medium) => Self::Taiga,
            (Cold, Wet) => Self::Alpine,
            (Temperate, Dry) => Self::Plains,
            (Temperate, Medium) => Self::Forest,
            (Temperate, Wet) => Self::Swamp,
            (Hot, Dry) => Self::Desert,
            (Hot, Medium) => Self::Savanna,
            (Hot, Wet) => Self::LushForest,
        }
    }

    /// Canonical lower-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tundra => "tundra",
            Self::Taiga => "taiga",
            Self::Alpine => "alpine",
            Self::Plains => "plains",
            Self::Forest => "forest",
            Self::Swamp => "swamp",
            Self::Desert => "desert",
            Self::Savanna => "savanna",
            Self::LushForest => "lush_forest",
        }
    }

    /// Returns whether the surface turns to snow above the snowline.
    #[must_use]
    pub const fn is_cold(self) -> bool {
        matches!(self, Self::Tundra | Self::Taiga | Self::Alpine)
    }

    /// The immutable template this biome's descriptors start from.
    #[must_use]
    pub const fn template(self) -> &'static BiomeTemplate {
        match self {
            Self::Tundra => &TUNDRA,
            Self::Taiga => &TAIGA,
            Self::Alpine => &ALPINE,
            Self::Plains => &PLAINS,
            Self::Forest => &FOREST,
            Self::Swamp => &SWAMP,
            Self::Desert => &DESERT,
            Self::Savanna => &SAVANNA,
            Self::LushForest => &LUSH_FOREST,
        }
    }
}

/// Temperature band of the climate table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemperatureBand {
    /// Below 0.38.
    Cold,
    /// 0.38 to 0.62.
    Temperate,
    /// Above 0.62.
    Hot,
}

impl TemperatureBand {
    /// Band for a temperature in [0, 1].
    #[must_use]
    pub fn from_value(value: f64) -> Self {
        if value < 0.38 {
            Self::Cold
        } else if value > 0.62 {
            Self::Hot
        } else {
            Self::Temperate
        }
    }
}

/// Moisture band of the climate table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoistureBand {
    /// Below 0.4.
    Dry,
    /// 0.4 to 0.6.
    Medium,
    /// Above 0.6.
    Wet,
}

impl MoistureBand {
    /// Band for a moisture value in [0, 1].
    #[must_use]
    pub fn from_value(value: f64) -> Self {
        if value < 0.4 {
            Self::Dry
        } else if value > 0.6 {
            Self::Wet
        } else {
            Self::Medium
        }
    }
}

/// Climate scalars at one column, both in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Climate {
    /// 0 = coldest, 1 = hottest.
    pub temperature: f64,
    /// 0 = driest, 1 = wettest.
    pub moisture: f64,
}

/// Noise generator family assigned to a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegionGenerator {
    /// Smooth sinusoidal relief.
    Rolling,
    /// Ridged simplex: sharp crests raise the height ceiling.
    Ridged,
    /// Cellular: basins between cells lower the height floor.
    Cellular,
}

impl RegionGenerator {
    /// Picks a generator from a region hash.
    #[must_use]
    pub const fn from_hash(hash: u64) -> Self {
        match hash % 3 {
            0 => Self::Rolling,
            1 => Self::Ridged,
            _ => Self::Cellular,
        }
    }
}

/// A pure descriptor tweak selected by the variant noise.
///
/// Heights are scaled around the range midpoint, then shifted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VariantTransform {
    /// Variant name.
    pub name: &'static str,
    /// Multiplier on vegetation density.
    pub density_scale: f64,
    /// Added to vegetation density after scaling.
    pub density_bias: f64,
    /// Multiplier on the height range's half-width.
    pub height_scale: f64,
    /// Added to both height bounds.
    pub height_bias: f64,
}

impl VariantTransform {
    /// Creates a transform.
    #[must_use]
    pub const fn new(
        name: &'static str,
        density_scale: f64,
        density_bias: f64,
        height_scale: f64,
        height_bias: f64,
    ) -> Self {
        Self {
            name,
            density_scale,
            density_bias,
            height_scale,
            height_bias,
        }
    }

    /// Builds a new descriptor from `base`; `base` is untouched.
    #[must_use]
    pub fn apply(&self, base: &BiomeDescriptor) -> BiomeDescriptor {
        let mid = (base.min_height + base.max_height) * 0.5;
        let half = (base.max_height - base.min_height) * 0.5 * self.height_scale;
        BiomeDescriptor {
            min_height: mid - half + self.height_bias,
            max_height: mid + half + self.height_bias,
            vegetation_density: (base.vegetation_density * self.density_scale
                + self.density_bias)
                .clamp(0.0, 1.0),
            variant: self.name,
            ..*base
        }
    }
}

/// Static per-biome data.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiomeTemplate {
    /// Which biome.
    pub kind: BiomeKind,
    /// Lower height bound (relative to the ground datum).
    pub min_height: f64,
    /// Upper height bound (relative to the ground datum).
    pub max_height: f64,
    /// Top voxel material.
    pub surface: Material,
    /// Material of the layers under the surface.
    pub sub_surface: Material,
    /// Surface colour at `min_height` and at `max_height`.
    pub height_color_range: (Rgb, Rgb),
    /// Feature density in [0, 1].
    pub vegetation_density: f64,
    /// Selectable variants (at least one).
    pub variants: &'static [VariantTransform],
}

impl BiomeTemplate {
    /// Descriptor straight from the template, before any variant.
    #[must_use]
    pub const fn descriptor(&self, generator: RegionGenerator) -> BiomeDescriptor {
        BiomeDescriptor {
            name: self.kind.name(),
            kind: self.kind,
            min_height: self.min_height,
            max_height: self.max_height,
            surface: self.surface,
            sub_surface: self.sub_surface,
            height_color_range: self.height_color_range,
            vegetation_density: self.vegetation_density,
            variant: "base",
            snow_capable: self.kind.is_cold(),
            generator,
            is_transition: false,
            blend_factor: 0.0,
        }
    }
}

const TUNDRA: BiomeTemplate = BiomeTemplate {
    kind: BiomeKind::Tundra,
    min_height: 0.0,
    max_height: 3.0,
    surface: Material::Gravel,
    sub_surface: Material::Dirt,
    height_color_range: (Rgb::new(0x8A, 0x8C, 0x80), Rgb::new(0xB8, 0xBC, 0xB0)),
    vegetation_density: 0.05,
    variants: &[
        VariantTransform::new("barren_tundra", 0.5, 0.0, 0.8, 0.0),
        VariantTransform::new("frozen_marsh", 1.0, 0.0, 0.6, -1.0),
        VariantTransform::new("rocky_tundra", 1.0, 0.02, 1.2, 0.5),
    ],
};

const TAIGA: BiomeTemplate = BiomeTemplate {
    kind: BiomeKind::Taiga,
    min_height: 1.0,
    max_height: 5.0,
    surface: Material::Grass,
    sub_surface: Material::Dirt,
    height_color_range: (Rgb::new(0x3E, 0x6B, 0x3A), Rgb::new(0x5C, 0x7F, 0x55)),
    vegetation_density: 0.5,
    variants: &[
        VariantTransform::new("dense_taiga", 1.3, 0.0, 1.0, 0.0),
        VariantTransform::new("snowy_taiga", 0.8, 0.0, 1.1, 1.0),
    ],
};

const ALPINE: BiomeTemplate = BiomeTemplate {
    kind: BiomeKind::Alpine,
    min_height: 3.0,
    max_height: 10.0,
    surface: Material::Stone,
    sub_surface: Material::Stone,
    height_color_range: (Rgb::new(0x6E, 0x6E, 0x72), Rgb::new(0xA0, 0xA0, 0xA6)),
    vegetation_density: 0.05,
    variants: &[
        VariantTransform::new("jagged_peaks", 0.5, 0.0, 1.4, 0.5),
        VariantTransform::new("alpine_meadow", 2.0, 0.05, 0.7, -1.5),
    ],
};

const PLAINS: BiomeTemplate = BiomeTemplate {
    kind: BiomeKind::Plains,
    min_height: 0.0,
    max_height: 3.0,
    surface: Material::Grass,
    sub_surface: Material::Dirt,
    height_color_range: (Rgb::new(0x6A, 0xA8, 0x45), Rgb::new(0x8C, 0xBF, 0x5A)),
    vegetation_density: 0.1,
    variants: &[
        VariantTransform::new("flat_plains", 1.0, 0.0, 0.5, 0.0),
        VariantTransform::new("flower_plains", 1.5, 0.02, 1.0, 0.0),
        VariantTransform::new("rolling_hills", 0.8, 0.0, 1.5, 0.5),
    ],
};

const FOREST: BiomeTemplate = BiomeTemplate {
    kind: BiomeKind::Forest,
    min_height: 1.0,
    max_height: 5.0,
    surface: Material::Grass,
    sub_surface: Material::Dirt,
    height_color_range: (Rgb::new(0x4A, 0x8A, 0x35), Rgb::new(0x5E, 0x9C, 0x44)),
    vegetation_density: 0.6,
    variants: &[
        VariantTransform::new("dense_forest", 1.4, 0.0, 1.0, 0.0),
        VariantTransform::new("sparse_forest", 0.5, 0.0, 0.9, 0.0),
        VariantTransform::new("birch_forest", 0.9, 0.0, 1.1, 0.5),
    ],
};

const SWAMP: BiomeTemplate = BiomeTemplate {
    kind: BiomeKind::Swamp,
    min_height: -2.0,
    max_height: 1.0,
    surface: Material::Mud,
    sub_surface: Material::Dirt,
    height_color_range: (Rgb::new(0x4B, 0x5A, 0x33), Rgb::new(0x5F, 0x6E, 0x3D)),
    vegetation_density: 0.35,
    variants: &[
        VariantTransform::new("mangrove", 1.4, 0.0, 1.0, 0.0),
        VariantTransform::new("bog", 0.6, 0.0, 0.6, -0.5),
    ],
};

const DESERT: BiomeTemplate = BiomeTemplate {
    kind: BiomeKind::Desert,
    min_height: 0.0,
    max_height: 3.0,
    surface: Material::Sand,
    sub_surface: Material::Sand,
    height_color_range: (Rgb::new(0xD2, 0xBA, 0x7E), Rgb::new(0xE8, 0xD4, 0x9A)),
    vegetation_density: 0.03,
    variants: &[
        VariantTransform::new("dunes", 1.0, 0.0, 1.6, 0.5),
        VariantTransform::new("salt_flats", 0.3, 0.0, 0.3, 0.0),
    ],
};

const SAVANNA: BiomeTemplate = BiomeTemplate {
    kind: BiomeKind::Savanna,
    min_height: 0.0,
    max_height: 4.0,
    surface: Material::Grass,
    sub_surface: Material::Dirt,
    height_color_range: (Rgb::new(0x9A, 0x9A, 0x48), Rgb::new(0xB4, 0xA8, 0x5A)),
    vegetation_density: 0.12,
    variants: &[
        VariantTransform::new("open_savanna", 0.7, 0.0, 0.8, 0.0),
        VariantTransform::new("savanna_plateau", 1.0, 0.0, 0.7, 2.0),
    ],
};

const LUSH_FOREST: BiomeTemplate = BiomeTemplate {
    kind: BiomeKind::LushForest,
    min_height: 1.0,
    max_height: 6.0,
    surface: Material::Grass,
    sub_surface: Material::Mud,
    height_color_range: (Rgb::new(0x2F, 0x8A, 0x2A), Rgb::new(0x45, 0xA0, 0x35)),
    vegetation_density: 0.8,
    variants: &[
        VariantTransform::new("jungle", 1.2, 0.0, 1.0, 0.0),
        VariantTransform::new("bamboo_grove", 1.0, 0.05, 0.8, -0.5),
        VariantTransform::new("jungle_edge", 0.6, 0.0, 1.0, 0.0),
    ],
};

/// Classification result for one column.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiomeDescriptor {
    /// Biome name.
    pub name: &'static str,
    /// Biome kind.
    pub kind: BiomeKind,
    /// Lower height bound (relative to the ground datum).
    pub min_height: f64,
    /// Upper height bound (relative to the ground datum).
    pub max_height: f64,
    /// Top voxel material.
    pub surface: Material,
    /// Material of the layers under the surface.
    pub sub_surface: Material,
    /// Surface colour at `min_height` and at `max_height`.
    pub height_color_range: (Rgb, Rgb),
    /// Feature density in [0, 1].
    pub vegetation_density: f64,
    /// Applied variant name (`"base"` or `"default"` when none).
    pub variant: &'static str,
    /// Surface turns to snow above the snowline.
    pub snow_capable: bool,
    /// Generator of the region this column belongs to.
    pub generator: RegionGenerator,
    /// Blended with a neighbouring region's descriptor.
    pub is_transition: bool,
    /// Weight of the neighbouring descriptor, 0 when not a transition.
    pub blend_factor: f64,
}

impl BiomeDescriptor {
    /// Clamps the height bounds into the global band and checks the range.
    ///
    /// # Errors
    ///
    /// Returns [`ProceduralError::InvalidBiomeDescriptor`] if either bound is
    /// not a number or the range is empty after clamping.
    pub fn validated(self, band: &BiomeConfig) -> ProceduralResult<Self> {
        let invalid = || ProceduralError::InvalidBiomeDescriptor {
            name: self.name.to_string(),
            min_height: self.min_height,
            max_height: self.max_height,
        };
        if !(self.min_height.is_finite() && self.max_height.is_finite()) {
            return Err(invalid());
        }

        let min_height = self.min_height.clamp(band.height_floor, band.height_ceiling);
        let max_height = self.max_height.clamp(band.height_floor, band.height_ceiling);
        if min_height >= max_height {
            return Err(invalid());
        }

        Ok(Self {
            min_height,
            max_height,
            vegetation_density: if self.vegetation_density.is_finite() {
                self.vegetation_density.clamp(0.0, 1.0)
            } else {
                0.0
            },
            ..self
        })
    }

    /// Hardcoded fallback: plains over the lower half of the band.
    #[must_use]
    pub fn safe_default(band: &BiomeConfig, generator: RegionGenerator) -> Self {
        let span = band.height_ceiling - band.height_floor;
        Self {
            min_height: band.height_floor + span * 0.25,
            max_height: band.height_floor + span * 0.5,
            variant: "default",
            ..PLAINS.descriptor(generator)
        }
    }

    /// Linear blend toward `other` by weight `t`.
    ///
    /// Numbers interpolate; materials, names and flags come from whichever
    /// side has the larger weight.
    #[must_use]
    pub fn blend(&self, other: &Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let lerp = |a: f64, b: f64| a + (b - a) * t;
        let dominant = if t < 0.5 { self } else { other };
        Self {
            min_height: lerp(self.min_height, other.min_height),
            max_height: lerp(self.max_height, other.max_height),
            height_color_range: (
                self.height_color_range.0.lerp(other.height_color_range.0, t),
                self.height_color_range.1.lerp(other.height_color_range.1, t),
            ),
            vegetation_density: lerp(self.vegetation_density, other.vegetation_density),
            is_transition: true,
            blend_factor: t,
            ..*dominant
        }
    }
}

/// Biome classifier that determines biome descriptors from world coordinates.
///
/// Uses multiple noise channels to simulate climate. Classification is a
/// pure function of seed, settings and coordinates; the internal cache only
/// memoizes it.
pub struct BiomeClassifier {
    /// Temperature noise
    temperature_noise: NoiseField,
    /// Moisture noise
    moisture_noise: NoiseField,
    /// Variant selection noise
    variant_noise: NoiseField,
    /// Relief for rolling regions
    rolling_noise: NoiseField,
    /// Relief for ridged regions
    ridged_noise: SimplexNoise,
    /// Relief for cellular regions
    cellular_noise: CellularNoise,
    region_seed: WorldSeed,
    noise: NoiseConfig,
    config: BiomeConfig,
    cache: Mutex<HashMap<(i32, i32), BiomeDescriptor>>,
}

impl BiomeClassifier {
    /// Creates a classifier from a world seed and settings.
    #[must_use]
    pub fn new(seed: WorldSeed, noise: NoiseConfig, config: BiomeConfig) -> Self {
        Self {
            temperature_noise: NoiseField::new(seed.derive(1)),
            moisture_noise: NoiseField::new(seed.derive(2)),
            variant_noise: NoiseField::new(seed.derive(3)),
            rolling_noise: NoiseField::new(seed.derive(4)),
            ridged_noise: SimplexNoise::new(seed.derive(5)),
            cellular_noise: CellularNoise::new(seed.derive(6)),
            region_seed: seed.derive(7),
            noise,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the global height band settings.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &BiomeConfig {
        &self.config
    }

    /// Classifies the biome at a world column.
    #[must_use]
    pub fn classify(&self, x: i32, z: i32) -> BiomeDescriptor {
        if let Some(cached) = self.cache.lock().get(&(x, z)) {
            return *cached;
        }

        let descriptor = self.classify_uncached(x, z);

        let mut cache = self.cache.lock();
        if cache.len() >= DESCRIPTOR_CACHE_CAPACITY {
            cache.clear();
        }
        cache.insert((x, z), descriptor);
        descriptor
    }

    /// Drops memoized descriptors.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Temperature and moisture at a column.
    #[must_use]
    pub fn climate(&self, x: i32, z: i32) -> Climate {
        let (fx, fz) = (f64::from(x), f64::from(z));

        // 1 at the equator (z = 0), 0 at +/- latitude_span, repeating.
        let latitude =
            (std::f64::consts::PI * fz / self.config.latitude_span).cos() * 0.5 + 0.5;
        let noise = self
            .temperature_noise
            .sample_unit(fx, fz, &self.noise.temperature);
        let weight = self.config.latitude_weight;

        Climate {
            temperature: (latitude * weight + noise * (1.0 - weight)).clamp(0.0, 1.0),
            moisture: self
                .moisture_noise
                .sample_unit(fx, fz, &self.noise.primary_biome),
        }
    }

    /// Generator assigned to the region containing a column.
    #[must_use]
    pub fn generator_at(&self, x: i32, z: i32) -> RegionGenerator {
        self.region_generator(self.region_of(x, z))
    }

    fn classify_uncached(&self, x: i32, z: i32) -> BiomeDescriptor {
        let own_region = self.region_of(x, z);
        let own_generator = self.region_generator(own_region);
        let own = self.classify_with(own_generator, x, z);

        let Some((neighbour_region, weight)) = self.nearest_edge(x, z) else {
            return own;
        };
        let neighbour_generator = self.region_generator(neighbour_region);
        if neighbour_generator == own_generator {
            return own;
        }

        let neighbour = self.classify_with(neighbour_generator, x, z);
        self.repair(own.blend(&neighbour, weight))
    }

    /// Full classification under one generator, no blending.
    fn classify_with(&self, generator: RegionGenerator, x: i32, z: i32) -> BiomeDescriptor {
        let climate = self.climate(x, z);
        let kind = BiomeKind::from_climate(
            TemperatureBand::from_value(climate.temperature),
            MoistureBand::from_value(climate.moisture),
        );
        let template = kind.template();
        let base = self.repair(template.descriptor(generator));

        let pick = self
            .variant_noise
            .sample_unit(f64::from(x), f64::from(z), &self.noise.variant);
        let index = ((pick * template.variants.len() as f64) as usize)
            .min(template.variants.len().saturating_sub(1));
        let varied = match template.variants.get(index) {
            Some(variant) => self.repair(variant.apply(&base)),
            None => base,
        };

        self.repair(self.apply_relief(generator, varied, x, z))
    }

    /// Generator-specific relief on the height range.
    fn apply_relief(
        &self,
        generator: RegionGenerator,
        descriptor: BiomeDescriptor,
        x: i32,
        z: i32,
    ) -> BiomeDescriptor {
        let (fx, fz) = (f64::from(x), f64::from(z));
        let params = &self.noise.region;
        match generator {
            RegionGenerator::Rolling => {
                let relief = self.rolling_noise.sample_unit(fx, fz, params);
                BiomeDescriptor {
                    max_height: descriptor.max_height + (relief - 0.5),
                    ..descriptor
                }
            }
            RegionGenerator::Ridged => {
                let relief = self.ridged_noise.ridged(fx, fz, params);
                BiomeDescriptor {
                    max_height: descriptor.max_height + relief * 3.0,
                    ..descriptor
                }
            }
            RegionGenerator::Cellular => {
                let relief = (self.cellular_noise.sample(fx, fz, params) + 1.0) * 0.5;
                BiomeDescriptor {
                    min_height: descriptor.min_height - (1.0 - relief) * 2.0,
                    ..descriptor
                }
            }
        }
    }

    /// Validates, falling back to the safe default on failure.
    fn repair(&self, descriptor: BiomeDescriptor) -> BiomeDescriptor {
        match descriptor.validated(&self.config) {
            Ok(valid) => valid,
            Err(err) => {
                tracing::error!(%err, "biome descriptor rejected, using safe default");
                BiomeDescriptor::safe_default(&self.config, descriptor.generator)
            }
        }
    }

    fn region_of(&self, x: i32, z: i32) -> (i32, i32) {
        (
            x.div_euclid(self.config.region_size),
            z.div_euclid(self.config.region_size),
        )
    }

    fn region_generator(&self, (rx, rz): (i32, i32)) -> RegionGenerator {
        RegionGenerator::from_hash(self.region_seed.hash2(i64::from(rx), i64::from(rz)))
    }

    /// Closest region edge within the blend band: the region across it and
    /// that region's blend weight (0.5 at the edge, falling to 0 at the band's
    /// inner limit).
    fn nearest_edge(&self, x: i32, z: i32) -> Option<((i32, i32), f64)> {
        let width = self.config.blend_width;
        if width == 0 {
            return None;
        }
        let size = self.config.region_size;
        let (rx, rz) = self.region_of(x, z);
        let (lx, lz) = (x.rem_euclid(size), z.rem_euclid(size));

        let along = |local: i32| -> Option<(i32, i32)> {
            if local < width {
                Some((local, -1))
            } else if local >= size - width {
                Some((size - 1 - local, 1))
            } else {
                None
            }
        };

        let candidate_x = along(lx).map(|(dist, step)| (dist, (rx + step, rz)));
        let candidate_z = along(lz).map(|(dist, step)| (dist, (rx, rz + step)));
        let (dist, region) = match (candidate_x, candidate_z) {
            (Some(a), Some(b)) => {
                if b.0 < a.0 {
                    b
                } else {
                    a
                }
            }
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => return None,
        };

        let weight = 0.5 * (1.0 - (f64::from(dist) + 0.5) / f64::from(width));
        Some((region, weight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(seed: u64) -> BiomeClassifier {
        BiomeClassifier::new(
            WorldSeed::new(seed),
            NoiseConfig::default(),
            BiomeConfig::default(),
        )
    }

    #[test]
    fn test_decision_table_corners() {
        use MoistureBand::{Dry, Wet};
        use TemperatureBand::{Cold, Hot};
        assert_eq!(BiomeKind::from_climate(Cold, Dry), BiomeKind::Tundra);
        assert_eq!(BiomeKind::from_climate(Hot, Wet), BiomeKind::LushForest);
        assert_eq!(BiomeKind::from_climate(Hot, Dry), BiomeKind::Desert);
        assert_eq!(TemperatureBand::from_value(0.1), Cold);
        assert_eq!(MoistureBand::from_value(0.9), Wet);
    }

    #[test]
    fn test_classify_deterministic() {
        let a = classifier(42);
        let b = classifier(42);

        for i in -50..50 {
            let (x, z) = (i * 37, i * -23);
            assert_eq!(a.classify(x, z), b.classify(x, z));
        }
        // Cached and uncached answers agree.
        a.clear_cache();
        assert_eq!(a.classify(5, 5), b.classify(5, 5));
    }

    #[test]
    fn test_height_invariant_holds_everywhere() {
        let c = classifier(7);
        let band = BiomeConfig::default();

        for x in (-2000..2000).step_by(23) {
            for z in (-2000..2000).step_by(29) {
                let d = c.classify(x, z);
                assert!(d.min_height < d.max_height, "{d:?} at ({x}, {z})");
                assert!(d.min_height >= band.height_floor && d.max_height <= band.height_ceiling);
                assert!((0.0..=1.0).contains(&d.vegetation_density));
            }
        }
    }

    #[test]
    fn test_variants_never_mutate_templates() {
        let before = *FOREST.variants.first().unwrap();
        let base = FOREST.descriptor(RegionGenerator::Rolling);
        let mut descriptor = base;
        for _ in 0..10 {
            descriptor = FOREST.variants[1].apply(&descriptor);
        }
        assert_eq!(FOREST.min_height, 1.0);
        assert_eq!(FOREST.max_height, 5.0);
        assert_eq!(*FOREST.variants.first().unwrap(), before);
        assert_eq!(FOREST.descriptor(RegionGenerator::Rolling), base);
    }

    #[test]
    fn test_inverting_variant_is_repaired() {
        let c = classifier(1);
        let inverting = VariantTransform::new("inverted", 1.0, 0.0, -1.0, 0.0);
        let broken = inverting.apply(&PLAINS.descriptor(RegionGenerator::Rolling));
        assert!(broken.min_height > broken.max_height);
        assert!(matches!(
            broken.validated(c.config()),
            Err(ProceduralError::InvalidBiomeDescriptor { .. })
        ));

        let repaired = c.repair(broken);
        assert_eq!(repaired.variant, "default");
        assert!(repaired.min_height < repaired.max_height);
    }

    #[test]
    fn test_out_of_band_bounds_are_clamped() {
        let band = BiomeConfig::default();
        let wild = BiomeDescriptor {
            min_height: -40.0,
            max_height: 90.0,
            ..ALPINE.descriptor(RegionGenerator::Ridged)
        };
        let clamped = wild.validated(&band).unwrap();
        assert_eq!(clamped.min_height, band.height_floor);
        assert_eq!(clamped.max_height, band.height_ceiling);

        let nan = BiomeDescriptor {
            max_height: f64::NAN,
            ..wild
        };
        assert!(nan.validated(&band).is_err());
    }

    #[test]
    fn test_blend_interpolates() {
        let a = PLAINS.descriptor(RegionGenerator::Rolling);
        let b = ALPINE.descriptor(RegionGenerator::Ridged);
        let mid = a.blend(&b, 0.25);

        assert!(mid.is_transition);
        assert_eq!(mid.blend_factor, 0.25);
        assert_eq!(mid.kind, BiomeKind::Plains);
        assert!((mid.max_height - 4.75).abs() < 1e-9);
        assert_eq!(a.blend(&b, 0.75).kind, BiomeKind::Alpine);
    }

    #[test]
    fn test_region_edges_are_blended() {
        let c = classifier(3);
        let size = c.config().region_size;

        // Find a region boundary where the generator changes.
        let boundary = (-20..20)
            .map(|r| r * size)
            .find(|&x| c.generator_at(x - 1, size / 2) != c.generator_at(x, size / 2))
            .expect("some neighbouring regions differ");

        let left = c.classify(boundary - 1, size / 2);
        let right = c.classify(boundary, size / 2);
        assert!(left.is_transition && right.is_transition);
        assert!(left.blend_factor > 0.4 && right.blend_factor > 0.4);

        // Region interiors are never transitions.
        let interior = c.classify(boundary + size / 2, size / 2);
        assert!(!interior.is_transition);
        assert_eq!(interior.blend_factor, 0.0);
    }
}
