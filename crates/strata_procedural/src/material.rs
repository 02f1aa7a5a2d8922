//! # Materials
//!
//! The single material-id table shared by the generator, the chunk store
//! serializer and the mesher. Ids are part of the on-disk format: never
//! renumber a variant, only append.

use std::fmt;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Reserved id marking a removed voxel in the modification overlay.
///
/// Never a material; [`Material::from_id`] rejects it.
pub const TOMBSTONE_ID: u8 = 0xFF;

/// Voxel materials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Material {
    /// Grass-topped soil.
    Grass = 1,
    /// Plain soil.
    Dirt = 2,
    /// Rock.
    Stone = 3,
    /// Beach and desert sand.
    Sand = 4,
    /// Snow cover.
    Snow = 5,
    /// Still water.
    Water = 6,
    /// Permanent unbreakable floor.
    Bedrock = 7,
    /// Tree trunk.
    Wood = 8,
    /// Tree canopy.
    Leaves = 9,
    /// Desert cactus.
    Cactus = 10,
    /// Loose stone.
    Gravel = 11,
    /// Swamp mud.
    Mud = 12,
    /// Frozen ground.
    Ice = 13,
}

impl Material {
    /// Every material, in id order.
    pub const ALL: [Self; 13] = [
        Self::Grass,
        Self::Dirt,
        Self::Stone,
        Self::Sand,
        Self::Snow,
        Self::Water,
        Self::Bedrock,
        Self::Wood,
        Self::Leaves,
        Self::Cactus,
        Self::Gravel,
        Self::Mud,
        Self::Ice,
    ];

    /// Returns the numeric id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Converts from a numeric id. Air (0), the tombstone and unknown ids
    /// return `None`.
    #[must_use]
    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Grass),
            2 => Some(Self::Dirt),
            3 => Some(Self::Stone),
            4 => Some(Self::Sand),
            5 => Some(Self::Snow),
            6 => Some(Self::Water),
            7 => Some(Self::Bedrock),
            8 => Some(Self::Wood),
            9 => Some(Self::Leaves),
            10 => Some(Self::Cactus),
            11 => Some(Self::Gravel),
            12 => Some(Self::Mud),
            13 => Some(Self::Ice),
            _ => None,
        }
    }

    /// Returns the canonical lower-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Grass => "grass",
            Self::Dirt => "dirt",
            Self::Stone => "stone",
            Self::Sand => "sand",
            Self::Snow => "snow",
            Self::Water => "water",
            Self::Bedrock => "bedrock",
            Self::Wood => "wood",
            Self::Leaves => "leaves",
            Self::Cactus => "cactus",
            Self::Gravel => "gravel",
            Self::Mud => "mud",
            Self::Ice => "ice",
        }
    }

    /// Looks a material up by its canonical name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Untinted colour used when nothing else picks one.
    #[must_use]
    pub const fn default_color(self) -> Rgb {
        match self {
            Self::Grass => Rgb::new(0x5B, 0x9E, 0x3C),
            Self::Dirt => Rgb::new(0x7A, 0x55, 0x35),
            Self::Stone => Rgb::new(0x80, 0x80, 0x84),
            Self::Sand => Rgb::new(0xDB, 0xC8, 0x8E),
            Self::Snow => Rgb::new(0xF4, 0xF7, 0xFA),
            Self::Water => Rgb::new(0x2E, 0x6C, 0xC4),
            Self::Bedrock => Rgb::new(0x2A, 0x2A, 0x2E),
            Self::Wood => Rgb::new(0x6B, 0x4A, 0x2B),
            Self::Leaves => Rgb::new(0x3A, 0x7D, 0x2C),
            Self::Cactus => Rgb::new(0x4F, 0x8A, 0x3B),
            Self::Gravel => Rgb::new(0x95, 0x8E, 0x88),
            Self::Mud => Rgb::new(0x4E, 0x3F, 0x2E),
            Self::Ice => Rgb::new(0xA8, 0xD8, 0xF0),
        }
    }

    /// Players cannot remove this material.
    #[inline]
    #[must_use]
    pub const fn is_unbreakable(self) -> bool {
        matches!(self, Self::Bedrock)
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Packed `0xRRGGBB` colour.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct Rgb(pub u32);

impl Rgb {
    /// Packs three channels.
    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Red channel.
    #[inline]
    #[must_use]
    pub const fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// Green channel.
    #[inline]
    #[must_use]
    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Blue channel.
    #[inline]
    #[must_use]
    pub const fn b(self) -> u8 {
        self.0 as u8
    }

    /// Normalized (0-1) components for vertex colours.
    #[must_use]
    pub fn to_unit(self) -> [f32; 3] {
        [
            f32::from(self.r()) / 255.0,
            f32::from(self.g()) / 255.0,
            f32::from(self.b()) / 255.0,
        ]
    }

    /// Linear interpolation, `t` clamped to [0, 1].
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let mix = |a: u8, b: u8| -> u8 {
            (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8
        };
        Self::new(
            mix(self.r(), other.r()),
            mix(self.g(), other.g()),
            mix(self.b(), other.b()),
        )
    }

    /// Brightens (positive) or darkens (negative) every channel by `amount`.
    #[must_use]
    pub fn shade(self, amount: i16) -> Self {
        let adjust = |c: u8| -> u8 { (i16::from(c) + amount).clamp(0, 255) as u8 };
        Self::new(adjust(self.r()), adjust(self.g()), adjust(self.b()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_mapping_is_bijective() {
        for material in Material::ALL {
            assert_eq!(Material::from_id(material.id()), Some(material));
            assert_eq!(Material::from_name(material.name()), Some(material));
        }
        assert_eq!(Material::from_id(0), None);
        assert_eq!(Material::from_id(TOMBSTONE_ID), None);
        assert_eq!(Material::from_name("lava"), None);
    }

    #[test]
    fn test_rgb_channels() {
        let c = Rgb::new(0x12, 0x34, 0x56);
        assert_eq!(c.0, 0x0012_3456);
        assert_eq!((c.r(), c.g(), c.b()), (0x12, 0x34, 0x56));
        assert_eq!(Rgb::new(255, 0, 0).to_unit(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_rgb_lerp_endpoints() {
        let a = Rgb::new(0, 0, 0);
        let b = Rgb::new(200, 100, 50);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.5), Rgb::new(100, 50, 25));
        assert_eq!(a.lerp(b, 7.0), b);
        assert_eq!(b.shade(100), Rgb::new(255, 200, 150));
    }
}
