use crate::foundation::error::{BltError, BltResult, ErrorCode};
use crate::mode::scale::ModeVendor;
use crate::mode::{ImageType, bits, lookup, reverse};

const VENDOR_SHIFT: u32 = 24;
const TYPE_SHIFT: u32 = 16;
const TECHNIQUE_SHIFT: u32 = 8;
const IMPLICIT_RESERVED: u32 = 0x00FC_0000;
const GENERIC: u32 = 0xFF << VENDOR_SHIFT;

/// Packed dither-mode word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DitherMode(pub u32);

/// Technique hint of an implicit dither request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DitherTechnique {
    /// Dither or not, engine's choice.
    DontCare,
    /// Random noise.
    Random,
    /// Ordered matrix.
    Ordered,
    /// Error diffusion.
    Diffused,
    /// Some dithering, any technique.
    On,
}

impl DitherTechnique {
    const TABLE: [(u32, DitherTechnique); 5] = [
        (0x00, DitherTechnique::DontCare),
        (0x01, DitherTechnique::Random),
        (0x02, DitherTechnique::Ordered),
        (0x04, DitherTechnique::Diffused),
        (0xFF, DitherTechnique::On),
    ];
}

/// Explicit ordered-dither selections of the generic namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DitherMatrix {
    /// No dithering.
    None,
    /// 2×2 Bayer matrix.
    Ordered2x2,
    /// 4×4 Bayer matrix.
    Ordered4x4,
    /// 2×2 for 6-bit channels, 4×4 for 5-bit channels.
    Ordered2x2And4x4,
}

impl DitherMatrix {
    const TABLE: [(u32, DitherMatrix); 4] = [
        (0, DitherMatrix::None),
        (4, DitherMatrix::Ordered2x2),
        (16, DitherMatrix::Ordered4x4),
        (20, DitherMatrix::Ordered2x2And4x4),
    ];
}

/// Decoded dither mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum DitherDesc {
    /// Hints the engine maps onto a technique.
    Implicit {
        /// Content hint.
        image_type: ImageType,
        /// Technique hint.
        technique: DitherTechnique,
        /// Quality 0..=255.
        quality: u8,
    },
    /// A concrete matrix.
    Explicit {
        /// Selected matrix.
        matrix: DitherMatrix,
    },
}

/// Concrete dithering chosen for an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedDither {
    /// No dithering.
    None,
    /// Random noise.
    Random,
    /// Error diffusion.
    Diffused,
    /// Ordered matrix.
    Ordered(DitherMatrix),
}

impl ResolvedDither {
    /// Dither word naming exactly this technique.
    pub fn mode(self) -> DitherMode {
        let desc = match self {
            Self::None => DitherDesc::Explicit {
                matrix: DitherMatrix::None,
            },
            Self::Ordered(matrix) => DitherDesc::Explicit { matrix },
            Self::Random => DitherDesc::Implicit {
                image_type: ImageType::Unknown,
                technique: DitherTechnique::Random,
                quality: DitherDesc::QUALITY_FASTEST,
            },
            Self::Diffused => DitherDesc::Implicit {
                image_type: ImageType::Unknown,
                technique: DitherTechnique::Diffused,
                quality: DitherDesc::QUALITY_FASTEST,
            },
        };
        desc.encode()
    }
}

const fn implicit(quality: u32, technique: u32, image_type: u32) -> DitherMode {
    DitherMode((image_type << TYPE_SHIFT) | (technique << TECHNIQUE_SHIFT) | quality)
}

impl DitherMode {
    /// Fastest, dither optional.
    pub const FASTEST: Self = implicit(0x00, 0x00, 0);
    /// Fastest, dither on.
    pub const FASTEST_ON: Self = implicit(0x00, 0xFF, 0);
    /// Fastest random.
    pub const FASTEST_RANDOM: Self = implicit(0x00, 0x01, 0);
    /// Fastest ordered.
    pub const FASTEST_ORDERED: Self = implicit(0x00, 0x02, 0);
    /// Fastest diffused.
    pub const FASTEST_DIFFUSED: Self = implicit(0x00, 0x04, 0);
    /// Fastest, photographic content.
    pub const FASTEST_PHOTO: Self = implicit(0x00, 0x00, 1);
    /// Fastest, drawn content.
    pub const FASTEST_DRAWING: Self = implicit(0x00, 0x00, 2);
    /// Good, dither on.
    pub const GOOD: Self = implicit(0x55, 0xFF, 0);
    /// Good random.
    pub const GOOD_RANDOM: Self = implicit(0x55, 0x01, 0);
    /// Good ordered.
    pub const GOOD_ORDERED: Self = implicit(0x55, 0x02, 0);
    /// Good diffused.
    pub const GOOD_DIFFUSED: Self = implicit(0x55, 0x04, 0);
    /// Good, photographic content.
    pub const GOOD_PHOTO: Self = implicit(0x55, 0x00, 1);
    /// Good, drawn content.
    pub const GOOD_DRAWING: Self = implicit(0x55, 0x00, 2);
    /// Better, dither on.
    pub const BETTER: Self = implicit(0xAA, 0xFF, 0);
    /// Better random.
    pub const BETTER_RANDOM: Self = implicit(0xAA, 0x01, 0);
    /// Better ordered.
    pub const BETTER_ORDERED: Self = implicit(0xAA, 0x02, 0);
    /// Better diffused.
    pub const BETTER_DIFFUSED: Self = implicit(0xAA, 0x04, 0);
    /// Better, photographic content.
    pub const BETTER_PHOTO: Self = implicit(0xAA, 0x00, 1);
    /// Better, drawn content.
    pub const BETTER_DRAWING: Self = implicit(0xAA, 0x00, 2);
    /// Best, dither on.
    pub const BEST: Self = implicit(0xFF, 0xFF, 0);
    /// Best random.
    pub const BEST_RANDOM: Self = implicit(0xFF, 0x01, 0);
    /// Best ordered.
    pub const BEST_ORDERED: Self = implicit(0xFF, 0x02, 0);
    /// Best diffused.
    pub const BEST_DIFFUSED: Self = implicit(0xFF, 0x04, 0);
    /// Best, photographic content.
    pub const BEST_PHOTO: Self = implicit(0xFF, 0x00, 1);
    /// Best, drawn content.
    pub const BEST_DRAWING: Self = implicit(0xFF, 0x00, 2);

    /// No dithering.
    pub const NONE: Self = Self(GENERIC);
    /// 2×2 ordered.
    pub const ORDERED_2X2: Self = Self(GENERIC + 4);
    /// 4×4 ordered.
    pub const ORDERED_4X4: Self = Self(GENERIC + 16);
    /// 2×2 and 4×4 ordered.
    pub const ORDERED_2X2_4X4: Self = Self(GENERIC + 20);

    /// Decode the packed word. The vendor byte is inspected before any other field.
    pub fn decode(self) -> BltResult<DitherDesc> {
        let raw = self.0;
        match ModeVendor::from_byte(bits(raw, VENDOR_SHIFT, 8)) {
            Some(ModeVendor::All) => {
                if raw & IMPLICIT_RESERVED != 0 {
                    return Err(reject(raw, "reserved bits set"));
                }
                let image_type = ImageType::from_bits(bits(raw, TYPE_SHIFT, 2))
                    .ok_or_else(|| reject(raw, "unknown image type"))?;
                let technique = lookup(&DitherTechnique::TABLE, bits(raw, TECHNIQUE_SHIFT, 8))
                    .ok_or_else(|| reject(raw, "unknown technique"))?;
                Ok(DitherDesc::Implicit {
                    image_type,
                    technique,
                    quality: bits(raw, 0, 8) as u8,
                })
            }
            Some(ModeVendor::Generic) => {
                let matrix = lookup(&DitherMatrix::TABLE, bits(raw, 0, 24))
                    .ok_or_else(|| reject(raw, "unknown ordered matrix"))?;
                Ok(DitherDesc::Explicit { matrix })
            }
            None => Err(reject(raw, "unknown vendor")),
        }
    }
}

impl DitherDesc {
    /// Quality anchor: fastest.
    pub const QUALITY_FASTEST: u8 = 0x00;
    /// Quality anchor: good.
    pub const QUALITY_GOOD: u8 = 0x55;
    /// Quality anchor: better.
    pub const QUALITY_BETTER: u8 = 0xAA;
    /// Quality anchor: best.
    pub const QUALITY_BEST: u8 = 0xFF;

    /// Pack back into a dither word.
    pub fn encode(&self) -> DitherMode {
        match *self {
            Self::Implicit {
                image_type,
                technique,
                quality,
            } => DitherMode(
                (image_type.bits() << TYPE_SHIFT)
                    | (reverse(&DitherTechnique::TABLE, technique) << TECHNIQUE_SHIFT)
                    | u32::from(quality),
            ),
            Self::Explicit { matrix } => DitherMode(GENERIC | reverse(&DitherMatrix::TABLE, matrix)),
        }
    }

    /// Map hints onto a concrete technique.
    pub fn resolve(&self) -> ResolvedDither {
        match *self {
            Self::Explicit {
                matrix: DitherMatrix::None,
            } => ResolvedDither::None,
            Self::Explicit { matrix } => ResolvedDither::Ordered(matrix),
            Self::Implicit {
                technique, quality, ..
            } => match technique {
                DitherTechnique::DontCare if quality == Self::QUALITY_FASTEST => {
                    ResolvedDither::None
                }
                DitherTechnique::DontCare | DitherTechnique::On | DitherTechnique::Ordered => {
                    ResolvedDither::Ordered(DitherMatrix::Ordered4x4)
                }
                DitherTechnique::Random => ResolvedDither::Random,
                DitherTechnique::Diffused => ResolvedDither::Diffused,
            },
        }
    }
}

fn reject(raw: u32, why: &str) -> BltError {
    BltError::field(ErrorCode::DitherMode, format!("dither mode {raw:#010x}: {why}"))
}

#[cfg(test)]
#[path = "../../tests/unit/mode/dither.rs"]
mod tests;
