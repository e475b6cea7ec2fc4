use crate::foundation::error::{BltError, BltResult, ErrorCode};
use crate::mode::{ImageType, bits, lookup, reverse};

const VENDOR_SHIFT: u32 = 24;
const CLASS_SHIFT: u32 = 22;
const QUALITY_SHIFT: u32 = 16;
const TECHNIQUE_SHIFT: u32 = 8;
const HORZ_SHIFT: u32 = 8;

const IMPLICIT_RESERVED: u32 = 0x0000_F0FC;
const EXPLICIT_RESERVED: u32 = 0x003F_0000;

/// Packed scale-mode word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ScaleMode(pub u32);

/// Namespace selected by the top byte of a scale or dither word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeVendor {
    /// `0x00`, understood by every implementation.
    #[default]
    All,
    /// `0xFF`, generic explicit encodings.
    Generic,
}

impl ModeVendor {
    pub(crate) fn from_byte(byte: u32) -> Option<Self> {
        match byte {
            0x00 => Some(Self::All),
            0xFF => Some(Self::Generic),
            _ => None,
        }
    }

    pub(crate) fn byte(self) -> u32 {
        match self {
            Self::All => 0x00,
            Self::Generic => 0xFF,
        }
    }
}

/// Technique hint of an implicit scale request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleTechnique {
    /// Any technique.
    DontCare,
    /// Anything but nearest neighbor.
    NotNearestNeighbor,
    /// Point sampling.
    PointSample,
    /// Interpolation.
    Interpolated,
}

impl ScaleTechnique {
    const TABLE: [(u32, ScaleTechnique); 4] = [
        (0, ScaleTechnique::DontCare),
        (1, ScaleTechnique::NotNearestNeighbor),
        (2, ScaleTechnique::PointSample),
        (3, ScaleTechnique::Interpolated),
    ];
}

/// Concrete per-axis resampling kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleKernel {
    /// Nearest neighbor.
    NearestNeighbor,
    /// Linear interpolation.
    Linear,
    /// Cubic interpolation.
    Cubic,
    /// 3-tap filter.
    Tap3,
    /// 5-tap filter.
    Tap5,
    /// 7-tap filter.
    Tap7,
    /// 9-tap filter.
    Tap9,
}

impl ScaleKernel {
    const TABLE: [(u32, ScaleKernel); 7] = [
        (0x00, ScaleKernel::NearestNeighbor),
        (0x01, ScaleKernel::Linear),
        (0x02, ScaleKernel::Cubic),
        (0x03, ScaleKernel::Tap3),
        (0x05, ScaleKernel::Tap5),
        (0x07, ScaleKernel::Tap7),
        (0x09, ScaleKernel::Tap9),
    ];
}

/// Decoded scale mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum ScaleDesc {
    /// Quality/technique hints the engine maps onto a kernel.
    Implicit {
        /// Namespace byte.
        vendor: ModeVendor,
        /// Quality level 0..=63.
        quality: u8,
        /// Technique hint.
        technique: ScaleTechnique,
        /// Content hint.
        image_type: ImageType,
    },
    /// Independent horizontal and vertical kernels.
    Explicit {
        /// Namespace byte.
        vendor: ModeVendor,
        /// Horizontal kernel.
        horizontal: ScaleKernel,
        /// Vertical kernel.
        vertical: ScaleKernel,
    },
}

/// Concrete kernels chosen for an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct ResolvedScale {
    /// Horizontal kernel.
    pub horizontal: ScaleKernel,
    /// Vertical kernel.
    pub vertical: ScaleKernel,
}

impl ResolvedScale {
    /// Scale word naming exactly these kernels.
    pub fn mode(self) -> ScaleMode {
        ScaleDesc::Explicit {
            vendor: ModeVendor::Generic,
            horizontal: self.horizontal,
            vertical: self.vertical,
        }
        .encode()
    }
}

const fn implicit(quality: u32, technique: u32, image_type: u32) -> ScaleMode {
    ScaleMode((quality << QUALITY_SHIFT) | (technique << TECHNIQUE_SHIFT) | image_type)
}

const fn explicit(kernel: u32) -> ScaleMode {
    ScaleMode((0xFF << VENDOR_SHIFT) | (1 << CLASS_SHIFT) | (kernel << HORZ_SHIFT) | kernel)
}

impl ScaleMode {
    /// Fastest, any technique.
    pub const FASTEST: Self = implicit(0x00, 0, 0);
    /// Fastest, not nearest neighbor.
    pub const FASTEST_NOT_NEAREST_NEIGHBOR: Self = implicit(0x00, 1, 0);
    /// Fastest, point sampled.
    pub const FASTEST_POINT_SAMPLE: Self = implicit(0x00, 2, 0);
    /// Fastest, interpolated.
    pub const FASTEST_INTERPOLATED: Self = implicit(0x00, 3, 0);
    /// Fastest, photographic content.
    pub const FASTEST_PHOTO: Self = implicit(0x00, 0, 1);
    /// Fastest, drawn content.
    pub const FASTEST_DRAWING: Self = implicit(0x00, 0, 2);
    /// Good, any technique.
    pub const GOOD: Self = implicit(0x15, 0, 0);
    /// Good, point sampled.
    pub const GOOD_POINT_SAMPLE: Self = implicit(0x15, 2, 0);
    /// Good, interpolated.
    pub const GOOD_INTERPOLATED: Self = implicit(0x15, 3, 0);
    /// Good, photographic content.
    pub const GOOD_PHOTO: Self = implicit(0x15, 0, 1);
    /// Good, drawn content.
    pub const GOOD_DRAWING: Self = implicit(0x15, 0, 2);
    /// Better, any technique.
    pub const BETTER: Self = implicit(0x2A, 0, 0);
    /// Better, point sampled.
    pub const BETTER_POINT_SAMPLE: Self = implicit(0x2A, 2, 0);
    /// Better, interpolated.
    pub const BETTER_INTERPOLATED: Self = implicit(0x2A, 3, 0);
    /// Better, photographic content.
    pub const BETTER_PHOTO: Self = implicit(0x2A, 0, 1);
    /// Better, drawn content.
    pub const BETTER_DRAWING: Self = implicit(0x2A, 0, 2);
    /// Best, any technique.
    pub const BEST: Self = implicit(0x3F, 0, 0);
    /// Best, point sampled.
    pub const BEST_POINT_SAMPLE: Self = implicit(0x3F, 2, 0);
    /// Best, interpolated.
    pub const BEST_INTERPOLATED: Self = implicit(0x3F, 3, 0);
    /// Best, photographic content.
    pub const BEST_PHOTO: Self = implicit(0x3F, 0, 1);
    /// Best, drawn content.
    pub const BEST_DRAWING: Self = implicit(0x3F, 0, 2);

    /// Nearest neighbor on both axes.
    pub const NEAREST_NEIGHBOR: Self = explicit(0x00);
    /// Bilinear.
    pub const BILINEAR: Self = explicit(0x01);
    /// Bicubic.
    pub const BICUBIC: Self = explicit(0x02);
    /// 3×3-tap.
    pub const TAP_3X3: Self = explicit(0x03);
    /// 5×5-tap.
    pub const TAP_5X5: Self = explicit(0x05);
    /// 7×7-tap.
    pub const TAP_7X7: Self = explicit(0x07);
    /// 9×9-tap.
    pub const TAP_9X9: Self = explicit(0x09);

    /// Decode the packed word, rejecting unknown vendors, classes and reserved bits.
    pub fn decode(self) -> BltResult<ScaleDesc> {
        let raw = self.0;
        let vendor = ModeVendor::from_byte(bits(raw, VENDOR_SHIFT, 8))
            .ok_or_else(|| reject(raw, "unknown vendor"))?;
        match bits(raw, CLASS_SHIFT, 2) {
            0 => {
                if raw & IMPLICIT_RESERVED != 0 {
                    return Err(reject(raw, "reserved implicit bits set"));
                }
                let technique = lookup(&ScaleTechnique::TABLE, bits(raw, TECHNIQUE_SHIFT, 4))
                    .ok_or_else(|| reject(raw, "unknown technique"))?;
                let image_type = ImageType::from_bits(bits(raw, 0, 2))
                    .ok_or_else(|| reject(raw, "unknown image type"))?;
                Ok(ScaleDesc::Implicit {
                    vendor,
                    quality: bits(raw, QUALITY_SHIFT, 6) as u8,
                    technique,
                    image_type,
                })
            }
            1 => {
                if raw & EXPLICIT_RESERVED != 0 {
                    return Err(reject(raw, "reserved explicit bits set"));
                }
                let horizontal = lookup(&ScaleKernel::TABLE, bits(raw, HORZ_SHIFT, 8))
                    .ok_or_else(|| reject(raw, "unknown horizontal kernel"))?;
                let vertical = lookup(&ScaleKernel::TABLE, bits(raw, 0, 8))
                    .ok_or_else(|| reject(raw, "unknown vertical kernel"))?;
                Ok(ScaleDesc::Explicit {
                    vendor,
                    horizontal,
                    vertical,
                })
            }
            _ => Err(reject(raw, "unknown scale class")),
        }
    }
}

impl ScaleDesc {
    /// Quality anchor: fastest.
    pub const QUALITY_FASTEST: u8 = 0x00;
    /// Quality anchor: good.
    pub const QUALITY_GOOD: u8 = 0x15;
    /// Quality anchor: better.
    pub const QUALITY_BETTER: u8 = 0x2A;
    /// Quality anchor: best.
    pub const QUALITY_BEST: u8 = 0x3F;

    /// Pack back into a scale word.
    pub fn encode(&self) -> ScaleMode {
        match *self {
            Self::Implicit {
                vendor,
                quality,
                technique,
                image_type,
            } => ScaleMode(
                (vendor.byte() << VENDOR_SHIFT)
                    | ((u32::from(quality) & 0x3F) << QUALITY_SHIFT)
                    | (reverse(&ScaleTechnique::TABLE, technique) << TECHNIQUE_SHIFT)
                    | image_type.bits(),
            ),
            Self::Explicit {
                vendor,
                horizontal,
                vertical,
            } => ScaleMode(
                (vendor.byte() << VENDOR_SHIFT)
                    | (1 << CLASS_SHIFT)
                    | (reverse(&ScaleKernel::TABLE, horizontal) << HORZ_SHIFT)
                    | reverse(&ScaleKernel::TABLE, vertical),
            ),
        }
    }

    /// Map hints onto concrete kernels.
    ///
    /// Point sampling and drawings get nearest neighbor; interpolation, "not nearest" and
    /// photos get linear; with no hint, anything below good quality is nearest neighbor.
    pub fn resolve(&self) -> ResolvedScale {
        match *self {
            Self::Explicit {
                horizontal,
                vertical,
                ..
            } => ResolvedScale {
                horizontal,
                vertical,
            },
            Self::Implicit {
                quality,
                technique,
                image_type,
                ..
            } => {
                let kernel = match (technique, image_type) {
                    (ScaleTechnique::PointSample, _) => ScaleKernel::NearestNeighbor,
                    (ScaleTechnique::Interpolated | ScaleTechnique::NotNearestNeighbor, _) => {
                        ScaleKernel::Linear
                    }
                    (ScaleTechnique::DontCare, ImageType::Drawing) => ScaleKernel::NearestNeighbor,
                    (ScaleTechnique::DontCare, ImageType::Photo) => ScaleKernel::Linear,
                    (ScaleTechnique::DontCare, ImageType::Unknown) => {
                        if quality < Self::QUALITY_GOOD {
                            ScaleKernel::NearestNeighbor
                        } else {
                            ScaleKernel::Linear
                        }
                    }
                };
                ResolvedScale {
                    horizontal: kernel,
                    vertical: kernel,
                }
            }
        }
    }
}

fn reject(raw: u32, why: &str) -> BltError {
    BltError::field(ErrorCode::ScaleMode, format!("scale mode {raw:#010x}: {why}"))
}

#[cfg(test)]
#[path = "../../tests/unit/mode/scale.rs"]
mod tests;
