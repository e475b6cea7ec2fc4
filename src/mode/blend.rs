//! Blend word decoding.
//!
//! Layout of a blend word:
//!
//! | bits  | meaning                                                         |
//! |-------|-----------------------------------------------------------------|
//! | 31-28 | format: 0 classic, 1 essential                                  |
//! | 27    | remote alpha: the mask supplies source 1 alpha                  |
//! | 26-24 | global alpha width: 0 none, 1 u8, 2 u16, 3 u32, 4 f32           |
//! | 23-0  | classic: K1 23-18, K2 17-12, K3 11-6, K4 5-0; essential: mode id |
//!
//! Each classic K field is `mm ii nn`. `nn` picks X from (C1, A1, C2, A2) and `ii` picks Y
//! from the same list:
//!
//! - `mm = 00`: `0x00` is the constant 0, `00 00 nn` is X and `00 ii 00` is 1-Y. Source 1
//!   color has no code here because both of its forms collide with 0.
//! - `mm = 01`: min(X, 1-Y).
//! - `mm = 10`: max(X, 1-Y).
//! - `mm = 11`: `0x3F` is the constant 1, `0x30` is C1 and `0x33` is 1-C1.
//!
//! Every other pattern is reserved. The equation is evaluated on premultiplied values as
//! `Cd = K1·C1 + K2·C2` and `Ad = K3·A1 + K4·A2`.

use crate::foundation::error::{BltError, BltResult, ErrorCode};
use crate::mode::{bits, lookup, reverse};

const FORMAT_SHIFT: u32 = 28;
const REMOTE_BIT: u32 = 1 << 27;
const GLOBAL_SHIFT: u32 = 24;
const K1_SHIFT: u32 = 18;
const K2_SHIFT: u32 = 12;
const K3_SHIFT: u32 = 6;
const K4_SHIFT: u32 = 0;

const FORMAT_CLASSIC: u32 = 0;
const FORMAT_ESSENTIAL: u32 = 1;

const K_ZERO: u32 = 0x00;
const K_ONE: u32 = 0x3F;
const K_C1: u32 = 0x30;
const K_ONE_MINUS_C1: u32 = 0x33;

/// Packed blend word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct BlendMode(pub u32);

/// Per-pixel input term of a classic coefficient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Operand {
    /// Source 1 color.
    C1,
    /// Source 1 alpha.
    A1,
    /// Source 2 color.
    C2,
    /// Source 2 alpha.
    A2,
}

impl Operand {
    const TABLE: [(u32, Operand); 4] = [
        (0, Operand::C1),
        (1, Operand::A1),
        (2, Operand::C2),
        (3, Operand::A2),
    ];

    fn from_bits(v: u32) -> Self {
        lookup(&Self::TABLE, v & 3).unwrap_or(Operand::C1)
    }

    fn bits(self) -> u32 {
        reverse(&Self::TABLE, self)
    }
}

/// Values of the four operands at one pixel and channel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Operands {
    /// Source 1 color (or alpha when evaluating the alpha equation).
    pub c1: f32,
    /// Source 1 alpha.
    pub a1: f32,
    /// Source 2 color (or alpha when evaluating the alpha equation).
    pub c2: f32,
    /// Source 2 alpha.
    pub a2: f32,
}

impl Operands {
    fn get(&self, op: Operand) -> f32 {
        match op {
            Operand::C1 => self.c1,
            Operand::A1 => self.a1,
            Operand::C2 => self.c2,
            Operand::A2 => self.a2,
        }
    }

    /// Operands of the alpha equation, where color terms read as alpha.
    pub fn alpha_only(&self) -> Self {
        Self {
            c1: self.a1,
            a1: self.a1,
            c2: self.a2,
            a2: self.a2,
        }
    }
}

/// One decoded classic coefficient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coefficient {
    /// Constant 0.
    Zero,
    /// Constant 1.
    One,
    /// X.
    Term(Operand),
    /// 1 - Y.
    OneMinus(Operand),
    /// min(X, 1 - Y).
    Min(Operand, Operand),
    /// max(X, 1 - Y).
    Max(Operand, Operand),
}

impl Coefficient {
    fn decode(field: u32) -> Option<Self> {
        let (mm, ii, nn) = (bits(field, 4, 2), bits(field, 2, 2), bits(field, 0, 2));
        match mm {
            0b00 => match (ii, nn) {
                (0, 0) => Some(Self::Zero),
                (0, x) => Some(Self::Term(Operand::from_bits(x))),
                (y, 0) => Some(Self::OneMinus(Operand::from_bits(y))),
                _ => None,
            },
            0b01 => Some(Self::Min(Operand::from_bits(nn), Operand::from_bits(ii))),
            0b10 => Some(Self::Max(Operand::from_bits(nn), Operand::from_bits(ii))),
            _ => match field {
                K_ONE => Some(Self::One),
                K_C1 => Some(Self::Term(Operand::C1)),
                K_ONE_MINUS_C1 => Some(Self::OneMinus(Operand::C1)),
                _ => None,
            },
        }
    }

    fn encode(self) -> u32 {
        match self {
            Self::Zero => K_ZERO,
            Self::One => K_ONE,
            Self::Term(Operand::C1) => K_C1,
            Self::Term(x) => x.bits(),
            Self::OneMinus(Operand::C1) => K_ONE_MINUS_C1,
            Self::OneMinus(y) => y.bits() << 2,
            Self::Min(x, y) => (0b01 << 4) | (y.bits() << 2) | x.bits(),
            Self::Max(x, y) => (0b10 << 4) | (y.bits() << 2) | x.bits(),
        }
    }

    /// Coefficient value at one pixel.
    pub fn eval(self, v: &Operands) -> f32 {
        match self {
            Self::Zero => 0.0,
            Self::One => 1.0,
            Self::Term(x) => v.get(x),
            Self::OneMinus(y) => 1.0 - v.get(y),
            Self::Min(x, y) => v.get(x).min(1.0 - v.get(y)),
            Self::Max(x, y) => v.get(x).max(1.0 - v.get(y)),
        }
    }
}

/// Classic blend equation: `Cd = K1·C1 + K2·C2`, `Ad = K3·A1 + K4·A2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ClassicBlend {
    /// Color weight of source 1.
    pub k1: Coefficient,
    /// Color weight of source 2.
    pub k2: Coefficient,
    /// Alpha weight of source 1.
    pub k3: Coefficient,
    /// Alpha weight of source 2.
    pub k4: Coefficient,
}

impl ClassicBlend {
    /// Blend one premultiplied pixel. `c1`/`c2` are RGBA in `[0, 1]`.
    pub fn apply(&self, c1: [f32; 4], c2: [f32; 4]) -> [f32; 4] {
        let mut out = [0.0; 4];
        for ch in 0..3 {
            let v = Operands {
                c1: c1[ch],
                a1: c1[3],
                c2: c2[ch],
                a2: c2[3],
            };
            out[ch] = self.k1.eval(&v) * c1[ch] + self.k2.eval(&v) * c2[ch];
        }
        let va = Operands {
            a1: c1[3],
            a2: c2[3],
            ..Operands::default()
        }
        .alpha_only();
        out[3] = self.k3.eval(&va) * c1[3] + self.k4.eval(&va) * c2[3];
        out.map(|v| v.clamp(0.0, 1.0))
    }
}

/// Named image-editor compositing modes. Source 1 is the top layer, source 2 the backdrop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum EssentialBlend {
    Normal,
    Lighten,
    Darken,
    Multiply,
    Average,
    /// Also known as linear dodge.
    Add,
    /// Also known as linear burn.
    Subtract,
    Difference,
    Negate,
    Screen,
    Exclusion,
    Overlay,
    SoftLight,
    HardLight,
    ColorDodge,
    ColorBurn,
    LinearLight,
    VividLight,
    PinLight,
    HardMix,
    Reflect,
    Glow,
    Phoenix,
}

impl EssentialBlend {
    /// All modes in wire order.
    pub const ALL: [EssentialBlend; 23] = [
        Self::Normal,
        Self::Lighten,
        Self::Darken,
        Self::Multiply,
        Self::Average,
        Self::Add,
        Self::Subtract,
        Self::Difference,
        Self::Negate,
        Self::Screen,
        Self::Exclusion,
        Self::Overlay,
        Self::SoftLight,
        Self::HardLight,
        Self::ColorDodge,
        Self::ColorBurn,
        Self::LinearLight,
        Self::VividLight,
        Self::PinLight,
        Self::HardMix,
        Self::Reflect,
        Self::Glow,
        Self::Phoenix,
    ];

    fn id(self) -> u32 {
        Self::ALL.iter().position(|m| *m == self).unwrap_or(0) as u32
    }

    /// Separable mix function `B(cb, cs)` on straight colors.
    pub fn mix(self, cb: f32, cs: f32) -> f32 {
        match self {
            Self::Normal => cs,
            Self::Lighten => cb.max(cs),
            Self::Darken => cb.min(cs),
            Self::Multiply => cb * cs,
            Self::Average => (cb + cs) * 0.5,
            Self::Add => (cb + cs).min(1.0),
            Self::Subtract => (cb + cs - 1.0).max(0.0),
            Self::Difference => (cb - cs).abs(),
            Self::Negate => 1.0 - (1.0 - cb - cs).abs(),
            Self::Screen => cb + cs - cb * cs,
            Self::Exclusion => cb + cs - 2.0 * cb * cs,
            Self::Overlay => Self::HardLight.mix(cs, cb),
            Self::SoftLight => {
                if cs <= 0.5 {
                    cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
                } else {
                    let d = if cb <= 0.25 {
                        ((16.0 * cb - 12.0) * cb + 4.0) * cb
                    } else {
                        cb.sqrt()
                    };
                    cb + (2.0 * cs - 1.0) * (d - cb)
                }
            }
            Self::HardLight => {
                if cs <= 0.5 {
                    Self::Multiply.mix(cb, 2.0 * cs)
                } else {
                    Self::Screen.mix(cb, 2.0 * cs - 1.0)
                }
            }
            Self::ColorDodge => {
                if cb <= 0.0 {
                    0.0
                } else if cs >= 1.0 {
                    1.0
                } else {
                    (cb / (1.0 - cs)).min(1.0)
                }
            }
            Self::ColorBurn => {
                if cb >= 1.0 {
                    1.0
                } else if cs <= 0.0 {
                    0.0
                } else {
                    1.0 - ((1.0 - cb) / cs).min(1.0)
                }
            }
            Self::LinearLight => (cb + 2.0 * cs - 1.0).clamp(0.0, 1.0),
            Self::VividLight => {
                if cs <= 0.5 {
                    Self::ColorBurn.mix(cb, 2.0 * cs)
                } else {
                    Self::ColorDodge.mix(cb, 2.0 * cs - 1.0)
                }
            }
            Self::PinLight => {
                if cs <= 0.5 {
                    cb.min(2.0 * cs)
                } else {
                    cb.max(2.0 * cs - 1.0)
                }
            }
            Self::HardMix => {
                if Self::VividLight.mix(cb, cs) < 0.5 {
                    0.0
                } else {
                    1.0
                }
            }
            Self::Reflect => {
                if cs >= 1.0 {
                    1.0
                } else {
                    (cb * cb / (1.0 - cs)).min(1.0)
                }
            }
            Self::Glow => Self::Reflect.mix(cs, cb),
            Self::Phoenix => cb.min(cs) - cb.max(cs) + 1.0,
        }
    }

    /// Composite one premultiplied pixel: `top` (source 1) over `backdrop` (source 2).
    pub fn apply(self, top: [f32; 4], backdrop: [f32; 4]) -> [f32; 4] {
        let (a_s, a_b) = (top[3], backdrop[3]);
        let mut out = [0.0; 4];
        for ch in 0..3 {
            let cs = if a_s > 0.0 { top[ch] / a_s } else { 0.0 };
            let cb = if a_b > 0.0 { backdrop[ch] / a_b } else { 0.0 };
            let b = self.mix(cb.clamp(0.0, 1.0), cs.clamp(0.0, 1.0)).clamp(0.0, 1.0);
            out[ch] = top[ch] * (1.0 - a_b) + backdrop[ch] * (1.0 - a_s) + a_s * a_b * b;
        }
        out[3] = a_s + a_b - a_s * a_b;
        out.map(|v| v.clamp(0.0, 1.0))
    }
}

/// Width tag of the global alpha value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalAlphaWidth {
    /// No global alpha.
    #[default]
    None,
    /// 8-bit unsigned.
    U8,
    /// 16-bit unsigned.
    U16,
    /// 32-bit unsigned.
    U32,
    /// 32-bit float in `[0, 1]`.
    F32,
}

impl GlobalAlphaWidth {
    const TABLE: [(u32, GlobalAlphaWidth); 5] = [
        (0, GlobalAlphaWidth::None),
        (1, GlobalAlphaWidth::U8),
        (2, GlobalAlphaWidth::U16),
        (3, GlobalAlphaWidth::U32),
        (4, GlobalAlphaWidth::F32),
    ];
}

/// Classic equation or named mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum BlendKind {
    /// Algebraic K1..K4 equation.
    Classic(ClassicBlend),
    /// Named mode.
    Essential {
        /// The mode.
        mode: EssentialBlend,
    },
}

/// Decoded blend word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BlendDesc {
    /// Equation or named mode.
    pub kind: BlendKind,
    /// Mask supplies source 1 alpha.
    pub remote_alpha: bool,
    /// Width of the global alpha value, if any.
    pub global_alpha: GlobalAlphaWidth,
}

const fn classic(k1: u32, k2: u32, k3: u32, k4: u32) -> BlendMode {
    BlendMode((k1 << K1_SHIFT) | (k2 << K2_SHIFT) | (k3 << K3_SHIFT) | k4)
}

const fn essential(id: u32) -> BlendMode {
    BlendMode((FORMAT_ESSENTIAL << FORMAT_SHIFT) | id)
}

const A1: u32 = 0x01;
const A2: u32 = 0x03;
const ONE_MINUS_A1: u32 = 0x04;
const ONE_MINUS_A2: u32 = 0x0C;

impl BlendMode {
    /// Remote-alpha modifier bit.
    pub const REMOTE: u32 = REMOTE_BIT;
    /// 8-bit global alpha modifier.
    pub const GLOBAL_U8: u32 = 1 << GLOBAL_SHIFT;
    /// 16-bit global alpha modifier.
    pub const GLOBAL_U16: u32 = 2 << GLOBAL_SHIFT;
    /// 32-bit global alpha modifier.
    pub const GLOBAL_U32: u32 = 3 << GLOBAL_SHIFT;
    /// Float global alpha modifier.
    pub const GLOBAL_F32: u32 = 4 << GLOBAL_SHIFT;

    /// 0, 0, 0, 0.
    pub const CLEAR: Self = classic(K_ZERO, K_ZERO, K_ZERO, K_ZERO);
    /// 1, 0, 1, 0.
    pub const SRC1: Self = classic(K_ONE, K_ZERO, K_ONE, K_ZERO);
    /// 0, 1, 0, 1.
    pub const SRC2: Self = classic(K_ZERO, K_ONE, K_ZERO, K_ONE);
    /// 1, 1-A1, 1, 1-A1.
    pub const SRC1OVER: Self = classic(K_ONE, ONE_MINUS_A1, K_ONE, ONE_MINUS_A1);
    /// 1-A2, 1, 1-A2, 1.
    pub const SRC2OVER: Self = classic(ONE_MINUS_A2, K_ONE, ONE_MINUS_A2, K_ONE);
    /// A2, 0, A2, 0.
    pub const SRC1IN: Self = classic(A2, K_ZERO, A2, K_ZERO);
    /// 0, A1, 0, A1.
    pub const SRC2IN: Self = classic(K_ZERO, A1, K_ZERO, A1);
    /// 1-A2, 0, 1-A2, 0.
    pub const SRC1OUT: Self = classic(ONE_MINUS_A2, K_ZERO, ONE_MINUS_A2, K_ZERO);
    /// 0, 1-A1, 0, 1-A1.
    pub const SRC2OUT: Self = classic(K_ZERO, ONE_MINUS_A1, K_ZERO, ONE_MINUS_A1);
    /// A2, 1-A1, A2, 1-A1.
    pub const SRC1ATOP: Self = classic(A2, ONE_MINUS_A1, A2, ONE_MINUS_A1);
    /// 1-A2, A1, 1-A2, A1.
    pub const SRC2ATOP: Self = classic(ONE_MINUS_A2, A1, ONE_MINUS_A2, A1);
    /// 1-A2, 1-A1, 1-A2, 1-A1.
    pub const XOR: Self = classic(ONE_MINUS_A2, ONE_MINUS_A1, ONE_MINUS_A2, ONE_MINUS_A1);
    /// 1, 1, 1, 1.
    pub const PLUS: Self = classic(K_ONE, K_ONE, K_ONE, K_ONE);

    /// Normal.
    pub const NORMAL: Self = essential(0);
    /// Lighten.
    pub const LIGHTEN: Self = essential(1);
    /// Darken.
    pub const DARKEN: Self = essential(2);
    /// Multiply.
    pub const MULTIPLY: Self = essential(3);
    /// Average.
    pub const AVERAGE: Self = essential(4);
    /// Add.
    pub const ADD: Self = essential(5);
    /// Same as [`BlendMode::ADD`].
    pub const LINEAR_DODGE: Self = Self::ADD;
    /// Subtract.
    pub const SUBTRACT: Self = essential(6);
    /// Same as [`BlendMode::SUBTRACT`].
    pub const LINEAR_BURN: Self = Self::SUBTRACT;
    /// Difference.
    pub const DIFFERENCE: Self = essential(7);
    /// Negate.
    pub const NEGATE: Self = essential(8);
    /// Screen.
    pub const SCREEN: Self = essential(9);
    /// Exclusion.
    pub const EXCLUSION: Self = essential(10);
    /// Overlay.
    pub const OVERLAY: Self = essential(11);
    /// Soft light.
    pub const SOFT_LIGHT: Self = essential(12);
    /// Hard light.
    pub const HARD_LIGHT: Self = essential(13);
    /// Color dodge.
    pub const COLOR_DODGE: Self = essential(14);
    /// Color burn.
    pub const COLOR_BURN: Self = essential(15);
    /// Linear light.
    pub const LINEAR_LIGHT: Self = essential(16);
    /// Vivid light.
    pub const VIVID_LIGHT: Self = essential(17);
    /// Pin light.
    pub const PIN_LIGHT: Self = essential(18);
    /// Hard mix.
    pub const HARD_MIX: Self = essential(19);
    /// Reflect.
    pub const REFLECT: Self = essential(20);
    /// Glow.
    pub const GLOW: Self = essential(21);
    /// Phoenix.
    pub const PHOENIX: Self = essential(22);

    /// Add modifier bits to a mode.
    pub const fn with(self, modifiers: u32) -> Self {
        Self(self.0 | modifiers)
    }

    /// Decode the packed word.
    pub fn decode(self) -> BltResult<BlendDesc> {
        let raw = self.0;
        let global_alpha = lookup(&GlobalAlphaWidth::TABLE, bits(raw, GLOBAL_SHIFT, 3))
            .ok_or_else(|| reject(raw, "reserved global alpha width"))?;
        let remote_alpha = raw & REMOTE_BIT != 0;
        let kind = match bits(raw, FORMAT_SHIFT, 4) {
            FORMAT_CLASSIC => {
                let k = |shift: u32, name: &str| {
                    Coefficient::decode(bits(raw, shift, 6))
                        .ok_or_else(|| reject(raw, &format!("reserved {name} encoding")))
                };
                BlendKind::Classic(ClassicBlend {
                    k1: k(K1_SHIFT, "K1")?,
                    k2: k(K2_SHIFT, "K2")?,
                    k3: k(K3_SHIFT, "K3")?,
                    k4: k(K4_SHIFT, "K4")?,
                })
            }
            FORMAT_ESSENTIAL => {
                let id = bits(raw, 0, 24) as usize;
                let mode = EssentialBlend::ALL
                    .get(id)
                    .copied()
                    .ok_or_else(|| reject(raw, "unknown essential mode"))?;
                BlendKind::Essential { mode }
            }
            _ => return Err(reject(raw, "unknown blend format")),
        };
        Ok(BlendDesc {
            kind,
            remote_alpha,
            global_alpha,
        })
    }
}

impl BlendDesc {
    /// Pack back into a blend word.
    pub fn encode(&self) -> BlendMode {
        let body = match self.kind {
            BlendKind::Classic(c) => {
                classic(c.k1.encode(), c.k2.encode(), c.k3.encode(), c.k4.encode()).0
            }
            BlendKind::Essential { mode } => essential(mode.id()).0,
        };
        let remote = if self.remote_alpha { REMOTE_BIT } else { 0 };
        BlendMode(
            body | remote | (reverse(&GlobalAlphaWidth::TABLE, self.global_alpha) << GLOBAL_SHIFT),
        )
    }

    /// Classic coefficients, if this is a classic blend.
    pub fn classic(&self) -> Option<ClassicBlend> {
        match self.kind {
            BlendKind::Classic(c) => Some(c),
            BlendKind::Essential { .. } => None,
        }
    }
}

fn reject(raw: u32, why: &str) -> BltError {
    BltError::field(ErrorCode::Blend, format!("blend {raw:#010x}: {why}"))
}

#[cfg(test)]
#[path = "../../tests/unit/mode/blend.rs"]
mod tests;
