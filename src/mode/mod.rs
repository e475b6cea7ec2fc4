//! Decoders for the bit-packed scale, dither, blend and ROP mode words.
//!
//! Each word has a typed wrapper (`ScaleMode`, `DitherMode`, `BlendMode`) whose `decode`
//! produces a canonical description or rejects the value. Reserved bits are never masked off.
//! Descriptions re-encode losslessly via `encode`.

/// Blend words, classic equations and essential modes.
pub mod blend;
/// Dither words.
pub mod dither;
/// ROP4 codes.
pub mod rop;
/// Scale words.
pub mod scale;

/// Image-content hint shared by the implicit scale and dither encodings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageType {
    /// No hint.
    #[default]
    Unknown,
    /// Continuous-tone content.
    Photo,
    /// Line art, text, flat fills.
    Drawing,
}

impl ImageType {
    const TABLE: [(u32, ImageType); 3] = [
        (0, ImageType::Unknown),
        (1, ImageType::Photo),
        (2, ImageType::Drawing),
    ];

    fn from_bits(bits: u32) -> Option<Self> {
        lookup(&Self::TABLE, bits)
    }

    fn bits(self) -> u32 {
        reverse(&Self::TABLE, self)
    }
}

/// Extract `width` bits of `raw` starting at `shift`.
pub(crate) fn bits(raw: u32, shift: u32, width: u32) -> u32 {
    (raw >> shift) & ((1u32 << width) - 1)
}

pub(crate) fn lookup<T: Copy>(table: &[(u32, T)], key: u32) -> Option<T> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

pub(crate) fn reverse<T: Copy + PartialEq>(table: &[(u32, T)], value: T) -> u32 {
    table
        .iter()
        .find(|(_, v)| *v == value)
        .map(|(k, _)| *k)
        .unwrap_or(0)
}
