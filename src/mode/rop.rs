/// 16-bit raster operation (ROP4).
///
/// The low byte is the ROP3 applied where the mask is set (or everywhere without a mask), the
/// high byte where it is clear. Each ROP3 bit `i` gives the result for the input combination
/// `i = P·4 + S·2 + D`, with P the pattern (source 2), S source 1, D the destination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RopCode(pub u16);

impl RopCode {
    /// Destination cleared to zero.
    pub const BLACKNESS: Self = Self(0x0000);
    /// Destination set to all ones.
    pub const WHITENESS: Self = Self(0xFFFF);
    /// Copy source 1.
    pub const SRCCOPY: Self = Self(0xCCCC);
    /// Copy source 2 (the pattern).
    pub const PATCOPY: Self = Self(0xF0F0);
    /// Invert the destination.
    pub const DSTINVERT: Self = Self(0x5555);
    /// Source XOR destination.
    pub const SRCINVERT: Self = Self(0x6666);
    /// Source AND destination.
    pub const SRCAND: Self = Self(0x8888);
    /// Source OR destination.
    pub const SRCPAINT: Self = Self(0xEEEE);
    /// Leave the destination untouched.
    pub const NOP: Self = Self(0xAAAA);

    /// ROP3 used where the mask is set.
    pub fn foreground(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// ROP3 used where the mask is clear.
    pub fn background(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Return `true` when the code differs between mask-set and mask-clear pixels.
    pub fn uses_mask(self) -> bool {
        self.foreground() != self.background()
    }

    /// Return `true` when either ROP3 depends on source 1.
    pub fn uses_source(self) -> bool {
        [self.foreground(), self.background()]
            .into_iter()
            .any(|r| ((r >> 2) ^ r) & 0x33 != 0)
    }

    /// Return `true` when either ROP3 depends on source 2.
    pub fn uses_pattern(self) -> bool {
        [self.foreground(), self.background()]
            .into_iter()
            .any(|r| ((r >> 4) ^ r) & 0x0F != 0)
    }

    /// Apply one ROP3 bitwise across a byte.
    pub fn apply3(rop: u8, p: u8, s: u8, d: u8) -> u8 {
        let mut out = 0u8;
        for i in 0..8u8 {
            if rop & (1 << i) == 0 {
                continue;
            }
            let pick = |bit: u8, v: u8| if i & bit != 0 { v } else { !v };
            out |= pick(4, p) & pick(2, s) & pick(1, d);
        }
        out
    }

    /// Apply the code to one byte; `mask_set` chooses the foreground ROP3.
    pub fn apply(self, p: u8, s: u8, d: u8, mask_set: bool) -> u8 {
        let rop = if mask_set {
            self.foreground()
        } else {
            self.background()
        };
        Self::apply3(rop, p, s, d)
    }
}
