use std::fmt;

/// Convenience result type used across bltkit.
pub type BltResult<T> = Result<T, BltError>;

const VENDOR_SHIFT: u32 = 24;
const VENDOR_MASK: u32 = 0xFF << VENDOR_SHIFT;

/// Numeric error codes returned by blit engines.
///
/// The discriminants are an external compatibility contract: bits 31-24 hold the
/// implementation vendor (`0x00` for codes shared by every implementation), the low bits a
/// per-category range. They must never be renumbered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u32)]
pub enum ErrorCode {
    /// No error.
    None = 0,
    /// Unknown error.
    Unk = 1,
    /// Memory allocation failure.
    Oom = 2,
    /// Required resource unavailable (also: resource still in use).
    Rsrc = 3,

    /// Virtual pointer is bad.
    Virtptr = 1000,

    /// Buffer descriptor `struct_size` too small.
    BufferdescVers = 10000,
    /// Buffer memory cannot be mapped.
    MemoryUnmappable = 11000,
    /// Buffer descriptor length not supported.
    BufferdescLen = 12000,

    /// Blit parameter `struct_size` too small.
    BltparamsVers = 20000,
    /// Blit flags unsupported.
    Flags = 21000,
    /// Unsupported operation.
    Op = 21100,
    /// Type of color key not supported.
    Key = 21200,
    /// Flipping not supported.
    Flip = 21300,

    /// Source 1 tiling not supported.
    Src1Tile = 21400,
    /// Source 2 tiling not supported.
    Src2Tile = 21410,
    /// Mask tiling not supported.
    MaskTile = 21420,

    /// ROP code not supported.
    Rop = 22000,
    /// Blend not supported.
    Blend = 22100,
    /// Filter type not supported.
    Filter = 22200,
    /// Filter parameter `struct_size` too small.
    FilterParamsVers = 22210,
    /// Filter parameters not supported.
    FilterParams = 22220,

    /// Invalid destination mapping.
    DstHandle = 23000,
    /// Destination geometry `struct_size` too small.
    DstVers = 24000,
    /// Destination format not supported.
    DstFormat = 24100,
    /// Destination rect not supported.
    DstRect = 24200,
    /// Destination stride not supported.
    DstStride = 24300,

    /// Invalid source 1 mapping.
    Src1Handle = 25000,
    /// Source 1 tile parameter `struct_size` too small.
    Src1TileVers = 25100,
    /// Source 1 tile flags not supported.
    Src1TileFlags = 25200,
    /// Source 1 tile origin not supported.
    Src1TileOrigin = 25300,
    /// Source 1 tile size not supported.
    Src1TileSize = 25400,
    /// Source 1 geometry `struct_size` too small.
    Src1Vers = 26000,
    /// Source 1 format not supported.
    Src1Format = 26100,
    /// Source 1 stride not supported.
    Src1Stride = 26200,
    /// Source 1 rect not supported.
    Src1Rect = 26300,
    /// Horizontal scale for source 1 not supported.
    Src1HorzScale = 26310,
    /// Vertical scale for source 1 not supported.
    Src1VertScale = 26320,
    /// Source 1 rotation not supported.
    Src1Rot = 26340,

    /// Invalid source 2 mapping.
    Src2Handle = 27000,
    /// Source 2 tile parameter `struct_size` too small.
    Src2TileVers = 27100,
    /// Source 2 tile flags not supported.
    Src2TileFlags = 27200,
    /// Source 2 tile origin not supported.
    Src2TileOrigin = 27300,
    /// Source 2 tile size not supported.
    Src2TileSize = 27400,
    /// Source 2 geometry `struct_size` too small.
    Src2Vers = 28000,
    /// Source 2 format not supported.
    Src2Format = 28100,
    /// Source 2 stride not supported.
    Src2Stride = 28200,
    /// Source 2 rect not supported.
    Src2Rect = 28300,
    /// Horizontal scale for source 2 not supported.
    Src2HorzScale = 28310,
    /// Vertical scale for source 2 not supported.
    Src2VertScale = 28320,
    /// Source 2 rotation not supported.
    Src2Rot = 28330,

    /// Invalid mask mapping.
    MaskHandle = 29000,
    /// Mask tile parameter `struct_size` too small.
    MaskTileVers = 29100,
    /// Mask tile flags not supported.
    MaskTileFlags = 29200,
    /// Mask tile origin not supported.
    MaskTileOrigin = 29300,
    /// Mask tile size not supported.
    MaskTileSize = 29400,
    /// Mask geometry `struct_size` too small.
    MaskVers = 30000,
    /// Mask format not supported.
    MaskFormat = 30100,
    /// Mask stride not supported.
    MaskStride = 30200,
    /// Mask rect not supported.
    MaskRect = 30300,
    /// Horizontal scale for the mask not supported.
    MaskHorzScale = 30310,
    /// Vertical scale for the mask not supported.
    MaskVertScale = 30320,
    /// Mask rotation not supported.
    MaskRot = 30330,

    /// Clip rect not supported.
    ClipRect = 31000,

    /// Dither mode not supported.
    DitherMode = 32000,
    /// Scale mode not supported.
    ScaleMode = 33000,

    /// Batch change flags not supported.
    BatchFlags = 34000,
    /// Batch handle not valid.
    BatchHandle = 35000,

    /// Asynchronous operation failed to start.
    OpFailed = 50000,
    /// Asynchronous operation failed part way; unfinished destination region is undefined.
    OpIncomplete = 50001,
    /// Asynchronous operation triggered a memory error.
    MemoryError = 52000,
}

/// Failure category of an [`ErrorCode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ErrorCategory {
    /// No error or unknown error.
    General,
    /// A `struct_size` field below the minimum the engine requires.
    Version,
    /// Memory exhaustion, unmappable memory, unknown/released or busy handles.
    Resource,
    /// Unsupported field value, mode bit pattern or flag combination.
    Field,
    /// Batch sequencing violations.
    Protocol,
    /// Failures after an asynchronous operation was accepted.
    Execution,
}

const ALL_CODES: &[ErrorCode] = &[
    ErrorCode::None,
    ErrorCode::Unk,
    ErrorCode::Oom,
    ErrorCode::Rsrc,
    ErrorCode::Virtptr,
    ErrorCode::BufferdescVers,
    ErrorCode::MemoryUnmappable,
    ErrorCode::BufferdescLen,
    ErrorCode::BltparamsVers,
    ErrorCode::Flags,
    ErrorCode::Op,
    ErrorCode::Key,
    ErrorCode::Flip,
    ErrorCode::Src1Tile,
    ErrorCode::Src2Tile,
    ErrorCode::MaskTile,
    ErrorCode::Rop,
    ErrorCode::Blend,
    ErrorCode::Filter,
    ErrorCode::FilterParamsVers,
    ErrorCode::FilterParams,
    ErrorCode::DstHandle,
    ErrorCode::DstVers,
    ErrorCode::DstFormat,
    ErrorCode::DstRect,
    ErrorCode::DstStride,
    ErrorCode::Src1Handle,
    ErrorCode::Src1TileVers,
    ErrorCode::Src1TileFlags,
    ErrorCode::Src1TileOrigin,
    ErrorCode::Src1TileSize,
    ErrorCode::Src1Vers,
    ErrorCode::Src1Format,
    ErrorCode::Src1Stride,
    ErrorCode::Src1Rect,
    ErrorCode::Src1HorzScale,
    ErrorCode::Src1VertScale,
    ErrorCode::Src1Rot,
    ErrorCode::Src2Handle,
    ErrorCode::Src2TileVers,
    ErrorCode::Src2TileFlags,
    ErrorCode::Src2TileOrigin,
    ErrorCode::Src2TileSize,
    ErrorCode::Src2Vers,
    ErrorCode::Src2Format,
    ErrorCode::Src2Stride,
    ErrorCode::Src2Rect,
    ErrorCode::Src2HorzScale,
    ErrorCode::Src2VertScale,
    ErrorCode::Src2Rot,
    ErrorCode::MaskHandle,
    ErrorCode::MaskTileVers,
    ErrorCode::MaskTileFlags,
    ErrorCode::MaskTileOrigin,
    ErrorCode::MaskTileSize,
    ErrorCode::MaskVers,
    ErrorCode::MaskFormat,
    ErrorCode::MaskStride,
    ErrorCode::MaskRect,
    ErrorCode::MaskHorzScale,
    ErrorCode::MaskVertScale,
    ErrorCode::MaskRot,
    ErrorCode::ClipRect,
    ErrorCode::DitherMode,
    ErrorCode::ScaleMode,
    ErrorCode::BatchFlags,
    ErrorCode::BatchHandle,
    ErrorCode::OpFailed,
    ErrorCode::OpIncomplete,
    ErrorCode::MemoryError,
];

impl ErrorCode {
    /// Every code known to this engine, in ascending numeric order.
    pub fn all() -> &'static [ErrorCode] {
        ALL_CODES
    }

    /// Raw numeric value.
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Look up a raw numeric value. Unknown values return `None`.
    pub fn from_u32(raw: u32) -> Option<Self> {
        ALL_CODES.iter().copied().find(|c| c.as_u32() == raw)
    }

    /// Implementation vendor byte (bits 31-24).
    pub fn vendor(self) -> u8 {
        ((self.as_u32() & VENDOR_MASK) >> VENDOR_SHIFT) as u8
    }

    /// Failure category used to route the code to a [`BltError`] variant.
    pub fn category(self) -> ErrorCategory {
        use ErrorCode::*;
        match self {
            None | Unk => ErrorCategory::General,
            BufferdescVers | BltparamsVers | FilterParamsVers | DstVers | Src1Vers
            | Src1TileVers | Src2Vers | Src2TileVers | MaskVers | MaskTileVers => {
                ErrorCategory::Version
            }
            Oom | Rsrc | Virtptr | MemoryUnmappable | BufferdescLen | DstHandle | Src1Handle
            | Src2Handle | MaskHandle => ErrorCategory::Resource,
            BatchFlags | BatchHandle => ErrorCategory::Protocol,
            OpFailed | OpIncomplete | MemoryError => ErrorCategory::Execution,
            _ => ErrorCategory::Field,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?} ({})", self.as_u32())
    }
}

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum BltError {
    /// A structure is older than the minimum version the engine accepts.
    #[error("version error: {code}: {msg}")]
    Version {
        /// Machine-checkable code.
        code: ErrorCode,
        /// Diagnostic text, not meant for end users.
        msg: String,
    },

    /// Memory, mapping or handle resource failure.
    #[error("resource error: {code}: {msg}")]
    Resource {
        /// Machine-checkable code.
        code: ErrorCode,
        /// Diagnostic text, not meant for end users.
        msg: String,
    },

    /// Unsupported field value, flag combination or mode bit pattern.
    #[error("field error: {code}: {msg}")]
    Field {
        /// Machine-checkable code.
        code: ErrorCode,
        /// Diagnostic text, not meant for end users.
        msg: String,
    },

    /// Batch sequencing violation.
    #[error("protocol error: {code}: {msg}")]
    Protocol {
        /// Machine-checkable code.
        code: ErrorCode,
        /// Diagnostic text, not meant for end users.
        msg: String,
    },

    /// Failure while executing an accepted operation.
    #[error("execution error: {code}: {msg}")]
    Execution {
        /// Machine-checkable code.
        code: ErrorCode,
        /// Diagnostic text, not meant for end users.
        msg: String,
    },

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BltError {
    /// Build an error whose variant follows the category of `code`.
    ///
    /// General codes (`None`, `Unk`) are reported as resource errors; no code is ever turned
    /// into success.
    pub fn new(code: ErrorCode, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        match code.category() {
            ErrorCategory::Version => Self::Version { code, msg },
            ErrorCategory::Resource | ErrorCategory::General => Self::Resource { code, msg },
            ErrorCategory::Field => Self::Field { code, msg },
            ErrorCategory::Protocol => Self::Protocol { code, msg },
            ErrorCategory::Execution => Self::Execution { code, msg },
        }
    }

    /// Build a [`BltError::Version`] value.
    pub fn version(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::Version {
            code,
            msg: msg.into(),
        }
    }

    /// Build a [`BltError::Resource`] value.
    pub fn resource(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::Resource {
            code,
            msg: msg.into(),
        }
    }

    /// Build a [`BltError::Field`] value.
    pub fn field(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::Field {
            code,
            msg: msg.into(),
        }
    }

    /// Build a [`BltError::Protocol`] value.
    pub fn protocol(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            msg: msg.into(),
        }
    }

    /// Build a [`BltError::Execution`] value.
    pub fn execution(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::Execution {
            code,
            msg: msg.into(),
        }
    }

    /// Machine-checkable code. Wrapped foreign errors report [`ErrorCode::Unk`].
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Version { code, .. }
            | Self::Resource { code, .. }
            | Self::Field { code, .. }
            | Self::Protocol { code, .. }
            | Self::Execution { code, .. } => *code,
            Self::Other(_) => ErrorCode::Unk,
        }
    }

    /// Diagnostic text without the category prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Version { msg, .. }
            | Self::Resource { msg, .. }
            | Self::Field { msg, .. }
            | Self::Protocol { msg, .. }
            | Self::Execution { msg, .. } => msg.clone(),
            Self::Other(e) => format!("{e:#}"),
        }
    }

    /// Category of [`BltError::code`].
    pub fn category(&self) -> ErrorCategory {
        self.code().category()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
