//! Paco bootloader support.
//!
//! Provides the per-version bootloader protocol table consumed by a flashing
//! transport, and a console progress bar that can aggregate the progress of
//! independent child operations into a single top-level display.

#[macro_use]
extern crate log;

#[macro_use(block)]
extern crate nb;

extern crate embedded_hal;

#[cfg(feature = "indicatif")]
extern crate indicatif;

pub mod progress;
pub mod protocol;

pub use progress::{
    ChildProgress, ProgressBar, ProgressSink, Scope, IMAGE_DECADE, IMAGE_FINE,
    IMAGE_PERCENT,
};
#[cfg(feature = "indicatif")]
pub use progress::IndicatifSink;
pub use protocol::{lookup, Capability, Opcode, VersionProfile, DEFAULT_PROFILE};

#[derive(Clone, PartialEq, Debug, thiserror::Error)]
pub enum Error {
    /// Bounds are not finite or max lies below min
    #[error("invalid progress range (min: {min}, max: {max})")]
    InvalidRange { min: f64, max: f64 },

    /// Thresholds cannot be computed over an empty range
    #[error("degenerate progress range (min == max == {0})")]
    DegenerateRange(f64),

    #[error("progress image contains no tokens")]
    EmptyImage,

    #[error("unknown bootloader opcode: 0x{0:02x}")]
    UnknownOpcode(u8),

    #[error("unknown bootloader capability: {0}")]
    UnknownCapability(String),

    #[error("progress output error: {0:?}")]
    Io(std::io::ErrorKind),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.kind())
    }
}
