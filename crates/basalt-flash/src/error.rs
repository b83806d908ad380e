use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlashError>;

/// Unified error type for Basalt flash operations.
///
/// None of these are retried internally: every failure propagates to the
/// immediate caller, and every mutating operation relocks the write-enable
/// latch before returning regardless of which variant occurred. A
/// [`FlashError::VerifyFailed`] during a bulk erase aborts the whole batch;
/// a partially erased security-relevant region must never look usable.
#[derive(Debug, Error)]
pub enum FlashError {
    #[error("no such sector {sector}")]
    NoSuchSector { sector: u16 },

    #[error("out of bounds: offset={offset} len={len} capacity={capacity}")]
    OutOfBounds { offset: u32, len: u32, capacity: u32 },

    #[error("integer overflow while computing flash addresses")]
    OffsetOverflow,

    #[error("misaligned word access at offset {offset} (expected multiple of {alignment})")]
    Misaligned { offset: u32, alignment: u32 },

    #[error("write rejected at {addr:#010x}: programming {requested:#x} over {current:#x} would set bits without an erase")]
    WriteRejected { addr: u32, current: u32, requested: u32 },

    #[error("read-back verification failed at {addr:#010x}")]
    VerifyFailed { addr: u32 },

    #[error("status word {raw:#010x} is neither the confirmed nor the denied pattern")]
    TamperedStatus { raw: u32 },

    #[error("program/erase primitive issued while the write-enable latch is locked")]
    Locked,

    #[error("invalid flash geometry: {0}")]
    InvalidGeometry(&'static str),

    #[error("buffer length {actual} does not match the mapped flash span {expected}")]
    SpanMismatch { expected: u32, actual: u32 },

    #[error("flash gate error: {0}")]
    Gate(&'static str),
}
