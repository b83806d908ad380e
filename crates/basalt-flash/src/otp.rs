use crate::{FlashError, Result};

/// One-time-programmable region access.
///
/// OTP read/write/lock is part of the surrounding storage API, but its
/// semantics are owned entirely by the privileged gate; this crate only
/// declares the capability so consumers can name it. Blocks are small fixed
/// regions addressed by `(block, offset)`.
pub trait OtpGate {
    fn otp_read(&self, block: u8, offset: u8, buf: &mut [u8]) -> Result<()>;
    fn otp_write(&mut self, block: u8, offset: u8, data: &[u8]) -> Result<()>;
    fn otp_lock(&mut self, block: u8) -> Result<()>;
    fn otp_is_locked(&self, block: u8) -> Result<bool>;
}

/// Simulator stand-in: OTP is deliberately unavailable rather than given
/// invented semantics.
pub struct NoOtp;

impl OtpGate for NoOtp {
    fn otp_read(&self, _block: u8, _offset: u8, _buf: &mut [u8]) -> Result<()> {
        Err(FlashError::Gate("otp is unavailable in simulation"))
    }

    fn otp_write(&mut self, _block: u8, _offset: u8, _data: &[u8]) -> Result<()> {
        Err(FlashError::Gate("otp is unavailable in simulation"))
    }

    fn otp_lock(&mut self, _block: u8) -> Result<()> {
        Err(FlashError::Gate("otp is unavailable in simulation"))
    }

    fn otp_is_locked(&self, _block: u8) -> Result<bool> {
        Err(FlashError::Gate("otp is unavailable in simulation"))
    }
}
