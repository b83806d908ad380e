use crate::{FlashError, Result};

/// Fault-resistant two-valued status word used at the privileged-gate
/// boundary.
///
/// A plain boolean is one transient bit flip away from turning a failure
/// into a success, which is exactly the class of glitch this firmware
/// defends against. The gate instead reports one of two fixed patterns at
/// maximal Hamming distance (every one of the 32 bits differs); any other
/// observed word is evidence of a fault and surfaces as
/// [`FlashError::TamperedStatus`], never as success.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct SecBool(u32);

impl SecBool {
    pub const TRUE: SecBool = SecBool(0xAA55_AA55);
    pub const FALSE: SecBool = SecBool(0x55AA_55AA);

    /// Wraps a raw status word as received from the gate.
    pub const fn from_raw(raw: u32) -> SecBool {
        SecBool(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Strict consumption: only the exact `TRUE` pattern succeeds, the exact
    /// `FALSE` pattern yields `on_false`, and anything else is treated as a
    /// tampered status.
    pub fn check(self, on_false: FlashError) -> Result<()> {
        match self {
            SecBool::TRUE => Ok(()),
            SecBool::FALSE => Err(on_false),
            SecBool(raw) => Err(FlashError::TamperedStatus { raw }),
        }
    }
}

impl From<bool> for SecBool {
    fn from(value: bool) -> SecBool {
        if value {
            SecBool::TRUE
        } else {
            SecBool::FALSE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_are_bitwise_complements() {
        assert_eq!(SecBool::TRUE.raw() ^ SecBool::FALSE.raw(), u32::MAX);
    }

    #[test]
    fn check_accepts_only_the_exact_true_pattern() {
        assert!(SecBool::TRUE.check(FlashError::Locked).is_ok());
        assert!(matches!(
            SecBool::FALSE.check(FlashError::Locked),
            Err(FlashError::Locked)
        ));
    }

    #[test]
    fn single_bit_flips_are_never_success() {
        for bit in 0..32 {
            let raw = SecBool::TRUE.raw() ^ (1 << bit);
            let err = SecBool::from_raw(raw).check(FlashError::Locked).unwrap_err();
            assert!(matches!(err, FlashError::TamperedStatus { .. }));
        }
        // All-zeros and all-ones are common glitch outcomes.
        for raw in [0u32, u32::MAX] {
            let err = SecBool::from_raw(raw).check(FlashError::Locked).unwrap_err();
            assert!(matches!(err, FlashError::TamperedStatus { .. }));
        }
    }
}
