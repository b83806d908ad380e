//! NOR-flash abstraction layer of the Basalt hardware-wallet firmware.
//!
//! Physical NOR flash erases in fixed, variably-sized sectors and programs
//! write-once per bit (bits only move 1 -> 0; going back requires erasing
//! the whole sector). Higher layers (the key-value store, the
//! bootloader/firmware image layout, translation blobs) want named logical
//! areas addressed by plain byte offsets. This crate reconciles the two:
//!
//! - [`SectorTable`]: immutable per-model sector geometry
//! - [`Area`]/[`Subarea`]: logical areas over possibly discontiguous sector runs
//! - [`FlashBackend`]: capability trait over the programming primitives
//! - [`MemBackend`]: deterministic in-memory simulation of those primitives
//! - [`GateBackend`]: hardware variant driving a privileged [`SecureGate`]
//! - [`FlashDevice`]: erase/write engines with post-operation verification
//! - [`SecBool`]: fault-resistant status word used at the gate boundary
//!
//! Every destructive operation is verified by reading the hardware back, and
//! the write-enable latch is relocked on every exit path. The real
//! secure-monitor gate lives in the firmware tree; everything here runs on
//! the host against [`MemBackend`].

mod backend;
mod device;
mod error;
mod geometry;
mod layout;
pub mod models;
mod otp;
mod secbool;

pub use backend::{FlashBackend, GateBackend, MemBackend, SecureGate};
pub use device::{FlashDevice, WORD_SIZE};
pub use error::{FlashError, Result};
pub use geometry::SectorTable;
pub use layout::{Area, Location, Subarea, MAX_SUBAREAS};
pub use otp::{NoOtp, OtpGate};
pub use secbool::SecBool;

#[cfg(test)]
mod proptests;
