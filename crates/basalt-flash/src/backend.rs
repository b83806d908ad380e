use std::collections::BTreeMap;

use crate::geometry::SectorTable;
use crate::secbool::SecBool;
use crate::{FlashError, Result};

/// Capability set every flash backend provides.
///
/// The engines in [`crate::FlashDevice`] are written purely against this
/// trait, so the same erase/write/verify logic drives real hardware (via
/// [`GateBackend`]) and the deterministic host simulation ([`MemBackend`]).
///
/// Addresses are absolute physical addresses from the backend's sector
/// table. `program_*` and `erase_sector` require the write-enable latch to
/// be open (`unlock`); reads do not.
pub trait FlashBackend {
    fn unlock(&mut self) -> Result<()>;
    fn lock(&mut self) -> Result<()>;
    fn erase_sector(&mut self, sector: u16) -> Result<()>;
    fn program_byte(&mut self, addr: u32, value: u8) -> Result<()>;
    fn program_word(&mut self, addr: u32, value: u32) -> Result<()>;
    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<()>;

    fn read_byte(&self, addr: u32) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read(addr, &mut buf)?;
        Ok(buf[0])
    }

    fn read_word(&self, addr: u32) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read(addr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

/// Deterministic in-memory flash simulation.
///
/// Observable semantics match the hardware contract exactly: erasing a
/// sector fills it with `0xFF`, programming can only clear bits (the stored
/// byte becomes the bitwise AND of old and new, as NOR cells do), and
/// program/erase fail with [`FlashError::Locked`] while the write-enable
/// latch is closed. The buffer starts fully erased.
///
/// For fault-path tests a byte can be pinned with
/// [`MemBackend::set_stuck_byte`]; erases and program cycles both leave it
/// at its pinned value, which is how a marginal cell presents to the
/// engines' read-back verification.
pub struct MemBackend {
    table: &'static SectorTable,
    bytes: Vec<u8>,
    unlocked: bool,
    stuck: BTreeMap<u32, u8>,
}

impl MemBackend {
    /// Fully erased simulation covering `table`'s mapped span.
    pub fn new(table: &'static SectorTable) -> Result<MemBackend> {
        table.validate()?;
        Ok(MemBackend {
            table,
            bytes: vec![0xFF; table.span() as usize],
            unlocked: false,
            stuck: BTreeMap::new(),
        })
    }

    /// Simulation seeded from an existing raw dump of the mapped span.
    pub fn from_bytes(table: &'static SectorTable, bytes: Vec<u8>) -> Result<MemBackend> {
        table.validate()?;
        if bytes.len() != table.span() as usize {
            return Err(FlashError::SpanMismatch {
                expected: table.span(),
                actual: bytes.len() as u32,
            });
        }
        Ok(MemBackend {
            table,
            bytes,
            unlocked: false,
            stuck: BTreeMap::new(),
        })
    }

    pub fn table(&self) -> &'static SectorTable {
        self.table
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn is_locked(&self) -> bool {
        !self.unlocked
    }

    /// Pins the byte at `addr` so erases leave it at `value`.
    pub fn set_stuck_byte(&mut self, addr: u32, value: u8) {
        if let Ok(index) = self.index(addr, 1) {
            self.bytes[index] = value;
            self.stuck.insert(addr, value);
        }
    }

    fn index(&self, addr: u32, len: u32) -> Result<usize> {
        let end = addr.checked_add(len).ok_or(FlashError::OffsetOverflow)?;
        if addr < self.table.start() || end > self.table.end() {
            return Err(FlashError::OutOfBounds {
                offset: addr,
                len,
                capacity: self.table.span(),
            });
        }
        Ok((addr - self.table.start()) as usize)
    }

    fn require_unlocked(&self) -> Result<()> {
        if self.unlocked {
            Ok(())
        } else {
            Err(FlashError::Locked)
        }
    }

    // A pinned cell ignores programming as well as erasure; the engines'
    // read-back verification is what notices it.
    fn program_cell(&mut self, addr: u32, value: u8) {
        let index = (addr - self.table.start()) as usize;
        if !self.stuck.contains_key(&addr) {
            self.bytes[index] &= value;
        }
    }
}

impl FlashBackend for MemBackend {
    fn unlock(&mut self) -> Result<()> {
        self.unlocked = true;
        Ok(())
    }

    fn lock(&mut self) -> Result<()> {
        self.unlocked = false;
        Ok(())
    }

    fn erase_sector(&mut self, sector: u16) -> Result<()> {
        self.require_unlocked()?;
        let base = self
            .table
            .base(sector)
            .ok_or(FlashError::NoSuchSector { sector })?;
        let size = self.table.size(sector);
        let start = self.index(base, size)?;
        self.bytes[start..start + size as usize].fill(0xFF);
        for (&addr, &value) in self.stuck.range(base..base + size) {
            self.bytes[(addr - self.table.start()) as usize] = value;
        }
        Ok(())
    }

    fn program_byte(&mut self, addr: u32, value: u8) -> Result<()> {
        self.require_unlocked()?;
        self.index(addr, 1)?;
        self.program_cell(addr, value);
        Ok(())
    }

    fn program_word(&mut self, addr: u32, value: u32) -> Result<()> {
        self.require_unlocked()?;
        if addr % 4 != 0 {
            return Err(FlashError::Misaligned {
                offset: addr,
                alignment: 4,
            });
        }
        self.index(addr, 4)?;
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.program_cell(addr + i as u32, byte);
        }
        Ok(())
    }

    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let index = self.index(addr, buf.len() as u32)?;
        buf.copy_from_slice(&self.bytes[index..index + buf.len()]);
        Ok(())
    }
}

/// Privileged secure-monitor call gate.
///
/// The real implementation lives behind the firmware's supervisor-call
/// boundary and owns the flash controller registers; its internal fault
/// handling is opaque to this crate. Status words are authoritative:
/// [`SecBool::TRUE`] means the operation completed with no error flag
/// (alignment, protection, sequence) raised.
pub trait SecureGate {
    fn unlock_write(&mut self) -> SecBool;
    fn lock_write(&mut self) -> SecBool;
    fn erase_sector(&mut self, sector: u16) -> SecBool;
    fn program_byte(&mut self, addr: u32, value: u8) -> SecBool;
    fn program_word(&mut self, addr: u32, value: u32) -> SecBool;
    fn read_word(&self, addr: u32) -> u32;
}

/// Hardware backend: forwards every capability through a [`SecureGate`] and
/// maps its fault-resistant status words onto [`Result`]s.
pub struct GateBackend<G> {
    gate: G,
}

impl<G: SecureGate> GateBackend<G> {
    pub fn new(gate: G) -> GateBackend<G> {
        GateBackend { gate }
    }

    pub fn gate(&self) -> &G {
        &self.gate
    }

    pub fn into_gate(self) -> G {
        self.gate
    }
}

impl<G: SecureGate> FlashBackend for GateBackend<G> {
    fn unlock(&mut self) -> Result<()> {
        self.gate
            .unlock_write()
            .check(FlashError::Gate("unlock_write rejected"))
    }

    fn lock(&mut self) -> Result<()> {
        self.gate
            .lock_write()
            .check(FlashError::Gate("lock_write reported an error flag"))
    }

    fn erase_sector(&mut self, sector: u16) -> Result<()> {
        self.gate
            .erase_sector(sector)
            .check(FlashError::Gate("erase_sector rejected"))
    }

    fn program_byte(&mut self, addr: u32, value: u8) -> Result<()> {
        self.gate
            .program_byte(addr, value)
            .check(FlashError::Gate("program_byte rejected"))
    }

    fn program_word(&mut self, addr: u32, value: u32) -> Result<()> {
        self.gate
            .program_word(addr, value)
            .check(FlashError::Gate("program_word rejected"))
    }

    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<()> {
        // The gate only exposes word reads; gather bytes out of the
        // containing words.
        for (i, slot) in buf.iter_mut().enumerate() {
            let byte_addr = addr
                .checked_add(i as u32)
                .ok_or(FlashError::OffsetOverflow)?;
            let word = self.gate.read_word(byte_addr & !3);
            *slot = word.to_le_bytes()[(byte_addr % 4) as usize];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static TABLE: SectorTable = SectorTable::new(&[0x1000, 0x1100, 0x1300]);

    #[test]
    fn programming_while_locked_fails() {
        let mut mem = MemBackend::new(&TABLE).unwrap();
        assert!(matches!(
            mem.program_byte(0x1000, 0x00),
            Err(FlashError::Locked)
        ));
        assert!(matches!(mem.erase_sector(0), Err(FlashError::Locked)));
        assert_eq!(mem.read_byte(0x1000).unwrap(), 0xFF);
    }

    #[test]
    fn programming_is_an_and_operation() {
        let mut mem = MemBackend::new(&TABLE).unwrap();
        mem.unlock().unwrap();
        mem.program_byte(0x1000, 0x0F).unwrap();
        // Programming 0xF0 over 0x0F leaves 0x00: bits only clear.
        mem.program_byte(0x1000, 0xF0).unwrap();
        assert_eq!(mem.read_byte(0x1000).unwrap(), 0x00);
    }

    #[test]
    fn erase_restores_all_ones_except_stuck_bytes() {
        let mut mem = MemBackend::new(&TABLE).unwrap();
        mem.unlock().unwrap();
        mem.program_word(0x1100, 0xDEAD_BEEF).unwrap();
        mem.set_stuck_byte(0x1102, 0x7F);
        mem.erase_sector(1).unwrap();
        assert_eq!(mem.read_byte(0x1100).unwrap(), 0xFF);
        assert_eq!(mem.read_byte(0x1102).unwrap(), 0x7F);
    }

    #[test]
    fn reads_are_bounds_checked_against_the_mapped_span() {
        let mem = MemBackend::new(&TABLE).unwrap();
        let mut buf = [0u8; 4];
        assert!(matches!(
            mem.read(0x0FFF, &mut buf),
            Err(FlashError::OutOfBounds { .. })
        ));
        assert!(matches!(
            mem.read(0x12FE, &mut buf),
            Err(FlashError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn from_bytes_requires_the_exact_span() {
        assert!(matches!(
            MemBackend::from_bytes(&TABLE, vec![0xFF; 7]),
            Err(FlashError::SpanMismatch { .. })
        ));
        let mem = MemBackend::from_bytes(&TABLE, vec![0xA5; 0x300]).unwrap();
        assert_eq!(mem.read_byte(0x1000).unwrap(), 0xA5);
    }
}
