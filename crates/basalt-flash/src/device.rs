use crate::backend::FlashBackend;
use crate::geometry::SectorTable;
use crate::layout::Area;
use crate::{FlashError, Result};

/// Erased NOR flash reads as all-ones.
const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Word size of the programming interface; word writes must be aligned to it.
pub const WORD_SIZE: u32 = 4;

/// Erase and write engines over an arbitrary [`FlashBackend`].
///
/// Every mutating operation opens the write-enable latch, performs the
/// programming primitive, verifies the result by reading it back, and closes
/// the latch again on every exit path. Verification failures are final at
/// this layer; retry policy, if any, belongs to the caller. The device is
/// fully synchronous and assumes a single logical flash-operation issuer.
pub struct FlashDevice<B> {
    backend: B,
    table: &'static SectorTable,
}

impl<B: FlashBackend> FlashDevice<B> {
    pub fn new(backend: B, table: &'static SectorTable) -> Result<FlashDevice<B>> {
        table.validate()?;
        Ok(FlashDevice { backend, table })
    }

    pub fn table(&self) -> &'static SectorTable {
        self.table
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Runs `op` with the write-enable latch open, relocking on every exit
    /// path. If `op` succeeds but relocking fails, the relock error is
    /// reported; if `op` fails, its error wins and the relock still happens.
    fn with_write_enabled<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.backend.unlock()?;
        let outcome = op(self);
        let relock = self.backend.lock();
        match (outcome, relock) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), _) => Err(err),
        }
    }

    pub fn read(&self, sector: u16, offset: u32, buf: &mut [u8]) -> Result<()> {
        let addr = self.table.locate(sector, offset, buf.len() as u32)?;
        self.backend.read(addr, buf)
    }

    pub fn read_byte(&self, sector: u16, offset: u32) -> Result<u8> {
        let addr = self.table.locate(sector, offset, 1)?;
        self.backend.read_byte(addr)
    }

    pub fn read_word(&self, sector: u16, offset: u32) -> Result<u32> {
        if offset % WORD_SIZE != 0 {
            return Err(FlashError::Misaligned {
                offset,
                alignment: WORD_SIZE,
            });
        }
        let addr = self.table.locate(sector, offset, WORD_SIZE)?;
        self.backend.read_word(addr)
    }

    /// Reads `buf.len()` bytes at a logical offset into `area`.
    ///
    /// Chunked per sector: multi-sector reads are legal here even though a
    /// single resolved request never crosses a sector boundary.
    pub fn read_area(&self, area: &Area, offset: u32, buf: &mut [u8]) -> Result<()> {
        let mut pos = 0usize;
        while pos < buf.len() {
            let logical = offset
                .checked_add(pos as u32)
                .ok_or(FlashError::OffsetOverflow)?;
            let loc = area.locate(self.table, logical, 0)?;
            let in_sector = (self.table.size(loc.sector) - loc.offset) as usize;
            let chunk = in_sector.min(buf.len() - pos);
            let addr = self.table.locate(loc.sector, loc.offset, chunk as u32)?;
            self.backend.read(addr, &mut buf[pos..pos + chunk])?;
            pos += chunk;
        }
        Ok(())
    }

    /// Erases one sector and verifies that every word of it reads as
    /// all-ones.
    pub fn erase_sector(&mut self, sector: u16) -> Result<()> {
        self.with_write_enabled(|dev| {
            dev.backend.erase_sector(sector)?;
            dev.verify_erased(sector)
        })
    }

    /// Erases every sector of `area`, reporting `(done, total)` progress.
    pub fn erase_area(
        &mut self,
        area: &Area,
        progress: Option<&mut dyn FnMut(usize, usize)>,
    ) -> Result<()> {
        self.erase_areas(&[area], progress)
    }

    /// Erases every sector of every area in `areas`, with one progress
    /// sequence across the whole batch.
    ///
    /// `total` is precomputed before any sector is touched; `progress` is
    /// invoked once with `(0, total)` and then after every sector, including
    /// the last. Fail-fast: the first sector that does not verify as erased
    /// aborts the batch with the latch relocked and no further progress
    /// reports. A partially erased security-relevant region must never be
    /// reported as success.
    pub fn erase_areas(
        &mut self,
        areas: &[&Area],
        mut progress: Option<&mut dyn FnMut(usize, usize)>,
    ) -> Result<()> {
        let total: usize = areas.iter().map(|area| area.total_sectors() as usize).sum();
        self.with_write_enabled(|dev| {
            if let Some(report) = progress.as_mut() {
                report(0, total);
            }
            let mut done = 0usize;
            for area in areas {
                for sector in area.sectors() {
                    dev.backend.erase_sector(sector)?;
                    dev.verify_erased(sector)?;
                    done += 1;
                    if let Some(report) = progress.as_mut() {
                        report(done, total);
                    }
                }
            }
            Ok(())
        })
    }

    fn verify_erased(&self, sector: u16) -> Result<()> {
        let base = self
            .table
            .base(sector)
            .ok_or(FlashError::NoSuchSector { sector })?;
        let end = base + self.table.size(sector);
        let mut addr = base;
        while addr < end {
            if self.backend.read_word(addr)? != ERASED_WORD {
                return Err(FlashError::VerifyFailed { addr });
            }
            addr += WORD_SIZE;
        }
        Ok(())
    }

    /// Programs one byte and verifies it by reading it back.
    ///
    /// NOR programming only clears bits. A value that would flip any bit
    /// from 0 back to 1 is rejected before the hardware is touched, so the
    /// caller gets a clean failure instead of a corrupted partial write and
    /// no program cycle is wasted.
    pub fn write_byte(&mut self, sector: u16, offset: u32, value: u8) -> Result<()> {
        let addr = self.table.locate(sector, offset, 1)?;
        let current = self.backend.read_byte(addr)?;
        if current & value != value {
            return Err(FlashError::WriteRejected {
                addr,
                current: current.into(),
                requested: value.into(),
            });
        }
        self.with_write_enabled(|dev| dev.backend.program_byte(addr, value))?;
        if self.backend.read_byte(addr)? != value {
            return Err(FlashError::VerifyFailed { addr });
        }
        Ok(())
    }

    /// Programs one aligned 4-byte word and verifies it by reading it back.
    /// The alignment check runs before anything touches the hardware.
    pub fn write_word(&mut self, sector: u16, offset: u32, value: u32) -> Result<()> {
        if offset % WORD_SIZE != 0 {
            return Err(FlashError::Misaligned {
                offset,
                alignment: WORD_SIZE,
            });
        }
        let addr = self.table.locate(sector, offset, WORD_SIZE)?;
        let current = self.backend.read_word(addr)?;
        if current & value != value {
            return Err(FlashError::WriteRejected {
                addr,
                current,
                requested: value,
            });
        }
        self.with_write_enabled(|dev| dev.backend.program_word(addr, value))?;
        if self.backend.read_word(addr)? != value {
            return Err(FlashError::VerifyFailed { addr });
        }
        Ok(())
    }

    /// Byte write at a logical offset into `area`; resolution failures never
    /// reach the hardware.
    pub fn write_area_byte(&mut self, area: &Area, offset: u32, value: u8) -> Result<()> {
        let loc = area.locate(self.table, offset, 1)?;
        self.write_byte(loc.sector, loc.offset, value)
    }

    /// Word write at a logical offset into `area`. The offset must be
    /// word-aligned; like the sector-level variant, all checks precede any
    /// hardware access.
    pub fn write_area_word(&mut self, area: &Area, offset: u32, value: u32) -> Result<()> {
        if offset % WORD_SIZE != 0 {
            return Err(FlashError::Misaligned {
                offset,
                alignment: WORD_SIZE,
            });
        }
        let loc = area.locate(self.table, offset, WORD_SIZE)?;
        self.write_word(loc.sector, loc.offset, value)
    }
}
