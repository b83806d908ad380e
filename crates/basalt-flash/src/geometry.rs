use crate::{FlashError, Result};

/// Immutable sector geometry of one flash device.
///
/// NOR flash erases in fixed, variably-sized sectors. The geometry is a
/// monotonically increasing base-address table with one extra sentinel entry
/// marking the end of the last sector, so `size(i) == bases[i+1] - bases[i]`.
/// Tables are static per hardware model and never change while the device is
/// running; the simulator uses a table of identical shape over a flat
/// synthetic address range.
#[derive(Debug)]
pub struct SectorTable {
    bases: &'static [u32],
}

impl SectorTable {
    /// `bases` must hold `sector_count + 1` strictly increasing addresses.
    /// The final entry is the end of the last sector, not a valid sector.
    /// Shape violations are caught by [`SectorTable::validate`], which
    /// backends and [`crate::FlashDevice::new`] run before first use.
    pub const fn new(bases: &'static [u32]) -> SectorTable {
        SectorTable { bases }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bases.len() < 2 {
            return Err(FlashError::InvalidGeometry(
                "sector table needs at least one sector plus the end sentinel",
            ));
        }
        for pair in self.bases.windows(2) {
            if pair[0] >= pair[1] {
                return Err(FlashError::InvalidGeometry(
                    "sector base addresses must be strictly increasing",
                ));
            }
        }
        Ok(())
    }

    pub fn sector_count(&self) -> u16 {
        (self.bases.len() - 1) as u16
    }

    /// Base address of `sector`, or `None` past the end of the table.
    pub fn base(&self, sector: u16) -> Option<u32> {
        if sector >= self.sector_count() {
            return None;
        }
        Some(self.bases[sector as usize])
    }

    /// Size of `sector` in bytes; 0 for out-of-range sectors.
    pub fn size(&self, sector: u16) -> u32 {
        if sector >= self.sector_count() {
            return 0;
        }
        self.bases[sector as usize + 1] - self.bases[sector as usize]
    }

    /// First mapped address.
    pub fn start(&self) -> u32 {
        self.bases[0]
    }

    /// One past the last mapped address.
    pub fn end(&self) -> u32 {
        self.bases[self.bases.len() - 1]
    }

    /// Total mapped bytes.
    pub fn span(&self) -> u32 {
        self.end() - self.start()
    }

    /// Physical address of `len` bytes at `offset` within `sector`.
    ///
    /// The range must lie entirely inside the sector. Sector boundaries are
    /// erase-granularity boundaries with independent lifecycles, so a single
    /// request is never allowed to spill into the next sector's address
    /// space, even where that space is physically contiguous.
    pub fn locate(&self, sector: u16, offset: u32, len: u32) -> Result<u32> {
        if sector >= self.sector_count() {
            return Err(FlashError::NoSuchSector { sector });
        }
        let base = self.bases[sector as usize];
        let next = self.bases[sector as usize + 1];
        let addr = base.checked_add(offset).ok_or(FlashError::OffsetOverflow)?;
        let end = addr.checked_add(len).ok_or(FlashError::OffsetOverflow)?;
        if end > next {
            return Err(FlashError::OutOfBounds {
                offset,
                len,
                capacity: next - base,
            });
        }
        Ok(addr)
    }
}
