use crate::geometry::SectorTable;
use crate::{FlashError, Result};

/// Maximum number of discontiguous sector runs a single area may span.
pub const MAX_SUBAREAS: usize = 4;

/// A contiguous run of sectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Subarea {
    pub first_sector: u16,
    pub num_sectors: u16,
}

impl Subarea {
    pub const fn new(first_sector: u16, num_sectors: u16) -> Subarea {
        Subarea {
            first_sector,
            num_sectors,
        }
    }

    /// Total bytes in this run; out-of-range sectors contribute zero.
    pub fn size_in(&self, table: &SectorTable) -> u32 {
        let mut size = 0u32;
        for i in 0..self.num_sectors {
            size += table.size(self.first_sector + i);
        }
        size
    }
}

/// A named logical storage region composed of up to [`MAX_SUBAREAS`]
/// possibly discontiguous sector runs.
///
/// Splitting an area across runs lets one logical store span both halves of
/// a dual-bank device, or pair physically separate regions for capacity.
/// Areas are static per-model configuration and are never mutated at
/// runtime.
#[derive(Clone, Copy, Debug)]
pub struct Area {
    subareas: [Subarea; MAX_SUBAREAS],
    num_subareas: usize,
}

/// A resolved physical location within an area.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    /// Sector containing the resolved range.
    pub sector: u16,
    /// Sector-local offset of the range.
    pub offset: u32,
    /// Absolute physical start address.
    pub addr: u32,
}

impl Area {
    /// Area over a single contiguous run.
    pub const fn single(first_sector: u16, num_sectors: u16) -> Area {
        Area::new(&[Subarea::new(first_sector, num_sectors)])
    }

    /// Area over the given runs, in logical-offset order.
    ///
    /// Panics if more than [`MAX_SUBAREAS`] runs are supplied; area shapes
    /// are compile-time configuration, so this is a build-time failure in
    /// practice.
    pub const fn new(subareas: &[Subarea]) -> Area {
        assert!(subareas.len() <= MAX_SUBAREAS);
        let mut out = [Subarea::new(0, 0); MAX_SUBAREAS];
        let mut i = 0;
        while i < subareas.len() {
            out[i] = subareas[i];
            i += 1;
        }
        Area {
            subareas: out,
            num_subareas: subareas.len(),
        }
    }

    /// The runs actually in use.
    pub fn subareas(&self) -> &[Subarea] {
        &self.subareas[..self.num_subareas]
    }

    /// Total bytes across all runs.
    pub fn size_in(&self, table: &SectorTable) -> u32 {
        self.subareas()
            .iter()
            .map(|subarea| subarea.size_in(table))
            .sum()
    }

    /// Number of sectors across all runs.
    pub fn total_sectors(&self) -> u16 {
        self.subareas()
            .iter()
            .map(|subarea| subarea.num_sectors)
            .sum()
    }

    /// The `index`-th sector of the area, counting across runs in order.
    pub fn sector_at(&self, index: u16) -> Option<u16> {
        let mut rem = index;
        for subarea in self.subareas() {
            if rem < subarea.num_sectors {
                return Some(subarea.first_sector + rem);
            }
            rem -= subarea.num_sectors;
        }
        None
    }

    /// Every sector of the area, in logical-offset order.
    pub fn sectors(&self) -> impl Iterator<Item = u16> + '_ {
        self.subareas()
            .iter()
            .flat_map(|subarea| subarea.first_sector..subarea.first_sector + subarea.num_sectors)
    }

    /// Resolves `len` bytes at logical `offset` into a physical location.
    ///
    /// Walks the runs in order to find the one containing `offset`, then the
    /// specific sector within it. The resolved range must fit inside that
    /// sector (see [`SectorTable::locate`]); requests never cross from one
    /// run into the next. A zero-length resolve at the start of the area
    /// succeeds and returns the base address, which callers use for
    /// adjacent-boundary checks.
    pub fn locate(&self, table: &SectorTable, offset: u32, len: u32) -> Result<Location> {
        let mut rem = offset;
        for subarea in self.subareas() {
            let sub_size = subarea.size_in(table);
            if rem >= sub_size {
                rem -= sub_size;
                continue;
            }

            // Inside this run; find the containing sector.
            let mut sector = subarea.first_sector;
            loop {
                let sector_size = table.size(sector);
                if rem < sector_size {
                    break;
                }
                rem -= sector_size;
                sector += 1;
            }

            let addr = table.locate(sector, rem, len)?;
            return Ok(Location {
                sector,
                offset: rem,
                addr,
            });
        }

        // `offset` is at or past the end of the area.
        Err(FlashError::OutOfBounds {
            offset,
            len,
            capacity: self.size_in(table),
        })
    }
}
