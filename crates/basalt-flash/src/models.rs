//! Static per-model geometry.
//!
//! There is exactly one active geometry per running instance, selected at
//! build time; nothing here is runtime-polymorphic. The current hardware
//! revision uses a 2 MiB dual-bank device whose banks each hold four 16 KiB
//! sectors, one 64 KiB sector and seven 128 KiB sectors. The simulator table
//! has the identical shape over a flat buffer based at 0 and is what host
//! tests and tools address.

use crate::geometry::SectorTable;
use crate::layout::{Area, Subarea};

pub const SECTOR_COUNT: u16 = 24;

#[rustfmt::skip]
const DEVICE_SECTOR_BASES: [u32; SECTOR_COUNT as usize + 1] = [
    0x0800_0000, //  16 KiB
    0x0800_4000, //  16 KiB
    0x0800_8000, //  16 KiB
    0x0800_C000, //  16 KiB
    0x0801_0000, //  64 KiB
    0x0802_0000, // 128 KiB
    0x0804_0000, // 128 KiB
    0x0806_0000, // 128 KiB
    0x0808_0000, // 128 KiB
    0x080A_0000, // 128 KiB
    0x080C_0000, // 128 KiB
    0x080E_0000, // 128 KiB
    0x0810_0000, //  16 KiB (bank 2)
    0x0810_4000, //  16 KiB
    0x0810_8000, //  16 KiB
    0x0810_C000, //  16 KiB
    0x0811_0000, //  64 KiB
    0x0812_0000, // 128 KiB
    0x0814_0000, // 128 KiB
    0x0816_0000, // 128 KiB
    0x0818_0000, // 128 KiB
    0x081A_0000, // 128 KiB
    0x081C_0000, // 128 KiB
    0x081E_0000, // 128 KiB
    0x0820_0000, // end sentinel, not a valid sector
];

const fn rebased(bases: [u32; SECTOR_COUNT as usize + 1], new_base: u32) -> [u32; SECTOR_COUNT as usize + 1] {
    let old_base = bases[0];
    let mut out = bases;
    let mut i = 0;
    while i < out.len() {
        out[i] = out[i] - old_base + new_base;
        i += 1;
    }
    out
}

const SIM_SECTOR_BASES: [u32; SECTOR_COUNT as usize + 1] = rebased(DEVICE_SECTOR_BASES, 0);

/// Geometry as mapped on the real device bus.
pub static DEVICE_SECTOR_TABLE: SectorTable = SectorTable::new(&DEVICE_SECTOR_BASES);

/// Same shape over a flat buffer based at 0, for the simulation backend.
pub static SIM_SECTOR_TABLE: SectorTable = SectorTable::new(&SIM_SECTOR_BASES);

/// Dual-slot key-value storage: one 64 KiB sector in each bank, so the
/// backup slot sits in physically independent cells.
pub static STORAGE_AREAS: [Area; 2] = [Area::single(4, 1), Area::single(16, 1)];

/// Bootloader image, one 128 KiB sector.
pub static BOOT_AREA: Area = Area::single(5, 1);

/// Firmware image: six 128 KiB sectors split across the two banks, a single
/// logical area over discontiguous runs.
pub static FIRMWARE_AREA: Area = Area::new(&[Subarea::new(6, 3), Subarea::new(17, 3)]);

/// Translation blob, one 16 KiB sector in bank 2.
pub static TRANSLATIONS_AREA: Area = Area::single(12, 1);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_well_formed_and_congruent() {
        DEVICE_SECTOR_TABLE.validate().unwrap();
        SIM_SECTOR_TABLE.validate().unwrap();
        assert_eq!(DEVICE_SECTOR_TABLE.sector_count(), SECTOR_COUNT);
        assert_eq!(SIM_SECTOR_TABLE.start(), 0);
        assert_eq!(DEVICE_SECTOR_TABLE.span(), SIM_SECTOR_TABLE.span());
        for sector in 0..SECTOR_COUNT {
            assert_eq!(
                DEVICE_SECTOR_TABLE.size(sector),
                SIM_SECTOR_TABLE.size(sector)
            );
        }
    }

    #[test]
    fn areas_do_not_overlap_and_fit_the_table() {
        let mut seen = [false; SECTOR_COUNT as usize];
        let areas: [&Area; 5] = [
            &STORAGE_AREAS[0],
            &STORAGE_AREAS[1],
            &BOOT_AREA,
            &FIRMWARE_AREA,
            &TRANSLATIONS_AREA,
        ];
        for area in areas {
            for sector in area.sectors() {
                assert!(sector < SECTOR_COUNT);
                assert!(!seen[sector as usize], "sector {sector} claimed twice");
                seen[sector as usize] = true;
            }
        }
    }

    #[test]
    fn firmware_area_spans_both_banks() {
        assert_eq!(FIRMWARE_AREA.total_sectors(), 6);
        assert_eq!(FIRMWARE_AREA.size_in(&SIM_SECTOR_TABLE), 6 * 128 * 1024);
        assert_eq!(
            FIRMWARE_AREA.sectors().collect::<Vec<_>>(),
            vec![6, 7, 8, 17, 18, 19]
        );
    }

    #[test]
    fn storage_slots_are_one_64k_sector_each() {
        for slot in &STORAGE_AREAS {
            assert_eq!(slot.total_sectors(), 1);
            assert_eq!(slot.size_in(&SIM_SECTOR_TABLE), 64 * 1024);
        }
    }
}
