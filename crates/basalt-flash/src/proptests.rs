//! Property tests against reference models: the engines over [`MemBackend`]
//! must agree with a plain shadow buffer that applies the NOR rules
//! directly, and the resolver must agree with a linear walk.

use proptest::prelude::*;

use crate::models::SIM_SECTOR_TABLE;
use crate::{Area, FlashDevice, FlashError, MemBackend, Subarea};

// Keep the universe small: the first four 16 KiB sectors.
const PROP_SECTORS: u16 = 4;
const PROP_SPAN: usize = 4 * 16 * 1024;

#[derive(Clone, Debug)]
enum Op {
    Erase { sector: u16 },
    WriteByte { sector: u16, offset: u32, value: u8 },
    WriteWord { sector: u16, offset: u32, value: u32 },
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let sector = 0..PROP_SECTORS;
    let op = prop_oneof![
        1 => sector.clone().prop_map(|sector| Op::Erase { sector }),
        4 => (sector.clone(), 0u32..16 * 1024, any::<u8>())
            .prop_map(|(sector, offset, value)| Op::WriteByte { sector, offset, value }),
        4 => (sector, 0u32..(16 * 1024) / 4, any::<u32>())
            .prop_map(|(sector, word_index, value)| Op::WriteWord {
                sector,
                offset: word_index * 4,
                value,
            }),
    ];
    proptest::collection::vec(op, 1..60)
}

/// Shadow model: flat buffer plus the write-once rules, nothing else.
struct Shadow {
    bytes: Vec<u8>,
}

impl Shadow {
    fn new() -> Shadow {
        Shadow {
            bytes: vec![0xFF; PROP_SPAN],
        }
    }

    fn index(&self, sector: u16, offset: u32) -> usize {
        sector as usize * 16 * 1024 + offset as usize
    }

    fn erase(&mut self, sector: u16) {
        let start = self.index(sector, 0);
        self.bytes[start..start + 16 * 1024].fill(0xFF);
    }

    fn write_byte(&mut self, sector: u16, offset: u32, value: u8) -> bool {
        let index = self.index(sector, offset);
        if self.bytes[index] & value != value {
            return false;
        }
        self.bytes[index] = value;
        true
    }

    fn write_word(&mut self, sector: u16, offset: u32, value: u32) -> bool {
        let index = self.index(sector, offset);
        let current = u32::from_le_bytes(self.bytes[index..index + 4].try_into().unwrap());
        if current & value != value {
            return false;
        }
        self.bytes[index..index + 4].copy_from_slice(&value.to_le_bytes());
        true
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_engines_match_the_shadow_model(ops in ops_strategy()) {
        let backend = MemBackend::new(&SIM_SECTOR_TABLE).unwrap();
        let mut device = FlashDevice::new(backend, &SIM_SECTOR_TABLE).unwrap();
        let mut shadow = Shadow::new();

        for op in ops {
            match op {
                Op::Erase { sector } => {
                    device.erase_sector(sector).unwrap();
                    shadow.erase(sector);
                }
                Op::WriteByte { sector, offset, value } => {
                    let accepted = shadow.write_byte(sector, offset, value);
                    let outcome = device.write_byte(sector, offset, value);
                    if accepted {
                        prop_assert!(outcome.is_ok());
                    } else {
                        let rejected = matches!(outcome, Err(FlashError::WriteRejected { .. }));
                        prop_assert!(rejected);
                    }
                }
                Op::WriteWord { sector, offset, value } => {
                    let accepted = shadow.write_word(sector, offset, value);
                    let outcome = device.write_word(sector, offset, value);
                    if accepted {
                        prop_assert!(outcome.is_ok());
                    } else {
                        let rejected = matches!(outcome, Err(FlashError::WriteRejected { .. }));
                        prop_assert!(rejected);
                    }
                }
            }
            // The latch never stays open between operations.
            prop_assert!(device.backend().is_locked());
        }

        prop_assert_eq!(&device.backend().bytes()[..PROP_SPAN], &shadow.bytes[..]);
    }

    #[test]
    fn prop_locate_matches_a_linear_walk(
        runs in proptest::collection::vec((0u16..20, 1u16..4), 1..=4),
        offset in 0u32..2 * 1024 * 1024,
    ) {
        let subareas: Vec<Subarea> = runs
            .iter()
            .map(|&(first_sector, num_sectors)| Subarea::new(first_sector, num_sectors))
            .collect();
        let area = Area::new(&subareas);
        let table = &SIM_SECTOR_TABLE;

        // Reference: enumerate sectors in order and consume their sizes.
        let mut expected = None;
        let mut consumed = 0u32;
        for sector in area.sectors() {
            let size = table.size(sector);
            if offset < consumed + size {
                expected = Some((sector, offset - consumed));
                break;
            }
            consumed += size;
        }

        match (expected, area.locate(table, offset, 1)) {
            (Some((sector, local)), Ok(loc)) => {
                prop_assert_eq!(loc.sector, sector);
                prop_assert_eq!(loc.offset, local);
                prop_assert_eq!(loc.addr, table.base(sector).unwrap() + local);
            }
            (None, Err(FlashError::OutOfBounds { .. })) => {}
            (expected, outcome) => prop_assert!(
                false,
                "resolver disagrees with reference: expected {:?}, got {:?}",
                expected,
                outcome
            ),
        }
    }
}
