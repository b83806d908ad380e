use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use basalt_flash::models::{
    BOOT_AREA, FIRMWARE_AREA, SECTOR_COUNT, SIM_SECTOR_TABLE, STORAGE_AREAS, TRANSLATIONS_AREA,
};
use basalt_flash::{Area, FlashDevice, MemBackend};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "basalt-flash-scan",
    about = "Inspect and manipulate raw Basalt flash dumps using the simulation backend."
)]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print the sector table and the logical area map
    Layout {
        /// Emit JSON instead of a table
        #[arg(long, action = clap::ArgAction::SetTrue)]
        json: bool,
    },
    /// Report per-area erased/programmed statistics for a raw dump
    Scan {
        /// Raw flash dump (exactly the mapped span, 2 MiB)
        dump: PathBuf,
    },
    /// Erase one logical area inside a raw dump, in place
    Wipe {
        /// Raw flash dump to modify
        dump: PathBuf,

        /// Area to erase (storage-a, storage-b, boot, firmware, translations)
        #[arg(long)]
        area: String,

        /// Actually write the result back (without this flag nothing is modified)
        #[arg(long, action = clap::ArgAction::SetTrue)]
        force: bool,

        /// Suppress progress output
        #[arg(long, action = clap::ArgAction::SetTrue)]
        quiet: bool,
    },
}

fn named_areas() -> [(&'static str, &'static Area); 5] {
    [
        ("storage-a", &STORAGE_AREAS[0]),
        ("storage-b", &STORAGE_AREAS[1]),
        ("boot", &BOOT_AREA),
        ("firmware", &FIRMWARE_AREA),
        ("translations", &TRANSLATIONS_AREA),
    ]
}

#[derive(Debug, Serialize)]
struct LayoutReport {
    sectors: Vec<SectorEntry>,
    areas: Vec<AreaEntry>,
}

#[derive(Debug, Serialize)]
struct SectorEntry {
    index: u16,
    base: u32,
    size: u32,
}

#[derive(Debug, Serialize)]
struct AreaEntry {
    name: &'static str,
    sectors: Vec<u16>,
    size: u32,
}

#[derive(Debug, Serialize)]
struct ScanReport {
    dump: String,
    areas: Vec<AreaScanEntry>,
}

#[derive(Debug, Serialize)]
struct AreaScanEntry {
    name: &'static str,
    size: u32,
    erased_bytes: u32,
    programmed_bytes: u32,
    fully_erased: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    match args.cmd {
        Cmd::Layout { json } => layout(json),
        Cmd::Scan { dump } => scan(&dump),
        Cmd::Wipe {
            dump,
            area,
            force,
            quiet,
        } => wipe(&dump, &area, force, quiet),
    }
}

fn layout_report() -> LayoutReport {
    let table = &SIM_SECTOR_TABLE;
    let sectors = (0..SECTOR_COUNT)
        .map(|index| SectorEntry {
            index,
            base: table.base(index).unwrap_or(0),
            size: table.size(index),
        })
        .collect();
    let areas = named_areas()
        .into_iter()
        .map(|(name, area)| AreaEntry {
            name,
            sectors: area.sectors().collect(),
            size: area.size_in(table),
        })
        .collect();
    LayoutReport { sectors, areas }
}

fn layout(json: bool) -> anyhow::Result<()> {
    let report = layout_report();
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{:>6}  {:>10}  {:>9}", "sector", "base", "size");
    for sector in &report.sectors {
        println!(
            "{:>6}  {:#010x}  {:>7} K",
            sector.index,
            sector.base,
            sector.size / 1024
        );
    }
    println!();
    println!("{:<13}  {:>9}  sectors", "area", "size");
    for area in &report.areas {
        println!(
            "{:<13}  {:>7} K  {:?}",
            area.name,
            area.size / 1024,
            area.sectors
        );
    }
    Ok(())
}

fn load_dump(path: &Path) -> anyhow::Result<MemBackend> {
    let bytes = fs::read(path).with_context(|| format!("read dump {}", path.display()))?;
    MemBackend::from_bytes(&SIM_SECTOR_TABLE, bytes).with_context(|| {
        format!(
            "dump {} does not cover the mapped span ({} bytes expected)",
            path.display(),
            SIM_SECTOR_TABLE.span()
        )
    })
}

fn scan(dump: &Path) -> anyhow::Result<()> {
    let backend = load_dump(dump)?;
    let device = FlashDevice::new(backend, &SIM_SECTOR_TABLE).context("open dump")?;

    let mut areas = Vec::new();
    for (name, area) in named_areas() {
        let size = area.size_in(&SIM_SECTOR_TABLE);
        let mut contents = vec![0u8; size as usize];
        device
            .read_area(area, 0, &mut contents)
            .with_context(|| format!("read area {name}"))?;
        let erased_bytes = contents.iter().filter(|&&b| b == 0xFF).count() as u32;
        areas.push(AreaScanEntry {
            name,
            size,
            erased_bytes,
            programmed_bytes: size - erased_bytes,
            fully_erased: erased_bytes == size,
        });
    }

    let report = ScanReport {
        dump: dump.display().to_string(),
        areas,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn wipe(dump: &Path, area_name: &str, force: bool, quiet: bool) -> anyhow::Result<()> {
    let Some((name, area)) = named_areas()
        .into_iter()
        .find(|(name, _)| *name == area_name)
    else {
        bail!(
            "unknown area {area_name:?} (expected one of: {})",
            named_areas().map(|(name, _)| name).join(", ")
        );
    };

    if !force {
        bail!("wipe rewrites {} in place; pass --force to proceed", dump.display());
    }

    let backend = load_dump(dump)?;
    let mut device = FlashDevice::new(backend, &SIM_SECTOR_TABLE).context("open dump")?;

    let bar = if quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(area.total_sectors() as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} sectors")
                .expect("static template"),
        );
        bar.set_message(format!("erasing {name}"));
        bar
    };

    let mut report = |done: usize, total: usize| {
        bar.set_length(total as u64);
        bar.set_position(done as u64);
    };
    device
        .erase_area(area, Some(&mut report))
        .with_context(|| format!("erase area {name}"))?;
    bar.finish();

    let bytes = device.into_backend().into_bytes();
    fs::write(dump, bytes).with_context(|| format!("write dump {}", dump.display()))?;
    Ok(())
}
