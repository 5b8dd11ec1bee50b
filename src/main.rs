#[macro_use]
extern crate log;

extern crate structopt;
use structopt::StructOpt;

extern crate simplelog;
use simplelog::{Config, LevelFilter, SimpleLogger};

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

use paco_loader::protocol::{lookup, Capability, Opcode, VersionProfile};
use paco_loader::{ChildProgress, IndicatifSink, ProgressBar, ProgressSink};

/// Block size assumed for bootloaders that do not advertise one
const FALLBACK_BLOCK_SIZE: usize = 8;

#[derive(Clone, Debug, StructOpt)]
pub struct Args {
    #[structopt(subcommand)]
    command: Command,

    /// Log level for console output
    #[structopt(long, default_value = "info")]
    log_level: LevelFilter,
}

#[derive(Clone, Debug, StructOpt)]
pub enum Command {
    /// Show capabilities and options for a bootloader version
    Profile {
        /// Bootloader version reported by the device
        bootloader: u32,

        /// Fail unless the version supports this capability (block-crc, uart-shell)
        #[structopt(long)]
        require: Vec<Capability>,
    },

    /// Split a firmware image into BLOCK_WRITE commands for a bootloader version
    Plan {
        /// Bootloader version reported by the device
        #[structopt(long, short = "b")]
        bootloader: u32,

        /// Base address of the image (hex)
        #[structopt(long, default_value = "0", parse(try_from_str = parse_hex))]
        address: u32,

        /// Show an indicatif progress bar instead of the console ticker
        #[structopt(long)]
        fancy: bool,

        /// Firmware image to split
        file: PathBuf,
    },
}

fn parse_hex(s: &str) -> Result<u32, std::num::ParseIntError> {
    u32::from_str_radix(s.trim_start_matches("0x"), 16)
}

fn main() -> anyhow::Result<()> {
    // Parse out arguments
    let o = Args::from_args();

    // Configure logger
    let _ = SimpleLogger::init(o.log_level, Config::default());

    match o.command {
        Command::Profile {
            bootloader,
            require,
        } => {
            show_profile(bootloader);
            check_capabilities(bootloader, &require)?;
        }
        Command::Plan {
            bootloader,
            address,
            fancy,
            file,
        } => plan(bootloader, address, fancy, &file)?,
    }

    Ok(())
}

fn show_profile(version: u32) {
    let p = lookup(version);

    println!("Bootloader version {}", version);

    if p.flags().is_empty() && p.options().is_empty() {
        println!("  unknown version, no capabilities");
        return;
    }

    for f in p.flags() {
        println!("  flag: {}", f);
    }
    for (k, v) in p.options() {
        println!("  {}: {}", k, v);
    }
}

fn check_capabilities(version: u32, required: &[Capability]) -> anyhow::Result<()> {
    let p = lookup(version);

    match required.iter().find(|c| !p.has(**c)) {
        Some(c) => Err(anyhow!("bootloader version {} does not support {}", version, c)),
        None => Ok(()),
    }
}

fn plan(version: u32, address: u32, fancy: bool, file: &Path) -> anyhow::Result<()> {
    let data = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    if data.is_empty() {
        warn!("Image is empty, nothing to write");
        return Ok(());
    }

    let profile = lookup(version);
    let block_size = profile.block_size().unwrap_or_else(|| {
        warn!(
            "Bootloader version {} has no block size, assuming {} bytes",
            version, FALLBACK_BLOCK_SIZE
        );
        FALLBACK_BLOCK_SIZE
    });

    let blocks = (data.len() + block_size - 1) / block_size;
    info!(
        "Image: {} in {} blocks of {} bytes",
        bytefmt::format(data.len() as u64),
        blocks,
        block_size
    );

    if fancy {
        let bar = indicatif::ProgressBar::new(blocks as u64);
        let mut sink = IndicatifSink::with_scale(bar, blocks as f64);
        write_blocks(profile, address, &data, block_size, &mut sink)?;
        sink.finish()?;
    } else {
        let mut bar = ProgressBar::stdout(0.0, 1.0)?;
        let mut top = bar.scope();
        write_blocks(profile, address, &data, block_size, &mut *top)?;
        top.close()?;
    }

    info!("Planned {} BLOCK_WRITE commands", blocks);

    Ok(())
}

fn write_blocks<S: ProgressSink>(
    profile: &VersionProfile,
    address: u32,
    data: &[u8],
    block_size: usize,
    parent: S,
) -> anyhow::Result<()> {
    let blocks = data.chunks(block_size).len();
    let mut progress = ChildProgress::new(0.0, blocks as f64, parent)?;
    let mut p = progress.scope();

    for (i, chunk) in data.chunks(block_size).enumerate() {
        let addr = address
            .checked_add((i * block_size) as u32)
            .ok_or_else(|| anyhow!("block {} exceeds the address space", i))?;

        trace!("{:?} 0x{:08x}", Opcode::BlockAddr, addr);
        trace!("{:?} {}", Opcode::BlockWrite, hex::encode(chunk));
        if profile.has(Capability::BlockCrc) {
            trace!("{:?}", Opcode::BlockCrc);
        }

        p.increment(1.0)?;
    }

    p.close()?;

    Ok(())
}
