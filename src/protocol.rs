//! Paco bootloader protocol constants.
//!
//! Opcodes are fixed single-byte values understood by every bootloader
//! revision. Which of them are worth issuing, and how large each
//! `BLOCK_WRITE` payload may be, depends on the bootloader version and is
//! described by a [`VersionProfile`].

use core::convert::TryFrom;
use core::fmt;
use core::str::FromStr;

use embedded_hal::serial::Write;

use crate::Error;

/// Option key for the number of payload bytes per `BLOCK_WRITE`
pub const OPT_BLOCK_SIZE: &str = "block-size";

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Opcode {
    /// No operation
    Nop = 0x00,

    /// Synchronise with the bootloader
    Sync = 0x10,

    /// Set the target address of the next block
    BlockAddr = 0x21,

    /// Write a single block of data
    BlockWrite = 0x22,

    /// Check the CRC of the last written block (`block-crc` bootloaders only)
    BlockCrc = 0x23,

    /// Leave the bootloader and execute the application
    Exec = 0x42,

    /// Drive the status LED
    Led = 0x51,

    /// Read the DIP switches
    Dip = 0x52,
}

impl Opcode {
    pub const ALL: [Opcode; 8] = [
        Opcode::Nop,
        Opcode::Sync,
        Opcode::BlockAddr,
        Opcode::BlockWrite,
        Opcode::BlockCrc,
        Opcode::Exec,
        Opcode::Led,
        Opcode::Dip,
    ];
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Opcode::ALL
            .iter()
            .copied()
            .find(|op| *op as u8 == v)
            .ok_or(Error::UnknownOpcode(v))
    }
}

/// Optional bootloader capabilities
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Capability {
    /// Blocks may be verified with `BLOCK_CRC`
    BlockCrc,
    /// The bootloader exposes an interactive shell over the UART
    UartShell,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::BlockCrc => "block-crc",
            Capability::UartShell => "uart-shell",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block-crc" => Ok(Capability::BlockCrc),
            "uart-shell" => Ok(Capability::UartShell),
            _ => Err(Error::UnknownCapability(s.to_string())),
        }
    }
}

/// Capabilities and numeric options of a single bootloader version
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct VersionProfile {
    flags: &'static [Capability],
    options: &'static [(&'static str, u32)],
}

impl VersionProfile {
    pub const fn new(
        flags: &'static [Capability],
        options: &'static [(&'static str, u32)],
    ) -> Self {
        Self { flags, options }
    }

    pub fn flags(&self) -> &'static [Capability] {
        self.flags
    }

    pub fn options(&self) -> &'static [(&'static str, u32)] {
        self.options
    }

    /// Check whether the bootloader supports a capability
    pub fn has(&self, cap: Capability) -> bool {
        self.flags.contains(&cap)
    }

    /// Fetch a named numeric option
    pub fn option(&self, name: &str) -> Option<u32> {
        self.options
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| *v)
    }

    /// Payload bytes per `BLOCK_WRITE`, if the version defines one
    pub fn block_size(&self) -> Option<usize> {
        self.option(OPT_BLOCK_SIZE).map(|v| v as usize)
    }
}

/// Profile used for unknown bootloader versions: no capabilities, no options
pub const DEFAULT_PROFILE: VersionProfile = VersionProfile::new(&[], &[]);

const CRC_8: VersionProfile =
    VersionProfile::new(&[Capability::BlockCrc], &[(OPT_BLOCK_SIZE, 8)]);
const SHELL_32: VersionProfile =
    VersionProfile::new(&[Capability::UartShell], &[(OPT_BLOCK_SIZE, 32)]);
const SHELL_8: VersionProfile =
    VersionProfile::new(&[Capability::UartShell], &[(OPT_BLOCK_SIZE, 8)]);

/// Known bootloader versions, ascending
pub static VERSIONS: [(u32, VersionProfile); 6] = [
    (5, CRC_8),
    (6, CRC_8),
    (7, SHELL_32),
    (8, SHELL_32),
    (9, SHELL_8),
    (10, SHELL_8),
];

/// Look up the profile for a bootloader version.
///
/// Unknown versions yield [`DEFAULT_PROFILE`] so they can still be driven
/// with the most conservative command subset.
pub fn lookup(version: u32) -> &'static VersionProfile {
    match VERSIONS.iter().find(|(v, _)| *v == version) {
        Some((_, p)) => p,
        None => {
            debug!("Unknown bootloader version {}, using default profile", version);
            &DEFAULT_PROFILE
        }
    }
}

/// Write a single opcode to a serial port, blocking until it is accepted
pub fn write_opcode<P, E>(port: &mut P, op: Opcode) -> Result<(), E>
where
    P: Write<u8, Error = E>,
{
    trace!("Writing opcode {:?} (0x{:02x})", op, op as u8);
    block!(port.write(op.into()))
}
