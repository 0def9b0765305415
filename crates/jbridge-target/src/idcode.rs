//! JTAG IDCODE layout.
//!
//! ```text
//!  31    28 27                12 11              1  0
//! ┌────────┬────────────────────┬─────────────────┬───┐
//! │version │    part number     │  designer JEP106│ 1 │
//! └────────┴────────────────────┴─────────────────┴───┘
//! ```
//!
//! The target's debug access port answers `0x4BA0_0477`: an ARM-designed
//! JTAG-DP, part `0xBA00`, revision 4.

/// IDCODE the target's debug access port must report.
pub const EXPECTED_IDCODE: u32 = 0x4BA0_0477;

/// JEP106 designer code assigned to ARM Ltd.
pub const DESIGNER_ARM: u16 = 0x23B;

/// Decoded JTAG IDCODE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdCode(u32);

impl IdCode {
    /// Wrap a raw IDCODE.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw register value.
    #[must_use]
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Revision field (bits 31:28).
    #[must_use]
    pub const fn version(&self) -> u8 {
        (self.0 >> 28) as u8
    }

    /// Part number (bits 27:12).
    #[must_use]
    pub const fn part_number(&self) -> u16 {
        ((self.0 >> 12) & 0xFFFF) as u16
    }

    /// JEP106 designer code (bits 11:1).
    #[must_use]
    pub const fn designer(&self) -> u16 {
        ((self.0 >> 1) & 0x7FF) as u16
    }

    /// IEEE 1149.1 requires bit 0 to read as one. All-zero and all-one
    /// values are what a disconnected or stuck chain shifts out.
    #[must_use]
    pub const fn is_plausible(&self) -> bool {
        self.0 & 1 == 1 && self.0 != u32::MAX
    }
}

impl std::fmt::Display for IdCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:08X} (designer {:03x}, part {:04x}, rev {})",
            self.0,
            self.designer(),
            self.part_number(),
            self.version()
        )
    }
}
