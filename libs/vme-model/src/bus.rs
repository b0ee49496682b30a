//! VME bus constants: address modifiers, data widths, IRQ levels and
//! arbitration settings

use serde::{Deserialize, Serialize};
use std::fmt;
use vme_errors::{VmeError, VmeResult};

// ============================================================================
// Address modifiers
// ============================================================================

wire_enum! {
    /// VME address modifier codes
    pub enum AddressModifier: u8 {
        A16S = 0x2D,
        A16U = 0x29,
        A16Lck = 0x2C,

        A24SBlt = 0x3F,
        A24SPgm = 0x3E,
        A24SData = 0x3D,
        A24SMblt = 0x3C,
        A24UBlt = 0x3B,
        A24UPgm = 0x3A,
        A24UData = 0x39,
        A24UMblt = 0x38,
        A24Lck = 0x32,

        A32SBlt = 0x0F,
        A32SPgm = 0x0E,
        A32SData = 0x0D,
        A32SMblt = 0x0C,
        A32UBlt = 0x0B,
        A32UPgm = 0x0A,
        A32UData = 0x09,
        A32UMblt = 0x08,
        A32Lck = 0x05,

        CrCsr = 0x2F,

        A40Blt = 0x37,
        A40Lck = 0x35,
        A40 = 0x34,

        A64 = 0x01,
        A64Blt = 0x03,
        A64Mblt = 0x00,
        A64Lck = 0x04,

        A3U2eVme = 0x21,
        A6U2eVme = 0x20,
    }
}

/// Address space selected by an address modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AddressSpace {
    A16,
    A24,
    A32,
    CrCsr,
    A40,
    A64,
}

impl AddressSpace {
    /// Highest address reachable through the 32-bit address argument
    pub fn max_address(self) -> u32 {
        match self {
            AddressSpace::A16 => 0xFFFF,
            AddressSpace::A24 | AddressSpace::CrCsr => 0x00FF_FFFF,
            AddressSpace::A32 | AddressSpace::A40 | AddressSpace::A64 => u32::MAX,
        }
    }
}

/// Cycle class encoded in an address modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleClass {
    /// Program, data, supervisory/non-privileged or CR/CSR single access
    Single,
    Lock,
    Blt,
    Mblt,
    TwoEdge,
}

impl AddressModifier {
    pub fn space(self) -> AddressSpace {
        use AddressModifier::*;
        match self {
            A16S | A16U | A16Lck => AddressSpace::A16,
            A24SBlt | A24SPgm | A24SData | A24SMblt | A24UBlt | A24UPgm | A24UData | A24UMblt
            | A24Lck => AddressSpace::A24,
            A32SBlt | A32SPgm | A32SData | A32SMblt | A32UBlt | A32UPgm | A32UData | A32UMblt
            | A32Lck => AddressSpace::A32,
            CrCsr => AddressSpace::CrCsr,
            A40Blt | A40Lck | A40 => AddressSpace::A40,
            A64 | A64Blt | A64Mblt | A64Lck => AddressSpace::A64,
            // 2eVME carries its own extended addressing; treat as A32 for range checks
            A3U2eVme | A6U2eVme => AddressSpace::A32,
        }
    }

    pub fn class(self) -> CycleClass {
        use AddressModifier::*;
        match self {
            A16Lck | A24Lck | A32Lck | A40Lck | A64Lck => CycleClass::Lock,
            A24SBlt | A24UBlt | A32SBlt | A32UBlt | A40Blt | A64Blt => CycleClass::Blt,
            A24SMblt | A24UMblt | A32SMblt | A32UMblt | A64Mblt => CycleClass::Mblt,
            A3U2eVme | A6U2eVme => CycleClass::TwoEdge,
            A16S | A16U | A24SPgm | A24SData | A24UPgm | A24UData | A32SPgm | A32SData
            | A32UPgm | A32UData | CrCsr | A40 | A64 => CycleClass::Single,
        }
    }

    /// Supervisory access; `None` where the code does not encode privilege
    pub fn is_supervisory(self) -> Option<bool> {
        use AddressModifier::*;
        match self {
            A16S | A24SBlt | A24SPgm | A24SData | A24SMblt | A32SBlt | A32SPgm | A32SData
            | A32SMblt => Some(true),
            A16U | A24UBlt | A24UPgm | A24UData | A24UMblt | A32UBlt | A32UPgm | A32UData
            | A32UMblt => Some(false),
            _ => None,
        }
    }
}

impl fmt::Display for AddressModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:#04x})", self, self.as_raw())
    }
}

// ============================================================================
// Data widths
// ============================================================================

/// Swap flag OR-ed into the base width code
pub const DATA_WIDTH_SWAP: u8 = 0x10;

wire_enum! {
    /// Data width of a cycle; swapped variants reverse bytes within each unit
    pub enum DataWidth: u8 {
        D8 = 0x01,
        D16 = 0x02,
        D32 = 0x04,
        D64 = 0x08,
        D16Swapped = 0x12,
        D32Swapped = 0x14,
        D64Swapped = 0x18,
    }
}

impl DataWidth {
    /// Unit size in bytes
    pub fn bytes(self) -> usize {
        (self.as_raw() & !DATA_WIDTH_SWAP) as usize
    }

    pub fn is_swapped(self) -> bool {
        self.as_raw() & DATA_WIDTH_SWAP != 0
    }

    /// The width with the swap flag removed
    pub fn unswapped(self) -> DataWidth {
        match self {
            DataWidth::D16Swapped => DataWidth::D16,
            DataWidth::D32Swapped => DataWidth::D32,
            DataWidth::D64Swapped => DataWidth::D64,
            other => other,
        }
    }

    pub fn is_d64(self) -> bool {
        self.unswapped() == DataWidth::D64
    }

    /// Mask covering one unit's worth of value bits
    pub fn value_mask(self) -> u64 {
        match self.bytes() {
            8 => u64::MAX,
            n => (1u64 << (n * 8)) - 1,
        }
    }

    /// Reverse the bytes of `value` within one unit of this width
    pub fn swap_value(self, value: u64) -> u64 {
        match self.bytes() {
            2 => u64::from((value as u16).swap_bytes()),
            4 => u64::from((value as u32).swap_bytes()),
            8 => value.swap_bytes(),
            _ => value & 0xFF,
        }
    }
}

// ============================================================================
// Interrupts
// ============================================================================

wire_enum! {
    /// VME interrupt level as a one-hot line bit
    pub enum IrqLevel: u8 {
        Irq1 = 0x01,
        Irq2 = 0x02,
        Irq3 = 0x04,
        Irq4 = 0x08,
        Irq5 = 0x10,
        Irq6 = 0x20,
        Irq7 = 0x40,
    }
}

impl IrqLevel {
    /// Level number, 1..=7
    pub fn number(self) -> u8 {
        self.as_raw().trailing_zeros() as u8 + 1
    }

    pub fn from_number(level: u8) -> Option<Self> {
        if (1..=7).contains(&level) {
            Self::from_raw(1 << (level - 1))
        } else {
            None
        }
    }
}

/// Bitmask over the seven IRQ lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IrqMask(u8);

impl IrqMask {
    pub const NONE: IrqMask = IrqMask(0);
    pub const ALL: IrqMask = IrqMask(0x7F);

    /// Validate a raw mask; bits above IRQ7 are rejected
    pub fn new(raw: u32) -> VmeResult<Self> {
        if raw & !0x7F != 0 {
            return Err(VmeError::invalid_param(
                "irq_mask",
                format!("{raw:#x} has bits outside 0x7f"),
            ));
        }
        Ok(IrqMask(raw as u8))
    }

    /// Keep only the seven line bits
    pub fn truncate(raw: u8) -> Self {
        IrqMask(raw & 0x7F)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, level: IrqLevel) -> bool {
        self.0 & level.as_raw() != 0
    }

    pub fn union(self, other: IrqMask) -> IrqMask {
        IrqMask(self.0 | other.0)
    }

    pub fn intersection(self, other: IrqMask) -> IrqMask {
        IrqMask(self.0 & other.0)
    }

    pub fn difference(self, other: IrqMask) -> IrqMask {
        IrqMask(self.0 & !other.0)
    }

    pub fn levels(self) -> impl Iterator<Item = IrqLevel> {
        IrqLevel::ALL
            .iter()
            .copied()
            .filter(move |level| self.contains(*level))
    }
}

impl From<IrqLevel> for IrqMask {
    fn from(level: IrqLevel) -> Self {
        IrqMask(level.as_raw())
    }
}

impl fmt::Display for IrqMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

// ============================================================================
// Bus arbitration and timeout
// ============================================================================

wire_enum! {
    pub enum ArbiterType: i32 {
        Priorized = 0,
        RoundRobin = 1,
    }
}

wire_enum! {
    pub enum RequesterType: i32 {
        Fair = 0,
        Demand = 1,
    }
}

wire_enum! {
    pub enum ReleaseType: i32 {
        /// Release when done
        Rwd = 0,
        /// Release on request
        Ror = 1,
    }
}

wire_enum! {
    pub enum BusRequestLevel: i32 {
        Br0 = 0,
        Br1 = 1,
        Br2 = 2,
        Br3 = 3,
    }
}

wire_enum! {
    pub enum VmeTimeout: i32 {
        Timeout50us = 0,
        Timeout400us = 1,
    }
}

impl Default for ArbiterType {
    fn default() -> Self {
        ArbiterType::Priorized
    }
}

impl Default for RequesterType {
    fn default() -> Self {
        RequesterType::Fair
    }
}

impl Default for ReleaseType {
    fn default() -> Self {
        ReleaseType::Rwd
    }
}

impl Default for BusRequestLevel {
    fn default() -> Self {
        BusRequestLevel::Br3
    }
}

impl Default for VmeTimeout {
    fn default() -> Self {
        VmeTimeout::Timeout50us
    }
}

impl VmeTimeout {
    pub fn as_duration(self) -> std::time::Duration {
        match self {
            VmeTimeout::Timeout50us => std::time::Duration::from_micros(50),
            VmeTimeout::Timeout400us => std::time::Duration::from_micros(400),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_address_modifier_values() {
        assert_eq!(AddressModifier::A32UData.as_raw(), 0x09);
        assert_eq!(AddressModifier::A24SMblt.as_raw(), 0x3C);
        assert_eq!(AddressModifier::A64Mblt.as_raw(), 0x00);
        assert_eq!(AddressModifier::from_raw(0x2F), Some(AddressModifier::CrCsr));
        assert_eq!(AddressModifier::from_raw(0x10), None);
        assert!(AddressModifier::try_from(0x7Fu8).is_err());
        assert_eq!(AddressModifier::ALL.len(), 31);
    }

    #[test]
    fn test_address_modifier_classes() {
        assert_eq!(AddressModifier::A24UBlt.class(), CycleClass::Blt);
        assert_eq!(AddressModifier::A32SMblt.class(), CycleClass::Mblt);
        assert_eq!(AddressModifier::A16Lck.class(), CycleClass::Lock);
        assert_eq!(AddressModifier::CrCsr.class(), CycleClass::Single);
        assert_eq!(AddressModifier::A6U2eVme.class(), CycleClass::TwoEdge);
        assert_eq!(AddressModifier::A16U.space(), AddressSpace::A16);
        assert_eq!(AddressModifier::A24SData.is_supervisory(), Some(true));
        assert_eq!(AddressModifier::CrCsr.is_supervisory(), None);
    }

    #[test]
    fn test_data_width_helpers() {
        assert_eq!(DataWidth::D32Swapped.as_raw(), 0x14);
        assert_eq!(DataWidth::D32Swapped.bytes(), 4);
        assert_eq!(DataWidth::D64Swapped.unswapped(), DataWidth::D64);
        assert!(DataWidth::D16Swapped.is_swapped());
        assert!(!DataWidth::D8.is_swapped());
        assert_eq!(DataWidth::D16.value_mask(), 0xFFFF);
        assert_eq!(DataWidth::D32.swap_value(0x1122_3344), 0x4433_2211);
        assert_eq!(DataWidth::D16.swap_value(0xAABB), 0xBBAA);
    }

    #[test]
    fn test_irq_levels_and_masks() {
        assert_eq!(IrqLevel::Irq1.number(), 1);
        assert_eq!(IrqLevel::Irq7.number(), 7);
        assert_eq!(IrqLevel::from_number(3), Some(IrqLevel::Irq3));
        assert_eq!(IrqLevel::from_number(0), None);
        assert_eq!(IrqLevel::from_number(8), None);

        assert!(IrqMask::new(0x80).is_err());
        let mask = IrqMask::new(0b101).unwrap();
        assert!(mask.contains(IrqLevel::Irq1));
        assert!(!mask.contains(IrqLevel::Irq2));
        assert_eq!(
            mask.levels().collect::<Vec<_>>(),
            vec![IrqLevel::Irq1, IrqLevel::Irq3]
        );
        assert_eq!(mask.difference(IrqLevel::Irq1.into()).bits(), 0b100);
    }

    #[test]
    fn test_bus_defaults() {
        assert_eq!(ArbiterType::default(), ArbiterType::Priorized);
        assert_eq!(BusRequestLevel::default().as_raw(), 3);
        assert_eq!(VmeTimeout::Timeout400us.as_raw(), 1);
    }
}
