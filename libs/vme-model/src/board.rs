//! Board models and how each one is reached

use std::fmt;

wire_enum! {
    /// Board type passed to `open`
    ///
    /// `*Local` variants address the internal registers of the bridge (or
    /// controller) itself; they cannot issue VME cycles.
    pub enum BoardType: i32 {
        V1718 = 0,
        V2718 = 1,
        A2818 = 2,
        A2719 = 3,
        A3818 = 4,
        UsbA4818V2718Local = 5,
        UsbA4818V2718 = 6,
        UsbA4818Local = 7,
        UsbA4818V3718Local = 8,
        UsbA4818V3718 = 9,
        UsbA4818V4718Local = 10,
        UsbA4818V4718 = 11,
        UsbA4818 = 12,
        UsbA4818A2719Local = 13,
        UsbV3718Local = 14,
        PciA2818V3718Local = 15,
        PcieA3818V3718Local = 16,
        UsbV3718 = 17,
        PciA2818V3718 = 18,
        PcieA3818V3718 = 19,
        UsbV4718Local = 20,
        PciA2818V4718Local = 21,
        PcieA3818V4718Local = 22,
        EthV4718Local = 23,
        UsbV4718 = 24,
        PciA2818V4718 = 25,
        PcieA3818V4718 = 26,
        EthV4718 = 27,
        A5818 = 28,
        PcieA5818V3718Local = 29,
        PcieA5818V3718 = 30,
        PcieA5818V4718Local = 31,
        PcieA5818V4718 = 32,
    }
}

/// Physical link family used to reach a board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Direct USB to the bridge (V1718, V3718, V4718)
    Usb,
    /// USB to an A4818 adapter, then CONET optical link
    UsbConet,
    /// PCI/PCIe optical controller (A2818, A3818, A5818), then CONET
    PciConet,
    /// Ethernet to a V4718
    Ethernet,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::Usb => "usb",
            LinkKind::UsbConet => "usb_conet",
            LinkKind::PciConet => "pci_conet",
            LinkKind::Ethernet => "eth",
        }
    }

    /// Whether the link is an optical daisy chain with node addressing
    pub fn is_conet(&self) -> bool {
        matches!(self, LinkKind::UsbConet | LinkKind::PciConet)
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of link argument a board type expects at open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkArgKind {
    /// USB device number or optical link number
    Index,
    /// Adapter PID (A4818, USB V4718)
    Pid,
    /// Hostname or IPv4 address (Ethernet V4718)
    Host,
}

/// VME master the board type ultimately talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BridgeModel {
    V1718,
    V2718,
    V3718,
    V4718,
}

impl BridgeModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeModel::V1718 => "V1718",
            BridgeModel::V2718 => "V2718",
            BridgeModel::V3718 => "V3718",
            BridgeModel::V4718 => "V4718",
        }
    }
}

/// Host-side optical or USB controller in front of a CONET chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Controller {
    A2818,
    A3818,
    A5818,
    A4818,
    A2719,
}

impl BoardType {
    pub fn link_kind(self) -> LinkKind {
        use BoardType::*;
        match self {
            V1718 | UsbV3718Local | UsbV3718 | UsbV4718Local | UsbV4718 => LinkKind::Usb,
            UsbA4818V2718Local | UsbA4818V2718 | UsbA4818Local | UsbA4818V3718Local
            | UsbA4818V3718 | UsbA4818V4718Local | UsbA4818V4718 | UsbA4818
            | UsbA4818A2719Local => LinkKind::UsbConet,
            EthV4718Local | EthV4718 => LinkKind::Ethernet,
            V2718 | A2818 | A2719 | A3818 | PciA2818V3718Local | PcieA3818V3718Local
            | PciA2818V3718 | PcieA3818V3718 | PciA2818V4718Local | PcieA3818V4718Local
            | PciA2818V4718 | PcieA3818V4718 | A5818 | PcieA5818V3718Local | PcieA5818V3718
            | PcieA5818V4718Local | PcieA5818V4718 => LinkKind::PciConet,
        }
    }

    pub fn link_arg_kind(self) -> LinkArgKind {
        match self.link_kind() {
            LinkKind::UsbConet => LinkArgKind::Pid,
            LinkKind::Ethernet => LinkArgKind::Host,
            LinkKind::Usb if self.bridge() == Some(BridgeModel::V4718) => LinkArgKind::Pid,
            LinkKind::Usb | LinkKind::PciConet => LinkArgKind::Index,
        }
    }

    /// The VME bridge behind this board type, if any
    pub fn bridge(self) -> Option<BridgeModel> {
        use BoardType::*;
        match self {
            V1718 => Some(BridgeModel::V1718),
            // A bare A4818 behaves like the V2718 variant
            V2718 | UsbA4818V2718Local | UsbA4818V2718 | UsbA4818 => Some(BridgeModel::V2718),
            UsbA4818V3718Local | UsbA4818V3718 | UsbV3718Local | PciA2818V3718Local
            | PcieA3818V3718Local | UsbV3718 | PciA2818V3718 | PcieA3818V3718
            | PcieA5818V3718Local | PcieA5818V3718 => Some(BridgeModel::V3718),
            UsbA4818V4718Local | UsbA4818V4718 | UsbV4718Local | PciA2818V4718Local
            | PcieA3818V4718Local | EthV4718Local | UsbV4718 | PciA2818V4718 | PcieA3818V4718
            | EthV4718 | PcieA5818V4718Local | PcieA5818V4718 => Some(BridgeModel::V4718),
            A2818 | A2719 | A3818 | UsbA4818Local | UsbA4818A2719Local | A5818 => None,
        }
    }

    /// The host controller in front of the CONET chain, if any
    pub fn controller(self) -> Option<Controller> {
        use BoardType::*;
        match self {
            // Classic V2718 pairing
            V2718 | A2818 | PciA2818V3718Local | PciA2818V3718 | PciA2818V4718Local
            | PciA2818V4718 => Some(Controller::A2818),
            A3818 | PcieA3818V3718Local | PcieA3818V3718 | PcieA3818V4718Local
            | PcieA3818V4718 => Some(Controller::A3818),
            A5818 | PcieA5818V3718Local | PcieA5818V3718 | PcieA5818V4718Local
            | PcieA5818V4718 => Some(Controller::A5818),
            A2719 => Some(Controller::A2719),
            UsbA4818V2718Local | UsbA4818V2718 | UsbA4818Local | UsbA4818V3718Local
            | UsbA4818V3718 | UsbA4818V4718Local | UsbA4818V4718 | UsbA4818
            | UsbA4818A2719Local => Some(Controller::A4818),
            V1718 | UsbV3718Local | UsbV3718 | UsbV4718Local | UsbV4718 | EthV4718Local
            | EthV4718 => None,
        }
    }

    /// Handle reaches only internal registers, never the VME bus
    pub fn is_local(self) -> bool {
        use BoardType::*;
        matches!(
            self,
            A2818
                | A2719
                | A3818
                | A5818
                | UsbA4818V2718Local
                | UsbA4818Local
                | UsbA4818V3718Local
                | UsbA4818V4718Local
                | UsbA4818A2719Local
                | UsbV3718Local
                | PciA2818V3718Local
                | PcieA3818V3718Local
                | UsbV4718Local
                | PciA2818V4718Local
                | PcieA3818V4718Local
                | EthV4718Local
                | PcieA5818V3718Local
                | PcieA5818V4718Local
        )
    }

    pub fn name(self) -> String {
        format!("{:?}", self)
    }
}

impl fmt::Display for BoardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_discriminants_are_contiguous() {
        for (i, board) in BoardType::ALL.iter().enumerate() {
            assert_eq!(board.as_raw(), i as i32);
            assert_eq!(BoardType::from_raw(i as i32), Some(*board));
        }
        assert_eq!(BoardType::ALL.len(), 33);
        assert_eq!(BoardType::from_raw(-1), None);
        assert_eq!(BoardType::from_raw(33), None);
    }

    #[test]
    fn test_link_arg_kinds() {
        assert_eq!(BoardType::V1718.link_arg_kind(), LinkArgKind::Index);
        assert_eq!(BoardType::A3818.link_arg_kind(), LinkArgKind::Index);
        assert_eq!(BoardType::UsbA4818V3718.link_arg_kind(), LinkArgKind::Pid);
        assert_eq!(BoardType::UsbV4718.link_arg_kind(), LinkArgKind::Pid);
        assert_eq!(BoardType::UsbV3718.link_arg_kind(), LinkArgKind::Index);
        assert_eq!(BoardType::EthV4718.link_arg_kind(), LinkArgKind::Host);
    }

    #[test]
    fn test_every_non_local_board_has_a_bridge() {
        for board in BoardType::ALL {
            if !board.is_local() {
                assert!(board.bridge().is_some(), "{board} has no bridge");
            }
        }
    }

    #[test]
    fn test_local_variants_pair_with_remote_ones() {
        assert!(BoardType::PcieA3818V4718Local.is_local());
        assert!(!BoardType::PcieA3818V4718.is_local());
        assert_eq!(
            BoardType::PcieA3818V4718Local.bridge(),
            BoardType::PcieA3818V4718.bridge()
        );
    }

    #[test]
    fn test_serde_uses_variant_names() {
        let json = serde_json::to_string(&BoardType::PcieA5818V4718).unwrap();
        assert_eq!(json, "\"PcieA5818V4718\"");
        let link: LinkKind = serde_json::from_str("\"pci_conet\"").unwrap();
        assert_eq!(link, LinkKind::PciConet);
    }
}
