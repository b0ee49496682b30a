//! Which operations each board type can perform

use std::fmt;

use crate::board::{BoardType, BridgeModel, Controller, LinkKind};

/// Optional functionality gated by board model or link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Any VME data, address-only or block cycle
    VmeCycles,
    Iack,
    Irq,
    AsyncBlt,
    DeviceReset,
    SystemReset,
    BusArbitration,
    LocationMonitor,
    Pulser,
    LegacyScaler,
    ExtendedScaler,
    IoLines,
    Display,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::VmeCycles => "VME cycles",
            Feature::Iack => "IACK cycle",
            Feature::Irq => "IRQ management",
            Feature::AsyncBlt => "asynchronous block transfer",
            Feature::DeviceReset => "device reset",
            Feature::SystemReset => "VME system reset",
            Feature::BusArbitration => "bus arbitration settings",
            Feature::LocationMonitor => "location monitor",
            Feature::Pulser => "pulser",
            Feature::LegacyScaler => "scaler",
            Feature::ExtendedScaler => "extended scaler",
            Feature::IoLines => "I/O lines",
            Feature::Display => "display",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BoardType {
    /// Capability check against the board/link table
    pub fn supports(self, feature: Feature) -> bool {
        let bridge = self.bridge();
        let vme = !self.is_local() && bridge.is_some();
        let front_panel = matches!(
            bridge,
            Some(BridgeModel::V1718 | BridgeModel::V2718 | BridgeModel::V3718)
        );

        match feature {
            Feature::VmeCycles => vme,
            // Interrupt handling rides on the optical controller
            Feature::Iack | Feature::Irq => vme && self.link_kind() == LinkKind::PciConet,
            // Needs a link that can stream a burst while the caller moves on
            Feature::AsyncBlt => {
                vme && matches!(self.link_kind(), LinkKind::PciConet | LinkKind::Ethernet)
                    && cfg!(not(windows))
            },
            Feature::DeviceReset => matches!(
                self.controller(),
                Some(Controller::A2818 | Controller::A3818)
            ),
            Feature::SystemReset | Feature::BusArbitration => bridge.is_some(),
            Feature::LocationMonitor | Feature::LegacyScaler => matches!(
                bridge,
                Some(BridgeModel::V1718 | BridgeModel::V2718)
            ),
            Feature::ExtendedScaler => bridge == Some(BridgeModel::V3718),
            Feature::Pulser | Feature::IoLines | Feature::Display => front_panel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_handles_cannot_issue_cycles() {
        assert!(!BoardType::PcieA3818V3718Local.supports(Feature::VmeCycles));
        assert!(!BoardType::A2818.supports(Feature::VmeCycles));
        assert!(BoardType::PcieA3818V3718.supports(Feature::VmeCycles));
        assert!(BoardType::V1718.supports(Feature::VmeCycles));
    }

    #[test]
    fn test_iack_and_irq_are_conet_only() {
        assert!(!BoardType::V1718.supports(Feature::Iack));
        assert!(!BoardType::UsbV3718.supports(Feature::Irq));
        assert!(!BoardType::UsbA4818V2718.supports(Feature::Irq));
        assert!(BoardType::V2718.supports(Feature::Iack));
        assert!(BoardType::PcieA5818V4718.supports(Feature::Irq));
    }

    #[test]
    #[cfg(not(windows))]
    fn test_async_blt_links() {
        assert!(BoardType::V2718.supports(Feature::AsyncBlt));
        assert!(BoardType::EthV4718.supports(Feature::AsyncBlt));
        assert!(!BoardType::EthV4718Local.supports(Feature::AsyncBlt));
        assert!(!BoardType::V1718.supports(Feature::AsyncBlt));
        assert!(!BoardType::UsbA4818V2718.supports(Feature::AsyncBlt));
    }

    #[test]
    fn test_device_reset_controllers() {
        assert!(BoardType::A2818.supports(Feature::DeviceReset));
        assert!(BoardType::A3818.supports(Feature::DeviceReset));
        assert!(BoardType::PcieA3818V3718.supports(Feature::DeviceReset));
        assert!(!BoardType::A5818.supports(Feature::DeviceReset));
        assert!(!BoardType::V1718.supports(Feature::DeviceReset));
    }

    #[test]
    fn test_scaler_generations() {
        assert!(BoardType::V1718.supports(Feature::LegacyScaler));
        assert!(!BoardType::V1718.supports(Feature::ExtendedScaler));
        assert!(BoardType::UsbV3718.supports(Feature::ExtendedScaler));
        assert!(!BoardType::UsbV3718.supports(Feature::LegacyScaler));
        assert!(!BoardType::EthV4718.supports(Feature::ExtendedScaler));
    }

    #[test]
    fn test_front_panel_features() {
        assert!(BoardType::V2718.supports(Feature::Pulser));
        assert!(BoardType::PciA2818V3718.supports(Feature::IoLines));
        assert!(!BoardType::EthV4718.supports(Feature::Pulser));
        assert!(BoardType::EthV4718.supports(Feature::BusArbitration));
        assert!(!BoardType::A3818.supports(Feature::BusArbitration));
    }
}
