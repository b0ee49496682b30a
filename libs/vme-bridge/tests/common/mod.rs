//! Shared fixtures for the bridge integration tests

#![allow(dead_code)]
#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::sync::Arc;

use vme_bridge::simulator::{simulated_bridge, SimulatedCrate, SimulatedOpener};
use vme_bridge::{BridgeConfig, DeviceHandle, LinkArg, LinkTarget, VmeBridge};
use vme_model::BoardType;

pub struct Fixture {
    pub bridge: VmeBridge,
    pub opener: Arc<SimulatedOpener>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        let (bridge, opener) = simulated_bridge(config);
        Self { bridge, opener }
    }

    /// Open `board` on link 0 / node 0 with the argument kind it expects
    pub async fn open(&self, board: BoardType) -> (DeviceHandle, Arc<SimulatedCrate>) {
        let arg = default_arg(board);
        let target = LinkTarget::new(board, arg.clone(), 0).unwrap();
        let handle = self.bridge.open(board, arg, 0).await.unwrap();
        (handle, self.opener.crate_for(&target))
    }
}

pub fn default_arg(board: BoardType) -> LinkArg {
    match board.link_arg_kind() {
        vme_model::LinkArgKind::Index => LinkArg::Index(0),
        vme_model::LinkArgKind::Pid => LinkArg::Pid(1234),
        vme_model::LinkArgKind::Host => LinkArg::Host("192.168.1.10".to_string()),
    }
}

/// CONET board with IRQ, IACK and async support
pub const PCI_BRIDGE: BoardType = BoardType::V2718;
/// USB board: VME cycles but no interrupts
pub const USB_BRIDGE: BoardType = BoardType::V1718;
/// Board with the extended scaler and interrupt support
pub const V3718_PCIE: BoardType = BoardType::PcieA3818V3718;
