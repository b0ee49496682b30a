//! VME bridge core
//!
//! Handle-scoped access to CAEN-style VME bridges: single, batch, block and
//! asynchronous cycles, interrupt handling, bus configuration, front-panel
//! peripherals and flash. Physical links plug in through
//! [`transport::BridgeTransport`]; [`simulator`] provides an in-memory crate.
//!
//! ```no_run
//! # async fn demo() -> vme_errors::VmeResult<()> {
//! use vme_bridge::{simulator, BridgeConfig, LinkArg};
//! use vme_model::{AddressModifier, BoardType, DataWidth};
//!
//! let (bridge, _opener) = simulator::simulated_bridge(BridgeConfig::default());
//! let handle = bridge.open(BoardType::V2718, LinkArg::Index(0), 0).await?;
//! let value = bridge
//!     .read_cycle(handle, 0x0010_0000, AddressModifier::A32UData, DataWidth::D32)
//!     .await?;
//! # let _ = value;
//! bridge.close(handle).await?;
//! # Ok(())
//! # }
//! ```

pub mod async_blt;
pub mod bridge;
pub mod bus_config;
pub mod config;
pub mod cycles;
pub mod irq;
pub mod link;
pub mod peripherals;
pub mod registers;
pub mod registry;
pub mod session;
pub mod simulator;
pub mod transport;

pub use bridge::VmeBridge;
pub use bus_config::{BusConfig, LocationMonitor};
pub use config::BridgeConfig;
pub use cycles::{BlockTransfer, CycleOutcome, CycleRequest};
pub use link::{LinkArg, LinkKey, LinkTarget};
pub use peripherals::{
    DisplaySnapshot, ExtendedScalerConfig, ExtendedScalerSetting, InputConfig, OutputConfig,
    PulserConfig, ScalerConfig,
};
pub use registry::TransportRegistry;
pub use session::{DeviceHandle, SessionState};
pub use transport::{
    BlockRequest, BridgeAction, BridgeSetting, BridgeTransport, BurstOutcome, FlashGeometry,
    LinkOpener,
};

pub use vme_errors::{ErrorCode, VmeError, VmeResult};
