//! Boundary with the physical link drivers
//!
//! A `BridgeTransport` is one open link to one bridge. The core validates
//! every request before it reaches the transport, splits block transfers into
//! bursts, and owns all cached state; the transport only moves bytes and
//! encodes settings into whatever register layout its firmware uses.

use async_trait::async_trait;
use bytes::Bytes;
use vme_errors::{VmeError, VmeResult};
use vme_model::{
    AddressModifier, ArbiterType, BusRequestLevel, DataWidth, InputSelect, IrqLevel, IrqMask,
    LinkKind, OutputSelect, PulserSelect, ReleaseType, RequesterType, VmeTimeout,
};

use crate::bus_config::LocationMonitor;
use crate::link::LinkTarget;
use crate::peripherals::display::DisplaySnapshot;
use crate::peripherals::io_lines::{InputConfig, OutputConfig};
use crate::peripherals::pulser::PulserConfig;
use crate::peripherals::scaler::{ExtendedScalerSetting, ScalerConfig};

// ============================================================================
// Request / outcome types
// ============================================================================

/// One block burst. `width` never carries the swap flag here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRequest {
    pub address: u32,
    pub am: AddressModifier,
    pub width: DataWidth,
    /// Bytes in this burst, a multiple of the width
    pub len: usize,
    /// false: every beat targets `address` (FIFO addressing)
    pub increment: bool,
}

/// Result of one burst. `transferred` bytes completed before `error` (if any)
/// stopped the burst; for reads `data` holds exactly those bytes, one
/// little-endian unit per beat.
#[derive(Debug, Default)]
pub struct BurstOutcome {
    pub data: Bytes,
    pub transferred: usize,
    pub error: Option<VmeError>,
}

impl BurstOutcome {
    pub fn complete(data: Bytes) -> Self {
        Self {
            transferred: data.len(),
            data,
            error: None,
        }
    }

    pub fn written(transferred: usize) -> Self {
        Self {
            data: Bytes::new(),
            transferred,
            error: None,
        }
    }

    pub fn failed(data: Bytes, transferred: usize, error: VmeError) -> Self {
        Self {
            data,
            transferred,
            error: Some(error),
        }
    }
}

/// Flash layout reported by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
    pub page_size: usize,
    pub page_count: u32,
}

/// Persistent configuration pushed to the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeSetting {
    Arbiter(ArbiterType),
    Requester(RequesterType),
    Release(ReleaseType),
    BusRequestLevel(BusRequestLevel),
    BusTimeout(VmeTimeout),
    LocationMonitor(LocationMonitor),
    Pulser(PulserSelect, PulserConfig),
    Scaler(ScalerConfig),
    ExtendedScaler(ExtendedScalerSetting),
    Input(InputSelect, InputConfig),
    Output(OutputSelect, OutputConfig),
}

/// One-shot commands with no cached state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeAction {
    StartPulser(PulserSelect),
    StopPulser(PulserSelect),
    ResetScalerCount,
    EnableScalerGate,
    DisableScalerGate,
    ScalerSwStart,
    ScalerSwStop,
    ScalerSwReset,
    ScalerSwOpenGate,
    ScalerSwCloseGate,
    SystemReset,
}

// ============================================================================
// Transport trait
// ============================================================================

#[async_trait]
pub trait BridgeTransport: Send + Sync {
    /// Implementation name for logs
    fn name(&self) -> &str;

    async fn read_cycle(&mut self, address: u32, am: AddressModifier, width: DataWidth)
        -> VmeResult<u32>;

    async fn write_cycle(
        &mut self,
        address: u32,
        am: AddressModifier,
        width: DataWidth,
        data: u32,
    ) -> VmeResult<()>;

    /// Indivisible read-modify-write; writes `data`, returns the value read
    async fn rmw_cycle(
        &mut self,
        address: u32,
        am: AddressModifier,
        width: DataWidth,
        data: u32,
    ) -> VmeResult<u32>;

    async fn block_read(&mut self, request: &BlockRequest) -> BurstOutcome;

    async fn block_write(&mut self, request: &BlockRequest, data: &[u8]) -> BurstOutcome;

    /// Address phase only; `handshake` waits for the slave's acknowledge
    async fn address_only(
        &mut self,
        address: u32,
        am: AddressModifier,
        handshake: bool,
    ) -> VmeResult<()>;

    async fn iack_cycle(&mut self, level: IrqLevel, width: DataWidth) -> VmeResult<u32>;

    /// Lines currently asserted on the bus
    async fn irq_status(&mut self) -> VmeResult<IrqMask>;

    async fn set_irq_enable(&mut self, enabled: IrqMask) -> VmeResult<()>;

    /// Resolve once any line of `mask` asserts. The caller bounds the wait.
    async fn wait_irq(&mut self, mask: IrqMask) -> VmeResult<IrqMask>;

    async fn read_register(&mut self, register: u32) -> VmeResult<u32>;

    async fn write_register(&mut self, register: u32, value: u32) -> VmeResult<()>;

    async fn apply(&mut self, setting: &BridgeSetting) -> VmeResult<()>;

    async fn trigger(&mut self, action: BridgeAction) -> VmeResult<()>;

    async fn read_display(&mut self) -> VmeResult<DisplaySnapshot>;

    fn flash_geometry(&self) -> FlashGeometry;

    async fn read_flash_page(&mut self, page: u32) -> VmeResult<Vec<u8>>;

    async fn write_flash_page(&mut self, page: u32, data: &[u8]) -> VmeResult<()>;

    async fn erase_flash_page(&mut self, page: u32) -> VmeResult<()>;

    /// Firmware release as reported by the board; may be NUL padded
    async fn firmware_release(&mut self) -> VmeResult<String>;

    async fn driver_release(&mut self) -> VmeResult<String>;

    async fn device_reset(&mut self) -> VmeResult<()>;

    async fn close(&mut self) -> VmeResult<()> {
        Ok(())
    }
}

// ============================================================================
// Link opener
// ============================================================================

/// Opens transports for one or more link families
#[async_trait]
pub trait LinkOpener: Send + Sync {
    fn link_kinds(&self) -> &'static [LinkKind];

    /// Establish the link. Failures to reach the device are CommError.
    async fn open(&self, target: &LinkTarget) -> VmeResult<Box<dyn BridgeTransport>>;
}
