//! Asynchronous block read tests
//!
//! Uses a transport whose bursts take simulated time, so the pending state
//! can be observed under a paused tokio clock.

#![cfg(not(windows))]
#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use vme_bridge::peripherals::DisplaySnapshot;
use vme_bridge::simulator::{SimulatedCrate, SimulatedTransport};
use vme_bridge::{
    BlockRequest, BridgeAction, BridgeConfig, BridgeSetting, BridgeTransport, BurstOutcome,
    ErrorCode, FlashGeometry, LinkArg, LinkOpener, LinkTarget, TransportRegistry, VmeBridge,
    VmeResult,
};
use vme_model::{AddressModifier as Am, AddressSpace, DataWidth, IrqLevel, IrqMask, LinkKind};

const BURST_DELAY: Duration = Duration::from_millis(100);

// ============================================================================
// Slow transport
// ============================================================================

struct SlowTransport {
    inner: SimulatedTransport,
}

#[async_trait]
impl BridgeTransport for SlowTransport {
    fn name(&self) -> &str {
        "slow"
    }

    async fn read_cycle(&mut self, address: u32, am: Am, width: DataWidth) -> VmeResult<u32> {
        self.inner.read_cycle(address, am, width).await
    }

    async fn write_cycle(&mut self, address: u32, am: Am, width: DataWidth, data: u32) -> VmeResult<()> {
        self.inner.write_cycle(address, am, width, data).await
    }

    async fn rmw_cycle(&mut self, address: u32, am: Am, width: DataWidth, data: u32) -> VmeResult<u32> {
        self.inner.rmw_cycle(address, am, width, data).await
    }

    async fn block_read(&mut self, request: &BlockRequest) -> BurstOutcome {
        tokio::time::sleep(BURST_DELAY).await;
        self.inner.block_read(request).await
    }

    async fn block_write(&mut self, request: &BlockRequest, data: &[u8]) -> BurstOutcome {
        tokio::time::sleep(BURST_DELAY).await;
        self.inner.block_write(request, data).await
    }

    async fn address_only(&mut self, address: u32, am: Am, handshake: bool) -> VmeResult<()> {
        self.inner.address_only(address, am, handshake).await
    }

    async fn iack_cycle(&mut self, level: IrqLevel, width: DataWidth) -> VmeResult<u32> {
        self.inner.iack_cycle(level, width).await
    }

    async fn irq_status(&mut self) -> VmeResult<IrqMask> {
        self.inner.irq_status().await
    }

    async fn set_irq_enable(&mut self, enabled: IrqMask) -> VmeResult<()> {
        self.inner.set_irq_enable(enabled).await
    }

    async fn wait_irq(&mut self, mask: IrqMask) -> VmeResult<IrqMask> {
        self.inner.wait_irq(mask).await
    }

    async fn read_register(&mut self, register: u32) -> VmeResult<u32> {
        self.inner.read_register(register).await
    }

    async fn write_register(&mut self, register: u32, value: u32) -> VmeResult<()> {
        self.inner.write_register(register, value).await
    }

    async fn apply(&mut self, setting: &BridgeSetting) -> VmeResult<()> {
        self.inner.apply(setting).await
    }

    async fn trigger(&mut self, action: BridgeAction) -> VmeResult<()> {
        self.inner.trigger(action).await
    }

    async fn read_display(&mut self) -> VmeResult<DisplaySnapshot> {
        self.inner.read_display().await
    }

    fn flash_geometry(&self) -> FlashGeometry {
        self.inner.flash_geometry()
    }

    async fn read_flash_page(&mut self, page: u32) -> VmeResult<Vec<u8>> {
        self.inner.read_flash_page(page).await
    }

    async fn write_flash_page(&mut self, page: u32, data: &[u8]) -> VmeResult<()> {
        self.inner.write_flash_page(page, data).await
    }

    async fn erase_flash_page(&mut self, page: u32) -> VmeResult<()> {
        self.inner.erase_flash_page(page).await
    }

    async fn firmware_release(&mut self) -> VmeResult<String> {
        self.inner.firmware_release().await
    }

    async fn driver_release(&mut self) -> VmeResult<String> {
        self.inner.driver_release().await
    }

    async fn device_reset(&mut self) -> VmeResult<()> {
        self.inner.device_reset().await
    }
}

struct SlowOpener {
    shared: Arc<SimulatedCrate>,
}

#[async_trait]
impl LinkOpener for SlowOpener {
    fn link_kinds(&self) -> &'static [LinkKind] {
        &[LinkKind::PciConet]
    }

    async fn open(&self, target: &LinkTarget) -> VmeResult<Box<dyn BridgeTransport>> {
        Ok(Box::new(SlowTransport {
            inner: SimulatedTransport::new(self.shared.clone(), target.clone()),
        }))
    }
}

fn slow_bridge() -> (VmeBridge, Arc<SimulatedCrate>) {
    let shared = Arc::new(SimulatedCrate::new());
    let registry = Arc::new(TransportRegistry::new());
    registry.register(Arc::new(SlowOpener {
        shared: shared.clone(),
    }));
    (VmeBridge::new(BridgeConfig::default(), registry), shared)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7) as u8).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_async_read_completes() -> Result<()> {
    let (bridge, shared) = slow_bridge();
    let handle = bridge
        .open(common::PCI_BRIDGE, LinkArg::Index(0), 0)
        .await?;
    let data = pattern(512);
    shared.write_memory(AddressSpace::A32, 0x2000, &data);

    bridge
        .blt_read_async(handle, 0x2000, 512, Am::A32UBlt, DataWidth::D8)
        .await?;
    assert!(bridge.is_transfer_pending(handle)?);

    let transfer = bridge.blt_read_wait(handle, Duration::from_secs(5)).await?;
    assert!(transfer.is_complete());
    assert_eq!(&transfer.data[..], &data[..]);
    assert!(!bridge.is_transfer_pending(handle)?);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_operations_rejected_while_pending() -> Result<()> {
    let (bridge, shared) = slow_bridge();
    let handle = bridge
        .open(common::PCI_BRIDGE, LinkArg::Index(0), 0)
        .await?;
    shared.map_zeroed(AddressSpace::A32, 0, 1024);

    bridge
        .blt_read_async(handle, 0, 1024, Am::A32UBlt, DataWidth::D32)
        .await?;

    let err = bridge
        .read_cycle(handle, 0, Am::A32UData, DataWidth::D32)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::GenericError);
    let err = bridge
        .blt_read_async(handle, 0, 64, Am::A32UBlt, DataWidth::D32)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::GenericError);

    bridge.blt_read_wait(handle, Duration::from_secs(5)).await?;
    bridge
        .read_cycle(handle, 0, Am::A32UData, DataWidth::D32)
        .await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_wait_timeout_keeps_transfer_pending() -> Result<()> {
    let (bridge, shared) = slow_bridge();
    let handle = bridge
        .open(common::PCI_BRIDGE, LinkArg::Index(0), 0)
        .await?;
    shared.map_zeroed(AddressSpace::A32, 0, 1024);

    // Four bursts of BURST_DELAY each
    bridge
        .blt_read_async(handle, 0, 1024, Am::A32UBlt, DataWidth::D32)
        .await?;

    let err = bridge
        .blt_read_wait(handle, Duration::from_millis(50))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::TimeoutError);
    assert!(bridge.is_transfer_pending(handle)?);

    let transfer = bridge.blt_read_wait(handle, Duration::from_secs(5)).await?;
    assert_eq!(transfer.count, 1024);
    Ok(())
}

#[tokio::test]
async fn test_wait_without_transfer() -> Result<()> {
    let (bridge, _) = slow_bridge();
    let handle = bridge
        .open(common::PCI_BRIDGE, LinkArg::Index(0), 0)
        .await?;
    let err = bridge
        .blt_read_wait(handle, Duration::from_millis(10))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::GenericError);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_close_aborts_pending_transfer() -> Result<()> {
    let (bridge, shared) = slow_bridge();
    let handle = bridge
        .open(common::PCI_BRIDGE, LinkArg::Index(0), 0)
        .await?;
    shared.map_zeroed(AddressSpace::A32, 0, 1024);
    bridge
        .blt_read_async(handle, 0, 1024, Am::A32UBlt, DataWidth::D32)
        .await?;

    bridge.close(handle).await?;
    let err = bridge
        .blt_read_wait(handle, Duration::from_millis(10))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::CommError);

    // The link is free again
    bridge.open(common::PCI_BRIDGE, LinkArg::Index(0), 0).await?;
    Ok(())
}

#[tokio::test]
async fn test_async_read_over_ethernet() -> Result<()> {
    let fx = common::Fixture::new();
    let (handle, shared) = fx.open(vme_model::BoardType::EthV4718).await;
    let data = pattern(64);
    shared.write_memory(AddressSpace::A32, 0x800, &data);

    fx.bridge
        .blt_read_async(handle, 0x800, 64, Am::A32UBlt, DataWidth::D32)
        .await?;
    let transfer = fx
        .bridge
        .blt_read_wait(handle, Duration::from_secs(5))
        .await?;
    assert!(transfer.is_complete());
    assert_eq!(transfer.count, 64);
    Ok(())
}

#[tokio::test]
async fn test_async_requires_streaming_link() -> Result<()> {
    let fx = common::Fixture::new();
    let (handle, _) = fx.open(common::USB_BRIDGE).await;
    let err = fx
        .bridge
        .blt_read_async(handle, 0, 64, Am::A32UBlt, DataWidth::D32)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotSupported);
    Ok(())
}
