//! Interrupt controller integration tests

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

mod common;

use std::time::Duration;

use anyhow::Result;
use common::{Fixture, PCI_BRIDGE, USB_BRIDGE};
use vme_bridge::ErrorCode;
use vme_model::{IrqLevel, IrqMask};

#[tokio::test]
async fn test_enable_disable_accumulate() -> Result<()> {
    let fx = Fixture::new();
    let (handle, shared) = fx.open(PCI_BRIDGE).await;

    fx.bridge.irq_enable(handle, 0x03).await?;
    fx.bridge.irq_enable(handle, 0x40).await?;
    assert_eq!(fx.bridge.irq_enabled_lines(handle)?.bits(), 0x43);
    assert_eq!(shared.irq_enabled().bits(), 0x43);

    fx.bridge.irq_disable(handle, 0x01).await?;
    assert_eq!(fx.bridge.irq_enabled_lines(handle)?.bits(), 0x42);

    // Empty mask is a no-op
    fx.bridge.irq_disable(handle, 0).await?;
    assert_eq!(shared.irq_enabled().bits(), 0x42);

    // Enabling after an empty disable keeps the earlier lines
    fx.bridge.irq_enable(handle, 0x04).await?;
    assert_eq!(fx.bridge.irq_enabled_lines(handle)?.bits(), 0x46);
    assert_eq!(shared.irq_enabled().bits(), 0x46);
    Ok(())
}

#[tokio::test]
async fn test_mask_outside_seven_lines_rejected() {
    let fx = Fixture::new();
    let (handle, _) = fx.open(PCI_BRIDGE).await;
    for mask in [0x80, 0x100, 0xFFFF_FFFF] {
        let err = fx.bridge.irq_enable(handle, mask).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParam);
    }
    assert!(fx.bridge.irq_enabled_lines(handle).unwrap().is_empty());
}

#[tokio::test]
async fn test_check_reports_asserted_lines() -> Result<()> {
    let fx = Fixture::new();
    let (handle, shared) = fx.open(PCI_BRIDGE).await;
    assert!(fx.bridge.irq_check(handle).await?.is_empty());

    // Asserted lines are visible whether enabled or not
    shared.assert_irq(IrqLevel::Irq2, 0x10);
    shared.assert_irq(IrqLevel::Irq5, 0x20);
    let lines = fx.bridge.irq_check(handle).await?;
    assert_eq!(
        lines,
        IrqMask::from(IrqLevel::Irq2).union(IrqLevel::Irq5.into())
    );

    shared.release_irq(IrqLevel::Irq2);
    assert_eq!(fx.bridge.irq_check(handle).await?, IrqLevel::Irq5.into());
    Ok(())
}

#[tokio::test]
async fn test_wait_returns_already_asserted_line() -> Result<()> {
    let fx = Fixture::new();
    let (handle, shared) = fx.open(PCI_BRIDGE).await;
    fx.bridge.irq_enable(handle, 0x7F).await?;
    shared.assert_irq(IrqLevel::Irq4, 0x44);

    let lines = fx.bridge.irq_wait(handle, 0x0C, 100).await?;
    assert_eq!(lines, IrqLevel::Irq4.into());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_wait_wakes_on_assert() -> Result<()> {
    let fx = Fixture::new();
    let (handle, shared) = fx.open(PCI_BRIDGE).await;
    fx.bridge.irq_enable(handle, 0x04).await?;

    let source = shared.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        source.assert_irq(IrqLevel::Irq3, 0x33);
    });

    let start = tokio::time::Instant::now();
    let lines = fx.bridge.irq_wait(handle, 0x04, 1_000).await?;
    assert_eq!(lines, IrqLevel::Irq3.into());
    assert!(start.elapsed() < Duration::from_millis(1_000));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_wait_times_out_after_full_interval() {
    let fx = Fixture::new();
    let (handle, _) = fx.open(PCI_BRIDGE).await;
    fx.bridge.irq_enable(handle, 0x01).await.unwrap();

    let start = tokio::time::Instant::now();
    let err = fx.bridge.irq_wait(handle, 0x01, 250).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::TimeoutError);
    assert!(start.elapsed() >= Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn test_wait_wakes_on_line_not_enabled() -> Result<()> {
    let fx = Fixture::new();
    let (handle, shared) = fx.open(PCI_BRIDGE).await;
    fx.bridge.irq_enable(handle, 0x01).await?;
    // Line 7 asserted but never enabled
    shared.assert_irq(IrqLevel::Irq7, 0x77);

    let start = tokio::time::Instant::now();
    let lines = fx.bridge.irq_wait(handle, 0x40, 300).await?;
    assert_eq!(lines, IrqLevel::Irq7.into());
    assert!(start.elapsed() < Duration::from_millis(300));
    // Waiting does not enable the line
    assert_eq!(fx.bridge.irq_enabled_lines(handle)?.bits(), 0x01);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_wait_ignores_lines_outside_mask() {
    let fx = Fixture::new();
    let (handle, shared) = fx.open(PCI_BRIDGE).await;
    fx.bridge.irq_enable(handle, 0x7F).await.unwrap();
    shared.assert_irq(IrqLevel::Irq7, 0x77);

    let start = tokio::time::Instant::now();
    let err = fx.bridge.irq_wait(handle, 0x01, 300).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::TimeoutError);
    assert!(start.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_wait_requires_a_line() {
    let fx = Fixture::new();
    let (handle, _) = fx.open(PCI_BRIDGE).await;
    let err = fx.bridge.irq_wait(handle, 0, 10).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParam);
}

#[tokio::test]
async fn test_usb_bridge_has_no_interrupts() {
    let fx = Fixture::new();
    let (handle, _) = fx.open(USB_BRIDGE).await;
    assert_eq!(
        fx.bridge.irq_check(handle).await.unwrap_err().code(),
        ErrorCode::NotSupported
    );
    assert_eq!(
        fx.bridge.irq_enable(handle, 1).await.unwrap_err().code(),
        ErrorCode::NotSupported
    );
    assert_eq!(
        fx.bridge.irq_wait(handle, 1, 10).await.unwrap_err().code(),
        ErrorCode::NotSupported
    );
}
