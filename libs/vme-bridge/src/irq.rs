//! Interrupt controller: enable mask, status and bounded wait

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};
use vme_errors::{VmeError, VmeResult};
use vme_model::{Feature, IrqMask};

use crate::bridge::VmeBridge;
use crate::session::DeviceHandle;

impl VmeBridge {
    /// Lines currently asserted on the bus, enabled or not
    pub async fn irq_check(&self, handle: DeviceHandle) -> VmeResult<IrqMask> {
        let session = self.session(handle)?;
        session.require(Feature::Irq)?;
        let mut link = session.link().await;
        let asserted = link
            .irq_status()
            .await
            .map_err(|e| session.fail("IRQ check", e))?;
        trace!("[{}] IRQ lines asserted: {}", handle, asserted);
        Ok(asserted)
    }

    /// Add `mask` to the enabled lines
    pub async fn irq_enable(&self, handle: DeviceHandle, mask: u32) -> VmeResult<()> {
        let session = self.session(handle)?;
        session.require(Feature::Irq)?;
        let mask = IrqMask::new(mask).map_err(|e| session.fail("IRQ enable", e))?;

        let enabled = session.state().irq_enabled.union(mask);
        session
            .link()
            .await
            .set_irq_enable(enabled)
            .await
            .map_err(|e| session.fail("IRQ enable", e))?;
        session.state().irq_enabled = enabled;
        debug!("[{}] IRQ lines enabled: {}", handle, enabled);
        Ok(())
    }

    /// Remove `mask` from the enabled lines. An empty mask changes nothing.
    pub async fn irq_disable(&self, handle: DeviceHandle, mask: u32) -> VmeResult<()> {
        let session = self.session(handle)?;
        session.require(Feature::Irq)?;
        let mask = IrqMask::new(mask).map_err(|e| session.fail("IRQ disable", e))?;
        if mask.is_empty() {
            return Ok(());
        }

        let enabled = session.state().irq_enabled.difference(mask);
        session
            .link()
            .await
            .set_irq_enable(enabled)
            .await
            .map_err(|e| session.fail("IRQ disable", e))?;
        session.state().irq_enabled = enabled;
        debug!("[{}] IRQ lines enabled: {}", handle, enabled);
        Ok(())
    }

    pub fn irq_enabled_lines(&self, handle: DeviceHandle) -> VmeResult<IrqMask> {
        Ok(self.session(handle)?.state().irq_enabled)
    }

    /// Block until any line of `mask` asserts or `timeout_ms` elapses.
    ///
    /// Returns the asserted lines of `mask`. A timeout is only reported once
    /// the full interval has passed. The enabled set is left untouched.
    pub async fn irq_wait(
        &self,
        handle: DeviceHandle,
        mask: u32,
        timeout_ms: u32,
    ) -> VmeResult<IrqMask> {
        let session = self.session(handle)?;
        session.require(Feature::Irq)?;
        let mask = IrqMask::new(mask).map_err(|e| session.fail("IRQ wait", e))?;
        if mask.is_empty() {
            return Err(session.fail(
                "IRQ wait",
                VmeError::invalid_param("irq_mask", "at least one line must be selected"),
            ));
        }

        let timeout = Duration::from_millis(u64::from(timeout_ms));
        let deadline = Instant::now() + timeout;
        let timed_out = || {
            VmeError::timeout(format!("IRQ on {} ({} ms)", mask, timeout_ms))
        };

        let mut link = session.link().await;
        let outcome = tokio::time::timeout_at(deadline, link.wait_irq(mask)).await;
        match outcome {
            Ok(Ok(asserted)) => {
                let asserted = asserted.intersection(mask);
                debug!("[{}] IRQ wait on {} woke with {}", handle, mask, asserted);
                Ok(asserted)
            },
            Ok(Err(VmeError::Timeout(_))) => {
                drop(link);
                tokio::time::sleep_until(deadline).await;
                Err(timed_out())
            },
            Ok(Err(e)) => Err(session.fail("IRQ wait", e)),
            Err(_) => Err(timed_out()),
        }
    }
}
