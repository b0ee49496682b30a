//! Asynchronous block read: start now, collect the result later
//!
//! While a transfer is outstanding every other operation on the handle is
//! rejected, except the wait itself and `close`.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use vme_errors::{VmeError, VmeResult};
use vme_model::{AddressModifier, DataWidth, Feature};

use crate::bridge::VmeBridge;
use crate::cycles::{read_bursts, validate_block, BlockTransfer};
use crate::session::{DeviceHandle, PendingBlt};

impl VmeBridge {
    /// Start a BLT read in the background. The data is returned by
    /// [`VmeBridge::blt_read_wait`].
    pub async fn blt_read_async(
        &self,
        handle: DeviceHandle,
        address: u32,
        size: usize,
        am: AddressModifier,
        width: DataWidth,
    ) -> VmeResult<()> {
        let session = self.session(handle)?;
        session.require(Feature::AsyncBlt)?;
        let increment = !session.state().bus.fifo_mode;
        validate_block(address, am, width, size, increment)
            .map_err(|e| session.fail("async block read", e))?;

        let mut pending = session.pending().lock().await;
        if pending.is_some() {
            return Err(session.fail(
                "async block read",
                VmeError::TransferPending(handle.as_raw()),
            ));
        }
        session.set_pending(true);

        // The task owns the link until the transfer ends
        let link = session.shared_link().lock_owned().await;
        let boundary = self.config().burst_bytes(am);
        let task = tokio::spawn(async move {
            let mut link = link;
            read_bursts(&mut **link, address, am, width, size, increment, boundary).await
        });

        *pending = Some(PendingBlt {
            task,
            started: Instant::now(),
            size,
        });
        info!(
            "[{}] asynchronous block read of {} bytes at {:#010x} started",
            handle, size, address
        );
        Ok(())
    }

    /// Wait up to `timeout` for the outstanding asynchronous read.
    ///
    /// On timeout the transfer stays pending and the wait may be repeated.
    pub async fn blt_read_wait(
        &self,
        handle: DeviceHandle,
        timeout: Duration,
    ) -> VmeResult<BlockTransfer> {
        let session = self.session_any(handle)?;
        let mut pending = session.pending().lock().await;
        let Some(transfer) = pending.as_mut() else {
            return Err(session.fail(
                "async block wait",
                VmeError::NoTransferPending(handle.as_raw()),
            ));
        };

        let joined = match tokio::time::timeout(timeout, &mut transfer.task).await {
            Ok(joined) => joined,
            Err(_) => {
                debug!(
                    "[{}] asynchronous read still running after {:?}",
                    handle, timeout
                );
                return Err(VmeError::timeout(format!(
                    "asynchronous block read ({:?})",
                    timeout
                )));
            },
        };

        let elapsed = transfer.started.elapsed();
        *pending = None;
        session.set_pending(false);

        match joined {
            Ok(result) => {
                match &result.error {
                    None => info!(
                        "[{}] asynchronous block read done: {} bytes in {:?}",
                        handle, result.count, elapsed
                    ),
                    Some(e) => warn!(
                        "[{}] asynchronous block read stopped after {} bytes: {}",
                        handle, result.count, e
                    ),
                }
                Ok(result)
            },
            Err(e) => Err(session.fail(
                "async block wait",
                VmeError::generic(format!("transfer task failed: {}", e)),
            )),
        }
    }

    /// True while an asynchronous read is outstanding on the handle
    pub fn is_transfer_pending(&self, handle: DeviceHandle) -> VmeResult<bool> {
        Ok(self.session_any(handle)?.ensure_idle().is_err())
    }
}
