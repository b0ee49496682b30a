//! Cycle dispatcher: single, RMW, batch, block, address-only and IACK cycles

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use vme_errors::{ErrorCode, VmeError, VmeResult};
use vme_model::{AddressModifier, CycleClass, DataWidth, Feature, IrqLevel};

use crate::bridge::VmeBridge;
use crate::session::{log_failure, DeviceHandle};
use crate::transport::{BlockRequest, BridgeTransport};

// ============================================================================
// Request / result types
// ============================================================================

/// One element of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleRequest {
    pub address: u32,
    pub am: AddressModifier,
    pub width: DataWidth,
}

impl CycleRequest {
    pub fn new(address: u32, am: AddressModifier, width: DataWidth) -> Self {
        Self { address, am, width }
    }
}

/// Per-element batch result; `data` is 0 unless a read succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub data: u32,
    pub status: ErrorCode,
}

impl CycleOutcome {
    fn ok(data: u32) -> Self {
        Self {
            data,
            status: ErrorCode::Success,
        }
    }

    fn failed(status: ErrorCode) -> Self {
        Self { data: 0, status }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }
}

/// Outcome of a block transfer
///
/// `count` is authoritative: it is the number of bytes actually moved. When
/// `count` is short of the requested size, `error` names the terminating
/// condition. A transfer that reached its size never carries an error.
#[derive(Debug)]
pub struct BlockTransfer {
    /// Bytes read (empty for writes)
    pub data: Bytes,
    pub count: usize,
    pub error: Option<VmeError>,
}

impl BlockTransfer {
    fn finish(data: Bytes, count: usize, size: usize, error: Option<VmeError>) -> Self {
        let error = match error {
            Some(e) if count >= size => {
                trace!("terminating condition after full transfer ignored: {}", e);
                None
            },
            other => other,
        };
        Self { data, count, error }
    }

    pub fn status(&self) -> ErrorCode {
        self.error
            .as_ref()
            .map(VmeError::code)
            .unwrap_or(ErrorCode::Success)
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Data when the transfer completed, the terminating error otherwise
    pub fn into_result(self) -> VmeResult<Bytes> {
        match self.error {
            None => Ok(self.data),
            Some(e) => Err(e),
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

fn check_span(address: u32, am: AddressModifier, len: usize) -> VmeResult<()> {
    let last = u64::from(address) + len.saturating_sub(1) as u64;
    let max = u64::from(am.space().max_address());
    if last > max {
        return Err(VmeError::invalid_param(
            "address",
            format!(
                "{:#010x}+{} outside {:?} space (max {:#x})",
                address,
                len,
                am.space(),
                max
            ),
        ));
    }
    Ok(())
}

fn check_alignment(address: u32, width: DataWidth) -> VmeResult<()> {
    if address as usize % width.bytes() != 0 {
        return Err(VmeError::invalid_param(
            "address",
            format!("{:#010x} not aligned to {:?}", address, width.unswapped()),
        ));
    }
    Ok(())
}

fn check_fits(data: u32, width: DataWidth) -> VmeResult<()> {
    if u64::from(data) & !width.value_mask() != 0 {
        return Err(VmeError::invalid_param(
            "data",
            format!("{:#x} does not fit in {:?}", data, width.unswapped()),
        ));
    }
    Ok(())
}

/// Single read/write (and RMW, which also accepts lock modifiers)
pub(crate) fn validate_single(
    address: u32,
    am: AddressModifier,
    width: DataWidth,
    allow_lock: bool,
) -> VmeResult<()> {
    match am.class() {
        CycleClass::Single => {},
        CycleClass::Lock if allow_lock => {},
        class => {
            return Err(VmeError::invalid_param(
                "am",
                format!("{} ({:?}) not valid for a single cycle", am, class),
            ))
        },
    }
    if width.is_d64() {
        return Err(VmeError::invalid_param(
            "width",
            "D64 is only valid for MBLT transfers",
        ));
    }
    check_alignment(address, width)?;
    check_span(address, am, width.bytes())
}

pub(crate) fn validate_block(
    address: u32,
    am: AddressModifier,
    width: DataWidth,
    size: usize,
    increment: bool,
) -> VmeResult<()> {
    match (am.class(), width.is_d64()) {
        (CycleClass::Blt, false) | (CycleClass::Mblt, true) => {},
        (CycleClass::Blt, true) => {
            return Err(VmeError::invalid_param("width", "BLT cannot use D64"))
        },
        (CycleClass::Mblt, false) => {
            return Err(VmeError::invalid_param("width", "MBLT requires D64"))
        },
        (class, _) => {
            return Err(VmeError::invalid_param(
                "am",
                format!("{} ({:?}) not valid for a block transfer", am, class),
            ))
        },
    }
    if size == 0 {
        return Err(VmeError::invalid_param("size", "must be greater than zero"));
    }
    if size % width.bytes() != 0 {
        return Err(VmeError::invalid_param(
            "size",
            format!("{} is not a multiple of {} bytes", size, width.bytes()),
        ));
    }
    check_alignment(address, width)?;
    if increment {
        check_span(address, am, size)?;
    }
    Ok(())
}

fn validate_address_only(address: u32, am: AddressModifier) -> VmeResult<()> {
    if am.class() == CycleClass::TwoEdge {
        return Err(VmeError::invalid_param(
            "am",
            format!("{} not supported for address-only cycles", am),
        ));
    }
    check_span(address, am, 1)
}

// ============================================================================
// Byte order
// ============================================================================

fn read_value(raw: u32, width: DataWidth) -> u32 {
    if width.is_swapped() {
        width.swap_value(u64::from(raw)) as u32
    } else {
        raw
    }
}

fn write_value(data: u32, width: DataWidth) -> u32 {
    // Byte reversal is its own inverse
    read_value(data, width)
}

/// Reverse bytes inside each `unit`-sized chunk
pub(crate) fn swap_units(buf: &mut [u8], unit: usize) {
    if unit > 1 {
        for chunk in buf.chunks_exact_mut(unit) {
            chunk.reverse();
        }
    }
}

// ============================================================================
// Burst engine
// ============================================================================

fn burst_len(address: u32, remaining: usize, boundary: usize, increment: bool) -> usize {
    let boundary = boundary.max(1);
    if increment {
        let to_boundary = boundary - (address as usize % boundary);
        remaining.min(to_boundary)
    } else {
        remaining.min(boundary)
    }
}

/// Run a block read as a sequence of bursts, stopping at the first failure
pub(crate) async fn read_bursts<T: BridgeTransport + ?Sized>(
    link: &mut T,
    address: u32,
    am: AddressModifier,
    width: DataWidth,
    size: usize,
    increment: bool,
    boundary: usize,
) -> BlockTransfer {
    let mut buf = BytesMut::with_capacity(size);
    let mut error = None;

    while buf.len() < size {
        let offset = buf.len();
        let burst_address = if increment {
            address.wrapping_add(offset as u32)
        } else {
            address
        };
        let request = BlockRequest {
            address: burst_address,
            am,
            width: width.unswapped(),
            len: burst_len(burst_address, size - offset, boundary, increment),
            increment,
        };

        let outcome = link.block_read(&request).await;
        let got = outcome
            .transferred
            .min(request.len)
            .min(outcome.data.len());
        buf.extend_from_slice(&outcome.data[..got]);

        if let Some(e) = outcome.error {
            error = Some(e);
            break;
        }
        if got < request.len {
            error = Some(VmeError::generic(format!(
                "short burst at {:#010x}: {} of {} bytes",
                burst_address, got, request.len
            )));
            break;
        }
    }

    if width.is_swapped() {
        swap_units(&mut buf, width.bytes());
    }
    let count = buf.len();
    BlockTransfer::finish(buf.freeze(), count, size, error)
}

pub(crate) async fn write_bursts<T: BridgeTransport + ?Sized>(
    link: &mut T,
    address: u32,
    am: AddressModifier,
    width: DataWidth,
    data: &[u8],
    increment: bool,
    boundary: usize,
) -> BlockTransfer {
    let swapped;
    let data = if width.is_swapped() {
        let mut copy = data.to_vec();
        swap_units(&mut copy, width.bytes());
        swapped = copy;
        swapped.as_slice()
    } else {
        data
    };

    let size = data.len();
    let mut count = 0;
    let mut error = None;

    while count < size {
        let burst_address = if increment {
            address.wrapping_add(count as u32)
        } else {
            address
        };
        let request = BlockRequest {
            address: burst_address,
            am,
            width: width.unswapped(),
            len: burst_len(burst_address, size - count, boundary, increment),
            increment,
        };

        let outcome = link
            .block_write(&request, &data[count..count + request.len])
            .await;
        let done = outcome.transferred.min(request.len);
        count += done;

        if let Some(e) = outcome.error {
            error = Some(e);
            break;
        }
        if done < request.len {
            error = Some(VmeError::generic(format!(
                "short burst at {:#010x}: {} of {} bytes",
                burst_address, done, request.len
            )));
            break;
        }
    }

    BlockTransfer::finish(Bytes::new(), count, size, error)
}

// ============================================================================
// Dispatcher
// ============================================================================

impl VmeBridge {
    fn check_batch(&self, len: usize) -> VmeResult<()> {
        if len == 0 || len > self.config().max_batch_cycles {
            return Err(VmeError::invalid_param(
                "batch",
                format!(
                    "{} cycles, expected 1..={}",
                    len,
                    self.config().max_batch_cycles
                ),
            ));
        }
        Ok(())
    }

    /// Single read cycle
    pub async fn read_cycle(
        &self,
        handle: DeviceHandle,
        address: u32,
        am: AddressModifier,
        width: DataWidth,
    ) -> VmeResult<u32> {
        let session = self.session(handle)?;
        session.require(Feature::VmeCycles)?;
        validate_single(address, am, width, false).map_err(|e| session.fail("read", e))?;

        let mut link = session.link().await;
        let raw = link
            .read_cycle(address, am, width.unswapped())
            .await
            .map_err(|e| session.fail("read", e))?;
        let value = read_value(raw, width);
        trace!("[{}] read {:#010x} {} {:?} -> {:#x}", handle, address, am, width, value);
        Ok(value)
    }

    /// Single write cycle
    pub async fn write_cycle(
        &self,
        handle: DeviceHandle,
        address: u32,
        am: AddressModifier,
        width: DataWidth,
        data: u32,
    ) -> VmeResult<()> {
        let session = self.session(handle)?;
        session.require(Feature::VmeCycles)?;
        validate_single(address, am, width, false)
            .and_then(|_| check_fits(data, width))
            .map_err(|e| session.fail("write", e))?;

        let mut link = session.link().await;
        link.write_cycle(address, am, width.unswapped(), write_value(data, width))
            .await
            .map_err(|e| session.fail("write", e))?;
        trace!("[{}] write {:#010x} {} {:?} <- {:#x}", handle, address, am, width, data);
        Ok(())
    }

    /// Read-modify-write as one indivisible bus cycle.
    /// Writes `data` and returns the value read in the same cycle.
    pub async fn rmw_cycle(
        &self,
        handle: DeviceHandle,
        address: u32,
        am: AddressModifier,
        width: DataWidth,
        data: u32,
    ) -> VmeResult<u32> {
        let session = self.session(handle)?;
        session.require(Feature::VmeCycles)?;
        validate_single(address, am, width, true)
            .and_then(|_| check_fits(data, width))
            .map_err(|e| session.fail("rmw", e))?;

        let mut link = session.link().await;
        let raw = link
            .rmw_cycle(address, am, width.unswapped(), write_value(data, width))
            .await
            .map_err(|e| session.fail("rmw", e))?;
        Ok(read_value(raw, width))
    }

    /// Independent read cycles; every element runs and reports its own status
    pub async fn multi_read(
        &self,
        handle: DeviceHandle,
        requests: &[CycleRequest],
    ) -> VmeResult<Vec<CycleOutcome>> {
        let session = self.session(handle)?;
        session.require(Feature::VmeCycles)?;
        self.check_batch(requests.len())?;

        let mut link = session.link().await;
        let mut outcomes = Vec::with_capacity(requests.len());
        for (i, req) in requests.iter().enumerate() {
            let result = match validate_single(req.address, req.am, req.width, false) {
                Ok(()) => link
                    .read_cycle(req.address, req.am, req.width.unswapped())
                    .await
                    .map(|raw| read_value(raw, req.width)),
                Err(e) => Err(e),
            };
            outcomes.push(match result {
                Ok(value) => CycleOutcome::ok(value),
                Err(e) => {
                    log_failure(handle, &format!("batch read #{}", i), &e);
                    CycleOutcome::failed(e.code())
                },
            });
        }
        debug!(
            "[{}] batch read of {} cycles, {} failed",
            handle,
            outcomes.len(),
            outcomes.iter().filter(|o| !o.is_ok()).count()
        );
        Ok(outcomes)
    }

    /// Independent write cycles; every element runs and reports its own status
    pub async fn multi_write(
        &self,
        handle: DeviceHandle,
        requests: &[(CycleRequest, u32)],
    ) -> VmeResult<Vec<ErrorCode>> {
        let session = self.session(handle)?;
        session.require(Feature::VmeCycles)?;
        self.check_batch(requests.len())?;

        let mut link = session.link().await;
        let mut statuses = Vec::with_capacity(requests.len());
        for (i, (req, data)) in requests.iter().enumerate() {
            let result = match validate_single(req.address, req.am, req.width, false)
                .and_then(|_| check_fits(*data, req.width))
            {
                Ok(()) => {
                    link.write_cycle(
                        req.address,
                        req.am,
                        req.width.unswapped(),
                        write_value(*data, req.width),
                    )
                    .await
                },
                Err(e) => Err(e),
            };
            statuses.push(match result {
                Ok(()) => ErrorCode::Success,
                Err(e) => {
                    log_failure(handle, &format!("batch write #{}", i), &e);
                    e.code()
                },
            });
        }
        debug!(
            "[{}] batch write of {} cycles, {} failed",
            handle,
            statuses.len(),
            statuses.iter().filter(|s| !s.is_success()).count()
        );
        Ok(statuses)
    }

    // ========================================================================
    // Block transfers
    // ========================================================================

    async fn block_read(
        &self,
        handle: DeviceHandle,
        address: u32,
        size: usize,
        am: AddressModifier,
        width: DataWidth,
        fifo: Option<bool>,
    ) -> VmeResult<BlockTransfer> {
        let session = self.session(handle)?;
        session.require(Feature::VmeCycles)?;
        // Plain entry points follow the handle's FIFO-mode flag
        let increment = match fifo {
            Some(forced) => !forced,
            None => !session.state().bus.fifo_mode,
        };
        validate_block(address, am, width, size, increment)
            .map_err(|e| session.fail("block read", e))?;

        let mut link = session.link().await;
        let transfer = read_bursts(
            &mut **link,
            address,
            am,
            width,
            size,
            increment,
            self.config().burst_bytes(am),
        )
        .await;
        drop(link);

        match &transfer.error {
            None => debug!(
                "[{}] block read {:#010x} {} {:?}: {} bytes{}",
                handle,
                address,
                am,
                width,
                transfer.count,
                if increment { "" } else { " (fifo)" }
            ),
            Some(e) => warn!(
                "[{}] block read {:#010x} {} stopped after {}/{} bytes: {}",
                handle, address, am, transfer.count, size, e
            ),
        }
        Ok(transfer)
    }

    async fn block_write(
        &self,
        handle: DeviceHandle,
        address: u32,
        data: &[u8],
        am: AddressModifier,
        width: DataWidth,
        fifo: Option<bool>,
    ) -> VmeResult<BlockTransfer> {
        let session = self.session(handle)?;
        session.require(Feature::VmeCycles)?;
        let increment = match fifo {
            Some(forced) => !forced,
            None => !session.state().bus.fifo_mode,
        };
        validate_block(address, am, width, data.len(), increment)
            .map_err(|e| session.fail("block write", e))?;

        let mut link = session.link().await;
        let transfer = write_bursts(
            &mut **link,
            address,
            am,
            width,
            data,
            increment,
            self.config().burst_bytes(am),
        )
        .await;
        drop(link);

        match &transfer.error {
            None => debug!(
                "[{}] block write {:#010x} {} {:?}: {} bytes{}",
                handle,
                address,
                am,
                width,
                transfer.count,
                if increment { "" } else { " (fifo)" }
            ),
            Some(e) => warn!(
                "[{}] block write {:#010x} {} stopped after {}/{} bytes: {}",
                handle,
                address,
                am,
                transfer.count,
                data.len(),
                e
            ),
        }
        Ok(transfer)
    }

    /// BLT read of `size` bytes; auto-increments unless FIFO mode is set
    pub async fn blt_read(
        &self,
        handle: DeviceHandle,
        address: u32,
        size: usize,
        am: AddressModifier,
        width: DataWidth,
    ) -> VmeResult<BlockTransfer> {
        self.block_read(handle, address, size, am, width, None).await
    }

    /// BLT read that never increments the address
    pub async fn fifo_blt_read(
        &self,
        handle: DeviceHandle,
        address: u32,
        size: usize,
        am: AddressModifier,
        width: DataWidth,
    ) -> VmeResult<BlockTransfer> {
        self.block_read(handle, address, size, am, width, Some(true))
            .await
    }

    /// Multiplexed (D64) block read
    pub async fn mblt_read(
        &self,
        handle: DeviceHandle,
        address: u32,
        size: usize,
        am: AddressModifier,
    ) -> VmeResult<BlockTransfer> {
        self.block_read(handle, address, size, am, DataWidth::D64, None)
            .await
    }

    pub async fn fifo_mblt_read(
        &self,
        handle: DeviceHandle,
        address: u32,
        size: usize,
        am: AddressModifier,
    ) -> VmeResult<BlockTransfer> {
        self.block_read(handle, address, size, am, DataWidth::D64, Some(true))
            .await
    }

    pub async fn blt_write(
        &self,
        handle: DeviceHandle,
        address: u32,
        data: &[u8],
        am: AddressModifier,
        width: DataWidth,
    ) -> VmeResult<BlockTransfer> {
        self.block_write(handle, address, data, am, width, None)
            .await
    }

    pub async fn fifo_blt_write(
        &self,
        handle: DeviceHandle,
        address: u32,
        data: &[u8],
        am: AddressModifier,
        width: DataWidth,
    ) -> VmeResult<BlockTransfer> {
        self.block_write(handle, address, data, am, width, Some(true))
            .await
    }

    pub async fn mblt_write(
        &self,
        handle: DeviceHandle,
        address: u32,
        data: &[u8],
        am: AddressModifier,
    ) -> VmeResult<BlockTransfer> {
        self.block_write(handle, address, data, am, DataWidth::D64, None)
            .await
    }

    pub async fn fifo_mblt_write(
        &self,
        handle: DeviceHandle,
        address: u32,
        data: &[u8],
        am: AddressModifier,
    ) -> VmeResult<BlockTransfer> {
        self.block_write(handle, address, data, am, DataWidth::D64, Some(true))
            .await
    }

    // ========================================================================
    // Address-only and IACK
    // ========================================================================

    async fn address_only(
        &self,
        handle: DeviceHandle,
        address: u32,
        am: AddressModifier,
        handshake: bool,
    ) -> VmeResult<()> {
        let op = if handshake { "ADOH" } else { "ADO" };
        let session = self.session(handle)?;
        session.require(Feature::VmeCycles)?;
        validate_address_only(address, am).map_err(|e| session.fail(op, e))?;

        let mut link = session.link().await;
        link.address_only(address, am, handshake)
            .await
            .map_err(|e| session.fail(op, e))?;
        trace!("[{}] {} {:#010x} {}", handle, op, address, am);
        Ok(())
    }

    /// Address strobe without data phase
    pub async fn ado_cycle(
        &self,
        handle: DeviceHandle,
        address: u32,
        am: AddressModifier,
    ) -> VmeResult<()> {
        self.address_only(handle, address, am, false).await
    }

    /// Address-only cycle that waits for the slave's acknowledge
    pub async fn adoh_cycle(
        &self,
        handle: DeviceHandle,
        address: u32,
        am: AddressModifier,
    ) -> VmeResult<()> {
        self.address_only(handle, address, am, true).await
    }

    /// Acknowledge `level` and return the interrupter's status/ID word
    pub async fn iack_cycle(
        &self,
        handle: DeviceHandle,
        level: IrqLevel,
        width: DataWidth,
    ) -> VmeResult<u32> {
        let session = self.session(handle)?;
        session.require(Feature::Iack)?;
        if width.is_d64() {
            return Err(session.fail(
                "IACK",
                VmeError::invalid_param("width", "IACK supports D8, D16 and D32"),
            ));
        }

        let mut link = session.link().await;
        let raw = link
            .iack_cycle(level, width.unswapped())
            .await
            .map_err(|e| session.fail("IACK", e))?;
        let vector = read_value(raw, width);
        debug!("[{}] IACK level {} -> {:#x}", handle, level.number(), vector);
        Ok(vector)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_single_validation_table() {
        use AddressModifier::*;
        assert!(validate_single(0x1000, A32UData, DataWidth::D32, false).is_ok());
        assert!(validate_single(0x10, A16S, DataWidth::D16Swapped, false).is_ok());
        assert!(validate_single(0x10, CrCsr, DataWidth::D8, false).is_ok());
        // Block modifiers are not single-cycle modifiers
        assert!(validate_single(0x1000, A32SBlt, DataWidth::D32, false).is_err());
        assert!(validate_single(0x1000, A24UMblt, DataWidth::D32, false).is_err());
        assert!(validate_single(0x1000, A6U2eVme, DataWidth::D32, false).is_err());
        // Lock only for RMW
        assert!(validate_single(0x1000, A32Lck, DataWidth::D32, false).is_err());
        assert!(validate_single(0x1000, A32Lck, DataWidth::D32, true).is_ok());
        assert!(validate_single(0x1000, A32UData, DataWidth::D64, false).is_err());
    }

    #[test]
    fn test_address_ranges() {
        use AddressModifier::*;
        assert!(validate_single(0xFFFE, A16U, DataWidth::D16, false).is_ok());
        assert!(validate_single(0x1_0000, A16U, DataWidth::D16, false).is_err());
        assert!(validate_single(0xFF_FFFC, A24UData, DataWidth::D32, false).is_ok());
        assert!(validate_single(0x100_0000, A24UData, DataWidth::D32, false).is_err());
        assert!(validate_single(0xFFFF_FFFC, A32UData, DataWidth::D32, false).is_ok());
        assert!(validate_single(0x1002, A32UData, DataWidth::D32, false).is_err());
    }

    #[test]
    fn test_block_validation() {
        use AddressModifier::*;
        assert!(validate_block(0, A32SBlt, DataWidth::D32, 256, true).is_ok());
        assert!(validate_block(0, A32SMblt, DataWidth::D64, 256, true).is_ok());
        assert!(validate_block(0, A32SMblt, DataWidth::D64Swapped, 64, true).is_ok());
        assert!(validate_block(0, A32SBlt, DataWidth::D64, 256, true).is_err());
        assert!(validate_block(0, A32SMblt, DataWidth::D32, 256, true).is_err());
        assert!(validate_block(0, A32UData, DataWidth::D32, 256, true).is_err());
        assert!(validate_block(0, A32SBlt, DataWidth::D32, 6, true).is_err());
        assert!(validate_block(0, A32SBlt, DataWidth::D32, 0, true).is_err());
        // FIFO transfers never leave the start address
        assert!(validate_block(0xFF_FFFC, A24SBlt, DataWidth::D32, 64, false).is_ok());
        assert!(validate_block(0xFF_FFFC, A24SBlt, DataWidth::D32, 64, true).is_err());
    }

    #[test]
    fn test_burst_len_respects_boundaries() {
        assert_eq!(burst_len(0, 1000, 256, true), 256);
        assert_eq!(burst_len(0xF0, 1000, 256, true), 16);
        assert_eq!(burst_len(0x100, 8, 256, true), 8);
        assert_eq!(burst_len(0xF0, 1000, 256, false), 256);
    }

    #[test]
    fn test_swap_units() {
        let mut buf = vec![1, 2, 3, 4, 5, 6, 7, 8];
        swap_units(&mut buf, 4);
        assert_eq!(buf, vec![4, 3, 2, 1, 8, 7, 6, 5]);
        swap_units(&mut buf, 1);
        assert_eq!(buf, vec![4, 3, 2, 1, 8, 7, 6, 5]);
    }

    #[test]
    fn test_value_swap() {
        assert_eq!(read_value(0x1122_3344, DataWidth::D32Swapped), 0x4433_2211);
        assert_eq!(read_value(0x1122, DataWidth::D16Swapped), 0x2211);
        assert_eq!(read_value(0x1122_3344, DataWidth::D32), 0x1122_3344);
    }

    #[test]
    fn test_full_transfer_never_pairs_with_error() {
        let t = BlockTransfer::finish(
            Bytes::from_static(&[0; 8]),
            8,
            8,
            Some(VmeError::BusError { address: 0 }),
        );
        assert!(t.is_complete());
        assert_eq!(t.status(), ErrorCode::Success);

        let t = BlockTransfer::finish(
            Bytes::from_static(&[0; 4]),
            4,
            8,
            Some(VmeError::BusError { address: 4 }),
        );
        assert_eq!(t.status(), ErrorCode::BusError);
        assert!(t.into_result().is_err());
    }

    #[test]
    fn test_check_fits() {
        assert!(check_fits(0xFF, DataWidth::D8).is_ok());
        assert!(check_fits(0x100, DataWidth::D8).is_err());
        assert!(check_fits(0xFFFF_FFFF, DataWidth::D32Swapped).is_ok());
    }
}
