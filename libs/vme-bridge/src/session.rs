//! Handle table and per-handle session state

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn, Level};
use vme_errors::{VmeError, VmeResult};
use vme_model::{BoardType, Feature, IrqMask};

use crate::bus_config::BusConfig;
use crate::cycles::BlockTransfer;
use crate::link::{LinkKey, LinkTarget};
use crate::peripherals::io_lines::{InputConfig, OutputConfig};
use crate::peripherals::pulser::PulserConfig;
use crate::peripherals::scaler::{ExtendedScalerConfig, ScalerConfig};
use crate::transport::BridgeTransport;

// ============================================================================
// DeviceHandle
// ============================================================================

const INDEX_BITS: u32 = 16;
const INDEX_MASK: i32 = 0xFFFF;
const GENERATION_MASK: u16 = 0x7FFF;

/// Largest table whose slot indices all fit the handle's index field
pub(crate) const MAX_SESSIONS: usize = u16::MAX as usize;

/// Caller-visible handle: slot index plus a generation that changes every
/// time the slot is reused. Always non-negative as a raw `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceHandle(i32);

impl DeviceHandle {
    pub(crate) fn new(index: u16, generation: u16) -> Self {
        DeviceHandle((i32::from(generation & GENERATION_MASK) << INDEX_BITS) | i32::from(index))
    }

    /// Rebuild a handle from its raw value; validity is checked on use
    pub fn from_raw(raw: i32) -> Self {
        DeviceHandle(raw)
    }

    pub fn as_raw(self) -> i32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        (self.0 & INDEX_MASK) as usize
    }

    pub(crate) fn generation(self) -> u16 {
        ((self.0 >> INDEX_BITS) as u16) & GENERATION_MASK
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Session
// ============================================================================

/// Cached configuration owned by one handle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub bus: BusConfig,
    pub irq_enabled: IrqMask,
    pub pulsers: [PulserConfig; 2],
    pub scaler: ScalerConfig,
    pub extended_scaler: ExtendedScalerConfig,
    pub inputs: [InputConfig; 2],
    pub outputs: [OutputConfig; 5],
}

pub(crate) struct PendingBlt {
    pub task: JoinHandle<BlockTransfer>,
    pub started: Instant,
    pub size: usize,
}

pub(crate) type SharedTransport = Arc<tokio::sync::Mutex<Box<dyn BridgeTransport>>>;

pub struct Session {
    handle: DeviceHandle,
    target: LinkTarget,
    transport: SharedTransport,
    state: Mutex<SessionState>,
    pending: tokio::sync::Mutex<Option<PendingBlt>>,
    pending_flag: AtomicBool,
}

impl Session {
    pub(crate) fn new(
        handle: DeviceHandle,
        target: LinkTarget,
        transport: Box<dyn BridgeTransport>,
    ) -> Self {
        Self {
            handle,
            target,
            transport: Arc::new(tokio::sync::Mutex::new(transport)),
            state: Mutex::new(SessionState::default()),
            pending: tokio::sync::Mutex::new(None),
            pending_flag: AtomicBool::new(false),
        }
    }

    pub fn handle(&self) -> DeviceHandle {
        self.handle
    }

    pub fn board(&self) -> BoardType {
        self.target.board
    }

    pub fn target(&self) -> &LinkTarget {
        &self.target
    }

    pub(crate) fn require(&self, feature: Feature) -> VmeResult<()> {
        if self.board().supports(feature) {
            Ok(())
        } else {
            Err(VmeError::not_supported(self.board(), feature.as_str()))
        }
    }

    /// Reject while an asynchronous block read owns the link
    pub(crate) fn ensure_idle(&self) -> VmeResult<()> {
        if self.pending_flag.load(Ordering::Acquire) {
            return Err(VmeError::TransferPending(self.handle.as_raw()));
        }
        Ok(())
    }

    pub(crate) async fn link(&self) -> tokio::sync::MutexGuard<'_, Box<dyn BridgeTransport>> {
        self.transport.lock().await
    }

    pub(crate) fn shared_link(&self) -> SharedTransport {
        self.transport.clone()
    }

    pub(crate) fn state(&self) -> parking_lot::MutexGuard<'_, SessionState> {
        self.state.lock()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.lock().clone()
    }

    pub(crate) fn pending(&self) -> &tokio::sync::Mutex<Option<PendingBlt>> {
        &self.pending
    }

    pub(crate) fn set_pending(&self, pending: bool) {
        self.pending_flag.store(pending, Ordering::Release);
    }

    /// Log a failed operation at the level its category calls for
    pub(crate) fn fail(&self, op: &str, err: VmeError) -> VmeError {
        log_failure(self.handle, op, &err);
        err
    }
}

pub(crate) fn log_failure(handle: DeviceHandle, op: &str, err: &VmeError) {
    match err.log_level() {
        Level::ERROR => error!("[{}] {} failed: {}", handle, op, err),
        Level::WARN => warn!("[{}] {} failed: {}", handle, op, err),
        _ => debug!("[{}] {} rejected: {}", handle, op, err),
    }
}

// ============================================================================
// SessionTable
// ============================================================================

enum SlotState {
    Free,
    /// Reserved while the transport is being opened
    Opening(LinkKey),
    Open(Arc<Session>, LinkKey),
}

struct Slot {
    generation: u16,
    state: SlotState,
}

impl Slot {
    fn key(&self) -> Option<&LinkKey> {
        match &self.state {
            SlotState::Free => None,
            SlotState::Opening(key) | SlotState::Open(_, key) => Some(key),
        }
    }

    fn retire(&mut self) -> SlotState {
        self.generation = self.generation.wrapping_add(1) & GENERATION_MASK;
        std::mem::replace(&mut self.state, SlotState::Free)
    }
}

/// Fixed-capacity arena of sessions
pub(crate) struct SessionTable {
    slots: RwLock<Vec<Slot>>,
}

impl SessionTable {
    /// Build a table of `capacity` slots, capped at [`MAX_SESSIONS`]
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity.min(MAX_SESSIONS))
            .map(|_| Slot {
                generation: 0,
                state: SlotState::Free,
            })
            .collect();
        Self {
            slots: RwLock::new(slots),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.read().len()
    }

    /// Claim a free slot for `key`, failing if the link already has one
    pub fn reserve(&self, key: &LinkKey) -> VmeResult<DeviceHandle> {
        let mut slots = self.slots.write();
        if slots.iter().any(|slot| slot.key() == Some(key)) {
            return Err(VmeError::AlreadyOpen(key.to_string()));
        }
        let capacity = slots.len();
        let (index, slot) = slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| matches!(slot.state, SlotState::Free))
            .ok_or(VmeError::MaxBoardCount(capacity))?;
        let index = u16::try_from(index).map_err(|_| VmeError::MaxBoardCount(capacity))?;
        slot.state = SlotState::Opening(key.clone());
        Ok(DeviceHandle::new(index, slot.generation))
    }

    pub fn activate(&self, handle: DeviceHandle, session: Arc<Session>) {
        let mut slots = self.slots.write();
        if let Some(slot) = slots.get_mut(handle.index()) {
            if slot.generation == handle.generation() {
                if let SlotState::Opening(key) = std::mem::replace(&mut slot.state, SlotState::Free)
                {
                    slot.state = SlotState::Open(session, key);
                }
            }
        }
    }

    /// Drop a reservation whose open failed
    pub fn abandon(&self, handle: DeviceHandle) {
        let mut slots = self.slots.write();
        if let Some(slot) = slots.get_mut(handle.index()) {
            if slot.generation == handle.generation()
                && matches!(slot.state, SlotState::Opening(_))
            {
                slot.retire();
            }
        }
    }

    pub fn get(&self, handle: DeviceHandle) -> VmeResult<Arc<Session>> {
        let slots = self.slots.read();
        match slots.get(handle.index()) {
            Some(Slot {
                generation,
                state: SlotState::Open(session, _),
            }) if *generation == handle.generation() && handle.as_raw() >= 0 => {
                Ok(session.clone())
            },
            _ => Err(VmeError::InvalidHandle(handle.as_raw())),
        }
    }

    /// Remove an open session; the handle becomes stale
    pub fn release(&self, handle: DeviceHandle) -> VmeResult<Arc<Session>> {
        let mut slots = self.slots.write();
        let slot = slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation() && handle.as_raw() >= 0)
            .ok_or(VmeError::InvalidHandle(handle.as_raw()))?;
        if !matches!(slot.state, SlotState::Open(..)) {
            return Err(VmeError::InvalidHandle(handle.as_raw()));
        }
        match slot.retire() {
            SlotState::Open(session, _) => Ok(session),
            _ => Err(VmeError::InvalidHandle(handle.as_raw())),
        }
    }

    pub fn open_handles(&self) -> Vec<DeviceHandle> {
        self.slots
            .read()
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot.state, SlotState::Open(..)))
            .map(|(index, slot)| DeviceHandle::new(index as u16, slot.generation))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::link::LinkArg;
    use crate::simulator::{SimulatedCrate, SimulatedTransport};
    use vme_errors::ErrorCode;

    fn target(index: u32) -> LinkTarget {
        LinkTarget::new(BoardType::V1718, LinkArg::Index(index), 0).unwrap()
    }

    fn session(handle: DeviceHandle, target: LinkTarget) -> Arc<Session> {
        let transport = SimulatedTransport::new(Arc::new(SimulatedCrate::new()), target.clone());
        Arc::new(Session::new(handle, target, Box::new(transport)))
    }

    #[test]
    fn test_handle_packing() {
        let handle = DeviceHandle::new(5, 3);
        assert_eq!(handle.index(), 5);
        assert_eq!(handle.generation(), 3);
        assert!(handle.as_raw() >= 0);
        assert_eq!(DeviceHandle::from_raw(handle.as_raw()), handle);

        let max = DeviceHandle::new(u16::MAX, u16::MAX);
        assert!(max.as_raw() >= 0);
    }

    #[test]
    fn test_reserve_rejects_duplicate_link() {
        let table = SessionTable::new(4);
        let key = target(0).key();
        table.reserve(&key).unwrap();
        let err = table.reserve(&key).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyOpenError);
    }

    #[test]
    fn test_reserve_exhausts_table() {
        let table = SessionTable::new(2);
        table.reserve(&target(0).key()).unwrap();
        table.reserve(&target(1).key()).unwrap();
        let err = table.reserve(&target(2).key()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MaxBoardCountError);
    }

    #[test]
    fn test_oversized_table_is_capped_to_handle_range() {
        let table = SessionTable::new(usize::from(u16::MAX) + 10);
        assert_eq!(table.capacity(), MAX_SESSIONS);

        // The last slot still packs into a distinct handle
        let last = u16::try_from(table.capacity() - 1).unwrap();
        let top = DeviceHandle::new(last, 0);
        assert_eq!(top.index(), table.capacity() - 1);
        assert_ne!(top, DeviceHandle::new(0, 0));

        let first = table.reserve(&target(0).key()).unwrap();
        let second = table.reserve(&target(1).key()).unwrap();
        assert_ne!(first.index(), second.index());
    }

    #[tokio::test]
    async fn test_release_makes_handle_stale() {
        let table = SessionTable::new(1);
        let t = target(0);
        let handle = table.reserve(&t.key()).unwrap();
        assert!(table.get(handle).is_err());
        table.activate(handle, session(handle, t.clone()));
        assert!(table.get(handle).is_ok());

        table.release(handle).unwrap();
        assert_eq!(table.get(handle).err().unwrap().code(), ErrorCode::CommError);
        assert_eq!(
            table.release(handle).err().unwrap().code(),
            ErrorCode::CommError
        );

        // Same slot, new generation
        let again = table.reserve(&t.key()).unwrap();
        assert_eq!(again.index(), handle.index());
        assert_ne!(again, handle);
    }

    #[test]
    fn test_abandon_frees_reservation() {
        let table = SessionTable::new(1);
        let key = target(0).key();
        let handle = table.reserve(&key).unwrap();
        table.abandon(handle);
        assert!(table.reserve(&key).is_ok());
    }

    #[test]
    fn test_unknown_handles() {
        let table = SessionTable::new(2);
        assert!(table.get(DeviceHandle::from_raw(-1)).is_err());
        assert!(table.get(DeviceHandle::from_raw(0x7FFF_0100)).is_err());
        assert!(table.open_handles().is_empty());
    }
}
