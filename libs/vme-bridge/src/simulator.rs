//! Simulated bridge and VME crate
//!
//! Lets the core run without hardware. A `SimulatedCrate` holds the slave
//! memory, FIFOs, interrupters, bridge registers and flash; every
//! `SimulatedTransport` opened on the same link shares one crate, and tests
//! poke the crate directly to set up or inspect the bus.
//!
//! Slave memory is big-endian and sparse: any byte never written or mapped
//! answers with a bus error, like an empty slot in a real crate.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;
use vme_errors::{VmeError, VmeResult};
use vme_model::{AddressModifier, AddressSpace, DataWidth, IrqLevel, IrqMask, LinkKind, Register};

use crate::bridge::VmeBridge;
use crate::config::BridgeConfig;
use crate::link::{LinkKey, LinkTarget};
use crate::peripherals::display::DisplaySnapshot;
use crate::registry::TransportRegistry;
use crate::transport::{
    BlockRequest, BridgeAction, BridgeSetting, BridgeTransport, BurstOutcome, FlashGeometry,
    LinkOpener,
};

pub const SIM_FLASH_PAGE_SIZE: usize = 264;
pub const SIM_FLASH_PAGES: u32 = 4096;
pub const SIM_FIRMWARE_RELEASE: &str = "1.2.0";
pub const SIM_DRIVER_RELEASE: &str = "sim-1.0";

const ALL_LINKS: &[LinkKind] = &[
    LinkKind::Usb,
    LinkKind::UsbConet,
    LinkKind::PciConet,
    LinkKind::Ethernet,
];

// ============================================================================
// Crate state
// ============================================================================

type Location = (AddressSpace, u32);

#[derive(Default)]
struct CrateState {
    memory: HashMap<Location, u8>,
    fifos: HashMap<Location, VecDeque<u64>>,
    /// (space, first, last) inclusive
    bus_errors: Vec<(AddressSpace, u32, u32)>,
    registers: HashMap<u32, u32>,
    register_writes: Vec<(u32, u32)>,
    outputs: u32,
    flash: HashMap<u32, Vec<u8>>,
    vectors: [u32; 7],
    irq_enabled: IrqMask,
    settings: Vec<BridgeSetting>,
    actions: Vec<BridgeAction>,
    display: DisplaySnapshot,
    cycles: u64,
    resets: u32,
}

impl CrateState {
    fn check_bus_error(&self, space: AddressSpace, address: u32) -> VmeResult<()> {
        let hit = self
            .bus_errors
            .iter()
            .any(|&(s, first, last)| s == space && (first..=last).contains(&address));
        if hit {
            return Err(VmeError::BusError { address });
        }
        Ok(())
    }

    /// One beat; FIFO locations pop their queue, memory is big-endian
    fn read_beat(&mut self, space: AddressSpace, address: u32, unit: usize) -> VmeResult<u64> {
        self.check_bus_error(space, address)?;
        if let Some(queue) = self.fifos.get_mut(&(space, address)) {
            return queue.pop_front().ok_or(VmeError::BusError { address });
        }
        let mut value = 0u64;
        for i in 0..unit {
            let byte = self
                .memory
                .get(&(space, address.wrapping_add(i as u32)))
                .ok_or(VmeError::BusError { address })?;
            value = (value << 8) | u64::from(*byte);
        }
        Ok(value)
    }

    fn write_beat(
        &mut self,
        space: AddressSpace,
        address: u32,
        unit: usize,
        value: u64,
    ) -> VmeResult<()> {
        self.check_bus_error(space, address)?;
        if let Some(queue) = self.fifos.get_mut(&(space, address)) {
            queue.push_back(value);
            return Ok(());
        }
        for i in 0..unit {
            let shift = 8 * (unit - 1 - i);
            self.memory
                .insert((space, address.wrapping_add(i as u32)), (value >> shift) as u8);
        }
        Ok(())
    }

    fn record_cycle(
        &mut self,
        address: u32,
        am: AddressModifier,
        width: DataWidth,
        write: bool,
        result: &VmeResult<u64>,
    ) {
        self.cycles += 1;
        let data = result.as_ref().map(|v| *v as u32).unwrap_or(0);
        self.display = DisplaySnapshot {
            address,
            data,
            am: am.as_raw(),
            irq: self.display.irq,
            ds0: true,
            ds1: width.bytes() > 1,
            as_: true,
            write,
            lword: width.bytes() >= 4,
            dtack: result.is_ok(),
            berr: result.is_err(),
            ..Default::default()
        };
    }
}

/// Shared model of one bridge plus the boards in its crate
pub struct SimulatedCrate {
    state: Mutex<CrateState>,
    irq_lines: watch::Sender<u8>,
    link_down: AtomicBool,
    reject_settings: AtomicBool,
}

impl Default for SimulatedCrate {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCrate {
    pub fn new() -> Self {
        let (irq_lines, _) = watch::channel(0u8);
        Self {
            state: Mutex::new(CrateState::default()),
            irq_lines,
            link_down: AtomicBool::new(false),
            reject_settings: AtomicBool::new(false),
        }
    }

    // ------------------------------------------------------------------------
    // Slave memory
    // ------------------------------------------------------------------------

    pub fn write_memory(&self, space: AddressSpace, address: u32, bytes: &[u8]) {
        let mut state = self.state.lock();
        for (i, byte) in bytes.iter().enumerate() {
            state
                .memory
                .insert((space, address.wrapping_add(i as u32)), *byte);
        }
    }

    /// Bytes at `address`, `None` if any of them was never written
    pub fn read_memory(&self, space: AddressSpace, address: u32, len: usize) -> Option<Vec<u8>> {
        let state = self.state.lock();
        (0..len)
            .map(|i| {
                state
                    .memory
                    .get(&(space, address.wrapping_add(i as u32)))
                    .copied()
            })
            .collect()
    }

    /// Make `len` bytes answer, all zero
    pub fn map_zeroed(&self, space: AddressSpace, address: u32, len: usize) {
        self.write_memory(space, address, &vec![0; len]);
    }

    /// Turn `address` into a FIFO: reads pop `values`, writes append
    pub fn push_fifo(&self, space: AddressSpace, address: u32, values: &[u64]) {
        self.state
            .lock()
            .fifos
            .entry((space, address))
            .or_default()
            .extend(values.iter().copied());
    }

    pub fn fifo_contents(&self, space: AddressSpace, address: u32) -> Vec<u64> {
        self.state
            .lock()
            .fifos
            .get(&(space, address))
            .map(|q| q.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Any access to `len` bytes from `address` ends in BERR
    pub fn inject_bus_error(&self, space: AddressSpace, address: u32, len: u32) {
        let last = address.saturating_add(len.saturating_sub(1));
        self.state.lock().bus_errors.push((space, address, last));
    }

    // ------------------------------------------------------------------------
    // Interrupts
    // ------------------------------------------------------------------------

    /// Assert `level`; an IACK on it returns `vector` and releases the line
    pub fn assert_irq(&self, level: IrqLevel, vector: u32) {
        self.state.lock().vectors[usize::from(level.number() - 1)] = vector;
        self.irq_lines.send_modify(|lines| *lines |= level.as_raw());
    }

    pub fn release_irq(&self, level: IrqLevel) {
        self.irq_lines.send_modify(|lines| *lines &= !level.as_raw());
    }

    pub fn asserted(&self) -> IrqMask {
        IrqMask::truncate(*self.irq_lines.borrow())
    }

    /// Enable mask last pushed by the core
    pub fn irq_enabled(&self) -> IrqMask {
        self.state.lock().irq_enabled
    }

    // ------------------------------------------------------------------------
    // Fault injection
    // ------------------------------------------------------------------------

    /// Every transport call fails with a communication error while set
    pub fn set_link_down(&self, down: bool) {
        self.link_down.store(down, Ordering::Release);
    }

    /// Setting pushes fail while set
    pub fn reject_settings(&self, reject: bool) {
        self.reject_settings.store(reject, Ordering::Release);
    }

    // ------------------------------------------------------------------------
    // Bridge inspection
    // ------------------------------------------------------------------------

    pub fn settings(&self) -> Vec<BridgeSetting> {
        self.state.lock().settings.clone()
    }

    pub fn actions(&self) -> Vec<BridgeAction> {
        self.state.lock().actions.clone()
    }

    pub fn register(&self, register: impl Into<u32>) -> u32 {
        let register = register.into();
        let state = self.state.lock();
        if register == Register::OutRegSet.as_raw() {
            return state.outputs;
        }
        state.registers.get(&register).copied().unwrap_or(0)
    }

    pub fn set_register(&self, register: impl Into<u32>, value: u32) {
        self.state.lock().registers.insert(register.into(), value);
    }

    /// (register, value) of every register write, in order
    pub fn register_writes(&self) -> Vec<(u32, u32)> {
        self.state.lock().register_writes.clone()
    }

    /// Current output register lines
    pub fn outputs(&self) -> u32 {
        self.state.lock().outputs
    }

    pub fn flash_page(&self, page: u32) -> Vec<u8> {
        self.state
            .lock()
            .flash
            .get(&page)
            .cloned()
            .unwrap_or_else(|| vec![0xFF; SIM_FLASH_PAGE_SIZE])
    }

    pub fn cycle_count(&self) -> u64 {
        self.state.lock().cycles
    }

    pub fn reset_count(&self) -> u32 {
        self.state.lock().resets
    }
}

// ============================================================================
// Transport
// ============================================================================

pub struct SimulatedTransport {
    shared: Arc<SimulatedCrate>,
    name: String,
}

impl SimulatedTransport {
    pub fn new(shared: Arc<SimulatedCrate>, target: LinkTarget) -> Self {
        Self {
            shared,
            name: format!("simulated {}", target),
        }
    }

    fn check_link(&self) -> VmeResult<()> {
        if self.shared.link_down.load(Ordering::Acquire) {
            return Err(VmeError::communication("simulated link down"));
        }
        Ok(())
    }
}

#[async_trait]
impl BridgeTransport for SimulatedTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_cycle(
        &mut self,
        address: u32,
        am: AddressModifier,
        width: DataWidth,
    ) -> VmeResult<u32> {
        self.check_link()?;
        let mut state = self.shared.state.lock();
        let result = state.read_beat(am.space(), address, width.bytes());
        state.record_cycle(address, am, width, false, &result);
        result.map(|v| v as u32)
    }

    async fn write_cycle(
        &mut self,
        address: u32,
        am: AddressModifier,
        width: DataWidth,
        data: u32,
    ) -> VmeResult<()> {
        self.check_link()?;
        let mut state = self.shared.state.lock();
        let result = state
            .write_beat(am.space(), address, width.bytes(), u64::from(data))
            .map(|_| u64::from(data));
        state.record_cycle(address, am, width, true, &result);
        result.map(|_| ())
    }

    async fn rmw_cycle(
        &mut self,
        address: u32,
        am: AddressModifier,
        width: DataWidth,
        data: u32,
    ) -> VmeResult<u32> {
        self.check_link()?;
        let mut state = self.shared.state.lock();
        let space = am.space();
        let result = state.read_beat(space, address, width.bytes()).and_then(|old| {
            state.write_beat(space, address, width.bytes(), u64::from(data))?;
            Ok(old)
        });
        state.record_cycle(address, am, width, true, &result);
        result.map(|v| v as u32)
    }

    async fn block_read(&mut self, request: &BlockRequest) -> BurstOutcome {
        if let Err(e) = self.check_link() {
            return BurstOutcome::failed(Default::default(), 0, e);
        }
        let unit = request.width.bytes();
        let space = request.am.space();
        let mut state = self.shared.state.lock();
        state.cycles += 1;

        let mut data = BytesMut::with_capacity(request.len);
        for beat in 0..request.len / unit {
            let address = if request.increment {
                request.address.wrapping_add((beat * unit) as u32)
            } else {
                request.address
            };
            match state.read_beat(space, address, unit) {
                // Host order: one little-endian unit per beat
                Ok(value) => data.extend_from_slice(&value.to_le_bytes()[..unit]),
                Err(e) => {
                    let transferred = data.len();
                    return BurstOutcome::failed(data.freeze(), transferred, e);
                },
            }
        }
        BurstOutcome::complete(data.freeze())
    }

    async fn block_write(&mut self, request: &BlockRequest, data: &[u8]) -> BurstOutcome {
        if let Err(e) = self.check_link() {
            return BurstOutcome::failed(Default::default(), 0, e);
        }
        let unit = request.width.bytes();
        let space = request.am.space();
        let mut state = self.shared.state.lock();
        state.cycles += 1;

        for (beat, chunk) in data.chunks_exact(unit).enumerate() {
            let address = if request.increment {
                request.address.wrapping_add((beat * unit) as u32)
            } else {
                request.address
            };
            let mut raw = [0u8; 8];
            raw[..unit].copy_from_slice(chunk);
            if let Err(e) = state.write_beat(space, address, unit, u64::from_le_bytes(raw)) {
                return BurstOutcome::failed(Default::default(), beat * unit, e);
            }
        }
        BurstOutcome::written(data.len() - data.len() % unit)
    }

    async fn address_only(
        &mut self,
        address: u32,
        am: AddressModifier,
        handshake: bool,
    ) -> VmeResult<()> {
        self.check_link()?;
        let mut state = self.shared.state.lock();
        state.cycles += 1;
        let space = am.space();
        state.check_bus_error(space, address)?;
        // Only a present slave acknowledges
        if handshake
            && !state.memory.contains_key(&(space, address))
            && !state.fifos.contains_key(&(space, address))
        {
            return Err(VmeError::BusError { address });
        }
        Ok(())
    }

    async fn iack_cycle(&mut self, level: IrqLevel, width: DataWidth) -> VmeResult<u32> {
        self.check_link()?;
        if !self.shared.asserted().contains(level) {
            return Err(VmeError::BusError { address: 0 });
        }
        let vector = {
            let mut state = self.shared.state.lock();
            state.cycles += 1;
            state.vectors[usize::from(level.number() - 1)]
        };
        self.shared.release_irq(level);
        Ok((u64::from(vector) & width.value_mask()) as u32)
    }

    async fn irq_status(&mut self) -> VmeResult<IrqMask> {
        self.check_link()?;
        Ok(self.shared.asserted())
    }

    async fn set_irq_enable(&mut self, enabled: IrqMask) -> VmeResult<()> {
        self.check_link()?;
        self.shared.state.lock().irq_enabled = enabled;
        Ok(())
    }

    async fn wait_irq(&mut self, mask: IrqMask) -> VmeResult<IrqMask> {
        self.check_link()?;
        let mut lines = self.shared.irq_lines.subscribe();
        loop {
            let asserted = IrqMask::truncate(*lines.borrow_and_update()).intersection(mask);
            if !asserted.is_empty() {
                return Ok(asserted);
            }
            if lines.changed().await.is_err() {
                return Err(VmeError::communication("interrupt source closed"));
            }
        }
    }

    async fn read_register(&mut self, register: u32) -> VmeResult<u32> {
        self.check_link()?;
        Ok(self.shared.register(register))
    }

    async fn write_register(&mut self, register: u32, value: u32) -> VmeResult<()> {
        self.check_link()?;
        let mut state = self.shared.state.lock();
        state.register_writes.push((register, value));
        match Register::from_raw(register) {
            Some(Register::OutRegSet) => state.outputs |= value,
            Some(Register::OutRegClear) => state.outputs &= !value,
            _ => {
                state.registers.insert(register, value);
            },
        }
        Ok(())
    }

    async fn apply(&mut self, setting: &BridgeSetting) -> VmeResult<()> {
        self.check_link()?;
        if self.shared.reject_settings.load(Ordering::Acquire) {
            return Err(VmeError::generic("simulated bridge rejected the setting"));
        }
        self.shared.state.lock().settings.push(setting.clone());
        Ok(())
    }

    async fn trigger(&mut self, action: BridgeAction) -> VmeResult<()> {
        self.check_link()?;
        let mut state = self.shared.state.lock();
        if action == BridgeAction::SystemReset {
            state.display.sysres = true;
        }
        state.actions.push(action);
        Ok(())
    }

    async fn read_display(&mut self) -> VmeResult<DisplaySnapshot> {
        self.check_link()?;
        let mut snapshot = self.shared.state.lock().display;
        snapshot.irq = self.shared.asserted().bits();
        Ok(snapshot)
    }

    fn flash_geometry(&self) -> FlashGeometry {
        FlashGeometry {
            page_size: SIM_FLASH_PAGE_SIZE,
            page_count: SIM_FLASH_PAGES,
        }
    }

    async fn read_flash_page(&mut self, page: u32) -> VmeResult<Vec<u8>> {
        self.check_link()?;
        Ok(self.shared.flash_page(page))
    }

    async fn write_flash_page(&mut self, page: u32, data: &[u8]) -> VmeResult<()> {
        self.check_link()?;
        self.shared.state.lock().flash.insert(page, data.to_vec());
        Ok(())
    }

    async fn erase_flash_page(&mut self, page: u32) -> VmeResult<()> {
        self.check_link()?;
        self.shared.state.lock().flash.remove(&page);
        Ok(())
    }

    async fn firmware_release(&mut self) -> VmeResult<String> {
        self.check_link()?;
        Ok(format!("{}\0\0\0", SIM_FIRMWARE_RELEASE))
    }

    async fn driver_release(&mut self) -> VmeResult<String> {
        self.check_link()?;
        Ok(format!("{}\0", SIM_DRIVER_RELEASE))
    }

    async fn device_reset(&mut self) -> VmeResult<()> {
        self.check_link()?;
        self.shared.state.lock().resets += 1;
        Ok(())
    }

    async fn close(&mut self) -> VmeResult<()> {
        debug!("{} closed", self.name);
        Ok(())
    }
}

// ============================================================================
// Opener
// ============================================================================

/// Local and VME handles of one link reach the same crate
type CrateKey = LinkKey;

/// Opens simulated links of every kind. Handles on the same link, local or
/// not, share one crate.
#[derive(Default)]
pub struct SimulatedOpener {
    crates: DashMap<CrateKey, Arc<SimulatedCrate>>,
    unreachable: DashMap<CrateKey, ()>,
}

impl SimulatedOpener {
    pub fn new() -> Self {
        Self::default()
    }

    fn crate_key(target: &LinkTarget) -> CrateKey {
        LinkKey {
            local: false,
            ..target.key()
        }
    }

    /// The crate behind `target`, created on first use
    pub fn crate_for(&self, target: &LinkTarget) -> Arc<SimulatedCrate> {
        self.crates
            .entry(Self::crate_key(target))
            .or_insert_with(|| Arc::new(SimulatedCrate::new()))
            .value()
            .clone()
    }

    /// Make opens of `target` fail as if nothing answered
    pub fn set_unreachable(&self, target: &LinkTarget, unreachable: bool) {
        let key = Self::crate_key(target);
        if unreachable {
            self.unreachable.insert(key, ());
        } else {
            self.unreachable.remove(&key);
        }
    }
}

#[async_trait]
impl LinkOpener for SimulatedOpener {
    fn link_kinds(&self) -> &'static [LinkKind] {
        ALL_LINKS
    }

    async fn open(&self, target: &LinkTarget) -> VmeResult<Box<dyn BridgeTransport>> {
        if self.unreachable.contains_key(&Self::crate_key(target)) {
            return Err(VmeError::communication(format!("{} does not answer", target)));
        }
        let shared = self.crate_for(target);
        Ok(Box::new(SimulatedTransport::new(shared, target.clone())))
    }
}

/// Bridge wired to a fresh simulated opener
pub fn simulated_bridge(config: BridgeConfig) -> (VmeBridge, Arc<SimulatedOpener>) {
    let opener = Arc::new(SimulatedOpener::new());
    let registry = Arc::new(TransportRegistry::new());
    registry.register(opener.clone());
    (VmeBridge::new(config, registry), opener)
}
