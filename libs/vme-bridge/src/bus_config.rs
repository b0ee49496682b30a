//! Bus configuration registry
//!
//! Each setter pushes the new value to the bridge first and updates the
//! per-handle cache only when the bridge accepted it. Getters read the cache.

use serde::{Deserialize, Serialize};
use tracing::debug;
use vme_errors::{VmeError, VmeResult};
use vme_model::{
    AddressModifier, ArbiterType, BusRequestLevel, CycleClass, Feature, ReleaseType,
    RequesterType, VmeTimeout,
};

use crate::bridge::VmeBridge;
use crate::session::{DeviceHandle, SessionState};
use crate::transport::BridgeSetting;

/// Location monitor trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationMonitor {
    pub address: u32,
    pub am: AddressModifier,
    /// Match write cycles (false: read cycles)
    pub write: bool,
    /// Match 32-bit cycles only
    pub lword: bool,
    /// Match IACK cycles
    pub iack: bool,
}

/// Cached bus settings of one handle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    pub arbiter: ArbiterType,
    pub requester: RequesterType,
    pub release: ReleaseType,
    pub bus_request_level: BusRequestLevel,
    pub timeout: VmeTimeout,
    /// Plain block entry points keep the address fixed when set
    pub fifo_mode: bool,
    pub location_monitor: Option<LocationMonitor>,
}

impl VmeBridge {
    /// Push `setting`, then record it with `update`
    pub(crate) async fn push_setting(
        &self,
        handle: DeviceHandle,
        feature: Feature,
        op: &str,
        setting: BridgeSetting,
        update: impl FnOnce(&mut SessionState),
    ) -> VmeResult<()> {
        let session = self.session(handle)?;
        session.require(feature)?;
        session
            .link()
            .await
            .apply(&setting)
            .await
            .map_err(|e| session.fail(op, e))?;
        update(&mut *session.state());
        debug!("[{}] {} -> {:?}", handle, op, setting);
        Ok(())
    }

    /// Read the cache after checking the handle can use `feature`
    pub(crate) fn read_cached<T>(
        &self,
        handle: DeviceHandle,
        feature: Feature,
        read: impl FnOnce(&SessionState) -> T,
    ) -> VmeResult<T> {
        let session = self.session(handle)?;
        session.require(feature)?;
        let state = session.state();
        Ok(read(&*state))
    }

    pub async fn set_arbiter_type(&self, handle: DeviceHandle, value: ArbiterType) -> VmeResult<()> {
        self.push_setting(
            handle,
            Feature::BusArbitration,
            "set arbiter",
            BridgeSetting::Arbiter(value),
            |s| s.bus.arbiter = value,
        )
        .await
    }

    pub fn get_arbiter_type(&self, handle: DeviceHandle) -> VmeResult<ArbiterType> {
        self.read_cached(handle, Feature::BusArbitration, |s| s.bus.arbiter)
    }

    pub async fn set_requester_type(
        &self,
        handle: DeviceHandle,
        value: RequesterType,
    ) -> VmeResult<()> {
        self.push_setting(
            handle,
            Feature::BusArbitration,
            "set requester",
            BridgeSetting::Requester(value),
            |s| s.bus.requester = value,
        )
        .await
    }

    pub fn get_requester_type(&self, handle: DeviceHandle) -> VmeResult<RequesterType> {
        self.read_cached(handle, Feature::BusArbitration, |s| s.bus.requester)
    }

    pub async fn set_release_type(&self, handle: DeviceHandle, value: ReleaseType) -> VmeResult<()> {
        self.push_setting(
            handle,
            Feature::BusArbitration,
            "set release",
            BridgeSetting::Release(value),
            |s| s.bus.release = value,
        )
        .await
    }

    pub fn get_release_type(&self, handle: DeviceHandle) -> VmeResult<ReleaseType> {
        self.read_cached(handle, Feature::BusArbitration, |s| s.bus.release)
    }

    pub async fn set_bus_request_level(
        &self,
        handle: DeviceHandle,
        value: BusRequestLevel,
    ) -> VmeResult<()> {
        self.push_setting(
            handle,
            Feature::BusArbitration,
            "set bus request level",
            BridgeSetting::BusRequestLevel(value),
            |s| s.bus.bus_request_level = value,
        )
        .await
    }

    pub fn get_bus_request_level(&self, handle: DeviceHandle) -> VmeResult<BusRequestLevel> {
        self.read_cached(handle, Feature::BusArbitration, |s| s.bus.bus_request_level)
    }

    pub async fn set_timeout(&self, handle: DeviceHandle, value: VmeTimeout) -> VmeResult<()> {
        self.push_setting(
            handle,
            Feature::BusArbitration,
            "set bus timeout",
            BridgeSetting::BusTimeout(value),
            |s| s.bus.timeout = value,
        )
        .await
    }

    pub fn get_timeout(&self, handle: DeviceHandle) -> VmeResult<VmeTimeout> {
        self.read_cached(handle, Feature::BusArbitration, |s| s.bus.timeout)
    }

    /// Select FIFO addressing for the plain BLT/MBLT entry points.
    /// Host-side only; nothing is sent to the bridge.
    pub fn set_fifo_mode(&self, handle: DeviceHandle, enabled: bool) -> VmeResult<()> {
        let session = self.session(handle)?;
        session.require(Feature::VmeCycles)?;
        session.state().bus.fifo_mode = enabled;
        debug!("[{}] FIFO mode {}", handle, if enabled { "on" } else { "off" });
        Ok(())
    }

    pub fn get_fifo_mode(&self, handle: DeviceHandle) -> VmeResult<bool> {
        self.read_cached(handle, Feature::VmeCycles, |s| s.bus.fifo_mode)
    }

    pub async fn set_location_monitor(
        &self,
        handle: DeviceHandle,
        monitor: LocationMonitor,
    ) -> VmeResult<()> {
        if matches!(monitor.am.class(), CycleClass::Mblt | CycleClass::TwoEdge)
            || monitor.address > monitor.am.space().max_address()
        {
            return Err(VmeError::invalid_param(
                "location_monitor",
                format!("{:#010x} {} cannot be monitored", monitor.address, monitor.am),
            ));
        }
        self.push_setting(
            handle,
            Feature::LocationMonitor,
            "set location monitor",
            BridgeSetting::LocationMonitor(monitor),
            |s| s.bus.location_monitor = Some(monitor),
        )
        .await
    }

    pub fn get_location_monitor(&self, handle: DeviceHandle) -> VmeResult<Option<LocationMonitor>> {
        self.read_cached(handle, Feature::LocationMonitor, |s| s.bus.location_monitor)
    }

    /// Snapshot of every cached setting of the handle
    pub fn bus_config(&self, handle: DeviceHandle) -> VmeResult<BusConfig> {
        Ok(self.session(handle)?.state().bus.clone())
    }
}
