//! Legacy scaler (V1718/V2718) and extended scaler (V3718)

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use vme_errors::{VmeError, VmeResult};
use vme_model::registers::SCALER_COUNT_MASK;
use vme_model::{ContinuousRun, Feature, IoSource, Register, ScalerMode, ScalerSource};

use crate::bridge::VmeBridge;
use crate::session::DeviceHandle;
use crate::transport::{BridgeAction, BridgeSetting};

/// Largest legacy scaler limit
pub const SCALER_LIMIT_MAX: u16 = 1023;

// ============================================================================
// Legacy scaler
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalerConfig {
    /// Count at which the end-of-count output fires
    pub limit: u16,
    pub auto_reset: bool,
    pub hit: IoSource,
    pub gate: IoSource,
    pub reset: IoSource,
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            limit: 0,
            auto_reset: false,
            hit: IoSource::ManualSw,
            gate: IoSource::ManualSw,
            reset: IoSource::ManualSw,
        }
    }
}

impl ScalerConfig {
    pub fn validate(&self) -> VmeResult<()> {
        if self.limit > SCALER_LIMIT_MAX {
            return Err(VmeError::invalid_param(
                "limit",
                format!("{} exceeds {}", self.limit, SCALER_LIMIT_MAX),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Extended scaler
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedScalerConfig {
    pub input: ScalerSource,
    pub gate: ScalerSource,
    pub clear: ScalerSource,
    pub start: ScalerSource,
    pub mode: ScalerMode,
    pub max_hits: u16,
    pub dwell_time: u16,
    pub continuous_run: ContinuousRun,
}

impl Default for ExtendedScalerConfig {
    fn default() -> Self {
        Self {
            input: ScalerSource::In0,
            gate: ScalerSource::Sw,
            clear: ScalerSource::Sw,
            start: ScalerSource::Sw,
            mode: ScalerMode::Gate,
            max_hits: 0,
            dwell_time: 0,
            continuous_run: ContinuousRun::Off,
        }
    }
}

/// One field of the extended scaler, written individually
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtendedScalerSetting {
    InputSource(ScalerSource),
    GateSource(ScalerSource),
    ClearSource(ScalerSource),
    StartSource(ScalerSource),
    Mode(ScalerMode),
    MaxHits(u16),
    DwellTime(u16),
    ContinuousRun(ContinuousRun),
}

impl ExtendedScalerConfig {
    fn apply(&mut self, setting: ExtendedScalerSetting) {
        match setting {
            ExtendedScalerSetting::InputSource(v) => self.input = v,
            ExtendedScalerSetting::GateSource(v) => self.gate = v,
            ExtendedScalerSetting::ClearSource(v) => self.clear = v,
            ExtendedScalerSetting::StartSource(v) => self.start = v,
            ExtendedScalerSetting::Mode(v) => self.mode = v,
            ExtendedScalerSetting::MaxHits(v) => self.max_hits = v,
            ExtendedScalerSetting::DwellTime(v) => self.dwell_time = v,
            ExtendedScalerSetting::ContinuousRun(v) => self.continuous_run = v,
        }
    }
}

impl VmeBridge {
    // ------------------------------------------------------------------------
    // Legacy
    // ------------------------------------------------------------------------

    pub async fn set_scaler_conf(&self, handle: DeviceHandle, config: ScalerConfig) -> VmeResult<()> {
        config.validate()?;
        self.push_setting(
            handle,
            Feature::LegacyScaler,
            "set scaler",
            BridgeSetting::Scaler(config),
            |s| s.scaler = config,
        )
        .await
    }

    pub fn get_scaler_conf(&self, handle: DeviceHandle) -> VmeResult<ScalerConfig> {
        self.read_cached(handle, Feature::LegacyScaler, |s| s.scaler)
    }

    async fn scaler_action(
        &self,
        handle: DeviceHandle,
        feature: Feature,
        action: BridgeAction,
    ) -> VmeResult<()> {
        let session = self.session(handle)?;
        session.require(feature)?;
        session
            .link()
            .await
            .trigger(action)
            .await
            .map_err(|e| session.fail("scaler", e))?;
        debug!("[{}] {:?}", handle, action);
        Ok(())
    }

    pub async fn reset_scaler_count(&self, handle: DeviceHandle) -> VmeResult<()> {
        self.scaler_action(handle, Feature::LegacyScaler, BridgeAction::ResetScalerCount)
            .await
    }

    pub async fn enable_scaler_gate(&self, handle: DeviceHandle) -> VmeResult<()> {
        self.scaler_action(handle, Feature::LegacyScaler, BridgeAction::EnableScalerGate)
            .await
    }

    pub async fn disable_scaler_gate(&self, handle: DeviceHandle) -> VmeResult<()> {
        self.scaler_action(handle, Feature::LegacyScaler, BridgeAction::DisableScalerGate)
            .await
    }

    /// Current legacy scaler count
    pub async fn scaler_count(&self, handle: DeviceHandle) -> VmeResult<u16> {
        let session = self.session(handle)?;
        session.require(Feature::LegacyScaler)?;
        let raw = session
            .link()
            .await
            .read_register(Register::Scaler1.as_raw())
            .await
            .map_err(|e| session.fail("scaler count", e))?;
        let count = (raw & SCALER_COUNT_MASK) as u16;
        trace!("[{}] scaler count {}", handle, count);
        Ok(count)
    }

    // ------------------------------------------------------------------------
    // Extended
    // ------------------------------------------------------------------------

    async fn set_extended(
        &self,
        handle: DeviceHandle,
        setting: ExtendedScalerSetting,
    ) -> VmeResult<()> {
        self.push_setting(
            handle,
            Feature::ExtendedScaler,
            "set extended scaler",
            BridgeSetting::ExtendedScaler(setting),
            |s| s.extended_scaler.apply(setting),
        )
        .await
    }

    pub async fn set_scaler_input_source(
        &self,
        handle: DeviceHandle,
        source: ScalerSource,
    ) -> VmeResult<()> {
        self.set_extended(handle, ExtendedScalerSetting::InputSource(source))
            .await
    }

    pub fn get_scaler_input_source(&self, handle: DeviceHandle) -> VmeResult<ScalerSource> {
        self.read_cached(handle, Feature::ExtendedScaler, |s| s.extended_scaler.input)
    }

    pub async fn set_scaler_gate_source(
        &self,
        handle: DeviceHandle,
        source: ScalerSource,
    ) -> VmeResult<()> {
        self.set_extended(handle, ExtendedScalerSetting::GateSource(source))
            .await
    }

    pub fn get_scaler_gate_source(&self, handle: DeviceHandle) -> VmeResult<ScalerSource> {
        self.read_cached(handle, Feature::ExtendedScaler, |s| s.extended_scaler.gate)
    }

    pub async fn set_scaler_clear_source(
        &self,
        handle: DeviceHandle,
        source: ScalerSource,
    ) -> VmeResult<()> {
        self.set_extended(handle, ExtendedScalerSetting::ClearSource(source))
            .await
    }

    pub fn get_scaler_clear_source(&self, handle: DeviceHandle) -> VmeResult<ScalerSource> {
        self.read_cached(handle, Feature::ExtendedScaler, |s| s.extended_scaler.clear)
    }

    pub async fn set_scaler_start_source(
        &self,
        handle: DeviceHandle,
        source: ScalerSource,
    ) -> VmeResult<()> {
        self.set_extended(handle, ExtendedScalerSetting::StartSource(source))
            .await
    }

    pub fn get_scaler_start_source(&self, handle: DeviceHandle) -> VmeResult<ScalerSource> {
        self.read_cached(handle, Feature::ExtendedScaler, |s| s.extended_scaler.start)
    }

    pub async fn set_scaler_mode(&self, handle: DeviceHandle, mode: ScalerMode) -> VmeResult<()> {
        self.set_extended(handle, ExtendedScalerSetting::Mode(mode))
            .await
    }

    pub fn get_scaler_mode(&self, handle: DeviceHandle) -> VmeResult<ScalerMode> {
        self.read_cached(handle, Feature::ExtendedScaler, |s| s.extended_scaler.mode)
    }

    pub async fn set_scaler_max_hits(&self, handle: DeviceHandle, hits: u16) -> VmeResult<()> {
        self.set_extended(handle, ExtendedScalerSetting::MaxHits(hits))
            .await
    }

    pub fn get_scaler_max_hits(&self, handle: DeviceHandle) -> VmeResult<u16> {
        self.read_cached(handle, Feature::ExtendedScaler, |s| {
            s.extended_scaler.max_hits
        })
    }

    pub async fn set_scaler_dwell_time(&self, handle: DeviceHandle, dwell: u16) -> VmeResult<()> {
        self.set_extended(handle, ExtendedScalerSetting::DwellTime(dwell))
            .await
    }

    pub fn get_scaler_dwell_time(&self, handle: DeviceHandle) -> VmeResult<u16> {
        self.read_cached(handle, Feature::ExtendedScaler, |s| {
            s.extended_scaler.dwell_time
        })
    }

    pub async fn set_scaler_continuous_run(
        &self,
        handle: DeviceHandle,
        run: ContinuousRun,
    ) -> VmeResult<()> {
        self.set_extended(handle, ExtendedScalerSetting::ContinuousRun(run))
            .await
    }

    pub fn get_scaler_continuous_run(&self, handle: DeviceHandle) -> VmeResult<ContinuousRun> {
        self.read_cached(handle, Feature::ExtendedScaler, |s| {
            s.extended_scaler.continuous_run
        })
    }

    pub fn get_extended_scaler_conf(&self, handle: DeviceHandle) -> VmeResult<ExtendedScalerConfig> {
        self.read_cached(handle, Feature::ExtendedScaler, |s| s.extended_scaler)
    }

    pub async fn scaler_sw_start(&self, handle: DeviceHandle) -> VmeResult<()> {
        self.scaler_action(handle, Feature::ExtendedScaler, BridgeAction::ScalerSwStart)
            .await
    }

    pub async fn scaler_sw_stop(&self, handle: DeviceHandle) -> VmeResult<()> {
        self.scaler_action(handle, Feature::ExtendedScaler, BridgeAction::ScalerSwStop)
            .await
    }

    pub async fn scaler_sw_reset(&self, handle: DeviceHandle) -> VmeResult<()> {
        self.scaler_action(handle, Feature::ExtendedScaler, BridgeAction::ScalerSwReset)
            .await
    }

    pub async fn scaler_sw_open_gate(&self, handle: DeviceHandle) -> VmeResult<()> {
        self.scaler_action(handle, Feature::ExtendedScaler, BridgeAction::ScalerSwOpenGate)
            .await
    }

    pub async fn scaler_sw_close_gate(&self, handle: DeviceHandle) -> VmeResult<()> {
        self.scaler_action(handle, Feature::ExtendedScaler, BridgeAction::ScalerSwCloseGate)
            .await
    }
}
