//! Pulser A/B configuration and software start/stop

use serde::{Deserialize, Serialize};
use tracing::debug;
use vme_errors::{VmeError, VmeResult};
use vme_model::{BridgeModel, Feature, IoSource, PulserSelect, TimeUnit};

use crate::bridge::VmeBridge;
use crate::session::DeviceHandle;
use crate::transport::{BridgeAction, BridgeSetting};

/// Pulser programming. `pulse_count` 0 means an endless train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulserConfig {
    /// Period in `unit` steps
    pub period: u8,
    /// High time in `unit` steps
    pub width: u8,
    pub unit: TimeUnit,
    pub pulse_count: u8,
    pub start: IoSource,
    pub reset: IoSource,
}

impl Default for PulserConfig {
    fn default() -> Self {
        Self {
            period: 0,
            width: 0,
            unit: TimeUnit::Unit25ns,
            pulse_count: 0,
            start: IoSource::ManualSw,
            reset: IoSource::ManualSw,
        }
    }
}

impl PulserConfig {
    /// Check sources and time base against the pulser and bridge model
    pub fn validate(&self, pulser: PulserSelect, bridge: BridgeModel) -> VmeResult<()> {
        if !matches!(
            self.start,
            IoSource::ManualSw | IoSource::InputSrc0 | IoSource::InputSrc1 | IoSource::Coincidence
        ) {
            return Err(VmeError::invalid_param(
                "start",
                format!("{:?} cannot start a pulser", self.start),
            ));
        }

        // Each pulser has one dedicated reset input
        let reset_input = match pulser {
            PulserSelect::A => IoSource::InputSrc0,
            PulserSelect::B => IoSource::InputSrc1,
        };
        if self.reset != IoSource::ManualSw && self.reset != reset_input {
            return Err(VmeError::invalid_param(
                "reset",
                format!("{:?} cannot reset pulser {:?}", self.reset, pulser),
            ));
        }

        if !self.unit.available_on(bridge) {
            return Err(VmeError::invalid_param(
                "unit",
                format!("{:?} not available on {}", self.unit, bridge.as_str()),
            ));
        }
        Ok(())
    }

    /// Period as wall time
    pub fn period_nanos(&self) -> u64 {
        u64::from(self.period) * self.unit.nanos()
    }
}

fn index(pulser: PulserSelect) -> usize {
    pulser.as_raw() as usize
}

impl VmeBridge {
    pub async fn set_pulser_conf(
        &self,
        handle: DeviceHandle,
        pulser: PulserSelect,
        config: PulserConfig,
    ) -> VmeResult<()> {
        let session = self.session(handle)?;
        session.require(Feature::Pulser)?;
        if let Some(bridge) = session.board().bridge() {
            config
                .validate(pulser, bridge)
                .map_err(|e| session.fail("set pulser", e))?;
        }
        self.push_setting(
            handle,
            Feature::Pulser,
            "set pulser",
            BridgeSetting::Pulser(pulser, config),
            |s| s.pulsers[index(pulser)] = config,
        )
        .await
    }

    pub fn get_pulser_conf(
        &self,
        handle: DeviceHandle,
        pulser: PulserSelect,
    ) -> VmeResult<PulserConfig> {
        self.read_cached(handle, Feature::Pulser, |s| s.pulsers[index(pulser)])
    }

    async fn pulser_action(
        &self,
        handle: DeviceHandle,
        pulser: PulserSelect,
        action: BridgeAction,
    ) -> VmeResult<()> {
        let session = self.session(handle)?;
        session.require(Feature::Pulser)?;
        let start = session.state().pulsers[index(pulser)].start;
        if start != IoSource::ManualSw {
            debug!(
                "[{}] pulser {:?} is started by {:?}; {:?} ignored",
                handle, pulser, start, action
            );
            return Ok(());
        }
        session
            .link()
            .await
            .trigger(action)
            .await
            .map_err(|e| session.fail("pulser", e))?;
        debug!("[{}] {:?}", handle, action);
        Ok(())
    }

    /// Software start; has no effect unless the start source is `ManualSw`
    pub async fn start_pulser(&self, handle: DeviceHandle, pulser: PulserSelect) -> VmeResult<()> {
        self.pulser_action(handle, pulser, BridgeAction::StartPulser(pulser))
            .await
    }

    /// Software stop; has no effect unless the start source is `ManualSw`
    pub async fn stop_pulser(&self, handle: DeviceHandle, pulser: PulserSelect) -> VmeResult<()> {
        self.pulser_action(handle, pulser, BridgeAction::StopPulser(pulser))
            .await
    }
}
