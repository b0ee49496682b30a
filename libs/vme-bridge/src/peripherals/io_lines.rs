//! Front-panel inputs, outputs and the output register

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use vme_errors::{VmeError, VmeResult};
use vme_model::registers::output;
use vme_model::{
    BridgeModel, Feature, InputSelect, IoPolarity, IoSource, LedPolarity, OutputSelect, Register,
};

use crate::bridge::VmeBridge;
use crate::session::DeviceHandle;
use crate::transport::BridgeSetting;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    pub polarity: IoPolarity,
    pub led_polarity: LedPolarity,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            polarity: IoPolarity::Direct,
            led_polarity: LedPolarity::ActiveHigh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub polarity: IoPolarity,
    pub led_polarity: LedPolarity,
    pub source: IoSource,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            polarity: IoPolarity::Direct,
            led_polarity: LedPolarity::ActiveHigh,
            source: IoSource::ManualSw,
        }
    }
}

impl OutputConfig {
    pub fn validate(&self, bridge: Option<BridgeModel>) -> VmeResult<()> {
        if self.source.is_v3718_only() && bridge != Some(BridgeModel::V3718) {
            return Err(VmeError::invalid_param(
                "source",
                format!("{:?} is only wired on the V3718", self.source),
            ));
        }
        Ok(())
    }
}

fn check_output_mask(mask: u32) -> VmeResult<()> {
    if mask & !output::VALID_MASK != 0 {
        return Err(VmeError::invalid_param(
            "output_mask",
            format!("{:#x} has bits outside {:#x}", mask, output::VALID_MASK),
        ));
    }
    Ok(())
}

impl VmeBridge {
    pub async fn set_input_conf(
        &self,
        handle: DeviceHandle,
        input: InputSelect,
        config: InputConfig,
    ) -> VmeResult<()> {
        self.push_setting(
            handle,
            Feature::IoLines,
            "set input",
            BridgeSetting::Input(input, config),
            |s| s.inputs[input.as_raw() as usize] = config,
        )
        .await
    }

    pub fn get_input_conf(&self, handle: DeviceHandle, input: InputSelect) -> VmeResult<InputConfig> {
        self.read_cached(handle, Feature::IoLines, |s| {
            s.inputs[input.as_raw() as usize]
        })
    }

    pub async fn set_output_conf(
        &self,
        handle: DeviceHandle,
        output: OutputSelect,
        config: OutputConfig,
    ) -> VmeResult<()> {
        let session = self.session(handle)?;
        session.require(Feature::IoLines)?;
        config
            .validate(session.board().bridge())
            .map_err(|e| session.fail("set output", e))?;
        self.push_setting(
            handle,
            Feature::IoLines,
            "set output",
            BridgeSetting::Output(output, config),
            |s| s.outputs[output.as_raw() as usize] = config,
        )
        .await
    }

    pub fn get_output_conf(
        &self,
        handle: DeviceHandle,
        output: OutputSelect,
    ) -> VmeResult<OutputConfig> {
        self.read_cached(handle, Feature::IoLines, |s| {
            s.outputs[output.as_raw() as usize]
        })
    }

    async fn write_output_register(
        &self,
        handle: DeviceHandle,
        register: Register,
        mask: u32,
    ) -> VmeResult<()> {
        let session = self.session(handle)?;
        session.require(Feature::IoLines)?;
        check_output_mask(mask).map_err(|e| session.fail("output register", e))?;
        session
            .link()
            .await
            .write_register(register.as_raw(), mask)
            .await
            .map_err(|e| session.fail("output register", e))?;
        debug!("[{}] {:?} {:#06x}", handle, register, mask);
        Ok(())
    }

    /// Drive the lines of `mask` high
    pub async fn set_output_register(&self, handle: DeviceHandle, mask: u32) -> VmeResult<()> {
        self.write_output_register(handle, Register::OutRegSet, mask)
            .await
    }

    /// Drive the lines of `mask` low
    pub async fn clear_output_register(&self, handle: DeviceHandle, mask: u32) -> VmeResult<()> {
        self.write_output_register(handle, Register::OutRegClear, mask)
            .await
    }

    /// Set then clear the lines of `mask`
    pub async fn pulse_output_register(&self, handle: DeviceHandle, mask: u32) -> VmeResult<()> {
        let session = self.session(handle)?;
        session.require(Feature::IoLines)?;
        check_output_mask(mask).map_err(|e| session.fail("output pulse", e))?;

        // Both writes under one lock so nothing interleaves
        let mut link = session.link().await;
        link.write_register(Register::OutRegSet.as_raw(), mask)
            .await
            .map_err(|e| session.fail("output pulse", e))?;
        link.write_register(Register::OutRegClear.as_raw(), mask)
            .await
            .map_err(|e| session.fail("output pulse", e))?;
        debug!("[{}] output pulse {:#06x}", handle, mask);
        Ok(())
    }

    /// Raw state of the front-panel inputs
    pub async fn read_input_register(&self, handle: DeviceHandle) -> VmeResult<u32> {
        let session = self.session(handle)?;
        session.require(Feature::IoLines)?;
        let value = session
            .link()
            .await
            .read_register(Register::Input.as_raw())
            .await
            .map_err(|e| session.fail("input register", e))?;
        trace!("[{}] input register {:#06x}", handle, value);
        Ok(value)
    }
}
