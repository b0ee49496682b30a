//! Front-panel display: the signals of the last bus transaction

use serde::{Deserialize, Serialize};
use tracing::trace;
use vme_errors::VmeResult;
use vme_model::Feature;

use crate::bridge::VmeBridge;
use crate::session::DeviceHandle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySnapshot {
    pub address: u32,
    pub data: u32,
    pub am: u8,
    /// IRQ lines, one bit per level
    pub irq: u8,
    pub ds0: bool,
    pub ds1: bool,
    #[serde(rename = "as")]
    pub as_: bool,
    pub iack: bool,
    pub write: bool,
    pub lword: bool,
    pub dtack: bool,
    pub berr: bool,
    pub sysres: bool,
    pub br: bool,
    pub bg: bool,
}

impl VmeBridge {
    pub async fn read_display(&self, handle: DeviceHandle) -> VmeResult<DisplaySnapshot> {
        let session = self.session(handle)?;
        session.require(Feature::Display)?;
        let snapshot = session
            .link()
            .await
            .read_display()
            .await
            .map_err(|e| session.fail("read display", e))?;
        trace!("[{}] display {:?}", handle, snapshot);
        Ok(snapshot)
    }
}
