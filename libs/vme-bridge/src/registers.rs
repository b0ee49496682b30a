//! Raw register access, release strings and flash pages
//!
//! Register and flash access work on every open handle, including `*Local`
//! board types that cannot reach the VME bus.

use tracing::{debug, info, trace, warn};
use vme_common::hex;
use vme_errors::{VmeError, VmeResult};
use vme_model::LIBRARY_RELEASE;

use crate::bridge::VmeBridge;
use crate::session::{DeviceHandle, Session};
use crate::transport::FlashGeometry;

/// Bytes of flash payload shown in logs
const FLASH_LOG_PREVIEW: usize = 16;

/// Release strings arrive NUL padded from the firmware
fn trim_release(raw: String) -> String {
    match raw.find('\0') {
        Some(end) => raw[..end].to_string(),
        None => raw,
    }
}

fn check_page(geometry: FlashGeometry, page: u32) -> VmeResult<()> {
    if page >= geometry.page_count {
        return Err(VmeError::invalid_param(
            "page",
            format!("{} outside 0..{}", page, geometry.page_count),
        ));
    }
    Ok(())
}

impl VmeBridge {
    /// Read an internal bridge register. Accepts [`vme_model::Register`] or
    /// any raw offset.
    pub async fn read_register(&self, handle: DeviceHandle, register: impl Into<u32>) -> VmeResult<u32> {
        let register = register.into();
        let session = self.session(handle)?;
        let value = session
            .link()
            .await
            .read_register(register)
            .await
            .map_err(|e| session.fail("read register", e))?;
        trace!("[{}] register {:#04x} -> {:#010x}", handle, register, value);
        Ok(value)
    }

    pub async fn write_register(
        &self,
        handle: DeviceHandle,
        register: impl Into<u32>,
        value: u32,
    ) -> VmeResult<()> {
        let register = register.into();
        let session = self.session(handle)?;
        session
            .link()
            .await
            .write_register(register, value)
            .await
            .map_err(|e| session.fail("write register", e))?;
        trace!("[{}] register {:#04x} <- {:#010x}", handle, register, value);
        Ok(())
    }

    // ========================================================================
    // Releases
    // ========================================================================

    /// Release of this library
    pub fn software_release(&self) -> &'static str {
        LIBRARY_RELEASE
    }

    pub async fn board_fw_release(&self, handle: DeviceHandle) -> VmeResult<String> {
        let session = self.session(handle)?;
        let raw = session
            .link()
            .await
            .firmware_release()
            .await
            .map_err(|e| session.fail("firmware release", e))?;
        Ok(trim_release(raw))
    }

    pub async fn driver_release(&self, handle: DeviceHandle) -> VmeResult<String> {
        let session = self.session(handle)?;
        let raw = session
            .link()
            .await
            .driver_release()
            .await
            .map_err(|e| session.fail("driver release", e))?;
        Ok(trim_release(raw))
    }

    // ========================================================================
    // Flash
    // ========================================================================

    pub async fn flash_geometry(&self, handle: DeviceHandle) -> VmeResult<FlashGeometry> {
        let session = self.session(handle)?;
        let geometry = session.link().await.flash_geometry();
        Ok(geometry)
    }

    fn check_flash_write(&self, session: &Session, op: &str) -> VmeResult<()> {
        if !self.config().flash_write_enabled {
            return Err(session.fail(
                op,
                VmeError::not_supported(session.board(), "flash write (disabled by configuration)"),
            ));
        }
        Ok(())
    }

    pub async fn read_flash_page(&self, handle: DeviceHandle, page: u32) -> VmeResult<Vec<u8>> {
        let session = self.session(handle)?;
        let mut link = session.link().await;
        check_page(link.flash_geometry(), page).map_err(|e| session.fail("flash read", e))?;
        let data = link
            .read_flash_page(page)
            .await
            .map_err(|e| session.fail("flash read", e))?;
        debug!(
            "[{}] flash page {} read: {}",
            handle,
            page,
            hex::preview(&data, FLASH_LOG_PREVIEW)
        );
        Ok(data)
    }

    /// Program one flash page. `data` must be exactly one page long.
    pub async fn write_flash_page(
        &self,
        handle: DeviceHandle,
        page: u32,
        data: &[u8],
    ) -> VmeResult<()> {
        let session = self.session(handle)?;
        self.check_flash_write(&session, "flash write")?;
        let mut link = session.link().await;
        let geometry = link.flash_geometry();
        check_page(geometry, page).map_err(|e| session.fail("flash write", e))?;
        if data.len() != geometry.page_size {
            return Err(session.fail(
                "flash write",
                VmeError::invalid_param(
                    "data",
                    format!("{} bytes, page is {}", data.len(), geometry.page_size),
                ),
            ));
        }

        warn!(
            "[{}] writing flash page {}: {}",
            handle,
            page,
            hex::preview(data, FLASH_LOG_PREVIEW)
        );
        link.write_flash_page(page, data)
            .await
            .map_err(|e| session.fail("flash write", e))
    }

    /// Erase one flash page. Irreversible.
    pub async fn erase_flash_page(&self, handle: DeviceHandle, page: u32) -> VmeResult<()> {
        let session = self.session(handle)?;
        self.check_flash_write(&session, "flash erase")?;
        let mut link = session.link().await;
        check_page(link.flash_geometry(), page).map_err(|e| session.fail("flash erase", e))?;

        warn!("[{}] erasing flash page {}", handle, page);
        link.erase_flash_page(page)
            .await
            .map_err(|e| session.fail("flash erase", e))?;
        info!("[{}] flash page {} erased", handle, page);
        Ok(())
    }
}
