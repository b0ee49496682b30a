//! Session manager: open, close and reset of bridge links

use std::sync::Arc;

use tracing::{debug, info, warn};
use vme_errors::VmeResult;
use vme_model::{BoardType, Feature};

use crate::config::BridgeConfig;
use crate::link::{LinkArg, LinkTarget};
use crate::registry::TransportRegistry;
use crate::session::{DeviceHandle, Session, SessionTable, MAX_SESSIONS};
use crate::transport::BridgeAction;

/// Entry point of the core. Every operation takes the handle returned by
/// [`VmeBridge::open`].
pub struct VmeBridge {
    config: BridgeConfig,
    registry: Arc<TransportRegistry>,
    sessions: SessionTable,
}

impl VmeBridge {
    pub fn new(config: BridgeConfig, registry: Arc<TransportRegistry>) -> Self {
        if config.max_sessions > MAX_SESSIONS {
            warn!(
                "max_sessions {} exceeds handle range, capping at {}",
                config.max_sessions, MAX_SESSIONS
            );
        }
        let sessions = SessionTable::new(config.max_sessions);
        Self {
            config,
            registry,
            sessions,
        }
    }

    pub fn with_registry(registry: Arc<TransportRegistry>) -> Self {
        Self::new(BridgeConfig::default(), registry)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TransportRegistry> {
        &self.registry
    }

    // ========================================================================
    // Session lookup
    // ========================================================================

    /// Session for a regular operation: handle must be open and idle
    pub(crate) fn session(&self, handle: DeviceHandle) -> VmeResult<Arc<Session>> {
        let session = self.sessions.get(handle)?;
        session.ensure_idle()?;
        Ok(session)
    }

    /// Session lookup that tolerates a pending asynchronous transfer
    pub(crate) fn session_any(&self, handle: DeviceHandle) -> VmeResult<Arc<Session>> {
        self.sessions.get(handle)
    }

    // ========================================================================
    // Open / close
    // ========================================================================

    /// Open a logical link to one bridge
    ///
    /// `arg` must match the board's link type: a USB or optical link number,
    /// an adapter PID, or a hostname/IPv4 string. `conet_node` selects the
    /// board in an optical daisy chain and is ignored on direct links.
    pub async fn open(
        &self,
        board: BoardType,
        arg: LinkArg,
        conet_node: u16,
    ) -> VmeResult<DeviceHandle> {
        let target = LinkTarget::new(board, arg, conet_node)?;
        let key = target.key();
        let handle = self.sessions.reserve(&key)?;

        match self.registry.open(&target).await {
            Ok(transport) => {
                info!(
                    "[{}] opened {} via {}",
                    handle,
                    target,
                    transport.name()
                );
                let session = Arc::new(Session::new(handle, target, transport));
                self.sessions.activate(handle, session);
                Ok(handle)
            },
            Err(e) => {
                self.sessions.abandon(handle);
                warn!("Open {} failed: {}", target, e);
                Err(e)
            },
        }
    }

    /// Release the handle. Closing an unknown or already closed handle is a
    /// CommError. An outstanding asynchronous transfer is aborted.
    pub async fn close(&self, handle: DeviceHandle) -> VmeResult<()> {
        let session = self.sessions.release(handle)?;

        if let Some(pending) = session.pending().lock().await.take() {
            warn!(
                "[{}] aborting asynchronous transfer of {} bytes on close",
                handle, pending.size
            );
            pending.task.abort();
            session.set_pending(false);
        }

        let result = session.link().await.close().await;
        match &result {
            Ok(()) => info!("[{}] closed {}", handle, session.target()),
            Err(e) => warn!("[{}] close of {} reported: {}", handle, session.target(), e),
        }
        result
    }

    /// Hard reset of the host controller
    pub async fn reset(&self, handle: DeviceHandle) -> VmeResult<()> {
        let session = self.session(handle)?;
        session.require(Feature::DeviceReset)?;
        info!("[{}] device reset", handle);
        let mut link = session.link().await;
        link.device_reset()
            .await
            .map_err(|e| session.fail("device reset", e))
    }

    /// Assert SYSRES on the VME bus
    pub async fn system_reset(&self, handle: DeviceHandle) -> VmeResult<()> {
        let session = self.session(handle)?;
        session.require(Feature::SystemReset)?;
        info!("[{}] VME system reset", handle);
        let mut link = session.link().await;
        link.trigger(BridgeAction::SystemReset)
            .await
            .map_err(|e| session.fail("system reset", e))
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn board_type(&self, handle: DeviceHandle) -> VmeResult<BoardType> {
        Ok(self.session_any(handle)?.board())
    }

    pub fn link_target(&self, handle: DeviceHandle) -> VmeResult<LinkTarget> {
        Ok(self.session_any(handle)?.target().clone())
    }

    pub fn open_handles(&self) -> Vec<DeviceHandle> {
        self.sessions.open_handles()
    }

    pub fn capacity(&self) -> usize {
        self.sessions.capacity()
    }

    pub fn is_supported(&self, handle: DeviceHandle, feature: Feature) -> VmeResult<bool> {
        let board = self.board_type(handle)?;
        debug!("[{}] {} supports {}: {}", handle, board, feature, board.supports(feature));
        Ok(board.supports(feature))
    }
}

impl std::fmt::Debug for VmeBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VmeBridge")
            .field("capacity", &self.sessions.capacity())
            .field("open", &self.sessions.open_handles().len())
            .finish()
    }
}
