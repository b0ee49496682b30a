//! Transport Registry
//!
//! Maps each link family to the opener that can establish it. Adding a new
//! driver means implementing `LinkOpener` and registering it here.

use dashmap::DashMap;
use std::sync::Arc;
use vme_errors::{VmeError, VmeResult};
use vme_model::LinkKind;

use crate::link::LinkTarget;
use crate::transport::{BridgeTransport, LinkOpener};

/// Uses DashMap for concurrent lookups while sessions open
pub struct TransportRegistry {
    openers: DashMap<LinkKind, Arc<dyn LinkOpener>>,
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self {
            openers: DashMap::new(),
        }
    }

    /// Register an opener for every link family it declares.
    /// A later registration replaces an earlier one for the same family.
    pub fn register(&self, opener: Arc<dyn LinkOpener>) {
        for kind in opener.link_kinds() {
            self.openers.insert(*kind, opener.clone());
        }
    }

    pub async fn open(&self, target: &LinkTarget) -> VmeResult<Box<dyn BridgeTransport>> {
        let kind = target.link_kind();
        // Clone out so the map guard is not held across the await
        let opener = self
            .openers
            .get(&kind)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                VmeError::communication(format!("no transport registered for {} links", kind))
            })?;

        opener.open(target).await
    }

    pub fn is_registered(&self, kind: LinkKind) -> bool {
        self.openers.contains_key(&kind)
    }

    pub fn registered_links(&self) -> Vec<LinkKind> {
        self.openers.iter().map(|r| *r.key()).collect()
    }
}
