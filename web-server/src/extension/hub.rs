// web-server/src/extension/hub.rs
use std::sync::Arc;

use common::handoff::WindowBus;
use dashmap::DashMap;

/// One window bus per signed-in user, shared by that user's dashboard
/// requests and connected extension sessions.
pub struct ExtensionHub {
    origin: String,
    buses: DashMap<String, Arc<WindowBus>>,
}

impl ExtensionHub {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            buses: DashMap::new(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The bus for `user_id`, created on first use
    pub fn bus_for(&self, user_id: &str) -> Arc<WindowBus> {
        self.buses
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(WindowBus::new(self.origin.clone())))
            .clone()
    }

    pub fn bus_count(&self) -> usize {
        self.buses.len()
    }

    /// Drop buses nobody holds or listens on. Returns how many went away.
    pub fn prune(&self) -> usize {
        let before = self.buses.len();
        self.buses
            .retain(|_, bus| Arc::strong_count(bus) > 1 || bus.listener_count() > 0);
        let removed = before.saturating_sub(self.buses.len());
        if removed > 0 {
            tracing::debug!("Pruned {} idle extension buses", removed);
        }
        removed
    }
}
