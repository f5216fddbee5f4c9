//! USB bus traits for device presence monitoring

use std::sync::Arc;

use crate::error::MonitorError;
use crate::model::TokenId;

/// Observer notified of raw USB attach/detach events.
///
/// Implementations must tolerate duplicate notifications; the underlying
/// bus may report the same device through both the event and the poll path.
pub trait UsbHotplugSink: Send + Sync {
    fn device_attached(&self, id: TokenId);
    fn device_detached(&self, id: TokenId);
}

/// Capability to observe USB devices on the host.
pub trait UsbBus: Send + Sync {
    /// Vendor/product pairs of all devices currently attached.
    fn enumerate(&self) -> Result<Vec<TokenId>, MonitorError>;

    /// Whether the platform delivers hotplug events. When false, only the
    /// poll path detects changes.
    fn supports_hotplug(&self) -> bool {
        false
    }

    /// Register a sink for hotplug events. A no-op on platforms without
    /// hotplug support.
    fn register_hotplug(&self, _sink: Arc<dyn UsbHotplugSink>) -> Result<(), MonitorError> {
        Ok(())
    }

    /// Release event-handling resources. Idempotent.
    fn shutdown(&self) {}
}
