//! Scripted USB bus for testing the device monitor. Only available in test
//! scope.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::MonitorError;
use crate::model::TokenId;
use crate::ports::{UsbBus, UsbHotplugSink};

/// A bus whose attached-device set is driven by the test.
///
/// With hotplug enabled, `attach`/`detach` also fire the registered sink,
/// mirroring a platform event arriving before the next poll.
pub struct ScriptedBus {
    devices: Mutex<Vec<TokenId>>,
    sink: Mutex<Option<Arc<dyn UsbHotplugSink>>>,
    hotplug: bool,
}

impl ScriptedBus {
    pub fn new(initial: Vec<TokenId>) -> Self {
        Self {
            devices: Mutex::new(initial),
            sink: Mutex::new(None),
            hotplug: false,
        }
    }

    pub fn with_hotplug(initial: Vec<TokenId>) -> Self {
        Self {
            hotplug: true,
            ..Self::new(initial)
        }
    }

    pub fn attach(&self, id: TokenId) {
        self.devices.lock().push(id);
        if self.hotplug {
            if let Some(sink) = self.sink.lock().clone() {
                sink.device_attached(id);
            }
        }
    }

    pub fn detach(&self, id: TokenId) {
        self.devices.lock().retain(|d| *d != id);
        if self.hotplug {
            if let Some(sink) = self.sink.lock().clone() {
                sink.device_detached(id);
            }
        }
    }

    /// Change the attached set without firing events, as seen by the poll
    /// path only.
    pub fn set_devices(&self, devices: Vec<TokenId>) {
        *self.devices.lock() = devices;
    }
}

impl UsbBus for ScriptedBus {
    fn enumerate(&self) -> Result<Vec<TokenId>, MonitorError> {
        Ok(self.devices.lock().clone())
    }

    fn supports_hotplug(&self) -> bool {
        self.hotplug
    }

    fn register_hotplug(&self, sink: Arc<dyn UsbHotplugSink>) -> Result<(), MonitorError> {
        *self.sink.lock() = Some(sink);
        Ok(())
    }
}
