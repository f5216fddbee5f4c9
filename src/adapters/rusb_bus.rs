//! USB bus adapter over rusb
//!
//! Supplies device enumeration for the poll path and, where libusb supports
//! it, hotplug callbacks for the event path. Hotplug callbacks only fire
//! while `handle_events` is pumped, so registration spawns a dedicated event
//! thread that runs until shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use rusb::{Context, Device, Hotplug, HotplugBuilder, Registration, UsbContext};
use tracing::{debug, warn};

use crate::error::MonitorError;
use crate::model::TokenId;
use crate::ports::{UsbBus, UsbHotplugSink};

const EVENT_PUMP_TICK: Duration = Duration::from_millis(100);

pub struct RusbBus {
    context: Context,
    registration: Mutex<Option<Registration<Context>>>,
    event_thread: Mutex<Option<thread::JoinHandle<()>>>,
    stop: Arc<AtomicBool>,
}

impl RusbBus {
    pub fn new() -> Result<Self, MonitorError> {
        let context = Context::new().map_err(|e| MonitorError::Usb(e.to_string()))?;
        Ok(Self {
            context,
            registration: Mutex::new(None),
            event_thread: Mutex::new(None),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }
}

struct ForwardHotplug {
    sink: Arc<dyn UsbHotplugSink>,
}

impl Hotplug<Context> for ForwardHotplug {
    fn device_arrived(&mut self, device: Device<Context>) {
        if let Some(id) = token_id_of(&device) {
            debug!(%id, "USB device arrived");
            self.sink.device_attached(id);
        }
    }

    fn device_left(&mut self, device: Device<Context>) {
        if let Some(id) = token_id_of(&device) {
            debug!(%id, "USB device left");
            self.sink.device_detached(id);
        }
    }
}

fn token_id_of(device: &Device<Context>) -> Option<TokenId> {
    match device.device_descriptor() {
        Ok(descriptor) => Some(TokenId::new(descriptor.vendor_id(), descriptor.product_id())),
        Err(e) => {
            debug!("unreadable device descriptor: {e}");
            None
        }
    }
}

impl UsbBus for RusbBus {
    fn enumerate(&self) -> Result<Vec<TokenId>, MonitorError> {
        let devices = self
            .context
            .devices()
            .map_err(|e| MonitorError::Usb(e.to_string()))?;
        Ok(devices
            .iter()
            .filter_map(|device| token_id_of(&device))
            .collect())
    }

    fn supports_hotplug(&self) -> bool {
        rusb::has_hotplug()
    }

    fn register_hotplug(&self, sink: Arc<dyn UsbHotplugSink>) -> Result<(), MonitorError> {
        if !rusb::has_hotplug() {
            return Ok(());
        }

        let registration = HotplugBuilder::new()
            .enumerate(true)
            .register(&self.context, Box::new(ForwardHotplug { sink }))
            .map_err(|e| MonitorError::Usb(e.to_string()))?;
        *self.registration.lock() = Some(registration);

        let context = self.context.clone();
        let stop = Arc::clone(&self.stop);
        let handle = thread::Builder::new()
            .name("usb-events".to_string())
            .spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    if let Err(e) = context.handle_events(Some(EVENT_PUMP_TICK)) {
                        warn!("USB event pump error: {e}");
                        break;
                    }
                }
            })
            .map_err(|e| MonitorError::Usb(e.to_string()))?;
        *self.event_thread.lock() = Some(handle);
        Ok(())
    }

    fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
        // Dropping the registration unhooks the callback before the pump
        // thread exits.
        self.registration.lock().take();
        if let Some(handle) = self.event_thread.lock().take() {
            if handle.join().is_err() {
                warn!("USB event thread panicked during shutdown");
            }
        }
    }
}
