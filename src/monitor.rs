//! USB device presence monitor
//!
//! Watches the bus for allow-listed vendor/product pairs through two paths:
//! platform hotplug events where available, and a periodic poll everywhere.
//! Both paths funnel into one reconcile step over a single presence set, so
//! a device reported by an event is not reported again by the next poll.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::error::MonitorError;
use crate::events::{AuthEvent, EventSink};
use crate::model::TokenId;
use crate::ports::{UsbBus, UsbHotplugSink};

pub struct DeviceMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    allowed: HashSet<TokenId>,
    poll_interval: Duration,
    bus: Arc<dyn UsbBus>,
    subscribers: Mutex<Vec<Arc<dyn EventSink>>>,
    present: Mutex<HashSet<TokenId>>,
    // Serializes presence updates from the poll and the event path. The poll
    // must hold it across enumeration and diff, otherwise an event landing
    // mid-poll is reverted by the stale enumeration result.
    reconcile: Mutex<()>,
    stop: AtomicBool,
    poll_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl DeviceMonitor {
    pub fn new(bus: Arc<dyn UsbBus>, config: &AuthConfig) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                allowed: config.allowed_tokens.iter().copied().collect(),
                poll_interval: config.poll_interval,
                bus,
                subscribers: Mutex::new(Vec::new()),
                present: Mutex::new(HashSet::new()),
                reconcile: Mutex::new(()),
                stop: AtomicBool::new(false),
                poll_thread: Mutex::new(None),
            }),
        }
    }

    /// Register an observer for connect/disconnect events.
    pub fn subscribe(&self, sink: Arc<dyn EventSink>) {
        self.inner.subscribers.lock().push(sink);
    }

    /// Start watching. Reports devices already attached, hooks up hotplug
    /// events where the platform supports them and spawns the poll thread.
    pub fn start(&self) -> Result<(), MonitorError> {
        self.inner.poll_tick();

        if self.inner.bus.supports_hotplug() {
            let sink = Arc::clone(&self.inner) as Arc<dyn UsbHotplugSink>;
            self.inner.bus.register_hotplug(sink)?;
            debug!("hotplug events registered");
        } else {
            debug!("hotplug unsupported, relying on polling only");
        }

        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name("token-monitor".to_string())
            .spawn(move || {
                while !inner.stop.load(Ordering::SeqCst) {
                    thread::sleep(inner.poll_interval);
                    if inner.stop.load(Ordering::SeqCst) {
                        break;
                    }
                    inner.poll_tick();
                }
            })
            .map_err(|e| MonitorError::Usb(e.to_string()))?;
        *self.inner.poll_thread.lock() = Some(handle);
        Ok(())
    }

    /// Allow-listed devices currently attached.
    pub fn connected_tokens(&self) -> Vec<TokenId> {
        self.inner.present.lock().iter().copied().collect()
    }

    pub fn is_connected(&self, id: TokenId) -> bool {
        self.inner.present.lock().contains(&id)
    }

    /// Whether any allow-listed token is currently attached.
    pub fn has_any_allowed_token(&self) -> bool {
        !self.inner.present.lock().is_empty()
    }

    /// Stop the poll thread and release bus resources. Idempotent.
    pub fn shutdown(&self) {
        self.inner.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.inner.poll_thread.lock().take() {
            if handle.join().is_err() {
                warn!("monitor poll thread panicked during shutdown");
            }
        }
        self.inner.bus.shutdown();
    }
}

impl Drop for DeviceMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl MonitorInner {
    /// Reconcile the presence set against a full bus enumeration.
    fn poll_tick(&self) {
        let _reconcile = self.reconcile.lock();
        let seen = match self.bus.enumerate() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("USB enumeration failed: {e}");
                return;
            }
        };
        let current: HashSet<TokenId> = seen
            .into_iter()
            .filter(|id| self.allowed.contains(id))
            .collect();

        let (added, removed) = {
            let mut present = self.present.lock();
            let added: Vec<TokenId> = current.difference(&present).copied().collect();
            let removed: Vec<TokenId> = present.difference(&current).copied().collect();
            *present = current;
            (added, removed)
        };

        for id in added {
            info!(%id, "token connected");
            self.notify(&AuthEvent::connected(id));
        }
        for id in removed {
            info!(%id, "token disconnected");
            self.notify(&AuthEvent::disconnected(id));
        }
    }

    fn notify(&self, event: &AuthEvent) {
        for sink in self.subscribers.lock().iter() {
            sink.on_event(event);
        }
    }
}

impl UsbHotplugSink for MonitorInner {
    fn device_attached(&self, id: TokenId) {
        if !self.allowed.contains(&id) {
            return;
        }
        // Waits out any poll in flight so its stale diff lands first.
        let _reconcile = self.reconcile.lock();
        let newly_added = self.present.lock().insert(id);
        if newly_added {
            info!(%id, "token connected");
            self.notify(&AuthEvent::connected(id));
        }
    }

    fn device_detached(&self, id: TokenId) {
        if !self.allowed.contains(&id) {
            return;
        }
        let _reconcile = self.reconcile.lock();
        let was_present = self.present.lock().remove(&id);
        if was_present {
            info!(%id, "token disconnected");
            self.notify(&AuthEvent::disconnected(id));
        }
    }
}
