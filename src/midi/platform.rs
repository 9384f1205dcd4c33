//! Device-discovery capability
//!
//! `MidiPlatform` grants (or refuses) access; the returned `MidiAccess`
//! enumerates devices, delivers input messages and reports hot-plug changes.
//! `VirtualPlatform` is an in-process implementation for on-screen keyboards
//! and tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Input,
    Output,
    InputOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    Connected,
    Disconnected,
}

/// One device as the platform reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MidiDevice {
    /// Stable for as long as the device stays plugged in
    pub id: String,
    pub name: String,
    pub manufacturer: String,
    pub connection_kind: ConnectionKind,
    pub state: DeviceState,
}

impl MidiDevice {
    /// A connected input with unknown manufacturer
    pub fn input(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            manufacturer: "Unknown".to_string(),
            connection_kind: ConnectionKind::Input,
            state: DeviceState::Connected,
        }
    }

    pub fn output(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            connection_kind: ConnectionKind::Output,
            ..Self::input(id, name)
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == DeviceState::Connected
    }

    pub fn is_input(&self) -> bool {
        matches!(
            self.connection_kind,
            ConnectionKind::Input | ConnectionKind::InputOutput
        )
    }
}

/// Receives raw bytes of one message from a subscribed input
pub type MessageHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Called after any device is added, removed or changes state
pub type StateChangeHandler = Arc<dyn Fn() + Send + Sync>;

#[async_trait]
pub trait MidiPlatform: Send + Sync {
    /// Ask for device access. Fails with `UnsupportedCapability` or `AccessDenied`.
    async fn request_access(&self) -> Result<Arc<dyn MidiAccess>>;
}

/// A granted handle on the platform's devices
pub trait MidiAccess: Send + Sync {
    fn inputs(&self) -> Vec<MidiDevice>;
    fn outputs(&self) -> Vec<MidiDevice>;
    /// Replace any handler already attached to `device_id`
    fn subscribe(&self, device_id: &str, handler: MessageHandler) -> Result<()>;
    fn unsubscribe(&self, device_id: &str);
    fn on_state_change(&self, handler: StateChangeHandler);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    Allow,
    Deny,
    Unsupported,
}

/// In-process device set with injectable messages
pub struct VirtualPlatform {
    access: Arc<VirtualAccess>,
    grant: Mutex<Grant>,
    requests: AtomicUsize,
}

#[derive(Default)]
pub struct VirtualAccess {
    inputs: Mutex<Vec<MidiDevice>>,
    outputs: Mutex<Vec<MidiDevice>>,
    handlers: Mutex<HashMap<String, MessageHandler>>,
    state_handlers: Mutex<Vec<StateChangeHandler>>,
}

impl Default for VirtualPlatform {
    fn default() -> Self {
        Self {
            access: Arc::new(VirtualAccess::default()),
            grant: Mutex::new(Grant::Allow),
            requests: AtomicUsize::new(0),
        }
    }
}

impl VirtualPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A platform without MIDI support
    pub fn unsupported() -> Arc<Self> {
        let platform = Self::default();
        *platform.grant.lock() = Grant::Unsupported;
        Arc::new(platform)
    }

    /// Refuse later access requests
    pub fn deny_access(&self) {
        *self.grant.lock() = Grant::Deny;
    }

    pub fn allow_access(&self) {
        *self.grant.lock() = Grant::Allow;
    }

    /// How many times access was requested
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn access(&self) -> &Arc<VirtualAccess> {
        &self.access
    }
}

#[async_trait]
impl MidiPlatform for VirtualPlatform {
    async fn request_access(&self) -> Result<Arc<dyn MidiAccess>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let grant = *self.grant.lock();
        match grant {
            Grant::Allow => Ok(self.access.clone()),
            Grant::Deny => Err(Error::AccessDenied("MIDI access was declined".to_string())),
            Grant::Unsupported => Err(Error::UnsupportedCapability(
                "MIDI is not available on this platform".to_string(),
            )),
        }
    }
}

impl VirtualAccess {
    pub fn add_input(&self, id: &str, name: &str) {
        self.inputs.lock().push(MidiDevice::input(id, name));
        self.state_changed();
    }

    pub fn add_output(&self, id: &str, name: &str) {
        self.outputs.lock().push(MidiDevice::output(id, name));
        self.state_changed();
    }

    pub fn remove_device(&self, id: &str) {
        self.inputs.lock().retain(|d| d.id != id);
        self.outputs.lock().retain(|d| d.id != id);
        self.handlers.lock().remove(id);
        self.state_changed();
    }

    pub fn set_state(&self, id: &str, state: DeviceState) {
        for device in self
            .inputs
            .lock()
            .iter_mut()
            .chain(self.outputs.lock().iter_mut())
        {
            if device.id == id {
                device.state = state;
            }
        }
        self.state_changed();
    }

    /// Deliver `bytes` as if the device sent them. Returns false when nothing listens.
    pub fn send(&self, device_id: &str, bytes: &[u8]) -> bool {
        let handler = self.handlers.lock().get(device_id).cloned();
        match handler {
            Some(handler) => {
                handler(bytes);
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self, device_id: &str) -> bool {
        self.handlers.lock().contains_key(device_id)
    }

    fn state_changed(&self) {
        // Handlers may call back into inputs()/subscribe(), so no lock is held here
        let handlers = self.state_handlers.lock().clone();
        for handler in handlers {
            handler();
        }
    }
}

impl MidiAccess for VirtualAccess {
    fn inputs(&self) -> Vec<MidiDevice> {
        self.inputs.lock().clone()
    }

    fn outputs(&self) -> Vec<MidiDevice> {
        self.outputs.lock().clone()
    }

    fn subscribe(&self, device_id: &str, handler: MessageHandler) -> Result<()> {
        let known = self
            .inputs
            .lock()
            .iter()
            .any(|d| d.id == device_id && d.is_connected());
        if !known {
            return Err(Error::MidiDevice(format!("No input device '{}'", device_id)));
        }
        self.handlers.lock().insert(device_id.to_string(), handler);
        Ok(())
    }

    fn unsubscribe(&self, device_id: &str) {
        self.handlers.lock().remove(device_id);
    }

    fn on_state_change(&self, handler: StateChangeHandler) {
        self.state_handlers.lock().push(handler);
    }
}
