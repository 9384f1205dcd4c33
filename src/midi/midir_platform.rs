//! Hardware MIDI through midir
//!
//! midir has no hot-plug events, so a watcher thread polls the port list and
//! fires the state-change handlers when it differs from the last poll.

use async_trait::async_trait;
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::platform::{MessageHandler, MidiAccess, MidiDevice, MidiPlatform, StateChangeHandler};
use crate::error::{Error, Result};

const CLIENT_NAME: &str = "studio-engine";

pub struct MidirPlatform {
    poll_interval: Duration,
}

impl MidirPlatform {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

#[async_trait]
impl MidiPlatform for MidirPlatform {
    async fn request_access(&self) -> Result<Arc<dyn MidiAccess>> {
        // Desktop MIDI has no permission prompt; a client that cannot be created means no MIDI
        MidiInput::new(CLIENT_NAME)?;
        log::info!("MIDI access granted (midir)");
        Ok(Arc::new(MidirAccess::new(self.poll_interval)))
    }
}

struct Watcher {
    should_stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

pub struct MidirAccess {
    poll_interval: Duration,
    /// Open connections, kept alive until unsubscribed
    connections: Mutex<HashMap<String, MidiInputConnection<()>>>,
    state_handlers: Arc<Mutex<Vec<StateChangeHandler>>>,
    watcher: Mutex<Option<Watcher>>,
}

impl MidirAccess {
    fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            connections: Mutex::new(HashMap::new()),
            state_handlers: Arc::new(Mutex::new(Vec::new())),
            watcher: Mutex::new(None),
        }
    }

    fn start_watcher(&self) {
        let mut watcher = self.watcher.lock();
        if watcher.is_some() {
            return;
        }

        let should_stop = Arc::new(AtomicBool::new(false));
        let stop = should_stop.clone();
        let handlers = self.state_handlers.clone();
        let poll_interval = self.poll_interval;

        let handle = thread::spawn(move || {
            let mut last = port_snapshot();
            while !stop.load(Ordering::SeqCst) {
                thread::sleep(poll_interval);
                let current = port_snapshot();
                if current != last {
                    log::info!("MIDI ports changed: {:?}", current);
                    last = current;
                    let handlers = handlers.lock().clone();
                    for handler in handlers {
                        handler();
                    }
                }
            }
        });

        *watcher = Some(Watcher { should_stop, handle });
        log::debug!("MIDI hot-plug watcher started ({:?} poll)", poll_interval);
    }
}

/// Stable ids for a list of port names: `prefix:name`, with `#n` on duplicates
fn port_ids(prefix: &str, names: &[String]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    names
        .iter()
        .map(|name| {
            let count = seen.entry(name.as_str()).or_insert(0);
            *count += 1;
            if *count == 1 {
                format!("{}:{}", prefix, name)
            } else {
                format!("{}:{}#{}", prefix, name, count)
            }
        })
        .collect()
}

fn input_names(midi_in: &MidiInput) -> Vec<String> {
    midi_in
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| {
            midi_in
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown Device {}", index))
        })
        .collect()
}

fn output_names(midi_out: &MidiOutput) -> Vec<String> {
    midi_out
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| {
            midi_out
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown Device {}", index))
        })
        .collect()
}

fn port_snapshot() -> Vec<String> {
    let mut ports = Vec::new();
    if let Ok(midi_in) = MidiInput::new(CLIENT_NAME) {
        ports.extend(port_ids("in", &input_names(&midi_in)));
    }
    if let Ok(midi_out) = MidiOutput::new(CLIENT_NAME) {
        ports.extend(port_ids("out", &output_names(&midi_out)));
    }
    ports
}

fn devices(ids: Vec<String>, names: Vec<String>, build: fn(String, String) -> MidiDevice) -> Vec<MidiDevice> {
    ids.into_iter().zip(names).map(|(id, name)| build(id, name)).collect()
}

impl MidiAccess for MidirAccess {
    fn inputs(&self) -> Vec<MidiDevice> {
        match MidiInput::new(CLIENT_NAME) {
            Ok(midi_in) => {
                let names = input_names(&midi_in);
                devices(port_ids("in", &names), names, |id, name| MidiDevice::input(id, name))
            }
            Err(e) => {
                log::warn!("Failed to enumerate MIDI inputs: {}", e);
                Vec::new()
            }
        }
    }

    fn outputs(&self) -> Vec<MidiDevice> {
        match MidiOutput::new(CLIENT_NAME) {
            Ok(midi_out) => {
                let names = output_names(&midi_out);
                devices(port_ids("out", &names), names, |id, name| {
                    MidiDevice::output(id, name)
                })
            }
            Err(e) => {
                log::warn!("Failed to enumerate MIDI outputs: {}", e);
                Vec::new()
            }
        }
    }

    fn subscribe(&self, device_id: &str, handler: MessageHandler) -> Result<()> {
        let mut midi_in = MidiInput::new(CLIENT_NAME)?;
        midi_in.ignore(Ignore::None);

        let ids = port_ids("in", &input_names(&midi_in));
        let ports = midi_in.ports();
        let port = ids
            .iter()
            .position(|id| id == device_id)
            .and_then(|index| ports.get(index))
            .ok_or_else(|| Error::MidiDevice(format!("No input device '{}'", device_id)))?;

        log::info!("Connecting to MIDI device: {}", device_id);
        let connection = midi_in.connect(
            port,
            "studio-engine-in",
            move |_timestamp, message, _| {
                log::trace!("MIDI bytes: {:02X?}", message);
                handler(message);
            },
            (),
        )?;

        // Replacing an old connection drops it, which closes its port
        self.connections
            .lock()
            .insert(device_id.to_string(), connection);
        Ok(())
    }

    fn unsubscribe(&self, device_id: &str) {
        if self.connections.lock().remove(device_id).is_some() {
            log::info!("Disconnected from MIDI device: {}", device_id);
        }
    }

    fn on_state_change(&self, handler: StateChangeHandler) {
        self.state_handlers.lock().push(handler);
        self.start_watcher();
    }
}

impl Drop for MidirAccess {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.lock().take() {
            watcher.should_stop.store(true, Ordering::SeqCst);
            // The last handle can be released from inside a watcher callback
            if watcher.handle.thread().id() != thread::current().id() {
                let _ = watcher.handle.join();
            }
        }
        self.connections.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_ids_disambiguate_duplicates() {
        let names = vec![
            "Keystation".to_string(),
            "Launchpad".to_string(),
            "Keystation".to_string(),
        ];
        assert_eq!(
            port_ids("in", &names),
            vec!["in:Keystation", "in:Launchpad", "in:Keystation#2"]
        );
    }

    #[test]
    fn test_devices_pairs_ids_and_names() {
        let names = vec!["Pad".to_string()];
        let list = devices(port_ids("out", &names), names, |id, name| MidiDevice::output(id, name));
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "out:Pad");
        assert_eq!(list[0].name, "Pad");
        assert!(!list[0].is_input());
    }
}
