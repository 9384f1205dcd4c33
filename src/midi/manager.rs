//! MIDI device manager
//!
//! Requests device access, mirrors the platform's device list, subscribes
//! one handler per input and turns incoming note-ons into `NoteTrigger` calls.
//!
//! Device callbacks may run on platform threads. They only push raw bytes
//! into a channel; a single pump task decodes and plays them in arrival order.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::channels::ChannelInstrumentMap;
use super::message::{MidiMessage, CC_ALL_NOTES_OFF, CC_MODULATION, CC_SUSTAIN};
use super::platform::{MessageHandler, MidiAccess, MidiDevice, MidiPlatform};
use super::settings::{MidiSettings, MidiSettingsPatch};
use crate::audio::pitch::{decode_note, midi_note_name, normalize_velocity};
use crate::audio::NoteTrigger;
use crate::error::{Error, Result};
use crate::notify::{Notice, NoticeKind, Notifier};

/// Fixed sustain for MIDI note-ons, in seconds. Note-off does not cut notes short.
pub const DEFAULT_NOTE_DURATION: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastNote {
    pub note: u8,
    /// e.g. "C4"
    pub name: String,
    /// 0-indexed
    pub channel: u8,
    /// After normalization and sensitivity scaling
    pub velocity: f32,
    pub instrument: String,
}

struct Inbound {
    device_id: String,
    bytes: Vec<u8>,
}

struct PlayRequest {
    pitch: &'static str,
    octave: i32,
    instrument: String,
    velocity: f32,
}

#[derive(Default)]
struct ManagerState {
    access: Option<Arc<dyn MidiAccess>>,
    /// Set once the platform reports no MIDI support
    unsupported: Option<String>,
    devices: Vec<MidiDevice>,
    subscribed: BTreeSet<String>,
    active_notes: BTreeSet<u8>,
    last_note: Option<LastNote>,
    settings: MidiSettings,
}

struct Core {
    trigger: NoteTrigger,
    notifier: Arc<dyn Notifier>,
    channels: ChannelInstrumentMap,
    note_duration: f64,
    tx: mpsc::UnboundedSender<Inbound>,
    state: Mutex<ManagerState>,
}

/// Mirrors the platform's MIDI devices and turns input messages into notes
pub struct MidiDeviceManager {
    platform: Arc<dyn MidiPlatform>,
    core: Arc<Core>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<Inbound>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl MidiDeviceManager {
    pub fn new(
        platform: Arc<dyn MidiPlatform>,
        trigger: NoteTrigger,
        notifier: Arc<dyn Notifier>,
        channels: ChannelInstrumentMap,
        settings: MidiSettings,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            platform,
            core: Arc::new(Core {
                trigger,
                notifier,
                channels,
                note_duration: DEFAULT_NOTE_DURATION,
                tx,
                state: Mutex::new(ManagerState {
                    settings,
                    ..ManagerState::default()
                }),
            }),
            inbox: Mutex::new(Some(rx)),
            pump: Mutex::new(None),
        }
    }

    /// Override the fixed note-on sustain. Non-positive values are ignored.
    pub fn with_note_duration(mut self, seconds: f64) -> Self {
        if seconds.is_finite() && seconds > 0.0 {
            if let Some(core) = Arc::get_mut(&mut self.core) {
                core.note_duration = seconds;
            }
        }
        self
    }

    /// Request device access, enumerate devices and subscribe to every input.
    ///
    /// `UnsupportedCapability` is reported to the notifier once; afterwards MIDI
    /// stays disabled and this returns the same error without asking again.
    /// `AccessDenied` is reported each time and may be retried by calling again.
    /// Must be called from within a Tokio runtime.
    pub async fn initialize_midi(&self) -> Result<()> {
        let already_granted = {
            let state = self.core.state.lock();
            if let Some(reason) = &state.unsupported {
                return Err(Error::UnsupportedCapability(reason.clone()));
            }
            state.access.is_some()
        };
        if already_granted {
            self.core.rebuild(false);
            return Ok(());
        }

        let access = match self.platform.request_access().await {
            Ok(access) => access,
            Err(Error::UnsupportedCapability(reason)) => {
                log::warn!("MIDI unsupported, disabling MIDI input: {}", reason);
                self.core.state.lock().unsupported = Some(reason.clone());
                self.core
                    .notifier
                    .notify(Notice::new(NoticeKind::UnsupportedCapability, reason.clone()));
                return Err(Error::UnsupportedCapability(reason));
            }
            Err(Error::AccessDenied(reason)) => {
                log::warn!("MIDI access denied: {}", reason);
                self.core
                    .notifier
                    .notify(Notice::new(NoticeKind::AccessDenied, reason.clone()));
                return Err(Error::AccessDenied(reason));
            }
            Err(e) => return Err(e),
        };

        {
            let mut state = self.core.state.lock();
            if state.access.is_some() {
                // An overlapping call got there first
                return Ok(());
            }
            state.access = Some(access.clone());
        }

        self.start_pump();

        let core = Arc::downgrade(&self.core);
        access.on_state_change(Arc::new(move || {
            if let Some(core) = core.upgrade() {
                log::debug!("MIDI device state changed, rebuilding device list");
                core.rebuild(false);
            }
        }));

        self.core.rebuild(true);
        log::info!(
            "MIDI initialized: {} device(s), {} input(s) subscribed",
            self.devices().len(),
            self.subscribed_devices().len()
        );
        Ok(())
    }

    /// Rebuild the device list from the platform's current set
    pub fn refresh_devices(&self) {
        self.core.rebuild(false);
    }

    /// Subscribe to one input regardless of `autoConnect`
    pub fn connect_device(&self, device_id: &str) -> Result<()> {
        self.core.connect(device_id)
    }

    /// Decode and act on one raw message from `device_id`.
    ///
    /// Subscribed devices feed this through the pump; it can also be called
    /// directly, e.g. by an on-screen keyboard.
    pub async fn handle_message(&self, device_id: &str, bytes: &[u8]) {
        self.core.handle(device_id, bytes).await;
    }

    /// Merge a partial settings change; takes effect on the next message
    pub fn update_settings(&self, patch: &MidiSettingsPatch) {
        {
            let mut state = self.core.state.lock();
            state.settings.merge(patch);
            log::debug!("MIDI settings updated: {:?}", state.settings);
        }
        // autoConnect may have just been switched on
        self.core.rebuild(false);
    }

    /// Back to [`MidiSettings::default`]
    pub fn reset_settings(&self) {
        self.core.state.lock().settings = MidiSettings::default();
        log::info!("MIDI settings reset to defaults");
        self.core.rebuild(false);
    }

    pub fn settings(&self) -> MidiSettings {
        self.core.state.lock().settings.clone()
    }

    /// True once device access has been granted
    pub fn is_enabled(&self) -> bool {
        self.core.state.lock().access.is_some()
    }

    /// Mirrored list, inputs first
    pub fn devices(&self) -> Vec<MidiDevice> {
        self.core.state.lock().devices.clone()
    }

    pub fn connected_devices(&self) -> Vec<MidiDevice> {
        self.core
            .state
            .lock()
            .devices
            .iter()
            .filter(|d| d.is_connected())
            .cloned()
            .collect()
    }

    /// Ids of the inputs currently listened to
    pub fn subscribed_devices(&self) -> Vec<String> {
        self.core.state.lock().subscribed.iter().cloned().collect()
    }

    /// Currently held notes, ascending
    pub fn active_notes(&self) -> Vec<u8> {
        self.core.state.lock().active_notes.iter().copied().collect()
    }

    /// Most recent note-on that passed the filters
    pub fn last_note(&self) -> Option<LastNote> {
        self.core.state.lock().last_note.clone()
    }

    fn start_pump(&self) {
        let mut pump = self.pump.lock();
        if pump.is_some() {
            return;
        }
        let Some(mut rx) = self.inbox.lock().take() else {
            return;
        };
        let core = self.core.clone();
        *pump = Some(tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                core.handle(&message.device_id, &message.bytes).await;
            }
        }));
    }
}

impl Drop for MidiDeviceManager {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        // Dropping the last access handle may join a platform thread that
        // needs the state lock, so release it first
        let (access, subscribed) = {
            let mut state = self.core.state.lock();
            (state.access.take(), std::mem::take(&mut state.subscribed))
        };
        if let Some(access) = access {
            for id in subscribed {
                access.unsubscribe(&id);
            }
            drop(access);
        }
    }
}

impl Core {
    fn handler_for(&self, device_id: &str) -> MessageHandler {
        let tx = self.tx.clone();
        let device_id = device_id.to_string();
        Arc::new(move |bytes: &[u8]| {
            let _ = tx.send(Inbound {
                device_id: device_id.clone(),
                bytes: bytes.to_vec(),
            });
        })
    }

    fn connect(&self, device_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        let access = state
            .access
            .clone()
            .ok_or_else(|| Error::MidiDevice("MIDI is not initialized".to_string()))?;
        access.subscribe(device_id, self.handler_for(device_id))?;
        state.subscribed.insert(device_id.to_string());
        log::info!("Listening to MIDI input {}", device_id);
        Ok(())
    }

    /// Full rebuild of the mirrored list. `subscribe_all` ignores `autoConnect`.
    fn rebuild(&self, subscribe_all: bool) {
        let mut state = self.state.lock();
        let Some(access) = state.access.clone() else {
            return;
        };

        let mut devices = access.inputs();
        devices.extend(access.outputs());

        let live: BTreeSet<String> = devices
            .iter()
            .filter(|d| d.is_input() && d.is_connected())
            .map(|d| d.id.clone())
            .collect();

        let gone: Vec<String> = state.subscribed.difference(&live).cloned().collect();
        for id in gone {
            access.unsubscribe(&id);
            state.subscribed.remove(&id);
            log::info!("MIDI input {} went away", id);
        }

        if subscribe_all || state.settings.auto_connect {
            for id in live {
                if state.subscribed.contains(&id) {
                    continue;
                }
                match access.subscribe(&id, self.handler_for(&id)) {
                    Ok(()) => {
                        log::info!("Listening to MIDI input {}", id);
                        state.subscribed.insert(id);
                    }
                    Err(e) => log::warn!("Failed to subscribe to MIDI input {}: {}", id, e),
                }
            }
        }

        state.devices = devices;
    }

    async fn handle(&self, device_id: &str, bytes: &[u8]) {
        if let Some(play) = self.apply(device_id, bytes) {
            self.trigger
                .play_note(
                    play.pitch,
                    play.octave,
                    self.note_duration,
                    &play.instrument,
                    play.velocity,
                )
                .await;
        }
    }

    /// Update note state for one message; returns the note to play, if any
    fn apply(&self, device_id: &str, bytes: &[u8]) -> Option<PlayRequest> {
        log::trace!("MIDI from {}: {:02X?}", device_id, bytes);
        let Some(message) = MidiMessage::decode(bytes) else {
            log::debug!("Ignoring malformed MIDI message from {}", device_id);
            return None;
        };

        let mut guard = self.state.lock();
        let ManagerState {
            settings,
            active_notes,
            last_note,
            ..
        } = &mut *guard;

        if !settings.accepts_device(device_id) {
            return None;
        }
        if let Some(channel) = message.channel() {
            if !settings.accepts_channel(channel) {
                return None;
            }
        }

        match message {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => {
                if !settings.accepts_note(note) {
                    return None;
                }
                active_notes.insert(note);

                let (pitch, octave) = decode_note(note);
                let velocity = settings.scale_velocity(normalize_velocity(velocity));
                let instrument = self.channels.instrument_for(channel).to_string();
                log::debug!(
                    "MIDI Note On: {} ch={} vel={:.3} -> {}",
                    midi_note_name(note),
                    channel,
                    velocity,
                    instrument
                );

                *last_note = Some(LastNote {
                    note,
                    name: midi_note_name(note),
                    channel,
                    velocity,
                    instrument: instrument.clone(),
                });
                Some(PlayRequest {
                    pitch,
                    octave,
                    instrument,
                    velocity,
                })
            }
            MidiMessage::NoteOff { channel, note } => {
                if settings.accepts_note(note) {
                    active_notes.remove(&note);
                    log::debug!("MIDI Note Off: {} ch={}", midi_note_name(note), channel);
                }
                None
            }
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => {
                match controller {
                    CC_ALL_NOTES_OFF => {
                        log::debug!("MIDI All Notes Off ch={}", channel);
                        active_notes.clear();
                    }
                    CC_SUSTAIN => log::debug!(
                        "MIDI sustain {} ch={} ({})",
                        if value >= 64 { "down" } else { "up" },
                        channel,
                        enabled(settings.sustain_pedal)
                    ),
                    CC_MODULATION => log::debug!(
                        "MIDI modulation {} ch={} ({})",
                        value,
                        channel,
                        enabled(settings.modulation)
                    ),
                    _ => log::debug!("MIDI CC {}={} ch={}", controller, value, channel),
                }
                None
            }
            MidiMessage::ProgramChange { channel, program } => {
                log::debug!("MIDI Program Change {} ch={}", program, channel);
                None
            }
            MidiMessage::PitchBend { channel, value } => {
                log::debug!(
                    "MIDI pitch bend {} ch={} ({})",
                    value,
                    channel,
                    enabled(settings.pitch_bend)
                );
                None
            }
            MidiMessage::Other { status } => {
                log::trace!("MIDI status 0x{:02X} ignored", status);
                None
            }
        }
    }
}

fn enabled(on: bool) -> &'static str {
    if on {
        "enabled"
    } else {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{RecordingBackend, RenderCall, SessionState};
    use crate::midi::platform::{DeviceState, VirtualPlatform};
    use crate::midi::settings::ChannelMode;
    use crate::notify::RecordingNotifier;
    use std::time::Duration;

    struct Rig {
        backend: Arc<RecordingBackend>,
        platform: Arc<VirtualPlatform>,
        notifier: Arc<RecordingNotifier>,
        manager: MidiDeviceManager,
    }

    fn rig_with(platform: Arc<VirtualPlatform>) -> Rig {
        let backend = RecordingBackend::new();
        let notifier = Arc::new(RecordingNotifier::new());
        let session = SessionState::new(backend.clone(), notifier.clone());
        let manager = MidiDeviceManager::new(
            platform.clone(),
            NoteTrigger::new(session),
            notifier.clone(),
            ChannelInstrumentMap::default(),
            MidiSettings::default(),
        );
        Rig {
            backend,
            platform,
            notifier,
            manager,
        }
    }

    fn rig() -> Rig {
        rig_with(VirtualPlatform::new())
    }

    /// (instrument, velocity, frequency) of every rendered note
    fn played(backend: &RecordingBackend) -> Vec<(String, f32, f64)> {
        backend
            .note_calls()
            .into_iter()
            .map(|call| match call {
                RenderCall::Note {
                    instrument,
                    velocity,
                    frequency_hz,
                    ..
                } => (instrument, velocity, frequency_hz),
                other => panic!("Expected note, got {:?}", other),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_note_on_plays_and_tracks() {
        let rig = rig();
        rig.manager.handle_message("kbd", &[0x90, 60, 127]).await;

        assert_eq!(rig.manager.active_notes(), vec![60]);
        let last = rig.manager.last_note().unwrap();
        assert_eq!(last.name, "C4");
        assert_eq!(last.velocity, 1.0);
        assert_eq!(last.instrument, "piano");

        let notes = played(&rig.backend);
        assert_eq!(notes.len(), 1);
        assert!((notes[0].2 - 261.6256).abs() < 1e-3);
        match &rig.backend.note_calls()[0] {
            RenderCall::Note { duration_secs, .. } => assert_eq!(*duration_secs, DEFAULT_NOTE_DURATION),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_velocity_normalization() {
        let rig = rig();
        rig.manager.handle_message("kbd", &[0x90, 69, 1]).await;
        let (_, velocity, frequency) = played(&rig.backend)[0].clone();
        assert!((velocity - 1.0 / 127.0).abs() < 1e-6);
        assert!((frequency - 440.0).abs() < 1e-9);

        // velocity 0 is a note-off, nothing new is played
        rig.manager.handle_message("kbd", &[0x90, 69, 0]).await;
        assert_eq!(played(&rig.backend).len(), 1);
        assert!(rig.manager.active_notes().is_empty());
    }

    #[tokio::test]
    async fn test_active_note_lifecycle() {
        let rig = rig();
        rig.manager.handle_message("kbd", &[0x90, 64, 90]).await;
        rig.manager.handle_message("kbd", &[0x90, 64, 90]).await;
        rig.manager.handle_message("kbd", &[0x90, 67, 90]).await;
        assert_eq!(rig.manager.active_notes(), vec![64, 67]);

        rig.manager.handle_message("kbd", &[0x80, 64, 0]).await;
        assert_eq!(rig.manager.active_notes(), vec![67]);

        // second note-off for the same note is a no-op
        rig.manager.handle_message("kbd", &[0x80, 64, 0]).await;
        assert_eq!(rig.manager.active_notes(), vec![67]);

        // note-off never renders
        assert_eq!(played(&rig.backend).len(), 3);

        rig.manager
            .handle_message("kbd", &[0xB0, CC_ALL_NOTES_OFF, 0])
            .await;
        assert!(rig.manager.active_notes().is_empty());
    }

    #[tokio::test]
    async fn test_channel_instruments() {
        let rig = rig();
        rig.manager.handle_message("kbd", &[0x99, 36, 100]).await;
        rig.manager.handle_message("kbd", &[0x9C, 60, 100]).await;
        rig.manager.handle_message("kbd", &[0x92, 40, 100]).await;

        let instruments: Vec<String> = played(&rig.backend).into_iter().map(|n| n.0).collect();
        assert_eq!(instruments, vec!["drums", "piano", "bass"]);
    }

    #[tokio::test]
    async fn test_settings_filters() {
        let rig = rig();
        rig.manager.update_settings(&MidiSettingsPatch {
            input_device: Some("kbd".to_string()),
            channel_mode: Some(ChannelMode::Single),
            active_channel: Some(2),
            velocity_sensitivity: Some(50.0),
            ..Default::default()
        });

        // wrong device, wrong channel, out of range
        rig.manager.handle_message("pads", &[0x91, 60, 127]).await;
        rig.manager.handle_message("kbd", &[0x90, 60, 127]).await;
        rig.manager.handle_message("kbd", &[0x91, 10, 127]).await;
        assert!(played(&rig.backend).is_empty());
        assert!(rig.manager.active_notes().is_empty());

        rig.manager.handle_message("kbd", &[0x91, 60, 127]).await;
        let notes = played(&rig.backend);
        assert_eq!(notes.len(), 1);
        assert!((notes[0].1 - 0.5).abs() < 1e-6);
        assert_eq!(notes[0].0, "guitar");

        rig.manager.reset_settings();
        assert_eq!(rig.manager.settings(), MidiSettings::default());
    }

    #[tokio::test]
    async fn test_settings_merge_sequence() {
        let rig = rig();
        let first: MidiSettingsPatch = serde_json::from_str(r#"{"velocitySensitivity":[80]}"#).unwrap();
        let second: MidiSettingsPatch = serde_json::from_str(r#"{"channelMode":"single"}"#).unwrap();
        rig.manager.update_settings(&first);
        rig.manager.update_settings(&second);

        let settings = rig.manager.settings();
        assert_eq!(settings.velocity_sensitivity, 80.0);
        assert_eq!(settings.channel_mode, ChannelMode::Single);
        assert_eq!(settings.note_range, MidiSettings::default().note_range);

        rig.manager.update_settings(&MidiSettingsPatch::default());
        assert_eq!(rig.manager.settings(), settings);
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_messages_flow_through_pump() {
        let rig = rig();
        let access = rig.platform.access().clone();
        access.add_input("kbd", "Keyboard");
        access.add_output("synth", "Synth");

        rig.manager.initialize_midi().await.unwrap();
        assert!(rig.manager.is_enabled());
        assert_eq!(rig.manager.devices().len(), 2);
        assert_eq!(rig.manager.subscribed_devices(), vec!["kbd"]);

        assert!(access.send("kbd", &[0x90, 60, 100]));
        assert!(access.send("kbd", &[0x90, 62, 100]));
        assert!(access.send("kbd", &[0x90, 64, 100]));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let frequencies: Vec<f64> = played(&rig.backend).into_iter().map(|n| n.2).collect();
        assert_eq!(frequencies.len(), 3);
        assert!(frequencies[0] < frequencies[1] && frequencies[1] < frequencies[2]);
        assert_eq!(rig.manager.active_notes(), vec![60, 62, 64]);
    }

    #[tokio::test]
    async fn test_hot_plug_rebuilds_list() {
        let rig = rig();
        let access = rig.platform.access().clone();
        access.add_input("kbd", "Keyboard");
        rig.manager.initialize_midi().await.unwrap();

        access.add_input("pads", "Pads");
        assert_eq!(rig.manager.devices().len(), 2);
        assert!(access.is_subscribed("pads"));

        access.set_state("kbd", DeviceState::Disconnected);
        assert_eq!(rig.manager.connected_devices().len(), 1);
        assert_eq!(rig.manager.subscribed_devices(), vec!["pads"]);

        access.remove_device("kbd");
        assert_eq!(rig.manager.devices().len(), 1);
    }

    #[tokio::test]
    async fn test_auto_connect_off_skips_new_devices() {
        let rig = rig();
        let access = rig.platform.access().clone();
        access.add_input("kbd", "Keyboard");
        rig.manager.update_settings(&MidiSettingsPatch {
            auto_connect: Some(false),
            ..Default::default()
        });
        rig.manager.initialize_midi().await.unwrap();
        assert!(access.is_subscribed("kbd"));

        access.add_input("pads", "Pads");
        assert_eq!(rig.manager.devices().len(), 2);
        assert!(!access.is_subscribed("pads"));

        rig.manager.connect_device("pads").unwrap();
        assert!(access.is_subscribed("pads"));
    }

    #[tokio::test]
    async fn test_unsupported_notified_once() {
        let rig = rig_with(VirtualPlatform::unsupported());

        for _ in 0..3 {
            assert!(matches!(
                rig.manager.initialize_midi().await,
                Err(Error::UnsupportedCapability(_))
            ));
        }
        assert_eq!(rig.platform.request_count(), 1);
        assert_eq!(rig.notifier.count(NoticeKind::UnsupportedCapability), 1);
        assert!(!rig.manager.is_enabled());
    }

    #[tokio::test]
    async fn test_access_denied_can_retry() {
        let rig = rig();
        rig.platform.deny_access();
        assert!(matches!(
            rig.manager.initialize_midi().await,
            Err(Error::AccessDenied(_))
        ));
        assert_eq!(rig.notifier.count(NoticeKind::AccessDenied), 1);

        rig.platform.allow_access();
        rig.manager.initialize_midi().await.unwrap();
        assert!(rig.manager.is_enabled());
        assert_eq!(rig.platform.request_count(), 2);
    }

    #[tokio::test]
    async fn test_drop_releases_subscriptions() {
        let rig = rig();
        let access = rig.platform.access().clone();
        access.add_input("kbd", "Keyboard");
        access.add_input("pads", "Pads");
        rig.manager.initialize_midi().await.unwrap();
        assert!(access.is_subscribed("kbd") && access.is_subscribed("pads"));

        drop(rig.manager);
        assert!(!access.is_subscribed("kbd"));
        assert!(!access.is_subscribed("pads"));
        assert!(!access.send("kbd", &[0x90, 60, 100]));

        // hot-plug after teardown must not resubscribe or block
        access.add_input("late", "Late");
        assert!(!access.is_subscribed("late"));
        assert!(!access.is_subscribed("kbd"));
    }

    #[tokio::test]
    async fn test_render_failure_keeps_listening() {
        let rig = rig();
        rig.backend.fail_sound("piano");
        rig.manager.handle_message("kbd", &[0x90, 60, 100]).await;
        rig.manager.handle_message("kbd", &[0x91, 62, 100]).await;

        assert_eq!(rig.manager.active_notes(), vec![60, 62]);
        assert_eq!(played(&rig.backend).len(), 1);
        assert!(rig.notifier.notices().is_empty());
    }
}
