//! The engine facade the UI layer talks to
//!
//! Owns the shared session and every component built on it. Create one per
//! process and pass it around by reference or `Arc`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::audio::{NoteTrigger, ObserverId, SessionState, SynthBackend};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::midi::{
    LastNote, MidiDevice, MidiDeviceManager, MidiPlatform, MidiSettings, MidiSettingsPatch,
    MidirPlatform,
};
use crate::notify::Notifier;
use crate::sequencer::{load_melody, ImportedMelody, MelodyScheduler, NoteEvent, Pattern, StepSequencer};

/// Session, trigger, sequencers and MIDI input wired to one backend
pub struct Studio {
    config: EngineConfig,
    trigger: NoteTrigger,
    sequencer: StepSequencer,
    melody: MelodyScheduler,
    midi: MidiDeviceManager,
}

impl Studio {
    /// Fails with `Config` when `config` does not validate. Out-of-range MIDI
    /// settings are normalized rather than rejected.
    pub fn new(
        backend: Arc<dyn SynthBackend>,
        platform: Arc<dyn MidiPlatform>,
        notifier: Arc<dyn Notifier>,
        mut config: EngineConfig,
    ) -> Result<Self> {
        config.midi.normalize();
        config.validate()?;

        let session = SessionState::new(backend, notifier.clone());
        session.set_master_volume(config.master_volume);
        let trigger = NoteTrigger::new(session);

        let midi = MidiDeviceManager::new(
            platform,
            trigger.clone(),
            notifier,
            config.channels.clone(),
            config.midi.clone(),
        )
        .with_note_duration(config.midi_note_duration);

        log::info!("Studio engine created");
        Ok(Self {
            sequencer: StepSequencer::new(trigger.clone(), config.drum_volume),
            melody: MelodyScheduler::new(trigger.clone()),
            trigger,
            midi,
            config,
        })
    }

    /// Hardware MIDI through midir
    pub fn with_midir(
        backend: Arc<dyn SynthBackend>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Result<Self> {
        let platform = Arc::new(MidirPlatform::new(Duration::from_millis(config.hotplug_poll_ms)));
        Self::new(backend, platform, notifier, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The shared session every component triggers through
    pub fn session(&self) -> &Arc<SessionState> {
        self.trigger.session()
    }

    /// Open the audio session. Safe to call repeatedly and concurrently.
    pub async fn initialize(&self) -> Result<()> {
        self.session().initialize().await
    }

    pub fn is_initialized(&self) -> bool {
        self.session().is_initialized()
    }

    /// Called once the session becomes initialized, or right away if it already is
    pub fn subscribe(&self, observer: impl Fn() + Send + Sync + 'static) -> ObserverId {
        self.session().subscribe(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.session().unsubscribe(id)
    }

    /// Render one note now, opening the session first if needed. Failures are logged.
    pub async fn play_note(&self, pitch: &str, octave: i32, duration_secs: f64, instrument: &str, velocity: f32) {
        self.trigger
            .play_note(pitch, octave, duration_secs, instrument, velocity)
            .await;
    }

    /// `play_note` with the configured default instrument and velocity
    pub async fn play_default_note(&self, pitch: &str, octave: i32, duration_secs: f64) {
        self.trigger
            .play_note(
                pitch,
                octave,
                duration_secs,
                &self.config.default_instrument,
                self.config.default_velocity,
            )
            .await;
    }

    /// Render one drum hit now
    pub async fn play_drum_sound(&self, drum_id: &str, volume: f32) {
        self.trigger.play_drum_sound(drum_id, volume).await;
    }

    /// Clamped to 0..1
    pub fn set_master_volume(&self, level: f32) {
        self.trigger.set_master_volume(level);
    }

    pub fn master_volume(&self) -> f32 {
        self.session().master_volume()
    }

    /// Loop `pattern` at `bpm`, replacing whatever pattern is playing.
    ///
    /// Fails with `InvalidTempo` when the tempo gives no usable step length.
    pub fn play_pattern(&self, pattern: Pattern, bpm: f64) -> Result<()> {
        self.sequencer.play_pattern(pattern, bpm)
    }

    pub fn stop_pattern(&self) {
        self.sequencer.stop_pattern();
    }

    pub fn is_pattern_playing(&self) -> bool {
        self.sequencer.is_playing()
    }

    /// 0..16, reset to 0 on stop
    pub fn current_step(&self) -> usize {
        self.sequencer.current_step()
    }

    /// Schedule `notes` relative to now, cancelling the previous melody.
    /// Nothing changes when any note cannot be scheduled.
    pub fn play_melody(&self, notes: &[NoteEvent], bpm: f64) -> Result<()> {
        self.melody.play_melody(notes, bpm)
    }

    pub fn stop_melody(&self) {
        self.melody.stop_melody();
    }

    pub fn is_melody_playing(&self) -> bool {
        self.melody.is_playing()
    }

    /// Read a Standard MIDI File, mapping channels through the configured instruments
    pub fn load_melody_file(&self, path: &Path) -> Result<ImportedMelody> {
        load_melody(path, &self.config.channels)
    }

    /// Request device access and subscribe to the inputs
    pub async fn initialize_midi(&self) -> Result<()> {
        self.midi.initialize_midi().await
    }

    pub fn refresh_devices(&self) {
        self.midi.refresh_devices();
    }

    /// Merge a partial MIDI settings change
    pub fn update_settings(&self, patch: &MidiSettingsPatch) {
        self.midi.update_settings(patch);
    }

    pub fn reset_settings(&self) {
        self.midi.reset_settings();
    }

    pub fn midi_settings(&self) -> MidiSettings {
        self.midi.settings()
    }

    pub fn midi(&self) -> &MidiDeviceManager {
        &self.midi
    }

    /// Every known device, inputs first
    pub fn devices(&self) -> Vec<MidiDevice> {
        self.midi.devices()
    }

    pub fn connected_devices(&self) -> Vec<MidiDevice> {
        self.midi.connected_devices()
    }

    /// MIDI notes currently held down, ascending
    pub fn active_notes(&self) -> Vec<u8> {
        self.midi.active_notes()
    }

    pub fn last_note(&self) -> Option<LastNote> {
        self.midi.last_note()
    }

    /// Stop all scheduled playback
    pub fn stop_all(&self) {
        self.sequencer.stop_pattern();
        self.melody.stop_melody();
    }
}
