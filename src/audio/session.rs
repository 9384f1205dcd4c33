//! Shared audio session lifecycle
//!
//! One [`SessionState`] exists per running engine and is handed to every
//! component as an `Arc`. `initialize()` may be called from anywhere, any
//! number of times, concurrently: exactly one caller performs the backend
//! setup and everyone else waits for that attempt's outcome.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use super::backend::SynthBackend;
use crate::error::{Error, Result};
use crate::notify::{Notice, NoticeKind, Notifier};

pub type ObserverId = u64;

type Observer = Arc<dyn Fn() + Send + Sync>;

/// Outcome of one setup attempt, broadcast to overlapping callers
type Outcome = Option<std::result::Result<(), String>>;

enum Phase {
    Idle,
    Pending {
        attempt: u64,
        outcome: watch::Receiver<Outcome>,
    },
    Ready,
}

struct Inner {
    phase: Phase,
    attempts: u64,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: ObserverId,
    master_volume: f32,
    /// A failure notice went out for the current run of failed attempts
    failure_notified: bool,
}

enum Step {
    Wait(u64, watch::Receiver<Outcome>),
    Run(watch::Sender<Outcome>),
}

pub struct SessionState {
    backend: Arc<dyn SynthBackend>,
    notifier: Arc<dyn Notifier>,
    initialized: AtomicBool,
    inner: Mutex<Inner>,
}

impl SessionState {
    pub fn new(backend: Arc<dyn SynthBackend>, notifier: Arc<dyn Notifier>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            notifier,
            initialized: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                phase: Phase::Idle,
                attempts: 0,
                observers: Vec::new(),
                next_observer: 0,
                master_volume: 0.8,
                failure_notified: false,
            }),
        })
    }

    /// The synthesis backend every trigger renders through
    pub fn backend(&self) -> &Arc<dyn SynthBackend> {
        &self.backend
    }

    /// True once a setup attempt has succeeded
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Open the shared audio session if it is not open yet.
    ///
    /// Overlapping calls share the first caller's attempt and resolve with its
    /// result. A failed attempt leaves the session uninitialized and the next
    /// call starts over.
    pub async fn initialize(&self) -> Result<()> {
        loop {
            let step = {
                let mut inner = self.inner.lock();
                let waiting = match &inner.phase {
                    Phase::Ready => return Ok(()),
                    Phase::Pending { attempt, outcome } => Some((*attempt, outcome.clone())),
                    Phase::Idle => None,
                };
                match waiting {
                    Some((attempt, outcome)) => Step::Wait(attempt, outcome),
                    None => {
                        inner.attempts += 1;
                        let (tx, rx) = watch::channel(None);
                        inner.phase = Phase::Pending {
                            attempt: inner.attempts,
                            outcome: rx,
                        };
                        Step::Run(tx)
                    }
                }
            };

            match step {
                Step::Run(tx) => return self.run_setup(tx).await,
                Step::Wait(attempt, mut rx) => {
                    log::debug!("Audio session setup already in progress, waiting");
                    let outcome = rx.wait_for(|o| o.is_some()).await.ok().and_then(|o| o.clone());
                    match outcome {
                        Some(Ok(())) => return Ok(()),
                        Some(Err(msg)) => return Err(Error::InitializationFailure(msg)),
                        None => {
                            // The caller running setup was dropped mid-flight
                            log::warn!("Audio session setup attempt {} was abandoned", attempt);
                            let mut inner = self.inner.lock();
                            if matches!(inner.phase, Phase::Pending { attempt: a, .. } if a == attempt) {
                                inner.phase = Phase::Idle;
                            }
                        }
                    }
                }
            }
        }
    }

    async fn run_setup(&self, tx: watch::Sender<Outcome>) -> Result<()> {
        log::info!("Opening audio session");
        let outcome = self.backend.start().await;

        let (observers, volume, first_failure) = {
            let mut inner = self.inner.lock();
            match outcome {
                Ok(()) => {
                    inner.phase = Phase::Ready;
                    inner.failure_notified = false;
                    self.initialized.store(true, Ordering::SeqCst);
                    let observers: Vec<Observer> =
                        inner.observers.iter().map(|(_, o)| Arc::clone(o)).collect();
                    (observers, inner.master_volume, false)
                }
                Err(_) => {
                    inner.phase = Phase::Idle;
                    let first = !inner.failure_notified;
                    inner.failure_notified = true;
                    (Vec::new(), inner.master_volume, first)
                }
            }
        };

        let _ = tx.send(Some(outcome.clone()));

        match outcome {
            Ok(()) => {
                self.backend.set_master_volume(volume);
                log::info!("Audio session initialized, notifying {} observers", observers.len());
                for observer in observers {
                    observer();
                }
                Ok(())
            }
            Err(msg) => {
                if first_failure {
                    log::error!("Audio session setup failed: {}", msg);
                    self.notifier
                        .notify(Notice::new(NoticeKind::InitializationFailure, msg.clone()));
                } else {
                    log::warn!("Audio session setup failed again: {}", msg);
                }
                Err(Error::InitializationFailure(msg))
            }
        }
    }

    /// Resume the session if the platform suspended it. Required before every render.
    pub async fn resume(&self) -> Result<()> {
        self.backend
            .resume_if_suspended()
            .await
            .map_err(Error::RenderFailure)
    }

    /// Register a callback for "became initialized".
    ///
    /// Callbacks run in registration order. Subscribing after the session is
    /// already up runs the callback immediately.
    pub fn subscribe(&self, observer: impl Fn() + Send + Sync + 'static) -> ObserverId {
        let observer: Observer = Arc::new(observer);
        let (id, ready) = {
            let mut inner = self.inner.lock();
            let id = inner.next_observer;
            inner.next_observer += 1;
            inner.observers.push((id, Arc::clone(&observer)));
            (id, matches!(inner.phase, Phase::Ready))
        };
        if ready {
            observer();
        }
        id
    }

    /// Remove a callback. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.observers.len();
        inner.observers.retain(|(observer_id, _)| *observer_id != id);
        inner.observers.len() != before
    }

    /// Current output level, whether or not the session is up yet
    pub fn master_volume(&self) -> f32 {
        self.inner.lock().master_volume
    }

    /// Set the output level (clamped to 0..1). Applied to the backend right
    /// away when the session is up, otherwise when it comes up.
    pub fn set_master_volume(&self, level: f32) {
        let level = if level.is_finite() { level.clamp(0.0, 1.0) } else { 0.0 };
        self.inner.lock().master_volume = level;
        if self.is_initialized() {
            self.backend.set_master_volume(level);
        }
    }
}
