//! Lazily loaded, process-wide detector.
//!
//! One [`DetectorLifecycle`] owns the model for the whole process. The first
//! caller that finds it unloaded starts a load attempt; everyone arriving
//! while that attempt runs blocks on a condition variable and receives the
//! very same outcome. The state lock is only ever held for bookkeeping, so
//! [`DetectorLifecycle::status`] stays cheap while a load is in flight.

use crate::{
    config::LifecycleConfig,
    detector::{Detector, DetectorLoader},
    error::{LoadError, panic_message},
};
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

type LoadOutcome = Result<Arc<dyn Detector>, LoadError>;

const LOADER_THREAD_NAME: &str = "detector-loader";

/// Externally visible load state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Uninitialized,
    Loading,
    Ready,
    Failed(LoadError),
}

impl LoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStatus::Uninitialized => "UNINITIALIZED",
            LoadStatus::Loading => "LOADING",
            LoadStatus::Ready => "READY",
            LoadStatus::Failed(_) => "FAILED",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, LoadStatus::Ready)
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One load attempt. Its outcome is written exactly once, before waiters
/// are woken.
struct Attempt {
    generation: u64,
    outcome: OnceLock<LoadOutcome>,
}

enum Phase {
    Uninitialized,
    Loading(Arc<Attempt>),
    Ready(Arc<dyn Detector>),
    Failed { error: LoadError, at: Instant },
}

struct State {
    phase: Phase,
    generation: u64,
    /// Consecutive failed attempts, reset on success.
    failures: u32,
}

/// What a caller should do after inspecting the state.
enum Ticket {
    Ready(Arc<dyn Detector>),
    Failed(LoadError),
    Wait(Arc<Attempt>),
    Run(Arc<Attempt>),
}

struct Inner {
    loader: Box<dyn DetectorLoader>,
    config: LifecycleConfig,
    state: Mutex<State>,
    resolved: Condvar,
    attempts: AtomicU64,
}

/// Shared handle to the process detector. Cloning is cheap; all clones see
/// the same state.
#[derive(Clone)]
pub struct DetectorLifecycle {
    inner: Arc<Inner>,
}

impl DetectorLifecycle {
    pub fn new(loader: impl DetectorLoader, config: LifecycleConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                loader: Box::new(loader),
                config,
                state: Mutex::new(State {
                    phase: Phase::Uninitialized,
                    generation: 0,
                    failures: 0,
                }),
                resolved: Condvar::new(),
                attempts: AtomicU64::new(0),
            }),
        }
    }

    /// Current state. Never waits on a load.
    pub fn status(&self) -> LoadStatus {
        match &self.inner.lock().phase {
            Phase::Uninitialized => LoadStatus::Uninitialized,
            Phase::Loading(_) => LoadStatus::Loading,
            Phase::Ready(_) => LoadStatus::Ready,
            Phase::Failed { error, .. } => LoadStatus::Failed(error.clone()),
        }
    }

    /// Number of load attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.inner.attempts.load(Ordering::Relaxed)
    }

    /// Return the detector, loading it first if needed.
    ///
    /// Waits for an in-flight attempt (bounded by the configured
    /// `load_wait_timeout`, if any) and returns its outcome. After a failure
    /// the next call starts a new attempt unless the retry backoff window is
    /// still open, in which case the cached failure is returned.
    pub fn ensure_loaded(&self) -> Result<Arc<dyn Detector>, LoadError> {
        if let Some(timeout) = self.inner.config.load_wait_timeout {
            return self.ensure_loaded_timeout(timeout);
        }

        match self.inner.ticket() {
            Ticket::Ready(detector) => Ok(detector),
            Ticket::Failed(error) => Err(error),
            Ticket::Wait(attempt) => self.inner.wait(&attempt, None),
            Ticket::Run(attempt) => self.inner.run(&attempt),
        }
    }

    /// Like [`ensure_loaded`](Self::ensure_loaded) but gives up after
    /// `timeout` with [`LoadError::Timeout`]. The attempt itself keeps
    /// running for other callers.
    pub fn ensure_loaded_timeout(&self, timeout: Duration) -> Result<Arc<dyn Detector>, LoadError> {
        match self.inner.ticket() {
            Ticket::Ready(detector) => Ok(detector),
            Ticket::Failed(error) => Err(error),
            Ticket::Wait(attempt) => self.inner.wait(&attempt, Some(timeout)),
            Ticket::Run(attempt) => {
                let inner = Arc::clone(&self.inner);
                let spawned = Arc::clone(&attempt);
                let spawn = thread::Builder::new()
                    .name(LOADER_THREAD_NAME.to_string())
                    .spawn(move || {
                        let _ = inner.run(&spawned);
                    });
                if let Err(e) = spawn {
                    tracing::warn!(error = %e, "Could not spawn loader thread, loading inline");
                    return self.inner.run(&attempt);
                }
                self.inner.wait(&attempt, Some(timeout))
            }
        }
    }

    /// Start loading on a dedicated thread and return immediately.
    ///
    /// Does nothing if the detector is ready, loading, or inside a backoff
    /// window. `status()` reports `Loading` as soon as this returns `Ok`.
    pub fn load_in_background(&self) -> io::Result<()> {
        let Ticket::Run(attempt) = self.inner.ticket() else {
            return Ok(());
        };

        let inner = Arc::clone(&self.inner);
        let spawned = Arc::clone(&attempt);
        let spawn = thread::Builder::new()
            .name(LOADER_THREAD_NAME.to_string())
            .spawn(move || {
                let _ = inner.run(&spawned);
            });

        if let Err(e) = spawn {
            // The attempt is already published as Loading; resolve it so
            // nobody waits on a thread that never started.
            self.inner.resolve(
                &attempt,
                Err(LoadError::Backend(format!("could not spawn loader thread: {e}"))),
            );
            return Err(e);
        }
        Ok(())
    }
}

impl fmt::Debug for DetectorLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorLifecycle")
            .field("status", &self.status())
            .field("attempts", &self.attempts())
            .finish()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        // State is only replaced wholesale, so a poisoned guard is still coherent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ticket(&self) -> Ticket {
        let mut state = self.lock();
        match &state.phase {
            Phase::Ready(detector) => return Ticket::Ready(Arc::clone(detector)),
            Phase::Loading(attempt) => return Ticket::Wait(Arc::clone(attempt)),
            Phase::Failed { error, at } => {
                let delay = self.config.retry.delay_for(state.failures);
                if at.elapsed() < delay {
                    tracing::debug!(failures = state.failures, ?delay, "Load retry suppressed by backoff");
                    return Ticket::Failed(error.clone());
                }
            }
            Phase::Uninitialized => {}
        }

        state.generation += 1;
        let attempt = Arc::new(Attempt {
            generation: state.generation,
            outcome: OnceLock::new(),
        });
        state.phase = Phase::Loading(Arc::clone(&attempt));
        Ticket::Run(attempt)
    }

    /// Run the loader for `attempt` without holding the lock, then publish.
    fn run(&self, attempt: &Attempt) -> LoadOutcome {
        self.attempts.fetch_add(1, Ordering::Relaxed);

        let span = tracing::info_span!("detector_load", attempt = attempt.generation);
        let _enter = span.enter();

        tracing::info!("Loading detector");
        let start = Instant::now();

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.loader.load())) {
            Ok(outcome) => outcome,
            Err(payload) => Err(LoadError::Panicked(panic_message(payload.as_ref()))),
        };

        match &outcome {
            Ok(_) => tracing::info!(elapsed = ?start.elapsed(), "Detector ready"),
            Err(e) => tracing::error!(error = %e, elapsed = ?start.elapsed(), "Detector load failed"),
        }

        self.resolve(attempt, outcome.clone());
        outcome
    }

    fn resolve(&self, attempt: &Attempt, outcome: LoadOutcome) {
        let mut state = self.lock();

        let phase = match &outcome {
            Ok(detector) => {
                state.failures = 0;
                Phase::Ready(Arc::clone(detector))
            }
            Err(error) => {
                state.failures += 1;
                Phase::Failed {
                    error: error.clone(),
                    at: Instant::now(),
                }
            }
        };
        state.phase = phase;
        let _ = attempt.outcome.set(outcome);

        drop(state);
        self.resolved.notify_all();
    }

    /// Block until `attempt` resolves, or `timeout` elapses.
    fn wait(&self, attempt: &Attempt, timeout: Option<Duration>) -> LoadOutcome {
        let pending = |_: &mut State| attempt.outcome.get().is_none();
        let state = self.lock();

        match timeout {
            None => {
                let _state = self
                    .resolved
                    .wait_while(state, pending)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            Some(timeout) => {
                let (_state, result) = self
                    .resolved
                    .wait_timeout_while(state, timeout, pending)
                    .unwrap_or_else(PoisonError::into_inner);
                if result.timed_out() {
                    tracing::warn!(?timeout, attempt = attempt.generation, "Gave up waiting for detector load");
                }
            }
        }

        attempt
            .outcome
            .get()
            .cloned()
            .unwrap_or_else(|| Err(LoadError::Timeout(timeout.unwrap_or_default())))
    }
}
