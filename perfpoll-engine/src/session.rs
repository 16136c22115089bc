//! Poll scheduler: the helper, its session state machine, and the cycle
//! loop.
//!
//! A [`Poller`] is `Idle → Running → Idle`. Synchronous sessions run the
//! loop on the caller's context and block until a finite bound is reached;
//! asynchronous sessions move the cycle driver into a spawned task and hand
//! it back on join. At most one session runs per helper; starting a second
//! is a usage error that leaves the running session untouched.
//!
//! Cancellation is a `watch` channel checked once per cycle boundary and
//! raced against the inter-cycle sleep, and [`Poller::cancel`] awaits the
//! task's join handle, so shutdown never busy-waits and the helper is safe
//! to reuse the moment `cancel` returns.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use perfpoll_core::bindings::BindingRegistry;
use perfpoll_core::config::PollConfig;
use perfpoll_core::error::ConfigError;
use perfpoll_core::snapshot::SnapshotStore;
use perfpoll_core::types::{PropertyHandle, Snapshot};
use perfpoll_provider::source::{Connection, Enumerator, Locator, Row};

use crate::buffer::EnumBuffer;
use crate::error::PollError;
use crate::read;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// A finite termination bound was reached.
    Completed,
    /// Cancellation was requested between cycles.
    Cancelled,
}

// ---------------------------------------------------------------------------
// Cycle driver
// ---------------------------------------------------------------------------

/// Everything one session mutates: the enumerator, the row buffer, and the
/// snapshot store. Owned by the caller's context for synchronous sessions;
/// moves into the task for asynchronous ones and moves back on join, so no
/// two sessions can ever share it.
struct CycleDriver<E: Enumerator> {
    enumerator: E,
    buffer: EnumBuffer<E::Row>,
    store: SnapshotStore,
}

impl<E: Enumerator> CycleDriver<E> {
    fn new(enumerator: E) -> Self {
        Self {
            enumerator,
            buffer: EnumBuffer::new(),
            store: SnapshotStore::new(),
        }
    }

    /// Forget the prior session's columns; each session's first cycle has
    /// an empty `previous`. Buffer capacity is kept, so a reused helper
    /// does not re-pay the growth protocol.
    fn reset_store(&mut self) {
        self.store = SnapshotStore::new();
    }

    /// One refresh-enumerate-read-commit cycle.
    ///
    /// Accessors are resolved on the batch's first row; a property the
    /// class does not expose skips that handle for the whole cycle. A row
    /// whose read fails is dropped from that handle's column only. The row
    /// batch drops before commit, releasing every row on every exit path.
    fn run_cycle(&mut self, bindings: &BindingRegistry) -> Result<Snapshot, PollError> {
        self.store.begin_cycle();

        let batch = self.buffer.fill(&mut self.enumerator);
        if let Some(first) = batch.first() {
            for (handle, name) in bindings.iter() {
                let accessor = match first.accessor(name.0.as_str()) {
                    Ok(accessor) => accessor,
                    Err(err) => {
                        tracing::debug!(
                            property = %name,
                            error = %err,
                            "accessor unresolved; skipping handle this cycle"
                        );
                        continue;
                    }
                };
                for row in batch.rows() {
                    if let Some(value) = read::read_cell(row, &accessor)? {
                        self.store.record(handle, value);
                    }
                }
            }
        }
        drop(batch);

        Ok(self.store.commit_cycle())
    }
}

// ---------------------------------------------------------------------------
// Session loop
// ---------------------------------------------------------------------------

async fn run_session<E, F>(
    driver: &mut CycleDriver<E>,
    config: &PollConfig,
    bindings: &BindingRegistry,
    cancel_rx: &mut watch::Receiver<bool>,
    mut emit: F,
) -> Result<SessionEnd, PollError>
where
    E: Enumerator,
    F: FnMut(Snapshot),
{
    driver.reset_store();
    let started = Instant::now();
    let mut fires: u32 = 0;

    loop {
        // Cooperative cancellation: checked once per cycle boundary, never
        // mid-cycle, so a cancelled session emits no partial cycle.
        if *cancel_rx.borrow() {
            tracing::info!(fires, "poll session cancelled");
            return Ok(SessionEnd::Cancelled);
        }

        let snapshot = driver.run_cycle(bindings)?;
        emit(snapshot);
        fires += 1;

        if let Some(max_fires) = config.termination.max_fires {
            if fires >= max_fires {
                tracing::info!(fires, "poll session completed: fire bound reached");
                return Ok(SessionEnd::Completed);
            }
        }
        if let Some(max_elapsed) = config.termination.max_elapsed {
            let elapsed = started.elapsed();
            if elapsed >= max_elapsed {
                tracing::info!(fires, ?elapsed, "poll session completed: elapsed bound reached");
                return Ok(SessionEnd::Completed);
            }
        }

        // The sleep is measured end-of-cycle to start-of-next; cadence
        // missed under load is not corrected. A cancel request wakes the
        // sleep early and the check at the top of the loop exits.
        tokio::select! {
            _ = tokio::time::sleep(config.interval()) => {}
            changed = cancel_rx.changed() => {
                if changed.is_err() {
                    // Sender gone: the helper was dropped mid-session.
                    tracing::info!(fires, "cancel channel closed; ending session");
                    return Ok(SessionEnd::Cancelled);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

struct RunningSession<E: Enumerator> {
    cancel: watch::Sender<bool>,
    join: JoinHandle<(CycleDriver<E>, Result<SessionEnd, PollError>)>,
}

/// One polling helper over one provider class.
///
/// Bind every property before starting a session; the registry is shared
/// across cycles and never mutated while a session runs.
pub struct Poller<E: Enumerator> {
    config: PollConfig,
    bindings: BindingRegistry,
    driver: Option<CycleDriver<E>>,
    running: Option<RunningSession<E>>,
}

impl<E: Enumerator> std::fmt::Debug for Poller<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("config", &self.config)
            .field("running", &self.running.is_some())
            .finish()
    }
}

impl<E: Enumerator> Poller<E> {
    /// Connect to the provider and open the class enumerator.
    ///
    /// Both steps are one-time setup; a failure here is fatal and no cycle
    /// ever runs.
    pub fn connect<L>(locator: &L, config: PollConfig) -> Result<Self, PollError>
    where
        L: Locator,
        L::Connection: Connection<Enumerator = E>,
    {
        let connection = locator.connect(&config.namespace, config.credentials.as_ref())?;
        let enumerator = connection.open_enumerator(&config.class_name)?;
        tracing::debug!(
            class = %config.class_name,
            namespace = %config.namespace,
            "provider connected"
        );
        Ok(Self {
            config,
            bindings: BindingRegistry::new(),
            driver: Some(CycleDriver::new(enumerator)),
            running: None,
        })
    }

    /// Bind a property for sampling. Call before starting a session.
    pub fn bind(&mut self, name: &str) -> PropertyHandle {
        self.bindings.bind(name)
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// True while an asynchronous session is still polling.
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map_or(false, |running| !running.join.is_finished())
    }

    /// Run a collecting session on the caller's context and return every
    /// emitted snapshot in cycle order.
    ///
    /// Rejected with [`ConfigError::UnboundedSyncQuery`] when neither
    /// termination bound is finite — such a session could never return.
    pub async fn query(&mut self) -> Result<Vec<Snapshot>, PollError> {
        if self.config.termination.is_unbounded() {
            return Err(ConfigError::UnboundedSyncQuery.into());
        }
        self.reap_finished().await?;
        let mut driver = self.take_driver()?;

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let mut collected = Vec::new();
        let outcome = run_session(
            &mut driver,
            &self.config,
            &self.bindings,
            &mut cancel_rx,
            |snapshot| collected.push(snapshot),
        )
        .await;
        drop(cancel_tx);

        self.driver = Some(driver);
        outcome?;
        Ok(collected)
    }

    /// [`Poller::query`] for non-async callers: builds a current-thread
    /// runtime and blocks on it.
    pub fn query_blocking(&mut self) -> Result<Vec<Snapshot>, PollError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(PollError::Runtime)?;
        runtime.block_on(self.query())
    }

    /// Spawn a streaming session that delivers each snapshot to `callback`
    /// on the session task, in cycle order.
    ///
    /// The termination policy may be fully unbounded; such a session runs
    /// until [`Poller::cancel`]. The callback must not block materially
    /// longer than the cadence interval or cycles will skew late.
    pub async fn query_callback<F>(&mut self, mut callback: F) -> Result<(), PollError>
    where
        F: FnMut(&PollConfig, &Snapshot) + Send + 'static,
        E: Send + 'static,
        E::Row: Send,
    {
        self.reap_finished().await?;
        let mut driver = self.take_driver()?;

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let config = self.config.clone();
        let bindings = self.bindings.clone();
        let join = tokio::spawn(async move {
            let outcome = run_session(&mut driver, &config, &bindings, &mut cancel_rx, |snapshot| {
                callback(&config, &snapshot);
            })
            .await;
            (driver, outcome)
        });

        self.running = Some(RunningSession {
            cancel: cancel_tx,
            join,
        });
        Ok(())
    }

    /// Request cancellation and block until the session task acknowledges
    /// and hands the driver back.
    ///
    /// No-op when no session is running; idempotent after acknowledgment.
    /// Surfaces a contract violation the session died of, if any.
    pub async fn cancel(&mut self) -> Result<(), PollError> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        let _ = running.cancel.send(true);
        match running.join.await {
            Ok((driver, outcome)) => {
                self.driver = Some(driver);
                outcome.map(|_| ())
            }
            Err(err) => Err(PollError::SessionPanicked(err.to_string())),
        }
    }

    /// Reclaim the driver from a streaming session that terminated on its
    /// own, so the helper is reusable without an explicit `cancel`.
    async fn reap_finished(&mut self) -> Result<(), PollError> {
        let finished = self
            .running
            .as_ref()
            .map_or(false, |running| running.join.is_finished());
        if !finished {
            return Ok(());
        }
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        match running.join.await {
            Ok((driver, outcome)) => {
                self.driver = Some(driver);
                outcome.map(|_| ())
            }
            Err(err) => Err(PollError::SessionPanicked(err.to_string())),
        }
    }

    fn take_driver(&mut self) -> Result<CycleDriver<E>, PollError> {
        if self.running.is_some() {
            return Err(PollError::SessionActive);
        }
        self.driver.take().ok_or(PollError::SessionLost)
    }
}
