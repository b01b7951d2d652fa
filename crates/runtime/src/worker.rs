//! Tokio tick loop driving a [`CombatEngine`].
//!
//! Two things wake the engine: a fixed-period tick, and event bursts. A
//! burst of invalidations (several entities moving in one world frame)
//! coalesces into a single re-evaluation one debounce interval after the
//! first event, instead of one tick per event.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::CombatEngine;
use crate::events::EventBus;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub tick_interval_ms: u64,
    /// How long after the first event of a burst the coalesced
    /// re-evaluation runs.
    pub debounce_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 250,
            debounce_ms: 50,
        }
    }
}

/// Handle to a running worker.
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signals shutdown and waits for the loop to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

/// Drives a shared engine on a fixed tick with debounced event wakeups.
pub struct TickWorker {
    engine: Arc<Mutex<CombatEngine>>,
    config: WorkerConfig,
    wake: Arc<Notify>,
}

impl TickWorker {
    pub fn new(engine: Arc<Mutex<CombatEngine>>, config: WorkerConfig) -> Self {
        Self {
            engine,
            config,
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn engine(&self) -> Arc<Mutex<CombatEngine>> {
        Arc::clone(&self.engine)
    }

    /// Subscribes the engine to every bus topic. Events apply inline on
    /// the publisher's thread; the worker is only nudged to re-evaluate.
    pub fn attach(&self, bus: &mut EventBus) {
        let engine = Arc::clone(&self.engine);
        let wake = Arc::clone(&self.wake);
        bus.subscribe_all(
            0,
            Box::new(move |event| {
                if let Ok(mut engine) = engine.lock() {
                    engine.apply_event(event);
                }
                wake.notify_one();
            }),
        );
    }

    /// Spawns the tick loop onto the current tokio runtime.
    pub fn spawn(self) -> WorkerHandle {
        let (shutdown, rx) = watch::channel(false);
        let join = tokio::spawn(self.run(rx));
        WorkerHandle { shutdown, join }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let debounce = Duration::from_millis(self.config.debounce_ms);
        tracing::info!(
            "worker: started (tick {}ms, debounce {}ms)",
            self.config.tick_interval_ms,
            self.config.debounce_ms
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick_once();
                }
                _ = self.wake.notified() => {
                    // Let the rest of the burst land, then evaluate once.
                    tokio::time::sleep(debounce).await;
                    self.tick_once();
                    ticker.reset();
                }
                _ = shutdown.changed() => {
                    tracing::info!("worker: shutting down");
                    break;
                }
            }
        }
    }

    fn tick_once(&self) {
        match self.engine.lock() {
            Ok(mut engine) => {
                let outcome = engine.tick();
                tracing::trace!(
                    "worker: tick (target {:?}, moved {})",
                    outcome.target,
                    outcome.executed.as_ref().is_some_and(|o| o.success)
                );
            }
            Err(_) => tracing::error!("worker: engine lock poisoned, skipping tick"),
        }
    }
}
