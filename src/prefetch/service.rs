//! Background prefetch loop.
//!
//! Every `interval` the service takes the tail of the global history, asks the
//! scheduler for the top-K next blocks (excluding what is already cached) and
//! warms the cache with them. Each cycle runs on the blocking pool so store
//! reads never stall the runtime; a failing cycle is logged and the loop
//! carries on.
//!
//! Shutdown is signalled over a watch channel that also interrupts the sleep
//! between cycles, and `stop()` waits a bounded time for the loop to exit.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, ServiceConfig};
use crate::history::GlobalHistory;
use crate::prefetch::prefetcher::{PrefetchStatus, Prefetcher};
use crate::prefetch::scheduler::PrefetchScheduler;
use crate::store::BlockStore;
use crate::GLOBAL_QUERY_ID;

/// What a single cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The global history was empty.
    NoHistory,
    /// The scheduler had nothing to suggest.
    NoSuggestions,
    Prefetched { attempted: usize, succeeded: usize },
}

struct ServiceCore<S: BlockStore> {
    history: Arc<GlobalHistory>,
    scheduler: Arc<PrefetchScheduler>,
    prefetcher: Arc<Prefetcher<S>>,
    history_len: usize,
    top_k: usize,
}

impl<S: BlockStore> ServiceCore<S> {
    fn run_cycle(&self) -> CycleOutcome {
        let sequence = self.history.get_sequence(Some(self.history_len));
        if sequence.is_empty() {
            return CycleOutcome::NoHistory;
        }

        let cached: HashSet<_> = self.prefetcher.cache().cached_ids().into_iter().collect();
        let Some(suggestions) = self.scheduler.suggest_topk_prefetch(
            GLOBAL_QUERY_ID,
            Some(&sequence),
            self.top_k,
            Some(&cached),
        ) else {
            return CycleOutcome::NoSuggestions;
        };

        let mut succeeded = 0;
        for suggestion in &suggestions {
            if self.prefetcher.prefetch_block(suggestion.block_id) == PrefetchStatus::Prefetched {
                succeeded += 1;
            }
        }

        info!(
            attempted = suggestions.len(),
            succeeded,
            "Prefetch cycle complete"
        );
        CycleOutcome::Prefetched {
            attempted: suggestions.len(),
            succeeded,
        }
    }
}

struct RunningLoop {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct PrefetchService<S: BlockStore> {
    core: Arc<ServiceCore<S>>,
    interval: Duration,
    stop_timeout: Duration,
    running: Mutex<Option<RunningLoop>>,
}

impl<S: BlockStore + 'static> PrefetchService<S> {
    pub fn new(
        history: Arc<GlobalHistory>,
        scheduler: Arc<PrefetchScheduler>,
        prefetcher: Arc<Prefetcher<S>>,
        config: &ServiceConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            core: Arc::new(ServiceCore {
                history,
                scheduler,
                prefetcher,
                history_len: config.history_len,
                top_k: config.top_k,
            }),
            interval: config.interval(),
            stop_timeout: config.stop_timeout(),
            running: Mutex::new(None),
        })
    }

    /// Run one cycle on the calling thread.
    pub fn run_cycle(&self) -> CycleOutcome {
        self.core.run_cycle()
    }

    /// Spawn the loop on the current runtime. Returns `false` if it is
    /// already running.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            debug!("Prefetch service already running");
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(self.core.clone(), self.interval, stop_rx));
        *running = Some(RunningLoop { stop_tx, task });

        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Prefetch service started"
        );
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }

    /// Signal the loop and wait up to the stop timeout for it to exit.
    ///
    /// Returns `false` if the loop did not finish in time; it is then
    /// detached and stops at its next checkpoint. A cycle already running
    /// completes before the loop observes the signal.
    pub async fn stop(&self) -> bool {
        let Some(running) = self.running.lock().take() else {
            return true;
        };
        // The receiver may already be gone if the loop exited on its own.
        let _ = running.stop_tx.send(true);

        match tokio::time::timeout(self.stop_timeout, running.task).await {
            Ok(Ok(())) => {
                info!("Prefetch service stopped");
                true
            }
            Ok(Err(e)) => {
                error!(error = %e, "Prefetch service task ended abnormally");
                true
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.stop_timeout.as_millis() as u64,
                    "Prefetch service did not stop in time"
                );
                false
            }
        }
    }
}

async fn run_loop<S: BlockStore + 'static>(
    core: Arc<ServiceCore<S>>,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        if *stop_rx.borrow() {
            break;
        }

        let cycle = core.clone();
        match tokio::task::spawn_blocking(move || cycle.run_cycle()).await {
            Ok(outcome) => debug!(?outcome, "Prefetch cycle finished"),
            Err(e) => error!(error = %e, "Prefetch cycle failed"),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = stop_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!("Prefetch loop exited");
}
