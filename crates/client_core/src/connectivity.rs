use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info};

use crate::backend::EventBackend;

const SIGNAL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityTransition {
    pub prev_offline: bool,
    pub next_offline: bool,
}

impl ConnectivityTransition {
    pub fn is_reconnect(&self) -> bool {
        self.prev_offline && !self.next_offline
    }
}

/// Turns a stream of raw offline reports into transitions. The first report
/// only establishes the baseline; repeated identical reports are dropped.
#[derive(Debug, Default)]
pub struct ConnectivityTracker {
    last: Option<bool>,
}

impl ConnectivityTracker {
    pub fn observe(&mut self, offline: bool) -> Option<ConnectivityTransition> {
        let prev = self.last.replace(offline)?;
        (prev != offline).then_some(ConnectivityTransition {
            prev_offline: prev,
            next_offline: offline,
        })
    }

    pub fn current(&self) -> Option<bool> {
        self.last
    }
}

/// Write side of an external connectivity signal.
#[derive(Clone)]
pub struct ConnectivityReporter {
    tx: mpsc::Sender<bool>,
}

impl ConnectivityReporter {
    pub async fn report(&self, offline: bool) -> bool {
        self.tx.send(offline).await.is_ok()
    }
}

/// Read side of an external connectivity signal: the state at setup plus
/// every later report, delivered in order.
pub struct ConnectivitySignal {
    initial_offline: bool,
    updates: mpsc::Receiver<bool>,
}

pub fn connectivity_channel(initial_offline: bool) -> (ConnectivityReporter, ConnectivitySignal) {
    let (tx, updates) = mpsc::channel(SIGNAL_CAPACITY);
    (
        ConnectivityReporter { tx },
        ConnectivitySignal {
            initial_offline,
            updates,
        },
    )
}

#[async_trait]
pub trait ConnectivityHandler: Send + Sync {
    async fn on_transition(&self, transition: ConnectivityTransition);
}

/// Watches a connectivity signal and hands each transition to a single
/// handler, one at a time.
pub struct ConnectivityMonitor {
    offline: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl ConnectivityMonitor {
    /// Reads the initial state without firing. With no signal the monitor is
    /// inert and reports online.
    pub fn attach(
        signal: Option<ConnectivitySignal>,
        handler: Arc<dyn ConnectivityHandler>,
    ) -> Self {
        let Some(ConnectivitySignal {
            initial_offline,
            mut updates,
        }) = signal
        else {
            debug!("no connectivity signal available; monitor is inert");
            return Self {
                offline: Arc::new(AtomicBool::new(false)),
                task: None,
            };
        };

        let offline = Arc::new(AtomicBool::new(initial_offline));
        let mut tracker = ConnectivityTracker::default();
        tracker.observe(initial_offline);

        let shared = Arc::clone(&offline);
        let task = tokio::spawn(async move {
            while let Some(report) = updates.recv().await {
                let Some(transition) = tracker.observe(report) else {
                    continue;
                };
                shared.store(transition.next_offline, Ordering::SeqCst);
                info!(offline = transition.next_offline, "connectivity changed");
                handler.on_transition(transition).await;
            }
            debug!("connectivity signal closed");
        });

        Self {
            offline,
            task: Some(task),
        }
    }

    pub fn offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    pub fn is_inert(&self) -> bool {
        self.task.is_none()
    }

    /// Waits until the signal closes and every transition has been handled.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Polls the service and reports offline whenever it cannot be reached.
/// Endpoint-level failures still count as online.
pub fn spawn_connectivity_probe(
    backend: Arc<dyn EventBackend>,
    reporter: ConnectivityReporter,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let offline = match backend.health_check().await {
                Ok(()) => false,
                Err(err) => err.is_transport(),
            };
            if !reporter.report(offline).await {
                debug!("connectivity monitor gone; stopping probe");
                break;
            }
        }
    })
}

#[cfg(test)]
#[path = "tests/connectivity_tests.rs"]
mod tests;
