//! # Device: wires the orchestrator, the collaborators and the subscribers to one bus.
//!
//! The [`Device`] is built by [`DeviceBuilder`](crate::DeviceBuilder). Building
//! subscribes every component to the bus, so requests published through a
//! [`DeviceHandle`] right after `build()` are never lost, even before
//! [`Device::run`] is polled.
//!
//! ## High-level architecture
//! ```text
//! build():
//!   Bus ◄── OrchestratorRunner (Inbox subscription)
//!       ◄── CollaboratorHost × N (one per subsystem)
//!       ◄── listener receiver (only when subscribers are configured)
//!
//! run() / run_until(token):
//!   JoinSet ── "orchestrator"   runner.run(child token)
//!           ── "host:<name>"    host.run(child token)           (one per collaborator)
//!           ── "subscribers"    Bus ─► SubscriberSet::emit(&Message)
//!
//! Shutdown path:
//!   OS signal / token cancelled / a component exits early
//!             └─► runtime_token.cancel()   → propagates to child tokens
//!             └─► wait_all_with_grace(cfg.grace):
//!                    ├─ all joined       → Ok (or the first component error)
//!                    └─ grace exceeded   → abort, RuntimeError::GraceExceeded{stuck}
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use devicevisor::{ready, Config, Device, Subsystem};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let device = Device::builder(Config::default())
//!         .with_collaborators(Subsystem::ALL.into_iter().map(ready).collect())
//!         .build();
//!     let handle = device.handle();
//!
//!     let token = CancellationToken::new();
//!     let run = tokio::spawn(device.run_until(token.clone()));
//!
//!     handle.start(Duration::from_secs(1)).await?;
//!     token.cancel();
//!     run.await??;
//!     Ok(())
//! }
//! ```

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::collaborators::CollaboratorHost;
use crate::config::Config;
use crate::core::handle::DeviceHandle;
use crate::core::machine::Snapshot;
use crate::core::runner::OrchestratorRunner;
use crate::core::shutdown;
use crate::error::RuntimeError;
use crate::events::{Bus, Message};
use crate::subscribers::{Subscribe, SubscriberSet};

type Joined = (String, Result<(), RuntimeError>);
type Component = Pin<Box<dyn Future<Output = Result<(), RuntimeError>> + Send>>;

/// A fully wired device, ready to run.
pub struct Device {
    pub(crate) cfg: Config,
    pub(crate) bus: Bus,
    pub(crate) runner: OrchestratorRunner,
    pub(crate) hosts: Vec<CollaboratorHost>,
    pub(crate) listener: Option<(broadcast::Receiver<Message>, Vec<Arc<dyn Subscribe>>)>,
    pub(crate) state_tx: Arc<watch::Sender<Snapshot>>,
    pub(crate) seq: Arc<AtomicU32>,
}

impl Device {
    /// Returns a handle for posting system requests and observing state.
    ///
    /// Handles stay usable after the device stops; their requests then fail
    /// with [`RequestError::Closed`](crate::RequestError::Closed) or time out.
    pub fn handle(&self) -> DeviceHandle {
        DeviceHandle::new(
            self.bus.clone(),
            self.state_tx.subscribe(),
            Arc::clone(&self.seq),
        )
    }

    /// Runs until a termination signal arrives, then shuts down within
    /// [`Config::grace`].
    pub async fn run(self) -> Result<(), RuntimeError> {
        self.drive(shutdown::wait_for_shutdown_signal()).await
    }

    /// Runs until `token` is cancelled, then shuts down within [`Config::grace`].
    pub async fn run_until(self, token: CancellationToken) -> Result<(), RuntimeError> {
        self.drive(async move {
            token.cancelled().await;
            Ok(())
        })
        .await
    }

    async fn drive<F>(self, stop: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = Result<(), RuntimeError>>,
    {
        let Device {
            cfg,
            bus,
            runner,
            hosts,
            listener,
            state_tx,
            seq: _,
        } = self;

        let runtime_token = CancellationToken::new();
        let mut set: JoinSet<Joined> = JoinSet::new();
        let mut pending = BTreeSet::new();

        {
            let mut spawn = |name: String, fut: Component| {
                pending.insert(name.clone());
                set.spawn(async move { (name, fut.await) });
            };

            spawn(
                "orchestrator".to_string(),
                Box::pin(runner.run(runtime_token.child_token())),
            );
            for host in hosts {
                let name = format!("host:{}", host.subsystem());
                spawn(name, Box::pin(host.run(runtime_token.child_token())));
            }
            if let Some((rx, subscribers)) = listener {
                let subs = SubscriberSet::new(subscribers);
                spawn(
                    "subscribers".to_string(),
                    Box::pin(forward(rx, subs, runtime_token.child_token())),
                );
            }
        }
        info!(
            components = pending.len(),
            bus_receivers = bus.receiver_count(),
            "device running"
        );

        let mut first_err = None;
        tokio::select! {
            res = stop => {
                if let Err(e) = res {
                    error!(error = %e, "shutdown trigger failed");
                    first_err = Some(e);
                }
            }
            Some(joined) = set.join_next() => {
                error!("component exited before shutdown was requested");
                settle(joined, &mut pending, &mut first_err);
            }
        }

        info!("device shutting down");
        runtime_token.cancel();
        let result = wait_all_with_grace(&cfg, &mut set, &mut pending, &mut first_err).await;
        drop(state_tx);
        result
    }
}

/// Waits for every component within the configured grace period.
async fn wait_all_with_grace(
    cfg: &Config,
    set: &mut JoinSet<Joined>,
    pending: &mut BTreeSet<String>,
    first_err: &mut Option<RuntimeError>,
) -> Result<(), RuntimeError> {
    let grace = cfg.grace;
    let drained = tokio::time::timeout(grace, async {
        while let Some(joined) = set.join_next().await {
            settle(joined, pending, first_err);
        }
    })
    .await;

    match drained {
        Ok(()) => {
            info!("all components stopped within grace");
            match first_err.take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
        Err(_) => {
            set.abort_all();
            let stuck: Vec<String> = pending.iter().cloned().collect();
            error!(?grace, ?stuck, "grace exceeded");
            Err(RuntimeError::GraceExceeded { grace, stuck })
        }
    }
}

fn settle(
    joined: Result<Joined, tokio::task::JoinError>,
    pending: &mut BTreeSet<String>,
    first_err: &mut Option<RuntimeError>,
) {
    match joined {
        Ok((name, Ok(()))) => {
            pending.remove(&name);
        }
        Ok((name, Err(e))) => {
            error!(component = %name, error = %e, "component failed");
            pending.remove(&name);
            first_err.get_or_insert(e);
        }
        Err(join_err) => {
            error!(error = %join_err, "component task aborted or panicked");
        }
    }
}

/// Forwards every bus message to the subscriber set until cancelled.
async fn forward(
    mut rx: broadcast::Receiver<Message>,
    subs: SubscriberSet,
    token: CancellationToken,
) -> Result<(), RuntimeError> {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            res = rx.recv() => match res {
                Ok(msg) => subs.emit(&msg),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "subscriber listener lagged behind bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    subs.shutdown().await;
    Ok(())
}
