//! # CollaboratorHost: bus adapter for one collaborator.
//!
//! Listens for the requests addressed to its [`Subsystem`], runs the matching
//! [`Collaborator`] method and publishes the confirmation.
//!
//! ## Event flow
//! ```text
//! Bus ── StartReq{subsystem, seq, fifos} ──► collaborator.start(params) ──► StartCfm{subsystem, seq, status}
//! Bus ── StopReq{subsystem}              ──► collaborator.stop()        ──► StopCfm{subsystem, status}
//!                                               │
//!                                               └─ panic ──► status = Failure(PANICKED, info)
//! ```
//!
//! ## Rules
//! - Requests are handled one at a time, in bus order.
//! - A panicking collaborator still produces exactly one confirmation.
//! - The host subscribes at construction; requests published afterwards are seen.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::collaborators::collaborator::{CollaboratorRef, StartParams};
use crate::error::RuntimeError;
use crate::events::{Bus, ErrorCode, Message, Status, Subsystem};

/// Connects one collaborator to the bus.
pub struct CollaboratorHost {
    collaborator: CollaboratorRef,
    bus: Bus,
    rx: broadcast::Receiver<Message>,
}

impl CollaboratorHost {
    /// Creates the host and subscribes to the bus immediately.
    pub fn new(collaborator: CollaboratorRef, bus: Bus) -> Self {
        let rx = bus.subscribe();
        Self {
            collaborator,
            bus,
            rx,
        }
    }

    pub fn subsystem(&self) -> Subsystem {
        self.collaborator.subsystem()
    }

    /// Serves requests until `token` is cancelled or the bus closes.
    pub async fn run(mut self, token: CancellationToken) -> Result<(), RuntimeError> {
        let me = self.subsystem();
        loop {
            let msg = tokio::select! {
                _ = token.cancelled() => return Ok(()),
                res = self.rx.recv() => match res {
                    Ok(msg) => msg,
                    Err(RecvError::Lagged(n)) => {
                        warn!(subsystem = %me, skipped = n, "host lagged behind bus");
                        continue;
                    }
                    Err(RecvError::Closed) => return Err(RuntimeError::BusClosed),
                },
            };

            match msg {
                Message::StartReq {
                    subsystem,
                    seq,
                    fifos,
                } if subsystem == me => {
                    debug!(subsystem = %me, seq, "start requested");
                    let fut = self.collaborator.start(StartParams { seq, fifos });
                    let status = guarded(fut).await;
                    self.bus.publish(Message::StartCfm {
                        subsystem: me,
                        seq,
                        status,
                    });
                }
                Message::StopReq { subsystem } if subsystem == me => {
                    debug!(subsystem = %me, "stop requested");
                    let status = guarded(self.collaborator.stop()).await;
                    self.bus.publish(Message::StopCfm {
                        subsystem: me,
                        status,
                    });
                }
                _ => {}
            }
        }
    }
}

/// Awaits a collaborator future, turning a panic into a failure status.
async fn guarded<F>(fut: F) -> Status
where
    F: std::future::Future<Output = Status>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(status) => status,
        Err(panic_err) => {
            let info = if let Some(msg) = panic_err.downcast_ref::<&'static str>() {
                (*msg).to_string()
            } else if let Some(msg) = panic_err.downcast_ref::<String>() {
                msg.clone()
            } else {
                "unknown panic".to_string()
            };
            warn!(%info, "collaborator panicked");
            Status::failure(ErrorCode::PANICKED, info)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::collaborator_fn::{ready, CollaboratorFn};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn next_cfm(rx: &mut broadcast::Receiver<Message>) -> Message {
        loop {
            let msg = rx.recv().await.expect("bus open");
            if matches!(msg, Message::StartCfm { .. } | Message::StopCfm { .. }) {
                return msg;
            }
        }
    }

    #[tokio::test]
    async fn answers_only_its_own_subsystem() {
        let bus = Bus::new(32);
        let mut tap = bus.subscribe();
        let host = CollaboratorHost::new(ready(Subsystem::Gpio), bus.clone());
        let token = CancellationToken::new();
        let join = tokio::spawn(host.run(token.clone()));

        bus.publish(Message::StartReq {
            subsystem: Subsystem::Adc,
            seq: 1,
            fifos: None,
        });
        bus.publish(Message::StartReq {
            subsystem: Subsystem::Gpio,
            seq: 2,
            fifos: None,
        });
        bus.publish(Message::StopReq {
            subsystem: Subsystem::Gpio,
        });

        let first = next_cfm(&mut tap).await;
        assert!(matches!(
            first,
            Message::StartCfm { subsystem: Subsystem::Gpio, seq: 2, status: Status::Success }
        ));
        let second = next_cfm(&mut tap).await;
        assert!(matches!(
            second,
            Message::StopCfm { subsystem: Subsystem::Gpio, status: Status::Success }
        ));

        token.cancel();
        join.await.expect("join").expect("clean exit");
    }

    async fn explode() -> Status {
        panic!("delegate exploded")
    }

    #[tokio::test]
    async fn panic_becomes_failure_confirmation() {
        let bus = Bus::new(32);
        let mut tap = bus.subscribe();
        let boom = CollaboratorFn::arc(
            Subsystem::Delegate,
            |_p: StartParams| explode(),
            || async { Status::Success },
        );
        let host = CollaboratorHost::new(boom, bus.clone());
        let token = CancellationToken::new();
        let join = tokio::spawn(host.run(token.clone()));

        bus.publish(Message::StartReq {
            subsystem: Subsystem::Delegate,
            seq: 0,
            fifos: None,
        });

        match next_cfm(&mut tap).await {
            Message::StartCfm { status, .. } => {
                assert_eq!(status.code(), Some(ErrorCode::PANICKED));
                assert_eq!(
                    status,
                    Status::failure(ErrorCode::PANICKED, "delegate exploded")
                );
            }
            other => panic!("unexpected {other:?}"),
        }

        token.cancel();
        join.await.expect("join").expect("clean exit");
    }

    #[tokio::test]
    async fn fifos_are_passed_through() {
        let bus = Bus::new(32);
        let mut tap = bus.subscribe();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in = Arc::clone(&seen);
        let i2c = CollaboratorFn::arc(
            Subsystem::I2cSlave,
            move |p: StartParams| {
                let seen = Arc::clone(&seen_in);
                async move {
                    if let Some(f) = p.fifos {
                        if let Ok(mut out) = f.outbound.lock() {
                            let _ = out.push(0x5A);
                        }
                        seen.fetch_add(1, Ordering::SeqCst);
                    }
                    Status::Success
                }
            },
            || async { Status::Success },
        );
        let host = CollaboratorHost::new(i2c, bus.clone());
        let token = CancellationToken::new();
        let join = tokio::spawn(host.run(token.clone()));

        let pair = crate::buffers::FifoPair::with_order(3);
        bus.publish(Message::StartReq {
            subsystem: Subsystem::I2cSlave,
            seq: 0,
            fifos: Some(pair.clone()),
        });
        next_cfm(&mut tap).await;

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(pair.outbound.lock().expect("lock").pop(), Some(0x5A));

        token.cancel();
        join.await.expect("join").expect("clean exit");
    }
}
