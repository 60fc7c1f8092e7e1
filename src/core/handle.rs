//! # DeviceHandle: the outward request/confirmation surface.
//!
//! A cheap, cloneable handle for posting system start/stop requests and
//! observing the orchestrator's [`Snapshot`].
//!
//! ## Request flow
//! ```text
//! start(timeout):
//!   seq = next()                             (device-wide counter, shared with the orchestrator)
//!   Bus.subscribe()                          (before publishing: no lost reply)
//!   Bus.publish(SystemStartReq{seq})
//!   await SystemStartCfm{seq, status}        (bounded by timeout)
//!     ├─ Success  → Ok(seq)
//!     └─ Failure  → Err(RequestError::Rejected{status})
//! ```
//!
//! ## Caveats
//! A start request is ignored (never confirmed) while the device is already
//! starting, started or stopping; [`DeviceHandle::start`] then ends in
//! [`RequestError::Timeout`]. The same applies to a stop request that is
//! overtaken by a newer one.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::core::machine::Snapshot;
use crate::error::RequestError;
use crate::events::{Bus, Message, Seq, Status};

/// Handle to a running [`Device`](crate::Device).
#[derive(Clone)]
pub struct DeviceHandle {
    bus: Bus,
    state: watch::Receiver<Snapshot>,
    seq: Arc<AtomicU32>,
}

#[derive(Clone, Copy)]
enum Kind {
    Start,
    Stop,
}

impl DeviceHandle {
    pub(crate) fn new(bus: Bus, state: watch::Receiver<Snapshot>, seq: Arc<AtomicU32>) -> Self {
        Self { bus, state, seq }
    }

    /// Draws from the same counter as the orchestrator's fan-out and restart.
    fn next_seq(&self) -> Seq {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Publishes a system start request without waiting; returns its sequence.
    pub fn post_start(&self) -> Seq {
        let seq = self.next_seq();
        self.bus.publish(Message::SystemStartReq { seq });
        seq
    }

    /// Publishes a system stop request without waiting; returns its sequence.
    pub fn post_stop(&self) -> Seq {
        let seq = self.next_seq();
        self.bus.publish(Message::SystemStopReq { seq });
        seq
    }

    /// Requests a system start and waits for its confirmation.
    pub async fn start(&self, timeout: Duration) -> Result<Seq, RequestError> {
        self.request(Kind::Start, timeout).await
    }

    /// Requests a system stop and waits for its confirmation.
    ///
    /// A successful stop is immediately followed by an automatic restart;
    /// use [`DeviceHandle::wait_for`] to observe it.
    pub async fn stop(&self, timeout: Duration) -> Result<Seq, RequestError> {
        self.request(Kind::Stop, timeout).await
    }

    async fn request(&self, kind: Kind, timeout: Duration) -> Result<Seq, RequestError> {
        let mut rx = self.bus.subscribe();
        let seq = match kind {
            Kind::Start => self.post_start(),
            Kind::Stop => self.post_stop(),
        };
        debug!(seq, "system request posted");

        let status = tokio::time::timeout(timeout, await_cfm(&mut rx, kind, seq))
            .await
            .map_err(|_| RequestError::Timeout { timeout })??;

        match status {
            Status::Success => Ok(seq),
            status => Err(RequestError::Rejected { status }),
        }
    }

    /// Latest published orchestrator snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    /// Waits until the snapshot satisfies `pred` and returns it.
    ///
    /// Fails with [`RequestError::Closed`] once the device has stopped running.
    pub async fn wait_for<P>(&self, mut pred: P) -> Result<Snapshot, RequestError>
    where
        P: FnMut(&Snapshot) -> bool,
    {
        let mut rx = self.state.clone();
        let snap = rx
            .wait_for(|s| pred(s))
            .await
            .map_err(|_| RequestError::Closed)?;
        Ok(snap.clone())
    }

    /// A raw bus receiver, for observing outward messages.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.bus.subscribe()
    }
}

async fn await_cfm(
    rx: &mut broadcast::Receiver<Message>,
    kind: Kind,
    want: Seq,
) -> Result<Status, RequestError> {
    loop {
        let msg = match rx.recv().await {
            Ok(msg) => msg,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return Err(RequestError::Closed),
        };
        match (kind, msg) {
            (Kind::Start, Message::SystemStartCfm { seq, status })
            | (Kind::Stop, Message::SystemStopCfm { seq, status })
                if seq == want =>
            {
                return Ok(status)
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::machine::Orchestrator;
    use crate::events::ErrorCode;

    fn detached() -> (DeviceHandle, Bus, watch::Sender<Snapshot>) {
        let bus = Bus::new(16);
        let (tx, rx) = watch::channel(Orchestrator::new(&Config::default()).snapshot());
        let handle = DeviceHandle::new(bus.clone(), rx, Arc::new(AtomicU32::new(0)));
        (handle, bus, tx)
    }

    #[tokio::test]
    async fn post_allocates_increasing_sequences() {
        let (h, bus, _tx) = detached();
        let mut tap = bus.subscribe();
        assert_eq!(h.post_start(), 0);
        assert_eq!(h.post_stop(), 1);
        assert!(matches!(
            tap.recv().await.expect("recv"),
            Message::SystemStartReq { seq: 0 }
        ));
        assert!(matches!(
            tap.recv().await.expect("recv"),
            Message::SystemStopReq { seq: 1 }
        ));
    }

    #[tokio::test]
    async fn rejected_carries_the_failure_status() {
        let (h, bus, _tx) = detached();
        let mut tap = bus.subscribe();
        let responder = tokio::spawn(async move {
            loop {
                if let Ok(Message::SystemStopReq { seq }) = tap.recv().await {
                    bus.publish(Message::SystemStopCfm {
                        seq: seq.wrapping_add(100),
                        status: Status::Success,
                    });
                    bus.publish(Message::SystemStopCfm {
                        seq,
                        status: Status::failure(ErrorCode(3), "adc stuck"),
                    });
                    return;
                }
            }
        });

        let err = h.stop(Duration::from_secs(1)).await.expect_err("rejected");
        match err {
            RequestError::Rejected { status } => assert_eq!(status.code(), Some(ErrorCode(3))),
            other => panic!("unexpected {other:?}"),
        }
        responder.await.expect("responder");
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out() {
        let (h, _bus, _tx) = detached();
        let err = h
            .start(Duration::from_millis(50))
            .await
            .expect_err("no reply");
        assert_eq!(err.as_label(), "request_timeout");
    }

    #[tokio::test]
    async fn wait_for_fails_once_device_is_gone() {
        let (h, _bus, tx) = detached();
        drop(tx);
        let err = h
            .wait_for(|s| s.confirmations == 99)
            .await
            .expect_err("closed");
        assert!(matches!(err, RequestError::Closed));
    }
}
