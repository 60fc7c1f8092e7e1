//! # Orchestrator runner: run-to-completion loop around the state machine.
//!
//! Owns the [`Orchestrator`] together with everything it needs from the
//! outside world: its [`Inbox`], the [`Bus`], the heartbeat timer, the phase
//! deadline and the state channel.
//!
//! ## Loop
//! ```text
//! init() ──► apply(effects)
//!
//! loop {
//!   ├─► front lane non-empty?   ──► dispatch(front message)      (priority)
//!   └─► select! (biased) {
//!         cancelled            ──► exit
//!         heartbeat.tick()     ──► dispatch(HeartbeatTick)
//!         deadline elapsed     ──► dispatch(PhaseTimeout)
//!         inbox.recv()         ──► dispatch(bus message)
//!       }
//!   apply(effects):
//!         Snapshot     ──► watch channel   (first)
//!         Publish      ──► Bus
//!         PostFront    ──► Inbox front lane
//!         Arm/Disarm   ──► heartbeat interval / deadline sleep
//! }
//! ```
//!
//! ## Rules
//! - Exactly one message is dispatched per iteration; the machine is never re-entered.
//! - Self-posted messages are drained before the next timer or bus message is looked at.
//! - Timers only exist while the machine asked for them.

use std::pin::Pin;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::core::inbox::Inbox;
use crate::core::machine::{Effect, Orchestrator, Snapshot};
use crate::error::RuntimeError;
use crate::events::{Bus, Message};

/// What woke the loop up.
enum Wake {
    Cancelled,
    Heartbeat,
    Deadline,
    Bus(Result<Message, RuntimeError>),
}

/// Runs one [`Orchestrator`] against a bus.
pub struct OrchestratorRunner {
    machine: Orchestrator,
    inbox: Inbox,
    bus: Bus,
    heartbeat: Option<Interval>,
    deadline: Option<Pin<Box<Sleep>>>,
    state_tx: Arc<watch::Sender<Snapshot>>,
}

impl OrchestratorRunner {
    /// Creates the runner and subscribes to the bus right away, so requests
    /// published after this call are never missed. `seq` is the device-wide
    /// sequence counter.
    pub fn new(
        cfg: &Config,
        bus: Bus,
        state_tx: Arc<watch::Sender<Snapshot>>,
        seq: Arc<AtomicU32>,
    ) -> Self {
        let inbox = Inbox::new("orchestrator", &bus, Orchestrator::subscriptions());
        Self {
            machine: Orchestrator::with_sequence(cfg, seq),
            inbox,
            bus,
            heartbeat: None,
            deadline: None,
            state_tx,
        }
    }

    /// Runs until `token` is cancelled or the bus closes.
    pub async fn run(mut self, token: CancellationToken) -> Result<(), RuntimeError> {
        let effects = self.machine.init();
        self.apply(effects);

        loop {
            if let Some(msg) = self.inbox.pop_front() {
                self.step(msg);
                continue;
            }

            let wake = tokio::select! {
                biased;
                _ = token.cancelled() => Wake::Cancelled,
                _ = next_tick(&mut self.heartbeat) => Wake::Heartbeat,
                _ = elapsed(&mut self.deadline) => Wake::Deadline,
                res = self.inbox.recv() => Wake::Bus(res),
            };

            match wake {
                Wake::Cancelled => {
                    info!(state = self.machine.state().as_str(), "orchestrator cancelled");
                    return Ok(());
                }
                Wake::Heartbeat => self.step(Message::HeartbeatTick),
                Wake::Deadline => {
                    self.deadline = None;
                    self.step(Message::PhaseTimeout);
                }
                Wake::Bus(res) => self.step(res?),
            }
        }
    }

    fn step(&mut self, msg: Message) {
        let effects = self.machine.dispatch(&msg);
        self.apply(effects);
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        // Snapshot goes out before any confirmation does.
        self.state_tx.send_replace(self.machine.snapshot());
        for effect in effects {
            match effect {
                Effect::Publish(msg) => self.bus.publish(msg),
                Effect::PostFront(msg) => self.inbox.post_front(msg),
                Effect::ArmHeartbeat { delay, period } => {
                    debug!(?delay, ?period, "heartbeat armed");
                    self.heartbeat = Some(heartbeat_interval(delay, period));
                }
                Effect::DisarmHeartbeat => {
                    debug!("heartbeat disarmed");
                    self.heartbeat = None;
                }
                Effect::ArmDeadline(d) => {
                    self.deadline = Some(Box::pin(time::sleep(d)));
                }
                Effect::DisarmDeadline => {
                    self.deadline = None;
                }
            }
        }
    }
}

fn heartbeat_interval(delay: Duration, period: Duration) -> Interval {
    let mut iv = time::interval_at(Instant::now() + delay, period);
    iv.set_missed_tick_behavior(MissedTickBehavior::Delay);
    iv
}

/// Completes on the next heartbeat; never completes while disarmed.
async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(iv) => {
            iv.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Completes when the phase deadline passes; never completes while disarmed.
async fn elapsed(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::machine::State;
    use crate::events::{ErrorCode, Status, Subsystem};
    use tokio::sync::broadcast;

    fn spawn_runner(
        cfg: Config,
    ) -> (
        Bus,
        watch::Receiver<Snapshot>,
        CancellationToken,
        tokio::task::JoinHandle<Result<(), RuntimeError>>,
    ) {
        let bus = Bus::new(256);
        let initial = Orchestrator::new(&cfg).snapshot();
        let (tx, rx) = watch::channel(initial);
        let runner = OrchestratorRunner::new(
            &cfg,
            bus.clone(),
            Arc::new(tx),
            Arc::new(AtomicU32::new(0)),
        );
        let token = CancellationToken::new();
        let join = tokio::spawn(runner.run(token.clone()));
        (bus, rx, token, join)
    }

    fn confirm_all_starts(bus: &Bus) {
        for s in Subsystem::ALL {
            bus.publish(Message::StartCfm {
                subsystem: s,
                seq: 0,
                status: Status::Success,
            });
        }
    }

    fn drain(rx: &mut broadcast::Receiver<Message>) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(m) = rx.try_recv() {
            out.push(m);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_fires_once_per_period() {
        let (bus, mut state, token, join) = spawn_runner(Config::default());
        let mut tap = bus.subscribe();

        bus.publish(Message::SystemStartReq { seq: 0 });
        confirm_all_starts(&bus);
        state
            .wait_for(|s| s.state == State::Started)
            .await
            .expect("started");
        drain(&mut tap);

        time::sleep(Duration::from_millis(4500)).await;
        let writes = drain(&mut tap)
            .into_iter()
            .filter(|m| matches!(m, Message::GpioWrite { channel: 0, value: 1 }))
            .count();
        assert_eq!(writes, 2);
        assert_eq!(state.borrow().state, State::Started);

        token.cancel();
        join.await.expect("join").expect("clean exit");
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_stops_when_leaving_started() {
        let (bus, mut state, token, join) = spawn_runner(Config::default());
        let mut tap = bus.subscribe();

        bus.publish(Message::SystemStartReq { seq: 0 });
        confirm_all_starts(&bus);
        state
            .wait_for(|s| s.state == State::Started)
            .await
            .expect("started");

        bus.publish(Message::SystemStopReq { seq: 1 });
        state
            .wait_for(|s| s.state == State::Stopping)
            .await
            .expect("stopping");
        drain(&mut tap);

        time::sleep(Duration::from_secs(10)).await;
        assert!(drain(&mut tap)
            .iter()
            .all(|m| !matches!(m, Message::GpioWrite { .. })));

        token.cancel();
        join.await.expect("join").expect("clean exit");
    }

    #[tokio::test(start_paused = true)]
    async fn auto_restart_is_processed_before_queued_requests() {
        let (bus, mut state, token, join) = spawn_runner(Config::default());
        let mut tap = bus.subscribe();

        bus.publish(Message::SystemStartReq { seq: 0 });
        confirm_all_starts(&bus);
        state
            .wait_for(|s| s.state == State::Started)
            .await
            .expect("started");
        drain(&mut tap);

        // All queued before the runner wakes: the stop behind the fifth
        // confirmation must wait for the self-posted restart.
        bus.publish(Message::SystemStopReq { seq: 1 });
        for s in Subsystem::ALL {
            bus.publish(Message::StopCfm {
                subsystem: s,
                status: Status::Success,
            });
        }
        bus.publish(Message::SystemStopReq { seq: 9 });

        state
            .wait_for(|s| s.state == State::Stopping && s.last_accepted_seq == 9)
            .await
            .expect("stopping again");

        let out: Vec<Message> = drain(&mut tap)
            .into_iter()
            .filter(|m| {
                matches!(
                    m,
                    Message::StartReq { .. }
                        | Message::StopReq { .. }
                        | Message::SystemStopCfm { .. }
                )
            })
            .collect();
        let first_cfm = out
            .iter()
            .position(|m| matches!(m, Message::SystemStopCfm { seq: 1, .. }))
            .expect("first stop confirmed");
        let restart = out
            .iter()
            .position(|m| matches!(m, Message::StartReq { seq: 2, .. }))
            .expect("restart fan-out");
        let second_stop = out
            .iter()
            .rposition(|m| matches!(m, Message::StopReq { .. }))
            .expect("second stop fan-out");

        assert!(first_cfm < restart && restart < second_stop, "{out:?}");
        assert_eq!(
            out.iter()
                .filter(|m| matches!(m, Message::StartReq { seq: 2, .. }))
                .count(),
            5
        );
        assert_eq!(
            out.iter()
                .filter(|m| matches!(m, Message::StopReq { .. }))
                .count(),
            10
        );
        // the queued stop was not answered from Stopped
        assert!(!out
            .iter()
            .any(|m| matches!(m, Message::SystemStopCfm { seq: 9, .. })));

        token.cancel();
        join.await.expect("join").expect("clean exit");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_faults_a_stalled_phase() {
        let cfg = Config {
            phase_timeout: Duration::from_millis(300),
            ..Config::default()
        };
        let (bus, mut state, token, join) = spawn_runner(cfg);
        let mut tap = bus.subscribe();

        bus.publish(Message::SystemStartReq { seq: 4 });
        let snap = state
            .wait_for(|s| s.state == State::Faulted)
            .await
            .expect("faulted")
            .clone();
        assert_eq!(snap.fault.map(|f| f.code), Some(ErrorCode::TIMEOUT));

        let reply = drain(&mut tap).into_iter().find_map(|m| match m {
            Message::SystemStartCfm { seq, status } => Some((seq, status)),
            _ => None,
        });
        assert!(matches!(reply, Some((4, Status::Failure { .. }))));

        token.cancel();
        join.await.expect("join").expect("clean exit");
    }

    #[tokio::test]
    async fn cancellation_exits_cleanly() {
        let (_bus, state, token, join) = spawn_runner(Config::default());
        tokio::task::yield_now().await;
        token.cancel();
        assert!(join.await.expect("join").is_ok());
        assert_eq!(state.borrow().state, State::Stopped);
    }
}
