//! # Orchestrator: the device lifecycle state machine.
//!
//! A flat, explicitly tagged hierarchical state machine. Every state handler
//! returns an [`Outcome`]; anything a substate leaves unhandled bubbles up to the
//! implicit Root superstate.
//!
//! ## States
//! ```text
//!                     ┌──────────────────── Root ─────────────────────────┐
//!                     │  SystemStopReq (unhandled below) ──► Stopping     │
//!                     │                                                   │
//!   init ──► Stopped ─┼─ SystemStartReq ──► Starting ── AllConfirmed ──► Started
//!              ▲      │                        │                          │
//!              │      │                    AnyFailed                 SystemStopReq
//!              │      │                        ▼                          ▼
//!              │      │                     Faulted ◄──── AnyFailed ── Stopping
//!              │      │                                                   │
//!              └──────┼──────── AllConfirmed (+ self-posted start) ───────┘
//!                     └───────────────────────────────────────────────────┘
//! ```
//!
//! ## Phases
//! Starting and Stopping are *phases*: on entry the confirmation counter is reset
//! and one request is published per subsystem (fan-out). Confirmations are
//! counted by [`Orchestrator::handle_confirmation`]; the phase closes on the
//! first failure or when the count reaches the expected cardinality. Closing
//! posts `AllConfirmed` or `AnyFailed` to the **front** of the orchestrator's own
//! queue, so the outcome is acted on before any other pending message.
//!
//! ## Rules
//! - The machine never performs I/O: every externally visible action is returned
//!   as an [`Effect`] and applied by the runner.
//! - One message is processed to completion per [`Orchestrator::dispatch`] call.
//! - Sequence numbers come from one counter shared with every
//!   [`DeviceHandle`](crate::DeviceHandle): system requests, the start fan-out
//!   and the auto-restart request never get the same number.
//! - A completed stop phase always self-posts a start request.
//! - There is no deadline on a phase unless [`Config::phase_timeout`] is set, and
//!   confirmations are not matched against their request unless
//!   [`Config::correlate_sequences`] is set.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::buffers::FifoPair;
use crate::config::Config;
use crate::events::{ErrorCode, Fault, Message, Seq, Signal, Status, Subsystem};

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Stopped,
    Starting,
    Started,
    Stopping,
    /// Terminal: a phase failed. Every later request is refused with the recorded fault.
    Faulted,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Stopped => "stopped",
            State::Starting => "starting",
            State::Started => "started",
            State::Stopping => "stopping",
            State::Faulted => "faulted",
        }
    }

    /// True while confirmations are being aggregated.
    #[inline]
    pub fn is_phase(&self) -> bool {
        matches!(self, State::Starting | State::Stopping)
    }
}

/// Side effect requested by the machine, applied by the runner in order.
#[derive(Debug)]
pub enum Effect {
    /// Broadcast on the device bus.
    Publish(Message),
    /// Push to the front of the orchestrator's own queue.
    PostFront(Message),
    /// Start the periodic heartbeat timer.
    ArmHeartbeat { delay: Duration, period: Duration },
    /// Stop the periodic heartbeat timer.
    DisarmHeartbeat,
    /// Start the phase deadline.
    ArmDeadline(Duration),
    /// Cancel the phase deadline.
    DisarmDeadline,
}

/// Point-in-time view of the orchestrator, published after every step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub state: State,
    /// Confirmations counted in the most recent phase. Reset when a phase is
    /// entered, not when it completes: in `Started` it still reads the count
    /// of the start phase that got there.
    pub confirmations: usize,
    /// Next number the shared sequence counter will hand out.
    pub next_seq: Seq,
    pub last_accepted_seq: Seq,
    pub fault: Option<Fault>,
}

/// Result of offering a message to one state handler.
enum Outcome {
    Handled,
    Transition(State),
    Unhandled,
}

/// The device lifecycle state machine.
pub struct Orchestrator {
    state: State,
    initialized: bool,

    confirmations: usize,
    phase_open: bool,
    phase_seq: Option<Seq>,
    seq: Arc<AtomicU32>,
    last_accepted_seq: Seq,
    fault: Option<Fault>,

    fifos: FifoPair,

    expected: usize,
    heartbeat: Option<(Duration, Duration)>,
    heartbeat_channel: u8,
    heartbeat_value: u8,
    deadline: Option<Duration>,
    correlate: bool,

    effects: Vec<Effect>,
}

impl Orchestrator {
    /// Creates the machine in `Stopped` with freshly allocated FIFOs and its
    /// own sequence counter starting at zero.
    pub fn new(cfg: &Config) -> Self {
        Self::with_sequence(cfg, Arc::new(AtomicU32::new(0)))
    }

    /// Creates the machine drawing sequence numbers from `seq`, the counter
    /// its device handles also draw from.
    pub fn with_sequence(cfg: &Config, seq: Arc<AtomicU32>) -> Self {
        Self {
            state: State::Stopped,
            initialized: false,
            confirmations: 0,
            phase_open: false,
            phase_seq: None,
            seq,
            last_accepted_seq: 0,
            fault: None,
            fifos: FifoPair::with_order(cfg.fifo_order_clamped()),
            expected: cfg.expected_confirmations,
            heartbeat: cfg.heartbeat(),
            heartbeat_channel: cfg.heartbeat_channel,
            heartbeat_value: cfg.heartbeat_value,
            deadline: cfg.phase_deadline(),
            correlate: cfg.correlate_sequences,
            effects: Vec::new(),
        }
    }

    /// Signals the orchestrator receives from the bus.
    pub fn subscriptions() -> Vec<Signal> {
        let mut sigs = vec![
            Signal::SystemStartReq,
            Signal::SystemStopReq,
            Signal::HeartbeatTick,
        ];
        for s in Subsystem::ALL {
            sigs.push(Signal::StartCfm(s));
            sigs.push(Signal::StopCfm(s));
        }
        sigs
    }

    /// Performs the initial transition (Root → Stopped). Idempotent.
    pub fn init(&mut self) -> Vec<Effect> {
        self.ensure_init();
        std::mem::take(&mut self.effects)
    }

    /// Processes one message to completion and returns the resulting effects.
    pub fn dispatch(&mut self, msg: &Message) -> Vec<Effect> {
        self.ensure_init();
        debug!(state = self.state.as_str(), signal = ?msg.signal(), "dispatch");

        let mut outcome = match self.state {
            State::Stopped => self.on_stopped(msg),
            State::Starting => self.on_starting(msg),
            State::Started => self.on_started(msg),
            State::Stopping => self.on_stopping(msg),
            State::Faulted => self.on_faulted(msg),
        };
        if matches!(outcome, Outcome::Unhandled) {
            outcome = self.on_root(msg);
        }

        match outcome {
            Outcome::Handled => {}
            Outcome::Transition(target) => self.transition(target),
            Outcome::Unhandled => {
                debug!(state = self.state.as_str(), signal = ?msg.signal(), "ignored");
            }
        }
        std::mem::take(&mut self.effects)
    }

    /// Aggregates one confirmation of the current phase.
    ///
    /// - success: counts it; at `expected` posts `AllConfirmed` to the front
    /// - failure: posts `AnyFailed` to the front and stops counting
    ///
    /// At most one of the two is posted per phase; anything arriving after the
    /// phase closed is ignored.
    pub fn handle_confirmation(&mut self, cfm: &Message, expected: usize) {
        let Some(status) = cfm.status() else {
            return;
        };
        let subsystem = cfm.subsystem();
        if !self.phase_open {
            warn!(?subsystem, state = self.state.as_str(), "confirmation after phase closed; ignored");
            return;
        }

        match status {
            Status::Success => {
                self.confirmations += 1;
                debug!(?subsystem, count = self.confirmations, expected, "confirmed");
                if self.confirmations == expected {
                    self.phase_open = false;
                    self.post_front(Message::AllConfirmed);
                }
            }
            Status::Failure { code, reason } => {
                self.phase_open = false;
                warn!(?subsystem, %code, %reason, "confirmation failed; aborting phase");
                self.post_front(Message::AnyFailed(Fault {
                    subsystem,
                    code: *code,
                    reason: reason.clone(),
                }));
            }
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn confirmations(&self) -> usize {
        self.confirmations
    }

    pub fn next_seq(&self) -> Seq {
        self.seq.load(Ordering::Relaxed)
    }

    pub fn last_accepted_seq(&self) -> Seq {
        self.last_accepted_seq
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// The serial-slave FIFOs handed to the I2C slave and the delegate.
    pub fn fifos(&self) -> &FifoPair {
        &self.fifos
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            confirmations: self.confirmations,
            next_seq: self.next_seq(),
            last_accepted_seq: self.last_accepted_seq,
            fault: self.fault.clone(),
        }
    }

    // ---- state handlers ----

    fn on_root(&mut self, msg: &Message) -> Outcome {
        match msg {
            Message::SystemStopReq { seq } => {
                info!(seq, from = self.state.as_str(), "stop requested");
                self.last_accepted_seq = *seq;
                Outcome::Transition(State::Stopping)
            }
            _ => Outcome::Unhandled,
        }
    }

    fn on_stopped(&mut self, msg: &Message) -> Outcome {
        match msg {
            Message::SystemStopReq { seq } => {
                self.publish(Message::SystemStopCfm {
                    seq: *seq,
                    status: Status::Success,
                });
                Outcome::Handled
            }
            Message::SystemStartReq { seq } => {
                self.last_accepted_seq = *seq;
                Outcome::Transition(State::Starting)
            }
            _ => Outcome::Unhandled,
        }
    }

    fn on_starting(&mut self, msg: &Message) -> Outcome {
        match msg {
            Message::StartCfm { subsystem, seq, .. } => {
                if self.correlate && self.phase_seq != Some(*seq) {
                    warn!(%subsystem, seq, expected = ?self.phase_seq, "start confirmation for another request; dropped");
                    return Outcome::Handled;
                }
                self.handle_confirmation(msg, self.expected);
                Outcome::Handled
            }
            Message::AllConfirmed => {
                self.publish(Message::SystemStartCfm {
                    seq: self.last_accepted_seq,
                    status: Status::Success,
                });
                Outcome::Transition(State::Started)
            }
            Message::AnyFailed(fault) => self.fail_phase(fault),
            Message::PhaseTimeout => {
                self.expire_phase();
                Outcome::Handled
            }
            _ => Outcome::Unhandled,
        }
    }

    fn on_started(&mut self, msg: &Message) -> Outcome {
        match msg {
            Message::HeartbeatTick => {
                self.publish(Message::GpioWrite {
                    channel: self.heartbeat_channel,
                    value: self.heartbeat_value,
                });
                Outcome::Handled
            }
            _ => Outcome::Unhandled,
        }
    }

    fn on_stopping(&mut self, msg: &Message) -> Outcome {
        match msg {
            Message::StopCfm { .. } => {
                self.handle_confirmation(msg, self.expected);
                Outcome::Handled
            }
            Message::AllConfirmed => {
                self.publish(Message::SystemStopCfm {
                    seq: self.last_accepted_seq,
                    status: Status::Success,
                });
                let seq = self.alloc_seq();
                info!(seq, "stop complete; restarting");
                self.post_front(Message::SystemStartReq { seq });
                Outcome::Transition(State::Stopped)
            }
            Message::AnyFailed(fault) => self.fail_phase(fault),
            Message::PhaseTimeout => {
                self.expire_phase();
                Outcome::Handled
            }
            _ => Outcome::Unhandled,
        }
    }

    fn on_faulted(&mut self, msg: &Message) -> Outcome {
        let status = match &self.fault {
            Some(fault) => fault.to_status(),
            None => Status::failure(ErrorCode::FAULTED, "faulted"),
        };
        match msg {
            Message::SystemStartReq { seq } => {
                self.publish(Message::SystemStartCfm { seq: *seq, status });
            }
            Message::SystemStopReq { seq } => {
                self.publish(Message::SystemStopCfm { seq: *seq, status });
            }
            _ => {}
        }
        // Swallow everything: Root must not turn a stop into a new phase.
        Outcome::Handled
    }

    // ---- transitions ----

    fn transition(&mut self, target: State) {
        let from = self.state;
        self.exit(from);
        info!(from = from.as_str(), to = target.as_str(), "transition");
        self.state = target;
        self.enter(target);
    }

    fn enter(&mut self, state: State) {
        info!(state = state.as_str(), "enter");
        match state {
            State::Stopped => {}
            State::Starting => {
                let seq = self.alloc_seq();
                self.phase_seq = Some(seq);
                self.open_phase();
                for subsystem in Subsystem::ALL {
                    let fifos = subsystem.uses_fifos().then(|| self.fifos.clone());
                    self.publish(Message::StartReq {
                        subsystem,
                        seq,
                        fifos,
                    });
                }
            }
            State::Started => {
                if let Some((delay, period)) = self.heartbeat {
                    self.effects.push(Effect::ArmHeartbeat { delay, period });
                }
            }
            State::Stopping => {
                self.phase_seq = None;
                self.open_phase();
                for subsystem in Subsystem::ALL {
                    self.publish(Message::StopReq { subsystem });
                }
            }
            State::Faulted => {
                if let Some(fault) = &self.fault {
                    error!(%fault, "orchestrator faulted");
                }
            }
        }
    }

    fn exit(&mut self, state: State) {
        info!(state = state.as_str(), "exit");
        match state {
            State::Started if self.heartbeat.is_some() => {
                self.effects.push(Effect::DisarmHeartbeat);
            }
            State::Starting | State::Stopping if self.deadline.is_some() => {
                self.effects.push(Effect::DisarmDeadline);
            }
            _ => {}
        }
    }

    // ---- helpers ----

    fn ensure_init(&mut self) {
        if !self.initialized {
            self.initialized = true;
            info!(state = "root", "enter");
            self.enter(State::Stopped);
        }
    }

    fn open_phase(&mut self) {
        self.confirmations = 0;
        self.phase_open = true;
        if let Some(d) = self.deadline {
            self.effects.push(Effect::ArmDeadline(d));
        }
        if self.expected == 0 {
            self.phase_open = false;
            self.post_front(Message::AllConfirmed);
        }
    }

    /// Replies to the requester with the failure and parks in `Faulted`.
    fn fail_phase(&mut self, fault: &Fault) -> Outcome {
        let seq = self.last_accepted_seq;
        let status = fault.to_status();
        let reply = match self.state {
            State::Starting => Message::SystemStartCfm { seq, status },
            _ => Message::SystemStopCfm { seq, status },
        };
        self.publish(reply);
        self.fault = Some(fault.clone());
        Outcome::Transition(State::Faulted)
    }

    fn expire_phase(&mut self) {
        if !self.phase_open {
            return;
        }
        self.phase_open = false;
        let reason = format!(
            "{}/{} confirmations after {:?}",
            self.confirmations,
            self.expected,
            self.deadline.unwrap_or_default()
        );
        warn!(state = self.state.as_str(), %reason, "phase deadline expired");
        self.post_front(Message::AnyFailed(Fault {
            subsystem: None,
            code: ErrorCode::TIMEOUT,
            reason: reason.into(),
        }));
    }

    /// Sequence numbers wrap after `u32::MAX` requests.
    fn alloc_seq(&mut self) -> Seq {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    fn publish(&mut self, msg: Message) {
        self.effects.push(Effect::Publish(msg));
    }

    fn post_front(&mut self, msg: Message) {
        self.effects.push(Effect::PostFront(msg));
    }
}
