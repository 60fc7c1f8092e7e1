//! # devicevisor
//!
//! **Devicevisor** is the lifecycle orchestrator of a small embedded device.
//!
//! It brings five subsystem collaborators (I2C slave, GPIO, ADC, DAC and the
//! command delegate) up and down as a group, aggregates their confirmations,
//! answers the outside world with a single system-level confirmation, and
//! drives a periodic heartbeat output while the device is running.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!        ┌───────────────┐
//!        │ DeviceHandle  │  start(timeout) / stop(timeout) / wait_for(pred)
//!        └───────┬───────┘
//!                │ SystemStartReq / SystemStopReq           ▲ SystemStartCfm / SystemStopCfm
//!                ▼                                          │
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Bus (broadcast channel)                       │
//! │                 (capacity: Config::bus_capacity)                  │
//! └────┬─────────────────────────┬──────────────────────────┬─────────┘
//!      ▼                         ▼                          ▼
//! ┌──────────────────┐   ┌──────────────────────┐   ┌────────────────┐
//! │ OrchestratorRunner│  │ CollaboratorHost × 5 │   │ listener       │
//! │  Inbox (front     │  │  StartReq ─► start() │   │ SubscriberSet  │
//! │   lane + filter)  │  │  StopReq  ─► stop()  │   │  ├─ LogWriter  │
//! │  Orchestrator     │  │  ─► StartCfm/StopCfm │   │  └─ custom     │
//! │  heartbeat timer  │  └──────────────────────┘   └────────────────┘
//! │  phase deadline   │
//! └─────────┬─────────┘
//!           ▼
//!   watch::Sender<Snapshot> ──► DeviceHandle::snapshot()
//! ```
//!
//! ### Lifecycle
//! ```text
//! Stopped ── SystemStartReq ──► Starting ── 5 × StartCfm ok ──► Started (heartbeat)
//!                                  │                               │
//!                               failure                       SystemStopReq
//!                                  ▼                               ▼
//!                               Faulted ◄──── failure ───────── Stopping
//!                                                                  │
//! Stopped ◄── 5 × StopCfm ok (SystemStopCfm, then automatic start) ┘
//! ```
//!
//! ## Features
//! | Area               | Description                                                   | Key types / traits                           |
//! |--------------------|---------------------------------------------------------------|----------------------------------------------|
//! | **State machine**  | Pure orchestrator: states, phases, confirmation aggregation.  | [`Orchestrator`], [`State`], [`Effect`]      |
//! | **Runtime**        | Device wiring, timers, graceful shutdown.                     | [`Device`], [`DeviceBuilder`]                |
//! | **Requests**       | Post system requests and await their confirmations.           | [`DeviceHandle`]                             |
//! | **Collaborators**  | Implement a subsystem as an async trait or two closures.      | [`Collaborator`], [`CollaboratorFn`]         |
//! | **Messages**       | The bus contract.                                             | [`Message`], [`Signal`], [`Status`]          |
//! | **Buffers**        | Byte FIFOs shared with the serial-slave collaborators.        | [`ByteFifo`], [`FifoPair`]                   |
//! | **Subscriber API** | Observe every bus message.                                    | [`Subscribe`], [`SubscriberSet`]             |
//! | **Errors**         | Typed errors for the runtime and for callers.                 | [`RuntimeError`], [`RequestError`]           |
//! | **Configuration**  | Centralize runtime settings.                                  | [`Config`]                                   |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in `LogWriter` _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use devicevisor::{ready, Config, Device, State, Subsystem};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn devicevisor::Subscribe>> = vec![Arc::new(devicevisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn devicevisor::Subscribe>> = Vec::new();
//!
//!     let device = Device::builder(Config::default())
//!         .with_collaborators(Subsystem::ALL.into_iter().map(ready).collect())
//!         .with_subscribers(subs)
//!         .build();
//!     let handle = device.handle();
//!
//!     let token = CancellationToken::new();
//!     let run = tokio::spawn(device.run_until(token.clone()));
//!
//!     handle.start(Duration::from_secs(1)).await?;
//!     assert_eq!(handle.snapshot().state, State::Started);
//!
//!     token.cancel();
//!     run.await??;
//!     Ok(())
//! }
//! ```
mod buffers;
mod collaborators;
mod config;
mod core;
mod error;
mod events;
mod subscribers;

// ---- Public re-exports ----

pub use buffers::{ByteFifo, FifoPair, SharedFifo, MAX_ORDER};
pub use collaborators::{
    ready, Collaborator, CollaboratorFn, CollaboratorHost, CollaboratorRef, StartParams,
};
pub use config::Config;
pub use core::{Device, DeviceBuilder, DeviceHandle, Effect, Orchestrator, Snapshot, State};
pub use error::{FifoError, RequestError, RuntimeError};
pub use events::{Bus, ErrorCode, Fault, Message, Seq, Signal, Status, Subsystem};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::embedded::LogWriter;
