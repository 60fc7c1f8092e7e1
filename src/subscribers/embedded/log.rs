//! # LogWriter: bus message printer
//!
//! A minimal subscriber that renders every bus [`Message`] as a `tracing`
//! event. Use it for bring-up, tests or demos.
//!
//! ## Example output
//! ```text
//! INFO [system-start-req] seq=0
//! INFO [start-req] subsystem=dac seq=0 fifos=false
//! INFO [start-cfm] subsystem=dac seq=0 status=success
//! INFO [system-start-cfm] seq=0 status=success
//! INFO [gpio-write] channel=0 value=1
//! WARN [stop-cfm] subsystem=adc status=failure code=0x0003 reason=stuck
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Message, Status};
use crate::subscribers::Subscribe;

/// Message writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn emit_status(tag: &str, status: &Status, line: String) {
    if status.is_success() {
        info!("[{tag}] {line} status={status}");
    } else {
        warn!("[{tag}] {line} status={status}");
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_message(&self, m: &Message) {
        match m {
            Message::SystemStartReq { seq } => info!("[system-start-req] seq={seq}"),
            Message::SystemStopReq { seq } => info!("[system-stop-req] seq={seq}"),
            Message::SystemStartCfm { seq, status } => {
                emit_status("system-start-cfm", status, format!("seq={seq}"))
            }
            Message::SystemStopCfm { seq, status } => {
                emit_status("system-stop-cfm", status, format!("seq={seq}"))
            }
            Message::StartReq {
                subsystem,
                seq,
                fifos,
            } => info!(
                "[start-req] subsystem={subsystem} seq={seq} fifos={}",
                fifos.is_some()
            ),
            Message::StopReq { subsystem } => info!("[stop-req] subsystem={subsystem}"),
            Message::StartCfm {
                subsystem,
                seq,
                status,
            } => emit_status(
                "start-cfm",
                status,
                format!("subsystem={subsystem} seq={seq}"),
            ),
            Message::StopCfm { subsystem, status } => {
                emit_status("stop-cfm", status, format!("subsystem={subsystem}"))
            }
            Message::GpioWrite { channel, value } => {
                info!("[gpio-write] channel={channel} value={value}")
            }
            Message::HeartbeatTick => info!("[heartbeat-tick]"),
            // Refused by the bus; kept for exhaustiveness.
            Message::AllConfirmed
            | Message::AnyFailed(_)
            | Message::PhaseTimeout => info!("[internal] {:?}", m.signal()),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
