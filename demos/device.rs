//! # Example: Device bring-up
//!
//! Wires the five subsystems to a device, starts it, lets the heartbeat run,
//! stops it (which restarts it automatically) and shuts down.
//!
//! The I2C slave pushes a byte into the outbound FIFO on start; the delegate
//! drains the same FIFO pair when it starts, showing that both share it.
//!
//! Run with:
//! ```text
//! DEVICEVISOR_LOG=debug cargo run --example device --features logging
//! ```

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use devicevisor::{
    ready, CollaboratorFn, CollaboratorRef, Config, Device, LogWriter, StartParams, State, Status,
    Subscribe, Subsystem,
};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("DEVICEVISOR_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn i2c_slave() -> CollaboratorRef {
    CollaboratorFn::arc(
        Subsystem::I2cSlave,
        |p: StartParams| async move {
            if let Some(fifos) = p.fifos {
                if let Ok(mut out) = fifos.outbound.lock() {
                    out.write(b"hi");
                }
            }
            Status::Success
        },
        || async { Status::Success },
    )
}

fn delegate() -> CollaboratorRef {
    CollaboratorFn::arc(
        Subsystem::Delegate,
        |p: StartParams| async move {
            // Give the I2C slave a moment to fill the queue.
            tokio::time::sleep(Duration::from_millis(10)).await;
            if let Some(fifos) = p.fifos {
                let mut buf = [0u8; 16];
                let n = fifos.outbound.lock().map(|mut f| f.read(&mut buf)).unwrap_or(0);
                tracing::info!(seq = p.seq, bytes = n, "delegate drained outbound fifo");
            }
            Status::Success
        },
        || async { Status::Success },
    )
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cfg = Config {
        heartbeat_delay: Duration::from_millis(200),
        heartbeat_period: Duration::from_millis(200),
        phase_timeout: Duration::from_secs(2),
        ..Config::default()
    };

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let device = Device::builder(cfg)
        .with_collaborators(vec![
            delegate(),
            i2c_slave(),
            ready(Subsystem::Dac),
            ready(Subsystem::Adc),
            ready(Subsystem::Gpio),
        ])
        .with_subscribers(subs)
        .build();
    let handle = device.handle();

    let token = CancellationToken::new();
    let run = tokio::spawn(device.run_until(token.clone()));

    let seq = handle.start(Duration::from_secs(1)).await?;
    tracing::info!(seq, "device started");

    tokio::time::sleep(Duration::from_millis(700)).await;

    let seq = handle.stop(Duration::from_secs(1)).await?;
    tracing::info!(seq, "device stopped; waiting for the automatic restart");
    let snap = handle.wait_for(|s| s.state == State::Started).await?;
    tracing::info!(next_seq = snap.next_seq, "device restarted");

    token.cancel();
    run.await??;
    Ok(())
}
