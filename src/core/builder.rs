use std::collections::HashSet;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use super::{device::Device, machine::Orchestrator, runner::OrchestratorRunner};
use crate::{
    collaborators::{CollaboratorHost, CollaboratorRef},
    config::Config,
    events::{Bus, Subsystem},
    subscribers::Subscribe,
};

/// Builder for constructing a [`Device`].
pub struct DeviceBuilder {
    cfg: Config,
    collaborators: Vec<CollaboratorRef>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl Device {
    /// Starts building a device with the given configuration.
    pub fn builder(cfg: Config) -> DeviceBuilder {
        DeviceBuilder::new(cfg)
    }
}

impl DeviceBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            collaborators: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Sets the subsystem collaborators (one per [`Subsystem`]).
    pub fn with_collaborators(mut self, collaborators: Vec<CollaboratorRef>) -> Self {
        self.collaborators = collaborators;
        self
    }

    /// Adds a single collaborator.
    pub fn with_collaborator(mut self, collaborator: CollaboratorRef) -> Self {
        self.collaborators.push(collaborator);
        self
    }

    /// Sets bus subscribers for observability.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the device.
    ///
    /// Every component subscribes to the bus here, before anything can be
    /// published. A second collaborator for an already covered subsystem is
    /// dropped with a warning; missing subsystems are only warned about, since
    /// the phases would then wait for confirmations that never come.
    pub fn build(self) -> Device {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());

        let mut covered = HashSet::new();
        let mut hosts = Vec::with_capacity(self.collaborators.len());
        for collab in self.collaborators {
            let subsystem = collab.subsystem();
            if !covered.insert(subsystem) {
                warn!(%subsystem, "duplicate collaborator ignored");
                continue;
            }
            hosts.push(CollaboratorHost::new(collab, bus.clone()));
        }
        for subsystem in Subsystem::ALL {
            if !covered.contains(&subsystem) {
                warn!(%subsystem, "no collaborator; its confirmations will never arrive");
            }
        }
        if hosts.len() != self.cfg.expected_confirmations {
            warn!(
                hosts = hosts.len(),
                expected = self.cfg.expected_confirmations,
                "collaborator count differs from expected confirmations"
            );
        }

        let seq = Arc::new(AtomicU32::new(0));
        let (state_tx, _) = watch::channel(Orchestrator::new(&self.cfg).snapshot());
        let state_tx = Arc::new(state_tx);
        let runner = OrchestratorRunner::new(
            &self.cfg,
            bus.clone(),
            Arc::clone(&state_tx),
            Arc::clone(&seq),
        );

        let listener = if self.subscribers.is_empty() {
            None
        } else {
            Some((bus.subscribe(), self.subscribers))
        };

        Device {
            cfg: self.cfg,
            bus,
            runner,
            hosts,
            listener,
            state_tx,
            seq,
        }
    }
}
