use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{
    config::SchedulerConfig,
    gate::AdmissionGate,
    registry::Registry,
    scheduler::{Inner, Scheduler},
};
use crate::{
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Scheduler`].
pub struct SchedulerBuilder {
    cfg: SchedulerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SchedulerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SchedulerConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (task lifecycle, failures, etc.)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one event subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Builds the scheduler.
    ///
    /// Initializes the event bus, the registry, the subscriber workers and,
    /// when `max_concurrent_roots > 0`, the root admission gate.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn build(self) -> Scheduler {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let gate = self
            .cfg
            .concurrency_limit()
            .map(|n| AdmissionGate::new(n, self.cfg.aging_step_clamped()));

        Scheduler::from_inner(
            Inner {
                cfg: self.cfg,
                bus,
                registry: Registry::new(),
                gate,
                runtime_token: CancellationToken::new(),
                listener_token: CancellationToken::new(),
                listener: Mutex::new(None),
            },
            subs,
        )
    }
}
