//! Simulated Feed
//!
//! Emulates a push channel: once connected, every `period` a snapshot for a
//! randomly chosen protocol is generated and handed to the subscriber.
//!
//! # States
//! ```text
//! Idle --connect(sub)--> Active --disconnect()--> Idle
//!                          |
//!                          +--connect(sub)--> Err(AlreadyActive)
//! ```
//!
//! Delivery is synchronous inside the tick. There is no buffering. The
//! subscriber is dropped by `disconnect`, before the tick task is aborted.
//! A zero period is rejected with `InvalidPeriod`.

use crate::{
    error::FeedError,
    generator::MetricsGenerator,
    random::RandomSource,
    types::ProtocolMetrics,
};
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info};

/// Default tick period
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Time between two deliveries
    pub period: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
        }
    }
}

type Subscriber = Box<dyn FnMut(ProtocolMetrics) + Send>;

/// Subscriber slot shared between the feed handle and its tick task.
/// `disconnect` empties it under the lock, so once it returns no delivery
/// is in progress and none will start.
type SubscriberSlot = Arc<Mutex<Option<Subscriber>>>;

/// Timer-driven snapshot feed owning its own random source
pub struct SimulatedFeed<R: RandomSource + 'static = StdRng> {
    config: FeedConfig,
    generator: Arc<Mutex<MetricsGenerator<R>>>,
    subscriber: Option<SubscriberSlot>,
    task: Option<JoinHandle<()>>,
}

impl SimulatedFeed<StdRng> {
    /// Feed with an entropy-seeded generator
    pub fn new(config: FeedConfig) -> Self {
        Self::with_generator(config, MetricsGenerator::from_entropy())
    }
}

impl<R: RandomSource + 'static> SimulatedFeed<R> {
    pub fn with_generator(config: FeedConfig, generator: MetricsGenerator<R>) -> Self {
        Self {
            config,
            generator: Arc::new(Mutex::new(generator)),
            subscriber: None,
            task: None,
        }
    }

    /// Start ticking and deliver every snapshot to `subscriber`.
    ///
    /// The first delivery happens one full period after this call.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// - [`FeedError::InvalidPeriod`] if the configured period is zero.
    /// - [`FeedError::AlreadyActive`] if a subscription is running; the
    ///   running subscription is left untouched.
    pub fn connect<F>(&mut self, subscriber: F) -> Result<(), FeedError>
    where
        F: FnMut(ProtocolMetrics) + Send + 'static,
    {
        if self.config.period.is_zero() {
            return Err(FeedError::InvalidPeriod);
        }
        if self.is_active() {
            return Err(FeedError::AlreadyActive);
        }

        let period = self.config.period;
        let start = Instant::now() + period;
        let generator = Arc::clone(&self.generator);
        let subscriber: Subscriber = Box::new(subscriber);
        let slot = Arc::new(Mutex::new(Some(subscriber)));
        let task_slot = Arc::clone(&slot);

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(start, period);

            loop {
                ticker.tick().await;

                let snapshot = {
                    let mut generator = generator.lock().unwrap_or_else(|e| e.into_inner());
                    let protocol = generator.pick_protocol();
                    generator.protocol_metrics(protocol.as_str())
                };

                debug!("Feed tick for {}", snapshot.protocol);

                let delivered = {
                    let mut slot = task_slot.lock().unwrap_or_else(|e| e.into_inner());
                    match slot.as_mut() {
                        Some(deliver) => {
                            deliver(snapshot);
                            true
                        }
                        None => false,
                    }
                };

                if !delivered {
                    break;
                }
            }
        });

        self.subscriber = Some(slot);
        self.task = Some(handle);
        info!("Simulated feed connected (period: {:?})", period);
        Ok(())
    }

    /// Stop ticking and drop the subscriber. No-op when idle.
    ///
    /// Waits for a delivery already running on another worker to finish;
    /// after this returns the subscriber is never called again.
    pub fn disconnect(&mut self) {
        if let Some(slot) = self.subscriber.take() {
            slot.lock().unwrap_or_else(|e| e.into_inner()).take();
        }
        if let Some(handle) = self.task.take() {
            handle.abort();
            info!("Simulated feed disconnected");
        }
    }

    pub fn is_active(&self) -> bool {
        self.task
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn period(&self) -> Duration {
        self.config.period
    }
}

impl<R: RandomSource + 'static> Drop for SimulatedFeed<R> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
