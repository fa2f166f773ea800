use crate::core::channels::{PulseMessage, PULSE};
use crate::core::plugin::{InitOptions, Plugin};
use crate::core::registry::{BusError, RegistryExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

/// Periodic tick carrying the store and chat client to time-driven plugins.
pub struct Pulse {
    interval: Duration,
}

impl Pulse {
    pub fn create(options: &InitOptions) -> Option<Arc<dyn Plugin>> {
        let secs = options.config.pulse_interval_secs.max(1);
        Some(Arc::new(Pulse::with_interval(Duration::from_secs(secs))))
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Plugin for Pulse {
    fn name(&self) -> &str {
        "pulse"
    }

    fn wire(self: Arc<Self>, options: &InitOptions) -> Result<(), BusError> {
        let subject = options.registry.register(&PULSE)?;
        let store = options.store.clone();
        let client = options.client.clone();
        let period = self.interval;

        tokio::spawn(async move {
            // First tick one full period from now.
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                subject.next(PulseMessage {
                    store: store.clone(),
                    chat_client: client.clone(),
                });
            }
        });

        info!("Pulse: ticking every {:?}", period);
        Ok(())
    }
}
