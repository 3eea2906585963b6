//! Periodic liveness pings.
//!
//! The scheduler follows the shared setting: it idles while the heartbeat is
//! disabled and restarts its timer whenever the heartbeat section changes.

use std::sync::Arc;

use mah_config::{HeartBeat, HeartbeatPayload, Setting};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::fanout::{DeliveryReport, fan_out};
use crate::transport::Transport;

/// Build the JSON body for one ping. `extraBody` entries override the base fields.
pub fn ping_body(payload: &HeartbeatPayload<'_>, timestamp_ms: i64) -> Value {
    let mut body = Map::new();
    body.insert("type".to_string(), Value::from("heartbeat"));
    body.insert("timestamp".to_string(), Value::from(timestamp_ms));
    for (key, value) in payload.extra_body {
        body.insert(key.clone(), Value::from(value.as_str()));
    }
    Value::Object(body)
}

pub struct HeartbeatScheduler {
    settings: watch::Receiver<Arc<Setting>>,
    transport: Arc<dyn Transport>,
}

enum CycleEnd {
    Restart,
    Shutdown,
}

impl HeartbeatScheduler {
    pub fn new(settings: watch::Receiver<Arc<Setting>>, transport: Arc<dyn Transport>) -> Self {
        Self {
            settings,
            transport,
        }
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            let heartbeat = self.settings.borrow_and_update().heartbeat.clone();
            let end = if heartbeat.is_enabled() {
                self.run_cycle(heartbeat, &mut shutdown).await
            } else {
                debug!("heartbeat disabled, idling");
                self.wait_for_change(&mut shutdown).await
            };
            if matches!(end, CycleEnd::Shutdown) {
                break;
            }
        }
        info!("heartbeat scheduler stopped");
    }

    async fn wait_for_change(&mut self, shutdown: &mut watch::Receiver<bool>) -> CycleEnd {
        tokio::select! {
            changed = self.settings.changed() => match changed {
                Ok(()) => CycleEnd::Restart,
                Err(_) => CycleEnd::Shutdown,
            },
            _ = shutdown.changed() => CycleEnd::Shutdown,
        }
    }

    async fn run_cycle(
        &mut self,
        heartbeat: HeartBeat,
        shutdown: &mut watch::Receiver<bool>,
    ) -> CycleEnd {
        let schedule = match heartbeat.schedule() {
            Ok(schedule) => schedule,
            Err(e) => {
                warn!(error = %e, "heartbeat schedule invalid, idling until the setting changes");
                return self.wait_for_change(shutdown).await;
            }
        };
        info!(
            delay_ms = schedule.delay_ms,
            period_ms = schedule.period_ms,
            destinations = heartbeat.destinations.len(),
            "heartbeat scheduled"
        );

        let mut ticker = interval_at(Instant::now() + schedule.delay(), schedule.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Rounds run detached so a slow destination never holds up the ticker.
        // Dropping the set on return aborts whatever is still in flight.
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    in_flight.spawn(self.ping_round());
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "heartbeat round panicked");
                    }
                }
                changed = self.settings.changed() => {
                    if changed.is_err() {
                        return CycleEnd::Shutdown;
                    }
                    if self.settings.borrow().heartbeat != heartbeat {
                        debug!(in_flight = in_flight.len(), "heartbeat setting changed, restarting schedule");
                        return CycleEnd::Restart;
                    }
                }
                _ = shutdown.changed() => return CycleEnd::Shutdown,
            }
        }
    }

    /// One ping round built from the latest snapshot.
    fn ping_round(&self) -> impl Future<Output = DeliveryReport> + Send + 'static {
        let setting = self.settings.borrow().clone();
        let transport = Arc::clone(&self.transport);
        async move {
            let payload = setting.heartbeat.payload();
            let body = ping_body(&payload, chrono::Utc::now().timestamp_millis());
            let report = fan_out(
                &transport,
                payload.destinations,
                payload.extra_headers,
                &body,
            )
            .await;
            debug!(
                delivered = report.delivered.len(),
                failed = report.failed.len(),
                "heartbeat sent"
            );
            report
        }
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
