use std::collections::BTreeMap;
use std::sync::Arc;

use mah_config::ExtraMap;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::transport::{OutboundRequest, Transport};

/// Outcome of delivering one payload to every destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Destinations that accepted the payload, in configured order.
    pub delivered: Vec<String>,
    /// Destinations that failed, with the error text, in configured order.
    pub failed: Vec<(String, String)>,
    /// Set when the policy said not to deliver at all.
    pub suppressed: bool,
}

impl DeliveryReport {
    pub fn suppressed() -> Self {
        Self {
            suppressed: true,
            ..Self::default()
        }
    }

    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }

    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// POST `body` to every destination concurrently.
///
/// A failing or slow destination never affects the others. Blank entries
/// are skipped.
pub async fn fan_out(
    transport: &Arc<dyn Transport>,
    destinations: &[String],
    headers: &ExtraMap,
    body: &Value,
) -> DeliveryReport {
    // Every spawned destination starts out failed so a task that panics or
    // is cancelled can never be counted as delivered.
    let mut outcomes = BTreeMap::new();
    let mut join_set = JoinSet::new();
    for (index, destination) in destinations.iter().enumerate() {
        if destination.trim().is_empty() {
            debug!(index, "skipping blank destination");
            continue;
        }
        outcomes.insert(
            index,
            (
                destination.clone(),
                Err(anyhow::anyhow!("delivery task panicked or was cancelled")),
            ),
        );
        let transport = Arc::clone(transport);
        let request = OutboundRequest {
            destination: destination.clone(),
            headers: headers.clone(),
            body: body.clone(),
        };
        join_set.spawn(async move {
            let result = transport.post(&request).await;
            (index, request.destination, result)
        });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, destination, result)) => {
                outcomes.insert(index, (destination, result));
            }
            Err(e) => warn!(error = %e, "delivery task panicked or was cancelled"),
        }
    }

    let mut report = DeliveryReport::default();
    for (destination, result) in outcomes.into_values() {
        match result {
            Ok(()) => report.delivered.push(destination),
            Err(e) => {
                warn!(destination = %destination, error = %format!("{e:#}"), "delivery failed");
                report.failed.push((destination, format!("{e:#}")));
            }
        }
    }
    report
}
