//! Webhook delivery of incoming messages and events.

use std::sync::Arc;

use mah_config::ConfigStore;
use mah_core::MessageCategory;
use serde_json::Value;
use tracing::debug;

use crate::fanout::{DeliveryReport, fan_out};
use crate::transport::Transport;

pub struct ReportDispatcher {
    store: Arc<ConfigStore>,
    transport: Arc<dyn Transport>,
}

impl ReportDispatcher {
    pub fn new(store: Arc<ConfigStore>, transport: Arc<dyn Transport>) -> Self {
        Self { store, transport }
    }

    /// Push `payload` to every report destination if `category` is enabled.
    ///
    /// Policy is read from the current snapshot on every call, so runtime
    /// edits apply to the next message.
    pub async fn dispatch(&self, category: MessageCategory, payload: &Value) -> DeliveryReport {
        let setting = self.store.snapshot();
        if !setting.report.should_report(category) {
            debug!(%category, "report suppressed by policy");
            return DeliveryReport::suppressed();
        }
        let (destinations, headers) = setting.report.delivery_targets();
        let report = fan_out(&self.transport, destinations, headers, payload).await;
        debug!(
            %category,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "report dispatched"
        );
        report
    }
}
