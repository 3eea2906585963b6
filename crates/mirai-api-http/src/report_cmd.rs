use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use mah_core::{MessageCategory, OutputFormat};
use mah_delivery::{DeliveryReport, HttpTransport, ReportDispatcher};
use serde_json::{Value, json};

use crate::config_cmds::open_store;

pub(crate) async fn handle_report(
    path: &Path,
    category: MessageCategory,
    payload: Option<String>,
    timeout: Duration,
    format: OutputFormat,
) -> Result<()> {
    let payload = parse_payload(category, payload.as_deref())?;
    let store = open_store(path)?;
    let dispatcher = ReportDispatcher::new(store, Arc::new(HttpTransport::new(timeout)?));

    let report = dispatcher.dispatch(category, &payload).await;
    print!("{}", render_report(category, &report, format)?);

    if !report.all_delivered() {
        bail!(
            "{} of {} destinations failed",
            report.failed.len(),
            report.attempted()
        );
    }
    Ok(())
}

fn parse_payload(category: MessageCategory, raw: Option<&str>) -> Result<Value> {
    match raw {
        Some(raw) => serde_json::from_str(raw).context("--payload must be valid JSON"),
        None => Ok(json!({
            "type": "Test",
            "category": category.as_config_key(),
        })),
    }
}

fn render_report(
    category: MessageCategory,
    report: &DeliveryReport,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let failed: Vec<Value> = report
                .failed
                .iter()
                .map(|(destination, error)| json!({"destination": destination, "error": error}))
                .collect();
            let value = json!({
                "category": category.as_str(),
                "suppressed": report.suppressed,
                "delivered": report.delivered,
                "failed": failed,
            });
            Ok(serde_json::to_string_pretty(&value)? + "\n")
        }
        OutputFormat::Text => {
            if report.suppressed {
                return Ok(format!("{category}: suppressed by report policy\n"));
            }
            let mut out = format!(
                "{category}: {}/{} delivered\n",
                report.delivered.len(),
                report.attempted()
            );
            for (destination, error) in &report.failed {
                out.push_str(&format!("  FAILED {destination}: {error}\n"));
            }
            Ok(out)
        }
    }
}
