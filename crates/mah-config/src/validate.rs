use mah_core::ConfigError;
use tracing::warn;

use crate::heartbeat::check_timing;
use crate::schema::Setting;

/// Validate a fully populated setting.
///
/// Fatal problems return `ConfigError::Validation`. Legal-but-inert states
/// (e.g. an enabled report with no destinations) are only logged.
pub fn validate_setting(setting: &Setting) -> Result<(), ConfigError> {
    validate_binding(setting)?;
    validate_auth_key(setting)?;
    validate_heartbeat(setting)?;
    warn_inert_policies(setting);
    warn_suspicious_entries(setting);
    Ok(())
}

fn validate_binding(setting: &Setting) -> Result<(), ConfigError> {
    if setting.host.trim().is_empty() {
        return Err(ConfigError::validation("host", "cannot be empty"));
    }
    Ok(())
}

fn validate_auth_key(setting: &Setting) -> Result<(), ConfigError> {
    if setting.auth_key.trim().is_empty() {
        return Err(ConfigError::validation(
            "authKey",
            "cannot be empty; remove the key to have one generated",
        ));
    }
    Ok(())
}

fn validate_heartbeat(setting: &Setting) -> Result<(), ConfigError> {
    if setting.heartbeat.enable {
        check_timing(setting.heartbeat.delay, setting.heartbeat.period)?;
    }
    Ok(())
}

/// Warn (non-fatal) when a policy is switched on but has nowhere to deliver.
fn warn_inert_policies(setting: &Setting) {
    if setting.report.enable && !setting.report.is_effective() {
        warn!("report.enable = true but report.destinations is empty; nothing will be reported");
    }
    if setting.heartbeat.enable && setting.heartbeat.destinations.is_empty() {
        warn!("heartbeat.enable = true but heartbeat.destinations is empty; no pings will be sent");
    }
}

fn warn_suspicious_entries(setting: &Setting) {
    if setting.cors.is_empty() {
        warn!("cors is empty; browsers will reject every cross-origin request");
    }
    let blank_report = setting
        .report
        .destinations
        .iter()
        .filter(|d| d.trim().is_empty())
        .count();
    if blank_report > 0 {
        warn!(count = blank_report, "report.destinations contains blank entries");
    }
    let blank_heartbeat = setting
        .heartbeat
        .destinations
        .iter()
        .filter(|d| d.trim().is_empty())
        .count();
    if blank_heartbeat > 0 {
        warn!(count = blank_heartbeat, "heartbeat.destinations contains blank entries");
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
